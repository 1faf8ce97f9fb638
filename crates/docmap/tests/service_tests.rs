//! Tests for the health checker and the passcode store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use helios_docmap::StorageError;
use helios_docmap::health::HealthChecker;
use helios_docmap::passcode::PasscodeStore;

use common::MemoryTransport;

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check_success() {
    let engine = MemoryTransport::new();
    let checker = HealthChecker::default();

    let report = checker.check(&engine).await.unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(checker.build(report.clone(), None), report);
}

#[tokio::test(start_paused = true)]
async fn test_health_check_timeout() {
    let engine = MemoryTransport::new();
    engine.slow_ping(10_000);
    let checker = HealthChecker::new("search", Duration::from_millis(50));

    let err = checker.check(&engine).await.unwrap_err();
    assert!(matches!(err, StorageError::Transport { .. }));

    let report = checker.build(Default::default(), Some(&err));
    assert!(report["error"].as_str().unwrap().contains("search"));
}

// ============================================================================
// Passcodes
// ============================================================================

#[tokio::test]
async fn test_passcode_round_trip() {
    let engine = MemoryTransport::new();
    let store = PasscodeStore::new(Arc::new(engine.clone()), "passcodes");
    let expires = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

    assert_eq!(store.save("alice", "123456", expires).await.unwrap(), 1);
    let stored = engine.document("passcodes", "alice").unwrap();
    assert_eq!(stored["passcode"], "123456");
    assert!(!stored.contains_key("_id"));

    let (passcode, expired_at) = store.load("alice").await.unwrap().unwrap();
    assert_eq!(passcode, "123456");
    assert_eq!(expired_at, expires);

    // saving again replaces the code
    store.save("alice", "654321", expires).await.unwrap();
    assert_eq!(store.load("alice").await.unwrap().unwrap().0, "654321");

    assert_eq!(store.delete("alice").await.unwrap(), 1);
    assert!(store.load("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_passcode_custom_names() {
    let engine = MemoryTransport::new();
    let store = PasscodeStore::with_names(
        Arc::new(engine.clone()),
        "codes",
        "userId",
        "code",
        "validUntil",
    );
    let expires = Utc.with_ymd_and_hms(2031, 6, 1, 0, 0, 0).unwrap();
    store.save("bob", "0000", expires).await.unwrap();

    let stored = engine.document("codes", "bob").unwrap();
    assert_eq!(stored["userId"], "bob");
    assert_eq!(stored["code"], "0000");
    assert!(stored.contains_key("validUntil"));
}

#[tokio::test]
async fn test_passcode_malformed_expiry() {
    let engine = MemoryTransport::new();
    engine.put("passcodes", "eve", json!({ "passcode": "1", "expiredAt": "tomorrow" }));
    let store = PasscodeStore::new(Arc::new(engine), "passcodes");

    let err = store.load("eve").await.unwrap_err();
    assert!(matches!(err, StorageError::Decode { .. }));
}

#[tokio::test]
async fn test_passcode_delete_absent() {
    let store = PasscodeStore::new(Arc::new(MemoryTransport::new()), "passcodes");
    let err = store.delete("nobody").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}
