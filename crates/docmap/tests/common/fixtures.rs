//! Record fixtures.

use helios_docmap::Document;
use serde::{Deserialize, Serialize};

/// A record keyed by `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
pub struct User {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "userName")]
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub age: u32,
}

impl User {
    /// Creates a user with a derived email.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            id: id.into(),
            email: format!("{}@example.com", username),
            username,
            age: 30,
        }
    }

    /// Sets the age.
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = age;
        self
    }
}

/// A record without an identifier field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub sensor_name: String,
    pub reading: f64,
}

impl Measurement {
    pub fn new(sensor_name: impl Into<String>, reading: f64) -> Self {
        Self {
            sensor_name: sensor_name.into(),
            reading,
        }
    }
}

/// A record keyed by a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
pub struct Tally {
    #[serde(rename = "_id")]
    pub id: u64,
    pub hits: u64,
}

/// Builds `count` users keyed `user-0`, `user-1`, ...
pub fn users(count: usize) -> Vec<User> {
    (0..count)
        .map(|i| User::new(format!("user-{}", i), format!("name{}", i)))
        .collect()
}
