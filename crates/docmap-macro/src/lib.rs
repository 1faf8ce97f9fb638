//! Derive macro for `helios_docmap::Document`.
//!
//! `#[derive(Document)]` builds the field descriptor table of a struct at
//! compile time. Document property names follow the same rules serde uses
//! when it serializes the struct:
//!
//! - `#[serde(rename = "...")]` (or `rename(serialize = "...")`) on a field
//!   wins;
//! - otherwise the container's `#[serde(rename_all = "...")]` conversion is
//!   applied to the field name;
//! - otherwise the field name is used unchanged.
//!
//! Fields marked `#[serde(skip)]` or `#[serde(skip_serializing)]` never reach
//! the document and are left out of the table. The field renamed to `_id`
//! becomes the document identifier.
//!
//! ```ignore
//! use helios_docmap::Document;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, Document)]
//! #[serde(rename_all = "camelCase")]
//! struct User {
//!     #[serde(rename = "_id", default)]
//!     id: String,
//!     display_name: String,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

/// Derives `helios_docmap::Document` for a struct with named fields.
#[proc_macro_derive(Document, attributes(serde))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "#[derive(Document)] requires a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                input.ident.span(),
                "#[derive(Document)] can only be used on structs",
            ));
        }
    };

    let container = ContainerAttrs::parse(&input.attrs)?;

    let mut entries = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let attrs = FieldAttrs::parse(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        if attrs.flatten {
            return Err(syn::Error::new(
                field.span(),
                "#[serde(flatten)] fields are not supported by #[derive(Document)]",
            ));
        }

        let name = field
            .ident
            .as_ref()
            .map(|ident| ident.to_string().trim_start_matches("r#").to_string())
            .unwrap_or_default();

        let annotation = attrs
            .rename
            .or_else(|| container.rename_all.map(|rule| rule.apply(&name)));
        let annotation = match annotation {
            Some(value) => quote!(::core::option::Option::Some(#value)),
            None => quote!(::core::option::Option::None),
        };

        entries.push(quote! {
            ::helios_docmap::FieldDescriptor::new(#name, #annotation, #index)
        });
    }

    let ident = &input.ident;
    let type_name = ident.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::helios_docmap::Document for #ident #ty_generics #where_clause {
            fn descriptor() -> &'static ::helios_docmap::TypeDescriptor {
                static DESCRIPTOR: ::helios_docmap::TypeDescriptor =
                    ::helios_docmap::TypeDescriptor::new(#type_name, &[#(#entries),*]);
                &DESCRIPTOR
            }
        }
    })
}

/// Serde case conventions accepted by `rename_all`.
#[derive(Clone, Copy)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn from_lit(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            other => {
                return Err(syn::Error::new(
                    lit.span(),
                    format!("unknown rename_all rule: {}", other),
                ));
            }
        })
    }

    /// Converts a snake_case field name the way serde does for fields.
    ///
    /// `lowercase` and `snake_case` leave the name untouched, since field
    /// names are assumed to already be snake_case.
    fn apply(self, field: &str) -> String {
        match self {
            Self::Lower | Self::Snake => field.to_owned(),
            Self::Upper | Self::ScreamingSnake => field.to_ascii_uppercase(),
            Self::Pascal => pascal_case(field),
            Self::Camel => {
                let pascal = pascal_case(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
            Self::Kebab => field.replace('_', "-"),
            Self::ScreamingKebab => field.to_ascii_uppercase().replace('_', "-"),
        }
    }
}

fn pascal_case(field: &str) -> String {
    let mut pascal = String::with_capacity(field.len());
    let mut capitalize = true;
    for ch in field.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            pascal.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            pascal.push(ch);
        }
    }
    pascal
}

#[derive(Default)]
struct ContainerAttrs {
    rename_all: Option<RenameRule>,
}

impl ContainerAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    parsed.rename_all = parse_serialize_name(&meta, RenameRule::from_lit)?;
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            })?;
        }
        Ok(parsed)
    }
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    skip: bool,
    flatten: bool,
}

impl FieldAttrs {
    fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut parsed = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    parsed.rename = parse_serialize_name(&meta, |lit| Ok(lit.value()))?;
                    Ok(())
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    parsed.skip = true;
                    Ok(())
                } else if meta.path.is_ident("flatten") {
                    parsed.flatten = true;
                    Ok(())
                } else {
                    skip_meta(&meta)
                }
            })?;
        }
        Ok(parsed)
    }
}

/// Reads `key = "..."` or the `serialize` half of `key(serialize = "...", ...)`.
///
/// A form naming only `deserialize` yields `None`: serialization keeps the
/// structural name.
fn parse_serialize_name<T>(
    meta: &ParseNestedMeta<'_>,
    convert: impl Fn(&LitStr) -> syn::Result<T>,
) -> syn::Result<Option<T>> {
    if meta.input.peek(syn::Token![=]) {
        let lit: LitStr = meta.value()?.parse()?;
        return convert(&lit).map(Some);
    }

    let mut found = None;
    meta.parse_nested_meta(|inner| {
        let lit: LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("serialize") {
            found = Some(convert(&lit)?);
        }
        Ok(())
    })?;
    Ok(found)
}

/// Consumes a serde option this derive does not care about.
fn skip_meta(meta: &ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}
