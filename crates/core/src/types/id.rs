//! Newtype keys for type-safe entity references.
//!
//! Keys issued by the hosted collaborators are opaque strings (auth uids,
//! auto-generated document keys). Use the `define_key!` macro to create
//! wrappers that prevent accidentally mixing keys from different entity types.

use uuid::Uuid;

/// Macro to define a type-safe string key wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use digitalhub_core::define_key;
/// define_key!(AccountKey);
/// define_key!(InvoiceKey);
///
/// let account = AccountKey::new("abc");
/// let invoice = InvoiceKey::new("abc");
///
/// // These are different types, so this won't compile:
/// // let _: AccountKey = invoice;
/// assert_eq!(account.as_str(), invoice.as_str());
/// ```
#[macro_export]
macro_rules! define_key {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new key from any string-like value.
            #[must_use]
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Get the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the key and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_key!(UserId);
define_key!(PurchaseId);
define_key!(OrderId);

impl UserId {
    /// Issue a fresh user id in the provider's uid format (32 lowercase hex chars).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl PurchaseId {
    /// Issue a fresh auto-generated document key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl OrderId {
    /// Prefix shared by every order id.
    pub const PREFIX: &'static str = "DH";

    /// Build an order id from a millisecond timestamp and a random suffix.
    ///
    /// The timestamp is rendered in upper-case base 36 and the suffix is
    /// upper-cased, giving ids such as `DHLZ3K9Q1AB7X2P`.
    #[must_use]
    pub fn from_parts(timestamp_millis: u64, suffix: &str) -> Self {
        Self(format!(
            "{}{}{}",
            Self::PREFIX,
            to_base36(timestamp_millis),
            suffix.to_ascii_uppercase()
        ))
    }
}

/// Render a number in upper-case base 36.
fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    if value == 0 {
        return "0".to_owned();
    }

    let mut out = Vec::new();
    while value > 0 {
        // value % 36 is always < 36
        #[allow(clippy::cast_possible_truncation, clippy::indexing_slicing)]
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "LOYW3V28");
    }

    #[test]
    fn test_order_id_from_parts() {
        let id = OrderId::from_parts(36, "ab1x9");
        assert_eq!(id.as_str(), "DH10AB1X9");
    }

    #[test]
    fn test_generated_user_ids_differ() {
        let a = UserId::generate();
        let b = UserId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_key_serde_is_transparent() {
        let id = PurchaseId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
        let parsed: PurchaseId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
