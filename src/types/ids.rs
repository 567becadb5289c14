//! Opaque identifiers for ledger entities
//!
//! Every entity is keyed by a string identifier. Wrapping each one in its own
//! newtype keeps an account id from being passed where a product id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Account identifier, supplied by the external identity provider
    AccountId
);

opaque_id!(
    /// Product identifier, assigned by catalog management
    ProductId
);

opaque_id!(
    /// Order identifier, generated by the settlement engine
    OrderId
);

opaque_id!(
    /// Ledger record identifier, generated by the settlement engine
    TransactionId
);

opaque_id!(
    /// Caller-supplied token that makes a settlement request safe to resubmit
    IdempotencyKey
);

/// Upper-case hex suffix taken from a fresh v4 UUID
fn random_suffix(len: usize) -> String {
    let mut suffix = Uuid::new_v4().simple().to_string();
    suffix.truncate(len);
    suffix.make_ascii_uppercase();
    suffix
}

impl OrderId {
    /// Generate a fresh order id (`ORD-XXXXXXXX`)
    pub fn generate() -> Self {
        Self(format!("ORD-{}", random_suffix(8)))
    }
}

impl TransactionId {
    /// Generate a fresh ledger record id (`TX-XXXXXXXXXXXX`)
    pub fn generate() -> Self {
        Self(format!("TX-{}", random_suffix(12)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_have_prefix_and_length() {
        let order = OrderId::generate();
        assert!(order.as_str().starts_with("ORD-"));
        assert_eq!(order.as_str().len(), 12);

        let tx = TransactionId::generate();
        assert!(tx.as_str().starts_with("TX-"));
        assert_eq!(tx.as_str().len(), 15);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(OrderId::generate(), OrderId::generate());
        assert_ne!(TransactionId::generate(), TransactionId::generate());
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = AccountId::new("alice");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
        assert_eq!(id.to_string(), "alice");
    }
}
