//! Globally unique identifiers used throughout Tallymart.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting, which
//! also gives listings a stable tie-breaker for deterministic selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

uuid_id!(
    /// Unique identifier for a balance-holding account (buyer, seller, admin).
    AccountId
);

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

uuid_id!(
    /// Ledger entry identifier.
    ///
    /// Its string form is sent to the payment provider as the order
    /// reference, so webhook correlation never depends on provider ids.
    TransactionId
);

// ---------------------------------------------------------------------------
// ListingId
// ---------------------------------------------------------------------------

uuid_id!(
    /// Unique identifier for a license listing.
    ListingId
);

// ---------------------------------------------------------------------------
// PriceRefId
// ---------------------------------------------------------------------------

uuid_id!(
    /// Identifier of a price catalogue entry.
    PriceRefId
);

// ---------------------------------------------------------------------------
// CheckoutId
// ---------------------------------------------------------------------------

uuid_id!(
    /// Identifier of one checkout run; tags reserved listings and the
    /// ledger entries settled for them.
    CheckoutId
);
