//! Strongly-typed ID wrappers for all entity types
//!
//! Ids are assigned by the record store from a monotonically increasing
//! counter. Newtype wrappers prevent mixing up ids of different entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Behaviour shared by every store-assigned id
pub trait RecordId: Copy + Ord + std::hash::Hash + fmt::Debug + fmt::Display {
    fn from_raw_id(raw: u64) -> Self;
    fn raw_id(&self) -> u64;
}

/// Macro to generate ID newtype wrappers
macro_rules! define_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw store id
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw store id
            pub const fn raw(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl RecordId for $name {
            fn from_raw_id(raw: u64) -> Self {
                Self(raw)
            }

            fn raw_id(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                let s = s.strip_prefix($display_prefix).unwrap_or(s);
                Ok(Self(s.parse()?))
            }
        }
    };
}

define_id!(TransactionId, "txn-");
define_id!(CategoryId, "cat-");
define_id!(PayeeId, "pay-");
define_id!(MappingId, "map-");
