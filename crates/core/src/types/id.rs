//! Newtype IDs for type-safe entity references.
//!
//! The marketplace API uses 64-bit numeric identifiers, but older payloads
//! (and the admin review screens) sometimes send them as strings. Each ID
//! type therefore parses from both.

/// Error returned when a string is not a valid entity ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid id: {0:?}")]
pub struct IdParseError(pub String);

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `FromStr` accepting a base-10 integer, surrounding whitespace ignored
///
/// # Example
///
/// ```rust
/// # use minefornow_core::define_id;
/// define_id!(VehicleId);
///
/// let id: VehicleId = " 42 ".parse().unwrap();
/// assert_eq!(id.as_i64(), 42);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::IdParseError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| $crate::IdParseError(s.to_owned()))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
