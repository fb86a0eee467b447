//! Opaque string identifiers used throughout the tracking core.
//!
//! All ids are caller-visible strings: a profile id may be forged by a
//! caller (`spec.md` §4.2 "static resolution"), a session id is supplied
//! by the ingesting channel, and a request id is assigned on
//! construction. Wrapping them in distinct newtypes keeps a stray
//! `SessionId` from being passed where a `ProfileId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random id (UUIDv4).
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Trim leading/trailing whitespace in place.
            ///
            /// Spaces around caller-supplied ids are a frequent source of
            /// accidental duplicate entities (`spec.md` §4.1).
            pub fn trim(&mut self) {
                let trimmed = self.0.trim();
                if trimmed.len() != self.0.len() {
                    self.0 = trimmed.to_string();
                }
            }

            /// Borrow the inner string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(RequestId, "Id of a single tracker payload (request).");
string_id!(SourceId, "Id of an event source (ingesting channel).");
string_id!(SessionId, "Id of a session.");
string_id!(ProfileId, "Id of a profile.");
string_id!(EventId, "Id of a materialized event.");

impl RequestId {
    /// Construct a fresh request id, same generation strategy as
    /// [`RequestId::generate`] but named for call-site clarity.
    #[must_use]
    pub fn new() -> Self {
        Self::generate()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_in_place() {
        let mut id = SourceId::from("  src-A  ");
        id.trim();
        assert_eq!(id.as_str(), "src-A");
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
