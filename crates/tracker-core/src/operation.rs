//! The `Operation` record carried by `Profile` and `Session` (`spec.md` §3).

use serde::{Deserialize, Serialize};

/// Tracks why an entity needs to be written, and how.
///
/// `new` and `update` mirror the source's `Operation(new, update)`;
/// `merge` carries the keys a profile-merge pass should fold on, so
/// `needs_merging()` can answer "has this profile acquired merge keys
/// during this request" without a separate flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    /// The entity does not yet exist in storage.
    pub new: bool,
    /// The entity exists but was mutated this request.
    pub update: bool,
    /// Merge key/value pairs collected from the profile's traits,
    /// non-empty exactly when a merge should be attempted.
    #[serde(default)]
    pub merge: Vec<(String, String)>,
}

impl Operation {
    /// Whether this entity should be (re)written: either newly created
    /// or updated.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.new || self.update
    }

    /// Whether a profile merge pass should run for this entity.
    #[must_use]
    pub fn needs_merging(&self) -> bool {
        !self.merge.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_operation_needs_nothing() {
        let op = Operation::default();
        assert!(!op.needs_update());
        assert!(!op.needs_merging());
    }

    #[test]
    fn new_flag_implies_needs_update() {
        let op = Operation {
            new: true,
            ..Default::default()
        };
        assert!(op.needs_update());
    }
}
