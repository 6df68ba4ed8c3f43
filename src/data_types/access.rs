use std::collections::BTreeSet;

/// What an already-authenticated caller may see.
/// This is produced by the authorization layer; the engine never looks at tokens.
/// The default profile is the unauthenticated one, which only sees public datasets.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CallerAccessProfile {
    /// Registered-access datasets granted to this caller
    registered_dataset_ids: BTreeSet<String>,
    /// If true, every controlled-access dataset is visible
    has_controlled_access: bool,
}

impl CallerAccessProfile {
    /// Constructor
    pub fn new(registered_dataset_ids: BTreeSet<String>, has_controlled_access: bool) -> Self {
        Self {
            registered_dataset_ids,
            has_controlled_access
        }
    }

    /// Profile for callers without any credentials
    pub fn public_only() -> Self {
        Self::default()
    }

    // getters
    pub fn registered_dataset_ids(&self) -> &BTreeSet<String> {
        &self.registered_dataset_ids
    }

    pub fn has_controlled_access(&self) -> bool {
        self.has_controlled_access
    }
}
