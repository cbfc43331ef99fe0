//! EDBP Plugin Registry
//!
//! This crate handles plugin discovery: the approved-plugin index, the
//! public repository search, trust classification of what they return,
//! and downloading candidate archives through the CORS relay.

pub mod installer;
pub mod registry;

use std::collections::HashSet;

pub use registry::{Candidate, RegistryClient, RegistrySettings};

/// Organization whose repositories are official plugins
pub const OFFICIAL_OWNER: &str = "EDBPlugin";

/// Plugin trust tier
///
/// Ordered so that `Official > Approved > Unofficial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrustTier {
    /// Unlisted plugin from any publisher
    Unofficial,
    /// Listed in the approved-plugin index
    Approved,
    /// Published by the reserved organization
    Official,
}

impl TrustTier {
    /// Collapse stored flags into a single tier
    pub fn from_flags(official: bool, approved: bool) -> Self {
        if official {
            Self::Official
        } else if approved {
            Self::Approved
        } else {
            Self::Unofficial
        }
    }

    pub fn is_official(self) -> bool {
        self == Self::Official
    }

    pub fn is_approved(self) -> bool {
        self == Self::Approved
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Approved => "approved",
            Self::Unofficial => "unofficial",
        }
    }
}

/// Identifiers fetched from the approved-plugin index
///
/// Lives for the process, is refilled on every discovery pass, and is never
/// persisted. Until a fetch succeeds the set is empty and every plugin
/// classifies as unofficial.
#[derive(Debug, Clone)]
pub struct ApprovedIds {
    ids: HashSet<String>,
    fetched: bool,
    official_owner: String,
}

impl Default for ApprovedIds {
    fn default() -> Self {
        Self::new(OFFICIAL_OWNER)
    }
}

impl ApprovedIds {
    pub fn new(official_owner: impl Into<String>) -> Self {
        Self {
            ids: HashSet::new(),
            fetched: false,
            official_owner: official_owner.into(),
        }
    }

    /// Replace the set with a fresh fetch result
    pub fn replace<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self.fetched = true;
    }

    /// Forget everything, as before the first fetch
    pub fn clear(&mut self) {
        self.ids.clear();
        self.fetched = false;
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn official_owner(&self) -> &str {
        &self.official_owner
    }

    /// Classify a plugin from its publisher and any identifiers it goes by
    ///
    /// Official is a structural owner check and wins over approval.
    pub fn classify(&self, owner: Option<&str>, ids: &[&str]) -> TrustTier {
        if owner.is_some_and(|owner| owner == self.official_owner) {
            return TrustTier::Official;
        }

        if ids.iter().any(|id| self.contains(id)) {
            TrustTier::Approved
        } else {
            TrustTier::Unofficial
        }
    }
}
