use std::path::PathBuf;

use notify::EventKind;
use notify::event::{AccessKind, AccessMode, ModifyKind};

/// Kind of filesystem change. Carried for logging only; downstream every kind is
/// treated the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Modify,
    Remove,
    Rename,
    Other,
}

impl ChangeKind {
    /// Map a raw notify kind. Returns `None` for read-only access notifications,
    /// which are not changes.
    pub fn from_notify(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(Self::Modify),
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(Self::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::Rename),
            EventKind::Modify(_) => Some(Self::Modify),
            EventKind::Remove(_) => Some(Self::Remove),
            EventKind::Any | EventKind::Other => Some(Self::Other),
        }
    }
}

/// A change under one watch root that passed the ignore filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Watch root as configured.
    pub root: PathBuf,
    /// Path relative to `root`. Never empty.
    pub path: PathBuf,
}

impl ChangeEvent {
    /// `root/path`, the identifier recorded in the pending changeset.
    pub fn full_path(&self) -> PathBuf {
        self.root.join(&self.path)
    }
}
