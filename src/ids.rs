use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifies a [`crate::model::Swimlane`].
    SwimlaneId
);
entity_id!(
    /// Identifies a [`crate::model::Outcome`].
    OutcomeId
);
entity_id!(
    /// Identifies a [`crate::model::ScopeBlob`].
    BlobId
);

/// Largest id a document may carry. Keeping loaded ids below the top of
/// the `u64` range leaves the counter room to grow after seeding.
pub const MAX_ID: u64 = i64::MAX as u64;

/// Hands out ids for one open document.
///
/// All entity kinds share one counter, so an id is unique across kinds.
/// After a load the counter is seeded past the largest id in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdGenerator {
    next: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdGenerator {
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    /// Never moves the counter backwards.
    pub fn seed_past(&mut self, max_seen: u64) {
        self.next = self.next.max(max_seen.saturating_add(1));
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}
