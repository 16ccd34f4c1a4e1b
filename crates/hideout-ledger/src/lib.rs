//! Discovery ledger for the Hideout hidden-object game.
//!
//! The ledger is the authoritative record of which objects have been found
//! in the current session. It deduplicates reports, computes progress, and
//! detects completion exactly once per reset cycle.
//!
//! # Invariants
//!
//! - Found ids are always a subset of the ids armed by the last
//!   [`DiscoveryLedger::reset`].
//! - The found count never decreases between resets.
//! - Completion is reported by exactly one [`FoundOutcome::Recorded`]
//!   per reset cycle. Reports arriving after completion are closed out.
//!
//! # Usage
//!
//! ```
//! use std::collections::BTreeSet;
//! use hideout_ledger::{DiscoveryLedger, FoundOutcome};
//! use hideout_types::{ObjectId, SessionEvent};
//!
//! let mut ledger = DiscoveryLedger::new();
//! ledger.reset([ObjectId(1), ObjectId(2)].into_iter().collect::<BTreeSet<_>>());
//!
//! assert!(matches!(ledger.record_found(ObjectId(1)), FoundOutcome::Recorded(_)));
//! assert!(matches!(ledger.record_found(ObjectId(1)), FoundOutcome::Duplicate { .. }));
//!
//! let FoundOutcome::Recorded(progress) = ledger.record_found(ObjectId(2)) else {
//!     unreachable!()
//! };
//! assert!(progress.is_now_complete);
//! assert_eq!(progress.notifications().last(), Some(&SessionEvent::AllFound));
//! ```

pub mod ledger;

pub use ledger::DiscoveryLedger;

use hideout_types::{ObjectId, SessionEvent};

/// Progress after a genuine (non-duplicate) find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundProgress {
    /// Distinct objects found, including this one.
    pub found_count: u32,
    /// Objects armed for this session.
    pub total_count: u32,
    /// The object just found.
    pub object_id: ObjectId,
    /// `true` when this find completed the set.
    pub is_now_complete: bool,
}

impl FoundProgress {
    /// Notifications caused by this find, in publication order: the
    /// object-found notification, then all-found if the set is complete.
    pub fn notifications(&self) -> Vec<SessionEvent> {
        let mut events = vec![SessionEvent::ObjectFound {
            found_count: self.found_count,
            total_count: self.total_count,
            object_id: self.object_id,
        }];
        if self.is_now_complete {
            events.push(SessionEvent::AllFound);
        }
        events
    }
}

/// Result of reporting a found object to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundOutcome {
    /// The object was newly recorded.
    Recorded(FoundProgress),
    /// The object had already been found; nothing changed.
    Duplicate {
        /// The repeated object.
        object_id: ObjectId,
    },
    /// The object is not findable this session; nothing changed.
    Unknown {
        /// The unrecognised object.
        object_id: ObjectId,
    },
    /// The set was already complete, or no session is accepting finds.
    Closed {
        /// The late object.
        object_id: ObjectId,
    },
}

impl FoundOutcome {
    /// Whether the report changed the ledger.
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    /// Progress for a recorded find.
    pub const fn progress(&self) -> Option<&FoundProgress> {
        match self {
            Self::Recorded(progress) => Some(progress),
            Self::Duplicate { .. } | Self::Unknown { .. } | Self::Closed { .. } => None,
        }
    }
}
