//! The discovery ledger: which objects were found this session.

use std::collections::BTreeSet;

use hideout_types::ObjectId;
use tracing::debug;

use crate::{FoundOutcome, FoundProgress};

/// Tracks found objects for the active session.
///
/// The ledger starts disarmed (no findable ids). [`reset`](Self::reset)
/// arms it with the ids of the objects that are active this session and
/// must be called before any [`record_found`](Self::record_found).
#[derive(Debug, Default)]
pub struct DiscoveryLedger {
    /// Objects that can be found this session.
    findable: BTreeSet<ObjectId>,
    /// Objects found this session, always a subset of `findable`.
    found: BTreeSet<ObjectId>,
    /// Latched once the last object is found.
    completed: bool,
}

impl DiscoveryLedger {
    /// Create a disarmed ledger.
    pub const fn new() -> Self {
        Self {
            findable: BTreeSet::new(),
            found: BTreeSet::new(),
            completed: false,
        }
    }

    /// Clear all finds and arm the ledger with this session's object ids.
    ///
    /// The total count becomes the number of distinct ids given.
    pub fn reset(&mut self, findable: BTreeSet<ObjectId>) {
        self.findable = findable;
        self.found.clear();
        self.completed = false;
    }

    /// Record that an object was found.
    ///
    /// Idempotent: repeated reports for one object are absorbed as
    /// [`FoundOutcome::Duplicate`]. Reports for ids outside this session
    /// are [`FoundOutcome::Unknown`], and every report after completion is
    /// [`FoundOutcome::Closed`].
    pub fn record_found(&mut self, object_id: ObjectId) -> FoundOutcome {
        if self.completed {
            debug!(%object_id, "find reported after completion, ignored");
            return FoundOutcome::Closed { object_id };
        }
        if !self.findable.contains(&object_id) {
            debug!(%object_id, "find reported for an object outside this session");
            return FoundOutcome::Unknown { object_id };
        }
        if !self.found.insert(object_id) {
            debug!(%object_id, "duplicate find ignored");
            return FoundOutcome::Duplicate { object_id };
        }

        let found_count = self.found_count();
        let total_count = self.total_count();
        let is_now_complete = found_count == total_count;
        self.completed = is_now_complete;

        FoundOutcome::Recorded(FoundProgress {
            found_count,
            total_count,
            object_id,
            is_now_complete,
        })
    }

    /// Distinct objects found this session.
    pub fn found_count(&self) -> u32 {
        u32::try_from(self.found.len()).unwrap_or(u32::MAX)
    }

    /// Objects that can be found this session.
    pub fn total_count(&self) -> u32 {
        u32::try_from(self.findable.len()).unwrap_or(u32::MAX)
    }

    /// Whether every findable object has been found.
    pub const fn is_complete(&self) -> bool {
        self.completed
    }

    /// Whether a specific object has been found.
    pub fn is_found(&self, object_id: ObjectId) -> bool {
        self.found.contains(&object_id)
    }

    /// Iterate over found ids in ascending order.
    pub fn found_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.found.iter().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hideout_types::SessionEvent;

    use super::*;

    fn armed(ids: &[u32]) -> DiscoveryLedger {
        let mut ledger = DiscoveryLedger::new();
        ledger.reset(ids.iter().copied().map(ObjectId).collect());
        ledger
    }

    fn notifications(ledger: &mut DiscoveryLedger, ids: &[u32]) -> Vec<SessionEvent> {
        ids.iter()
            .filter_map(|&id| ledger.record_found(ObjectId(id)).progress().copied())
            .flat_map(|progress| progress.notifications())
            .collect()
    }

    #[test]
    fn disarmed_ledger_rejects_everything() {
        let mut ledger = DiscoveryLedger::new();
        assert_eq!(
            ledger.record_found(ObjectId(1)),
            FoundOutcome::Unknown {
                object_id: ObjectId(1)
            }
        );
        assert_eq!(ledger.total_count(), 0);
        assert!(!ledger.is_complete());
    }

    #[test]
    fn duplicates_do_not_double_count() {
        let mut ledger = armed(&[1, 2, 3]);
        let calls = [1, 1, 2, 1, 2, 2];
        let events = notifications(&mut ledger, &calls);

        assert_eq!(ledger.found_count(), 2);
        let found_events = events
            .iter()
            .filter(|event| matches!(event, SessionEvent::ObjectFound { .. }))
            .count();
        assert_eq!(found_events, 2);
        assert!(!events.contains(&SessionEvent::AllFound));
    }

    #[test]
    fn progress_tuple_is_reported() {
        let mut ledger = armed(&[10, 20]);
        let outcome = ledger.record_found(ObjectId(20));
        assert_eq!(
            outcome.progress().copied(),
            Some(FoundProgress {
                found_count: 1,
                total_count: 2,
                object_id: ObjectId(20),
                is_now_complete: false,
            })
        );
    }

    #[test]
    fn all_found_fires_exactly_once_regardless_of_order() {
        let orders: [&[u32]; 4] = [
            &[1, 2, 3],
            &[3, 3, 2, 1, 1, 2, 3],
            &[2, 1, 2, 3, 3, 3],
            &[1, 1, 1, 2, 2, 3, 1, 2, 3],
        ];
        for order in orders {
            let mut ledger = armed(&[1, 2, 3]);
            let events = notifications(&mut ledger, order);
            let all_found = events
                .iter()
                .filter(|event| **event == SessionEvent::AllFound)
                .count();
            assert_eq!(all_found, 1, "order {order:?}");
            // The completion notification follows the find that caused it.
            assert_eq!(events.last(), Some(&SessionEvent::AllFound));
            assert!(ledger.is_complete());
        }
    }

    #[test]
    fn reports_after_completion_are_closed() {
        let mut ledger = armed(&[1]);
        assert!(ledger.record_found(ObjectId(1)).is_recorded());
        assert_eq!(
            ledger.record_found(ObjectId(1)),
            FoundOutcome::Closed {
                object_id: ObjectId(1)
            }
        );
    }

    #[test]
    fn unknown_ids_are_not_recorded() {
        let mut ledger = armed(&[1, 2]);
        assert!(!ledger.record_found(ObjectId(99)).is_recorded());
        assert_eq!(ledger.found_count(), 0);
        assert!(!ledger.is_found(ObjectId(99)));
    }

    #[test]
    fn reset_clears_finds_and_rearms() {
        let mut ledger = armed(&[1, 2]);
        let _ = ledger.record_found(ObjectId(1));
        let _ = ledger.record_found(ObjectId(2));
        assert!(ledger.is_complete());

        ledger.reset([ObjectId(5)].into_iter().collect());
        assert_eq!(ledger.found_count(), 0);
        assert_eq!(ledger.total_count(), 1);
        assert!(!ledger.is_complete());
        assert!(!ledger.record_found(ObjectId(1)).is_recorded());

        let progress = ledger.record_found(ObjectId(5)).progress().copied().unwrap();
        assert!(progress.is_now_complete);
        assert_eq!(ledger.found_ids().collect::<Vec<_>>(), vec![ObjectId(5)]);
    }
}
