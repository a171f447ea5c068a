//! Participants of a match and which of them are still alive.

use std::collections::BTreeMap;

use crate::entity::EntityId;

/// One participant and the entity fighting for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Participant id from the match record.
    pub participant_id: String,
    /// Display name.
    pub name: String,
    /// Entity in the arena.
    pub entity: EntityId,
}

/// All entrants of a match, in entry order, with their alive state.
///
/// Entries are never dropped, so participants can still be looked up by
/// entity after they die. Only the alive count changes, and only downwards.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<(RosterEntry, bool)>,
    remaining: usize,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a living entrant.
    pub fn push(&mut self, entry: RosterEntry) {
        self.entries.push((entry, true));
        self.remaining += 1;
    }

    /// Entrants still alive.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Entrants at spawn.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nobody entered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Participant id of `entity`, alive or not.
    #[must_use]
    pub fn participant_of(&self, entity: EntityId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(e, _)| e.entity == entity)
            .map(|(e, _)| e.participant_id.as_str())
    }

    /// Marks `entity` dead and returns its entry with its rank: the number
    /// of entrants alive just before it died.
    ///
    /// Returns `None` if `entity` is unknown or already dead, so a death can
    /// only be counted once.
    pub fn eliminate(&mut self, entity: EntityId) -> Option<(RosterEntry, usize)> {
        let (entry, alive) = self.entries.iter_mut().find(|(e, _)| e.entity == entity)?;
        if !*alive {
            return None;
        }
        *alive = false;
        let rank = self.remaining;
        self.remaining -= 1;
        Some((entry.clone(), rank))
    }

    /// Living entrants in entry order.
    pub fn survivors(&self) -> impl Iterator<Item = &RosterEntry> + '_ {
        self.entries.iter().filter(|(_, alive)| *alive).map(|(e, _)| e)
    }

    /// Display names of every entrant keyed by participant id.
    #[must_use]
    pub fn names(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(e, _)| (e.participant_id.clone(), e.name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roster(n: u64) -> Roster {
        let mut roster = Roster::new();
        for i in 0..n {
            roster.push(RosterEntry {
                participant_id: format!("p{i}"),
                name: format!("Beast {i}"),
                entity: EntityId::new(i),
            });
        }
        roster
    }

    #[test]
    fn rank_is_count_before_removal() {
        let mut r = roster(4);
        let (entry, rank) = r.eliminate(EntityId::new(2)).unwrap();
        assert_eq!(entry.participant_id, "p2");
        assert_eq!(rank, 4);
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.eliminate(EntityId::new(0)).unwrap().1, 3);
    }

    #[test]
    fn second_elimination_is_ignored() {
        let mut r = roster(3);
        assert!(r.eliminate(EntityId::new(1)).is_some());
        assert!(r.eliminate(EntityId::new(1)).is_none());
        assert!(r.eliminate(EntityId::new(99)).is_none());
        assert_eq!(r.remaining(), 2);
    }

    #[test]
    fn dead_participants_stay_resolvable() {
        let mut r = roster(2);
        r.eliminate(EntityId::new(0));
        assert_eq!(r.participant_of(EntityId::new(0)), Some("p0"));
        let survivors: Vec<_> = r.survivors().map(|e| e.participant_id.as_str()).collect();
        assert_eq!(survivors, vec!["p1"]);
        assert_eq!(r.names().len(), 2);
        assert_eq!(r.total(), 2);
    }

    proptest! {
        #[test]
        fn remaining_only_decreases(n in 1u64..40, kills in proptest::collection::vec(0u64..50, 0..80)) {
            let mut r = roster(n);
            let mut last = r.remaining();
            for entity in kills {
                let removed = r.eliminate(EntityId::new(entity)).is_some();
                let now = r.remaining();
                if removed {
                    prop_assert_eq!(now + 1, last);
                } else {
                    prop_assert_eq!(now, last);
                }
                prop_assert_eq!(r.survivors().count(), now);
                last = now;
            }
        }
    }
}
