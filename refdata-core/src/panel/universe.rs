//! Universe resolution: the entity axis of a panel.
//!
//! The universe is whatever the raw fetch returned, not the full market:
//! the distinct entity ids observed, sorted lexicographically.

use super::series::SeriesMap;
use crate::domain::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sorted, duplicate-free entity axis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Universe(Vec<EntityId>);

impl Universe {
    /// Union of the given ids.
    pub fn resolve(ids: impl IntoIterator<Item = EntityId>) -> Self {
        let set: BTreeSet<EntityId> = ids.into_iter().collect();
        Self(set.into_iter().collect())
    }

    /// Every entity that contributed at least one event.
    pub fn from_series<E>(series: &SeriesMap<E>) -> Self {
        Self(series.keys().cloned().collect())
    }

    /// Union with another universe.
    pub fn union(&self, other: &Universe) -> Self {
        Self::resolve(self.0.iter().chain(other.0.iter()).cloned())
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.0.binary_search(id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<EntityId> {
        self.0
    }
}

impl FromIterator<EntityId> for Universe {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        Self::resolve(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_sorts_and_dedups() {
        let u: Universe = ["600030.SH", "000001.SZ", "600030.SH"]
            .into_iter()
            .map(EntityId::from)
            .collect();
        let ids: Vec<&str> = u.iter().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["000001.SZ", "600030.SH"]);
        assert!(u.contains(&EntityId::from("600030.SH")));
        assert!(!u.contains(&EntityId::from("600000.SH")));
    }

    #[test]
    fn union_merges() {
        let a = Universe::resolve([EntityId::from("B")]);
        let b = Universe::resolve([EntityId::from("A"), EntityId::from("B")]);
        assert_eq!(a.union(&b).len(), 2);
        assert_eq!(a.union(&b).ids()[0], EntityId::from("A"));
    }
}
