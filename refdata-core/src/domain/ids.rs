use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque instrument identifier (e.g. `600030.SH`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A comma-separated list of entity ids as accepted by every query entry point.
///
/// Blank entries are dropped and surrounding whitespace trimmed; order is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SymbolList(Vec<EntityId>);

impl SymbolList {
    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(EntityId::from)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.0.iter()
    }

    /// Comma-joined form used inside filter expressions.
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(EntityId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for SymbolList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined())
    }
}

impl From<&str> for SymbolList {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_list_trims_and_drops_blanks() {
        let list = SymbolList::parse(" 600030.SH, ,000001.SZ,");
        assert_eq!(list.len(), 2);
        assert_eq!(list.joined(), "600030.SH,000001.SZ");
    }

    #[test]
    fn entity_ids_order_lexicographically() {
        let mut ids = vec![EntityId::from("600030.SH"), EntityId::from("000001.SZ")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "000001.SZ");
    }
}
