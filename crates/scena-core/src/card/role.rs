//! Card role mapping.
//!
//! The session runner is closed over *roles*, not type tags: an injectable
//! mapping from single-character type tag to role lets new card types be
//! added without touching the state machine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The behavioral role a card plays in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardRole {
    /// Drives an NPC/student exchange.
    Dialogue,
    /// Supplies a narrative bridge between scenes.
    Transition,
}

/// Maps type tags to roles.
///
/// Tags absent from the map have no role and are excluded from execution
/// sequencing (forward compatibility with future card types).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleMap {
    tags: BTreeMap<char, CardRole>,
}

impl Default for RoleMap {
    fn default() -> Self {
        let mut tags = BTreeMap::new();
        tags.insert('A', CardRole::Dialogue);
        tags.insert('B', CardRole::Transition);
        Self { tags }
    }
}

impl RoleMap {
    /// Creates a role map from explicit tag assignments.
    pub fn new(assignments: impl IntoIterator<Item = (char, CardRole)>) -> Self {
        Self {
            tags: assignments.into_iter().collect(),
        }
    }

    /// Returns the role for a type tag, if the tag is mapped.
    pub fn role_of(&self, tag: char) -> Option<CardRole> {
        self.tags.get(&tag).copied()
    }

    /// Returns the mapped tags carrying the given role, in tag order.
    pub fn tags_with_role(&self, role: CardRole) -> Vec<char> {
        self.tags
            .iter()
            .filter(|(_, r)| **r == role)
            .map(|(tag, _)| *tag)
            .collect()
    }

    /// The default execution order of type tags within one stage:
    /// dialogue tags first, then transition tags.
    pub fn default_type_order(&self) -> Vec<char> {
        let mut order = self.tags_with_role(CardRole::Dialogue);
        order.extend(self.tags_with_role(CardRole::Transition));
        order
    }
}
