//! Persona repository trait.
//!
//! Defines the interface for persona lookup, decoupling the session runner
//! from the specific storage mechanism (preset table, TOML directory, etc.).

use super::model::Persona;
use crate::error::Result;

/// An abstract store of named student personas.
#[async_trait::async_trait]
pub trait PersonaRepository: Send + Sync {
    /// Resolves a persona by id.
    ///
    /// Returns `ScenaError::NotFound` when no persona carries the id.
    async fn get(&self, persona_id: &str) -> Result<Persona>;

    /// Lists the ids of all available personas.
    async fn list(&self) -> Result<Vec<String>>;
}
