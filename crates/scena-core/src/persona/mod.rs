//! Persona domain module.
//!
//! - `model`: the persona value object and its shaping enums
//! - `preset`: built-in calibration-tier personas
//! - `repository`: the lookup trait implemented by storage backends

mod model;
pub mod preset;
mod repository;

pub use model::{
    EngagementLevel, Persona, PersonaType, QuestionFrequency, ResponseLength,
};
pub use repository::PersonaRepository;
