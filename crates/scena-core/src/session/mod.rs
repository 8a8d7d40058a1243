//! Session configuration and transcript types.

pub mod config;
pub mod model;

pub use config::{
    BudgetPolicy, ConfigSnapshot, EndpointConfig, ProgressCallback, SessionConfig, SessionMode,
};
pub use model::{DialogueTurn, SessionLog, SessionStatus, SessionSummary, Speaker};
