pub mod card;
pub mod error;
pub mod evaluation;
pub mod persona;
pub mod session;

// Re-export common error type
pub use error::{Result, ScenaError};
