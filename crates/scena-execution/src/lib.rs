pub mod closed_loop;
pub mod evaluator;
pub mod generator;
pub mod runner;

pub use closed_loop::{ClosedLoopDriver, ClosedLoopOptions, ClosedLoopOutcome};
pub use evaluator::Evaluator;
pub use generator::{CardsGenerator, ExclusiveGenerator};
pub use runner::SessionRunner;
