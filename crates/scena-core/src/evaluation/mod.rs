//! Evaluation report model and the fixed scoring rubric.

pub mod model;
pub mod rubric;

pub use model::{DimensionScore, EvaluationReport, Rating, SubDimensionScore};
pub use rubric::{Dimension, SubDimension, RUBRIC};
