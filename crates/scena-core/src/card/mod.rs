//! Card domain module.
//!
//! - `model`: the parsed scene unit (`Card`, `StageMeta`)
//! - `role`: tag-to-role mapping (`CardRole`, `RoleMap`)
//! - `loader`: cards document parsing and execution ordering

mod loader;
mod model;
mod role;

pub use loader::CardLoader;
pub use model::{Card, StageMeta};
pub use role::{CardRole, RoleMap};
