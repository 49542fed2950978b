//! Database models split into domain-specific modules.

pub mod expense;
pub mod group;
pub mod settlement;
pub mod user;

pub use expense::*;
pub use group::*;
pub use settlement::*;
pub use user::*;
