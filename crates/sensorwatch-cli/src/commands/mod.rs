//! CLI command implementations

pub mod fit;
pub mod monitor;
pub mod score;
pub mod show;
