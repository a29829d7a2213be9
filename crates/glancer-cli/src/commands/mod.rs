//! CLI commands.

pub mod model;
pub mod serve;
pub mod status;
