//! CLI subcommands.

pub mod run;
pub mod tiers;
pub mod validate;
