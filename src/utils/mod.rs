//! Environment variable helpers shared by the option loaders.

pub mod env;

pub use env::{get_env_with_prefix, parse_env};
