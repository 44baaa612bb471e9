pub mod config;
pub mod harness;
pub mod probe;
