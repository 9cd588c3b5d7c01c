//! Core library for Spektacular
//!
//! This crate contains the pieces shared by the agent runner and the CLI:
//! - Configuration (`.spektacular/config.yaml`)
//! - Project-file collaborators (knowledge, plan directories)

pub mod config;
pub mod error;
pub mod project;

pub use config::{AgentSettings, Config, DebugSettings};
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
