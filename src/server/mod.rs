//! Server module for Pacer
//!
//! Configuration and process wiring shared by every command.
//!
//! # Module Structure
//!
//! - `config`: Configuration sections
//! - `loader`: Configuration loading from files and environment
//! - `init`: Component wiring and the serve loop

pub mod config;
mod init;
mod loader;

pub use init::{build_runner, init_components, run, Components};
pub use loader::load_config;
