//! Container sandbox lifecycle
//!
//! Drives the engine CLI to:
//! - Create keep-alive containers and install their dependencies
//! - Execute commands and scripts inside them
//! - List and clean them up

mod command;
mod manager;

pub use command::{exec_args, parse_command, script_write_command, split_args};
pub use manager::ContainerManager;
