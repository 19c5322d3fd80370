//! UCI protocol front end for the matto mate solver.

pub mod command;
pub mod engine;
pub mod error;

pub use command::{parse_command, Command};
pub use engine::UciEngine;
pub use error::UciError;
