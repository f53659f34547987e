//! CLI commands

pub mod catalog;
pub mod remote;
mod session;
