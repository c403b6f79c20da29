//! Utility modules shared by the deploy stages.

pub mod checker;
pub mod command;
pub mod copy;
pub mod git;
pub mod log;
