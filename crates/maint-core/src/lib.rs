pub mod build;
pub mod capability;
pub mod config;
pub mod deploy;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod filter;
pub mod io;
pub mod issues;
pub mod manifest;
pub mod metadata;
pub mod modified_branch;
pub mod patch;
pub mod paths;
pub mod process;
pub mod release_branch;
pub mod state;
pub mod types;
pub mod vcs;

#[cfg(test)]
mod testing;

pub use error::{MaintError, Result};
