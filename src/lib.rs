pub mod config;
pub mod error;
pub mod locator;
pub mod prompt;
pub mod runner;
pub mod session;
pub mod shell;

pub use error::{Error, Result};
