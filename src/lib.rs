pub mod auth;
pub mod backend;
pub mod cache;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod models;
pub mod session;
pub mod status;
pub mod testing;

pub use error::{ConsoleError, ConsoleResult};
