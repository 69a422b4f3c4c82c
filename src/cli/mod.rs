//! CLI command implementations

pub mod error;
pub mod stations;
pub mod sync;

pub use error::CliError;
pub use stations::StationsCommand;
pub use sync::{Cli, Commands, SyncArgs};
