//! One module per subcommand. Each exposes an `execute` entry point.

pub mod completions;
pub mod config;
pub mod criteria;
pub mod init;
pub mod query;
pub mod scaffold;
