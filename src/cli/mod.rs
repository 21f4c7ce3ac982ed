//! # CLI Module
//!
//! Command-line front end for the pipeline, shipped as the `apigen` binary.
//!
//! ## Commands
//!
//! ### `generate`
//!
//! Discover entities, fetch templates and write the project:
//!
//! ```bash
//! apigen generate --version 1.4.0 --output ./generated-api
//! ```
//!
//! Options:
//! - `--version <VERSION>` - version stamped into tokens and metadata (default: 1.0.0)
//! - `--output <DIR>` - output directory (default: `APIGEN_OUTPUT_DIR` or `./generated-api`)
//! - `--template-dir <DIR>` - use a local template instead of fetching
//!
//! ### `discover`
//!
//! Print discovered entities as JSON on stdout.
//!
//! ### `templates`
//!
//! Fetch the template repository and list the valid templates in it.
//!
//! ## Global options
//!
//! - `--config <FILE>` - TOML settings file; `APIGEN_*` variables override it
//! - `--base-dir <DIR>` - directory relative search paths resolve against
//!
//! ## Exit codes
//!
//! Failures exit with the code carried by the error, see
//! [`crate::error::ExitCode`]. Logs go to stderr; command output goes to stdout.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run, Cli, CliError, Commands};
