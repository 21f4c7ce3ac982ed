//! # Error Module
//!
//! One error type per pipeline phase. Every type carries a human-readable
//! message, a fixed [`ExitCode`] and an optional inner cause, so the CLI can
//! terminate with the embedded code after logging the message.
//!
//! | Type | Exit code |
//! |------|-----------|
//! | [`ConfigurationError`] | 2 |
//! | [`EntityDiscoveryError`] | 5 |
//! | [`TemplateError`] | 6 |
//! | [`CodeGenerationError`] | 7 |
//! | [`KeyVaultError`] | 9 |
//!
//! Per-item failures (one unreadable file, one bad archive entry) never reach
//! these types; they are logged and skipped where they happen.

use std::error::Error as StdError;
use std::fmt;

/// Boxed inner cause carried by every phase error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Process exit codes, grouped by failure category.
///
/// The numeric values are an external contract consumed by CI scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    General = 1,
    Configuration = 2,
    Authentication = 3,
    RepositoryAccess = 4,
    EntityDiscovery = 5,
    Template = 6,
    CodeGeneration = 7,
    Deployment = 8,
    KeyVault = 9,
}

impl ExitCode {
    /// Numeric process status for this category.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

macro_rules! phase_error {
    ($(#[$meta:meta])* $name:ident, $code:expr) => {
        $(#[$meta])*
        #[derive(Debug, thiserror::Error)]
        #[error("{message}")]
        pub struct $name {
            message: String,
            #[source]
            source: Option<BoxError>,
        }

        impl $name {
            /// Exit code every instance of this error maps to.
            pub const EXIT_CODE: ExitCode = $code;

            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                    source: None,
                }
            }

            /// Wrap an underlying cause.
            pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
                Self {
                    message: message.into(),
                    source: Some(source.into()),
                }
            }

            pub fn message(&self) -> &str {
                &self.message
            }

            pub fn exit_code(&self) -> ExitCode {
                Self::EXIT_CODE
            }
        }
    };
}

phase_error!(
    /// Invalid or incomplete configuration (language selector, cloud, paths).
    ConfigurationError,
    ExitCode::Configuration
);

phase_error!(
    /// Secret backend failure other than "not found".
    KeyVaultError,
    ExitCode::KeyVault
);

phase_error!(
    /// Fatal discovery failure (unsupported language, no readable search path).
    EntityDiscoveryError,
    ExitCode::EntityDiscovery
);

phase_error!(
    /// Template fetch, cache, validation or lookup failure.
    TemplateError,
    ExitCode::Template
);

phase_error!(
    /// Any failure while writing the generated project tree.
    CodeGenerationError,
    ExitCode::CodeGeneration
);

/// Error returned by [`crate::pipeline::Pipeline::run`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    KeyVault(#[from] KeyVaultError),
    #[error(transparent)]
    Discovery(#[from] EntityDiscoveryError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Generation(#[from] CodeGenerationError),
}

impl PipelineError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PipelineError::Configuration(e) => e.exit_code(),
            PipelineError::KeyVault(e) => e.exit_code(),
            PipelineError::Discovery(e) => e.exit_code(),
            PipelineError::Template(e) => e.exit_code(),
            PipelineError::Generation(e) => e.exit_code(),
        }
    }
}
