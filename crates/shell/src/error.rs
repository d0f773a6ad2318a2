//! Error type for shell commands.

use thiserror::Error;

/// Errors a single shell command can produce. They are printed with an
/// `Error: ` prefix and never terminate the loop.
#[derive(Error, Debug)]
pub enum ShellError {
    /// A command was invoked with too few arguments.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    /// An argument failed to parse.
    #[error("can't parse argument: {0}")]
    BadArgument(String),

    /// A command that needs a loaded script was run without one.
    #[error("no script is loaded")]
    NoScript,

    /// A command that needs a manifest was run without one.
    #[error("no manifest is loaded")]
    NoManifest,

    /// An unknown command name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// File I/O failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Loader or state errors from the runtime.
    #[error("{0}")]
    Runtime(#[from] neodbg_runtime::RuntimeError),

    /// VM-level errors surfaced by inspection commands.
    #[error("{0}")]
    Vm(#[from] neodbg_vm::VmError),

    /// Core type errors.
    #[error("{0}")]
    Core(#[from] neodbg_core::CoreError),
}

impl ShellError {
    /// Shorthand for a `BadArgument` error.
    pub fn bad_argument(message: impl Into<String>) -> Self {
        ShellError::BadArgument(message.into())
    }
}
