use snafu::Snafu;
use std::io;
use std::path::PathBuf;

/// Errors surfaced by the busybox build pipeline.
///
/// Every failure reaches the caller; the pipeline never retries. Whenever a
/// build fails with any of these, the temporary workspace is preserved and
/// its path logged so it can be inspected.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A command path could not be collected from the file system.
    #[snafu(display("Could not find package at '{}': {message}", path.display()))]
    Load { path: PathBuf, message: String },

    /// The external metadata loader, formatter, or compiler failed fatally.
    #[snafu(display("{message}"))]
    Toolchain { message: String },

    /// No program-entry package survived filtering.
    #[snafu(display("No commands compiled"))]
    EmptyResult,

    /// Two inputs share a command name; the dispatcher could not tell them
    /// apart at runtime.
    #[snafu(display("Found duplicate command '{name}'"))]
    DuplicateCommand { name: String },

    /// Two distinct directories claim the same module path, or a dependency
    /// resolves a module we are building locally from somewhere else.
    #[snafu(display("{message}"))]
    ModuleConflict { message: String },

    /// A command package declares no program entry.
    #[snafu(display("No main function found in package '{pkg_path}'"))]
    NoEntryPoint { pkg_path: String },

    /// A post-rewrite invariant did not hold.
    #[snafu(display("Internal inconsistency: {message}"))]
    InternalInconsistency { message: String },

    /// Workspace I/O failed.
    #[snafu(display("Failed to write '{}': {source}", path.display()))]
    Write { path: PathBuf, source: io::Error },

    /// The final compile failed; `stderr` is the compiler's output, verbatim.
    #[snafu(display("go build failed:\n{stderr}"))]
    Build { stderr: String },
}

pub type Result<T> = std::result::Result<T, Error>;
