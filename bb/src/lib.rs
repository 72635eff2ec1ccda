//! Builds one busybox-like binary out of many Go command sources.
//!
//! This allows you to take two Go commands, such as Go implementations of
//! `sl` and `cowsay`, and compile them into one binary, callable like
//! `./bb sl` and `./bb cowsay`. Which command runs is determined by
//! `argv[0]`, or by `argv[1]` if `argv[0]` is not recognized.
//!
//! Under the hood, the engine performs a source-to-source transformation on
//! pure Go code and assembles a temporary build tree the unmodified Go
//! toolchain can compile:
//!
//! - Each command's source files are rewritten into ordinary package files
//!   without global side effects: `main` becomes `Main`, each `init`
//!   becomes an `InitN`, and global variable assignments move into their
//!   own `InitN` routines, scheduled in the type checker's original order.
//! - A generated `main.go` registers every command with a small dispatcher
//!   that selects one by invocation name at runtime.
//!
//! Parsing, type checking, formatting, and compilation belong to the Go
//! toolchain, reached through the [`Toolchain`] trait; [`GoCli`] is the
//! subprocess-backed implementation.

mod builder;
mod common;
mod dispatch;
mod error;
mod golang;
mod loader;
mod modules;
mod rewrite;
mod syntax;
/// Test code that should only be compiled when running tests.
#[cfg(test)]
mod test;
mod tools;
mod workspace;

pub use builder::build_busybox;
pub use error::{Error, Result};
pub use golang::{BuildOpts, Environ, ModuleMode};
pub use loader::{
    ExprType, Initializer, LoadResult, Module, Package, PackageSet, TypeInfo,
};
pub use syntax::{
    ChanDir, Decl, Expr, FuncDecl, ImportSpec, NodeId, SourceFile, Span, Type, TypePkg, VarDecl,
    VarSpec,
};
pub use tools::{GoCli, Toolchain};
