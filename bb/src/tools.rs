//! The external Go toolchain collaborators.
//!
//! The engine never parses, type-checks, formats, or compiles Go itself;
//! those jobs sit behind [`Toolchain`]. [`GoCli`] is the production
//! implementation, shelling out to `go` and `gofmt`. Tests swap in an
//! in-memory fake.

use crate::common;
use crate::error::{self, Result};
use crate::golang::{BuildOpts, Environ};
use crate::loader::LoadResult;
use async_trait::async_trait;
use log::debug;
use snafu::{ensure, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use which::which;

/// What the engine needs from the Go toolchain.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Load package metadata for `patterns`, resolved from `dir` (or from
    /// the process working directory when `dir` is `None`).
    async fn load(
        &self,
        env: &Environ,
        dir: Option<&Path>,
        patterns: &[String],
    ) -> Result<LoadResult>;

    /// Run Go source through the canonical formatter. Imports are never
    /// fixed up; code only moves within files during the rewrite.
    async fn format(&self, src: &str) -> Result<String>;

    /// Compile the program-entry package at `dir` into `output`.
    async fn build(
        &self,
        env: &Environ,
        dir: &Path,
        opts: &BuildOpts,
        output: &Path,
    ) -> Result<()>;
}

/// The embedded metadata loader helper: a small Go program wrapping the
/// toolchain's parser and type checker, printing the package graph as JSON.
const LOADER_MAIN: &str = include_str!("../resources/loader/main.go");
const LOADER_GO_MOD: &str = include_str!("../resources/loader/go.mod");

/// Production toolchain: `go` and `gofmt` from the search path.
#[derive(Debug)]
pub struct GoCli {
    go: PathBuf,
    gofmt: PathBuf,
    /// Keeps the unpacked loader helper alive for the lifetime of the value.
    loader_dir: TempDir,
}

impl GoCli {
    /// Locate the toolchain and unpack the embedded loader helper into a
    /// temp dir, where `go run` resolves its dependencies on first use.
    pub async fn from_path() -> Result<Self> {
        let go = which("go").map_err(|err| {
            error::ToolchainSnafu {
                message: format!("`go` not found in the search path: {err}"),
            }
            .build()
        })?;
        let gofmt = which("gofmt").map_err(|err| {
            error::ToolchainSnafu {
                message: format!("`gofmt` not found in the search path: {err}"),
            }
            .build()
        })?;

        let loader_dir = TempDir::with_prefix("bb-loader-").map_err(|err| {
            error::ToolchainSnafu {
                message: format!("Unable to create a tempdir for the metadata loader: {err}"),
            }
            .build()
        })?;
        debug!(
            "Installing the metadata loader to '{}'",
            loader_dir.path().display()
        );
        for (name, content) in [("main.go", LOADER_MAIN), ("go.mod", LOADER_GO_MOD)] {
            let path = loader_dir.path().join(name);
            tokio::fs::write(&path, content)
                .await
                .context(error::WriteSnafu { path })?;
        }

        Ok(Self {
            go,
            gofmt,
            loader_dir,
        })
    }
}

#[async_trait]
impl Toolchain for GoCli {
    async fn load(
        &self,
        env: &Environ,
        dir: Option<&Path>,
        patterns: &[String],
    ) -> Result<LoadResult> {
        let mut cmd = Command::new(&self.go);
        cmd.arg("run").arg(".");
        cmd.current_dir(self.loader_dir.path());
        // The helper dir is disposable; let `go run` fill in its go.sum.
        cmd.env("GOFLAGS", "-mod=mod");
        if let Some(dir) = dir {
            cmd.arg("-dir").arg(dir);
        }
        for (key, value) in env.child_env() {
            cmd.arg("-env").arg(format!("{key}={value}"));
        }
        cmd.args(patterns);

        let output = common::output(&mut cmd).await?;
        ensure!(
            output.status.success(),
            error::ToolchainSnafu {
                message: format!(
                    "metadata loader failed for {patterns:?}: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            }
        );
        serde_json::from_slice(&output.stdout).map_err(|err| {
            error::ToolchainSnafu {
                message: format!("metadata loader returned invalid JSON: {err}"),
            }
            .build()
        })
    }

    async fn format(&self, src: &str) -> Result<String> {
        let mut cmd = Command::new(&self.gofmt);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Running: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|err| {
            error::ToolchainSnafu {
                message: format!("Unable to start gofmt: {err}"),
            }
            .build()
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(src.as_bytes()).await.map_err(|err| {
                error::ToolchainSnafu {
                    message: format!("Unable to feed gofmt: {err}"),
                }
                .build()
            })?;
        }
        let output = child.wait_with_output().await.map_err(|err| {
            error::ToolchainSnafu {
                message: format!("gofmt did not finish: {err}"),
            }
            .build()
        })?;
        ensure!(
            output.status.success(),
            error::ToolchainSnafu {
                message: format!("gofmt: {}", String::from_utf8_lossy(&output.stderr)),
            }
        );
        String::from_utf8(output.stdout).map_err(|err| {
            error::ToolchainSnafu {
                message: format!("gofmt produced non-UTF-8 output: {err}"),
            }
            .build()
        })
    }

    async fn build(
        &self,
        env: &Environ,
        dir: &Path,
        opts: &BuildOpts,
        output: &Path,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.go);
        cmd.arg("build");
        if !opts.no_strip {
            cmd.args(["-ldflags", "-s -w"]);
        }
        cmd.arg("-o").arg(output);
        cmd.arg(".");
        cmd.current_dir(dir);
        cmd.envs(env.child_env());

        let out = common::output(&mut cmd).await?;
        ensure!(
            out.status.success(),
            error::BuildSnafu {
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            }
        );
        Ok(())
    }
}
