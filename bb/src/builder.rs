//! The build pipeline.
//!
//! Each phase strictly follows the previous: load, plan, rewrite, write,
//! emit the dispatcher, compile. The work per phase is cheap next to the
//! external compile that ends the pipeline, so nothing here runs
//! concurrently; the only blocking sits inside external tool invocations
//! and filesystem I/O.

use crate::error::{self, Result};
use crate::golang::{BuildOpts, Environ, ModuleMode};
use crate::loader;
use crate::modules;
use crate::rewrite;
use crate::tools::Toolchain;
use crate::workspace;
use log::{debug, info};
use snafu::{ensure, ResultExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Build a busybox of the given Go commands.
///
/// `cmd_paths` entries are filesystem paths or Go import paths. On success
/// the fused binary is written to `output` and the temporary workspace is
/// removed; on any failure the workspace is preserved and its path logged
/// so it can be inspected.
pub async fn build_busybox(
    tools: &dyn Toolchain,
    env: &Environ,
    cmd_paths: &[String],
    opts: &BuildOpts,
    output: &Path,
) -> Result<()> {
    let mut tmp = tempfile::Builder::new();
    tmp.prefix("bb-");
    let tmp = match &opts.workspace_parent {
        Some(parent) => tmp.tempdir_in(parent),
        None => tmp.tempdir(),
    }
    .context(error::WriteSnafu {
        path: opts
            .workspace_parent
            .clone()
            .unwrap_or_else(std::env::temp_dir),
    })?;

    match build_in(tools, env, cmd_paths, opts, output, tmp.path()).await {
        Ok(()) => Ok(()),
        Err(err) => {
            let preserved = tmp.keep();
            info!(
                "Preserving bb temporary directory at {} due to error",
                preserved.display()
            );
            Err(err)
        }
    }
}

async fn build_in(
    tools: &dyn Toolchain,
    env: &Environ,
    cmd_paths: &[String],
    opts: &BuildOpts,
    output: &Path,
    root: &Path,
) -> Result<()> {
    workspace::create_skeleton(root).await?;
    let bb_dir = root.join("src/bb");
    let pkg_dir = root.join("src");

    // Ask the toolchain about all commands in one batch, for dependency
    // caching.
    let (mut set, mut cmds) = loader::load_commands(tools, env, cmd_paths).await?;
    ensure!(!cmds.is_empty(), error::EmptyResultSnafu);
    debug!(
        "Compiling commands: {:?}",
        cmds.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
    );

    // Module directories and manifests come first.
    let local_modules = modules::plan_local_modules(&pkg_dir, &set, &cmds).await?;

    // Rewrite commands into importable packages and serialize them.
    let mut bb_imports = Vec::new();
    for cmd in &mut cmds {
        let pkg = set.expect_mut(&cmd.id)?;
        rewrite::rewrite_command(cmd, pkg)?;
        bb_imports.push(cmd.pkg_path.clone());
    }
    for cmd in &cmds {
        let pkg = set.expect(&cmd.id)?;
        let dest = workspace::package_dest(root, &pkg.pkg_path);
        workspace::write_rewritten_package(tools, pkg, &dest).await?;
    }

    // Local dependency packages, de-duplicated by loader id. Command
    // packages are already in the tree in rewritten form.
    let mut seen: HashSet<String> = cmds.iter().map(|cmd| cmd.id.clone()).collect();
    for cmd in &cmds {
        let deps: Vec<(String, String)> = modules::collect_deps(&set, &cmd.id, &local_modules)
            .into_iter()
            .map(|dep| (dep.id.clone(), dep.pkg_path.clone()))
            .collect();
        for (id, pkg_path) in deps {
            if seen.insert(id.clone()) {
                let pkg = set.expect(&id)?;
                workspace::copy_package(pkg, &workspace::package_dest(root, &pkg_path)).await?;
            }
        }
    }

    // The top-level manifest, unless this is a pure classic-path build.
    let has_modules = env.module_mode == ModuleMode::On || !local_modules.is_empty();
    if has_modules {
        workspace::write_top_manifest(root, &local_modules).await?;
    }

    // The dispatcher.
    let bb_main = crate::dispatch::create_bb_main(&bb_imports)?;
    let path = bb_dir.join("main.go");
    fs::write(&path, bb_main)
        .await
        .context(error::WriteSnafu { path })?;

    // Compile. Without modules the workspace doubles as the classic-path
    // root.
    let mut build_env = env.clone();
    if env.module_mode == ModuleMode::Off || !has_modules {
        build_env.gopath = Some(root.to_path_buf());
    }
    let output = absolute_output(output)?;
    tools.build(&build_env, &bb_dir, opts, &output).await
}

fn absolute_output(output: &Path) -> Result<PathBuf> {
    std::path::absolute(output).map_err(|err| {
        error::LoadSnafu {
            path: output.to_path_buf(),
            message: err.to_string(),
        }
        .build()
    })
}
