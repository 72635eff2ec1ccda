//! Workspace assembly.
//!
//! The temporary tree has to satisfy both of the toolchain's resolution
//! schemes at once. Module-aware builds follow the synthesized top-level
//! manifest, whose `replace` directives point every local module at its
//! in-tree copy; classic-path builds treat the workspace root as the path
//! root, which works because all sources live under `<root>/src`.
//!
//! ```text
//!   <root>/go.mod                      module bb.u-root.com + replaces
//!   <root>/src/bb/main.go              the generated dispatcher
//!   <root>/src/<module>/go.mod        one per local module
//!   <root>/src/<import path>/*.go     rewritten commands, copied deps
//! ```

use crate::error::{self, Result};
use crate::loader::Package;
use crate::tools::Toolchain;
use snafu::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use tokio::fs;

/// The fixed module name of the synthesized manifest. Intentionally not a
/// resolvable address, lest the toolchain decides to go on the internet.
const BB_MODULE_NAME: &str = "bb.u-root.com";

/// Create the workspace skeleton: `<root>/src/bb` (and with it `<root>/src`).
pub(crate) async fn create_skeleton(root: &Path) -> Result<()> {
    let bb_dir = root.join("src/bb");
    fs::create_dir_all(&bb_dir)
        .await
        .context(error::WriteSnafu { path: bb_dir })?;
    Ok(())
}

/// Serialize a rewritten command package into `dest`.
///
/// Sources go through the toolchain's canonical formatter. Import fixing is
/// deliberately off everywhere in this pipeline: code only moved within
/// files, and automated import edits would change semantics.
pub(crate) async fn write_rewritten_package(
    tools: &dyn Toolchain,
    pkg: &Package,
    dest: &Path,
) -> Result<()> {
    fs::create_dir_all(dest)
        .await
        .context(error::WriteSnafu {
            path: dest.to_path_buf(),
        })?;
    copy_other_files(pkg, dest).await?;
    for file in &pkg.go_files {
        let path = dest.join(file_name(&file.path)?);
        let formatted = tools.format(&file.text).await?;
        fs::write(&path, formatted)
            .await
            .context(error::WriteSnafu { path })?;
    }
    Ok(())
}

/// Copy a dependency package into `dest` verbatim.
pub(crate) async fn copy_package(pkg: &Package, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)
        .await
        .context(error::WriteSnafu {
            path: dest.to_path_buf(),
        })?;
    copy_other_files(pkg, dest).await?;
    for file in &pkg.go_files {
        let path = dest.join(file_name(&file.path)?);
        fs::copy(&file.path, &path)
            .await
            .context(error::WriteSnafu { path })?;
    }
    Ok(())
}

async fn copy_other_files(pkg: &Package, dest: &Path) -> Result<()> {
    for other in &pkg.other_files {
        let path = dest.join(file_name(other)?);
        fs::copy(other, &path)
            .await
            .context(error::WriteSnafu { path })?;
    }
    Ok(())
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .with_context(|| error::InternalInconsistencySnafu {
            message: format!("loader reported a file with no basename: {}", path.display()),
        })
}

/// Synthesize the top-level manifest: one replacement per local module,
/// pointing at its in-tree copy. This is the only way to reference another
/// module's sources locally; without the replacement the toolchain would
/// try to fetch them.
pub(crate) async fn write_top_manifest(root: &Path, local_modules: &[String]) -> Result<()> {
    let mut content = format!("module {BB_MODULE_NAME}\n");
    for module in local_modules {
        content.push_str(&format!("\nreplace {module} => ./src/{module}\n"));
    }
    let path = root.join("go.mod");
    fs::write(&path, content)
        .await
        .context(error::WriteSnafu { path })?;
    Ok(())
}

/// Where a package's sources land inside the workspace.
pub(crate) fn package_dest(root: &Path, pkg_path: &str) -> PathBuf {
    root.join("src").join(pkg_path)
}
