//! Local module planning.
//!
//! A module is local when it owns one of the commands being compiled, or
//! when a `replace` directive somewhere in a command's dependency graph
//! points it at a local directory. Local modules are materialized inside
//! the workspace and redirected there by the synthesized top-level
//! manifest; everything else is left for the toolchain to resolve.

use crate::error::{self, Result};
use crate::loader::{Module, Package, PackageSet};
use crate::rewrite::Command;
use log::warn;
use snafu::{ensure, ResultExt};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A module the planner will materialize, and which input brought it in.
/// The provenance only ever shows up in conflict diagnostics.
#[derive(Debug, Clone)]
struct LocalModule {
    module: Module,
    provenance: String,
}

/// Find all local modules, place their manifests under `pkg_dir`, and fail
/// with every conflict found.
pub(crate) async fn plan_local_modules(
    pkg_dir: &Path,
    set: &PackageSet,
    cmds: &[Command],
) -> Result<Vec<String>> {
    let mut local: BTreeMap<String, LocalModule> = BTreeMap::new();

    // Seed with the module owning each command.
    for cmd in cmds {
        let pkg = set.expect(&cmd.id)?;
        let Some(module) = &pkg.module else { continue };
        if !local.contains_key(&module.path) {
            copy_go_mod(pkg_dir, module).await?;
            local.insert(
                module.path.clone(),
                LocalModule {
                    module: module.clone(),
                    provenance: format!(
                        "your request to compile {} from {}",
                        module.path,
                        module.dir.display()
                    ),
                },
            );
        }
    }

    // Pull in modules that some command's manifest replaces with a local
    // directory.
    for cmd in cmds {
        let pkg = set.expect(&cmd.id)?;
        let Some(cmd_module) = pkg.module.clone() else { continue };
        for module in locally_replaced_modules(set, &cmd.id) {
            match local.get(&module.path) {
                // A previous definition already provided this module path
                // from a different directory.
                Some(original) if original.module.dir != module.dir => {
                    return error::ModuleConflictSnafu {
                        message: format!(
                            "two conflicting versions of module {} have been requested; one from {}, the other from {}'s go.mod",
                            module.path, original.provenance, cmd_module.path
                        ),
                    }
                    .fail();
                }
                Some(_) => {}
                None => {
                    copy_go_mod(pkg_dir, &module).await?;
                    local.insert(
                        module.path.clone(),
                        LocalModule {
                            module: module.clone(),
                            provenance: format!(
                                "{}'s go.mod ({})",
                                cmd_module.path,
                                cmd_module.go_mod.display()
                            ),
                        },
                    );
                }
            }
        }
    }

    // Remote-vs-local conflicts: a dependency resolves a module path we are
    // building locally, but from somewhere else. Gather them all before
    // failing so the user can fix every one in a single round.
    let mut conflicts = 0usize;
    let mut warned_replaces = BTreeSet::new();
    for cmd in cmds {
        let pkg = set.expect(&cmd.id)?;
        let Some(cmd_module) = &pkg.module else { continue };
        set.visit(&cmd.id, &mut |dep| {
            let Some(module) = &dep.module else { return };

            // Remote replacements only take effect in a main module's
            // manifest, which the synthesized top-level manifest does not
            // reproduce; make the gap visible.
            if module.replace.is_some()
                && !module.is_locally_replaced()
                && warned_replaces.insert(module.path.clone())
            {
                warn!(
                    "replace directive for {} in {}'s manifest is not propagated to the busybox go.mod",
                    module.path, cmd_module.path
                );
            }

            if let Some(l) = local.get(&module.path) {
                if l.module.dir != module.dir {
                    warn!("Conflicting module dependencies on {}:", module.path);
                    warn!("  {} uses {}", cmd_module.path, module.identifier());
                    warn!("  {} uses {}", l.provenance, l.module.identifier());
                    let replace_path = pathdiff::diff_paths(&l.module.dir, &cmd_module.dir)
                        .unwrap_or_else(|| l.module.dir.clone());
                    warn!(
                        "Suggestion to resolve: add `replace {} => {}` to {}",
                        module.path,
                        replace_path.display(),
                        cmd_module.go_mod.display()
                    );
                    conflicts += 1;
                }
            }
        });
    }
    ensure!(
        conflicts == 0,
        error::ModuleConflictSnafu {
            message: format!("{conflicts} conflicting module dependencies found"),
        }
    );

    Ok(local.into_keys().collect())
}

/// All modules in `root`'s graph that a `replace` directive points at a
/// local directory.
fn locally_replaced_modules(set: &PackageSet, root: &str) -> Vec<Module> {
    let mut found: BTreeMap<String, Module> = BTreeMap::new();
    set.visit(root, &mut |pkg| {
        if let Some(module) = &pkg.module {
            if module.is_locally_replaced() {
                found.insert(module.path.clone(), module.clone());
            }
        }
    });
    found.into_values().collect()
}

/// Create the module root in the workspace and place its manifest there.
async fn copy_go_mod(pkg_dir: &Path, module: &Module) -> Result<()> {
    let dest_dir = pkg_dir.join(&module.path);
    let dest = dest_dir.join("go.mod");
    if dest.exists() {
        return Ok(());
    }
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .context(error::WriteSnafu {
            path: dest_dir.clone(),
        })?;
    tokio::fs::copy(&module.go_mod, &dest)
        .await
        .context(error::WriteSnafu { path: dest })?;
    Ok(())
}

/// The dependency packages one command needs materialized in the workspace.
///
/// With modules, that is every package either inside a local module or
/// locally replaced. Without modules, every non-standard-library package
/// must be in the tree; a first path component containing a dot is the poor
/// man's standard library test.
pub(crate) fn collect_deps<'a>(
    set: &'a PackageSet,
    root: &str,
    local_modules: &[String],
) -> Vec<&'a Package> {
    let has_module = set
        .get(root)
        .is_some_and(|pkg| pkg.module.is_some());
    if has_module {
        set.deps(root, |pkg| {
            if pkg.module.as_ref().is_some_and(Module::is_locally_replaced) {
                return true;
            }
            local_modules
                .iter()
                .any(|module| pkg.pkg_path.starts_with(module.as_str()))
        })
    } else {
        set.deps(root, |pkg| {
            pkg.pkg_path
                .split('/')
                .next()
                .is_some_and(|first| first.contains('.'))
        })
    }
}
