//! Package metadata collection.
//!
//! Inputs are a mix of filesystem paths and logical Go import paths.
//! Filesystem paths are grouped by their nearest enclosing `go.mod` and each
//! group is loaded with the metadata loader's working directory set to that
//! module root, because the toolchain resolves a different module manifest
//! for the same directory depending on where the query runs from. Logical
//! import paths are loaded in one batch with no working directory.

use crate::error::{self, Result};
use crate::golang::Environ;
use crate::rewrite::Command;
use crate::syntax::{NodeId, SourceFile, Type};
use crate::tools::Toolchain;
use log::warn;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One unit of the Go module system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Logical module path, e.g. `github.com/u-root/u-root`. For the
    /// right-hand side of a `replace` directive this may instead be a
    /// filesystem path.
    pub path: String,
    /// Absolute on-disk directory of the module root.
    pub dir: PathBuf,
    /// Absolute path of the module's manifest file.
    pub go_mod: PathBuf,
    #[serde(default)]
    pub version: Option<String>,
    /// Target of a `replace` directive, if one applied.
    #[serde(default)]
    pub replace: Option<Box<Module>>,
}

impl Module {
    /// From the module reference: a replacement is interpreted as a local
    /// file path iff it is absolute or begins with `./` or `../`.
    pub(crate) fn is_local_path(&self) -> bool {
        self.path.starts_with("./") || self.path.starts_with("../") || self.path.starts_with('/')
    }

    /// Whether this module has been replaced by a local directory.
    pub(crate) fn is_locally_replaced(&self) -> bool {
        self.replace.as_ref().is_some_and(|r| r.is_local_path())
    }

    /// Human identifier for conflict diagnostics.
    pub(crate) fn identifier(&self) -> String {
        match &self.replace {
            Some(replace) if replace.is_local_path() => format!("directory {}", replace.path),
            _ => format!("version {}", self.version.as_deref().unwrap_or("(none)")),
        }
    }
}

/// Type-checker facts about one package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Package-level variable initializers, in the type checker's
    /// initialization order.
    #[serde(default)]
    pub init_order: Vec<Initializer>,
    /// Types of the recorded right-hand-side expressions.
    #[serde(default)]
    pub expr_types: Vec<ExprType>,
}

/// One `lhs = rhs` package-level initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Initializer {
    pub lhs: Vec<String>,
    pub rhs: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprType {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// One package as reported by the metadata loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Loader-assigned unique id.
    pub id: String,
    /// Declared package name; `main` marks a command.
    pub name: String,
    /// Logical import path.
    pub pkg_path: String,
    /// Parsed Go sources.
    #[serde(default)]
    pub go_files: Vec<SourceFile>,
    /// Non-Go files (assembly, embedded data); copied byte-for-byte.
    #[serde(default)]
    pub other_files: Vec<PathBuf>,
    /// Ids of directly imported packages.
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub module: Option<Module>,
    /// Load errors reported for the package.
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub types: TypeInfo,
}

/// What one metadata loader invocation returns: the packages matching the
/// requested patterns plus their flattened transitive dependency graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadResult {
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default)]
    pub packages: Vec<Package>,
}

/// The package graph accumulated across loader invocations.
#[derive(Debug, Default)]
pub struct PackageSet {
    packages: HashMap<String, Package>,
}

impl PackageSet {
    /// Merge one load result into the set, first write wins, and return the
    /// result's root ids.
    pub(crate) fn absorb(&mut self, result: LoadResult) -> Vec<String> {
        for pkg in result.packages {
            self.packages.entry(pkg.id.clone()).or_insert(pkg);
        }
        result.roots
    }

    pub fn get(&self, id: &str) -> Option<&Package> {
        self.packages.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Package> {
        self.packages.get_mut(id)
    }

    /// Like [`get`](Self::get), but a missing id is an engine bug.
    pub(crate) fn expect(&self, id: &str) -> Result<&Package> {
        self.packages
            .get(id)
            .with_context(|| error::InternalInconsistencySnafu {
                message: format!("package {id} missing from the load result"),
            })
    }

    pub(crate) fn expect_mut(&mut self, id: &str) -> Result<&mut Package> {
        self.packages
            .get_mut(id)
            .with_context(|| error::InternalInconsistencySnafu {
                message: format!("package {id} missing from the load result"),
            })
    }

    /// Visit `root` and every transitive import exactly once.
    pub(crate) fn visit<'a>(&'a self, root: &str, f: &mut dyn FnMut(&'a Package)) {
        let mut seen = HashSet::new();
        let mut stack = vec![root.to_string()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(pkg) = self.packages.get(&id) else {
                continue;
            };
            f(pkg);
            stack.extend(pkg.imports.iter().cloned());
        }
    }

    /// Transitive dependencies of `root` (root included) passing `filter`.
    pub(crate) fn deps(&self, root: &str, filter: impl Fn(&Package) -> bool) -> Vec<&Package> {
        let mut pkgs = Vec::new();
        self.visit(root, &mut |pkg| {
            if filter(pkg) {
                pkgs.push(pkg);
            }
        });
        pkgs
    }
}

/// Basename of a logical import path.
pub(crate) fn base_name(pkg_path: &str) -> &str {
    pkg_path.rsplit('/').next().unwrap_or(pkg_path)
}

/// Collect package metadata about all named commands in one batch.
///
/// `names` entries are either filesystem paths (absolute, starting with `.`
/// or `/`, or naming an existing location) or logical import paths.
pub(crate) async fn load_commands(
    tools: &dyn Toolchain,
    env: &Environ,
    names: &[String],
) -> Result<(PackageSet, Vec<Command>)> {
    let mut import_paths = Vec::new();
    let mut fs_paths = Vec::new();
    for name in names {
        if name.starts_with('.') || name.starts_with('/') {
            fs_paths.push(name.clone());
        } else if Path::new(name).exists() {
            fs_paths.push(name.clone());
        } else {
            import_paths.push(name.clone());
        }
    }

    let mut set = PackageSet::default();
    let mut roots = Vec::new();

    if !import_paths.is_empty() {
        let result = tools.load(env, None, &import_paths).await?;
        roots.extend(absorb_commands(&mut set, result));
    }
    roots.extend(load_fs_packages(tools, env, &mut set, &fs_paths).await?);

    let mut cmds = Vec::new();
    let mut seen = HashSet::new();
    for id in roots {
        let pkg = set.expect(&id)?;
        let name = base_name(&pkg.pkg_path).to_string();
        ensure!(
            seen.insert(name.clone()),
            error::DuplicateCommandSnafu { name }
        );
        cmds.push(Command::new(name, pkg));
    }
    Ok((set, cmds))
}

/// Load all filesystem paths, one loader invocation per enclosing module.
async fn load_fs_packages(
    tools: &dyn Toolchain,
    env: &Environ,
    set: &mut PackageSet,
    fs_paths: &[String],
) -> Result<Vec<String>> {
    let mut abs_paths = Vec::new();
    for fs_path in fs_paths {
        let abs = std::path::absolute(fs_path).map_err(|err| {
            error::LoadSnafu {
                path: PathBuf::from(fs_path),
                message: err.to_string(),
            }
            .build()
        })?;
        abs_paths.push(abs);
    }

    let (by_module, no_module) = group_by_module_root(&abs_paths);

    let mut roots = Vec::new();
    for (module_dir, pkg_dirs) in &by_module {
        roots.extend(load_fs_group(tools, env, set, module_dir, pkg_dirs).await?);
    }
    if !no_module.is_empty() {
        // Any directory without a go.mod in its parent chain will do as the
        // resolution root for the module-less group.
        let dir = no_module[0].clone();
        roots.extend(load_fs_group(tools, env, set, &dir, &no_module).await?);
    }
    Ok(roots)
}

/// Group absolute package directories by the first parent directory that
/// contains a module manifest.
fn group_by_module_root(paths: &[PathBuf]) -> (BTreeMap<PathBuf, Vec<PathBuf>>, Vec<PathBuf>) {
    let mut grouped: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut no_module = Vec::new();
    for path in paths {
        match nearest_module_root(path) {
            Some(root) => grouped.entry(root).or_default().push(path.clone()),
            None => no_module.push(path.clone()),
        }
    }
    (grouped, no_module)
}

fn nearest_module_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|dir| dir.join("go.mod").is_file())
        .map(Path::to_path_buf)
}

/// Load one group of package directories with the loader's working directory
/// pinned to `dir`.
async fn load_fs_group(
    tools: &dyn Toolchain,
    env: &Environ,
    set: &mut PackageSet,
    dir: &Path,
    pkg_dirs: &[PathBuf],
) -> Result<Vec<String>> {
    let mut patterns = Vec::new();
    for pkg_dir in pkg_dirs {
        let rel = pathdiff::diff_paths(pkg_dir, dir).with_context(|| error::LoadSnafu {
            path: pkg_dir.clone(),
            message: format!("not relative to {}", dir.display()),
        })?;
        // `./cmd/foo` rather than `cmd/foo`: a bare pattern would be looked
        // up among the toolchain's registered package roots instead of the
        // directory in front of us.
        patterns.push(format!("./{}", rel.display()));
    }
    let result = tools.load(env, Some(dir), &patterns).await?;
    Ok(absorb_commands(set, result))
}

/// Absorb a load result and return the root ids worth keeping as commands.
fn absorb_commands(set: &mut PackageSet, result: LoadResult) -> Vec<String> {
    let roots = set.absorb(result);
    roots
        .into_iter()
        .filter(|id| set.get(id).is_some_and(keep_command))
        .collect()
}

fn keep_command(pkg: &Package) -> bool {
    if !pkg.errors.is_empty() {
        warn!(
            "Skipping package {} for errors: {}",
            pkg.pkg_path,
            pkg.errors.join("; ")
        );
        false
    } else if pkg.go_files.is_empty() {
        warn!("Skipping package {} because it has no Go files", pkg.pkg_path);
        false
    } else if pkg.name != "main" {
        warn!(
            "Skipping package {} because it is not a command (must be `package main`)",
            pkg.pkg_path
        );
        false
    } else {
        true
    }
}
