/*!

Fixtures and fakes shared by the unit tests. This module is only compiled
for `cfg(test)`, which is accomplished at its declaration in `lib.rs`.

!*/

#![allow(unused)]

use crate::error::{self, Result};
use crate::golang::{BuildOpts, Environ};
use crate::loader::{LoadResult, Module, Package, TypeInfo};
use crate::syntax::{
    Decl, Expr, FuncDecl, ImportSpec, NodeId, SourceFile, Span, VarDecl, VarSpec,
};
use crate::tools::Toolchain;
use async_trait::async_trait;
use snafu::ensure;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Builds a Go source file and its span facts in lockstep, so tests never
/// hand-count byte offsets.
pub(crate) struct FileBuilder {
    path: PathBuf,
    text: String,
    package_name: String,
    package_name_span: Span,
    imports: Vec<ImportSpec>,
    decls: Vec<Decl>,
    comments: Vec<Span>,
    next_node: u32,
}

impl FileBuilder {
    pub(crate) fn new(path: &str, package_name: &str) -> Self {
        let mut text = String::from("package ");
        let start = text.len();
        text.push_str(package_name);
        let package_name_span = Span {
            start,
            end: text.len(),
        };
        text.push('\n');
        Self {
            path: PathBuf::from(path),
            text,
            package_name: package_name.to_string(),
            package_name_span,
            imports: Vec::new(),
            decls: Vec::new(),
            comments: Vec::new(),
            next_node: 0,
        }
    }

    pub(crate) fn import(&mut self, alias: Option<&str>, path: &str) {
        match alias {
            Some(alias) => self.text.push_str(&format!("import {alias} {path:?}\n")),
            None => self.text.push_str(&format!("import {path:?}\n")),
        }
        self.imports.push(ImportSpec {
            path: path.to_string(),
            alias: alias.map(str::to_string),
        });
    }

    /// `var <names> [<type>] [= <values>]`, one spec.
    pub(crate) fn var_init(
        &mut self,
        names: &[&str],
        typ: Option<&str>,
        values: &[&str],
    ) -> Vec<NodeId> {
        self.text.push_str("var ");
        let names_start = self.text.len();
        self.text.push_str(&names.join(", "));
        let names_span = Span {
            start: names_start,
            end: self.text.len(),
        };
        let type_span = typ.map(|typ| {
            self.text.push(' ');
            let start = self.text.len();
            self.text.push_str(typ);
            Span {
                start,
                end: self.text.len(),
            }
        });
        let mut exprs = Vec::new();
        let mut ids = Vec::new();
        if !values.is_empty() {
            self.text.push_str(" = ");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    self.text.push_str(", ");
                }
                let start = self.text.len();
                self.text.push_str(value);
                let id = NodeId(self.next_node);
                self.next_node += 1;
                exprs.push(Expr {
                    id,
                    span: Span {
                        start,
                        end: self.text.len(),
                    },
                });
                ids.push(id);
            }
        }
        self.text.push('\n');
        self.decls.push(Decl::Var(VarDecl {
            specs: vec![VarSpec {
                names: names.iter().map(|n| n.to_string()).collect(),
                names_span,
                type_span,
                values: exprs,
            }],
        }));
        ids
    }

    pub(crate) fn func(&mut self, name: &str) {
        self.text.push_str("func ");
        let start = self.text.len();
        self.text.push_str(name);
        let name_span = Span {
            start,
            end: self.text.len(),
        };
        self.text.push_str("() {\n}\n");
        self.decls.push(Decl::Func(FuncDecl {
            name: name.to_string(),
            name_span,
            has_receiver: false,
        }));
    }

    pub(crate) fn method(&mut self, recv: &str, recv_type: &str, name: &str) {
        self.text.push_str(&format!("func ({recv} {recv_type}) "));
        let start = self.text.len();
        self.text.push_str(name);
        let name_span = Span {
            start,
            end: self.text.len(),
        };
        self.text.push_str("() {\n}\n");
        self.decls.push(Decl::Func(FuncDecl {
            name: name.to_string(),
            name_span,
            has_receiver: true,
        }));
    }

    pub(crate) fn comment(&mut self, text: &str) {
        let start = self.text.len();
        self.text.push_str(text);
        self.comments.push(Span {
            start,
            end: self.text.len(),
        });
        self.text.push('\n');
    }

    pub(crate) fn build(self) -> SourceFile {
        SourceFile {
            path: self.path,
            text: self.text,
            package_name: self.package_name,
            package_name_span: self.package_name_span,
            imports: self.imports,
            decls: self.decls,
            comments: self.comments,
        }
    }
}

/// A minimal in-memory source file; enough for loader and planner tests
/// that never look inside.
pub(crate) fn source_file(name: &str, package_name: &str) -> SourceFile {
    let mut fb = FileBuilder::new(&format!("/fixtures/{name}"), package_name);
    fb.func("main");
    fb.build()
}

/// Write `text` to `dir/name` and scan it into a [`SourceFile`].
///
/// The scan covers what builder-level fixtures use: the package clause and
/// top-level `func` declarations without receivers.
pub(crate) fn source_file_on_disk(dir: &Path, name: &str, text: &str) -> SourceFile {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, text).unwrap();

    let package_start = text.find("package ").unwrap() + "package ".len();
    let package_end = text[package_start..]
        .find(char::is_whitespace)
        .map_or(text.len(), |i| package_start + i);
    let package_name = &text[package_start..package_end];

    let mut decls = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if let Some(rest) = line.strip_prefix("func ") {
            if !rest.starts_with('(') {
                let name_start = offset + "func ".len();
                let name_len = rest.find('(').unwrap_or(rest.len());
                decls.push(Decl::Func(FuncDecl {
                    name: rest[..name_len].to_string(),
                    name_span: Span {
                        start: name_start,
                        end: name_start + name_len,
                    },
                    has_receiver: false,
                }));
            }
        }
        offset += line.len();
    }

    SourceFile {
        path,
        text: text.to_string(),
        package_name: package_name.to_string(),
        package_name_span: Span {
            start: package_start,
            end: package_end,
        },
        imports: Vec::new(),
        decls,
        comments: Vec::new(),
    }
}

/// A bare package record.
pub(crate) fn package(id: &str, name: &str, pkg_path: &str, files: Vec<SourceFile>) -> Package {
    Package {
        id: id.to_string(),
        name: name.to_string(),
        pkg_path: pkg_path.to_string(),
        go_files: files,
        other_files: Vec::new(),
        imports: Vec::new(),
        module: None,
        errors: Vec::new(),
        types: TypeInfo::default(),
    }
}

/// A command package (`package main`).
pub(crate) fn command_package(id: &str, pkg_path: &str, file: SourceFile) -> Package {
    package(id, "main", pkg_path, vec![file])
}

/// Create `<parent>/<path>` with a go.mod inside and return its descriptor.
pub(crate) fn module_on_disk(parent: &Path, path: &str) -> Module {
    let dir = parent.join(path);
    fs::create_dir_all(&dir).unwrap();
    let go_mod = dir.join("go.mod");
    fs::write(&go_mod, format!("module {path}\n")).unwrap();
    Module {
        path: path.to_string(),
        dir,
        go_mod,
        version: None,
        replace: None,
    }
}

/// In-memory stand-in for the Go toolchain: serves canned load results in
/// order, formats by stamping a marker, and "compiles" by writing a marker
/// file (or failing with `build_error`).
#[derive(Default)]
pub(crate) struct FakeToolchain {
    loads: Mutex<Vec<LoadResult>>,
    calls: Mutex<Vec<(Option<PathBuf>, Vec<String>)>>,
    pub(crate) build_error: Option<String>,
    last_build_env: Mutex<Option<Environ>>,
}

impl FakeToolchain {
    pub(crate) fn with_loads(loads: Vec<LoadResult>) -> Self {
        Self {
            loads: Mutex::new(loads),
            ..Self::default()
        }
    }

    /// The `(dir, patterns)` of every load call, in order.
    pub(crate) fn load_calls(&self) -> Vec<(Option<PathBuf>, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_build_env(&self) -> Option<Environ> {
        self.last_build_env.lock().unwrap().clone()
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn load(
        &self,
        _env: &Environ,
        dir: Option<&Path>,
        patterns: &[String],
    ) -> Result<LoadResult> {
        self.calls
            .lock()
            .unwrap()
            .push((dir.map(Path::to_path_buf), patterns.to_vec()));
        let mut loads = self.loads.lock().unwrap();
        ensure!(
            !loads.is_empty(),
            error::ToolchainSnafu {
                message: format!("unexpected load call for {patterns:?}"),
            }
        );
        Ok(loads.remove(0))
    }

    async fn format(&self, src: &str) -> Result<String> {
        Ok(format!("{src}// gofmt\n"))
    }

    async fn build(
        &self,
        env: &Environ,
        _dir: &Path,
        _opts: &BuildOpts,
        output: &Path,
    ) -> Result<()> {
        *self.last_build_env.lock().unwrap() = Some(env.clone());
        if let Some(stderr) = &self.build_error {
            return error::BuildSnafu {
                stderr: stderr.clone(),
            }
            .fail();
        }
        fs::write(output, b"fused binary").map_err(|source| error::Error::Write {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}
