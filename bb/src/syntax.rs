//! Span-based syntax facts about Go source files.
//!
//! The metadata loader parses packages with the Go toolchain's own parser
//! and type checker, and reports only what the rewriter needs: byte spans
//! for the handful of syntactic shapes that get rewritten, integer node ids
//! standing in for expression identity, and structural type facts for
//! declarations whose initializer types must be spelled out. Everything
//! else in a file is opaque text, which is what keeps the rewrite
//! non-destructive.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Half-open byte range into a source file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Identity of an expression node, assigned by the loader at parse time.
///
/// Ids are unique within one package. Lifted statements are keyed by node
/// identity rather than text, since textual equality collides on repeated
/// identical initializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

/// One parsed Go source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    /// The file's complete source text.
    pub text: String,
    /// Declared package name.
    pub package_name: String,
    /// Span of the name identifier in the package clause.
    pub package_name_span: Span,
    /// Imports declared by the file.
    #[serde(default)]
    pub imports: Vec<ImportSpec>,
    /// The top-level declarations the rewriter cares about, in source order.
    #[serde(default)]
    pub decls: Vec<Decl>,
    /// Spans of every comment in the file.
    #[serde(default)]
    pub comments: Vec<Span>,
}

impl SourceFile {
    /// Map of import path to local alias, for explicitly aliased imports.
    pub(crate) fn import_aliases(&self) -> HashMap<&str, &str> {
        self.imports
            .iter()
            .filter_map(|imp| imp.alias.as_deref().map(|alias| (imp.path.as_str(), alias)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSpec {
    pub path: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decl {
    Var(VarDecl),
    Func(FuncDecl),
}

/// A top-level `var` declaration: one `var` keyword, one or more specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub specs: Vec<VarSpec>,
}

/// One `names [type] [= values]` spec within a `var` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarSpec {
    pub names: Vec<String>,
    /// Span covering the whole name list.
    pub names_span: Span,
    /// Span of the declared type, when the spec has one.
    pub type_span: Option<Span>,
    /// Right-hand-side expressions, when the spec has initializers.
    #[serde(default)]
    pub values: Vec<Expr>,
}

/// An expression node: its identity and where it sits in the file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
}

/// A top-level function declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    pub name_span: Span,
    /// Methods are never program entries or implicit inits.
    #[serde(default)]
    pub has_receiver: bool,
}

/// Structural type facts, as reported by the toolchain's type checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    Basic {
        name: String,
    },
    Named {
        /// Owning package; `None` for universe-scope types like `error`.
        pkg: Option<TypePkg>,
        name: String,
    },
    Pointer {
        elem: Box<Type>,
    },
    Slice {
        elem: Box<Type>,
    },
    Array {
        #[serde(default)]
        len: u64,
        elem: Box<Type>,
    },
    Map {
        key: Box<Type>,
        value: Box<Type>,
    },
    Chan {
        dir: ChanDir,
        elem: Box<Type>,
    },
    Func {
        #[serde(default)]
        params: Vec<Type>,
        #[serde(default)]
        results: Vec<Type>,
        #[serde(default)]
        variadic: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypePkg {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChanDir {
    Send,
    Recv,
    Both,
}

/// Decides how a named type's package is spelled in one rewritten file.
///
/// Foreign packages render under the file's import alias when one exists,
/// under the package's short name otherwise. The package being rewritten
/// renders with no qualifier at all.
pub(crate) struct Qualifier<'a> {
    pub(crate) aliases: HashMap<&'a str, &'a str>,
    pub(crate) self_path: &'a str,
}

impl Qualifier<'_> {
    fn qualify<'s>(&'s self, pkg: &'s TypePkg) -> &'s str {
        if pkg.path == self.self_path {
            return "";
        }
        self.aliases
            .get(pkg.path.as_str())
            .copied()
            .unwrap_or(&pkg.name)
    }
}

impl Type {
    /// Render the type as Go source, qualifying named types through `q`.
    pub(crate) fn render(&self, q: &Qualifier<'_>) -> String {
        match self {
            Type::Basic { name } => name.clone(),
            Type::Named { pkg, name } => match pkg {
                Some(pkg) => {
                    let qualifier = q.qualify(pkg);
                    if qualifier.is_empty() {
                        name.clone()
                    } else {
                        format!("{qualifier}.{name}")
                    }
                }
                None => name.clone(),
            },
            Type::Pointer { elem } => format!("*{}", elem.render(q)),
            Type::Slice { elem } => format!("[]{}", elem.render(q)),
            Type::Array { len, elem } => format!("[{len}]{}", elem.render(q)),
            Type::Map { key, value } => format!("map[{}]{}", key.render(q), value.render(q)),
            Type::Chan { dir, elem } => match dir {
                ChanDir::Send => format!("chan<- {}", elem.render(q)),
                ChanDir::Recv => format!("<-chan {}", elem.render(q)),
                ChanDir::Both => format!("chan {}", elem.render(q)),
            },
            Type::Func {
                params,
                results,
                variadic,
            } => {
                let mut rendered = Vec::with_capacity(params.len());
                for (i, param) in params.iter().enumerate() {
                    if *variadic && i == params.len() - 1 {
                        // The variadic parameter arrives as a slice.
                        if let Type::Slice { elem } = param {
                            rendered.push(format!("...{}", elem.render(q)));
                            continue;
                        }
                    }
                    rendered.push(param.render(q));
                }
                let params = rendered.join(", ");
                match results.len() {
                    0 => format!("func({params})"),
                    1 => format!("func({params}) {}", results[0].render(q)),
                    _ => {
                        let results: Vec<String> =
                            results.iter().map(|r| r.render(q)).collect();
                        format!("func({params}) ({})", results.join(", "))
                    }
                }
            }
        }
    }
}

/// One text replacement against a file's original text.
#[derive(Debug)]
pub(crate) struct Edit {
    pub(crate) span: Span,
    pub(crate) replacement: String,
}

/// Apply non-overlapping edits to `text`.
///
/// Edits are applied back to front so earlier spans stay valid.
pub(crate) fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    let mut out = text.to_string();
    for edit in edits {
        out.replace_range(edit.span.start..edit.span.end, &edit.replacement);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qualifier<'a>(aliases: &[(&'a str, &'a str)], self_path: &'a str) -> Qualifier<'a> {
        Qualifier {
            aliases: aliases.iter().copied().collect(),
            self_path,
        }
    }

    #[test]
    fn render_uses_import_alias() {
        let ty = Type::Named {
            pkg: Some(TypePkg {
                path: "github.com/u-root/u-root/pkg/uio".into(),
                name: "uio".into(),
            }),
            name: "Reader".into(),
        };
        let q = qualifier(&[("github.com/u-root/u-root/pkg/uio", "myuio")], "cmd/foo");
        assert_eq!(ty.render(&q), "myuio.Reader");
    }

    #[test]
    fn render_self_package_unqualified() {
        let ty = Type::Pointer {
            elem: Box::new(Type::Named {
                pkg: Some(TypePkg {
                    path: "cmd/foo".into(),
                    name: "foo".into(),
                }),
                name: "state".into(),
            }),
        };
        let q = qualifier(&[], "cmd/foo");
        assert_eq!(ty.render(&q), "*state");
    }

    #[test]
    fn render_falls_back_to_short_name() {
        let ty = Type::Map {
            key: Box::new(Type::Basic { name: "string".into() }),
            value: Box::new(Type::Named {
                pkg: Some(TypePkg {
                    path: "net/http".into(),
                    name: "http".into(),
                }),
                name: "Handler".into(),
            }),
        };
        let q = qualifier(&[], "cmd/foo");
        assert_eq!(ty.render(&q), "map[string]http.Handler");
    }

    #[test]
    fn render_compound_types() {
        let q = qualifier(&[], "cmd/foo");
        let slice = Type::Slice {
            elem: Box::new(Type::Basic { name: "byte".into() }),
        };
        assert_eq!(slice.render(&q), "[]byte");

        let arr = Type::Array {
            len: 4,
            elem: Box::new(Type::Basic { name: "int".into() }),
        };
        assert_eq!(arr.render(&q), "[4]int");

        let recv = Type::Chan {
            dir: ChanDir::Recv,
            elem: Box::new(Type::Basic { name: "error".into() }),
        };
        assert_eq!(recv.render(&q), "<-chan error");

        let func = Type::Func {
            params: vec![
                Type::Basic { name: "string".into() },
                Type::Slice {
                    elem: Box::new(Type::Basic { name: "int".into() }),
                },
            ],
            results: vec![
                Type::Basic { name: "int".into() },
                Type::Named { pkg: None, name: "error".into() },
            ],
            variadic: true,
        };
        assert_eq!(func.render(&q), "func(string, ...int) (int, error)");
    }

    #[test]
    fn edits_apply_back_to_front() {
        let text = "package main\n\nfunc main() {}\n";
        let edits = vec![
            Edit {
                span: Span { start: 8, end: 12 },
                replacement: "foo".into(),
            },
            Edit {
                span: Span { start: 19, end: 23 },
                replacement: "Main".into(),
            },
        ];
        assert_eq!(apply_edits(text, edits), "package foo\n\nfunc Main() {}\n");
    }

    #[test]
    fn zero_width_edit_inserts() {
        let text = "var x\n";
        let edits = vec![Edit {
            span: Span { start: 5, end: 5 },
            replacement: " int".into(),
        }];
        assert_eq!(apply_edits(text, edits), "var x int\n");
    }
}
