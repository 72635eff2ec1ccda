//! Dispatcher synthesis.
//!
//! The dispatcher template is a pinned resource shipped with the engine: a
//! single-file `main` package exposing `Register(name, init, main)` and a
//! `main` that selects a command by invocation name. The emitter only adds
//! an import block and an `init` routine registering every command; any
//! change to the `Register` signature is a coordinated change between the
//! template and this module.

use crate::error::{self, Result};
use crate::loader::base_name;
use snafu::ensure;

const BB_MAIN_TEMPLATE: &str = include_str!("../resources/bbmain.go");

/// Render the dispatcher source with one registration per command import
/// path.
pub(crate) fn create_bb_main(pkg_paths: &[String]) -> Result<String> {
    ensure!(
        BB_MAIN_TEMPLATE.contains("func Register(")
            && BB_MAIN_TEMPLATE.contains("func main("),
        error::InternalInconsistencySnafu {
            message: "dispatcher template does not provide Register and main",
        }
    );
    let insert_at = end_of_package_clause(BB_MAIN_TEMPLATE).ok_or_else(|| {
        error::InternalInconsistencySnafu {
            message: "dispatcher template has no package clause".to_string(),
        }
        .build()
    })?;

    let mut imports = String::from("\nimport (\n");
    let mut registers = String::from("\nfunc init() {\n");
    for pkg_path in pkg_paths {
        let name = base_name(pkg_path);
        let alias = mangle(name);
        imports.push_str(&format!("\t{alias} {pkg_path:?}\n"));
        registers.push_str(&format!(
            "\tRegister({name:?}, {alias}.Init, {alias}.Main)\n"
        ));
    }
    imports.push_str(")\n");
    registers.push_str("}\n");

    let mut out =
        String::with_capacity(BB_MAIN_TEMPLATE.len() + imports.len() + registers.len());
    out.push_str(&BB_MAIN_TEMPLATE[..insert_at]);
    out.push_str(&imports);
    out.push_str(&BB_MAIN_TEMPLATE[insert_at..]);
    out.push_str(&registers);
    Ok(out)
}

/// Command names routinely collide with Go keywords and the template's own
/// identifiers (think of an `init` command), so every alias gets a prefix;
/// characters that cannot appear in an identifier become underscores.
fn mangle(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("mangled{sanitized}")
}

fn end_of_package_clause(src: &str) -> Option<usize> {
    let mut offset = 0;
    for line in src.split_inclusive('\n') {
        if line.starts_with("package ") {
            return Some(offset + line.len());
        }
        offset += line.len();
    }
    None
}
