//! Go toolchain environment configuration.
//!
//! The engine never reads the process environment itself. Callers build an
//! [`Environ`] (the CLI captures one with [`Environ::from_env`]) and pass it
//! down; everything the toolchain sees flows through here.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// The `GO111MODULE` setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleMode {
    On,
    Off,
    #[default]
    Auto,
}

impl FromStr for ModuleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "auto" | "" => Ok(Self::Auto),
            other => Err(format!(
                "invalid module mode '{other}', expected one of on|off|auto"
            )),
        }
    }
}

impl Display for ModuleMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => write!(f, "on"),
            Self::Off => write!(f, "off"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// The environment child Go tool processes run under.
#[derive(Debug, Clone, Default)]
pub struct Environ {
    /// Module system mode, forwarded as `GO111MODULE`.
    pub module_mode: ModuleMode,
    /// Classic-path root, forwarded as `GOPATH`. Only consulted by the
    /// toolchain when the module system is off.
    pub gopath: Option<PathBuf>,
    /// Additional variables passed through to child processes.
    pub env: Vec<(String, String)>,
}

impl Environ {
    /// Capture `GO111MODULE` and `GOPATH` from the process environment.
    ///
    /// This is the one sanctioned place process-wide state enters the
    /// engine; call it at the outermost edge and pass the result down.
    pub fn from_env() -> Self {
        let module_mode = std::env::var("GO111MODULE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let gopath = std::env::var_os("GOPATH").map(PathBuf::from);
        Self {
            module_mode,
            gopath,
            env: Vec::new(),
        }
    }

    /// Environment variables for one toolchain child process.
    pub(crate) fn child_env(&self) -> Vec<(String, String)> {
        let mut vars = vec![("GO111MODULE".to_string(), self.module_mode.to_string())];
        if let Some(gopath) = &self.gopath {
            vars.push(("GOPATH".to_string(), gopath.display().to_string()));
        }
        vars.extend(self.env.iter().cloned());
        vars
    }
}

/// Options for the final compile.
#[derive(Debug, Clone, Default)]
pub struct BuildOpts {
    /// Keep debug symbols in the produced binary.
    pub no_strip: bool,
    /// Create the temporary workspace under this directory instead of the
    /// system temp dir.
    pub workspace_parent: Option<PathBuf>,
}
