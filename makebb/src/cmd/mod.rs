use anyhow::{Context, Result};
use bb::{BuildOpts, Environ, GoCli, ModuleMode};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::path::PathBuf;

const DEFAULT_LEVEL_FILTER: LevelFilter = LevelFilter::Info;

/// Compile many Go commands into one busybox-style binary.
#[derive(Debug, Parser)]
#[clap(about, long_about = None, version)]
pub(crate) struct Args {
    /// Set the logging level. One of [off|error|warn|info|debug|trace]. You
    /// can also leave this unset and use the RUST_LOG env variable. See
    /// https://github.com/rust-cli/env_logger/
    #[clap(long = "log-level")]
    pub(crate) log_level: Option<LevelFilter>,

    /// Path where the fused binary is written.
    #[clap(short = 'o', long = "output", default_value = "bb")]
    output: PathBuf,

    /// Keep debug symbols in the binary.
    #[clap(long = "no-strip")]
    no_strip: bool,

    /// Override the module system mode (GO111MODULE). One of [on|off|auto].
    #[clap(long = "go111module")]
    module_mode: Option<ModuleMode>,

    /// Create the temporary build workspace under this directory; handy for
    /// inspecting the tree a failed build leaves behind.
    #[clap(long = "tmp-dir")]
    tmp_dir: Option<PathBuf>,

    /// Command directories or Go import paths to fuse.
    #[clap(required = true)]
    paths: Vec<String>,
}

/// Entrypoint for the `makebb` command line program.
pub(super) async fn run(args: Args) -> Result<()> {
    let mut env = Environ::from_env();
    if let Some(mode) = args.module_mode {
        env.module_mode = mode;
    }

    let tools = GoCli::from_path()
        .await
        .context("Unable to locate the Go toolchain")?;
    let opts = BuildOpts {
        no_strip: args.no_strip,
        workspace_parent: args.tmp_dir,
    };
    bb::build_busybox(&tools, &env, &args.paths, &opts, &args.output)
        .await
        .context(format!(
            "Unable to build a busybox at '{}'",
            args.output.display()
        ))
}

/// use `level` if present, or else use `RUST_LOG` if present, or else use a
/// default.
pub(super) fn init_logger(level: Option<LevelFilter>) {
    match (std::env::var(env_logger::DEFAULT_FILTER_ENV).ok(), level) {
        (Some(_), None) => {
            // RUST_LOG exists and level does not; use the environment variable.
            Builder::from_default_env().init();
        }
        _ => {
            // use provided log level or default for this crate and the
            // engine only.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level.unwrap_or(DEFAULT_LEVEL_FILTER))
                .filter(Some("bb"), level.unwrap_or(DEFAULT_LEVEL_FILTER))
                .init();
        }
    }
}
