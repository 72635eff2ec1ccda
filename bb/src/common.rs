use crate::error::{self, Result};
use log::debug;
use std::process::Output;
use tokio::process::Command;

/// Run a command to completion and capture its output. Failure to start the
/// process is a toolchain error; a non-zero exit is left for the caller to
/// judge, since the compiler's stderr must be surfaced verbatim while other
/// tools get summarized.
pub(crate) async fn output(cmd: &mut Command) -> Result<Output> {
    debug!("Running: {:?}", cmd);
    let message = format!("Unable to start command {cmd:?}");
    cmd.output().await.map_err(|err| {
        error::ToolchainSnafu {
            message: format!("{message}: {err}"),
        }
        .build()
    })
}
