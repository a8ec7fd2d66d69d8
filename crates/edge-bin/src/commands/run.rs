// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::logging::init_logging;
use crate::runtime::RuntimeBuilder;

/// Starts the gateway and blocks until shutdown.
///
/// Logging is installed after the configuration loads, so load errors are
/// reported on stderr only.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let runtime = RuntimeBuilder::new()
        .config_path(&cli.config)
        .skip_connect(args.skip_connect)
        .build()?;

    let config = runtime.config();
    init_logging(
        cli.effective_log_level(&config.logging),
        cli.effective_log_format(&config.logging),
    )?;
    info!(
        path = %cli.config.display(),
        endpoints = config.endpoints.len(),
        server = config.server.enabled,
        skip_connect = args.skip_connect,
        "Configuration loaded"
    );

    runtime.run().await
}
