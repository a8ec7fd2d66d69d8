// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subcommand handlers. `run` is the only one that starts the runtime.

mod run;
mod validate;
mod version;

pub use run::run;
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Dispatches to the handler for the parsed subcommand.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run(&cli, args).await,
        Commands::Validate(args) => validate(&cli, args),
        Commands::Version(args) => version(args),
    }
}
