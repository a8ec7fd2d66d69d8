// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! edge-gateway entry point.

use edge_bin::cli::Cli;
use edge_bin::commands::execute;
use edge_bin::error::report_error_and_exit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    if let Err(error) = execute(cli).await {
        report_error_and_exit(error);
    }
}
