// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use edge_config::{load_config, GatewayConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Loads and validates the configuration, then prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = load_config(config_path).map_err(|e| {
        let context = match e.subject() {
            Some(subject) => format!("configuration rejected at {subject}"),
            None => "configuration rejected".to_string(),
        };
        BinError::from(e).with_context(context)
    })?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Gateway ID: {}", config.gateway.id);
            println!("  Gateway Name: {}", config.gateway.name);
            println!("  Endpoints: {}", config.endpoints.len());
            println!("  Auto-start: {}", config.auto_start_endpoints().count());
            println!(
                "  Server: {}",
                if config.server.enabled { config.server.uri.as_str() } else { "disabled" }
            );
            println!("  Logging: {} ({})", config.logging.level, config.logging.format);

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", to_json(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "gateway_id": config.gateway.id,
                    "gateway_name": config.gateway.name,
                    "endpoint_count": config.endpoints.len(),
                    "server_enabled": config.server.enabled,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", to_json(&output)?);
        }
    }

    Ok(())
}

fn collect_warnings(config: &GatewayConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.endpoints.is_empty() && !config.server.enabled {
        warnings.push("No endpoints configured and the server is disabled".to_string());
    }
    if config.server.enabled && config.server.namespaces.is_empty() {
        warnings.push("Server enabled without namespaces".to_string());
    }
    warnings
}

fn to_json<T: serde::Serialize>(value: &T) -> BinResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| BinError::output(format!("serialization failed: {e}")))
}
