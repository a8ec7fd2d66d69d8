// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `version` command.

use serde::Serialize;

use edge_opcua::SecurityPolicy;

use crate::cli::{OutputFormat, VersionArgs};
use crate::error::{BinError, BinResult};

/// What the running build reports about itself.
#[derive(Debug, Serialize)]
struct BuildReport {
    gateway: &'static str,
    crates: Vec<(&'static str, &'static str)>,
    security_policies: Vec<String>,
    arch: &'static str,
    os: &'static str,
}

impl BuildReport {
    fn collect() -> Self {
        let security_policies = [
            SecurityPolicy::None,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ]
        .iter()
        .map(|p| p.name().to_string())
        .collect();

        Self {
            gateway: crate::VERSION,
            crates: vec![
                (edge_core::NAME, edge_core::VERSION),
                (edge_opcua::NAME, edge_opcua::VERSION),
                (edge_config::NAME, edge_config::VERSION),
                (crate::NAME, crate::VERSION),
            ],
            security_policies,
            arch: std::env::consts::ARCH,
            os: std::env::consts::OS,
        }
    }

    fn render_text(&self) -> String {
        let mut out = format!("edge-gateway {} ({}/{})\n", self.gateway, self.os, self.arch);
        for (name, version) in &self.crates {
            out.push_str(&format!("  {name:<12} {version}\n"));
        }
        out.push_str(&format!("  security     {}\n", self.security_policies.join(", ")));
        out
    }
}

/// Prints the build report.
pub fn version(args: VersionArgs) -> BinResult<()> {
    let report = BuildReport::collect();
    match args.format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| BinError::output(format!("serialization failed: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}
