// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Endpoint URI parsing for GET_ENDPOINTS.
//!
//! `opc.tcp://10.0.0.5:12686/edge-server/line/1` becomes
//! `{ address: "10.0.0.5", port: 12686, server_name: "edge-server",
//! path: ["line", "1"] }`.
//!
//! Endpoint descriptions returned for that URI may point at other hosts,
//! for example a discovery server listing the servers it knows.
//! [`announced_devices`] turns those into devices of their own.

use edge_core::Device;
use tracing::debug;
use url::Url;

use crate::error::{DiscoveryError, OpcUaResult};

/// URI scheme of OPC UA TCP endpoints.
pub const OPC_TCP_SCHEME: &str = "opc.tcp";

/// Port used when the URI names none.
pub const DEFAULT_PORT: u16 = 4840;

/// Parses an endpoint URI into a device descriptor with no endpoints.
///
/// # Examples
///
/// ```
/// use edge_opcua::discovery::parse_endpoint_uri;
///
/// let device = parse_endpoint_uri("opc.tcp://10.0.0.5:12686/edge-server").unwrap();
/// assert_eq!(device.address, "10.0.0.5");
/// assert_eq!(device.port, 12686);
/// assert_eq!(device.server_name, "edge-server");
/// ```
pub fn parse_endpoint_uri(uri: &str) -> OpcUaResult<Device> {
    let parsed = Url::parse(uri.trim()).map_err(|e| DiscoveryError::malformed(uri, e.to_string()))?;

    if parsed.scheme() != OPC_TCP_SCHEME {
        return Err(DiscoveryError::malformed(
            uri,
            format!("scheme must be {OPC_TCP_SCHEME}, got {}", parsed.scheme()),
        )
        .into());
    }

    let address = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(DiscoveryError::malformed(uri, "missing host").into()),
    };

    let mut segments = parsed
        .path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into_iter();
    let server_name = segments.next().unwrap_or_default();

    Ok(Device {
        address,
        port: parsed.port().unwrap_or(DEFAULT_PORT),
        server_name,
        path: segments.collect(),
        endpoints: Vec::new(),
    })
}

/// Groups the endpoint descriptions of `queried` that name another
/// address, port or server into one device each, in first-seen order.
pub fn announced_devices(queried: &Device) -> Vec<Device> {
    let mut announced: Vec<Device> = Vec::new();
    for description in &queried.endpoints {
        let found = match parse_endpoint_uri(&description.endpoint_url) {
            Ok(found) => found,
            Err(e) => {
                debug!(endpoint_url = %description.endpoint_url, error = %e, "Endpoint URL skipped");
                continue;
            }
        };
        if same_device(&found, queried) {
            continue;
        }
        match announced.iter_mut().find(|d| same_device(d, &found)) {
            Some(device) => device.endpoints.push(description.clone()),
            None => announced.push(Device {
                endpoints: vec![description.clone()],
                ..found
            }),
        }
    }
    announced
}

fn same_device(a: &Device, b: &Device) -> bool {
    a.address == b.address && a.port == b.port && a.server_name == b.server_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpcUaError;

    #[test]
    fn test_full_uri() {
        let device = parse_endpoint_uri("opc.tcp://10.0.0.5:12686/edge-server").unwrap();
        assert_eq!(device.address, "10.0.0.5");
        assert_eq!(device.port, 12686);
        assert_eq!(device.server_name, "edge-server");
        assert!(device.path.is_empty());
        assert!(device.endpoints.is_empty());
    }

    #[test]
    fn test_extra_path_segments() {
        let device = parse_endpoint_uri("opc.tcp://plant.local:4841/srv/line/1/").unwrap();
        assert_eq!(device.address, "plant.local");
        assert_eq!(device.server_name, "srv");
        assert_eq!(device.path, vec!["line".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_defaults_when_parts_missing() {
        let device = parse_endpoint_uri("opc.tcp://10.0.0.5").unwrap();
        assert_eq!(device.port, DEFAULT_PORT);
        assert_eq!(device.server_name, "");

        let device = parse_endpoint_uri("opc.tcp://10.0.0.5:4840/").unwrap();
        assert_eq!(device.server_name, "");
    }

    #[test]
    fn test_announced_devices_group_other_hosts() {
        use edge_core::EndpointDescription;

        let mut queried = parse_endpoint_uri("opc.tcp://10.0.0.5:4840/lds").unwrap();
        queried.endpoints = vec![
            EndpointDescription::unsecured("opc.tcp://10.0.0.5:4840/lds"),
            EndpointDescription::unsecured("opc.tcp://10.0.0.7:4841/plc"),
            EndpointDescription::unsecured("not a url"),
            EndpointDescription::unsecured("opc.tcp://10.0.0.7:4841/plc/"),
            EndpointDescription::unsecured("opc.tcp://10.0.0.8/press"),
        ];

        let announced = announced_devices(&queried);
        assert_eq!(announced.len(), 2);
        assert_eq!(announced[0].address, "10.0.0.7");
        assert_eq!(announced[0].port, 4841);
        assert_eq!(announced[0].server_name, "plc");
        assert_eq!(announced[0].endpoints.len(), 2);
        assert_eq!(announced[1].address, "10.0.0.8");
        assert_eq!(announced[1].port, DEFAULT_PORT);
        assert_eq!(announced[1].endpoints.len(), 1);
    }

    #[test]
    fn test_no_announced_devices_for_own_endpoints() {
        let mut queried = parse_endpoint_uri("opc.tcp://10.0.0.5:12686/edge-server").unwrap();
        queried.endpoints = vec![edge_core::EndpointDescription::unsecured(
            "opc.tcp://10.0.0.5:12686/edge-server",
        )];
        assert!(announced_devices(&queried).is_empty());
    }

    #[test]
    fn test_malformed_uris() {
        for uri in ["", "not a uri", "http://10.0.0.5:80/x", "opc.tcp:///path", "opc.tcp://h:99999/x"] {
            let err = parse_endpoint_uri(uri).unwrap_err();
            assert!(
                matches!(err, OpcUaError::Discovery(DiscoveryError::MalformedUri { .. })),
                "{uri}: {err}"
            );
        }
    }
}
