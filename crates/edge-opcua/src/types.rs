// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA addressing and security types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigurationError, OpcUaError};

// =============================================================================
// NodeId
// =============================================================================

/// Identifier part of a [`NodeId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NodeIdentifier {
    /// Numeric identifier.
    Numeric(u32),
    /// String identifier.
    String(String),
    /// GUID identifier.
    Guid(Uuid),
}

/// An address-space node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Namespace index (0 is the standard namespace).
    pub namespace_index: u16,
    /// The identifier.
    pub identifier: NodeIdentifier,
}

impl NodeId {
    /// Creates a numeric node id.
    ///
    /// # Examples
    ///
    /// ```
    /// use edge_opcua::types::NodeId;
    ///
    /// let node = NodeId::numeric(0, 85);
    /// assert_eq!(node.to_string(), "i=85");
    /// ```
    #[inline]
    pub fn numeric(namespace_index: u16, value: u32) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::Numeric(value),
        }
    }

    /// Creates a string node id.
    pub fn string(namespace_index: u16, value: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: NodeIdentifier::String(value.into()),
        }
    }

    /// The standard Root folder.
    pub fn root_folder() -> Self {
        Self::numeric(0, well_known::ROOT_FOLDER)
    }

    /// The standard Objects folder.
    pub fn objects_folder() -> Self {
        Self::numeric(0, well_known::OBJECTS_FOLDER)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index != 0 {
            write!(f, "ns={};", self.namespace_index)?;
        }
        match &self.identifier {
            NodeIdentifier::Numeric(v) => write!(f, "i={}", v),
            NodeIdentifier::String(v) => write!(f, "s={}", v),
            NodeIdentifier::Guid(v) => write!(f, "g={}", v),
        }
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    /// Parses `ns=2;i=1001`, `ns=2;s=Temp`, `ns=1;g=<uuid>`, `i=85` or `s=Temp`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid =
            |reason: &str| OpcUaError::from(ConfigurationError::invalid("node_id", format!("'{s}': {reason}")));

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("missing identifier after namespace"))?;
                let ns: u16 = ns.parse().map_err(|_| invalid("invalid namespace index"))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            NodeIdentifier::Numeric(id.parse().map_err(|_| invalid("invalid numeric identifier"))?)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(invalid("empty string identifier"));
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            NodeIdentifier::Guid(Uuid::parse_str(id).map_err(|_| invalid("invalid GUID"))?)
        } else {
            return Err(invalid("unknown identifier type"));
        };

        Ok(Self {
            namespace_index,
            identifier,
        })
    }
}

/// Numeric ids of standard nodes.
pub mod well_known {
    /// Root folder.
    pub const ROOT_FOLDER: u32 = 84;
    /// Objects folder.
    pub const OBJECTS_FOLDER: u32 = 85;
    /// Types folder.
    pub const TYPES_FOLDER: u32 = 86;
    /// Views folder.
    pub const VIEWS_FOLDER: u32 = 87;
    /// Server object.
    pub const SERVER: u32 = 2253;

    /// Alias of the well-known endpoint discovery provider.
    pub const DISCOVERY_PROVIDER: &str = "/discovery";
    /// Alias of the well-known group provider.
    pub const GROUP_PROVIDER: &str = "/group";
}

// =============================================================================
// SecurityMode
// =============================================================================

/// Message security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Neither signed nor encrypted.
    #[default]
    None,
    /// Signed.
    Sign,
    /// Signed and encrypted.
    SignAndEncrypt,
}

impl SecurityMode {
    /// Returns the mode name as it appears in endpoint descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::SignAndEncrypt => "SignAndEncrypt",
        }
    }

    /// Returns `true` if messages are signed.
    pub fn is_signed(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" | "nosecurity" => Ok(Self::None),
            "sign" | "signed" => Ok(Self::Sign),
            "signandencrypt" | "signencrypt" | "encrypted" => Ok(Self::SignAndEncrypt),
            _ => Err(ConfigurationError::invalid("security_mode", s).into()),
        }
    }
}

// =============================================================================
// SecurityPolicy
// =============================================================================

/// Security policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security.
    #[default]
    None,
    /// Basic128Rsa15 (deprecated).
    Basic128Rsa15,
    /// Basic256 (deprecated).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
    /// Aes128_Sha256_RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256_Sha256_RsaPss.
    Aes256Sha256RsaPss,
    /// A policy URI this gateway does not name.
    Other(String),
}

const POLICY_PREFIX: &str = "http://opcfoundation.org/UA/SecurityPolicy#";

impl SecurityPolicy {
    /// Returns the short policy name.
    pub fn name(&self) -> &str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128_Sha256_RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256_Sha256_RsaPss",
            Self::Other(uri) => uri.rsplit('#').next().unwrap_or(uri),
        }
    }

    /// Returns the policy URI.
    pub fn uri(&self) -> String {
        match self {
            Self::Other(uri) => uri.clone(),
            known => format!("{POLICY_PREFIX}{}", known.name()),
        }
    }

    /// Parses a policy URI; unknown URIs are kept verbatim.
    pub fn from_uri(uri: &str) -> Self {
        match uri.strip_prefix(POLICY_PREFIX) {
            Some("None") => Self::None,
            Some("Basic128Rsa15") => Self::Basic128Rsa15,
            Some("Basic256") => Self::Basic256,
            Some("Basic256Sha256") => Self::Basic256Sha256,
            Some("Aes128_Sha256_RsaOaep") => Self::Aes128Sha256RsaOaep,
            Some("Aes256_Sha256_RsaPss") => Self::Aes256Sha256RsaPss,
            _ => Self::Other(uri.to_string()),
        }
    }

    /// Returns `true` if this policy requires a client certificate.
    pub fn requires_certificate(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::SECURITY_POLICY_NONE_URI;

    #[test]
    fn test_node_id_parse_and_display() {
        let node: NodeId = "ns=2;s=Temp1".parse().unwrap();
        assert_eq!(node, NodeId::string(2, "Temp1"));
        assert_eq!(node.to_string(), "ns=2;s=Temp1");

        let node: NodeId = "i=85".parse().unwrap();
        assert_eq!(node, NodeId::objects_folder());
    }

    #[test]
    fn test_node_id_rejects_garbage() {
        assert!("Temp1".parse::<NodeId>().is_err());
        assert!("ns=x;i=1".parse::<NodeId>().is_err());
        assert!("ns=2".parse::<NodeId>().is_err());
        assert!("s=".parse::<NodeId>().is_err());
    }

    #[test]
    fn test_security_policy_uri_roundtrip() {
        assert_eq!(SecurityPolicy::None.uri(), SECURITY_POLICY_NONE_URI);
        assert_eq!(
            SecurityPolicy::from_uri("http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256"),
            SecurityPolicy::Basic256Sha256
        );
        let other = SecurityPolicy::from_uri("urn:custom#Mine");
        assert_eq!(other.name(), "Mine");
        assert!(other.requires_certificate());
    }

    #[test]
    fn test_security_mode_parse() {
        assert_eq!("sign-and-encrypt".parse::<SecurityMode>().unwrap(), SecurityMode::SignAndEncrypt);
        assert!("bogus".parse::<SecurityMode>().is_err());
    }
}
