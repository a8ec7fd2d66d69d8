// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Structural validation of outbound messages.
//!
//! Rules are checked in order and the first violation is returned:
//!
//! 1. command type and message kind are present
//! 2. every request carries node info
//! 3. the kind matches the populated request fields and a batch is not empty
//! 4. alias-addressed commands carry a value alias on every request
//! 5. method invocation and subscription use a single request
//! 6. method invocation carries a payload
//! 7. subscription carries a descriptor with a sub-type
//! 8. browse carries a browse parameter block
//! 9. endpoint-wide commands carry endpoint info

use edge_core::{CommandType, Message, MessageKind, ValidationError};

/// Signature of a message validator. [`validate`] is the default.
pub type MessageValidator = fn(&Message) -> Result<(), ValidationError>;

/// Validates an outbound message.
///
/// # Examples
///
/// ```
/// use edge_core::{CommandType, EndpointInfo, Message, Request};
/// use edge_opcua::validation::validate;
///
/// let ok = Message::single(CommandType::Read, EndpointInfo::new("X"), Request::new("Temp1"));
/// assert!(validate(&ok).is_ok());
///
/// let bad = Message::default();
/// assert!(validate(&bad).is_err());
/// ```
pub fn validate(message: &Message) -> Result<(), ValidationError> {
    let command = message.command.ok_or(ValidationError::MissingCommand)?;
    let kind = message.kind.ok_or(ValidationError::MissingKind)?;

    let requests = message.outbound_requests();
    if let Some(request) = requests.iter().find(|r| r.node_info.is_none()) {
        return Err(ValidationError::MissingNodeInfo {
            request_id: request.request_id.clone(),
        });
    }

    let populated = match kind {
        MessageKind::SendRequest => message.request.is_some() && message.requests.is_none(),
        MessageKind::SendRequests => message.request.is_none() && message.requests.is_some(),
        _ => false,
    };
    if !populated {
        return Err(ValidationError::KindMismatch { kind });
    }
    if requests.is_empty() {
        return Err(ValidationError::EmptyBatch { command });
    }

    if command.requires_value_alias() && requests.iter().any(|r| r.value_alias().is_none()) {
        return Err(ValidationError::MissingValueAlias { command });
    }

    if command.requires_single_request() && kind != MessageKind::SendRequest {
        return Err(ValidationError::SingleRequestRequired { command });
    }

    match command {
        CommandType::InvokeMethod => {
            if requests.iter().any(|r| r.value.is_none()) {
                return Err(ValidationError::MissingPayload { command });
            }
        }
        CommandType::Subscribe => {
            let described = requests
                .iter()
                .all(|r| r.sub_request.as_ref().is_some_and(|s| s.sub_type.is_some()));
            if !described {
                return Err(ValidationError::MissingSubscription { command });
            }
        }
        CommandType::Browse => {
            if message.browse_parameter.is_none() {
                return Err(ValidationError::MissingBrowseParameter { command });
            }
        }
        _ => {}
    }

    if command.is_endpoint_wide() && message.endpoint_info.is_none() {
        return Err(ValidationError::MissingEndpoint { command });
    }

    Ok(())
}
