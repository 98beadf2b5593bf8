//! AsyncAPI 3.x parser.
//!
//! AsyncAPI 3.x splits channels (name -> address + messages) from operations
//! (ID -> action + channel ref). Both maps are canonical-key namespaces for
//! the merger, so both are lifted out; channel internals beyond `address`
//! and `messages` stay raw.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{AsyncApiSpec, AsyncComponents, AsyncOperation, Channel, Protocol};
use crate::util::{
    cloned_map, collect_extensions, optional_object, parse_info, required_object, root_object,
};

const KNOWN_ROOT: &[&str] = &[
    "asyncapi",
    "info",
    "servers",
    "channels",
    "operations",
    "components",
];

const PROTOCOL: Protocol = Protocol::AsyncApi;

/// Parse an AsyncAPI 3.x document.
pub fn parse(document: &Value) -> Result<AsyncApiSpec, ParseError> {
    let root = root_object(document, PROTOCOL)?;

    let version = root
        .get("asyncapi")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ParseError::malformed(PROTOCOL, "missing 'asyncapi' version field"))?;
    if !version.starts_with("3.") {
        return Err(ParseError::UnsupportedVersion {
            protocol: PROTOCOL,
            version: version.to_string(),
        });
    }

    let info = parse_info(root, PROTOCOL, true)?;

    let servers = cloned_map(root, "servers", PROTOCOL)?;

    let channels_obj = required_object(root, "channels", PROTOCOL)?;
    let mut channels = BTreeMap::new();
    for (name, value) in channels_obj {
        let channel = value.as_object().ok_or_else(|| {
            ParseError::malformed(PROTOCOL, format!("channel '{}' must be an object", name))
        })?;
        channels.insert(name.clone(), parse_channel(channel, name)?);
    }

    let mut operations = BTreeMap::new();
    if let Some(ops) = optional_object(root, "operations", PROTOCOL)? {
        for (id, value) in ops {
            let op = value.as_object().ok_or_else(|| {
                ParseError::malformed(PROTOCOL, format!("operation '{}' must be an object", id))
            })?;
            operations.insert(id.clone(), parse_operation(op, id)?);
        }
    }

    let components = parse_components(root)?;

    Ok(AsyncApiSpec {
        version: version.to_string(),
        info,
        servers,
        channels,
        operations,
        components,
        extensions: collect_extensions(root, KNOWN_ROOT),
    })
}

fn parse_channel(channel: &Map<String, Value>, name: &str) -> Result<Channel, ParseError> {
    let address = match channel.get("address") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) => None,
        Some(_) => {
            return Err(ParseError::malformed(
                PROTOCOL,
                format!("channel '{}' address must be a string", name),
            ))
        }
    };

    Ok(Channel {
        address,
        messages: cloned_map(channel, "messages", PROTOCOL)?,
        rest: collect_extensions(channel, &["address", "messages"]),
    })
}

fn parse_operation(op: &Map<String, Value>, id: &str) -> Result<AsyncOperation, ParseError> {
    let action = op
        .get("action")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ParseError::malformed(PROTOCOL, format!("operation '{}' missing 'action'", id))
        })?;
    if action != "send" && action != "receive" {
        return Err(ParseError::malformed(
            PROTOCOL,
            format!(
                "operation '{}' has invalid action '{}' (must be 'send' or 'receive')",
                id, action
            ),
        ));
    }

    let channel = op.get("channel").cloned().ok_or_else(|| {
        ParseError::malformed(PROTOCOL, format!("operation '{}' missing 'channel'", id))
    })?;

    Ok(AsyncOperation {
        action: action.to_string(),
        channel,
        rest: collect_extensions(op, &["action", "channel"]),
    })
}

fn parse_components(root: &Map<String, Value>) -> Result<AsyncComponents, ParseError> {
    let components = match optional_object(root, "components", PROTOCOL)? {
        Some(c) => c,
        None => return Ok(AsyncComponents::default()),
    };

    Ok(AsyncComponents {
        messages: cloned_map(components, "messages", PROTOCOL)?,
        schemas: cloned_map(components, "schemas", PROTOCOL)?,
        security_schemes: cloned_map(components, "securitySchemes", PROTOCOL)?,
        rest: collect_extensions(components, &["messages", "schemas", "securitySchemes"]),
    })
}
