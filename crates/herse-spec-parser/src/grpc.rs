//! Parser for gRPC-derived schema documents.
//!
//! The wire-format generator flattens a proto package into
//! `{package, services, messages}`. Service and message names are the
//! canonical identifiers the merger folds; there is no path concept.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{GrpcMethod, GrpcService, GrpcSpec, Protocol};
use crate::util::{cloned_map, collect_extensions, required_object, root_object};

const KNOWN_ROOT: &[&str] = &["package", "services", "messages"];

const PROTOCOL: Protocol = Protocol::Grpc;

/// Parse a gRPC-derived document.
pub fn parse(document: &Value) -> Result<GrpcSpec, ParseError> {
    let root = root_object(document, PROTOCOL)?;

    let package = match root.get("package") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(ParseError::malformed(PROTOCOL, "'package' must be a string"));
        }
    };

    let services_obj = required_object(root, "services", PROTOCOL)?;
    let mut services = BTreeMap::new();
    for (name, value) in services_obj {
        let service = value.as_object().ok_or_else(|| {
            ParseError::malformed(PROTOCOL, format!("service '{}' must be an object", name))
        })?;
        services.insert(name.clone(), parse_service(service)?);
    }

    Ok(GrpcSpec {
        package,
        services,
        messages: cloned_map(root, "messages", PROTOCOL)?,
        extensions: collect_extensions(root, KNOWN_ROOT),
    })
}

fn parse_service(service: &Map<String, Value>) -> Result<GrpcService, ParseError> {
    let mut methods = BTreeMap::new();
    if let Some(methods_obj) = service.get("methods").and_then(|v| v.as_object()) {
        for (name, value) in methods_obj {
            let method = value.as_object().ok_or_else(|| {
                ParseError::malformed(PROTOCOL, format!("method '{}' must be an object", name))
            })?;
            methods.insert(
                name.clone(),
                GrpcMethod {
                    input: method
                        .get("input")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    output: method
                        .get("output")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    rest: collect_extensions(method, &["input", "output"]),
                },
            );
        }
    }

    Ok(GrpcService {
        methods,
        rest: collect_extensions(service, &["methods"]),
    })
}
