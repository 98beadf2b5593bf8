//! Parser for oRPC contract documents.
//!
//! An oRPC document maps dotted procedure names ("user.list") to procedure
//! definitions, with reusable named schemas under `contracts`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{OrpcSpec, Procedure, ProcedureKind, Protocol};
use crate::util::{cloned_map, collect_extensions, parse_info, required_object, root_object};

const KNOWN_ROOT: &[&str] = &["info", "procedures", "contracts"];

const PROTOCOL: Protocol = Protocol::Orpc;

/// Parse an oRPC contract document.
pub fn parse(document: &Value) -> Result<OrpcSpec, ParseError> {
    let root = root_object(document, PROTOCOL)?;

    let procedures_obj = required_object(root, "procedures", PROTOCOL)?;
    let mut procedures = BTreeMap::new();
    for (name, value) in procedures_obj {
        let proc = value.as_object().ok_or_else(|| {
            ParseError::malformed(PROTOCOL, format!("procedure '{}' must be an object", name))
        })?;
        procedures.insert(name.clone(), parse_procedure(proc, name)?);
    }

    Ok(OrpcSpec {
        info: parse_info(root, PROTOCOL, false)?,
        procedures,
        contracts: cloned_map(root, "contracts", PROTOCOL)?,
        extensions: collect_extensions(root, KNOWN_ROOT),
    })
}

fn parse_procedure(proc: &Map<String, Value>, name: &str) -> Result<Procedure, ParseError> {
    let kind = match proc.get("kind") {
        None => ProcedureKind::default(),
        Some(Value::String(s)) => match s.as_str() {
            "query" => ProcedureKind::Query,
            "mutation" => ProcedureKind::Mutation,
            "subscription" => ProcedureKind::Subscription,
            other => {
                return Err(ParseError::malformed(
                    PROTOCOL,
                    format!("procedure '{}' has invalid kind '{}'", name, other),
                ))
            }
        },
        Some(_) => {
            return Err(ParseError::malformed(
                PROTOCOL,
                format!("procedure '{}' kind must be a string", name),
            ))
        }
    };

    Ok(Procedure {
        kind,
        input: proc.get("input").cloned(),
        output: proc.get("output").cloned(),
        rest: collect_extensions(proc, &["kind", "input", "output"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_minimal() {
        let doc = json!({
            "procedures": {
                "user.list": {
                    "kind": "query",
                    "input": {"type": "object"},
                    "output": {"$ref": "#/contracts/UserPage"}
                },
                "user.create": {"kind": "mutation"}
            },
            "contracts": {
                "UserPage": {"type": "object"}
            }
        });
        let spec = parse(&doc).unwrap();
        assert_eq!(spec.procedures["user.list"].kind, ProcedureKind::Query);
        assert_eq!(spec.procedures["user.create"].kind, ProcedureKind::Mutation);
        assert!(spec.contracts.contains_key("UserPage"));
    }

    #[test]
    fn kind_defaults_to_query() {
        let doc = json!({"procedures": {"ping": {}}});
        let spec = parse(&doc).unwrap();
        assert_eq!(spec.procedures["ping"].kind, ProcedureKind::Query);
    }

    #[test]
    fn missing_procedures_is_malformed() {
        let doc = json!({"contracts": {}});
        let err = parse(&doc).unwrap_err();
        assert!(err.to_string().contains("missing 'procedures'"));
    }

    #[test]
    fn invalid_kind_is_malformed() {
        let doc = json!({"procedures": {"x": {"kind": "stream"}}});
        let err = parse(&doc).unwrap_err();
        assert!(err.to_string().contains("invalid kind 'stream'"));
    }
}
