//! Shared helpers for walking untyped document trees.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{Extensions, Info, Protocol};

/// Require the document root to be an object.
pub(crate) fn root_object(
    document: &Value,
    protocol: Protocol,
) -> Result<&Map<String, Value>, ParseError> {
    document
        .as_object()
        .ok_or_else(|| ParseError::malformed(protocol, "document root must be an object"))
}

/// Require a field to be an object, erroring with the field name.
pub(crate) fn required_object<'a>(
    root: &'a Map<String, Value>,
    field: &str,
    protocol: Protocol,
) -> Result<&'a Map<String, Value>, ParseError> {
    match root.get(field) {
        Some(value) => value
            .as_object()
            .ok_or_else(|| ParseError::malformed(protocol, format!("'{}' must be an object", field))),
        None => Err(ParseError::malformed(
            protocol,
            format!("missing '{}'", field),
        )),
    }
}

/// An optional object field; `None` when absent, error when mistyped.
pub(crate) fn optional_object<'a>(
    root: &'a Map<String, Value>,
    field: &str,
    protocol: Protocol,
) -> Result<Option<&'a Map<String, Value>>, ParseError> {
    match root.get(field) {
        None => Ok(None),
        Some(value) => value
            .as_object()
            .map(Some)
            .ok_or_else(|| ParseError::malformed(protocol, format!("'{}' must be an object", field))),
    }
}

/// Clone an object field into an owned string-keyed map (empty when absent).
pub(crate) fn cloned_map(
    obj: &Map<String, Value>,
    field: &str,
    protocol: Protocol,
) -> Result<BTreeMap<String, Value>, ParseError> {
    Ok(optional_object(obj, field, protocol)?
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default())
}

/// Collect every field not in `known` into an extension bag.
pub(crate) fn collect_extensions(obj: &Map<String, Value>, known: &[&str]) -> Extensions {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Parse an `info` block. `title` is required when `require_title` is set.
pub(crate) fn parse_info(
    root: &Map<String, Value>,
    protocol: Protocol,
    require_title: bool,
) -> Result<Info, ParseError> {
    let info = match optional_object(root, "info", protocol)? {
        Some(info) => info,
        None if require_title => {
            return Err(ParseError::malformed(protocol, "missing 'info'"));
        }
        None => return Ok(Info::default()),
    };

    let title = match info.get("title").and_then(|v| v.as_str()) {
        Some(title) => title.to_string(),
        None if require_title => {
            return Err(ParseError::malformed(protocol, "missing 'info.title'"));
        }
        None => String::new(),
    };

    let version = info
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0")
        .to_string();

    let description = info
        .get("description")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Ok(Info {
        title,
        version,
        description,
        rest: collect_extensions(info, &["title", "version", "description"]),
    })
}
