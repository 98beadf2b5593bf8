//! OpenAPI 3.x parser.
//!
//! Lifts out `paths`, `components` and `tags` (the namespaces the merger
//! folds) and keeps everything else in extension bags.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{Components, OpenApiSpec, Operation, PathItem, Protocol, Tag};
use crate::util::{
    cloned_map, collect_extensions, optional_object, parse_info, required_object, root_object,
};

/// HTTP methods recognized in path items.
const HTTP_METHODS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "head", "options", "trace",
];

const KNOWN_ROOT: &[&str] = &["openapi", "info", "servers", "paths", "components", "tags"];

const PROTOCOL: Protocol = Protocol::OpenApi;

/// Parse an OpenAPI 3.x document.
pub fn parse(document: &Value) -> Result<OpenApiSpec, ParseError> {
    let root = root_object(document, PROTOCOL)?;

    let version = root
        .get("openapi")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ParseError::malformed(PROTOCOL, "missing 'openapi' version field"))?;
    if !version.starts_with("3.") {
        return Err(ParseError::UnsupportedVersion {
            protocol: PROTOCOL,
            version: version.to_string(),
        });
    }

    let info = parse_info(root, PROTOCOL, true)?;

    let servers = root
        .get("servers")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let paths_obj = required_object(root, "paths", PROTOCOL)?;
    let mut paths = BTreeMap::new();
    for (path, item) in paths_obj {
        let item_obj = item.as_object().ok_or_else(|| {
            ParseError::malformed(PROTOCOL, format!("path item '{}' must be an object", path))
        })?;
        paths.insert(path.clone(), parse_path_item(item_obj));
    }

    let components = parse_components(root)?;
    let tags = parse_tags(root);

    Ok(OpenApiSpec {
        version: version.to_string(),
        info,
        servers,
        paths,
        components,
        tags,
        extensions: collect_extensions(root, KNOWN_ROOT),
    })
}

fn parse_path_item(item: &Map<String, Value>) -> PathItem {
    let mut operations = BTreeMap::new();
    let mut rest = BTreeMap::new();

    for (key, value) in item {
        if HTTP_METHODS.contains(&key.as_str()) {
            if let Some(op) = value.as_object() {
                operations.insert(key.clone(), parse_operation(op));
                continue;
            }
        }
        rest.insert(key.clone(), value.clone());
    }

    PathItem { operations, rest }
}

fn parse_operation(op: &Map<String, Value>) -> Operation {
    let operation_id = op
        .get("operationId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let tags = op.get("tags").and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|t| t.as_str())
            .map(|s| s.to_string())
            .collect()
    });

    Operation {
        operation_id,
        tags,
        rest: collect_extensions(op, &["operationId", "tags"]),
    }
}

fn parse_components(root: &Map<String, Value>) -> Result<Components, ParseError> {
    let components = match optional_object(root, "components", PROTOCOL)? {
        Some(c) => c,
        None => return Ok(Components::default()),
    };

    Ok(Components {
        schemas: cloned_map(components, "schemas", PROTOCOL)?,
        parameters: cloned_map(components, "parameters", PROTOCOL)?,
        security_schemes: cloned_map(components, "securitySchemes", PROTOCOL)?,
        rest: collect_extensions(components, &["schemas", "parameters", "securitySchemes"]),
    })
}

fn parse_tags(root: &Map<String, Value>) -> Vec<Tag> {
    root.get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| {
                    let obj = t.as_object()?;
                    let name = obj.get("name")?.as_str()?.to_string();
                    Some(Tag {
                        name,
                        rest: collect_extensions(obj, &["name"]),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_minimal() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": {"title": "User API", "version": "1.0.0"},
            "paths": {
                "/users": {
                    "get": {"operationId": "listUsers", "tags": ["users"]}
                }
            }
        });
        let spec = parse(&doc).unwrap();
        assert_eq!(spec.version, "3.1.0");
        assert_eq!(spec.info.title, "User API");

        let item = &spec.paths["/users"];
        let op = &item.operations["get"];
        assert_eq!(op.operation_id.as_deref(), Some("listUsers"));
        assert_eq!(op.tags.as_deref(), Some(&["users".to_string()][..]));
    }

    #[test]
    fn missing_paths_is_malformed() {
        let doc = json!({
            "openapi": "3.0.3",
            "info": {"title": "X", "version": "1.0.0"}
        });
        let err = parse(&doc).unwrap_err();
        assert!(err.to_string().contains("missing 'paths'"));
    }

    #[test]
    fn missing_version_field_is_malformed() {
        let doc = json!({
            "info": {"title": "X", "version": "1.0.0"},
            "paths": {}
        });
        let err = parse(&doc).unwrap_err();
        assert!(err.to_string().contains("missing 'openapi'"));
    }

    #[test]
    fn reject_swagger_2() {
        let doc = json!({
            "openapi": "2.0",
            "info": {"title": "Old", "version": "1.0.0"},
            "paths": {}
        });
        assert!(matches!(
            parse(&doc),
            Err(ParseError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn unknown_root_fields_land_in_extensions() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": {"title": "X", "version": "1.0.0"},
            "paths": {},
            "x-gateway-zone": "eu-west",
            "externalDocs": {"url": "https://example.com"}
        });
        let spec = parse(&doc).unwrap();
        assert!(spec.extensions.contains_key("x-gateway-zone"));
        assert!(spec.extensions.contains_key("externalDocs"));
    }

    #[test]
    fn components_split_into_namespaces() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": {"title": "X", "version": "1.0.0"},
            "paths": {},
            "components": {
                "schemas": {"User": {"type": "object"}},
                "securitySchemes": {"bearer": {"type": "http", "scheme": "bearer"}},
                "responses": {"NotFound": {"description": "missing"}}
            }
        });
        let spec = parse(&doc).unwrap();
        assert!(spec.components.schemas.contains_key("User"));
        assert!(spec.components.security_schemes.contains_key("bearer"));
        assert!(spec.components.rest.contains_key("responses"));
    }

    #[test]
    fn document_round_trips() {
        let doc = json!({
            "openapi": "3.1.0",
            "info": {"title": "X", "version": "1.0.0"},
            "paths": {
                "/users/{id}": {
                    "get": {
                        "operationId": "getUser",
                        "parameters": [{"name": "id", "in": "path", "required": true}],
                        "responses": {"200": {"description": "ok"}}
                    },
                    "parameters": [{"name": "trace", "in": "header"}]
                }
            },
            "components": {"schemas": {"User": {"type": "object"}}},
            "tags": [{"name": "users", "description": "user ops"}]
        });
        let spec = parse(&doc).unwrap();
        assert_eq!(spec.to_document(), doc);
    }
}
