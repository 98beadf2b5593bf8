//! Name prefixing with reference rewriting.
//!
//! Applies service-derived prefixes to component schemas, tags, operation
//! IDs, channel and procedure names before conflict detection, and rewrites
//! the `$ref` strings that point at renamed entries so renames never break
//! referential integrity. Security schemes are deliberately not prefixed
//! here; a security scheme only gets re-keyed as a conflict resolution.

use std::collections::BTreeMap;

use serde_json::Value;

/// `{prefix}_{name}` for flat namespaces (components, tags, operation IDs).
pub fn flat(prefix: &str, name: &str) -> String {
    format!("{}_{}", prefix, name)
}

/// `{prefix}.{name}` for dotted namespaces (channels, services, procedures).
pub fn dotted(prefix: &str, name: &str) -> String {
    format!("{}.{}", prefix, name)
}

/// Rename every key of a map, returning the new map plus the old -> new
/// mapping for reference fixups.
pub fn rename_keys<V>(
    map: BTreeMap<String, V>,
    rename: impl Fn(&str) -> String,
) -> (BTreeMap<String, V>, BTreeMap<String, String>) {
    let mut renamed = BTreeMap::new();
    let mut renames = BTreeMap::new();
    for (key, value) in map {
        let new_key = rename(&key);
        renames.insert(key, new_key.clone());
        renamed.insert(new_key, value);
    }
    (renamed, renames)
}

/// Rewrite `$ref` strings in-place.
///
/// Any `$ref` of the form `{base}{name}` or `{base}{name}/{tail}` where
/// `name` appears in `renames` is rewritten to point at the new name; the
/// tail, if any, is preserved.
pub fn rewrite_refs(value: &mut Value, base: &str, renames: &BTreeMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    match value {
        Value::Object(obj) => {
            for (key, child) in obj.iter_mut() {
                if key == "$ref" {
                    if let Value::String(target) = child {
                        if let Some(rewritten) = rewrite_ref_target(target, base, renames) {
                            *child = Value::String(rewritten);
                            continue;
                        }
                    }
                }
                rewrite_refs(child, base, renames);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, base, renames);
            }
        }
        _ => {}
    }
}

fn rewrite_ref_target(
    target: &str,
    base: &str,
    renames: &BTreeMap<String, String>,
) -> Option<String> {
    let rest = target.strip_prefix(base)?;
    let (name, tail) = match rest.split_once('/') {
        Some((name, tail)) => (name, Some(tail)),
        None => (rest, None),
    };
    let new_name = renames.get(name)?;
    Some(match tail {
        Some(tail) => format!("{}{}/{}", base, new_name, tail),
        None => format!("{}{}", base, new_name),
    })
}

/// Rewrite bare type-name fields in-place (gRPC-derived documents reference
/// named types by plain string under `input`, `output`, `type` and `items`).
pub fn rewrite_type_names(value: &mut Value, renames: &BTreeMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    match value {
        Value::Object(obj) => {
            for (key, child) in obj.iter_mut() {
                if matches!(key.as_str(), "input" | "output" | "type" | "items") {
                    if let Value::String(name) = child {
                        if let Some(new_name) = renames.get(name.as_str()) {
                            *child = Value::String(new_name.clone());
                            continue;
                        }
                    }
                }
                rewrite_type_names(child, renames);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_type_names(item, renames);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_and_dotted_joins() {
        assert_eq!(flat("user-service", "User"), "user-service_User");
        assert_eq!(dotted("user-service", "signedUp"), "user-service.signedUp");
    }

    #[test]
    fn rename_keys_reports_mapping() {
        let mut map = BTreeMap::new();
        map.insert("User".to_string(), 1);
        map.insert("Order".to_string(), 2);

        let (renamed, renames) = rename_keys(map, |name| flat("svc", name));
        assert_eq!(renamed["svc_User"], 1);
        assert_eq!(renames["Order"], "svc_Order");
    }

    #[test]
    fn rewrites_exact_refs() {
        let mut renames = BTreeMap::new();
        renames.insert("User".to_string(), "svc_User".to_string());

        let mut doc = json!({
            "responses": {
                "200": {"schema": {"$ref": "#/components/schemas/User"}}
            }
        });
        rewrite_refs(&mut doc, "#/components/schemas/", &renames);
        assert_eq!(
            doc["responses"]["200"]["schema"]["$ref"],
            json!("#/components/schemas/svc_User")
        );
    }

    #[test]
    fn rewrites_refs_with_tails() {
        let mut renames = BTreeMap::new();
        renames.insert("orders".to_string(), "svc.orders".to_string());

        let mut doc = json!({"$ref": "#/channels/orders/messages/Created"});
        rewrite_refs(&mut doc, "#/channels/", &renames);
        assert_eq!(doc["$ref"], json!("#/channels/svc.orders/messages/Created"));
    }

    #[test]
    fn leaves_unrelated_refs_alone() {
        let mut renames = BTreeMap::new();
        renames.insert("User".to_string(), "svc_User".to_string());

        let mut doc = json!({"$ref": "#/components/parameters/User"});
        rewrite_refs(&mut doc, "#/components/schemas/", &renames);
        assert_eq!(doc["$ref"], json!("#/components/parameters/User"));
    }

    #[test]
    fn rewrites_grpc_type_names() {
        let mut renames = BTreeMap::new();
        renames.insert("User".to_string(), "svc_User".to_string());

        let mut method = json!({"input": "GetUserRequest", "output": "User"});
        rewrite_type_names(&mut method, &renames);
        assert_eq!(method["input"], json!("GetUserRequest"));
        assert_eq!(method["output"], json!("svc_User"));

        let mut message = json!({
            "fields": {"owner": {"type": "User"}, "id": {"type": "string"}}
        });
        rewrite_type_names(&mut message, &renames);
        assert_eq!(message["fields"]["owner"]["type"], json!("svc_User"));
        assert_eq!(message["fields"]["id"]["type"], json!("string"));
    }
}
