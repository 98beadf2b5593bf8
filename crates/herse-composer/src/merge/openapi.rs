//! OpenAPI merge adapter.
//!
//! Namespaces folded: paths, component schemas, reusable parameters,
//! security schemes, tags, operation IDs. Paths are mounted to their
//! gateway-visible keys; schemas/parameters/tags/operation IDs are prefixed
//! before folding. Operation-ID and tag collisions that survive prefixing
//! are always resolved by service-name re-prefixing, regardless of the
//! configured strategy, since both must stay globally unique.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use herse_spec_parser::{openapi, Extensions, OpenApiSpec, ParseError, PathItem, Protocol};

use crate::conflict::{ConflictLog, InsertOutcome, Namespace, NamespaceKind};
use crate::error::ComposeError;
use crate::manifest::{ConflictStrategy, ResolvedPolicy, ServiceManifest};
use crate::merge::{FoldContext, MergeOptions, ProtocolAdapter};
use crate::{mount, prefix};

const SCHEMA_REFS: &str = "#/components/schemas/";
const PARAMETER_REFS: &str = "#/components/parameters/";

pub struct OpenApiAdapter;

pub struct OpenApiAcc {
    version: Option<String>,
    servers: Vec<Value>,
    paths: Namespace,
    schemas: Namespace,
    parameters: Namespace,
    security_schemes: Namespace,
    tags: Namespace,
    /// Registry of seen operation IDs (values unused).
    operation_ids: Namespace,
    /// Non-namespace component groups (responses, requestBodies, ...),
    /// united first-wins.
    component_rest: Extensions,
    extensions: Extensions,
}

impl Default for OpenApiAcc {
    fn default() -> Self {
        OpenApiAcc {
            version: None,
            servers: Vec::new(),
            paths: Namespace::new(NamespaceKind::Paths),
            schemas: Namespace::new(NamespaceKind::Components),
            parameters: Namespace::new(NamespaceKind::Parameters),
            security_schemes: Namespace::new(NamespaceKind::SecuritySchemes),
            tags: Namespace::new(NamespaceKind::Tags),
            operation_ids: Namespace::new(NamespaceKind::OperationIds),
            component_rest: Extensions::new(),
            extensions: Extensions::new(),
        }
    }
}

impl ProtocolAdapter for OpenApiAdapter {
    type Spec = OpenApiSpec;
    type Acc = OpenApiAcc;

    const PROTOCOL: Protocol = Protocol::OpenApi;

    fn parse(document: &Value) -> Result<OpenApiSpec, ParseError> {
        openapi::parse(document)
    }

    fn prepare(spec: &mut OpenApiSpec, manifest: &ServiceManifest, policy: &ResolvedPolicy) {
        // Mount paths to their gateway-visible keys. Nothing references a
        // path by key, so no fixups are needed.
        let (paths, _) = mount::rewrite_keys(std::mem::take(&mut spec.paths), manifest);
        spec.paths = paths;

        // Prefix component schemas and reusable parameters, then rewrite
        // every $ref that pointed at the old names. Security schemes are
        // left alone.
        let (schemas, schema_renames) = prefix::rename_keys(
            std::mem::take(&mut spec.components.schemas),
            |name| prefix::flat(&policy.component_prefix, name),
        );
        spec.components.schemas = schemas;
        let (parameters, parameter_renames) = prefix::rename_keys(
            std::mem::take(&mut spec.components.parameters),
            |name| prefix::flat(&policy.component_prefix, name),
        );
        spec.components.parameters = parameters;
        rewrite_spec_refs(spec, SCHEMA_REFS, &schema_renames);
        rewrite_spec_refs(spec, PARAMETER_REFS, &parameter_renames);

        // Prefix tag declarations, per-operation tag lists, and operation
        // IDs together so the references stay aligned.
        for tag in &mut spec.tags {
            tag.name = prefix::flat(&policy.tag_prefix, &tag.name);
        }
        for item in spec.paths.values_mut() {
            for op in item.operations.values_mut() {
                if let Some(tags) = &mut op.tags {
                    for tag in tags.iter_mut() {
                        *tag = prefix::flat(&policy.tag_prefix, tag);
                    }
                }
                if let Some(id) = &mut op.operation_id {
                    *id = prefix::flat(&policy.operation_id_prefix, id);
                }
            }
        }
    }

    fn fold(
        acc: &mut OpenApiAcc,
        log: &mut ConflictLog,
        spec: OpenApiSpec,
        ctx: &FoldContext<'_>,
    ) -> Result<(), ComposeError> {
        let service = ctx.service;
        let OpenApiSpec {
            version,
            info: _,
            servers,
            paths,
            components,
            tags,
            extensions,
        } = spec;

        if acc.version.is_none() {
            acc.version = Some(version);
        }
        for server in servers {
            if !acc.servers.contains(&server) {
                acc.servers.push(server);
            }
        }
        for (key, value) in extensions {
            acc.extensions.entry(key).or_insert(value);
        }

        // Components fold first so conflict-time renames can be fixed up in
        // this service's path items before those are inserted.
        let mut schema_renames = BTreeMap::new();
        let mut schema_keys = Vec::new();
        for (name, value) in components.schemas {
            track(
                acc.schemas.insert(name.clone(), value, service, ctx.strategy, log)?,
                name,
                &mut schema_renames,
                &mut schema_keys,
            );
        }
        let mut parameter_renames = BTreeMap::new();
        let mut parameter_keys = Vec::new();
        for (name, value) in components.parameters {
            track(
                acc.parameters.insert(name.clone(), value, service, ctx.strategy, log)?,
                name,
                &mut parameter_renames,
                &mut parameter_keys,
            );
        }

        for (name, value) in components.security_schemes {
            acc.security_schemes
                .insert(name, value, service, ctx.strategy, log)?;
        }
        for (key, value) in components.rest {
            acc.component_rest.entry(key).or_insert(value);
        }

        // Conflict renames invalidate refs inside this service's own
        // contribution: fix the component values just inserted, and the
        // path items below before insertion.
        let rename_sets = [
            (SCHEMA_REFS, &schema_renames),
            (PARAMETER_REFS, &parameter_renames),
        ];
        if !schema_renames.is_empty() || !parameter_renames.is_empty() {
            for key in schema_keys.iter() {
                if acc.schemas.owner_of(key) == Some(service) {
                    if let Some(value) = acc.schemas.value_mut(key) {
                        for (base, renames) in &rename_sets {
                            prefix::rewrite_refs(value, base, renames);
                        }
                    }
                }
            }
            for key in parameter_keys.iter() {
                if acc.parameters.owner_of(key) == Some(service) {
                    if let Some(value) = acc.parameters.value_mut(key) {
                        for (base, renames) in &rename_sets {
                            prefix::rewrite_refs(value, base, renames);
                        }
                    }
                }
            }
        }

        // Tags: collisions surviving the prefix pass are always re-prefixed
        // with the service name, whatever the configured strategy.
        let mut tag_renames: BTreeMap<String, String> = BTreeMap::new();
        for tag in tags {
            let value = Value::Object(tag.rest.into_iter().collect());
            if let InsertOutcome::Prefixed(new_name) =
                acc.tags
                    .insert(tag.name.clone(), value, service, ConflictStrategy::Prefix, log)?
            {
                tag_renames.insert(tag.name, new_name);
            }
        }

        for (path, mut item) in paths {
            fixup_path_item(&mut item, service, &tag_renames, &rename_sets);
            register_operation_ids(acc, log, &mut item, service)?;
            acc.paths
                .insert(path, item.to_value(), service, ctx.strategy, log)?;
        }

        Ok(())
    }

    fn assemble(acc: OpenApiAcc, options: &MergeOptions) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "openapi".into(),
            Value::String(acc.version.unwrap_or_else(|| "3.0.3".to_string())),
        );

        let mut info = Map::new();
        info.insert("title".into(), Value::String(options.title.clone()));
        if let Some(description) = &options.description {
            info.insert("description".into(), Value::String(description.clone()));
        }
        info.insert("version".into(), Value::String(options.version.clone()));
        obj.insert("info".into(), Value::Object(info));

        if !acc.servers.is_empty() {
            obj.insert("servers".into(), Value::Array(acc.servers));
        }

        obj.insert(
            "paths".into(),
            Value::Object(acc.paths.into_map().into_iter().collect()),
        );

        let mut components = Map::new();
        if !acc.schemas.is_empty() {
            components.insert(
                "schemas".into(),
                Value::Object(acc.schemas.into_map().into_iter().collect()),
            );
        }
        if !acc.parameters.is_empty() {
            components.insert(
                "parameters".into(),
                Value::Object(acc.parameters.into_map().into_iter().collect()),
            );
        }
        if !acc.security_schemes.is_empty() {
            components.insert(
                "securitySchemes".into(),
                Value::Object(acc.security_schemes.into_map().into_iter().collect()),
            );
        }
        for (key, value) in acc.component_rest {
            components.insert(key, value);
        }
        if !components.is_empty() {
            obj.insert("components".into(), Value::Object(components));
        }

        if !acc.tags.is_empty() {
            let tags: Vec<Value> = acc
                .tags
                .into_map()
                .into_iter()
                .map(|(name, value)| {
                    let mut tag = Map::new();
                    tag.insert("name".into(), Value::String(name));
                    if let Value::Object(rest) = value {
                        for (k, v) in rest {
                            tag.insert(k, v);
                        }
                    }
                    Value::Object(tag)
                })
                .collect();
            obj.insert("tags".into(), Value::Array(tags));
        }

        for (key, value) in acc.extensions {
            obj.insert(key, value);
        }

        Value::Object(obj)
    }
}

/// Rewrite refs across every raw value of the spec (used by the prefix
/// pre-pass, where the whole spec is still this service's own).
fn rewrite_spec_refs(spec: &mut OpenApiSpec, base: &str, renames: &BTreeMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    for item in spec.paths.values_mut() {
        for value in item.rest.values_mut() {
            prefix::rewrite_refs(value, base, renames);
        }
        for op in item.operations.values_mut() {
            for value in op.rest.values_mut() {
                prefix::rewrite_refs(value, base, renames);
            }
        }
    }
    for value in spec.components.schemas.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
    for value in spec.components.parameters.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
    for value in spec.components.security_schemes.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
    for value in spec.components.rest.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
    for value in spec.extensions.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
}

/// Record where a component contribution landed, for reference fixups.
fn track(
    outcome: InsertOutcome,
    name: String,
    renames: &mut BTreeMap<String, String>,
    keys: &mut Vec<String>,
) {
    match outcome {
        InsertOutcome::Prefixed(new_key) => {
            renames.insert(name, new_key.clone());
            keys.push(new_key);
        }
        InsertOutcome::Skipped => {}
        _ => keys.push(name),
    }
}

/// Apply conflict-time renames to one path item: tag references, and $refs
/// into the component namespaces. An operation whose tags were re-prefixed
/// gets its operation ID re-prefixed with it.
fn fixup_path_item(
    item: &mut PathItem,
    service: &str,
    tag_renames: &BTreeMap<String, String>,
    rename_sets: &[(&str, &BTreeMap<String, String>)],
) {
    for value in item.rest.values_mut() {
        for (base, renames) in rename_sets {
            prefix::rewrite_refs(value, base, renames);
        }
    }
    for op in item.operations.values_mut() {
        let mut tags_renamed = false;
        if let Some(tags) = &mut op.tags {
            for tag in tags.iter_mut() {
                if let Some(new_name) = tag_renames.get(tag) {
                    *tag = new_name.clone();
                    tags_renamed = true;
                }
            }
        }
        if tags_renamed {
            if let Some(id) = &mut op.operation_id {
                *id = prefix::flat(service, id);
            }
        }
        for value in op.rest.values_mut() {
            for (base, renames) in rename_sets {
                prefix::rewrite_refs(value, base, renames);
            }
        }
    }
}

/// Register this item's operation IDs; collisions are re-prefixed with the
/// service name regardless of the configured strategy (operation IDs must
/// stay globally unique).
fn register_operation_ids(
    acc: &mut OpenApiAcc,
    log: &mut ConflictLog,
    item: &mut PathItem,
    service: &str,
) -> Result<(), ComposeError> {
    for op in item.operations.values_mut() {
        let Some(id) = op.operation_id.clone() else {
            continue;
        };
        if let InsertOutcome::Prefixed(new_id) =
            acc.operation_ids
                .insert(id, Value::Null, service, ConflictStrategy::Prefix, log)?
        {
            op.operation_id = Some(new_id);
        }
    }
    Ok(())
}
