//! AsyncAPI merge adapter.
//!
//! Namespaces folded: channels, operations (AsyncAPI keys its operations by
//! operation ID), component messages, component schemas, security schemes.
//! The route-mount transformer rewrites channel *addresses* (the
//! gateway-visible, path-like dimension); channel *names* are prefixed with
//! the protocol's native `.` separator, and operation channel `$ref`s are
//! rewritten alongside every rename.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use herse_spec_parser::{asyncapi, AsyncApiSpec, Extensions, ParseError, Protocol};

use crate::conflict::{ConflictLog, InsertOutcome, Namespace, NamespaceKind};
use crate::error::ComposeError;
use crate::manifest::{ConflictStrategy, ResolvedPolicy, ServiceManifest};
use crate::merge::{FoldContext, MergeOptions, ProtocolAdapter};
use crate::{mount, prefix};

const CHANNEL_REFS: &str = "#/channels/";
const MESSAGE_REFS: &str = "#/components/messages/";
const SCHEMA_REFS: &str = "#/components/schemas/";

pub struct AsyncApiAdapter;

pub struct AsyncApiAcc {
    version: Option<String>,
    servers: BTreeMap<String, Value>,
    channels: Namespace,
    operations: Namespace,
    messages: Namespace,
    schemas: Namespace,
    security_schemes: Namespace,
    /// Non-namespace component groups, united first-wins.
    component_rest: Extensions,
    extensions: Extensions,
}

impl Default for AsyncApiAcc {
    fn default() -> Self {
        AsyncApiAcc {
            version: None,
            servers: BTreeMap::new(),
            channels: Namespace::new(NamespaceKind::Channels),
            operations: Namespace::new(NamespaceKind::OperationIds),
            messages: Namespace::new(NamespaceKind::Messages),
            schemas: Namespace::new(NamespaceKind::Components),
            security_schemes: Namespace::new(NamespaceKind::SecuritySchemes),
            component_rest: Extensions::new(),
            extensions: Extensions::new(),
        }
    }
}

impl ProtocolAdapter for AsyncApiAdapter {
    type Spec = AsyncApiSpec;
    type Acc = AsyncApiAcc;

    const PROTOCOL: Protocol = Protocol::AsyncApi;

    fn parse(document: &Value) -> Result<AsyncApiSpec, ParseError> {
        asyncapi::parse(document)
    }

    fn prepare(spec: &mut AsyncApiSpec, manifest: &ServiceManifest, policy: &ResolvedPolicy) {
        // Mount rewrites the path-like dimension: the channel address.
        for channel in spec.channels.values_mut() {
            if let Some(address) = &channel.address {
                channel.address = Some(mount::rewrite_key(address, manifest));
            }
        }

        // Channel names take the dotted prefix; every channel $ref follows.
        let (channels, channel_renames) =
            prefix::rename_keys(std::mem::take(&mut spec.channels), |name| {
                prefix::dotted(&policy.component_prefix, name)
            });
        spec.channels = channels;
        rewrite_spec_refs(spec, CHANNEL_REFS, &channel_renames);

        // Operation IDs (the operations map keys) take the flat prefix.
        let (operations, _) = prefix::rename_keys(std::mem::take(&mut spec.operations), |id| {
            prefix::flat(&policy.operation_id_prefix, id)
        });
        spec.operations = operations;

        // Component messages and schemas take the flat component prefix;
        // security schemes are left alone.
        let (messages, message_renames) =
            prefix::rename_keys(std::mem::take(&mut spec.components.messages), |name| {
                prefix::flat(&policy.component_prefix, name)
            });
        spec.components.messages = messages;
        let (schemas, schema_renames) =
            prefix::rename_keys(std::mem::take(&mut spec.components.schemas), |name| {
                prefix::flat(&policy.component_prefix, name)
            });
        spec.components.schemas = schemas;
        rewrite_spec_refs(spec, MESSAGE_REFS, &message_renames);
        rewrite_spec_refs(spec, SCHEMA_REFS, &schema_renames);
    }

    fn fold(
        acc: &mut AsyncApiAcc,
        log: &mut ConflictLog,
        spec: AsyncApiSpec,
        ctx: &FoldContext<'_>,
    ) -> Result<(), ComposeError> {
        let service = ctx.service;
        let AsyncApiSpec {
            version,
            info: _,
            servers,
            mut channels,
            mut operations,
            components,
            extensions,
        } = spec;

        if acc.version.is_none() {
            acc.version = Some(version);
        }
        for (name, server) in servers {
            acc.servers.entry(name).or_insert(server);
        }
        for (key, value) in extensions {
            acc.extensions.entry(key).or_insert(value);
        }

        // Components first, so conflict-time renames can be fixed up in the
        // channels and operations below before those are inserted.
        let mut message_renames = BTreeMap::new();
        let mut message_keys = Vec::new();
        for (name, value) in components.messages {
            track(
                acc.messages.insert(name.clone(), value, service, ctx.strategy, log)?,
                name,
                &mut message_renames,
                &mut message_keys,
            );
        }
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
        for (name, value) in components.security_schemes {
            acc.security_schemes
                .insert(name, value, service, ctx.strategy, log)?;
        }
        for (key, value) in components.rest {
            acc.component_rest.entry(key).or_insert(value);
        }

        let rename_sets = [
            (MESSAGE_REFS, &message_renames),
            (SCHEMA_REFS, &schema_renames),
        ];
        if !message_renames.is_empty() || !schema_renames.is_empty() {
            for (namespace, keys) in [
                (&mut acc.messages, &message_keys),
                (&mut acc.schemas, &schema_keys),
            ] {
                for key in keys {
                    if namespace.owner_of(key) == Some(service) {
                        if let Some(value) = namespace.value_mut(key) {
                            for (base, renames) in &rename_sets {
                                prefix::rewrite_refs(value, base, renames);
                            }
                        }
                    }
                }
            }
            for channel in channels.values_mut() {
                for value in channel.messages.values_mut() {
                    for (base, renames) in &rename_sets {
                        prefix::rewrite_refs(value, base, renames);
                    }
                }
                for value in channel.rest.values_mut() {
                    for (base, renames) in &rename_sets {
                        prefix::rewrite_refs(value, base, renames);
                    }
                }
            }
        }

        // Channels fold with the configured strategy; conflict-time re-keys
        // feed into the operations' channel refs below.
        let mut channel_renames: BTreeMap<String, String> = BTreeMap::new();
        for (name, channel) in channels {
            if let InsertOutcome::Prefixed(new_name) = acc.channels.insert(
                name.clone(),
                channel.to_value(),
                service,
                ctx.strategy,
                log,
            )? {
                channel_renames.insert(name, new_name);
            }
        }

        // Operations: AsyncAPI keys these by operation ID, so collisions
        // surviving the prefix pass are always re-prefixed with the service
        // name, whatever the configured strategy.
        for operation in operations.values_mut() {
            prefix::rewrite_refs(&mut operation.channel, CHANNEL_REFS, &channel_renames);
            for value in operation.rest.values_mut() {
                prefix::rewrite_refs(value, CHANNEL_REFS, &channel_renames);
                for (base, renames) in &rename_sets {
                    prefix::rewrite_refs(value, base, renames);
                }
            }
        }
        for (id, operation) in operations {
            acc.operations.insert(
                id,
                operation.to_value(),
                service,
                ConflictStrategy::Prefix,
                log,
            )?;
        }

        Ok(())
    }

    fn assemble(acc: AsyncApiAcc, options: &MergeOptions) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "asyncapi".into(),
            Value::String(acc.version.unwrap_or_else(|| "3.0.0".to_string())),
        );

        let mut info = Map::new();
        info.insert("title".into(), Value::String(options.title.clone()));
        if let Some(description) = &options.description {
            info.insert("description".into(), Value::String(description.clone()));
        }
        info.insert("version".into(), Value::String(options.version.clone()));
        obj.insert("info".into(), Value::Object(info));

        if !acc.servers.is_empty() {
            obj.insert(
                "servers".into(),
                Value::Object(acc.servers.into_iter().collect()),
            );
        }

        obj.insert(
            "channels".into(),
            Value::Object(acc.channels.into_map().into_iter().collect()),
        );
        if !acc.operations.is_empty() {
            obj.insert(
                "operations".into(),
                Value::Object(acc.operations.into_map().into_iter().collect()),
            );
        }

        let mut components = Map::new();
        if !acc.messages.is_empty() {
            components.insert(
                "messages".into(),
                Value::Object(acc.messages.into_map().into_iter().collect()),
            );
        }
        if !acc.schemas.is_empty() {
            components.insert(
                "schemas".into(),
                Value::Object(acc.schemas.into_map().into_iter().collect()),
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

        for (key, value) in acc.extensions {
            obj.insert(key, value);
        }

        Value::Object(obj)
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

/// Rewrite refs across every raw value of the spec (used by the prefix
/// pre-pass, where the whole spec is still this service's own).
fn rewrite_spec_refs(spec: &mut AsyncApiSpec, base: &str, renames: &BTreeMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    for channel in spec.channels.values_mut() {
        for value in channel.messages.values_mut() {
            prefix::rewrite_refs(value, base, renames);
        }
        for value in channel.rest.values_mut() {
            prefix::rewrite_refs(value, base, renames);
        }
    }
    for operation in spec.operations.values_mut() {
        prefix::rewrite_refs(&mut operation.channel, base, renames);
        for value in operation.rest.values_mut() {
            prefix::rewrite_refs(value, base, renames);
        }
    }
    for value in spec.components.messages.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
    for value in spec.components.schemas.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
    for value in spec.components.rest.values_mut() {
        prefix::rewrite_refs(value, base, renames);
    }
}
