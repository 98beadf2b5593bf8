//! gRPC merge adapter.
//!
//! Namespaces folded: services and messages. There is no path concept, so
//! the route-mount transformer does not apply. Service names take the
//! protocol's native `.` separator; message names take the flat component
//! prefix, and method input/output type references are rewritten alongside
//! every rename.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use herse_spec_parser::{grpc, Extensions, GrpcSpec, ParseError, Protocol};

use crate::conflict::{ConflictLog, InsertOutcome, Namespace, NamespaceKind};
use crate::error::ComposeError;
use crate::manifest::{ResolvedPolicy, ServiceManifest};
use crate::merge::{FoldContext, MergeOptions, ProtocolAdapter};
use crate::prefix;

pub struct GrpcAdapter;

pub struct GrpcAcc {
    package: Option<String>,
    services: Namespace,
    messages: Namespace,
    extensions: Extensions,
}

impl Default for GrpcAcc {
    fn default() -> Self {
        GrpcAcc {
            package: None,
            services: Namespace::new(NamespaceKind::Services),
            messages: Namespace::new(NamespaceKind::Messages),
            extensions: Extensions::new(),
        }
    }
}

impl ProtocolAdapter for GrpcAdapter {
    type Spec = GrpcSpec;
    type Acc = GrpcAcc;

    const PROTOCOL: Protocol = Protocol::Grpc;

    fn parse(document: &Value) -> Result<GrpcSpec, ParseError> {
        grpc::parse(document)
    }

    fn prepare(spec: &mut GrpcSpec, _manifest: &ServiceManifest, policy: &ResolvedPolicy) {
        let (services, _) = prefix::rename_keys(std::mem::take(&mut spec.services), |name| {
            prefix::dotted(&policy.component_prefix, name)
        });
        spec.services = services;

        let (messages, message_renames) =
            prefix::rename_keys(std::mem::take(&mut spec.messages), |name| {
                prefix::flat(&policy.component_prefix, name)
            });
        spec.messages = messages;

        // Method input/output and message field types name messages by key.
        for service in spec.services.values_mut() {
            for method in service.methods.values_mut() {
                if let Some(input) = &method.input {
                    if let Some(new_name) = message_renames.get(input) {
                        method.input = Some(new_name.clone());
                    }
                }
                if let Some(output) = &method.output {
                    if let Some(new_name) = message_renames.get(output) {
                        method.output = Some(new_name.clone());
                    }
                }
                for value in method.rest.values_mut() {
                    prefix::rewrite_type_names(value, &message_renames);
                }
            }
        }
        for value in spec.messages.values_mut() {
            prefix::rewrite_type_names(value, &message_renames);
        }
    }

    fn fold(
        acc: &mut GrpcAcc,
        log: &mut ConflictLog,
        spec: GrpcSpec,
        ctx: &FoldContext<'_>,
    ) -> Result<(), ComposeError> {
        let service = ctx.service;
        let GrpcSpec {
            package,
            services,
            messages,
            extensions,
        } = spec;

        if acc.package.is_none() {
            acc.package = package;
        }
        for (key, value) in extensions {
            acc.extensions.entry(key).or_insert(value);
        }

        // Messages first, so conflict-time renames can be fixed up in the
        // service definitions below before those are inserted.
        let mut message_renames = BTreeMap::new();
        let mut message_keys = Vec::new();
        for (name, value) in messages {
            match acc.messages.insert(name.clone(), value, service, ctx.strategy, log)? {
                InsertOutcome::Prefixed(new_key) => {
                    message_renames.insert(name, new_key.clone());
                    message_keys.push(new_key);
                }
                InsertOutcome::Skipped => {}
                _ => message_keys.push(name),
            }
        }
        if !message_renames.is_empty() {
            for key in &message_keys {
                if acc.messages.owner_of(key) == Some(service) {
                    if let Some(value) = acc.messages.value_mut(key) {
                        prefix::rewrite_type_names(value, &message_renames);
                    }
                }
            }
        }

        for (name, mut definition) in services {
            if !message_renames.is_empty() {
                for method in definition.methods.values_mut() {
                    if let Some(input) = &method.input {
                        if let Some(new_name) = message_renames.get(input) {
                            method.input = Some(new_name.clone());
                        }
                    }
                    if let Some(output) = &method.output {
                        if let Some(new_name) = message_renames.get(output) {
                            method.output = Some(new_name.clone());
                        }
                    }
                }
            }
            acc.services
                .insert(name, definition.to_value(), service, ctx.strategy, log)?;
        }

        Ok(())
    }

    fn assemble(acc: GrpcAcc, _options: &MergeOptions) -> Value {
        let mut obj = Map::new();
        if let Some(package) = acc.package {
            obj.insert("package".into(), Value::String(package));
        }
        obj.insert(
            "services".into(),
            Value::Object(acc.services.into_map().into_iter().collect()),
        );
        if !acc.messages.is_empty() {
            obj.insert(
                "messages".into(),
                Value::Object(acc.messages.into_map().into_iter().collect()),
            );
        }
        for (key, value) in acc.extensions {
            obj.insert(key, value);
        }
        Value::Object(obj)
    }
}
