//! oRPC merge adapter.
//!
//! Namespaces folded: procedures and contracts. No path concept, so the
//! route-mount transformer does not apply. Procedure names take the
//! protocol's native `.` separator; contract names take the flat component
//! prefix, with `$ref`s rewritten alongside every rename.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use herse_spec_parser::{orpc, Extensions, OrpcSpec, ParseError, Protocol};

use crate::conflict::{ConflictLog, InsertOutcome, Namespace, NamespaceKind};
use crate::error::ComposeError;
use crate::manifest::{ResolvedPolicy, ServiceManifest};
use crate::merge::{FoldContext, MergeOptions, ProtocolAdapter};
use crate::prefix;

const CONTRACT_REFS: &str = "#/contracts/";

pub struct OrpcAdapter;

pub struct OrpcAcc {
    procedures: Namespace,
    contracts: Namespace,
    extensions: Extensions,
}

impl Default for OrpcAcc {
    fn default() -> Self {
        OrpcAcc {
            procedures: Namespace::new(NamespaceKind::Procedures),
            contracts: Namespace::new(NamespaceKind::Components),
            extensions: Extensions::new(),
        }
    }
}

impl ProtocolAdapter for OrpcAdapter {
    type Spec = OrpcSpec;
    type Acc = OrpcAcc;

    const PROTOCOL: Protocol = Protocol::Orpc;

    fn parse(document: &Value) -> Result<OrpcSpec, ParseError> {
        orpc::parse(document)
    }

    fn prepare(spec: &mut OrpcSpec, _manifest: &ServiceManifest, policy: &ResolvedPolicy) {
        let (procedures, _) = prefix::rename_keys(std::mem::take(&mut spec.procedures), |name| {
            prefix::dotted(&policy.component_prefix, name)
        });
        spec.procedures = procedures;

        let (contracts, contract_renames) =
            prefix::rename_keys(std::mem::take(&mut spec.contracts), |name| {
                prefix::flat(&policy.component_prefix, name)
            });
        spec.contracts = contracts;

        for procedure in spec.procedures.values_mut() {
            if let Some(input) = &mut procedure.input {
                prefix::rewrite_refs(input, CONTRACT_REFS, &contract_renames);
            }
            if let Some(output) = &mut procedure.output {
                prefix::rewrite_refs(output, CONTRACT_REFS, &contract_renames);
            }
            for value in procedure.rest.values_mut() {
                prefix::rewrite_refs(value, CONTRACT_REFS, &contract_renames);
            }
        }
        for value in spec.contracts.values_mut() {
            prefix::rewrite_refs(value, CONTRACT_REFS, &contract_renames);
        }
    }

    fn fold(
        acc: &mut OrpcAcc,
        log: &mut ConflictLog,
        spec: OrpcSpec,
        ctx: &FoldContext<'_>,
    ) -> Result<(), ComposeError> {
        let service = ctx.service;
        let OrpcSpec {
            info: _,
            mut procedures,
            contracts,
            extensions,
        } = spec;

        for (key, value) in extensions {
            acc.extensions.entry(key).or_insert(value);
        }

        // Contracts first, so conflict-time renames can be fixed up in the
        // procedures below before those are inserted.
        let mut contract_renames = BTreeMap::new();
        let mut contract_keys = Vec::new();
        for (name, value) in contracts {
            match acc.contracts.insert(name.clone(), value, service, ctx.strategy, log)? {
                InsertOutcome::Prefixed(new_key) => {
                    contract_renames.insert(name, new_key.clone());
                    contract_keys.push(new_key);
                }
                InsertOutcome::Skipped => {}
                _ => contract_keys.push(name),
            }
        }
        if !contract_renames.is_empty() {
            for key in &contract_keys {
                if acc.contracts.owner_of(key) == Some(service) {
                    if let Some(value) = acc.contracts.value_mut(key) {
                        prefix::rewrite_refs(value, CONTRACT_REFS, &contract_renames);
                    }
                }
            }
            for procedure in procedures.values_mut() {
                if let Some(input) = &mut procedure.input {
                    prefix::rewrite_refs(input, CONTRACT_REFS, &contract_renames);
                }
                if let Some(output) = &mut procedure.output {
                    prefix::rewrite_refs(output, CONTRACT_REFS, &contract_renames);
                }
                for value in procedure.rest.values_mut() {
                    prefix::rewrite_refs(value, CONTRACT_REFS, &contract_renames);
                }
            }
        }

        for (name, procedure) in procedures {
            acc.procedures
                .insert(name, procedure.to_value(), service, ctx.strategy, log)?;
        }

        Ok(())
    }

    fn assemble(acc: OrpcAcc, options: &MergeOptions) -> Value {
        let mut obj = Map::new();

        let mut info = Map::new();
        info.insert("title".into(), Value::String(options.title.clone()));
        if let Some(description) = &options.description {
            info.insert("description".into(), Value::String(description.clone()));
        }
        info.insert("version".into(), Value::String(options.version.clone()));
        obj.insert("info".into(), Value::Object(info));

        obj.insert(
            "procedures".into(),
            Value::Object(acc.procedures.into_map().into_iter().collect()),
        );
        if !acc.contracts.is_empty() {
            obj.insert(
                "contracts".into(),
                Value::Object(acc.contracts.into_map().into_iter().collect()),
            );
        }
        for (key, value) in acc.extensions {
            obj.insert(key, value);
        }
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{
        CompositionPolicy, ConflictStrategy, MountStrategy, RoutePolicy, SchemaDescriptor,
        SchemaLocation, ServiceManifest, ServiceSchema,
    };
    use crate::merge::merge;
    use serde_json::json;

    fn service(name: &str, conflict: Option<ConflictStrategy>, document: Value) -> ServiceSchema {
        ServiceSchema {
            manifest: ServiceManifest {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                instance_id: format!("{}-1", name),
                route: RoutePolicy {
                    strategy: MountStrategy::Instance,
                    base_path: None,
                    subdomain: None,
                },
                schemas: Vec::new(),
            },
            descriptor: SchemaDescriptor {
                protocol: "orpc".to_string(),
                spec_version: None,
                location: SchemaLocation::Inline {
                    inline: document.clone(),
                },
                composition: conflict.map(|strategy| CompositionPolicy {
                    conflict_strategy: Some(strategy),
                    ..CompositionPolicy::default()
                }),
            },
            document,
        }
    }

    fn users_doc() -> Value {
        json!({
            "procedures": {
                "list": {
                    "kind": "query",
                    "output": {"$ref": "#/contracts/UserPage"}
                }
            },
            "contracts": {"UserPage": {"type": "object"}}
        })
    }

    #[test]
    fn procedures_dotted_contracts_flat() {
        let result =
            merge::<OrpcAdapter>(&[service("users", None, users_doc())], &MergeOptions::default())
                .unwrap();

        let procedures = result.document["procedures"].as_object().unwrap();
        assert!(procedures.contains_key("users.list"));
        assert_eq!(
            procedures["users.list"]["output"]["$ref"],
            json!("#/contracts/users_UserPage")
        );

        let contracts = result.document["contracts"].as_object().unwrap();
        assert!(contracts.contains_key("users_UserPage"));
    }

    #[test]
    fn contract_collision_prefix_rewrites_procedure_refs() {
        let policy = CompositionPolicy {
            component_prefix: Some("core".to_string()),
            ..CompositionPolicy::default()
        };
        let mut first = service("users", None, users_doc());
        first.descriptor.composition = Some(policy.clone());
        let mut second = service("admin", None, users_doc());
        second.descriptor.composition = Some(CompositionPolicy {
            conflict_strategy: Some(ConflictStrategy::Prefix),
            ..policy
        });

        let result = merge::<OrpcAdapter>(&[first, second], &MergeOptions::default()).unwrap();

        let contracts = result.document["contracts"].as_object().unwrap();
        assert!(contracts.contains_key("core_UserPage"));
        assert!(contracts.contains_key("admin_core_UserPage"));

        let procedures = result.document["procedures"].as_object().unwrap();
        assert_eq!(
            procedures["admin.core.list"]["output"]["$ref"],
            json!("#/contracts/admin_core_UserPage")
        );
    }

    #[test]
    fn overwrite_strategy_replaces_procedure() {
        let policy = CompositionPolicy {
            component_prefix: Some("rpc".to_string()),
            ..CompositionPolicy::default()
        };
        let mut first = service("users", None, users_doc());
        first.descriptor.composition = Some(policy.clone());
        let mut second = service(
            "admin",
            None,
            json!({
                "procedures": {"list": {"kind": "mutation"}},
                "contracts": {}
            }),
        );
        second.descriptor.composition = Some(CompositionPolicy {
            conflict_strategy: Some(ConflictStrategy::Overwrite),
            ..policy
        });

        let result = merge::<OrpcAdapter>(&[first, second], &MergeOptions::default()).unwrap();

        let procedures = result.document["procedures"].as_object().unwrap();
        assert_eq!(procedures["rpc.list"]["kind"], json!("mutation"));
        assert!(result
            .conflicts
            .iter()
            .any(|c| c.namespace == NamespaceKind::Procedures
                && c.resolution.contains("Overwritten")));
    }
}
