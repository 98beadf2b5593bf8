//! Multi-protocol coordination.
//!
//! Fans service manifests out to the per-protocol mergers by inspecting
//! each manifest's declared schema types, resolving content through a
//! caller-supplied fetcher, and assembles a combined result. Unknown
//! protocol types and unfetchable content degrade to warnings; a fatal
//! per-protocol error (a conflict under the `error` strategy) fails the
//! whole call. Callers wanting partial-failure isolation across protocols
//! should invoke [`merge_protocol`] per group instead.

use std::collections::BTreeMap;

use serde_json::Value;

use herse_spec_parser::Protocol;

use crate::error::{ComposeError, ComposeWarning, FetchError};
use crate::manifest::{SchemaLocation, ServiceManifest, ServiceSchema};
use crate::merge::{
    merge, AsyncApiAdapter, GrpcAdapter, MergeOptions, MergeResult, OpenApiAdapter, OrpcAdapter,
};

/// Resolves schema content for a location descriptor. Implementations cover
/// inline-embedded, file-based, HTTP-fetched and registry-stored schemas;
/// the core ships only the inline one and consumes the rest as
/// collaborators.
pub trait SchemaFetcher {
    fn fetch(&self, location: &SchemaLocation) -> Result<Value, FetchError>;
}

/// Serves inline-embedded documents only.
#[derive(Debug, Default)]
pub struct InlineFetcher;

impl SchemaFetcher for InlineFetcher {
    fn fetch(&self, location: &SchemaLocation) -> Result<Value, FetchError> {
        match location {
            SchemaLocation::Inline { inline } => Ok(inline.clone()),
            other => Err(FetchError::Unsupported(other.describe())),
        }
    }
}

/// The combined outcome of one multi-protocol composition.
#[derive(Debug)]
pub struct MultiProtocolResult {
    /// One merge result per protocol actually present in the input.
    pub results: BTreeMap<Protocol, MergeResult>,
    /// Protocol -> included-services index.
    pub included: BTreeMap<Protocol, Vec<String>>,
    /// Coordinator-level warnings followed by every merger's warnings.
    pub warnings: Vec<ComposeWarning>,
}

/// Groups manifests by declared protocol and runs one merger per group.
pub struct Coordinator<'a> {
    fetcher: &'a dyn SchemaFetcher,
    options: MergeOptions,
}

impl<'a> Coordinator<'a> {
    pub fn new(fetcher: &'a dyn SchemaFetcher, options: MergeOptions) -> Self {
        Coordinator { fetcher, options }
    }

    /// Compose every schema declared by `manifests` into one unified
    /// document per protocol.
    pub fn compose(
        &self,
        manifests: &[ServiceManifest],
    ) -> Result<MultiProtocolResult, ComposeError> {
        let mut groups: BTreeMap<Protocol, Vec<ServiceSchema>> = BTreeMap::new();
        let mut warnings = Vec::new();

        for manifest in manifests {
            for descriptor in &manifest.schemas {
                let Some(protocol) = Protocol::from_name(&descriptor.protocol) else {
                    tracing::warn!(
                        service = manifest.name.as_str(),
                        protocol = descriptor.protocol.as_str(),
                        "unsupported protocol type; schema skipped"
                    );
                    warnings.push(ComposeWarning {
                        code: "E2020".to_string(),
                        message: format!(
                            "unsupported protocol type '{}' declared by '{}'; schema skipped",
                            descriptor.protocol, manifest.name
                        ),
                        location: Some(manifest.name.clone()),
                    });
                    continue;
                };

                let document = match self.fetcher.fetch(&descriptor.location) {
                    Ok(document) => document,
                    Err(e) => {
                        tracing::warn!(
                            service = manifest.name.as_str(),
                            location = descriptor.location.describe().as_str(),
                            error = %e,
                            "schema content unavailable; schema skipped"
                        );
                        warnings.push(ComposeWarning {
                            code: "E2021".to_string(),
                            message: format!("{}: {}", manifest.name, e),
                            location: Some(descriptor.location.describe()),
                        });
                        continue;
                    }
                };

                groups.entry(protocol).or_default().push(ServiceSchema {
                    manifest: manifest.clone(),
                    descriptor: descriptor.clone(),
                    document,
                });
            }
        }

        let mut results = BTreeMap::new();
        for (protocol, inputs) in groups {
            let result = merge_protocol(protocol, &inputs, &self.options)?;
            tracing::info!(
                protocol = protocol.as_str(),
                included = result.included_services.len(),
                excluded = result.excluded_services.len(),
                conflicts = result.conflicts.len(),
                "protocol merged"
            );
            results.insert(protocol, result);
        }

        let included = results
            .iter()
            .map(|(protocol, result)| (*protocol, result.included_services.clone()))
            .collect();
        for result in results.values() {
            warnings.extend(result.warnings.iter().cloned());
        }

        Ok(MultiProtocolResult {
            results,
            included,
            warnings,
        })
    }
}

/// Merge a single protocol group. This is the per-protocol entry point for
/// callers that want partial-failure isolation across protocols.
pub fn merge_protocol(
    protocol: Protocol,
    inputs: &[ServiceSchema],
    options: &MergeOptions,
) -> Result<MergeResult, ComposeError> {
    match protocol {
        Protocol::OpenApi => merge::<OpenApiAdapter>(inputs, options),
        Protocol::AsyncApi => merge::<AsyncApiAdapter>(inputs, options),
        Protocol::Grpc => merge::<GrpcAdapter>(inputs, options),
        Protocol::Orpc => merge::<OrpcAdapter>(inputs, options),
    }
}
