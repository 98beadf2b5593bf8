//! The per-protocol merge orchestration.
//!
//! All four protocols share one skeleton, specialized by a small
//! [`ProtocolAdapter`] capability set: for each service schema in input
//! order — exclusion check, parse (failure is a warning, not an abort),
//! mount, prefix, then fold every namespace through the conflict resolver.
//! Only a conflict under the `error` strategy aborts; everything else
//! degrades to warnings and exclusions and the merge completes with
//! best-effort output.

pub mod asyncapi;
pub mod grpc;
pub mod openapi;
pub mod orpc;

pub use asyncapi::AsyncApiAdapter;
pub use grpc::GrpcAdapter;
pub use openapi::OpenApiAdapter;
pub use orpc::OrpcAdapter;

use serde_json::Value;

use herse_spec_parser::{ParseError, Protocol};

use crate::conflict::{Conflict, ConflictLog};
use crate::error::{ComposeError, ComposeWarning};
use crate::manifest::{ConflictStrategy, ResolvedPolicy, ServiceManifest, ServiceSchema};

/// Metadata for the merged document. Caller-supplied; never derived from
/// any one service.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub title: String,
    pub description: Option<String>,
    pub version: String,
    /// Strategy for services whose policy does not name one.
    pub default_strategy: ConflictStrategy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            title: "Federated API".to_string(),
            description: None,
            version: "1.0.0".to_string(),
            default_strategy: ConflictStrategy::Skip,
        }
    }
}

/// The outcome of merging one protocol across all participating services.
#[derive(Debug)]
pub struct MergeResult {
    pub protocol: Protocol,
    /// The unified document, in the protocol's standard JSON shape.
    pub document: Value,
    /// Services that contributed entries, in input order.
    pub included_services: Vec<String>,
    /// Services excluded by policy or by parse failure.
    pub excluded_services: Vec<String>,
    /// Detected collisions, in encounter order.
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<ComposeWarning>,
}

/// Context for folding one service's spec into the accumulator.
pub struct FoldContext<'a> {
    pub service: &'a str,
    pub strategy: ConflictStrategy,
}

/// The capability set that specializes the shared merge skeleton per
/// protocol.
pub trait ProtocolAdapter {
    /// The parsed spec shape.
    type Spec;
    /// The namespace accumulator.
    type Acc: Default;

    const PROTOCOL: Protocol;

    fn parse(document: &Value) -> Result<Self::Spec, ParseError>;

    /// Apply the route-mount transformer and the name prefixer. Runs once
    /// per service, before conflict detection.
    fn prepare(spec: &mut Self::Spec, manifest: &ServiceManifest, policy: &ResolvedPolicy);

    /// Fold every namespace of `spec` into the accumulator through the
    /// conflict resolver. Only an `error`-strategy conflict returns `Err`.
    fn fold(
        acc: &mut Self::Acc,
        log: &mut ConflictLog,
        spec: Self::Spec,
        ctx: &FoldContext<'_>,
    ) -> Result<(), ComposeError>;

    /// Assemble the accumulated namespaces into the unified document.
    fn assemble(acc: Self::Acc, options: &MergeOptions) -> Value;
}

/// Merge one protocol's service schemas, in input order.
pub fn merge<A: ProtocolAdapter>(
    inputs: &[ServiceSchema],
    options: &MergeOptions,
) -> Result<MergeResult, ComposeError> {
    let mut acc = A::Acc::default();
    let mut log = ConflictLog::default();
    let mut included: Vec<String> = Vec::new();
    let mut excluded: Vec<String> = Vec::new();

    for input in inputs {
        let service = input.manifest.name.as_str();
        let policy = input
            .descriptor
            .resolve_policy(service, options.default_strategy);

        if !policy.include {
            tracing::debug!(service, "schema excluded by composition policy");
            push_unique(&mut excluded, service);
            continue;
        }

        let mut spec = match A::parse(&input.document) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(service, error = %e, "schema excluded: parse failed");
                log.warnings.push(ComposeWarning {
                    code: parse_warning_code(&e).to_string(),
                    message: e.to_string(),
                    location: Some(service.to_string()),
                });
                push_unique(&mut excluded, service);
                continue;
            }
        };

        A::prepare(&mut spec, &input.manifest, &policy);
        A::fold(
            &mut acc,
            &mut log,
            spec,
            &FoldContext {
                service,
                strategy: policy.strategy,
            },
        )?;
        push_unique(&mut included, service);
    }

    let document = A::assemble(acc, options);
    Ok(MergeResult {
        protocol: A::PROTOCOL,
        document,
        included_services: included,
        excluded_services: excluded,
        conflicts: log.conflicts,
        warnings: log.warnings,
    })
}

fn parse_warning_code(error: &ParseError) -> &'static str {
    match error {
        ParseError::MalformedSchema { .. } => "E2001",
        ParseError::UnsupportedVersion { .. } => "E2002",
    }
}

fn push_unique(list: &mut Vec<String>, service: &str) {
    if !list.iter().any(|s| s == service) {
        list.push(service.to_string());
    }
}
