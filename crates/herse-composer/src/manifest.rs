//! Service manifests and per-schema composition policies.
//!
//! A manifest is a service instance's declaration of its identity, routing
//! policy, and exposed schemas. Manifests arrive from registry backends as
//! materialized lists; this module only models and defaults them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A service instance's manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceManifest {
    /// Service name (also the default naming prefix).
    pub name: String,
    /// Service version.
    #[serde(default = "default_service_version")]
    pub version: String,
    /// Unique instance identifier.
    pub instance_id: String,
    /// How this service's paths are mounted into the shared namespace.
    #[serde(default)]
    pub route: RoutePolicy,
    /// Schemas this instance exposes.
    #[serde(default)]
    pub schemas: Vec<SchemaDescriptor>,
}

fn default_service_version() -> String {
    "0.0.0".to_string()
}

/// Routing policy: mount strategy plus its strategy-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutePolicy {
    #[serde(default)]
    pub strategy: MountStrategy,
    /// Base path for the `custom` strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    /// Subdomain for the `subdomain` strategy (host dimension, not path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

/// How path-like keys are rewritten when merged into the shared namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountStrategy {
    /// No prefix.
    Root,
    /// Prefix with `/` + instance ID.
    #[default]
    Instance,
    /// Prefix with `/` + service name.
    Service,
    /// Prefix with `/` + service name + `/` + service version.
    Versioned,
    /// Prefix with the configured base path (identity when empty).
    Custom,
    /// Identity for the path; subdomain routing affects the host, not the path.
    Subdomain,
}

/// One schema exposed by a manifest: protocol, content location, and
/// composition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Declared protocol type ("openapi", "asyncapi", "grpc", "orpc", ...).
    /// Kept as a string so unknown types skip gracefully instead of failing
    /// to deserialize.
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,
    pub location: SchemaLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<CompositionPolicy>,
}

/// Where a schema document lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaLocation {
    /// Document embedded in the manifest.
    Inline { inline: Value },
    /// Document on disk (resolved relative to the manifest by file-based
    /// fetchers).
    Path { path: String },
    /// Remote document, fetched by an external collaborator.
    Url { url: String },
    /// Registry-stored document addressed by content key.
    Registry { registry: String },
}

impl SchemaLocation {
    /// A short description for warnings and error messages.
    pub fn describe(&self) -> String {
        match self {
            SchemaLocation::Inline { .. } => "inline".to_string(),
            SchemaLocation::Path { path } => format!("path: {}", path),
            SchemaLocation::Url { url } => format!("url: {}", url),
            SchemaLocation::Registry { registry } => format!("registry: {}", registry),
        }
    }
}

/// How to react when another service already occupies a key.
///
/// Strategies are per-service: the service that contributes a key second
/// decides how to react to the existing occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Abort the whole merge.
    Error,
    /// Discard the incoming contribution.
    Skip,
    /// Replace the existing entry.
    Overwrite,
    /// Re-key the incoming contribution under a service-prefixed name.
    Prefix,
    /// Structural merge for path-like entries; overwrite semantics elsewhere.
    Merge,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Error => "error",
            ConflictStrategy::Skip => "skip",
            ConflictStrategy::Overwrite => "overwrite",
            ConflictStrategy::Prefix => "prefix",
            ConflictStrategy::Merge => "merge",
        }
    }
}

impl std::str::FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(ConflictStrategy::Error),
            "skip" => Ok(ConflictStrategy::Skip),
            "overwrite" => Ok(ConflictStrategy::Overwrite),
            "prefix" => Ok(ConflictStrategy::Prefix),
            "merge" => Ok(ConflictStrategy::Merge),
            other => Err(format!(
                "unknown conflict strategy '{}' (expected error, skip, overwrite, prefix or merge)",
                other
            )),
        }
    }
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-schema composition configuration. Every field is optional; defaults
/// derive from the owning service's name and the merger-wide strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionPolicy {
    /// Opt out of merging entirely.
    #[serde(default = "default_include")]
    pub include_in_merged: bool,
    /// Prefix for component schemas / messages / contracts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_prefix: Option<String>,
    /// Prefix for tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_prefix: Option<String>,
    /// Prefix for operation IDs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id_prefix: Option<String>,
    /// Strategy applied when this service collides with an occupant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_strategy: Option<ConflictStrategy>,
}

fn default_include() -> bool {
    true
}

impl Default for CompositionPolicy {
    fn default() -> Self {
        CompositionPolicy {
            include_in_merged: true,
            component_prefix: None,
            tag_prefix: None,
            operation_id_prefix: None,
            conflict_strategy: None,
        }
    }
}

/// A composition policy with every default filled in for one service.
#[derive(Debug, Clone)]
pub struct ResolvedPolicy {
    pub include: bool,
    pub component_prefix: String,
    pub tag_prefix: String,
    pub operation_id_prefix: String,
    pub strategy: ConflictStrategy,
}

impl SchemaDescriptor {
    /// Resolve this descriptor's composition policy: prefixes default to the
    /// service name, the strategy to the merger-wide default.
    pub fn resolve_policy(
        &self,
        service_name: &str,
        default_strategy: ConflictStrategy,
    ) -> ResolvedPolicy {
        let policy = self.composition.clone().unwrap_or_default();
        ResolvedPolicy {
            include: policy.include_in_merged,
            component_prefix: policy
                .component_prefix
                .unwrap_or_else(|| service_name.to_string()),
            tag_prefix: policy.tag_prefix.unwrap_or_else(|| service_name.to_string()),
            operation_id_prefix: policy
                .operation_id_prefix
                .unwrap_or_else(|| service_name.to_string()),
            strategy: policy.conflict_strategy.unwrap_or(default_strategy),
        }
    }
}

/// One (service, protocol) input unit: the owning manifest, the descriptor
/// that declared the schema, and its raw document.
#[derive(Debug, Clone)]
pub struct ServiceSchema {
    pub manifest: ServiceManifest,
    pub descriptor: SchemaDescriptor,
    pub document: Value,
}
