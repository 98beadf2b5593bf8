//! Route-mount rewriting.
//!
//! Rewrites a service's path-like keys into their gateway-visible form
//! before conflict detection runs, so collisions are evaluated on the key
//! the gateway would actually serve.

use std::collections::BTreeMap;

use crate::manifest::{MountStrategy, ServiceManifest};

/// The mount prefix for a service, or `None` for identity strategies.
pub fn mount_prefix(manifest: &ServiceManifest) -> Option<String> {
    match manifest.route.strategy {
        MountStrategy::Root | MountStrategy::Subdomain => None,
        MountStrategy::Instance => Some(format!("/{}", manifest.instance_id)),
        MountStrategy::Service => Some(format!("/{}", manifest.name)),
        MountStrategy::Versioned => Some(format!("/{}/{}", manifest.name, manifest.version)),
        MountStrategy::Custom => manifest
            .route
            .base_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(normalize_base_path),
    }
}

/// Normalize a configured base path: exactly one leading slash, no trailing.
fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Join a mount prefix and a key with exactly one `/` between them.
pub fn join(prefix: &str, key: &str) -> String {
    if key.starts_with('/') {
        format!("{}{}", prefix, key)
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Rewrite every key of a path-like map per the service's mount strategy.
/// Returns the rewritten map plus the old -> new mapping for reference
/// fixups.
pub fn rewrite_keys<V>(
    map: BTreeMap<String, V>,
    manifest: &ServiceManifest,
) -> (BTreeMap<String, V>, BTreeMap<String, String>) {
    let Some(prefix) = mount_prefix(manifest) else {
        return (map, BTreeMap::new());
    };

    let mut rewritten = BTreeMap::new();
    let mut renames = BTreeMap::new();
    for (key, value) in map {
        let new_key = join(&prefix, &key);
        renames.insert(key, new_key.clone());
        rewritten.insert(new_key, value);
    }
    (rewritten, renames)
}

/// Rewrite a single path-like key (used for AsyncAPI channel addresses).
pub fn rewrite_key(key: &str, manifest: &ServiceManifest) -> String {
    match mount_prefix(manifest) {
        Some(prefix) => join(&prefix, key),
        None => key.to_string(),
    }
}
