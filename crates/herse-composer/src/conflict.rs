//! Per-namespace conflict detection and resolution.
//!
//! Every mergeable namespace is an accumulator of key -> (value, owning
//! service). A key transitions unseen -> seen(owner) the first time any
//! service contributes it; on a second contribution from a different
//! service, the *incoming* service's strategy decides the outcome. Three-way
//! and deeper collisions are a sequential fold: the Nth contribution is
//! compared only against whatever currently occupies the key, never against
//! the original first occupant.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ComposeError, ComposeWarning};
use crate::manifest::ConflictStrategy;
use crate::mount;
use crate::prefix;

/// The mergeable namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceKind {
    Paths,
    Channels,
    Services,
    Procedures,
    Components,
    Parameters,
    Messages,
    Tags,
    OperationIds,
    SecuritySchemes,
}

impl NamespaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::Paths => "paths",
            NamespaceKind::Channels => "channels",
            NamespaceKind::Services => "services",
            NamespaceKind::Procedures => "procedures",
            NamespaceKind::Components => "components",
            NamespaceKind::Parameters => "parameters",
            NamespaceKind::Messages => "messages",
            NamespaceKind::Tags => "tags",
            NamespaceKind::OperationIds => "operation-ids",
            NamespaceKind::SecuritySchemes => "security-schemes",
        }
    }

    /// How re-keyed entries are joined in this namespace.
    pub fn key_style(&self) -> KeyStyle {
        match self {
            NamespaceKind::Paths => KeyStyle::Path,
            NamespaceKind::Channels | NamespaceKind::Services | NamespaceKind::Procedures => {
                KeyStyle::Dotted
            }
            _ => KeyStyle::Flat,
        }
    }

    /// Whether the `merge` strategy performs a structural union here.
    fn merges_structurally(&self) -> bool {
        matches!(self, NamespaceKind::Paths | NamespaceKind::Channels)
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a service prefix is joined onto a re-keyed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    Path,
    Flat,
    Dotted,
}

/// The service-prefixed form of a key in the given style.
pub fn prefixed_key(style: KeyStyle, service: &str, key: &str) -> String {
    match style {
        KeyStyle::Path => mount::join(&format!("/{}", service), key),
        KeyStyle::Flat => prefix::flat(service, key),
        KeyStyle::Dotted => prefix::dotted(service, key),
    }
}

/// A detected collision. Produced once, never mutated, appended to the
/// conflict log in encounter order.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub namespace: NamespaceKind,
    pub key: String,
    pub first_service: String,
    pub second_service: String,
    pub strategy: ConflictStrategy,
    pub resolution: String,
}

/// Conflicts and warnings accumulated across all namespaces of one merge,
/// in encounter order.
#[derive(Debug, Default)]
pub struct ConflictLog {
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<ComposeWarning>,
}

/// Outcome of inserting one contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Key was unseen (or re-contributed by its own service); inserted as-is.
    Inserted,
    /// Incoming contribution discarded; earlier entry stands.
    Skipped,
    /// Existing entry replaced.
    Overwritten,
    /// Inserted under the re-keyed name.
    Prefixed(String),
    /// Structurally merged into the existing entry.
    Merged,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    owner: String,
}

/// Accumulator for one mergeable namespace.
#[derive(Debug)]
pub struct Namespace {
    kind: NamespaceKind,
    entries: BTreeMap<String, Entry>,
}

impl Namespace {
    pub fn new(kind: NamespaceKind) -> Self {
        Namespace {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn owner_of(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.owner.as_str())
    }

    /// Mutable access to an entry's value, for post-insertion reference
    /// fixups on entries owned by the service currently being folded.
    pub fn value_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key).map(|e| &mut e.value)
    }

    /// Consume the namespace into its final key -> value map.
    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.entries
            .into_iter()
            .map(|(k, e)| (k, e.value))
            .collect()
    }

    /// Insert one contribution, running the resolution state machine.
    ///
    /// Only the `error` strategy returns `Err`; every other outcome is
    /// recorded in `log` and the merge continues.
    pub fn insert(
        &mut self,
        key: String,
        value: Value,
        service: &str,
        strategy: ConflictStrategy,
        log: &mut ConflictLog,
    ) -> Result<InsertOutcome, ComposeError> {
        let occupant = match self.entries.get(&key) {
            None => {
                self.entries.insert(key, Entry::new(value, service));
                return Ok(InsertOutcome::Inserted);
            }
            Some(existing) => existing.owner.clone(),
        };

        // A service re-contributing its own key is an update, not a
        // cross-service conflict.
        if occupant == service {
            self.entries.insert(key, Entry::new(value, service));
            return Ok(InsertOutcome::Inserted);
        }

        let first = occupant;
        match strategy {
            ConflictStrategy::Error => Err(ComposeError::Conflict {
                namespace: self.kind,
                key,
                first_service: first,
                second_service: service.to_string(),
            }),
            ConflictStrategy::Skip => {
                self.log(log, &key, &first, service, strategy, format!(
                    "Skipped; entry from '{}' retained",
                    first
                ));
                Ok(InsertOutcome::Skipped)
            }
            ConflictStrategy::Overwrite => {
                self.entries.insert(key.clone(), Entry::new(value, service));
                self.log(log, &key, &first, service, strategy, format!(
                    "Overwritten; entry from '{}' replaced",
                    first
                ));
                Ok(InsertOutcome::Overwritten)
            }
            ConflictStrategy::Prefix => {
                let new_key = prefixed_key(self.kind.key_style(), service, &key);
                if self.entries.contains_key(&new_key) {
                    // The prefixed key is itself occupied; overwrite there
                    // and surface it, since a clean re-key is impossible.
                    log.warnings.push(ComposeWarning {
                        code: "E2011".to_string(),
                        message: format!(
                            "prefixed {} key '{}' already occupied; overwriting",
                            self.kind, new_key
                        ),
                        location: Some(service.to_string()),
                    });
                }
                self.entries
                    .insert(new_key.clone(), Entry::new(value, service));
                self.log(log, &key, &first, service, strategy, format!(
                    "Prefixed to {}",
                    new_key
                ));
                Ok(InsertOutcome::Prefixed(new_key))
            }
            ConflictStrategy::Merge => {
                if self.kind.merges_structurally() {
                    if let Some(existing) = self.entries.get_mut(&key) {
                        union_objects(&mut existing.value, value);
                    }
                    self.log(log, &key, &first, service, strategy, format!(
                        "Merged; handlers united, '{}' preferred on overlap",
                        service
                    ));
                    Ok(InsertOutcome::Merged)
                } else {
                    self.entries.insert(key.clone(), Entry::new(value, service));
                    self.log(log, &key, &first, service, strategy, format!(
                        "Merged as overwrite (no structural merge for {})",
                        self.kind
                    ));
                    Ok(InsertOutcome::Merged)
                }
            }
        }
    }

    fn log(
        &self,
        log: &mut ConflictLog,
        key: &str,
        first: &str,
        second: &str,
        strategy: ConflictStrategy,
        resolution: String,
    ) {
        tracing::debug!(
            namespace = self.kind.as_str(),
            key,
            first_service = first,
            second_service = second,
            strategy = strategy.as_str(),
            resolution = resolution.as_str(),
            "conflict resolved"
        );
        log.conflicts.push(Conflict {
            namespace: self.kind,
            key: key.to_string(),
            first_service: first.to_string(),
            second_service: second.to_string(),
            strategy,
            resolution,
        });
    }
}

impl Entry {
    fn new(value: Value, owner: &str) -> Self {
        Entry {
            value,
            owner: owner.to_string(),
        }
    }
}

/// Shallow union of two objects: every field of `incoming` is inserted into
/// `existing`, replacing on overlap. Used for path-like structural merges
/// (method handlers united, incoming preferred). Non-object operands fall
/// back to replacement.
fn union_objects(existing: &mut Value, incoming: Value) {
    match incoming {
        Value::Object(source) if existing.is_object() => {
            if let Some(target) = existing.as_object_mut() {
                for (key, value) in source {
                    target.insert(key, value);
                }
            }
        }
        incoming => *existing = incoming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn insert(
        ns: &mut Namespace,
        log: &mut ConflictLog,
        key: &str,
        value: Value,
        service: &str,
        strategy: ConflictStrategy,
    ) -> InsertOutcome {
        ns.insert(key.to_string(), value, service, strategy, log)
            .unwrap()
    }

    #[test]
    fn first_contribution_inserts_silently() {
        let mut ns = Namespace::new(NamespaceKind::Paths);
        let mut log = ConflictLog::default();
        let outcome = insert(
            &mut ns,
            &mut log,
            "/users",
            json!({"get": {}}),
            "svc-a",
            ConflictStrategy::Skip,
        );
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(log.conflicts.is_empty());
    }

    #[test]
    fn skip_keeps_first_entry() {
        let mut ns = Namespace::new(NamespaceKind::Paths);
        let mut log = ConflictLog::default();
        insert(&mut ns, &mut log, "/health", json!({"get": {"a": 1}}), "svc-a", ConflictStrategy::Skip);
        let outcome = insert(&mut ns, &mut log, "/health", json!({"get": {"b": 2}}), "svc-b", ConflictStrategy::Skip);

        assert_eq!(outcome, InsertOutcome::Skipped);
        assert_eq!(log.conflicts.len(), 1);
        assert_eq!(log.conflicts[0].first_service, "svc-a");
        assert_eq!(log.conflicts[0].second_service, "svc-b");

        let map = ns.into_map();
        assert_eq!(map["/health"]["get"]["a"], json!(1));
    }

    #[test]
    fn overwrite_replaces_first_entry() {
        let mut ns = Namespace::new(NamespaceKind::Components);
        let mut log = ConflictLog::default();
        insert(&mut ns, &mut log, "User", json!({"v": 1}), "svc-a", ConflictStrategy::Skip);
        let outcome = insert(&mut ns, &mut log, "User", json!({"v": 2}), "svc-b", ConflictStrategy::Overwrite);

        assert_eq!(outcome, InsertOutcome::Overwritten);
        assert_eq!(ns.owner_of("User"), Some("svc-b"));

        let map = ns.into_map();
        assert_eq!(map["User"]["v"], json!(2));
    }

    #[test]
    fn prefix_rekeys_incoming_per_style() {
        let mut paths = Namespace::new(NamespaceKind::Paths);
        let mut log = ConflictLog::default();
        insert(&mut paths, &mut log, "/health", json!({}), "svc-a", ConflictStrategy::Skip);
        let outcome = insert(&mut paths, &mut log, "/health", json!({}), "svc-b", ConflictStrategy::Prefix);

        assert_eq!(outcome, InsertOutcome::Prefixed("/svc-b/health".to_string()));
        assert_eq!(log.conflicts[0].resolution, "Prefixed to /svc-b/health");
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/svc-b/health"));

        let mut channels = Namespace::new(NamespaceKind::Channels);
        insert(&mut channels, &mut log, "orders", json!({}), "svc-a", ConflictStrategy::Skip);
        let outcome = insert(&mut channels, &mut log, "orders", json!({}), "svc-b", ConflictStrategy::Prefix);
        assert_eq!(outcome, InsertOutcome::Prefixed("svc-b.orders".to_string()));

        let mut components = Namespace::new(NamespaceKind::Components);
        insert(&mut components, &mut log, "User", json!({}), "svc-a", ConflictStrategy::Skip);
        let outcome = insert(&mut components, &mut log, "User", json!({}), "svc-b", ConflictStrategy::Prefix);
        assert_eq!(outcome, InsertOutcome::Prefixed("svc-b_User".to_string()));
    }

    #[test]
    fn occupied_prefix_key_warns() {
        let mut ns = Namespace::new(NamespaceKind::Paths);
        let mut log = ConflictLog::default();
        insert(&mut ns, &mut log, "/health", json!({"v": 1}), "svc-a", ConflictStrategy::Skip);
        insert(&mut ns, &mut log, "/svc-b/health", json!({"v": 2}), "svc-c", ConflictStrategy::Skip);
        insert(&mut ns, &mut log, "/health", json!({"v": 3}), "svc-b", ConflictStrategy::Prefix);

        assert_eq!(log.warnings.len(), 1);
        assert_eq!(log.warnings[0].code, "E2011");

        let map = ns.into_map();
        assert_eq!(map["/svc-b/health"]["v"], json!(3));
    }

    #[test]
    fn merge_unites_method_handlers_incoming_wins() {
        let mut ns = Namespace::new(NamespaceKind::Paths);
        let mut log = ConflictLog::default();
        insert(
            &mut ns,
            &mut log,
            "/users",
            json!({"get": {"operationId": "a_list"}, "delete": {}}),
            "svc-a",
            ConflictStrategy::Skip,
        );
        let outcome = insert(
            &mut ns,
            &mut log,
            "/users",
            json!({"get": {"operationId": "b_list"}, "post": {}}),
            "svc-b",
            ConflictStrategy::Merge,
        );

        assert_eq!(outcome, InsertOutcome::Merged);
        let map = ns.into_map();
        let item = &map["/users"];
        // Union of methods; incoming wins the shared GET.
        assert_eq!(item["get"]["operationId"], json!("b_list"));
        assert!(item["delete"].is_object());
        assert!(item["post"].is_object());
    }

    #[test]
    fn merge_on_security_schemes_degrades_to_overwrite() {
        let mut ns = Namespace::new(NamespaceKind::SecuritySchemes);
        let mut log = ConflictLog::default();
        insert(&mut ns, &mut log, "bearer", json!({"scheme": "bearer"}), "svc-a", ConflictStrategy::Skip);
        insert(&mut ns, &mut log, "bearer", json!({"scheme": "basic"}), "svc-b", ConflictStrategy::Merge);

        assert!(log.conflicts[1].resolution.contains("overwrite"));
        let map = ns.into_map();
        assert_eq!(map["bearer"]["scheme"], json!("basic"));
    }

    #[test]
    fn error_strategy_aborts() {
        let mut ns = Namespace::new(NamespaceKind::Paths);
        let mut log = ConflictLog::default();
        insert(&mut ns, &mut log, "/users", json!({}), "svc-a", ConflictStrategy::Skip);
        let err = ns
            .insert(
                "/users".to_string(),
                json!({}),
                "svc-b",
                ConflictStrategy::Error,
                &mut log,
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::Conflict { .. }));
        assert!(err.to_string().contains("E2010"));
    }

    #[test]
    fn three_way_collision_folds_sequentially() {
        // svc-c is compared against the current occupant (svc-b after the
        // overwrite), never against svc-a.
        let mut ns = Namespace::new(NamespaceKind::Paths);
        let mut log = ConflictLog::default();
        insert(&mut ns, &mut log, "/health", json!({"v": "a"}), "svc-a", ConflictStrategy::Skip);
        insert(&mut ns, &mut log, "/health", json!({"v": "b"}), "svc-b", ConflictStrategy::Overwrite);
        insert(&mut ns, &mut log, "/health", json!({"v": "c"}), "svc-c", ConflictStrategy::Skip);

        assert_eq!(log.conflicts.len(), 2);
        assert_eq!(log.conflicts[1].first_service, "svc-b");
        assert_eq!(log.conflicts[1].second_service, "svc-c");

        let map = ns.into_map();
        assert_eq!(map["/health"]["v"], json!("b"));
    }

    #[test]
    fn same_service_recontribution_is_not_a_conflict() {
        let mut ns = Namespace::new(NamespaceKind::Components);
        let mut log = ConflictLog::default();
        insert(&mut ns, &mut log, "User", json!({"v": 1}), "svc-a", ConflictStrategy::Error);
        let outcome = insert(&mut ns, &mut log, "User", json!({"v": 2}), "svc-a", ConflictStrategy::Error);

        assert_eq!(outcome, InsertOutcome::Inserted);
        assert!(log.conflicts.is_empty());
        assert_eq!(ns.into_map()["User"]["v"], json!(2));
    }
}
