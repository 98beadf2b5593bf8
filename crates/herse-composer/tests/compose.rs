//! End-to-end composition properties, exercised through the coordinator.

use serde_json::{json, Value};

use herse_composer::{
    ComposeError, CompositionPolicy, ConflictStrategy, Coordinator, InlineFetcher, MergeOptions,
    MountStrategy, Protocol, RoutePolicy, SchemaDescriptor, SchemaLocation, ServiceManifest,
};

fn manifest(
    name: &str,
    instance_id: &str,
    strategy: MountStrategy,
    schemas: Vec<SchemaDescriptor>,
) -> ServiceManifest {
    ServiceManifest {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        instance_id: instance_id.to_string(),
        route: RoutePolicy {
            strategy,
            base_path: None,
            subdomain: None,
        },
        schemas,
    }
}

fn openapi(document: Value, conflict: Option<ConflictStrategy>) -> SchemaDescriptor {
    SchemaDescriptor {
        protocol: "openapi".to_string(),
        spec_version: None,
        location: SchemaLocation::Inline { inline: document },
        composition: conflict.map(|strategy| CompositionPolicy {
            conflict_strategy: Some(strategy),
            ..CompositionPolicy::default()
        }),
    }
}

fn paths_doc(paths: Value) -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {"title": "svc", "version": "1.0.0"},
        "paths": paths
    })
}

fn compose(manifests: &[ServiceManifest]) -> herse_composer::MultiProtocolResult {
    let fetcher = InlineFetcher;
    Coordinator::new(&fetcher, MergeOptions::default())
        .compose(manifests)
        .unwrap()
}

#[test]
fn merging_twice_is_byte_identical() {
    let manifests = vec![
        manifest(
            "user-service",
            "i1",
            MountStrategy::Instance,
            vec![openapi(
                paths_doc(json!({"/users": {"get": {"operationId": "list"}}})),
                None,
            )],
        ),
        manifest(
            "order-service",
            "i2",
            MountStrategy::Root,
            vec![openapi(
                paths_doc(json!({"/orders": {"get": {"operationId": "list"}}})),
                Some(ConflictStrategy::Prefix),
            )],
        ),
    ];

    let first = compose(&manifests);
    let second = compose(&manifests);

    let doc_a = &first.results[&Protocol::OpenApi];
    let doc_b = &second.results[&Protocol::OpenApi];
    assert_eq!(
        serde_json::to_string(&doc_a.document).unwrap(),
        serde_json::to_string(&doc_b.document).unwrap()
    );
    assert_eq!(doc_a.conflicts.len(), doc_b.conflicts.len());
    for (a, b) in doc_a.conflicts.iter().zip(&doc_b.conflicts) {
        assert_eq!(a.key, b.key);
        assert_eq!(a.resolution, b.resolution);
    }
}

#[test]
fn input_order_decides_conflict_winners() {
    let a = manifest(
        "service-a",
        "i1",
        MountStrategy::Root,
        vec![openapi(
            paths_doc(json!({"/health": {"get": {"summary": "a"}}})),
            Some(ConflictStrategy::Skip),
        )],
    );
    let b = manifest(
        "service-b",
        "i2",
        MountStrategy::Root,
        vec![openapi(
            paths_doc(json!({"/health": {"get": {"summary": "b"}}})),
            Some(ConflictStrategy::Skip),
        )],
    );

    // Skip is first-wins: whichever service arrives first keeps the key.
    let forward = compose(&[a.clone(), b.clone()]);
    let reverse = compose(&[b, a]);

    let forward_doc = &forward.results[&Protocol::OpenApi].document;
    let reverse_doc = &reverse.results[&Protocol::OpenApi].document;
    assert_eq!(forward_doc["paths"]["/health"]["get"]["summary"], json!("a"));
    assert_eq!(reverse_doc["paths"]["/health"]["get"]["summary"], json!("b"));
}

#[test]
fn prefix_round_trip_derivable_from_service_and_key() {
    let manifests = vec![
        manifest(
            "service-a",
            "i1",
            MountStrategy::Root,
            vec![openapi(paths_doc(json!({"/health": {"get": {}}})), None)],
        ),
        manifest(
            "service-b",
            "i2",
            MountStrategy::Root,
            vec![openapi(
                paths_doc(json!({"/health": {"get": {}}})),
                Some(ConflictStrategy::Prefix),
            )],
        ),
    ];
    let result = compose(&manifests);
    let merged = &result.results[&Protocol::OpenApi];

    let conflict = &merged.conflicts[0];
    assert_eq!(conflict.key, "/health");
    // The resolved key is exactly {service}{separator}{original key}.
    let derived = format!("/{}{}", conflict.second_service, conflict.key);
    assert_eq!(derived, "/service-b/health");
    assert_eq!(conflict.resolution, format!("Prefixed to {}", derived));
    assert!(merged.document["paths"]
        .as_object()
        .unwrap()
        .contains_key(derived.as_str()));
}

#[test]
fn excluded_service_never_appears() {
    let mut excluded_descriptor = openapi(
        paths_doc(json!({"/ghost": {"get": {}}})),
        Some(ConflictStrategy::Overwrite),
    );
    excluded_descriptor.composition = Some(CompositionPolicy {
        include_in_merged: false,
        conflict_strategy: Some(ConflictStrategy::Overwrite),
        ..CompositionPolicy::default()
    });

    let manifests = vec![
        manifest(
            "ghost-service",
            "i9",
            MountStrategy::Root,
            vec![excluded_descriptor],
        ),
        manifest(
            "user-service",
            "i1",
            MountStrategy::Instance,
            vec![openapi(paths_doc(json!({"/users": {"get": {}}})), None)],
        ),
    ];
    let result = compose(&manifests);
    let merged = &result.results[&Protocol::OpenApi];

    assert!(!merged
        .included_services
        .iter()
        .any(|s| s == "ghost-service"));
    assert_eq!(merged.excluded_services, vec!["ghost-service"]);
    let paths = merged.document["paths"].as_object().unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths.contains_key("/i1/users"));
}

#[test]
fn error_strategy_yields_no_partial_document() {
    let manifests = vec![
        manifest(
            "service-a",
            "i1",
            MountStrategy::Root,
            vec![openapi(paths_doc(json!({"/health": {"get": {}}})), None)],
        ),
        manifest(
            "service-b",
            "i2",
            MountStrategy::Root,
            vec![openapi(
                paths_doc(json!({"/health": {"get": {}}})),
                Some(ConflictStrategy::Error),
            )],
        ),
    ];

    let fetcher = InlineFetcher;
    let err = Coordinator::new(&fetcher, MergeOptions::default())
        .compose(&manifests)
        .unwrap_err();
    assert!(matches!(err, ComposeError::Conflict { .. }));
}

#[test]
fn merged_document_metadata_is_caller_supplied() {
    let manifests = vec![manifest(
        "user-service",
        "i1",
        MountStrategy::Instance,
        vec![openapi(paths_doc(json!({"/users": {"get": {}}})), None)],
    )];

    let fetcher = InlineFetcher;
    let options = MergeOptions {
        title: "Acme Gateway".to_string(),
        description: Some("All services".to_string()),
        version: "2024.6".to_string(),
        default_strategy: ConflictStrategy::Skip,
    };
    let result = Coordinator::new(&fetcher, options).compose(&manifests).unwrap();

    let info = &result.results[&Protocol::OpenApi].document["info"];
    assert_eq!(info["title"], json!("Acme Gateway"));
    assert_eq!(info["description"], json!("All services"));
    assert_eq!(info["version"], json!("2024.6"));
}

#[test]
fn warnings_flatten_across_protocols() {
    let manifests = vec![manifest(
        "mixed",
        "i1",
        MountStrategy::Root,
        vec![
            openapi(json!({"oops": true}), None),
            SchemaDescriptor {
                protocol: "soap".to_string(),
                spec_version: None,
                location: SchemaLocation::Inline { inline: json!({}) },
                composition: None,
            },
            openapi(paths_doc(json!({"/ok": {"get": {}}})), None),
        ],
    )];
    let result = compose(&manifests);

    // One coordinator-level warning (unsupported protocol), one merger-level
    // warning (parse failure) — both visible in the flattened list.
    assert!(result.warnings.iter().any(|w| w.code == "E2020"));
    assert!(result.warnings.iter().any(|w| w.code == "E2001"));
    assert!(result.results[&Protocol::OpenApi].document["paths"]
        .as_object()
        .unwrap()
        .contains_key("/ok"));
}
