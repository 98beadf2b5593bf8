//! Composition benchmarks.
//!
//! Measures merging N OpenAPI services into one federated spec, including
//! parsing, mounting, prefixing and conflict resolution.
//!
//! Run with: cargo bench -p herse-composer --bench compose

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use herse_composer::{
    merge_protocol, CompositionPolicy, ConflictStrategy, MergeOptions, MountStrategy, Protocol,
    RoutePolicy, SchemaDescriptor, SchemaLocation, ServiceManifest, ServiceSchema,
};

/// Build N service schemas, each with a handful of routes and one component.
/// Every service also declares `/health`, so conflicts are exercised.
fn generate_services(service_count: usize) -> Vec<ServiceSchema> {
    (0..service_count)
        .map(|i| {
            let name = format!("service-{}", i);
            let document = json!({
                "openapi": "3.1.0",
                "info": {"title": name, "version": "1.0.0"},
                "paths": {
                    (format!("/{}/items", name)): {
                        "get": {"operationId": "listItems", "tags": ["items"]},
                        "post": {"operationId": "createItem", "tags": ["items"]}
                    },
                    (format!("/{}/items/{{id}}", name)): {
                        "get": {
                            "operationId": "getItem",
                            "responses": {
                                "200": {
                                    "content": {
                                        "application/json": {
                                            "schema": {"$ref": "#/components/schemas/Item"}
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "/health": {"get": {"operationId": "health"}}
                },
                "components": {"schemas": {"Item": {"type": "object"}}},
                "tags": [{"name": "items"}]
            });
            ServiceSchema {
                manifest: ServiceManifest {
                    name: name.clone(),
                    version: "1.0.0".to_string(),
                    instance_id: format!("i{}", i),
                    route: RoutePolicy {
                        strategy: MountStrategy::Root,
                        base_path: None,
                        subdomain: None,
                    },
                    schemas: Vec::new(),
                },
                descriptor: SchemaDescriptor {
                    protocol: "openapi".to_string(),
                    spec_version: None,
                    location: SchemaLocation::Inline {
                        inline: document.clone(),
                    },
                    composition: Some(CompositionPolicy {
                        conflict_strategy: Some(ConflictStrategy::Prefix),
                        ..CompositionPolicy::default()
                    }),
                },
                document,
            }
        })
        .collect()
}

fn bench_openapi_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("openapi_merge");
    let options = MergeOptions::default();

    for service_count in [10, 50, 100] {
        let inputs = generate_services(service_count);

        group.bench_with_input(
            BenchmarkId::new("merge", format!("{}_services", service_count)),
            &inputs,
            |b, inputs| {
                b.iter(|| {
                    let result =
                        merge_protocol(Protocol::OpenApi, black_box(inputs), &options);
                    black_box(result.unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_openapi_merge);
criterion_main!(benches);
