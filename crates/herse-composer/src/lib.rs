//! Multi-protocol schema composition engine.
//!
//! Takes API contract schemas (OpenAPI, AsyncAPI, gRPC-derived, oRPC)
//! published by independent service instances and merges them into a single
//! federated specification per protocol, resolving naming and path
//! collisions deterministically.
//!
//! The pipeline per service is parse -> mount -> prefix -> resolve ->
//! accumulate; the [`coordinator`] fans manifests out to one merger per
//! declared protocol. Every merge is a pure function of its ordered inputs:
//! no I/O, no state across calls, and identical input yields an identical
//! unified document and conflict log. Reordering inputs can legitimately
//! change which service wins a conflict under `skip`/`overwrite`.

pub mod conflict;
pub mod coordinator;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod mount;
pub mod prefix;

pub use conflict::{Conflict, ConflictLog, InsertOutcome, Namespace, NamespaceKind};
pub use coordinator::{
    merge_protocol, Coordinator, InlineFetcher, MultiProtocolResult, SchemaFetcher,
};
pub use error::{ComposeError, ComposeWarning, FetchError};
pub use manifest::{
    CompositionPolicy, ConflictStrategy, MountStrategy, ResolvedPolicy, RoutePolicy,
    SchemaDescriptor, SchemaLocation, ServiceManifest, ServiceSchema,
};
pub use merge::{merge, MergeOptions, MergeResult};

// Re-export the parser's protocol identifier; it is part of this crate's API.
pub use herse_spec_parser::Protocol;
