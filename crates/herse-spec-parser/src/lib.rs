//! Per-protocol schema parsers for the Herse composition engine.
//!
//! Converts untyped schema documents (JSON-equivalent trees) into typed,
//! protocol-specific representations: paths/operations for OpenAPI,
//! channels/operations for AsyncAPI, services/messages for gRPC-derived
//! documents, and procedures for oRPC.
//!
//! Parsing is strict for the fields the merger acts on (paths, channels,
//! services, procedures, components, security schemes) and permissive for
//! everything else: unrecognized fields are copied into an extension bag and
//! round-trip unchanged through [`to_document`](ParsedSpec::to_document).
//! Parsing never mutates its input and is side-effect free.

pub mod asyncapi;
pub mod error;
pub mod grpc;
pub mod model;
pub mod openapi;
pub mod orpc;

mod util;

pub use error::ParseError;
pub use model::{
    AsyncApiSpec, AsyncComponents, AsyncOperation, Channel, Components, Extensions, GrpcMethod,
    GrpcService, GrpcSpec, Info, OpenApiSpec, Operation, OrpcSpec, PathItem, Procedure,
    ProcedureKind, Protocol, Tag,
};

use serde_json::Value;

/// A parsed schema of any supported protocol.
#[derive(Debug, Clone)]
pub enum ParsedSpec {
    OpenApi(OpenApiSpec),
    AsyncApi(AsyncApiSpec),
    Grpc(GrpcSpec),
    Orpc(OrpcSpec),
}

impl ParsedSpec {
    /// The protocol this spec was parsed as.
    pub fn protocol(&self) -> Protocol {
        match self {
            ParsedSpec::OpenApi(_) => Protocol::OpenApi,
            ParsedSpec::AsyncApi(_) => Protocol::AsyncApi,
            ParsedSpec::Grpc(_) => Protocol::Grpc,
            ParsedSpec::Orpc(_) => Protocol::Orpc,
        }
    }

    /// Re-serialize into the protocol's standard JSON document shape.
    pub fn to_document(&self) -> Value {
        match self {
            ParsedSpec::OpenApi(spec) => spec.to_document(),
            ParsedSpec::AsyncApi(spec) => spec.to_document(),
            ParsedSpec::Grpc(spec) => spec.to_document(),
            ParsedSpec::Orpc(spec) => spec.to_document(),
        }
    }
}

/// Parse a document declared to be of the given protocol.
pub fn parse_document(protocol: Protocol, document: &Value) -> Result<ParsedSpec, ParseError> {
    match protocol {
        Protocol::OpenApi => openapi::parse(document).map(ParsedSpec::OpenApi),
        Protocol::AsyncApi => asyncapi::parse(document).map(ParsedSpec::AsyncApi),
        Protocol::Grpc => grpc::parse(document).map(ParsedSpec::Grpc),
        Protocol::Orpc => orpc::parse(document).map(ParsedSpec::Orpc),
    }
}
