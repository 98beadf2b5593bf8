use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unrecognized fields preserved verbatim (vendor extensions included).
pub type Extensions = BTreeMap<String, Value>;

/// Protocol of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    OpenApi,
    AsyncApi,
    Grpc,
    Orpc,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::OpenApi => "openapi",
            Protocol::AsyncApi => "asyncapi",
            Protocol::Grpc => "grpc",
            Protocol::Orpc => "orpc",
        }
    }

    /// Resolve a declared protocol name. Returns `None` for protocol types
    /// this engine does not implement, so callers can skip them gracefully.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "openapi" => Some(Protocol::OpenApi),
            "asyncapi" => Some(Protocol::AsyncApi),
            "grpc" => Some(Protocol::Grpc),
            "orpc" => Some(Protocol::Orpc),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `info` block shared by all protocols.
#[derive(Debug, Clone, Default)]
pub struct Info {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    /// Other `info` fields (contact, license, vendor extensions).
    pub rest: Extensions,
}

impl Info {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("title".into(), Value::String(self.title.clone()));
        obj.insert("version".into(), Value::String(self.version.clone()));
        if let Some(desc) = &self.description {
            obj.insert("description".into(), Value::String(desc.clone()));
        }
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// OpenAPI
// ---------------------------------------------------------------------------

/// A parsed OpenAPI 3.x document.
#[derive(Debug, Clone)]
pub struct OpenApiSpec {
    /// The root `openapi` version string (e.g. "3.1.0").
    pub version: String,
    pub info: Info,
    pub servers: Vec<Value>,
    /// Path template -> path item. Keys are the canonical identifiers the
    /// merger resolves conflicts on.
    pub paths: BTreeMap<String, PathItem>,
    pub components: Components,
    pub tags: Vec<Tag>,
    /// Unrecognized root fields (security, externalDocs, x-*).
    pub extensions: Extensions,
}

/// One OpenAPI path item: HTTP method -> operation, plus path-level fields.
#[derive(Debug, Clone, Default)]
pub struct PathItem {
    /// Lowercase HTTP method -> operation.
    pub operations: BTreeMap<String, Operation>,
    /// Path-level fields (parameters, summary, vendor extensions).
    pub rest: Extensions,
}

/// A single OpenAPI operation. Only the fields the merger renames are lifted
/// out; everything else stays in `rest`.
#[derive(Debug, Clone, Default)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub rest: Extensions,
}

/// The `components` block, split into the namespaces the merger folds.
#[derive(Debug, Clone, Default)]
pub struct Components {
    pub schemas: BTreeMap<String, Value>,
    pub parameters: BTreeMap<String, Value>,
    pub security_schemes: BTreeMap<String, Value>,
    /// Other component groups (responses, requestBodies, headers, ...).
    pub rest: Extensions,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.parameters.is_empty()
            && self.security_schemes.is_empty()
            && self.rest.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if !self.schemas.is_empty() {
            obj.insert("schemas".into(), map_to_value(&self.schemas));
        }
        if !self.parameters.is_empty() {
            obj.insert("parameters".into(), map_to_value(&self.parameters));
        }
        if !self.security_schemes.is_empty() {
            obj.insert("securitySchemes".into(), map_to_value(&self.security_schemes));
        }
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

/// A global tag declaration.
#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub rest: Extensions,
}

impl Operation {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(id) = &self.operation_id {
            obj.insert("operationId".into(), Value::String(id.clone()));
        }
        if let Some(tags) = &self.tags {
            obj.insert(
                "tags".into(),
                Value::Array(tags.iter().map(|t| Value::String(t.clone())).collect()),
            );
        }
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl PathItem {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (method, op) in &self.operations {
            obj.insert(method.clone(), op.to_value());
        }
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl OpenApiSpec {
    /// Re-serialize into the standard OpenAPI document shape.
    pub fn to_document(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("openapi".into(), Value::String(self.version.clone()));
        obj.insert("info".into(), self.info.to_value());
        if !self.servers.is_empty() {
            obj.insert("servers".into(), Value::Array(self.servers.clone()));
        }
        obj.insert(
            "paths".into(),
            Value::Object(
                self.paths
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        );
        if !self.components.is_empty() {
            obj.insert("components".into(), self.components.to_value());
        }
        if !self.tags.is_empty() {
            obj.insert(
                "tags".into(),
                Value::Array(
                    self.tags
                        .iter()
                        .map(|t| {
                            let mut tag = Map::new();
                            tag.insert("name".into(), Value::String(t.name.clone()));
                            for (k, v) in &t.rest {
                                tag.insert(k.clone(), v.clone());
                            }
                            Value::Object(tag)
                        })
                        .collect(),
                ),
            );
        }
        for (k, v) in &self.extensions {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// AsyncAPI
// ---------------------------------------------------------------------------

/// A parsed AsyncAPI 3.x document.
#[derive(Debug, Clone)]
pub struct AsyncApiSpec {
    /// The root `asyncapi` version string (e.g. "3.0.0").
    pub version: String,
    pub info: Info,
    pub servers: BTreeMap<String, Value>,
    /// Channel name -> channel definition.
    pub channels: BTreeMap<String, Channel>,
    /// Operation ID -> operation definition.
    pub operations: BTreeMap<String, AsyncOperation>,
    pub components: AsyncComponents,
    pub extensions: Extensions,
}

/// One AsyncAPI channel.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    pub address: Option<String>,
    pub messages: BTreeMap<String, Value>,
    /// Other channel fields (parameters, bindings, ...).
    pub rest: Extensions,
}

/// One AsyncAPI operation.
#[derive(Debug, Clone)]
pub struct AsyncOperation {
    /// "send" or "receive".
    pub action: String,
    /// Channel reference (`{"$ref": "#/channels/..."}`) or inline channel.
    pub channel: Value,
    pub rest: Extensions,
}

/// The AsyncAPI `components` block.
#[derive(Debug, Clone, Default)]
pub struct AsyncComponents {
    pub messages: BTreeMap<String, Value>,
    pub schemas: BTreeMap<String, Value>,
    pub security_schemes: BTreeMap<String, Value>,
    pub rest: Extensions,
}

impl AsyncComponents {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.schemas.is_empty()
            && self.security_schemes.is_empty()
            && self.rest.is_empty()
    }
}

impl Channel {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(address) = &self.address {
            obj.insert("address".into(), Value::String(address.clone()));
        }
        if !self.messages.is_empty() {
            obj.insert("messages".into(), map_to_value(&self.messages));
        }
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl AsyncOperation {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("action".into(), Value::String(self.action.clone()));
        obj.insert("channel".into(), self.channel.clone());
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl AsyncApiSpec {
    /// Re-serialize into the standard AsyncAPI document shape.
    pub fn to_document(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("asyncapi".into(), Value::String(self.version.clone()));
        obj.insert("info".into(), self.info.to_value());
        if !self.servers.is_empty() {
            obj.insert("servers".into(), map_to_value(&self.servers));
        }
        obj.insert(
            "channels".into(),
            Value::Object(
                self.channels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        );
        if !self.operations.is_empty() {
            obj.insert(
                "operations".into(),
                Value::Object(
                    self.operations
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_value()))
                        .collect(),
                ),
            );
        }
        if !self.components.is_empty() {
            let mut components = Map::new();
            if !self.components.messages.is_empty() {
                components.insert("messages".into(), map_to_value(&self.components.messages));
            }
            if !self.components.schemas.is_empty() {
                components.insert("schemas".into(), map_to_value(&self.components.schemas));
            }
            if !self.components.security_schemes.is_empty() {
                components.insert(
                    "securitySchemes".into(),
                    map_to_value(&self.components.security_schemes),
                );
            }
            for (k, v) in &self.components.rest {
                components.insert(k.clone(), v.clone());
            }
            obj.insert("components".into(), Value::Object(components));
        }
        for (k, v) in &self.extensions {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// gRPC-derived
// ---------------------------------------------------------------------------

/// A parsed gRPC-derived document.
///
/// The wire format generator emits `{services, messages}` where `messages`
/// holds every named type (messages and enums alike, protobuf-style single
/// type namespace).
#[derive(Debug, Clone)]
pub struct GrpcSpec {
    pub package: Option<String>,
    pub services: BTreeMap<String, GrpcService>,
    pub messages: BTreeMap<String, Value>,
    pub extensions: Extensions,
}

/// One gRPC service: method name -> method definition.
#[derive(Debug, Clone, Default)]
pub struct GrpcService {
    pub methods: BTreeMap<String, GrpcMethod>,
    pub rest: Extensions,
}

/// One gRPC method. Input/output name message types by key.
#[derive(Debug, Clone, Default)]
pub struct GrpcMethod {
    pub input: Option<String>,
    pub output: Option<String>,
    pub rest: Extensions,
}

impl GrpcMethod {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(input) = &self.input {
            obj.insert("input".into(), Value::String(input.clone()));
        }
        if let Some(output) = &self.output {
            obj.insert("output".into(), Value::String(output.clone()));
        }
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl GrpcService {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "methods".into(),
            Value::Object(
                self.methods
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        );
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl GrpcSpec {
    /// Re-serialize into the gRPC-derived document shape.
    pub fn to_document(&self) -> Value {
        let mut obj = Map::new();
        if let Some(package) = &self.package {
            obj.insert("package".into(), Value::String(package.clone()));
        }
        obj.insert(
            "services".into(),
            Value::Object(
                self.services
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        );
        if !self.messages.is_empty() {
            obj.insert("messages".into(), map_to_value(&self.messages));
        }
        for (k, v) in &self.extensions {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// oRPC
// ---------------------------------------------------------------------------

/// A parsed oRPC contract document: procedure name -> procedure, plus a
/// `contracts` block of reusable named schemas.
#[derive(Debug, Clone)]
pub struct OrpcSpec {
    pub info: Info,
    pub procedures: BTreeMap<String, Procedure>,
    pub contracts: BTreeMap<String, Value>,
    pub extensions: Extensions,
}

/// One oRPC procedure.
#[derive(Debug, Clone, Default)]
pub struct Procedure {
    pub kind: ProcedureKind,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub rest: Extensions,
}

/// Procedure kind. Defaults to `query` when the document omits it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl ProcedureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
            ProcedureKind::Subscription => "subscription",
        }
    }
}

impl Procedure {
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("kind".into(), Value::String(self.kind.as_str().to_string()));
        if let Some(input) = &self.input {
            obj.insert("input".into(), input.clone());
        }
        if let Some(output) = &self.output {
            obj.insert("output".into(), output.clone());
        }
        for (k, v) in &self.rest {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl OrpcSpec {
    /// Re-serialize into the oRPC document shape.
    pub fn to_document(&self) -> Value {
        let mut obj = Map::new();
        if !self.info.title.is_empty() {
            obj.insert("info".into(), self.info.to_value());
        }
        obj.insert(
            "procedures".into(),
            Value::Object(
                self.procedures
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        );
        if !self.contracts.is_empty() {
            obj.insert("contracts".into(), map_to_value(&self.contracts));
        }
        for (k, v) in &self.extensions {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

fn map_to_value(map: &BTreeMap<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}
