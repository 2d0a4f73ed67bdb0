//! The input document object model.
//!
//! These types mirror the subset of OpenAPI 3.x the generator reads. They are deserialized
//! once by [`crate::loader`] and treated as immutable afterwards; all schema dereferencing is
//! done by the generator itself through [`Document::component_schema`].

use crate::error::{Error, Result};
use crate::schema::{reference_id, Extensions, Schema};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Security requirement: scheme name -> required scopes
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// A parsed OpenAPI document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Document {
    pub openapi: String,
    pub info: Info,
    pub servers: Vec<Server>,
    /// `None` when the document has no `paths` object at all
    pub paths: Option<IndexMap<String, PathItem>>,
    pub components: Components,
    pub security: Option<Vec<SecurityRequirement>>,
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Info {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Server {
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
    pub description: Option<String>,
}

/// Either a `$ref` or an inline value
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MaybeRef<T> {
    Reference {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Item(T),
}

/// All operations under one path
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathItem {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub options: Option<Operation>,
    pub head: Option<Operation>,
    pub patch: Option<Operation>,
    pub trace: Option<Operation>,
    pub parameters: Vec<MaybeRef<Parameter>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// HTTP methods an OpenAPI path item can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<MaybeRef<Parameter>>,
    pub request_body: Option<MaybeRef<RequestBody>>,
    #[serde(deserialize_with = "deserialize_responses")]
    pub responses: IndexMap<String, MaybeRef<Response>>,
    pub security: Option<Vec<SecurityRequirement>>,
    pub deprecated: bool,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Where a parameter is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestBody {
    pub description: Option<String>,
    pub content: IndexMap<String, MediaType>,
    pub required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaType {
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Response {
    pub description: String,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Components {
    pub schemas: IndexMap<String, Schema>,
    pub parameters: IndexMap<String, Parameter>,
    pub request_bodies: IndexMap<String, RequestBody>,
    pub responses: IndexMap<String, Response>,
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub scheme: Option<String>,
    pub bearer_format: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "in")]
    pub location: Option<String>,
    pub flows: Option<OAuthFlows>,
    pub open_id_connect_url: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuthFlows {
    pub implicit: Option<OAuthFlow>,
    pub password: Option<OAuthFlow>,
    pub client_credentials: Option<OAuthFlow>,
    pub authorization_code: Option<OAuthFlow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuthFlow {
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub refresh_url: Option<String>,
    pub scopes: IndexMap<String, String>,
}

impl Document {
    /// Parses a document from YAML (which also accepts JSON).
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parses a document from JSON.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Looks up a component schema by bare name or `$ref` string.
    pub fn component_schema(&self, reference: &str) -> Option<&Schema> {
        self.components.schemas.get(&reference_id(reference))
    }

    /// Looks up a component schema, failing on a dangling reference.
    pub fn require_schema(&self, reference: &str) -> Result<&Schema> {
        self.component_schema(reference)
            .ok_or_else(|| Error::UnresolvedReference {
                reference: reference.to_string(),
            })
    }

    /// Whether a component schema with the given bare name exists.
    pub fn is_component(&self, name: &str) -> bool {
        self.components.schemas.contains_key(name)
    }

    pub fn resolve_parameter<'a>(&'a self, parameter: &'a MaybeRef<Parameter>) -> Result<&'a Parameter> {
        match parameter {
            MaybeRef::Item(item) => Ok(item),
            MaybeRef::Reference { reference } => self
                .components
                .parameters
                .get(&reference_id(reference))
                .ok_or_else(|| Error::UnresolvedReference {
                    reference: reference.clone(),
                }),
        }
    }

    pub fn resolve_request_body<'a>(
        &'a self,
        body: &'a MaybeRef<RequestBody>,
    ) -> Result<&'a RequestBody> {
        match body {
            MaybeRef::Item(item) => Ok(item),
            MaybeRef::Reference { reference } => self
                .components
                .request_bodies
                .get(&reference_id(reference))
                .ok_or_else(|| Error::UnresolvedReference {
                    reference: reference.clone(),
                }),
        }
    }

    pub fn resolve_response<'a>(&'a self, response: &'a MaybeRef<Response>) -> Result<&'a Response> {
        match response {
            MaybeRef::Item(item) => Ok(item),
            MaybeRef::Reference { reference } => self
                .components
                .responses
                .get(&reference_id(reference))
                .ok_or_else(|| Error::UnresolvedReference {
                    reference: reference.clone(),
                }),
        }
    }

    /// Document-level `x-*` extensions.
    pub fn vendor_extensions(&self) -> Extensions {
        vendor_only(&self.extensions)
    }
}

impl PathItem {
    /// Declared operations in OpenAPI method order.
    pub fn operations(&self) -> Vec<(HttpMethod, &Operation)> {
        let slots = [
            (HttpMethod::Get, &self.get),
            (HttpMethod::Put, &self.put),
            (HttpMethod::Post, &self.post),
            (HttpMethod::Delete, &self.delete),
            (HttpMethod::Options, &self.options),
            (HttpMethod::Head, &self.head),
            (HttpMethod::Patch, &self.patch),
            (HttpMethod::Trace, &self.trace),
        ];
        slots
            .into_iter()
            .filter_map(|(method, operation)| operation.as_ref().map(|op| (method, op)))
            .collect()
    }
}

impl HttpMethod {
    /// Upper-case wire name, e.g. `GET`.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// PascalCase name, e.g. `Get`.
    pub fn pascal_name(&self) -> &'static str {
        match self {
            HttpMethod::Get => "Get",
            HttpMethod::Put => "Put",
            HttpMethod::Post => "Post",
            HttpMethod::Delete => "Delete",
            HttpMethod::Options => "Options",
            HttpMethod::Head => "Head",
            HttpMethod::Patch => "Patch",
            HttpMethod::Trace => "Trace",
        }
    }
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

/// Status code keys may be written unquoted in YAML (`200:`), which parses as an integer.
#[derive(Debug, PartialEq, Eq, Hash)]
struct StatusKey(String);

impl<'de> Deserialize<'de> for StatusKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawKey {
            Text(String),
            Code(u64),
        }

        Ok(match RawKey::deserialize(deserializer)? {
            RawKey::Text(text) => StatusKey(text),
            RawKey::Code(code) => StatusKey(code.to_string()),
        })
    }
}

fn deserialize_responses<'de, D>(
    deserializer: D,
) -> std::result::Result<IndexMap<String, MaybeRef<Response>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: IndexMap<StatusKey, MaybeRef<Response>> = IndexMap::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(key, value)| (key.0, value)).collect())
}

/// Keeps only `x-*` keys of a flattened extension map.
pub fn vendor_only(extensions: &Extensions) -> Extensions {
    extensions
        .iter()
        .filter(|(key, _)| key.starts_with("x-"))
        .map(|(key, value): (&String, &Value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PETSTORE: &str = r#"
openapi: 3.0.3
info:
  title: Petstore
  version: 1.0.0
servers:
  - url: https://api.example.com/v1
x-rate-limit:
  policy: global
paths:
  /pets/{petId}:
    parameters:
      - $ref: '#/components/parameters/PetId'
    get:
      operationId: getPet
      tags: [Pets]
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Pet'
        '404':
          $ref: '#/components/responses/NotFound'
    delete:
      responses:
        '204':
          description: deleted
components:
  parameters:
    PetId:
      name: petId
      in: path
      required: true
      schema:
        type: integer
        format: int64
  responses:
    NotFound:
      description: not found
  schemas:
    Pet:
      type: object
      properties:
        id: { type: integer }
"#;

    #[test]
    fn test_parse_document() {
        let doc = Document::from_yaml_str(PETSTORE).unwrap();
        assert_eq!(doc.info.title, "Petstore");
        assert_eq!(doc.servers[0].url, "https://api.example.com/v1");
        assert!(doc.is_component("Pet"));

        let paths = doc.paths.as_ref().unwrap();
        let item = &paths["/pets/{petId}"];
        let operations = item.operations();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0].0, HttpMethod::Get);
        assert_eq!(operations[1].0, HttpMethod::Delete);
    }

    #[test]
    fn test_resolve_component_references() {
        let doc = Document::from_yaml_str(PETSTORE).unwrap();
        let item = &doc.paths.as_ref().unwrap()["/pets/{petId}"];

        let parameter = doc.resolve_parameter(&item.parameters[0]).unwrap();
        assert_eq!(parameter.name, "petId");
        assert_eq!(parameter.location, ParameterLocation::Path);

        let get = item.get.as_ref().unwrap();
        let not_found = doc.resolve_response(&get.responses["404"]).unwrap();
        assert_eq!(not_found.description, "not found");
    }

    #[test]
    fn test_dangling_reference_is_an_error() {
        let doc = Document::from_yaml_str(PETSTORE).unwrap();
        let err = doc.require_schema("#/components/schemas/Missing").unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn test_document_extensions() {
        let doc = Document::from_yaml_str(PETSTORE).unwrap();
        let extensions = doc.vendor_extensions();
        assert!(extensions.contains_key("x-rate-limit"));
        assert!(!extensions.contains_key("openapi"));
    }

    #[test]
    fn test_missing_paths_is_none() {
        let doc = Document::from_yaml_str("openapi: 3.1.0\ninfo: { title: t, version: '1' }").unwrap();
        assert!(doc.paths.is_none());
    }
}
