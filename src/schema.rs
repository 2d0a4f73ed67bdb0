//! The schema node model.
//!
//! OpenAPI schemas are deserialized into a raw, all-optional shape first and then folded
//! into [`Schema`], whose [`SchemaKind`] is a closed union of the shapes the generator
//! understands. Every resolution site matches on it exhaustively.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Vendor extensions and other unrecognized keys, in document order.
pub type Extensions = IndexMap<String, Value>;

const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";

/// A schema node with its shared metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawSchema")]
pub struct Schema {
    pub kind: SchemaKind,
    pub nullable: bool,
    pub default: Option<Value>,
    /// `const` value, or the single value of a one-element `enum`
    pub constant: Option<Value>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub discriminator: Option<Discriminator>,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    /// `x-*` keys only
    pub extensions: Extensions,
}

/// The closed set of schema shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// `$ref` to another schema
    Reference(String),
    Primitive {
        kind: PrimitiveKind,
        format: Option<String>,
    },
    Object(ObjectSchema),
    Array(ArraySchema),
    Enum(EnumSchema),
    Composition(Composition),
    /// No usable type information
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, Schema>,
    pub required: Vec<String>,
    /// `additionalProperties`; `true` is represented as an `Any` schema
    pub additional_properties: Option<Box<Schema>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArraySchema {
    pub items: Option<Box<Schema>>,
    /// Fixed-position tuple members
    pub prefix_items: Vec<Schema>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub kind: PrimitiveKind,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum CompositionKind {
    AllOf,
    OneOf,
    AnyOf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub kind: CompositionKind,
    pub members: Vec<Schema>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    #[serde(default)]
    pub mapping: IndexMap<String, String>,
}

/// `type` may be a single name or, in OpenAPI 3.1, a list such as `["string", "null"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawType {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawAdditionalProperties {
    Allowed(bool),
    Schema(Box<Schema>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSchema {
    #[serde(rename = "$ref")]
    reference: Option<String>,
    #[serde(rename = "type")]
    schema_type: Option<RawType>,
    format: Option<String>,
    properties: Option<IndexMap<String, Schema>>,
    required: Vec<String>,
    additional_properties: Option<RawAdditionalProperties>,
    items: Option<Box<Schema>>,
    prefix_items: Option<Vec<Schema>>,
    #[serde(rename = "enum")]
    enum_values: Option<Vec<Value>>,
    #[serde(rename = "const")]
    const_value: Option<Value>,
    all_of: Option<Vec<Schema>>,
    one_of: Option<Vec<Schema>>,
    any_of: Option<Vec<Schema>>,
    nullable: bool,
    default: Option<Value>,
    title: Option<String>,
    description: Option<String>,
    discriminator: Option<Discriminator>,
    read_only: bool,
    write_only: bool,
    deprecated: bool,
    #[serde(flatten)]
    extra: IndexMap<String, Value>,
}

impl From<RawSchema> for Schema {
    fn from(raw: RawSchema) -> Self {
        let (type_name, type_nullable) = match &raw.schema_type {
            Some(RawType::Single(name)) => (Some(name.clone()), name == "null"),
            Some(RawType::Multiple(names)) => {
                let nullable = names.iter().any(|n| n == "null");
                let first = names.iter().find(|n| n.as_str() != "null").cloned();
                (first.or_else(|| nullable.then(|| "null".to_string())), nullable)
            }
            None => (None, false),
        };

        let enum_nullable = raw
            .enum_values
            .as_ref()
            .is_some_and(|values| values.iter().any(Value::is_null));

        let constant = raw.const_value.clone().or_else(|| {
            raw.enum_values.as_ref().and_then(|values| {
                let non_null: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
                (non_null.len() == 1).then(|| non_null[0].clone())
            })
        });

        let extensions: Extensions = raw
            .extra
            .iter()
            .filter(|(key, _)| key.starts_with("x-"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let kind = classify(&raw, type_name.as_deref());

        Schema {
            kind,
            nullable: raw.nullable || type_nullable || enum_nullable,
            default: raw.default,
            constant,
            title: raw.title,
            description: raw.description,
            discriminator: raw.discriminator,
            read_only: raw.read_only,
            write_only: raw.write_only,
            deprecated: raw.deprecated,
            extensions,
        }
    }
}

fn classify(raw: &RawSchema, type_name: Option<&str>) -> SchemaKind {
    if let Some(reference) = &raw.reference {
        return SchemaKind::Reference(reference.clone());
    }

    let compositions = [
        (CompositionKind::OneOf, &raw.one_of),
        (CompositionKind::AnyOf, &raw.any_of),
        (CompositionKind::AllOf, &raw.all_of),
    ];
    for (kind, members) in compositions {
        if let Some(members) = members.as_ref().filter(|m| !m.is_empty()) {
            return SchemaKind::Composition(Composition {
                kind,
                members: members.clone(),
            });
        }
    }

    if let Some(values) = &raw.enum_values {
        let values: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
        let kind = type_name
            .and_then(primitive_kind)
            .or_else(|| values.first().and_then(value_kind))
            .unwrap_or(PrimitiveKind::String);
        return SchemaKind::Enum(EnumSchema { kind, values });
    }

    let is_array = type_name == Some("array") || raw.items.is_some() || raw.prefix_items.is_some();
    if is_array {
        return SchemaKind::Array(ArraySchema {
            items: raw.items.clone(),
            prefix_items: raw.prefix_items.clone().unwrap_or_default(),
        });
    }

    let is_object = type_name == Some("object")
        || raw.properties.is_some()
        || raw.additional_properties.is_some();
    if is_object {
        let additional_properties = match &raw.additional_properties {
            Some(RawAdditionalProperties::Allowed(true)) => Some(Box::new(Schema::any())),
            Some(RawAdditionalProperties::Allowed(false)) | None => None,
            Some(RawAdditionalProperties::Schema(schema)) => Some(schema.clone()),
        };
        return SchemaKind::Object(ObjectSchema {
            properties: raw.properties.clone().unwrap_or_default(),
            required: raw.required.clone(),
            additional_properties,
        });
    }

    if let Some(kind) = type_name.and_then(primitive_kind) {
        return SchemaKind::Primitive {
            kind,
            format: raw.format.clone(),
        };
    }

    if let Some(kind) = raw.const_value.as_ref().and_then(value_kind) {
        return SchemaKind::Primitive {
            kind,
            format: raw.format.clone(),
        };
    }

    SchemaKind::Any
}

fn primitive_kind(type_name: &str) -> Option<PrimitiveKind> {
    match type_name {
        "string" => Some(PrimitiveKind::String),
        "integer" => Some(PrimitiveKind::Integer),
        "number" => Some(PrimitiveKind::Number),
        "boolean" => Some(PrimitiveKind::Boolean),
        _ => None,
    }
}

fn value_kind(value: &Value) -> Option<PrimitiveKind> {
    match value {
        Value::String(_) => Some(PrimitiveKind::String),
        Value::Bool(_) => Some(PrimitiveKind::Boolean),
        Value::Number(n) if n.is_f64() => Some(PrimitiveKind::Number),
        Value::Number(_) => Some(PrimitiveKind::Integer),
        _ => None,
    }
}

/// Extracts the component name from a `#/components/schemas/...` reference.
///
/// Bare names are returned unchanged; JSON pointer escapes are decoded.
pub fn reference_id(reference: &str) -> String {
    let id = reference
        .strip_prefix(COMPONENT_SCHEMA_PREFIX)
        .or_else(|| reference.rsplit('/').next())
        .unwrap_or(reference);
    id.replace("~1", "/").replace("~0", "~")
}

impl Schema {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            default: None,
            constant: None,
            title: None,
            description: None,
            discriminator: None,
            read_only: false,
            write_only: false,
            deprecated: false,
            extensions: Extensions::new(),
        }
    }

    pub fn any() -> Self {
        Self::new(SchemaKind::Any)
    }

    pub fn reference(name: &str) -> Self {
        Self::new(SchemaKind::Reference(format!("{}{}", COMPONENT_SCHEMA_PREFIX, name)))
    }

    pub fn primitive(kind: PrimitiveKind, format: Option<&str>) -> Self {
        Self::new(SchemaKind::Primitive {
            kind,
            format: format.map(str::to_string),
        })
    }

    /// Component name of a `$ref` schema.
    pub fn reference_name(&self) -> Option<String> {
        match &self.kind {
            SchemaKind::Reference(reference) => Some(reference_id(reference)),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match &self.kind {
            SchemaKind::Object(object) => Some(object),
            _ => None,
        }
    }

    /// `type: string, format: binary`, the OpenAPI spelling of a file.
    pub fn is_binary(&self) -> bool {
        matches!(
            &self.kind,
            SchemaKind::Primitive { kind: PrimitiveKind::String, format: Some(format) }
                if format == "binary"
        )
    }

    /// An array whose items are files.
    pub fn is_binary_array(&self) -> bool {
        match &self.kind {
            SchemaKind::Array(array) => array.items.as_deref().is_some_and(Schema::is_binary),
            _ => false,
        }
    }

    /// A schema with only `type: null`, used as the null arm of `oneOf`/`anyOf`.
    pub fn is_null_only(&self) -> bool {
        matches!(self.kind, SchemaKind::Any) && self.nullable
    }

    /// String-like: a string primitive or a string enum.
    pub fn is_string_like(&self) -> bool {
        matches!(
            &self.kind,
            SchemaKind::Primitive { kind: PrimitiveKind::String, .. }
                | SchemaKind::Enum(EnumSchema { kind: PrimitiveKind::String, .. })
        )
    }

    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Whether an `x-*` flag is set to `true`.
    pub fn has_flag(&self, key: &str) -> bool {
        self.extension(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl ObjectSchema {
    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }
}

impl EnumSchema {
    /// Literal values rendered as strings, in declaration order.
    pub fn string_values(&self) -> Vec<String> {
        self.values.iter().map(value_to_string).collect()
    }
}

/// Renders a JSON scalar without quotes.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Schema {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_reference() {
        let schema = parse("$ref: '#/components/schemas/Pet'");
        assert_eq!(schema.reference_name(), Some("Pet".to_string()));
    }

    #[test]
    fn test_primitive_with_format() {
        let schema = parse("type: string\nformat: date-time");
        assert_eq!(
            schema.kind,
            SchemaKind::Primitive {
                kind: PrimitiveKind::String,
                format: Some("date-time".to_string())
            }
        );
    }

    #[test]
    fn test_type_list_with_null_is_nullable() {
        let schema = parse("type: [integer, 'null']");
        assert!(schema.nullable);
        assert!(matches!(
            schema.kind,
            SchemaKind::Primitive { kind: PrimitiveKind::Integer, .. }
        ));
    }

    #[test]
    fn test_object_preserves_property_order() {
        let schema = parse(
            r#"
type: object
required: [name]
properties:
  zeta: { type: string }
  name: { type: string }
  alpha: { type: integer }
"#,
        );
        let object = schema.as_object().unwrap();
        let names: Vec<&String> = object.properties.keys().collect();
        assert_eq!(names, vec!["zeta", "name", "alpha"]);
        assert!(object.is_required("name"));
        assert!(!object.is_required("zeta"));
    }

    #[test]
    fn test_additional_properties_true() {
        let schema = parse("type: object\nadditionalProperties: true");
        let object = schema.as_object().unwrap();
        assert!(object.properties.is_empty());
        assert_eq!(object.additional_properties.as_deref(), Some(&Schema::any()));
    }

    #[test]
    fn test_array_with_prefix_items() {
        let schema = parse("type: array\nprefixItems:\n  - type: number\n  - type: number");
        match schema.kind {
            SchemaKind::Array(array) => {
                assert_eq!(array.prefix_items.len(), 2);
                assert!(array.items.is_none());
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_and_single_value_constant() {
        let schema = parse("type: string\nenum: [circle]");
        assert_eq!(schema.constant, Some(Value::String("circle".to_string())));
        match &schema.kind {
            SchemaKind::Enum(e) => assert_eq!(e.string_values(), vec!["circle"]),
            other => panic!("expected enum, got {:?}", other),
        }
    }

    #[test]
    fn test_const_without_type() {
        let schema = parse("const: square");
        assert!(schema.is_string_like());
        assert_eq!(schema.constant, Some(Value::String("square".to_string())));
    }

    #[test]
    fn test_composition_and_extensions() {
        let schema = parse(
            r#"
oneOf:
  - $ref: '#/components/schemas/Circle'
  - $ref: '#/components/schemas/Square'
x-internal: true
minProperties: 1
"#,
        );
        match &schema.kind {
            SchemaKind::Composition(c) => {
                assert_eq!(c.kind, CompositionKind::OneOf);
                assert_eq!(c.members.len(), 2);
            }
            other => panic!("expected composition, got {:?}", other),
        }
        assert!(schema.has_flag("x-internal"));
        assert!(schema.extension("minProperties").is_none());
    }

    #[test]
    fn test_binary_detection() {
        assert!(parse("type: string\nformat: binary").is_binary());
        assert!(parse("type: array\nitems:\n  type: string\n  format: binary").is_binary_array());
        assert!(!parse("type: string").is_binary());
    }

    #[test]
    fn test_reference_id_decodes_pointer() {
        assert_eq!(reference_id("#/components/schemas/Pet"), "Pet");
        assert_eq!(reference_id("#/components/schemas/a~1b"), "a/b");
        assert_eq!(reference_id("Pet"), "Pet");
    }
}
