use crate::context::PassContext;
use crate::endpoints::BindingSource;
use crate::error::Result;
use crate::naming::to_pascal_case;
use crate::polymorphism::{self, PolymorphicConfig};
use crate::schema::{CompositionKind, PrimitiveKind, Schema, SchemaKind};
use crate::type_resolver::{is_pagination_base, merge_objects, TypeReference, TypeResolver, TypeSite};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A property of a record or a bound parameter of an aggregate parameters record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDescriptor {
    pub name: String,
    /// Name on the wire
    pub json_name: String,
    pub type_ref: TypeReference,
    pub required: bool,
    /// Literal default; optional members default to `null`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<BindingSource>,
}

/// A record declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_abstract: bool,
    pub properties: Vec<PropertyDescriptor>,
}

impl RecordDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_parameters: Vec::new(),
            base_type: None,
            discriminator_value: None,
            description: None,
            is_abstract: false,
            properties: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumMember {
    pub name: String,
    pub value: String,
}

/// A string enum declaration; members keep their wire values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub members: Vec<EnumMember>,
}

impl EnumDescriptor {
    pub fn from_values(name: &str, values: &[String], description: Option<String>) -> Self {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let members = values
            .iter()
            .map(|value| {
                let base = to_pascal_case(value);
                let count = seen.entry(base.clone()).or_insert(0);
                *count += 1;
                let member = if *count == 1 {
                    base
                } else {
                    format!("{}{}", base, count)
                };
                EnumMember {
                    name: member,
                    value: value.clone(),
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            description,
            members,
        }
    }
}

/// A fixed-position tuple (`prefixItems`) emitted as a named positional record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupleDescriptor {
    pub name: String,
    pub elements: Vec<TypeReference>,
}

/// An abstract base record and its discriminated subtypes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolymorphicModel {
    pub config: PolymorphicConfig,
    pub base: RecordDescriptor,
    pub variants: Vec<RecordDescriptor>,
}

/// Every declaration derived from the component table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelSet {
    pub records: Vec<RecordDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub tuples: Vec<TupleDescriptor>,
    pub polymorphic: Vec<PolymorphicModel>,
}

impl ModelSet {
    pub fn record(&self, name: &str) -> Option<&RecordDescriptor> {
        self.records
            .iter()
            .chain(self.polymorphic.iter().flat_map(|p| std::iter::once(&p.base).chain(&p.variants)))
            .find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.records.len() + self.enums.len() + self.tuples.len() + self.polymorphic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Orders properties so that members without a default precede members with one.
///
/// The partition is stable: declaration order is kept within each bucket.
pub fn order_properties(properties: Vec<PropertyDescriptor>) -> Vec<PropertyDescriptor> {
    let (mut ordered, with_default): (Vec<_>, Vec<_>) = properties
        .into_iter()
        .partition(|p| p.default_value.is_none());
    ordered.extend(with_default);
    ordered
}

/// Classifies every component schema and builds its declaration.
///
/// Array aliases, primitive aliases, dictionaries and pagination compositions produce no
/// declaration: they are spelled out at every use site by the type resolver.
pub fn extract_models(resolver: &TypeResolver<'_>, pass: &mut PassContext) -> Result<ModelSet> {
    let document = resolver.document();
    let mut models = ModelSet::default();

    let variant_owners: HashSet<String> = pass
        .polymorphic
        .values()
        .flat_map(|config| config.variants.iter().map(|v| v.schema_name.clone()))
        .collect();

    for (raw, schema) in &document.components.schemas {
        if variant_owners.contains(raw) {
            debug!("Component {} is a polymorphic variant, emitted with its base", raw);
            continue;
        }

        let name = pass.names.resolve_type_name(raw);
        match &schema.kind {
            SchemaKind::Array(array) if !array.prefix_items.is_empty() => {
                let mut elements = Vec::with_capacity(array.prefix_items.len());
                for (index, element) in array.prefix_items.iter().enumerate() {
                    let site = TypeSite::new(&name, &format!("Item{}", index + 1));
                    elements.push(resolver.resolve(Some(element), &site, pass)?);
                }
                models.tuples.push(TupleDescriptor { name, elements });
            }
            SchemaKind::Enum(enumeration) if enumeration.kind == PrimitiveKind::String => {
                models.enums.push(EnumDescriptor::from_values(
                    &name,
                    &enumeration.string_values(),
                    schema.description.clone(),
                ));
            }
            SchemaKind::Object(object)
                if object.properties.is_empty() && object.additional_properties.is_some() =>
            {
                debug!("Component {} is a dictionary alias", raw);
            }
            SchemaKind::Object(object) => {
                let mut record = RecordDescriptor::new(&name);
                record.description = schema.description.clone();
                record.properties = resolver.build_properties(&name, object, pass)?;
                if is_pagination_base(raw) {
                    make_generic_page(&mut record);
                }
                models.records.push(record);
            }
            SchemaKind::Composition(composition) if composition.kind == CompositionKind::AllOf => {
                let site = TypeSite::new(&name, "");
                if resolver
                    .detect_pagination(&composition.members, &site, pass)?
                    .is_some()
                {
                    debug!("Component {} is a pagination composition", raw);
                    continue;
                }
                models.records.push(derived_record(resolver, &name, schema, &composition.members, pass)?);
            }
            SchemaKind::Composition(_) => {
                if let Some(config) = pass.polymorphic.get(raw).cloned() {
                    models
                        .polymorphic
                        .push(polymorphic_model(resolver, &name, config, schema, pass)?);
                } else {
                    debug!("Component {} is a union without a discriminator", raw);
                }
            }
            SchemaKind::Reference(_)
            | SchemaKind::Array(_)
            | SchemaKind::Enum(_)
            | SchemaKind::Primitive { .. }
            | SchemaKind::Any => {
                debug!("Component {} is an alias, resolved at use sites", raw);
            }
        }
    }

    info!(
        "Extracted {} records, {} enums, {} tuples, {} polymorphic hierarchies",
        models.records.len(),
        models.enums.len(),
        models.tuples.len(),
        models.polymorphic.len()
    );
    Ok(models)
}

/// `allOf` with a reference: the first reference becomes the base type and inline members
/// contribute the record's own properties.
fn derived_record(
    resolver: &TypeResolver<'_>,
    name: &str,
    schema: &Schema,
    members: &[Schema],
    pass: &mut PassContext,
) -> Result<RecordDescriptor> {
    let mut record = RecordDescriptor::new(name);
    record.description = schema.description.clone();

    let references: Vec<String> = members.iter().filter_map(Schema::reference_name).collect();
    if let Some(first) = references.first() {
        record.base_type = Some(pass.names.resolve_qualified(first));
    }
    if references.len() > 1 {
        warn!(
            "{} composes {} referenced schemas, only {} is used as base type",
            name,
            references.len(),
            references[0]
        );
    }

    let own = merge_objects(members.iter().filter_map(Schema::as_object));
    record.properties = resolver.build_properties(name, &own, pass)?;
    Ok(record)
}

fn polymorphic_model(
    resolver: &TypeResolver<'_>,
    name: &str,
    config: PolymorphicConfig,
    schema: &Schema,
    pass: &mut PassContext,
) -> Result<PolymorphicModel> {
    let document = resolver.document();
    let mut base = RecordDescriptor::new(name);
    base.description = schema.description.clone();
    base.is_abstract = true;

    let mut variants = Vec::with_capacity(config.variants.len());
    for variant in &config.variants {
        let variant_schema = document.require_schema(&variant.schema_name)?;
        let mut flattened = polymorphism::flatten_object(document, variant_schema);
        flattened
            .properties
            .shift_remove(&config.discriminator_property);
        flattened.required.retain(|r| r != &config.discriminator_property);

        let variant_name = pass.names.resolve_type_name(&variant.schema_name);
        let mut record = RecordDescriptor::new(&variant_name);
        record.description = variant_schema.description.clone();
        record.base_type = Some(config.base_type_name.clone());
        record.discriminator_value = Some(variant.discriminator_value.clone());
        record.properties = resolver.build_properties(&variant_name, &flattened, pass)?;
        variants.push(record);
    }

    debug!(
        "Polymorphic {} on '{}' with {} variants",
        config.base_type_name,
        config.discriminator_property,
        variants.len()
    );
    Ok(PolymorphicModel {
        config,
        base,
        variants,
    })
}

/// Turns a pagination base record into `Name<T>` carrying the page items.
fn make_generic_page(record: &mut RecordDescriptor) {
    record.type_parameters = vec!["T".to_string()];
    let has_items = record
        .properties
        .iter()
        .any(|p| p.json_name == "items" || p.json_name == "results");
    if !has_items {
        record.properties.insert(
            0,
            PropertyDescriptor {
                name: "Items".to_string(),
                json_name: "items".to_string(),
                type_ref: TypeReference::list(TypeReference::named("T")),
                required: true,
                default_value: None,
                description: None,
                binding: None,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"
openapi: 3.0.3
info: { title: Models, version: '1' }
paths: {}
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        tag: { type: string }
        name: { type: string }
        age: { type: integer, default: 1 }
    Pets:
      type: array
      items:
        $ref: '#/components/schemas/Pet'
    Color:
      type: string
      enum: [red, green, blue]
    Point:
      type: array
      prefixItems:
        - type: number
        - type: number
    Dog:
      allOf:
        - $ref: '#/components/schemas/Pet'
        - type: object
          properties:
            barks: { type: boolean }
    PagedResult:
      type: object
      properties:
        total: { type: integer }
    Circle:
      type: object
      required: [kind, radius]
      properties:
        kind: { type: string }
        radius: { type: number }
    Square:
      type: object
      required: [kind, side]
      properties:
        kind: { type: string }
        side: { type: number }
    Shape:
      oneOf:
        - $ref: '#/components/schemas/Circle'
        - $ref: '#/components/schemas/Square'
"#;

    fn extract() -> ModelSet {
        let doc = Document::from_yaml_str(DOCUMENT).unwrap();
        let mut pass = PassContext::new(&doc, "Api.Models");
        extract_models(&TypeResolver::new(&doc), &mut pass).unwrap()
    }

    #[test]
    fn test_order_properties_is_stable() {
        let models = extract();
        let pet = models.record("Pet").unwrap();
        let names: Vec<&str> = pet.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Tag", "Age"]);
        assert_eq!(pet.properties[1].default_value.as_deref(), Some("null"));
        assert_eq!(pet.properties[2].default_value.as_deref(), Some("1"));
    }

    #[test]
    fn test_array_alias_has_no_declaration() {
        let models = extract();
        assert!(models.record("Pets").is_none());
        assert!(models.tuples.iter().any(|t| t.name == "Point"));
    }

    #[test]
    fn test_enum_and_derived_record() {
        let models = extract();
        let color = models.enums.iter().find(|e| e.name == "Color").unwrap();
        assert_eq!(color.members[0], EnumMember { name: "Red".into(), value: "red".into() });

        let dog = models.record("Dog").unwrap();
        assert_eq!(dog.base_type.as_deref(), Some("Pet"));
        assert_eq!(dog.properties.len(), 1);
    }

    #[test]
    fn test_pagination_base_is_generic() {
        let models = extract();
        let page = models.record("PagedResult").unwrap();
        assert_eq!(page.type_parameters, vec!["T".to_string()]);
        assert_eq!(page.properties[0].type_ref.render(), "List<T>");
    }

    #[test]
    fn test_polymorphic_variants_are_not_plain_records() {
        let models = extract();
        assert!(!models.records.iter().any(|r| r.name == "Circle"));

        let shape = &models.polymorphic[0];
        assert!(shape.base.is_abstract);
        let circle = &shape.variants[0];
        assert_eq!(circle.discriminator_value.as_deref(), Some("circle"));
        assert_eq!(circle.base_type.as_deref(), Some("Shape"));
        assert!(circle.properties.iter().all(|p| p.json_name != "kind"));
    }

    #[test]
    fn test_enum_member_collisions() {
        let descriptor = EnumDescriptor::from_values(
            "Mode",
            &["a-b".to_string(), "a_b".to_string()],
            None,
        );
        assert_eq!(descriptor.members[0].name, "AB");
        assert_eq!(descriptor.members[1].name, "AB2");
    }
}
