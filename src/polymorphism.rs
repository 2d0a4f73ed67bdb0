//! Detection of discriminated `oneOf`/`anyOf` hierarchies.
//!
//! A union qualifies when every non-null member is a `$ref`. With an explicit
//! `discriminator` its `mapping` supplies the values; otherwise a discriminator property is
//! auto-detected among the string properties shared by every variant.

use crate::document::Document;
use crate::naming::{to_snake_case, ConflictRegistry};
use crate::schema::{reference_id, CompositionKind, ObjectSchema, Schema, SchemaKind};
use crate::type_resolver::merge_objects;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// Property names tried, in order, when no variant set pins a discriminator with `const`.
const WELL_KNOWN_DISCRIMINATORS: &[&str] = &["type", "kind", "$type", "discriminator", "objectType"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolymorphicConfig {
    pub base_type_name: String,
    pub discriminator_property: String,
    pub discriminator_is_explicit: bool,
    pub composition: CompositionKind,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    pub type_name: String,
    /// Raw component name
    pub schema_name: String,
    pub discriminator_value: String,
}

/// Finds every polymorphic component of the document.
///
/// A schema can be a variant of only one hierarchy; later hierarchies that claim it are
/// skipped.
pub fn analyze(document: &Document, names: &mut ConflictRegistry) -> IndexMap<String, PolymorphicConfig> {
    let mut configs = IndexMap::new();
    let mut claimed: HashSet<String> = HashSet::new();

    for (raw, schema) in &document.components.schemas {
        let SchemaKind::Composition(composition) = &schema.kind else {
            continue;
        };
        if composition.kind == CompositionKind::AllOf {
            continue;
        }

        let Some(config) = detect(document, raw, schema, composition.kind, &composition.members, names) else {
            continue;
        };

        if let Some(variant) = config.variants.iter().find(|v| claimed.contains(&v.schema_name)) {
            warn!(
                "Variant {} of {} already belongs to another hierarchy, skipping {}",
                variant.schema_name, raw, raw
            );
            continue;
        }
        claimed.extend(config.variants.iter().map(|v| v.schema_name.clone()));
        configs.insert(raw.clone(), config);
    }

    configs
}

/// Builds the configuration for one union schema, or `None` when it is not polymorphic.
pub fn detect(
    document: &Document,
    raw: &str,
    schema: &Schema,
    composition: CompositionKind,
    members: &[Schema],
    names: &mut ConflictRegistry,
) -> Option<PolymorphicConfig> {
    let arms: Vec<&Schema> = members.iter().filter(|m| !m.is_null_only()).collect();
    let variant_names: Vec<String> = arms.iter().filter_map(|m| m.reference_name()).collect();

    if arms.len() < 2 || variant_names.len() != arms.len() {
        debug!("{} is not a reference-only union, not polymorphic", raw);
        return None;
    }

    let (property, explicit, values) = match &schema.discriminator {
        Some(discriminator) => {
            let values = variant_names
                .iter()
                .map(|variant| {
                    discriminator
                        .mapping
                        .iter()
                        .find(|(_, target)| reference_id(target) == *variant)
                        .map(|(value, _)| value.clone())
                        .unwrap_or_else(|| to_snake_case(variant))
                })
                .collect();
            (discriminator.property_name.clone(), true, values)
        }
        None => match auto_detect(document, &variant_names) {
            Some((property, values)) => (property, false, values),
            None => {
                warn!(
                    "Polymorphic schema {} has no detectable discriminator, skipped",
                    raw
                );
                return None;
            }
        },
    };

    debug!("{} discriminated by '{}' (explicit: {})", raw, property, explicit);

    let variants = variant_names
        .iter()
        .zip(values)
        .map(|(variant, value)| Variant {
            type_name: names.resolve_qualified(variant),
            schema_name: variant.clone(),
            discriminator_value: value,
        })
        .collect();

    Some(PolymorphicConfig {
        base_type_name: names.resolve_qualified(raw),
        discriminator_property: property,
        discriminator_is_explicit: explicit,
        composition,
        variants,
    })
}

/// Picks a discriminator among the string properties shared by all variants.
///
/// A property whose `const` values are present and distinct across variants wins, otherwise
/// the first well-known name. Without an explicit mapping the values are the snake_case
/// schema names, whatever constants the variants declare.
fn auto_detect(document: &Document, variant_names: &[String]) -> Option<(String, Vec<String>)> {
    let flattened: Vec<ObjectSchema> = variant_names
        .iter()
        .map(|name| match document.component_schema(name) {
            Some(schema) => flatten_object(document, schema),
            None => ObjectSchema::default(),
        })
        .collect();

    let first = flattened.first()?;
    let candidates: Vec<&String> = first
        .properties
        .keys()
        .filter(|property| {
            flattened.iter().all(|object| {
                object
                    .properties
                    .get(*property)
                    .is_some_and(|schema| is_string_like(document, schema))
            })
        })
        .collect();

    for property in &candidates {
        let constants: Vec<String> = flattened
            .iter()
            .filter_map(|object| object.properties.get(*property))
            .filter_map(|schema| match &schema.constant {
                Some(Value::String(value)) => Some(value.clone()),
                _ => None,
            })
            .collect();
        let distinct: HashSet<&String> = constants.iter().collect();
        if constants.len() == flattened.len() && distinct.len() == constants.len() {
            return Some(((*property).clone(), snake_case_values(variant_names)));
        }
    }

    WELL_KNOWN_DISCRIMINATORS
        .iter()
        .find(|name| candidates.iter().any(|c| c.as_str() == **name))
        .map(|name| (name.to_string(), snake_case_values(variant_names)))
}

fn snake_case_values(variant_names: &[String]) -> Vec<String> {
    variant_names.iter().map(|variant| to_snake_case(variant)).collect()
}

fn is_string_like(document: &Document, schema: &Schema) -> bool {
    match &schema.kind {
        SchemaKind::Reference(reference) => document
            .component_schema(reference)
            .is_some_and(Schema::is_string_like),
        _ => schema.is_string_like(),
    }
}

/// Merges an object schema with everything it composes through `allOf` and references.
///
/// Members are visited depth-first in declaration order; each referenced component is
/// visited once.
pub fn flatten_object(document: &Document, schema: &Schema) -> ObjectSchema {
    let mut objects: Vec<&ObjectSchema> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<&Schema> = vec![schema];

    while let Some(current) = stack.pop() {
        match &current.kind {
            SchemaKind::Object(object) => objects.push(object),
            SchemaKind::Reference(reference) => {
                let id = reference_id(reference);
                if visited.insert(id) {
                    if let Some(target) = document.component_schema(reference) {
                        stack.push(target);
                    }
                }
            }
            SchemaKind::Composition(composition) if composition.kind == CompositionKind::AllOf => {
                stack.extend(composition.members.iter().rev());
            }
            _ => {}
        }
    }

    merge_objects(objects)
}
