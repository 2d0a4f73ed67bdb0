//! Hoisting of anonymous schemas into named declarations.
//!
//! Inline objects get one record per generated name, with no structural deduplication.
//! Inline string enums are deduplicated by their value set: two enums with the same values
//! (in any order) share the first emitted type.

use crate::context::PassContext;
use crate::error::Result;
use crate::models::{EnumDescriptor, RecordDescriptor};
use crate::schema::ObjectSchema;
use crate::type_resolver::TypeResolver;
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;

/// Pass-scoped store of hoisted inline declarations.
#[derive(Debug, Default)]
pub struct InlineRegistry {
    /// Generated name -> emitted name
    record_names: HashMap<String, String>,
    records: IndexMap<String, RecordDescriptor>,
    enums: IndexMap<String, EnumDescriptor>,
    /// Sorted value-set key -> emitted enum name
    enum_keys: HashMap<String, String>,
}

impl InlineRegistry {
    pub fn records(&self) -> Vec<&RecordDescriptor> {
        self.records.values().collect()
    }

    pub fn enums(&self) -> Vec<&EnumDescriptor> {
        self.enums.values().collect()
    }

    pub fn record(&self, name: &str) -> Option<&RecordDescriptor> {
        self.records.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.enums.is_empty()
    }

    /// Consumes the registry, returning records and enums in creation order.
    pub fn into_parts(self) -> (Vec<RecordDescriptor>, Vec<EnumDescriptor>) {
        (
            self.records.into_values().collect(),
            self.enums.into_values().collect(),
        )
    }
}

/// Returns the emitted name for an inline object, creating its record on first use.
///
/// The record is registered before its properties are resolved, so a nested schema that
/// leads back to the same generated name reuses it instead of recursing.
pub fn extract_or_reuse(
    resolver: &TypeResolver<'_>,
    object: &ObjectSchema,
    generated_name: &str,
    pass: &mut PassContext,
) -> Result<String> {
    if let Some(existing) = pass.inline.record_names.get(generated_name) {
        return Ok(existing.clone());
    }

    let emitted = pass.names.reserve(generated_name);
    debug!("Hoisting inline object {} as {}", generated_name, emitted);
    pass.inline
        .record_names
        .insert(generated_name.to_string(), emitted.clone());
    pass.inline
        .records
        .insert(emitted.clone(), RecordDescriptor::new(&emitted));

    let properties = resolver.build_properties(&emitted, object, pass)?;
    if let Some(record) = pass.inline.records.get_mut(&emitted) {
        record.properties = properties;
    }

    Ok(emitted)
}

/// Returns the emitted name for an inline string enum, reusing any enum with the same values.
pub fn extract_or_reuse_enum(values: &[String], generated_name: &str, pass: &mut PassContext) -> String {
    let key = enum_key(values);
    if let Some(existing) = pass.inline.enum_keys.get(&key) {
        debug!("Inline enum {} reuses {}", generated_name, existing);
        return existing.clone();
    }

    let emitted = pass.names.reserve(generated_name);
    debug!("Hoisting inline enum {} as {}", generated_name, emitted);
    pass.inline.enum_keys.insert(key, emitted.clone());
    pass.inline
        .enums
        .insert(emitted.clone(), EnumDescriptor::from_values(&emitted, values, None));
    emitted
}

/// Case-sensitive, order-independent identity of an enum's value set.
fn enum_key(values: &[String]) -> String {
    let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join("\u{1f}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use pretty_assertions::assert_eq;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_enum_value_sets_are_deduplicated() {
        let doc = Document::default();
        let mut pass = PassContext::new(&doc, "Api.Models");

        let first = extract_or_reuse_enum(&strings(&["asc", "desc"]), "ListPetsSort", &mut pass);
        let second = extract_or_reuse_enum(&strings(&["desc", "asc"]), "ListOrdersSort", &mut pass);
        let third = extract_or_reuse_enum(&strings(&["Asc", "Desc"]), "ListUsersSort", &mut pass);

        assert_eq!(first, "ListPetsSort");
        assert_eq!(second, "ListPetsSort");
        assert_eq!(third, "ListUsersSort");
        assert_eq!(pass.inline.enums().len(), 2);
    }

    #[test]
    fn test_inline_records_are_not_structurally_deduplicated() {
        let doc = Document::default();
        let mut pass = PassContext::new(&doc, "Api.Models");
        let resolver = TypeResolver::new(&doc);
        let object: ObjectSchema = match serde_yaml::from_str::<crate::schema::Schema>(
            "type: object\nproperties:\n  id: { type: integer }",
        )
        .unwrap()
        .kind
        {
            crate::schema::SchemaKind::Object(object) => object,
            other => panic!("unexpected {:?}", other),
        };

        let a = extract_or_reuse(&resolver, &object, "GetPetResponse", &mut pass).unwrap();
        let b = extract_or_reuse(&resolver, &object, "GetOrderResponse", &mut pass).unwrap();
        let again = extract_or_reuse(&resolver, &object, "GetPetResponse", &mut pass).unwrap();

        assert_eq!(a, "GetPetResponse");
        assert_eq!(b, "GetOrderResponse");
        assert_eq!(again, a);
        assert_eq!(pass.inline.records().len(), 2);
        assert_eq!(pass.inline.record("GetPetResponse").unwrap().properties.len(), 1);
    }

    #[test]
    fn test_inline_name_avoids_component_collision() {
        let doc = Document::from_yaml_str(
            "openapi: 3.0.0\npaths: {}\ncomponents:\n  schemas:\n    GetPetResponse:\n      type: object\n",
        )
        .unwrap();
        let mut pass = PassContext::new(&doc, "Api.Models");
        let resolver = TypeResolver::new(&doc);
        let name = extract_or_reuse(&resolver, &ObjectSchema::default(), "GetPetResponse", &mut pass)
            .unwrap();
        assert_eq!(name, "GetPetResponse2");
    }
}
