use crate::context::PassContext;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::inline;
use crate::models::PropertyDescriptor;
use crate::naming::{member_name, to_pascal_case, MemberScope};
use crate::schema::{
    reference_id, ArraySchema, Composition, CompositionKind, EnumSchema, ObjectSchema,
    PrimitiveKind, Schema, SchemaKind,
};
use crate::snippets::csharp_string_literal;
use log::{debug, warn};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Name prefixes that mark a schema as the generic base of a paginated response.
const PAGINATION_BASE_PREFIXES: &[&str] = &["PaginationResult", "PaginatedResult", "PagedResult"];

/// Property names that carry the page items in a pagination `allOf`.
const PAGINATION_ITEM_PROPERTIES: &[&str] = &["items", "results"];

/// (kind, format) -> target type. Rows with no format are the kind's default.
const PRIMITIVE_TYPES: &[(PrimitiveKind, Option<&str>, &str)] = &[
    (PrimitiveKind::String, None, "string"),
    (PrimitiveKind::String, Some("date-time"), "DateTimeOffset"),
    (PrimitiveKind::String, Some("date"), "DateOnly"),
    (PrimitiveKind::String, Some("time"), "TimeOnly"),
    (PrimitiveKind::String, Some("duration"), "TimeSpan"),
    (PrimitiveKind::String, Some("uuid"), "Guid"),
    (PrimitiveKind::String, Some("uri"), "Uri"),
    (PrimitiveKind::String, Some("byte"), "byte[]"),
    (PrimitiveKind::String, Some("binary"), "IFormFile"),
    (PrimitiveKind::Integer, None, "int"),
    (PrimitiveKind::Integer, Some("int8"), "sbyte"),
    (PrimitiveKind::Integer, Some("uint8"), "byte"),
    (PrimitiveKind::Integer, Some("int16"), "short"),
    (PrimitiveKind::Integer, Some("int32"), "int"),
    (PrimitiveKind::Integer, Some("int64"), "long"),
    (PrimitiveKind::Integer, Some("uint32"), "uint"),
    (PrimitiveKind::Integer, Some("uint64"), "ulong"),
    (PrimitiveKind::Number, None, "double"),
    (PrimitiveKind::Number, Some("float"), "float"),
    (PrimitiveKind::Number, Some("double"), "double"),
    (PrimitiveKind::Number, Some("decimal"), "decimal"),
    (PrimitiveKind::Boolean, None, "bool"),
];

/// Target types that are language primitives or framework scalars rather than models.
const SCALAR_TYPES: &[&str] = &[
    "string", "int", "long", "short", "sbyte", "byte", "uint", "ulong", "double", "float",
    "decimal", "bool", "DateTimeOffset", "DateOnly", "TimeOnly", "TimeSpan", "Guid", "Uri",
    "byte[]", "IFormFile", "IFormFileCollection", "Stream", "object",
];

/// A resolved target-language type expression.
///
/// Equality is structural: two references are equal when their names, generic arguments
/// and nullability match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeReference {
    pub base_name: String,
    pub generic_args: Vec<TypeReference>,
    pub nullable: bool,
    pub is_list: bool,
}

impl TypeReference {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            base_name: name.into(),
            generic_args: Vec::new(),
            nullable: false,
            is_list: false,
        }
    }

    /// The untyped placeholder.
    pub fn object() -> Self {
        Self::named("object")
    }

    pub fn list(item: TypeReference) -> Self {
        Self {
            base_name: "List".to_string(),
            generic_args: vec![item],
            nullable: false,
            is_list: true,
        }
    }

    pub fn generic(base: impl Into<String>, args: Vec<TypeReference>) -> Self {
        Self {
            base_name: base.into(),
            generic_args: args,
            nullable: false,
            is_list: false,
        }
    }

    pub fn dictionary(value: TypeReference) -> Self {
        Self::generic("Dictionary", vec![Self::named("string"), value])
    }

    pub fn async_sequence(item: TypeReference) -> Self {
        Self::generic("IAsyncEnumerable", vec![item])
    }

    pub fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn non_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Item type of a `List<T>`.
    pub fn list_item(&self) -> Option<&TypeReference> {
        if self.is_list {
            self.generic_args.first()
        } else {
            None
        }
    }

    pub fn is_object_fallback(&self) -> bool {
        self.base_name == "object" && self.generic_args.is_empty()
    }

    pub fn is_string(&self) -> bool {
        self.base_name == "string" && self.generic_args.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.generic_args.is_empty() && SCALAR_TYPES.contains(&self.base_name.as_str())
    }

    pub fn is_file(&self) -> bool {
        self.base_name == "IFormFile" || self.base_name == "IFormFileCollection"
    }

    /// A named, non-generic, non-scalar type: a generated record, enum or tuple.
    pub fn is_model(&self) -> bool {
        self.generic_args.is_empty() && !self.is_scalar()
    }

    /// Renders the type expression, e.g. `List<Pet>?`.
    pub fn render(&self) -> String {
        let mut rendered = self.base_name.clone();
        if !self.generic_args.is_empty() {
            let args: Vec<String> = self.generic_args.iter().map(TypeReference::render).collect();
            rendered.push('<');
            rendered.push_str(&args.join(", "));
            rendered.push('>');
        }
        if self.nullable {
            rendered.push('?');
        }
        rendered
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl Serialize for TypeReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Maps a primitive (kind, format) pair to its target type.
pub fn map_primitive(kind: PrimitiveKind, format: Option<&str>) -> &'static str {
    if let Some(format) = format {
        if let Some((_, _, target)) = PRIMITIVE_TYPES
            .iter()
            .find(|(k, f, _)| *k == kind && *f == Some(format))
        {
            return target;
        }
        debug!("Unknown format '{}' for {:?}, using default", format, kind);
    }
    PRIMITIVE_TYPES
        .iter()
        .find(|(k, f, _)| *k == kind && f.is_none())
        .map(|(_, _, target)| *target)
        .unwrap_or("object")
}

pub fn is_pagination_base(name: &str) -> bool {
    PAGINATION_BASE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Where a schema is being resolved, used to name hoisted inline declarations.
///
/// The generated name is `{owner}{context}`, e.g. `ListPets` + `Response`, so an array-item
/// inline type (`ListPetsResponseItem`) never collides with its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSite {
    owner: String,
    context: String,
}

impl TypeSite {
    pub fn new(owner: &str, context: &str) -> Self {
        Self {
            owner: to_pascal_case(owner),
            context: context.to_string(),
        }
    }

    pub fn inline_name(&self) -> String {
        format!("{}{}", self.owner, self.context)
    }

    /// Site for the items of an array resolved at this site.
    pub fn item(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            context: format!("{}Item", self.context),
        }
    }

    /// Site for the values of a dictionary resolved at this site.
    pub fn value(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            context: format!("{}Value", self.context),
        }
    }
}

/// Type resolver - maps schema nodes of one document to target type references.
///
/// The resolver itself only borrows the document. Everything that must be unique per
/// generation run (type names, hoisted inline declarations) lives in the [`PassContext`]
/// passed into each call.
pub struct TypeResolver<'a> {
    document: &'a Document,
}

impl<'a> TypeResolver<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Resolves a schema at the given site.
    ///
    /// An absent schema resolves to `object`. A dangling `$ref` is an error.
    pub fn resolve(
        &self,
        schema: Option<&Schema>,
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> Result<TypeReference> {
        let Some(schema) = schema else {
            return Ok(TypeReference::object());
        };

        let resolved = match &schema.kind {
            SchemaKind::Reference(reference) => self.resolve_reference(reference, pass)?,
            SchemaKind::Primitive { kind, format } => {
                TypeReference::named(map_primitive(*kind, format.as_deref()))
            }
            SchemaKind::Array(array) => self.resolve_inline_array(array, site, pass)?,
            SchemaKind::Object(object) => self.resolve_inline_object(object, site, pass)?,
            SchemaKind::Enum(enumeration) => self.resolve_inline_enum(enumeration, site, pass),
            SchemaKind::Composition(composition) => {
                self.resolve_composition(composition, site, pass)?
            }
            SchemaKind::Any => TypeReference::object(),
        };

        Ok(if schema.nullable {
            resolved.into_nullable()
        } else {
            resolved
        })
    }

    /// Resolves a `$ref`.
    ///
    /// Array aliases are unwrapped iteratively: `Pets = array of $ref Pet` resolves to
    /// `List<Pet>` and an alias of an alias nests. Visited reference ids are tracked so a
    /// self-referencing alias falls back to its declared name instead of looping.
    pub fn resolve_reference(&self, reference: &str, pass: &mut PassContext) -> Result<TypeReference> {
        let declared = reference_id(reference);
        let mut current = declared.clone();
        let mut list_depth = 0usize;
        let mut visited = HashSet::new();

        loop {
            if !visited.insert(current.clone()) {
                warn!("Reference cycle through '{}', using declared name", current);
                return Ok(TypeReference::named(pass.names.resolve_qualified(&declared)));
            }

            let schema = self
                .document
                .component_schema(&current)
                .ok_or_else(|| Error::UnresolvedReference {
                    reference: reference.to_string(),
                })?;

            match &schema.kind {
                SchemaKind::Reference(inner) => {
                    debug!("Component {} aliases {}", current, inner);
                    current = reference_id(inner);
                }
                SchemaKind::Array(array) if array.prefix_items.is_empty() => {
                    list_depth += 1;
                    match array.items.as_deref() {
                        Some(Schema {
                            kind: SchemaKind::Reference(inner),
                            nullable: false,
                            ..
                        }) => {
                            debug!("Component {} is an array alias of {}", current, inner);
                            current = reference_id(inner);
                        }
                        items => {
                            let item_site = TypeSite::new(&current, "Item");
                            let item = self.resolve(items, &item_site, pass)?;
                            return Ok(wrap_in_lists(item, list_depth));
                        }
                    }
                }
                _ => {
                    let resolved = self.resolve_component(&current, schema, pass)?;
                    return Ok(wrap_in_lists(resolved, list_depth));
                }
            }
        }
    }

    /// Resolves a component that is not an array alias.
    fn resolve_component(
        &self,
        name: &str,
        schema: &Schema,
        pass: &mut PassContext,
    ) -> Result<TypeReference> {
        let resolved = match &schema.kind {
            SchemaKind::Primitive { kind, format } => {
                TypeReference::named(map_primitive(*kind, format.as_deref()))
            }
            SchemaKind::Enum(enumeration) if enumeration.kind != PrimitiveKind::String => {
                TypeReference::named(map_primitive(enumeration.kind, None))
            }
            SchemaKind::Object(object)
                if object.properties.is_empty() && object.additional_properties.is_some() =>
            {
                let site = TypeSite::new(name, "Value");
                let value = self.resolve(object.additional_properties.as_deref(), &site, pass)?;
                TypeReference::dictionary(value)
            }
            SchemaKind::Composition(composition) if composition.kind == CompositionKind::AllOf => {
                let site = TypeSite::new(name, "");
                match self.detect_pagination(&composition.members, &site, pass)? {
                    Some(paginated) => paginated,
                    None => TypeReference::named(pass.names.resolve_qualified(name)),
                }
            }
            SchemaKind::Composition(composition) => {
                if pass.polymorphic.contains_key(name) {
                    TypeReference::named(pass.names.resolve_qualified(name))
                } else {
                    let site = TypeSite::new(name, "");
                    self.resolve_union_without_discriminator(composition, &site, pass)?
                }
            }
            SchemaKind::Any => TypeReference::object(),
            SchemaKind::Reference(_)
            | SchemaKind::Array(_)
            | SchemaKind::Object(_)
            | SchemaKind::Enum(_) => TypeReference::named(pass.names.resolve_qualified(name)),
        };
        Ok(resolved)
    }

    fn resolve_inline_array(
        &self,
        array: &ArraySchema,
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> Result<TypeReference> {
        if !array.prefix_items.is_empty() {
            let mut elements = Vec::with_capacity(array.prefix_items.len());
            for (index, element) in array.prefix_items.iter().enumerate() {
                let element_site = TypeSite::new(&site.inline_name(), &format!("Item{}", index + 1));
                elements.push(self.resolve(Some(element), &element_site, pass)?);
            }
            return Ok(TypeReference::generic("ValueTuple", elements));
        }

        let item = self.resolve(array.items.as_deref(), &site.item(), pass)?;
        Ok(TypeReference::list(item))
    }

    fn resolve_inline_object(
        &self,
        object: &ObjectSchema,
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> Result<TypeReference> {
        if object.properties.is_empty() {
            return match object.additional_properties.as_deref() {
                Some(values) => {
                    let value = self.resolve(Some(values), &site.value(), pass)?;
                    Ok(TypeReference::dictionary(value))
                }
                None => Ok(TypeReference::object()),
            };
        }

        let name = inline::extract_or_reuse(self, object, &site.inline_name(), pass)?;
        Ok(TypeReference::named(name))
    }

    fn resolve_inline_enum(
        &self,
        enumeration: &EnumSchema,
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> TypeReference {
        if enumeration.kind != PrimitiveKind::String {
            return TypeReference::named(map_primitive(enumeration.kind, None));
        }
        let values = enumeration.string_values();
        let name = inline::extract_or_reuse_enum(&values, &site.inline_name(), pass);
        TypeReference::named(name)
    }

    fn resolve_composition(
        &self,
        composition: &Composition,
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> Result<TypeReference> {
        match composition.kind {
            CompositionKind::AllOf => self.resolve_all_of(&composition.members, site, pass),
            CompositionKind::OneOf | CompositionKind::AnyOf => {
                self.resolve_union_without_discriminator(composition, site, pass)
            }
        }
    }

    /// `allOf` resolution: the pagination pattern becomes `BaseType<ItemType>`, anything
    /// else resolves to its first reference member.
    fn resolve_all_of(
        &self,
        members: &[Schema],
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> Result<TypeReference> {
        if let Some(paginated) = self.detect_pagination(members, site, pass)? {
            return Ok(paginated);
        }

        if let Some(first_reference) = members.iter().find_map(|m| match &m.kind {
            SchemaKind::Reference(reference) => Some(reference.as_str()),
            _ => None,
        }) {
            if members.len() > 1 {
                debug!(
                    "allOf at {} resolved to its first reference member, other members are not merged",
                    site.inline_name()
                );
            }
            return self.resolve_reference(first_reference, pass);
        }

        let objects: Vec<&ObjectSchema> = members.iter().filter_map(Schema::as_object).collect();
        match objects.as_slice() {
            [] => match members.first() {
                Some(member) => self.resolve(Some(member), site, pass),
                None => Ok(TypeReference::object()),
            },
            [single] => self.resolve_inline_object(single, site, pass),
            many => {
                let merged = merge_objects(many.iter().copied());
                self.resolve_inline_object(&merged, site, pass)
            }
        }
    }

    /// `oneOf`/`anyOf` without a polymorphic configuration.
    ///
    /// A union with exactly one non-null arm is that arm, nullable when a null arm exists.
    /// Anything wider has no single target type and resolves to `object`.
    fn resolve_union_without_discriminator(
        &self,
        composition: &Composition,
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> Result<TypeReference> {
        let has_null = composition.members.iter().any(Schema::is_null_only);
        let arms: Vec<&Schema> = composition
            .members
            .iter()
            .filter(|m| !m.is_null_only())
            .collect();

        match arms.as_slice() {
            [single] => {
                let resolved = self.resolve(Some(single), site, pass)?;
                Ok(if has_null {
                    resolved.into_nullable()
                } else {
                    resolved
                })
            }
            _ => {
                debug!(
                    "Union at {} has {} arms and no discriminator, using object",
                    site.inline_name(),
                    arms.len()
                );
                Ok(TypeReference::object())
            }
        }
    }

    /// Detects `allOf: [$ref PaginatedResult, {properties: {items: array}}]`.
    pub fn detect_pagination(
        &self,
        members: &[Schema],
        site: &TypeSite,
        pass: &mut PassContext,
    ) -> Result<Option<TypeReference>> {
        let Some(base) = members
            .iter()
            .filter_map(Schema::reference_name)
            .find(|name| is_pagination_base(name))
        else {
            return Ok(None);
        };

        for member in members {
            let object = match &member.kind {
                SchemaKind::Object(object) => Some(object),
                SchemaKind::Reference(reference) if reference_id(reference) != base => self
                    .document
                    .component_schema(reference)
                    .and_then(Schema::as_object),
                _ => None,
            };
            let Some(object) = object else {
                continue;
            };

            for key in PAGINATION_ITEM_PROPERTIES {
                if let Some(SchemaKind::Array(array)) = object.properties.get(*key).map(|p| &p.kind) {
                    let item = self.resolve(array.items.as_deref(), &site.item(), pass)?;
                    let base_name = pass.names.resolve_qualified(&base);
                    debug!("Pagination pattern {}<{}>", base_name, item);
                    return Ok(Some(TypeReference::generic(base_name, vec![item])));
                }
            }
        }

        Ok(None)
    }

    /// Builds the ordered property list of a record named `record_name`.
    ///
    /// Nested inline schemas are hoisted as `{record_name}{Property}`.
    pub fn build_properties(
        &self,
        record_name: &str,
        object: &ObjectSchema,
        pass: &mut PassContext,
    ) -> Result<Vec<PropertyDescriptor>> {
        let mut properties = Vec::with_capacity(object.properties.len());
        let mut members = MemberScope::for_type(record_name);

        for (json_name, property_schema) in &object.properties {
            let required = object.is_required(json_name);
            let site = TypeSite::new(record_name, &to_pascal_case(json_name));
            let mut type_ref = self.resolve(Some(property_schema), &site, pass)?;

            let explicit_default = self.default_literal(property_schema, &type_ref);
            let default_value = match explicit_default {
                Some(literal) => Some(literal),
                None if !required => {
                    type_ref = type_ref.into_nullable();
                    Some("null".to_string())
                }
                None => None,
            };

            properties.push(PropertyDescriptor {
                name: members.claim(&member_name(json_name, record_name)),
                json_name: json_name.clone(),
                type_ref,
                required,
                default_value,
                description: property_schema.description.clone(),
                binding: None,
            });
        }

        Ok(crate::models::order_properties(properties))
    }

    /// Renders a schema `default` as a target-language literal, when it can be one.
    pub fn default_literal(&self, schema: &Schema, type_ref: &TypeReference) -> Option<String> {
        let value = schema.default.as_ref()?;
        match value {
            Value::String(text) if self.is_string_enum(schema) => Some(format!(
                "{}.{}",
                type_ref.base_name,
                to_pascal_case(text)
            )),
            Value::String(text) if type_ref.is_string() => Some(csharp_string_literal(text)),
            Value::Bool(flag) if type_ref.base_name == "bool" => Some(flag.to_string()),
            Value::Number(number) => match type_ref.base_name.as_str() {
                "float" => Some(format!("{}f", number)),
                "decimal" => Some(format!("{}m", number)),
                "int" | "long" | "short" | "sbyte" | "byte" | "uint" | "ulong" | "double" => {
                    Some(number.to_string())
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn is_string_enum(&self, schema: &Schema) -> bool {
        match &schema.kind {
            SchemaKind::Enum(enumeration) => enumeration.kind == PrimitiveKind::String,
            SchemaKind::Reference(reference) => self
                .document
                .component_schema(reference)
                .is_some_and(|target| {
                    matches!(&target.kind, SchemaKind::Enum(e) if e.kind == PrimitiveKind::String)
                }),
            _ => false,
        }
    }
}

fn wrap_in_lists(mut item: TypeReference, depth: usize) -> TypeReference {
    for _ in 0..depth {
        item = TypeReference::list(item);
    }
    item
}

/// Merges the properties and required sets of several object schemas, first one wins.
pub fn merge_objects<'s>(objects: impl IntoIterator<Item = &'s ObjectSchema>) -> ObjectSchema {
    let mut merged = ObjectSchema::default();
    for object in objects {
        for (name, schema) in &object.properties {
            merged
                .properties
                .entry(name.clone())
                .or_insert_with(|| schema.clone());
        }
        for required in &object.required {
            if !merged.required.contains(required) {
                merged.required.push(required.clone());
            }
        }
        if merged.additional_properties.is_none() {
            merged.additional_properties = object.additional_properties.clone();
        }
    }
    merged
}
