use crate::document::{
    Document, HttpMethod, Parameter, ParameterLocation, RequestBody, Response, SecurityRequirement,
};
use crate::error::{Error, Result};
use crate::naming::to_pascal_case;
use crate::policies::extensions::ExtensionScope;
use crate::schema::Extensions;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::HashSet;

/// Extension flags that turn a list response into an async stream.
const STREAMING_FLAGS: &[&str] = &["x-streaming", "x-async-enumerable"];

/// A single path/method pair with every reference resolved.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: String,
    /// Whether the id was synthesized from method and path
    pub operation_id_synthesized: bool,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Path-level parameters merged under operation-level overrides
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
    /// Operation security, or the document default when absent
    pub security: Option<Vec<SecurityRequirement>>,
    pub deprecated: bool,
    pub operation_extensions: Extensions,
    pub path_extensions: Extensions,
}

impl OperationDescriptor {
    /// PascalCase method name derived from the operation id.
    pub fn method_name(&self) -> String {
        to_pascal_case(&self.operation_id)
    }

    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    pub fn has_path_parameters(&self) -> bool {
        self.parameters_in(ParameterLocation::Path).next().is_some()
    }

    pub fn is_streaming(&self) -> bool {
        STREAMING_FLAGS.iter().any(|flag| {
            self.operation_extensions
                .get(*flag)
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        })
    }

    /// Vendor extension lookup in operation -> path -> document order.
    pub fn extension_scope<'a>(&'a self, document_extensions: &'a Extensions) -> ExtensionScope<'a> {
        ExtensionScope::new(
            &self.operation_extensions,
            &self.path_extensions,
            document_extensions,
        )
    }
}

/// Collects every operation of the document in path order, then method order.
///
/// # Errors
///
/// Returns [`Error::MissingPaths`] when the document has no `paths` object, and
/// [`Error::UnresolvedReference`] when a parameter, body or response `$ref` dangles.
pub fn collect_operations(document: &Document) -> Result<Vec<OperationDescriptor>> {
    let paths = document.paths.as_ref().ok_or(Error::MissingPaths)?;
    let mut operations = Vec::new();
    let mut used_ids: HashSet<String> = HashSet::new();

    for (path, item) in paths {
        let mut path_parameters = Vec::with_capacity(item.parameters.len());
        for parameter in &item.parameters {
            path_parameters.push(document.resolve_parameter(parameter)?.clone());
        }
        let path_extensions = crate::document::vendor_only(&item.extensions);

        for (method, operation) in item.operations() {
            let mut parameters = path_parameters.clone();
            for parameter in &operation.parameters {
                let parameter = document.resolve_parameter(parameter)?;
                match parameters
                    .iter_mut()
                    .find(|p| p.name == parameter.name && p.location == parameter.location)
                {
                    Some(existing) => *existing = parameter.clone(),
                    None => parameters.push(parameter.clone()),
                }
            }

            let request_body = match &operation.request_body {
                Some(body) => Some(document.resolve_request_body(body)?.clone()),
                None => None,
            };

            let mut responses = IndexMap::with_capacity(operation.responses.len());
            for (status, response) in &operation.responses {
                responses.insert(status.clone(), document.resolve_response(response)?.clone());
            }

            let (base_id, synthesized) = match operation.operation_id.as_deref() {
                Some(id) if !id.trim().is_empty() => (id.to_string(), false),
                _ => {
                    let id = synthesize_operation_id(method, path);
                    warn!("{} {} has no operationId, using {}", method.as_str(), path, id);
                    (id, true)
                }
            };
            let operation_id = unique_operation_id(&base_id, &mut used_ids);
            debug!("Collected {} {} as {}", method.as_str(), path, operation_id);

            operations.push(OperationDescriptor {
                path: path.clone(),
                method,
                operation_id,
                operation_id_synthesized: synthesized,
                tags: operation.tags.clone(),
                summary: operation.summary.clone().or_else(|| item.summary.clone()),
                description: operation.description.clone(),
                parameters,
                request_body,
                responses,
                security: operation.security.clone().or_else(|| document.security.clone()),
                deprecated: operation.deprecated,
                operation_extensions: crate::document::vendor_only(&operation.extensions),
                path_extensions: path_extensions.clone(),
            });
        }
    }

    info!("Collected {} operations from {} paths", operations.len(), paths.len());
    Ok(operations)
}

/// Builds an operation id from the method and the normalized path.
///
/// `GET /pets/{petId}` becomes `GetPetsByPetId`; the root path becomes `GetRoot`.
pub fn synthesize_operation_id(method: HttpMethod, path: &str) -> String {
    let mut id = method.pascal_name().to_string();
    let mut has_segment = false;

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        has_segment = true;
        match segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        {
            Some(parameter) => {
                id.push_str("By");
                id.push_str(&to_pascal_case(parameter));
            }
            None => id.push_str(&to_pascal_case(segment)),
        }
    }

    if !has_segment {
        id.push_str("Root");
    }
    id
}

/// Method names must be unique per document; repeats get a numeric suffix.
fn unique_operation_id(base: &str, used: &mut HashSet<String>) -> String {
    let key = to_pascal_case(base);
    if used.insert(key.clone()) {
        return base.to_string();
    }

    let mut suffix = 2;
    loop {
        let candidate = format!("{}{}", base, suffix);
        if used.insert(to_pascal_case(&candidate)) {
            warn!("Duplicate operationId {}, renamed to {}", base, candidate);
            return candidate;
        }
        suffix += 1;
    }
}

/// Whether a path segment is a `{parameter}` placeholder.
pub fn is_parameter_segment(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}
