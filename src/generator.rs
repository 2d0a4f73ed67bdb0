//! The generation pipeline.
//!
//! [`Generator`] runs every stage over one document: operation collection, model
//! extraction, grouping, endpoint synthesis and the document-wide policy and security
//! registrations. Each run owns a fresh [`PassContext`], so two runs over the same
//! document produce identical output.

use crate::context::PassContext;
use crate::document::Document;
use crate::endpoints::{synthesize_group, GroupRegistration};
use crate::error::{Error, Result};
use crate::grouping::{first_literal_segment, group_operations, GroupingStrategy};
use crate::models::{extract_models, EnumDescriptor, ModelSet, RecordDescriptor};
use crate::operations::collect_operations;
use crate::policies::oauth::{extract_oauth, scope_policies};
use crate::policies::PolicySet;
use crate::security::{collect_auth_schemes, AuthSchemeDescriptor};
use crate::type_resolver::TypeResolver;
use log::{debug, info};
use serde::Serialize;

/// Library-side configuration of a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Root namespace of the generated code
    pub namespace: String,
    pub grouping: GroupingStrategy,
    pub include_deprecated: bool,
    /// Restricts generation to operations whose first literal path segment matches
    pub path_segment: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            namespace: "Api".to_string(),
            grouping: GroupingStrategy::default(),
            include_deprecated: false,
            path_segment: None,
        }
    }
}

impl GeneratorOptions {
    pub fn models_namespace(&self) -> String {
        format!("{}.Models", self.namespace)
    }
}

/// Everything generated from one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutput {
    pub title: String,
    pub version: String,
    pub namespace: String,
    pub models_namespace: String,
    pub groups: Vec<GroupRegistration>,
    pub models: ModelSet,
    /// Records hoisted from inline object schemas
    pub inline_records: Vec<RecordDescriptor>,
    /// Enums hoisted from inline enum schemas
    pub inline_enums: Vec<EnumDescriptor>,
    pub policies: PolicySet,
    pub auth_schemes: Vec<AuthSchemeDescriptor>,
    /// Service registration snippets, in registration order
    pub registrations: Vec<String>,
}

impl GenerationOutput {
    pub fn group(&self, name: &str) -> Option<&GroupRegistration> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn endpoint_count(&self) -> usize {
        self.groups.iter().map(|g| g.endpoints.len()).sum()
    }
}

/// Generator over a single parsed document.
///
/// # Example
///
/// ```no_run
/// use openapi_minimal_api_gen::document::Document;
/// use openapi_minimal_api_gen::generator::{Generator, GeneratorOptions};
///
/// let document = Document::from_yaml_str("openapi: 3.0.3\npaths: {}").unwrap();
/// let output = Generator::new(&document, GeneratorOptions::default()).generate().unwrap();
/// println!("{} groups", output.groups.len());
/// ```
pub struct Generator<'a> {
    document: &'a Document,
    options: GeneratorOptions,
}

impl<'a> Generator<'a> {
    pub fn new(document: &'a Document, options: GeneratorOptions) -> Self {
        Self { document, options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Runs the full pipeline with the configured options.
    ///
    /// # Errors
    ///
    /// Fails when the document has no `paths` object or a schema reference cannot be
    /// resolved.
    pub fn generate(&self) -> Result<GenerationOutput> {
        self.run_pass(self.options.path_segment.as_deref())
    }

    /// Runs a fresh pass restricted to one path segment.
    pub fn generate_segment(&self, segment: &str) -> Result<GenerationOutput> {
        self.run_pass(Some(segment))
    }

    /// Runs one fresh pass per first literal path segment, in first-appearance order.
    ///
    /// Operations whose path has no literal segment are not covered by any segment.
    pub fn generate_per_segment(&self) -> Result<Vec<(String, GenerationOutput)>> {
        let operations = collect_operations(self.document)?;
        let mut segments: Vec<String> = Vec::new();
        for operation in &operations {
            match first_literal_segment(&operation.path) {
                Some(segment) => {
                    if !segments.iter().any(|s| s.eq_ignore_ascii_case(segment)) {
                        segments.push(segment.to_string());
                    }
                }
                None => debug!(
                    "Operation {} has no literal path segment, skipped in per-segment mode",
                    operation.operation_id
                ),
            }
        }

        info!("Generating {} path segments", segments.len());
        segments
            .into_iter()
            .map(|segment| {
                let output = self.generate_segment(&segment)?;
                Ok((segment, output))
            })
            .collect()
    }

    fn run_pass(&self, segment: Option<&str>) -> Result<GenerationOutput> {
        if self.options.namespace.split('.').any(|part| part.trim().is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "invalid namespace '{}'",
                self.options.namespace
            )));
        }
        let document = self.document;
        let models_namespace = self.options.models_namespace();

        // Step 1: collect operations
        let operations = collect_operations(document)?;
        info!("Collected {} operations", operations.len());

        // Step 2: fresh pass-scoped registries
        let mut pass = PassContext::new(document, &models_namespace);
        let resolver = TypeResolver::new(document);

        // Step 3: component models
        let models = extract_models(&resolver, &mut pass)?;
        info!("Extracted {} component models", models.len());

        // Step 4: grouping
        let groups = group_operations(
            document,
            operations,
            self.options.grouping,
            self.options.include_deprecated,
            segment,
        );

        // Step 5: endpoint synthesis
        let mut policies = PolicySet::default();
        let document_extensions = document.vendor_extensions();
        let mut registrations = Vec::with_capacity(groups.len());
        for group in &groups {
            registrations.push(synthesize_group(
                &resolver,
                group,
                &mut pass,
                &mut policies,
                &document_extensions,
            )?);
        }

        // Step 6: document-wide security
        let auth_schemes = collect_auth_schemes(document);
        let oauth = extract_oauth(document);
        for config in &oauth {
            policies.add_oauth(config);
        }
        for policy in scope_policies(&oauth) {
            policies.add_scope_policy(&policy);
        }

        let mut service_registrations = policies.registrations();
        service_registrations.extend(auth_schemes.iter().map(|s| s.registration.clone()));

        let (inline_records, inline_enums) = pass.inline.into_parts();
        debug!(
            "Pass finished: {} inline records, {} inline enums",
            inline_records.len(),
            inline_enums.len()
        );

        Ok(GenerationOutput {
            title: document.info.title.clone(),
            version: document.info.version.clone(),
            namespace: self.options.namespace.clone(),
            models_namespace,
            groups: registrations,
            models,
            inline_records,
            inline_enums,
            policies,
            auth_schemes,
            registrations: service_registrations,
        })
    }
}
