//! Endpoint synthesis.
//!
//! Turns each group of operations into a route group registration, a handler interface,
//! a typed client and one [`EndpointDescriptor`] per operation. Security, rate limiting and
//! output caching are hoisted to the group when every operation in it agrees.

use crate::context::PassContext;
use crate::descriptors::{InterfaceDescriptor, MethodDescriptor, ParameterDescriptor};
use crate::document::{HttpMethod, MediaType, Parameter, ParameterLocation};
use crate::error::Result;
use crate::grouping::GroupDescriptor;
use crate::models::{order_properties, PropertyDescriptor, RecordDescriptor};
use crate::naming::{member_name, to_camel_case, to_pascal_case, MemberScope};
use crate::operations::OperationDescriptor;
use crate::policies::cache::extract_cache;
use crate::policies::rate_limit::extract_rate_limit;
use crate::policies::resilience::extract_resilience;
use crate::policies::{CacheKind, CachePolicy, PolicySet, RateLimitPolicy};
use crate::polymorphism::flatten_object;
use crate::results::{
    analyze_responses, auto_applied_statuses, build_client_result, build_server_result,
    classify_content_type, produces_entries, BodyKind, ClientResultDescriptor, ProducesEntry,
    ResponseFeatures, ResultDescriptor,
};
use crate::schema::{Extensions, Schema};
use crate::security::{derive_auth, AuthRequirement};
use crate::snippets::{self, csharp_string_literal, ClientBody, ClientRequest, ClientValue};
use crate::type_resolver::{TypeReference, TypeResolver, TypeSite};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;

/// Local names used by generated method bodies; parameters with these names are renamed.
const RESERVED_LOCALS: &[&str] = &[
    "cancellationToken",
    "content",
    "cookieParts",
    "file",
    "form",
    "handler",
    "item",
    "queryParts",
    "request",
    "requestUri",
    "response",
    "statusCode",
    "token",
];

/// Where a bound member is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BindingSource {
    Route,
    Query,
    Header,
    Cookie,
    Body,
    /// Raw request body as a `Stream`
    BodyStream,
    Form,
    FormFile,
    FormFiles,
}

impl BindingSource {
    pub fn for_location(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Path => Self::Route,
            ParameterLocation::Query => Self::Query,
            ParameterLocation::Header => Self::Header,
            ParameterLocation::Cookie => Self::Cookie,
        }
    }

    /// Binding attribute for a member named `json_name` on the wire, e.g.
    /// `[FromHeader(Name = "X-Request-Id")]`.
    ///
    /// Stream bodies and file collections bind by type and get no attribute.
    pub fn attribute(&self, json_name: &str) -> Option<String> {
        let name = csharp_string_literal(json_name);
        match self {
            Self::Route => Some(format!("[FromRoute(Name = {})]", name)),
            Self::Query => Some(format!("[FromQuery(Name = {})]", name)),
            Self::Header => Some(format!("[FromHeader(Name = {})]", name)),
            Self::Body => Some("[FromBody]".to_string()),
            Self::Form | Self::FormFile => Some(format!("[FromForm(Name = {})]", name)),
            Self::Cookie | Self::BodyStream | Self::FormFiles => None,
        }
    }
}

/// How a file upload reaches the handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum FileUploadShape {
    /// The whole body is one binary payload
    BinaryBody { content_type: String },
    /// A multipart body that is a bare array of files
    MultiFileRaw { field_name: String },
    /// A multipart object with at least one file property
    MultipartObject {
        #[serde(skip_serializing_if = "Option::is_none")]
        schema_name: Option<String>,
        file_fields: Vec<String>,
        has_non_file_fields: bool,
    },
}

/// How the handler receives its inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ParameterBinding {
    /// A `{Operation}Parameters` record bound with `[AsParameters]`
    Aggregate { record: RecordDescriptor },
    /// Form fields passed one by one
    FormFields { fields: Vec<PropertyDescriptor> },
    None,
}

/// Policies applied at group level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HoistedPolicies {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointDescriptor {
    pub operation_id: String,
    pub method_name: String,
    pub http_method: HttpMethod,
    pub path: String,
    pub relative_route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub deprecated: bool,
    pub streaming: bool,
    pub binding: ParameterBinding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<FileUploadShape>,
    /// Effective authorization, whether hoisted or not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resilience: Option<String>,
    pub auto_applied: Vec<u16>,
    pub produces: Vec<ProducesEntry>,
    pub result: ResultDescriptor,
    pub client_result: ClientResultDescriptor,
    pub handler_method: MethodDescriptor,
    pub client_method: MethodDescriptor,
    /// `group.Map{Method}(...)` statement
    pub registration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientDescriptor {
    pub name: String,
    pub constructor_parameters: Vec<ParameterDescriptor>,
    pub uses_resilience: bool,
    pub methods: Vec<MethodDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRegistration {
    pub name: String,
    pub endpoints_class: String,
    /// `Map{Group}Endpoints` extension method; its body maps the whole group
    pub map_method: MethodDescriptor,
    pub handler_interface: InterfaceDescriptor,
    pub mapping_route: String,
    pub route_prefix: String,
    pub hoisted: HoistedPolicies,
    pub endpoints: Vec<EndpointDescriptor>,
    pub client: ClientDescriptor,
}

impl GroupRegistration {
    pub fn endpoint(&self, operation_id: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.operation_id == operation_id)
    }
}

/// Returns the shared value when every entry is `Some` and equal.
pub fn hoist<T: PartialEq + Clone>(values: &[Option<T>]) -> Option<T> {
    let first = values.first()?.as_ref()?;
    values
        .iter()
        .all(|value| value.as_ref() == Some(first))
        .then(|| first.clone())
}

/// Per-operation analysis before group-level hoisting.
struct OperationPlan {
    auth: Option<AuthRequirement>,
    rate_limit: Option<RateLimitPolicy>,
    cache: Option<CachePolicy>,
    endpoint: EndpointDescriptor,
    lambda_parameters: Vec<String>,
    handler_call: String,
    has_form: bool,
}

/// Synthesizes the registration of one group, adding its policies to `policies`.
///
/// # Errors
///
/// Fails when a schema referenced by a parameter, body or response cannot be resolved.
pub fn synthesize_group(
    resolver: &TypeResolver<'_>,
    group: &GroupDescriptor,
    pass: &mut PassContext,
    policies: &mut PolicySet,
    document_extensions: &Extensions,
) -> Result<GroupRegistration> {
    debug!("Synthesizing group {}", group.name);
    let handler_interface_name = format!("I{}Handler", group.name);

    let mut plans = Vec::with_capacity(group.operations.len());
    for operation in &group.operations {
        let plan = plan_operation(
            resolver,
            group,
            operation,
            &handler_interface_name,
            pass,
            policies,
            document_extensions,
        )?;
        plans.push(plan);
    }

    let auths: Vec<Option<AuthRequirement>> = plans.iter().map(|p| p.auth.clone()).collect();
    let rate_limits: Vec<Option<RateLimitPolicy>> = plans.iter().map(|p| p.rate_limit.clone()).collect();
    let caches: Vec<Option<CachePolicy>> = plans.iter().map(|p| p.cache.clone()).collect();
    let hoisted_auth = hoist(&auths);
    let hoisted_rate = hoist(&rate_limits);
    let hoisted_cache = hoist(&caches);

    let mut group_calls = Vec::new();
    if let Some(auth) = &hoisted_auth {
        group_calls.extend(auth.metadata_calls());
    }
    if let Some(rate) = &hoisted_rate {
        group_calls.push(rate_limit_call(rate));
    }
    if let Some(cache) = &hoisted_cache {
        group_calls.push(cache_call(cache));
    }

    let mut endpoints = Vec::with_capacity(plans.len());
    for plan in plans {
        let mut calls = vec![format!(
            ".WithName({})",
            csharp_string_literal(&plan.endpoint.method_name)
        )];
        if let Some(summary) = &plan.endpoint.summary {
            calls.push(format!(".WithSummary({})", csharp_string_literal(summary)));
        }
        calls.extend(plan.endpoint.produces.iter().map(produces_call));
        if hoisted_auth.is_none() {
            if let Some(auth) = &plan.auth {
                calls.extend(auth.metadata_calls());
            }
        }
        if hoisted_rate.is_none() {
            if let Some(rate) = &plan.rate_limit {
                calls.push(rate_limit_call(rate));
            }
        }
        if hoisted_cache.is_none() {
            if let Some(cache) = &plan.cache {
                calls.push(cache_call(cache));
            }
        }
        if plan.has_form {
            calls.push(".DisableAntiforgery()".to_string());
        }
        if plan.endpoint.deprecated {
            calls.push(".WithMetadata(new ObsoleteAttribute())".to_string());
        }

        let mut endpoint = plan.endpoint;
        endpoint.registration = snippets::endpoint_registration(
            endpoint.http_method,
            &endpoint.relative_route,
            &plan.lambda_parameters,
            &plan.handler_call,
            &calls,
        );
        endpoints.push(endpoint);
    }

    let registration = snippets::group_registration(
        &group.route.mapping_route,
        &group.name,
        &group_calls,
        &endpoints.iter().map(|e| e.registration.clone()).collect::<Vec<_>>(),
    );
    let mut map_method = MethodDescriptor::new(
        format!("Map{}Endpoints", group.name),
        TypeReference::named("RouteGroupBuilder"),
    );
    map_method.is_static = true;
    map_method.parameters.push(
        ParameterDescriptor::new("app", TypeReference::named("IEndpointRouteBuilder")).with_attribute("this"),
    );
    map_method.body = Some(registration);

    let handler_interface = InterfaceDescriptor {
        name: handler_interface_name,
        methods: endpoints.iter().map(|e| e.handler_method.clone()).collect(),
    };
    let client = client_descriptor(&group.name, &endpoints);

    info!(
        "Group {}: {} endpoints, hoisted auth {}, rate limit {}, cache {}",
        group.name,
        endpoints.len(),
        hoisted_auth.is_some(),
        hoisted_rate.is_some(),
        hoisted_cache.is_some()
    );

    Ok(GroupRegistration {
        name: group.name.clone(),
        endpoints_class: format!("{}Endpoints", group.name),
        map_method,
        handler_interface,
        mapping_route: group.route.mapping_route.clone(),
        route_prefix: group.route.prefix.clone(),
        hoisted: HoistedPolicies {
            auth: hoisted_auth,
            rate_limit: hoisted_rate.map(|r| r.name),
            cache: hoisted_cache.map(|c| c.name),
        },
        endpoints,
        client,
    })
}

fn plan_operation(
    resolver: &TypeResolver<'_>,
    group: &GroupDescriptor,
    operation: &OperationDescriptor,
    handler_interface: &str,
    pass: &mut PassContext,
    policies: &mut PolicySet,
    document_extensions: &Extensions,
) -> Result<OperationPlan> {
    let method_name = operation.method_name();
    let scope = operation.extension_scope(document_extensions);

    let auth = derive_auth(operation.security.as_deref(), &scope);
    let rate_limit = extract_rate_limit(&scope).map(|policy| policies.add_rate_limit(&policy));
    let cache = extract_cache(&scope).map(|policy| policies.add_cache(&policy));
    let resilience = extract_resilience(&scope).map(|policy| policies.add_resilience(&policy));

    let bound = bind_parameters(resolver, operation, pass)?;

    let specs = analyze_responses(resolver, operation, pass)?;
    let declared: Vec<_> = specs.iter().map(|s| s.status).collect();
    let features = ResponseFeatures {
        method: operation.method,
        has_parameters: !operation.parameters.is_empty() || operation.request_body.is_some(),
        has_path_parameters: operation.has_path_parameters(),
        requires_authentication: auth.as_ref().is_some_and(AuthRequirement::requires_authentication),
        has_restriction: auth.as_ref().is_some_and(AuthRequirement::has_restriction),
        rate_limited: rate_limit.is_some(),
    };
    let auto_applied = auto_applied_statuses(&declared, &features);
    let streaming = operation.is_streaming();

    let result_name = pass.names.reserve(&format!("{}Result", method_name));
    let client_result_name = pass.names.reserve(&format!("{}ClientResult", method_name));
    let result = build_server_result(&result_name, &specs, streaming);
    let client_result = build_client_result(&client_result_name, &specs, &auto_applied);
    let produces = produces_entries(&specs, &auto_applied);
    debug!(
        "{}: {} declared responses, auto-applied {:?}",
        operation.operation_id,
        specs.len(),
        auto_applied
    );

    let handler_method_name = format!("{}Async", method_name);
    let mut handler_method = MethodDescriptor::new(
        &handler_method_name,
        TypeReference::generic("Task", vec![TypeReference::named(&result_name)]),
    );
    let mut lambda_parameters = Vec::new();
    let mut call_arguments = Vec::new();
    let binding = match bound.binding {
        Binding::Aggregate(properties) => {
            let mut record = RecordDescriptor::new(&pass.names.reserve(&format!("{}Parameters", method_name)));
            record.properties = properties;
            lambda_parameters.push(format!("[AsParameters] {} parameters", record.name));
            handler_method
                .parameters
                .push(ParameterDescriptor::new("parameters", TypeReference::named(&record.name)));
            call_arguments.push("parameters".to_string());
            ParameterBinding::Aggregate { record }
        }
        Binding::FormFields(fields) => {
            let mut locals = MemberScope::default();
            for field in &fields {
                let variable = locals.claim(&local_variable(&field.json_name));
                let mut rendered = String::new();
                if let Some(attribute) = field.binding.and_then(|b| b.attribute(&field.json_name)) {
                    rendered.push_str(&attribute);
                    rendered.push(' ');
                }
                rendered.push_str(&format!("{} {}", field.type_ref, variable));
                lambda_parameters.push(rendered);
                handler_method
                    .parameters
                    .push(ParameterDescriptor::new(&variable, field.type_ref.clone()));
                call_arguments.push(variable);
            }
            ParameterBinding::FormFields { fields }
        }
        Binding::None => ParameterBinding::None,
    };
    lambda_parameters.push(format!("{} handler", handler_interface));
    lambda_parameters.push("CancellationToken cancellationToken".to_string());
    handler_method.parameters.push(ParameterDescriptor::cancellation_token());
    call_arguments.push("cancellationToken".to_string());
    let handler_call = format!("handler.{}({})", handler_method_name, call_arguments.join(", "));

    let keep_response_open = streaming
        || client_result
            .accessors
            .iter()
            .any(|a| a.body_kind == Some(BodyKind::Binary));
    let client_method = client_method(
        operation,
        &handler_method_name,
        &client_result_name,
        &bound.client,
        resilience.as_ref().map(|r| r.name.as_str()),
        keep_response_open,
        streaming,
    );

    let endpoint = EndpointDescriptor {
        operation_id: operation.operation_id.clone(),
        method_name,
        http_method: operation.method,
        path: operation.path.clone(),
        relative_route: group.relative_path(operation),
        summary: operation.summary.clone(),
        deprecated: operation.deprecated,
        streaming,
        binding,
        upload: bound.upload,
        auth: auth.clone(),
        rate_limit: rate_limit.as_ref().map(|r| r.name.clone()),
        cache: cache.as_ref().map(|c| c.name.clone()),
        resilience: resilience.map(|r| r.name),
        auto_applied,
        produces,
        result,
        client_result,
        handler_method,
        client_method,
        registration: String::new(),
    };

    Ok(OperationPlan {
        auth,
        rate_limit,
        cache,
        endpoint,
        lambda_parameters,
        handler_call,
        has_form: bound.has_form,
    })
}

fn produces_call(entry: &ProducesEntry) -> String {
    if entry.is_problem {
        return format!(".ProducesProblem({})", entry.status);
    }
    match (&entry.type_ref, &entry.content_type) {
        (Some(type_ref), Some(content_type)) => format!(
            ".Produces<{}>({}, {})",
            type_ref,
            entry.status,
            csharp_string_literal(content_type)
        ),
        (Some(type_ref), None) => format!(".Produces<{}>({})", type_ref, entry.status),
        (None, _) => format!(".Produces({})", entry.status),
    }
}

fn rate_limit_call(policy: &RateLimitPolicy) -> String {
    format!(".RequireRateLimiting({})", csharp_string_literal(&policy.name))
}

fn cache_call(policy: &CachePolicy) -> String {
    match policy.kind {
        CacheKind::Output => format!(".CacheOutput({})", csharp_string_literal(&policy.name)),
        CacheKind::Response => snippets::cache_control_filter(policy),
    }
}

/// Parameter or variable name for a wire name, clear of keywords and generated locals.
pub fn local_variable(wire_name: &str) -> String {
    let name = to_camel_case(wire_name);
    if RESERVED_LOCALS.contains(&name.as_str()) {
        format!("{}Value", name)
    } else {
        name
    }
}

// ---------------------------------------------------------------------------
// Parameter binding
// ---------------------------------------------------------------------------

enum Binding {
    Aggregate(Vec<PropertyDescriptor>),
    FormFields(Vec<PropertyDescriptor>),
    None,
}

/// What the client sends.
#[derive(Default)]
struct ClientInputs {
    path: Vec<ClientValue>,
    query: Vec<ClientValue>,
    headers: Vec<ClientValue>,
    cookies: Vec<ClientValue>,
    body: Option<ClientBody>,
    /// Resolved type of a JSON body
    body_type: Option<TypeReference>,
}

impl ClientInputs {
    /// Gives every client method parameter a distinct variable name, body last.
    fn claim_variables(&mut self) {
        let mut locals = MemberScope::default();
        for value in self
            .path
            .iter_mut()
            .chain(self.query.iter_mut())
            .chain(self.headers.iter_mut())
            .chain(self.cookies.iter_mut())
        {
            value.variable = locals.claim(&value.variable);
        }
        match &mut self.body {
            Some(ClientBody::Json { variable, .. })
            | Some(ClientBody::Text { variable, .. })
            | Some(ClientBody::Binary { variable, .. })
            | Some(ClientBody::Files { variable, .. }) => *variable = locals.claim(variable),
            Some(ClientBody::Multipart { fields }) | Some(ClientBody::FormUrlEncoded { fields }) => {
                for field in fields {
                    field.variable = locals.claim(&field.variable);
                }
            }
            None => {}
        }
    }
}

struct BoundParameters {
    binding: Binding,
    upload: Option<FileUploadShape>,
    has_form: bool,
    client: ClientInputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Multipart,
    FormUrlEncoded,
    Body(BodyKind),
}

fn classify_request(content_type: &str) -> Option<RequestKind> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "multipart/form-data" => Some(RequestKind::Multipart),
        "application/x-www-form-urlencoded" => Some(RequestKind::FormUrlEncoded),
        _ => classify_content_type(&essence).map(RequestKind::Body),
    }
}

/// Picks the request media type: forms first, then JSON, text and binary.
fn select_request_content(
    content: &IndexMap<String, MediaType>,
) -> Option<(&String, &MediaType, RequestKind)> {
    [
        RequestKind::Multipart,
        RequestKind::FormUrlEncoded,
        RequestKind::Body(BodyKind::Json),
        RequestKind::Body(BodyKind::Text),
        RequestKind::Body(BodyKind::Binary),
    ]
    .into_iter()
    .find_map(|wanted| {
        content
            .iter()
            .find(|(content_type, _)| classify_request(content_type) == Some(wanted))
            .map(|(content_type, media)| (content_type, media, wanted))
    })
}

fn bind_parameters(
    resolver: &TypeResolver<'_>,
    operation: &OperationDescriptor,
    pass: &mut PassContext,
) -> Result<BoundParameters> {
    let method_name = operation.method_name();
    let record_name = format!("{}Parameters", method_name);
    let mut properties: Vec<PropertyDescriptor> = Vec::new();
    let mut client = ClientInputs::default();

    for parameter in &operation.parameters {
        let property = bind_parameter(resolver, &method_name, &record_name, parameter, pass)?;
        let value = client_value(&property);
        match parameter.location {
            ParameterLocation::Path => client.path.push(value),
            ParameterLocation::Query => client.query.push(value),
            ParameterLocation::Header => client.headers.push(value),
            ParameterLocation::Cookie => {
                debug!(
                    "{}: cookie parameter {} is read by the handler, not bound",
                    operation.operation_id, parameter.name
                );
                client.cookies.push(value);
                continue;
            }
        }
        properties.push(property);
    }

    let mut upload = None;
    let mut has_form = false;
    let mut flatten = false;

    let selected = operation
        .request_body
        .as_ref()
        .and_then(|body| select_request_content(&body.content).map(|selected| (body.required, selected)));
    if let Some((required, (content_type, media, kind))) = selected {
        debug!("{}: request body {} ({:?})", operation.operation_id, content_type, kind);
        let schema = media.schema.as_ref();
        match kind {
            RequestKind::Body(BodyKind::Json) => {
                let site = TypeSite::new(&method_name, "Request");
                let type_ref = resolver.resolve(schema, &site, pass)?;
                properties.push(body_property(type_ref.clone(), required, BindingSource::Body));
                client.body_type = Some(type_ref);
                client.body = Some(ClientBody::Json {
                    variable: "body".to_string(),
                    required,
                });
            }
            RequestKind::Body(BodyKind::Text) => {
                properties.push(body_property(TypeReference::named("string"), required, BindingSource::Body));
                client.body = Some(ClientBody::Text {
                    variable: "body".to_string(),
                    content_type: content_type.clone(),
                });
            }
            RequestKind::Body(BodyKind::Binary) => {
                properties.push(body_property(TypeReference::named("Stream"), true, BindingSource::BodyStream));
                upload = Some(FileUploadShape::BinaryBody {
                    content_type: content_type.clone(),
                });
                client.body = Some(ClientBody::Binary {
                    variable: "body".to_string(),
                    content_type: content_type.clone(),
                });
            }
            RequestKind::Multipart if schema.is_some_and(Schema::is_binary_array) => {
                properties.push(PropertyDescriptor {
                    name: "Files".to_string(),
                    json_name: "files".to_string(),
                    type_ref: TypeReference::named("IFormFileCollection"),
                    required: true,
                    default_value: None,
                    description: None,
                    binding: Some(BindingSource::FormFiles),
                });
                upload = Some(FileUploadShape::MultiFileRaw {
                    field_name: "files".to_string(),
                });
                client.body = Some(ClientBody::Files {
                    variable: "files".to_string(),
                    field_name: "files".to_string(),
                });
                has_form = true;
            }
            RequestKind::Multipart | RequestKind::FormUrlEncoded => {
                let fields = form_fields(resolver, &method_name, &record_name, schema, pass)?;
                let file_fields: Vec<String> = fields
                    .iter()
                    .filter(|f| f.type_ref.is_file())
                    .map(|f| f.json_name.clone())
                    .collect();
                let has_non_file_fields = fields.iter().any(|f| !f.type_ref.is_file());

                let client_fields: Vec<ClientValue> = fields.iter().map(client_value).collect();
                client.body = Some(if kind == RequestKind::Multipart {
                    ClientBody::Multipart { fields: client_fields }
                } else {
                    ClientBody::FormUrlEncoded { fields: client_fields }
                });

                if !file_fields.is_empty() {
                    flatten = has_non_file_fields;
                    upload = Some(FileUploadShape::MultipartObject {
                        schema_name: schema.and_then(Schema::reference_name),
                        file_fields,
                        has_non_file_fields,
                    });
                }
                properties.extend(fields);
                has_form = true;
            }
        }
    } else if let Some(body) = &operation.request_body {
        let declared: Vec<&String> = body.content.keys().collect();
        warn!(
            "{}: no supported request content type among {:?}, body is not bound",
            operation.operation_id,
            declared
        );
    }

    let mut members = MemberScope::for_type(&record_name);
    for property in &mut properties {
        property.name = members.claim(&property.name);
    }
    client.claim_variables();

    let properties = order_properties(properties);
    let binding = if properties.is_empty() {
        Binding::None
    } else if flatten {
        Binding::FormFields(properties)
    } else {
        Binding::Aggregate(properties)
    };

    Ok(BoundParameters {
        binding,
        upload,
        has_form,
        client,
    })
}

fn bind_parameter(
    resolver: &TypeResolver<'_>,
    method_name: &str,
    record_name: &str,
    parameter: &Parameter,
    pass: &mut PassContext,
) -> Result<PropertyDescriptor> {
    let site = TypeSite::new(method_name, &to_pascal_case(&parameter.name));
    let type_ref = resolver.resolve(parameter.schema.as_ref(), &site, pass)?;
    let required = parameter.required || parameter.location == ParameterLocation::Path;
    let default = parameter
        .schema
        .as_ref()
        .and_then(|schema| resolver.default_literal(schema, &type_ref));
    Ok(member(
        record_name,
        &parameter.name,
        type_ref,
        required,
        default,
        parameter.description.clone(),
        BindingSource::for_location(parameter.location),
    ))
}

/// Flattened fields of a form body. File properties become `IFormFile` or
/// `IFormFileCollection`.
fn form_fields(
    resolver: &TypeResolver<'_>,
    method_name: &str,
    record_name: &str,
    schema: Option<&Schema>,
    pass: &mut PassContext,
) -> Result<Vec<PropertyDescriptor>> {
    let Some(schema) = schema else {
        return Ok(Vec::new());
    };
    if schema.is_binary() {
        return Ok(vec![member(
            record_name,
            "file",
            TypeReference::named("IFormFile"),
            true,
            None,
            None,
            BindingSource::FormFile,
        )]);
    }

    let object = flatten_object(resolver.document(), schema);
    let mut fields = Vec::with_capacity(object.properties.len());
    for (json_name, property) in &object.properties {
        let required = object.is_required(json_name);
        let (type_ref, source) = if property.is_binary() {
            (TypeReference::named("IFormFile"), BindingSource::FormFile)
        } else if property.is_binary_array() {
            (TypeReference::named("IFormFileCollection"), BindingSource::FormFiles)
        } else {
            let site = TypeSite::new(method_name, &to_pascal_case(json_name));
            (resolver.resolve(Some(property), &site, pass)?, BindingSource::Form)
        };
        let default = resolver.default_literal(property, &type_ref);
        fields.push(member(
            record_name,
            json_name,
            type_ref,
            required,
            default,
            property.description.clone(),
            source,
        ));
    }
    Ok(fields)
}

/// A bound member; optional members without a default become nullable with `null`.
fn member(
    record_name: &str,
    json_name: &str,
    mut type_ref: TypeReference,
    required: bool,
    default: Option<String>,
    description: Option<String>,
    source: BindingSource,
) -> PropertyDescriptor {
    let default_value = match default {
        Some(literal) => Some(literal),
        None if !required => {
            type_ref = type_ref.into_nullable();
            Some("null".to_string())
        }
        None => None,
    };
    PropertyDescriptor {
        name: member_name(json_name, record_name),
        json_name: json_name.to_string(),
        type_ref,
        required,
        default_value,
        description,
        binding: Some(source),
    }
}

fn body_property(type_ref: TypeReference, required: bool, source: BindingSource) -> PropertyDescriptor {
    let (type_ref, default_value) = if required {
        (type_ref, None)
    } else {
        (type_ref.into_nullable(), Some("null".to_string()))
    };
    PropertyDescriptor {
        name: "Body".to_string(),
        json_name: "body".to_string(),
        type_ref,
        required,
        default_value,
        description: None,
        binding: Some(source),
    }
}

/// Client-side view of a bound member; files are sent as streams.
fn client_value(property: &PropertyDescriptor) -> ClientValue {
    let stream = TypeReference::named("Stream");
    let type_ref = match property.type_ref.base_name.as_str() {
        "IFormFile" => stream,
        "IFormFileCollection" => TypeReference::generic("IEnumerable", vec![stream]),
        _ => property.type_ref.clone(),
    };
    let type_ref = if property.type_ref.nullable {
        type_ref.into_nullable()
    } else {
        type_ref
    };
    ClientValue {
        wire_name: property.json_name.clone(),
        variable: local_variable(&property.json_name),
        type_ref,
        default_value: property.default_value.clone(),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

fn client_method(
    operation: &OperationDescriptor,
    method_name: &str,
    client_result_name: &str,
    inputs: &ClientInputs,
    resilience_pipeline: Option<&str>,
    keep_response_open: bool,
    streaming: bool,
) -> MethodDescriptor {
    let mut values: Vec<&ClientValue> = inputs
        .path
        .iter()
        .chain(&inputs.query)
        .chain(&inputs.headers)
        .chain(&inputs.cookies)
        .collect();
    let mut body_parameters: Vec<ParameterDescriptor> = Vec::new();
    match &inputs.body {
        Some(ClientBody::Json { variable, required }) => {
            let body_type = inputs.body_type.clone().unwrap_or_else(TypeReference::object);
            let parameter = if *required {
                ParameterDescriptor::new(variable, body_type)
            } else {
                ParameterDescriptor::new(variable, body_type.into_nullable()).with_default("null")
            };
            body_parameters.push(parameter);
        }
        Some(ClientBody::Text { variable, .. }) => {
            body_parameters.push(ParameterDescriptor::new(variable, TypeReference::named("string")));
        }
        Some(ClientBody::Binary { variable, .. }) => {
            body_parameters.push(ParameterDescriptor::new(variable, TypeReference::named("Stream")));
        }
        Some(ClientBody::Files { variable, .. }) => {
            body_parameters.push(ParameterDescriptor::new(
                variable,
                TypeReference::generic("IEnumerable", vec![TypeReference::named("Stream")]),
            ));
        }
        Some(ClientBody::Multipart { fields }) | Some(ClientBody::FormUrlEncoded { fields }) => {
            values.extend(fields.iter());
        }
        None => {}
    }

    let mut parameters: Vec<ParameterDescriptor> = values
        .iter()
        .map(|value| {
            let parameter = ParameterDescriptor::new(&value.variable, value.type_ref.clone());
            match &value.default_value {
                Some(default) => parameter.with_default(default),
                None => parameter,
            }
        })
        .collect();
    parameters.extend(body_parameters);
    // Required parameters first; stable otherwise.
    let (mut ordered, optional): (Vec<_>, Vec<_>) =
        parameters.into_iter().partition(|p| p.default_value.is_none());
    ordered.extend(optional);
    ordered.push(ParameterDescriptor::cancellation_token().with_default("default"));

    let body = snippets::client_method_body(&ClientRequest {
        method: operation.method,
        path: &operation.path,
        path_parameters: &inputs.path,
        query: &inputs.query,
        headers: &inputs.headers,
        cookies: &inputs.cookies,
        body: inputs.body.as_ref(),
        result_name: client_result_name,
        resilience_pipeline,
        keep_response_open,
        streaming,
    });

    let mut method = MethodDescriptor::new(
        method_name,
        TypeReference::generic("Task", vec![TypeReference::named(client_result_name)]),
    );
    method.is_async = true;
    method.parameters = ordered;
    method.body = Some(body);
    method
}

fn client_descriptor(group_name: &str, endpoints: &[EndpointDescriptor]) -> ClientDescriptor {
    let uses_resilience = endpoints.iter().any(|e| e.resilience.is_some());
    let mut constructor_parameters = vec![ParameterDescriptor::new(
        "httpClient",
        TypeReference::named("HttpClient"),
    )];
    if uses_resilience {
        constructor_parameters.push(ParameterDescriptor::new(
            "resiliencePipelineProvider",
            TypeReference::generic(
                "ResiliencePipelineProvider",
                vec![TypeReference::named("string")],
            ),
        ));
    }
    ClientDescriptor {
        name: format!("{}Client", group_name),
        constructor_parameters,
        uses_resilience,
        methods: endpoints.iter().map(|e| e.client_method.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::grouping::{group_operations, GroupingStrategy};
    use crate::operations::collect_operations;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"
openapi: 3.0.3
info: { title: Pets, version: '1' }
security:
  - bearer: []
x-rate-limit: { name: burst, permitLimit: 20, windowSeconds: 10 }
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - { name: limit, in: query, schema: { type: integer } }
      responses:
        '200':
          description: pets
          content:
            application/json:
              schema:
                type: array
                items: { $ref: '#/components/schemas/Pet' }
    post:
      operationId: createPet
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: '#/components/schemas/Pet' }
      responses:
        '201':
          description: created
          content:
            application/json:
              schema: { $ref: '#/components/schemas/Pet' }
  /pets/{petId}:
    get:
      operationId: getPet
      x-cache: 30
      parameters:
        - { name: petId, in: path, required: true, schema: { type: integer, format: int64 } }
        - { name: X-Request-Id, in: header, schema: { type: string } }
      responses:
        '200':
          description: pet
          content:
            application/json:
              schema: { $ref: '#/components/schemas/Pet' }
  /pets/{petId}/photo:
    post:
      operationId: uploadPhoto
      parameters:
        - { name: petId, in: path, required: true, schema: { type: integer, format: int64 } }
      requestBody:
        content:
          multipart/form-data:
            schema:
              type: object
              required: [file]
              properties:
                caption: { type: string }
                file: { type: string, format: binary }
      responses:
        '204': { description: stored }
components:
  securitySchemes:
    bearer: { type: http, scheme: bearer }
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name: { type: string }
"#;

    fn synthesize() -> (GroupRegistration, PolicySet) {
        synthesize_from(DOCUMENT)
    }

    fn synthesize_from(yaml: &str) -> (GroupRegistration, PolicySet) {
        let doc = Document::from_yaml_str(yaml).unwrap();
        let operations = collect_operations(&doc).unwrap();
        let groups = group_operations(&doc, operations, GroupingStrategy::FirstPathSegment, false, None);
        let mut pass = PassContext::new(&doc, "Api.Models");
        let mut policies = PolicySet::default();
        let resolver = TypeResolver::new(&doc);
        let registration = synthesize_group(
            &resolver,
            &groups[0],
            &mut pass,
            &mut policies,
            &doc.vendor_extensions(),
        )
        .unwrap();
        (registration, policies)
    }

    #[test]
    fn test_hoist() {
        assert_eq!(hoist(&[Some(1), Some(1)]), Some(1));
        assert_eq!(hoist(&[Some(1), Some(2)]), None);
        assert_eq!(hoist(&[Some(1), None]), None);
        assert_eq!(hoist::<u8>(&[]), None);
    }

    #[test]
    fn test_group_hoists_shared_policies() {
        let (group, policies) = synthesize();
        assert_eq!(group.name, "Pets");
        assert_eq!(group.handler_interface.name, "IPetsHandler");
        assert_eq!(group.hoisted.rate_limit.as_deref(), Some("Burst"));
        assert!(group.hoisted.auth.is_some());
        assert!(group.hoisted.cache.is_none());

        let body = group.map_method.body.as_deref().unwrap();
        assert!(body.starts_with("var group = app.MapGroup(\"/pets\")"));
        assert!(body.contains(".RequireRateLimiting(\"Burst\")"));
        assert!(body.contains(".RequireAuthorization()"));

        let get_pet = group.endpoint("getPet").unwrap();
        assert!(get_pet.registration.contains(".CacheOutput(\"Cache30Seconds\")"));
        assert!(!get_pet.registration.contains("RequireRateLimiting"));

        assert_eq!(policies.rate_limits.len(), 1);
        assert_eq!(policies.caches.len(), 1);
    }

    #[test]
    fn test_auto_applied_responses_stay_out_of_server_result() {
        let (group, _) = synthesize();
        let create = group.endpoint("createPet").unwrap();
        assert_eq!(create.auto_applied, vec![400, 401, 409, 429, 500]);
        assert!(create.produces.iter().any(|p| p.status == 400 && p.is_problem));
        assert!(create.result.factory("BadRequest").is_none());
        assert!(create.client_result.accessor(crate::results::StatusKey::Code(400)).is_some());
        assert!(create.registration.contains(".Produces<Pet>(201)"));
        assert!(create.registration.contains(".ProducesProblem(400)"));
    }

    #[test]
    fn test_aggregate_parameters_record() {
        let (group, _) = synthesize();
        let get_pet = group.endpoint("getPet").unwrap();
        let ParameterBinding::Aggregate { record } = &get_pet.binding else {
            panic!("expected aggregate binding");
        };
        assert_eq!(record.name, "GetPetParameters");
        let names: Vec<&str> = record.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["PetId", "XRequestId"]);
        assert_eq!(
            record.properties[1].binding.unwrap().attribute(&record.properties[1].json_name).unwrap(),
            "[FromHeader(Name = \"X-Request-Id\")]"
        );
        assert_eq!(get_pet.relative_route, "{petId}");
        assert_eq!(
            get_pet.handler_method.signature(),
            "Task<GetPetResult> GetPetAsync(GetPetParameters parameters, CancellationToken cancellationToken)"
        );
        assert_eq!(
            get_pet.client_method.signature(),
            "Task<GetPetClientResult> GetPetAsync(long petId, string? xRequestId = null, CancellationToken cancellationToken = default)"
        );
        let client_body = get_pet.client_method.body.as_deref().unwrap();
        assert!(client_body.starts_with("var requestUri = $\"pets/{petId}\";"));
        assert!(client_body.contains("request.Headers.TryAddWithoutValidation(\"X-Request-Id\", xRequestId);"));
    }

    #[test]
    fn test_mixed_multipart_is_flattened() {
        let (group, _) = synthesize();
        let upload = group.endpoint("uploadPhoto").unwrap();
        let ParameterBinding::FormFields { fields } = &upload.binding else {
            panic!("expected form fields");
        };
        let names: Vec<&str> = fields.iter().map(|f| f.json_name.as_str()).collect();
        assert_eq!(names, vec!["petId", "file", "caption"]);
        assert_eq!(
            upload.upload,
            Some(FileUploadShape::MultipartObject {
                schema_name: None,
                file_fields: vec!["file".to_string()],
                has_non_file_fields: true,
            })
        );
        assert!(upload.registration.contains("[FromForm(Name = \"caption\")] string? caption"));
        assert!(upload.registration.contains(".DisableAntiforgery()"));
        let client_body = upload.client_method.body.as_deref().unwrap();
        assert!(client_body.contains("content.Add(new StreamContent(fileValue), \"file\", \"file\");"));
    }

    #[test]
    fn test_local_variable_avoids_reserved_names() {
        assert_eq!(local_variable("X-Request-Id"), "xRequestId");
        assert_eq!(local_variable("response"), "responseValue");
        assert_eq!(local_variable("class"), "@class");
    }

    #[test]
    fn test_colliding_parameter_names_are_suffixed() {
        let (group, _) = synthesize_from(
            r#"
openapi: 3.0.3
paths:
  /items/{id}:
    put:
      operationId: updateItem
      parameters:
        - { name: id, in: path, required: true, schema: { type: string } }
        - { name: id, in: query, schema: { type: string } }
        - { name: body, in: query, schema: { type: string } }
      requestBody:
        required: true
        content:
          application/json:
            schema: { $ref: '#/components/schemas/Item' }
      responses:
        '204': { description: updated }
components:
  schemas:
    Item:
      type: object
      properties:
        name: { type: string }
"#,
        );
        let update = group.endpoint("updateItem").unwrap();
        let ParameterBinding::Aggregate { record } = &update.binding else {
            panic!("expected aggregate binding");
        };
        let names: Vec<&str> = record.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Body2", "Id2", "Body"]);
        let wire: Vec<&str> = record.properties.iter().map(|p| p.json_name.as_str()).collect();
        assert_eq!(wire, vec!["id", "body", "id", "body"]);

        assert_eq!(
            update.client_method.signature(),
            "Task<UpdateItemClientResult> UpdateItemAsync(string id, Item body2, string? id2 = null, string? body = null, CancellationToken cancellationToken = default)"
        );
        let client_body = update.client_method.body.as_deref().unwrap();
        assert!(client_body.contains("JsonContent.Create(body2)"));
        assert!(client_body.contains("if (id2 is not null)"));
    }

    #[test]
    fn test_conflicting_rate_limits_keep_their_own_settings() {
        let (group, policies) = synthesize_from(
            r#"
openapi: 3.0.3
paths:
  /quotes/a:
    get:
      operationId: getA
      x-rate-limit: { policy: burst, permitLimit: 20, windowSeconds: 10 }
      responses:
        '204': { description: ok }
  /quotes/b:
    get:
      operationId: getB
      x-rate-limit: { policy: burst, permitLimit: 1, windowSeconds: 10 }
      responses:
        '204': { description: ok }
"#,
        );
        let limits: Vec<(&str, u32)> = policies
            .rate_limits
            .iter()
            .map(|p| (p.name.as_str(), p.permit_limit))
            .collect();
        assert_eq!(limits, vec![("Burst", 20), ("Burst2", 1)]);

        assert!(group.hoisted.rate_limit.is_none());
        let b = group.endpoint("getB").unwrap();
        assert_eq!(b.rate_limit.as_deref(), Some("Burst2"));
        assert!(b.registration.contains(".RequireRateLimiting(\"Burst2\")"));
        assert!(group
            .endpoint("getA")
            .unwrap()
            .registration
            .contains(".RequireRateLimiting(\"Burst\")"));
    }
}
