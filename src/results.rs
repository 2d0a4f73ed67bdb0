//! Response -> result type synthesis.
//!
//! Every operation gets a server result type (`{Op}Result`, an `IResult` with one static
//! factory per declared status) and a client result type (`{Op}ClientResult`, one accessor
//! per declared or auto-applied status). Endpoint metadata lists declared and auto-applied
//! statuses together.

use crate::context::PassContext;
use crate::descriptors::{MethodDescriptor, ParameterDescriptor};
use crate::document::{HttpMethod, MediaType};
use crate::error::Result;
use crate::operations::OperationDescriptor;
use crate::snippets;
use crate::type_resolver::{TypeReference, TypeResolver, TypeSite};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Serialize, Serializer};
use std::fmt;

/// Status codes with a dedicated factory name.
const STATUS_NAMES: &[(u16, &str)] = &[
    (200, "Ok"),
    (201, "Created"),
    (202, "Accepted"),
    (204, "NoContent"),
    (400, "BadRequest"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "NotFound"),
    (405, "MethodNotAllowed"),
    (406, "NotAcceptable"),
    (408, "RequestTimeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (412, "PreconditionFailed"),
    (413, "PayloadTooLarge"),
    (415, "UnsupportedMediaType"),
    (422, "UnprocessableEntity"),
    (429, "TooManyRequests"),
    (500, "InternalServerError"),
    (501, "NotImplemented"),
    (502, "BadGateway"),
    (503, "ServiceUnavailable"),
    (504, "GatewayTimeout"),
];

const BINARY_CONTENT_TYPES: &[&str] = &["application/octet-stream", "application/pdf", "application/zip"];
const BINARY_CONTENT_PREFIXES: &[&str] = &["image/", "audio/", "video/"];

/// A response key: an exact code, a `4XX`-style range or `default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKey {
    Code(u16),
    Range(u8),
    Default,
}

impl StatusKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("default") {
            return Some(Self::Default);
        }
        if raw.len() == 3 && raw.is_ascii() && raw[1..].eq_ignore_ascii_case("XX") {
            return raw[..1]
                .parse::<u8>()
                .ok()
                .filter(|class| (1..=5).contains(class))
                .map(Self::Range);
        }
        raw.parse::<u16>()
            .ok()
            .filter(|code| (100..600).contains(code))
            .map(Self::Code)
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            Self::Code(code) => (200..300).contains(code),
            Self::Range(class) => *class == 2,
            Self::Default => false,
        }
    }

    /// Known 4xx/5xx codes that carry an error payload.
    pub fn is_named_error(&self) -> bool {
        matches!(self, Self::Code(code) if *code >= 400 && status_name(*code).is_some())
    }

    pub fn factory_name(&self) -> String {
        match self {
            Self::Code(code) => status_name(*code)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Status{}", code)),
            Self::Range(4) => "ClientError".to_string(),
            Self::Range(5) => "ServerError".to_string(),
            Self::Range(class) => format!("Status{}XX", class),
            Self::Default => "Error".to_string(),
        }
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{}", code),
            Self::Range(class) => write!(f, "{}XX", class),
            Self::Default => f.write_str("default"),
        }
    }
}

impl Serialize for StatusKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn status_name(code: u16) -> Option<&'static str> {
    STATUS_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyKind {
    Json,
    Text,
    Binary,
}

/// Classifies a media type, ignoring parameters such as `charset`.
pub fn classify_content_type(content_type: &str) -> Option<BodyKind> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") || essence == "*/*" {
        Some(BodyKind::Json)
    } else if essence.starts_with("text/") {
        Some(BodyKind::Text)
    } else if BINARY_CONTENT_TYPES.contains(&essence.as_str())
        || BINARY_CONTENT_PREFIXES.iter().any(|p| essence.starts_with(p))
    {
        Some(BodyKind::Binary)
    } else {
        None
    }
}

/// Picks the media type to use: JSON first, then text, then binary.
pub fn select_content(content: &IndexMap<String, MediaType>) -> Option<(&String, &MediaType, BodyKind)> {
    [BodyKind::Json, BodyKind::Text, BodyKind::Binary]
        .into_iter()
        .find_map(|wanted| {
            content
                .iter()
                .find(|(content_type, _)| classify_content_type(content_type) == Some(wanted))
                .map(|(content_type, media)| (content_type, media, wanted))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseBody {
    pub content_type: String,
    pub kind: BodyKind,
    pub type_ref: TypeReference,
}

/// A declared response after status parsing and content inference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseSpec {
    pub status: StatusKey,
    pub factory_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<ResponseBody>,
}

impl ResponseSpec {
    /// Payload type of the factory and the client accessor.
    ///
    /// Named error statuses fall back to `ProblemDetails`, as do ranges and `default`.
    pub fn payload_type(&self) -> Option<TypeReference> {
        let body_type = self.body.as_ref().map(|b| b.type_ref.clone());
        match self.status {
            StatusKey::Range(class) if class >= 4 => {
                Some(body_type.unwrap_or_else(problem_details))
            }
            StatusKey::Default => Some(body_type.unwrap_or_else(problem_details)),
            status if status.is_named_error() => Some(body_type.unwrap_or_else(problem_details)),
            StatusKey::Code(_) | StatusKey::Range(_) => body_type,
        }
    }

    fn body_kind(&self) -> Option<BodyKind> {
        self.body.as_ref().map(|b| b.kind)
    }
}

fn problem_details() -> TypeReference {
    TypeReference::named("ProblemDetails")
}

/// Resolves every declared response of an operation.
///
/// The first success response uses the `Response` context for inline types; the others use
/// `{Factory}Response`.
pub fn analyze_responses(
    resolver: &TypeResolver<'_>,
    operation: &OperationDescriptor,
    pass: &mut PassContext,
) -> Result<Vec<ResponseSpec>> {
    let owner = operation.method_name();
    let streaming = operation.is_streaming();
    let mut specs = Vec::with_capacity(operation.responses.len());
    let mut primary_taken = false;

    for (raw_status, response) in &operation.responses {
        let Some(status) = StatusKey::parse(raw_status) else {
            warn!("{}: ignoring response with status '{}'", operation.operation_id, raw_status);
            continue;
        };
        let factory_name = status.factory_name();

        let context = if status.is_success() && !primary_taken {
            primary_taken = true;
            "Response".to_string()
        } else {
            format!("{}Response", factory_name)
        };
        let site = TypeSite::new(&owner, &context);
        let body = infer_body(resolver, &response.content, &site, pass, streaming)?;

        debug!("{} {} -> {}", operation.operation_id, status, factory_name);
        specs.push(ResponseSpec {
            status,
            factory_name,
            description: (!response.description.is_empty()).then(|| response.description.clone()),
            body,
        });
    }

    Ok(specs)
}

/// Infers the body of a response from its content map.
///
/// Unsupported media types yield no body.
pub fn infer_body(
    resolver: &TypeResolver<'_>,
    content: &IndexMap<String, MediaType>,
    site: &TypeSite,
    pass: &mut PassContext,
    streaming: bool,
) -> Result<Option<ResponseBody>> {
    if content.is_empty() {
        return Ok(None);
    }

    let Some((content_type, media, kind)) = select_content(content) else {
        let declared: Vec<&String> = content.keys().collect();
        warn!("No supported content type among {:?}, response has no body", declared);
        return Ok(None);
    };

    let type_ref = match kind {
        BodyKind::Json => {
            let resolved = resolver.resolve(media.schema.as_ref(), site, pass)?;
            match resolved.list_item() {
                Some(item) if streaming => TypeReference::async_sequence(item.clone()),
                _ => resolved,
            }
        }
        BodyKind::Text => TypeReference::named("string"),
        BodyKind::Binary => TypeReference::named("Stream"),
    };

    Ok(Some(ResponseBody {
        content_type: content_type.clone(),
        kind,
        type_ref,
    }))
}

/// Operation traits that decide which responses are applied automatically.
#[derive(Debug, Clone, Copy)]
pub struct ResponseFeatures {
    pub method: HttpMethod,
    pub has_parameters: bool,
    pub has_path_parameters: bool,
    pub requires_authentication: bool,
    pub has_restriction: bool,
    pub rate_limited: bool,
}

/// Statuses the framework can produce even when the document does not declare them.
///
/// A status already declared with its exact code is not repeated. 500 is skipped when the
/// document declares `default` or 500.
pub fn auto_applied_statuses(declared: &[StatusKey], features: &ResponseFeatures) -> Vec<u16> {
    let mutating_with_id = matches!(
        features.method,
        HttpMethod::Get | HttpMethod::Put | HttpMethod::Delete | HttpMethod::Patch
    ) && features.has_path_parameters;
    let creates = matches!(features.method, HttpMethod::Post | HttpMethod::Put);
    let server_error = !declared.contains(&StatusKey::Default) && !declared.contains(&StatusKey::Code(500));

    [
        (400, features.has_parameters),
        (401, features.requires_authentication),
        (403, features.has_restriction),
        (404, mutating_with_id),
        (409, creates),
        (429, features.rate_limited),
        (500, server_error),
    ]
    .into_iter()
    .filter(|(code, applies)| *applies && !declared.contains(&StatusKey::Code(*code)))
    .map(|(code, _)| code)
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImplicitConversion {
    pub source_type: TypeReference,
    pub factory: String,
}

/// The server-side `IResult` wrapper of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultDescriptor {
    pub name: String,
    pub implements: Vec<String>,
    pub factories: Vec<MethodDescriptor>,
    pub implicit_conversions: Vec<ImplicitConversion>,
}

impl ResultDescriptor {
    pub fn factory(&self, name: &str) -> Option<&MethodDescriptor> {
        self.factories.iter().find(|f| f.name == name)
    }
}

/// Builds the server result with one factory per declared status.
pub fn build_server_result(result_name: &str, specs: &[ResponseSpec], streaming: bool) -> ResultDescriptor {
    let mut factories = Vec::with_capacity(specs.len());
    let mut implicit_conversions: Vec<ImplicitConversion> = Vec::new();

    for spec in specs {
        let (parameters, body) = factory_shape(spec);
        let mut factory = MethodDescriptor::new(&spec.factory_name, TypeReference::named(result_name));
        factory.is_static = true;
        factory.parameters = parameters;
        factory.body = Some(body);
        factories.push(factory);

        if let Some(conversion) = implicit_conversion(spec, streaming) {
            if implicit_conversions
                .iter()
                .any(|c| c.source_type == conversion.source_type)
            {
                debug!(
                    "{}: implicit conversion from {} already defined",
                    result_name, conversion.source_type
                );
            } else {
                implicit_conversions.push(conversion);
            }
        }
    }

    ResultDescriptor {
        name: result_name.to_string(),
        implements: vec!["IResult".to_string()],
        factories,
        implicit_conversions,
    }
}

/// Parameters and body of the factory for one declared status.
fn factory_shape(spec: &ResponseSpec) -> (Vec<ParameterDescriptor>, String) {
    let body = spec.body.as_ref();
    match spec.status {
        StatusKey::Code(201) | StatusKey::Code(202) => {
            let helper = if spec.status == StatusKey::Code(201) { "Created" } else { "Accepted" };
            let mut parameters = Vec::new();
            if let Some(body) = body {
                parameters.push(ParameterDescriptor::new("response", body.type_ref.clone()));
            }
            parameters.push(
                ParameterDescriptor::new("location", TypeReference::named("string").into_nullable())
                    .with_default("null"),
            );
            (parameters, snippets::location_result_body(helper, body.is_some()))
        }
        StatusKey::Code(204) => (Vec::new(), snippets::no_content_body()),
        StatusKey::Code(code) if spec.status.is_success() => match body {
            Some(body) => (
                vec![ParameterDescriptor::new("response", body.type_ref.clone())],
                snippets::success_body(code, Some(body)),
            ),
            None => (Vec::new(), snippets::success_body(code, None)),
        },
        StatusKey::Code(code) if spec.status.is_named_error() => {
            let payload = spec.payload_type().unwrap_or_else(problem_details);
            let kind = spec.body_kind().unwrap_or(BodyKind::Json);
            (
                vec![ParameterDescriptor::new("error", payload.clone().into_nullable()).with_default("null")],
                snippets::error_body(&code.to_string(), &payload, kind),
            )
        }
        StatusKey::Code(code) => (Vec::new(), snippets::status_code_body(&code.to_string())),
        StatusKey::Range(class) if class < 4 => (
            vec![ParameterDescriptor::new("statusCode", TypeReference::named("int"))],
            snippets::status_code_body("statusCode"),
        ),
        StatusKey::Range(_) | StatusKey::Default => {
            let payload = spec.payload_type().unwrap_or_else(problem_details);
            let kind = spec.body_kind().unwrap_or(BodyKind::Json);
            (
                vec![
                    ParameterDescriptor::new("statusCode", TypeReference::named("int")),
                    ParameterDescriptor::new("error", payload.clone().into_nullable()).with_default("null"),
                ],
                snippets::error_body("statusCode", &payload, kind),
            )
        }
    }
}

/// `Ok`, `Created` and `Accepted` with a list or model body convert implicitly from it.
fn implicit_conversion(spec: &ResponseSpec, streaming: bool) -> Option<ImplicitConversion> {
    if streaming || !matches!(spec.status, StatusKey::Code(200) | StatusKey::Code(201) | StatusKey::Code(202)) {
        return None;
    }
    let body = spec.body.as_ref().filter(|b| b.kind == BodyKind::Json)?;
    let source = &body.type_ref;
    if source.is_object_fallback() || source.nullable || !(source.is_list || source.is_model()) {
        return None;
    }
    Some(ImplicitConversion {
        source_type: source.clone(),
        factory: spec.factory_name.clone(),
    })
}

/// One status the client can observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientAccessor {
    pub status: StatusKey,
    pub name: String,
    /// `Is{Name}` flag property
    pub check_property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<TypeReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_kind: Option<BodyKind>,
    pub is_auto: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientResultDescriptor {
    pub name: String,
    pub accessors: Vec<ClientAccessor>,
    /// Maps the response status to an instance; expects `response` and `cancellationToken`
    pub dispatch: String,
}

impl ClientResultDescriptor {
    pub fn accessor(&self, status: StatusKey) -> Option<&ClientAccessor> {
        self.accessors.iter().find(|a| a.status == status)
    }
}

/// Builds the client result with accessors for declared and auto-applied statuses.
pub fn build_client_result(
    result_name: &str,
    specs: &[ResponseSpec],
    auto_applied: &[u16],
) -> ClientResultDescriptor {
    let mut accessors: Vec<ClientAccessor> = specs
        .iter()
        .map(|spec| ClientAccessor {
            status: spec.status,
            name: spec.factory_name.clone(),
            check_property: format!("Is{}", spec.factory_name),
            payload_type: spec.payload_type(),
            body_kind: spec.body_kind(),
            is_auto: false,
        })
        .collect();

    for code in auto_applied {
        let status = StatusKey::Code(*code);
        let name = status.factory_name();
        accessors.push(ClientAccessor {
            status,
            check_property: format!("Is{}", name),
            name,
            payload_type: Some(problem_details()),
            body_kind: Some(BodyKind::Json),
            is_auto: true,
        });
    }

    let dispatch = snippets::client_dispatch(result_name, &accessors);
    ClientResultDescriptor {
        name: result_name.to_string(),
        accessors,
        dispatch,
    }
}

/// One `Produces` entry of the endpoint metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProducesEntry {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub is_problem: bool,
    pub is_auto: bool,
}

/// Metadata entries for declared exact statuses followed by auto-applied ones.
///
/// Ranges and `default` have no single status code and are left out.
pub fn produces_entries(specs: &[ResponseSpec], auto_applied: &[u16]) -> Vec<ProducesEntry> {
    let mut entries: Vec<ProducesEntry> = specs
        .iter()
        .filter_map(|spec| {
            let status = spec.status.code()?;
            let payload = spec.payload_type();
            let is_problem = payload.as_ref().is_some_and(|p| p.base_name == "ProblemDetails");
            Some(ProducesEntry {
                status,
                type_ref: if is_problem { None } else { payload },
                content_type: spec
                    .body
                    .as_ref()
                    .filter(|b| b.kind != BodyKind::Json)
                    .map(|b| b.content_type.clone()),
                is_problem,
                is_auto: false,
            })
        })
        .collect();

    entries.extend(auto_applied.iter().map(|code| ProducesEntry {
        status: *code,
        type_ref: None,
        content_type: None,
        is_problem: true,
        is_auto: true,
    }));
    entries
}
