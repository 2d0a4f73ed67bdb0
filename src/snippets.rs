//! Literal method-body snippets.
//!
//! Every piece of generated code that is not structure lives here: factory bodies, policy
//! registrations, endpoint and group mappings, client request builders and the client
//! response dispatch. Everything else the generator produces is a descriptor record.

use crate::document::{HttpMethod, SecurityScheme};
use crate::naming::to_pascal_case;
use crate::policies::oauth::{OAuthConfig, ScopePolicy};
use crate::policies::{CachePolicy, RateLimitAlgorithm, RateLimitPolicy, ResiliencePolicy};
use crate::results::{BodyKind, ClientAccessor, ResponseBody, StatusKey};
use crate::security::AuthRequirement;
use crate::type_resolver::TypeReference;

const INDENT: &str = "    ";

/// Types whose invariant string form never needs percent-encoding.
const URL_SAFE_TYPES: &[&str] = &[
    "int", "long", "short", "sbyte", "byte", "uint", "ulong", "double", "float", "decimal",
    "bool", "Guid",
];

/// Types that can be interpolated as-is.
const VERBATIM_TYPES: &[&str] = &["int", "long", "short", "sbyte", "byte", "uint", "ulong", "Guid"];

/// Line-oriented writer with block indentation.
#[derive(Debug, Default)]
pub struct SnippetWriter {
    lines: Vec<String>,
    indent: usize,
}

impl SnippetWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{}", INDENT.repeat(self.indent), text));
        }
        self
    }

    /// Writes `{` and indents.
    pub fn open(&mut self) -> &mut Self {
        self.line("{");
        self.indent += 1;
        self
    }

    /// Dedents and writes `}` followed by `suffix`.
    pub fn close(&mut self, suffix: &str) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self.line(format!("}}{}", suffix))
    }

    pub fn indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    pub fn finish(self) -> String {
        self.lines.join("\n")
    }
}

/// Quotes and escapes a string as a C# regular string literal.
pub fn csharp_string_literal(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for c in value.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            other => literal.push(other),
        }
    }
    literal.push('"');
    literal
}

fn literal_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| csharp_string_literal(v))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Policy registrations
// ---------------------------------------------------------------------------

/// `AddRateLimiter` option callback entry for one limiter.
pub fn rate_limit_registration(policy: &RateLimitPolicy) -> String {
    let mut w = SnippetWriter::new();
    w.line(format!(
        "options.{}({}, limiter =>",
        policy.algorithm.registration_method(),
        csharp_string_literal(&policy.name)
    ));
    w.open();
    match policy.algorithm {
        RateLimitAlgorithm::FixedWindow | RateLimitAlgorithm::SlidingWindow => {
            w.line(format!("limiter.PermitLimit = {};", policy.permit_limit));
            w.line(format!(
                "limiter.Window = TimeSpan.FromSeconds({});",
                policy.window_seconds
            ));
            if let Some(segments) = policy.segments_per_window {
                w.line(format!("limiter.SegmentsPerWindow = {};", segments));
            }
        }
        RateLimitAlgorithm::TokenBucket => {
            w.line(format!("limiter.TokenLimit = {};", policy.permit_limit));
            w.line(format!(
                "limiter.ReplenishmentPeriod = TimeSpan.FromSeconds({});",
                policy.window_seconds
            ));
            w.line(format!(
                "limiter.TokensPerPeriod = {};",
                policy.tokens_per_period.unwrap_or(policy.permit_limit)
            ));
            w.line("limiter.AutoReplenishment = true;");
        }
        RateLimitAlgorithm::Concurrency => {
            w.line(format!("limiter.PermitLimit = {};", policy.permit_limit));
        }
    }
    w.line("limiter.QueueProcessingOrder = QueueProcessingOrder.OldestFirst;");
    w.line(format!("limiter.QueueLimit = {};", policy.queue_limit));
    w.close(");");
    w.finish()
}

/// `AddOutputCache` option callback entry for one policy.
pub fn output_cache_registration(policy: &CachePolicy) -> String {
    let mut chain = format!(
        "policy.Expire(TimeSpan.FromSeconds({}))",
        policy.expiration_seconds
    );
    if !policy.vary_by_query.is_empty() {
        chain.push_str(&format!(".SetVaryByQuery({})", literal_list(&policy.vary_by_query)));
    }
    if !policy.vary_by_header.is_empty() {
        chain.push_str(&format!(".SetVaryByHeader({})", literal_list(&policy.vary_by_header)));
    }
    if !policy.vary_by_route.is_empty() {
        chain.push_str(&format!(
            ".SetVaryByRouteValue({})",
            literal_list(&policy.vary_by_route)
        ));
    }
    for tag in &policy.tags {
        chain.push_str(&format!(".Tag({})", csharp_string_literal(tag)));
    }
    if policy.no_store {
        chain.push_str(".NoCache()");
    }
    format!(
        "options.AddPolicy({}, policy => {});",
        csharp_string_literal(&policy.name),
        chain
    )
}

pub fn resilience_registration(policy: &ResiliencePolicy) -> String {
    let mut w = SnippetWriter::new();
    w.line(format!(
        "services.AddResiliencePipeline({}, builder =>",
        csharp_string_literal(&policy.name)
    ));
    w.open();
    w.line("builder.AddRetry(new RetryStrategyOptions");
    w.open();
    w.line(format!("MaxRetryAttempts = {},", policy.max_retry_attempts));
    w.line(format!("BackoffType = DelayBackoffType.{},", policy.backoff.as_str()));
    w.line(format!("Delay = TimeSpan.FromMilliseconds({}),", policy.delay_ms));
    w.line(format!("UseJitter = {},", policy.use_jitter));
    w.close(");");
    if let Some(breaker) = &policy.circuit_breaker {
        w.line("builder.AddCircuitBreaker(new CircuitBreakerStrategyOptions");
        w.open();
        w.line(format!("FailureRatio = {},", breaker.failure_ratio));
        w.line(format!(
            "SamplingDuration = TimeSpan.FromSeconds({}),",
            breaker.sampling_duration_seconds
        ));
        w.line(format!("MinimumThroughput = {},", breaker.minimum_throughput));
        w.line(format!(
            "BreakDuration = TimeSpan.FromSeconds({}),",
            breaker.break_duration_seconds
        ));
        w.close(");");
    }
    if let Some(timeout) = policy.timeout_seconds {
        w.line(format!("builder.AddTimeout(TimeSpan.FromSeconds({}));", timeout));
    }
    w.close(");");
    w.finish()
}

/// `AddAuthentication()` chain entry validating tokens of an OAuth or OpenID Connect scheme.
pub fn jwt_bearer_registration(config: &OAuthConfig) -> String {
    if config.authority.is_none() && config.audience.is_none() {
        return format!(".AddJwtBearer({})", csharp_string_literal(&config.scheme_name));
    }
    let mut w = SnippetWriter::new();
    w.line(format!(
        ".AddJwtBearer({}, options =>",
        csharp_string_literal(&config.scheme_name)
    ));
    w.open();
    if let Some(authority) = &config.authority {
        w.line(format!("options.Authority = {};", csharp_string_literal(authority)));
    }
    if let Some(audience) = &config.audience {
        w.line(format!("options.Audience = {};", csharp_string_literal(audience)));
    }
    w.close(")");
    w.finish()
}

pub fn scope_policy_registration(policy: &ScopePolicy) -> String {
    format!(
        "options.AddPolicy({}, policy => policy.RequireClaim(\"scope\", {}));",
        csharp_string_literal(&policy.name),
        csharp_string_literal(&policy.scope)
    )
}

/// `AddAuthentication()` chain entry for a non-OAuth scheme.
pub fn auth_scheme_registration(name: &str, scheme: &SecurityScheme) -> String {
    let handler = match (scheme.scheme_type.as_str(), scheme.scheme.as_deref()) {
        ("http", Some(http)) if http.eq_ignore_ascii_case("bearer") => {
            return format!(".AddJwtBearer({})", csharp_string_literal(name));
        }
        ("http", Some(http)) if http.eq_ignore_ascii_case("basic") => {
            "BasicAuthenticationHandler".to_string()
        }
        ("apiKey", _) => "ApiKeyAuthenticationHandler".to_string(),
        _ => format!("{}AuthenticationHandler", to_pascal_case(name)),
    };
    format!(
        ".AddScheme<AuthenticationSchemeOptions, {}>({}, null)",
        handler,
        csharp_string_literal(name)
    )
}

/// Endpoint or group builder calls applying an authorization requirement.
pub fn authorization_calls(requirement: &AuthRequirement) -> Vec<String> {
    if requirement.allow_anonymous {
        return vec![".AllowAnonymous()".to_string()];
    }

    let mut calls = Vec::new();
    if let Some(policy) = &requirement.policy {
        calls.push(format!(".RequireAuthorization({})", csharp_string_literal(policy)));
    }
    if !requirement.scopes.is_empty() {
        calls.push(format!(".RequireAuthorization({})", literal_list(&requirement.scopes)));
    }
    if !requirement.roles.is_empty() {
        calls.push(format!(
            ".RequireAuthorization(policy => policy.RequireRole({}))",
            literal_list(&requirement.roles)
        ));
    }
    if calls.is_empty() {
        calls.push(".RequireAuthorization()".to_string());
    }
    calls
}

// ---------------------------------------------------------------------------
// Server result factories
// ---------------------------------------------------------------------------

/// `Created`/`Accepted` factory body with an optional location.
pub fn location_result_body(helper: &str, has_body: bool) -> String {
    if has_body {
        format!("return new(TypedResults.{}(location, response));", helper)
    } else {
        format!("return new(TypedResults.{}(location));", helper)
    }
}

pub fn no_content_body() -> String {
    "return new(TypedResults.NoContent());".to_string()
}

pub fn success_body(code: u16, body: Option<&ResponseBody>) -> String {
    let Some(body) = body else {
        return if code == 200 {
            "return new(TypedResults.Ok());".to_string()
        } else {
            status_code_body(&code.to_string())
        };
    };
    match body.kind {
        BodyKind::Json if code == 200 => "return new(TypedResults.Ok(response));".to_string(),
        BodyKind::Json => format!(
            "return new(TypedResults.Json(response, statusCode: {}));",
            code
        ),
        BodyKind::Text => format!(
            "return new(TypedResults.Text(response, {}, statusCode: {}));",
            csharp_string_literal(&body.content_type),
            code
        ),
        BodyKind::Binary => format!(
            "return new(TypedResults.Stream(response, {}));",
            csharp_string_literal(&body.content_type)
        ),
    }
}

/// Error factory body; `status` is a literal code or the `statusCode` parameter.
pub fn error_body(status: &str, payload: &TypeReference, kind: BodyKind) -> String {
    if payload.base_name == "ProblemDetails" {
        return format!(
            "return new(TypedResults.Json(error ?? new ProblemDetails {{ Status = {status} }}, statusCode: {status}));",
            status = status
        );
    }
    let written = match kind {
        BodyKind::Json => format!("TypedResults.Json(error, statusCode: {})", status),
        BodyKind::Text => format!("TypedResults.Text(error, statusCode: {})", status),
        BodyKind::Binary => "TypedResults.Stream(error)".to_string(),
    };
    format!(
        "return new(error is null ? (IResult)TypedResults.StatusCode({}) : {});",
        status, written
    )
}

pub fn status_code_body(status: &str) -> String {
    format!("return new(TypedResults.StatusCode({}));", status)
}

// ---------------------------------------------------------------------------
// Client response dispatch
// ---------------------------------------------------------------------------

/// Body of `{Result}.FromResponseAsync(HttpResponseMessage response, CancellationToken
/// cancellationToken)`.
///
/// Exact codes are matched first, then ranges, then `default`.
pub fn client_dispatch(result_name: &str, accessors: &[ClientAccessor]) -> String {
    let mut w = SnippetWriter::new();
    w.line("var statusCode = (int)response.StatusCode;");
    w.line("switch (statusCode)");
    w.open();

    let exact = accessors.iter().filter(|a| matches!(a.status, StatusKey::Code(_)));
    let ranges = accessors.iter().filter(|a| matches!(a.status, StatusKey::Range(_)));
    for accessor in exact.chain(ranges) {
        let label = match accessor.status {
            StatusKey::Code(code) => format!("case {}:", code),
            StatusKey::Range(class) => format!(
                "case >= {} and < {}:",
                u16::from(class) * 100,
                (u16::from(class) + 1) * 100
            ),
            StatusKey::Default => continue,
        };
        w.line(label);
        w.indent();
        w.line(format!("return new {}(statusCode, {});", result_name, read_payload(accessor)));
        w.dedent();
    }

    w.line("default:");
    w.indent();
    match accessors.iter().find(|a| a.status == StatusKey::Default) {
        Some(fallback) => {
            w.line(format!("return new {}(statusCode, {});", result_name, read_payload(fallback)));
        }
        None => {
            w.line(format!("return new {}(statusCode, null);", result_name));
        }
    }
    w.dedent();
    w.close("");
    w.finish()
}

fn read_payload(accessor: &ClientAccessor) -> String {
    let Some(payload) = &accessor.payload_type else {
        return "null".to_string();
    };
    match accessor.body_kind.unwrap_or(BodyKind::Json) {
        BodyKind::Text => "await response.Content.ReadAsStringAsync(cancellationToken)".to_string(),
        BodyKind::Binary => "await response.Content.ReadAsStreamAsync(cancellationToken)".to_string(),
        BodyKind::Json => match payload.generic_args.first() {
            Some(item) if payload.base_name == "IAsyncEnumerable" => format!(
                "response.Content.ReadFromJsonAsAsyncEnumerable<{}>(cancellationToken)",
                item
            ),
            _ => format!(
                "await response.Content.ReadFromJsonAsync<{}>(cancellationToken)",
                payload.clone().non_nullable()
            ),
        },
    }
}

// ---------------------------------------------------------------------------
// Endpoint and group mapping
// ---------------------------------------------------------------------------

/// One `group.Map{Method}(...)` statement with its builder calls.
pub fn endpoint_registration(
    method: HttpMethod,
    relative_route: &str,
    lambda_parameters: &[String],
    handler_call: &str,
    builder_calls: &[String],
) -> String {
    let route = csharp_string_literal(relative_route);
    let head = match method {
        HttpMethod::Get | HttpMethod::Post | HttpMethod::Put | HttpMethod::Delete | HttpMethod::Patch => {
            format!("group.Map{}({}, ", method.pascal_name(), route)
        }
        HttpMethod::Head | HttpMethod::Options | HttpMethod::Trace => format!(
            "group.MapMethods({}, new[] {{ {} }}, ",
            route,
            csharp_string_literal(method.as_str())
        ),
    };

    let mut w = SnippetWriter::new();
    w.line(format!(
        "{}async ({}) => await {})",
        head,
        lambda_parameters.join(", "),
        handler_call
    ));
    w.indent();
    for call in builder_calls {
        w.line(call);
    }
    w.dedent();
    let mut snippet = w.finish();
    snippet.push(';');
    snippet
}

/// Body of `Map{Group}Endpoints(this IEndpointRouteBuilder app)`.
pub fn group_registration(
    mapping_route: &str,
    tag: &str,
    group_calls: &[String],
    endpoints: &[String],
) -> String {
    let mut w = SnippetWriter::new();
    w.line(format!("var group = app.MapGroup({})", csharp_string_literal(mapping_route)));
    w.indent();
    w.line(format!(".WithTags({});", csharp_string_literal(tag)));
    w.dedent();
    if !group_calls.is_empty() {
        w.line("group");
        w.indent();
        for call in group_calls {
            w.line(call);
        }
        w.dedent();
        w.line(";");
    }
    for endpoint in endpoints {
        w.line("");
        for line in endpoint.lines() {
            w.line(line);
        }
    }
    w.line("");
    w.line("return group;");
    w.finish()
}

/// `.AddEndpointFilter` that writes `Cache-Control` for response caching.
pub fn cache_control_filter(policy: &CachePolicy) -> String {
    let header = if policy.no_store {
        "no-store".to_string()
    } else {
        format!("public,max-age={}", policy.expiration_seconds)
    };
    format!(
        ".AddEndpointFilter(async (context, next) => {{ context.HttpContext.Response.Headers.CacheControl = {}; return await next(context); }})",
        csharp_string_literal(&header)
    )
}

// ---------------------------------------------------------------------------
// Client request builder
// ---------------------------------------------------------------------------

/// A client method argument sent as part of the request.
#[derive(Debug, Clone)]
pub struct ClientValue {
    pub wire_name: String,
    pub variable: String,
    pub type_ref: TypeReference,
    /// C# default of the method parameter; `None` for required values
    pub default_value: Option<String>,
}

impl ClientValue {
    pub fn is_required(&self) -> bool {
        self.default_value.is_none()
    }

    fn is_file(&self) -> bool {
        self.type_ref.base_name == "Stream"
    }

    fn is_file_list(&self) -> bool {
        self.type_ref
            .generic_args
            .first()
            .is_some_and(|item| item.base_name == "Stream")
            && self.type_ref.base_name == "IEnumerable"
    }

    fn sequence_item(&self) -> Option<&TypeReference> {
        self.type_ref.list_item()
    }
}

#[derive(Debug, Clone)]
pub enum ClientBody {
    Json { variable: String, required: bool },
    Text { variable: String, content_type: String },
    Binary { variable: String, content_type: String },
    /// A multipart body that is a bare list of files
    Files { variable: String, field_name: String },
    Multipart { fields: Vec<ClientValue> },
    FormUrlEncoded { fields: Vec<ClientValue> },
}

#[derive(Debug, Clone)]
pub struct ClientRequest<'a> {
    pub method: HttpMethod,
    pub path: &'a str,
    pub path_parameters: &'a [ClientValue],
    pub query: &'a [ClientValue],
    pub headers: &'a [ClientValue],
    pub cookies: &'a [ClientValue],
    pub body: Option<&'a ClientBody>,
    pub result_name: &'a str,
    pub resilience_pipeline: Option<&'a str>,
    /// Keep the response alive for streamed or binary payloads
    pub keep_response_open: bool,
    pub streaming: bool,
}

/// Body of a typed client method.
pub fn client_method_body(request: &ClientRequest<'_>) -> String {
    let mut w = SnippetWriter::new();

    w.line(format!(
        "var requestUri = $\"{}\";",
        interpolated_path(request.path, request.path_parameters)
    ));
    if !request.query.is_empty() {
        w.line("var queryParts = new List<string>();");
        for value in request.query {
            write_guarded(&mut w, value, |w, variable| match value.sequence_item() {
                Some(item) => {
                    w.line(format!("foreach (var item in {})", variable));
                    w.indent();
                    w.line(format!(
                        "queryParts.Add($\"{}={{{}}}\");",
                        escape_interpolated(&value.wire_name),
                        interpolated_text("item", item)
                    ));
                    w.dedent();
                }
                None => {
                    w.line(format!(
                        "queryParts.Add($\"{}={{{}}}\");",
                        escape_interpolated(&value.wire_name),
                        interpolated_text(variable, &value.type_ref)
                    ));
                }
            });
        }
        w.line("if (queryParts.Count > 0)");
        w.indent();
        w.line("requestUri += \"?\" + string.Join(\"&\", queryParts);");
        w.dedent();
    }
    w.line("");

    w.line("HttpRequestMessage CreateRequest()");
    w.open();
    w.line(format!(
        "var request = new HttpRequestMessage(HttpMethod.{}, requestUri);",
        request.method.pascal_name()
    ));
    for header in request.headers {
        write_guarded(&mut w, header, |w, variable| {
            w.line(format!(
                "request.Headers.TryAddWithoutValidation({}, {});",
                csharp_string_literal(&header.wire_name),
                joined_text(variable, header)
            ));
        });
    }
    if !request.cookies.is_empty() {
        w.line("var cookieParts = new List<string>();");
        for cookie in request.cookies {
            write_guarded(&mut w, cookie, |w, variable| {
                w.line(format!(
                    "cookieParts.Add($\"{}={{Uri.EscapeDataString({})}}\");",
                    escape_interpolated(&cookie.wire_name),
                    joined_text(variable, cookie)
                ));
            });
        }
        w.line("if (cookieParts.Count > 0)");
        w.indent();
        w.line("request.Headers.TryAddWithoutValidation(\"Cookie\", string.Join(\"; \", cookieParts));");
        w.dedent();
    }
    if let Some(body) = request.body {
        write_body(&mut w, body);
    }
    w.line("return request;");
    w.close("");
    w.line("");

    let completion = if request.streaming {
        "HttpCompletionOption.ResponseHeadersRead, "
    } else {
        ""
    };
    let send = match request.resilience_pipeline {
        Some(pipeline) => format!(
            "await _resiliencePipelineProvider.GetPipeline({}).ExecuteAsync(async token => await _httpClient.SendAsync(CreateRequest(), {}token), cancellationToken);",
            csharp_string_literal(pipeline),
            completion
        ),
        None => format!(
            "await _httpClient.SendAsync(CreateRequest(), {}cancellationToken);",
            completion
        ),
    };
    if request.keep_response_open {
        w.line(format!("var response = {}", send));
    } else {
        w.line(format!("using var response = {}", send));
    }
    w.line(format!(
        "return await {}.FromResponseAsync(response, cancellationToken);",
        request.result_name
    ));
    w.finish()
}

fn write_body(w: &mut SnippetWriter, body: &ClientBody) {
    match body {
        ClientBody::Json { variable, required } => {
            if *required {
                w.line(format!("request.Content = JsonContent.Create({});", variable));
            } else {
                w.line(format!("if ({} is not null)", variable));
                w.indent();
                w.line(format!("request.Content = JsonContent.Create({});", variable));
                w.dedent();
            }
        }
        ClientBody::Text {
            variable,
            content_type,
        } => {
            w.line(format!(
                "request.Content = new StringContent({}, Encoding.UTF8, {});",
                variable,
                csharp_string_literal(content_type)
            ));
        }
        ClientBody::Binary {
            variable,
            content_type,
        } => {
            w.line(format!("var content = new StreamContent({});", variable));
            w.line(format!(
                "content.Headers.ContentType = new MediaTypeHeaderValue({});",
                csharp_string_literal(content_type)
            ));
            w.line("request.Content = content;");
        }
        ClientBody::Files {
            variable,
            field_name,
        } => {
            w.line("var content = new MultipartFormDataContent();");
            w.line(format!("foreach (var file in {})", variable));
            w.indent();
            w.line(format!(
                "content.Add(new StreamContent(file), {name}, {name});",
                name = csharp_string_literal(field_name)
            ));
            w.dedent();
            w.line("request.Content = content;");
        }
        ClientBody::Multipart { fields } => {
            w.line("var content = new MultipartFormDataContent();");
            for field in fields {
                let name = csharp_string_literal(&field.wire_name);
                write_guarded(w, field, |w, variable| {
                    if field.is_file() {
                        w.line(format!(
                            "content.Add(new StreamContent({}), {}, {});",
                            variable, name, name
                        ));
                    } else if field.is_file_list() {
                        w.line(format!("foreach (var file in {})", variable));
                        w.indent();
                        w.line(format!("content.Add(new StreamContent(file), {}, {});", name, name));
                        w.dedent();
                    } else if field.type_ref.is_scalar() || field.type_ref.is_list {
                        w.line(format!(
                            "content.Add(new StringContent({}), {});",
                            joined_text(variable, field),
                            name
                        ));
                    } else {
                        w.line(format!("content.Add(JsonContent.Create({}), {});", variable, name));
                    }
                });
            }
            w.line("request.Content = content;");
        }
        ClientBody::FormUrlEncoded { fields } => {
            w.line("var form = new List<KeyValuePair<string, string>>();");
            for field in fields {
                write_guarded(w, field, |w, variable| {
                    w.line(format!(
                        "form.Add(new({}, {}));",
                        csharp_string_literal(&field.wire_name),
                        joined_text(variable, field)
                    ));
                });
            }
            w.line("request.Content = new FormUrlEncodedContent(form);");
        }
    }
}

/// Wraps optional values in a null check.
fn write_guarded(
    w: &mut SnippetWriter,
    value: &ClientValue,
    write: impl FnOnce(&mut SnippetWriter, &str),
) {
    if value.is_required() || !value.type_ref.nullable {
        write(w, &value.variable);
    } else {
        w.line(format!("if ({} is not null)", value.variable));
        w.open();
        write(w, &value.variable);
        w.close("");
    }
}

/// Path template with parameters substituted, relative to the client base address.
fn interpolated_path(path: &str, parameters: &[ClientValue]) -> String {
    let segments: Vec<String> = path
        .trim_start_matches('/')
        .split('/')
        .map(|segment| {
            let mut rendered = String::new();
            let mut rest = segment;
            while let Some(start) = rest.find('{') {
                let Some(length) = rest[start..].find('}') else {
                    break;
                };
                rendered.push_str(&escape_interpolated(&rest[..start]));
                let name = &rest[start + 1..start + length];
                match parameters.iter().find(|p| p.wire_name == name) {
                    Some(parameter) => {
                        rendered.push('{');
                        rendered.push_str(&path_value(parameter));
                        rendered.push('}');
                    }
                    None => rendered.push_str(&escape_interpolated(&rest[start..=start + length])),
                }
                rest = &rest[start + length + 1..];
            }
            rendered.push_str(&escape_interpolated(rest));
            rendered
        })
        .collect();
    segments.join("/")
}

fn escape_interpolated(text: &str) -> String {
    text.replace('{', "{{")
        .replace('}', "}}")
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}

fn path_value(parameter: &ClientValue) -> String {
    match parameter.sequence_item() {
        Some(item) => format!(
            "string.Join(\",\", {}.Select(item => {}))",
            parameter.variable,
            encoded_text("item", item)
        ),
        None => interpolated_text(&parameter.variable, &parameter.type_ref),
    }
}

/// Expression for an interpolation hole.
fn interpolated_text(variable: &str, type_ref: &TypeReference) -> String {
    if VERBATIM_TYPES.contains(&type_ref.base_name.as_str()) {
        variable.to_string()
    } else {
        encoded_text(variable, type_ref)
    }
}

/// Percent-encoded string form; numeric, boolean and GUID values are never encoded.
fn encoded_text(variable: &str, type_ref: &TypeReference) -> String {
    let text = plain_text(variable, type_ref);
    if URL_SAFE_TYPES.contains(&type_ref.base_name.as_str()) {
        text
    } else {
        format!("Uri.EscapeDataString({})", text)
    }
}

fn plain_text(variable: &str, type_ref: &TypeReference) -> String {
    match type_ref.base_name.as_str() {
        "string" => variable.to_string(),
        "bool" => format!("({} == true ? \"true\" : \"false\")", variable),
        _ => format!(
            "(Convert.ToString({}, CultureInfo.InvariantCulture) ?? string.Empty)",
            variable
        ),
    }
}

/// Comma-joined string form of a scalar or list, unencoded.
fn joined_text(variable: &str, value: &ClientValue) -> String {
    match value.sequence_item() {
        Some(item) => format!(
            "string.Join(\",\", {}.Select(item => {}))",
            variable,
            plain_text("item", item)
        ),
        None => plain_text(variable, &value.type_ref),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn value(name: &str, type_ref: TypeReference, required: bool) -> ClientValue {
        ClientValue {
            wire_name: name.to_string(),
            variable: name.to_string(),
            type_ref,
            default_value: (!required).then(|| "null".to_string()),
        }
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(csharp_string_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_writer_indentation() {
        let mut w = SnippetWriter::new();
        w.line("if (x)");
        w.open();
        w.line("y();");
        w.close("");
        assert_eq!(w.finish(), "if (x)\n{\n    y();\n}");
    }

    #[test]
    fn test_path_encoding_only_for_strings() {
        let parameters = vec![
            value("owner", TypeReference::named("string"), true),
            value("petId", TypeReference::named("long"), true),
            value("key", TypeReference::named("Guid"), true),
        ];
        assert_eq!(
            interpolated_path("/owners/{owner}/pets/{petId}/keys/{key}", &parameters),
            "owners/{Uri.EscapeDataString(owner)}/pets/{petId}/keys/{key}"
        );
    }

    #[test]
    fn test_enum_path_values_are_encoded() {
        let parameters = vec![value("status", TypeReference::named("PetStatus"), true)];
        assert_eq!(
            interpolated_path("/pets/{status}", &parameters),
            "pets/{Uri.EscapeDataString((Convert.ToString(status, CultureInfo.InvariantCulture) ?? string.Empty))}"
        );
    }

    #[test]
    fn test_client_body_with_query_and_resilience() {
        let path = vec![value("petId", TypeReference::named("long"), true)];
        let query = vec![
            value("limit", TypeReference::named("int").into_nullable(), false),
            value("tags", TypeReference::list(TypeReference::named("string")), true),
        ];
        let body = ClientBody::Json {
            variable: "body".to_string(),
            required: true,
        };
        let snippet = client_method_body(&ClientRequest {
            method: HttpMethod::Put,
            path: "/pets/{petId}",
            path_parameters: &path,
            query: &query,
            headers: &[],
            cookies: &[],
            body: Some(&body),
            result_name: "UpdatePetClientResult",
            resilience_pipeline: Some("Default"),
            keep_response_open: false,
            streaming: false,
        });
        assert!(snippet.starts_with("var requestUri = $\"pets/{petId}\";"));
        assert!(snippet.contains("if (limit is not null)"));
        assert!(snippet.contains("foreach (var item in tags)"));
        assert!(snippet.contains("queryParts.Add($\"tags={Uri.EscapeDataString(item)}\");"));
        assert!(snippet.contains("new HttpRequestMessage(HttpMethod.Put, requestUri)"));
        assert!(snippet.contains("request.Content = JsonContent.Create(body);"));
        assert!(snippet.contains("GetPipeline(\"Default\")"));
        assert!(snippet.contains("using var response = "));
        assert!(snippet.ends_with("return await UpdatePetClientResult.FromResponseAsync(response, cancellationToken);"));
    }

    #[test]
    fn test_endpoint_registration_uses_map_methods_for_head() {
        let snippet = endpoint_registration(
            HttpMethod::Head,
            "{id}",
            &["IPetsHandler handler".to_string()],
            "handler.CheckPetAsync()",
            &[".WithName(\"CheckPet\")".to_string()],
        );
        assert_eq!(
            snippet,
            "group.MapMethods(\"{id}\", new[] { \"HEAD\" }, async (IPetsHandler handler) => await handler.CheckPetAsync())\n    .WithName(\"CheckPet\");"
        );
    }

    #[test]
    fn test_authorization_calls() {
        let requirement = AuthRequirement {
            schemes: vec!["bearer".to_string()],
            scopes: Vec::new(),
            roles: vec!["admin".to_string()],
            policy: None,
            allow_anonymous: false,
        };
        assert_eq!(
            authorization_calls(&requirement),
            vec![".RequireAuthorization(policy => policy.RequireRole(\"admin\"))"]
        );
    }
}
