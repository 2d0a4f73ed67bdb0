use openapi_minimal_api_gen::endpoints::{FileUploadShape, GroupRegistration, ParameterBinding};
use openapi_minimal_api_gen::generator::{GenerationOutput, Generator, GeneratorOptions};
use openapi_minimal_api_gen::grouping::GroupingStrategy;
use openapi_minimal_api_gen::loader::SpecLoader;
use openapi_minimal_api_gen::policies::RateLimitAlgorithm;
use openapi_minimal_api_gen::serializer::serialize_json;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn generate_with(name: &str, options: GeneratorOptions) -> GenerationOutput {
    let spec = SpecLoader::load_file(&fixture(name)).expect("fixture should load");
    Generator::new(&spec.document, options)
        .generate()
        .expect("generation should succeed")
}

fn generate(name: &str) -> GenerationOutput {
    generate_with(name, GeneratorOptions::default())
}

fn group<'a>(output: &'a GenerationOutput, name: &str) -> &'a GroupRegistration {
    output
        .group(name)
        .unwrap_or_else(|| panic!("missing group {}", name))
}

#[test]
fn test_petstore_tag_grouping() {
    let output = generate_with(
        "petstore.yaml",
        GeneratorOptions {
            grouping: GroupingStrategy::OpenApiTag,
            ..GeneratorOptions::default()
        },
    );

    let names: Vec<&str> = output.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Pets", "Store"]);

    let pets = group(&output, "Pets");
    assert_eq!(pets.handler_interface.name, "IPetsHandler");
    assert_eq!(pets.map_method.name, "MapPetsEndpoints");
    assert_eq!(pets.mapping_route, "/pets");
    let operations: Vec<&str> = pets.endpoints.iter().map(|e| e.operation_id.as_str()).collect();
    assert_eq!(operations, vec!["listPets", "createPet", "getPet"]);
}

#[test]
fn test_list_and_created_results() {
    let output = generate("petstore.yaml");
    let pets = group(&output, "Pets");

    let list = pets.endpoint("listPets").unwrap();
    assert_eq!(list.result.name, "ListPetsResult");
    assert_eq!(
        list.result.factory("Ok").unwrap().signature(),
        "ListPetsResult Ok(List<Pet> response)"
    );
    assert_eq!(list.result.implicit_conversions[0].source_type.render(), "List<Pet>");

    let create = pets.endpoint("createPet").unwrap();
    assert_eq!(
        create.result.factory("Created").unwrap().signature(),
        "CreatePetResult Created(Pet response, string? location = null)"
    );
    let conversion = &create.result.implicit_conversions[0];
    assert_eq!(conversion.source_type.render(), "Pet");
    assert_eq!(conversion.factory, "Created");
}

#[test]
fn test_array_alias_is_not_declared() {
    let output = generate("petstore.yaml");
    assert!(output.models.record("Pets").is_none());
    assert!(output.models.record("Pet").is_some());
    assert!(output.models.record("Error").is_some());
}

#[test]
fn test_document_rate_limit_is_hoisted() {
    let output = generate("petstore.yaml");

    assert_eq!(output.policies.rate_limits.len(), 1);
    let burst = &output.policies.rate_limits[0];
    assert_eq!(burst.name, "Burst");
    assert_eq!(burst.algorithm, RateLimitAlgorithm::FixedWindow);
    assert_eq!(burst.permit_limit, 20);
    assert_eq!(burst.window_seconds, 10);
    assert_eq!(burst.queue_limit, 0);

    let pets = group(&output, "Pets");
    assert_eq!(pets.hoisted.rate_limit.as_deref(), Some("Burst"));
    assert!(pets.hoisted.auth.is_some());
    assert!(output
        .registrations
        .iter()
        .any(|r| r.contains("limiter.PermitLimit = 20;") && r.contains("TimeSpan.FromSeconds(10)")));
    assert!(output.registrations.iter().any(|r| r == ".AddJwtBearer(\"bearer\")"));
}

#[test]
fn test_auto_responses_in_metadata_only() {
    let output = generate("petstore.yaml");
    let create = group(&output, "Pets").endpoint("createPet").unwrap();

    assert!(create.auto_applied.contains(&400));
    assert!(create.auto_applied.contains(&401));
    assert!(create.auto_applied.contains(&429));
    assert!(create
        .produces
        .iter()
        .any(|p| p.status == 400 && p.is_auto && p.is_problem));
    assert!(create.result.factory("BadRequest").is_none());
    assert!(create.registration.contains(".ProducesProblem(400)"));

    let get = group(&output, "Pets").endpoint("getPet").unwrap();
    assert!(get.result.factory("NotFound").is_some());
    assert_eq!(get.cache.as_deref(), Some("Cache30Seconds"));
}

#[test]
fn test_deprecated_operations() {
    let default = generate("petstore.yaml");
    assert!(default.groups.iter().all(|g| g.endpoint("listLegacyPets").is_none()));

    let included = generate_with(
        "petstore.yaml",
        GeneratorOptions {
            include_deprecated: true,
            ..GeneratorOptions::default()
        },
    );
    let legacy = group(&included, "Pets").endpoint("listLegacyPets").unwrap();
    assert!(legacy.deprecated);
    assert!(legacy.registration.contains("ObsoleteAttribute"));
}

#[test]
fn test_accounts_route_base() {
    let output = generate("accounts.yaml");
    assert_eq!(output.groups.len(), 1);

    let accounts = group(&output, "Accounts");
    assert_eq!(accounts.route_prefix, "/accounts");
    assert_eq!(accounts.mapping_route, "/api/accounts");
    let routes: Vec<&str> = accounts.endpoints.iter().map(|e| e.relative_route.as_str()).collect();
    assert_eq!(routes, vec!["", "{id}", "{id}/transactions"]);
}

#[test]
fn test_required_members_precede_defaults() {
    let output = generate("accounts.yaml");
    let transactions = group(&output, "Accounts").endpoint("listTransactions").unwrap();

    let ParameterBinding::Aggregate { record } = &transactions.binding else {
        panic!("expected aggregate binding");
    };
    assert_eq!(record.name, "ListTransactionsParameters");
    let names: Vec<&str> = record.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Id", "Since", "Limit"]);
    assert_eq!(record.properties[2].default_value.as_deref(), Some("20"));

    assert_eq!(
        transactions.client_method.signature(),
        "Task<ListTransactionsClientResult> ListTransactionsAsync(string id, string since, int limit = 20, CancellationToken cancellationToken = default)"
    );

    let account = output.models.record("Account").unwrap();
    let members: Vec<&str> = account.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(members, vec!["Id", "Currency", "Balance"]);
}

#[test]
fn test_resilience_pipeline_on_client() {
    let output = generate("accounts.yaml");
    let accounts = group(&output, "Accounts");
    let transactions = accounts.endpoint("listTransactions").unwrap();

    assert_eq!(transactions.resilience.as_deref(), Some("Transactions"));
    assert!(accounts.client.uses_resilience);
    let body = transactions.client_method.body.as_deref().unwrap();
    assert!(body.contains("GetPipeline(\"Transactions\")"));
    assert_eq!(output.policies.resilience[0].max_retry_attempts, 5);
}

#[test]
fn test_inline_response_item_is_hoisted() {
    let output = generate("accounts.yaml");
    assert_eq!(output.inline_records.len(), 1);
    let item = &output.inline_records[0];

    let transactions = group(&output, "Accounts").endpoint("listTransactions").unwrap();
    let ok = transactions.result.factory("Ok").unwrap();
    assert_eq!(ok.parameters[0].type_ref.render(), format!("List<{}>", item.name));
}

#[test]
fn test_shapes_discriminator_detection() {
    let output = generate("shapes.yaml");

    assert_eq!(output.models.polymorphic.len(), 1);
    let shape = &output.models.polymorphic[0];
    assert_eq!(shape.config.discriminator_property, "kind");
    assert!(!shape.config.discriminator_is_explicit);
    assert!(shape.base.is_abstract);

    let values: Vec<Option<&str>> = shape
        .variants
        .iter()
        .map(|v| v.discriminator_value.as_deref())
        .collect();
    assert_eq!(values, vec![Some("circle"), Some("square")]);
    let circle = shape.variants.iter().find(|v| v.name == "Circle").unwrap();
    assert_eq!(circle.base_type.as_deref(), Some("Shape"));

    let list = group(&output, "Shapes").endpoint("listShapes").unwrap();
    assert_eq!(
        list.result.factory("Ok").unwrap().signature(),
        "ListShapesResult Ok(List<Shape> response)"
    );
}

#[test]
fn test_upload_shapes() {
    let output = generate("uploads.yaml");
    let documents = group(&output, "Documents");

    let upload = documents.endpoint("uploadDocument").unwrap();
    assert!(matches!(
        &upload.upload,
        Some(FileUploadShape::MultipartObject { has_non_file_fields: true, .. })
    ));
    let ParameterBinding::FormFields { fields } = &upload.binding else {
        panic!("expected flattened form fields");
    };
    let names: Vec<&str> = fields.iter().map(|f| f.json_name.as_str()).collect();
    assert_eq!(names, vec!["file", "title"]);
    assert!(upload.registration.contains(".DisableAntiforgery()"));

    let raw = documents.endpoint("uploadRaw").unwrap();
    assert_eq!(
        raw.upload,
        Some(FileUploadShape::BinaryBody {
            content_type: "application/octet-stream".to_string()
        })
    );

    let batch = documents.endpoint("uploadBatch").unwrap();
    assert_eq!(
        batch.upload,
        Some(FileUploadShape::MultiFileRaw {
            field_name: "files".to_string()
        })
    );
}

#[test]
fn test_generation_is_idempotent() {
    for name in ["petstore.yaml", "accounts.yaml", "shapes.yaml", "uploads.yaml"] {
        let spec = SpecLoader::load_file(&fixture(name)).unwrap();
        let generator = Generator::new(&spec.document, GeneratorOptions::default());
        let first = serialize_json(&generator.generate().unwrap()).unwrap();
        let second = serialize_json(&generator.generate().unwrap()).unwrap();
        assert_eq!(first, second, "{} is not idempotent", name);
    }
}

#[test]
fn test_declared_names_are_unique() {
    for name in ["petstore.yaml", "accounts.yaml", "shapes.yaml", "uploads.yaml"] {
        let output = generate(name);
        let mut declared: Vec<String> = Vec::new();

        declared.extend(output.models.records.iter().map(|r| r.name.clone()));
        declared.extend(output.models.enums.iter().map(|e| e.name.clone()));
        declared.extend(output.models.tuples.iter().map(|t| t.name.clone()));
        for model in &output.models.polymorphic {
            declared.push(model.base.name.clone());
            declared.extend(model.variants.iter().map(|v| v.name.clone()));
        }
        declared.extend(output.inline_records.iter().map(|r| r.name.clone()));
        declared.extend(output.inline_enums.iter().map(|e| e.name.clone()));
        for group in &output.groups {
            for endpoint in &group.endpoints {
                declared.push(endpoint.result.name.clone());
                declared.push(endpoint.client_result.name.clone());
                if let ParameterBinding::Aggregate { record } = &endpoint.binding {
                    declared.push(record.name.clone());
                }
            }
        }

        let unique: HashSet<&String> = declared.iter().collect();
        assert_eq!(unique.len(), declared.len(), "duplicate declarations in {}: {:?}", name, declared);
    }
}

#[test]
fn test_per_segment_generation() {
    let spec = SpecLoader::load_file(&fixture("petstore.yaml")).unwrap();
    let generator = Generator::new(&spec.document, GeneratorOptions::default());
    let segments = generator.generate_per_segment().unwrap();

    let names: Vec<&str> = segments.iter().map(|(segment, _)| segment.as_str()).collect();
    assert_eq!(names, vec!["pets", "store"]);
    for (_, output) in &segments {
        assert_eq!(output.groups.len(), 1);
    }
    assert!(segments[1].1.policies.caches.is_empty());
}
