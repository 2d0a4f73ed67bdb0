use crate::document::Document;
use crate::naming::{pluralize, to_pascal_case};
use crate::operations::{is_parameter_segment, OperationDescriptor};
use clap::ValueEnum;
use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;

/// Group used when grouping is disabled.
pub const SINGLE_GROUP_NAME: &str = "Api";
/// Group of operations whose path has no literal segment.
pub const ROOT_GROUP_NAME: &str = "Root";

/// How operations are partitioned into endpoint groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
pub enum GroupingStrategy {
    /// Everything in a single group
    None,
    /// First literal path segment
    #[default]
    FirstPathSegment,
    /// First OpenAPI tag, falling back to the first path segment
    #[value(name = "tag")]
    OpenApiTag,
}

/// Route base of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteBase {
    /// Route passed to `MapGroup`, including the server base path
    pub mapping_route: String,
    /// Common prefix of the operation paths, without the server base path
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct GroupDescriptor {
    pub name: String,
    pub operations: Vec<OperationDescriptor>,
    pub route: RouteBase,
}

impl GroupDescriptor {
    /// Path of an operation relative to the group prefix.
    pub fn relative_path(&self, operation: &OperationDescriptor) -> String {
        relative_path(&operation.path, &self.route.prefix)
    }
}

/// Filters and partitions operations into groups, in first-appearance order.
///
/// Deprecated operations are dropped unless `include_deprecated` is set. `path_segment`
/// keeps only operations whose first literal segment matches it, case-insensitively.
pub fn group_operations(
    document: &Document,
    operations: Vec<OperationDescriptor>,
    strategy: GroupingStrategy,
    include_deprecated: bool,
    path_segment: Option<&str>,
) -> Vec<GroupDescriptor> {
    let kept: Vec<OperationDescriptor> = operations
        .into_iter()
        .filter(|op| {
            if op.deprecated && !include_deprecated {
                debug!("Skipping deprecated operation {}", op.operation_id);
                return false;
            }
            match path_segment {
                Some(segment) => first_literal_segment(&op.path)
                    .is_some_and(|first| first.eq_ignore_ascii_case(segment)),
                None => true,
            }
        })
        .collect();

    let keys: Vec<String> = kept.iter().map(|op| group_key(op, strategy)).collect();
    let keys = merge_singular_keys(keys, strategy);

    let mut grouped: IndexMap<String, Vec<OperationDescriptor>> = IndexMap::new();
    for (key, operation) in keys.into_iter().zip(kept) {
        grouped.entry(key).or_default().push(operation);
    }

    let base_path = server_base_path(document);
    let groups: Vec<GroupDescriptor> = grouped
        .into_iter()
        .map(|(name, operations)| {
            let route = route_base(&name, &operations, &base_path);
            debug!(
                "Group {}: {} operations at {}",
                name,
                operations.len(),
                route.mapping_route
            );
            GroupDescriptor {
                name,
                operations,
                route,
            }
        })
        .collect();

    info!("Grouped operations into {} groups ({:?})", groups.len(), strategy);
    groups
}

fn group_key(operation: &OperationDescriptor, strategy: GroupingStrategy) -> String {
    match strategy {
        GroupingStrategy::None => SINGLE_GROUP_NAME.to_string(),
        GroupingStrategy::OpenApiTag => match operation.tags.first() {
            Some(tag) => to_pascal_case(tag),
            None => segment_key(&operation.path),
        },
        GroupingStrategy::FirstPathSegment => segment_key(&operation.path),
    }
}

fn segment_key(path: &str) -> String {
    first_literal_segment(path)
        .map(to_pascal_case)
        .unwrap_or_else(|| ROOT_GROUP_NAME.to_string())
}

/// `/pet` and `/pets` land in the plural group. Tags are kept as declared.
fn merge_singular_keys(keys: Vec<String>, strategy: GroupingStrategy) -> Vec<String> {
    if strategy != GroupingStrategy::FirstPathSegment {
        return keys;
    }
    let distinct: Vec<String> = keys.clone();
    keys.into_iter()
        .map(|key| {
            let plural = pluralize(&key);
            if plural != key && distinct.contains(&plural) {
                debug!("Merging group {} into {}", key, plural);
                plural
            } else {
                key
            }
        })
        .collect()
}

pub fn first_literal_segment(path: &str) -> Option<&str> {
    path.split('/')
        .find(|segment| !segment.is_empty() && !is_parameter_segment(segment))
}

/// Computes the route base of a group.
///
/// The prefix is the longest run of leading literal segments shared by every path; with no
/// shared literal segment it falls back to `/{group name in lower case}`.
pub fn route_base(group_name: &str, operations: &[OperationDescriptor], server_base: &str) -> RouteBase {
    let prefix = common_route_prefix(operations.iter().map(|op| op.path.as_str()))
        .unwrap_or_else(|| format!("/{}", group_name.to_ascii_lowercase()));
    RouteBase {
        mapping_route: format!("{}{}", server_base, prefix),
        prefix,
    }
}

/// Longest common literal segment prefix, e.g. `/accounts` for `/accounts/{id}` and
/// `/accounts/{id}/transactions`.
pub fn common_route_prefix<'p>(paths: impl IntoIterator<Item = &'p str>) -> Option<String> {
    let mut common: Option<Vec<&str>> = None;

    for path in paths {
        let literal: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .take_while(|s| !is_parameter_segment(s))
            .collect();
        common = Some(match common {
            None => literal,
            Some(current) => current
                .into_iter()
                .zip(literal)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }

    common
        .filter(|segments| !segments.is_empty())
        .map(|segments| format!("/{}", segments.join("/")))
}

/// Operation path relative to a group prefix, without a leading slash.
///
/// A path outside the prefix is returned whole, minus its leading slash.
pub fn relative_path(path: &str, prefix: &str) -> String {
    let remainder = match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };
    remainder.trim_start_matches('/').to_string()
}

/// Path component of the first server URL, without a trailing slash.
pub fn server_base_path(document: &Document) -> String {
    let Some(server) = document.servers.first() else {
        return String::new();
    };
    let url = server.url.trim();
    let without_scheme = match url.find("://") {
        Some(index) => &url[index + 3..],
        None => url,
    };
    let path = if url.contains("://") {
        without_scheme.find('/').map(|i| &without_scheme[i..]).unwrap_or("")
    } else {
        without_scheme
    };
    let path = path.trim_end_matches('/');
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::collect_operations;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"
openapi: 3.0.3
info: { title: Bank, version: '1' }
servers:
  - url: https://api.example.com/v1/
paths:
  /accounts:
    get:
      operationId: listAccounts
      tags: [banking]
      responses: { '200': { description: ok } }
  /accounts/{id}:
    get:
      operationId: getAccount
      responses: { '200': { description: ok } }
  /accounts/{id}/transactions:
    get:
      operationId: listTransactions
      tags: [banking]
      responses: { '200': { description: ok } }
  /pet:
    post:
      operationId: addPet
      responses: { '200': { description: ok } }
  /pets:
    get:
      operationId: listPets
      deprecated: true
      responses: { '200': { description: ok } }
  /{tenant}:
    get:
      operationId: getTenant
      responses: { '200': { description: ok } }
"#;

    fn groups(strategy: GroupingStrategy, include_deprecated: bool, segment: Option<&str>) -> Vec<GroupDescriptor> {
        let doc = Document::from_yaml_str(DOCUMENT).unwrap();
        let ops = collect_operations(&doc).unwrap();
        group_operations(&doc, ops, strategy, include_deprecated, segment)
    }

    #[test]
    fn test_first_path_segment_groups_and_route_base() {
        let groups = groups(GroupingStrategy::FirstPathSegment, true, None);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Accounts", "Pets", "Root"]);

        let accounts = &groups[0];
        assert_eq!(accounts.route.prefix, "/accounts");
        assert_eq!(accounts.route.mapping_route, "/v1/accounts");
        let relative: Vec<String> = accounts.operations.iter().map(|op| accounts.relative_path(op)).collect();
        assert_eq!(relative, vec!["", "{id}", "{id}/transactions"]);

        assert_eq!(groups[2].route.prefix, "/root");
    }

    #[test]
    fn test_deprecated_operations_are_excluded_by_default() {
        let groups = groups(GroupingStrategy::FirstPathSegment, false, None);
        assert!(!groups.iter().any(|g| g.name == "Pets"));
        let pet = groups.iter().find(|g| g.name == "Pet").unwrap();
        assert_eq!(pet.operations.len(), 1);
        assert_eq!(pet.operations[0].operation_id, "addPet");
    }

    #[test]
    fn test_tag_grouping_falls_back_to_segment() {
        let groups = groups(GroupingStrategy::OpenApiTag, true, None);
        let banking = groups.iter().find(|g| g.name == "Banking").unwrap();
        assert_eq!(banking.operations.len(), 2);
        assert!(groups.iter().any(|g| g.name == "Accounts"));
    }

    #[test]
    fn test_singular_merge_applies_to_path_segments_only() {
        let doc = Document::from_yaml_str(
            r#"
openapi: 3.0.3
paths:
  /pet:
    post:
      operationId: addPet
      tags: [Pet]
      responses: { '200': { description: ok } }
  /pets:
    get:
      operationId: listPets
      tags: [Pets]
      responses: { '200': { description: ok } }
"#,
        )
        .unwrap();
        let names = |strategy: GroupingStrategy| -> Vec<String> {
            let ops = collect_operations(&doc).unwrap();
            group_operations(&doc, ops, strategy, false, None)
                .into_iter()
                .map(|g| g.name)
                .collect()
        };
        assert_eq!(names(GroupingStrategy::FirstPathSegment), vec!["Pets"]);
        assert_eq!(names(GroupingStrategy::OpenApiTag), vec!["Pet", "Pets"]);
    }

    #[test]
    fn test_single_group_and_segment_filter() {
        let single = groups(GroupingStrategy::None, true, None);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].name, "Api");

        let filtered = groups(GroupingStrategy::FirstPathSegment, true, Some("ACCOUNTS"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].operations.len(), 3);
    }

    #[test]
    fn test_relative_path_outside_prefix() {
        assert_eq!(relative_path("/accountsx/1", "/accounts"), "accountsx/1");
        assert_eq!(relative_path("/accounts", "/accounts"), "");
    }

    #[test]
    fn test_server_base_path() {
        let mut doc = Document::default();
        assert_eq!(server_base_path(&doc), "");
        doc.servers.push(crate::document::Server {
            url: "/api/".to_string(),
            description: None,
        });
        assert_eq!(server_base_path(&doc), "/api");
        doc.servers[0].url = "https://example.com".to_string();
        assert_eq!(server_base_path(&doc), "");
    }
}
