//! Tool Discovery
//!
//! Turns a server's advertised catalog into validated tool specs: apply the
//! operator's inclusion filter, enforce catalog invariants, and attach bound
//! arguments that every call must carry.

use std::collections::HashSet;

use agent_core::tool::ToolSpec;
use serde_json::{Map, Value};

use crate::client::{McpClient, ToolDefinition};
use crate::error::McpError;

/// Fetch and normalize the server's catalog.
///
/// An empty `include` list keeps everything. Filter names the server does
/// not advertise are logged and skipped; a filter that matches nothing is an
/// error, as is an entirely empty catalog.
pub async fn discover_tools(
    client: &McpClient,
    include: &[String],
    bound_args: &Map<String, Value>,
) -> Result<Vec<ToolSpec>, McpError> {
    let catalog = client.list_tools().await?;
    normalize_catalog(catalog, include, bound_args)
}

fn normalize_catalog(
    catalog: Vec<ToolDefinition>,
    include: &[String],
    bound_args: &Map<String, Value>,
) -> Result<Vec<ToolSpec>, McpError> {
    if catalog.is_empty() {
        return Err(McpError::Discovery("server advertised no tools".into()));
    }

    let mut seen = HashSet::new();
    for def in &catalog {
        if def.name.trim().is_empty() {
            return Err(McpError::Discovery("catalog contains a tool with an empty name".into()));
        }
        if !def.input_schema.is_object() {
            return Err(McpError::Discovery(format!(
                "tool '{}' has a non-object input schema",
                def.name
            )));
        }
        if !seen.insert(def.name.clone()) {
            return Err(McpError::Discovery(format!(
                "duplicate tool name '{}' in catalog",
                def.name
            )));
        }
    }

    let selected: Vec<ToolDefinition> = if include.is_empty() {
        catalog
    } else {
        for name in include {
            if !catalog.iter().any(|d| &d.name == name) {
                tracing::warn!(tool = %name, "included tool not advertised by server");
            }
        }
        let wanted: HashSet<&str> = include.iter().map(String::as_str).collect();
        catalog
            .into_iter()
            .filter(|d| wanted.contains(d.name.as_str()))
            .collect()
    };

    if selected.is_empty() {
        return Err(McpError::Discovery(format!(
            "inclusion filter [{}] matched no advertised tools",
            include.join(", ")
        )));
    }

    tracing::info!(
        count = selected.len(),
        tools = ?selected.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "discovered tools"
    );

    Ok(selected
        .into_iter()
        .map(|def| {
            ToolSpec::new(def.name, def.description, def.input_schema)
                .with_bound_args(bound_args.clone())
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str) -> ToolDefinition {
        serde_json::from_value(json!({
            "name": name,
            "description": format!("{name} tool"),
            "inputSchema": {"type": "object", "properties": {}},
        }))
        .unwrap()
    }

    fn no_bound() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let err = normalize_catalog(vec![], &[], &no_bound()).unwrap_err();
        assert!(matches!(err, McpError::Discovery(_)));
    }

    #[test]
    fn empty_filter_keeps_everything_in_server_order() {
        let specs =
            normalize_catalog(vec![def("query"), def("list_fields")], &[], &no_bound()).unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["query", "list_fields"]);
    }

    #[test]
    fn filter_selects_subset_and_skips_unknown_names() {
        let include = vec!["list_fields".to_string(), "not_there".to_string()];
        let specs = normalize_catalog(
            vec![def("query"), def("list_fields")],
            &include,
            &no_bound(),
        )
        .unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["list_fields"]);
    }

    #[test]
    fn filter_matching_nothing_is_an_error() {
        let include = vec!["ghost".to_string()];
        let err = normalize_catalog(vec![def("query")], &include, &no_bound()).unwrap_err();
        assert!(matches!(err, McpError::Discovery(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = normalize_catalog(vec![def("query"), def("query")], &[], &no_bound()).unwrap_err();
        assert!(matches!(err, McpError::Discovery(_)));
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = normalize_catalog(vec![def("  ")], &[], &no_bound()).unwrap_err();
        assert!(matches!(err, McpError::Discovery(_)));
    }

    #[test]
    fn non_object_schema_is_rejected() {
        let bad: ToolDefinition = serde_json::from_value(json!({
            "name": "broken",
            "inputSchema": "not a schema",
        }))
        .unwrap();
        let err = normalize_catalog(vec![bad], &[], &no_bound()).unwrap_err();
        assert!(matches!(err, McpError::Discovery(_)));
    }

    #[test]
    fn bound_args_are_attached_to_every_spec() {
        let mut bound = Map::new();
        bound.insert("datasource_luid".into(), json!("abc-123"));
        let specs = normalize_catalog(vec![def("query")], &[], &bound).unwrap();
        assert_eq!(specs[0].bound_args["datasource_luid"], "abc-123");
    }
}
