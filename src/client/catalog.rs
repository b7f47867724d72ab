//! Capability catalog.
//!
//! Static metadata describing every command the bridge can issue:
//! name, human-readable description, JSON parameter schema, and the
//! required parameter names. The serve loop exposes it for tool
//! discovery; the façade uses it to validate calls before they cross
//! the wire.
//!
//! The catalog always lists the asset commands even though the host
//! registers them conditionally — a disabled catalog answers them with
//! a command error that explains itself, which is more useful to a
//! calling assistant than the tools silently not existing.

use serde_json::{Value, json};

/// Metadata for one callable command.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Command name on the wire.
    pub name: &'static str,
    /// One-line description for tool discovery.
    pub description: &'static str,
    /// Names of required parameters.
    pub required: &'static [&'static str],
    /// JSON schema for the parameter object.
    pub input_schema: Value,
}

/// The full capability catalog.
pub fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_scene_info",
            description: "Get a snapshot of the current scene: object list (truncated), counts, materials",
            required: &[],
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "get_object_info",
            description: "Get details for one named object: transform, visibility, materials, bounding box",
            required: &["name"],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Object name"}
                },
                "required": ["name"]
            }),
        },
        ToolSpec {
            name: "get_selection",
            description: "Get the current selection and active object",
            required: &[],
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "set_selection",
            description: "Replace, extend, or shrink the selection",
            required: &["object_names"],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "object_names": {"type": "array", "items": {"type": "string"}},
                    "mode": {"type": "string", "enum": ["replace", "add", "remove"], "default": "replace"},
                    "active": {"type": "string", "description": "Object to make active"}
                },
                "required": ["object_names"]
            }),
        },
        ToolSpec {
            name: "batch_rename",
            description: "Rename listed objects (or the selection) to base.001, base.002, ...",
            required: &["new_base_name"],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "object_names": {"type": "array", "items": {"type": "string"}},
                    "use_selection": {"type": "boolean", "default": false},
                    "new_base_name": {"type": "string"}
                },
                "required": ["new_base_name"]
            }),
        },
        ToolSpec {
            name: "execute_code",
            description: "Execute host-scripting code in the host and capture its textual output",
            required: &["code"],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "Script source to execute"}
                },
                "required": ["code"]
            }),
        },
        ToolSpec {
            name: "get_viewport_screenshot",
            description: "Capture the viewport as an image (base64 in the result)",
            required: &[],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "max_size": {"type": "integer", "default": 800, "description": "Longest-edge cap in pixels"}
                }
            }),
        },
        ToolSpec {
            name: "get_asset_provider_status",
            description: "Check whether the asset catalog integration is enabled",
            required: &[],
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolSpec {
            name: "get_asset_categories",
            description: "List asset catalog categories for one asset type",
            required: &["asset_type"],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "asset_type": {"type": "string", "enum": ["hdris", "textures", "models", "all"]}
                },
                "required": ["asset_type"]
            }),
        },
        ToolSpec {
            name: "search_assets",
            description: "Search the asset catalog, optionally filtered by type and categories",
            required: &[],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "asset_type": {"type": "string", "enum": ["hdris", "textures", "models", "all"], "default": "all"},
                    "categories": {"type": "string", "description": "Comma-separated category filter"}
                }
            }),
        },
        ToolSpec {
            name: "download_asset",
            description: "Download an asset from the catalog and import it into the scene",
            required: &["asset_id", "asset_type"],
            input_schema: json!({
                "type": "object",
                "properties": {
                    "asset_id": {"type": "string"},
                    "asset_type": {"type": "string", "enum": ["hdris", "textures", "models"]},
                    "resolution": {"type": "string", "default": "1k"}
                },
                "required": ["asset_id", "asset_type"]
            }),
        },
    ]
}

/// Look up one tool by name.
pub fn find(name: &str) -> Option<ToolSpec> {
    catalog().into_iter().find(|spec| spec.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let specs = catalog();
        let names: HashSet<&str> = specs.iter().map(|s| s.name).collect();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn test_required_params_exist_in_schema() {
        for spec in catalog() {
            let properties = spec.input_schema["properties"]
                .as_object()
                .unwrap_or_else(|| panic!("{} schema has no properties", spec.name));
            for required in spec.required {
                assert!(
                    properties.contains_key(*required),
                    "{}: required '{}' missing from schema properties",
                    spec.name,
                    required
                );
            }
        }
    }

    #[test]
    fn test_required_list_matches_schema_required() {
        for spec in catalog() {
            let schema_required: Vec<&str> = spec.input_schema["required"]
                .as_array()
                .map(|arr| arr.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            assert_eq!(schema_required, spec.required.to_vec(), "{} required mismatch", spec.name);
        }
    }

    #[test]
    fn test_find() {
        assert!(find("execute_code").is_some());
        assert!(find("frobnicate").is_none());
    }
}
