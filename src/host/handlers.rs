//! Built-in command handlers.
//!
//! Registered by the extension on activation. Every handler revalidates
//! its parameters even though the client façade already did — the wire
//! is typed as loosely as the callers are, and a handler must never
//! trust a map it did not build. Unknown fields are rejected, not
//! ignored.
//!
//! All built-ins run on the host tick (`requires_main_thread`), the
//! asset ones included: they block on catalog HTTP, which is accepted
//! tick-stall behavior inherited from the host extension this design
//! comes from.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::assets::AssetCatalog;
use crate::constants::{SCENE_INFO_MAX_OBJECTS, VIEWPORT_DEFAULT_MAX_SIZE};
use crate::error::HandlerError;
use crate::host::registry::HandlerRegistry;
use crate::host::session::{ObjectKind, SelectionMode};

/// Parse a parameter map into a typed parameter struct.
fn parse<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(params)).map_err(HandlerError::from)
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::new(format!("result encoding failed: {e}")))
}

/// Parameter struct for commands that take none.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectInfoParams {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetSelectionParams {
    object_names: Vec<String>,
    #[serde(default)]
    mode: SelectionMode,
    #[serde(default)]
    active: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchRenameParams {
    #[serde(default)]
    object_names: Option<Vec<String>>,
    #[serde(default)]
    use_selection: bool,
    new_base_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecuteCodeParams {
    code: String,
}

fn default_max_size() -> u32 {
    VIEWPORT_DEFAULT_MAX_SIZE
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScreenshotParams {
    #[serde(default = "default_max_size")]
    max_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoriesParams {
    asset_type: String,
}

fn default_asset_type() -> String {
    "all".to_string()
}

fn default_resolution() -> String {
    "1k".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchAssetsParams {
    #[serde(default = "default_asset_type")]
    asset_type: String,
    #[serde(default)]
    categories: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DownloadAssetParams {
    asset_id: String,
    asset_type: String,
    #[serde(default = "default_resolution")]
    resolution: String,
}

/// Register every built-in handler.
///
/// The provider-status command is always available; the other asset
/// commands are registered only when the catalog is enabled, so a
/// disabled catalog reports unknown-command for them, same as the
/// original host extension's conditional handler table.
pub fn register_builtins(registry: &mut HandlerRegistry, assets: &Arc<AssetCatalog>) {
    registry.register_fn("get_scene_info", "Scene snapshot: objects, counts, materials", |session, params| {
        parse::<NoParams>(params)?;
        to_result(&session.scene_info(SCENE_INFO_MAX_OBJECTS))
    });

    registry.register_fn("get_object_info", "Details for one named object", |session, params| {
        let p: ObjectInfoParams = parse(params)?;
        let info = session
            .object_info(&p.name)
            .ok_or_else(|| HandlerError::new(format!("no object named '{}'", p.name)))?;
        to_result(&info)
    });

    registry.register_fn("get_selection", "Current selection and active object", |session, params| {
        parse::<NoParams>(params)?;
        to_result(&session.selection())
    });

    registry.register_fn("set_selection", "Replace, extend, or shrink the selection", |session, params| {
        let p: SetSelectionParams = parse(params)?;
        let selection = session.set_selection(&p.object_names, p.mode, p.active.as_deref())?;
        to_result(&selection)
    });

    registry.register_fn("batch_rename", "Rename objects to base.NNN", |session, params| {
        let p: BatchRenameParams = parse(params)?;
        let names = if p.use_selection {
            session.selection().selected
        } else {
            p.object_names
                .ok_or_else(|| HandlerError::new("object_names is required unless use_selection is set"))?
        };
        if names.is_empty() {
            return Err(HandlerError::new("nothing to rename"));
        }
        let renamed = session.batch_rename(&names, &p.new_base_name)?;
        Ok(json!({ "renamed": renamed, "count": renamed.len() }))
    });

    registry.register_fn("execute_code", "Run host-scripting code, capture output", |session, params| {
        let p: ExecuteCodeParams = parse(params)?;
        let output = session.run_script(&p.code)?;
        Ok(json!({ "executed": true, "result": output }))
    });

    registry.register_fn("get_viewport_screenshot", "Capture the viewport as an image", |session, params| {
        let p: ScreenshotParams = parse(params)?;
        let capture = session.capture_view(p.max_size)?;
        Ok(json!({
            "width": capture.width,
            "height": capture.height,
            "format": capture.format,
            "data": BASE64.encode(&capture.data),
        }))
    });

    let status_assets = Arc::clone(assets);
    registry.register_fn(
        "get_asset_provider_status",
        "Whether the asset catalog is enabled",
        move |_, params| {
            parse::<NoParams>(params)?;
            Ok(status_assets.status())
        },
    );

    if assets.enabled() {
        let cat_assets = Arc::clone(assets);
        registry.register_fn("get_asset_categories", "Category list for an asset type", move |_, params| {
            let p: CategoriesParams = parse(params)?;
            cat_assets.categories(&p.asset_type)
        });

        let search_assets = Arc::clone(assets);
        registry.register_fn("search_assets", "Search the asset catalog", move |_, params| {
            let p: SearchAssetsParams = parse(params)?;
            search_assets.search(&p.asset_type, p.categories.as_deref())
        });

        let dl_assets = Arc::clone(assets);
        registry.register_fn("download_asset", "Download an asset and import it", move |session, params| {
            let p: DownloadAssetParams = parse(params)?;
            let file = dl_assets.resolve_download(&p.asset_id, &p.asset_type, &p.resolution)?;
            let bytes = dl_assets.download(&file)?;

            // Only models materialize as scene objects; environment and
            // texture assets are fetched and applied without one.
            let imported: Vec<String> = if p.asset_type == "models" {
                vec![session.import_asset(&p.asset_id, ObjectKind::Mesh)?]
            } else {
                Vec::new()
            };

            Ok(json!({
                "success": true,
                "message": format!(
                    "Downloaded {} ({} bytes, {})",
                    p.asset_id,
                    bytes.len(),
                    file.format
                ),
                "imported_objects": imported,
            }))
        });
    }
}
