//! The host scripting surface handlers run against.
//!
//! The host application's scripting API is only safe to touch from its
//! own main thread, on its own tick. [`HostSession`] is the seam: the
//! execution bridge hands a `&mut dyn HostSession` to each handler
//! while draining the command queue, so handlers never reach for host
//! state through any other path.
//!
//! Implementations must provide read-after-write consistency within a
//! single handler invocation: a mutation followed by a read in the same
//! `execute` call observes the mutation. Hosts with lazy invalidation
//! need to refresh before read; the simulated host is always
//! consistent.

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

/// Category of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    /// Polygonal geometry.
    Mesh,
    /// Light source.
    Light,
    /// Camera.
    Camera,
    /// Transform-only placeholder.
    Empty,
}

/// Minimal per-object entry in a scene snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSummary {
    /// Object name, unique within the scene.
    pub name: String,
    /// Object category.
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// World-space location, rounded for compactness.
    pub location: [f64; 3],
}

/// Snapshot of the scene, truncated for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInfo {
    /// Scene name.
    pub name: String,
    /// Total object count, including objects omitted from `objects`.
    pub object_count: usize,
    /// Leading objects, truncated to a transport-friendly count.
    pub objects: Vec<ObjectSummary>,
    /// Number of materials in the scene data.
    pub materials_count: usize,
}

/// Full details for one named object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object name.
    pub name: String,
    /// Object category.
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// World-space location.
    pub location: [f64; 3],
    /// Euler rotation in radians.
    pub rotation: [f64; 3],
    /// Per-axis scale factors.
    pub scale: [f64; 3],
    /// Whether the object is visible in the viewport.
    pub visible: bool,
    /// Names of materials assigned to the object.
    pub materials: Vec<String>,
    /// World-space axis-aligned bounding box `[min, max]`.
    pub world_bounding_box: [[f64; 3]; 2],
}

/// Current selection state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Names of selected objects, in selection order.
    pub selected: Vec<String>,
    /// Name of the active object, if any.
    pub active: Option<String>,
}

/// How `set_selection` combines with the existing selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Clear the selection, then select the named objects.
    #[default]
    Replace,
    /// Add the named objects to the selection.
    Add,
    /// Remove the named objects from the selection.
    Remove,
}

/// One captured viewport image.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewCapture {
    /// Image width in pixels after downscaling.
    pub width: u32,
    /// Image height in pixels after downscaling.
    pub height: u32,
    /// Image container format, e.g. `"png"`.
    pub format: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

/// The host application's scripting API, scoped to what the built-in
/// handlers need. Only ever called from the host's main tick.
pub trait HostSession {
    /// Scene snapshot, with the object list truncated to `max_objects`.
    fn scene_info(&self, max_objects: usize) -> SceneInfo;

    /// Details for the named object, or `None` if it does not exist.
    fn object_info(&self, name: &str) -> Option<ObjectInfo>;

    /// Current selection state.
    fn selection(&self) -> Selection;

    /// Update the selection. Unknown names are reported as an error and
    /// the selection is left unchanged.
    fn set_selection(
        &mut self,
        names: &[String],
        mode: SelectionMode,
        active: Option<&str>,
    ) -> Result<Selection, HandlerError>;

    /// Rename the given objects to `base.001`, `base.002`, ...
    /// Returns the new names in order.
    fn batch_rename(&mut self, names: &[String], base: &str) -> Result<Vec<String>, HandlerError>;

    /// Execute host-scripting code and capture its textual output.
    fn run_script(&mut self, code: &str) -> Result<String, HandlerError>;

    /// Capture the current viewport, downscaled so the longest edge is
    /// at most `max_size` pixels.
    fn capture_view(&self, max_size: u32) -> Result<ViewCapture, HandlerError>;

    /// Create an object for a downloaded asset and return its name.
    fn import_asset(&mut self, asset_id: &str, kind: ObjectKind) -> Result<String, HandlerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_kind_uses_host_style_names() {
        assert_eq!(serde_json::to_value(ObjectKind::Mesh).unwrap(), json!("MESH"));
        assert_eq!(serde_json::to_value(ObjectKind::Light).unwrap(), json!("LIGHT"));
    }

    #[test]
    fn test_selection_mode_default_is_replace() {
        assert_eq!(SelectionMode::default(), SelectionMode::Replace);
        let mode: SelectionMode = serde_json::from_value(json!("add")).unwrap();
        assert_eq!(mode, SelectionMode::Add);
    }

    #[test]
    fn test_object_summary_serializes_kind_as_type() {
        let summary = ObjectSummary {
            name: "Cube".to_string(),
            kind: ObjectKind::Mesh,
            location: [0.0, 0.0, 0.0],
        };
        let wire = serde_json::to_value(&summary).unwrap();
        assert_eq!(wire["type"], json!("MESH"));
    }
}
