//! In-memory scene graph implementing [`HostSession`].
//!
//! Stands in for the real host application's data model so the bridge
//! can be exercised end to end without a GUI process. The default scene
//! mirrors a fresh host document: one mesh, one light, one camera.
//!
//! Scripting is line-oriented: `run_script` interprets one directive
//! per line and captures the textual output the way the real host
//! captures stdout from executed code. The interpreter stops at the
//! first failing line and reports it with its line number.

use chrono::{DateTime, Utc};

use crate::constants::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::error::HandlerError;
use crate::host::session::{
    HostSession, ObjectInfo, ObjectKind, ObjectSummary, SceneInfo, Selection, SelectionMode,
    ViewCapture,
};

/// A valid single-pixel PNG used as the simulated viewport image.
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
    0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', // IHDR
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
    0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89,
    0x00, 0x00, 0x00, 0x0D, b'I', b'D', b'A', b'T', // IDAT
    0x78, 0xDA, 0x63, 0x64, 0x60, 0xF8, 0x5F, 0x0F, 0x00,
    0x02, 0x87, 0x01, 0x80, 0xEB, 0x47, 0xBA, 0x92,
    0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
];

/// One object in the simulated scene.
#[derive(Debug, Clone)]
pub struct SimObject {
    /// Unique object name.
    pub name: String,
    /// Object category.
    pub kind: ObjectKind,
    /// World-space location.
    pub location: [f64; 3],
    /// Euler rotation in radians.
    pub rotation: [f64; 3],
    /// Per-axis scale.
    pub scale: [f64; 3],
    /// Viewport visibility.
    pub visible: bool,
    /// Assigned material names.
    pub materials: Vec<String>,
}

impl SimObject {
    fn new(name: &str, kind: ObjectKind, location: [f64; 3]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            location,
            rotation: [0.0; 3],
            scale: [1.0; 3],
            visible: true,
            materials: Vec::new(),
        }
    }
}

/// One executed-operation record in the scene journal.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// When the operation ran, host-side.
    pub at: DateTime<Utc>,
    /// What happened.
    pub entry: String,
}

/// The simulated host document.
#[derive(Debug)]
pub struct SimScene {
    name: String,
    objects: Vec<SimObject>,
    materials: Vec<String>,
    selected: Vec<String>,
    active: Option<String>,
    journal: Vec<JournalEntry>,
}

impl Default for SimScene {
    fn default() -> Self {
        let mut cube = SimObject::new("Cube", ObjectKind::Mesh, [0.0, 0.0, 0.0]);
        cube.materials.push("Material".to_string());
        Self {
            name: "Scene".to_string(),
            objects: vec![
                cube,
                SimObject::new("Light", ObjectKind::Light, [4.08, 1.01, 5.9]),
                SimObject::new("Camera", ObjectKind::Camera, [7.36, -6.93, 4.96]),
            ],
            materials: vec!["Material".to_string()],
            selected: vec!["Cube".to_string()],
            active: Some("Cube".to_string()),
            journal: Vec::new(),
        }
    }
}

impl SimScene {
    /// Create an empty scene with the given name.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            objects: Vec::new(),
            materials: Vec::new(),
            selected: Vec::new(),
            active: None,
            journal: Vec::new(),
        }
    }

    /// Executed-operation journal, oldest first.
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Number of objects currently in the scene.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn record(&mut self, entry: String) {
        self.journal.push(JournalEntry { at: Utc::now(), entry });
    }

    fn find(&self, name: &str) -> Option<&SimObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut SimObject> {
        self.objects.iter_mut().find(|o| o.name == name)
    }

    /// Pick a unique name: `base` if free, otherwise `base.001` etc.
    fn unique_name(&self, base: &str) -> String {
        if self.find(base).is_none() {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}.{n:03}");
            if self.find(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    fn add_object(&mut self, kind: ObjectKind, name: &str, location: [f64; 3]) -> String {
        let name = self.unique_name(name);
        self.objects.push(SimObject::new(&name, kind, location));
        self.record(format!("add {name}"));
        name
    }

    fn delete_object(&mut self, name: &str) -> Result<(), HandlerError> {
        let before = self.objects.len();
        self.objects.retain(|o| o.name != name);
        if self.objects.len() == before {
            return Err(HandlerError::new(format!("no object named '{name}'")));
        }
        self.selected.retain(|s| s != name);
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.record(format!("delete {name}"));
        Ok(())
    }

    fn rename_object(&mut self, old: &str, new: &str) -> Result<String, HandlerError> {
        if self.find(old).is_none() {
            return Err(HandlerError::new(format!("no object named '{old}'")));
        }
        let new = self.unique_name(new);
        for s in &mut self.selected {
            if s == old {
                new.clone_into(s);
            }
        }
        if self.active.as_deref() == Some(old) {
            self.active = Some(new.clone());
        }
        if let Some(obj) = self.find_mut(old) {
            obj.name.clone_from(&new);
        }
        self.record(format!("rename {old} -> {new}"));
        Ok(new)
    }

    /// Interpret one script line. Returns the output line.
    fn run_line(&mut self, line: &str) -> Result<Option<String>, HandlerError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&directive, args)) = tokens.split_first() else {
            return Ok(None); // blank line
        };
        if directive.starts_with('#') {
            return Ok(None);
        }

        match directive {
            "add" => {
                let (kind_str, name) = match args {
                    [k, n, ..] => (*k, *n),
                    _ => return Err(HandlerError::new("usage: add <kind> <name> [at x y z]")),
                };
                let kind = parse_kind(kind_str)?;
                let location = match args {
                    [_, _, "at", x, y, z] => parse_vec3(x, y, z)?,
                    [_, _] => [0.0; 3],
                    _ => return Err(HandlerError::new("usage: add <kind> <name> [at x y z]")),
                };
                let name = self.add_object(kind, name, location);
                Ok(Some(format!("added {name}")))
            }
            "move" => match args {
                [name, which @ ("to" | "by"), x, y, z] => {
                    let delta = parse_vec3(x, y, z)?;
                    let absolute = *which == "to";
                    let name = (*name).to_string();
                    let obj = self
                        .find_mut(&name)
                        .ok_or_else(|| HandlerError::new(format!("no object named '{name}'")))?;
                    if absolute {
                        obj.location = delta;
                    } else {
                        for axis in 0..3 {
                            obj.location[axis] += delta[axis];
                        }
                    }
                    let loc = obj.location;
                    self.record(format!("move {name}"));
                    Ok(Some(format!("moved {name} to ({}, {}, {})", loc[0], loc[1], loc[2])))
                }
                _ => Err(HandlerError::new("usage: move <name> to|by <x> <y> <z>")),
            },
            "scale" => match args {
                [name, x, y, z] => {
                    let scale = parse_vec3(x, y, z)?;
                    let name = (*name).to_string();
                    let obj = self
                        .find_mut(&name)
                        .ok_or_else(|| HandlerError::new(format!("no object named '{name}'")))?;
                    obj.scale = scale;
                    self.record(format!("scale {name}"));
                    Ok(Some(format!("scaled {name}")))
                }
                _ => Err(HandlerError::new("usage: scale <name> <x> <y> <z>")),
            },
            "delete" => match args {
                [name] => {
                    self.delete_object(name)?;
                    Ok(Some(format!("deleted {name}")))
                }
                _ => Err(HandlerError::new("usage: delete <name>")),
            },
            "rename" => match args {
                [old, new] => {
                    let actual = self.rename_object(old, new)?;
                    Ok(Some(format!("renamed {old} to {actual}")))
                }
                _ => Err(HandlerError::new("usage: rename <old> <new>")),
            },
            "material" => match args {
                [name, material] => {
                    let material = (*material).to_string();
                    if !self.materials.contains(&material) {
                        self.materials.push(material.clone());
                    }
                    let name = (*name).to_string();
                    let obj = self
                        .find_mut(&name)
                        .ok_or_else(|| HandlerError::new(format!("no object named '{name}'")))?;
                    if !obj.materials.contains(&material) {
                        obj.materials.push(material.clone());
                    }
                    self.record(format!("material {name}"));
                    Ok(Some(format!("assigned {material} to {name}")))
                }
                _ => Err(HandlerError::new("usage: material <object> <material>")),
            },
            "select" => match args {
                ["none"] => {
                    self.selected.clear();
                    self.active = None;
                    Ok(Some("selection cleared".to_string()))
                }
                [] => Err(HandlerError::new("usage: select none|<name...>")),
                names => {
                    let names: Vec<String> = names.iter().map(|n| (*n).to_string()).collect();
                    let selection =
                        self.set_selection(&names, SelectionMode::Replace, names.last().map(String::as_str))?;
                    Ok(Some(format!("selected {}", selection.selected.join(", "))))
                }
            },
            "hide" | "show" => match args {
                [name] => {
                    let visible = directive == "show";
                    let name = (*name).to_string();
                    let obj = self
                        .find_mut(&name)
                        .ok_or_else(|| HandlerError::new(format!("no object named '{name}'")))?;
                    obj.visible = visible;
                    Ok(Some(format!("{directive} {name}")))
                }
                _ => Err(HandlerError::new("usage: hide|show <name>")),
            },
            "list" => {
                let mut lines: Vec<String> = self
                    .objects
                    .iter()
                    .map(|o| {
                        format!(
                            "{} {:?} ({:.2}, {:.2}, {:.2})",
                            o.name, o.kind, o.location[0], o.location[1], o.location[2]
                        )
                    })
                    .collect();
                if lines.is_empty() {
                    lines.push("(empty scene)".to_string());
                }
                Ok(Some(lines.join("\n")))
            }
            other => Err(HandlerError::new(format!("unknown directive '{other}'"))),
        }
    }
}

fn parse_kind(token: &str) -> Result<ObjectKind, HandlerError> {
    match token.to_ascii_lowercase().as_str() {
        "mesh" | "cube" => Ok(ObjectKind::Mesh),
        "light" => Ok(ObjectKind::Light),
        "camera" => Ok(ObjectKind::Camera),
        "empty" => Ok(ObjectKind::Empty),
        other => Err(HandlerError::new(format!("unknown object kind '{other}'"))),
    }
}

fn parse_vec3(x: &str, y: &str, z: &str) -> Result<[f64; 3], HandlerError> {
    let parse = |t: &str| {
        t.parse::<f64>()
            .map_err(|_| HandlerError::new(format!("'{t}' is not a number")))
    };
    Ok([parse(x)?, parse(y)?, parse(z)?])
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl HostSession for SimScene {
    fn scene_info(&self, max_objects: usize) -> SceneInfo {
        SceneInfo {
            name: self.name.clone(),
            object_count: self.objects.len(),
            objects: self
                .objects
                .iter()
                .take(max_objects)
                .map(|o| ObjectSummary {
                    name: o.name.clone(),
                    kind: o.kind,
                    location: [round2(o.location[0]), round2(o.location[1]), round2(o.location[2])],
                })
                .collect(),
            materials_count: self.materials.len(),
        }
    }

    fn object_info(&self, name: &str) -> Option<ObjectInfo> {
        self.find(name).map(|o| {
            // Rotation is ignored for the box: each object occupies a
            // unit half-extent scaled per axis, centered on location.
            let half = [o.scale[0], o.scale[1], o.scale[2]];
            let min = [o.location[0] - half[0], o.location[1] - half[1], o.location[2] - half[2]];
            let max = [o.location[0] + half[0], o.location[1] + half[1], o.location[2] + half[2]];
            ObjectInfo {
                name: o.name.clone(),
                kind: o.kind,
                location: o.location,
                rotation: o.rotation,
                scale: o.scale,
                visible: o.visible,
                materials: o.materials.clone(),
                world_bounding_box: [min, max],
            }
        })
    }

    fn selection(&self) -> Selection {
        Selection { selected: self.selected.clone(), active: self.active.clone() }
    }

    fn set_selection(
        &mut self,
        names: &[String],
        mode: SelectionMode,
        active: Option<&str>,
    ) -> Result<Selection, HandlerError> {
        // Validate everything before mutating anything.
        for name in names {
            if self.find(name).is_none() {
                return Err(HandlerError::new(format!("no object named '{name}'")));
            }
        }
        if let Some(active) = active {
            if self.find(active).is_none() {
                return Err(HandlerError::new(format!("no object named '{active}'")));
            }
        }

        match mode {
            SelectionMode::Replace => {
                self.selected = names.to_vec();
            }
            SelectionMode::Add => {
                for name in names {
                    if !self.selected.contains(name) {
                        self.selected.push(name.clone());
                    }
                }
            }
            SelectionMode::Remove => {
                self.selected.retain(|s| !names.contains(s));
            }
        }

        if let Some(active) = active {
            self.active = Some(active.to_string());
        } else if self.active.as_deref().is_some_and(|a| !self.selected.iter().any(|s| s == a)) {
            self.active = self.selected.last().cloned();
        }

        Ok(self.selection())
    }

    fn batch_rename(&mut self, names: &[String], base: &str) -> Result<Vec<String>, HandlerError> {
        if base.is_empty() {
            return Err(HandlerError::new("new base name must not be empty"));
        }
        for name in names {
            if self.find(name).is_none() {
                return Err(HandlerError::new(format!("no object named '{name}'")));
            }
        }
        let mut renamed = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let target = format!("{base}.{:03}", i + 1);
            renamed.push(self.rename_object(name, &target)?);
        }
        Ok(renamed)
    }

    fn run_script(&mut self, code: &str) -> Result<String, HandlerError> {
        let mut output = Vec::new();
        for (idx, line) in code.lines().enumerate() {
            match self.run_line(line) {
                Ok(Some(text)) => output.push(text),
                Ok(None) => {}
                Err(err) => {
                    return Err(HandlerError::new(format!("line {}: {}", idx + 1, err.message)));
                }
            }
        }
        self.record("run_script".to_string());
        Ok(output.join("\n"))
    }

    fn capture_view(&self, max_size: u32) -> Result<ViewCapture, HandlerError> {
        if max_size == 0 {
            return Err(HandlerError::new("max_size must be positive"));
        }
        let longest = VIEWPORT_WIDTH.max(VIEWPORT_HEIGHT);
        let scale = if max_size >= longest { 1.0 } else { f64::from(max_size) / f64::from(longest) };
        let (width, height) = (
            (f64::from(VIEWPORT_WIDTH) * scale).round() as u32,
            (f64::from(VIEWPORT_HEIGHT) * scale).round() as u32,
        );
        Ok(ViewCapture {
            width,
            height,
            format: "png".to_string(),
            // Fixed placeholder image; the simulator has no renderer.
            data: PLACEHOLDER_PNG.to_vec(),
        })
    }

    fn import_asset(&mut self, asset_id: &str, kind: ObjectKind) -> Result<String, HandlerError> {
        if asset_id.is_empty() {
            return Err(HandlerError::new("asset id must not be empty"));
        }
        let base: String = asset_id
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        Ok(self.add_object(kind, &base, [0.0; 3]))
    }
}
