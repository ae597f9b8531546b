//! Layout System - Field Maps as Contracts
//!
//! A layout pins every field to a fixed box on the template. Boxes are
//! declared, never measured from template content.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub type LayoutId = String;

/// Top-left anchor plus the horizontal span used for centering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutBox {
    pub x: i32,
    pub y: i32,
    pub max_width: u32,
}

impl LayoutBox {
    pub const fn new(x: i32, y: i32, max_width: u32) -> Self {
        Self { x, y, max_width }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSlot {
    pub name: String,
    #[serde(flatten)]
    pub bounds: LayoutBox,
}

/// Ordered field name -> box mapping. Declaration order is draw order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    slots: Vec<FieldSlot>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self { slots: vec![] }
    }

    /// Append a field, or move an existing field's box in place.
    pub fn insert(&mut self, name: impl Into<String>, bounds: LayoutBox) {
        let name = name.into();
        match self.slots.iter_mut().find(|s| s.name == name) {
            Some(slot) => slot.bounds = bounds,
            None => self.slots.push(FieldSlot { name, bounds }),
        }
    }

    pub fn with(mut self, name: impl Into<String>, bounds: LayoutBox) -> Self {
        self.insert(name, bounds);
        self
    }

    pub fn get(&self, name: &str) -> Option<&LayoutBox> {
        self.slots.iter().find(|s| s.name == name).map(|s| &s.bounds)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSlot> {
        self.slots.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, LayoutBox)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (S, LayoutBox)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (name, bounds) in iter {
            map.insert(name, bounds);
        }
        map
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub id: LayoutId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub layout_version: String,
    pub engine_min_version: String,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub superseded_by: Option<String>,
    #[serde(default = "default_display_field")]
    pub display_field: String,
    #[serde(default = "default_fallback_name")]
    pub fallback_name: String,
    #[serde(default = "default_font_size")]
    pub default_font_size: u32,
    #[serde(default)]
    pub validation: ValidationConfig,
    pub fields: FieldMap,
}

fn default_true() -> bool { true }
fn default_display_field() -> String { "Name".to_string() }
fn default_fallback_name() -> String { "certificate".to_string() }
fn default_font_size() -> u32 { 60 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default)]
    pub failure_mode: FailureMode,
    #[serde(default)]
    pub rules: ValidationRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    Block,
    #[default]
    Warn,
    Log,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default)]
    pub anchor_bounds: RuleToggle,
    #[serde(default)]
    pub box_overflow: RuleToggle,
    #[serde(default)]
    pub font_size: FontSizeRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RuleToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontSizeRule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_font")]
    pub min: u32,
    #[serde(default = "default_max_font")]
    pub max: u32,
}

fn default_min_font() -> u32 { 30 }
fn default_max_font() -> u32 { 100 }

impl Default for FontSizeRule {
    fn default() -> Self {
        Self {
            enabled: true,
            min: default_min_font(),
            max: default_max_font(),
        }
    }
}

/// The school leaving certificate table, in draw order.
const SCHOOL_LEAVING_FIELDS: &[(&str, LayoutBox)] = &[
    ("SR. No.", LayoutBox::new(200, 500, 200)),
    ("Std", LayoutBox::new(1000, 1455, 100)),
    ("Div", LayoutBox::new(1030, 1455, 110)),
    ("GR.No.", LayoutBox::new(1450, 500, 100)),
    ("Student ID", LayoutBox::new(350, 590, 200)),
    ("UID No.", LayoutBox::new(450, 675, 250)),
    ("Name", LayoutBox::new(460, 755, 400)),
    ("Fathers Name", LayoutBox::new(1030, 745, 400)),
    ("Surname", LayoutBox::new(470, 825, 400)),
    ("Mothers Name", LayoutBox::new(1030, 825, 500)),
    ("Nationality", LayoutBox::new(320, 900, 200)),
    ("Mother Tongue", LayoutBox::new(970, 900, 600)),
    ("Religion", LayoutBox::new(320, 980, 200)),
    ("Caste", LayoutBox::new(700, 985, 200)),
    ("Sub Caste", LayoutBox::new(1300, 980, 200)),
    ("Birth Place", LayoutBox::new(600, 1060, 200)),
    ("Tal", LayoutBox::new(950, 1060, 200)),
    ("Dist", LayoutBox::new(1320, 1060, 200)),
    ("State", LayoutBox::new(500, 1140, 200)),
    ("Country", LayoutBox::new(1100, 1140, 200)),
    ("Birth Date", LayoutBox::new(700, 1215, 250)),
    ("In Words", LayoutBox::new(300, 1295, 500)),
    ("Previous School Attended", LayoutBox::new(470, 1375, 600)),
    ("Date of Admission", LayoutBox::new(510, 1450, 200)),
    ("Progress", LayoutBox::new(330, 1530, 200)),
    ("Conduct", LayoutBox::new(1100, 1530, 200)),
    ("Date of Leaving School", LayoutBox::new(470, 1610, 300)),
    ("Last Class Attended", LayoutBox::new(950, 1610, 300)),
    ("From", LayoutBox::new(1300, 1610, 200)),
    ("Reason of Leaving the School", LayoutBox::new(550, 1685, 500)),
    ("Remark", LayoutBox::new(310, 1765, 300)),
];

/// Layouts compiled into the engine.
pub fn builtin_layouts() -> Vec<Layout> {
    vec![Layout {
        id: "school-leaving".to_string(),
        name: "School Leaving Certificate".to_string(),
        description: "A4 leaving certificate rasterized at 200 dpi".to_string(),
        layout_version: "1.0.0".to_string(),
        engine_min_version: crate::MIN_LAYOUT_VERSION.to_string(),
        deprecated: false,
        superseded_by: None,
        display_field: default_display_field(),
        fallback_name: default_fallback_name(),
        default_font_size: default_font_size(),
        validation: ValidationConfig::default(),
        fields: SCHOOL_LEAVING_FIELDS.iter().map(|(n, b)| (*n, *b)).collect(),
    }]
}

/// Layout registry - loads and caches layouts
pub struct LayoutRegistry {
    layouts: HashMap<LayoutId, Layout>,
}

impl LayoutRegistry {
    pub fn new() -> Self {
        Self { layouts: HashMap::new() }
    }

    /// Registry pre-populated with the built-in layouts.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for layout in builtin_layouts() {
            registry.register(layout);
        }
        registry
    }

    /// Built-ins plus every `*.json` layout in `dir`. Files that fail to
    /// parse are skipped; a file may override a built-in by id.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::with_builtins();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    let content = fs::read_to_string(&path)?;
                    match serde_json::from_str::<Layout>(&content) {
                        Ok(layout) => {
                            tracing::debug!(id = %layout.id, path = %path.display(), "loaded layout");
                            registry.register(layout);
                        }
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping unparseable layout");
                        }
                    }
                }
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&Layout> {
        self.layouts.get(id)
    }

    /// All layouts, sorted by id.
    pub fn list(&self) -> Vec<&Layout> {
        let mut layouts: Vec<_> = self.layouts.values().collect();
        layouts.sort_by(|a, b| a.id.cmp(&b.id));
        layouts
    }

    pub fn register(&mut self, layout: Layout) {
        self.layouts.insert(layout.id.clone(), layout);
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
