//! Validation System - Rule/Policy Separation
//!
//! Rules check a layout against the template it will be drawn on and
//! produce structured violations. Policy maps violations to actions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::layout::{FailureMode, Layout};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub layout_id: String,
    pub layout_version: String,
}

impl ValidationResult {
    pub fn success(layout: &Layout, violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: true,
            violations,
            layout_id: layout.id.clone(),
            layout_version: layout.layout_version.clone(),
        }
    }

    pub fn failure(layout: &Layout, violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: false,
            violations,
            layout_id: layout.id.clone(),
            layout_version: layout.layout_version.clone(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }
}

/// What a layout is checked against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderTarget {
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, target: &RenderTarget, layout: &Layout) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct AnchorBoundsRule;

impl ValidationRule for AnchorBoundsRule {
    fn name(&self) -> &'static str { "anchor_bounds" }

    fn validate(&self, target: &RenderTarget, layout: &Layout) -> Vec<ValidationViolation> {
        if !layout.validation.rules.anchor_bounds.enabled {
            return vec![];
        }

        layout
            .fields
            .iter()
            .filter(|slot| {
                let b = &slot.bounds;
                b.x < 0 || b.y < 0 || b.x as i64 >= target.width as i64 || b.y as i64 >= target.height as i64
            })
            .map(|slot| ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Error,
                field: Some(slot.name.clone()),
                message: "Field anchor lies outside the template".to_string(),
                expected: Some(format!("within {}x{}", target.width, target.height)),
                actual: Some(format!("({}, {})", slot.bounds.x, slot.bounds.y)),
                remediation: vec![
                    "Check the layout was measured on a template of the same resolution".to_string(),
                ],
            })
            .collect()
    }
}

pub struct BoxOverflowRule;

impl ValidationRule for BoxOverflowRule {
    fn name(&self) -> &'static str { "box_overflow" }

    fn validate(&self, target: &RenderTarget, layout: &Layout) -> Vec<ValidationViolation> {
        if !layout.validation.rules.box_overflow.enabled {
            return vec![];
        }

        let mut violations = vec![];
        for slot in layout.fields.iter() {
            let right = slot.bounds.x as i64 + slot.bounds.max_width as i64;
            if right > target.width as i64 {
                violations.push(ValidationViolation {
                    rule: self.name().to_string(),
                    severity: ViolationSeverity::Warning,
                    field: Some(slot.name.clone()),
                    message: "Field box extends past the right edge".to_string(),
                    expected: Some(format!("right edge <= {}", target.width)),
                    actual: Some(right.to_string()),
                    remediation: vec!["Narrow the box or move it left".to_string()],
                });
            }
        }
        violations
    }
}

pub struct ZeroWidthRule;

impl ValidationRule for ZeroWidthRule {
    fn name(&self) -> &'static str { "zero_width" }

    fn validate(&self, _target: &RenderTarget, layout: &Layout) -> Vec<ValidationViolation> {
        layout
            .fields
            .iter()
            .filter(|slot| slot.bounds.max_width == 0)
            .map(|slot| ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Info,
                field: Some(slot.name.clone()),
                message: "Zero-width box places every word on its own line".to_string(),
                expected: None,
                actual: Some("maxWidth = 0".to_string()),
                remediation: vec![],
            })
            .collect()
    }
}

pub struct FontSizeRule;

impl ValidationRule for FontSizeRule {
    fn name(&self) -> &'static str { "font_size" }

    fn validate(&self, target: &RenderTarget, layout: &Layout) -> Vec<ValidationViolation> {
        let rule = &layout.validation.rules.font_size;
        if !rule.enabled {
            return vec![];
        }

        if target.font_size < rule.min || target.font_size > rule.max {
            return vec![ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                field: None,
                message: "Font size outside the recommended range".to_string(),
                expected: Some(format!("{}..={}", rule.min, rule.max)),
                actual: Some(target.font_size.to_string()),
                remediation: vec!["Pick a size that fits the template's printed lines".to_string()],
            }];
        }
        vec![]
    }
}

pub struct DuplicateFieldRule;

impl ValidationRule for DuplicateFieldRule {
    fn name(&self) -> &'static str { "duplicate_field" }

    fn validate(&self, _target: &RenderTarget, layout: &Layout) -> Vec<ValidationViolation> {
        let mut seen = HashSet::new();
        let mut violations = vec![];
        for name in layout.fields.names() {
            if !seen.insert(name) {
                violations.push(ValidationViolation {
                    rule: self.name().to_string(),
                    severity: ViolationSeverity::Error,
                    field: Some(name.to_string()),
                    message: "Field declared more than once".to_string(),
                    expected: Some("unique field names".to_string()),
                    actual: Some(name.to_string()),
                    remediation: vec!["Remove or rename the duplicate entry".to_string()],
                });
            }
        }
        violations
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(AnchorBoundsRule),
                Box::new(BoxOverflowRule),
                Box::new(ZeroWidthRule),
                Box::new(FontSizeRule),
                Box::new(DuplicateFieldRule),
            ],
        }
    }

    pub fn validate(&self, target: &RenderTarget, layout: &Layout) -> ValidationResult {
        let mut all_violations = vec![];

        for rule in &self.rules {
            all_violations.extend(rule.validate(target, layout));
        }

        let has_errors = all_violations.iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        match layout.validation.failure_mode {
            FailureMode::Block if has_errors => {
                ValidationResult::failure(layout, all_violations)
            }
            FailureMode::Block | FailureMode::Warn => {
                ValidationResult::success(layout, all_violations)
            }
            FailureMode::Log => {
                for v in &all_violations {
                    tracing::info!(rule = %v.rule, field = ?v.field, "{}", v.message);
                }
                ValidationResult::success(layout, all_violations)
            }
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
