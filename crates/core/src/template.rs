//! Template-based synthesis of system utterances from dialogue acts.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::window::{Action, Turn};
use crate::{Error, Renderer, Result};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap());

/// Key that marks a template as the fallback for acts without one.
pub const DEFAULT_TEMPLATE_KEY: &str = "default";

/// Immutable mapping from dialogue-act keys to template strings.
///
/// Loaded once at startup and shared read-only for the process lifetime.
/// An entry under the `default` key (any case) becomes the explicit
/// fallback for acts with no template of their own.
#[derive(Debug, Clone, Default)]
pub struct TemplateTable {
    templates: HashMap<String, String>,
    default: Option<String>,
}

impl TemplateTable {
    pub fn new(entries: HashMap<String, String>) -> Self {
        let mut templates = HashMap::new();
        let mut default = None;
        for (key, value) in entries {
            if key.eq_ignore_ascii_case(DEFAULT_TEMPLATE_KEY) {
                default = Some(value);
            } else {
                templates.insert(key, value);
            }
        }
        Self { templates, default }
    }

    /// Load templates from a JSON object file, or merge every `.json`
    /// file in a directory (sorted by name, later files win).
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = HashMap::new();
        if path.is_dir() {
            let mut files: Vec<_> = fs::read_dir(path)
                .map_err(|e| Error::io(path, e))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
                .collect();
            files.sort();
            for file in files {
                entries.extend(Self::load_file(&file)?);
            }
        } else {
            entries = Self::load_file(path)?;
        }
        Ok(Self::new(entries))
    }

    fn load_file(path: &Path) -> Result<HashMap<String, String>> {
        let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| Error::MalformedTemplates {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Look up the template for an act, falling back to the default entry.
    pub fn get(&self, act: &str) -> Option<&str> {
        self.templates
            .get(act)
            .or(self.default.as_ref())
            .map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.default.is_none()
    }
}

/// Fill `{name}` placeholders from an action. `{slot}`, `{value}` and
/// `{values}` resolve by name; `{0}`, `{1}`, ... index the value list
/// positionally. Unresolved placeholders become empty strings.
fn fill_template(template: &str, action: &Action) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| match &caps[1] {
            "slot" => action.slot.clone(),
            "value" => action.values.first().cloned().unwrap_or_default(),
            "values" => action.values.join(", "),
            key => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| action.values.get(idx).cloned())
                .unwrap_or_default(),
        })
        .into_owned()
}

/// Renders a system turn by filling one template per dialogue act and
/// joining the non-empty results with spaces.
///
/// Missing templates and unresolved slot data degrade to empty or partial
/// strings rather than failing; the window builder filters the empties out.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    table: TemplateTable,
}

impl TemplateRenderer {
    pub fn new(table: TemplateTable) -> Self {
        Self { table }
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, turn: &Turn) -> String {
        let mut parts: Vec<String> = Vec::new();
        for frame in &turn.frames {
            for action in &frame.actions {
                let Some(template) = self.table.get(&action.act) else {
                    continue;
                };
                let filled = fill_template(template, action);
                let filled = filled.trim();
                if !filled.is_empty() {
                    parts.push(filled.to_string());
                }
            }
        }
        parts.join(" ")
    }
}
