//! The prompt template registry and key resolution.
//!
//! The registry is an immutable key → entry mapping built once at startup
//! and passed by reference into everything that reads it. Keys are stable
//! across workflow re-imports: the canonical form is
//! `"<workflow>::<nodeName>"`, with arbitrary custom keys allowed for
//! hand-maintained entries.
//!
//! Entries come from two embedded sources: `data/templates.json`, written
//! by the offline extraction binary from workflow export files, and
//! `data/curated.json`, hand-maintained overrides that win on key
//! collisions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;

/// Extracted output generated offline from workflow export files.
const GENERATED: &str = include_str!("data/templates.json");

/// Hand-maintained entries; merged last, so they override generated ones.
const CURATED: &str = include_str!("data/curated.json");

/// One stored prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    /// Prompt text with `{{ … }}` placeholders.
    pub template: String,
    /// Model the workflow runs this prompt against, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Allowance for typical retry/loop overhead; callers can override.
    #[serde(default = "default_multiplier")]
    pub default_multiplier: f64,
    /// Structured-output instructions attached to this prompt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_parser: Option<OutputParserSpec>,
}

fn default_multiplier() -> f64 {
    1.0
}

/// Structured-output parser configuration carried by a template entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputParserSpec {
    /// Parser flavor; only the structured v1 kind is actionable.
    #[serde(rename = "type")]
    pub kind: OutputParserKind,
    /// JSON-Schema-shaped object describing the expected output.
    pub schema: Value,
}

/// Known output parser kinds. Unknown tags deserialize to [`Unknown`]
/// rather than failing, and the appender treats them as a no-op.
///
/// [`Unknown`]: OutputParserKind::Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputParserKind {
    #[serde(rename = "langchain_structured_v1")]
    LangchainStructuredV1,
    #[serde(other)]
    Unknown,
}

/// Result of a key resolution attempt.
///
/// `resolved_key` is populated with a best-effort label (the composite
/// key, if derivable) even on a miss, for diagnostics.
#[derive(Debug)]
pub struct Resolution<'a> {
    pub resolved_key: Option<String>,
    pub entry: Option<&'a TemplateEntry>,
}

/// Immutable mapping from lookup key to template entry.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    entries: HashMap<String, TemplateEntry>,
}

impl TemplateRegistry {
    /// Build the registry from the embedded generated and curated data.
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut entries: HashMap<String, TemplateEntry> = serde_json::from_str(GENERATED)?;
        let curated: HashMap<String, TemplateEntry> = serde_json::from_str(CURATED)?;
        entries.extend(curated);
        Ok(Self { entries })
    }

    /// Build a registry from explicit entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, TemplateEntry)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Number of stored templates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted, for diagnostics.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Exact-key lookup.
    pub fn get(&self, key: &str) -> Option<&TemplateEntry> {
        self.entries.get(key)
    }

    /// Resolve a caller-supplied `(key, workflow, nodeName)` triple to a
    /// single entry. Lookup order, first hit wins:
    ///
    /// 1. exact `key`;
    /// 2. exact `"workflow::nodeName"`;
    /// 3. exact `nodeName`;
    /// 4. unique `"::nodeName"` suffix across all keys.
    ///
    /// If several workflows share the node name in step 4 (common for
    /// generic names like "Basic LLM Chain") the resolution is a miss:
    /// ambiguity never produces a guess.
    pub fn resolve(
        &self,
        key: Option<&str>,
        workflow: Option<&str>,
        node_name: Option<&str>,
    ) -> Resolution<'_> {
        let key = key.filter(|s| !s.is_empty());
        let workflow = workflow.filter(|s| !s.is_empty());
        let node_name = node_name.filter(|s| !s.is_empty());

        if let Some(k) = key {
            if let Some(entry) = self.entries.get(k) {
                return Resolution {
                    resolved_key: Some(k.to_string()),
                    entry: Some(entry),
                };
            }
        }

        if let (Some(workflow), Some(node)) = (workflow, node_name) {
            let composite = format!("{workflow}::{node}");
            if let Some(entry) = self.entries.get(&composite) {
                return Resolution {
                    resolved_key: Some(composite),
                    entry: Some(entry),
                };
            }
        }

        if let Some(node) = node_name {
            if let Some(entry) = self.entries.get(node) {
                return Resolution {
                    resolved_key: Some(node.to_string()),
                    entry: Some(entry),
                };
            }

            let suffix = format!("::{node}");
            let mut candidates = self.entries.keys().filter(|k| k.ends_with(&suffix));
            if let (Some(only), None) = (candidates.next(), candidates.next()) {
                return Resolution {
                    resolved_key: Some(only.clone()),
                    entry: self.entries.get(only),
                };
            }
        }

        Resolution {
            resolved_key: key.map(str::to_string).or_else(|| {
                match (workflow, node_name) {
                    (Some(workflow), Some(node)) => Some(format!("{workflow}::{node}")),
                    _ => None,
                }
            }),
            entry: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(template: &str) -> TemplateEntry {
        TemplateEntry {
            template: template.to_string(),
            model: None,
            default_multiplier: 1.0,
            output_parser: None,
        }
    }

    fn sample_registry() -> TemplateRegistry {
        TemplateRegistry::from_entries([
            ("WF1::Foo".to_string(), entry("one")),
            ("WF2::Foo".to_string(), entry("two")),
            ("WF1::Unique Node".to_string(), entry("unique")),
            ("custom-key".to_string(), entry("custom")),
        ])
    }

    #[test]
    fn test_exact_key_wins_over_everything() {
        let registry = sample_registry();
        let resolution = registry.resolve(Some("custom-key"), Some("WF1"), Some("Foo"));
        assert_eq!(resolution.resolved_key.as_deref(), Some("custom-key"));
        assert_eq!(resolution.entry.unwrap().template, "custom");
    }

    #[test]
    fn test_composite_key_lookup() {
        let registry = sample_registry();
        let resolution = registry.resolve(None, Some("WF2"), Some("Foo"));
        assert_eq!(resolution.resolved_key.as_deref(), Some("WF2::Foo"));
        assert_eq!(resolution.entry.unwrap().template, "two");
    }

    #[test]
    fn test_unique_suffix_match() {
        let registry = sample_registry();
        let resolution = registry.resolve(None, None, Some("Unique Node"));
        assert_eq!(resolution.resolved_key.as_deref(), Some("WF1::Unique Node"));
        assert_eq!(resolution.entry.unwrap().template, "unique");
    }

    #[test]
    fn test_ambiguous_suffix_is_a_miss() {
        let registry = sample_registry();
        let resolution = registry.resolve(None, None, Some("Foo"));
        assert!(resolution.entry.is_none());
        assert!(resolution.resolved_key.is_none());
    }

    #[test]
    fn test_miss_keeps_diagnostic_label() {
        let registry = sample_registry();
        let resolution = registry.resolve(None, Some("WF9"), Some("Nope"));
        assert!(resolution.entry.is_none());
        assert_eq!(resolution.resolved_key.as_deref(), Some("WF9::Nope"));

        let resolution = registry.resolve(Some("ghost"), Some("WF9"), Some("Nope"));
        assert!(resolution.entry.is_none());
        assert_eq!(resolution.resolved_key.as_deref(), Some("ghost"));
    }

    #[test]
    fn test_empty_strings_are_treated_as_absent() {
        let registry = sample_registry();
        let resolution = registry.resolve(Some(""), Some(""), Some("Unique Node"));
        assert_eq!(resolution.entry.unwrap().template, "unique");
    }

    #[test]
    fn test_builtin_data_loads_and_curated_overrides() {
        let registry = TemplateRegistry::builtin().unwrap();
        assert!(!registry.is_empty());

        // The curated entry overrides the generated one and pins a model.
        let entry = registry
            .get("Phase 1: Workflow Setup & Initialization::Generate Type Suggestions")
            .unwrap();
        assert_eq!(entry.model.as_deref(), Some("gpt-5"));

        // The ambiguous generic node name resolves to nothing.
        let resolution = registry.resolve(None, None, Some("Basic LLM Chain"));
        assert!(resolution.entry.is_none());

        // A structured output parser survives the round trip.
        let brief = registry
            .get("Phase 3: Content Brief Generation — NLP-enhanced::Generate Content Brief")
            .unwrap();
        let parser = brief.output_parser.as_ref().unwrap();
        assert_eq!(parser.kind, OutputParserKind::LangchainStructuredV1);
        assert!(parser.schema.is_object());
    }

    #[test]
    fn test_unknown_parser_kind_degrades() {
        let json = r#"{"template": "t", "outputParser": {"type": "mystery_v9", "schema": {}}}"#;
        let entry: TemplateEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.output_parser.unwrap().kind, OutputParserKind::Unknown);
        assert_eq!(entry.default_multiplier, 1.0);
    }
}
