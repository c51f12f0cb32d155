//! Template rendering against a runtime data context.
//!
//! Templates are plain text with `{{ … }}` placeholders in the workflow
//! tool's expression syntax. The pipeline is deliberately layered: a lexer
//! and a small recursive-descent parser build an expression tree, and a
//! single tree-walking evaluator resolves it against the render context.
//! Rendering is a pure function of `(template, context)` and never fails.

pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use eval::evaluate;

use serde_json::{Map, Value};

/// The three variable scopes available to placeholder expressions.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Flat caller-supplied variables, used only as a last-resort lookup.
    pub vars: Map<String, Value>,
    /// The primary data scope (`$json`).
    pub json: Map<String, Value>,
    /// Per-upstream-node output scopes (`$('Node Name')`).
    pub nodes: Map<String, Value>,
}

impl RenderContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compatibility shape: a flat variable mapping with empty `json` and
    /// `nodes` scopes.
    pub fn from_vars(vars: Map<String, Value>) -> Self {
        Self {
            vars,
            ..Self::default()
        }
    }

    /// Set the flat variable scope.
    pub fn with_vars(mut self, vars: Map<String, Value>) -> Self {
        self.vars = vars;
        self
    }

    /// Set the primary `$json` scope.
    pub fn with_json(mut self, json: Map<String, Value>) -> Self {
        self.json = json;
        self
    }

    /// Set the per-node scopes.
    pub fn with_nodes(mut self, nodes: Map<String, Value>) -> Self {
        self.nodes = nodes;
        self
    }
}

/// Render a template, substituting every `{{ … }}` span with its
/// evaluated text. Placeholders do not nest; an unterminated `{{` passes
/// through unchanged, as does every character outside a placeholder.
pub fn render(template: &str, ctx: &RenderContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                out.push_str(&evaluate(&after[..end], ctx));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn json_ctx(value: Value) -> RenderContext {
        RenderContext::new().with_json(value.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_render_without_placeholders_is_identity() {
        let ctx = json_ctx(json!({"x": 1}));
        let template = "no placeholders\nat all { } {{";
        assert_eq!(render(template, &ctx), template);
    }

    #[test]
    fn test_render_substitutes_placeholder() {
        let ctx = json_ctx(json!({"Keywords": "seo tools"}));
        assert_eq!(render("{{ $json.Keywords }}", &ctx), "seo tools");
        assert_eq!(
            render("Keyword: {{ $json.Keywords }}\nDone.", &ctx),
            "Keyword: seo tools\nDone."
        );
    }

    #[test]
    fn test_render_multiple_placeholders() {
        let ctx = json_ctx(json!({"a": "1", "b": "2"}));
        assert_eq!(render("{{ $json.a }}+{{ $json.b }}", &ctx), "1+2");
    }

    #[test]
    fn test_render_unknown_expression_renders_empty() {
        let ctx = json_ctx(json!({}));
        assert_eq!(render("x{{ not supported! }}y", &ctx), "xy");
    }

    #[test]
    fn test_render_flat_vars_shape() {
        let ctx = RenderContext::from_vars(
            json!({"topic": "rust"}).as_object().cloned().unwrap(),
        );
        assert_eq!(render("Topic: {{ topic }}", &ctx), "Topic: rust");
        // $json is empty in the flat shape.
        assert_eq!(render("{{ $json.topic || 'none' }}", &ctx), "none");
    }

    #[test]
    fn test_render_preserves_surrounding_newlines() {
        let ctx = json_ctx(json!({"v": "x"}));
        assert_eq!(render("a\n\n{{ $json.v }}\n\nb", &ctx), "a\n\nx\n\nb");
    }
}
