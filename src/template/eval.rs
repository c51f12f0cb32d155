//! Tree-walking evaluation of placeholder expressions.
//!
//! One function walks the parsed tree against the render context; a small
//! fallback ladder catches expressions the grammar rejects. Every path out
//! of this module produces a string: malformed input renders as empty,
//! never as an error.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::template::RenderContext;
use crate::template::lexer::lex;
use crate::template::parser::{Expr, parse};
use crate::template::value::{split_path, stringify, traverse};

/// Safety net for expressions that carry a `$json.<var>` reference in an
/// otherwise unsupported shape.
static JSON_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$json\.([A-Za-z_][A-Za-z0-9_]*)").expect("static pattern"));

/// Evaluate the inner text of one `{{ … }}` placeholder to its
/// replacement string.
pub fn evaluate(raw: &str, ctx: &RenderContext) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match lex(trimmed).and_then(|tokens| parse(&tokens)) {
        Some(expr) => stringify(eval_expr(&expr, ctx).as_ref()),
        None => fallback(trimmed, ctx),
    }
}

fn eval_expr(expr: &Expr, ctx: &RenderContext) -> Option<Value> {
    match expr {
        Expr::Literal(s) => Some(Value::String(s.clone())),
        Expr::JsonRoot => Some(Value::Object(ctx.json.clone())),
        Expr::JsonPath(segments) => lookup_scope(&ctx.json, segments),
        Expr::NodeRef { node, path } => {
            let node_json = ctx.nodes.get(node)?;
            if path.is_empty() {
                Some(node_json.clone())
            } else {
                traverse(node_json, path).cloned()
            }
        }
        Expr::Var(name) => ctx
            .vars
            .get(name)
            .or_else(|| ctx.json.get(name))
            .cloned(),
        Expr::Join {
            base,
            map_field,
            delimiter,
        } => Some(Value::String(eval_join(base, map_field.as_deref(), delimiter, ctx))),
        Expr::Trim(inner) => {
            let text = stringify(eval_expr(inner, ctx).as_ref());
            Some(Value::String(text.trim().to_string()))
        }
        Expr::ToJsonString(inner) => {
            let text = stringify(eval_expr(inner, ctx).as_ref());
            Some(Value::String(text))
        }
        Expr::FirstNonEmpty(operands) => {
            for operand in operands {
                let value = eval_expr(operand, ctx);
                if !stringify(value.as_ref()).is_empty() {
                    return value;
                }
            }
            None
        }
    }
}

/// Resolve a path whose first segment names a key in a scope map.
fn lookup_scope(scope: &serde_json::Map<String, Value>, segments: &[String]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    let base = scope.get(first)?;
    traverse(base, rest).cloned()
}

/// `.map(item => item.<field>).join('<delim>')` over an array base.
/// A base that is not an array joins to the empty string; elements that
/// stringify empty are dropped.
fn eval_join(
    base: &[String],
    map_field: Option<&str>,
    delimiter: &str,
    ctx: &RenderContext,
) -> String {
    let Some(Value::Array(items)) = lookup_scope(&ctx.json, base) else {
        return String::new();
    };

    let parts: Vec<String> = items
        .iter()
        .map(|item| match map_field {
            Some(field) => match item {
                Value::Object(map) => stringify(map.get(field)),
                _ => String::new(),
            },
            None => stringify(Some(item)),
        })
        .filter(|part| !part.is_empty())
        .collect();

    parts.join(&unescape_delimiter(delimiter))
}

/// Join delimiters may spell newline, tab, and carriage return as the
/// two-character escapes they are in the workflow export text.
fn unescape_delimiter(delimiter: &str) -> String {
    delimiter
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
}

/// Conservative ladder for expressions outside the grammar, mirroring the
/// shapes the template corpus is known to contain:
///
/// 1. alternation operands are retried individually;
/// 2. a `$json.`-prefixed expression gets a best-effort path traversal
///    with the remainder taken verbatim as segments;
/// 3. a stray `$json.<var>` reference anywhere in the text is treated as
///    a variable lookup (`vars` first, then `json`);
/// 4. everything else renders empty.
fn fallback(raw: &str, ctx: &RenderContext) -> String {
    if raw.contains("||") {
        return raw
            .split("||")
            .map(|part| evaluate(part, ctx))
            .find(|rendered| !rendered.is_empty())
            .unwrap_or_default();
    }

    if let Some(path) = raw.strip_prefix("$json.") {
        let segments = split_path(path);
        return stringify(lookup_scope_ref(&ctx.json, &segments));
    }

    if let Some(captures) = JSON_VAR.captures(raw) {
        let name = &captures[1];
        return stringify(ctx.vars.get(name).or_else(|| ctx.json.get(name)));
    }

    String::new()
}

fn lookup_scope_ref<'a>(
    scope: &'a serde_json::Map<String, Value>,
    segments: &[String],
) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    traverse(scope.get(first)?, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_json(json: Value) -> RenderContext {
        RenderContext::new().with_json(match json {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        })
    }

    #[test]
    fn test_simple_path() {
        let ctx = ctx_json(json!({"Keywords": "seo tools"}));
        assert_eq!(evaluate("$json.Keywords", &ctx), "seo tools");
    }

    #[test]
    fn test_json_root_serializes_whole_scope() {
        let ctx = ctx_json(json!({"a": 1}));
        assert_eq!(evaluate("$json", &ctx), r#"{"a":1}"#);
    }

    #[test]
    fn test_nested_object_renders_compact_json() {
        let ctx = ctx_json(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(evaluate("$json.a.b", &ctx), r#"{"c":1}"#);
    }

    #[test]
    fn test_map_join() {
        let ctx = ctx_json(json!({"data": [{"title": "a"}, {"title": "b"}]}));
        assert_eq!(
            evaluate("$json.data.map(item => item.title).join(', ')", &ctx),
            "a, b"
        );
    }

    #[test]
    fn test_join_unescapes_newline_delimiter() {
        let ctx = ctx_json(json!({"lines": ["one", "two"]}));
        assert_eq!(evaluate(r"$json.lines.join('\n')", &ctx), "one\ntwo");
    }

    #[test]
    fn test_join_drops_empty_elements() {
        let ctx = ctx_json(json!({"data": [{"title": "a"}, {"other": 1}, {"title": "b"}]}));
        assert_eq!(
            evaluate("$json.data.map(item => item.title).join(',')", &ctx),
            "a,b"
        );
    }

    #[test]
    fn test_join_on_non_array_is_empty() {
        let ctx = ctx_json(json!({"data": "not an array"}));
        assert_eq!(evaluate("$json.data.join(',')", &ctx), "");
    }

    #[test]
    fn test_alternation_first_non_empty() {
        let ctx = ctx_json(json!({}));
        assert_eq!(evaluate("$json.Missing || 'default'", &ctx), "default");

        let ctx = ctx_json(json!({"present": "yes"}));
        assert_eq!(evaluate("$json.present || 'default'", &ctx), "yes");
    }

    #[test]
    fn test_alternation_all_empty() {
        let ctx = ctx_json(json!({}));
        assert_eq!(evaluate("$json.a || $json.b", &ctx), "");
    }

    #[test]
    fn test_node_reference() {
        let ctx = RenderContext::new().with_nodes(
            json!({"Fetch SERP": {"results": ["r1", "r2"]}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            evaluate("$('Fetch SERP').first().json.results", &ctx),
            r#"["r1","r2"]"#
        );
        assert_eq!(evaluate("$('Fetch SERP').first().json", &ctx), r#"{"results":["r1","r2"]}"#);
        assert_eq!(evaluate("$('Unknown').first().json", &ctx), "");
    }

    #[test]
    fn test_trim_and_to_json_string() {
        let ctx = ctx_json(json!({"padded": "  hi  ", "obj": {"k": 1}}));
        assert_eq!(evaluate("$json.padded.trim()", &ctx), "hi");
        assert_eq!(evaluate("$json.obj.toJsonString()", &ctx), r#"{"k":1}"#);
        // Strings pass through toJsonString unchanged.
        assert_eq!(evaluate("$json.padded.toJsonString()", &ctx), "  hi  ");
    }

    #[test]
    fn test_var_lookup_prefers_vars_over_json() {
        let ctx = RenderContext::new()
            .with_vars(json!({"name": "from vars"}).as_object().cloned().unwrap())
            .with_json(json!({"name": "from json"}).as_object().cloned().unwrap());
        assert_eq!(evaluate("name", &ctx), "from vars");

        let ctx = ctx_json(json!({"name": "from json"}));
        assert_eq!(evaluate("name", &ctx), "from json");
    }

    #[test]
    fn test_unsupported_expression_is_empty() {
        let ctx = ctx_json(json!({"a": 1}));
        assert_eq!(evaluate("Math.random()", &ctx), "");
        assert_eq!(evaluate("a + b", &ctx), "");
        assert_eq!(evaluate("", &ctx), "");
    }

    #[test]
    fn test_fallback_var_reference_in_weird_shape() {
        let ctx = ctx_json(json!({"Keywords": "seo"}));
        // Not grammatical, but carries a $json variable reference.
        assert_eq!(evaluate("wrap($json.Keywords)", &ctx), "seo");
    }

    #[test]
    fn test_fallback_alternation_with_unsupported_operand() {
        let ctx = ctx_json(json!({}));
        assert_eq!(evaluate("$json.a! || 'd'", &ctx), "d");
    }

    #[test]
    fn test_literal_passthrough() {
        let ctx = ctx_json(json!({}));
        assert_eq!(evaluate("'as is'", &ctx), "as is");
    }
}
