//! Offline extraction of prompt templates from n8n workflow exports.
//!
//! Reads workflow export JSON files, collects the prompt text of every
//! LLM chain/agent node, infers structured-output schemas from connected
//! output parser nodes, and writes the registry data file consumed at
//! build time. The service itself never reads the disk; this binary is
//! the whole registry-population step.
//!
//! Usage: `extract-templates <workflow.json>... [--out <path>]`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value, json};

use promptmeter::registry::{OutputParserKind, OutputParserSpec, TemplateEntry};

const PROMPT_NODE_TYPES: &[&str] = &[
    "@n8n/n8n-nodes-langchain.chainLlm",
    "@n8n/n8n-nodes-langchain.agent",
];

const STRUCTURED_PARSER_NODE_TYPE: &str = "@n8n/n8n-nodes-langchain.outputParserStructured";

const DEFAULT_OUT: &str = "src/registry/data/templates.json";

fn main() -> Result<()> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut out = PathBuf::from(DEFAULT_OUT);

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => {
                out = args
                    .next()
                    .map(PathBuf::from)
                    .context("--out requires a path")?;
            }
            _ => inputs.push(PathBuf::from(arg)),
        }
    }

    if inputs.is_empty() {
        bail!("usage: extract-templates <workflow.json>... [--out <path>]");
    }

    let mut entries: BTreeMap<String, TemplateEntry> = BTreeMap::new();

    for path in &inputs {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("skipping {}: could not parse ({e})", path.display());
                continue;
            }
        };

        let workflow_name = workflow_name(&parsed, path);
        extract_workflow(&parsed, &workflow_name, &mut entries);
    }

    let data = serde_json::to_string_pretty(&entries)?;
    std::fs::write(&out, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", out.display()))?;

    println!("generated {} prompt templates -> {}", entries.len(), out.display());
    Ok(())
}

/// Workflow name from the export's own `name` field, falling back to the
/// file stem.
fn workflow_name(parsed: &Value, path: &Path) -> String {
    parsed
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}

fn extract_workflow(
    parsed: &Value,
    workflow_name: &str,
    entries: &mut BTreeMap<String, TemplateEntry>,
) {
    let nodes = match parsed.get("nodes").and_then(Value::as_array) {
        Some(nodes) => nodes,
        None => return,
    };

    for node in nodes {
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or_default();
        if !PROMPT_NODE_TYPES.contains(&node_type) {
            continue;
        }
        let node_name = node
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if node_name.is_empty() {
            continue;
        }

        let template = build_template(node);
        if template.is_empty() {
            continue;
        }

        let mut entry = TemplateEntry {
            template,
            model: None,
            default_multiplier: default_multiplier(node),
            output_parser: None,
        };

        // Chains wired to a Structured Output Parser get the parser's
        // schema stored, so the service can append the same format
        // instructions LangChain injects at runtime.
        if node_type == "@n8n/n8n-nodes-langchain.chainLlm"
            && node
                .pointer("/parameters/hasOutputParser")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        {
            if let Some(schema) = structured_parser_schema(parsed, nodes, node_name) {
                entry.output_parser = Some(OutputParserSpec {
                    kind: OutputParserKind::LangchainStructuredV1,
                    schema,
                });
            }
        }

        entries.insert(format!("{workflow_name}::{node_name}"), entry);
    }
}

/// Collect prompt text from the places n8n stores it: agent system
/// messages, chain message values, and the main text parameter.
fn build_template(node: &Value) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(system) = node
        .pointer("/parameters/options/systemMessage")
        .and_then(Value::as_str)
    {
        parts.push(normalize_template_text(system));
    }

    if let Some(messages) = node
        .pointer("/parameters/messages/messageValues")
        .and_then(Value::as_array)
    {
        for message_value in messages {
            if let Some(message) = message_value.get("message").and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    parts.push(normalize_template_text(message));
                }
            }
        }
    }

    if let Some(text) = node.pointer("/parameters/text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            parts.push(normalize_template_text(text));
        }
    }

    parts
        .iter()
        .map(|part| part.trim_end())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Strip the n8n expression marker (`=` prefix) and normalize Windows
/// newlines.
fn normalize_template_text(text: &str) -> String {
    text.strip_prefix('=').unwrap_or(text).replace("\r\n", "\n")
}

/// Retries do not always happen; keep the multiplier at 1 unless the node
/// clearly opts into them.
fn default_multiplier(node: &Value) -> f64 {
    let retry_on_fail = node
        .get("retryOnFail")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let max_tries = node.get("maxTries").and_then(Value::as_f64).unwrap_or(0.0);
    if retry_on_fail && max_tries > 1.0 {
        max_tries
    } else {
        1.0
    }
}

/// Find the structured output parser wired to a chain node and build its
/// schema from the parser's JSON example.
fn structured_parser_schema(parsed: &Value, nodes: &[Value], chain_name: &str) -> Option<Value> {
    let parser_name = parser_node_for_chain(parsed, chain_name)?;
    let parser_node = nodes.iter().find(|node| {
        node.get("name").and_then(Value::as_str).map(str::trim) == Some(parser_name)
            && node.get("type").and_then(Value::as_str) == Some(STRUCTURED_PARSER_NODE_TYPE)
    })?;

    let raw_example = parser_node
        .pointer("/parameters/jsonSchemaExample")
        .and_then(Value::as_str)?;
    let example: Value = serde_json::from_str(raw_example).ok()?;

    Some(wrap_output_schema(infer_schema(&example)))
}

/// Output parser nodes connect to their chain via an `ai_outputParser`
/// edge; the connection map is keyed by the parser node's name.
fn parser_node_for_chain<'a>(parsed: &'a Value, chain_name: &str) -> Option<&'a str> {
    let connections = parsed.get("connections").and_then(Value::as_object)?;

    for (from_node, connection) in connections {
        let branches = connection.get("ai_outputParser").and_then(Value::as_array);
        let Some(branches) = branches else { continue };
        for branch in branches.iter().filter_map(Value::as_array) {
            for edge in branch {
                if edge.get("node").and_then(Value::as_str) == Some(chain_name)
                    && edge.get("type").and_then(Value::as_str) == Some("ai_outputParser")
                {
                    return Some(from_node.as_str());
                }
            }
        }
    }

    None
}

/// Infer a conservative draft-07 schema from an example value.
fn infer_schema(example: &Value) -> Value {
    match example {
        Value::Null | Value::String(_) => json!({"type": "string"}),
        Value::Number(_) => json!({"type": "number"}),
        Value::Bool(_) => json!({"type": "boolean"}),
        Value::Array(items) => {
            let all_strings = items.iter().all(Value::is_string);
            let item_schema = if all_strings {
                json!({"type": "string"})
            } else {
                json!({})
            };
            json!({"type": "array", "items": item_schema})
        }
        Value::Object(map) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (key, value) in map {
                properties.insert(key.clone(), infer_schema(value));
                required.push(Value::String(key.clone()));
            }
            json!({
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false
            })
        }
    }
}

/// n8n's Structured Output Parser wraps the example schema in an `output`
/// envelope; reproduce that exact shape.
fn wrap_output_schema(inner: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "output": {
                "type": "object",
                "properties": inner.get("properties").cloned().unwrap_or_else(|| json!({})),
                "required": inner.get("required").cloned().unwrap_or_else(|| json!([])),
                "additionalProperties": false
            }
        },
        "required": ["output"],
        "additionalProperties": false,
        "$schema": "http://json-schema.org/draft-07/schema#"
    })
}
