//! Structured-output format instructions.
//!
//! When a workflow chain runs through a structured output parser, the
//! LangChain runtime appends schema-conformance instructions to the prompt
//! before the model sees it. Token estimates must include that text, so
//! the same block is reproduced here: a fixed preamble plus the entry's
//! schema as a compact JSON code block.

use serde_json::Value;

use crate::registry::{OutputParserKind, OutputParserSpec};

/// Opening phrase of the instruction preamble. Callers that may receive
/// prompts which already carry instructions (e.g. override prompts copied
/// out of a live run) should check for this marker before appending; the
/// appender itself performs no duplicate detection.
pub const FORMAT_INSTRUCTIONS_MARKER: &str =
    "You must format your output as a JSON value";

const FORMAT_INSTRUCTIONS_PREAMBLE: &str = r#"You must format your output as a JSON value that adheres to a given "JSON Schema" instance.

"JSON Schema" is a declarative language that allows you to annotate and validate JSON documents.

For example, the example "JSON Schema" instance {"properties": {"foo": {"description": "a list of test words", "type": "array", "items": {"type": "string"}}}, "required": ["foo"]}
would match an object with one required property, "foo". The "type" property specifies "foo" must be an "array", and the "description" property semantically describes it as "a list of test words". The items within "foo" must be strings.
Thus, the object {"foo": ["bar", "baz"]} is a well-formatted instance of this example "JSON Schema". The object {"properties": {"foo": ["bar", "baz"]}} is not well-formatted.

Here is the JSON Schema instance your output must adhere to. Include the enclosing markdown codeblock:"#;

/// Append structured-output format instructions to a rendered prompt.
///
/// Returns the prompt unchanged unless the spec is the recognized
/// structured kind and carries an object-shaped schema. On success the
/// prompt is right-trimmed and followed by a blank line, the preamble,
/// and a fenced `json` block containing the schema serialized with no
/// extra whitespace.
pub fn append_format_instructions(prompt: &str, spec: &OutputParserSpec) -> String {
    if spec.kind != OutputParserKind::LangchainStructuredV1 {
        return prompt.to_string();
    }
    let Value::Object(_) = &spec.schema else {
        return prompt.to_string();
    };
    let Ok(schema_json) = serde_json::to_string(&spec.schema) else {
        return prompt.to_string();
    };

    format!(
        "{}\n\n{}\n```json\n{}\n```\n",
        prompt.trim_end(),
        FORMAT_INSTRUCTIONS_PREAMBLE,
        schema_json
    )
}
