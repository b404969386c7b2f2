//! Prompt text and response schemas for the LLM generators.

use serde_json::{Value, json};

pub(crate) const COLLECTOR_SYSTEM: &str = "You write self-contained data collection scripts.";
pub(crate) const PROCESSOR_SYSTEM: &str = "You write self-contained data processing scripts.";
pub(crate) const ANSWER_SYSTEM: &str = "You format the final answer of a data pipeline.";

pub(crate) const COLLECTOR_FIELD: &str = "data_collection_script";
pub(crate) const PROCESSOR_FIELD: &str = "data_processing_script";

pub(crate) fn collector_prompt(url: &str, html: &str) -> String {
    format!(
        r#"Read the rendered HTML of the task page below and find every dataset,
file, API endpoint or linked page needed to answer its question.

Write ONE Python script that:
- downloads or scrapes all of that data
- saves each dataset (CSV, JSON, HTML, ...) into the current directory
- uses only requests, pandas, bs4, lxml and json
- needs no browser, user input or credentials

Relative links are relative to the task URL.

--- TASK URL ---
{url}

--- HTML ---
{html}

Reply with JSON matching the schema."#
    )
}

pub(crate) fn processor_prompt(url: &str, html: &str, files: &[String]) -> String {
    let listing = serde_json::to_string_pretty(files).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"The task page below asks a question. A previous step saved the files
listed under COLLECTED FILES into the current directory.

Write ONE Python script that:
- loads the relevant collected files using relative paths
- filters, merges and computes exactly what the question asks for
- writes any intermediate output into the current directory
- prints the final result clearly to stdout
- uses only pandas, numpy, json, bs4 and lxml
- makes no network requests and no system calls

--- TASK URL ---
{url}

--- HTML ---
{html}

--- COLLECTED FILES ---
{listing}

Reply with JSON matching the schema."#
    )
}

pub(crate) fn answer_prompt(url: &str, html: &str, processing_stdout: &str) -> String {
    format!(
        r#"Using the task page and the output of the processing script, produce
the final answer.

- "answer": a single number, string or boolean when one value is expected;
  an object when several values are expected. Never an array or null.
- "submit_url": the absolute URL the page says the answer must be POSTed to.
  Resolve relative links against the task URL.

--- TASK URL ---
{url}

--- HTML ---
{html}

--- PROCESSING OUTPUT ---
{processing_stdout}

Reply with JSON matching the schema."#
    )
}

fn single_string_schema(field: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            field: {"type": "string", "description": description}
        },
        "required": [field],
        "additionalProperties": false
    })
}

pub(crate) fn collector_schema() -> Value {
    single_string_schema(
        COLLECTOR_FIELD,
        "Script that downloads all required external data.",
    )
}

pub(crate) fn processor_schema() -> Value {
    single_string_schema(
        PROCESSOR_FIELD,
        "Script that turns the collected data into the final result.",
    )
}

pub(crate) fn answer_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "answer": {
                "anyOf": [
                    {"type": "number"},
                    {"type": "string"},
                    {"type": "boolean"},
                    {"type": "object", "additionalProperties": true}
                ]
            },
            "submit_url": {"type": "string"}
        },
        "required": ["answer", "submit_url"],
        "additionalProperties": false
    })
}
