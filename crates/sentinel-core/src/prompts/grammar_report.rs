//! Grammar report: score an English interview transcript and list concrete mistakes.

use serde_json::{json, Value};

/// User prompt template: `{transcript}` is replaced with the full transcript text.
pub const GRAMMAR_REPORT_TEMPLATE: &str = r#"Analyze the following interview transcript for an English candidate.
Provide a grammar score (0-100), fluency score (0-100), and clarity score (0-100).
List specific grammar issues found.
Provide a short summary feedback paragraph.

Transcript:
"{transcript}""#;

pub fn grammar_report_prompt(transcript: &str) -> String {
    GRAMMAR_REPORT_TEMPLATE.replace("{transcript}", transcript.trim())
}

/// Structured-output schema sent with the request so the model answers in JSON.
pub fn grammar_report_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "score": { "type": "NUMBER", "description": "Overall grammar score 0-100" },
            "fluency": { "type": "NUMBER", "description": "Fluency score 0-100" },
            "clarity": { "type": "NUMBER", "description": "Clarity score 0-100" },
            "grammarIssues": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of specific grammar mistakes found"
            },
            "feedback": { "type": "STRING", "description": "Constructive feedback paragraph" }
        },
        "required": ["score", "fluency", "clarity", "grammarIssues", "feedback"]
    })
}
