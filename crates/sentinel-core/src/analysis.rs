//! Grammar analysis bridge: sends the interview transcript to a language model and returns
//! a score / fluency / clarity report.
//!
//! The caller is never left without a report. No credential means no request at all, and any
//! failure (transport, non-2xx status, empty body, malformed JSON) is logged and replaced by
//! [`GrammarAnalysis::fallback`].

use crate::config::AnalysisConfig;
use crate::error::{SentinelError, SentinelResult};
use crate::prompts::{grammar_report_prompt, grammar_report_schema};
use crate::shared::{Credential, GrammarAnalysis};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Remote model that turns a transcript into a report.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn request(&self, transcript: &str, credential: &Credential) -> SentinelResult<GrammarAnalysis>;
}

/// Where the report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisOutcome {
    pub report: GrammarAnalysis,
    pub source: AnalysisSource,
}

/// Front door for transcript analysis.
#[derive(Clone)]
pub struct GrammarAnalyzer {
    backend: Arc<dyn AnalysisBackend>,
}

impl GrammarAnalyzer {
    pub fn new(backend: Arc<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    /// Analyzer backed by the Gemini `generateContent` API.
    pub fn gemini(config: &AnalysisConfig) -> Self {
        Self::new(Arc::new(GeminiBackend::new(config)))
    }

    /// Report for `transcript`, or the fallback record.
    pub async fn analyze(&self, transcript: &str, credential: &str) -> GrammarAnalysis {
        self.analyze_with_source(transcript, credential).await.report
    }

    pub async fn analyze_with_source(&self, transcript: &str, credential: &str) -> AnalysisOutcome {
        let Some(credential) = Credential::parse(credential) else {
            info!("no analysis credential supplied; using fallback report");
            return fallback_outcome();
        };

        match self.backend.request(transcript, &credential).await {
            Ok(report) => AnalysisOutcome {
                report,
                source: AnalysisSource::Remote,
            },
            Err(e) => {
                warn!(error = %e, "grammar analysis failed; using fallback report");
                fallback_outcome()
            }
        }
    }
}

fn fallback_outcome() -> AnalysisOutcome {
    AnalysisOutcome {
        report: GrammarAnalysis::fallback(),
        source: AnalysisSource::Fallback,
    }
}

// Gemini REST request/response shapes

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Report as the model returns it; scores may be fractional or out of range.
#[derive(Deserialize)]
struct RawAnalysis {
    score: f64,
    fluency: f64,
    clarity: f64,
    #[serde(rename = "grammarIssues", alias = "issues", default)]
    grammar_issues: Vec<String>,
    #[serde(default)]
    feedback: String,
}

impl From<RawAnalysis> for GrammarAnalysis {
    fn from(raw: RawAnalysis) -> Self {
        Self {
            score: clamp_score(raw.score),
            fluency: clamp_score(raw.fluency),
            clarity: clamp_score(raw.clarity),
            issues: raw.grammar_issues,
            feedback: raw.feedback,
        }
    }
}

fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

/// Gemini `models/{model}:generateContent` client.
pub struct GeminiBackend {
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: &AnalysisConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    async fn request(&self, transcript: &str, credential: &Credential) -> SentinelResult<GrammarAnalysis> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(grammar_report_prompt(transcript)),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: grammar_report_schema(),
            },
        };

        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential.expose())
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(SentinelError::AnalysisStatus { status, body });
        }

        let parsed: GenerateResponse = res.json().await?;
        let report = parse_generate_response(parsed)?;
        info!(model = %self.model, score = report.score, "grammar analysis received");
        Ok(report)
    }
}

fn parse_generate_response(response: GenerateResponse) -> SentinelResult<GrammarAnalysis> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(SentinelError::EmptyResponse);
    }
    parse_report_text(&text)
}

/// Parse the model's JSON text, tolerating a surrounding Markdown code fence.
fn parse_report_text(text: &str) -> SentinelResult<GrammarAnalysis> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    let raw: RawAnalysis = serde_json::from_str(unfenced.trim())?;
    Ok(raw.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
        result: fn() -> SentinelResult<GrammarAnalysis>,
    }

    #[async_trait]
    impl AnalysisBackend for CountingBackend {
        async fn request(&self, _transcript: &str, _credential: &Credential) -> SentinelResult<GrammarAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn remote_report() -> SentinelResult<GrammarAnalysis> {
        Ok(GrammarAnalysis {
            score: 91,
            fluency: 88,
            clarity: 93,
            issues: vec![],
            feedback: "Clear and fluent.".to_string(),
        })
    }

    fn failing() -> SentinelResult<GrammarAnalysis> {
        Err(SentinelError::EmptyResponse)
    }

    fn response_with_text(text: &str) -> GenerateResponse {
        GenerateResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part {
                        text: Some(text.to_string()),
                    }],
                }),
            }],
        }
    }

    #[tokio::test]
    async fn blank_credential_skips_remote_call() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            result: remote_report,
        });
        let analyzer = GrammarAnalyzer::new(backend.clone());

        let outcome = analyzer.analyze_with_source("", "  ").await;
        assert_eq!(outcome.source, AnalysisSource::Fallback);
        assert_eq!(outcome.report, GrammarAnalysis::fallback());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_report_is_returned() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            result: remote_report,
        });
        let analyzer = GrammarAnalyzer::new(backend.clone());

        let outcome = analyzer.analyze_with_source("transcript", "key").await;
        assert_eq!(outcome.source, AnalysisSource::Remote);
        assert_eq!(outcome.report.score, 91);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_failure_falls_back() {
        let analyzer = GrammarAnalyzer::new(Arc::new(CountingBackend {
            calls: AtomicUsize::new(0),
            result: failing,
        }));
        assert_eq!(analyzer.analyze("transcript", "key").await, GrammarAnalysis::fallback());
    }

    #[test]
    fn parses_structured_response_and_clamps_scores() {
        let text = r#"{"score": 82.6, "fluency": 140, "clarity": -3,
            "grammarIssues": ["'we finds' should be 'we found'"], "feedback": "Solid."}"#;
        let report = parse_generate_response(response_with_text(text)).unwrap();
        assert_eq!(report.score, 83);
        assert_eq!(report.fluency, 100);
        assert_eq!(report.clarity, 0);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn tolerates_code_fence() {
        let text = "```json\n{\"score\": 70, \"fluency\": 71, \"clarity\": 72, \"grammarIssues\": [], \"feedback\": \"ok\"}\n```";
        let report = parse_generate_response(response_with_text(text)).unwrap();
        assert_eq!(report.clarity, 72);
    }

    #[test]
    fn empty_and_malformed_responses_are_errors() {
        let empty = GenerateResponse { candidates: vec![] };
        assert!(matches!(parse_generate_response(empty), Err(SentinelError::EmptyResponse)));

        let malformed = parse_generate_response(response_with_text("Sure! Here is the report."));
        assert!(matches!(malformed, Err(SentinelError::MalformedResponse(_))));
    }

    #[test]
    fn endpoint_includes_model() {
        let backend = GeminiBackend::new(&AnalysisConfig {
            api_base: "http://localhost:1234/v1beta/".to_string(),
            ..AnalysisConfig::default()
        })
        .with_model("gemini-test");
        assert_eq!(backend.endpoint(), "http://localhost:1234/v1beta/models/gemini-test:generateContent");
    }
}
