//! Shared proctoring types: roles, phases, violations and the grammar analysis record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of warnings tolerated before the interview is forcibly terminated.
pub const MAX_WARNINGS: usize = 3;

/// Delay between the threshold breach and the automatic INTERVIEW → DASHBOARD transition.
pub const TERMINATION_GRACE_MS: u64 = 3_000;

/// How long the warning toast stays visible without a newer violation.
pub const TOAST_DURATION_MS: u64 = 5_000;

/// Fixed transcript analyzed on the dashboard (no live speech capture in the demo).
pub const DEMO_TRANSCRIPT: &str = r#"
Interviewer: Tell me about a challenging project you worked on.
Candidate: Well, um, there was this one time at my last job where we had to migrate a legacy database.
It was, like, really hard because the data was messy. We use Python scripts to clean it.
Actually, me and my team, we finds a lot of duplicates.
I think we done a good job eventually, but it took longer than we thought.
The client were happy though.
"#;

/// Participant role chosen in the lobby.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Observed party; the only role whose environment signals become violations.
    #[default]
    Candidate,
    Interviewer,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Candidate => "Candidate",
            Role::Interviewer => "Interviewer",
        }
    }

    /// The role shown on the remote tile.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Candidate => Role::Interviewer,
            Role::Interviewer => Role::Candidate,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" | "c" => Ok(Role::Candidate),
            "interviewer" | "i" => Ok(Role::Interviewer),
            other => Err(format!("unknown role '{}' (expected candidate or interviewer)", other)),
        }
    }
}

/// Stage of a session. Only `reset` moves backwards (DASHBOARD → LOBBY).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Lobby,
    Interview,
    Dashboard,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Lobby => "LOBBY",
            Phase::Interview => "INTERVIEW",
            Phase::Dashboard => "DASHBOARD",
        })
    }
}

/// Closed set of misconduct signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationType {
    TabSwitch,
    WindowBlur,
    FaceNotVisible,
    GazeAversion,
    PhoneDetected,
    MultipleVoices,
    BackgroundNoise,
}

impl ViolationType {
    pub const ALL: [ViolationType; 7] = [
        ViolationType::TabSwitch,
        ViolationType::WindowBlur,
        ViolationType::FaceNotVisible,
        ViolationType::GazeAversion,
        ViolationType::PhoneDetected,
        ViolationType::MultipleVoices,
        ViolationType::BackgroundNoise,
    ];

    /// Human-readable message shown in the toast and the session health panel.
    pub fn message(self) -> &'static str {
        match self {
            ViolationType::TabSwitch => "Candidate switched browser tabs.",
            ViolationType::WindowBlur => "Candidate window lost focus.",
            ViolationType::FaceNotVisible => "Candidate face not detected.",
            ViolationType::GazeAversion => "Suspicious gaze pattern detected.",
            ViolationType::PhoneDetected => "Prohibited object (Phone) detected.",
            ViolationType::MultipleVoices => "Multiple voices detected in environment.",
            ViolationType::BackgroundNoise => "High background noise levels.",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationType::TabSwitch => "TAB_SWITCH",
            ViolationType::WindowBlur => "WINDOW_BLUR",
            ViolationType::FaceNotVisible => "FACE_NOT_VISIBLE",
            ViolationType::GazeAversion => "GAZE_AVERSION",
            ViolationType::PhoneDetected => "PHONE_DETECTED",
            ViolationType::MultipleVoices => "MULTIPLE_VOICES",
            ViolationType::BackgroundNoise => "BACKGROUND_NOISE",
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationType {
    type Err = String;

    /// Accepts the canonical name (`PHONE_DETECTED`, case-insensitive) or a short alias (`phone`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase().replace('-', "_");
        if let Some(t) = ViolationType::ALL.iter().find(|t| t.as_str() == key) {
            return Ok(*t);
        }
        match key.as_str() {
            "TAB" => Ok(ViolationType::TabSwitch),
            "BLUR" => Ok(ViolationType::WindowBlur),
            "FACE" => Ok(ViolationType::FaceNotVisible),
            "GAZE" => Ok(ViolationType::GazeAversion),
            "PHONE" => Ok(ViolationType::PhoneDetected),
            "VOICES" => Ok(ViolationType::MultipleVoices),
            "NOISE" => Ok(ViolationType::BackgroundNoise),
            _ => Err(format!("unknown violation type '{}'", s.trim())),
        }
    }
}

/// One detected policy breach. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ViolationType,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub message: String,
}

impl Violation {
    /// Build a violation stamped with the current time and a fresh identifier.
    pub fn new(kind: ViolationType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: chrono::Utc::now().timestamp_millis(),
            message: kind.message().to_string(),
        }
    }
}

/// Session credential for the analysis service. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input so "no key" has a single representation.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Grammar / fluency report for a transcript. Scores are 0–100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarAnalysis {
    pub score: u8,
    pub fluency: u8,
    pub clarity: u8,
    #[serde(rename = "grammarIssues")]
    pub issues: Vec<String>,
    pub feedback: String,
}

impl GrammarAnalysis {
    /// Deterministic record used when no credential is supplied or the remote call fails.
    pub fn fallback() -> Self {
        Self {
            score: 75,
            fluency: 80,
            clarity: 70,
            issues: vec![
                "Subject-verb agreement error: 'The client were happy'".to_string(),
                "Usage of filler words: 'like', 'um'".to_string(),
                "Incorrect verb tense: 'we finds'".to_string(),
            ],
            feedback: "The candidate shows good technical understanding but struggles with consistent verb tenses and relies frequently on filler words. Recommend practicing professional pacing.".to_string(),
        }
    }
}
