//! Session state bundle: phase, role, credential and the violation ledger.
//!
//! Transitions are one-directional (LOBBY → INTERVIEW → DASHBOARD) except for `reset`.
//! Every method here is a plain state change; timers and subscriptions live in the
//! controller, which is the only writer of a `Session`.

use crate::ledger::ViolationLedger;
use crate::shared::{Credential, Phase, Role, Violation, ViolationType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the interview left the INTERVIEW phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// "End interview" pressed.
    Manual,
    /// Grace period elapsed after the warning threshold was reached.
    ViolationLimit,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EndReason::Manual => "ended by participant",
            EndReason::ViolationLimit => "terminated for misconduct",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    phase: Phase,
    role: Role,
    credential: Option<Credential>,
    ledger: ViolationLedger,
    started_at: Option<i64>,
    ended_at: Option<i64>,
    end_reason: Option<EndReason>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn ledger(&self) -> &ViolationLedger {
        &self.ledger
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<i64> {
        self.ended_at
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// LOBBY → INTERVIEW. Records role and credential and starts from an empty ledger.
    /// Returns false (and changes nothing) from any other phase.
    pub fn join(&mut self, role: Role, credential: Option<Credential>) -> bool {
        if self.phase != Phase::Lobby {
            return false;
        }
        self.phase = Phase::Interview;
        self.role = role;
        self.credential = credential;
        self.ledger.clear();
        self.started_at = Some(now_millis());
        self.ended_at = None;
        self.end_reason = None;
        true
    }

    /// INTERVIEW → DASHBOARD. The first caller wins; later calls are no-ops.
    pub fn end(&mut self, reason: EndReason) -> bool {
        if self.phase != Phase::Interview {
            return false;
        }
        self.phase = Phase::Dashboard;
        self.ended_at = Some(now_millis());
        self.end_reason = Some(reason);
        true
    }

    /// DASHBOARD → LOBBY, clearing the ledger.
    pub fn reset(&mut self) -> bool {
        if self.phase != Phase::Dashboard {
            return false;
        }
        self.phase = Phase::Lobby;
        self.credential = None;
        self.ledger.clear();
        self.started_at = None;
        self.ended_at = None;
        self.end_reason = None;
        true
    }

    /// Append a new violation of `kind`. Only accepted during the interview.
    pub fn record_violation(&mut self, kind: ViolationType) -> Option<&Violation> {
        if self.phase != Phase::Interview {
            return None;
        }
        self.ledger.append(Violation::new(kind));
        self.ledger.last()
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One row of the session health panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthEntry {
    pub id: String,
    pub message: String,
    /// Local `mm:ss` of the detection.
    pub clock: String,
}

/// Running violation count shown beside the video tiles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionHealth {
    pub count: usize,
    pub max: usize,
    /// count / max, capped at 1.0.
    pub fill_ratio: f32,
    /// One warning away from termination (or past it).
    pub elevated: bool,
    /// Newest first.
    pub entries: Vec<HealthEntry>,
}

impl SessionHealth {
    /// `violations` in detection order.
    pub fn from_violations(violations: &[Violation], max: usize) -> Self {
        let count = violations.len();
        let max = max.max(1);
        let entries = violations
            .iter()
            .rev()
            .map(|v| HealthEntry {
                id: v.id.clone(),
                message: v.message.clone(),
                clock: clock_label(v.timestamp),
            })
            .collect();
        Self {
            count,
            max,
            fill_ratio: (count as f32 / max as f32).min(1.0),
            elevated: count > 0 && count + 1 >= max,
            entries,
        }
    }
}

impl fmt::Display for SessionHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const BAR_WIDTH: usize = 20;
        let filled = (self.fill_ratio * BAR_WIDTH as f32).round() as usize;
        writeln!(f, "SESSION HEALTH  Violations {}/{}", self.count, self.max)?;
        writeln!(
            f,
            "[{}{}]{}",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            if self.elevated { " !" } else { "" }
        )?;
        for entry in &self.entries {
            writeln!(f, "  {}  {}", entry.clock, entry.message)?;
        }
        Ok(())
    }
}

fn clock_label(timestamp_ms: i64) -> String {
    use chrono::TimeZone;
    match chrono::Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(t) => t.format("%M:%S").to_string(),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interview(role: Role) -> Session {
        let mut session = Session::new();
        assert!(session.join(role, Credential::parse("k")));
        session
    }

    #[test]
    fn starts_in_lobby_with_empty_ledger() {
        let session = Session::new();
        assert_eq!(session.phase(), Phase::Lobby);
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn join_records_role_and_credential() {
        let session = interview(Role::Interviewer);
        assert_eq!(session.phase(), Phase::Interview);
        assert_eq!(session.role(), Role::Interviewer);
        assert_eq!(session.credential().map(|c| c.expose()), Some("k"));
        assert!(session.started_at().is_some());
    }

    #[test]
    fn interview_cannot_jump_back_to_lobby() {
        let mut session = interview(Role::Candidate);
        assert!(!session.join(Role::Interviewer, None));
        assert!(!session.reset());
        assert_eq!(session.phase(), Phase::Interview);
        assert_eq!(session.role(), Role::Candidate);
    }

    #[test]
    fn first_end_wins() {
        let mut session = interview(Role::Candidate);
        assert!(session.end(EndReason::Manual));
        assert!(!session.end(EndReason::ViolationLimit));
        assert_eq!(session.end_reason(), Some(EndReason::Manual));
        assert_eq!(session.phase(), Phase::Dashboard);
    }

    #[test]
    fn reset_clears_ledger_and_returns_to_lobby() {
        let mut session = interview(Role::Candidate);
        session.record_violation(ViolationType::TabSwitch);
        session.record_violation(ViolationType::WindowBlur);
        session.end(EndReason::Manual);
        assert_eq!(session.ledger().len(), 2);

        assert!(session.reset());
        assert_eq!(session.phase(), Phase::Lobby);
        assert!(session.ledger().is_empty());
        assert!(session.credential().is_none());
    }

    #[test]
    fn violations_outside_interview_are_ignored() {
        let mut session = Session::new();
        assert!(session.record_violation(ViolationType::PhoneDetected).is_none());

        let mut session = interview(Role::Candidate);
        session.end(EndReason::Manual);
        assert!(session.record_violation(ViolationType::PhoneDetected).is_none());
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn rejoin_starts_with_fresh_ledger() {
        let mut session = interview(Role::Candidate);
        session.record_violation(ViolationType::GazeAversion);
        session.end(EndReason::Manual);
        session.reset();
        session.join(Role::Candidate, None);
        assert!(session.ledger().is_empty());
        assert!(session.end_reason().is_none());
    }

    #[test]
    fn health_lists_newest_first_and_flags_elevated() {
        let mut session = interview(Role::Candidate);
        session.record_violation(ViolationType::TabSwitch);
        let health = SessionHealth::from_violations(session.ledger().entries(), 3);
        assert!(!health.elevated);

        session.record_violation(ViolationType::PhoneDetected);
        let health = SessionHealth::from_violations(session.ledger().entries(), 3);
        assert_eq!(health.count, 2);
        assert!(health.elevated);
        assert!((health.fill_ratio - 2.0 / 3.0).abs() < f32::EPSILON);
        assert_eq!(health.entries[0].message, ViolationType::PhoneDetected.message());
        assert_eq!(health.entries[0].clock.len(), 5);
    }

    #[test]
    fn health_ratio_is_capped() {
        let mut session = interview(Role::Candidate);
        for _ in 0..5 {
            session.record_violation(ViolationType::WindowBlur);
        }
        let health = SessionHealth::from_violations(session.ledger().entries(), 3);
        assert_eq!(health.fill_ratio, 1.0);
        assert!(health.to_string().contains("Violations 5/3"));
    }
}
