//! Post-interview report: outcome, violation timeline and the grammar analysis.

use crate::analysis::{AnalysisOutcome, AnalysisSource};
use crate::controller::SessionSnapshot;
use crate::ledger::count_by_type;
use crate::session::EndReason;
use crate::shared::{GrammarAnalysis, Role, Violation, ViolationType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub role: Role,
    pub end_reason: Option<EndReason>,
    pub duration_secs: Option<u64>,
    pub max_warnings: usize,
    pub by_type: BTreeMap<ViolationType, usize>,
    /// Detection order.
    pub timeline: Vec<Violation>,
    pub analysis: GrammarAnalysis,
    pub analysis_source: AnalysisSource,
}

impl DashboardReport {
    pub fn build(snapshot: &SessionSnapshot, outcome: AnalysisOutcome) -> Self {
        Self {
            role: snapshot.role,
            end_reason: snapshot.end_reason,
            duration_secs: snapshot.duration().map(|d| d.as_secs()),
            max_warnings: snapshot.max_warnings,
            by_type: count_by_type(&snapshot.violations),
            timeline: snapshot.violations.clone(),
            analysis: outcome.report,
            analysis_source: outcome.source,
        }
    }

    pub fn violation_count(&self) -> usize {
        self.timeline.len()
    }

    pub fn terminated(&self) -> bool {
        self.end_reason == Some(EndReason::ViolationLimit)
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Interview Report\n\n");

        let _ = writeln!(out, "Role: {}", self.role.label());
        match self.end_reason {
            Some(reason) => {
                let _ = writeln!(out, "Outcome: {reason}");
            }
            None => out.push_str("Outcome: in progress\n"),
        }
        if let Some(secs) = self.duration_secs {
            let _ = writeln!(out, "Duration: {:02}:{:02}", secs / 60, secs % 60);
        }
        let _ = writeln!(out, "Violations: {} of {}", self.violation_count(), self.max_warnings);

        out.push_str("\n## Integrity\n\n");
        if self.timeline.is_empty() {
            out.push_str("No violations recorded.\n");
        } else {
            for (kind, count) in &self.by_type {
                let _ = writeln!(out, "- {kind}: {count}");
            }
            out.push('\n');
            for (i, v) in self.timeline.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, v.message);
            }
        }

        out.push_str("\n## Communication\n\n");
        let a = &self.analysis;
        let _ = writeln!(out, "| Score | Fluency | Clarity |");
        let _ = writeln!(out, "|-------|---------|---------|");
        let _ = writeln!(out, "| {} | {} | {} |", a.score, a.fluency, a.clarity);
        if !a.issues.is_empty() {
            out.push_str("\nGrammar issues:\n");
            for issue in &a.issues {
                let _ = writeln!(out, "- {issue}");
            }
        }
        let _ = writeln!(out, "\n{}", a.feedback);
        if self.analysis_source == AnalysisSource::Fallback {
            out.push_str("\n_Offline estimate: no live analysis was available._\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::CameraState;
    use crate::shared::Phase;

    fn ended(violations: Vec<Violation>, reason: EndReason) -> SessionSnapshot {
        SessionSnapshot {
            phase: Phase::Dashboard,
            role: Role::Candidate,
            credential: None,
            violations,
            max_warnings: 3,
            toast: None,
            camera: CameraState::Off,
            mic_on: true,
            termination_pending: false,
            started_at: Some(1_000),
            ended_at: Some(126_000),
            end_reason: Some(reason),
        }
    }

    fn fallback() -> AnalysisOutcome {
        AnalysisOutcome {
            report: GrammarAnalysis::fallback(),
            source: AnalysisSource::Fallback,
        }
    }

    #[test]
    fn groups_violations_and_marks_termination() {
        let snapshot = ended(
            vec![
                Violation::new(ViolationType::TabSwitch),
                Violation::new(ViolationType::WindowBlur),
                Violation::new(ViolationType::TabSwitch),
            ],
            EndReason::ViolationLimit,
        );
        let report = DashboardReport::build(&snapshot, fallback());

        assert!(report.terminated());
        assert_eq!(report.violation_count(), 3);
        assert_eq!(report.by_type[&ViolationType::TabSwitch], 2);
        assert_eq!(report.duration_secs, Some(125));

        let md = report.to_markdown();
        assert!(md.contains("Outcome: terminated for misconduct"));
        assert!(md.contains("Duration: 02:05"));
        assert!(md.contains("Violations: 3 of 3"));
        assert!(md.contains("1. Candidate switched browser tabs."));
        assert!(md.contains("| 75 | 80 | 70 |"));
        assert!(md.contains("Offline estimate"));
    }

    #[test]
    fn clean_session_with_remote_analysis() {
        let snapshot = ended(vec![], EndReason::Manual);
        let outcome = AnalysisOutcome {
            report: GrammarAnalysis {
                score: 95,
                fluency: 90,
                clarity: 92,
                issues: vec![],
                feedback: "Excellent.".to_string(),
            },
            source: AnalysisSource::Remote,
        };
        let md = DashboardReport::build(&snapshot, outcome).to_markdown();

        assert!(md.contains("No violations recorded."));
        assert!(md.contains("Outcome: ended by participant"));
        assert!(!md.contains("Grammar issues"));
        assert!(!md.contains("Offline estimate"));
    }
}
