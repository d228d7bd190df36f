//! Warning toast: transient overlay for the most recent violation.
//!
//! The toast only holds presentation state. The controller owns the dismiss timer and
//! calls [`WarningToast::present`] / [`WarningToast::dismiss`]; nothing here touches the ledger.

use crate::shared::Violation;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastSeverity {
    /// Below the threshold.
    Warning,
    /// Threshold reached; the interview is about to end.
    Terminal,
}

impl ToastSeverity {
    pub fn heading(self) -> &'static str {
        match self {
            ToastSeverity::Warning => "MISCONDUCT DETECTED",
            ToastSeverity::Terminal => "INTERVIEW TERMINATED",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ToastSeverity::Warning => "⚠",
            ToastSeverity::Terminal => "✖",
        }
    }
}

/// What the overlay renders right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToastView {
    pub violation_id: String,
    pub severity: ToastSeverity,
    pub heading: String,
    pub message: String,
    /// "Warning {count} of {max}".
    pub counter: String,
}

impl fmt::Display for ToastView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} | {} | {}",
            self.severity.icon(),
            self.heading,
            self.message,
            self.counter.to_uppercase()
        )
    }
}

#[derive(Debug, Clone)]
pub struct WarningToast {
    max: usize,
    latest: Option<Violation>,
    count: usize,
    visible: bool,
}

impl WarningToast {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            latest: None,
            count: 0,
            visible: false,
        }
    }

    /// Show `violation` with the live ledger length. Replaces whatever was shown before.
    pub fn present(&mut self, violation: &Violation, count: usize) {
        self.latest = Some(violation.clone());
        self.count = count;
        self.visible = true;
    }

    /// Hide after the display period. The violation and count stay until `clear`
    /// or the next `present`.
    pub fn dismiss(&mut self) {
        self.visible = false;
    }

    /// Forget everything (leaving the interview room).
    pub fn clear(&mut self) {
        self.latest = None;
        self.count = 0;
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible && self.latest.is_some()
    }

    pub fn severity(&self) -> ToastSeverity {
        if self.count >= self.max {
            ToastSeverity::Terminal
        } else {
            ToastSeverity::Warning
        }
    }

    pub fn view(&self) -> Option<ToastView> {
        if !self.visible {
            return None;
        }
        let violation = self.latest.as_ref()?;
        let severity = self.severity();
        Some(ToastView {
            violation_id: violation.id.clone(),
            severity,
            heading: severity.heading().to_string(),
            message: violation.message.clone(),
            counter: format!("Warning {} of {}", self.count, self.max),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ViolationType;

    #[test]
    fn hidden_until_first_violation() {
        let toast = WarningToast::new(3);
        assert!(!toast.is_visible());
        assert!(toast.view().is_none());
    }

    #[test]
    fn warning_variant_below_threshold() {
        let mut toast = WarningToast::new(3);
        toast.present(&Violation::new(ViolationType::TabSwitch), 1);
        let view = toast.view().unwrap();
        assert_eq!(view.severity, ToastSeverity::Warning);
        assert_eq!(view.heading, "MISCONDUCT DETECTED");
        assert_eq!(view.message, "Candidate switched browser tabs.");
        assert_eq!(view.counter, "Warning 1 of 3");
    }

    #[test]
    fn terminal_variant_at_threshold() {
        let mut toast = WarningToast::new(3);
        toast.present(&Violation::new(ViolationType::PhoneDetected), 3);
        let view = toast.view().unwrap();
        assert_eq!(view.severity, ToastSeverity::Terminal);
        assert_eq!(view.heading, "INTERVIEW TERMINATED");
        assert_eq!(view.counter, "Warning 3 of 3");
        assert!(view.to_string().starts_with("✖ INTERVIEW TERMINATED"));
    }

    #[test]
    fn newer_violation_replaces_shown_one() {
        let mut toast = WarningToast::new(3);
        let first = Violation::new(ViolationType::TabSwitch);
        let second = Violation::new(ViolationType::WindowBlur);
        toast.present(&first, 1);
        toast.present(&second, 2);
        let view = toast.view().unwrap();
        assert_eq!(view.violation_id, second.id);
        assert_eq!(view.counter, "Warning 2 of 3");
    }

    #[test]
    fn dismiss_keeps_count_and_severity() {
        let mut toast = WarningToast::new(3);
        toast.present(&Violation::new(ViolationType::PhoneDetected), 3);
        toast.dismiss();
        assert!(!toast.is_visible());
        assert_eq!(toast.severity(), ToastSeverity::Terminal);
    }

    #[test]
    fn dismiss_and_clear_hide() {
        let mut toast = WarningToast::new(3);
        toast.present(&Violation::new(ViolationType::GazeAversion), 1);
        toast.dismiss();
        assert!(toast.view().is_none());

        toast.present(&Violation::new(ViolationType::GazeAversion), 2);
        assert!(toast.is_visible());
        toast.clear();
        assert!(!toast.is_visible());
    }
}
