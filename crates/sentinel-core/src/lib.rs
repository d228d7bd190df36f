//! sentinel-core: mock interview proctoring (violation ledger, session state machine,
//! warning toast, detection bus and grammar analysis).
//!
//! Front ends spawn a [`SessionController`], publish host signals on a [`SignalBus`] and
//! render the [`SessionSnapshot`]s the controller publishes.

mod analysis;
mod config;
mod controller;
mod dashboard;
mod detection;
mod error;
mod ledger;
mod media;
mod session;
mod shared;
mod toast;
pub mod prompts;

// Data model and fixed tables
pub use shared::{
    Credential, GrammarAnalysis, Phase, Role, Violation, ViolationType, DEMO_TRANSCRIPT, MAX_WARNINGS,
    TERMINATION_GRACE_MS, TOAST_DURATION_MS,
};

pub use error::{SentinelError, SentinelResult};
pub use config::{AnalysisConfig, ProctorConfig, DEFAULT_ANALYSIS_API_BASE, DEFAULT_ANALYSIS_MODEL};

// Ledger + session state machine
pub use ledger::ViolationLedger;
pub use session::{EndReason, HealthEntry, Session, SessionHealth};
pub use controller::{SessionController, SessionHandle, SessionSnapshot};

// Detection + presentation
pub use detection::{EnvironmentSignal, SignalBus, ViolationEventSource, Visibility};
pub use toast::{ToastSeverity, ToastView, WarningToast};
pub use media::{CameraState, MediaDevice, MediaProbe, MediaRoom, StreamHandle, VirtualMediaDevice};

// Post-interview
pub use analysis::{AnalysisBackend, AnalysisOutcome, AnalysisSource, GeminiBackend, GrammarAnalyzer};
pub use dashboard::DashboardReport;
