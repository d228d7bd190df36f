//! Session controller: the single writer of session state.
//!
//! One tokio task owns the [`Session`], the [`WarningToast`], the [`MediaRoom`], the live
//! [`ViolationEventSource`] and both timers (toast dismiss, auto-termination). Front ends talk
//! to it through a [`SessionHandle`] and observe it through [`SessionSnapshot`]s published on a
//! `watch` channel.
//!
//! Leaving the interview (manual end, auto-termination, or the last handle going away) drops
//! the subscription and both timers, so nothing scheduled during one interview can fire into
//! a later one.

use crate::config::ProctorConfig;
use crate::detection::{SignalBus, ViolationEventSource};
use crate::error::{SentinelError, SentinelResult};
use crate::media::{CameraState, MediaDevice, MediaRoom};
use crate::session::{EndReason, Session, SessionHealth};
use crate::shared::{Credential, Phase, Role, Violation, ViolationType};
use crate::toast::{ToastView, WarningToast};
use serde::Serialize;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

/// Everything a front end needs to render the current screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub role: Role,
    #[serde(skip)]
    pub credential: Option<Credential>,
    pub violations: Vec<Violation>,
    pub max_warnings: usize,
    pub toast: Option<ToastView>,
    pub camera: CameraState,
    pub mic_on: bool,
    /// Warning limit reached; the grace period is running.
    pub termination_pending: bool,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub end_reason: Option<EndReason>,
}

impl SessionSnapshot {
    fn lobby(max_warnings: usize) -> Self {
        Self {
            phase: Phase::Lobby,
            role: Role::default(),
            credential: None,
            violations: Vec::new(),
            max_warnings,
            toast: None,
            camera: CameraState::Off,
            mic_on: true,
            termination_pending: false,
            started_at: None,
            ended_at: None,
            end_reason: None,
        }
    }

    pub fn count(&self) -> usize {
        self.violations.len()
    }

    pub fn last_violation(&self) -> Option<&Violation> {
        self.violations.last()
    }

    pub fn health(&self) -> SessionHealth {
        SessionHealth::from_violations(&self.violations, self.max_warnings)
    }

    /// Wall-clock length of the interview, once it has ended.
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.ended_at?);
        u64::try_from(end - start).ok().map(Duration::from_millis)
    }
}

#[derive(Debug)]
enum Action {
    Join { role: Role, credential: Option<Credential> },
    EndInterview,
    Reset,
    Record { kind: ViolationType, origin: &'static str },
    ToggleCamera,
    ToggleMic,
    Snapshot,
}

struct Command {
    action: Action,
    reply: oneshot::Sender<SessionSnapshot>,
}

/// Cloneable front door to a running [`SessionController`].
///
/// Every command resolves to the snapshot taken right after it was applied. Commands that
/// make no sense in the current phase are ignored and still return the current snapshot.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    async fn send(&self, action: Action) -> SentinelResult<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command { action, reply })
            .map_err(|_| SentinelError::SessionClosed)?;
        rx.await.map_err(|_| SentinelError::SessionClosed)
    }

    /// Enter the interview as `role`. A blank `credential` is stored as none.
    pub async fn join(&self, role: Role, credential: impl Into<String>) -> SentinelResult<SessionSnapshot> {
        let credential = Credential::parse(credential);
        self.send(Action::Join { role, credential }).await
    }

    pub async fn end_interview(&self) -> SentinelResult<SessionSnapshot> {
        self.send(Action::EndInterview).await
    }

    pub async fn reset(&self) -> SentinelResult<SessionSnapshot> {
        self.send(Action::Reset).await
    }

    /// Report a violation detected outside the signal bus (vision or audio analysis).
    pub async fn record_violation(&self, kind: ViolationType) -> SentinelResult<SessionSnapshot> {
        self.send(Action::Record { kind, origin: "reported" }).await
    }

    /// Demo trigger: inject a violation regardless of role.
    pub async fn simulate(&self, kind: ViolationType) -> SentinelResult<SessionSnapshot> {
        self.send(Action::Record { kind, origin: "simulated" }).await
    }

    pub async fn toggle_camera(&self) -> SentinelResult<SessionSnapshot> {
        self.send(Action::ToggleCamera).await
    }

    pub async fn toggle_mic(&self) -> SentinelResult<SessionSnapshot> {
        self.send(Action::ToggleMic).await
    }

    /// Round-trip snapshot: reflects every timer and signal already due.
    pub async fn snapshot(&self) -> SentinelResult<SessionSnapshot> {
        self.send(Action::Snapshot).await
    }

    /// Last published snapshot, without a round trip.
    pub fn current(&self) -> SessionSnapshot {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.view.clone()
    }
}

/// A single pending deadline. Arming replaces it; cancelling drops it.
#[derive(Default)]
struct Deferred {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deferred {
    fn arm(&mut self, after: Duration) {
        self.sleep = Some(Box::pin(sleep(after)));
    }

    fn cancel(&mut self) {
        self.sleep = None;
    }

    fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Resolves when the deadline passes, then disarms. Never resolves while unarmed.
    async fn elapsed(&mut self) {
        match self.sleep.as_mut() {
            Some(deadline) => {
                deadline.as_mut().await;
                self.sleep = None;
            }
            None => pending().await,
        }
    }
}

async fn next_detection(source: &mut Option<ViolationEventSource>) -> Option<ViolationType> {
    match source.as_mut() {
        Some(source) => source.next_violation().await,
        None => pending().await,
    }
}

pub struct SessionController {
    config: Arc<ProctorConfig>,
    bus: SignalBus,
    session: Session,
    toast: WarningToast,
    media: MediaRoom,
    source: Option<ViolationEventSource>,
    toast_timer: Deferred,
    auto_end: Deferred,
    commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// Start a controller task in the LOBBY phase. The task stops once every handle is dropped.
    pub fn spawn(
        config: Arc<ProctorConfig>,
        bus: &SignalBus,
        device: Box<dyn MediaDevice>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SessionSnapshot::lobby(config.max_warnings));

        let controller = Self {
            toast: WarningToast::new(config.max_warnings),
            config,
            bus: bus.clone(),
            session: Session::new(),
            media: MediaRoom::new(device),
            source: None,
            toast_timer: Deferred::default(),
            auto_end: Deferred::default(),
            commands: command_rx,
            view: view_tx,
        };
        let task = tokio::spawn(controller.run());

        (
            SessionHandle {
                commands: command_tx,
                view: view_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        info!(
            max_warnings = self.config.max_warnings,
            grace_ms = self.config.termination_grace_ms,
            toast_ms = self.config.toast_duration_ms,
            "session controller started"
        );

        // Timers, then signals, then commands: a command always observes what was already due.
        loop {
            tokio::select! {
                biased;
                _ = self.auto_end.elapsed() => self.on_grace_elapsed(),
                _ = self.toast_timer.elapsed() => self.on_toast_elapsed(),
                detected = next_detection(&mut self.source) => match detected {
                    Some(kind) => self.on_violation(kind, "detected"),
                    None => {
                        debug!("signal bus closed; detection stopped");
                        self.source = None;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command { action, reply }) => {
                        self.apply(action);
                        let _ = reply.send(self.snapshot());
                    }
                    None => break,
                },
            }
            self.publish();
        }

        self.leave_room();
        self.publish();
        info!("session controller stopped");
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Join { role, credential } => self.on_join(role, credential),
            Action::EndInterview => self.on_end(EndReason::Manual),
            Action::Reset => self.on_reset(),
            Action::Record { kind, origin } => self.on_violation(kind, origin),
            Action::ToggleCamera => {
                if self.in_interview("camera toggle") {
                    let camera = self.media.toggle_camera();
                    info!(?camera, "camera toggled");
                }
            }
            Action::ToggleMic => {
                if self.in_interview("mic toggle") {
                    let mic_on = self.media.toggle_mic();
                    info!(mic_on, "microphone toggled");
                }
            }
            Action::Snapshot => {}
        }
    }

    fn in_interview(&self, what: &str) -> bool {
        let active = self.session.phase() == Phase::Interview;
        if !active {
            debug!(phase = %self.session.phase(), what, "ignored outside interview");
        }
        active
    }

    fn on_join(&mut self, role: Role, credential: Option<Credential>) {
        if !self.session.join(role, credential) {
            debug!(phase = %self.session.phase(), "join ignored outside lobby");
            return;
        }
        self.toast.clear();
        self.source = ViolationEventSource::attach(&self.bus, role);
        self.media.open();
        info!(
            %role,
            detection = self.source.is_some(),
            credential = self.session.credential().is_some(),
            "interview started"
        );
    }

    fn on_violation(&mut self, kind: ViolationType, origin: &'static str) {
        let Some(violation) = self.session.record_violation(kind).cloned() else {
            debug!(%kind, origin, phase = %self.session.phase(), "violation ignored outside interview");
            return;
        };
        let count = self.session.ledger().len();
        let max = self.config.max_warnings;
        warn!(%kind, origin, count, max, "violation recorded");

        self.toast.present(&violation, count);
        self.toast_timer.arm(self.config.toast_duration());

        if count >= max && !self.auto_end.is_armed() {
            warn!(
                grace_ms = self.config.termination_grace_ms,
                "warning limit reached; interview will terminate"
            );
            self.auto_end.arm(self.config.termination_grace());
        }
    }

    fn on_grace_elapsed(&mut self) {
        self.on_end(EndReason::ViolationLimit);
    }

    fn on_toast_elapsed(&mut self) {
        self.toast.dismiss();
        debug!("warning toast dismissed");
    }

    fn on_end(&mut self, reason: EndReason) {
        if !self.session.end(reason) {
            debug!(phase = %self.session.phase(), %reason, "end ignored outside interview");
            return;
        }
        self.leave_room();
        info!(%reason, violations = self.session.ledger().len(), "interview ended");
    }

    fn on_reset(&mut self) {
        if !self.session.reset() {
            debug!(phase = %self.session.phase(), "reset ignored outside dashboard");
            return;
        }
        self.toast.clear();
        info!("session reset to lobby");
    }

    /// Drop everything scoped to the interview room.
    fn leave_room(&mut self) {
        self.source = None;
        self.toast_timer.cancel();
        self.auto_end.cancel();
        self.toast.clear();
        self.media.close();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.session.phase(),
            role: self.session.role(),
            credential: self.session.credential().cloned(),
            violations: self.session.ledger().entries().to_vec(),
            max_warnings: self.config.max_warnings,
            toast: self.toast.view(),
            camera: self.media.camera(),
            mic_on: self.media.mic_on(),
            termination_pending: self.auto_end.is_armed(),
            started_at: self.session.started_at(),
            ended_at: self.session.ended_at(),
            end_reason: self.session.end_reason(),
        }
    }

    fn publish(&self) {
        let next = self.snapshot();
        self.view.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VirtualMediaDevice;

    fn spawn_default() -> (SessionHandle, SignalBus) {
        let bus = SignalBus::default();
        let (handle, _task) = SessionController::spawn(
            Arc::new(ProctorConfig::default()),
            &bus,
            Box::new(VirtualMediaDevice::new()),
        );
        (handle, bus)
    }

    #[tokio::test(start_paused = true)]
    async fn deferred_fires_once_and_disarms() {
        let mut deferred = Deferred::default();
        assert!(!deferred.is_armed());
        deferred.arm(Duration::from_millis(10));
        assert!(deferred.is_armed());
        deferred.elapsed().await;
        assert!(!deferred.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_commands_are_ignored() {
        let (handle, _bus) = spawn_default();

        let snap = handle.end_interview().await.unwrap();
        assert_eq!(snap.phase, Phase::Lobby);
        let snap = handle.reset().await.unwrap();
        assert_eq!(snap.phase, Phase::Lobby);
        let snap = handle.simulate(ViolationType::PhoneDetected).await.unwrap();
        assert!(snap.violations.is_empty());

        handle.join(Role::Candidate, "").await.unwrap();
        let snap = handle.join(Role::Interviewer, "key").await.unwrap();
        assert_eq!(snap.role, Role::Candidate);
        assert!(snap.credential.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn join_opens_media_and_end_closes_it() {
        let (handle, _bus) = spawn_default();

        let snap = handle.join(Role::Interviewer, "key").await.unwrap();
        assert_eq!(snap.camera, CameraState::Live);
        assert!(snap.mic_on);

        let snap = handle.toggle_mic().await.unwrap();
        assert!(!snap.mic_on);
        let snap = handle.toggle_camera().await.unwrap();
        assert_eq!(snap.camera, CameraState::Off);

        let snap = handle.end_interview().await.unwrap();
        assert_eq!(snap.phase, Phase::Dashboard);
        assert_eq!(snap.end_reason, Some(EndReason::Manual));
        assert_eq!(snap.camera, CameraState::Off);
        assert!(snap.duration().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn current_tracks_published_snapshot() {
        let (handle, _bus) = spawn_default();
        let mut rx = handle.watch();

        handle.join(Role::Candidate, "key").await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().phase, Phase::Interview);
        assert_eq!(handle.current().phase, Phase::Interview);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handles_stop_the_task() {
        let bus = SignalBus::default();
        let device = VirtualMediaDevice::new();
        let probe = device.probe();
        let (handle, task) =
            SessionController::spawn(Arc::new(ProctorConfig::default()), &bus, Box::new(device));

        handle.join(Role::Candidate, "").await.unwrap();
        assert_eq!(probe.live_streams(), 1);
        assert_eq!(bus.subscriber_count(), 1);

        drop(handle);
        task.await.unwrap();
        assert_eq!(probe.live_streams(), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
