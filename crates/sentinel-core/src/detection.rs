//! Violation event source: maps host environment signals to violation requests.
//!
//! The host (browser shell, terminal front end, tests) publishes [`EnvironmentSignal`]s on a
//! [`SignalBus`]. A [`ViolationEventSource`] is a live subscription to that bus and exists only
//! while a Candidate is in the interview; dropping it unsubscribes.

use crate::shared::{Role, ViolationType};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Passive signals delivered by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentSignal {
    VisibilityChanged(Visibility),
    FocusLost,
    FocusGained,
}

impl EnvironmentSignal {
    /// Hidden document → tab switch, lost focus → window blur. Everything else is benign.
    pub fn classify(self) -> Option<ViolationType> {
        match self {
            EnvironmentSignal::VisibilityChanged(Visibility::Hidden) => Some(ViolationType::TabSwitch),
            EnvironmentSignal::FocusLost => Some(ViolationType::WindowBlur),
            EnvironmentSignal::VisibilityChanged(Visibility::Visible) | EnvironmentSignal::FocusGained => None,
        }
    }
}

/// Host-side publisher of environment signals.
///
/// Every subscriber gets its own unbounded queue, so a burst published before the
/// controller runs is delivered in full and in order.
#[derive(Debug, Clone, Default)]
pub struct SignalBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<EnvironmentSignal>>>>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a signal. Returns how many subscribers saw it; zero is normal outside
    /// a candidate interview.
    pub fn emit(&self, signal: EnvironmentSignal) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(signal).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<EnvironmentSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<EnvironmentSignal>>> {
        // The list stays consistent even if a holder panicked mid-emit.
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Live subscription that turns qualifying signals into violation requests.
#[derive(Debug)]
pub struct ViolationEventSource {
    role: Role,
    rx: mpsc::UnboundedReceiver<EnvironmentSignal>,
}

impl ViolationEventSource {
    /// Subscribe for `role`. Interviewer sessions get no subscription at all.
    pub fn attach(bus: &SignalBus, role: Role) -> Option<Self> {
        match role {
            Role::Candidate => Some(Self {
                role,
                rx: bus.subscribe(),
            }),
            Role::Interviewer => None,
        }
    }

    /// Wait for the next signal that maps to a violation. Returns `None` once the bus is gone.
    ///
    /// Cancel safe: a qualifying signal is returned in the same poll it is received.
    pub async fn next_violation(&mut self) -> Option<ViolationType> {
        while let Some(signal) = self.rx.recv().await {
            if self.role != Role::Candidate {
                continue;
            }
            match signal.classify() {
                Some(kind) => return Some(kind),
                None => debug!(?signal, "benign environment signal"),
            }
        }
        None
    }
}
