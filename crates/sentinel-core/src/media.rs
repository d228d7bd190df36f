//! Media capture collaborator: camera + microphone stream for the local tile.
//!
//! Acquisition failures are never fatal. The room degrades to [`CameraState::Unavailable`]
//! and the interview carries on.

use crate::error::{SentinelError, SentinelResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Opaque handle to a live capture stream.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: u64,
}

/// Device access provided by the host.
pub trait MediaDevice: Send {
    fn acquire(&mut self, video: bool, audio: bool) -> SentinelResult<StreamHandle>;
    fn release(&mut self, handle: StreamHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    /// Stream attached to the local tile.
    Live,
    /// Turned off by the participant.
    Off,
    /// Acquisition failed (permission denied, no device).
    Unavailable,
}

/// Local media state of the interview room.
pub struct MediaRoom {
    device: Box<dyn MediaDevice>,
    stream: Option<StreamHandle>,
    camera: CameraState,
    mic_on: bool,
}

impl MediaRoom {
    pub fn new(device: Box<dyn MediaDevice>) -> Self {
        Self {
            device,
            stream: None,
            camera: CameraState::Off,
            mic_on: true,
        }
    }

    pub fn camera(&self) -> CameraState {
        self.camera
    }

    pub fn mic_on(&self) -> bool {
        self.mic_on
    }

    /// Entering the room: camera and microphone start on.
    pub fn open(&mut self) {
        self.mic_on = true;
        self.start_camera();
    }

    /// Camera on ↔ off. Turning it on again retries a previously failed acquisition.
    pub fn toggle_camera(&mut self) -> CameraState {
        match self.camera {
            CameraState::Live => {
                self.stop_camera();
                self.camera = CameraState::Off;
            }
            CameraState::Off | CameraState::Unavailable => self.start_camera(),
        }
        self.camera
    }

    pub fn toggle_mic(&mut self) -> bool {
        self.mic_on = !self.mic_on;
        self.mic_on
    }

    /// Leaving the room: release the device.
    pub fn close(&mut self) {
        self.stop_camera();
        self.camera = CameraState::Off;
    }

    fn start_camera(&mut self) {
        self.stop_camera();
        match self.device.acquire(true, true) {
            Ok(handle) => {
                info!(stream_id = handle.id, "camera stream acquired");
                self.stream = Some(handle);
                self.camera = CameraState::Live;
            }
            Err(e) => {
                warn!(error = %e, "camera access denied; continuing with camera off");
                self.camera = CameraState::Unavailable;
            }
        }
    }

    fn stop_camera(&mut self) {
        if let Some(handle) = self.stream.take() {
            info!(stream_id = handle.id, "camera stream released");
            self.device.release(handle);
        }
    }
}

impl Drop for MediaRoom {
    fn drop(&mut self) {
        self.stop_camera();
    }
}

/// Read-only view of a [`VirtualMediaDevice`]'s live stream count.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    live: Arc<AtomicUsize>,
}

impl MediaProbe {
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// In-process device for terminal sessions and tests: no hardware, optional denial.
#[derive(Debug)]
pub struct VirtualMediaDevice {
    permission_granted: bool,
    next_id: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl VirtualMediaDevice {
    pub fn new() -> Self {
        Self {
            permission_granted: true,
            next_id: AtomicU64::new(1),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A device whose every acquisition fails as if permission was refused.
    pub fn denied() -> Self {
        Self {
            permission_granted: false,
            ..Self::new()
        }
    }

    pub fn probe(&self) -> MediaProbe {
        MediaProbe {
            live: Arc::clone(&self.live),
        }
    }
}

impl Default for VirtualMediaDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDevice for VirtualMediaDevice {
    fn acquire(&mut self, video: bool, audio: bool) -> SentinelResult<StreamHandle> {
        if !self.permission_granted {
            return Err(SentinelError::MediaDevice("permission denied".to_string()));
        }
        if !(video || audio) {
            return Err(SentinelError::MediaDevice("no tracks requested".to_string()));
        }
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(StreamHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn release(&mut self, _handle: StreamHandle) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
