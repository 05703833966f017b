use crate::tracking::model::{
    ActiveWindowSnapshot, DisplayInfo, DisplayLinkTick, MaskDiagnostics, PointerEvent, ProcessId,
    TrackingPolicy, WindowId,
};
use crate::tracking::OverlayController;
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::mpsc::{channel, sync_channel, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const TRACKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
/// Wait used while nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Everything that can happen to the tracker, serialized onto one thread.
#[derive(Debug)]
pub enum TrackerEvent {
    Pointer(PointerEvent),
    DisplayLink(DisplayLinkTick),
    DisplaysChanged(Vec<DisplayInfo>),
    AppActivated(Option<ProcessId>),
    ExcludedWindows(HashSet<WindowId>),
    PolicyChanged(Arc<TrackingPolicy>),
    Prime(Option<ActiveWindowSnapshot>),
    /// Activation hotkey: start or stop tracking.
    SetEnabled(bool),
    Diagnostics(Sender<MaskDiagnostics>),
    /// Stops tracking and acknowledges once every display is cleared.
    Stop(SyncSender<()>),
    Shutdown,
}

pub struct TrackerRuntime {
    sender: Sender<TrackerEvent>,
    handle: Option<JoinHandle<()>>,
}

impl TrackerRuntime {
    pub fn spawn(controller: OverlayController) -> Result<Self> {
        let (sender, receiver) = channel::<TrackerEvent>();
        let handle = thread::Builder::new()
            .name("focus-tracker".to_string())
            .spawn(move || run_loop(controller, receiver))
            .map_err(|err| anyhow!("failed to spawn tracker thread: {err}"))?;
        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> Sender<TrackerEvent> {
        self.sender.clone()
    }

    pub fn send(&self, event: TrackerEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| anyhow!("tracker thread is not running"))
    }

    pub fn start(&self) -> Result<()> {
        self.send(TrackerEvent::SetEnabled(true))
    }

    /// Returns once the tracker has cleared every display.
    pub fn stop(&self) -> Result<()> {
        let (ack_tx, ack_rx) = sync_channel(1);
        self.send(TrackerEvent::Stop(ack_tx))?;
        ack_rx
            .recv_timeout(TRACKER_JOIN_TIMEOUT)
            .map_err(|err| anyhow!("tracker did not acknowledge stop: {err}"))
    }

    pub fn diagnostics(&self) -> Result<MaskDiagnostics> {
        let (reply_tx, reply_rx) = channel();
        self.send(TrackerEvent::Diagnostics(reply_tx))?;
        reply_rx
            .recv_timeout(TRACKER_JOIN_TIMEOUT)
            .map_err(|err| anyhow!("tracker did not report diagnostics: {err}"))
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let _ = self.sender.send(TrackerEvent::Shutdown);
        join_with_timeout(handle)
    }
}

impl Drop for TrackerRuntime {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown_inner() {
            tracing::error!(?err, "tracker shutdown failed");
        }
    }
}

fn join_with_timeout(handle: JoinHandle<()>) -> Result<()> {
    let (done_tx, done_rx) = channel();
    thread::spawn(move || {
        let _ = done_tx.send(handle.join());
    });
    match done_rx.recv_timeout(TRACKER_JOIN_TIMEOUT) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(anyhow!("tracker thread panicked")),
        Err(RecvTimeoutError::Timeout) => Err(anyhow!("tracker thread join timed out")),
        Err(RecvTimeoutError::Disconnected) => {
            Err(anyhow!("tracker thread join channel disconnected"))
        }
    }
}

/// Applies one event. Returns `false` when the loop should exit.
fn handle_event(controller: &mut OverlayController, event: TrackerEvent) -> bool {
    let now = Instant::now();
    match event {
        TrackerEvent::Pointer(pointer) => controller.pointer(pointer, now),
        TrackerEvent::DisplayLink(tick) => controller.handle_display_link(tick),
        TrackerEvent::DisplaysChanged(displays) => controller.displays_changed(displays),
        TrackerEvent::AppActivated(process) => controller.set_preferred_process(process, now),
        TrackerEvent::ExcludedWindows(windows) => controller.set_excluded_windows(windows),
        TrackerEvent::PolicyChanged(policy) => controller.set_policy(policy),
        TrackerEvent::Prime(snapshot) => controller.prime_overlay_mask(snapshot),
        TrackerEvent::SetEnabled(true) => controller.start(now),
        TrackerEvent::SetEnabled(false) => controller.stop(),
        TrackerEvent::Diagnostics(reply) => {
            let _ = reply.send(controller.diagnostics_snapshot());
        }
        TrackerEvent::Stop(ack) => {
            controller.stop();
            let _ = ack.send(());
        }
        TrackerEvent::Shutdown => return false,
    }
    true
}

fn run_loop(mut controller: OverlayController, receiver: Receiver<TrackerEvent>) {
    tracing::debug!("tracker loop started");
    loop {
        let wait = controller
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);
        match receiver.recv_timeout(wait) {
            Ok(event) => {
                if !handle_event(&mut controller, event) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if controller
            .next_deadline()
            .is_some_and(|deadline| deadline <= now)
        {
            controller.tick(now);
        }
    }
    controller.stop();
    tracing::debug!("tracker loop exited");
}
