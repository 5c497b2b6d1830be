//! The recognition loop.

use super::state::{
    ControllerConfig, ControllerError, ControllerSnapshot, LoopState, MatchPolicy, Status,
    TickOutcome,
};
use crate::attendance::{AttendanceApi, AttendanceMarker, DedupSet, MarkOutcome, MarkStatus};
use crate::capture::{Camera, CameraError, CameraSession, FrameSampler};
use crate::overlay::{OverlayRenderer, OverlaySink};
use crate::recognition::{RecognitionClient, RecognitionResult, RecognitionServiceError};
use chrono::{Local, Utc};
use std::cell::{Cell, Ref, RefCell};
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, trace, warn};

/// State that lives exactly as long as one start..stop span.
struct ActiveSession {
    id: u64,
    dedup: DedupSet,
}

/// Holds the in-flight flag for the duration of one tick.
struct BusyGuard<'a>(&'a Cell<bool>);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Periodically samples the camera, asks the matcher who is in frame and
/// marks matched identities, at most once per scope.
///
/// The controller is single-threaded: `start`, `stop`, `suspend` and
/// `resume` are synchronous and may be called from any task on the same
/// thread while [`run`](Self::run) is pending. No `RefCell` borrow is held
/// across an await, and every response is checked against the session it
/// was issued for before it may touch state.
pub struct RecognitionController<C: Camera, R, A, O> {
    config: ControllerConfig,
    camera: RefCell<CameraSession<C>>,
    sampler: FrameSampler,
    recognizer: R,
    marker: AttendanceMarker<A>,
    renderer: OverlayRenderer,
    overlay: RefCell<O>,
    state: Cell<LoopState>,
    session: RefCell<Option<ActiveSession>>,
    next_session: Cell<u64>,
    busy: Cell<bool>,
    wake: Notify,
    snapshot: watch::Sender<ControllerSnapshot>,
}

impl<C, R, A, O> RecognitionController<C, R, A, O>
where
    C: Camera,
    R: RecognitionClient,
    A: AttendanceApi,
    O: OverlaySink,
{
    pub fn new(
        config: ControllerConfig,
        camera: CameraSession<C>,
        sampler: FrameSampler,
        recognizer: R,
        marker: AttendanceMarker<A>,
        overlay: O,
    ) -> Self {
        let (snapshot, _) = watch::channel(ControllerSnapshot::default());
        Self {
            config,
            camera: RefCell::new(camera),
            sampler,
            recognizer,
            marker,
            renderer: OverlayRenderer,
            overlay: RefCell::new(overlay),
            state: Cell::new(LoopState::Idle),
            session: RefCell::new(None),
            next_session: Cell::new(1),
            busy: Cell::new(false),
            wake: Notify::new(),
            snapshot,
        }
    }

    /// Acquires the camera and opens a fresh session.
    ///
    /// A session that is already running is stopped first. On failure the
    /// controller stays idle with a blocking `camera_error` status and no
    /// ticks are scheduled.
    pub fn start(&self) -> Result<u64, ControllerError> {
        if self.session.borrow().is_some() {
            debug!("Restart requested; closing current session");
            self.teardown();
        }

        let acquired = self.camera.borrow_mut().start().map(|handle| handle.id());
        if let Err(e) = acquired {
            let error = ControllerError::from(e);
            error!(error = %error, "Camera unavailable");
            self.state.set(LoopState::Idle);
            self.publish(|s| {
                s.state = LoopState::Idle;
                s.status = Status::CameraError;
                s.message = Some(error.to_string());
                s.session_id = None;
            });
            return Err(error);
        }

        let id = self.next_session.get();
        self.next_session.set(id + 1);
        *self.session.borrow_mut() = Some(ActiveSession {
            id,
            dedup: DedupSet::new(),
        });
        self.state.set(LoopState::Active);
        self.publish(|s| {
            s.state = LoopState::Active;
            s.status = Status::Scanning;
            s.message = Some("Camera active, scanning".to_string());
            s.session_id = Some(id);
            s.last_result = None;
            s.last_mark = None;
        });
        self.wake.notify_waiters();

        info!(session = id, "Recognition session started");
        Ok(id)
    }

    /// Ends the session: no further ticks, in-flight responses are
    /// discarded, the dedup set is dropped and the camera released.
    /// Idempotent.
    pub fn stop(&self) {
        let Some(id) = self.teardown() else {
            self.camera.borrow_mut().stop();
            return;
        };
        self.publish(|s| {
            s.state = LoopState::Stopped;
            s.status = Status::Idle;
            s.message = Some("Camera stopped".to_string());
            s.session_id = None;
        });
        info!(session = id, "Recognition session stopped");
    }

    /// Pauses ticking while keeping the camera. Only valid when active.
    pub fn suspend(&self) {
        if self.state.get() != LoopState::Active {
            return;
        }
        self.state.set(LoopState::Suspended);
        self.publish(|s| s.state = LoopState::Suspended);
        self.wake.notify_waiters();
        debug!("Recognition suspended");
    }

    /// Resumes ticking after [`suspend`](Self::suspend).
    pub fn resume(&self) {
        if self.state.get() != LoopState::Suspended {
            return;
        }
        self.state.set(LoopState::Active);
        self.publish(|s| s.state = LoopState::Active);
        self.wake.notify_waiters();
        debug!("Recognition resumed");
    }

    pub fn state(&self) -> LoopState {
        self.state.get()
    }

    /// Current session id, if a session is open.
    pub fn session_id(&self) -> Option<u64> {
        self.session.borrow().as_ref().map(|s| s.id)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn camera(&self) -> Ref<'_, CameraSession<C>> {
        self.camera.borrow()
    }

    pub fn overlay(&self) -> Ref<'_, O> {
        self.overlay.borrow()
    }

    /// Drives the session opened by the last [`start`](Self::start) until
    /// it ends.
    ///
    /// The first tick runs immediately. The next one is armed only after
    /// the previous one settles, so there is never more than one timer
    /// and never more than one tick in flight. Returns at once if no
    /// session is open.
    pub async fn run(&self) {
        let Some(session_id) = self.session_id() else {
            debug!("run() without an open session");
            return;
        };

        while self.is_current(session_id) {
            match self.state.get() {
                LoopState::Active => {
                    let outcome = self.tick().await;
                    trace!(session = session_id, ?outcome, "Tick settled");
                    if !self.is_current(session_id) {
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.interval) => {}
                        _ = self.wake.notified() => {}
                    }
                }
                LoopState::Suspended => self.wake.notified().await,
                LoopState::Idle | LoopState::Stopped => break,
            }
        }

        debug!(session = session_id, "Recognition loop exited");
    }

    /// Runs one sample, recognize and mark cycle.
    ///
    /// Returns [`TickOutcome::Skipped`] without touching the camera when
    /// the controller is not active or another tick is still in flight.
    pub async fn tick(&self) -> TickOutcome {
        if self.state.get() != LoopState::Active {
            return TickOutcome::Skipped;
        }
        let Some(session_id) = self.session_id() else {
            return TickOutcome::Skipped;
        };
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            trace!("Previous tick still in flight");
            return TickOutcome::Skipped;
        };
        self.run_tick(session_id).await
    }

    async fn run_tick(&self, session_id: u64) -> TickOutcome {
        self.publish(|s| s.counters.ticks += 1);

        let read = self.camera.borrow_mut().read();
        let surface = match read {
            Ok(surface) => surface,
            Err(e) => {
                self.lose_camera(e);
                return TickOutcome::CameraLost;
            }
        };
        let Some(frame) = self.sampler.capture(&surface) else {
            self.publish(|s| s.counters.frames_skipped += 1);
            return TickOutcome::NoFrame;
        };
        let surface_size = (surface.width(), surface.height());
        let source_size = (frame.width(), frame.height());
        drop(surface);

        let timeout = self.config.request_timeout;
        let recognized = match tokio::time::timeout(
            timeout,
            self.recognizer.recognize(&frame, self.config.tolerance),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RecognitionServiceError::Timeout(timeout)),
        };

        if !self.is_current(session_id) {
            return self.discard(session_id, "recognition");
        }

        let result = match recognized {
            Ok(result) => result,
            Err(e) => {
                warn!(session = session_id, error = %e, "Recognition failed");
                self.present(None, surface_size, source_size);
                self.publish(|s| {
                    s.status = Status::MarkFailed;
                    s.message = Some(format!("Recognition unavailable: {e}"));
                    s.counters.recognition_failures += 1;
                });
                return TickOutcome::RecognitionFailed;
            }
        };
        self.present(Some(&result), surface_size, source_size);

        let Some(identity) = result.identity().cloned() else {
            let (status, outcome, message) = if result.face_detected() {
                (Status::UnknownFace, TickOutcome::Unknown, "Unknown face")
            } else {
                (Status::Scanning, TickOutcome::NoFace, "Scanning")
            };
            self.publish(|s| {
                s.status = status;
                s.message = Some(message.to_string());
                s.counters.recognitions += 1;
                if status == Status::UnknownFace {
                    s.counters.unknown_faces += 1;
                }
                s.last_result = Some(result);
            });
            return outcome;
        };

        info!(
            session = session_id,
            person = %identity.person_id,
            role = %identity.role,
            "Face matched"
        );
        self.publish(|s| {
            s.status = Status::Marking;
            s.message = Some(format!(
                "Recognized {} ({})",
                identity.display_name(),
                identity.role
            ));
            s.counters.recognitions += 1;
            s.counters.matches += 1;
            s.last_result = Some(result);
        });

        let scope = self.config.scope.key(session_id, Local::now().date_naive());
        // Taken out so no borrow spans the mark call
        let mut dedup = match self.session.borrow_mut().as_mut() {
            Some(session) => std::mem::take(&mut session.dedup),
            None => return TickOutcome::Discarded,
        };
        let mark = self
            .marker
            .mark(&mut dedup, &identity.person_id, identity.role, scope)
            .await;

        if !self.is_current(session_id) {
            return self.discard(session_id, "mark");
        }
        if let Some(session) = self.session.borrow_mut().as_mut() {
            session.dedup = dedup;
        }

        self.apply_mark(&mark, identity.display_name());

        if self.config.match_policy == MatchPolicy::StopAfterMatch && mark.outcome.is_terminal() {
            info!(session = session_id, "Match handled; ending session");
            // Status keeps the match result for display
            if self.teardown().is_some() {
                self.publish(|s| {
                    s.state = LoopState::Stopped;
                    s.session_id = None;
                });
            }
        }

        TickOutcome::Matched(mark)
    }

    fn apply_mark(&self, mark: &MarkOutcome, name: &str) {
        let (status, message) = match mark.outcome {
            MarkStatus::Marked => (Status::Matched, format!("Attendance marked for {name}")),
            MarkStatus::AlreadyMarked => {
                (Status::AlreadyMarked, format!("{name} is already marked"))
            }
            MarkStatus::Failed => (
                Status::MarkFailed,
                format!(
                    "Could not mark {name}: {}",
                    mark.detail.as_deref().unwrap_or("unknown error")
                ),
            ),
        };
        self.publish(|s| {
            s.status = status;
            s.message = Some(message);
            if !mark.from_cache {
                s.counters.mark_requests += 1;
            }
            match mark.outcome {
                MarkStatus::Marked => s.counters.marks_recorded += 1,
                MarkStatus::AlreadyMarked => s.counters.already_marked += 1,
                MarkStatus::Failed => s.counters.mark_failures += 1,
            }
            s.last_mark = Some(mark.clone());
        });
    }

    fn present(&self, result: Option<&RecognitionResult>, surface: (u32, u32), source: (u32, u32)) {
        let overlay = self.renderer.render(result, surface, source);
        let state = overlay.state;
        self.overlay.borrow_mut().present(&overlay);
        self.publish(|s| s.overlay = state);
    }

    fn discard(&self, session_id: u64, stage: &str) -> TickOutcome {
        debug!(session = session_id, stage, "Discarding response for closed session");
        self.publish(|s| s.counters.discarded_responses += 1);
        TickOutcome::Discarded
    }

    fn lose_camera(&self, e: CameraError) {
        let error = ControllerError::from(e);
        error!(error = %error, "Camera lost mid-session");
        self.teardown();
        self.publish(|s| {
            s.state = LoopState::Stopped;
            s.status = Status::CameraError;
            s.message = Some(error.to_string());
            s.session_id = None;
        });
    }

    /// Drops the session and dedup set, releases the camera and clears the
    /// overlay. Returns the id of the session that was closed.
    fn teardown(&self) -> Option<u64> {
        let closed = self.session.borrow_mut().take()?;
        self.camera.borrow_mut().stop();
        self.overlay.borrow_mut().clear();
        self.state.set(LoopState::Stopped);
        self.publish(|s| s.overlay = crate::overlay::OverlayState::Idle);
        self.wake.notify_waiters();
        Some(closed.id)
    }

    fn is_current(&self, session_id: u64) -> bool {
        self.session_id() == Some(session_id)
    }

    fn publish(&self, update: impl FnOnce(&mut ControllerSnapshot)) {
        self.snapshot.send_modify(|s| {
            update(s);
            s.updated_at = Utc::now();
        });
    }
}
