use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::encoding::{self, RGB_CHANNELS};
use crate::error::RemoteError;
use crate::viewport::{FramebufferOrigin, Viewport};

pub const MIN_CAPTURE_SIZE: u32 = 10;
pub const MAX_CAPTURE_SIZE: u32 = 2000;
pub const MIN_FRAME_DELAY: u32 = 1;
pub const MAX_FRAME_DELAY: u32 = 200;

pub const DEFAULT_CAPTURE_WIDTH: u32 = 800;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 600;
pub const DEFAULT_FRAME_DELAY: u32 = 50;
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureParams {
    pub width: u32,
    pub height: u32,
    pub frame_delay: u32,
    pub show_overlay: bool,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            frame_delay: DEFAULT_FRAME_DELAY,
            show_overlay: false,
        }
    }
}

impl CaptureParams {
    /// Builds parameters from raw request values, clamping each into its
    /// supported range.
    pub fn clamped(
        width: i64,
        height: i64,
        frame_delay: i64,
        show_overlay: bool,
    ) -> Self {
        Self {
            width: clamp_to(width, MIN_CAPTURE_SIZE, MAX_CAPTURE_SIZE),
            height: clamp_to(height, MIN_CAPTURE_SIZE, MAX_CAPTURE_SIZE),
            frame_delay: clamp_to(
                frame_delay,
                MIN_FRAME_DELAY,
                MAX_FRAME_DELAY,
            ),
            show_overlay,
        }
    }

    pub fn clamp(self) -> Self {
        Self::clamped(
            i64::from(self.width),
            i64::from(self.height),
            i64::from(self.frame_delay),
            self.show_overlay,
        )
    }
}

fn clamp_to(value: i64, min: u32, max: u32) -> u32 {
    value.clamp(i64::from(min), i64::from(max)) as u32
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CapturePhase {
    Idle,
    Requested,
    AwaitingFrame,
    Capturing,
    Delivered,
}

type Ticket = u64;

/// The single in-flight capture. Each variant carries exactly the data that
/// is valid in that phase.
enum Slot {
    Idle,
    Requested {
        ticket: Ticket,
        params: CaptureParams,
    },
    AwaitingFrame {
        ticket: Ticket,
        params: CaptureParams,
        requested_at_frame: u64,
        target_frame: u64,
    },
    Capturing { ticket: Ticket },
    Delivered {
        ticket: Ticket,
        result: Result<Vec<u8>, String>,
    },
}

impl Slot {
    fn phase(&self) -> CapturePhase {
        match self {
            Self::Idle => CapturePhase::Idle,
            Self::Requested { .. } => CapturePhase::Requested,
            Self::AwaitingFrame { .. } => CapturePhase::AwaitingFrame,
            Self::Capturing { .. } => CapturePhase::Capturing,
            Self::Delivered { .. } => CapturePhase::Delivered,
        }
    }
}

struct State {
    slot: Slot,
    next_ticket: Ticket,
    shutting_down: bool,
}

enum TickAction {
    None,
    Prepare(CaptureParams),
    Capture {
        ticket: Ticket,
        params: CaptureParams,
        requested_at_frame: u64,
    },
}

/// Hands a screenshot request from a worker thread to the main loop and the
/// encoded PNG back again. At most one capture is in flight; further callers
/// block until the slot is free.
pub struct CaptureCoordinator {
    state: Mutex<State>,
    changed: Condvar,
    timeout: Option<Duration>,
}

impl Default for CaptureCoordinator {
    fn default() -> Self {
        Self::new(Some(DEFAULT_CAPTURE_TIMEOUT))
    }
}

impl CaptureCoordinator {
    /// `timeout` bounds the whole `request_and_wait` call. `None` waits
    /// for as long as the main loop takes.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(State {
                slot: Slot::Idle,
                next_ticket: 1,
                shutting_down: false,
            }),
            changed: Condvar::new(),
            timeout,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.state.lock().slot.phase()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Called from a request thread. Blocks until the main loop has resized,
    /// waited `frame_delay` frames and encoded the framebuffer.
    pub fn request_and_wait(
        &self,
        params: CaptureParams,
    ) -> Result<Vec<u8>, RemoteError> {
        let params = params.clamp();
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.state.lock();

        loop {
            if state.shutting_down {
                return Err(RemoteError::ShuttingDown);
            }
            if matches!(state.slot, Slot::Idle) {
                break;
            }
            if deadline_passed(deadline) {
                return Err(self.timed_out());
            }
            self.wait(&mut state, deadline);
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.slot = Slot::Requested { ticket, params };

        debug!(
            "capture #{} requested: {}x{}, delay {} frames, overlay {}",
            ticket,
            params.width,
            params.height,
            params.frame_delay,
            params.show_overlay
        );

        loop {
            if state.shutting_down {
                return Err(RemoteError::ShuttingDown);
            }

            match std::mem::replace(&mut state.slot, Slot::Idle) {
                Slot::Delivered {
                    ticket: delivered,
                    result,
                } if delivered == ticket => {
                    self.changed.notify_all();
                    return result.map_err(RemoteError::CaptureFailed);
                }
                other => state.slot = other,
            }

            if deadline_passed(deadline) {
                let phase = state.slot.phase();
                state.slot = Slot::Idle;
                self.changed.notify_all();
                warn!(
                    "capture #{} timed out in phase {:?}; releasing slot",
                    ticket, phase
                );
                return Err(self.timed_out());
            }

            self.wait(&mut state, deadline);
        }
    }

    /// Called once per frame from the main loop thread. Viewport calls happen
    /// outside the lock.
    pub fn tick(&self, current_frame: u64, viewport: &mut dyn Viewport) {
        match self.advance(current_frame) {
            TickAction::None => {}
            TickAction::Prepare(params) => {
                viewport.resize_viewport(params.width, params.height);
                viewport.set_overlay_visible(params.show_overlay);
            }
            TickAction::Capture {
                ticket,
                params,
                requested_at_frame,
            } => {
                info!(
                    "Capture screenshot {}x{}; show overlay: {}",
                    params.width, params.height, params.show_overlay
                );
                debug!(
                    "capture #{} reading back at frame {} (requested at {})",
                    ticket, current_frame, requested_at_frame
                );
                let result = read_png(viewport);
                self.deliver(ticket, result);
            }
        }
    }

    /// Fails every current and future caller with `ShuttingDown`.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shutting_down = true;
        state.slot = Slot::Idle;
        self.changed.notify_all();
    }

    fn advance(&self, current_frame: u64) -> TickAction {
        let mut state = self.state.lock();
        if state.shutting_down {
            return TickAction::None;
        }

        match std::mem::replace(&mut state.slot, Slot::Idle) {
            Slot::Requested { ticket, params } => {
                let target_frame =
                    current_frame + u64::from(params.frame_delay);
                state.slot = Slot::AwaitingFrame {
                    ticket,
                    params,
                    requested_at_frame: current_frame,
                    target_frame,
                };
                TickAction::Prepare(params)
            }
            Slot::AwaitingFrame {
                ticket,
                params,
                requested_at_frame,
                target_frame,
            } if current_frame >= target_frame => {
                if current_frame > target_frame {
                    warn!(
                        "capture #{} missed target frame {} (now {}); capturing late",
                        ticket, target_frame, current_frame
                    );
                }
                state.slot = Slot::Capturing { ticket };
                TickAction::Capture {
                    ticket,
                    params,
                    requested_at_frame,
                }
            }
            other => {
                state.slot = other;
                TickAction::None
            }
        }
    }

    fn deliver(&self, ticket: Ticket, result: Result<Vec<u8>, String>) {
        let mut state = self.state.lock();
        let owns_slot = matches!(
            state.slot,
            Slot::Capturing { ticket: current } if current == ticket
        );

        if !owns_slot {
            debug!("discarding capture #{}; requester is gone", ticket);
            return;
        }

        if let Err(err) = &result {
            warn!("capture #{} failed: {}", ticket, err);
        }

        state.slot = Slot::Delivered { ticket, result };
        self.changed.notify_all();
    }

    fn wait(
        &self,
        state: &mut MutexGuard<'_, State>,
        deadline: Option<Instant>,
    ) {
        match deadline {
            Some(deadline) => {
                self.changed.wait_until(state, deadline);
            }
            None => self.changed.wait(state),
        }
    }

    fn timed_out(&self) -> RemoteError {
        RemoteError::CaptureTimedOut(self.timeout.unwrap_or_default())
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Reads back at the size the viewport actually has, which may differ from
/// the requested size.
fn read_png(viewport: &mut dyn Viewport) -> Result<Vec<u8>, String> {
    let (width, height) = viewport.viewport_size();
    let pixels = viewport.read_framebuffer_rgb(width, height)?;
    let flip = viewport.framebuffer_origin() == FramebufferOrigin::BottomLeft;
    encoding::encode_png(&pixels, width, height, RGB_CHANNELS, flip)
}
