//! Session and shared-state records for the scheduler
//!
//! The consumer accepts a single simultaneous touch contact, so at most one
//! of the camera/joystick/wheel sessions may be active at any instant; each
//! service's entry step releases the other two before pressing.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::geometry::Point;
use crate::inject::CursorSnapshot;
use crate::keys::KeyCode;

/// Mapping mode, derived every tick from the control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Mapping disabled or target not active: nothing is injected.
    #[default]
    Paused,
    /// Mapping active, camera unlocked (or backpack open): taps and wheel only.
    Free,
    /// Camera locked, backpack closed: all four controls live, input captured.
    Battle,
}

impl Mode {
    /// Transition rule, evaluated once per tick before dispatch.
    pub fn derive(
        mapping_enabled: bool,
        target_active: bool,
        camera_lock: bool,
        backpack_open: bool,
    ) -> Mode {
        if !mapping_enabled || !target_active {
            Mode::Paused
        } else if backpack_open || !camera_lock {
            Mode::Free
        } else {
            Mode::Battle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Paused => "paused",
            Mode::Free => "free",
            Mode::Battle => "battle",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A queued discrete tap. Consumed exactly once, FIFO, with highest
/// dispatch priority.
#[derive(Debug, Clone)]
pub struct TapRequest {
    pub name: String,
    pub label: String,
    pub point: Point,
    pub hold: Duration,
    pub jitter_px: Option<f64>,
    /// Release any held point before acting
    pub pre_release: bool,
    /// Settle delay after the pre-release, for UI elements that need it
    pub pre_delay: Duration,
}

/// Camera look-drag: held and dragged in a small radius around the anchor.
#[derive(Debug, Clone, Default)]
pub struct CameraSession {
    pub active: bool,
    pub touch_pos: Option<Point>,
    pub last_drag_at: Option<Instant>,
}

/// Joystick press-hold: the center is fixed for the life of one hold cycle
/// so the stick does not drift mid-hold.
#[derive(Debug, Clone, Default)]
pub struct JoystickSession {
    pub active: bool,
    pub center: Option<Point>,
    pub touch_pos: Option<Point>,
    pub last_at: Option<Instant>,
}

/// Scroll-wheel drag: accumulates signed steps and self-terminates after a
/// quiet period.
#[derive(Debug, Clone, Default)]
pub struct WheelSession {
    pub active: bool,
    /// Desktop cursor position to restore (Free mode only)
    pub cursor_origin: Option<Point>,
    /// Press anchor: event position in Free mode, configured anchor in Battle
    pub touch_origin: Option<Point>,
    pub touch_pos: Option<Point>,
    pub last_wheel_at: Option<Instant>,
    /// Net scroll steps still to consume (one per serviced tick)
    pub pending_steps: i32,
}

/// Camera boundary-recenter sub-protocol.
///
/// While `pending && !ready` no press may occur (the warp is still in
/// flight and its echo must not count as user motion). While
/// `pending && ready` the arbiter waits for a genuine motion sample away
/// from the target before re-pressing.
#[derive(Debug, Clone, Default)]
pub struct RecenterState {
    pub pending: bool,
    pub ready: bool,
    pub target: Option<Point>,
    /// Timestamp of the last real mouse motion seen when the recenter began
    pub started_mouse_at: Option<Instant>,
}

/// Everything shared between the input-delivery context and the scheduler,
/// guarded by one lock. Injection never happens while this is held.
#[derive(Debug, Default)]
pub struct Shared {
    // live input state, written by the delivery side
    pub keys_down: HashSet<KeyCode>,
    pub mouse_dx: f64,
    pub mouse_dy: f64,
    pub last_mouse_at: Option<Instant>,
    pub last_mouse_pos: Option<Point>,
    pub tap_queue: VecDeque<TapRequest>,

    // control flags
    pub mapping_enabled: bool,
    pub camera_lock: bool,
    pub backpack_open: bool,
    pub target_active: bool,

    // scheduler state
    pub mode: Mode,
    pub camera: CameraSession,
    pub joystick: JoystickSession,
    pub wheel: WheelSession,
    pub recenter: RecenterState,
    pub last_camera_at: Option<Instant>,
    pub last_joystick_at: Option<Instant>,
    /// Grace window during which the camera may not preempt the joystick
    pub joy_hold_until: Option<Instant>,
    pub last_target_check: Option<Instant>,
    pub battle_cursor_snap: Option<CursorSnapshot>,
    /// Persistent startup warning (permissions/environment), if any
    pub warning: Option<String>,
}

impl Shared {
    /// Reset every session record. Does not touch the control flags.
    pub fn clear_sessions(&mut self) {
        self.camera = CameraSession::default();
        self.joystick = JoystickSession::default();
        self.wheel = WheelSession::default();
        self.joy_hold_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_derivation_table() {
        // mapping disabled or target inactive always pauses
        assert_eq!(Mode::derive(false, true, true, false), Mode::Paused);
        assert_eq!(Mode::derive(true, false, true, false), Mode::Paused);
        // backpack open or camera unlocked falls back to free
        assert_eq!(Mode::derive(true, true, false, false), Mode::Free);
        assert_eq!(Mode::derive(true, true, true, true), Mode::Free);
        // locked camera, closed backpack: battle
        assert_eq!(Mode::derive(true, true, true, false), Mode::Battle);
    }

    #[test]
    fn test_clear_sessions_preserves_flags() {
        let mut shared = Shared {
            mapping_enabled: true,
            camera_lock: true,
            ..Default::default()
        };
        shared.camera.active = true;
        shared.wheel.pending_steps = 3;

        shared.clear_sessions();

        assert!(!shared.camera.active);
        assert_eq!(shared.wheel.pending_steps, 0);
        assert!(shared.mapping_enabled);
        assert!(shared.camera_lock);
    }
}
