//! Engine module - scheduling and arbitration of the single touch contact
//!
//! The engine owns:
//! - The shared input state written by the delivery side (keys, mouse
//!   deltas, scroll steps, tap queue)
//! - The mode state machine gating when mapping is active
//! - Per-control sessions (camera, joystick, wheel) and the camera
//!   boundary-recenter protocol
//! - The fixed-rate tick loop dispatching to exactly one control per tick
//!
//! Two execution contexts touch the engine: the input-delivery side calls
//! [`Engine::handle_event`] (lock, update, return — never inject, never
//! block), and the scheduler task runs ticks and is the only caller of the
//! injection primitive.

mod camera;
mod input;
mod joystick;
mod session;
mod tap;
mod tick;
mod wheel;

pub use input::{InputEvent, MouseButton, Trigger};
pub use session::{
    CameraSession, JoystickSession, Mode, RecenterState, Shared, TapRequest, WheelSession,
};

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::{AppConfig, CustomMapping, ProfileConfig};
use crate::geometry::{jitter, Point};
use crate::inject::Injector;
use crate::keys::{keycode_for, KeyCode};
use crate::probe::TargetProbe;

/// Key bindings and trigger specs, resolved once at startup.
pub(crate) struct Bindings {
    pub enable: KeyCode,
    pub panic: KeyCode,
    pub camera_lock: KeyCode,
    pub backpack: KeyCode,
    pub move_up: KeyCode,
    pub move_down: KeyCode,
    pub move_left: KeyCode,
    pub move_right: KeyCode,
    pub fire: Trigger,
    pub scope: Trigger,
    pub fire_label: String,
    pub scope_label: String,
    pub custom: HashMap<KeyCode, CustomMapping>,
    pub jitter_default_px: f64,
}

/// Status record returned by [`Engine::status`]
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub mapping_enabled: bool,
    pub camera_lock: bool,
    pub backpack_open: bool,
    pub target_active: bool,
    pub mode: String,
    pub move_keys: MoveKeyStatus,
    pub camera_active: bool,
    pub joystick_active: bool,
    pub wheel_active: bool,
    pub recenter_pending: bool,
    pub pending_taps: usize,
    pub injector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Per-direction key state, for diagnosing "stick does not move" reports
#[derive(Debug, Clone, Serialize)]
pub struct MoveKeyStatus {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Main engine orchestrating mode, sessions, and the tick scheduler
pub struct Engine {
    /// Active tuning profile (hot-reloadable)
    pub(crate) profile: RwLock<ProfileConfig>,
    pub(crate) binds: Bindings,
    pub(crate) injector: Arc<dyn Injector>,
    pub(crate) probe: Arc<dyn TargetProbe>,
    /// The single shared-state lock of the two-context model
    pub(crate) shared: Mutex<Shared>,
    pub(crate) running: AtomicBool,
    /// Last emission per warning class, for 1/s rate limiting
    warn_gate: Mutex<HashMap<&'static str, Instant>>,
}

impl Engine {
    /// Create an engine from a validated config and selected profile.
    ///
    /// Unresolvable hotkeys are fatal here; invalid custom mappings are
    /// skipped with a warning.
    pub fn new(
        config: &AppConfig,
        profile: ProfileConfig,
        injector: Arc<dyn Injector>,
        probe: Arc<dyn TargetProbe>,
    ) -> Result<Self> {
        let g = &config.global;
        let mut custom = HashMap::new();
        for mapping in &config.custom_mappings {
            match keycode_for(&mapping.key) {
                Ok(code) => {
                    custom.insert(code, mapping.clone());
                }
                Err(e) => warn!("Ignoring custom mapping {:?}: {}", mapping.name, e),
            }
        }

        let binds = Bindings {
            enable: keycode_for(&g.enable_hotkey).context("enable_hotkey")?,
            panic: keycode_for(&g.panic_hotkey).context("panic_hotkey")?,
            camera_lock: keycode_for(&g.camera_lock_key).context("camera_lock_key")?,
            backpack: keycode_for(&g.backpack_key).context("backpack_key")?,
            move_up: keycode_for(&g.move_up_key).context("move_up_key")?,
            move_down: keycode_for(&g.move_down_key).context("move_down_key")?,
            move_left: keycode_for(&g.move_left_key).context("move_left_key")?,
            move_right: keycode_for(&g.move_right_key).context("move_right_key")?,
            fire: Trigger::parse(&g.fire_key).context("fire_key")?,
            scope: Trigger::parse(&g.scope_key).context("scope_key")?,
            fire_label: g.fire_key.clone(),
            scope_label: g.scope_key.clone(),
            custom,
            jitter_default_px: g.jitter_default_px,
        };

        Ok(Self {
            profile: RwLock::new(profile),
            binds,
            injector,
            probe,
            shared: Mutex::new(Shared::default()),
            running: AtomicBool::new(false),
            warn_gate: Mutex::new(HashMap::new()),
        })
    }

    pub fn is_mapping_enabled(&self) -> bool {
        self.shared.lock().mapping_enabled
    }

    pub fn current_mode(&self) -> Mode {
        self.shared.lock().mode
    }

    /// Enable or disable mapping. Disabling also drops camera-lock and
    /// backpack state and releases anything held.
    pub async fn set_mapping_enabled(&self, enabled: bool) {
        {
            let mut shared = self.shared.lock();
            shared.mapping_enabled = enabled;
            if !enabled {
                shared.camera_lock = false;
                shared.backpack_open = false;
            }
        }
        info!("mapping {}", if enabled { "enabled" } else { "disabled" });
        if !enabled {
            self.safe_release_all().await;
        }
    }

    pub fn set_camera_lock(&self, enabled: bool) {
        let mut shared = self.shared.lock();
        shared.camera_lock = enabled;
        if enabled {
            shared.backpack_open = false;
        }
        drop(shared);
        info!("camera lock {}", if enabled { "on" } else { "off" });
    }

    /// Toggle the backpack: opening forces Free mode (camera unlocked),
    /// closing re-locks the camera. Either way the backpack button itself
    /// is tapped, with a pre-release and a short settle delay.
    pub fn toggle_backpack(&self) {
        let (point, hold_ms, label) = {
            let profile = self.profile.read();
            (
                profile.points.backpack,
                profile.fire.hold_ms.max(60),
                "backpack".to_string(),
            )
        };
        let opening = {
            let mut shared = self.shared.lock();
            let opening = !shared.backpack_open;
            shared.backpack_open = opening;
            shared.camera_lock = !opening;
            shared.tap_queue.push_back(TapRequest {
                name: "backpack".to_string(),
                label,
                point,
                hold: Duration::from_millis(hold_ms),
                jitter_px: None,
                pre_release: true,
                pre_delay: Duration::from_millis(35),
            });
            opening
        };
        info!("backpack {}", if opening { "opened" } else { "closed" });
    }

    /// Emergency stop: disable mapping, empty every session, and release
    /// whatever is held. Always succeeds locally even if the release call
    /// itself fails. Idempotent.
    pub async fn panic(&self) {
        {
            let mut shared = self.shared.lock();
            shared.mapping_enabled = false;
            shared.camera_lock = false;
            shared.backpack_open = false;
        }
        warn!("panic: mapping disabled, releasing all held points");
        self.safe_release_all().await;
    }

    /// Stop the scheduler loop after the current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Swap in a new tuning profile (from config hot-reload).
    pub fn update_profile(&self, profile: ProfileConfig) {
        let name = profile.name.clone();
        *self.profile.write() = profile;
        info!("profile updated: {}", name);
    }

    /// Point-in-time status record for the control surface.
    pub fn status(&self) -> EngineStatus {
        let shared = self.shared.lock();
        EngineStatus {
            mapping_enabled: shared.mapping_enabled,
            camera_lock: shared.camera_lock,
            backpack_open: shared.backpack_open,
            target_active: shared.target_active,
            mode: shared.mode.to_string(),
            move_keys: MoveKeyStatus {
                up: shared.keys_down.contains(&self.binds.move_up),
                down: shared.keys_down.contains(&self.binds.move_down),
                left: shared.keys_down.contains(&self.binds.move_left),
                right: shared.keys_down.contains(&self.binds.move_right),
            },
            camera_active: shared.camera.active,
            joystick_active: shared.joystick.active,
            wheel_active: shared.wheel.active,
            recenter_pending: shared.recenter.pending,
            pending_taps: shared.tap_queue.len(),
            injector: self.injector.name().to_string(),
            warning: shared.warning.clone(),
        }
    }

    /// Reset every session and close any held touch point. Idempotent; the
    /// one operation allowed to bypass per-control release sequencing.
    pub(crate) async fn safe_release_all(&self) {
        let mode = {
            let mut shared = self.shared.lock();
            shared.clear_sessions();
            shared.recenter = RecenterState::default();
            shared.mode
        };
        if let Err(e) = self.injector.release_all().await {
            if self.warn_ok("release_all_failed") {
                warn!("release_all failed: {}", e);
            }
        }
        // the virtual touch point must not expose a visible pointer
        if mode == Mode::Battle {
            let _ = self.injector.hide_cursor().await;
        }
    }

    /// Rate limit gate: true at most once per second per warning class.
    pub(crate) fn warn_ok(&self, class: &'static str) -> bool {
        let mut gate = self.warn_gate.lock();
        let now = Instant::now();
        match gate.get(class) {
            Some(last) if now.duration_since(*last) < Duration::from_secs(1) => false,
            _ => {
                gate.insert(class, now);
                true
            }
        }
    }

    /// Randomized touch placement near `center`, falling back to the global
    /// default jitter radius.
    pub(crate) fn jittered(&self, center: Point, radius: Option<f64>) -> Point {
        let r = radius.unwrap_or(self.binds.jitter_default_px);
        jitter(center, r, &mut rand::thread_rng())
    }
}
