//! Configuration management for Touch GW
//!
//! Handles loading, validating, and hot-reloading of YAML configuration
//! files. Key names and trigger specs are resolved eagerly so that typos are
//! fatal at startup rather than silent at runtime.

pub mod watcher;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::geometry::Point;
use crate::keys::keycode_for;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub target_window: TargetWindowConfig,
    #[serde(default)]
    pub global: GlobalConfig,
    pub profiles: Vec<ProfileConfig>,
    #[serde(default)]
    pub custom_mappings: Vec<CustomMapping>,
}

/// Target window matching (detection itself is a platform collaborator)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetWindowConfig {
    #[serde(default = "default_title_hint")]
    pub title_hint: String,
    /// When false, mapping applies to any foreground app while enabled.
    #[serde(default)]
    pub enabled: bool,
}

impl Default for TargetWindowConfig {
    fn default() -> Self {
        Self {
            title_hint: default_title_hint(),
            enabled: false,
        }
    }
}

/// Hotkeys, movement keys, and trigger bindings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default = "default_enable_hotkey")]
    pub enable_hotkey: String,
    #[serde(default = "default_panic_hotkey")]
    pub panic_hotkey: String,
    #[serde(default = "default_camera_lock_key")]
    pub camera_lock_key: String,
    #[serde(default = "default_backpack_key")]
    pub backpack_key: String,
    #[serde(default = "default_move_up_key")]
    pub move_up_key: String,
    #[serde(default = "default_move_down_key")]
    pub move_down_key: String,
    #[serde(default = "default_move_left_key")]
    pub move_left_key: String,
    #[serde(default = "default_move_right_key")]
    pub move_right_key: String,
    /// "MouseLeft", "MouseRight", or any key name
    #[serde(default = "default_fire_key")]
    pub fire_key: String,
    #[serde(default = "default_scope_key")]
    pub scope_key: String,
    /// Fallback jitter radius for controls that don't set their own
    #[serde(default)]
    pub jitter_default_px: f64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            enable_hotkey: default_enable_hotkey(),
            panic_hotkey: default_panic_hotkey(),
            camera_lock_key: default_camera_lock_key(),
            backpack_key: default_backpack_key(),
            move_up_key: default_move_up_key(),
            move_down_key: default_move_down_key(),
            move_left_key: default_move_left_key(),
            move_right_key: default_move_right_key(),
            fire_key: default_fire_key(),
            scope_key: default_scope_key(),
            jitter_default_px: 0.0,
        }
    }
}

/// Named tuning profile: screen points plus per-control parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileConfig {
    pub name: String,
    pub points: ProfilePoints,
    #[serde(default)]
    pub joystick: JoystickConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub fire: TapActionConfig,
    #[serde(default)]
    pub scope: TapActionConfig,
    #[serde(default)]
    pub wheel: WheelConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Screen coordinates of the virtual controls
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ProfilePoints {
    pub joystick_center: Point,
    pub camera_anchor: Point,
    pub fire: Point,
    pub scope: Point,
    pub backpack: Point,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JoystickConfig {
    #[serde(default = "default_joystick_radius")]
    pub radius_px: f64,
    /// Minimum hold window after a drag before the camera may preempt
    #[serde(default = "default_joystick_tau")]
    pub tau_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_px: Option<f64>,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            radius_px: default_joystick_radius(),
            tau_ms: default_joystick_tau(),
            jitter_px: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    /// Accumulated-motion dead zone below which the camera stays idle
    #[serde(default = "default_camera_deadzone")]
    pub deadzone_px: f64,
    /// Maximum drag distance from the anchor before recentering
    #[serde(default = "default_camera_radius")]
    pub radius_px: f64,
    /// Per-tick consumption budget for accumulated mouse motion
    #[serde(default = "default_camera_budget")]
    pub budget_px: f64,
    #[serde(default)]
    pub invert_y: bool,
    #[serde(default = "default_camera_sensitivity")]
    pub sensitivity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_px: Option<f64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            deadzone_px: default_camera_deadzone(),
            radius_px: default_camera_radius(),
            budget_px: default_camera_budget(),
            invert_y: false,
            sensitivity: default_camera_sensitivity(),
            jitter_px: None,
        }
    }
}

/// A discrete tap binding (fire, scope)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TapActionConfig {
    #[serde(default = "default_tap_hold")]
    pub hold_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_px: Option<f64>,
}

impl Default for TapActionConfig {
    fn default() -> Self {
        Self {
            hold_ms: default_tap_hold(),
            jitter_px: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WheelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Vertical drag distance per scroll step
    #[serde(default = "default_wheel_step")]
    pub step_px: f64,
    /// Quiet period after which the wheel session releases
    #[serde(default = "default_wheel_stop")]
    pub stop_ms: u64,
    #[serde(default)]
    pub invert: bool,
    /// Drag anchor while the camera is locked; falls back to the camera anchor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_px: Option<f64>,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            step_px: default_wheel_step(),
            stop_ms: default_wheel_stop(),
            invert: false,
            anchor: None,
            jitter_px: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Tick rate; clamped to a floor of 10 Hz at runtime
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_camera_min_hz")]
    pub camera_min_hz: u32,
    #[serde(default = "default_joystick_min_hz")]
    pub joystick_min_hz: u32,
    /// Maximum distance between consecutive points of a synthesized drag
    #[serde(default = "default_max_step")]
    pub max_step_px: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            camera_min_hz: default_camera_min_hz(),
            joystick_min_hz: default_joystick_min_hz(),
            max_step_px: default_max_step(),
        }
    }
}

/// Extra key → tap bindings beyond fire/scope/backpack
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomMapping {
    pub name: String,
    pub key: String,
    pub point: Point,
    #[serde(default = "default_tap_hold")]
    pub hold_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_px: Option<f64>,
}

fn default_title_hint() -> String {
    "iPhone Mirroring".to_string()
}
fn default_enable_hotkey() -> String {
    "F8".to_string()
}
fn default_panic_hotkey() -> String {
    "F12".to_string()
}
fn default_camera_lock_key() -> String {
    "CapsLock".to_string()
}
fn default_backpack_key() -> String {
    "Tab".to_string()
}
fn default_move_up_key() -> String {
    "W".to_string()
}
fn default_move_down_key() -> String {
    "S".to_string()
}
fn default_move_left_key() -> String {
    "A".to_string()
}
fn default_move_right_key() -> String {
    "D".to_string()
}
fn default_fire_key() -> String {
    "MouseLeft".to_string()
}
fn default_scope_key() -> String {
    "MouseRight".to_string()
}
fn default_joystick_radius() -> f64 {
    120.0
}
fn default_joystick_tau() -> u64 {
    60
}
fn default_camera_deadzone() -> f64 {
    3.0
}
fn default_camera_radius() -> f64 {
    80.0
}
fn default_camera_budget() -> f64 {
    10.0
}
fn default_camera_sensitivity() -> f64 {
    1.0
}
fn default_tap_hold() -> u64 {
    30
}
fn default_wheel_step() -> f64 {
    8.0
}
fn default_wheel_stop() -> u64 {
    120
}
fn default_tick_hz() -> u32 {
    120
}
fn default_camera_min_hz() -> u32 {
    50
}
fn default_joystick_min_hz() -> u32 {
    20
}
fn default_max_step() -> f64 {
    6.0
}
fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate key bindings, trigger specs, and geometry. Fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.profiles.is_empty() {
            bail!("config must declare at least one profile");
        }

        let g = &self.global;
        for (field, name) in [
            ("global.enable_hotkey", &g.enable_hotkey),
            ("global.panic_hotkey", &g.panic_hotkey),
            ("global.camera_lock_key", &g.camera_lock_key),
            ("global.backpack_key", &g.backpack_key),
            ("global.move_up_key", &g.move_up_key),
            ("global.move_down_key", &g.move_down_key),
            ("global.move_left_key", &g.move_left_key),
            ("global.move_right_key", &g.move_right_key),
        ] {
            keycode_for(name).with_context(|| format!("{}: unresolvable key", field))?;
        }

        for (field, spec) in [
            ("global.fire_key", &g.fire_key),
            ("global.scope_key", &g.scope_key),
        ] {
            validate_trigger(spec).with_context(|| format!("{}: invalid trigger", field))?;
        }

        for (i, profile) in self.profiles.iter().enumerate() {
            if profile.joystick.radius_px <= 0.0 {
                bail!("profiles[{}].joystick.radius_px must be positive", i);
            }
            if profile.camera.radius_px <= 0.0 {
                bail!("profiles[{}].camera.radius_px must be positive", i);
            }
            if profile.scheduler.tick_hz == 0 {
                bail!("profiles[{}].scheduler.tick_hz must be positive", i);
            }
            for p in [
                profile.points.joystick_center,
                profile.points.camera_anchor,
                profile.points.fire,
                profile.points.scope,
                profile.points.backpack,
            ] {
                if !p.x.is_finite() || !p.y.is_finite() {
                    bail!("profiles[{}].points must be finite coordinates", i);
                }
            }
        }

        for (i, mapping) in self.custom_mappings.iter().enumerate() {
            keycode_for(&mapping.key)
                .with_context(|| format!("custom_mappings[{}].key: unresolvable key", i))?;
        }

        Ok(())
    }

    /// Select a profile by name, or the first one when `name` is None.
    pub fn select_profile(&self, name: Option<&str>) -> Result<&ProfileConfig> {
        match name {
            None => Ok(&self.profiles[0]),
            Some(n) => self
                .profiles
                .iter()
                .find(|p| p.name == n)
                .with_context(|| format!("no profile named {:?}", n)),
        }
    }
}

/// Check a fire/scope trigger spec without building the binding.
fn validate_trigger(spec: &str) -> Result<()> {
    let s = spec.trim().to_ascii_lowercase();
    if matches!(
        s.as_str(),
        "mouseleft"
            | "leftmouse"
            | "mouse1"
            | "lmb"
            | "left"
            | "mouseright"
            | "rightmouse"
            | "mouse2"
            | "rmb"
            | "right"
    ) {
        return Ok(());
    }
    keycode_for(spec)?;
    Ok(())
}
