//! Input-delivery entry point
//!
//! Called once per raw OS input event. Must never block and never inject:
//! its only permitted actions are updating the shared key-down set,
//! accumulating mouse deltas and scroll steps, enqueueing tap requests, and
//! flipping the latency-critical toggles (enable, panic). The returned bool
//! tells the capture layer to suppress the underlying event.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{Engine, Mode, TapRequest};
use crate::config::TapActionConfig;
use crate::geometry::Point;
use crate::keys::{keycode_for, KeyCode, KeyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// A fire/scope binding: either a mouse button or a keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Key(KeyCode),
    Mouse(MouseButton),
}

impl Trigger {
    /// Parse a trigger spec: "MouseLeft"/"MouseRight" aliases or a key name.
    pub fn parse(spec: &str) -> Result<Self, KeyError> {
        match spec.trim().to_ascii_lowercase().as_str() {
            "mouseleft" | "leftmouse" | "mouse1" | "lmb" | "left" => {
                Ok(Trigger::Mouse(MouseButton::Left))
            }
            "mouseright" | "rightmouse" | "mouse2" | "rmb" | "right" => {
                Ok(Trigger::Mouse(MouseButton::Right))
            }
            _ => Ok(Trigger::Key(keycode_for(spec)?)),
        }
    }
}

/// Discrete event from the input source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown { key: KeyCode, autorepeat: bool },
    KeyUp { key: KeyCode },
    /// Relative motion plus the absolute cursor position of the sample
    MouseMove { dx: f64, dy: f64, position: Point },
    ButtonDown { button: MouseButton },
    /// One wheel notch; positive is scroll-up
    ScrollTick { delta: i32, position: Point },
}

impl Engine {
    /// Handle one raw input event. Returns true when the event should be
    /// suppressed from the rest of the system.
    pub fn handle_event(&self, event: InputEvent) -> bool {
        self.handle_event_at(event, Instant::now())
    }

    pub(crate) fn handle_event_at(&self, event: InputEvent, now: Instant) -> bool {
        match event {
            InputEvent::KeyDown { key, autorepeat } => self.on_key_down(key, autorepeat),
            InputEvent::KeyUp { key } => self.on_key_up(key),
            InputEvent::MouseMove { dx, dy, position } => self.on_mouse_move(dx, dy, position, now),
            InputEvent::ButtonDown { button } => self.on_button_down(button),
            InputEvent::ScrollTick { delta, position } => self.on_scroll(delta, position, now),
        }
    }

    fn on_key_down(&self, key: KeyCode, autorepeat: bool) -> bool {
        let (mapping, target, mode) = {
            let mut shared = self.shared.lock();
            shared.keys_down.insert(key);
            (shared.mapping_enabled, shared.target_active, shared.mode)
        };
        let binds = &self.binds;

        if key == binds.enable && !autorepeat {
            // latency-critical toggle: flip flags only; the mode machine
            // performs the release on its next evaluation
            let enabled = {
                let mut shared = self.shared.lock();
                shared.mapping_enabled = !shared.mapping_enabled;
                if !shared.mapping_enabled {
                    shared.camera_lock = false;
                    shared.backpack_open = false;
                }
                shared.mapping_enabled
            };
            info!("mapping {} (hotkey)", if enabled { "enabled" } else { "disabled" });
        } else if key == binds.panic && !autorepeat {
            {
                let mut shared = self.shared.lock();
                shared.mapping_enabled = false;
                shared.camera_lock = false;
                shared.backpack_open = false;
            }
            warn!("panic hotkey: mapping disabled, sessions will be released");
        } else if key == binds.backpack && !autorepeat && mapping && target {
            self.toggle_backpack();
            return true;
        } else if key == binds.camera_lock
            && key != binds.backpack
            && !autorepeat
            && mapping
            && target
        {
            let locked = {
                let mut shared = self.shared.lock();
                shared.camera_lock = !shared.camera_lock;
                if shared.camera_lock {
                    shared.backpack_open = false;
                }
                shared.camera_lock
            };
            info!("camera lock {} (hotkey)", if locked { "on" } else { "off" });
            return true;
        } else if binds.fire == Trigger::Key(key) && !autorepeat {
            if self.try_enqueue_trigger_tap("fire", mapping, target, mode) {
                return true;
            }
        } else if binds.scope == Trigger::Key(key) && !autorepeat {
            if self.try_enqueue_trigger_tap("scope", mapping, target, mode) {
                return true;
            }
        } else if let Some(mapping_cfg) = binds.custom.get(&key) {
            if !autorepeat {
                if mapping && target && mode == Mode::Battle {
                    let req = TapRequest {
                        name: format!("custom:{}", mapping_cfg.key),
                        label: mapping_cfg.name.clone(),
                        point: mapping_cfg.point,
                        hold: Duration::from_millis(mapping_cfg.hold_ms),
                        jitter_px: mapping_cfg.jitter_px,
                        pre_release: true,
                        pre_delay: Duration::ZERO,
                    };
                    self.shared.lock().tap_queue.push_back(req);
                    debug!("enqueue tap: custom:{}", mapping_cfg.key);
                } else if self.warn_ok("custom_tap_ignored") {
                    warn!(
                        "custom tap {:?} ignored (mode={}, mapping={})",
                        mapping_cfg.name, mode, mapping
                    );
                }
            }
        }

        // Battle captures the keyboard so system shortcuts don't fire
        mapping && target && mode == Mode::Battle
    }

    fn on_key_up(&self, key: KeyCode) -> bool {
        let mut shared = self.shared.lock();
        shared.keys_down.remove(&key);
        shared.mapping_enabled && shared.target_active && shared.mode == Mode::Battle
    }

    fn on_mouse_move(&self, dx: f64, dy: f64, position: Point, now: Instant) -> bool {
        let mut shared = self.shared.lock();
        if !(shared.mapping_enabled && shared.target_active && shared.mode == Mode::Battle) {
            return false;
        }
        shared.last_mouse_at = Some(now);
        shared.last_mouse_pos = Some(position);
        // while a recenter is in flight the warp's own motion must not be
        // mistaken for user input
        if shared.recenter.pending {
            return true;
        }
        shared.mouse_dx += dx;
        shared.mouse_dy += dy;
        true
    }

    fn on_button_down(&self, button: MouseButton) -> bool {
        let (mapping, target, mode) = {
            let shared = self.shared.lock();
            (shared.mapping_enabled, shared.target_active, shared.mode)
        };

        let is_mouse_bound = matches!(self.binds.fire, Trigger::Mouse(_))
            || matches!(self.binds.scope, Trigger::Mouse(_));
        if is_mouse_bound && mapping && mode != Mode::Battle && self.warn_ok("click_ignored") {
            warn!("mouse click mapping ignored (mode={}, need battle)", mode);
        }

        if !(mapping && target && mode == Mode::Battle) {
            return false;
        }

        let mut swallow = false;
        if self.binds.fire == Trigger::Mouse(button) {
            self.enqueue_trigger_tap("fire");
            swallow = true;
        }
        if self.binds.scope == Trigger::Mouse(button) {
            self.enqueue_trigger_tap("scope");
            swallow = true;
        }
        swallow
    }

    fn on_scroll(&self, delta: i32, position: Point, now: Instant) -> bool {
        let (wheel_cfg, battle_anchor) = {
            let profile = self.profile.read();
            (
                profile.wheel.clone(),
                profile.wheel.anchor.unwrap_or(profile.points.camera_anchor),
            )
        };
        let (mapping, target, mode) = {
            let shared = self.shared.lock();
            (shared.mapping_enabled, shared.target_active, shared.mode)
        };

        if !(mapping && target && wheel_cfg.enabled && mode != Mode::Paused) {
            return false;
        }

        let step = if wheel_cfg.invert { -delta } else { delta };
        if step != 0 {
            // in Battle the drag happens at a fixed anchor and the cursor is
            // already managed by the mode machine; in Free we drag at the
            // cursor and restore it afterwards
            let (touch_origin, cursor_origin) = if mode == Mode::Battle {
                (battle_anchor, None)
            } else {
                (position, Some(position))
            };

            let mut shared = self.shared.lock();
            if !shared.wheel.active {
                shared.wheel.active = true;
                shared.wheel.cursor_origin = cursor_origin;
                shared.wheel.touch_origin = Some(touch_origin);
                // the first serviced tick picks the jittered press point
                shared.wheel.touch_pos = None;
            }
            shared.wheel.last_wheel_at = Some(now);
            shared.wheel.pending_steps += if step > 0 { 1 } else { -1 };
        }
        true
    }

    /// Enqueue a fire/scope tap if Battle conditions hold; log why not
    /// otherwise. Returns whether the event was consumed.
    fn try_enqueue_trigger_tap(
        &self,
        which: &'static str,
        mapping: bool,
        target: bool,
        mode: Mode,
    ) -> bool {
        if mapping && target && mode == Mode::Battle {
            self.enqueue_trigger_tap(which);
            true
        } else {
            if self.warn_ok("trigger_tap_ignored") {
                warn!(
                    "{} ignored (mapping={}, target={}, mode={})",
                    which, mapping, target, mode
                );
            }
            false
        }
    }

    pub(crate) fn enqueue_trigger_tap(&self, which: &'static str) {
        let req = {
            let profile = self.profile.read();
            let (point, cfg, label) = match which {
                "fire" => (
                    profile.points.fire,
                    profile.fire.clone(),
                    self.binds.fire_label.clone(),
                ),
                _ => (
                    profile.points.scope,
                    profile.scope.clone(),
                    self.binds.scope_label.clone(),
                ),
            };
            build_tap(which, label, point, &cfg)
        };
        self.shared.lock().tap_queue.push_back(req);
        debug!("enqueue tap: {}", which);
    }
}

fn build_tap(name: &str, label: String, point: Point, cfg: &TapActionConfig) -> TapRequest {
    TapRequest {
        name: name.to_string(),
        label,
        point,
        hold: Duration::from_millis(cfg.hold_ms),
        jitter_px: cfg.jitter_px,
        pre_release: true,
        pre_delay: Duration::ZERO,
    }
}
