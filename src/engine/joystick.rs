//! Virtual joystick service
//!
//! Direction keys map to a unit vector; the touch point is pressed near the
//! configured center and dragged to `center + direction * radius`, then held
//! until the keys change. The center is fixed for the life of one hold cycle
//! so the stick does not drift.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::Engine;
use super::Mode;
use crate::geometry::Point;
use crate::inject::drag_smooth;

impl Engine {
    /// Press/drag the joystick toward the held direction, or release it
    /// when no direction key is down.
    pub(crate) async fn service_joystick(&self, now: Instant) {
        // single contact: take it from the camera if held
        self.release_camera_hold().await;

        let (joy_cfg, center0, max_step) = {
            let profile = self.profile.read();
            (
                profile.joystick.clone(),
                profile.points.joystick_center,
                profile.scheduler.max_step_px,
            )
        };

        let direction = {
            let shared = self.shared.lock();
            let mut v = Point::default();
            // screen Y grows downward: "up" decreases Y
            if shared.keys_down.contains(&self.binds.move_up) {
                v.y -= 1.0;
            }
            if shared.keys_down.contains(&self.binds.move_down) {
                v.y += 1.0;
            }
            if shared.keys_down.contains(&self.binds.move_left) {
                v.x -= 1.0;
            }
            if shared.keys_down.contains(&self.binds.move_right) {
                v.x += 1.0;
            }
            v.normalize()
        };

        if direction.length() <= 1e-9 {
            self.release_joystick_hold().await;
            return;
        }

        let (active, touch_pos, center_pos) = {
            let shared = self.shared.lock();
            (
                shared.joystick.active,
                shared.joystick.touch_pos,
                shared.joystick.center,
            )
        };

        let (cur, center) = match (active, touch_pos, center_pos) {
            (true, Some(cur), Some(center)) => (cur, center),
            _ => {
                // fresh hold cycle: fix a randomized center and press there
                let center = self.jittered(center0, joy_cfg.jitter_px);
                if let Err(e) = self.injector.press(center).await {
                    if self.warn_ok("joystick_press_failed") {
                        warn!("joystick press failed: {}", e);
                    }
                    self.safe_release_all().await;
                    return;
                }
                {
                    let mut shared = self.shared.lock();
                    shared.joystick.active = true;
                    shared.joystick.center = Some(center);
                    shared.joystick.touch_pos = Some(center);
                    shared.joystick.last_at = Some(now);
                    shared.last_joystick_at = Some(now);
                }
                info!("joystick pressed @ ({:.1}, {:.1})", center.x, center.y);
                (center, center)
            }
        };

        let target = center.add(direction.scale(joy_cfg.radius_px));

        // a larger step floor keeps the center-to-edge stroke inside one tick
        let max_step = max_step.max(10.0);
        if let Err(e) = drag_smooth(self.injector.as_ref(), cur, target, max_step).await {
            if self.warn_ok("joystick_drag_failed") {
                warn!("joystick drag failed: {}", e);
            }
            self.safe_release_all().await;
            return;
        }

        let hold = Duration::from_millis(joy_cfg.tau_ms.clamp(40, 200));
        let mut shared = self.shared.lock();
        if shared.joystick.active {
            shared.joystick.touch_pos = Some(target);
            shared.joystick.last_at = Some(now);
        }
        shared.last_joystick_at = Some(now);
        shared.joy_hold_until = Some(now + hold);
    }

    /// Release the joystick contact, returning to the center first so the
    /// consumer reads a neutral-stick release instead of a flick.
    pub(crate) async fn release_joystick_hold(&self) {
        let (active, touch_pos, center) = {
            let mut shared = self.shared.lock();
            let session = std::mem::take(&mut shared.joystick);
            shared.joy_hold_until = None;
            (session.active, session.touch_pos, session.center)
        };
        if !active {
            return;
        }
        info!("joystick released");

        match (center, touch_pos) {
            (Some(center), Some(_)) => {
                let _ = self.injector.drag(center).await;
                let _ = self.injector.release(center).await;
            }
            _ => {
                // center was never established; lift wherever we are
                let at = match touch_pos {
                    Some(p) => p,
                    None => self.injector.cursor_position().await.unwrap_or_default(),
                };
                let _ = self.injector.release(at).await;
            }
        }

        if self.current_mode() == Mode::Battle {
            let _ = self.injector.hide_cursor().await;
        }
    }
}
