//! Scroll-wheel drag service
//!
//! Scroll ticks accumulate into a signed step counter; the service converts
//! them into a vertical drag one step per tick, so a burst of notches
//! becomes a smooth multi-tick gesture instead of one oversized jump. The
//! session ends only through its quiet-period timeout.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::session::WheelSession;
use super::{Engine, Mode};
use crate::geometry::Point;
use crate::inject::drag_smooth;

impl Engine {
    /// Service an active wheel session. Returns true when a session exists
    /// and owned the contact this tick.
    pub(crate) async fn service_wheel(&self, now: Instant) -> bool {
        let (wheel_cfg, max_step) = {
            let profile = self.profile.read();
            (profile.wheel.clone(), profile.scheduler.max_step_px)
        };

        let (active, pending_steps, last_wheel_at, cursor_origin, touch_origin, mut touch_pos) = {
            let shared = self.shared.lock();
            let w = &shared.wheel;
            (
                w.active,
                w.pending_steps,
                w.last_wheel_at,
                w.cursor_origin,
                w.touch_origin,
                w.touch_pos,
            )
        };

        if !active {
            return false;
        }

        // first serviced tick: claim the contact and press near the origin
        if touch_pos.is_none() {
            self.release_camera_hold().await;
            self.release_joystick_hold().await;

            let origin = match touch_origin.or(cursor_origin) {
                Some(p) => p,
                None => match self.injector.cursor_position().await {
                    Ok(p) => p,
                    Err(e) => {
                        if self.warn_ok("wheel_origin_failed") {
                            warn!("wheel origin lookup failed: {}", e);
                        }
                        self.reset_wheel_after_error().await;
                        return true;
                    }
                },
            };
            let p0 = self.jittered(origin, wheel_cfg.jitter_px);
            if let Err(e) = self.injector.press(p0).await {
                if self.warn_ok("wheel_press_failed") {
                    warn!("wheel press failed: {}", e);
                }
                self.reset_wheel_after_error().await;
                return true;
            }
            {
                let mut shared = self.shared.lock();
                // don't clobber a session that was reset meanwhile
                if shared.wheel.active && shared.wheel.touch_pos.is_none() {
                    shared.wheel.touch_pos = Some(p0);
                }
            }
            touch_pos = Some(p0);
        }

        // quiet period elapsed: release, restore the cursor origin (Free
        // mode only), and end the session
        let stop_after = Duration::from_millis(wheel_cfg.stop_ms.max(10));
        let quiet = last_wheel_at.map_or(true, |t| now.duration_since(t) > stop_after);
        if quiet {
            let up_pos = match touch_pos {
                Some(p) => p,
                None => self.injector.cursor_position().await.unwrap_or_default(),
            };
            let _ = self.injector.release(up_pos).await;
            if let Some(origin) = cursor_origin {
                let _ = self.injector.warp_cursor(origin).await;
            }
            self.shared.lock().wheel = WheelSession::default();
            debug!("wheel session ended");
            return true;
        }

        if pending_steps == 0 {
            return true;
        }

        // consume exactly one step this tick
        let step: i32 = if pending_steps > 0 { 1 } else { -1 };
        {
            let mut shared = self.shared.lock();
            shared.wheel.pending_steps -= step;
        }

        let Some(cur) = touch_pos else { return true };
        let target = Point::new(cur.x, cur.y + f64::from(step) * wheel_cfg.step_px);
        match drag_smooth(self.injector.as_ref(), cur, target, max_step).await {
            Ok(()) => {
                let mut shared = self.shared.lock();
                if shared.wheel.active {
                    shared.wheel.touch_pos = Some(target);
                }
            }
            Err(e) => {
                if self.warn_ok("wheel_drag_failed") {
                    warn!("wheel drag failed: {}", e);
                }
                self.reset_wheel_after_error().await;
            }
        }
        true
    }

    /// Recovery: drop the session and make sure nothing stays held.
    async fn reset_wheel_after_error(&self) {
        let _ = self.injector.release_all().await;
        if self.current_mode() == Mode::Battle {
            let _ = self.injector.hide_cursor().await;
        }
        self.shared.lock().wheel = WheelSession::default();
    }
}
