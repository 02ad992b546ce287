//! Camera look-drag service and the boundary-recenter protocol
//!
//! The camera holds the touch point and drags it in a small radius around a
//! fixed anchor. When a drag reaches the radius it must not snap back in
//! the same gesture: the consumer would read the anchor jump as a reverse
//! drag. Instead the contact is lifted, the desktop cursor is warped back
//! to the anchor, and a new press only happens once a genuinely new mouse
//! stroke is observed.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::session::{CameraSession, RecenterState};
use super::{Engine, Mode};
use crate::geometry::{circle_exit, clamp_to_circle, within_circle, Point};
use crate::inject::drag_smooth;

/// Settle window after a press so the hold registers before the first drag.
const PRESS_SETTLE: Duration = Duration::from_millis(3);

/// Motion samples closer to the anchor than this are treated as warp echo,
/// not as a new user stroke.
const RECENTER_EPSILON_PX: f64 = 0.5;

impl Engine {
    /// Consume a bounded slice of accumulated mouse motion and drag the
    /// camera contact, pressing first if needed.
    pub(crate) async fn service_camera(&self, now: Instant) {
        // single contact: the joystick must let go first
        self.release_joystick_hold().await;

        let (cam_cfg, anchor, max_step) = {
            let profile = self.profile.read();
            (
                profile.camera.clone(),
                profile.points.camera_anchor,
                profile.scheduler.max_step_px,
            )
        };

        // re-read the accumulators under the lock; the delivery side may
        // have added motion since dispatch
        let (dx, dy, active, touch_pos) = {
            let shared = self.shared.lock();
            (
                shared.mouse_dx,
                shared.mouse_dy,
                shared.camera.active,
                shared.camera.touch_pos,
            )
        };

        if dx.abs() + dy.abs() < cam_cfg.deadzone_px {
            return;
        }

        // consume at most budget_px of motion this tick; the leftover stays
        // accumulated so one large OS delta spike cannot become one huge jump
        let budget = cam_cfg.budget_px.max(1e-3);
        let len = dx.hypot(dy);
        let (use_dx, use_dy) = if len > budget {
            let s = budget / len;
            (dx * s, dy * s)
        } else {
            (dx, dy)
        };

        {
            let mut shared = self.shared.lock();
            shared.mouse_dx -= use_dx;
            shared.mouse_dy -= use_dy;
        }

        let sx = use_dx * cam_cfg.sensitivity;
        let sy = use_dy * cam_cfg.sensitivity * if cam_cfg.invert_y { -1.0 } else { 1.0 };

        let cur = match touch_pos {
            Some(p) if active => p,
            _ => {
                let p0 = self.jittered(anchor, cam_cfg.jitter_px);
                if let Err(e) = self.injector.press(p0).await {
                    if self.warn_ok("camera_press_failed") {
                        warn!("camera press failed: {}", e);
                    }
                    self.safe_release_all().await;
                    return;
                }
                tokio::time::sleep(PRESS_SETTLE).await;
                let mut shared = self.shared.lock();
                shared.camera.active = true;
                shared.camera.touch_pos = Some(p0);
                shared.camera.last_drag_at = Some(now);
                p0
            }
        };

        let cur = clamp_to_circle(cur, anchor, cam_cfg.radius_px);
        let proposed = cur.add(Point::new(sx, sy));
        let exiting = !within_circle(proposed, anchor, cam_cfg.radius_px);
        let target = if exiting {
            circle_exit(anchor, cam_cfg.radius_px, cur, proposed)
        } else {
            proposed
        };

        if let Err(e) = drag_smooth(self.injector.as_ref(), cur, target, max_step).await {
            if self.warn_ok("camera_drag_failed") {
                warn!("camera drag failed: {}", e);
            }
            self.safe_release_all().await;
            return;
        }

        if exiting {
            // Boundary reached: lift and arm the recenter protocol. The
            // leftover accumulated motion belongs to the old stroke and is
            // discarded with it.
            let _ = self.injector.release(target).await;
            {
                let mut shared = self.shared.lock();
                let last_mouse_at = shared.last_mouse_at;
                shared.camera = CameraSession::default();
                shared.mouse_dx = 0.0;
                shared.mouse_dy = 0.0;
                shared.recenter.pending = true;
                shared.recenter.ready = false;
                shared.recenter.target = Some(anchor);
                shared.recenter.started_mouse_at = last_mouse_at;
                shared.last_camera_at = Some(now);
            }
            // Hard cursor move back to the anchor. Its echo arrives while
            // pending and is discarded by the delivery side; only after the
            // warp completes does the protocol become ready.
            let _ = self.injector.warp_cursor(anchor).await;
            {
                let mut shared = self.shared.lock();
                if shared.recenter.pending {
                    shared.recenter.ready = true;
                }
            }
            info!("camera reached boundary: lifted, waiting for a fresh stroke");
            return;
        }

        let mut shared = self.shared.lock();
        if shared.camera.active {
            shared.camera.touch_pos = Some(target);
            shared.camera.last_drag_at = Some(now);
        }
        shared.last_camera_at = Some(now);
    }

    /// Complete an armed recenter once a genuinely new motion sample has
    /// arrived. Returns true when this tick was spent on the re-press.
    pub(crate) async fn resume_camera_after_recenter(&self, now: Instant) -> bool {
        let (target, started_at, last_at, last_pos) = {
            let shared = self.shared.lock();
            if !shared.recenter.pending || !shared.recenter.ready {
                return false;
            }
            let Some(target) = shared.recenter.target else {
                return false;
            };
            (
                target,
                shared.recenter.started_mouse_at,
                shared.last_mouse_at,
                shared.last_mouse_pos,
            )
        };

        // no new stroke yet: stay armed, other controls keep working
        let fresh = match (started_at, last_at) {
            (Some(t0), Some(t1)) => t1 > t0,
            (None, Some(_)) => true,
            _ => false,
        };
        if !fresh {
            return false;
        }
        // the warp itself may surface one sample at the anchor; that is not
        // a user stroke
        let Some(pos) = last_pos else { return false };
        if pos.distance_to(target) < RECENTER_EPSILON_PX {
            return false;
        }

        // single contact: take it from the joystick before pressing
        self.release_joystick_hold().await;

        if let Err(e) = self.injector.press(target).await {
            if self.warn_ok("camera_recenter_failed") {
                warn!("camera re-press failed: {}", e);
            }
            self.safe_release_all().await;
            return true;
        }
        tokio::time::sleep(PRESS_SETTLE).await;
        // zero-displacement drag pins the consumer's drag baseline to the
        // anchor so the next stroke starts clean
        let _ = self.injector.drag(target).await;

        {
            let mut shared = self.shared.lock();
            shared.recenter = RecenterState::default();
            shared.mouse_dx = 0.0;
            shared.mouse_dy = 0.0;
            shared.camera.active = true;
            shared.camera.touch_pos = Some(target);
            shared.camera.last_drag_at = Some(now);
            shared.last_camera_at = Some(now);
        }
        info!(
            "camera recentered: pressed again @ ({:.1}, {:.1})",
            target.x, target.y
        );
        true
    }

    /// Lift the camera contact if held.
    pub(crate) async fn release_camera_hold(&self) {
        let (active, pos) = {
            let mut shared = self.shared.lock();
            let session = std::mem::take(&mut shared.camera);
            (session.active, session.touch_pos)
        };
        if !active {
            return;
        }
        let at = match pos {
            Some(p) => p,
            None => self.injector.cursor_position().await.unwrap_or_default(),
        };
        let _ = self.injector.release(at).await;
        // no pointer flash when the contact changes hands mid-battle
        if self.current_mode() == Mode::Battle {
            let _ = self.injector.hide_cursor().await;
        }
    }
}
