//! Tick scheduler - the arbiter
//!
//! Runs at a fixed rate. Every tick refreshes the mode, then dispatches to
//! exactly one of tap service, wheel service, camera service, joystick
//! service, or idle cleanup. Taps always preempt; an active wheel session
//! owns the contact until it quiesces; camera and joystick share the rest
//! under a rate-based fairness policy with an absolute-wait tie-break.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::{Engine, Mode};

/// How often the target probe is consulted (the mode machine itself still
/// evaluates every tick from the cached flag).
const TARGET_CHECK_INTERVAL: Duration = Duration::from_millis(200);

impl Engine {
    /// Run the fixed-rate scheduler until [`Engine::stop`] is called.
    ///
    /// This task is the only context that calls the injection primitive.
    pub async fn run(self: Arc<Self>) {
        if let Err(e) = self.injector.check_ready().await {
            warn!("injector not ready: {} (controls may stay inert)", e);
            self.shared.lock().warning = Some(e.to_string());
        }

        let tick_hz = self.profile.read().scheduler.tick_hz.max(10);
        let mut interval =
            tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(tick_hz)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.running.store(true, Ordering::Release);
        info!(
            "scheduler started at {} Hz (injector: {})",
            tick_hz,
            self.injector.name()
        );

        while self.running.load(Ordering::Acquire) {
            interval.tick().await;
            self.tick_at(Instant::now()).await;
        }

        self.set_mode(Mode::Paused).await;
        self.safe_release_all().await;
        info!("scheduler stopped");
    }

    /// One scheduler iteration at time `now`.
    pub(crate) async fn tick_at(&self, now: Instant) {
        self.refresh_target(now);

        let next = {
            let shared = self.shared.lock();
            Mode::derive(
                shared.mapping_enabled,
                shared.target_active,
                shared.camera_lock,
                shared.backpack_open,
            )
        };
        self.set_mode(next).await;

        match next {
            Mode::Paused => self.safe_release_all().await,
            Mode::Free => self.tick_free(now).await,
            Mode::Battle => self.tick_battle(now).await,
        }
    }

    /// Rate-limited probe of target eligibility.
    fn refresh_target(&self, now: Instant) {
        let due = {
            let mut shared = self.shared.lock();
            let due = shared
                .last_target_check
                .map_or(true, |t| now.duration_since(t) >= TARGET_CHECK_INTERVAL);
            if due {
                shared.last_target_check = Some(now);
            }
            due
        };
        if !due {
            return;
        }

        let active = self.probe.is_target_active();
        let mut shared = self.shared.lock();
        if shared.target_active != active {
            info!("target {}", if active { "active" } else { "inactive" });
        }
        shared.target_active = active;
    }

    /// Apply a mode transition: previous mode's exit action runs before the
    /// new mode's entry action. No-op when the mode is unchanged.
    async fn set_mode(&self, next: Mode) {
        let (prev, snapshot) = {
            let mut shared = self.shared.lock();
            let prev = shared.mode;
            if prev == next {
                return;
            }
            shared.mode = next;
            let snapshot = if prev == Mode::Battle {
                shared.battle_cursor_snap.take()
            } else {
                None
            };
            (prev, snapshot)
        };

        if prev == Mode::Battle {
            // leaving battle: lift everything and give the desktop its
            // cursor back
            self.safe_release_all().await;
            if let Some(snap) = snapshot {
                if let Err(e) = self.injector.restore_cursor(snap).await {
                    warn!("cursor restore failed: {}", e);
                }
            }
        }

        if next == Mode::Battle {
            match self.injector.snapshot_cursor().await {
                Ok(snap) => {
                    self.shared.lock().battle_cursor_snap = Some(snap);
                    let _ = self.injector.hide_cursor().await;
                }
                Err(e) => warn!("cursor snapshot failed: {}", e),
            }
        }

        info!("mode: {} -> {}", prev, next);
    }

    /// Free mode services at most one of {pending tap, wheel}.
    async fn tick_free(&self, now: Instant) {
        let req = self.shared.lock().tap_queue.pop_front();
        if let Some(req) = req {
            self.service_tap(req).await;
            return;
        }
        if self.service_wheel(now).await {
            return;
        }
        self.safe_release_all().await;
    }

    /// Battle dispatch, strict priority; each step returns if it acted.
    async fn tick_battle(&self, now: Instant) {
        // 1) taps are discrete user intents and never wait behind
        //    continuous controls
        let req = self.shared.lock().tap_queue.pop_front();
        if let Some(req) = req {
            self.service_tap(req).await;
            return;
        }

        // 2) an active wheel gesture must not be interleaved with other drags
        if self.service_wheel(now).await {
            return;
        }

        // 3) armed recenter: re-press once a fresh stroke has arrived
        if self.resume_camera_after_recenter(now).await {
            return;
        }

        // 4) camera/joystick fairness
        let (cam_interval, joy_interval, deadzone) = {
            let profile = self.profile.read();
            (
                Duration::from_secs_f64(1.0 / f64::from(profile.scheduler.camera_min_hz.max(1))),
                Duration::from_secs_f64(1.0 / f64::from(profile.scheduler.joystick_min_hz.max(1))),
                profile.camera.deadzone_px,
            )
        };
        let (pending_motion, want_move, cam_wait, joy_wait, hold_active) = {
            let shared = self.shared.lock();
            let pending_motion = shared.mouse_dx.abs() + shared.mouse_dy.abs();
            let want_move = [
                self.binds.move_up,
                self.binds.move_down,
                self.binds.move_left,
                self.binds.move_right,
            ]
            .iter()
            .any(|k| shared.keys_down.contains(k));
            let cam_wait = shared
                .last_camera_at
                .map_or(Duration::MAX, |t| now.duration_since(t));
            let joy_wait = shared
                .last_joystick_at
                .map_or(Duration::MAX, |t| now.duration_since(t));
            let hold_active = shared.joy_hold_until.map_or(false, |t| now < t);
            (pending_motion, want_move, cam_wait, joy_wait, hold_active)
        };

        let mut camera_due = cam_wait >= cam_interval && pending_motion > 0.0;
        let joystick_due = joy_wait >= joy_interval && want_move;

        // a fresh joystick press gets a grace window so the consumer
        // registers the hold before the camera takes the contact back
        if want_move && hold_active {
            camera_due = false;
        }

        if camera_due && joystick_due {
            // longer absolute wait wins; a ratio-of-interval rule would
            // starve the control with the larger interval
            if joy_wait >= cam_wait {
                self.service_joystick(now).await;
            } else {
                self.service_camera(now).await;
            }
            return;
        }
        if camera_due {
            self.service_camera(now).await;
            return;
        }
        if joystick_due {
            self.service_joystick(now).await;
            return;
        }

        // not due, but accumulated motion past the dead zone is served
        // immediately: look latency matters more than rate limiting
        if (!want_move || !hold_active) && pending_motion >= deadzone {
            self.service_camera(now).await;
            return;
        }

        if want_move {
            self.service_joystick(now).await;
        } else {
            // idle cleanup: never leave a stale joystick press behind
            self.release_joystick_hold().await;
        }
    }
}
