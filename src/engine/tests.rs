//! Tests for the engine: scheduling, arbitration, and the recenter protocol

use super::*;
use crate::config::{
    AppConfig, CameraConfig, JoystickConfig, ProfileConfig, ProfilePoints, SchedulerConfig,
    TapActionConfig, WheelConfig,
};
use crate::geometry::Point;
use crate::inject::{CursorSnapshot, InjectError, Injector};
use crate::probe::AlwaysActive;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const JOY_CENTER: Point = Point { x: 200.0, y: 400.0 };
const CAM_ANCHOR: Point = Point { x: 600.0, y: 300.0 };
const FIRE_POINT: Point = Point { x: 800.0, y: 500.0 };
const SCOPE_POINT: Point = Point { x: 760.0, y: 560.0 };
const BACKPACK_POINT: Point = Point { x: 900.0, y: 100.0 };

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Press(Point),
    Drag(Point),
    Release(Point),
    Tap(Point),
    Warp(Point),
    HideCursor,
    ShowCursor,
    RestoreCursor,
    ReleaseAll,
}

impl Call {
    fn is_gesture(&self) -> bool {
        matches!(
            self,
            Call::Press(_) | Call::Drag(_) | Call::Release(_) | Call::Tap(_)
        )
    }
}

/// Injector that records every primitive call for assertions.
#[derive(Default)]
struct MockInjector {
    calls: parking_lot::Mutex<Vec<Call>>,
    fail_press: AtomicBool,
}

impl MockInjector {
    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn gestures(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.is_gesture()).collect()
    }

    fn drags(&self) -> Vec<Point> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Drag(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn press_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Press(_)))
            .count()
    }

    fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Injector for MockInjector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn press(&self, at: Point) -> Result<(), InjectError> {
        if self.fail_press.load(Ordering::Relaxed) {
            return Err(InjectError::Rejected {
                op: "press",
                reason: "forced failure".to_string(),
            });
        }
        self.record(Call::Press(at));
        Ok(())
    }

    async fn drag(&self, to: Point) -> Result<(), InjectError> {
        self.record(Call::Drag(to));
        Ok(())
    }

    async fn release(&self, at: Point) -> Result<(), InjectError> {
        self.record(Call::Release(at));
        Ok(())
    }

    async fn tap(&self, at: Point, _hold: Duration) -> Result<(), InjectError> {
        self.record(Call::Tap(at));
        Ok(())
    }

    async fn warp_cursor(&self, to: Point) -> Result<(), InjectError> {
        self.record(Call::Warp(to));
        Ok(())
    }

    async fn hide_cursor(&self) -> Result<(), InjectError> {
        self.record(Call::HideCursor);
        Ok(())
    }

    async fn show_cursor(&self) -> Result<(), InjectError> {
        self.record(Call::ShowCursor);
        Ok(())
    }

    async fn snapshot_cursor(&self) -> Result<CursorSnapshot, InjectError> {
        Ok(CursorSnapshot {
            position: Point::new(0.0, 0.0),
            hidden: false,
        })
    }

    async fn restore_cursor(&self, _snapshot: CursorSnapshot) -> Result<(), InjectError> {
        self.record(Call::RestoreCursor);
        Ok(())
    }

    async fn cursor_position(&self) -> Result<Point, InjectError> {
        Ok(Point::new(0.0, 0.0))
    }

    async fn release_all(&self) -> Result<(), InjectError> {
        self.record(Call::ReleaseAll);
        Ok(())
    }
}

fn test_profile() -> ProfileConfig {
    ProfileConfig {
        name: "test".to_string(),
        points: ProfilePoints {
            joystick_center: JOY_CENTER,
            camera_anchor: CAM_ANCHOR,
            fire: FIRE_POINT,
            scope: SCOPE_POINT,
            backpack: BACKPACK_POINT,
        },
        joystick: JoystickConfig {
            radius_px: 120.0,
            tau_ms: 60,
            jitter_px: None,
        },
        camera: CameraConfig {
            // large budget keeps boundary tests one-tick
            budget_px: 200.0,
            ..Default::default()
        },
        fire: TapActionConfig {
            hold_ms: 0,
            jitter_px: None,
        },
        scope: TapActionConfig {
            hold_ms: 0,
            jitter_px: None,
        },
        wheel: WheelConfig::default(),
        scheduler: SchedulerConfig {
            // one drag call per service keeps assertions simple
            max_step_px: 1000.0,
            ..Default::default()
        },
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        target_window: Default::default(),
        global: Default::default(),
        profiles: vec![test_profile()],
        custom_mappings: vec![],
    }
}

struct Rig {
    engine: Arc<Engine>,
    injector: Arc<MockInjector>,
    t0: Instant,
}

fn make_rig() -> Rig {
    let injector = Arc::new(MockInjector::default());
    let engine = Engine::new(
        &test_config(),
        test_profile(),
        injector.clone(),
        Arc::new(AlwaysActive),
    )
    .unwrap();
    Rig {
        engine: Arc::new(engine),
        injector,
        t0: Instant::now(),
    }
}

impl Rig {
    async fn enter_battle(&self) {
        self.engine.set_mapping_enabled(true).await;
        self.engine.set_camera_lock(true);
        self.engine.tick_at(self.t0).await;
        assert_eq!(self.engine.current_mode(), Mode::Battle);
        self.injector.clear();
    }

    async fn enter_free(&self) {
        self.engine.set_mapping_enabled(true).await;
        self.engine.tick_at(self.t0).await;
        assert_eq!(self.engine.current_mode(), Mode::Free);
        self.injector.clear();
    }

    fn at(&self, offset_ms: u64) -> Instant {
        self.t0 + Duration::from_millis(offset_ms)
    }

    fn key_down(&self, name: &str, offset_ms: u64) -> bool {
        self.engine.handle_event_at(
            InputEvent::KeyDown {
                key: crate::keys::keycode_for(name).unwrap(),
                autorepeat: false,
            },
            self.at(offset_ms),
        )
    }

    fn key_up(&self, name: &str, offset_ms: u64) -> bool {
        self.engine.handle_event_at(
            InputEvent::KeyUp {
                key: crate::keys::keycode_for(name).unwrap(),
            },
            self.at(offset_ms),
        )
    }

    fn mouse_move(&self, dx: f64, dy: f64, position: Point, offset_ms: u64) -> bool {
        self.engine.handle_event_at(
            InputEvent::MouseMove { dx, dy, position },
            self.at(offset_ms),
        )
    }

    fn scroll(&self, delta: i32, position: Point, offset_ms: u64) -> bool {
        self.engine.handle_event_at(
            InputEvent::ScrollTick { delta, position },
            self.at(offset_ms),
        )
    }

    fn active_sessions(&self) -> (bool, bool, bool) {
        let shared = self.engine.shared.lock();
        (
            shared.camera.active,
            shared.joystick.active,
            shared.wheel.active,
        )
    }

    fn assert_exclusive(&self) {
        let (cam, joy, wheel) = self.active_sessions();
        assert!(
            u8::from(cam) + u8::from(joy) + u8::from(wheel) <= 1,
            "exclusivity violated: camera={} joystick={} wheel={}",
            cam,
            joy,
            wheel
        );
    }
}

#[tokio::test]
async fn test_paused_mode_never_injects() {
    let rig = make_rig();

    // mapping disabled: events pass through untouched
    assert!(!rig.key_down("W", 0));
    assert!(!rig.mouse_move(10.0, 0.0, Point::new(100.0, 100.0), 1));

    for i in 0..5 {
        rig.engine.tick_at(rig.at(10 + i * 10)).await;
    }

    assert!(rig.injector.gestures().is_empty());
    let (cam, joy, wheel) = rig.active_sessions();
    assert!(!cam && !joy && !wheel);
    assert_eq!(rig.engine.current_mode(), Mode::Paused);
}

#[tokio::test]
async fn test_tap_preempts_due_controls() {
    let rig = make_rig();
    rig.enter_battle().await;

    // joystick and camera both have pending work when the tap arrives
    rig.key_down("W", 1);
    rig.mouse_move(25.0, 0.0, Point::new(400.0, 400.0), 2);
    assert!(rig
        .engine
        .handle_event_at(
            InputEvent::ButtonDown {
                button: MouseButton::Left
            },
            rig.at(3),
        ));

    rig.engine.tick_at(rig.at(10)).await;

    // the tick's only gesture belongs to the tap
    assert_eq!(rig.injector.gestures(), vec![Call::Tap(FIRE_POINT)]);
}

#[tokio::test]
async fn test_single_contact_exclusivity() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.key_down("W", 1);
    rig.engine.tick_at(rig.at(10)).await;
    rig.assert_exclusive();
    assert!(rig.active_sessions().1, "joystick should hold the contact");

    // camera takes over once the joystick hold window expires
    rig.mouse_move(30.0, 0.0, Point::new(300.0, 300.0), 70);
    rig.engine.tick_at(rig.at(80)).await;
    rig.assert_exclusive();

    // wheel claims the contact exclusively
    rig.scroll(1, Point::new(0.0, 0.0), 90);
    rig.engine.tick_at(rig.at(100)).await;
    rig.assert_exclusive();
    assert!(rig.active_sessions().2, "wheel should hold the contact");

    rig.key_up("W", 110);
    rig.engine.tick_at(rig.at(250)).await; // wheel goes quiet
    rig.assert_exclusive();
    rig.engine.tick_at(rig.at(260)).await;
    rig.assert_exclusive();
}

#[tokio::test]
async fn test_joystick_three_ticks_no_camera() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.key_down("W", 1);
    rig.engine.tick_at(rig.at(50)).await;
    rig.engine.tick_at(rig.at(100)).await;
    rig.engine.tick_at(rig.at(150)).await;

    let calls = rig.injector.calls();
    assert_eq!(rig.injector.press_count(), 1);
    assert!(matches!(calls[0], Call::Press(p) if p == JOY_CENTER));

    // every drag heads to center + (0, -radius)
    let target = Point::new(JOY_CENTER.x, JOY_CENTER.y - 120.0);
    let drags = rig.injector.drags();
    assert!(!drags.is_empty());
    assert!(drags.iter().all(|p| *p == target));

    // no camera activity anywhere in the sequence
    assert!(!calls
        .iter()
        .any(|c| matches!(c, Call::Press(p) if *p == CAM_ANCHOR)));
    assert!(!calls.iter().any(|c| matches!(c, Call::Warp(_))));
    assert!(!rig.engine.shared.lock().camera.active);
}

#[tokio::test]
async fn test_joystick_release_returns_to_center() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.key_down("D", 1);
    rig.engine.tick_at(rig.at(10)).await;
    rig.injector.clear();

    rig.key_up("D", 20);
    rig.engine.tick_at(rig.at(30)).await;

    // neutral release: back to center, then lift at the center
    assert_eq!(
        rig.injector.gestures(),
        vec![Call::Drag(JOY_CENTER), Call::Release(JOY_CENTER)]
    );
}

#[tokio::test]
async fn test_fairness_longer_absolute_wait_wins() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.key_down("W", 1);
    rig.mouse_move(10.0, 0.0, Point::new(400.0, 300.0), 2);

    let now = rig.at(1000);
    {
        let mut shared = rig.engine.shared.lock();
        shared.last_camera_at = Some(now - Duration::from_millis(50));
        shared.last_joystick_at = Some(now - Duration::from_millis(80));
        shared.joy_hold_until = None;
    }
    rig.injector.clear();
    rig.engine.tick_at(now).await;

    // both due; the joystick waited 80ms vs the camera's 50ms
    let calls = rig.injector.calls();
    assert!(matches!(calls.first(), Some(Call::Press(p)) if *p == JOY_CENTER));
}

#[tokio::test]
async fn test_fairness_camera_wins_with_longer_wait() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.key_down("W", 1);
    rig.mouse_move(10.0, 0.0, Point::new(400.0, 300.0), 2);

    let now = rig.at(1000);
    {
        let mut shared = rig.engine.shared.lock();
        shared.last_camera_at = Some(now - Duration::from_millis(80));
        shared.last_joystick_at = Some(now - Duration::from_millis(50));
        shared.joy_hold_until = None;
    }
    rig.injector.clear();
    rig.engine.tick_at(now).await;

    let calls = rig.injector.calls();
    assert!(matches!(calls.first(), Some(Call::Press(p)) if *p == CAM_ANCHOR));
}

#[tokio::test]
async fn test_hold_floor_blocks_camera_preemption() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.key_down("W", 1);
    rig.engine.tick_at(rig.at(10)).await; // press; hold floor until ~70ms
    rig.mouse_move(40.0, 0.0, Point::new(400.0, 300.0), 15);
    rig.injector.clear();

    rig.engine.tick_at(rig.at(30)).await; // inside the hold window

    assert!(!rig
        .injector
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Press(p) if *p == CAM_ANCHOR)));
    assert!(rig.engine.shared.lock().joystick.active);

    rig.engine.tick_at(rig.at(80)).await; // window expired
    assert!(rig.engine.shared.lock().camera.active);
}

#[tokio::test]
async fn test_camera_boundary_exact_exit_and_recenter_arm() {
    let rig = make_rig();
    rig.enter_battle().await;

    {
        let mut shared = rig.engine.shared.lock();
        shared.camera.active = true;
        shared.camera.touch_pos = Some(Point::new(670.0, 300.0));
    }
    rig.mouse_move(100.0, 0.0, Point::new(500.0, 300.0), 1);
    rig.injector.clear();

    rig.engine.tick_at(rig.at(10)).await;

    // the emitted drag target is the exact circle intersection, then the
    // contact lifts and the cursor warps home
    let exit = Point::new(680.0, 300.0);
    assert_eq!(
        rig.injector.calls(),
        vec![Call::Drag(exit), Call::Release(exit), Call::Warp(CAM_ANCHOR)]
    );
    assert!(exit.distance_to(CAM_ANCHOR) <= 80.0 + 1e-6);

    let shared = rig.engine.shared.lock();
    assert!(shared.recenter.pending && shared.recenter.ready);
    assert_eq!(shared.recenter.target, Some(CAM_ANCHOR));
    assert!(!shared.camera.active);
    assert_eq!(shared.mouse_dx, 0.0);
    assert_eq!(shared.mouse_dy, 0.0);
}

#[tokio::test]
async fn test_recenter_waits_for_fresh_motion() {
    let rig = make_rig();
    rig.enter_battle().await;

    // arm the recenter via a boundary exit
    {
        let mut shared = rig.engine.shared.lock();
        shared.camera.active = true;
        shared.camera.touch_pos = Some(Point::new(670.0, 300.0));
    }
    rig.mouse_move(100.0, 0.0, Point::new(500.0, 300.0), 1);
    rig.engine.tick_at(rig.at(10)).await;
    assert!(rig.engine.shared.lock().recenter.pending);
    rig.injector.clear();

    // no new motion: stays armed, nothing pressed
    rig.engine.tick_at(rig.at(20)).await;
    assert!(rig.injector.calls().is_empty());

    // motion while pending is not accumulated, and a sample at the anchor
    // (the warp echo) does not count as a fresh stroke
    rig.mouse_move(3.0, 0.0, CAM_ANCHOR, 25);
    assert_eq!(rig.engine.shared.lock().mouse_dx, 0.0);
    rig.engine.tick_at(rig.at(30)).await;
    assert!(rig.injector.calls().is_empty());

    // a genuine stroke away from the anchor re-presses at the anchor with a
    // zero-displacement drag to pin the baseline
    rig.mouse_move(5.0, 0.0, Point::new(640.0, 300.0), 40);
    rig.engine.tick_at(rig.at(50)).await;

    assert_eq!(
        rig.injector.gestures(),
        vec![Call::Press(CAM_ANCHOR), Call::Drag(CAM_ANCHOR)]
    );
    let shared = rig.engine.shared.lock();
    assert!(!shared.recenter.pending);
    assert!(shared.camera.active);
    assert_eq!(shared.camera.touch_pos, Some(CAM_ANCHOR));
}

#[tokio::test]
async fn test_camera_consumes_bounded_slice() {
    let rig = make_rig();
    rig.enter_battle().await;

    let mut profile = test_profile();
    profile.camera.budget_px = 10.0;
    rig.engine.update_profile(profile);

    rig.mouse_move(100.0, 0.0, Point::new(400.0, 300.0), 1);
    rig.engine.tick_at(rig.at(10)).await;

    // one tick moves at most budget_px; the leftover stays accumulated
    let shared = rig.engine.shared.lock();
    assert!((shared.mouse_dx - 90.0).abs() < 1e-6);
    assert_eq!(shared.camera.touch_pos, Some(Point::new(610.0, 300.0)));
}

#[tokio::test]
async fn test_wheel_one_step_per_tick_and_quiet_stop() {
    let rig = make_rig();
    rig.enter_free().await;

    let origin = Point::new(500.0, 500.0);
    for _ in 0..3 {
        assert!(rig.scroll(1, origin, 1));
    }
    assert_eq!(rig.engine.shared.lock().wheel.pending_steps, 3);

    rig.engine.tick_at(rig.at(10)).await;
    rig.engine.tick_at(rig.at(20)).await;
    rig.engine.tick_at(rig.at(30)).await;

    let calls = rig.injector.calls();
    assert!(matches!(calls.first(), Some(Call::Press(p)) if *p == origin));
    assert_eq!(
        rig.injector.drags(),
        vec![
            Point::new(500.0, 508.0),
            Point::new(500.0, 516.0),
            Point::new(500.0, 524.0),
        ]
    );
    assert_eq!(rig.engine.shared.lock().wheel.pending_steps, 0);
    rig.injector.clear();

    // quiet period elapsed: release and restore the cursor origin
    rig.engine.tick_at(rig.at(200)).await;
    assert_eq!(
        rig.injector.calls(),
        vec![Call::Release(Point::new(500.0, 524.0)), Call::Warp(origin)]
    );
    assert!(!rig.engine.shared.lock().wheel.active);
}

#[tokio::test]
async fn test_wheel_battle_uses_anchor_without_cursor_restore() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.scroll(-1, Point::new(50.0, 50.0), 1);
    rig.engine.tick_at(rig.at(10)).await;

    // battle wheel presses at the configured anchor (camera anchor
    // fallback), not at the event position
    let calls = rig.injector.calls();
    assert!(matches!(calls.first(), Some(Call::Press(p)) if *p == CAM_ANCHOR));
    assert!(calls.contains(&Call::Drag(Point::new(600.0, 292.0))));
    rig.injector.clear();

    rig.engine.tick_at(rig.at(200)).await;
    let calls = rig.injector.calls();
    assert!(calls.contains(&Call::Release(Point::new(600.0, 292.0))));
    // no cursor restore in battle; that happens when battle exits
    assert!(!calls.iter().any(|c| matches!(c, Call::Warp(_))));
}

fn panic_state(rig: &Rig) -> (bool, bool, bool, bool, bool) {
    let shared = rig.engine.shared.lock();
    (
        shared.mapping_enabled,
        shared.camera_lock,
        shared.backpack_open,
        shared.camera.active || shared.joystick.active || shared.wheel.active,
        shared.recenter.pending,
    )
}

#[tokio::test]
async fn test_panic_is_idempotent() {
    let rig = make_rig();
    rig.enter_battle().await;
    rig.key_down("W", 1);
    rig.engine.tick_at(rig.at(10)).await;
    assert!(rig.engine.shared.lock().joystick.active);

    rig.engine.panic().await;
    let after_first = panic_state(&rig);
    rig.engine.panic().await;
    let after_second = panic_state(&rig);

    assert_eq!(after_first, (false, false, false, false, false));
    assert_eq!(after_first, after_second);

    rig.engine.tick_at(rig.at(30)).await;
    assert_eq!(rig.engine.current_mode(), Mode::Paused);
}

#[tokio::test]
async fn test_battle_exit_releases_and_restores_cursor() {
    let rig = make_rig();
    rig.engine.set_mapping_enabled(true).await;
    rig.engine.set_camera_lock(true);
    rig.engine.tick_at(rig.t0).await;
    assert!(rig.injector.calls().contains(&Call::HideCursor));
    rig.injector.clear();

    rig.engine.set_camera_lock(false);
    rig.engine.tick_at(rig.at(10)).await;

    let calls = rig.injector.calls();
    assert!(calls.contains(&Call::ReleaseAll));
    assert!(calls.contains(&Call::RestoreCursor));
    assert_eq!(rig.engine.current_mode(), Mode::Free);
    assert!(rig.engine.shared.lock().battle_cursor_snap.is_none());
}

#[tokio::test]
async fn test_backpack_toggle_taps_and_flips_lock() {
    let rig = make_rig();
    rig.enter_battle().await;

    assert!(rig.key_down("Tab", 1));
    {
        let shared = rig.engine.shared.lock();
        assert!(shared.backpack_open);
        assert!(!shared.camera_lock);
        assert_eq!(shared.tap_queue.len(), 1);
    }

    // next tick drops to Free (backpack open) and services the tap
    rig.engine.tick_at(rig.at(10)).await;
    assert_eq!(rig.injector.gestures(), vec![Call::Tap(BACKPACK_POINT)]);

    // closing re-locks the camera
    rig.key_down("Tab", 20);
    let shared = rig.engine.shared.lock();
    assert!(!shared.backpack_open);
    assert!(shared.camera_lock);
}

#[tokio::test]
async fn test_battle_swallows_keyboard_and_motion() {
    let rig = make_rig();
    rig.enter_battle().await;

    assert!(rig.key_down("E", 1)); // unmapped keys are captured too
    assert!(rig.key_up("E", 2));
    assert!(rig.mouse_move(1.0, 1.0, Point::new(10.0, 10.0), 3));

    rig.engine.set_camera_lock(false);
    rig.engine.tick_at(rig.at(10)).await;
    assert_eq!(rig.engine.current_mode(), Mode::Free);

    assert!(!rig.key_down("E", 20));
    assert!(!rig.mouse_move(1.0, 1.0, Point::new(10.0, 10.0), 21));
}

#[tokio::test]
async fn test_press_failure_degrades_to_inert() {
    let rig = make_rig();
    rig.enter_battle().await;

    rig.injector.fail_press.store(true, Ordering::Relaxed);
    rig.key_down("W", 1);
    rig.engine.tick_at(rig.at(10)).await;

    // session reset, nothing left half-open, loop still alive
    assert!(!rig.engine.shared.lock().joystick.active);
    assert!(rig.injector.calls().contains(&Call::ReleaseAll));

    rig.injector.fail_press.store(false, Ordering::Relaxed);
    rig.injector.clear();
    rig.engine.tick_at(rig.at(100)).await;
    assert!(rig.engine.shared.lock().joystick.active);
}

#[tokio::test]
async fn test_status_snapshot_reflects_state() {
    let rig = make_rig();
    rig.enter_battle().await;
    rig.key_down("W", 1);
    rig.engine.tick_at(rig.at(10)).await;

    let status = rig.engine.status();
    assert_eq!(status.mode, "battle");
    assert!(status.mapping_enabled);
    assert!(status.camera_lock);
    assert!(status.move_keys.up);
    assert!(!status.move_keys.down);
    assert!(status.joystick_active);
    assert!(!status.camera_active);
    assert_eq!(status.pending_taps, 0);
    assert_eq!(status.injector, "mock");
    assert!(status.warning.is_none());
}
