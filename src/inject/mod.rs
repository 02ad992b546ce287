//! Touch-point injection primitives
//!
//! The scheduler is the only caller of these primitives; the input-delivery
//! side never injects. Backends implement [`Injector`] with `&self` methods
//! and interior mutability so they can be shared as `Arc<dyn Injector>`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::geometry::{segment_points, Point};

pub mod console;

pub use console::ConsoleInjector;

/// Cursor position/visibility captured before the cursor is hidden, so the
/// desktop state can be restored when leaving Battle mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorSnapshot {
    pub position: Point,
    pub hidden: bool,
}

/// Injection failure taxonomy
///
/// Transient failures degrade the offending control to inert; they never
/// stop the tick loop. Permission problems are detected once at startup and
/// surfaced as a persistent warning in the status snapshot.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("backend rejected {op}: {reason}")]
    Rejected {
        op: &'static str,
        reason: String,
    },
    #[error("drag requires an open press")]
    NoOpenPress,
    #[error("injection backend unavailable: {0}")]
    Unavailable(String),
    #[error("missing injection permission: {0}")]
    PermissionDenied(String),
}

/// The point-injection primitive consumed by the scheduler.
///
/// One touch contact only: `press` opens it, `drag` moves it (requires an
/// open press), `release` closes it. `release_all` is an idempotent safety
/// net that closes whatever is open.
#[async_trait]
pub trait Injector: Send + Sync {
    /// Backend name for logs and the status snapshot
    fn name(&self) -> &str;

    /// One-shot startup probe for permissions/environment.
    ///
    /// A failure here is reported once and remembered; it is not retried
    /// per tick.
    async fn check_ready(&self) -> Result<(), InjectError> {
        Ok(())
    }

    async fn press(&self, at: Point) -> Result<(), InjectError>;

    async fn drag(&self, to: Point) -> Result<(), InjectError>;

    async fn release(&self, at: Point) -> Result<(), InjectError>;

    /// Press, hold for `hold`, release — a complete discrete tap.
    async fn tap(&self, at: Point, hold: Duration) -> Result<(), InjectError>;

    /// Hard cursor move that does not synthesize a motion event.
    async fn warp_cursor(&self, to: Point) -> Result<(), InjectError>;

    async fn hide_cursor(&self) -> Result<(), InjectError>;

    async fn show_cursor(&self) -> Result<(), InjectError>;

    async fn snapshot_cursor(&self) -> Result<CursorSnapshot, InjectError>;

    async fn restore_cursor(&self, snapshot: CursorSnapshot) -> Result<(), InjectError>;

    async fn cursor_position(&self) -> Result<Point, InjectError>;

    /// Close any open press and show the cursor. Idempotent.
    async fn release_all(&self) -> Result<(), InjectError>;
}

/// Drag from `from` to `to` as a sequence of points no further than
/// `max_step_px` apart, so the consumer sees a finger-like trace instead of
/// a teleport. The press stays open; the caller decides when to release.
pub async fn drag_smooth(
    injector: &dyn Injector,
    from: Point,
    to: Point,
    max_step_px: f64,
) -> Result<(), InjectError> {
    for p in segment_points(from, to, max_step_px) {
        injector.drag(p).await?;
    }
    Ok(())
}
