//! Console injector - logs all gestures for testing and debugging
//!
//! Useful for validating mapping behavior without a real injection backend,
//! and as the dry-run backend for development on machines where injection
//! is unavailable.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use super::{CursorSnapshot, InjectError, Injector};
use crate::geometry::Point;

#[derive(Debug, Default)]
struct ConsoleState {
    pressed_at: Option<Point>,
    cursor: Point,
    cursor_hidden: bool,
    gesture_count: u64,
}

/// Injector that prints every primitive call instead of performing it
pub struct ConsoleInjector {
    name: String,
    state: Mutex<ConsoleState>,
}

impl ConsoleInjector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ConsoleState::default()),
        }
    }

    /// Number of press/tap gestures performed so far
    pub fn gesture_count(&self) -> u64 {
        self.state.lock().gesture_count
    }

    /// Whether a press is currently open
    pub fn is_pressed(&self) -> bool {
        self.state.lock().pressed_at.is_some()
    }
}

#[async_trait]
impl Injector for ConsoleInjector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn press(&self, at: Point) -> Result<(), InjectError> {
        let mut state = self.state.lock();
        state.pressed_at = Some(at);
        state.cursor = at;
        state.gesture_count += 1;
        debug!("[{}] press @ ({:.1}, {:.1})", self.name, at.x, at.y);
        Ok(())
    }

    async fn drag(&self, to: Point) -> Result<(), InjectError> {
        let mut state = self.state.lock();
        if state.pressed_at.is_none() {
            return Err(InjectError::NoOpenPress);
        }
        state.pressed_at = Some(to);
        state.cursor = to;
        debug!("[{}] drag → ({:.1}, {:.1})", self.name, to.x, to.y);
        Ok(())
    }

    async fn release(&self, at: Point) -> Result<(), InjectError> {
        let mut state = self.state.lock();
        state.pressed_at = None;
        state.cursor = at;
        debug!("[{}] release @ ({:.1}, {:.1})", self.name, at.x, at.y);
        Ok(())
    }

    async fn tap(&self, at: Point, hold: Duration) -> Result<(), InjectError> {
        {
            let mut state = self.state.lock();
            state.cursor = at;
            state.gesture_count += 1;
        }
        info!(
            "[{}] tap @ ({:.1}, {:.1}) hold {}ms",
            self.name,
            at.x,
            at.y,
            hold.as_millis()
        );
        tokio::time::sleep(hold).await;
        Ok(())
    }

    async fn warp_cursor(&self, to: Point) -> Result<(), InjectError> {
        self.state.lock().cursor = to;
        debug!("[{}] warp cursor → ({:.1}, {:.1})", self.name, to.x, to.y);
        Ok(())
    }

    async fn hide_cursor(&self) -> Result<(), InjectError> {
        let mut state = self.state.lock();
        if !state.cursor_hidden {
            state.cursor_hidden = true;
            debug!("[{}] hide cursor", self.name);
        }
        Ok(())
    }

    async fn show_cursor(&self) -> Result<(), InjectError> {
        let mut state = self.state.lock();
        if state.cursor_hidden {
            state.cursor_hidden = false;
            debug!("[{}] show cursor", self.name);
        }
        Ok(())
    }

    async fn snapshot_cursor(&self) -> Result<CursorSnapshot, InjectError> {
        let state = self.state.lock();
        Ok(CursorSnapshot {
            position: state.cursor,
            hidden: state.cursor_hidden,
        })
    }

    async fn restore_cursor(&self, snapshot: CursorSnapshot) -> Result<(), InjectError> {
        let mut state = self.state.lock();
        state.cursor = snapshot.position;
        state.cursor_hidden = snapshot.hidden;
        debug!(
            "[{}] restore cursor @ ({:.1}, {:.1}) hidden={}",
            self.name, snapshot.position.x, snapshot.position.y, snapshot.hidden
        );
        Ok(())
    }

    async fn cursor_position(&self) -> Result<Point, InjectError> {
        Ok(self.state.lock().cursor)
    }

    async fn release_all(&self) -> Result<(), InjectError> {
        let mut state = self.state.lock();
        if state.pressed_at.take().is_some() {
            debug!("[{}] release_all: closed open press", self.name);
        }
        state.cursor_hidden = false;
        Ok(())
    }
}
