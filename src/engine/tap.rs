//! Discrete tap service
//!
//! A tap is a short, blocking, non-preemptible press-hold-release at a
//! (jittered) screen point. Requests that follow a mode change may carry a
//! pre-release and a settle delay for UI elements that need it.

use tracing::{info, warn};

use super::{Engine, Mode, TapRequest};

impl Engine {
    pub(crate) async fn service_tap(&self, req: TapRequest) {
        if req.pre_release {
            self.safe_release_all().await;
        }
        if !req.pre_delay.is_zero() {
            tokio::time::sleep(req.pre_delay).await;
        }

        let at = self.jittered(req.point, req.jitter_px);
        info!(
            "tap: {} (key={}) @ ({:.1}, {:.1})",
            req.name, req.label, at.x, at.y
        );

        let result = self.injector.tap(at, req.hold).await;

        // whatever happened, battle keeps the pointer hidden
        if self.current_mode() == Mode::Battle {
            let _ = self.injector.hide_cursor().await;
        }
        if let Err(e) = result {
            if self.warn_ok("tap_failed") {
                warn!("tap {} failed: {}", req.name, e);
            }
        }
    }
}
