//! Target-activity probing
//!
//! The scheduler only maps input while the mirroring target is eligible to
//! receive it. Actual window/foreground detection is platform work that lives
//! behind this trait; the engine polls it at a low rate and caches the
//! result between checks.

/// Reports whether the mapping target is currently eligible (foreground).
///
/// Implementations must be cheap and non-blocking; the engine calls this
/// from the scheduler task a few times per second.
pub trait TargetProbe: Send + Sync {
    fn is_target_active(&self) -> bool;
}

/// Probe that always reports the target as active.
///
/// Used when target detection is disabled (the default): mapping applies to
/// whatever is foreground while enabled.
pub struct AlwaysActive;

impl TargetProbe for AlwaysActive {
    fn is_target_active(&self) -> bool {
        true
    }
}
