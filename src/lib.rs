//! Touch GW - drive a single-touch mirrored screen from desktop input
//!
//! The gateway captures keyboard state, mouse motion, and scroll ticks, and
//! translates them into press/drag/release gestures against a consumer that
//! accepts exactly one simultaneous touch contact. Four virtual controls
//! (joystick, camera drag, wheel drag, taps) compete for that contact; the
//! [`engine`] module arbitrates them under a fixed-rate scheduler.

pub mod cli;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod inject;
pub mod keys;
pub mod probe;
