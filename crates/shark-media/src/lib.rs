//! Media pipeline — camera capture, frame sampling, session recording, and
//! scheduled audio playback.

pub mod audio;
pub mod capture;
pub mod frame;
pub mod recorder;
pub mod scheduler;

#[cfg(feature = "cpal-audio")]
pub mod sink_cpal;
