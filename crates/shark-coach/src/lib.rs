//! Live AI coaching and post-session review.
//!
//! [`session`] runs the real-time loop: sample a frame every two seconds, feed
//! it to the live model, play the spoken reply, keep the last few transcript
//! lines. [`review`] answers questions about a single moment of a finished
//! session.

pub mod prompt;
pub mod review;
pub mod session;
pub mod transcript;

pub use session::{CoachHandle, CoachSettings, CoachState, CoachUpdate};
pub use transcript::TranscriptRing;
