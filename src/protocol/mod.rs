//! Protocol module - request framing and response envelopes.
//!
//! This module implements the wire conventions on top of the line transport:
//! - Transcript filtering of incoming lines (`"> "` / `"< "` markers)
//! - JSON envelopes for outgoing messages
//! - Optional mirroring of all traffic to the diagnostic stream

mod envelope;
mod framer;

pub use envelope::{Envelope, CALLBACK_PREFIX};
pub use framer::{filter_transcript_line, Framer, REQUEST_MARKER, RESPONSE_MARKER};
