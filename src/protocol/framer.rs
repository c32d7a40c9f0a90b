//! Request framing on top of the line transport.
//!
//! Requests are plain lines. A debug session can be replayed by feeding its
//! transcript back in: recorded responses (`"< "`) are skipped and recorded
//! requests (`"> "`) have their marker stripped.
//!
//! # Important
//!
//! - **output**: one JSON value per line (see [`Envelope`])
//! - **diagnostics**: transcript of the traffic when debug mode is on

use super::envelope::Envelope;
use crate::error::Result;
use crate::transport::LineTransport;

/// Marker of a recorded request in a transcript.
pub const REQUEST_MARKER: &str = "> ";

/// Marker of a recorded response in a transcript.
pub const RESPONSE_MARKER: &str = "< ";

/// Apply transcript filtering to a raw line.
///
/// Returns `None` for recorded responses, the line without its marker for
/// recorded requests, and the line unchanged otherwise.
pub fn filter_transcript_line(line: &str) -> Option<&str> {
    if line.starts_with(RESPONSE_MARKER) {
        return None;
    }
    Some(line.strip_prefix(REQUEST_MARKER).unwrap_or(line))
}

/// Protocol framer: JSON envelopes out, filtered request lines in.
pub struct Framer {
    transport: LineTransport,
    debug: bool,
}

impl Framer {
    /// Wrap a transport.
    pub fn new(transport: LineTransport, debug: bool) -> Self {
        Self { transport, debug }
    }

    /// Whether traffic is mirrored to the diagnostic stream.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The underlying transport.
    pub fn transport(&self) -> &LineTransport {
        &self.transport
    }

    /// Serialize `message` as one JSON line and write it.
    ///
    /// # Errors
    ///
    /// Returns serialization or transport errors.
    pub fn write(&self, message: &Envelope) -> Result<()> {
        let line = serde_json::to_string(message)?;
        self.transport.write_line(&line)?;

        if self.debug {
            self.transport
                .write_error_line(&format!("{RESPONSE_MARKER}{line}"))?;
        }
        Ok(())
    }

    /// Read the next request, blocking the thread.
    ///
    /// Returns `Ok(None)` at end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns transport errors.
    pub fn read_sync(&self) -> Result<Option<String>> {
        loop {
            let Some(line) = self.transport.read_line()? else {
                return Ok(None);
            };
            if let Some(request) = filter_transcript_line(&line) {
                return self.accept(request).map(Some);
            }
        }
    }

    /// Read the next request, yielding between chunk reads.
    ///
    /// Returns `Ok(None)` at end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns transport errors.
    pub async fn read_async(&self) -> Result<Option<String>> {
        loop {
            let Some(line) = self.transport.read_line_async().await? else {
                return Ok(None);
            };
            if let Some(request) = filter_transcript_line(&line) {
                return self.accept(request).map(Some);
            }
        }
    }

    fn accept(&self, request: &str) -> Result<String> {
        if self.debug {
            let quoted = serde_json::to_string(request)?;
            self.transport
                .write_error_line(&format!("{REQUEST_MARKER}{quoted}"))?;
        }
        Ok(request.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryInput, SharedOutput};

    fn framer(lines: &[&str], debug: bool) -> (Framer, SharedOutput, SharedOutput) {
        let out = SharedOutput::new();
        let err = SharedOutput::new();
        let transport = LineTransport::new(MemoryInput::from_lines(lines), out.clone(), err.clone());
        (Framer::new(transport, debug), out, err)
    }

    #[test]
    fn test_filter_transcript_line() {
        assert_eq!(filter_transcript_line("plain"), Some("plain"));
        assert_eq!(filter_transcript_line("> recorded"), Some("recorded"));
        assert_eq!(filter_transcript_line("> > twice"), Some("> twice"));
        assert_eq!(filter_transcript_line("< response"), None);
        assert_eq!(filter_transcript_line(">no space"), Some(">no space"));
        assert_eq!(filter_transcript_line(""), Some(""));
    }

    #[test]
    fn test_read_sync_filters_transcript() {
        let (framer, _, _) = framer(&["a", "< {\"ok\":\"a\"}", "> b", "< x", "< y", "c"], false);

        assert_eq!(framer.read_sync().unwrap().as_deref(), Some("a"));
        assert_eq!(framer.read_sync().unwrap().as_deref(), Some("b"));
        assert_eq!(framer.read_sync().unwrap().as_deref(), Some("c"));
        assert_eq!(framer.read_sync().unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_async_filters_transcript() {
        let (framer, _, _) = framer(&["< skipped", "> kept", "plain"], false);

        assert_eq!(framer.read_async().await.unwrap().as_deref(), Some("kept"));
        assert_eq!(framer.read_async().await.unwrap().as_deref(), Some("plain"));
        assert_eq!(framer.read_async().await.unwrap(), None);
    }

    #[test]
    fn test_only_responses_then_eof() {
        let (framer, _, _) = framer(&["< one", "< two"], false);
        assert_eq!(framer.read_sync().unwrap(), None);
    }

    #[test]
    fn test_write_serializes_one_line() {
        let (framer, out, err) = framer(&[], false);

        framer.write(&Envelope::ok("done")).unwrap();
        framer.write(&Envelope::callback("tok")).unwrap();

        assert_eq!(out.lines(), vec![r#"{"ok":"done"}"#, r#""Callback: tok""#]);
        assert!(err.contents().is_empty());
    }

    #[test]
    fn test_debug_mirrors_traffic() {
        let (framer, _, err) = framer(&["say \"hi\""], true);

        let request = framer.read_sync().unwrap().unwrap();
        framer.write(&Envelope::ok(request)).unwrap();

        assert_eq!(
            err.lines(),
            vec![
                r#"> "say \"hi\"""#.to_string(),
                r#"< {"ok":"say \"hi\""}"#.to_string(),
            ]
        );
    }
}
