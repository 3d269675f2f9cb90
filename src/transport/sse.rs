//! Incremental decoder for the AI-reply stream.
//!
//! The wire format is newline-delimited `data: <json>` lines terminated by
//! `data: [DONE]`. Bytes arrive in arbitrary chunks: a multi-byte UTF-8
//! sequence or a line may be split anywhere, so both are buffered across
//! [`FrameDecoder::feed`] calls.

use serde_json::Value;
use tracing::{trace, warn};

/// Sentinel payload closing the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A parsed JSON payload.
    Data(Value),
    /// The `[DONE]` sentinel. Nothing after it is decoded.
    Done,
}

/// Stateful bytes-to-frames decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    utf8_tail: Vec<u8>,
    /// Text of the current, not yet terminated line.
    line: String,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode one chunk, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }

        let text = self.decode_utf8(chunk);
        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line);
                self.process_line(&line, &mut frames);
                if self.done {
                    break;
                }
            } else {
                self.line.push(ch);
            }
        }
        frames
    }

    /// Flush at end of body: a dangling UTF-8 tail becomes U+FFFD and a
    /// trailing unterminated line is processed as a final line.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.done {
            return frames;
        }
        if !self.utf8_tail.is_empty() {
            let tail = std::mem::take(&mut self.utf8_tail);
            self.line.push_str(&String::from_utf8_lossy(&tail));
        }
        let line = std::mem::take(&mut self.line);
        if !line.is_empty() {
            self.process_line(&line, &mut frames);
        }
        frames
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.utf8_tail);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.utf8_tail = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn process_line(&mut self, raw: &str, frames: &mut Vec<Frame>) {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let Some(payload) = line.strip_prefix("data:") else {
            if !line.is_empty() {
                trace!(line, "Ignoring non-data stream line");
            }
            return;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload).trim();
        if payload.is_empty() {
            return;
        }
        if payload == DONE_SENTINEL {
            self.done = true;
            frames.push(Frame::Done);
            return;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => frames.push(Frame::Data(value)),
            Err(e) => warn!(error = %e, payload, "Skipping undecodable stream frame"),
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_body() -> Vec<u8> {
        let mut body = String::new();
        for (i, word) in ["héllo", "wörld", "日本語", "emoji 🎉", "plain"].iter().enumerate() {
            body.push_str(&format!("data: {}\r\n", json!({"i": i, "content": word})));
            if i % 2 == 0 {
                body.push('\n');
            }
        }
        body.push_str("data: not json\n");
        body.push_str("data: [DONE]\n");
        body.into_bytes()
    }

    fn decode_with_splits(body: &[u8], mut cuts: Vec<usize>) -> Vec<Frame> {
        cuts.sort_unstable();
        cuts.dedup();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        let mut start = 0;
        for cut in cuts {
            frames.extend(decoder.feed(&body[start..cut]));
            start = cut;
        }
        frames.extend(decoder.feed(&body[start..]));
        frames.extend(decoder.finish());
        frames
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Frames do not depend on where the byte stream was chunked.
        #[test]
        fn prop_chunking_is_invisible(raw_cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12)) {
            let body = sample_body();
            let cuts = raw_cuts.iter().map(|ix| ix.index(body.len() + 1)).collect();

            let expected = decode_with_splits(&body, Vec::new());
            prop_assert_eq!(expected.len(), 6);
            prop_assert_eq!(expected.last(), Some(&Frame::Done));

            let actual = decode_with_splits(&body, cuts);
            prop_assert_eq!(actual, expected);
        }
    }
}
