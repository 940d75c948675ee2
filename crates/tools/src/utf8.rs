//! Incremental UTF-8 decoding for byte-stream markup input.
//!
//! Multi-byte sequences split across chunk boundaries are carried over to the
//! next chunk. Invalid bytes are replaced with U+FFFD so decoding always makes
//! forward progress.

/// Streaming decoder holding the incomplete UTF-8 suffix of the last chunk.
///
/// The carry is at most three bytes: anything longer is either a complete
/// sequence or invalid.
#[derive(Clone, Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes waiting for the rest of their sequence.
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    pub fn has_pending(&self) -> bool {
        !self.carry.is_empty()
    }

    /// Decode `bytes` and append the complete characters to `out`.
    pub fn push(&mut self, out: &mut String, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.carry.is_empty() {
            decode_into(out, &mut self.carry, bytes);
            return;
        }

        let mut remaining = bytes;
        while !self.carry.is_empty() && !remaining.is_empty() {
            let expected = sequence_len(self.carry[0]);
            if expected == 0 {
                out.push('\u{FFFD}');
                self.carry.clear();
                break;
            }

            let needed = expected.saturating_sub(self.carry.len());
            if remaining.len() < needed {
                self.carry.extend_from_slice(remaining);
                return;
            }

            let mut scratch = [0u8; 8];
            let carried = self.carry.len();
            scratch[..carried].copy_from_slice(&self.carry);
            scratch[carried..carried + needed].copy_from_slice(&remaining[..needed]);
            self.carry.clear();
            decode_into(out, &mut self.carry, &scratch[..carried + needed]);
            remaining = &remaining[needed..];
        }

        if !remaining.is_empty() {
            decode_into(out, &mut self.carry, remaining);
        }
    }

    /// Flush a dangling partial sequence lossily so input is never truncated.
    pub fn finish(&mut self, out: &mut String) {
        if self.carry.is_empty() {
            return;
        }
        out.push_str(&String::from_utf8_lossy(&self.carry));
        self.carry.clear();
    }

    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

fn sequence_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

fn decode_into(out: &mut String, carry: &mut Vec<u8>, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                break;
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if valid_up_to > 0 {
                    if let Ok(valid) = std::str::from_utf8(&bytes[..valid_up_to]) {
                        out.push_str(valid);
                    }
                }
                match err.error_len() {
                    Some(len) => {
                        out.push('\u{FFFD}');
                        bytes = &bytes[valid_up_to + len..];
                    }
                    None => {
                        carry.extend_from_slice(&bytes[valid_up_to..]);
                        break;
                    }
                }
            }
        }
    }
}
