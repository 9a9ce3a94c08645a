//! Protocol framer (C4).
//!
//! Byte-stream packetizer for `$<payload>#<cc>` frames, where `<cc>` is the
//! two lowercase hex digits of `sum(payload) mod 256`.

/// Result of trying to extract one frame from the receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame with a matching checksum; carries its payload.
    Valid(Vec<u8>),
    /// A frame was found but its checksum did not match.
    Invalid,
}

/// Accumulates inbound bytes and reassembles `$...#cc` frames.
#[derive(Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append freshly received bytes to the internal buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Try to pull one complete frame out of the buffer.
    ///
    /// Anything before the first `$` is discarded. Returns `None` if no
    /// complete frame is available yet (more bytes are needed).
    pub fn next_frame(&mut self) -> Option<FrameOutcome> {
        let start = self.buf.iter().position(|&b| b == b'$')?;
        let hash_offset = self.buf[start..].iter().position(|&b| b == b'#')?;
        let end = start + hash_offset;
        if self.buf.len() < end + 3 {
            return None;
        }

        let payload = self.buf[start + 1..end].to_vec();
        let checksum_digits = std::str::from_utf8(&self.buf[end + 1..end + 3]).ok();
        let expected = checksum_digits.and_then(|s| u8::from_str_radix(s, 16).ok());

        self.buf.drain(..end + 3);

        let outcome = match expected {
            Some(expected) => {
                let actual = checksum(&payload);
                if actual == expected {
                    FrameOutcome::Valid(payload)
                } else {
                    FrameOutcome::Invalid
                }
            }
            None => FrameOutcome::Invalid,
        };
        Some(outcome)
    }
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encode `payload` as a complete `$...#cc` frame for transmission.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(b'$');
    out.extend_from_slice(payload);
    out.push(b'#');
    out.extend_from_slice(format!("{:02x}", checksum(payload)).as_bytes());
    out
}
