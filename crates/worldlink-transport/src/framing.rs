//! Length-prefixed framing for the TCP stream.
//!
//! Every payload on the wire is a length-prefixed frame:
//!
//! ```text
//! +-------------------+-------------------------------+
//! | length (4 bytes)  |   payload                     |
//! | u32 big-endian    |   [type code: i32][body]      |
//! +-------------------+-------------------------------+
//! ```
//!
//! The length does **not** include the 4 prefix bytes. A payload always
//! starts with a 4-byte type code, so a length below 4 can only mean the
//! stream has lost frame alignment.
//!
//! [`FrameAssembler`] is a two-state machine fed with whatever the socket
//! returns. It never looks at more than one frame header at a time, so
//! there is no leftover bookkeeping to get wrong.

use bytes::{Buf, BufMut, BytesMut};

/// Size of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Smallest legal frame length: a bare type code.
pub const MIN_FRAME_LEN: u32 = 4;

/// Errors that can occur during framing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The length prefix cannot describe a real payload.
    #[error("frame length {len} outside {min}..={max}")]
    InvalidLength {
        /// The length read from the wire.
        len: u32,
        /// Smallest acceptable length.
        min: u32,
        /// The configured maximum.
        max: u32,
    },

    /// An outgoing payload is larger than the frame limit.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: usize,
        /// The configured maximum.
        max: u32,
    },
}

/// Prefixes `payload` with its big-endian length.
pub fn encode_frame(payload: &[u8], max_frame_len: u32) -> Result<Vec<u8>, FrameError> {
    if payload.len() > max_frame_len as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: max_frame_len,
        });
    }
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    Ok(frame.to_vec())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    /// Waiting for the 4 length bytes.
    Length,
    /// Waiting for this many body bytes.
    Body(usize),
}

/// Reassembles frames from arbitrarily chunked stream reads.
///
/// ```
/// use worldlink_transport::{encode_frame, FrameAssembler};
///
/// let frame = encode_frame(&[0, 0, 0, 1, 42], 1024).unwrap();
/// let mut assembler = FrameAssembler::new(1024);
/// assembler.extend(&frame[..3]);
/// assert_eq!(assembler.next_frame().unwrap(), None);
/// assembler.extend(&frame[3..]);
/// assert_eq!(assembler.next_frame().unwrap(), Some(vec![0, 0, 0, 1, 42]));
/// ```
#[derive(Debug)]
pub struct FrameAssembler {
    state: FrameState,
    buf: BytesMut,
    max_frame_len: u32,
}

impl FrameAssembler {
    pub fn new(max_frame_len: u32) -> Self {
        Self {
            state: FrameState::Length,
            buf: BytesMut::new(),
            max_frame_len,
        }
    }

    /// Appends bytes as they came off the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pops the next complete frame payload, if one is buffered.
    ///
    /// Call in a loop after each [`extend`](Self::extend): one read may
    /// complete several frames. An invalid length is fatal; the assembler
    /// is reset and the stream must be abandoned.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        loop {
            match self.state {
                FrameState::Length => {
                    if self.buf.len() < LENGTH_PREFIX_LEN {
                        return Ok(None);
                    }
                    let len = self.buf.get_u32();
                    if !(MIN_FRAME_LEN..=self.max_frame_len).contains(&len) {
                        self.reset();
                        return Err(FrameError::InvalidLength {
                            len,
                            min: MIN_FRAME_LEN,
                            max: self.max_frame_len,
                        });
                    }
                    let len = len as usize;
                    self.buf.reserve(len.saturating_sub(self.buf.len()));
                    self.state = FrameState::Body(len);
                }
                FrameState::Body(len) => {
                    if self.buf.len() < len {
                        return Ok(None);
                    }
                    let payload = self.buf.split_to(len).to_vec();
                    self.state = FrameState::Length;
                    return Ok(Some(payload));
                }
            }
        }
    }

    /// Bytes buffered but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Discards any partial frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = FrameState::Length;
    }
}
