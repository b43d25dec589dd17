//! Error types for the protocol layer.
//!
//! Every failure here is local to one message: the caller drops the
//! message that produced it and keeps the connection alive. Nothing in
//! this crate touches sockets, so there is no I/O variant.

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A read needed more bytes than the buffer had left.
    ///
    /// This is the only error [`WireReader::optional`](crate::WireReader::optional)
    /// swallows: a missing trailing field means the peer speaks an older
    /// protocol revision, not that the data is corrupt.
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEndOfData {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A length prefix was negative.
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),

    /// A string field did not contain valid UTF-8.
    #[error("invalid UTF-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A property value carried a tag byte outside the known set.
    #[error("unknown property tag: {0}")]
    UnknownPropertyTag(u8),

    /// Property nesting exceeded the decode limit.
    #[error("property nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// A fragment record is internally inconsistent.
    #[error("invalid fragment: {0}")]
    InvalidFragment(String),

    /// The message is invalid at the protocol level.
    ///
    /// For values that decode fine but break a protocol rule, e.g. a
    /// negative element count.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Returns `true` for buffer underruns.
    pub fn is_end_of_data(&self) -> bool {
        matches!(self, Self::UnexpectedEndOfData { .. })
    }
}
