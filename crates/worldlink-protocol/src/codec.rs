//! Traits that tie message types to the wire codec.
//!
//! A message body knows how to read and write its own fields
//! ([`WireBody`]). A code-space message (one of the three top-level enums)
//! additionally knows its header layout and owns the registry that turns a
//! leading type code into the right body decoder ([`WireMessage`]).

use std::fmt;

use crate::{ProtocolError, WireReader, WireWriter};

/// The three independent type-code spaces.
///
/// The same number means different things in different spaces, so each
/// space has its own enum and its own registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeSpace {
    /// Master server: world resolution.
    Master,
    /// World server, TCP: character selection before the session starts.
    WorldTcp,
    /// World server, reliable datagrams: in-session traffic.
    World,
}

impl fmt::Display for CodeSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::WorldTcp => write!(f, "world-tcp"),
            Self::World => write!(f, "world"),
        }
    }
}

/// The fields of one message variant, without its header.
pub trait WireBody: Sized {
    /// Reads the body from the cursor positioned just after the header.
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError>;

    /// Appends the body to the writer.
    fn encode(&self, w: &mut WireWriter);
}

/// A complete message of one code-space: header plus body.
pub trait WireMessage: Sized + Send + 'static {
    /// Which registry decodes this type.
    const CODE_SPACE: CodeSpace;

    /// The numeric type code written in the header.
    fn type_code(&self) -> i32;

    /// Human-readable variant name for logs.
    fn name(&self) -> &'static str;

    /// Appends header and body.
    fn encode(&self, w: &mut WireWriter);

    /// Runs the registry over one complete payload.
    ///
    /// Returns `Ok(None)` for a type code this space does not know; the
    /// caller drops the payload and carries on. Returns `Err` when a known
    /// message is malformed.
    fn decode(bytes: &[u8]) -> Result<Option<Self>, ProtocolError>;

    /// Encodes into a fresh buffer.
    fn to_bytes(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }
}

/// Logs leftover bytes after a successful decode.
///
/// Newer peers may append fields we do not know yet, so this is not an
/// error.
pub(crate) fn note_trailing(space: CodeSpace, code: i32, r: &WireReader<'_>) {
    if !r.is_empty() {
        tracing::trace!(
            %space,
            code,
            trailing = r.remaining(),
            "ignoring trailing bytes after message body"
        );
    }
}

// ---------------------------------------------------------------------------
// Shared body helpers
// ---------------------------------------------------------------------------

pub(crate) fn read_list<T>(
    r: &mut WireReader<'_>,
    mut read: impl FnMut(&mut WireReader<'_>) -> Result<T, ProtocolError>,
) -> Result<Vec<T>, ProtocolError> {
    let count = r.read_count()?;
    let mut items = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        items.push(read(r)?);
    }
    Ok(items)
}

pub(crate) fn write_list<T>(
    w: &mut WireWriter,
    items: &[T],
    mut write: impl FnMut(&mut WireWriter, &T),
) {
    w.write_count(items.len());
    for item in items {
        write(w, item);
    }
}

pub(crate) fn read_strings(r: &mut WireReader<'_>) -> Result<Vec<String>, ProtocolError> {
    read_list(r, |r| r.read_string())
}

pub(crate) fn write_strings(w: &mut WireWriter, items: &[String]) {
    write_list(w, items, |w, s| w.write_string(s));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_space_display() {
        assert_eq!(CodeSpace::Master.to_string(), "master");
        assert_eq!(CodeSpace::WorldTcp.to_string(), "world-tcp");
        assert_eq!(CodeSpace::World.to_string(), "world");
    }

    #[test]
    fn test_list_helpers_roundtrip() {
        let names = vec!["a".to_string(), String::new(), "ccc".to_string()];
        let mut w = WireWriter::new();
        write_strings(&mut w, &names);
        let bytes = w.into_bytes();
        assert_eq!(read_strings(&mut WireReader::new(&bytes)).unwrap(), names);
    }

    #[test]
    fn test_huge_count_does_not_preallocate() {
        // A count of i32::MAX with no elements behind it must fail cleanly
        // instead of trying to reserve gigabytes.
        let bytes = i32::MAX.to_be_bytes();
        let result = read_list(&mut WireReader::new(&bytes), |r| r.read_i64());
        assert!(result.unwrap_err().is_end_of_data());
    }
}
