//! Fragment and aggregate records, plus both ends of fragmentation.
//!
//! A world message larger than the transport's datagram budget is cut into
//! [`Fragment`]s sharing one message number. The receiver collects them in
//! a [`FragmentTable`] until every index is present, then hands back the
//! original encoding. [`Aggregated`] is the opposite: several small world
//! messages packed into one envelope.

use std::collections::{BTreeMap, HashMap};

use crate::codec::{read_list, write_list, WireBody};
use crate::{ProtocolError, WireReader, WireWriter};

/// Upper bound on fragments per message. A peer announcing more is lying.
pub const MAX_FRAGMENTS: i32 = 1 << 16;

/// One chunk of an oversized world message.
///
/// `total_fragments` is on the wire only for fragment 0.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    pub message_number: i32,
    pub fragment_index: i32,
    pub total_fragments: Option<i32>,
    pub payload: Vec<u8>,
}

impl WireBody for Fragment {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let message_number = r.read_i32()?;
        let fragment_index = r.read_i32()?;
        let total_fragments = if fragment_index == 0 {
            Some(r.read_i32()?)
        } else {
            None
        };
        let payload = r.read_bytes()?;
        Ok(Self {
            message_number,
            fragment_index,
            total_fragments,
            payload,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        w.write_i32(self.message_number);
        w.write_i32(self.fragment_index);
        if self.fragment_index == 0 {
            w.write_i32(self.total_fragments.unwrap_or(1));
        }
        w.write_bytes(&self.payload);
    }
}

/// Cuts `payload` into chunks of at most `chunk_size` bytes.
///
/// Produces `ceil(len / chunk_size)` fragments, the last one possibly
/// short. An empty payload still yields one (empty) fragment.
pub fn split(message_number: i32, payload: &[u8], chunk_size: usize) -> Vec<Fragment> {
    let chunk_size = chunk_size.max(1);
    if payload.is_empty() {
        return vec![Fragment {
            message_number,
            fragment_index: 0,
            total_fragments: Some(1),
            payload: Vec::new(),
        }];
    }
    let total = payload.len().div_ceil(chunk_size) as i32;
    payload
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, chunk)| {
            let index = i as i32;
            Fragment {
                message_number,
                fragment_index: index,
                total_fragments: (index == 0).then_some(total),
                payload: chunk.to_vec(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reassembly
// ---------------------------------------------------------------------------

/// What inserting a fragment did to its assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentProgress {
    /// First fragment of a new message number; more are needed.
    Started,
    /// Stored (or ignored as a duplicate); more are needed.
    Incomplete,
    /// Every index is present. Carries the concatenated payload.
    Complete(Vec<u8>),
}

#[derive(Debug, Default)]
struct FragmentAssembly {
    expected_count: Option<i32>,
    chunks: BTreeMap<i32, Vec<u8>>,
}

impl FragmentAssembly {
    fn is_complete(&self) -> bool {
        self.expected_count
            .is_some_and(|count| self.chunks.len() == count as usize)
    }

    fn concat(self) -> Vec<u8> {
        let len = self.chunks.values().map(Vec::len).sum();
        let mut payload = Vec::with_capacity(len);
        for chunk in self.chunks.into_values() {
            payload.extend_from_slice(&chunk);
        }
        payload
    }
}

/// Partially received messages, keyed by message number.
///
/// Fragments may arrive in any order. The count is learned from fragment
/// 0, so nothing completes before fragment 0 has been seen. When an
/// insert fails on an existing assembly that can no longer complete, the
/// assembly is discarded; check [`contains`](Self::contains) afterwards.
#[derive(Debug, Default)]
pub struct FragmentTable {
    assemblies: HashMap<i32, FragmentAssembly>,
}

impl FragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fragment: Fragment) -> Result<FragmentProgress, ProtocolError> {
        let Fragment {
            message_number,
            fragment_index: index,
            total_fragments,
            payload,
        } = fragment;

        if !(0..MAX_FRAGMENTS).contains(&index) {
            return Err(ProtocolError::InvalidFragment(format!(
                "message {message_number}: index {index} out of range"
            )));
        }
        if let Some(count) = total_fragments {
            if !(1..=MAX_FRAGMENTS).contains(&count) {
                // The only fragment that could set the count is gone, so an
                // assembly still waiting for it can never complete.
                if self
                    .assemblies
                    .get(&message_number)
                    .is_some_and(|a| a.expected_count.is_none())
                {
                    self.assemblies.remove(&message_number);
                }
                return Err(ProtocolError::InvalidFragment(format!(
                    "message {message_number}: fragment count {count} out of range"
                )));
            }
        }

        let is_new = !self.assemblies.contains_key(&message_number);
        let assembly = self.assemblies.entry(message_number).or_default();

        if let Some(count) = total_fragments {
            if assembly.expected_count.is_none() {
                if assembly.chunks.keys().any(|&i| i >= count) {
                    self.assemblies.remove(&message_number);
                    return Err(ProtocolError::InvalidFragment(format!(
                        "message {message_number}: count {count} below an index already received"
                    )));
                }
                assembly.expected_count = Some(count);
            }
        }

        if let Some(count) = assembly.expected_count {
            if index >= count {
                if is_new {
                    self.assemblies.remove(&message_number);
                }
                return Err(ProtocolError::InvalidFragment(format!(
                    "message {message_number}: index {index} beyond count {count}"
                )));
            }
        }

        if assembly.chunks.contains_key(&index) {
            tracing::trace!(message_number, index, "duplicate fragment ignored");
            return Ok(FragmentProgress::Incomplete);
        }
        assembly.chunks.insert(index, payload);

        if assembly.is_complete() {
            let Some(done) = self.assemblies.remove(&message_number) else {
                return Ok(FragmentProgress::Incomplete);
            };
            return Ok(FragmentProgress::Complete(done.concat()));
        }
        Ok(if is_new {
            FragmentProgress::Started
        } else {
            FragmentProgress::Incomplete
        })
    }

    /// Whether an assembly for `message_number` is pending.
    pub fn contains(&self, message_number: i32) -> bool {
        self.assemblies.contains_key(&message_number)
    }

    /// Drops a pending assembly.
    pub fn remove(&mut self, message_number: i32) -> bool {
        self.assemblies.remove(&message_number).is_some()
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Bytes a world header adds to an encoded body: subject id + type code.
const WORLD_HEADER_LEN: usize = 12;

/// Several complete world message encodings in one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregated {
    pub messages: Vec<Vec<u8>>,
}

impl Aggregated {
    /// Size of this envelope once wrapped in a world message.
    pub fn encoded_len(&self) -> usize {
        WORLD_HEADER_LEN + 4 + self.messages.iter().map(|m| 4 + m.len()).sum::<usize>()
    }

    /// Groups encoded world messages into envelopes of at most `budget`
    /// bytes each, keeping their order.
    ///
    /// A message that alone exceeds the budget gets an envelope of its own;
    /// the caller is expected to fragment it.
    pub fn pack(encoded: Vec<Vec<u8>>, budget: usize) -> Vec<Aggregated> {
        let mut envelopes = Vec::new();
        let mut current = Aggregated::default();
        let mut current_len = WORLD_HEADER_LEN + 4;
        for message in encoded {
            let cost = 4 + message.len();
            if !current.messages.is_empty() && current_len + cost > budget {
                envelopes.push(std::mem::take(&mut current));
                current_len = WORLD_HEADER_LEN + 4;
            }
            current_len += cost;
            current.messages.push(message);
        }
        if !current.messages.is_empty() {
            envelopes.push(current);
        }
        envelopes
    }
}

impl WireBody for Aggregated {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            messages: read_list(r, |r| r.read_bytes())?,
        })
    }

    fn encode(&self, w: &mut WireWriter) {
        write_list(w, &self.messages, |w, m| w.write_bytes(m));
    }
}
