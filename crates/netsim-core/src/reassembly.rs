//! Reassembly — turning received datagrams back into messages.
//!
//! Datagrams are buffered per (source, destination) pair until one tagged
//! LAST arrives. At that point the buffer is sorted by offset and walked
//! with a running byte count: every datagram must start exactly where the
//! previous one ended. A gap or an overlap fails the whole message and the
//! buffer is discarded; partial data is never delivered.
//!
//! The walk must also end on the LAST datagram. Anything buffered past it
//! belongs to some other message on the same pair (typically the remains
//! of one that lost pieces in flight) and fails the message.
//!
//! The header carries no message identifier, so two messages in flight
//! between the same pair at once cannot be told apart. Their pieces either
//! overlap or trail the LAST datagram, and both cases drop the message
//! rather than splice the two together.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::wire::{Address, Datagram};

/// Reassembly buffer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub source: Address,
    pub destination: Address,
}

impl MessageKey {
    pub fn of(datagram: &Datagram) -> Self {
        Self {
            source: datagram.source,
            destination: datagram.destination,
        }
    }
}

/// A fully reassembled application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub source: Address,
    pub destination: Address,
    pub payload: Bytes,
}

/// Result of feeding the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    Complete(Message),
    /// No LAST datagram yet; everything received so far is retained.
    Incomplete,
}

#[derive(Debug, Default)]
pub struct Reassembler {
    pending: HashMap<MessageKey, Vec<Datagram>>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a datagram. If it is tagged LAST, attempt to finish its message.
    pub fn accept(&mut self, datagram: Datagram) -> Result<Assembly, ReassemblyError> {
        let key = MessageKey::of(&datagram);
        let last = datagram.flag.is_last();
        self.pending.entry(key).or_default().push(datagram);
        if last {
            self.try_finish(key)
        } else {
            Ok(Assembly::Incomplete)
        }
    }

    /// Verify and concatenate the buffered datagrams for `key`.
    ///
    /// Returns `Incomplete` (keeping the buffer) until a LAST datagram has
    /// been accepted. Otherwise the buffer is consumed whether or not the
    /// offsets line up.
    pub fn try_finish(&mut self, key: MessageKey) -> Result<Assembly, ReassemblyError> {
        let has_last = self
            .pending
            .get(&key)
            .is_some_and(|ds| ds.iter().any(|d| d.flag.is_last()));
        if !has_last {
            return Ok(Assembly::Incomplete);
        }

        let mut fragments = self.pending.remove(&key).unwrap_or_default();
        fragments.sort_by_key(|d| d.offset);

        let total: usize = fragments.iter().map(|d| d.payload.len()).sum();
        let mut payload = BytesMut::with_capacity(total);
        let mut expected: u64 = 0;
        let mut ended = false;
        for fragment in &fragments {
            if ended {
                return Err(ReassemblyError::TrailingFragment {
                    src: key.source,
                    dst: key.destination,
                    end: expected,
                    found: fragment.offset,
                });
            }
            if u64::from(fragment.offset) != expected {
                return Err(ReassemblyError::MissingFragment {
                    src: key.source,
                    dst: key.destination,
                    expected,
                    found: fragment.offset,
                });
            }
            payload.extend_from_slice(&fragment.payload);
            expected += fragment.payload.len() as u64;
            ended = fragment.flag.is_last();
        }

        Ok(Assembly::Complete(Message {
            source: key.source,
            destination: key.destination,
            payload: payload.freeze(),
        }))
    }

    /// Number of messages with at least one datagram buffered.
    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_fragments(&self, key: &MessageKey) -> usize {
        self.pending.get(key).map(Vec::len).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReassemblyError {
    /// Gap or overlap in the offset walk. The message is dropped.
    #[error("message {src}->{dst}: expected fragment at offset {expected}, found {found}")]
    MissingFragment {
        src: Address,
        dst: Address,
        expected: u64,
        found: u32,
    },

    /// A datagram sits at or beyond the end of the LAST datagram.
    #[error("message {src}->{dst}: ends at offset {end}, but a fragment at {found} follows")]
    TrailingFragment {
        src: Address,
        dst: Address,
        end: u64,
        found: u32,
    },
}
