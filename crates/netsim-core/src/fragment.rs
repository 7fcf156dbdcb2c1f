//! Fragmentation — splitting payloads into datagrams that fit an MTU.
//!
//! Two entry points share one splitting routine:
//! - [`fragment_message`] at the origin host, for a whole application payload;
//! - [`refragment`] at a router, for a datagram that is too large for the
//!   outgoing link.
//!
//! Offsets always stay relative to the original message, so a datagram can
//! be split again at every hop and the receiver still knows where each
//! piece belongs.

use bytes::Bytes;

use crate::wire::{Address, Datagram, FragmentFlag, HEADER_LEN};

/// Payload bytes that fit in one datagram on a link with this MTU.
pub fn max_payload(mtu: usize) -> Result<usize, FragmentError> {
    if mtu <= HEADER_LEN {
        return Err(FragmentError::CapacityTooSmall { mtu });
    }
    Ok(mtu - HEADER_LEN)
}

/// Split an application payload into datagrams no larger than `mtu`.
///
/// Exactly one datagram, the final one, is tagged LAST. An empty payload
/// still produces a single LAST datagram.
pub fn fragment_message(
    source: Address,
    destination: Address,
    payload: Bytes,
    mtu: usize,
) -> Result<Vec<Datagram>, FragmentError> {
    let chunk = max_payload(mtu)?;
    split(source, destination, payload, 0, chunk, FragmentFlag::Last)
}

/// Split an in-flight datagram for a smaller outgoing MTU.
///
/// A datagram that already fits is returned unchanged. Otherwise the final
/// piece inherits the input's flag: it is LAST only if the input was.
pub fn refragment(datagram: Datagram, mtu: usize) -> Result<Vec<Datagram>, FragmentError> {
    let chunk = max_payload(mtu)?;
    if datagram.payload.len() <= chunk {
        return Ok(vec![datagram]);
    }
    split(
        datagram.source,
        datagram.destination,
        datagram.payload,
        datagram.offset,
        chunk,
        datagram.flag,
    )
}

fn split(
    source: Address,
    destination: Address,
    payload: Bytes,
    base_offset: u32,
    chunk: usize,
    final_flag: FragmentFlag,
) -> Result<Vec<Datagram>, FragmentError> {
    if payload.is_empty() {
        return Ok(vec![Datagram {
            flag: final_flag,
            offset: base_offset,
            source,
            destination,
            payload,
        }]);
    }

    let mut out = Vec::with_capacity(payload.len().div_ceil(chunk));
    for start in (0..payload.len()).step_by(chunk) {
        let end = (start + chunk).min(payload.len());
        let offset = u32::try_from(start)
            .ok()
            .and_then(|s| base_offset.checked_add(s))
            .ok_or(FragmentError::OffsetOverflow { base_offset, start })?;
        let flag = if end == payload.len() {
            final_flag
        } else {
            FragmentFlag::More
        };
        out.push(Datagram {
            flag,
            offset,
            source,
            destination,
            payload: payload.slice(start..end),
        });
    }
    Ok(out)
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FragmentError {
    /// Configuration error: the link cannot carry even an empty datagram.
    #[error("mtu {mtu} leaves no room for payload after the {}-byte header", HEADER_LEN)]
    CapacityTooSmall { mtu: usize },

    #[error("fragment offset {base_offset} + {start} overflows")]
    OffsetOverflow { base_offset: u32, start: usize },
}
