//! netsim wire format — the on-wire representation of one datagram.
//!
//! These constants ARE the protocol. Every field width is part of the wire
//! format, and the fragmentation arithmetic downstream (chunk size =
//! MTU - HEADER_LEN) depends on them.
//!
//! The header is fixed-width ASCII: decimal digits left-padded with '0',
//! followed immediately by the raw payload bytes.
//!
//! ```text
//! +------+--------+--------+--------+--------+-------+-----------------+
//! | flag | offset | source | dest   | length | check | payload ...     |
//! |  1   |   4    |   5    |   5    |   4    |   4   | length - 23     |
//! +------+--------+--------+--------+--------+-------+-----------------+
//! ```
//!
//! `check` is an error-detection code, not a MAC. It is the leading four
//! characters of the decimal CRC-32 of the 19 bytes before it. The payload
//! is not covered; truncation is caught by the length field instead.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::const_assert_eq;

/// Host identifier carried in the source and destination fields.
pub type Address = u32;

// ── Field widths ─────────────────────────────────────────────────────────────

pub const FLAG_LEN: usize = 1;
pub const OFFSET_LEN: usize = 4;
pub const SOURCE_LEN: usize = 5;
pub const DESTINATION_LEN: usize = 5;
pub const LENGTH_LEN: usize = 4;
pub const CHECKSUM_LEN: usize = 4;

/// Total header width in bytes.
pub const HEADER_LEN: usize = 23;

// Compile-time size guard. If this fails, the wire format has silently changed.
const_assert_eq!(
    FLAG_LEN + OFFSET_LEN + SOURCE_LEN + DESTINATION_LEN + LENGTH_LEN + CHECKSUM_LEN,
    HEADER_LEN
);

/// Bytes covered by the integrity check.
const CHECKED_LEN: usize = HEADER_LEN - CHECKSUM_LEN;

// ── Fragment flag ────────────────────────────────────────────────────────────

/// Whether more fragments of the original message follow this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentFlag {
    More,
    Last,
}

impl FragmentFlag {
    pub fn is_last(self) -> bool {
        matches!(self, FragmentFlag::Last)
    }

    fn as_byte(self) -> u8 {
        match self {
            FragmentFlag::More => b'0',
            FragmentFlag::Last => b'1',
        }
    }
}

impl TryFrom<u8> for FragmentFlag {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            b'0' => Ok(FragmentFlag::More),
            b'1' => Ok(FragmentFlag::Last),
            other => Err(WireError::Malformed(format!(
                "unknown fragment flag 0x{other:02x}"
            ))),
        }
    }
}

// ── Datagram ─────────────────────────────────────────────────────────────────

/// One network-layer unit: a header plus a slice of some original message.
///
/// `offset` is always relative to the original, unfragmented message, no
/// matter how many times the datagram has been split on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub flag: FragmentFlag,
    /// Byte offset of `payload` within the original message.
    pub offset: u32,
    pub source: Address,
    pub destination: Address,
    pub payload: Bytes,
}

impl Datagram {
    /// Encoded size: header plus payload.
    pub fn total_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialize to the wire format.
    ///
    /// Fails with `FieldOverflow` if any value does not fit its field.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let total_len = self.total_len();
        let mut buf = BytesMut::with_capacity(total_len);

        buf.put_u8(self.flag.as_byte());
        put_field(&mut buf, "fragment-offset", u64::from(self.offset), OFFSET_LEN)?;
        put_field(&mut buf, "source-address", u64::from(self.source), SOURCE_LEN)?;
        put_field(
            &mut buf,
            "destination-address",
            u64::from(self.destination),
            DESTINATION_LEN,
        )?;
        put_field(&mut buf, "total-length", total_len as u64, LENGTH_LEN)?;

        let check = checksum(&buf[..CHECKED_LEN]);
        buf.put_slice(&check);
        buf.put_slice(&self.payload);

        Ok(buf.freeze())
    }

    /// Parse a frame produced by [`Datagram::encode`].
    ///
    /// The payload is a zero-copy slice of `frame`.
    pub fn decode(frame: &Bytes) -> Result<Self, WireError> {
        if frame.len() < HEADER_LEN {
            return Err(WireError::Malformed(format!(
                "frame too short: need at least {HEADER_LEN} bytes, got {}",
                frame.len()
            )));
        }

        let checked = &frame[..CHECKED_LEN];
        let stored = &frame[CHECKED_LEN..HEADER_LEN];
        let computed = checksum(checked);
        if stored != computed {
            return Err(WireError::ChecksumMismatch {
                stored: String::from_utf8_lossy(stored).into_owned(),
                computed: String::from_utf8_lossy(&computed).into_owned(),
            });
        }

        let mut cursor = checked;
        let flag = FragmentFlag::try_from(take(&mut cursor, FLAG_LEN)[0])?;
        let offset = parse_field(take(&mut cursor, OFFSET_LEN), "fragment-offset")?;
        let source = parse_field(take(&mut cursor, SOURCE_LEN), "source-address")?;
        let destination = parse_field(take(&mut cursor, DESTINATION_LEN), "destination-address")?;
        let total_len = parse_field(take(&mut cursor, LENGTH_LEN), "total-length")?;

        if total_len as usize != frame.len() {
            return Err(WireError::Malformed(format!(
                "total-length says {total_len}, frame is {} bytes",
                frame.len()
            )));
        }

        Ok(Self {
            flag,
            offset,
            source,
            destination,
            payload: frame.slice(HEADER_LEN..),
        })
    }
}

impl fmt::Display for Datagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{} offset={} len={}{}",
            self.source,
            self.destination,
            self.offset,
            self.payload.len(),
            if self.flag.is_last() { " last" } else { "" }
        )
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Integrity check over `bytes`: the first four characters of the decimal
/// CRC-32, zero-padded so short values still fill the field.
pub fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digits = format!("{:04}", crc32fast::hash(bytes));
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digits.as_bytes()[..CHECKSUM_LEN]);
    out
}

/// Largest value a decimal field of `width` digits can hold.
pub const fn field_max(width: usize) -> u64 {
    let mut max = 1u64;
    let mut i = 0;
    while i < width {
        max *= 10;
        i += 1;
    }
    max - 1
}

fn put_field(
    buf: &mut BytesMut,
    field: &'static str,
    value: u64,
    width: usize,
) -> Result<(), WireError> {
    let max = field_max(width);
    if value > max {
        return Err(WireError::FieldOverflow { field, value, max });
    }
    buf.put_slice(format!("{value:0width$}").as_bytes());
    Ok(())
}

fn take<'a>(cursor: &mut &'a [u8], len: usize) -> &'a [u8] {
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    head
}

fn parse_field(digits: &[u8], field: &'static str) -> Result<u32, WireError> {
    digits.iter().try_fold(0u32, |acc, &b| {
        if b.is_ascii_digit() {
            Ok(acc * 10 + u32::from(b - b'0'))
        } else {
            Err(WireError::Malformed(format!(
                "{field} contains non-digit byte 0x{b:02x}"
            )))
        }
    })
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when encoding or interpreting a frame.
/// Always fatal to that one frame, never to the unit that saw it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("malformed datagram: {0}")]
    Malformed(String),

    #[error("checksum mismatch: header carries {stored}, computed {computed}")]
    ChecksumMismatch { stored: String, computed: String },

    #[error("{field} value {value} does not fit the wire field (max {max})")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

// ── Tests ────────────────────────────────────────────────────────────────────
