//! The generic RLP item tree and its canonical codec.
//!
//! An [`RlpItem`] is either a byte string or a list of items. Encoding is
//! delegated to [`rlp::RlpStream`]. Decoding parses item headers with
//! [`rlp::Rlp::payload_info`] and walks list payloads with an explicit byte
//! offset, so that a flat concatenation of independently encoded items can be
//! consumed one item at a time with [`consume_item`].

use std::fmt::{self, Display};

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use rlp::{DecoderError, Encodable, Rlp, RlpStream};
use thiserror::Error;

/// Lists nested deeper than this are rejected instead of recursing further.
pub const MAX_DECODE_DEPTH: usize = 1024;

/// Byte strings longer than this are summarized by [`ItemTree`].
const SHORT_BYTES_LEN: usize = 32;

/// Stores the result of decoding operations. Returns a [`DecodingError`] upon
/// failure.
pub type DecodingResult<T> = Result<T, DecodingError>;

/// An error raised when bytes are not a valid canonical RLP item, or when a
/// valid item does not have the shape of the structure being decoded.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DecodingError {
    /// There are no bytes left at the offset.
    #[error("No RLP item at offset {0}, the buffer is exhausted")]
    Empty(usize),

    /// The item header is invalid or the payload overruns the buffer.
    #[error("Malformed RLP item at offset {offset}: {source}")]
    Malformed {
        /// Offset of the item header.
        offset: usize,
        /// The underlying header error.
        source: DecoderError,
    },

    /// A single byte below `0x80` was wrapped in a length prefix.
    #[error("Non-canonical RLP item at offset {0}: single byte below 0x80 carries a length prefix")]
    NonCanonical(usize),

    /// Lists are nested beyond [`MAX_DECODE_DEPTH`].
    #[error("RLP item at offset {0} is nested deeper than {MAX_DECODE_DEPTH} lists")]
    TooDeep(usize),

    /// Bytes remain after a complete top-level item.
    #[error("{0} trailing bytes after the RLP item")]
    TrailingBytes(usize),

    /// A byte string was found where a list was expected.
    #[error("Expected an RLP list for {0}")]
    ExpectedList(&'static str),

    /// A list was found where a byte string was expected.
    #[error("Expected an RLP byte string for {0}")]
    ExpectedBytes(&'static str),

    /// A list has the wrong number of items.
    #[error("Expected {expected} items in {what}, found {found}")]
    ItemCount {
        /// What was being decoded.
        what: &'static str,
        /// The accepted item count(s).
        expected: &'static str,
        /// The actual item count.
        found: usize,
    },

    /// A byte string is not a valid value for the field it occupies.
    #[error("Invalid value 0x{value} for field `{field}`: {reason}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Hex of the offending bytes.
        value: String,
        /// Why the bytes were rejected.
        reason: String,
    },
}

impl DecodingError {
    pub(crate) fn invalid_field(field: &'static str, bytes: &[u8], reason: impl Display) -> Self {
        Self::InvalidField {
            field,
            value: hex::encode(bytes),
            reason: reason.to_string(),
        }
    }
}

/// A decoded (or to be encoded) RLP item.
#[derive(Clone, Debug, EnumAsInner, Eq, Hash, PartialEq)]
pub enum RlpItem {
    /// A byte string.
    Bytes(Bytes),

    /// An ordered list of items.
    List(Vec<RlpItem>),
}

impl From<Bytes> for RlpItem {
    fn from(v: Bytes) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for RlpItem {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<Vec<RlpItem>> for RlpItem {
    fn from(v: Vec<RlpItem>) -> Self {
        Self::List(v)
    }
}

impl Encodable for RlpItem {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            RlpItem::Bytes(b) => s.encoder().encode_value(b),
            RlpItem::List(items) => {
                s.begin_list(items.len());
                for item in items {
                    s.append(item);
                }
            }
        }
    }
}

impl RlpItem {
    /// Builds a list of byte strings.
    pub fn bytes_list<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        Self::List(fields.into_iter().map(Self::Bytes).collect())
    }

    /// Expects a byte string, naming `what` in the error otherwise.
    pub fn expect_bytes(&self, what: &'static str) -> DecodingResult<&Bytes> {
        self.as_bytes().ok_or(DecodingError::ExpectedBytes(what))
    }

    /// Expects a list, naming `what` in the error otherwise.
    pub fn expect_list(&self, what: &'static str) -> DecodingResult<&[RlpItem]> {
        self.as_list()
            .map(Vec::as_slice)
            .ok_or(DecodingError::ExpectedList(what))
    }

    /// Expects a list of byte strings.
    pub fn expect_bytes_list(&self, what: &'static str) -> DecodingResult<Vec<Bytes>> {
        self.expect_list(what)?
            .iter()
            .map(|item| item.expect_bytes(what).cloned())
            .collect()
    }

    /// Renders the item as an indented tree, collapsing lists nested deeper
    /// than `max_depth`.
    pub const fn display_tree(&self, max_depth: usize) -> ItemTree<'_> {
        ItemTree {
            item: self,
            max_depth,
        }
    }
}

/// Indented, depth-limited rendering of an [`RlpItem`].
///
/// Single bytes below `0x80` are printed as integers, short byte strings as
/// hex, and long byte strings are summarized by their first and last 16 bytes.
#[derive(Clone, Copy, Debug)]
pub struct ItemTree<'a> {
    item: &'a RlpItem,
    max_depth: usize,
}

impl Display for ItemTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_tree(f, self.item, 0, self.max_depth)
    }
}

fn write_tree(
    f: &mut fmt::Formatter<'_>,
    item: &RlpItem,
    indent: usize,
    max_depth: usize,
) -> fmt::Result {
    let pad = "  ".repeat(indent);
    if indent > max_depth {
        return writeln!(f, "{}...", pad);
    }

    match item {
        RlpItem::List(items) => {
            writeln!(f, "{}[", pad)?;
            for child in items {
                write_tree(f, child, indent + 1, max_depth)?;
            }
            writeln!(f, "{}]", pad)
        }
        RlpItem::Bytes(b) if b.len() == 1 && b[0] < 0x80 => writeln!(f, "{}{}", pad, b[0]),
        RlpItem::Bytes(b) if b.len() <= SHORT_BYTES_LEN => {
            writeln!(f, "{}0x{}", pad, hex::encode(b))
        }
        RlpItem::Bytes(b) => writeln!(
            f,
            "{}0x{}...{} (length: {})",
            pad,
            hex::encode(&b[..16]),
            hex::encode(&b[b.len() - 16..]),
            b.len()
        ),
    }
}

/// Encodes an item into its canonical RLP bytes.
pub fn rlp_encode(item: &RlpItem) -> Bytes {
    rlp::encode(item).freeze()
}

/// Decodes exactly one item spanning the whole buffer.
pub fn rlp_decode(buf: &[u8]) -> DecodingResult<RlpItem> {
    let (item, consumed) = consume_item(buf, 0)?;
    match buf.len() - consumed {
        0 => Ok(item),
        trailing => Err(DecodingError::TrailingBytes(trailing)),
    }
}

/// Decodes the item starting at `offset`.
///
/// Returns the item and the number of bytes it occupies, so the next item of
/// a concatenated stream starts at `offset + consumed`.
pub fn consume_item(buf: &[u8], offset: usize) -> DecodingResult<(RlpItem, usize)> {
    consume_item_at_depth(buf, offset, 0)
}

fn consume_item_at_depth(
    buf: &[u8],
    offset: usize,
    depth: usize,
) -> DecodingResult<(RlpItem, usize)> {
    if depth > MAX_DECODE_DEPTH {
        return Err(DecodingError::TooDeep(offset));
    }

    let rest = match buf.get(offset..) {
        Some(rest) if !rest.is_empty() => rest,
        _ => return Err(DecodingError::Empty(offset)),
    };

    // Also checks that the payload fits in `rest`.
    let info = Rlp::new(rest)
        .payload_info()
        .map_err(|source| DecodingError::Malformed { offset, source })?;
    let payload_start = offset + info.header_len;
    let end = payload_start + info.value_len;

    let item = match rest[0] >= 0xc0 {
        true => {
            // Children may not read past the end of this list.
            let list_buf = &buf[..end];
            let mut children = Vec::new();
            let mut cursor = payload_start;

            while cursor < end {
                let (child, consumed) = consume_item_at_depth(list_buf, cursor, depth + 1)?;
                children.push(child);
                cursor += consumed;
            }

            RlpItem::List(children)
        }
        false => {
            let payload = &buf[payload_start..end];
            if info.header_len == 1 && payload.len() == 1 && payload[0] < 0x80 {
                return Err(DecodingError::NonCanonical(offset));
            }

            RlpItem::Bytes(Bytes::copy_from_slice(payload))
        }
    };

    Ok((item, end - offset))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    use super::*;

    fn bytes(b: &[u8]) -> RlpItem {
        RlpItem::from(b)
    }

    fn random_bytes(rng: &mut StdRng, len: usize) -> Bytes {
        let mut buf = vec![0; len];
        rng.fill_bytes(&mut buf);
        buf.into()
    }

    #[test]
    fn known_vectors_encode() {
        assert_eq!(rlp_encode(&bytes(b"dog")), &hex!("83646f67")[..]);
        assert_eq!(
            rlp_encode(&RlpItem::List(vec![bytes(b"cat"), bytes(b"dog")])),
            &hex!("c88363617483646f67")[..]
        );
        assert_eq!(rlp_encode(&bytes(b"")), &hex!("80")[..]);
        assert_eq!(rlp_encode(&RlpItem::List(vec![])), &hex!("c0")[..]);
        assert_eq!(rlp_encode(&bytes(&[0x00])), &hex!("00")[..]);
        assert_eq!(rlp_encode(&bytes(&[0x7f])), &hex!("7f")[..]);
        assert_eq!(rlp_encode(&bytes(&[0x80])), &hex!("8180")[..]);

        // [ [], [[]], [ [], [[]] ] ]
        let set_theory = RlpItem::List(vec![
            RlpItem::List(vec![]),
            RlpItem::List(vec![RlpItem::List(vec![])]),
            RlpItem::List(vec![
                RlpItem::List(vec![]),
                RlpItem::List(vec![RlpItem::List(vec![])]),
            ]),
        ]);
        assert_eq!(rlp_encode(&set_theory), &hex!("c7c0c1c0c3c0c1c0")[..]);
    }

    #[test]
    fn length_prefix_tiers() {
        let mut rng = StdRng::seed_from_u64(0);

        let s55 = random_bytes(&mut rng, 55);
        let enc = rlp_encode(&RlpItem::Bytes(s55));
        assert_eq!(enc[0], 0x80 + 55);
        assert_eq!(enc.len(), 56);

        let s56 = random_bytes(&mut rng, 56);
        let enc = rlp_encode(&RlpItem::Bytes(s56));
        assert_eq!(&enc[..2], &[0xb8, 56]);

        let s10k = random_bytes(&mut rng, 10_000);
        let enc = rlp_encode(&RlpItem::Bytes(s10k));
        assert_eq!(&enc[..3], &[0xb9, 0x27, 0x10]);
    }

    #[test]
    fn byte_strings_round_trip() {
        let mut rng = StdRng::seed_from_u64(42);

        for len in [0, 1, 55, 56, 10_000] {
            let item = RlpItem::Bytes(random_bytes(&mut rng, len));
            assert_eq!(rlp_decode(&rlp_encode(&item)).unwrap(), item, "len {}", len);
        }

        for b in [0x00, 0x7f, 0x80, 0xff] {
            let item = bytes(&[b]);
            assert_eq!(rlp_decode(&rlp_encode(&item)).unwrap(), item);
        }
    }

    #[test]
    fn nested_lists_round_trip() {
        let mut rng = StdRng::seed_from_u64(7);

        let item = RlpItem::List(vec![
            RlpItem::List(vec![]),
            RlpItem::List(vec![
                bytes(b""),
                RlpItem::List(vec![bytes(b"a"), RlpItem::List(vec![])]),
                RlpItem::Bytes(random_bytes(&mut rng, 60)),
            ]),
            RlpItem::List(vec![RlpItem::List(vec![RlpItem::Bytes(random_bytes(
                &mut rng, 300,
            ))])]),
            bytes(&[0x05]),
        ]);

        assert_eq!(rlp_decode(&rlp_encode(&item)).unwrap(), item);
    }

    #[test]
    fn long_lists_round_trip() {
        let item = RlpItem::List((0..100u8).map(|i| bytes(&[i, i])).collect());
        let enc = rlp_encode(&item);

        assert_eq!(enc[0], 0xf8 + 1);
        assert_eq!(rlp_decode(&enc).unwrap(), item);
    }

    #[test]
    fn consume_item_walks_a_flat_stream() {
        let first = RlpItem::List(vec![bytes(b"cat"), bytes(b"dog")]);
        let second = bytes(b"horse");
        let third = bytes(&[0x01]);

        let mut stream = Vec::new();
        for item in [&first, &second, &third] {
            stream.extend_from_slice(&rlp_encode(item));
        }

        let (a, used_a) = consume_item(&stream, 0).unwrap();
        let (b, used_b) = consume_item(&stream, used_a).unwrap();
        let (c, used_c) = consume_item(&stream, used_a + used_b).unwrap();

        assert_eq!((a, b, c), (first, second, third));
        assert_eq!(used_a + used_b + used_c, stream.len());
        assert_eq!(
            consume_item(&stream, stream.len()),
            Err(DecodingError::Empty(stream.len()))
        );
    }

    #[test]
    fn truncated_input_is_rejected() {
        // String of 3 declared bytes, only 2 present.
        assert!(matches!(
            rlp_decode(&hex!("83646f")),
            Err(DecodingError::Malformed { offset: 0, .. })
        ));

        // Long string whose length-of-length is cut off.
        assert!(matches!(
            rlp_decode(&hex!("b9")),
            Err(DecodingError::Malformed { .. })
        ));

        // List claiming 8 payload bytes with 4 present.
        assert!(matches!(
            rlp_decode(&hex!("c883636174")),
            Err(DecodingError::Malformed { .. })
        ));

        assert_eq!(rlp_decode(&[]), Err(DecodingError::Empty(0)));
    }

    #[test]
    fn child_overrunning_its_list_is_rejected() {
        // The list declares 2 payload bytes but its child declares 3.
        let buf = hex!("c283646f67");
        assert!(matches!(
            rlp_decode(&buf),
            Err(DecodingError::Malformed { offset: 1, .. })
        ));
    }

    #[test]
    fn non_canonical_headers_are_rejected() {
        assert_eq!(rlp_decode(&hex!("8105")), Err(DecodingError::NonCanonical(0)));

        // Long form used for a 3 byte string.
        assert_eq!(
            rlp_decode(&hex!("b803646f67")),
            Err(DecodingError::Malformed {
                offset: 0,
                source: DecoderError::RlpInvalidIndirection
            })
        );

        // Length with a leading zero byte.
        let mut buf = hex!("b90038").to_vec();
        buf.extend_from_slice(&[0xaa; 56]);
        assert_eq!(
            rlp_decode(&buf),
            Err(DecodingError::Malformed {
                offset: 0,
                source: DecoderError::RlpDataLenWithZeroPrefix
            })
        );
    }

    #[test]
    fn trailing_bytes_are_rejected_by_single_item_decode() {
        assert_eq!(
            rlp_decode(&hex!("83646f670102")),
            Err(DecodingError::TrailingBytes(2))
        );
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let depth = MAX_DECODE_DEPTH + 2;
        let mut item = RlpItem::List(vec![]);
        for _ in 0..depth {
            item = RlpItem::List(vec![item]);
        }

        assert!(matches!(
            rlp_decode(&rlp_encode(&item)),
            Err(DecodingError::TooDeep(_))
        ));
    }

    #[test]
    fn tree_display_summarizes_long_values() {
        let item = RlpItem::List(vec![
            bytes(&[0x05]),
            bytes(&[0xaa, 0xbb]),
            RlpItem::Bytes(vec![0x11; 40].into()),
            RlpItem::List(vec![RlpItem::List(vec![bytes(b"deep")])]),
        ]);

        let rendered = item.display_tree(1).to_string();
        let expected = format!(
            "[\n  5\n  0xaabb\n  0x{}...{} (length: 40)\n  [\n    ...\n  ]\n]\n",
            "11".repeat(16),
            "11".repeat(16)
        );

        assert_eq!(rendered, expected);
    }
}
