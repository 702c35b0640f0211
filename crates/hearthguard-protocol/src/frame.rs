//! Length-prefixed framing.
//!
//! Every packet travels as exactly one frame:
//!
//! ```text
//! [ version: 4 bytes ][ type: u16 LE ][ body length: u16 LE ][ body ]
//! ```
//!
//! The header has a constant size, so a reader always knows how many bytes
//! to wait for before it can learn the body length. Frames are never
//! delimited by a separator: separator bytes can legally appear inside a
//! binary body, a length prefix cannot be confused with data.

use bytes::{BufMut, Bytes, BytesMut};

use crate::ProtocolError;

/// Version bytes leading every frame. Both ends are built from the same
/// definitions, so a mismatch means the stream is not ours or is corrupted.
pub const PROTOCOL_VERSION: [u8; 4] = [0, 0, 0, 1];

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = PROTOCOL_VERSION.len() + 2 + 2;

/// Largest body the 16-bit length field can describe.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// The decoded fixed-size header of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Ordinal of the packet variant inside its union.
    pub kind: u16,
    /// Number of body bytes following the header.
    pub content_length: u16,
}

impl FrameHeader {
    /// Builds a header for a body of `body_len` bytes.
    ///
    /// # Errors
    /// [`ProtocolError::BodyTooLarge`] if the body does not fit in `u16`.
    pub fn new(kind: u16, body_len: usize) -> Result<Self, ProtocolError> {
        let content_length = u16::try_from(body_len)
            .map_err(|_| ProtocolError::BodyTooLarge(body_len))?;
        Ok(Self {
            kind,
            content_length,
        })
    }

    /// Appends the encoded header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_LEN);
        dst.put_slice(&PROTOCOL_VERSION);
        dst.put_u16_le(self.kind);
        dst.put_u16_le(self.content_length);
    }

    /// Total size of the frame this header describes.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.content_length as usize
    }
}

/// One complete frame split off a receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Bytes,
}

/// Encodes a header for a packet of type `kind` with `body_len` body bytes.
pub fn encode_header(kind: u16, body_len: usize) -> Result<[u8; HEADER_LEN], ProtocolError> {
    let header = FrameHeader::new(kind, body_len)?;
    let mut out = [0u8; HEADER_LEN];
    out[..4].copy_from_slice(&PROTOCOL_VERSION);
    out[4..6].copy_from_slice(&header.kind.to_le_bytes());
    out[6..8].copy_from_slice(&header.content_length.to_le_bytes());
    Ok(out)
}

/// Parses the header at the start of `bytes` and checks its type tag
/// against a union of `variant_count` packets.
///
/// # Errors
/// - [`ProtocolError::InvalidLength`] if fewer than [`HEADER_LEN`] bytes are given.
/// - [`ProtocolError::InvalidVersion`] if the version bytes don't match.
/// - [`ProtocolError::InvalidType`] if `kind >= variant_count`.
pub fn decode_header(bytes: &[u8], variant_count: u16) -> Result<FrameHeader, ProtocolError> {
    let header = parse_header(bytes)?;
    check_kind(header.kind, variant_count)?;
    Ok(header)
}

/// Wraps an encoded body into a complete frame.
pub fn encode_frame(kind: u16, body: &[u8]) -> Result<Bytes, ProtocolError> {
    let header = FrameHeader::new(kind, body.len())?;
    let mut out = BytesMut::with_capacity(header.frame_len());
    header.encode(&mut out);
    out.put_slice(body);
    Ok(out.freeze())
}

/// Splits one complete frame off the front of `buf`.
///
/// Returns `Ok(None)` until the header and the whole declared body have
/// arrived; partial frames stay in `buf` untouched. A frame whose type
/// tag is out of range is still removed from `buf` before
/// [`ProtocolError::InvalidType`] is returned, so the next call starts at
/// the following frame.
///
/// # Errors
/// [`ProtocolError::InvalidVersion`] means `buf` no longer starts at a
/// frame boundary. Nothing is consumed and the connection should be
/// dropped (see [`ProtocolError::is_fatal`]).
pub fn try_take_frame(
    buf: &mut BytesMut,
    variant_count: u16,
) -> Result<Option<Frame>, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let header = parse_header(&buf[..HEADER_LEN])?;
    let frame_len = header.frame_len();
    if buf.len() < frame_len {
        tracing::trace!(
            have = buf.len(),
            need = frame_len,
            "partial frame buffered"
        );
        return Ok(None);
    }

    let mut raw = buf.split_to(frame_len);
    let body = raw.split_off(HEADER_LEN).freeze();
    debug_assert_eq!(body.len(), header.content_length as usize);

    check_kind(header.kind, variant_count)?;

    tracing::trace!(kind = header.kind, len = body.len(), "frame taken");
    Ok(Some(Frame { header, body }))
}

/// Length and version checks only.
fn parse_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let mut found = [0u8; 4];
    found.copy_from_slice(&bytes[..4]);
    if found != PROTOCOL_VERSION {
        return Err(ProtocolError::InvalidVersion { found });
    }

    Ok(FrameHeader {
        kind: u16::from_le_bytes([bytes[4], bytes[5]]),
        content_length: u16::from_le_bytes([bytes[6], bytes[7]]),
    })
}

fn check_kind(kind: u16, variant_count: u16) -> Result<(), ProtocolError> {
    if kind >= variant_count {
        return Err(ProtocolError::InvalidType {
            tag: kind,
            count: variant_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header_layout() {
        let header = encode_header(3, 0x0102).expect("fits");
        assert_eq!(header, [0, 0, 0, 1, 3, 0, 0x02, 0x01]);
    }

    #[test]
    fn test_encode_header_body_too_large() {
        let err = encode_header(0, MAX_BODY_LEN + 1).expect_err("too large");
        assert_eq!(err, ProtocolError::BodyTooLarge(MAX_BODY_LEN + 1));
    }

    #[test]
    fn test_decode_header_short_input_invalid_length() {
        let err = decode_header(&[0, 0, 0, 1, 0], 4).expect_err("short");
        assert_eq!(
            err,
            ProtocolError::InvalidLength {
                expected: HEADER_LEN,
                actual: 5
            }
        );
    }

    #[test]
    fn test_decode_header_corrupted_version() {
        let mut header = encode_header(1, 4).expect("fits");
        header[3] = 7;
        let err = decode_header(&header, 4).expect_err("bad version");
        assert_eq!(err, ProtocolError::InvalidVersion { found: [0, 0, 0, 7] });
        assert!(err.is_fatal());
    }

    #[test]
    fn test_decode_header_type_out_of_range() {
        let header = encode_header(4, 0).expect("fits");
        let err = decode_header(&header, 4).expect_err("bad type");
        assert_eq!(err, ProtocolError::InvalidType { tag: 4, count: 4 });
    }

    #[test]
    fn test_decode_header_roundtrip() {
        let bytes = encode_header(2, 17).expect("fits");
        let header = decode_header(&bytes, 4).expect("valid");
        assert_eq!(
            header,
            FrameHeader {
                kind: 2,
                content_length: 17
            }
        );
    }

    #[test]
    fn test_try_take_frame_empty_buffer_returns_none() {
        let mut buf = BytesMut::new();
        assert_eq!(try_take_frame(&mut buf, 4), Ok(None));
    }

    #[test]
    fn test_try_take_frame_partial_body_keeps_bytes() {
        let frame = encode_frame(1, b"abcd").expect("encode");
        let mut buf = BytesMut::from(&frame[..frame.len() - 1]);
        assert_eq!(try_take_frame(&mut buf, 4), Ok(None));
        assert_eq!(buf.len(), frame.len() - 1);
    }

    #[test]
    fn test_try_take_frame_leaves_next_frame_in_buffer() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(1, b"first").expect("encode"));
        buf.extend_from_slice(&encode_frame(2, b"second").expect("encode"));

        let a = try_take_frame(&mut buf, 4).expect("ok").expect("frame");
        assert_eq!(a.header.kind, 1);
        assert_eq!(&a.body[..], b"first");

        let b = try_take_frame(&mut buf, 4).expect("ok").expect("frame");
        assert_eq!(b.header.kind, 2);
        assert_eq!(&b.body[..], b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_try_take_frame_invalid_type_consumes_frame() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(9, b"junk").expect("encode"));
        buf.extend_from_slice(&encode_frame(0, b"").expect("encode"));

        let err = try_take_frame(&mut buf, 4).expect_err("bad type");
        assert_eq!(err, ProtocolError::InvalidType { tag: 9, count: 4 });

        // The bad frame is gone; the following one decodes normally.
        let next = try_take_frame(&mut buf, 4).expect("ok").expect("frame");
        assert_eq!(next.header.kind, 0);
    }

    #[test]
    fn test_try_take_frame_bad_version_consumes_nothing() {
        let mut buf = BytesMut::from(&b"\x0f\x00\x01\x0agarbage"[..]);
        let before = buf.len();
        let err = try_take_frame(&mut buf, 4).expect_err("desync");
        assert!(err.is_fatal());
        assert_eq!(buf.len(), before);
    }

    #[test]
    fn test_separator_bytes_inside_body_are_plain_data() {
        // The old separator sequence must not split a frame.
        let body = [0x0f, 0x00, 0x01, 0x0a, 0x0f, 0x00, 0x01, 0x0a];
        let mut buf = BytesMut::from(&encode_frame(3, &body).expect("encode")[..]);
        let frame = try_take_frame(&mut buf, 4).expect("ok").expect("frame");
        assert_eq!(&frame.body[..], &body);
    }
}
