//! Field-level binary encoding.
//!
//! Every value that travels inside a packet body implements [`WireFormat`].
//! Encoding and decoding live in the same trait, so a type cannot have a
//! custom encoder without a matching decoder.
//!
//! All multi-byte values are little-endian. Layouts are written field by
//! field; nothing relies on in-memory struct layout.

use bytes::{Buf, BufMut, BytesMut};

use crate::ProtocolError;

/// A value with a binary representation.
pub trait WireFormat: Sized {
    /// Exact encoded size for fixed layouts, `None` for values that
    /// contain variable-length collections.
    ///
    /// Decoding a fixed-layout body checks the byte count up front.
    const FIXED_SIZE: Option<usize>;

    /// Appends the encoded value to `dst`.
    fn encode(&self, dst: &mut BytesMut);

    /// Reads one value from the front of `src`, advancing it.
    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError>;
}

/// The fixed size of `T`, usable in constant expressions.
///
/// Fails to compile when used in a `const` with a variable-length type.
pub const fn fixed_size<T: WireFormat>() -> usize {
    match T::FIXED_SIZE {
        Some(size) => size,
        None => panic!("type has no fixed wire size"),
    }
}

/// Encodes `value` as a complete packet body.
pub fn encode_body<T: WireFormat>(value: &T, dst: &mut BytesMut) {
    let start = dst.len();
    value.encode(dst);
    if let Some(size) = T::FIXED_SIZE {
        debug_assert_eq!(dst.len() - start, size, "fixed layout size mismatch");
    }
}

/// Decodes a complete packet body. The body must be consumed exactly.
///
/// # Errors
/// [`ProtocolError::InvalidLength`] if a fixed layout gets the wrong
/// number of bytes, if the body ends early, or if bytes are left over.
pub fn decode_body<T: WireFormat>(body: &[u8]) -> Result<T, ProtocolError> {
    if let Some(size) = T::FIXED_SIZE {
        if body.len() != size {
            return Err(ProtocolError::InvalidLength {
                expected: size,
                actual: body.len(),
            });
        }
    }

    let mut src = body;
    let value = T::decode(&mut src)?;
    if !src.is_empty() {
        return Err(ProtocolError::InvalidLength {
            expected: body.len() - src.len(),
            actual: body.len(),
        });
    }
    Ok(value)
}

/// Fails unless `src` still holds at least `n` bytes.
pub(crate) fn ensure(src: &[u8], n: usize) -> Result<(), ProtocolError> {
    if src.len() < n {
        return Err(ProtocolError::InvalidLength {
            expected: n,
            actual: src.len(),
        });
    }
    Ok(())
}

impl WireFormat for u8 {
    const FIXED_SIZE: Option<usize> = Some(1);

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(*self);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(src, 1)?;
        Ok(src.get_u8())
    }
}

impl WireFormat for u16 {
    const FIXED_SIZE: Option<usize> = Some(2);

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16_le(*self);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(src, 2)?;
        Ok(src.get_u16_le())
    }
}

impl WireFormat for u32 {
    const FIXED_SIZE: Option<usize> = Some(4);

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(*self);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(src, 4)?;
        Ok(src.get_u32_le())
    }
}

impl WireFormat for i32 {
    const FIXED_SIZE: Option<usize> = Some(4);

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32_le(*self);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(src, 4)?;
        Ok(src.get_i32_le())
    }
}

impl WireFormat for f32 {
    const FIXED_SIZE: Option<usize> = Some(4);

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_f32_le(*self);
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        ensure(src, 4)?;
        Ok(src.get_f32_le())
    }
}

impl WireFormat for bool {
    const FIXED_SIZE: Option<usize> = Some(1);

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(u8::from(*self));
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        match u8::decode(src)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidValue {
                field: "bool",
                value: other.into(),
            }),
        }
    }
}

/// Lists are a `u16` element count followed by that many elements.
impl<T: WireFormat> WireFormat for Vec<T> {
    const FIXED_SIZE: Option<usize> = None;

    fn encode(&self, dst: &mut BytesMut) {
        // A longer list cannot fit in a frame anyway; the frame layer
        // rejects the body as too large.
        let count = u16::try_from(self.len()).unwrap_or(u16::MAX);
        count.encode(dst);
        for item in self {
            item.encode(dst);
        }
    }

    fn decode(src: &mut &[u8]) -> Result<Self, ProtocolError> {
        let count = u16::decode(src)? as usize;
        // Check the claimed count against what is actually there before
        // allocating for it.
        if let Some(size) = T::FIXED_SIZE {
            ensure(src, count * size)?;
        }

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(src)?);
        }
        Ok(items)
    }
}
