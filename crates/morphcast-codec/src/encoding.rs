//! Batch Encoding - Wire format for compressed units
//!
//! Layout (little-endian):
//!
//! ```text
//! batch  := version:u8 count:u16 unit*
//! unit   := kind:u8 frame:u64 timestamp:f64
//!           morph_count:u16 (key value:f64)*
//!           pred_count:u16 (key velocity:f64 acceleration:f64)*
//! key    := id:u16                      known morph
//!         | 0xFFFF len:u16 utf8[len]    custom morph name
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use morphcast_core::{MorphFrame, MorphId, MorphKey, MorphcastError};

use crate::{CompressedUnit, MotionHint, UnitKind};

/// Current batch format version
pub const BATCH_VERSION: u8 = 0x01;

/// Key tag for custom (non-interned) morph names
pub const CUSTOM_KEY_TAG: u16 = 0xFFFF;

/// Batch header size in bytes
pub const BATCH_HEADER_SIZE: usize = 3;

/// Encoding error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Buffer too small: needed {needed}, remaining {remaining}")]
    BufferTooSmall { needed: usize, remaining: usize },

    #[error("Unsupported batch version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid unit kind: {0}")]
    InvalidUnitKind(u8),

    #[error("Unknown morph id: {0}")]
    UnknownMorphId(u16),

    #[error("Invalid morph name encoding")]
    InvalidName,

    #[error("Too many entries: {0}")]
    TooManyEntries(usize),

    #[error("Trailing bytes after batch: {0}")]
    TrailingBytes(usize),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

impl From<CodecError> for MorphcastError {
    fn from(e: CodecError) -> Self {
        MorphcastError::Codec(e.to_string())
    }
}

/// Batch encoder
pub struct BatchEncoder;

impl BatchEncoder {
    /// Encode a batch of units to bytes
    pub fn encode(units: &[CompressedUnit]) -> CodecResult<Bytes> {
        let count = u16::try_from(units.len()).map_err(|_| CodecError::TooManyEntries(units.len()))?;
        let size = BATCH_HEADER_SIZE + units.iter().map(|u| u.encoded_len()).sum::<usize>();
        let mut buf = BytesMut::with_capacity(size);

        buf.put_u8(BATCH_VERSION);
        buf.put_u16_le(count);

        for unit in units {
            Self::encode_unit(unit, &mut buf)?;
        }

        Ok(buf.freeze())
    }

    fn encode_unit(unit: &CompressedUnit, buf: &mut BytesMut) -> CodecResult<()> {
        buf.put_u8(unit.kind.to_byte());
        buf.put_u64_le(unit.frame);
        buf.put_f64_le(unit.timestamp);

        buf.put_u16_le(Self::count(unit.morphs.len())?);
        for (key, value) in unit.morphs.iter() {
            Self::encode_key(key, buf)?;
            buf.put_f64_le(value);
        }

        buf.put_u16_le(Self::count(unit.predictions.len())?);
        for (key, hint) in &unit.predictions {
            Self::encode_key(key, buf)?;
            buf.put_f64_le(hint.velocity);
            buf.put_f64_le(hint.acceleration);
        }

        Ok(())
    }

    fn encode_key(key: &MorphKey, buf: &mut BytesMut) -> CodecResult<()> {
        match key {
            MorphKey::Known(id) => buf.put_u16_le(id.index()),
            MorphKey::Custom(name) => {
                let len = u16::try_from(name.len()).map_err(|_| CodecError::InvalidName)?;
                buf.put_u16_le(CUSTOM_KEY_TAG);
                buf.put_u16_le(len);
                buf.put_slice(name.as_bytes());
            }
        }
        Ok(())
    }

    fn count(n: usize) -> CodecResult<u16> {
        u16::try_from(n).map_err(|_| CodecError::TooManyEntries(n))
    }
}

/// Batch decoder
pub struct BatchDecoder;

impl BatchDecoder {
    /// Decode a batch payload into its units, in order
    pub fn decode(data: &[u8]) -> CodecResult<Vec<CompressedUnit>> {
        let mut buf = data;
        ensure(&buf, BATCH_HEADER_SIZE)?;

        let version = buf.get_u8();
        if version != BATCH_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        let count = buf.get_u16_le() as usize;

        let mut units = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            units.push(Self::decode_unit(&mut buf)?);
        }

        if buf.has_remaining() {
            return Err(CodecError::TrailingBytes(buf.remaining()));
        }

        Ok(units)
    }

    fn decode_unit(buf: &mut &[u8]) -> CodecResult<CompressedUnit> {
        ensure(buf, 1 + 8 + 8 + 2)?;
        let kind_byte = buf.get_u8();
        let kind = UnitKind::from_byte(kind_byte).ok_or(CodecError::InvalidUnitKind(kind_byte))?;
        let frame = buf.get_u64_le();
        let timestamp = buf.get_f64_le();

        let morph_count = buf.get_u16_le() as usize;
        let mut morphs = MorphFrame::new();
        for _ in 0..morph_count {
            let key = Self::decode_key(buf)?;
            ensure(buf, 8)?;
            morphs.insert(key, buf.get_f64_le());
        }

        ensure(buf, 2)?;
        let pred_count = buf.get_u16_le() as usize;
        let mut unit = CompressedUnit {
            kind,
            frame,
            timestamp,
            morphs,
            predictions: Default::default(),
        };
        for _ in 0..pred_count {
            let key = Self::decode_key(buf)?;
            ensure(buf, 16)?;
            let velocity = buf.get_f64_le();
            let acceleration = buf.get_f64_le();
            unit.predictions.insert(
                key,
                MotionHint {
                    velocity,
                    acceleration,
                },
            );
        }

        Ok(unit)
    }

    fn decode_key(buf: &mut &[u8]) -> CodecResult<MorphKey> {
        ensure(buf, 2)?;
        let tag = buf.get_u16_le();
        if tag != CUSTOM_KEY_TAG {
            return MorphId::from_index(tag)
                .map(MorphKey::Known)
                .ok_or(CodecError::UnknownMorphId(tag));
        }

        ensure(buf, 2)?;
        let len = buf.get_u16_le() as usize;
        ensure(buf, len)?;
        let name = std::str::from_utf8(&buf[..len]).map_err(|_| CodecError::InvalidName)?;
        let key = MorphKey::new(name);
        buf.advance(len);
        Ok(key)
    }
}

#[inline]
fn ensure(buf: &&[u8], needed: usize) -> CodecResult<()> {
    if buf.remaining() < needed {
        return Err(CodecError::BufferTooSmall {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}
