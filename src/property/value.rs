//! Property values and their byte layout
//!
//! Values cross the host boundary as native-endian bytes. Scalars must fit
//! the caller's buffer whole; lists are cut down to the items that fit.

use serde::Serialize;

use crate::constants::{BITS_PER_CHANNEL, BYTES_PER_FRAME, NUM_CHANNELS};
use crate::error::{DriverError, Result};
use crate::object::ObjectId;

/// `'lpcm'`
pub const FORMAT_LINEAR_PCM: u32 = u32::from_be_bytes(*b"lpcm");
/// Signed integer samples
pub const FORMAT_FLAG_IS_SIGNED_INTEGER: u32 = 1 << 2;
/// No padding between samples
pub const FORMAT_FLAG_IS_PACKED: u32 = 1 << 3;
/// `'virt'`, transport of a device with no hardware behind it
pub const TRANSPORT_TYPE_VIRTUAL: u32 = u32::from_be_bytes(*b"virt");

/// Closed range of doubles (min, max)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub minimum: f64,
    pub maximum: f64,
}

impl ValueRange {
    pub const SIZE: usize = 16;

    pub fn point(value: f64) -> Self {
        Self {
            minimum: value,
            maximum: value,
        }
    }

    fn write(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.minimum.to_ne_bytes());
        out[8..16].copy_from_slice(&self.maximum.to_ne_bytes());
    }
}

/// Linear PCM stream description
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamFormat {
    pub sample_rate: f64,
    pub format_id: u32,
    pub format_flags: u32,
    pub bytes_per_packet: u32,
    pub frames_per_packet: u32,
    pub bytes_per_frame: u32,
    pub channels_per_frame: u32,
    pub bits_per_channel: u32,
}

impl StreamFormat {
    /// Encoded size, including the trailing reserved word
    pub const SIZE: usize = 40;

    /// The only sample layout the device carries, at `sample_rate`
    pub fn pcm16(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            format_id: FORMAT_LINEAR_PCM,
            format_flags: FORMAT_FLAG_IS_SIGNED_INTEGER | FORMAT_FLAG_IS_PACKED,
            bytes_per_packet: BYTES_PER_FRAME,
            frames_per_packet: 1,
            bytes_per_frame: BYTES_PER_FRAME,
            channels_per_frame: NUM_CHANNELS,
            bits_per_channel: BITS_PER_CHANNEL,
        }
    }

    /// Same layout as [`StreamFormat::pcm16`], ignoring the rate
    pub fn has_device_layout(&self) -> bool {
        let expected = Self::pcm16(self.sample_rate);
        *self == expected
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        expect_size(data, Self::SIZE)?;
        let word = |i: usize| u32::from_ne_bytes(slice4(&data[8 + i * 4..]));
        Ok(Self {
            sample_rate: f64::from_ne_bytes(slice8(data)),
            format_id: word(0),
            format_flags: word(1),
            bytes_per_packet: word(2),
            frames_per_packet: word(3),
            bytes_per_frame: word(4),
            channels_per_frame: word(5),
            bits_per_channel: word(6),
        })
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.sample_rate.to_ne_bytes());
        let words = [
            self.format_id,
            self.format_flags,
            self.bytes_per_packet,
            self.frames_per_packet,
            self.bytes_per_frame,
            self.channels_per_frame,
            self.bits_per_channel,
            0,
        ];
        for (i, word) in words.iter().enumerate() {
            out[8 + i * 4..12 + i * 4].copy_from_slice(&word.to_ne_bytes());
        }
    }
}

/// A stream format together with the sample-rate range it covers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangedFormat {
    pub format: StreamFormat,
    pub rate_range: ValueRange,
}

impl RangedFormat {
    pub const SIZE: usize = StreamFormat::SIZE + ValueRange::SIZE;

    fn write(&self, out: &mut [u8]) {
        self.format.write(&mut out[..StreamFormat::SIZE]);
        self.rate_range.write(&mut out[StreamFormat::SIZE..Self::SIZE]);
    }
}

/// Value of one property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    U32(u32),
    F32(f32),
    F64(f64),
    Text(String),
    Objects(Vec<ObjectId>),
    U32List(Vec<u32>),
    Range(ValueRange),
    Ranges(Vec<ValueRange>),
    Format(StreamFormat),
    Formats(Vec<RangedFormat>),
}

impl PropertyValue {
    pub fn bool(value: bool) -> Self {
        PropertyValue::U32(value as u32)
    }

    /// Size of the complete value in bytes
    pub fn encoded_len(&self) -> usize {
        match self {
            PropertyValue::U32(_) | PropertyValue::F32(_) => 4,
            PropertyValue::F64(_) => 8,
            PropertyValue::Text(text) => text.len(),
            PropertyValue::Range(_) => ValueRange::SIZE,
            PropertyValue::Format(_) => StreamFormat::SIZE,
            _ => self.item_count() * self.item_size().unwrap_or(0),
        }
    }

    /// Size of one element for list values, `None` for scalars
    pub fn item_size(&self) -> Option<usize> {
        match self {
            PropertyValue::Objects(_) | PropertyValue::U32List(_) => Some(4),
            PropertyValue::Ranges(_) => Some(ValueRange::SIZE),
            PropertyValue::Formats(_) => Some(RangedFormat::SIZE),
            _ => None,
        }
    }

    fn item_count(&self) -> usize {
        match self {
            PropertyValue::Objects(ids) => ids.len(),
            PropertyValue::U32List(values) => values.len(),
            PropertyValue::Ranges(ranges) => ranges.len(),
            PropertyValue::Formats(formats) => formats.len(),
            _ => 1,
        }
    }

    /// Copy the value into `out`, returning the number of bytes written
    pub fn write_into(&self, out: &mut [u8]) -> Result<usize> {
        let full = self.encoded_len();
        let len = match self.item_size() {
            Some(item) => {
                let fit = (out.len() / item).min(self.item_count());
                if fit == 0 && full > 0 {
                    return Err(DriverError::BadPropertySize {
                        expected: item,
                        actual: out.len(),
                    });
                }
                fit * item
            }
            None => {
                if out.len() < full {
                    return Err(DriverError::BadPropertySize {
                        expected: full,
                        actual: out.len(),
                    });
                }
                full
            }
        };
        let out = &mut out[..len];

        match self {
            PropertyValue::U32(v) => out.copy_from_slice(&v.to_ne_bytes()),
            PropertyValue::F32(v) => out.copy_from_slice(&v.to_ne_bytes()),
            PropertyValue::F64(v) => out.copy_from_slice(&v.to_ne_bytes()),
            PropertyValue::Text(text) => out.copy_from_slice(text.as_bytes()),
            PropertyValue::Range(range) => range.write(out),
            PropertyValue::Format(format) => format.write(out),
            PropertyValue::Objects(ids) => {
                for (chunk, id) in out.chunks_exact_mut(4).zip(ids) {
                    chunk.copy_from_slice(&id.0.to_ne_bytes());
                }
            }
            PropertyValue::U32List(values) => {
                for (chunk, v) in out.chunks_exact_mut(4).zip(values) {
                    chunk.copy_from_slice(&v.to_ne_bytes());
                }
            }
            PropertyValue::Ranges(ranges) => {
                for (chunk, range) in out.chunks_exact_mut(ValueRange::SIZE).zip(ranges) {
                    range.write(chunk);
                }
            }
            PropertyValue::Formats(formats) => {
                for (chunk, format) in out.chunks_exact_mut(RangedFormat::SIZE).zip(formats) {
                    format.write(chunk);
                }
            }
        }
        Ok(len)
    }
}

fn expect_size(data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(DriverError::BadPropertySize {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn slice4(data: &[u8]) -> [u8; 4] {
    [data[0], data[1], data[2], data[3]]
}

fn slice8(data: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&data[..8]);
    out
}

pub fn decode_u32(data: &[u8]) -> Result<u32> {
    expect_size(data, 4)?;
    Ok(u32::from_ne_bytes(slice4(data)))
}

pub fn decode_f32(data: &[u8]) -> Result<f32> {
    expect_size(data, 4)?;
    Ok(f32::from_ne_bytes(slice4(data)))
}

pub fn decode_f64(data: &[u8]) -> Result<f64> {
    expect_size(data, 8)?;
    Ok(f64::from_ne_bytes(slice8(data)))
}

/// Non-empty UTF-8 text
pub fn decode_text(data: &[u8]) -> Result<&str> {
    if data.is_empty() {
        return Err(DriverError::BadPropertySize {
            expected: 1,
            actual: 0,
        });
    }
    std::str::from_utf8(data)
        .map_err(|e| DriverError::IllegalOperation(format!("text is not UTF-8: {}", e)))
}
