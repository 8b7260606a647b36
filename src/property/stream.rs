//! Stream object properties

use super::value::decode_u32;
use super::{
    unsupported, ChangedAddresses, PropertyAddress, PropertyContext, PropertyValue, RangedFormat,
    Selector, StreamFormat, ValueRange,
};
use crate::audio::DeviceState;
use crate::constants::SUPPORTED_SAMPLE_RATES;
use crate::error::{DriverError, Result};
use crate::object::{ObjectId, Side};

/// `'micr'`
const TERMINAL_MICROPHONE: u32 = u32::from_be_bytes(*b"micr");
/// `'spkr'`
const TERMINAL_SPEAKER: u32 = u32::from_be_bytes(*b"spkr");

pub(super) fn has(selector: Selector) -> bool {
    matches!(
        selector,
        Selector::IS_ACTIVE
            | Selector::DIRECTION
            | Selector::TERMINAL_TYPE
            | Selector::STARTING_CHANNEL
            | Selector::LATENCY
            | Selector::VIRTUAL_FORMAT
            | Selector::AVAILABLE_VIRTUAL_FORMATS
            | Selector::PHYSICAL_FORMAT
            | Selector::AVAILABLE_PHYSICAL_FORMATS
    )
}

pub(super) fn is_settable(selector: Selector) -> bool {
    matches!(
        selector,
        Selector::IS_ACTIVE | Selector::VIRTUAL_FORMAT | Selector::PHYSICAL_FORMAT
    )
}

pub(super) fn get(
    id: ObjectId,
    side: Side,
    address: &PropertyAddress,
    ctx: &PropertyContext<'_>,
) -> Result<PropertyValue> {
    let state = ctx.state;
    Ok(match address.selector {
        Selector::IS_ACTIVE => PropertyValue::bool(state.stream_active(side)),
        Selector::DIRECTION => PropertyValue::U32(match side {
            Side::Input => 1,
            Side::Output => 0,
        }),
        Selector::TERMINAL_TYPE => PropertyValue::U32(match side {
            Side::Input => TERMINAL_MICROPHONE,
            Side::Output => TERMINAL_SPEAKER,
        }),
        Selector::STARTING_CHANNEL => PropertyValue::U32(1),
        Selector::LATENCY => PropertyValue::U32(0),
        Selector::VIRTUAL_FORMAT | Selector::PHYSICAL_FORMAT => {
            PropertyValue::Format(StreamFormat::pcm16(state.sample_rate))
        }
        Selector::AVAILABLE_VIRTUAL_FORMATS | Selector::AVAILABLE_PHYSICAL_FORMATS => {
            PropertyValue::Formats(available_formats())
        }
        selector => return Err(unsupported(id, selector)),
    })
}

fn available_formats() -> Vec<RangedFormat> {
    SUPPORTED_SAMPLE_RATES
        .iter()
        .map(|&rate| RangedFormat {
            format: StreamFormat::pcm16(rate),
            rate_range: ValueRange::point(rate),
        })
        .collect()
}

pub(super) fn set(
    side: Side,
    address: &PropertyAddress,
    data: &[u8],
    state: &mut DeviceState,
) -> Result<ChangedAddresses> {
    match address.selector {
        Selector::IS_ACTIVE => {
            let active = decode_u32(data)? != 0;
            if state.stream_active(side) == active {
                return Ok(ChangedAddresses::none());
            }
            tracing::debug!("{:?} stream active: {}", side, active);
            state.set_stream_active(side, active);
            Ok(ChangedAddresses::one(PropertyAddress::global(Selector::IS_ACTIVE)))
        }
        Selector::VIRTUAL_FORMAT | Selector::PHYSICAL_FORMAT => {
            let format = StreamFormat::decode(data)?;
            if !format.has_device_layout() {
                return Err(DriverError::UnsupportedFormat(format!(
                    "{} ch / {} bit / flags {:#x}",
                    format.channels_per_frame, format.bits_per_channel, format.format_flags
                )));
            }
            Ok(if state.change_sample_rate(format.sample_rate)? {
                ChangedAddresses::two(
                    PropertyAddress::global(Selector::VIRTUAL_FORMAT),
                    PropertyAddress::global(Selector::PHYSICAL_FORMAT),
                )
            } else {
                ChangedAddresses::none()
            })
        }
        selector => Err(DriverError::NotSettable(selector)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_formats_cover_every_rate() {
        let formats = available_formats();
        assert_eq!(formats.len(), SUPPORTED_SAMPLE_RATES.len());
        for (ranged, rate) in formats.iter().zip(SUPPORTED_SAMPLE_RATES) {
            assert_eq!(ranged.format.sample_rate, rate);
            assert_eq!(ranged.rate_range, ValueRange::point(rate));
        }
    }
}
