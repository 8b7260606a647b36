//! Device object properties

use super::value::{decode_f64, TRANSPORT_TYPE_VIRTUAL};
use super::{
    unsupported, ChangedAddresses, PropertyAddress, PropertyContext, PropertyValue, Selector,
    ValueRange,
};
use crate::audio::DeviceState;
use crate::constants::{SUPPORTED_SAMPLE_RATES, ZERO_TIMESTAMP_PERIOD};
use crate::error::{DriverError, Result};
use crate::object::{ObjectId, Side};

pub(super) fn has(selector: Selector) -> bool {
    matches!(
        selector,
        Selector::NAME
            | Selector::MANUFACTURER
            | Selector::DEVICE_UID
            | Selector::MODEL_UID
            | Selector::TRANSPORT_TYPE
            | Selector::RELATED_DEVICES
            | Selector::CLOCK_DOMAIN
            | Selector::DEVICE_IS_ALIVE
            | Selector::DEVICE_IS_RUNNING
            | Selector::CAN_BE_DEFAULT_DEVICE
            | Selector::CAN_BE_DEFAULT_SYSTEM_DEVICE
            | Selector::LATENCY
            | Selector::STREAMS
            | Selector::CONTROL_LIST
            | Selector::SAFETY_OFFSET
            | Selector::NOMINAL_SAMPLE_RATE
            | Selector::AVAILABLE_NOMINAL_SAMPLE_RATES
            | Selector::IS_HIDDEN
            | Selector::PREFERRED_CHANNELS_FOR_STEREO
            | Selector::ZERO_TIMESTAMP_PERIOD
    )
}

pub(super) fn is_settable(selector: Selector) -> bool {
    selector == Selector::NOMINAL_SAMPLE_RATE
}

pub(super) fn get(
    id: ObjectId,
    address: &PropertyAddress,
    ctx: &PropertyContext<'_>,
) -> Result<PropertyValue> {
    let config = ctx.config;
    let state = ctx.state;
    Ok(match address.selector {
        Selector::NAME => PropertyValue::Text(config.device_name.clone()),
        Selector::MANUFACTURER => PropertyValue::Text(config.manufacturer.clone()),
        Selector::DEVICE_UID => PropertyValue::Text(config.device_uid.clone()),
        Selector::MODEL_UID => PropertyValue::Text(config.device_model_uid.clone()),
        Selector::TRANSPORT_TYPE => PropertyValue::U32(TRANSPORT_TYPE_VIRTUAL),
        Selector::RELATED_DEVICES => PropertyValue::Objects(vec![ObjectId::DEVICE]),
        Selector::CLOCK_DOMAIN => PropertyValue::U32(0),
        Selector::DEVICE_IS_ALIVE => PropertyValue::bool(true),
        Selector::DEVICE_IS_RUNNING => PropertyValue::bool(state.io_running),
        Selector::CAN_BE_DEFAULT_DEVICE | Selector::CAN_BE_DEFAULT_SYSTEM_DEVICE => {
            PropertyValue::bool(true)
        }
        Selector::LATENCY | Selector::SAFETY_OFFSET => PropertyValue::U32(0),
        Selector::STREAMS => PropertyValue::Objects(match address.scope.side() {
            Some(side) => vec![side.stream()],
            None => vec![ObjectId::STREAM_INPUT, ObjectId::STREAM_OUTPUT],
        }),
        Selector::CONTROL_LIST => PropertyValue::Objects(
            [Side::Input, Side::Output]
                .into_iter()
                .flat_map(Side::controls)
                .collect(),
        ),
        Selector::NOMINAL_SAMPLE_RATE => PropertyValue::F64(state.sample_rate),
        Selector::AVAILABLE_NOMINAL_SAMPLE_RATES => PropertyValue::Ranges(
            SUPPORTED_SAMPLE_RATES
                .iter()
                .map(|&rate| ValueRange::point(rate))
                .collect(),
        ),
        Selector::IS_HIDDEN => PropertyValue::bool(false),
        Selector::PREFERRED_CHANNELS_FOR_STEREO => PropertyValue::U32List(vec![1, 1]),
        Selector::ZERO_TIMESTAMP_PERIOD => PropertyValue::U32(ZERO_TIMESTAMP_PERIOD),
        selector => return Err(unsupported(id, selector)),
    })
}

pub(super) fn set(
    address: &PropertyAddress,
    data: &[u8],
    state: &mut DeviceState,
) -> Result<ChangedAddresses> {
    match address.selector {
        Selector::NOMINAL_SAMPLE_RATE => {
            let rate = decode_f64(data)?;
            Ok(if state.change_sample_rate(rate)? {
                ChangedAddresses::one(PropertyAddress::global(Selector::NOMINAL_SAMPLE_RATE))
            } else {
                ChangedAddresses::none()
            })
        }
        selector => Err(DriverError::NotSettable(selector)),
    }
}
