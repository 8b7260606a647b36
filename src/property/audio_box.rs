//! Box object properties

use super::value::{decode_text, decode_u32, TRANSPORT_TYPE_VIRTUAL};
use super::{
    unsupported, ChangedAddresses, PropertyAddress, PropertyContext, PropertyValue, Selector,
};
use crate::audio::DeviceState;
use crate::error::{DriverError, Result};
use crate::object::ObjectId;

pub(super) fn has(selector: Selector) -> bool {
    matches!(
        selector,
        Selector::NAME
            | Selector::MODEL_NAME
            | Selector::MANUFACTURER
            | Selector::BOX_UID
            | Selector::TRANSPORT_TYPE
            | Selector::HAS_AUDIO
            | Selector::HAS_VIDEO
            | Selector::HAS_MIDI
            | Selector::IS_PROTECTED
            | Selector::ACQUIRED
            | Selector::ACQUISITION_FAILED
            | Selector::BOX_DEVICE_LIST
    )
}

pub(super) fn is_settable(selector: Selector) -> bool {
    matches!(selector, Selector::NAME | Selector::ACQUIRED)
}

pub(super) fn get(
    id: ObjectId,
    address: &PropertyAddress,
    ctx: &PropertyContext<'_>,
) -> Result<PropertyValue> {
    let state = ctx.state;
    Ok(match address.selector {
        Selector::NAME => PropertyValue::Text(state.box_name.clone()),
        Selector::MODEL_NAME => PropertyValue::Text(ctx.config.device_name.clone()),
        Selector::MANUFACTURER => PropertyValue::Text(ctx.config.manufacturer.clone()),
        Selector::BOX_UID => PropertyValue::Text(ctx.config.box_uid.clone()),
        Selector::TRANSPORT_TYPE => PropertyValue::U32(TRANSPORT_TYPE_VIRTUAL),
        Selector::HAS_AUDIO => PropertyValue::bool(true),
        Selector::HAS_VIDEO | Selector::HAS_MIDI | Selector::IS_PROTECTED => {
            PropertyValue::bool(false)
        }
        Selector::ACQUIRED => PropertyValue::bool(state.box_acquired),
        Selector::ACQUISITION_FAILED => PropertyValue::U32(0),
        Selector::BOX_DEVICE_LIST => PropertyValue::Objects(if state.box_acquired {
            vec![ObjectId::DEVICE]
        } else {
            Vec::new()
        }),
        selector => return Err(unsupported(id, selector)),
    })
}

pub(super) fn set(
    address: &PropertyAddress,
    data: &[u8],
    state: &mut DeviceState,
) -> Result<ChangedAddresses> {
    match address.selector {
        Selector::NAME => {
            let name = decode_text(data)?;
            if state.box_name == name {
                return Ok(ChangedAddresses::none());
            }
            tracing::debug!("Box renamed to {:?}", name);
            state.box_name = name.to_string();
            Ok(ChangedAddresses::one(PropertyAddress::global(Selector::NAME)))
        }
        Selector::ACQUIRED => {
            let acquired = decode_u32(data)? != 0;
            if state.box_acquired == acquired {
                return Ok(ChangedAddresses::none());
            }
            tracing::debug!("Box acquired: {}", acquired);
            state.box_acquired = acquired;
            Ok(ChangedAddresses::two(
                PropertyAddress::global(Selector::ACQUIRED),
                PropertyAddress::global(Selector::BOX_DEVICE_LIST),
            ))
        }
        selector => Err(DriverError::NotSettable(selector)),
    }
}
