//! Volume, mute and data-source control properties

use super::value::{decode_f32, decode_u32};
use super::{
    unsupported, ChangedAddresses, PropertyAddress, PropertyContext, PropertyValue, Scope,
    Selector, ValueRange, ELEMENT_MAIN,
};
use crate::audio::DeviceState;
use crate::constants::{DATA_SOURCE_NUM_ITEMS, VOLUME_MAX_DB, VOLUME_MIN_DB};
use crate::error::{DriverError, Result};
use crate::object::{ControlKind, ObjectId, Side};

pub(super) fn has(control: ControlKind, selector: Selector) -> bool {
    if matches!(selector, Selector::CONTROL_SCOPE | Selector::CONTROL_ELEMENT) {
        return true;
    }
    match control {
        ControlKind::Volume => matches!(
            selector,
            Selector::SCALAR_VALUE | Selector::DECIBEL_VALUE | Selector::DECIBEL_RANGE
        ),
        ControlKind::Mute => selector == Selector::BOOLEAN_VALUE,
        ControlKind::DataSource => matches!(
            selector,
            Selector::CURRENT_ITEM | Selector::AVAILABLE_ITEMS | Selector::ITEM_NAME
        ),
    }
}

pub(super) fn is_settable(control: ControlKind, selector: Selector) -> bool {
    match control {
        ControlKind::Volume => {
            matches!(selector, Selector::SCALAR_VALUE | Selector::DECIBEL_VALUE)
        }
        ControlKind::Mute => selector == Selector::BOOLEAN_VALUE,
        ControlKind::DataSource => selector == Selector::CURRENT_ITEM,
    }
}

pub(super) fn get(
    id: ObjectId,
    control: ControlKind,
    side: Side,
    address: &PropertyAddress,
    qualifier: &[u8],
    ctx: &PropertyContext<'_>,
) -> Result<PropertyValue> {
    let controls = ctx.state.controls(side);
    Ok(match (control, address.selector) {
        (_, Selector::CONTROL_SCOPE) => PropertyValue::U32(Scope::from(side).code()),
        (_, Selector::CONTROL_ELEMENT) => PropertyValue::U32(ELEMENT_MAIN),
        (ControlKind::Volume, Selector::SCALAR_VALUE) => {
            PropertyValue::F32(controls.volume_scalar())
        }
        (ControlKind::Volume, Selector::DECIBEL_VALUE) => PropertyValue::F32(controls.volume_db),
        (ControlKind::Volume, Selector::DECIBEL_RANGE) => PropertyValue::Range(ValueRange {
            minimum: VOLUME_MIN_DB as f64,
            maximum: VOLUME_MAX_DB as f64,
        }),
        (ControlKind::Mute, Selector::BOOLEAN_VALUE) => PropertyValue::bool(controls.mute),
        (ControlKind::DataSource, Selector::CURRENT_ITEM) => {
            PropertyValue::U32(controls.data_source)
        }
        (ControlKind::DataSource, Selector::AVAILABLE_ITEMS) => {
            PropertyValue::U32List((0..DATA_SOURCE_NUM_ITEMS).collect())
        }
        (ControlKind::DataSource, Selector::ITEM_NAME) => {
            let item = decode_u32(qualifier)?;
            check_item(item)?;
            PropertyValue::Text(ctx.config.data_source_item_name(item))
        }
        (_, selector) => return Err(unsupported(id, selector)),
    })
}

fn check_item(item: u32) -> Result<()> {
    if item >= DATA_SOURCE_NUM_ITEMS {
        return Err(DriverError::IllegalOperation(format!(
            "data source item {} out of range",
            item
        )));
    }
    Ok(())
}

fn finite(value: f32) -> Result<f32> {
    if !value.is_finite() {
        return Err(DriverError::IllegalOperation(format!(
            "volume {} is not finite",
            value
        )));
    }
    Ok(value)
}

pub(super) fn set(
    control: ControlKind,
    side: Side,
    address: &PropertyAddress,
    data: &[u8],
    state: &mut DeviceState,
) -> Result<ChangedAddresses> {
    let controls = state.controls_mut(side);
    let changed = match (control, address.selector) {
        (ControlKind::Volume, Selector::DECIBEL_VALUE) => {
            let db = finite(decode_f32(data)?)?;
            controls.set_volume_db(db)
        }
        (ControlKind::Volume, Selector::SCALAR_VALUE) => {
            let scalar = finite(decode_f32(data)?)?;
            controls.set_volume_scalar(scalar)
        }
        (ControlKind::Mute, Selector::BOOLEAN_VALUE) => {
            let mute = decode_u32(data)? != 0;
            let changed = controls.mute != mute;
            controls.mute = mute;
            changed
        }
        (ControlKind::DataSource, Selector::CURRENT_ITEM) => {
            let item = decode_u32(data)?;
            check_item(item)?;
            let changed = controls.data_source != item;
            controls.data_source = item;
            changed
        }
        (_, selector) => return Err(DriverError::NotSettable(selector)),
    };

    if !changed {
        return Ok(ChangedAddresses::none());
    }
    tracing::debug!("{:?} {:?} control set via {}", side, control, address.selector);
    Ok(match control {
        ControlKind::Volume => ChangedAddresses::two(
            PropertyAddress::global(Selector::SCALAR_VALUE),
            PropertyAddress::global(Selector::DECIBEL_VALUE),
        ),
        ControlKind::Mute => ChangedAddresses::one(PropertyAddress::global(Selector::BOOLEAN_VALUE)),
        ControlKind::DataSource => {
            ChangedAddresses::one(PropertyAddress::global(Selector::CURRENT_ITEM))
        }
    })
}
