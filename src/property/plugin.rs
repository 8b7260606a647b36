//! Plug-in object properties

use super::value::decode_text;
use super::{unsupported, PropertyAddress, PropertyContext, PropertyValue, Selector};
use crate::error::Result;
use crate::object::ObjectId;

pub(super) fn has(selector: Selector) -> bool {
    matches!(
        selector,
        Selector::MANUFACTURER
            | Selector::BOX_LIST
            | Selector::TRANSLATE_UID_TO_BOX
            | Selector::DEVICE_LIST
            | Selector::TRANSLATE_UID_TO_DEVICE
            | Selector::RESOURCE_BUNDLE
    )
}

pub(super) fn get(
    id: ObjectId,
    address: &PropertyAddress,
    qualifier: &[u8],
    ctx: &PropertyContext<'_>,
) -> Result<PropertyValue> {
    let config = ctx.config;
    Ok(match address.selector {
        Selector::MANUFACTURER => PropertyValue::Text(config.manufacturer.clone()),
        Selector::BOX_LIST => PropertyValue::Objects(vec![ObjectId::BOX]),
        Selector::TRANSLATE_UID_TO_BOX => {
            let uid = decode_text(qualifier)?;
            let found = if uid == config.box_uid {
                ObjectId::BOX
            } else {
                ObjectId::UNKNOWN
            };
            PropertyValue::U32(found.0)
        }
        // The device only shows up while its box is acquired.
        Selector::DEVICE_LIST => PropertyValue::Objects(if ctx.state.box_acquired {
            vec![ObjectId::DEVICE]
        } else {
            Vec::new()
        }),
        Selector::TRANSLATE_UID_TO_DEVICE => {
            let uid = decode_text(qualifier)?;
            let found = if uid == config.device_uid {
                ObjectId::DEVICE
            } else {
                ObjectId::UNKNOWN
            };
            PropertyValue::U32(found.0)
        }
        Selector::RESOURCE_BUNDLE => PropertyValue::Text(String::new()),
        selector => return Err(unsupported(id, selector)),
    })
}
