//! Properties every object answers

use super::{PropertyAddress, PropertyContext, PropertyValue, Selector};
use crate::error::Result;
use crate::object::{ObjectId, ObjectKind, Side};

pub(super) fn has(selector: Selector) -> bool {
    matches!(
        selector,
        Selector::BASE_CLASS | Selector::CLASS | Selector::OWNER | Selector::OWNED_OBJECTS
    )
}

pub(super) fn get(
    kind: ObjectKind,
    address: &PropertyAddress,
    _ctx: &PropertyContext<'_>,
) -> Result<PropertyValue> {
    Ok(match address.selector {
        Selector::BASE_CLASS => PropertyValue::U32(kind.base_class().0),
        Selector::CLASS => PropertyValue::U32(kind.class().0),
        Selector::OWNER => PropertyValue::U32(kind.owner().0),
        _ => PropertyValue::Objects(owned_objects(kind, address)),
    })
}

fn owned_objects(kind: ObjectKind, address: &PropertyAddress) -> Vec<ObjectId> {
    match kind {
        ObjectKind::PlugIn => vec![ObjectId::BOX, ObjectId::DEVICE],
        ObjectKind::Device => device_objects(address.scope.side()),
        ObjectKind::Box | ObjectKind::Stream(_) | ObjectKind::Control(..) => Vec::new(),
    }
}

/// Streams and controls of the device, narrowed to one side when given
pub(super) fn device_objects(side: Option<Side>) -> Vec<ObjectId> {
    let sides: &[Side] = match side {
        Some(Side::Input) => &[Side::Input],
        Some(Side::Output) => &[Side::Output],
        None => &[Side::Input, Side::Output],
    };
    sides
        .iter()
        .flat_map(|side| std::iter::once(side.stream()).chain(side.controls()))
        .collect()
}
