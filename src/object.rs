//! Object registry
//!
//! The driver publishes a fixed set of objects. Identifiers are compile-time
//! constants and [`resolve`] maps each one to its [`ObjectKind`] without
//! locking or allocating.

use std::fmt;

use serde::Serialize;

use crate::property::ClassId;

/// Identifier of one of the driver's objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// The "no object" identifier
    pub const UNKNOWN: ObjectId = ObjectId(0);
    pub const PLUGIN: ObjectId = ObjectId(1);
    pub const BOX: ObjectId = ObjectId(2);
    pub const DEVICE: ObjectId = ObjectId(3);
    pub const STREAM_INPUT: ObjectId = ObjectId(4);
    pub const VOLUME_INPUT: ObjectId = ObjectId(5);
    pub const MUTE_INPUT: ObjectId = ObjectId(6);
    pub const DATA_SOURCE_INPUT: ObjectId = ObjectId(7);
    pub const STREAM_OUTPUT: ObjectId = ObjectId(8);
    pub const VOLUME_OUTPUT: ObjectId = ObjectId(9);
    pub const MUTE_OUTPUT: ObjectId = ObjectId(10);
    pub const DATA_SOURCE_OUTPUT: ObjectId = ObjectId(11);

    /// Every live object, in identifier order
    pub const ALL: [ObjectId; 11] = [
        ObjectId::PLUGIN,
        ObjectId::BOX,
        ObjectId::DEVICE,
        ObjectId::STREAM_INPUT,
        ObjectId::VOLUME_INPUT,
        ObjectId::MUTE_INPUT,
        ObjectId::DATA_SOURCE_INPUT,
        ObjectId::STREAM_OUTPUT,
        ObjectId::VOLUME_OUTPUT,
        ObjectId::MUTE_OUTPUT,
        ObjectId::DATA_SOURCE_OUTPUT,
    ];
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Direction a stream or control belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Input,
    Output,
}

impl Side {
    pub fn stream(self) -> ObjectId {
        match self {
            Side::Input => ObjectId::STREAM_INPUT,
            Side::Output => ObjectId::STREAM_OUTPUT,
        }
    }

    /// Controls attached to this side, in publication order
    pub fn controls(self) -> [ObjectId; 3] {
        match self {
            Side::Input => [
                ObjectId::VOLUME_INPUT,
                ObjectId::MUTE_INPUT,
                ObjectId::DATA_SOURCE_INPUT,
            ],
            Side::Output => [
                ObjectId::VOLUME_OUTPUT,
                ObjectId::MUTE_OUTPUT,
                ObjectId::DATA_SOURCE_OUTPUT,
            ],
        }
    }
}

/// Kind of a control object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Volume,
    Mute,
    DataSource,
}

/// What an identifier names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    PlugIn,
    Box,
    Device,
    Stream(Side),
    Control(ControlKind, Side),
}

/// Resolve an identifier to its kind, `None` for anything outside the fixed set
pub const fn resolve(id: ObjectId) -> Option<ObjectKind> {
    use ControlKind::*;
    use Side::*;

    Some(match id.0 {
        1 => ObjectKind::PlugIn,
        2 => ObjectKind::Box,
        3 => ObjectKind::Device,
        4 => ObjectKind::Stream(Input),
        5 => ObjectKind::Control(Volume, Input),
        6 => ObjectKind::Control(Mute, Input),
        7 => ObjectKind::Control(DataSource, Input),
        8 => ObjectKind::Stream(Output),
        9 => ObjectKind::Control(Volume, Output),
        10 => ObjectKind::Control(Mute, Output),
        11 => ObjectKind::Control(DataSource, Output),
        _ => return None,
    })
}

impl ObjectKind {
    /// Class this object is an instance of
    pub fn class(self) -> ClassId {
        match self {
            ObjectKind::PlugIn => ClassId::PLUGIN,
            ObjectKind::Box => ClassId::BOX,
            ObjectKind::Device => ClassId::DEVICE,
            ObjectKind::Stream(_) => ClassId::STREAM,
            ObjectKind::Control(ControlKind::Volume, _) => ClassId::VOLUME_CONTROL,
            ObjectKind::Control(ControlKind::Mute, _) => ClassId::MUTE_CONTROL,
            ObjectKind::Control(ControlKind::DataSource, _) => ClassId::DATA_SOURCE_CONTROL,
        }
    }

    /// Class the object's class derives from
    pub fn base_class(self) -> ClassId {
        match self {
            ObjectKind::PlugIn | ObjectKind::Box | ObjectKind::Device | ObjectKind::Stream(_) => {
                ClassId::OBJECT
            }
            ObjectKind::Control(ControlKind::Volume, _) => ClassId::LEVEL_CONTROL,
            ObjectKind::Control(ControlKind::Mute, _) => ClassId::BOOLEAN_CONTROL,
            ObjectKind::Control(ControlKind::DataSource, _) => ClassId::SELECTOR_CONTROL,
        }
    }

    /// Object that owns this one
    pub fn owner(self) -> ObjectId {
        match self {
            ObjectKind::PlugIn => ObjectId::UNKNOWN,
            ObjectKind::Box | ObjectKind::Device => ObjectId::PLUGIN,
            ObjectKind::Stream(_) | ObjectKind::Control(..) => ObjectId::DEVICE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_total_over_known_ids() {
        for id in ObjectId::ALL {
            assert!(resolve(id).is_some(), "{id} should resolve");
        }
        assert_eq!(resolve(ObjectId::UNKNOWN), None);
        assert_eq!(resolve(ObjectId(12)), None);
        assert_eq!(resolve(ObjectId(u32::MAX)), None);
    }

    #[test]
    fn test_ownership_tree() {
        assert_eq!(resolve(ObjectId::DEVICE).unwrap().owner(), ObjectId::PLUGIN);
        for side in [Side::Input, Side::Output] {
            let stream = resolve(side.stream()).unwrap();
            assert_eq!(stream, ObjectKind::Stream(side));
            assert_eq!(stream.owner(), ObjectId::DEVICE);
            for control in side.controls() {
                assert!(matches!(
                    resolve(control),
                    Some(ObjectKind::Control(_, control_side)) if control_side == side
                ));
            }
        }
    }
}
