//! Property dispatch
//!
//! Routes `(object, selector, scope, element)` requests to the handler for
//! the object's kind. Selectors every object answers (class, owner, owned
//! objects) go to the shared base handler first.
//!
//! Every entry point validates completely before touching state, so a
//! failed call leaves the device exactly as it was.

mod audio_box;
mod base;
mod control;
mod device;
mod plugin;
mod stream;
pub mod value;

use std::fmt;

use serde::Serialize;

use crate::audio::DeviceState;
use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::object::{ObjectId, ObjectKind, Side};

pub use value::{PropertyValue, RangedFormat, StreamFormat, ValueRange};

/// Four-character property selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Selector(pub u32);

impl Selector {
    pub const fn from_fourcc(code: &[u8; 4]) -> Self {
        Selector(u32::from_be_bytes(*code))
    }

    // Every object
    pub const BASE_CLASS: Selector = Selector::from_fourcc(b"bcls");
    pub const CLASS: Selector = Selector::from_fourcc(b"clas");
    pub const OWNER: Selector = Selector::from_fourcc(b"stdv");
    pub const OWNED_OBJECTS: Selector = Selector::from_fourcc(b"ownd");
    pub const NAME: Selector = Selector::from_fourcc(b"lnam");
    pub const MANUFACTURER: Selector = Selector::from_fourcc(b"lmak");
    pub const MODEL_NAME: Selector = Selector::from_fourcc(b"lmod");

    // Plug-in
    pub const BOX_LIST: Selector = Selector::from_fourcc(b"box#");
    pub const TRANSLATE_UID_TO_BOX: Selector = Selector::from_fourcc(b"uidb");
    pub const DEVICE_LIST: Selector = Selector::from_fourcc(b"dev#");
    pub const TRANSLATE_UID_TO_DEVICE: Selector = Selector::from_fourcc(b"uidd");
    pub const RESOURCE_BUNDLE: Selector = Selector::from_fourcc(b"rsrc");

    // Box
    pub const BOX_UID: Selector = Selector::from_fourcc(b"buid");
    pub const HAS_AUDIO: Selector = Selector::from_fourcc(b"bhau");
    pub const HAS_VIDEO: Selector = Selector::from_fourcc(b"bhvi");
    pub const HAS_MIDI: Selector = Selector::from_fourcc(b"bhmi");
    pub const IS_PROTECTED: Selector = Selector::from_fourcc(b"bpro");
    pub const ACQUIRED: Selector = Selector::from_fourcc(b"bxon");
    pub const ACQUISITION_FAILED: Selector = Selector::from_fourcc(b"bxof");
    pub const BOX_DEVICE_LIST: Selector = Selector::from_fourcc(b"bdv#");

    // Box and device
    pub const MODEL_UID: Selector = Selector::from_fourcc(b"muid");
    pub const TRANSPORT_TYPE: Selector = Selector::from_fourcc(b"tran");

    // Device
    pub const DEVICE_UID: Selector = Selector::from_fourcc(b"uid ");
    pub const RELATED_DEVICES: Selector = Selector::from_fourcc(b"akin");
    pub const CLOCK_DOMAIN: Selector = Selector::from_fourcc(b"clkd");
    pub const DEVICE_IS_ALIVE: Selector = Selector::from_fourcc(b"livn");
    pub const DEVICE_IS_RUNNING: Selector = Selector::from_fourcc(b"goin");
    pub const CAN_BE_DEFAULT_DEVICE: Selector = Selector::from_fourcc(b"dflt");
    pub const CAN_BE_DEFAULT_SYSTEM_DEVICE: Selector = Selector::from_fourcc(b"sflt");
    pub const LATENCY: Selector = Selector::from_fourcc(b"ltnc");
    pub const STREAMS: Selector = Selector::from_fourcc(b"stm#");
    pub const CONTROL_LIST: Selector = Selector::from_fourcc(b"ctrl");
    pub const SAFETY_OFFSET: Selector = Selector::from_fourcc(b"saft");
    pub const NOMINAL_SAMPLE_RATE: Selector = Selector::from_fourcc(b"nsrt");
    pub const AVAILABLE_NOMINAL_SAMPLE_RATES: Selector = Selector::from_fourcc(b"nsr#");
    pub const IS_HIDDEN: Selector = Selector::from_fourcc(b"hidn");
    pub const PREFERRED_CHANNELS_FOR_STEREO: Selector = Selector::from_fourcc(b"dch2");
    pub const ZERO_TIMESTAMP_PERIOD: Selector = Selector::from_fourcc(b"ring");

    // Stream
    pub const IS_ACTIVE: Selector = Selector::from_fourcc(b"sact");
    pub const DIRECTION: Selector = Selector::from_fourcc(b"sdir");
    pub const TERMINAL_TYPE: Selector = Selector::from_fourcc(b"term");
    pub const STARTING_CHANNEL: Selector = Selector::from_fourcc(b"schn");
    pub const VIRTUAL_FORMAT: Selector = Selector::from_fourcc(b"sfmt");
    pub const AVAILABLE_VIRTUAL_FORMATS: Selector = Selector::from_fourcc(b"sfma");
    pub const PHYSICAL_FORMAT: Selector = Selector::from_fourcc(b"pft ");
    pub const AVAILABLE_PHYSICAL_FORMATS: Selector = Selector::from_fourcc(b"pfta");

    // Controls
    pub const CONTROL_SCOPE: Selector = Selector::from_fourcc(b"cscp");
    pub const CONTROL_ELEMENT: Selector = Selector::from_fourcc(b"celm");
    pub const SCALAR_VALUE: Selector = Selector::from_fourcc(b"lcsv");
    pub const DECIBEL_VALUE: Selector = Selector::from_fourcc(b"lcdv");
    pub const DECIBEL_RANGE: Selector = Selector::from_fourcc(b"lcdr");
    pub const BOOLEAN_VALUE: Selector = Selector::from_fourcc(b"bcvl");
    pub const CURRENT_ITEM: Selector = Selector::from_fourcc(b"scci");
    pub const AVAILABLE_ITEMS: Selector = Selector::from_fourcc(b"scai");
    pub const ITEM_NAME: Selector = Selector::from_fourcc(b"scin");
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "'{}'", String::from_utf8_lossy(&bytes))
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

/// Object class identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClassId(pub u32);

impl ClassId {
    pub const OBJECT: ClassId = ClassId(u32::from_be_bytes(*b"aobj"));
    pub const PLUGIN: ClassId = ClassId(u32::from_be_bytes(*b"aplg"));
    pub const BOX: ClassId = ClassId(u32::from_be_bytes(*b"abox"));
    pub const DEVICE: ClassId = ClassId(u32::from_be_bytes(*b"adev"));
    pub const STREAM: ClassId = ClassId(u32::from_be_bytes(*b"astr"));
    pub const LEVEL_CONTROL: ClassId = ClassId(u32::from_be_bytes(*b"levl"));
    pub const VOLUME_CONTROL: ClassId = ClassId(u32::from_be_bytes(*b"vlme"));
    pub const BOOLEAN_CONTROL: ClassId = ClassId(u32::from_be_bytes(*b"togl"));
    pub const MUTE_CONTROL: ClassId = ClassId(u32::from_be_bytes(*b"mute"));
    pub const SELECTOR_CONTROL: ClassId = ClassId(u32::from_be_bytes(*b"slct"));
    pub const DATA_SOURCE_CONTROL: ClassId = ClassId(u32::from_be_bytes(*b"dsrc"));
}

/// Part of an object a property address refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    Global,
    Input,
    Output,
}

impl Scope {
    pub const fn code(self) -> u32 {
        match self {
            Scope::Global => u32::from_be_bytes(*b"glob"),
            Scope::Input => u32::from_be_bytes(*b"inpt"),
            Scope::Output => u32::from_be_bytes(*b"outp"),
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        [Scope::Global, Scope::Input, Scope::Output]
            .into_iter()
            .find(|scope| scope.code() == code)
    }

    /// The side this scope narrows to, `None` for global
    pub fn side(self) -> Option<Side> {
        match self {
            Scope::Global => None,
            Scope::Input => Some(Side::Input),
            Scope::Output => Some(Side::Output),
        }
    }
}

impl From<Side> for Scope {
    fn from(side: Side) -> Self {
        match side {
            Side::Input => Scope::Input,
            Side::Output => Scope::Output,
        }
    }
}

/// Element 0, the master channel
pub const ELEMENT_MAIN: u32 = 0;

/// Full address of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyAddress {
    pub selector: Selector,
    pub scope: Scope,
    pub element: u32,
}

impl PropertyAddress {
    pub const fn new(selector: Selector, scope: Scope, element: u32) -> Self {
        Self {
            selector,
            scope,
            element,
        }
    }

    /// Global scope, main element
    pub const fn global(selector: Selector) -> Self {
        Self::new(selector, Scope::Global, ELEMENT_MAIN)
    }
}

/// Addresses a successful set changed; at most two
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangedAddresses {
    addresses: [PropertyAddress; 2],
    len: usize,
}

impl ChangedAddresses {
    pub const fn none() -> Self {
        Self {
            addresses: [PropertyAddress::global(Selector(0)); 2],
            len: 0,
        }
    }

    pub const fn one(address: PropertyAddress) -> Self {
        Self {
            addresses: [address, address],
            len: 1,
        }
    }

    pub const fn two(first: PropertyAddress, second: PropertyAddress) -> Self {
        Self {
            addresses: [first, second],
            len: 2,
        }
    }

    pub fn as_slice(&self) -> &[PropertyAddress] {
        &self.addresses[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, selector: Selector) -> bool {
        self.as_slice().iter().any(|a| a.selector == selector)
    }
}

impl Default for ChangedAddresses {
    fn default() -> Self {
        Self::none()
    }
}

/// Read-only view handed to the property handlers
pub(crate) struct PropertyContext<'a> {
    pub config: &'a DriverConfig,
    pub state: &'a DeviceState,
}

pub(crate) fn unsupported(object: ObjectId, selector: Selector) -> DriverError {
    DriverError::UnsupportedProperty { object, selector }
}

/// Whether `kind` answers the property at all
pub fn has_property(kind: ObjectKind, address: &PropertyAddress) -> bool {
    let selector = address.selector;
    base::has(selector)
        || match kind {
            ObjectKind::PlugIn => plugin::has(selector),
            ObjectKind::Box => audio_box::has(selector),
            ObjectKind::Device => device::has(selector),
            ObjectKind::Stream(_) => stream::has(selector),
            ObjectKind::Control(control, _) => control::has(control, selector),
        }
}

/// Whether the property can be written
pub fn is_settable(kind: ObjectKind, id: ObjectId, address: &PropertyAddress) -> Result<bool> {
    if !has_property(kind, address) {
        return Err(unsupported(id, address.selector));
    }
    let selector = address.selector;
    if base::has(selector) {
        return Ok(false);
    }
    Ok(match kind {
        ObjectKind::PlugIn => false,
        ObjectKind::Box => audio_box::is_settable(selector),
        ObjectKind::Device => device::is_settable(selector),
        ObjectKind::Stream(_) => stream::is_settable(selector),
        ObjectKind::Control(control, _) => control::is_settable(control, selector),
    })
}

/// Current value of a property
pub(crate) fn get_value(
    kind: ObjectKind,
    id: ObjectId,
    address: &PropertyAddress,
    qualifier: &[u8],
    ctx: &PropertyContext<'_>,
) -> Result<PropertyValue> {
    if base::has(address.selector) {
        return base::get(kind, address, ctx);
    }
    match kind {
        ObjectKind::PlugIn => plugin::get(id, address, qualifier, ctx),
        ObjectKind::Box => audio_box::get(id, address, ctx),
        ObjectKind::Device => device::get(id, address, ctx),
        ObjectKind::Stream(side) => stream::get(id, side, address, ctx),
        ObjectKind::Control(control, side) => control::get(id, control, side, address, qualifier, ctx),
    }
}

/// Write a property, returning the addresses whose value changed
pub(crate) fn set_value(
    kind: ObjectKind,
    id: ObjectId,
    address: &PropertyAddress,
    data: &[u8],
    state: &mut DeviceState,
) -> Result<ChangedAddresses> {
    if !is_settable(kind, id, address)? {
        return Err(DriverError::NotSettable(address.selector));
    }
    match kind {
        ObjectKind::Box => audio_box::set(address, data, state),
        ObjectKind::Device => device::set(address, data, state),
        ObjectKind::Stream(side) => stream::set(side, address, data, state),
        ObjectKind::Control(control, side) => control::set(control, side, address, data, state),
        ObjectKind::PlugIn => Err(DriverError::NotSettable(address.selector)),
    }
}
