//! Error types for the driver

use thiserror::Error;

use crate::object::ObjectId;
use crate::property::Selector;

/// Main error type for the driver
///
/// Every variant maps to a host status code through [`DriverError::status`].
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Unknown object: {0}")]
    NotFound(ObjectId),

    #[error("Property {selector} is not supported by object {object}")]
    UnsupportedProperty { object: ObjectId, selector: Selector },

    #[error("Property {0} is read-only")]
    NotSettable(Selector),

    #[error("Bad property size: expected {expected} bytes, got {actual}")]
    BadPropertySize { expected: usize, actual: usize },

    #[error("Ring buffer overrun: {requested} bytes exceed capacity of {capacity}")]
    BufferOverrun { requested: usize, capacity: usize },

    #[error("Device is busy: configuration cannot change while IO is running")]
    Busy,

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Plug-in already initialized")]
    AlreadyInitialized,

    #[error("Illegal operation: {0}")]
    IllegalOperation(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO buffer too small: need {needed} bytes, got {actual}")]
    BadBufferSize { needed: usize, actual: usize },

    #[error("Interface not supported: {0}")]
    NoInterface(uuid::Uuid),

    #[error("IO is not running")]
    NotRunning,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host status codes, as four-character codes
pub mod status {
    pub const NO_ERROR: i32 = 0;
    pub const BAD_OBJECT: i32 = fourcc(b"!obj");
    pub const UNKNOWN_PROPERTY: i32 = fourcc(b"who?");
    pub const BAD_PROPERTY_SIZE: i32 = fourcc(b"!siz");
    pub const ILLEGAL_OPERATION: i32 = fourcc(b"nope");
    pub const UNSUPPORTED_OPERATION: i32 = fourcc(b"unop");
    pub const UNSUPPORTED_FORMAT: i32 = fourcc(b"!dat");
    pub const NOT_READY: i32 = fourcc(b"nrdy");
    pub const NOT_RUNNING: i32 = fourcc(b"stop");
    pub const UNSPECIFIED: i32 = fourcc(b"what");
    /// `E_NOINTERFACE` of the COM-style plug-in interface
    pub const NO_INTERFACE: i32 = 0x8000_0004_u32 as i32;

    const fn fourcc(code: &[u8; 4]) -> i32 {
        u32::from_be_bytes(*code) as i32
    }
}

impl DriverError {
    /// Status code reported to the host for this error
    pub fn status(&self) -> i32 {
        match self {
            DriverError::NotFound(_) => status::BAD_OBJECT,
            DriverError::UnsupportedProperty { .. } => status::UNKNOWN_PROPERTY,
            DriverError::NotSettable(_) => status::ILLEGAL_OPERATION,
            DriverError::BadPropertySize { .. } => status::BAD_PROPERTY_SIZE,
            DriverError::BufferOverrun { .. } => status::ILLEGAL_OPERATION,
            DriverError::Busy => status::NOT_READY,
            DriverError::Unsupported(_) => status::UNSUPPORTED_OPERATION,
            DriverError::AlreadyInitialized => status::ILLEGAL_OPERATION,
            DriverError::IllegalOperation(_) => status::ILLEGAL_OPERATION,
            DriverError::UnsupportedFormat(_) => status::UNSUPPORTED_FORMAT,
            DriverError::BadBufferSize { .. } => status::BAD_PROPERTY_SIZE,
            DriverError::NoInterface(_) => status::NO_INTERFACE,
            DriverError::NotRunning => status::NOT_RUNNING,
            DriverError::Config(_) | DriverError::Io(_) => status::UNSPECIFIED,
        }
    }
}

/// Result type alias for the driver
pub type Result<T> = std::result::Result<T, DriverError>;

/// Status code for a driver call, `0` on success
pub fn status_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => status::NO_ERROR,
        Err(e) => e.status(),
    }
}
