//! Device state and the IO engine behind it

pub mod buffer;
pub mod device;
pub mod engine;

pub use buffer::{RingBuffer, RingCursor};
pub use device::{ClientEntry, ControlState, DeviceState};
pub use engine::{
    Anchor, EngineSnapshot, IoCycleInfo, IoEngine, IoOperation, IoStatsSnapshot, IoTransition,
    WillDo, ZeroTimestamp,
};
