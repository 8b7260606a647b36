//! # USB Audio Driver
//!
//! Virtual audio device for an audio server plug-in host: one input stream,
//! one output stream, master volume/mute/data-source controls per side, all
//! backed by a software ring buffer.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                               AUDIO HOST                                  │
//! │   property threads (any client)              real-time IO thread          │
//! └──────────────┬──────────────────────────────────────────┬────────────────┘
//!                │ has/settable/size/get/set                 │ start/stop/zts/io
//!                ▼                                           ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          Driver (driver.rs)                               │
//! │  ┌────────────────────┐                                                   │
//! │  │  Object Registry   │  id ──► PlugIn | Box | Device | Stream | Control  │
//! │  │    (object.rs)     │                                                   │
//! │  └─────────┬──────────┘                                                   │
//! │            ▼                                                              │
//! │  ┌────────────────────┐   state lock   ┌──────────────────────────────┐   │
//! │  │ Property Dispatch  │ ─────────────► │  Device State Store          │   │
//! │  │   (property/)      │                │  rate, controls, clients     │   │
//! │  └────────────────────┘                │  (audio/device.rs)           │   │
//! │                                        └──────────────┬───────────────┘   │
//! │                                                       │ IO lock           │
//! │                                        ┌──────────────▼───────────────┐   │
//! │                                        │  Timing & Ring-Buffer Engine │   │
//! │                                        │  anchors, seed, byte ring    │   │
//! │                                        │  (audio/engine.rs, buffer.rs)│   │
//! │                                        └──────────────────────────────┘   │
//! └──────────────┬───────────────────────────────────────────────────────────┘
//!                │ properties_changed(object, addresses[0..2])
//!                ▼
//!            Host callback (host.rs)
//! ```

pub mod audio;
pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod object;
pub mod property;

pub use driver::{AudioServerPlugIn, Driver};
pub use error::{DriverError, Result};

/// Fixed device characteristics
pub mod constants {
    /// First supported nominal sample rate (also the initial rate)
    pub const SAMPLE_RATE_OPTION_1: f64 = 32_000.0;

    /// Second supported nominal sample rate
    pub const SAMPLE_RATE_OPTION_2: f64 = 44_100.0;

    /// All nominal sample rates the device accepts
    pub const SUPPORTED_SAMPLE_RATES: [f64; 2] = [SAMPLE_RATE_OPTION_1, SAMPLE_RATE_OPTION_2];

    /// Channels per stream
    pub const NUM_CHANNELS: u32 = 1;

    /// Bits per sample (signed integer PCM)
    pub const BITS_PER_CHANNEL: u32 = 16;

    /// Bytes in one frame of either stream
    pub const BYTES_PER_FRAME: u32 = (BITS_PER_CHANNEL / 8) * NUM_CHANNELS;

    /// Ring buffer capacity in bytes
    pub const RING_BUFFER_SIZE: usize = 16_384;

    /// Ring buffer capacity in frames
    pub const RING_BUFFER_FRAMES: u32 = RING_BUFFER_SIZE as u32 / BYTES_PER_FRAME;

    /// Frames between two zero timestamps
    pub const ZERO_TIMESTAMP_PERIOD: u32 = RING_BUFFER_FRAMES;

    /// Lowest volume in decibels
    pub const VOLUME_MIN_DB: f32 = -96.0;

    /// Highest volume in decibels
    pub const VOLUME_MAX_DB: f32 = 6.0;

    /// Number of items offered by each data-source control
    pub const DATA_SOURCE_NUM_ITEMS: u32 = 1;

    /// Capacity of the notification channel used by `ChannelHost`
    pub const NOTIFICATION_QUEUE_CAPACITY: usize = 256;
}
