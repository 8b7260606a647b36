//! Timing and ring-buffer engine
//!
//! Runs the IO lifecycle of the device:
//!
//! ```text
//!   Idle ──StartIO (0→1)──► Running ──StartIO──► Running (count + 1)
//!    ▲                         │
//!    └──────StopIO (1→0)───────┘   StopIO with count > 1 only decrements
//! ```
//!
//! The 0→1 edge records the anchor (sample time 0 at the current host time),
//! derives the host ticks per frame from the nominal rate, bumps the
//! timestamp seed and rewinds the ring. Zero timestamps are whole periods
//! counted from the anchor, so they never lie ahead of the clock.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::audio::buffer::{RingBuffer, RingCursor};
use crate::constants::{BYTES_PER_FRAME, RING_BUFFER_SIZE, ZERO_TIMESTAMP_PERIOD};
use crate::error::{DriverError, Result};
use crate::object::Side;

/// Kinds of IO operation the host runs each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IoOperation {
    Thread,
    Cycle,
    ReadInput,
    ConvertInput,
    ProcessInput,
    ProcessOutput,
    MixOutput,
    ProcessMix,
    ConvertMix,
    WriteMix,
}

impl IoOperation {
    pub const ALL: [IoOperation; 10] = [
        IoOperation::Thread,
        IoOperation::Cycle,
        IoOperation::ReadInput,
        IoOperation::ConvertInput,
        IoOperation::ProcessInput,
        IoOperation::ProcessOutput,
        IoOperation::MixOutput,
        IoOperation::ProcessMix,
        IoOperation::ConvertMix,
        IoOperation::WriteMix,
    ];

    /// Host four-character code
    pub const fn code(self) -> u32 {
        u32::from_be_bytes(*match self {
            IoOperation::Thread => b"thrd",
            IoOperation::Cycle => b"cycl",
            IoOperation::ReadInput => b"read",
            IoOperation::ConvertInput => b"cinp",
            IoOperation::ProcessInput => b"pinp",
            IoOperation::ProcessOutput => b"pout",
            IoOperation::MixOutput => b"mixo",
            IoOperation::ProcessMix => b"pmix",
            IoOperation::ConvertMix => b"cmix",
            IoOperation::WriteMix => b"rend",
        })
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Stream direction the operation moves data for
    pub fn direction(self) -> Option<Side> {
        match self {
            IoOperation::Thread | IoOperation::Cycle => None,
            IoOperation::ReadInput | IoOperation::ConvertInput | IoOperation::ProcessInput => {
                Some(Side::Input)
            }
            IoOperation::ProcessOutput
            | IoOperation::MixOutput
            | IoOperation::ProcessMix
            | IoOperation::ConvertMix
            | IoOperation::WriteMix => Some(Side::Output),
        }
    }

    /// Only input reads and mix writes are performed, both in place
    pub fn will_do(self) -> WillDo {
        match self {
            IoOperation::ReadInput | IoOperation::WriteMix => WillDo {
                will_do: true,
                in_place: true,
            },
            _ => WillDo::default(),
        }
    }
}

/// Answer to "will you do this operation"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WillDo {
    pub will_do: bool,
    pub in_place: bool,
}

/// Per-cycle timing the host passes along with each IO operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IoCycleInfo {
    pub cycle_counter: u64,
    pub input_sample_time: f64,
    pub output_sample_time: f64,
    pub current_host_time: u64,
}

/// Reference point of a running IO session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub sample_time: f64,
    pub host_time: u64,
}

/// Start of the current zero-timestamp period
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZeroTimestamp {
    pub sample_time: f64,
    pub host_time: u64,
    pub seed: u64,
}

/// Outcome of a StartIO or StopIO call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoTransition {
    /// First client; the device went from idle to running
    Started,
    /// Another client joined a running device
    Joined,
    /// A client left, others remain
    Left,
    /// Last client left; the device is idle
    Stopped,
}

impl IoTransition {
    /// Whether the running state flipped
    pub fn is_edge(self) -> bool {
        matches!(self, IoTransition::Started | IoTransition::Stopped)
    }
}

#[derive(Debug, Default)]
struct IoStats {
    operations_begun: AtomicU64,
    operations_ended: AtomicU64,
    frames_read: AtomicU64,
    frames_written: AtomicU64,
}

/// Point-in-time copy of the IO counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IoStatsSnapshot {
    pub operations_begun: u64,
    pub operations_ended: u64,
    pub frames_read: u64,
    pub frames_written: u64,
    pub overruns: u64,
    pub dropped_bytes: u64,
}

/// Serializable view of the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub running_clients: u32,
    pub anchor: Option<Anchor>,
    pub seed: u64,
    pub host_ticks_per_frame: f64,
    pub period_ticks: u64,
    pub ring: RingCursor,
    /// Unread ring bytes as a fraction of capacity
    pub ring_fill: f32,
    pub stats: IoStatsSnapshot,
}

pub struct IoEngine {
    clients: u32,
    anchor: Option<Anchor>,
    host_ticks_per_frame: f64,
    period_ticks: u64,
    seed: u64,
    ring: RingBuffer,
    /// Open Begin/End bracket and its frame count per direction, indexed
    /// input then output
    open: [Option<(IoOperation, u32)>; 2],
    stats: IoStats,
}

fn slot(side: Side) -> usize {
    match side {
        Side::Input => 0,
        Side::Output => 1,
    }
}

const RING_CAPACITY: NonZeroUsize = match NonZeroUsize::new(RING_BUFFER_SIZE) {
    Some(capacity) => capacity,
    None => panic!("ring buffer size must be non-zero"),
};

fn frame_bytes(frames: u32) -> usize {
    frames as usize * BYTES_PER_FRAME as usize
}

impl IoEngine {
    pub fn new() -> Self {
        Self {
            clients: 0,
            anchor: None,
            host_ticks_per_frame: 0.0,
            period_ticks: 0,
            seed: 0,
            ring: RingBuffer::new(RING_CAPACITY),
            open: [None; 2],
            stats: IoStats::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.clients > 0
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Register one more running client.
    ///
    /// Only the first client sets up timing; later ones leave the anchor
    /// alone.
    pub fn start(&mut self, now: u64, sample_rate: f64, ticks_per_second: f64) -> IoTransition {
        self.clients = self.clients.saturating_add(1);
        if self.clients > 1 {
            return IoTransition::Joined;
        }

        self.host_ticks_per_frame = ticks_per_second / sample_rate;
        self.period_ticks = (self.host_ticks_per_frame * ZERO_TIMESTAMP_PERIOD as f64)
            .round()
            .max(1.0) as u64;
        self.anchor = Some(Anchor {
            sample_time: 0.0,
            host_time: now,
        });
        self.seed += 1;
        self.ring.clear();
        self.open = [None; 2];
        tracing::info!(
            "IO started at host time {} ({} Hz, {:.3} ticks/frame, seed {})",
            now,
            sample_rate,
            self.host_ticks_per_frame,
            self.seed
        );
        IoTransition::Started
    }

    /// Drop one running client; the last one takes the anchor with it
    pub fn stop(&mut self) -> Result<IoTransition> {
        if self.clients == 0 {
            return Err(DriverError::NotRunning);
        }
        self.clients -= 1;
        if self.clients > 0 {
            return Ok(IoTransition::Left);
        }
        self.anchor = None;
        self.open = [None; 2];
        tracing::info!("IO stopped");
        Ok(IoTransition::Stopped)
    }

    fn running_anchor(&self) -> Result<Anchor> {
        self.anchor.ok_or(DriverError::NotRunning)
    }

    /// Zero timestamp of the period containing `now`
    pub fn zero_timestamp(&self, now: u64) -> Result<ZeroTimestamp> {
        let anchor = self.running_anchor()?;
        let cycles = now.saturating_sub(anchor.host_time) / self.period_ticks;
        let zts = ZeroTimestamp {
            sample_time: anchor.sample_time + cycles as f64 * ZERO_TIMESTAMP_PERIOD as f64,
            host_time: anchor.host_time + cycles * self.period_ticks,
            seed: self.seed,
        };
        tracing::trace!(?zts, now, "zero timestamp");
        Ok(zts)
    }

    /// Open the bracket for `op` over a buffer of `frames`
    pub fn begin_operation(
        &mut self,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
    ) -> Result<()> {
        self.running_anchor()?;
        if let Some(side) = op.direction() {
            let open = &mut self.open[slot(side)];
            if let Some((current, _)) = *open {
                return Err(DriverError::IllegalOperation(format!(
                    "{:?} begun while {:?} is still open",
                    op, current
                )));
            }
            *open = Some((op, frames));
        }
        self.stats.operations_begun.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(?op, frames, cycle = cycle.cycle_counter, "begin IO operation");
        Ok(())
    }

    /// Close the bracket opened by [`IoEngine::begin_operation`]; the frame
    /// count must match the one it was opened with
    pub fn end_operation(&mut self, op: IoOperation, frames: u32, cycle: &IoCycleInfo) -> Result<()> {
        self.running_anchor()?;
        if let Some(side) = op.direction() {
            let open = &mut self.open[slot(side)];
            match *open {
                Some((current, begun)) if current == op && begun == frames => {}
                Some((current, begun)) if current == op => {
                    return Err(DriverError::IllegalOperation(format!(
                        "{:?} ended over {} frames but began over {}",
                        op, frames, begun
                    )));
                }
                _ => {
                    return Err(DriverError::IllegalOperation(format!(
                        "{:?} ended without a matching begin",
                        op
                    )));
                }
            }
            *open = None;
        }
        self.stats.operations_ended.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(?op, frames, cycle = cycle.cycle_counter, "end IO operation");
        Ok(())
    }

    /// Run `op` on the host buffer. Declined operations succeed untouched.
    pub fn perform(
        &mut self,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
        buffer: &mut [u8],
    ) -> Result<()> {
        self.running_anchor()?;
        tracing::trace!(?op, frames, cycle = cycle.cycle_counter, "do IO operation");
        match op {
            IoOperation::ReadInput => self.read_input(frames, buffer),
            IoOperation::WriteMix => self.write_output(frames, buffer),
            _ => Ok(()),
        }
    }

    fn check_transfer(&self, frames: u32, buffer_len: usize) -> Result<usize> {
        let bytes = frame_bytes(frames);
        if let Err(e) = self.ring.ensure_fits(bytes) {
            tracing::warn!("IO transfer of {} frames rejected: {}", frames, e);
            return Err(e);
        }
        if buffer_len < bytes {
            return Err(DriverError::BadBufferSize {
                needed: bytes,
                actual: buffer_len,
            });
        }
        Ok(bytes)
    }

    /// Deliver `frames` of silence into `buffer`, consuming unread ring bytes
    pub fn read_input(&mut self, frames: u32, buffer: &mut [u8]) -> Result<()> {
        self.running_anchor()?;
        let bytes = self.check_transfer(frames, buffer.len())?;
        buffer[..bytes].fill(0);
        self.ring.consume(bytes);
        self.stats
            .frames_read
            .fetch_add(frames as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Accept `frames` from `buffer`, mirroring them into the ring
    pub fn write_output(&mut self, frames: u32, buffer: &[u8]) -> Result<()> {
        self.running_anchor()?;
        let bytes = self.check_transfer(frames, buffer.len())?;
        self.ring.write(&buffer[..bytes])?;
        self.stats
            .frames_written
            .fetch_add(frames as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Drain mirrored output bytes into `out`
    pub fn read_tap(&mut self, out: &mut [u8]) -> usize {
        self.ring.read_into(out)
    }

    pub fn cursor(&self) -> RingCursor {
        self.ring.cursor()
    }

    pub fn stats(&self) -> IoStatsSnapshot {
        IoStatsSnapshot {
            operations_begun: self.stats.operations_begun.load(Ordering::Relaxed),
            operations_ended: self.stats.operations_ended.load(Ordering::Relaxed),
            frames_read: self.stats.frames_read.load(Ordering::Relaxed),
            frames_written: self.stats.frames_written.load(Ordering::Relaxed),
            overruns: self.ring.overrun_count(),
            dropped_bytes: self.ring.dropped_bytes(),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            running_clients: self.clients,
            anchor: self.anchor,
            seed: self.seed,
            host_ticks_per_frame: self.host_ticks_per_frame,
            period_ticks: self.period_ticks,
            ring: self.ring.cursor(),
            ring_fill: self.ring.fill_level(),
            stats: self.stats(),
        }
    }
}

impl Default for IoEngine {
    fn default() -> Self {
        Self::new()
    }
}
