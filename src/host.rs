//! Host-facing collaborators
//!
//! The host hands the driver a callback sink at initialization and owns the
//! clock every timestamp is expressed in. Both are traits so the engine can
//! be driven by a simulated host.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::constants::NOTIFICATION_QUEUE_CAPACITY;
use crate::object::ObjectId;
use crate::property::PropertyAddress;

/// Callbacks the driver makes into the host
pub trait Host: Send + Sync {
    /// Report that the listed properties of `object` changed value.
    ///
    /// Never called with a driver lock held.
    fn properties_changed(&self, object: ObjectId, addresses: &[PropertyAddress]);
}

/// Monotonic time source in host ticks
pub trait HostClock: Send + Sync {
    /// Current host time
    fn now(&self) -> u64;

    /// Number of host ticks in one second
    fn ticks_per_second(&self) -> f64;
}

/// Nanosecond clock anchored at construction
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for MonotonicClock {
    fn now(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    fn ticks_per_second(&self) -> f64 {
        1_000_000_000.0
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
    ticks_per_second: f64,
}

impl ManualClock {
    pub fn new(start: u64, ticks_per_second: f64) -> Self {
        Self {
            now: AtomicU64::new(start),
            ticks_per_second,
        }
    }

    pub fn set(&self, ticks: u64) {
        self.now.store(ticks, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl HostClock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }
}

/// One `properties_changed` call
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub object: ObjectId,
    pub addresses: Vec<PropertyAddress>,
}

/// Host that forwards notifications into a bounded channel.
///
/// Delivery never blocks the caller; notifications that do not fit are
/// dropped and counted.
pub struct ChannelHost {
    tx: Sender<Notification>,
    dropped: AtomicUsize,
}

impl ChannelHost {
    /// Create the host and the receiving end of its notification queue
    pub fn new() -> (Self, Receiver<Notification>) {
        Self::with_capacity(NOTIFICATION_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<Notification>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// Notifications lost because the queue was full or closed
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Host for ChannelHost {
    fn properties_changed(&self, object: ObjectId, addresses: &[PropertyAddress]) {
        let notification = Notification {
            object,
            addresses: addresses.to_vec(),
        };
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Selector;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100, 1_000.0);
        clock.advance(50);
        assert_eq!(clock.now(), 150);
        clock.set(10);
        assert_eq!(clock.now(), 10);
    }

    #[test]
    fn test_channel_host_drops_when_full() {
        let (host, rx) = ChannelHost::with_capacity(1);
        let address = PropertyAddress::global(Selector::DEVICE_IS_RUNNING);
        host.properties_changed(ObjectId::DEVICE, &[address]);
        host.properties_changed(ObjectId::DEVICE, &[address]);

        assert_eq!(host.dropped(), 1);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.object, ObjectId::DEVICE);
        assert_eq!(received.addresses, vec![address]);
    }
}
