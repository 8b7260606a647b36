//! The plug-in driver
//!
//! [`Driver`] owns every piece of state the device has and implements the
//! host's fixed call surface, [`AudioServerPlugIn`]. Two locks guard it:
//!
//! - the state lock: device state, controls, client table, host handle
//! - the IO lock: the timing engine and ring buffer
//!
//! When both are needed the state lock is taken first. Host notifications
//! are sent only after every lock is released.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::audio::{
    ClientEntry, ControlState, DeviceState, EngineSnapshot, IoCycleInfo, IoEngine, IoOperation,
    IoTransition, WillDo, ZeroTimestamp,
};
use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::host::{Host, HostClock};
use crate::object::{resolve, ObjectId, ObjectKind, Side};
use crate::property::{
    self, ChangedAddresses, PropertyAddress, PropertyContext, PropertyValue, Selector,
};

/// `IUnknown`
pub const IUNKNOWN_UUID: Uuid = Uuid::from_u128(0x00000000_0000_0000_C000_000000000046);

/// The audio server plug-in driver interface
pub const DRIVER_INTERFACE_UUID: Uuid = Uuid::from_u128(0xEEA5773D_CC43_49F1_8E00_8F96E7D23B17);

/// A host process registered on the device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientInfo {
    pub client_id: u32,
    pub pid: i32,
    pub bundle_id: Option<String>,
}

/// Fixed call surface the audio host drives a plug-in through
pub trait AudioServerPlugIn: Send + Sync {
    /// Hand out the driver interface, taking a reference
    fn query_interface(&self, interface: Uuid) -> Result<u32>;
    fn acquire(&self) -> u32;
    fn release(&self) -> u32;
    fn initialize(&self, host: Arc<dyn Host>) -> Result<()>;

    fn create_device(&self, client: &ClientInfo) -> Result<ObjectId>;
    fn destroy_device(&self, device: ObjectId) -> Result<()>;
    fn add_device_client(&self, device: ObjectId, client: &ClientInfo) -> Result<()>;
    fn remove_device_client(&self, device: ObjectId, client: &ClientInfo) -> Result<()>;
    fn perform_device_configuration_change(&self, device: ObjectId, action: u64) -> Result<()>;
    fn abort_device_configuration_change(&self, device: ObjectId, action: u64) -> Result<()>;

    fn has_property(&self, object: ObjectId, address: &PropertyAddress) -> bool;
    fn is_property_settable(&self, object: ObjectId, address: &PropertyAddress) -> Result<bool>;
    fn get_property_data_size(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        qualifier: &[u8],
    ) -> Result<usize>;
    /// Copy the value into `out`, returning the bytes written
    fn get_property_data(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        qualifier: &[u8],
        out: &mut [u8],
    ) -> Result<usize>;
    fn set_property_data(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        qualifier: &[u8],
        data: &[u8],
    ) -> Result<ChangedAddresses>;

    fn start_io(&self, device: ObjectId, client_id: u32) -> Result<()>;
    fn stop_io(&self, device: ObjectId, client_id: u32) -> Result<()>;
    fn get_zero_timestamp(&self, device: ObjectId, client_id: u32) -> Result<ZeroTimestamp>;
    fn will_do_io_operation(
        &self,
        device: ObjectId,
        client_id: u32,
        op: IoOperation,
    ) -> Result<WillDo>;
    fn begin_io_operation(
        &self,
        device: ObjectId,
        client_id: u32,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
    ) -> Result<()>;
    #[allow(clippy::too_many_arguments)]
    fn do_io_operation(
        &self,
        device: ObjectId,
        stream: ObjectId,
        client_id: u32,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
        buffer: &mut [u8],
    ) -> Result<()>;
    fn end_io_operation(
        &self,
        device: ObjectId,
        client_id: u32,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
    ) -> Result<()>;
}

/// Everything behind the state lock
struct Shared {
    device: DeviceState,
    host: Option<Arc<dyn Host>>,
}

/// Serializable view of the whole driver
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub ref_count: u32,
    pub initialized: bool,
    pub sample_rate: f64,
    pub io_running: bool,
    pub box_name: String,
    pub box_acquired: bool,
    pub input: ControlState,
    pub output: ControlState,
    pub input_active: bool,
    pub output_active: bool,
    pub clients: Vec<(u32, ClientEntry)>,
    pub engine: EngineSnapshot,
}

pub struct Driver {
    config: DriverConfig,
    clock: Arc<dyn HostClock>,
    ref_count: AtomicU32,
    state: Mutex<Shared>,
    io: CachePadded<Mutex<IoEngine>>,
}

fn kind_of(object: ObjectId) -> Result<ObjectKind> {
    resolve(object).ok_or(DriverError::NotFound(object))
}

fn expect_device(device: ObjectId) -> Result<()> {
    if device != ObjectId::DEVICE {
        return Err(DriverError::NotFound(device));
    }
    Ok(())
}

fn running_changed() -> [PropertyAddress; 1] {
    [PropertyAddress::global(Selector::DEVICE_IS_RUNNING)]
}

impl Driver {
    pub fn new(config: DriverConfig, clock: Arc<dyn HostClock>) -> Self {
        let device = DeviceState::new(&config);
        Self {
            config,
            clock,
            ref_count: AtomicU32::new(1),
            state: Mutex::new(Shared { device, host: None }),
            io: CachePadded::new(Mutex::new(IoEngine::new())),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count.load(Ordering::SeqCst)
    }

    fn notify(host: Option<Arc<dyn Host>>, object: ObjectId, addresses: &[PropertyAddress]) {
        match host {
            Some(host) => host.properties_changed(object, addresses),
            None => tracing::debug!("No host yet, dropping change notification for {}", object),
        }
    }

    /// Current value of a property, validated against the object's kind
    pub fn property_value(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        qualifier: &[u8],
    ) -> Result<PropertyValue> {
        let kind = kind_of(object)?;
        if !property::has_property(kind, address) {
            return Err(property::unsupported(object, address.selector));
        }
        let shared = self.state.lock();
        let ctx = PropertyContext {
            config: &self.config,
            state: &shared.device,
        };
        property::get_value(kind, object, address, qualifier, &ctx)
    }

    /// Copy of the device, control and engine state
    pub fn snapshot(&self) -> DeviceSnapshot {
        let shared = self.state.lock();
        let engine = self.io.lock().snapshot();
        let device = &shared.device;
        DeviceSnapshot {
            ref_count: self.ref_count(),
            initialized: shared.host.is_some(),
            sample_rate: device.sample_rate,
            io_running: device.io_running,
            box_name: device.box_name.clone(),
            box_acquired: device.box_acquired,
            input: *device.controls(Side::Input),
            output: *device.controls(Side::Output),
            input_active: device.stream_active(Side::Input),
            output_active: device.stream_active(Side::Output),
            clients: device.clients(),
            engine,
        }
    }

    /// Drain output bytes mirrored into the ring since the last read
    pub fn read_output_tap(&self, out: &mut [u8]) -> usize {
        self.io.lock().read_tap(out)
    }
}

impl AudioServerPlugIn for Driver {
    fn query_interface(&self, interface: Uuid) -> Result<u32> {
        if interface == IUNKNOWN_UUID || interface == DRIVER_INTERFACE_UUID {
            return Ok(self.acquire());
        }
        tracing::debug!("Rejected interface {}", interface);
        Err(DriverError::NoInterface(interface))
    }

    fn acquire(&self) -> u32 {
        self.ref_count.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    fn release(&self) -> u32 {
        let previous = self
            .ref_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or_else(|count| count);
        previous.saturating_sub(1)
    }

    fn initialize(&self, host: Arc<dyn Host>) -> Result<()> {
        let mut shared = self.state.lock();
        if shared.host.is_some() {
            return Err(DriverError::AlreadyInitialized);
        }
        shared.host = Some(host);
        tracing::info!(
            "{} initialized ({} by {})",
            self.config.bundle_id,
            self.config.device_name,
            self.config.manufacturer
        );
        Ok(())
    }

    fn create_device(&self, _client: &ClientInfo) -> Result<ObjectId> {
        Err(DriverError::Unsupported("device topology is fixed"))
    }

    fn destroy_device(&self, _device: ObjectId) -> Result<()> {
        Err(DriverError::Unsupported("device topology is fixed"))
    }

    fn add_device_client(&self, device: ObjectId, client: &ClientInfo) -> Result<()> {
        expect_device(device)?;
        self.state
            .lock()
            .device
            .add_client(client.client_id, client.pid, client.bundle_id.clone())?;
        tracing::debug!(
            "Client {} added (pid {}, {:?})",
            client.client_id,
            client.pid,
            client.bundle_id
        );
        Ok(())
    }

    fn remove_device_client(&self, device: ObjectId, client: &ClientInfo) -> Result<()> {
        expect_device(device)?;
        let (stopped, host) = {
            let mut shared = self.state.lock();
            let entry = shared.device.remove_client(client.client_id)?;
            let mut stopped = false;
            if entry.io_starts > 0 {
                let mut io = self.io.lock();
                tracing::debug!(
                    "Client {} left with {} IO starts outstanding",
                    client.client_id,
                    entry.io_starts
                );
                for _ in 0..entry.io_starts {
                    match io.stop() {
                        Ok(IoTransition::Stopped) => stopped = true,
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
                shared.device.io_running = io.is_running();
            }
            (stopped, shared.host.clone())
        };
        tracing::debug!("Client {} removed", client.client_id);
        if stopped {
            Self::notify(host, ObjectId::DEVICE, &running_changed());
        }
        Ok(())
    }

    fn perform_device_configuration_change(&self, device: ObjectId, action: u64) -> Result<()> {
        expect_device(device)?;
        let (changed, host) = {
            let mut shared = self.state.lock();
            let changed = shared.device.change_sample_rate(action as f64)?;
            (changed, shared.host.clone())
        };
        if changed {
            tracing::info!("Configuration change applied: {} Hz", action);
            Self::notify(
                host,
                ObjectId::DEVICE,
                &[PropertyAddress::global(Selector::NOMINAL_SAMPLE_RATE)],
            );
        }
        Ok(())
    }

    fn abort_device_configuration_change(&self, device: ObjectId, action: u64) -> Result<()> {
        expect_device(device)?;
        tracing::debug!("Configuration change to {} Hz aborted", action);
        Ok(())
    }

    fn has_property(&self, object: ObjectId, address: &PropertyAddress) -> bool {
        resolve(object).is_some_and(|kind| property::has_property(kind, address))
    }

    fn is_property_settable(&self, object: ObjectId, address: &PropertyAddress) -> Result<bool> {
        property::is_settable(kind_of(object)?, object, address)
    }

    fn get_property_data_size(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        qualifier: &[u8],
    ) -> Result<usize> {
        Ok(self.property_value(object, address, qualifier)?.encoded_len())
    }

    fn get_property_data(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        qualifier: &[u8],
        out: &mut [u8],
    ) -> Result<usize> {
        self.property_value(object, address, qualifier)?
            .write_into(out)
    }

    fn set_property_data(
        &self,
        object: ObjectId,
        address: &PropertyAddress,
        _qualifier: &[u8],
        data: &[u8],
    ) -> Result<ChangedAddresses> {
        let kind = kind_of(object)?;
        let (changed, host) = {
            let mut shared = self.state.lock();
            let changed = property::set_value(kind, object, address, data, &mut shared.device)?;
            (changed, shared.host.clone())
        };
        if !changed.is_empty() {
            Self::notify(host, object, changed.as_slice());
        }
        Ok(changed)
    }

    fn start_io(&self, device: ObjectId, client_id: u32) -> Result<()> {
        expect_device(device)?;
        let (transition, host) = {
            let mut shared = self.state.lock();
            let mut io = self.io.lock();
            let transition = io.start(
                self.clock.now(),
                shared.device.sample_rate,
                self.clock.ticks_per_second(),
            );
            shared.device.io_running = io.is_running();
            shared.device.note_io_start(client_id);
            (transition, shared.host.clone())
        };
        tracing::debug!("StartIO from client {}: {:?}", client_id, transition);
        if transition.is_edge() {
            Self::notify(host, ObjectId::DEVICE, &running_changed());
        }
        Ok(())
    }

    fn stop_io(&self, device: ObjectId, client_id: u32) -> Result<()> {
        expect_device(device)?;
        let (transition, host) = {
            let mut shared = self.state.lock();
            let mut io = self.io.lock();
            if !io.is_running() {
                return Err(DriverError::NotRunning);
            }
            shared.device.note_io_stop(client_id)?;
            let transition = io.stop()?;
            shared.device.io_running = io.is_running();
            (transition, shared.host.clone())
        };
        tracing::debug!("StopIO from client {}: {:?}", client_id, transition);
        if transition.is_edge() {
            Self::notify(host, ObjectId::DEVICE, &running_changed());
        }
        Ok(())
    }

    fn get_zero_timestamp(&self, device: ObjectId, _client_id: u32) -> Result<ZeroTimestamp> {
        expect_device(device)?;
        let now = self.clock.now();
        self.io.lock().zero_timestamp(now)
    }

    fn will_do_io_operation(
        &self,
        device: ObjectId,
        _client_id: u32,
        op: IoOperation,
    ) -> Result<WillDo> {
        expect_device(device)?;
        Ok(op.will_do())
    }

    fn begin_io_operation(
        &self,
        device: ObjectId,
        _client_id: u32,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
    ) -> Result<()> {
        expect_device(device)?;
        self.io.lock().begin_operation(op, frames, cycle)
    }

    fn do_io_operation(
        &self,
        device: ObjectId,
        stream: ObjectId,
        _client_id: u32,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
        buffer: &mut [u8],
    ) -> Result<()> {
        expect_device(device)?;
        kind_of(stream)?;
        if let Some(side) = op.direction() {
            if stream != side.stream() {
                return Err(DriverError::IllegalOperation(format!(
                    "{:?} does not run on stream {}",
                    op, stream
                )));
            }
        }
        self.io.lock().perform(op, frames, cycle, buffer)
    }

    fn end_io_operation(
        &self,
        device: ObjectId,
        _client_id: u32,
        op: IoOperation,
        frames: u32,
        cycle: &IoCycleInfo,
    ) -> Result<()> {
        expect_device(device)?;
        self.io.lock().end_operation(op, frames, cycle)
    }
}
