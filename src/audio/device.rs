//! Device state store
//!
//! Everything a property set can change lives here, behind the driver's
//! state lock. The IO engine keeps its own fields behind the IO lock.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::DriverConfig;
use crate::constants::{SUPPORTED_SAMPLE_RATES, VOLUME_MAX_DB, VOLUME_MIN_DB};
use crate::error::{DriverError, Result};
use crate::object::Side;

/// Volume, mute and data-source selection for one side
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlState {
    /// Always within `[VOLUME_MIN_DB, VOLUME_MAX_DB]`
    pub volume_db: f32,
    pub mute: bool,
    pub data_source: u32,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            volume_db: 0.0,
            mute: false,
            data_source: 0,
        }
    }
}

impl ControlState {
    /// Volume mapped linearly from the dB range onto `[0, 1]`
    pub fn volume_scalar(&self) -> f32 {
        (self.volume_db - VOLUME_MIN_DB) / (VOLUME_MAX_DB - VOLUME_MIN_DB)
    }

    /// Clamp and store a dB value. Returns whether the stored value moved.
    pub fn set_volume_db(&mut self, db: f32) -> bool {
        let db = db.clamp(VOLUME_MIN_DB, VOLUME_MAX_DB);
        let changed = self.volume_db != db;
        self.volume_db = db;
        changed
    }

    pub fn set_volume_scalar(&mut self, scalar: f32) -> bool {
        let scalar = scalar.clamp(0.0, 1.0);
        self.set_volume_db(VOLUME_MIN_DB + scalar * (VOLUME_MAX_DB - VOLUME_MIN_DB))
    }
}

/// A host client registered on the device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientEntry {
    pub pid: i32,
    pub bundle_id: Option<String>,
    /// StartIO calls not yet matched by StopIO
    pub io_starts: u32,
}

#[derive(Debug)]
pub struct DeviceState {
    pub sample_rate: f64,
    /// Mirrors whether the IO engine has at least one running client
    pub io_running: bool,
    pub box_name: String,
    pub box_acquired: bool,
    input: ControlState,
    output: ControlState,
    input_active: bool,
    output_active: bool,
    clients: HashMap<u32, ClientEntry>,
}

impl DeviceState {
    pub fn new(config: &DriverConfig) -> Self {
        Self {
            sample_rate: SUPPORTED_SAMPLE_RATES[0],
            io_running: false,
            box_name: config.box_name.clone(),
            box_acquired: true,
            input: ControlState::default(),
            output: ControlState::default(),
            input_active: true,
            output_active: true,
            clients: HashMap::new(),
        }
    }

    pub fn controls(&self, side: Side) -> &ControlState {
        match side {
            Side::Input => &self.input,
            Side::Output => &self.output,
        }
    }

    pub fn controls_mut(&mut self, side: Side) -> &mut ControlState {
        match side {
            Side::Input => &mut self.input,
            Side::Output => &mut self.output,
        }
    }

    pub fn stream_active(&self, side: Side) -> bool {
        match side {
            Side::Input => self.input_active,
            Side::Output => self.output_active,
        }
    }

    pub fn set_stream_active(&mut self, side: Side, active: bool) {
        match side {
            Side::Input => self.input_active = active,
            Side::Output => self.output_active = active,
        }
    }

    /// Validate and apply a nominal sample rate.
    ///
    /// Returns `Ok(true)` when the rate changed. Rates outside the supported
    /// set fail with `UnsupportedFormat`; any change attempt while IO is
    /// running fails with `Busy`, even one that names the current rate.
    pub fn change_sample_rate(&mut self, rate: f64) -> Result<bool> {
        if !SUPPORTED_SAMPLE_RATES.contains(&rate) {
            tracing::warn!("Rejected sample rate {} Hz", rate);
            return Err(DriverError::UnsupportedFormat(format!(
                "sample rate {} Hz",
                rate
            )));
        }
        if self.io_running {
            tracing::warn!("Sample rate change to {} Hz rejected while IO is running", rate);
            return Err(DriverError::Busy);
        }
        if self.sample_rate == rate {
            return Ok(false);
        }
        tracing::debug!("Sample rate {} -> {} Hz", self.sample_rate, rate);
        self.sample_rate = rate;
        Ok(true)
    }

    pub fn add_client(&mut self, client_id: u32, pid: i32, bundle_id: Option<String>) -> Result<()> {
        if self.clients.contains_key(&client_id) {
            return Err(DriverError::IllegalOperation(format!(
                "client {} already registered",
                client_id
            )));
        }
        self.clients.insert(
            client_id,
            ClientEntry {
                pid,
                bundle_id,
                io_starts: 0,
            },
        );
        Ok(())
    }

    /// Unregister a client, handing back its entry
    pub fn remove_client(&mut self, client_id: u32) -> Result<ClientEntry> {
        self.clients.remove(&client_id).ok_or_else(|| {
            DriverError::IllegalOperation(format!("client {} is not registered", client_id))
        })
    }

    /// Per-client IO start count; unknown clients are not tracked
    pub fn note_io_start(&mut self, client_id: u32) {
        if let Some(entry) = self.clients.get_mut(&client_id) {
            entry.io_starts += 1;
        }
    }

    /// Record a StopIO, returning whether a tracked start was released.
    ///
    /// A registered client with no outstanding start is refused so it cannot
    /// stop IO that belongs to other clients.
    pub fn note_io_stop(&mut self, client_id: u32) -> Result<bool> {
        match self.clients.get_mut(&client_id) {
            Some(entry) if entry.io_starts == 0 => Err(DriverError::IllegalOperation(format!(
                "client {} stopped IO it never started",
                client_id
            ))),
            Some(entry) => {
                entry.io_starts -= 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Clients sorted by id
    pub fn clients(&self) -> Vec<(u32, ClientEntry)> {
        let mut clients: Vec<_> = self
            .clients
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();
        clients.sort_by_key(|(id, _)| *id);
        clients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DeviceState {
        DeviceState::new(&DriverConfig::default())
    }

    #[test]
    fn test_defaults() {
        let state = state();
        assert_eq!(state.sample_rate, 32_000.0);
        assert!(!state.io_running);
        assert!(state.box_acquired);
        assert!(state.stream_active(Side::Input));
        assert_eq!(state.controls(Side::Output).volume_db, 0.0);
    }

    #[test]
    fn test_volume_clamps() {
        let mut controls = ControlState::default();
        assert!(controls.set_volume_db(-200.0));
        assert_eq!(controls.volume_db, VOLUME_MIN_DB);
        assert_eq!(controls.volume_scalar(), 0.0);
        assert!(!controls.set_volume_db(-100.0));

        assert!(controls.set_volume_scalar(2.0));
        assert_eq!(controls.volume_db, VOLUME_MAX_DB);
        assert_eq!(controls.volume_scalar(), 1.0);
    }

    #[test]
    fn test_sample_rate_rules() {
        let mut state = state();
        assert!(!state.change_sample_rate(32_000.0).unwrap());
        assert!(matches!(
            state.change_sample_rate(48_000.0),
            Err(DriverError::UnsupportedFormat(_))
        ));
        assert!(state.change_sample_rate(44_100.0).unwrap());

        state.io_running = true;
        assert!(matches!(state.change_sample_rate(44_100.0), Err(DriverError::Busy)));
        assert!(matches!(state.change_sample_rate(32_000.0), Err(DriverError::Busy)));
        assert_eq!(state.sample_rate, 44_100.0);
    }

    #[test]
    fn test_client_table() {
        let mut state = state();
        state.add_client(7, 100, Some("com.example.app".into())).unwrap();
        assert!(state.add_client(7, 101, None).is_err());

        state.note_io_start(7);
        state.note_io_start(7);
        assert!(state.note_io_stop(7).unwrap());
        assert_eq!(state.clients()[0].1.io_starts, 1);

        let entry = state.remove_client(7).unwrap();
        assert_eq!(entry.pid, 100);
        assert_eq!(entry.io_starts, 1);
        assert!(state.remove_client(7).is_err());
        assert!(state.clients().is_empty());
    }

    #[test]
    fn test_stop_without_start_is_refused() {
        let mut state = state();
        state.add_client(1, 100, None).unwrap();
        state.add_client(2, 200, None).unwrap();
        state.note_io_start(1);

        assert!(matches!(
            state.note_io_stop(2),
            Err(DriverError::IllegalOperation(_))
        ));
        assert!(!state.note_io_stop(9).unwrap());
        assert_eq!(state.clients()[0].1.io_starts, 1);
        assert_eq!(state.clients()[1].1.io_starts, 0);
    }
}
