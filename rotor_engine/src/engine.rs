//! Engine API.
//!
//! Synchronous, non-blocking entry points for front ends. Nothing here
//! touches hardware: requests are written into [`SharedState`] and the
//! control loop acts on them within one poll period.
//!
//! Hardware faults are sticky. `get_position` keeps reporting a fault for
//! as long as it persists; the next motion request (`set_position`,
//! `move_direction`, `park`) reports it once more and clears it, so the
//! call after that proceeds normally.

use crate::calibration::CalibrationStore;
use crate::control_loop::{ControlLoop, ControlLoopHandle, CycleStats};
use crate::converter::Converter;
use crate::shared::{SharedState, Snapshot};
use rotor_common::config::RotatorConfig;
use rotor_common::consts::{AZ_MOUNT_MAX, AZ_MOUNT_MIN, AZ_PARK, EL_MOUNT_MIN, EL_PARK, ROTATOR_INFO};
use rotor_common::error::RotatorError;
use rotor_common::hal::transport::Transport;
use rotor_common::state::{Axis, ControlState, Direction, SimulationMode};
use rotor_common::status::RotatorStatus;
use rotor_hal::TransportRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Reachable degree ranges under the current simulation level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capabilities {
    /// Minimum azimuth [deg].
    pub min_az: f64,
    /// Maximum azimuth [deg].
    pub max_az: f64,
    /// Minimum elevation [deg].
    pub min_el: f64,
    /// Maximum elevation [deg].
    pub max_el: f64,
}

/// Rotator control engine.
#[derive(Debug)]
pub struct Engine {
    shared: Arc<SharedState>,
    store: CalibrationStore,
    control: Option<ControlLoopHandle>,
}

impl Engine {
    /// Prepare the transport named in the configuration and start the control loop.
    ///
    /// # Errors
    /// `TransportInit` if the transport is unknown or fails to initialize,
    /// `Internal` if the loop thread cannot start.
    pub fn initialize(config: &RotatorConfig, registry: &TransportRegistry) -> Result<Self, RotatorError> {
        let transport = registry
            .create(&config.hardware.transport, &config.hardware)
            .map_err(|e| RotatorError::TransportInit(e.to_string()))?;
        Self::start(config, transport)
    }

    /// Start over an explicit transport.
    pub fn start(config: &RotatorConfig, transport: Box<dyn Transport>) -> Result<Self, RotatorError> {
        let (mut engine, control) = Self::with_manual_loop(config, transport)?;
        engine.control = Some(control.spawn()?);
        Ok(engine)
    }

    /// Build the engine and its control loop without starting a thread.
    ///
    /// The caller steps the loop with [`ControlLoop::cycle`] or runs it with
    /// [`ControlLoop::run`].
    pub fn with_manual_loop(
        config: &RotatorConfig,
        mut transport: Box<dyn Transport>,
    ) -> Result<(Self, ControlLoop), RotatorError> {
        config
            .validate()
            .map_err(|e| RotatorError::InvalidArgument(e.to_string()))?;

        let has_hardware = transport.has_hardware();
        if has_hardware {
            transport
                .init(&config.hardware.relay_pins())
                .map_err(|e| RotatorError::TransportInit(e.to_string()))?;
        }
        let mode = match config.engine.simulator {
            Some(level) => SimulationMode::try_from(level)?,
            None if has_hardware => SimulationMode::Off,
            None => SimulationMode::NO_HARDWARE_DEFAULT,
        };
        if !has_hardware {
            info!(transport = transport.name(), simulation = %mode, "No rotator hardware detected");
        }

        let shared = Arc::new(SharedState::new(mode));
        let store = CalibrationStore::from_config(&config.engine);
        let control = ControlLoop::new(Arc::clone(&shared), transport, store.clone(), config);
        info!(
            simulation = %mode,
            calibration = ?store.path(),
            "Rotator engine initialized"
        );

        Ok((
            Self {
                shared,
                store,
                control: None,
            },
            control,
        ))
    }

    // ─── Motion ─────────────────────────────────────────────────────

    /// Seek both axes to `(az, el)` degrees.
    ///
    /// Readiness is checked before the arguments, so a bad target still
    /// reports and clears a pending fault or starts a calibration sweep.
    /// In azimuth-only simulation any elevation is accepted and pinned at 0.
    pub fn set_position(&self, az: f64, el: f64) -> Result<(), RotatorError> {
        self.calibration_ready(true)?;
        let mode = self.shared.simulation_mode();
        if !(AZ_MOUNT_MIN..=AZ_MOUNT_MAX).contains(&az) {
            return Err(RotatorError::InvalidArgument(format!(
                "azimuth {az} not in {AZ_MOUNT_MIN}..={AZ_MOUNT_MAX}"
            )));
        }
        let el = if mode == SimulationMode::AzimuthOnly {
            EL_MOUNT_MIN
        } else {
            let ceiling = mode.elevation_ceiling();
            if !(EL_MOUNT_MIN..=ceiling).contains(&el) {
                return Err(RotatorError::InvalidArgument(format!(
                    "elevation {el} not in {EL_MOUNT_MIN}..={ceiling}"
                )));
            }
            el
        };

        let converter = self.calibrated_converter()?;
        debug!(az, el, "Set position");
        self.seek([
            converter.to_raw(Axis::Azimuth, az),
            converter.to_raw(Axis::Elevation, el),
        ])
    }

    /// Drive one axis toward its calibrated extreme.
    pub fn move_direction(&self, direction: Direction) -> Result<(), RotatorError> {
        self.calibration_ready(true)?;
        self.move_ready(direction)
    }

    /// [`move_direction`](Self::move_direction) from a rotator-protocol direction code.
    pub fn move_code(&self, code: i32) -> Result<(), RotatorError> {
        self.calibration_ready(true)?;
        self.move_ready(Direction::try_from(code)?)
    }

    fn move_ready(&self, direction: Direction) -> Result<(), RotatorError> {
        let bounds = self.shared.bounds().ok_or(RotatorError::Calibrating)?;
        let axis = direction.axis();
        let target = if direction.is_positive() {
            bounds.max(axis)
        } else {
            bounds.min(axis)
        };
        debug!(?direction, target, "Move");
        self.shared.set_target(axis, target);
        self.request_seek()
    }

    /// Seek the park position.
    pub fn park(&self) -> Result<(), RotatorError> {
        self.calibration_ready(true)?;
        let converter = self.calibrated_converter()?;
        debug!("Park");
        self.seek([
            converter.to_raw(Axis::Azimuth, AZ_PARK),
            converter.to_raw(Axis::Elevation, EL_PARK),
        ])
    }

    /// Request `Stopped` from any state. Relays idle within one poll period.
    pub fn stop(&self) {
        debug!("Stop");
        self.shared.request_stop();
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Current `(az, el)` in degrees.
    pub fn get_position(&self) -> Result<(f64, f64), RotatorError> {
        self.pending_fault()?;
        self.calibration_ready(false)?;
        let converter = self.calibrated_converter()?;
        Ok((
            converter.to_degrees(Axis::Azimuth, self.shared.reading(Axis::Azimuth)),
            converter.to_degrees(Axis::Elevation, self.shared.reading(Axis::Elevation)),
        ))
    }

    /// Commanded `(az, el)` target in degrees.
    pub fn get_target(&self) -> Result<(f64, f64), RotatorError> {
        self.pending_fault()?;
        self.calibration_ready(false)?;
        let converter = self.calibrated_converter()?;
        Ok((
            converter.to_degrees(Axis::Azimuth, self.shared.target(Axis::Azimuth)),
            converter.to_degrees(Axis::Elevation, self.shared.target(Axis::Elevation)),
        ))
    }

    /// Fixed description of the rotator.
    pub fn get_info(&self) -> &'static str {
        ROTATOR_INFO
    }

    /// Status flags published by the last control cycle.
    pub fn status(&self) -> RotatorStatus {
        self.shared.status()
    }

    /// Degree ranges, elevation following the simulation level.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            min_az: AZ_MOUNT_MIN,
            max_az: AZ_MOUNT_MAX,
            min_el: EL_MOUNT_MIN,
            max_el: self.shared.simulation_mode().elevation_ceiling(),
        }
    }

    /// Current control state.
    pub fn control_state(&self) -> ControlState {
        self.shared.control_state()
    }

    /// Copy of the whole shared state.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.snapshot()
    }

    // ─── Configuration ──────────────────────────────────────────────

    /// Switch simulation level (0..=3).
    ///
    /// Stops the rotator, clears targets and reseeds the calibration:
    /// synthetic bounds for simulated levels, a fresh load from the store
    /// for level 0.
    pub fn set_simulation_mode(&self, level: u8) -> Result<(), RotatorError> {
        let mode = SimulationMode::try_from(level)?;
        self.shared.set_simulation_mode(mode);
        info!(simulation = %mode, "Simulation level set");
        Ok(())
    }

    /// Active simulation level.
    pub fn get_simulation_mode(&self) -> SimulationMode {
        self.shared.simulation_mode()
    }

    /// Stop the control loop thread, if this engine started one.
    pub fn shutdown(mut self) -> Option<CycleStats> {
        let stats = self.control.take()?.stop();
        info!("Rotator engine shut down");
        stats
    }

    // ─── Internals ──────────────────────────────────────────────────

    /// Report a sticky fault without clearing it.
    fn pending_fault(&self) -> Result<(), RotatorError> {
        match self.shared.control_state().fault() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Gate shared by every operation that needs calibration.
    ///
    /// A pending fault is reported; motion requests (`clears_fault`) also
    /// reset the state to `Stopped`. Otherwise the bounds must be valid or
    /// loadable from the store, failing which a sweep is requested.
    fn calibration_ready(&self, clears_fault: bool) -> Result<(), RotatorError> {
        if let Some(fault) = self.shared.control_state().fault() {
            if clears_fault {
                info!(%fault, "Clearing reported fault");
                self.shared.request_stop();
            }
            return Err(fault);
        }

        if self.shared.bounds().is_some() {
            return Ok(());
        }
        if !self.shared.simulation_mode().is_simulated() {
            match self.store.load() {
                Ok(bounds) => {
                    info!(%bounds, "Calibration restored from store");
                    self.shared.publish_bounds(bounds);
                    return Ok(());
                }
                Err(e) => debug!(error = %e, "No usable stored calibration"),
            }
        }

        let found = self.shared.request_calibration();
        if found.accepts_motion_request() {
            info!("Calibration sweep requested");
        }
        Err(RotatorError::Calibrating)
    }

    fn calibrated_converter(&self) -> Result<Converter, RotatorError> {
        let bounds = self.shared.bounds().ok_or(RotatorError::Calibrating)?;
        Ok(Converter::new(Some(bounds), self.shared.simulation_mode()))
    }

    fn seek(&self, targets: [u16; 2]) -> Result<(), RotatorError> {
        for (axis, target) in Axis::ALL.into_iter().zip(targets) {
            self.shared.set_target(axis, target);
        }
        self.request_seek()
    }

    fn request_seek(&self) -> Result<(), RotatorError> {
        self.shared
            .request_seek()
            .map_err(|found| found.fault().unwrap_or(RotatorError::Calibrating))
    }
}
