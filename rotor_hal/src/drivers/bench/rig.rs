use rotor_common::config::HardwareConfig;
use rotor_common::consts::ADC_MAX_COUNT;
use rotor_common::hal::transport::{PinLevel, Transport, TransportError};
use rotor_common::state::Axis;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Physical description of a bench rig.
#[derive(Debug, Clone)]
pub struct RigSpec {
    /// Azimuth end-stops as raw counts (ccw, cw).
    pub az_stops: (u16, u16),
    /// Elevation end-stops as raw counts (down, up).
    pub el_stops: (u16, u16),
    /// Azimuth counts travelled per sample while a relay is energised.
    pub az_counts_per_sample: u16,
    /// Elevation counts travelled per sample while a relay is energised.
    pub el_counts_per_sample: u16,
    /// Samples of an axis taken after its relay closes before it starts moving.
    pub motion_delay_samples: u32,
    /// Initial (az, el) counts.
    pub start: (u16, u16),
    /// Power-sense reading while the supply is on.
    pub power_level: u16,
    /// Relay pins: az cw, az ccw, el up, el down.
    pub pins: [u8; 4],
    /// ADC channels: az, el, power.
    pub channels: [u8; 3],
}

impl RigSpec {
    /// Default mechanics with the pins and channels of `config`.
    pub fn wired_as(config: &HardwareConfig) -> Self {
        Self {
            pins: config.relay_pins(),
            channels: [config.az_channel, config.el_channel, config.power_channel],
            ..Self::default()
        }
    }
}

impl Default for RigSpec {
    fn default() -> Self {
        let hw = HardwareConfig::default();
        Self {
            az_stops: (120, 1880),
            el_stops: (90, 1710),
            az_counts_per_sample: 40,
            el_counts_per_sample: 30,
            motion_delay_samples: 0,
            start: (1000, 600),
            power_level: 1600,
            pins: hw.relay_pins(),
            channels: [hw.az_channel, hw.el_channel, hw.power_channel],
        }
    }
}

#[derive(Debug)]
struct AxisRig {
    position: u16,
    stops: (u16, u16),
    rate: u16,
    positive: PinLevel,
    negative: PinLevel,
    engaged_samples: u32,
    jammed: bool,
}

impl AxisRig {
    fn new(position: u16, stops: (u16, u16), rate: u16) -> Self {
        Self {
            position: position.clamp(stops.0, stops.1),
            stops,
            rate,
            positive: PinLevel::Idle,
            negative: PinLevel::Idle,
            engaged_samples: 0,
            jammed: false,
        }
    }

    /// Direction of travel: +1, -1 or 0 when idle or both relays are closed.
    fn drive(&self) -> i8 {
        match (self.positive, self.negative) {
            (PinLevel::Active, PinLevel::Idle) => 1,
            (PinLevel::Idle, PinLevel::Active) => -1,
            _ => 0,
        }
    }

    fn set_relay(&mut self, positive: bool, level: PinLevel) {
        let before = self.drive();
        if positive {
            self.positive = level;
        } else {
            self.negative = level;
        }
        if self.drive() != before {
            self.engaged_samples = 0;
        }
    }

    /// Advance one sample and return the reading.
    fn sample(&mut self, delay: u32) -> u16 {
        let drive = self.drive();
        if drive != 0 && !self.jammed {
            if self.engaged_samples >= delay {
                self.position = if drive > 0 {
                    self.position.saturating_add(self.rate).min(self.stops.1)
                } else {
                    self.position.saturating_sub(self.rate).max(self.stops.0)
                };
            }
            self.engaged_samples = self.engaged_samples.saturating_add(1);
        }
        self.position
    }
}

#[derive(Debug)]
struct RigState {
    spec: RigSpec,
    az: AxisRig,
    el: AxisRig,
    powered: bool,
    initialized: bool,
    read_fault: bool,
    write_fault: bool,
    relay_writes: u64,
}

impl RigState {
    fn axis_mut(&mut self, axis: Axis) -> &mut AxisRig {
        match axis {
            Axis::Azimuth => &mut self.az,
            Axis::Elevation => &mut self.el,
        }
    }
}

/// Shared view into a running [`BenchRig`].
#[derive(Debug, Clone)]
pub struct BenchHandle {
    state: Arc<Mutex<RigState>>,
}

impl BenchHandle {
    fn lock(&self) -> MutexGuard<'_, RigState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current (az, el) counts.
    pub fn position(&self) -> (u16, u16) {
        let rig = self.lock();
        (rig.az.position, rig.el.position)
    }

    /// Move the mount by hand, clamped to its end-stops.
    pub fn set_position(&self, az: u16, el: u16) {
        let mut rig = self.lock();
        rig.az.position = az.clamp(rig.az.stops.0, rig.az.stops.1);
        rig.el.position = el.clamp(rig.el.stops.0, rig.el.stops.1);
    }

    /// Switch the controller supply on or off.
    pub fn set_powered(&self, powered: bool) {
        self.lock().powered = powered;
    }

    /// Seize an axis so it no longer moves under drive.
    pub fn jam(&self, axis: Axis, jammed: bool) {
        self.lock().axis_mut(axis).jammed = jammed;
    }

    /// Make every ADC read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.lock().read_fault = fail;
    }

    /// Make every relay write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().write_fault = fail;
    }

    /// Level of a relay pin, `None` for pins the rig doesn't know.
    pub fn relay(&self, pin: u8) -> Option<PinLevel> {
        let rig = self.lock();
        let [az_cw, az_ccw, el_up, el_down] = rig.spec.pins;
        match pin {
            p if p == az_cw => Some(rig.az.positive),
            p if p == az_ccw => Some(rig.az.negative),
            p if p == el_up => Some(rig.el.positive),
            p if p == el_down => Some(rig.el.negative),
            _ => None,
        }
    }

    /// Relay drive of an axis: +1, -1 or 0.
    pub fn drive(&self, axis: Axis) -> i8 {
        self.lock().axis_mut(axis).drive()
    }

    /// Whether any relay is energised.
    pub fn any_relay_active(&self) -> bool {
        let rig = self.lock();
        [rig.az.positive, rig.az.negative, rig.el.positive, rig.el.negative]
            .contains(&PinLevel::Active)
    }

    /// Successful relay writes since creation.
    pub fn relay_writes(&self) -> u64 {
        self.lock().relay_writes
    }

    /// Whether `init` has run.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }
}

/// Simulated rotator mount behind the controller.
#[derive(Debug)]
pub struct BenchRig {
    handle: BenchHandle,
}

impl BenchRig {
    /// Build a rig from its physical description.
    pub fn new(spec: RigSpec) -> Self {
        let az = AxisRig::new(spec.start.0, spec.az_stops, spec.az_counts_per_sample);
        let el = AxisRig::new(spec.start.1, spec.el_stops, spec.el_counts_per_sample);
        let state = RigState {
            spec,
            az,
            el,
            powered: true,
            initialized: false,
            read_fault: false,
            write_fault: false,
            relay_writes: 0,
        };
        Self {
            handle: BenchHandle {
                state: Arc::new(Mutex::new(state)),
            },
        }
    }

    /// Handle for observing and disturbing the rig from outside the loop.
    pub fn handle(&self) -> BenchHandle {
        self.handle.clone()
    }
}

impl Default for BenchRig {
    fn default() -> Self {
        Self::new(RigSpec::default())
    }
}

impl Transport for BenchRig {
    fn name(&self) -> &'static str {
        "bench"
    }

    fn init(&mut self, outputs: &[u8]) -> Result<(), TransportError> {
        let mut rig = self.handle.lock();
        if let Some(pin) = outputs.iter().find(|p| !rig.spec.pins.contains(p)) {
            return Err(TransportError::InitFailed(format!("pin {pin} is not wired on the rig")));
        }
        rig.initialized = true;
        debug!(az = rig.az.position, el = rig.el.position, "Bench rig initialized");
        Ok(())
    }

    fn set_output_pin(&mut self, pin: u8, level: PinLevel) -> Result<(), TransportError> {
        let mut rig = self.handle.lock();
        if !rig.initialized {
            return Err(TransportError::Gpio("rig not initialized".to_string()));
        }
        if rig.write_fault {
            return Err(TransportError::Gpio(format!("injected fault on pin {pin}")));
        }
        let [az_cw, az_ccw, el_up, el_down] = rig.spec.pins;
        match pin {
            p if p == az_cw => rig.az.set_relay(true, level),
            p if p == az_ccw => rig.az.set_relay(false, level),
            p if p == el_up => rig.el.set_relay(true, level),
            p if p == el_down => rig.el.set_relay(false, level),
            _ => return Err(TransportError::Gpio(format!("pin {pin} is not wired"))),
        }
        rig.relay_writes += 1;
        Ok(())
    }

    fn read_adc_channel(&mut self, channel: u8) -> Result<u16, TransportError> {
        let mut rig = self.handle.lock();
        if !rig.initialized {
            return Err(TransportError::I2c("rig not initialized".to_string()));
        }
        if rig.read_fault {
            return Err(TransportError::I2c(format!("injected fault on channel {channel}")));
        }
        if channel > 3 {
            return Err(TransportError::BadChannel(channel));
        }
        let [az, el, power] = rig.spec.channels;
        let delay = rig.spec.motion_delay_samples;
        let value = match channel {
            c if c == power => {
                if rig.powered {
                    rig.spec.power_level
                } else {
                    0
                }
            }
            c if c == az => rig.az.sample(delay),
            c if c == el => rig.el.sample(delay),
            _ => 0,
        };
        trace!(channel, value, "Bench ADC sample");
        Ok(value.min(ADC_MAX_COUNT))
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        let mut guard = self.handle.lock();
        let rig = &mut *guard;
        for axis in [&mut rig.az, &mut rig.el] {
            axis.set_relay(true, PinLevel::Idle);
            axis.set_relay(false, PinLevel::Idle);
        }
        rig.initialized = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_rig(spec: RigSpec) -> (BenchRig, BenchHandle) {
        let mut rig = BenchRig::new(spec.clone());
        rig.init(&spec.pins).unwrap();
        let handle = rig.handle();
        (rig, handle)
    }

    #[test]
    fn test_io_before_init_fails() {
        let mut rig = BenchRig::default();
        assert!(rig.read_adc_channel(0).is_err());
        assert!(rig.set_output_pin(25, PinLevel::Active).is_err());
    }

    #[test]
    fn test_init_rejects_unknown_pin() {
        let mut rig = BenchRig::default();
        assert!(matches!(rig.init(&[25, 99]), Err(TransportError::InitFailed(_))));
    }

    #[test]
    fn test_axis_moves_only_when_sampled() {
        let spec = RigSpec::default();
        let (mut rig, handle) = ready_rig(spec.clone());
        rig.set_output_pin(spec.pins[0], PinLevel::Active).unwrap();
        assert_eq!(handle.position().0, 1000);

        assert_eq!(rig.read_adc_channel(spec.channels[0]).unwrap(), 1040);
        assert_eq!(rig.read_adc_channel(spec.channels[0]).unwrap(), 1080);
        // Elevation untouched by azimuth drive.
        assert_eq!(rig.read_adc_channel(spec.channels[1]).unwrap(), 600);
    }

    #[test]
    fn test_end_stop_clamps() {
        let spec = RigSpec {
            start: (150, 600),
            ..RigSpec::default()
        };
        let (mut rig, _handle) = ready_rig(spec.clone());
        rig.set_output_pin(spec.pins[1], PinLevel::Active).unwrap();
        assert_eq!(rig.read_adc_channel(spec.channels[0]).unwrap(), 120);
        assert_eq!(rig.read_adc_channel(spec.channels[0]).unwrap(), 120);
    }

    #[test]
    fn test_both_relays_closed_holds_position() {
        let spec = RigSpec::default();
        let (mut rig, handle) = ready_rig(spec.clone());
        rig.set_output_pin(spec.pins[2], PinLevel::Active).unwrap();
        rig.set_output_pin(spec.pins[3], PinLevel::Active).unwrap();
        assert_eq!(handle.drive(Axis::Elevation), 0);
        assert_eq!(rig.read_adc_channel(spec.channels[1]).unwrap(), 600);
    }

    #[test]
    fn test_motion_delay() {
        let spec = RigSpec {
            motion_delay_samples: 2,
            ..RigSpec::default()
        };
        let (mut rig, _handle) = ready_rig(spec.clone());
        rig.set_output_pin(spec.pins[0], PinLevel::Active).unwrap();
        let az = spec.channels[0];
        assert_eq!(rig.read_adc_channel(az).unwrap(), 1000);
        assert_eq!(rig.read_adc_channel(az).unwrap(), 1000);
        assert_eq!(rig.read_adc_channel(az).unwrap(), 1040);
    }

    #[test]
    fn test_power_and_faults() {
        let spec = RigSpec::default();
        let (mut rig, handle) = ready_rig(spec.clone());
        let power = spec.channels[2];
        assert_eq!(rig.read_adc_channel(power).unwrap(), 1600);

        handle.set_powered(false);
        assert_eq!(rig.read_adc_channel(power).unwrap(), 0);

        handle.fail_reads(true);
        assert!(rig.read_adc_channel(power).is_err());
        handle.fail_reads(false);

        handle.fail_writes(true);
        assert!(rig.set_output_pin(spec.pins[0], PinLevel::Active).is_err());
        assert!(!handle.any_relay_active());
    }

    #[test]
    fn test_jammed_axis_does_not_move() {
        let spec = RigSpec::default();
        let (mut rig, handle) = ready_rig(spec.clone());
        handle.jam(Axis::Azimuth, true);
        rig.set_output_pin(spec.pins[0], PinLevel::Active).unwrap();
        assert_eq!(rig.read_adc_channel(spec.channels[0]).unwrap(), 1000);
        assert_eq!(handle.relay(spec.pins[0]), Some(PinLevel::Active));
    }

    #[test]
    fn test_shutdown_releases_relays() {
        let spec = RigSpec::default();
        let (mut rig, handle) = ready_rig(spec.clone());
        rig.set_output_pin(spec.pins[0], PinLevel::Active).unwrap();
        rig.set_output_pin(spec.pins[3], PinLevel::Active).unwrap();
        assert_eq!(handle.drive(Axis::Elevation), -1);
        rig.shutdown().unwrap();
        assert_eq!(handle.drive(Axis::Azimuth), 0);
        assert_eq!(handle.drive(Axis::Elevation), 0);
        assert!(!handle.any_relay_active());
        assert!(!handle.is_initialized());
    }
}
