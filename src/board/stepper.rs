//! Stepper motor configuration and moves.
//!
//! A move completes when the firmware replies with the device number. Only
//! one move per device may be outstanding; a second one is rejected with
//! [`ProtocolError::StepperBusy`] until the first completes.

use super::Board;
use crate::error::{FirmataResult, ProtocolError};
use crate::protocol::STEPPER;
use std::collections::HashMap;
use tracing::{debug, warn};

const CONFIG: u8 = 0;
const STEP: u8 = 1;

/// Step counts travel as three 7-bit groups.
pub const MAX_STEPS: u32 = 0x1F_FFFF;

type CompletionHandler = Box<dyn FnOnce(bool) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperType {
    /// Step and direction pins.
    Driver { step_pin: u8, direction_pin: u8 },
    TwoWire { motor_pin1: u8, motor_pin2: u8 },
    FourWire { motor_pins: [u8; 4] },
}

impl StepperType {
    fn code(&self) -> u8 {
        match self {
            StepperType::Driver { .. } => 1,
            StepperType::TwoWire { .. } => 2,
            StepperType::FourWire { .. } => 4,
        }
    }

    fn pins(&self) -> Vec<u8> {
        match *self {
            StepperType::Driver {
                step_pin,
                direction_pin,
            } => vec![step_pin, direction_pin],
            StepperType::TwoWire {
                motor_pin1,
                motor_pin2,
            } => vec![motor_pin1, motor_pin2],
            StepperType::FourWire { motor_pins } => motor_pins.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepDirection {
    Ccw = 0,
    Cw = 1,
}

/// One move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperMove {
    pub direction: StepDirection,
    /// Up to 21 bits.
    pub steps: u32,
    /// In 0.01 rad/s.
    pub speed: u16,
    pub acceleration: u16,
    pub deceleration: u16,
}

impl StepperMove {
    pub fn new(direction: StepDirection, steps: u32, speed: u16) -> Self {
        Self {
            direction,
            steps,
            speed,
            acceleration: 0,
            deceleration: 0,
        }
    }

    pub fn with_ramp(mut self, acceleration: u16, deceleration: u16) -> Self {
        self.acceleration = acceleration;
        self.deceleration = deceleration;
        self
    }
}

#[derive(Default)]
pub(crate) struct StepperState {
    pending: HashMap<u8, CompletionHandler>,
}

fn pair(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

impl Board {
    pub fn stepper_config(
        &mut self,
        device: u8,
        kind: StepperType,
        steps_per_rev: u16,
    ) -> FirmataResult<()> {
        let mut body = vec![STEPPER, CONFIG, device, kind.code()];
        body.extend(pair(steps_per_rev));
        body.extend(kind.pins());
        self.write_sysex(&body)
    }

    /// Start a move. `handler` runs with `true` when the firmware reports completion.
    pub fn stepper_step<F>(&mut self, device: u8, motion: StepperMove, handler: F) -> FirmataResult<()>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if self.stepper.pending.contains_key(&device) {
            return Err(ProtocolError::StepperBusy(device).into());
        }

        let steps = motion.steps;
        if steps > MAX_STEPS {
            return Err(ProtocolError::StepperStepsOutOfRange(steps).into());
        }
        let mut body = vec![
            STEPPER,
            STEP,
            device,
            motion.direction as u8,
            (steps & 0x7F) as u8,
            ((steps >> 7) & 0x7F) as u8,
            ((steps >> 14) & 0x7F) as u8,
        ];
        body.extend(pair(motion.speed));
        if motion.acceleration > 0 || motion.deceleration > 0 {
            body.extend(pair(motion.acceleration));
            body.extend(pair(motion.deceleration));
        }
        self.write_sysex(&body)?;

        debug!(device, steps, "stepper move");
        self.stepper.pending.insert(device, Box::new(handler));
        Ok(())
    }

    pub fn stepper_busy(&self, device: u8) -> bool {
        self.stepper.pending.contains_key(&device)
    }
}

/// Reply body: the device whose move completed.
pub(crate) fn handle_reply(board: &mut Board, body: &[u8]) {
    let Some(&device) = body.first() else {
        return;
    };
    match board.stepper.pending.remove(&device) {
        Some(handler) => handler(true),
        None => warn!(device, "stepper completion with no pending move"),
    }
}
