use std::{collections::HashMap, fmt};

use bitflags::bitflags;
use flexdc::{HomeMacroType, MacroResult, MotionEndReason};

bitflags!(
    /// Host-visible status bits of one axis.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AxisStatus: u16 {
        const DONE = 0b0000_0000_0001;
        const MOVING = 0b0000_0000_0010;
        const HOME = 0b0000_0000_0100;
        const HOMED = 0b0000_0000_1000;
        const LOW_LIMIT = 0b0000_0001_0000;
        const HIGH_LIMIT = 0b0000_0010_0000;
        const PROBLEM = 0b0000_0100_0000;
        const POWER_ON = 0b0000_1000_0000;
        const HAS_ENCODER = 0b0001_0000_0000;
        const CLOSED_LOOP = 0b0010_0000_0000;
    }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerParam {
    Done,
    Moving,
    Home,
    Homed,
    LowLimit,
    HighLimit,
    Problem,
    PowerOn,
    HasEncoder,
    ClosedLoop,
    HomeForwardMacro,
    HomeReverseMacro,
    HomingStatus,
    ResetController,
}

impl IntegerParam {
    pub const STATUS: [IntegerParam; 10] = [
        IntegerParam::Done,
        IntegerParam::Moving,
        IntegerParam::Home,
        IntegerParam::Homed,
        IntegerParam::LowLimit,
        IntegerParam::HighLimit,
        IntegerParam::Problem,
        IntegerParam::PowerOn,
        IntegerParam::HasEncoder,
        IntegerParam::ClosedLoop,
    ];

    fn status_bit(self) -> Option<AxisStatus> {
        match self {
            IntegerParam::Done => Some(AxisStatus::DONE),
            IntegerParam::Moving => Some(AxisStatus::MOVING),
            IntegerParam::Home => Some(AxisStatus::HOME),
            IntegerParam::Homed => Some(AxisStatus::HOMED),
            IntegerParam::LowLimit => Some(AxisStatus::LOW_LIMIT),
            IntegerParam::HighLimit => Some(AxisStatus::HIGH_LIMIT),
            IntegerParam::Problem => Some(AxisStatus::PROBLEM),
            IntegerParam::PowerOn => Some(AxisStatus::POWER_ON),
            IntegerParam::HasEncoder => Some(AxisStatus::HAS_ENCODER),
            IntegerParam::ClosedLoop => Some(AxisStatus::CLOSED_LOOP),
            IntegerParam::HomeForwardMacro
            | IntegerParam::HomeReverseMacro
            | IntegerParam::HomingStatus
            | IntegerParam::ResetController => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoubleParam {
    Position,
    EncoderPosition,
    /// User units per device tick.
    MotorResolution,
    /// User units.
    RetryDeadband,
}

/// Per-axis parameter storage the state machine reads and publishes to.
pub trait ParamStore: Send {
    fn get_integer(&self, param: IntegerParam) -> i32;
    fn set_integer(&mut self, param: IntegerParam, value: i32);

    fn get_double(&self, param: DoubleParam) -> f64;
    fn set_double(&mut self, param: DoubleParam, value: f64);

    /// Publishes everything set since the previous call.
    fn notify_changed(&mut self);

    fn get_flag(&self, param: IntegerParam) -> bool {
        self.get_integer(param) != 0
    }

    fn set_flag(&mut self, param: IntegerParam, on: bool) {
        self.set_integer(param, i32::from(on));
    }

    fn status(&self) -> AxisStatus {
        IntegerParam::STATUS
            .into_iter()
            .filter(|param| self.get_flag(*param))
            .filter_map(IntegerParam::status_bit)
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    status: AxisStatus,
    integers: HashMap<IntegerParam, i32>,
    doubles: HashMap<DoubleParam, f64>,
    dirty: bool,
    revision: u64,
}

impl ParamTable {
    pub fn new(
        motor_resolution: f64,
        retry_deadband: f64,
        home_forward: HomeMacroType,
        home_reverse: HomeMacroType,
    ) -> Self {
        let mut table = Self::default();
        table.set_double(DoubleParam::MotorResolution, motor_resolution);
        table.set_double(DoubleParam::RetryDeadband, retry_deadband);
        table.set_integer(IntegerParam::HomeForwardMacro, home_forward.code());
        table.set_integer(IntegerParam::HomeReverseMacro, home_reverse.code());
        table
    }

    /// Number of times a change set has been published.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl ParamStore for ParamTable {
    fn get_integer(&self, param: IntegerParam) -> i32 {
        match param.status_bit() {
            Some(bit) => i32::from(self.status.contains(bit)),
            None => self.integers.get(&param).copied().unwrap_or_default(),
        }
    }

    fn set_integer(&mut self, param: IntegerParam, value: i32) {
        let changed = match param.status_bit() {
            Some(bit) => {
                let was_set = self.status.contains(bit);
                self.status.set(bit, value != 0);
                was_set != (value != 0)
            }
            None => self.integers.insert(param, value) != Some(value),
        };
        self.dirty |= changed;
    }

    fn get_double(&self, param: DoubleParam) -> f64 {
        self.doubles.get(&param).copied().unwrap_or_default()
    }

    fn set_double(&mut self, param: DoubleParam, value: f64) {
        if self.doubles.insert(param, value) != Some(value) {
            self.dirty = true;
        }
    }

    fn notify_changed(&mut self) {
        if self.dirty {
            self.dirty = false;
            self.revision += 1;
        }
    }

    fn status(&self) -> AxisStatus {
        self.status
    }
}

/// Point-in-time view of one axis, handed out to callers outside the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSnapshot {
    pub name: String,
    pub status: AxisStatus,
    pub position: f64,
    pub encoder_position: f64,
    pub position_error: i64,
    pub motion_status: i32,
    pub motor_fault: i32,
    pub end_reason: MotionEndReason,
    pub macro_result: MacroResult,
}

impl fmt::Display for AxisSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: position={} error={} done={} moving={} power={} homed={} limits={}/{} problem={} end={} macro={}",
            self.name,
            self.position,
            self.position_error,
            u8::from(self.status.contains(AxisStatus::DONE)),
            u8::from(self.status.contains(AxisStatus::MOVING)),
            u8::from(self.status.contains(AxisStatus::POWER_ON)),
            u8::from(self.status.contains(AxisStatus::HOMED)),
            u8::from(self.status.contains(AxisStatus::LOW_LIMIT)),
            u8::from(self.status.contains(AxisStatus::HIGH_LIMIT)),
            u8::from(self.status.contains(AxisStatus::PROBLEM)),
            self.end_reason,
            self.macro_result,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_round_trip_through_integers() {
        let mut table = ParamTable::default();
        table.set_flag(IntegerParam::LowLimit, true);
        table.set_integer(IntegerParam::PowerOn, 5);

        assert!(table.get_flag(IntegerParam::LowLimit));
        assert_eq!(table.get_integer(IntegerParam::PowerOn), 1);
        assert_eq!(
            table.status(),
            AxisStatus::LOW_LIMIT | AxisStatus::POWER_ON
        );

        table.set_flag(IntegerParam::LowLimit, false);
        assert_eq!(table.status(), AxisStatus::POWER_ON);
    }

    #[test]
    fn configuration_values_are_stored() {
        let table = ParamTable::new(0.001, 0.01, HomeMacroType::HomeLs, HomeMacroType::Disabled);

        assert_eq!(table.get_double(DoubleParam::MotorResolution), 0.001);
        assert_eq!(table.get_double(DoubleParam::RetryDeadband), 0.01);
        assert_eq!(table.get_integer(IntegerParam::HomeForwardMacro), 1);
        assert_eq!(table.get_integer(IntegerParam::HomeReverseMacro), 0);
    }

    #[test]
    fn notify_publishes_only_real_changes() {
        let mut table = ParamTable::default();
        table.notify_changed();
        assert_eq!(table.revision(), 0);

        table.set_double(DoubleParam::Position, 12.0);
        table.notify_changed();
        assert_eq!(table.revision(), 1);

        table.set_double(DoubleParam::Position, 12.0);
        table.set_flag(IntegerParam::Done, false);
        table.notify_changed();
        assert_eq!(table.revision(), 1);
    }
}
