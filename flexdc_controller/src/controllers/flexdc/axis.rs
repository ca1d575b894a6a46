use std::{io, thread, time::Duration};

use flexdc::{
    Axis, CommandError, HomeMacroType, MacroResult, MotionEndReason, Query,
    build_generic_get_command, build_halt_macro_command, build_home_macro_command,
    build_motor_power_command, build_move_command, build_set_position_command,
    build_stop_command, reply,
};
use tracing::{error, info, warn};

use super::{
    params::{AxisSnapshot, DoubleParam, IntegerParam, ParamStore, ParamTable},
    transport::Transport,
};

/// Pause after a halt or stop so the device finishes acknowledging it
/// before the next motion command arrives.
pub const SETTLE_TIME: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum AxisError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Transport failure: {0}")]
    Io(#[from] io::Error),

    #[error("{0} homing is disabled")]
    HomingDisabled(&'static str),

    #[error("Axis is moving or homing")]
    MotionInProgress,
}

impl AxisError {
    /// Invalid requests. They never reach the device and leave the problem
    /// flag alone.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AxisError::Command(_) | AxisError::HomingDisabled(_))
    }
}

impl From<AxisError> for io::Error {
    fn from(value: AxisError) -> Self {
        match value {
            AxisError::Io(e) => e,
            rejected => io::Error::new(io::ErrorKind::InvalidInput, rejected.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatus {
    pub moving: bool,
    /// Queries that did not get a reply this cycle.
    pub failed: Vec<Query>,
}

pub struct FlexDcAxis<P: ParamStore = ParamTable> {
    axis: Axis,
    name: String,
    params: P,
    buffer: String,
    settle_time: Duration,

    motion_status: i32,
    motor_fault: i32,
    end_motion_reason: MotionEndReason,
    macro_result: MacroResult,
    position_error: i64,
    position_readback: i64,
    is_motor_on: bool,
}

impl<P: ParamStore> FlexDcAxis<P> {
    pub fn new(axis: Axis, name: impl Into<String>, mut params: P) -> Self {
        params.set_flag(IntegerParam::Homed, false);
        params.set_flag(IntegerParam::HasEncoder, true);
        params.set_flag(IntegerParam::ClosedLoop, true);
        params.set_flag(IntegerParam::Problem, false);
        params.notify_changed();

        Self {
            axis,
            name: name.into(),
            params,
            buffer: String::with_capacity(64),
            settle_time: SETTLE_TIME,
            motion_status: 0,
            motor_fault: 0,
            end_motion_reason: MotionEndReason::MotorOff,
            macro_result: MacroResult::FailNoIndexFound,
            position_error: 0,
            position_readback: 0,
            is_motor_on: false,
        }
    }

    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut P {
        &mut self.params
    }

    pub fn is_homing(&self) -> bool {
        self.macro_result.is_executing()
    }

    pub fn is_moving(&self) -> bool {
        self.motion_status != 0
    }

    pub fn move_to(
        &mut self,
        transport: &mut dyn Transport,
        position: f64,
        relative: bool,
        velocity: f64,
    ) -> Result<(), AxisError> {
        let result = self.start_move(transport, position, relative, velocity);
        if result.is_err() {
            self.params.set_flag(IntegerParam::Done, true);
        }
        self.conclude(result)
    }

    fn start_move(
        &mut self,
        transport: &mut dyn Transport,
        position: f64,
        relative: bool,
        velocity: f64,
    ) -> Result<(), AxisError> {
        self.interrupt_motion(transport)?;

        info!(
            "Moving axis {} {} {} at velocity {}",
            self.name,
            if relative { "by" } else { "to" },
            position as i64,
            velocity as i64
        );
        self.params.set_flag(IntegerParam::Done, false);
        self.write(transport, |buffer, axis| {
            build_move_command(buffer, axis, position, relative, velocity)
        })
    }

    pub fn home(&mut self, transport: &mut dyn Transport, forwards: bool) -> Result<(), AxisError> {
        let (selector, direction) = if forwards {
            (IntegerParam::HomeForwardMacro, "Forward")
        } else {
            (IntegerParam::HomeReverseMacro, "Reverse")
        };

        let home_type = HomeMacroType::try_from(self.params.get_integer(selector))
            .unwrap_or(HomeMacroType::Disabled);
        if home_type == HomeMacroType::Disabled {
            error!("{} homing of axis {} is disabled", direction, self.name);
            return self.conclude(Err(AxisError::HomingDisabled(direction)));
        }

        let result = self.start_homing(transport, forwards, home_type, direction);
        if result.is_err() {
            self.params.set_flag(IntegerParam::Done, true);
        }
        self.conclude(result)
    }

    fn start_homing(
        &mut self,
        transport: &mut dyn Transport,
        forwards: bool,
        home_type: HomeMacroType,
        direction: &str,
    ) -> Result<(), AxisError> {
        self.interrupt_motion(transport)?;

        info!("{} homing axis {} with {}", direction, self.name, home_type);
        self.params.set_flag(IntegerParam::Done, false);
        self.params.set_flag(IntegerParam::Home, true);
        self.params.set_flag(IntegerParam::Homed, false);

        let result = self.write(transport, |buffer, axis| {
            build_home_macro_command(buffer, axis, forwards, home_type)
        });
        if result.is_err() {
            self.params.set_flag(IntegerParam::Home, false);
        }
        result
    }

    pub fn stop(&mut self, transport: &mut dyn Transport) -> Result<(), AxisError> {
        if self.is_homing() {
            if let Err(e) = self.halt_homing_macro(transport) {
                warn!("Axis {} homing macro not halted: {}", self.name, e);
            }
        }

        let result = self.stop_motor(transport);
        self.conclude(result)
    }

    pub fn set_position(
        &mut self,
        transport: &mut dyn Transport,
        position: f64,
    ) -> Result<(), AxisError> {
        if self.is_homing() || self.is_moving() {
            warn!(
                "Axis {} is in motion, readback position will not be overridden",
                self.name
            );
            return self.conclude(Err(AxisError::MotionInProgress));
        }

        info!("Setting axis {} position to {}", self.name, position as i64);
        let result = self.write(transport, |buffer, axis| {
            build_set_position_command(buffer, axis, position)
        });
        self.conclude(result)
    }

    /// Reads the full axis status. Every query runs even when an earlier one
    /// fails; the done decision only uses values read in this cycle.
    pub fn poll(&mut self, transport: &mut dyn Transport) -> PollStatus {
        let mut failed = Vec::new();

        if let Some(reply) = self.read(transport, Query::Position, &mut failed) {
            self.position_readback = reply::parse_long(&reply);
            let position = self.position_readback as f64;
            self.params.set_double(DoubleParam::EncoderPosition, position);
            self.params.set_double(DoubleParam::Position, position);
        }

        let power_on = self.read(transport, Query::Power, &mut failed).map(|reply| {
            self.is_motor_on = reply::parse_bool(&reply);
            self.params.set_flag(IntegerParam::PowerOn, self.is_motor_on);
            self.is_motor_on
        });

        let motion_status = self
            .read(transport, Query::MotionStatus, &mut failed)
            .map(|reply| {
                self.motion_status = reply::parse_int(&reply);
                self.motion_status
            });

        let macro_result = self
            .read(transport, Query::MacroResult, &mut failed)
            .map(|reply| {
                self.macro_result = reply::parse_macro_result(&reply);
                self.params
                    .set_integer(IntegerParam::HomingStatus, self.macro_result.code());
                self.update_homing_state();
                self.macro_result
            });

        if let Some(reply) = self.read(transport, Query::MotionEndReason, &mut failed) {
            self.end_motion_reason = reply::parse_motion_end_reason(&reply);
            self.update_limit(transport, IntegerParam::LowLimit, MotionEndReason::HardRls);
            self.update_limit(transport, IntegerParam::HighLimit, MotionEndReason::HardFls);
        }

        if let Some(reply) = self.read(transport, Query::PositionError, &mut failed) {
            self.position_error = reply::parse_long(&reply);

            if let (Some(motion_status), Some(macro_result), Some(power_on)) =
                (motion_status, macro_result, power_on)
            {
                let position_error = self.position_error;
                if let Err(e) = self.set_motion_done(
                    transport,
                    motion_status,
                    macro_result,
                    power_on,
                    position_error,
                ) {
                    warn!("Axis {} not switched off: {}", self.name, e);
                }
            }
        }

        if let Some(reply) = self.read(transport, Query::MotorFault, &mut failed) {
            self.motor_fault = reply::parse_int(&reply);
        }

        let moving = !self.params.get_flag(IntegerParam::Done);
        self.params.set_flag(IntegerParam::Moving, moving);
        self.set_status_problem(failed.is_empty());
        self.params.notify_changed();

        PollStatus { moving, failed }
    }

    /// Decides whether the last motion is complete. With the servo still
    /// engaged the axis is only done once it sits within the retry deadband,
    /// and is then switched off.
    pub fn set_motion_done(
        &mut self,
        transport: &mut dyn Transport,
        motion_status: i32,
        macro_result: MacroResult,
        power_on: bool,
        position_error: i64,
    ) -> Result<(), AxisError> {
        if self.params.get_flag(IntegerParam::Done) {
            return Ok(());
        }
        if macro_result.is_executing() || motion_status != 0 {
            return Ok(());
        }
        if !power_on {
            self.params.set_flag(IntegerParam::Done, true);
            return Ok(());
        }

        let deadband = self.params.get_double(DoubleParam::RetryDeadband);
        let resolution = self.params.get_double(DoubleParam::MotorResolution).abs();
        let allowed_error = (deadband / resolution) as i64;

        if position_error.saturating_abs() <= allowed_error {
            info!(
                "Axis {} motion is within error margin, switching off motor",
                self.name
            );
            self.params.set_flag(IntegerParam::Done, true);
            self.switch_motor_power(transport, false)?;
        }

        Ok(())
    }

    pub fn switch_motor_power(
        &mut self,
        transport: &mut dyn Transport,
        on: bool,
    ) -> Result<(), AxisError> {
        info!("Switching axis {} power {}", self.name, if on { "on" } else { "off" });
        self.write(transport, |buffer, axis| {
            build_motor_power_command(buffer, axis, on)
        })
    }

    pub fn halt_homing_macro(&mut self, transport: &mut dyn Transport) -> Result<(), AxisError> {
        info!("Halting axis {} homing macro", self.name);
        self.write(transport, build_halt_macro_command)
    }

    fn stop_motor(&mut self, transport: &mut dyn Transport) -> Result<(), AxisError> {
        info!("Stopping axis {}", self.name);
        self.write(transport, build_stop_command)
    }

    pub fn report(&mut self, transport: &mut dyn Transport, level: u32) -> String {
        let index = self.axis.index();
        if level == 0 {
            return format!("  axis {index}\n");
        }

        let speed = self
            .query(transport, Query::Speed)
            .map(|reply| reply::parse_long(&reply))
            .unwrap_or(-1);
        let homr = self.params.get_integer(IntegerParam::HomeReverseMacro);
        let homf = self.params.get_integer(IntegerParam::HomeForwardMacro);

        format!(
            "  axis {index} ({})\n    motion status = {:x}\n    motion end = {}\n    motor fault = {:x}\n    switched on = {}\n    pos.error = {}\n    last speed = {}\n    homr type = {}\n    homf type = {}\n    macro res. = {}\n",
            self.name,
            self.motion_status,
            self.end_motion_reason,
            self.motor_fault,
            u8::from(self.is_motor_on),
            self.position_error,
            speed,
            homr,
            homf,
            self.macro_result.code(),
        )
    }

    pub fn snapshot(&self) -> AxisSnapshot {
        AxisSnapshot {
            name: self.name.clone(),
            status: self.params.status(),
            position: self.params.get_double(DoubleParam::Position),
            encoder_position: self.params.get_double(DoubleParam::EncoderPosition),
            position_error: self.position_error,
            motion_status: self.motion_status,
            motor_fault: self.motor_fault,
            end_reason: self.end_motion_reason,
            macro_result: self.macro_result,
        }
    }

    fn interrupt_motion(&mut self, transport: &mut dyn Transport) -> Result<(), AxisError> {
        if self.is_homing() {
            self.halt_homing_macro(transport)?;
            self.settle();
        }
        if self.is_moving() {
            self.stop_motor(transport)?;
            self.settle();
        }
        Ok(())
    }

    fn settle(&self) {
        if !self.settle_time.is_zero() {
            thread::sleep(self.settle_time);
        }
    }

    fn update_homing_state(&mut self) {
        if !self.params.get_flag(IntegerParam::Home) || self.macro_result.is_executing() {
            return;
        }

        self.params.set_flag(IntegerParam::Home, false);
        if self.macro_result == MacroResult::Ok {
            info!("Axis {} is now homed", self.name);
            self.params.set_flag(IntegerParam::Homed, true);
        } else {
            warn!(
                "Axis {} failed to home with {}",
                self.name, self.macro_result
            );
        }
    }

    fn update_limit(
        &mut self,
        transport: &mut dyn Transport,
        limit: IntegerParam,
        trigger: MotionEndReason,
    ) {
        let at_limit = self.params.get_flag(limit);
        let reason = self.end_motion_reason;

        if reason == trigger && !at_limit {
            info!("Axis {} stopped by {}", self.name, reason);
            self.params.set_flag(limit, true);
            if let Err(e) = self.switch_motor_power(transport, false) {
                warn!("Axis {} not switched off at limit: {}", self.name, e);
            }
        } else if reason != trigger && reason != MotionEndReason::MotorOff && at_limit {
            self.params.set_flag(limit, false);
        }
    }

    // A failed operation raises the problem flag once; a successful one
    // clears it.
    fn set_status_problem(&mut self, ok: bool) {
        let problem = self.params.get_flag(IntegerParam::Problem);
        if ok == problem {
            self.params.set_flag(IntegerParam::Problem, !ok);
        }
    }

    fn conclude<T>(&mut self, result: Result<T, AxisError>) -> Result<T, AxisError> {
        match &result {
            Err(e) if e.is_rejection() => {}
            other => self.set_status_problem(other.is_ok()),
        }
        self.params.notify_changed();
        result
    }

    fn write(
        &mut self,
        transport: &mut dyn Transport,
        build: impl FnOnce(&mut String, i32) -> Result<(), CommandError>,
    ) -> Result<(), AxisError> {
        let index = self.axis.index() as i32;
        build(&mut self.buffer, index)?;

        if let Err(e) = transport.write(&self.buffer) {
            error!("Axis {} command {} failed: {}", self.name, self.buffer, e);
            return Err(e.into());
        }
        Ok(())
    }

    fn query(&mut self, transport: &mut dyn Transport, query: Query) -> io::Result<String> {
        let index = self.axis.index() as i32;
        build_generic_get_command(&mut self.buffer, index, query)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        transport.write_read(&self.buffer)
    }

    fn read(
        &mut self,
        transport: &mut dyn Transport,
        query: Query,
        failed: &mut Vec<Query>,
    ) -> Option<String> {
        match self.query(transport, query) {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!("Axis {} query {:?} failed: {}", self.name, query, e);
                failed.push(query);
                None
            }
        }
    }
}
