use std::{fmt::Write as _, io, time::Duration};

use flexdc::{Axis, HomeMacroType, RESET_CMD, VERSION_CMD};
use tracing::{error, info, warn};

use super::{
    axis::{AxisError, FlexDcAxis},
    params::{AxisSnapshot, DoubleParam, IntegerParam, ParamStore},
    transport::Transport,
};

pub struct FlexDcController {
    name: String,
    transport: Box<dyn Transport>,
    axes: [FlexDcAxis; 2],

    moving_poll_period: Duration,
    idle_poll_period: Duration,
}

impl FlexDcController {
    pub fn new(
        name: String,
        transport: Box<dyn Transport>,
        axes: [FlexDcAxis; 2],
        moving_poll_period: Duration,
        idle_poll_period: Duration,
    ) -> Self {
        info!(
            "Creating FlexDC controller {} with {} axes",
            name,
            axes.len()
        );

        Self {
            name,
            transport,
            axes,
            moving_poll_period,
            idle_poll_period,
        }
    }

    pub fn move_axis(
        &mut self,
        axis: Axis,
        position: f64,
        relative: bool,
        velocity: f64,
    ) -> Result<(), AxisError> {
        self.axes[axis.index()].move_to(self.transport.as_mut(), position, relative, velocity)
    }

    pub fn home(&mut self, axis: Axis, forwards: bool) -> Result<(), AxisError> {
        self.axes[axis.index()].home(self.transport.as_mut(), forwards)
    }

    pub fn stop(&mut self, axis: Axis) -> Result<(), AxisError> {
        self.axes[axis.index()].stop(self.transport.as_mut())
    }

    pub fn set_position(&mut self, axis: Axis, position: f64) -> Result<(), AxisError> {
        self.axes[axis.index()].set_position(self.transport.as_mut(), position)
    }

    /// Polls both axes and reports whether either is still moving.
    pub fn poll(&mut self) -> bool {
        let mut any_moving = false;
        for axis in &mut self.axes {
            any_moving |= axis.poll(self.transport.as_mut()).moving;
        }
        any_moving
    }

    pub fn write_integer(&mut self, axis: Axis, param: IntegerParam, value: i32) -> io::Result<()> {
        let target = &mut self.axes[axis.index()];

        match param {
            IntegerParam::ResetController => {
                target.params_mut().set_integer(param, value);
                target.params_mut().notify_changed();

                info!("Resetting FlexDC controller {}", self.name);
                self.transport.write(RESET_CMD).inspect_err(|e| {
                    error!("Reset of FlexDC controller {} failed: {}", self.name, e)
                })
            }
            IntegerParam::HomeForwardMacro | IntegerParam::HomeReverseMacro => {
                let home_type = HomeMacroType::try_from(value).map_err(|code| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("Unknown home macro type {code}"),
                    )
                })?;

                info!("Axis {} {:?} set to {}", target.name(), param, home_type);
                target.params_mut().set_integer(param, home_type.code());
                target.params_mut().notify_changed();
                Ok(())
            }
            read_only => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{read_only:?} is read-only"),
            )),
        }
    }

    pub fn write_double(&mut self, axis: Axis, param: DoubleParam, value: f64) -> io::Result<()> {
        let valid = match param {
            DoubleParam::MotorResolution => value.is_finite() && value > 0.0,
            DoubleParam::RetryDeadband => value.is_finite() && value >= 0.0,
            read_only => {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("{read_only:?} is read-only"),
                ));
            }
        };
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid {param:?} value {value}"),
            ));
        }

        let target = &mut self.axes[axis.index()];
        info!("Axis {} {:?} set to {}", target.name(), param, value);
        target.params_mut().set_double(param, value);
        target.params_mut().notify_changed();
        Ok(())
    }

    pub fn version(&mut self) -> io::Result<String> {
        self.transport.write_read(VERSION_CMD)
    }

    pub fn report(&mut self, level: u32) -> String {
        let mut report = format!(
            "Nanomotion FlexDC motor controller {}, numAxes={}, moving poll period={:?}, idle poll period={:?}\n",
            self.name,
            self.axes.len(),
            self.moving_poll_period,
            self.idle_poll_period
        );

        if level > 0 {
            match self.version() {
                Ok(version) => {
                    let _ = writeln!(report, "  version = {version}");
                }
                Err(e) => warn!("Unable to retrieve FlexDC {} version: {}", self.name, e),
            }
        }

        for axis in &mut self.axes {
            report.push_str(&axis.report(self.transport.as_mut(), level));
        }

        report
    }

    pub fn snapshot(&self, axis: Axis) -> AxisSnapshot {
        self.axes[axis.index()].snapshot()
    }
}

/// Controller over a scripted device: forward homing on the index mark,
/// reverse homing disabled, 10 ticks of deadband and no settle wait.
#[cfg(test)]
pub(crate) fn test_controller(
    device: &super::transport::mock::MockTransport,
) -> FlexDcController {
    use super::params::ParamTable;

    let axes = Axis::ALL.map(|axis| {
        let params = ParamTable::new(0.25, 2.5, HomeMacroType::HomeIdx, HomeMacroType::Disabled);
        FlexDcAxis::new(axis, axis.to_string(), params).with_settle_time(Duration::ZERO)
    });

    FlexDcController::new(
        "test".to_string(),
        Box::new(device.clone()),
        axes,
        Duration::from_millis(100),
        Duration::from_secs(1),
    )
}
