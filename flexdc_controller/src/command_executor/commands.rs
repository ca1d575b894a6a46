use std::{fmt, io};

use flexdc::Axis;
use utilities::command_executor::{Command, DeviceHandler};

use crate::controllers::flexdc::{
    controller::FlexDcController,
    params::{AxisSnapshot, DoubleParam, IntegerParam},
};

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    Move {
        axis: Axis,
        position: f64,
        relative: bool,
        velocity: f64,
    },
    Home {
        axis: Axis,
        forwards: bool,
    },
    Stop {
        axis: Axis,
    },
    SetPosition {
        axis: Axis,
        position: f64,
    },
    Poll,
    SetInteger {
        axis: Axis,
        param: IntegerParam,
        value: i32,
    },
    SetDouble {
        axis: Axis,
        param: DoubleParam,
        value: f64,
    },
    Snapshot {
        axis: Axis,
    },
    Version,
    Report {
        level: u32,
    },
}

impl ControllerCommand {
    /// Commands after which the poller should switch to the moving rate.
    pub fn starts_motion(&self) -> bool {
        matches!(
            self,
            ControllerCommand::Move { .. } | ControllerCommand::Home { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    Ok,
    Moving(bool),
    Snapshot(AxisSnapshot),
    Text(String),
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResponse::Ok => f.write_str("OK"),
            CommandResponse::Moving(moving) => write!(f, "moving={}", u8::from(*moving)),
            CommandResponse::Snapshot(snapshot) => write!(f, "{snapshot}"),
            CommandResponse::Text(text) => f.write_str(text.trim_end()),
        }
    }
}

impl DeviceHandler for FlexDcController {
    type Command = ControllerCommand;
}

impl Command for ControllerCommand {
    type Response = CommandResponse;
    type Handler = FlexDcController;

    fn execute(self, handler: &mut FlexDcController) -> io::Result<CommandResponse> {
        match self {
            ControllerCommand::Move {
                axis,
                position,
                relative,
                velocity,
            } => handler.move_axis(axis, position, relative, velocity)?,
            ControllerCommand::Home { axis, forwards } => handler.home(axis, forwards)?,
            ControllerCommand::Stop { axis } => handler.stop(axis)?,
            ControllerCommand::SetPosition { axis, position } => {
                handler.set_position(axis, position)?
            }
            ControllerCommand::Poll => return Ok(CommandResponse::Moving(handler.poll())),
            ControllerCommand::SetInteger { axis, param, value } => {
                handler.write_integer(axis, param, value)?
            }
            ControllerCommand::SetDouble { axis, param, value } => {
                handler.write_double(axis, param, value)?
            }
            ControllerCommand::Snapshot { axis } => {
                return Ok(CommandResponse::Snapshot(handler.snapshot(axis)));
            }
            ControllerCommand::Version => return handler.version().map(CommandResponse::Text),
            ControllerCommand::Report { level } => {
                return Ok(CommandResponse::Text(handler.report(level)));
            }
        }

        Ok(CommandResponse::Ok)
    }
}
