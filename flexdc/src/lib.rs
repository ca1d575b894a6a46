//! Command and reply codec for the Nanomotion FlexDC two-axis DC motor controller.
//!
//! Everything in this crate is pure: builders render command lines into a
//! caller-owned buffer, decoders turn reply text into typed values and the
//! framing helpers move those lines over any `Read + Write` stream.

pub mod axis;
pub mod command;
pub mod framing;
pub mod reply;
pub mod types;

pub use axis::Axis;
pub use command::{
    Query, RESET_CMD, VERSION_CMD, build_generic_get_command, build_halt_macro_command,
    build_home_macro_command, build_motor_power_command, build_move_command,
    build_set_position_command, build_stop_command,
};
pub use framing::Terminators;
pub use types::{HomeMacroType, MacroResult, MotionEndReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid axis index {0}, expected 0 or 1")]
    InvalidAxis(i32),

    #[error("Homing macro is disabled")]
    HomingDisabled,
}
