use crate::{Axis, CommandError, HomeMacroType};

pub const VERSION_CMD: &str = "XVR";

/// Kills both homing macros, powers every axis down and restarts the unit.
pub const RESET_CMD: &str = "XQK;YQK;AMO=0;XRS";

/// Status registers read with a bare `{axis}{register}` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Position,
    PositionError,
    MotionStatus,
    MotionEndReason,
    MotorFault,
    Speed,
    Power,
    MacroResult,
}

impl Query {
    pub fn register(self) -> &'static str {
        match self {
            Query::Position => "PS",
            Query::PositionError => "PE",
            Query::MotionStatus => "MS",
            Query::MotionEndReason => "EM",
            Query::MotorFault => "MF",
            Query::Speed => "SP",
            Query::Power => "MO",
            Query::MacroResult => "PA[11]",
        }
    }
}

// Validation happens before the buffer is touched, so a rejected request
// leaves the previous command text in place.
fn emit(
    buffer: &mut String,
    axis: i32,
    render: impl FnOnce(char) -> String,
) -> Result<(), CommandError> {
    let axis = Axis::try_from(axis)?;
    *buffer = render(axis.mnemonic());
    Ok(())
}

/// Renders a complete move: servo on, absolute or relative mode, speed,
/// target and begin. Position and velocity are truncated toward zero.
pub fn build_move_command(
    buffer: &mut String,
    axis: i32,
    position: f64,
    relative: bool,
    velocity: f64,
) -> Result<(), CommandError> {
    let target = position as i64;
    let speed = velocity as i64;
    let mode = if relative { "RP" } else { "AP" };

    emit(buffer, axis, |a| {
        format!("{a}MO=1;{a}MM=0;{a}SM=0;{a}SP={speed};{a}{mode}={target};{a}BG")
    })
}

pub fn build_set_position_command(
    buffer: &mut String,
    axis: i32,
    position: f64,
) -> Result<(), CommandError> {
    let position = position as i64;
    emit(buffer, axis, |a| format!("{a}PS={position}"))
}

pub fn build_stop_command(buffer: &mut String, axis: i32) -> Result<(), CommandError> {
    emit(buffer, axis, |a| format!("{a}ST"))
}

pub fn build_halt_macro_command(buffer: &mut String, axis: i32) -> Result<(), CommandError> {
    emit(buffer, axis, |a| format!("{a}QK;{a}QI"))
}

pub fn build_motor_power_command(
    buffer: &mut String,
    axis: i32,
    on: bool,
) -> Result<(), CommandError> {
    let on = u8::from(on);
    emit(buffer, axis, |a| format!("{a}MO={on}"))
}

pub fn build_home_macro_command(
    buffer: &mut String,
    axis: i32,
    forwards: bool,
    home_type: HomeMacroType,
) -> Result<(), CommandError> {
    let label = match (home_type, forwards) {
        (HomeMacroType::Disabled, _) => return Err(CommandError::HomingDisabled),
        (HomeMacroType::HomeLs, true) => "HINFI",
        (HomeMacroType::HomeLs, false) => "HINRI",
        (HomeMacroType::HomeIdx, _) => "HINX_",
    };

    emit(buffer, axis, |a| format!("{a}QE,#{label}{a}"))
}

pub fn build_generic_get_command(
    buffer: &mut String,
    axis: i32,
    query: Query,
) -> Result<(), CommandError> {
    emit(buffer, axis, |a| format!("{a}{}", query.register()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn built(result: Result<(), CommandError>, buffer: String) -> String {
        assert_eq!(result, Ok(()));
        buffer
    }

    #[test]
    fn move_absolute() {
        let mut buffer = String::new();
        let result = build_move_command(&mut buffer, 0, 1000000.0, false, 20000.0);
        assert_eq!(
            built(result, buffer),
            "XMO=1;XMM=0;XSM=0;XSP=20000;XAP=1000000;XBG"
        );
    }

    #[test]
    fn move_relative() {
        let mut buffer = String::new();
        let result = build_move_command(&mut buffer, 1, -25000.0, true, 1000.0);
        assert_eq!(
            built(result, buffer),
            "YMO=1;YMM=0;YSM=0;YSP=1000;YRP=-25000;YBG"
        );
    }

    #[test]
    fn move_truncates_fractions() {
        let mut buffer = String::new();
        let result = build_move_command(&mut buffer, 0, -10.9, false, 99.99);
        assert_eq!(built(result, buffer), "XMO=1;XMM=0;XSM=0;XSP=99;XAP=-10;XBG");
    }

    #[test]
    fn set_position() {
        let cases = [
            (0, 100.0, "XPS=100"),
            (0, -1253.0, "XPS=-1253"),
            (0, 3.1415, "XPS=3"),
            (0, 0.0, "XPS=0"),
            (1, 1.0, "YPS=1"),
        ];

        for (axis, position, expected) in cases {
            let mut buffer = String::new();
            let result = build_set_position_command(&mut buffer, axis, position);
            assert_eq!(built(result, buffer), expected);
        }
    }

    #[test]
    fn stop_and_halt() {
        let mut buffer = String::new();
        assert_eq!(build_stop_command(&mut buffer, 0), Ok(()));
        assert_eq!(buffer, "XST");
        assert_eq!(build_stop_command(&mut buffer, 1), Ok(()));
        assert_eq!(buffer, "YST");

        assert_eq!(build_halt_macro_command(&mut buffer, 0), Ok(()));
        assert_eq!(buffer, "XQK;XQI");
        assert_eq!(build_halt_macro_command(&mut buffer, 1), Ok(()));
        assert_eq!(buffer, "YQK;YQI");
    }

    #[test]
    fn motor_power() {
        let mut buffer = String::new();
        for (axis, on, expected) in [
            (0, false, "XMO=0"),
            (0, true, "XMO=1"),
            (1, false, "YMO=0"),
            (1, true, "YMO=1"),
        ] {
            assert_eq!(build_motor_power_command(&mut buffer, axis, on), Ok(()));
            assert_eq!(buffer, expected);
        }
    }

    #[test]
    fn home_macros() {
        let mut buffer = String::new();
        for (axis, forwards, home_type, expected) in [
            (0, true, HomeMacroType::HomeLs, "XQE,#HINFIX"),
            (0, true, HomeMacroType::HomeIdx, "XQE,#HINX_X"),
            (1, false, HomeMacroType::HomeLs, "YQE,#HINRIY"),
            (1, false, HomeMacroType::HomeIdx, "YQE,#HINX_Y"),
        ] {
            let result = build_home_macro_command(&mut buffer, axis, forwards, home_type);
            assert_eq!(result, Ok(()));
            assert_eq!(buffer, expected);
        }
    }

    #[test]
    fn disabled_homing_never_builds() {
        for axis in [0, 1, 2] {
            for forwards in [true, false] {
                let mut buffer = String::from("MyBuffer");
                let result =
                    build_home_macro_command(&mut buffer, axis, forwards, HomeMacroType::Disabled);
                assert!(result.is_err());
                assert_eq!(buffer, "MyBuffer");
            }
        }
    }

    #[test]
    fn status_queries() {
        let mut buffer = String::new();
        for (query, x, y) in [
            (Query::Speed, "XSP", "YSP"),
            (Query::Power, "XMO", "YMO"),
            (Query::MacroResult, "XPA[11]", "YPA[11]"),
            (Query::PositionError, "XPE", "YPE"),
            (Query::MotionStatus, "XMS", "YMS"),
            (Query::MotionEndReason, "XEM", "YEM"),
            (Query::MotorFault, "XMF", "YMF"),
            (Query::Position, "XPS", "YPS"),
        ] {
            assert_eq!(build_generic_get_command(&mut buffer, 0, query), Ok(()));
            assert_eq!(buffer, x);
            assert_eq!(build_generic_get_command(&mut buffer, 1, query), Ok(()));
            assert_eq!(buffer, y);
        }
    }

    fn every_builder(buffer: &mut String, axis: i32) -> Vec<Result<(), CommandError>> {
        vec![
            build_move_command(buffer, axis, 0.0, false, 2000.0),
            build_set_position_command(buffer, axis, 20000.0),
            build_stop_command(buffer, axis),
            build_halt_macro_command(buffer, axis),
            build_motor_power_command(buffer, axis, true),
            build_home_macro_command(buffer, axis, true, HomeMacroType::HomeLs),
            build_generic_get_command(buffer, axis, Query::MotorFault),
        ]
    }

    #[test]
    fn invalid_axis_leaves_buffer_untouched() {
        for axis in [2, 3, -1] {
            let mut buffer = String::from("MyBuffer");
            for result in every_builder(&mut buffer, axis) {
                assert_eq!(result, Err(CommandError::InvalidAxis(axis)));
            }
            assert_eq!(buffer, "MyBuffer");
        }
    }

    proptest! {
        #[test]
        fn any_out_of_range_axis_is_rejected(axis in prop_oneof![i32::MIN..0, 2..i32::MAX]) {
            let mut buffer = String::from("MyBuffer");
            for result in every_builder(&mut buffer, axis) {
                prop_assert_eq!(result, Err(CommandError::InvalidAxis(axis)));
            }
            prop_assert_eq!(buffer, "MyBuffer");
        }

        #[test]
        fn set_position_truncates_toward_zero(position in -1.0e9f64..1.0e9f64) {
            let mut buffer = String::new();
            build_set_position_command(&mut buffer, 1, position).unwrap();
            prop_assert_eq!(buffer, format!("YPS={}", position.trunc() as i64));
        }
    }
}
