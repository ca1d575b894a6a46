use std::fmt;

use serde::{Deserialize, Serialize};

/// Cause of the last motion stop, as reported by the `EM` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEndReason {
    InMotion,
    Normal,
    HardFls,
    HardRls,
    SoftHl,
    SoftLl,
    MotorFault,
    UserStop,
    MotorOff,
    BadParam,
    Unknown(i32),
}

impl MotionEndReason {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => MotionEndReason::InMotion,
            1 => MotionEndReason::Normal,
            2 => MotionEndReason::HardFls,
            3 => MotionEndReason::HardRls,
            4 => MotionEndReason::SoftHl,
            5 => MotionEndReason::SoftLl,
            6 => MotionEndReason::MotorFault,
            7 => MotionEndReason::UserStop,
            8 => MotionEndReason::MotorOff,
            9 => MotionEndReason::BadParam,
            other => MotionEndReason::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            MotionEndReason::InMotion => 0,
            MotionEndReason::Normal => 1,
            MotionEndReason::HardFls => 2,
            MotionEndReason::HardRls => 3,
            MotionEndReason::SoftHl => 4,
            MotionEndReason::SoftLl => 5,
            MotionEndReason::MotorFault => 6,
            MotionEndReason::UserStop => 7,
            MotionEndReason::MotorOff => 8,
            MotionEndReason::BadParam => 9,
            MotionEndReason::Unknown(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MotionEndReason::InMotion => "IN_MOTION",
            MotionEndReason::Normal => "NORMAL",
            MotionEndReason::HardFls => "HARD_FLS",
            MotionEndReason::HardRls => "HARD_RLS",
            MotionEndReason::SoftHl => "SOFT_HL",
            MotionEndReason::SoftLl => "SOFT_LL",
            MotionEndReason::MotorFault => "MOTOR_FAULT",
            MotionEndReason::UserStop => "USER_STOP",
            MotionEndReason::MotorOff => "MOTOR_OFF",
            MotionEndReason::BadParam => "BAD_PARAM",
            MotionEndReason::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for MotionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionEndReason::Unknown(code) => write!(f, "UNKNOWN({code})"),
            known => f.write_str(known.name()),
        }
    }
}

/// Outcome of the homing macro, read back from `PA[11]`.
///
/// The device leaves codes 2-4, 7 and 8 unused; anything outside the named
/// set is kept verbatim and treated as a failed, finished macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroResult {
    Executing,
    Ok,
    FailNoIndexFound,
    FailTooManyFound,
    FailGetOffInput,
    Other(i32),
}

impl MacroResult {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => MacroResult::Executing,
            1 => MacroResult::Ok,
            5 => MacroResult::FailNoIndexFound,
            6 => MacroResult::FailTooManyFound,
            9 => MacroResult::FailGetOffInput,
            other => MacroResult::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            MacroResult::Executing => 0,
            MacroResult::Ok => 1,
            MacroResult::FailNoIndexFound => 5,
            MacroResult::FailTooManyFound => 6,
            MacroResult::FailGetOffInput => 9,
            MacroResult::Other(code) => code,
        }
    }

    pub fn is_executing(self) -> bool {
        self == MacroResult::Executing
    }

    pub fn name(self) -> &'static str {
        match self {
            MacroResult::Executing => "EXECUTING",
            MacroResult::Ok => "OK",
            MacroResult::FailNoIndexFound => "FAIL_NO_INDEX_FOUND",
            MacroResult::FailTooManyFound => "FAIL_TOO_MANY_FOUND",
            MacroResult::FailGetOffInput => "FAIL_GET_OFF_INPUT",
            MacroResult::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for MacroResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroResult::Other(code) => write!(f, "OTHER{code}"),
            known => f.write_str(known.name()),
        }
    }
}

/// Homing routine selected for one direction of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeMacroType {
    #[default]
    Disabled,
    /// Home onto the limit switch.
    HomeLs,
    /// Home onto the encoder index mark.
    HomeIdx,
}

impl HomeMacroType {
    pub fn code(self) -> i32 {
        match self {
            HomeMacroType::Disabled => 0,
            HomeMacroType::HomeLs => 1,
            HomeMacroType::HomeIdx => 2,
        }
    }
}

impl TryFrom<i32> for HomeMacroType {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(HomeMacroType::Disabled),
            1 => Ok(HomeMacroType::HomeLs),
            2 => Ok(HomeMacroType::HomeIdx),
            other => Err(other),
        }
    }
}

impl fmt::Display for HomeMacroType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HomeMacroType::Disabled => "DISABLED",
            HomeMacroType::HomeLs => "HOME_LS",
            HomeMacroType::HomeIdx => "HOME_IDX",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_reason_codes_follow_device_table() {
        assert_eq!(MotionEndReason::from_code(2), MotionEndReason::HardFls);
        assert_eq!(MotionEndReason::from_code(3), MotionEndReason::HardRls);
        assert_eq!(MotionEndReason::from_code(8), MotionEndReason::MotorOff);
        assert_eq!(MotionEndReason::from_code(42), MotionEndReason::Unknown(42));
        assert_eq!(MotionEndReason::from_code(42).to_string(), "UNKNOWN(42)");
        assert_eq!(MotionEndReason::UserStop.to_string(), "USER_STOP");
    }

    #[test]
    fn macro_result_keeps_reserved_codes() {
        assert_eq!(MacroResult::from_code(0), MacroResult::Executing);
        assert_eq!(MacroResult::from_code(1), MacroResult::Ok);
        assert_eq!(MacroResult::from_code(5), MacroResult::FailNoIndexFound);
        assert_eq!(MacroResult::from_code(6), MacroResult::FailTooManyFound);
        assert_eq!(MacroResult::from_code(9), MacroResult::FailGetOffInput);
        assert_eq!(MacroResult::from_code(3), MacroResult::Other(3));
        assert_eq!(MacroResult::Other(3).code(), 3);
        assert!(!MacroResult::Other(3).is_executing());
    }

    #[test]
    fn home_macro_type_codes() {
        assert_eq!(HomeMacroType::try_from(0), Ok(HomeMacroType::Disabled));
        assert_eq!(HomeMacroType::try_from(2), Ok(HomeMacroType::HomeIdx));
        assert_eq!(HomeMacroType::try_from(3), Err(3));
        assert_eq!(HomeMacroType::HomeLs.code(), 1);
    }
}
