use std::time::Duration;

use flexdc::HomeMacroType;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Serialize, Clone, PartialEq)]
pub struct FlexDcAxisConfig {
    pub name: String,
    /// User units per encoder tick.
    pub motor_resolution: f64,
    /// User units.
    pub retry_deadband: f64,
    #[serde(default)]
    pub home_forward_macro: HomeMacroType,
    #[serde(default)]
    pub home_reverse_macro: HomeMacroType,
}

#[derive(Deserialize, Debug, Serialize, Clone, PartialEq)]
pub struct FlexDcConfig {
    pub name: String,
    pub ip: String,
    pub port: u16,

    /// The unit always drives two axes; other values are ignored.
    pub num_axes: usize,

    pub moving_poll_period_ms: u64,
    pub idle_poll_period_ms: u64,

    /// Empty means the device default `>`.
    #[serde(default)]
    pub input_eos: String,
    /// Empty means the device default CR LF.
    #[serde(default)]
    pub output_eos: String,

    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_retries: u32,

    pub axes: Vec<FlexDcAxisConfig>,
}

impl FlexDcConfig {
    pub fn moving_poll_period(&self) -> Duration {
        Duration::from_millis(self.moving_poll_period_ms)
    }

    pub fn idle_poll_period(&self) -> Duration {
        Duration::from_millis(self.idle_poll_period_ms)
    }
}

impl Default for FlexDcConfig {
    fn default() -> Self {
        Self {
            name: "flexdc".to_string(),
            ip: "192.168.1.100".to_string(),
            port: 4000,

            num_axes: 2,

            moving_poll_period_ms: 100,
            idle_poll_period_ms: 1000,

            input_eos: String::new(),
            output_eos: String::new(),

            read_timeout_ms: 500,
            write_timeout_ms: 500,
            connect_timeout_ms: 1000,
            max_retries: 3,

            axes: vec![
                FlexDcAxisConfig {
                    name: "X".to_string(),
                    motor_resolution: 0.001,
                    retry_deadband: 0.01,
                    home_forward_macro: HomeMacroType::HomeLs,
                    home_reverse_macro: HomeMacroType::HomeLs,
                },
                FlexDcAxisConfig {
                    name: "Y".to_string(),
                    motor_resolution: 0.001,
                    retry_deadband: 0.01,
                    home_forward_macro: HomeMacroType::HomeLs,
                    home_reverse_macro: HomeMacroType::HomeLs,
                },
            ],
        }
    }
}
