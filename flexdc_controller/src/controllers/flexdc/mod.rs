pub mod axis;
pub mod config;
pub mod controller;
pub mod params;
pub mod poller;
pub mod transport;

use std::time::Duration;

use anyhow::Context as _;
use flexdc::{Axis, Terminators};
use tracing::{info, warn};
use utilities::{
    command_executor::CommandExecutor,
    lazy_tcp::{LazyTcpStream, TcpTimeouts},
};

use crate::{
    command_executor::command_sender::ControllerCommandSender,
    controllers::flexdc::{
        axis::FlexDcAxis,
        config::{FlexDcAxisConfig, FlexDcConfig},
        controller::FlexDcController,
        params::ParamTable,
        transport::AsciiTransport,
    },
};

const NUM_AXES: usize = 2;

fn create_axis(axis: Axis, config: &FlexDcAxisConfig) -> FlexDcAxis {
    let params = ParamTable::new(
        config.motor_resolution,
        config.retry_deadband,
        config.home_forward_macro,
        config.home_reverse_macro,
    );
    FlexDcAxis::new(axis, config.name.clone(), params)
}

pub fn create_controller(
    config: &FlexDcConfig,
) -> anyhow::Result<(CommandExecutor<FlexDcController>, ControllerCommandSender)> {
    if config.num_axes != NUM_AXES {
        warn!(
            "FlexDC {} requested with {} axes, using {}",
            config.name, config.num_axes, NUM_AXES
        );
    }

    let [x_config, y_config] = <&[FlexDcAxisConfig; NUM_AXES]>::try_from(config.axes.as_slice())
        .with_context(|| {
            format!(
                "FlexDC {} needs exactly {} axis entries, got {}",
                config.name,
                NUM_AXES,
                config.axes.len()
            )
        })?;

    let terminators = Terminators::resolve(&config.input_eos, &config.output_eos);
    let timeouts = TcpTimeouts {
        read: Duration::from_millis(config.read_timeout_ms),
        write: Duration::from_millis(config.write_timeout_ms),
        connect: Duration::from_millis(config.connect_timeout_ms),
    };
    let address = format!("{}:{}", config.ip, config.port);
    info!(
        "FlexDC {} at {} (input eos {:?}, output eos {:?})",
        config.name, address, terminators.input, terminators.output
    );

    let stream = LazyTcpStream::new(address, config.max_retries, timeouts);
    let transport = AsciiTransport::new(stream, terminators);

    let controller = FlexDcController::new(
        config.name.clone(),
        Box::new(transport),
        [
            create_axis(Axis::X, x_config),
            create_axis(Axis::Y, y_config),
        ],
        config.moving_poll_period(),
        config.idle_poll_period(),
    );

    let (executor, sender) = CommandExecutor::new(controller);
    Ok((executor, ControllerCommandSender::new(sender)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_axis_list_is_rejected() {
        let mut config = FlexDcConfig::default();
        config.axes.pop();

        assert!(create_controller(&config).is_err());
    }

    #[tokio::test]
    async fn controller_is_built_from_config() {
        let config = FlexDcConfig {
            num_axes: 4,
            ..Default::default()
        };

        let (executor, sender) = create_controller(&config).unwrap();
        let handle = executor.spawn();

        let snapshot = sender.snapshot(Axis::Y).await.unwrap();
        assert_eq!(snapshot.name, "Y");

        drop(sender);
        handle.await.unwrap().unwrap();
    }
}
