use std::{io, sync::Arc};

use flexdc::Axis;
use tokio::sync::Notify;
use utilities::command_executor::CommandSender;

use super::commands::{CommandResponse, ControllerCommand};
use crate::controllers::flexdc::params::AxisSnapshot;

fn unexpected(response: CommandResponse) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Unexpected response type: {response:?}"),
    )
}

#[derive(Clone)]
pub struct ControllerCommandSender {
    sender: CommandSender<ControllerCommand>,
    poll_wakeup: Arc<Notify>,
}

impl ControllerCommandSender {
    pub fn new(sender: CommandSender<ControllerCommand>) -> Self {
        Self {
            sender,
            poll_wakeup: Arc::new(Notify::new()),
        }
    }

    pub fn poll_wakeup(&self) -> Arc<Notify> {
        self.poll_wakeup.clone()
    }

    pub async fn execute(&self, command: ControllerCommand) -> io::Result<CommandResponse> {
        let starts_motion = command.starts_motion();
        let response = self.sender.send_command(command).await?;

        if starts_motion {
            self.poll_wakeup.notify_one();
        }
        Ok(response)
    }

    async fn expect_ok(&self, command: ControllerCommand) -> io::Result<()> {
        match self.execute(command).await? {
            CommandResponse::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn move_axis(
        &self,
        axis: Axis,
        position: f64,
        relative: bool,
        velocity: f64,
    ) -> io::Result<()> {
        self.expect_ok(ControllerCommand::Move {
            axis,
            position,
            relative,
            velocity,
        })
        .await
    }

    pub async fn home(&self, axis: Axis, forwards: bool) -> io::Result<()> {
        self.expect_ok(ControllerCommand::Home { axis, forwards })
            .await
    }

    pub async fn stop(&self, axis: Axis) -> io::Result<()> {
        self.expect_ok(ControllerCommand::Stop { axis }).await
    }

    /// Returns whether any axis is still moving.
    pub async fn poll(&self) -> io::Result<bool> {
        match self.execute(ControllerCommand::Poll).await? {
            CommandResponse::Moving(moving) => Ok(moving),
            other => Err(unexpected(other)),
        }
    }

    pub async fn snapshot(&self, axis: Axis) -> io::Result<AxisSnapshot> {
        match self.execute(ControllerCommand::Snapshot { axis }).await? {
            CommandResponse::Snapshot(snapshot) => Ok(snapshot),
            other => Err(unexpected(other)),
        }
    }

    pub async fn version(&self) -> io::Result<String> {
        match self.execute(ControllerCommand::Version).await? {
            CommandResponse::Text(version) => Ok(version),
            other => Err(unexpected(other)),
        }
    }
}
