use std::{io, time::Duration};

use tracing::{debug, info, warn};

use crate::command_executor::command_sender::ControllerCommandSender;

/// Polls the controller at `moving_period` while any axis moves and at
/// `idle_period` otherwise. A move or home request cuts the current wait
/// short. Returns once the controller worker has shut down.
pub async fn run_poller(
    sender: ControllerCommandSender,
    moving_period: Duration,
    idle_period: Duration,
) {
    let wakeup = sender.poll_wakeup();

    loop {
        let period = match sender.poll().await {
            Ok(true) => moving_period,
            Ok(false) => idle_period,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                info!("Controller worker stopped, poller exiting");
                return;
            }
            Err(e) => {
                warn!("Poll failed: {}", e);
                idle_period
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = wakeup.notified() => debug!("Poller woken by motion request"),
        }
    }
}

#[cfg(test)]
mod tests {
    use flexdc::Axis;
    use utilities::command_executor::CommandExecutor;

    use super::*;
    use crate::controllers::flexdc::{
        controller::test_controller as controller, transport::mock::MockTransport,
    };

    fn spawn_controller(
        device: &MockTransport,
    ) -> (tokio::task::JoinHandle<io::Result<()>>, ControllerCommandSender) {
        let (executor, sender) = CommandExecutor::new(controller(device));
        (executor.spawn(), ControllerCommandSender::new(sender))
    }

    fn position_polls(device: &MockTransport) -> usize {
        device.sent().iter().filter(|command| *command == "XPS").count()
    }

    async fn wait_for_polls(device: &MockTransport, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while position_polls(device) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("poller did not run");
    }

    #[tokio::test]
    async fn motion_request_wakes_idle_poller() {
        let device = MockTransport::new();
        device.reply("XPA[11]", "1").reply("YPA[11]", "1");
        let (executor, sender) = spawn_controller(&device);

        let poller = tokio::spawn(run_poller(
            sender.clone(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        ));
        wait_for_polls(&device, 1).await;

        sender.move_axis(Axis::X, 100.0, false, 50.0).await.unwrap();
        wait_for_polls(&device, 2).await;

        poller.abort();
        let _ = poller.await;
        drop(sender);
        executor.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn moving_axis_keeps_fast_rate() {
        let device = MockTransport::new();
        device.reply("XMS", "1");
        let (executor, sender) = spawn_controller(&device);

        let poller = tokio::spawn(run_poller(
            sender.clone(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        ));
        wait_for_polls(&device, 3).await;

        poller.abort();
        let _ = poller.await;
        drop(sender);
        executor.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn poller_exits_when_worker_stops() {
        let device = MockTransport::new();
        let (executor, sender) = CommandExecutor::new(controller(&device));
        drop(executor);

        tokio::time::timeout(
            Duration::from_secs(5),
            run_poller(
                ControllerCommandSender::new(sender),
                Duration::from_millis(10),
                Duration::from_millis(10),
            ),
        )
        .await
        .unwrap();
    }
}
