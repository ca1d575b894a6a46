use std::{
    io,
    sync::mpsc::{Receiver, Sender},
};

use tokio::sync::oneshot;
use tracing::{debug, warn};

/// An operation on one device, run on the device's worker thread.
pub trait Command: Send {
    type Response: Send;
    type Handler: DeviceHandler<Command = Self>;

    fn execute(self, handler: &mut Self::Handler) -> io::Result<Self::Response>;
}

pub trait DeviceHandler {
    type Command: Command<Handler = Self>;
}

type Reply<C> = oneshot::Sender<io::Result<<C as Command>::Response>>;

/// Runs every command for one device on a single blocking thread, so at most
/// one exchange with the device is in flight at any time.
pub struct CommandExecutor<H: DeviceHandler + Send + 'static> {
    handler: H,
    requests: Receiver<(H::Command, Reply<H::Command>)>,
}

impl<H: DeviceHandler + Send> CommandExecutor<H> {
    pub fn new(handler: H) -> (Self, CommandSender<H::Command>) {
        let (requests_tx, requests) = std::sync::mpsc::channel();
        let executor = Self { handler, requests };

        (executor, CommandSender { requests: requests_tx })
    }

    /// Returns once every sender has been dropped.
    pub fn run(&mut self) -> io::Result<()> {
        for (command, reply) in self.requests.iter() {
            let result = command.execute(&mut self.handler);
            if let Err(e) = &result {
                debug!("Command failed: {}", e);
            }
            if reply.send(result).is_err() {
                warn!("Requester went away before its response");
            }
        }

        debug!("Command channel closed, executor stopping");
        Ok(())
    }

    pub fn spawn(mut self) -> tokio::task::JoinHandle<io::Result<()>> {
        tokio::task::spawn_blocking(move || self.run())
    }
}

/// Cloneable handle that queues commands for a [`CommandExecutor`].
pub struct CommandSender<C: Command> {
    requests: Sender<(C, Reply<C>)>,
}

impl<C: Command> Clone for CommandSender<C> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<C: Command> CommandSender<C> {
    pub async fn send_command(&self, command: C) -> io::Result<C::Response> {
        let (reply, response) = oneshot::channel();

        self.requests
            .send((command, reply))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "Executor is not running"))?;

        response.await.map_err(|_| {
            io::Error::new(io::ErrorKind::BrokenPipe, "Executor dropped the command")
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        value: u32,
    }

    enum CounterCommand {
        Add(u32),
        Fail,
    }

    impl DeviceHandler for Counter {
        type Command = CounterCommand;
    }

    impl Command for CounterCommand {
        type Response = u32;
        type Handler = Counter;

        fn execute(self, handler: &mut Counter) -> io::Result<u32> {
            match self {
                CounterCommand::Add(n) => {
                    handler.value += n;
                    Ok(handler.value)
                }
                CounterCommand::Fail => Err(io::Error::new(io::ErrorKind::TimedOut, "no reply")),
            }
        }
    }

    #[tokio::test]
    async fn commands_run_in_order_on_handler() {
        let (executor, sender) = CommandExecutor::new(Counter::default());
        let handle = executor.spawn();

        assert_eq!(sender.send_command(CounterCommand::Add(2)).await.unwrap(), 2);
        assert_eq!(sender.send_command(CounterCommand::Add(3)).await.unwrap(), 5);

        let err = sender.send_command(CounterCommand::Fail).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        drop(sender);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn sending_after_shutdown_fails() {
        let (executor, sender) = CommandExecutor::new(Counter::default());
        drop(executor);

        let err = sender.send_command(CounterCommand::Add(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
