use std::io::{self, BufRead as _};

use flexdc::{Axis, HomeMacroType};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    command_executor::{command_sender::ControllerCommandSender, commands::ControllerCommand},
    controllers::flexdc::params::{DoubleParam, IntegerParam},
};

fn parse_axis(text: &str) -> Option<Axis> {
    match text {
        "x" | "X" => Some(Axis::X),
        "y" | "Y" => Some(Axis::Y),
        index => Axis::try_from(index.parse::<i32>().ok()?).ok(),
    }
}

fn parse_home_type(text: &str) -> Option<HomeMacroType> {
    match text {
        "disabled" => Some(HomeMacroType::Disabled),
        "home_ls" => Some(HomeMacroType::HomeLs),
        "home_idx" => Some(HomeMacroType::HomeIdx),
        code => HomeMacroType::try_from(code.parse::<i32>().ok()?).ok(),
    }
}

/// Parses one console line such as `move:0:1000:200` or `home:y:rev`.
pub fn parse_command(cmd_str: &str) -> Option<ControllerCommand> {
    let parts: Vec<&str> = cmd_str.trim().split(':').collect();

    let command = match parts.as_slice() {
        ["move" | "moverel", axis, position, velocity] => ControllerCommand::Move {
            axis: parse_axis(axis)?,
            position: position.parse().ok()?,
            relative: parts[0] == "moverel",
            velocity: velocity.parse().ok()?,
        },
        ["home", axis, direction] => ControllerCommand::Home {
            axis: parse_axis(axis)?,
            forwards: match *direction {
                "fwd" => true,
                "rev" => false,
                _ => return None,
            },
        },
        ["stop", axis] => ControllerCommand::Stop {
            axis: parse_axis(axis)?,
        },
        ["setpos", axis, position] => ControllerCommand::SetPosition {
            axis: parse_axis(axis)?,
            position: position.parse().ok()?,
        },
        ["set", axis, param, value] => {
            let axis = parse_axis(axis)?;
            match *param {
                "rdbd" => ControllerCommand::SetDouble {
                    axis,
                    param: DoubleParam::RetryDeadband,
                    value: value.parse().ok()?,
                },
                "mres" => ControllerCommand::SetDouble {
                    axis,
                    param: DoubleParam::MotorResolution,
                    value: value.parse().ok()?,
                },
                "homf" => ControllerCommand::SetInteger {
                    axis,
                    param: IntegerParam::HomeForwardMacro,
                    value: parse_home_type(value)?.code(),
                },
                "homr" => ControllerCommand::SetInteger {
                    axis,
                    param: IntegerParam::HomeReverseMacro,
                    value: parse_home_type(value)?.code(),
                },
                _ => return None,
            }
        }
        ["get", axis] => ControllerCommand::Snapshot {
            axis: parse_axis(axis)?,
        },
        ["report"] => ControllerCommand::Report { level: 0 },
        ["report", level] => ControllerCommand::Report {
            level: level.parse().ok()?,
        },
        ["reset"] => ControllerCommand::SetInteger {
            axis: Axis::X,
            param: IntegerParam::ResetController,
            value: 1,
        },
        ["version"] => ControllerCommand::Version,
        _ => return None,
    };

    Some(command)
}

// Stdin has no async reader that can be cancelled, so a plain thread feeds
// lines into the runtime and dies with the process.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    rx
}

/// Runs operator commands from stdin until EOF or `quit`.
pub async fn run_console(sender: ControllerCommandSender) -> io::Result<()> {
    let mut lines = spawn_stdin_reader();
    info!("Console ready");

    while let Some(line) = lines.recv().await {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            _ => {}
        }

        let Some(command) = parse_command(line) else {
            warn!("Unknown console command: {}", line);
            println!("ERR unknown command {line:?}");
            continue;
        };

        info!("Console: {:?}", command);
        match sender.execute(command).await {
            Ok(response) => println!("{response}"),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Err(e),
            Err(e) => {
                error!("Console command {:?} failed: {}", line, e);
                println!("ERR {e}");
            }
        }
    }

    info!("Console closed");
    Ok(())
}
