pub mod command_sender;
pub mod commands;
