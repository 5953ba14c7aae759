//! Wire contract and command plumbing for the extension shell.

pub mod channel;
pub mod contract;
pub mod service;
pub mod stdio;

pub use channel::{
    command_channel, command_channel_with_events, BackgroundCommands, HostCommandClient,
    HostCommandServer,
};
pub use contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
pub use service::{BackgroundService, HostEventSink};
pub use stdio::{run_stdio_bridge, run_stdio_bridge_with_events};
