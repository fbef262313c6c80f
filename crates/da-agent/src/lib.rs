//! da-agent: Command executor and telemetry reporter for deskagent
//!
//! The agent runs on the managed host. It keeps a connection to the
//! relay's control channel, executes allowed commands as they arrive, and
//! optionally streams host telemetry over the telemetry channel.

pub mod executor;
pub mod metrics;
pub mod session;
pub mod state;
pub mod tunnel;

pub use executor::{CommandExecutor, CommandPolicy, Outcome, ShellSpawner, Spawner};
pub use state::AgentState;
