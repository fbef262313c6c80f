//! WebSocket server implementation

mod handler;
mod listener;

pub use handler::serve_connection;
pub use listener::{router, RelayServer, CONTROL_PATH, TELEMETRY_PATH};
