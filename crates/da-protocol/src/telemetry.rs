//! Host telemetry sample carried by `pc_info` messages

use serde::{Deserialize, Serialize};

/// One sample of host metrics as reported by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Global CPU usage percentage (0-100)
    pub cpu_percent: f32,
    /// Used memory in bytes
    #[serde(rename = "memory")]
    pub memory_used: u64,
    /// Total memory in bytes
    pub memory_total: u64,
    /// Used space on the root filesystem in bytes
    #[serde(rename = "disk_usage")]
    pub disk_used: u64,
    /// Size of the root filesystem in bytes
    pub disk_total: u64,
    /// Seconds since boot
    #[serde(rename = "uptime")]
    pub uptime_seconds: u64,
    /// Unix time in seconds when the sample was taken
    pub timestamp: f64,
    /// Operating system name
    pub system: String,
    /// Host name
    #[serde(rename = "node_name")]
    pub hostname: String,
    /// Login name of the agent's user
    pub user: String,
    /// Primary local IPv4 address
    #[serde(rename = "ip_local")]
    pub local_ip: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn test_snapshot_uses_pc_info_wire_names() {
        let snapshot = HostSnapshot {
            cpu_percent: 12.5,
            memory_used: 1024,
            memory_total: 4096,
            disk_used: 10,
            disk_total: 100,
            uptime_seconds: 3600,
            timestamp: 1.0,
            system: "Linux".to_string(),
            hostname: "desk".to_string(),
            user: "ana".to_string(),
            local_ip: "192.168.0.10".to_string(),
        };

        let value = serde_json::to_value(Message::Telemetry(snapshot)).unwrap();
        assert_eq!(value["type"], "pc_info");
        assert_eq!(value["memory"], 1024);
        assert_eq!(value["disk_usage"], 10);
        assert_eq!(value["node_name"], "desk");
        assert_eq!(value["ip_local"], "192.168.0.10");
        assert_eq!(value["uptime"], 3600);
    }
}
