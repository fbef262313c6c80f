//! Host telemetry sampling

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use async_trait::async_trait;
use sysinfo::{Disks, System};
use tokio::net::UdpSocket;

use da_core::time::unix_timestamp;
use da_protocol::HostSnapshot;

/// Address used to find the outbound interface. No packet is sent.
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Source of host telemetry, polled once per telemetry tick
#[async_trait]
pub trait TelemetrySampler: Send {
    /// Take one sample
    async fn sample(&mut self) -> HostSnapshot;
}

/// Sampler backed by `sysinfo`
pub struct SysinfoSampler {
    system: System,
    disks: Disks,
    os_name: String,
    hostname: String,
    user: String,
}

impl SysinfoSampler {
    /// Create a sampler and take the baseline CPU reading
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            os_name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            user: whoami::username(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySampler for SysinfoSampler {
    async fn sample(&mut self) -> HostSnapshot {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.disks.refresh();
        let (disk_used, disk_total) = root_disk_usage(&self.disks);

        HostSnapshot {
            cpu_percent: self.system.global_cpu_usage(),
            memory_used: self.system.used_memory(),
            memory_total: self.system.total_memory(),
            disk_used,
            disk_total,
            uptime_seconds: System::uptime(),
            timestamp: unix_timestamp(),
            system: self.os_name.clone(),
            hostname: self.hostname.clone(),
            user: self.user.clone(),
            local_ip: local_ip().await.to_string(),
        }
    }
}

/// Used and total bytes of the root filesystem, or the first disk
fn root_disk_usage(disks: &Disks) -> (u64, u64) {
    let list = disks.list();
    list.iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| list.first())
        .map(|disk| {
            let total = disk.total_space();
            (total.saturating_sub(disk.available_space()), total)
        })
        .unwrap_or((0, 0))
}

/// Primary local address, falling back to loopback when offline
pub async fn local_ip() -> IpAddr {
    match discover_local_ip().await {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!("Local IP discovery failed: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

async fn discover_local_ip() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(ROUTE_PROBE_ADDR).await?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_ip_is_never_unspecified() {
        assert!(!local_ip().await.is_unspecified());
    }

    #[tokio::test]
    async fn test_sysinfo_sample() {
        let mut sampler = SysinfoSampler::new();
        let snapshot = sampler.sample().await;

        assert!(snapshot.memory_total > 0);
        assert!(snapshot.memory_used <= snapshot.memory_total);
        assert!(snapshot.disk_used <= snapshot.disk_total);
        assert!((0.0..=100.0).contains(&snapshot.cpu_percent));
        assert!(!snapshot.hostname.is_empty());
        assert!(snapshot.timestamp > 0.0);
    }
}
