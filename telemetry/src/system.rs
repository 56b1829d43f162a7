use std::net::{IpAddr, UdpSocket};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use core_types::{NetworkInterface, TelemetrySnapshot, UNAVAILABLE, select_mac};
use sysinfo::{Components, Disks, MINIMUM_CPU_UPDATE_INTERVAL, Networks, System};
use tracing::{debug, warn};

use crate::{DirectoryFacts, PublicIpLookup, TelemetrySource, resolve_domain};

/// Everything read from the OS in one blocking pass. `None` means the value
/// could not be read.
#[derive(Debug, Clone, Default)]
pub struct HostReading {
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub cpu_percent: f64,
    pub cpu_speed_mhz: Option<u64>,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub cpu_temperature: Option<f64>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub ip_local: Option<String>,
    pub interfaces: Vec<NetworkInterface>,
}

pub const DEFAULT_HOST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Production source backed by `sysinfo`.
pub struct SysinfoSource {
    directory: Arc<dyn DirectoryFacts>,
    public_ip: PublicIpLookup,
    reader: fn() -> HostReading,
    host_timeout: Duration,
}

impl SysinfoSource {
    pub fn new(directory: Arc<dyn DirectoryFacts>, public_ip: PublicIpLookup) -> Self {
        Self {
            directory,
            public_ip,
            reader: read_host,
            host_timeout: DEFAULT_HOST_READ_TIMEOUT,
        }
    }

    /// Upper bound on the blocking OS pass. Past it every host field falls
    /// back to its sentinel.
    pub fn with_host_timeout(mut self, timeout: Duration) -> Self {
        self.host_timeout = timeout;
        self
    }

    /// Swaps the OS pass, e.g. for a canned reading.
    pub fn with_reader(mut self, reader: fn() -> HostReading) -> Self {
        self.reader = reader;
        self
    }

    async fn read_host_bounded(&self) -> HostReading {
        let task = tokio::task::spawn_blocking(self.reader);
        match tokio::time::timeout(self.host_timeout, task).await {
            Ok(Ok(reading)) => reading,
            Ok(Err(e)) => {
                warn!("host reading task failed: {e}");
                HostReading::default()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.host_timeout.as_millis() as u64,
                    "host reading stalled, answering with sentinels"
                );
                HostReading::default()
            }
        }
    }
}

#[async_trait]
impl TelemetrySource for SysinfoSource {
    async fn sample(&self) -> TelemetrySnapshot {
        // CPU usage needs two refreshes a short interval apart, so the whole
        // OS pass runs on the blocking pool.
        let (host, ip_public) = tokio::join!(self.read_host_bounded(), self.public_ip.fetch());

        let hostname = host.hostname.unwrap_or_else(|| UNAVAILABLE.to_string());
        let domain = resolve_domain(self.directory.domain().as_deref(), &hostname);

        let mac_address = select_mac(&host.interfaces, host.ip_local.as_deref());

        TelemetrySnapshot {
            hostname,
            serial_number: host.serial_number.unwrap_or_else(|| UNAVAILABLE.to_string()),
            cpu_percent: host.cpu_percent,
            memory_percent: host.memory_percent,
            disk_percent: host.disk_percent,
            cpu_temperature: host.cpu_temperature,
            cpu_speed_mhz: host.cpu_speed_mhz,
            mac_address,
            manufacturer: host.manufacturer.unwrap_or_else(|| UNAVAILABLE.to_string()),
            model: host.model.unwrap_or_else(|| UNAVAILABLE.to_string()),
            os: host.os.unwrap_or_else(|| UNAVAILABLE.to_string()),
            domain: domain.domain,
            user: self
                .directory
                .user()
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            ip_public: ip_public.unwrap_or_else(|| UNAVAILABLE.to_string()),
            ip_local: host.ip_local.unwrap_or_else(|| UNAVAILABLE.to_string()),
            network_interfaces: host.interfaces,
        }
    }
}

fn read_host() -> HostReading {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu_usage();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();
    sys.refresh_cpu_frequency();

    let total = sys.total_memory();
    let memory_percent = if total > 0 {
        sys.used_memory() as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let disks = Disks::new_with_refreshed_list();
    let disk_percent = root_disk_percent(
        disks
            .list()
            .iter()
            .map(|d| (d.mount_point(), d.total_space(), d.available_space())),
    );

    let components = Components::new_with_refreshed_list();
    let cpu_temperature = pick_cpu_temperature(
        components
            .list()
            .iter()
            .map(|c| (c.label(), c.temperature())),
    );

    let reading = HostReading {
        hostname: System::host_name(),
        os: System::long_os_version(),
        cpu_percent: f64::from(sys.global_cpu_usage()),
        cpu_speed_mhz: sys.cpus().first().map(|c| c.frequency()).filter(|f| *f > 0),
        memory_percent,
        disk_percent,
        cpu_temperature,
        serial_number: read_dmi("product_serial"),
        manufacturer: read_dmi("sys_vendor"),
        model: read_dmi("product_name"),
        ip_local: local_ip(),
        interfaces: network_interfaces(),
    };
    debug!(?reading, "host reading");
    reading
}

/// Usage of the disk mounted at the filesystem root (`/` or `C:\`), falling
/// back to the first disk.
pub fn root_disk_percent<'a, I>(disks: I) -> f64
where
    I: IntoIterator<Item = (&'a Path, u64, u64)>,
{
    let disks: Vec<_> = disks.into_iter().collect();
    let is_root = |p: &Path| p == Path::new("/") || p.to_string_lossy().eq_ignore_ascii_case("C:\\");

    disks
        .iter()
        .find(|(mount, _, _)| is_root(mount))
        .or_else(|| disks.first())
        .filter(|(_, total, _)| *total > 0)
        .map(|(_, total, available)| {
            (total.saturating_sub(*available)) as f64 / *total as f64 * 100.0
        })
        .unwrap_or(0.0)
}

/// Hottest sensor that looks like a CPU package or core.
pub fn pick_cpu_temperature<'a, I>(sensors: I) -> Option<f64>
where
    I: IntoIterator<Item = (&'a str, f32)>,
{
    const CPU_LABELS: [&str; 6] = ["cpu", "package", "core", "tctl", "tdie", "k10temp"];

    sensors
        .into_iter()
        .filter(|(label, _)| {
            let label = label.to_ascii_lowercase();
            CPU_LABELS.iter().any(|needle| label.contains(needle))
        })
        .map(|(_, temp)| f64::from(temp))
        .filter(|t| t.is_finite() && *t > 0.0)
        .fold(None, |max: Option<f64>, t| Some(max.map_or(t, |m| m.max(t))))
}

/// Adapters sorted by name; the first IPv4 address wins, else the first IPv6.
fn network_interfaces() -> Vec<NetworkInterface> {
    let networks = Networks::new_with_refreshed_list();
    let mut list: Vec<NetworkInterface> = networks
        .list()
        .iter()
        .map(|(name, data)| {
            let addrs: Vec<IpAddr> = data.ip_networks().iter().map(|n| n.addr).collect();
            let ip = addrs
                .iter()
                .find(|a| a.is_ipv4())
                .or_else(|| addrs.first())
                .map(|a| a.to_string());
            let mac = Some(data.mac_address().to_string())
                .filter(|m| m != "00:00:00:00:00:00");
            NetworkInterface {
                name: name.clone(),
                ip,
                mac,
            }
        })
        .collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    list
}

/// Address of the interface the default route leaves through. Connecting a
/// UDP socket sends nothing.
fn local_ip() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?.ip();
    (!addr.is_unspecified()).then(|| addr.to_string())
}

fn read_dmi(field: &str) -> Option<String> {
    let path = Path::new("/sys/class/dmi/id").join(field);
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
