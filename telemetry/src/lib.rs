//! Where snapshots come from.
//!
//! The incident pipeline only sees [`TelemetrySource`] and [`DirectoryFacts`];
//! [`SysinfoSource`] is the production implementation and [`StaticSource`]
//! replays a fixed snapshot.

mod directory;
mod public_ip;
mod source;
mod system;

pub use directory::{DirectoryFacts, DomainStatus, EnvDirectory, StaticDirectory, resolve_domain};
pub use public_ip::{DEFAULT_PUBLIC_IP_URL, PublicIpLookup};
pub use source::{StaticSource, TelemetrySource};
pub use system::{
    DEFAULT_HOST_READ_TIMEOUT, HostReading, SysinfoSource, pick_cpu_temperature, root_disk_percent,
};
