use core_types::LOCAL_DOMAIN;

/// Domain membership and logged-on user, as reported by the host.
pub trait DirectoryFacts: Send + Sync {
    /// Raw domain / workgroup name, if the host reports one.
    fn domain(&self) -> Option<String>;

    fn user(&self) -> Option<String>;

    fn host_name(&self) -> Option<String>;

    /// Domain membership with the `LOCAL` fallback applied.
    fn domain_status(&self) -> DomainStatus {
        let host = self.host_name().unwrap_or_default();
        resolve_domain(self.domain().as_deref(), &host)
    }
}

/// Result of interpreting the raw domain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainStatus {
    pub is_in_domain: bool,
    /// The domain name, or `LOCAL` when not joined.
    pub domain: String,
}

/// A host is domain-joined when it reports a domain that is neither empty,
/// `WORKGROUP`, nor its own host name (a standalone Windows machine reports
/// its computer name as `USERDOMAIN`).
pub fn resolve_domain(raw: Option<&str>, hostname: &str) -> DomainStatus {
    let joined = raw
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .filter(|d| !d.eq_ignore_ascii_case("WORKGROUP"))
        .filter(|d| !d.eq_ignore_ascii_case(hostname.trim()));

    match joined {
        Some(domain) => DomainStatus {
            is_in_domain: true,
            domain: domain.to_string(),
        },
        None => DomainStatus {
            is_in_domain: false,
            domain: LOCAL_DOMAIN.to_string(),
        },
    }
}

/// Reads `USERDOMAIN` and `USERNAME` (or `USER`) from the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvDirectory;

impl DirectoryFacts for EnvDirectory {
    fn domain(&self) -> Option<String> {
        std::env::var("USERDOMAIN").ok()
    }

    fn user(&self) -> Option<String> {
        std::env::var("USERNAME")
            .or_else(|_| std::env::var("USER"))
            .ok()
            .filter(|u| !u.is_empty())
    }

    fn host_name(&self) -> Option<String> {
        sysinfo::System::host_name()
    }
}

/// Fixed answers.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    pub domain: Option<String>,
    pub user: Option<String>,
    pub host_name: Option<String>,
}

impl DirectoryFacts for StaticDirectory {
    fn domain(&self) -> Option<String> {
        self.domain.clone()
    }

    fn user(&self) -> Option<String> {
        self.user.clone()
    }

    fn host_name(&self) -> Option<String> {
        self.host_name.clone()
    }
}
