//! Country lookup using a MaxMind GeoLite2/GeoIP2 MMDB
//!
//! The database is memory-mapped once at startup and shared through an
//! `Arc`, so lookups are lock-free and synchronous.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::models::UNKNOWN_COUNTRY;

/// Offline IP to country resolver. Without a database every lookup
/// answers "unknown".
#[derive(Clone, Default)]
pub struct GeoIpService {
    reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoIpService {
    /// Open the MMDB at `path`, or build a disabled service when `path` is None
    pub fn new(path: Option<&str>) -> Result<Self> {
        let reader = if let Some(path) = path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        Ok(Self { reader })
    }

    pub fn disabled() -> Self {
        Self { reader: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.reader.is_some()
    }

    /// Resolve a raw client address to an ISO country code.
    ///
    /// Accepts a bare address, the first hop of a comma-separated
    /// forwarded chain, IPv6-mapped IPv4 (`::ffff:1.2.3.4`) and `ip:port`.
    /// Any failure yields "unknown".
    pub fn country_for(&self, raw: &str) -> String {
        normalize_ip(raw)
            .and_then(|ip| self.lookup_country(ip))
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string())
    }

    fn lookup_country(&self, ip: IpAddr) -> Option<String> {
        let reader = self.reader.as_ref()?;
        let result = reader.lookup(ip).ok()?;

        // City databases are a superset of Country, so this decodes either.
        let country = result.decode::<geoip2::Country>().ok()??;
        let code = country.country.iso_code?;

        if code.is_empty() {
            None
        } else {
            Some(code.to_string())
        }
    }
}

/// Reduce a raw header or socket value to a single address
pub fn normalize_ip(raw: &str) -> Option<IpAddr> {
    let first = raw.split(',').next()?.trim().trim_matches('"');
    if first.is_empty() {
        return None;
    }

    let ip = first
        .parse::<IpAddr>()
        .or_else(|_| first.parse::<SocketAddr>().map(|addr| addr.ip()))
        .ok()?;

    Some(unmap_ipv4(ip))
}

fn unmap_ipv4(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}
