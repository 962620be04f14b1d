//! Click analytics helpers
//!
//! Client IP extraction from proxy headers and offline country lookup
//! against a MaxMind MMDB file. Neither ever fails a redirect: missing
//! data degrades to "unknown".

pub mod geoip;
pub mod ip_extractor;

pub use geoip::GeoIpService;
pub use ip_extractor::extract_client_ip;
