//! Process-wide discovery identity: UUID, server banner, device metadata and
//! the derived list of supported Search Targets.
//!
//! Generation and persistence are ambient collaborators per §1/§4.9; the
//! core only consumes the resulting [`DiscoveryIdentity`] value, threaded in
//! as plain data rather than read back out of a global.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use log::{debug, warn};
use uuid::Uuid;

use crate::config::{PKG_NAME, PKG_VERSION};

pub const ST_ALL: &str = "ssdp:all";
pub const ST_ROOT_DEVICE: &str = "upnp:rootdevice";

/// Externally-injected, mostly-static device facts (§4.9/§6).
#[derive(Clone, Debug)]
pub struct DeviceMetadata {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub manufacturer_url: Option<String>,
    pub model_name: String,
}

impl Default for DeviceMetadata {
    fn default() -> Self {
        DeviceMetadata {
            device_type: "urn:schemas-upnp-org:device:Basic:1".to_string(),
            friendly_name: PKG_NAME.to_string(),
            manufacturer: "Unknown".to_string(),
            manufacturer_url: None,
            model_name: PKG_NAME.to_string(),
        }
    }
}

/// Process-wide identity, set once at startup and read for the rest of the
/// process's lifetime (§3).
#[derive(Clone, Debug)]
pub struct DiscoveryIdentity {
    pub uuid: String,
    pub server_string: String,
    pub device: DeviceMetadata,
    supported_types: Vec<String>,
}

impl DiscoveryIdentity {
    pub fn new(uuid: String, server_string: String, device: DeviceMetadata) -> Self {
        let supported_types = vec![
            ST_ALL.to_string(),
            ST_ROOT_DEVICE.to_string(),
            device.device_type.clone(),
            uuid.clone(),
        ];
        DiscoveryIdentity {
            uuid,
            server_string,
            device,
            supported_types,
        }
    }

    /// `{"ssdp:all", "upnp:rootdevice", <device-type>, <uuid>}` (§3).
    pub fn supported_types(&self) -> &[String] {
        &self.supported_types
    }

    pub fn supports(&self, st: &str) -> bool {
        self.supported_types.iter().any(|s| s == st)
    }
}

/// Read a `uuid:...` line from `cache_path`, or generate and persist a new
/// variant-1/version-4 UUID when the file is missing or unparseable.
///
/// A failure to *write* the new UUID is logged at WARNING and does not
/// prevent startup (§4.9), the daemon just regenerates on every restart.
pub fn load_or_create_uuid(cache_path: &Path) -> String {
    if let Ok(contents) = fs::read_to_string(cache_path) {
        if let Some(line) = contents.lines().next() {
            if let Some(rest) = line.strip_prefix("uuid:") {
                if Uuid::parse_str(rest).is_ok() {
                    debug!("Using cached UUID from {}", cache_path.display());
                    return line.to_string();
                }
            }
        }
    }

    let generated = format!("uuid:{}", Uuid::new_v4());
    debug!("Creating new UUID cache file, {}", cache_path.display());
    if let Some(parent) = cache_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Cannot create UUID cache directory {}: {e}", parent.display());
        }
    }
    match fs::File::create(cache_path) {
        Ok(mut fp) => {
            if let Err(e) = writeln!(fp, "{generated}") {
                warn!("Cannot write UUID cache, {}: {e}", cache_path.display());
            }
        }
        Err(e) => warn!("Cannot create UUID cache, {}: {e}", cache_path.display()),
    }

    generated
}

/// Compose the `Server:` banner from `/etc/os-release`, falling back to a
/// built-in string. Successor of the original's `/etc/lsb-release` parsing.
pub fn server_banner(release_file: &Path) -> String {
    let fallback = format!("POSIX UPnP/1.0 {PKG_NAME}/{PKG_VERSION}");

    let Ok(contents) = fs::read_to_string(release_file) else {
        warn!("No {} found on system, using built-in server string.", release_file.display());
        return fallback;
    };

    let mut os = None;
    let mut ver = None;
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("NAME=") {
            os = Some(unquote(value));
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            ver = Some(unquote(value));
        }
    }

    match (os, ver) {
        (Some(os), Some(ver)) => format!("{os}/{ver} UPnP/1.0 {PKG_NAME}/{PKG_VERSION}"),
        _ => {
            warn!("Incomplete {}, using built-in server string.", release_file.display());
            fallback
        }
    }
}

fn unquote(value: &str) -> String {
    value.trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssdpd.cache");

        let first = load_or_create_uuid(&path);
        assert!(first.starts_with("uuid:"));

        let second = load_or_create_uuid(&path);
        assert_eq!(first, second, "second load must reuse the cached value");
    }

    #[test]
    fn falls_back_to_fresh_uuid_on_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssdpd.cache");
        fs::write(&path, "not a uuid\n").unwrap();

        let generated = load_or_create_uuid(&path);
        assert!(generated.starts_with("uuid:"));
        assert_ne!(generated, "uuid:not a uuid");
    }

    #[test]
    fn server_banner_falls_back_without_release_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("os-release");
        let banner = server_banner(&missing);
        assert!(banner.contains("UPnP/1.0"));
    }

    #[test]
    fn server_banner_parses_os_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("os-release");
        fs::write(&path, "NAME=\"Alpine Linux\"\nVERSION_ID=3.19\n").unwrap();
        let banner = server_banner(&path);
        assert_eq!(banner, "Alpine Linux/3.19 UPnP/1.0 ssdpd/0.1.0");
    }

    #[test]
    fn supported_types_include_catchall_root_and_uuid() {
        let identity = DiscoveryIdentity::new(
            "uuid:abc".to_string(),
            "test/1.0".to_string(),
            DeviceMetadata::default(),
        );
        assert!(identity.supports(ST_ALL));
        assert!(identity.supports(ST_ROOT_DEVICE));
        assert!(identity.supports("uuid:abc"));
        assert!(!identity.supports("urn:example:service:Printer:1"));
    }
}
