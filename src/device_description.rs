//! The Device Description Template (§4.13): the fixed UPnP XML document with
//! substitution slots, rendered with plain string formatting.

use crate::identity::DiscoveryIdentity;

const TEMPLATE: &str = concat!(
    "<?xml version=\"1.0\"?>\r\n",
    "<root xmlns=\"urn:schemas-upnp-org:device-1-0\">\r\n",
    " <specVersion>\r\n",
    "   <major>1</major>\r\n",
    "   <minor>0</minor>\r\n",
    " </specVersion>\r\n",
    " <device>\r\n",
    "  <deviceType>{device_type}</deviceType>\r\n",
    "  <friendlyName>{friendly_name}</friendlyName>\r\n",
    "  <manufacturer>{manufacturer}</manufacturer>\r\n",
    "{manufacturer_url_line}",
    "  <modelName>{model_name}</modelName>\r\n",
    "  <UDN>{uuid}</UDN>\r\n",
    "  <presentationURL>http://{presentation_url}</presentationURL>\r\n",
    " </device>\r\n",
    "</root>\r\n",
);

/// Render the description document for a client that reached the server
/// via `presentation_host` (the unmapped IPv4 literal, or bracketed IPv6).
pub fn render(identity: &DiscoveryIdentity, presentation_host: &str) -> String {
    let manufacturer_url_line = match &identity.device.manufacturer_url {
        Some(url) => format!("  <manufacturerURL>{url}</manufacturerURL>\r\n"),
        None => String::new(),
    };

    TEMPLATE
        .replace("{device_type}", &identity.device.device_type)
        .replace("{friendly_name}", &identity.device.friendly_name)
        .replace("{manufacturer}", &identity.device.manufacturer)
        .replace("{manufacturer_url_line}", &manufacturer_url_line)
        .replace("{model_name}", &identity.device.model_name)
        .replace("{uuid}", &identity.uuid)
        .replace("{presentation_url}", presentation_host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DeviceMetadata;

    #[test]
    fn renders_udn_and_presentation_url() {
        let identity = DiscoveryIdentity::new(
            "uuid:12345678-1234-4abc-8abc-1234567890ab".to_string(),
            "test/1.0".to_string(),
            DeviceMetadata::default(),
        );
        let xml = render(&identity, "192.168.1.10");
        assert!(xml.contains("<UDN>uuid:12345678-1234-4abc-8abc-1234567890ab</UDN>"));
        assert!(xml.contains("<presentationURL>http://192.168.1.10</presentationURL>"));
        assert!(!xml.contains("manufacturerURL"));
    }

    #[test]
    fn includes_manufacturer_url_when_present() {
        let mut device = DeviceMetadata::default();
        device.manufacturer_url = Some("https://example.com".to_string());
        let identity = DiscoveryIdentity::new("uuid:abc".to_string(), "test/1.0".to_string(), device);
        let xml = render(&identity, "192.168.1.10");
        assert!(xml.contains("<manufacturerURL>https://example.com</manufacturerURL>"));
    }
}
