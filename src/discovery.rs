//! Device discovery and IP assignment (AutoIP)
//!
//! Cameras answer a UDP broadcast telegram on port 30718 with their identity
//! and network configuration. Two reply dialects exist: newer devices send a
//! self-describing binary record (tag 0x95), older CoLa-B devices an XML
//! document (tag 0x90). The same channel carries IP reconfiguration: a
//! 0x11 telegram addressed to one MAC, answered with 0x91 on success.

use crate::cola::ProtocolVariant;
use crate::endian::{push_be, read_be};
use crate::error::{Error, Result};
use crate::transport::{Transport, UdpTransport};
use rand::Rng;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use std::time::{Duration, Instant};

/// UDP port of the discovery protocol
pub const DISCOVERY_PORT: u16 = 30718;

/// Reply tags
const RPL_NETSCAN: u8 = 0x95;
const RPL_NETSCAN_COLA_B: u8 = 0x90;
const RPL_IP_CONFIG: u8 = 0x91;

/// Request tags
const CMD_SCAN: u8 = 0x10;
const CMD_IP_CONFIG: u8 = 0x11;

/// Smallest reply worth parsing (tag + header)
const MIN_REPLY_SIZE: usize = 17;

/// Largest expected reply datagram
const MAX_REPLY_SIZE: usize = 1400;

/// Socket receive timeout while polling for replies
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Hardware address of a discovered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    /// Lowercase, colon-separated hex
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<MacAddress> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for slot in bytes.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| Error::Other(format!("invalid MAC address '{}'", s)))?;
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| Error::Other(format!("invalid MAC address '{}'", s)))?;
        }
        if parts.next().is_some() {
            return Err(Error::Other(format!("invalid MAC address '{}'", s)));
        }
        Ok(MacAddress(bytes))
    }
}

/// One discovered camera
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub device_name: String,
    pub mac: MacAddress,
    pub ip_address: String,
    pub subnet: String,
    /// Control channel port announced by the device (0 when unknown)
    pub port: u16,
    /// Command protocol the reply dialect implies, when it implies one
    pub protocol: Option<ProtocolVariant>,
}

/// Dotted mask for a network prefix length (24 -> 255.255.255.0).
pub fn prefix_to_mask(prefix_length: u8) -> Ipv4Addr {
    let bits = if prefix_length == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_length.min(32) as u32)
    };
    Ipv4Addr::from(bits)
}

/// Directed broadcast address of the interface network
fn broadcast_address(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(mask))
}

/// Scanner bound to one local interface
pub struct DeviceScanner {
    server_ip: Ipv4Addr,
    server_mask: Ipv4Addr,
}

impl DeviceScanner {
    /// `server_ip`/`prefix_length` describe the local interface whose
    /// network is scanned.
    pub fn new(server_ip: Ipv4Addr, prefix_length: u8) -> DeviceScanner {
        DeviceScanner {
            server_ip,
            server_mask: prefix_to_mask(prefix_length),
        }
    }

    /// Broadcast a scan telegram and collect replies until `timeout`.
    pub fn scan(&self, timeout: Duration, port: u16) -> Result<Vec<DeviceInfo>> {
        let broadcast = broadcast_address(self.server_ip, self.server_mask);
        let mut transport =
            UdpTransport::broadcast(SocketAddrV4::new(broadcast, port), POLL_TIMEOUT)?;

        let telegram_id: u32 = rand::thread_rng().gen();
        let request = self.scan_request(telegram_id);
        transport.send(&request)?;
        log::debug!("scan telegram {:#010x} sent to {}", telegram_id, broadcast);

        let mut devices = Vec::new();
        let mut buf = [0u8; MAX_REPLY_SIZE];
        let start = Instant::now();

        while start.elapsed() < timeout {
            let n = match transport.recv(&mut buf) {
                Ok(n) => n,
                Err(_) => continue, // poll timeout, keep waiting
            };
            if n < MIN_REPLY_SIZE {
                continue;
            }
            let reply = &buf[..n];

            match reply[0] {
                RPL_NETSCAN => match parse_binary_reply(reply) {
                    Ok(device) => {
                        log::info!("found {} at {}", device.device_name, device.ip_address);
                        devices.push(device);
                    }
                    Err(e) => log::warn!("unparseable scan reply: {}", e),
                },
                RPL_NETSCAN_COLA_B => match parse_xml_reply(reply, telegram_id) {
                    Ok(Some(device)) => {
                        log::info!("found {} at {}", device.device_name, device.ip_address);
                        devices.push(device);
                    }
                    Ok(None) => {} // someone else's scan
                    Err(e) => log::warn!("unparseable scan reply: {}", e),
                },
                other => log::debug!("ignoring reply tag {:#04x}", other),
            }
        }

        Ok(devices)
    }

    /// Scan request telegram
    fn scan_request(&self, telegram_id: u32) -> Vec<u8> {
        let mut packet = Vec::with_capacity(24);
        packet.push(CMD_SCAN);
        packet.push(0x00); // reserved
        push_be(&mut packet, 8u16); // data block length
        packet.extend_from_slice(&[0xFF; 6]); // broadcast MAC
        push_be(&mut packet, telegram_id);
        packet.push(0x01); // CoLa scan telegram marker
        packet.push(0x00);
        packet.extend_from_slice(&self.server_ip.octets());
        packet.extend_from_slice(&self.server_mask.octets());
        packet
    }

    /// Assign a new IP configuration to the device with `mac`.
    ///
    /// CoLa-B devices take the configuration as an XML document, CoLa-2
    /// devices in binary. Returns false when no confirmation arrives within
    /// `timeout`.
    #[allow(clippy::too_many_arguments)]
    pub fn assign(
        &self,
        mac: MacAddress,
        variant: ProtocolVariant,
        ip: Ipv4Addr,
        prefix_length: u8,
        gateway: Ipv4Addr,
        dhcp: bool,
        timeout: Duration,
    ) -> Result<bool> {
        let mask = prefix_to_mask(prefix_length);

        let payload = match variant {
            ProtocolVariant::ColaB => ip_config_xml(mac, ip, mask, gateway, dhcp).into_bytes(),
            ProtocolVariant::Cola2 => {
                let mut payload = Vec::with_capacity(13);
                payload.extend_from_slice(&ip.octets());
                payload.extend_from_slice(&mask.octets());
                payload.extend_from_slice(&gateway.octets());
                payload.push(dhcp as u8);
                payload
            }
        };

        let telegram_id: u32 = rand::thread_rng().gen();
        let mut packet = Vec::with_capacity(16 + payload.len());
        packet.push(CMD_IP_CONFIG);
        packet.push(0x00);
        push_be(&mut packet, payload.len() as u16);
        packet.extend_from_slice(&mac.0);
        push_be(&mut packet, telegram_id);
        packet.push(0x01);
        packet.push(0x00);
        packet.extend_from_slice(&payload);

        let broadcast = broadcast_address(self.server_ip, self.server_mask);
        let mut transport =
            UdpTransport::broadcast(SocketAddrV4::new(broadcast, DISCOVERY_PORT), POLL_TIMEOUT)?;
        transport.send(&packet)?;
        log::info!("IP configuration sent to {}", mac);

        let mut buf = [0u8; MAX_REPLY_SIZE];
        let start = Instant::now();
        while start.elapsed() < timeout {
            let n = match transport.recv(&mut buf) {
                Ok(n) => n,
                Err(_) => continue,
            };
            if n >= MIN_REPLY_SIZE && buf[0] == RPL_IP_CONFIG {
                return Ok(true);
            }
        }
        log::warn!("no IP configuration confirmation from {}", mac);
        Ok(false)
    }
}

/// XML payload of a CoLa-B IP configuration telegram
fn ip_config_xml(
    mac: MacAddress,
    ip: Ipv4Addr,
    mask: Ipv4Addr,
    gateway: Ipv4Addr,
    dhcp: bool,
) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <IPconfig MACAddr=\"{mac}\">\
         <Item key=\"IPAddress\" value=\"{ip}\" />\
         <Item key=\"IPMask\" value=\"{mask}\" />\
         <Item key=\"IPGateway\" value=\"{gateway}\" />\
         <Item key=\"DHCPClientEnabled\" value=\"{dhcp}\" /></IPconfig>",
        mac = mac,
        ip = ip,
        mask = mask,
        gateway = gateway,
        dhcp = if dhcp { "TRUE" } else { "FALSE" },
    )
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Big-endian cursor over a reply datagram
struct BeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BeCursor<'a> {
    fn new(buf: &'a [u8], pos: usize) -> BeCursor<'a> {
        BeCursor { buf, pos }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(Error::Network("truncated discovery reply"))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(drop)
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(read_be(self.bytes(2)?))
    }

    fn string(&mut self, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.bytes(len)?).into_owned())
    }

    /// u16-length-prefixed string
    fn prefixed_string(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        self.string(len)
    }

    fn key4(&mut self) -> Result<[u8; 4]> {
        Ok(self.bytes(4)?.try_into().unwrap())
    }
}

/// Parse the binary (0x95) scan reply.
fn parse_binary_reply(reply: &[u8]) -> Result<DeviceInfo> {
    let mut device = DeviceInfo {
        protocol: Some(ProtocolVariant::Cola2),
        ..DeviceInfo::default()
    };

    // Tag, reserved, length, MAC and telegram id echo make up the first 16
    // bytes; the record proper starts after them.
    let mut cursor = BeCursor::new(reply, 16);
    cursor.skip(2)?; // device info version
    device.device_name = cursor.prefixed_string()?;
    cursor.skip(2 + 2 + 2 + 4 + 1)?; // CID version fields
    cursor.skip(1 + 2)?; // device state, required user action

    for _ in 0..5 {
        // device name, app name, project name, serial number, type code
        let _ = cursor.prefixed_string()?;
    }
    let _firmware = cursor.prefixed_string()?;
    let _order_number = cursor.prefixed_string()?;
    cursor.skip(1)?; // flags

    // Auxiliary key/value arrays.
    let aux_count = cursor.u16()?;
    for _ in 0..aux_count {
        cursor.skip(4)?;
        let len = cursor.u16()? as usize;
        cursor.skip(len)?;
    }

    // Scan interfaces.
    let interface_count = cursor.u16()?;
    for _ in 0..interface_count {
        cursor.skip(2)?;
        let len = cursor.u16()? as usize;
        cursor.skip(len)?;
    }

    // Com settings carry the network configuration.
    let com_count = cursor.u16()?;
    for _ in 0..com_count {
        let key = cursor.key4()?;
        let len = cursor.u16()? as usize;
        match &key {
            b"EMAC" => device.mac = MacAddress(cursor.bytes(6)?.try_into().unwrap()),
            b"EIPa" => {
                let octets: [u8; 4] = cursor.bytes(4)?.try_into().unwrap();
                device.ip_address = Ipv4Addr::from(octets).to_string();
            }
            b"ENMa" => {
                let octets: [u8; 4] = cursor.bytes(4)?.try_into().unwrap();
                device.subnet = Ipv4Addr::from(octets).to_string();
            }
            b"EDGa" => cursor.skip(4)?,
            b"EDhc" => cursor.skip(1)?,
            b"ECDu" => cursor.skip(4)?,
            _ => cursor.skip(len)?,
        }
    }

    // Endpoint list: the first advertised port wins.
    let endpoint_count = cursor.u16()?;
    'endpoints: for _ in 0..endpoint_count {
        cursor.skip(1)?; // CoLa version
        let entry_count = cursor.u16()?;
        for _ in 0..entry_count {
            let key = cursor.key4()?;
            let len = cursor.u16()? as usize;
            if &key == b"DPNo" {
                device.port = cursor.u16()?;
                break 'endpoints;
            }
            cursor.skip(len)?;
        }
    }

    Ok(device)
}

/// Parse the XML (0x90) scan reply; `None` when the telegram id belongs to a
/// different scan.
fn parse_xml_reply(reply: &[u8], expected_telegram_id: u32) -> Result<Option<DeviceInfo>> {
    let mut cursor = BeCursor::new(reply, 1);
    cursor.skip(1)?; // unused
    let payload_len = cursor.u16()? as usize;
    cursor.skip(6)?; // MAC, repeated inside the XML
    let telegram_id: u32 = read_be(cursor.bytes(4)?);
    if telegram_id != expected_telegram_id {
        return Ok(None);
    }
    cursor.skip(2)?;

    let xml = cursor.string(payload_len)?;
    let doc = roxmltree::Document::parse(&xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "NetScanResult" {
        return Err(Error::Network("unexpected scan reply document"));
    }

    let mut device = DeviceInfo {
        mac: root
            .attribute("MACAddr")
            .unwrap_or_default()
            .parse()
            .unwrap_or_default(),
        ..DeviceInfo::default()
    };

    for item in root.children().filter(|n| n.is_element()) {
        let key = item.attribute("key").unwrap_or_default();
        let value = item.attribute("value").unwrap_or_default();
        match key {
            "IPAddress" => device.ip_address = value.to_string(),
            "IPMask" => device.subnet = value.to_string(),
            "HostPortNo" => match value.parse::<u16>() {
                Ok(port) if port != 0 => device.port = port,
                _ => {
                    log::warn!(
                        "invalid port number '{}' announced by device at {}",
                        value,
                        device.ip_address
                    );
                }
            },
            "DeviceType" => device.device_name = value.to_string(),
            _ => {}
        }
    }

    Ok(Some(device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_roundtrip() {
        let mac: MacAddress = "00:06:77:0a:ff:42".parse().unwrap();
        assert_eq!(mac.0, [0x00, 0x06, 0x77, 0x0A, 0xFF, 0x42]);
        assert_eq!(mac.to_string(), "00:06:77:0a:ff:42");

        assert!("00:06:77".parse::<MacAddress>().is_err());
        assert!("00:06:77:0a:ff:42:13".parse::<MacAddress>().is_err());
        assert!("zz:06:77:0a:ff:42".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_prefix_to_mask() {
        assert_eq!(prefix_to_mask(24), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(prefix_to_mask(16), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(prefix_to_mask(25), Ipv4Addr::new(255, 255, 255, 128));
        assert_eq!(prefix_to_mask(0), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(prefix_to_mask(32), Ipv4Addr::new(255, 255, 255, 255));
    }

    #[test]
    fn test_broadcast_address() {
        assert_eq!(
            broadcast_address(Ipv4Addr::new(192, 168, 1, 10), Ipv4Addr::new(255, 255, 255, 0)),
            Ipv4Addr::new(192, 168, 1, 255)
        );
    }

    #[test]
    fn test_scan_request_layout() {
        let scanner = DeviceScanner::new(Ipv4Addr::new(192, 168, 1, 10), 24);
        let packet = scanner.scan_request(0xA1B2C3D4);
        assert_eq!(packet[0], 0x10);
        assert_eq!(&packet[2..4], &[0x00, 0x08]);
        assert_eq!(&packet[4..10], &[0xFF; 6]);
        assert_eq!(&packet[10..14], &[0xA1, 0xB2, 0xC3, 0xD4]);
        assert_eq!(&packet[14..16], &[0x01, 0x00]);
        assert_eq!(&packet[16..20], &[192, 168, 1, 10]);
        assert_eq!(&packet[20..24], &[255, 255, 255, 0]);
    }

    #[test]
    fn test_parse_xml_reply() {
        let xml = r#"<NetScanResult MACAddr="00:06:77:0a:ff:42">
            <Item key="IPAddress" value="192.168.1.42" />
            <Item key="IPMask" value="255.255.255.0" />
            <Item key="HostPortNo" value="2112" />
            <Item key="DeviceType" value="Visionary-T AG" />
        </NetScanResult>"#;
        let mut reply = vec![0x90, 0x00];
        reply.extend_from_slice(&(xml.len() as u16).to_be_bytes());
        reply.extend_from_slice(&[0x00, 0x06, 0x77, 0x0A, 0xFF, 0x42]);
        reply.extend_from_slice(&0xFEED_F00Du32.to_be_bytes());
        reply.extend_from_slice(&[0x00, 0x00]);
        reply.extend_from_slice(xml.as_bytes());

        let device = parse_xml_reply(&reply, 0xFEED_F00D).unwrap().unwrap();
        assert_eq!(device.device_name, "Visionary-T AG");
        assert_eq!(device.ip_address, "192.168.1.42");
        assert_eq!(device.subnet, "255.255.255.0");
        assert_eq!(device.port, 2112);
        assert_eq!(device.mac.to_string(), "00:06:77:0a:ff:42");

        // A reply to someone else's telegram is ignored.
        assert!(parse_xml_reply(&reply, 0x12345678).unwrap().is_none());
    }

    fn prefixed(out: &mut Vec<u8>, s: &str) {
        out.extend_from_slice(&(s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
    }

    #[test]
    fn test_parse_binary_reply() {
        let mut reply = vec![0x95, 0x00];
        reply.extend_from_slice(&[0x00, 0x00]); // length, unused by the parser
        reply.extend_from_slice(&[0xAA; 6]); // MAC echo
        reply.extend_from_slice(&[0x00; 4]); // telegram id echo
        reply.extend_from_slice(&[0x00, 0x00]);

        reply.extend_from_slice(&[0x00, 0x01]); // device info version
        prefixed(&mut reply, "SICK Visionary-T Mini"); // CID name
        reply.extend_from_slice(&[0u8; 2 + 2 + 2 + 4 + 1]); // CID version
        reply.push(0); // device state
        reply.extend_from_slice(&[0, 0]); // required user action
        for s in ["VisionaryTMini", "app", "proj", "12345678", "1112233"] {
            prefixed(&mut reply, s);
        }
        prefixed(&mut reply, "1.0.0"); // firmware
        prefixed(&mut reply, "654321"); // order number
        reply.push(0); // flags
        reply.extend_from_slice(&[0x00, 0x00]); // aux array
        reply.extend_from_slice(&[0x00, 0x00]); // scan interfaces

        reply.extend_from_slice(&[0x00, 0x03]); // three com settings
        reply.extend_from_slice(b"EMAC");
        reply.extend_from_slice(&[0x00, 0x06]);
        reply.extend_from_slice(&[0x00, 0x06, 0x77, 0x01, 0x02, 0x03]);
        reply.extend_from_slice(b"EIPa");
        reply.extend_from_slice(&[0x00, 0x04]);
        reply.extend_from_slice(&[192, 168, 0, 99]);
        reply.extend_from_slice(b"ENMa");
        reply.extend_from_slice(&[0x00, 0x04]);
        reply.extend_from_slice(&[255, 255, 0, 0]);

        reply.extend_from_slice(&[0x00, 0x01]); // one endpoint
        reply.push(2); // CoLa version
        reply.extend_from_slice(&[0x00, 0x01]); // one entry
        reply.extend_from_slice(b"DPNo");
        reply.extend_from_slice(&[0x00, 0x02]);
        reply.extend_from_slice(&2122u16.to_be_bytes());

        let device = parse_binary_reply(&reply).unwrap();
        assert_eq!(device.device_name, "SICK Visionary-T Mini");
        assert_eq!(device.mac.to_string(), "00:06:77:01:02:03");
        assert_eq!(device.ip_address, "192.168.0.99");
        assert_eq!(device.subnet, "255.255.0.0");
        assert_eq!(device.port, 2122);
        assert_eq!(device.protocol, Some(ProtocolVariant::Cola2));
    }

    #[test]
    fn test_truncated_binary_reply_rejected() {
        let reply = vec![0x95; 20];
        assert!(parse_binary_reply(&reply).is_err());
    }

    #[test]
    fn test_ip_config_xml_payload() {
        let xml = ip_config_xml(
            "00:06:77:0a:ff:42".parse().unwrap(),
            Ipv4Addr::new(10, 0, 0, 5),
            Ipv4Addr::new(255, 0, 0, 0),
            Ipv4Addr::new(10, 0, 0, 1),
            false,
        );
        assert!(xml.contains("MACAddr=\"00:06:77:0a:ff:42\""));
        assert!(xml.contains("key=\"IPAddress\" value=\"10.0.0.5\""));
        assert!(xml.contains("key=\"DHCPClientEnabled\" value=\"FALSE\""));
    }
}
