//! Serial port handling
//!
//! Opens and configures the modem's serial device and enumerates candidates.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::time::Duration;
use tracing::{debug, warn};

use super::ModemError;
use crate::config::ModemConfig;

/// Per-read timeout on the port; the session's deadline sits on top of it
pub const PORT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

/// USB vendors whose devices are cellular modems
const MODEM_VENDORS: &[(u16, &str)] = &[
    (0x12d1, "Huawei"),
    (0x19d2, "ZTE"),
    (0x1199, "Sierra Wireless"),
    (0x1bc7, "Telit"),
    (0x1e0e, "SIMCom"),
    (0x2c7c, "Quectel"),
    (0x1546, "u-blox"),
];

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    /// Vendor name when the USB vendor ID belongs to a known modem maker
    pub fn modem_vendor(&self) -> Option<&'static str> {
        let vid = self.vid?;
        MODEM_VENDORS
            .iter()
            .find(|(known, _)| *known == vid)
            .map(|(_, name)| *name)
    }

    /// Short description for listings
    pub fn describe(&self) -> String {
        match (self.modem_vendor(), &self.product) {
            (Some(vendor), Some(product)) => format!("{} modem ({})", vendor, product),
            (Some(vendor), None) => format!("{} modem", vendor),
            (None, Some(product)) => product.clone(),
            (None, None) => String::new(),
        }
    }

    /// Known modems first, then other USB serial devices, then the rest
    fn rank(&self) -> (u8, &str) {
        let class = if self.modem_vendor().is_some() {
            0
        } else if self.vid.is_some() {
            1
        } else {
            2
        };
        (class, &self.name)
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb) => Self {
                name: info.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                manufacturer: usb.manufacturer,
                product: usb.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

fn sort_ports(ports: &mut [PortInfo]) {
    ports.sort_by(|a, b| a.rank().cmp(&b.rank()));
}

/// List serial ports, likely modems first
pub fn list_ports() -> Vec<PortInfo> {
    let mut ports: Vec<PortInfo> = match serialport::available_ports() {
        Ok(found) => found.into_iter().map(PortInfo::from).collect(),
        Err(e) => {
            warn!("serial port enumeration failed: {}", e);
            Vec::new()
        }
    };
    sort_ports(&mut ports);
    ports.dedup_by(|a, b| a.name == b.name);
    ports
}

/// Open and configure the device named in `config`
pub fn open_port(config: &ModemConfig) -> Result<Box<dyn SerialPort>, ModemError> {
    debug!(
        "opening {} at {} baud",
        config.device, config.baud_rate
    );
    let mut port = serialport::new(&config.device, config.baud_rate)
        .timeout(PORT_POLL_TIMEOUT)
        .open()
        .map_err(|e| ModemError::Serial(format!("{}: {}", config.device, e)))?;
    configure_port(port.as_mut())?;
    Ok(port)
}

/// Configure a port for 8N1 without flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), ModemError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| ModemError::Serial(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| ModemError::Serial(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| ModemError::Serial(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| ModemError::Serial(e.to_string()))?;

    // Modems treat a DTR drop as hang-up; keep it asserted
    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!("failed to set DTR high: {} (continuing)", e);
    }

    port.clear(serialport::ClearBuffer::All)
        .map_err(|e| ModemError::Serial(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_ports() {
        // Only checks enumeration doesn't panic on this host
        let _ = list_ports();
    }

    fn usb(name: &str, vid: u16, product: Option<&str>) -> PortInfo {
        PortInfo {
            vid: Some(vid),
            pid: Some(0x0001),
            product: product.map(str::to_string),
            ..PortInfo::bare(name.to_string())
        }
    }

    #[test]
    fn test_modems_sort_first() {
        let mut ports = vec![
            PortInfo::bare("/dev/ttyS0".into()),
            usb("/dev/ttyUSB0", 0x0403, Some("FT232R")),
            usb("/dev/ttyUSB3", 0x2c7c, Some("EC25")),
            PortInfo::bare("/dev/ttyAMA0".into()),
            usb("/dev/ttyUSB2", 0x2c7c, None),
        ];
        sort_ports(&mut ports);
        let ordered: Vec<&str> = ports.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            ordered,
            vec![
                "/dev/ttyUSB2",
                "/dev/ttyUSB3",
                "/dev/ttyUSB0",
                "/dev/ttyAMA0",
                "/dev/ttyS0",
            ]
        );
    }

    #[test]
    fn test_describe_names_modem_vendor() {
        assert_eq!(usb("/dev/ttyUSB3", 0x2c7c, Some("EC25")).describe(), "Quectel modem (EC25)");
        assert_eq!(usb("/dev/ttyUSB0", 0x12d1, None).describe(), "Huawei modem");
        assert_eq!(usb("/dev/ttyUSB0", 0x0403, Some("FT232R")).describe(), "FT232R");
        assert_eq!(PortInfo::bare("/dev/ttyS0".into()).describe(), "");
        assert_eq!(PortInfo::bare("/dev/ttyS0".into()).modem_vendor(), None);
    }

    #[test]
    fn test_open_missing_device_names_it() {
        let config = ModemConfig {
            device: "/dev/does-not-exist-modem".into(),
            ..ModemConfig::default()
        };
        let err = open_port(&config).err().unwrap();
        assert!(err.to_string().contains("/dev/does-not-exist-modem"));
    }
}
