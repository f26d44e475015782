use crate::config::LoggerConfig;
use crate::error::{AttendanceError, Result};
use log::{error, info};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_serial::SerialPortBuilderExt;
pub use tokio_serial::{DataBits, FlowControl, Parity, SerialPortInfo, StopBits};

/// Byte stream from an opened device. Dropping it closes the port.
pub type DeviceStream = Box<dyn AsyncRead + Send + Unpin>;

/// serial port settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub timeout: Duration,
}

impl PortSettings {
    /// 8N1 without flow control, the firmware's framing.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        PortSettings {
            port_name: port_name.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            timeout: Duration::from_secs(1),
        }
    }

    /// settings for the port named in `config`
    pub fn from_config(config: &LoggerConfig) -> Self {
        let mut settings = Self::new(config.port_name.clone(), config.baud_rate);
        settings.timeout = config.read_timeout;
        settings
    }
}

/// Opens the device a session reads from.
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    fn connect(&self, settings: &PortSettings) -> Result<DeviceStream>;
}

/// Connector for real hardware through `tokio-serial`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    fn connect(&self, settings: &PortSettings) -> Result<DeviceStream> {
        match tokio_serial::new(settings.port_name.as_str(), settings.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(settings.flow_control)
            .timeout(settings.timeout)
            .open_native_async()
        {
            Ok(stream) => {
                info!(
                    "opened serial port {} at {} baud",
                    settings.port_name, settings.baud_rate
                );
                Ok(Box::new(stream))
            }
            Err(e) => {
                error!("could not open serial port {}: {}", settings.port_name, e);
                Err(AttendanceError::port_open(&settings.port_name, e.to_string()))
            }
        }
    }
}

/// Ports currently visible to the OS.
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    tokio_serial::available_ports().map_err(|e| AttendanceError::serial_port(e.to_string()))
}
