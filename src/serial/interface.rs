use std::io::{Read, Write};
use std::time::Duration;
use serialport::{SerialPort, SerialPortType};
use tokio::time::{sleep, Instant};

use super::{Result, SerialError};

// Fermentor firmware runs its UART at 9600 baud
pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_OPEN_TIMEOUT_MS: u64 = 1000;

const READ_CHUNK_SIZE: usize = 512;
const MAX_PARTIAL_LEN: usize = 8192;
const TRIMMED_PARTIAL_LEN: usize = 4096;

/// Byte-level access to an open serial device.
///
/// `read_data` returns `SerialError::Timeout` when nothing arrived within
/// `timeout_ms`; callers treat that as "no data yet", not as a failure.
#[async_trait::async_trait]
pub trait SerialPortIO: Send {
    async fn send_data(&mut self, data: &[u8]) -> Result<()>;
    async fn read_data(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize>;
    async fn flush(&mut self) -> Result<()>;
}

/// Opens a named port. Split out so discovery can run against fake devices.
pub trait PortOpener: Send + Sync {
    fn open(&self, port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPortIO>>;
}

/// Opens real OS serial ports through the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPortIO>> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| SerialError::ConnectionFailed(format!("{}: {}", port_name, e)))?;

        Ok(Box::new(NativePort::new(port)))
    }
}

pub struct NativePort {
    port: Box<dyn SerialPort>,
}

impl NativePort {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

#[async_trait::async_trait]
impl SerialPortIO for NativePort {
    async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data).map_err(SerialError::IoError)
    }

    async fn read_data(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        // Poll the driver queue instead of blocking in read() so the lock
        // around the interface is released within the caller's window.
        loop {
            match self.port.bytes_to_read() {
                Ok(0) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(SerialError::Timeout);
                    }
                    sleep((deadline - now).min(Duration::from_millis(10))).await;
                }
                Ok(_) => match self.port.read(buf) {
                    Ok(bytes_read) => return Ok(bytes_read),
                    Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        if Instant::now() >= deadline {
                            return Err(SerialError::Timeout);
                        }
                    }
                    Err(e) => return Err(SerialError::IoError(e)),
                },
                Err(e) => return Err(SerialError::SerialportError(e)),
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        self.port.flush().map_err(SerialError::IoError)
    }
}

/// Decoding counters kept by the line reassembler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    pub utf8_decode_errors: u64,
    pub partial_buffer_trims: u64,
}

/// The single owner of the fermentor's serial connection.
///
/// Holds at most one open port. Reads are reassembled into lines here so the
/// poll loop only ever sees complete telemetry lines.
pub struct SerialInterface {
    port: Option<Box<dyn SerialPortIO>>,
    port_name: Option<String>,
    terminator: String,
    partial: String,
    stats: LineStats,
}

impl SerialInterface {
    pub fn new() -> Self {
        Self {
            port: None,
            port_name: None,
            terminator: String::new(),
            partial: String::new(),
            stats: LineStats::default(),
        }
    }

    /// Wrap an already open port
    pub fn from_io(port_name: &str, io: Box<dyn SerialPortIO>) -> Self {
        let mut interface = Self::new();
        interface.attach(port_name, io);
        interface
    }

    /// Suffix appended to every outgoing command line
    pub fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    /// List serial ports the OS currently reports
    pub fn detected_port_names() -> Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        let mut names = Vec::with_capacity(ports.len());

        for port in ports {
            if let SerialPortType::UsbPort(usb_info) = &port.port_type {
                log::debug!(
                    "Detected USB serial port {} (vid={:04X} pid={:04X} product={:?})",
                    port.port_name, usb_info.vid, usb_info.pid, usb_info.product
                );
            }
            names.push(port.port_name);
        }

        Ok(names)
    }

    /// Try each candidate in order and keep the first one that opens.
    ///
    /// Candidates after the first success are never touched. When every
    /// candidate fails the error lists each one, tried exactly once.
    pub fn discover_and_open(
        &mut self,
        candidates: &[String],
        opener: &dyn PortOpener,
        baud_rate: u32,
        open_timeout: Duration,
    ) -> Result<String> {
        self.disconnect();

        let mut tried = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            log::info!("Opening serial port on {} ...", candidate);
            tried.push(candidate.clone());

            match opener.open(candidate, baud_rate, open_timeout) {
                Ok(io) => {
                    self.attach(candidate, io);
                    log::info!("Success opening serial port {}", candidate);
                    return Ok(candidate.clone());
                }
                Err(e) => log::debug!("Could not open {}: {}", candidate, e),
            }
        }

        log::error!("No fermentor found on any of {} candidate ports", tried.len());
        Err(SerialError::NoPortAvailable { tried })
    }

    fn attach(&mut self, port_name: &str, io: Box<dyn SerialPortIO>) {
        self.port = Some(io);
        self.port_name = Some(port_name.to_string());
        self.partial.clear();
    }

    /// Close the current port. Safe to call when already closed.
    pub fn disconnect(&mut self) {
        if let Some(name) = self.port_name.take() {
            log::info!("Disconnecting from {}", name);
        }
        self.port = None;
        self.partial.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn stats(&self) -> LineStats {
        self.stats
    }

    /// Write one command line to the device
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;

        let mut data = String::with_capacity(line.len() + self.terminator.len());
        data.push_str(line);
        data.push_str(&self.terminator);

        port.send_data(data.as_bytes())
            .await
            .map_err(|e| SerialError::WriteFailed(e.to_string()))?;
        port.flush()
            .await
            .map_err(|e| SerialError::WriteFailed(e.to_string()))
    }

    /// Read the next complete line, waiting at most `timeout_ms` for new bytes.
    ///
    /// Returns `Ok(None)` when no complete line is available yet.
    pub async fn read_line(&mut self, timeout_ms: u64) -> Result<Option<String>> {
        if let Some(line) = self.take_buffered_line() {
            return Ok(Some(line));
        }

        let port = self.port.as_mut().ok_or(SerialError::NotConnected)?;

        let mut buf = [0u8; READ_CHUNK_SIZE];
        let bytes_read = match port.read_data(&mut buf, timeout_ms).await {
            Ok(n) => n,
            Err(SerialError::Timeout) => return Ok(None),
            Err(e) => return Err(e),
        };
        if bytes_read == 0 {
            return Ok(None);
        }

        self.push_bytes(&buf[..bytes_read]);
        Ok(self.take_buffered_line())
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        match std::str::from_utf8(bytes) {
            Ok(chunk) => self.partial.push_str(chunk),
            Err(_) => {
                self.stats.utf8_decode_errors += 1;
                self.partial.push_str(&String::from_utf8_lossy(bytes));
            }
        }

        if self.partial.len() > MAX_PARTIAL_LEN {
            let mut start = self.partial.len() - TRIMMED_PARTIAL_LEN;
            while !self.partial.is_char_boundary(start) {
                start += 1;
            }
            self.partial.drain(..start);
            self.stats.partial_buffer_trims += 1;
            log::warn!("Serial line buffer overflowed, dropped {} bytes", start);
        }
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        while let Some(pos) = self.partial.find(['\n', '\r']) {
            let line = self.partial[..pos].trim().to_string();
            self.partial.drain(..=pos);
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }
}

impl Default for SerialInterface {
    fn default() -> Self {
        Self::new()
    }
}
