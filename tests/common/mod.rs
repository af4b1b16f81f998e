#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fermentor_x_lib::serial::{PortOpener, SerialError, SerialPortIO};
use fermentor_x_lib::FermentorConfig;

/// Scripted fake fermentor: queued bytes come back from reads, writes are recorded
#[derive(Clone, Default)]
pub struct MockDevice {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    incoming: VecDeque<Vec<u8>>,
    written: Vec<String>,
    fail_writes: bool,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        self.push_raw(format!("{}\r\n", line).as_bytes());
    }

    pub fn push_raw(&self, bytes: &[u8]) {
        self.inner.lock().unwrap().incoming.push_back(bytes.to_vec());
    }

    pub fn written(&self) -> Vec<String> {
        self.inner.lock().unwrap().written.clone()
    }

    pub fn clear_written(&self) {
        self.inner.lock().unwrap().written.clear();
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }

    pub fn pending_reads(&self) -> usize {
        self.inner.lock().unwrap().incoming.len()
    }

    pub fn port(&self) -> Box<dyn SerialPortIO> {
        Box::new(MockPort { device: self.clone() })
    }
}

struct MockPort {
    device: MockDevice,
}

#[async_trait::async_trait]
impl SerialPortIO for MockPort {
    async fn send_data(&mut self, data: &[u8]) -> Result<(), SerialError> {
        let mut inner = self.device.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(SerialError::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }
        inner.written.push(String::from_utf8_lossy(data).to_string());
        Ok(())
    }

    async fn read_data(&mut self, buf: &mut [u8], _timeout_ms: u64) -> Result<usize, SerialError> {
        let mut inner = self.device.inner.lock().unwrap();
        let chunk = inner.incoming.pop_front().ok_or(SerialError::Timeout)?;
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }

    async fn flush(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

/// Opener that only succeeds for the listed port names and records every attempt
#[derive(Clone)]
pub struct MockOpener {
    openable: Vec<String>,
    device: MockDevice,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockOpener {
    pub fn new(openable: &[&str], device: MockDevice) -> Self {
        Self {
            openable: openable.iter().map(|p| p.to_string()).collect(),
            device,
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

impl PortOpener for MockOpener {
    fn open(&self, port_name: &str, _baud_rate: u32, _timeout: Duration) -> Result<Box<dyn SerialPortIO>, SerialError> {
        self.attempts.lock().unwrap().push(port_name.to_string());
        if self.openable.iter().any(|p| p == port_name) {
            Ok(self.device.port())
        } else {
            Err(SerialError::ConnectionFailed(format!("{}: no such device", port_name)))
        }
    }
}

pub fn test_config(ports: &[&str], plot_dir: &Path) -> FermentorConfig {
    FermentorConfig {
        ports: ports.iter().map(|p| p.to_string()).collect(),
        plot_dir: plot_dir.display().to_string(),
        read_timeout_ms: 2,
        poll_interval_ms: 2,
        kickstart_delay_ms: 20,
        ..FermentorConfig::default()
    }
}

/// Poll `check` until it holds or roughly two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
