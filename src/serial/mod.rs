pub mod interface;
pub mod protocol;

pub use interface::{NativePort, PortOpener, SerialInterface, SerialPortIO, SystemPortOpener};
pub use protocol::Command;

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("No serial port available (tried: {})", tried.join(", "))]
    NoPortAvailable { tried: Vec<String> },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialport error: {0}")]
    SerialportError(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, SerialError>;
