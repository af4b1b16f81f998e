pub mod context;
pub mod manager;
pub mod models;

pub use context::DeviceContext;
pub use manager::FermentorManager;
pub use models::*;


#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Serial communication error: {0}")]
    SerialError(#[from] crate::serial::SerialError),

    #[error("Invalid motor speed: {0}")]
    InvalidMotorSpeed(f64),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
