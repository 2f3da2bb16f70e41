// ============================================================================
// error.rs — lifegrid
// Error taxonomy shared by startup, the frame loop and snapshot I/O.
// ============================================================================

use std::io;

pub type Result<T> = std::result::Result<T, LifeError>;

#[derive(Debug, thiserror::Error)]
pub enum LifeError {
    #[error("No compatible GPU adapter found")]
    NoDevice,

    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Surface configuration failed: {0}")]
    SurfaceConfig(String),

    /// Fault reported by the accelerator while the frame loop was running.
    #[error("GPU device fault: {0}")]
    Device(String),

    #[error("GPU output diverged from the CPU reference: {0}")]
    Mismatch(String),

    #[error("Buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Config file error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LifeError {
    pub fn config(msg: impl Into<String>) -> Self {
        LifeError::Config(msg.into())
    }

    /// Startup-time errors abort before the frame loop exists.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            LifeError::NoDevice
                | LifeError::DeviceRequest(_)
                | LifeError::Config(_)
                | LifeError::SurfaceConfig(_)
        )
    }
}
