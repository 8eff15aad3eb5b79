use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    /// 调用方给出的值不在合法的离散集合内 (像素类型、触发线/边沿等)
    /// 在任何寄存器写入之前拒绝
    #[error("Invalid request: {0}")]
    Validation(String),

    /// 硬件报告的值违反了驱动的前提假设 (例如曝光单位不是微秒)
    /// 不可恢复，需要修改代码
    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    #[error("Register access failed on '{name}': {message}")]
    Register { name: String, message: String },

    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Destination buffer too small: need {required} bytes, got {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },

    /// 阻塞中的取帧被 stop() 取消
    #[error("Frame wait cancelled")]
    Cancelled,

    #[error("Acquisition is not running")]
    NotStarted,

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("No device matches '{0}'")]
    DeviceNotFound(String),

    #[error("Device state lock poisoned")]
    Poisoned,

    #[error("Simulation backend error: {0}")]
    SimulationError(String),
}

impl CameraError {
    /// 便捷构造：某个寄存器读写失败
    pub fn register(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Register {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;
