// 开启一些 Clippy 检查，保证代码质量
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

// 模块定义
pub mod builder;
pub mod capabilities;
pub mod error;
pub mod frame;
pub mod pixel_format;
pub mod properties;
pub mod status;
pub mod traits;

// 方便用户使用的 Prelude
pub mod prelude {
    pub use crate::builder::{BinningPolicy, CameraConfig};
    pub use crate::capabilities::{CapabilitySnapshot, PropertyKind, PropertyMetadata};
    pub use crate::error::{CameraError, Result};
    pub use crate::frame::{ImageInfo, ImageShape};
    pub use crate::pixel_format::{SampleType, SampleTypes};
    pub use crate::properties::{PropertySet, SignalKind, Trigger, TriggerEdge, TriggerLine};
    pub use crate::status::DeviceStatus;
    pub use crate::traits::{Camera, DeviceInfo, Driver, Stream};
}

// 重新导出依赖中的关键类型，避免用户版本冲突
pub use async_trait::async_trait;

// 版本与构建信息常量
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
