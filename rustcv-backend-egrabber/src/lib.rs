//! Euresys EGrabber 后端
//!
//! 把抽象的 [`PropertySet`](rustcv_core::properties::PropertySet) 翻译成 GenICam 寄存器读写，
//! 并把采集卡的 Buffer 交付包装成宿主 ABI ([`Camera`](rustcv_core::traits::Camera))。
//! 寄存器访问本身由外部提供的 [`RegisterStore`](register::RegisterStore) 完成。

pub mod acquisition;
pub mod capabilities;
pub mod device;
pub mod discovery;
pub mod pixel_map;
pub mod properties;
pub mod register;
pub mod stream;
pub mod trigger;

#[cfg(any(test, feature = "simulation"))]
pub mod sim;

use std::sync::Arc;

use rustcv_core::builder::CameraConfig;
use rustcv_core::error::{CameraError, Result};
use rustcv_core::traits::{Camera, DeviceInfo, Driver};

pub use device::EGrabberCamera;
pub use discovery::GrabberDiscovery;
pub use register::RegisterStore;
pub use stream::EGrabberStream;

/// EGrabber 驱动
///
/// 设备 id 是发现顺序中的下标 ("0", "1", ...)。
#[derive(Clone)]
pub struct EGrabberDriver {
    discovery: Arc<dyn GrabberDiscovery>,
}

impl EGrabberDriver {
    pub fn new(discovery: Arc<dyn GrabberDiscovery>) -> Self {
        Self { discovery }
    }

    /// 打开设备，返回具体类型 (Stream 适配层需要 `Arc<EGrabberCamera>`)
    pub fn open_camera(&self, id: &str, config: CameraConfig) -> Result<EGrabberCamera> {
        let index: usize = id
            .trim()
            .parse()
            .map_err(|_| CameraError::Validation(format!("device id must be an index, got '{id}'")))?;

        let count = self.discovery.camera_count()?;
        if index >= count {
            return Err(CameraError::DeviceNotFound(id.to_string()));
        }

        let store = self.discovery.connect(index)?;
        EGrabberCamera::open(store, config)
    }
}

impl Driver for EGrabberDriver {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        discovery::list_devices(self.discovery.as_ref())
    }

    fn open(&self, id: &str, config: CameraConfig) -> Result<Box<dyn Camera>> {
        Ok(Box::new(self.open_camera(id, config)?))
    }
}

pub fn driver(discovery: Arc<dyn GrabberDiscovery>) -> Arc<dyn Driver> {
    Arc::new(EGrabberDriver::new(discovery))
}
