use std::sync::Arc;

use rustcv_core::error::Result;
use rustcv_core::traits::DeviceInfo;

use crate::register::{names, RegisterStore};

/// 采集卡发现 (EGrabberDiscovery)
///
/// 枚举本身不属于这个后端，这里只约定两件事：有几台相机，以及如何连上第 i 台。
pub trait GrabberDiscovery: Send + Sync {
    fn camera_count(&self) -> Result<usize>;

    fn connect(&self, index: usize) -> Result<Arc<dyn RegisterStore>>;
}

/// 读取厂商、型号与序列号，拼成 "<vendor> <model> <serial>"
pub fn describe(store: &dyn RegisterStore, index: usize) -> Result<DeviceInfo> {
    let vendor = store.get_string(names::DEVICE_VENDOR_NAME)?;
    let model = store.get_string(names::DEVICE_MODEL_NAME)?;
    let serial = store.get_string(names::DEVICE_SERIAL_NUMBER)?;

    Ok(DeviceInfo {
        name: format!("{vendor} {model} {serial}"),
        id: index.to_string(),
        backend: "EGrabber".to_string(),
        bus_info: None,
    })
}

/// 枚举系统中的相机
pub fn list_devices(discovery: &dyn GrabberDiscovery) -> Result<Vec<DeviceInfo>> {
    let mut devices = Vec::new();

    for index in 0..discovery.camera_count()? {
        match discovery
            .connect(index)
            .and_then(|store| describe(store.as_ref(), index))
        {
            Ok(info) => devices.push(info),
            // 单台设备描述失败不影响其他设备
            Err(e) => {
                tracing::warn!(target: "rustcv::egrabber", "Skipping camera {}: {}", index, e)
            }
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedDiscovery, SimulatedGrabber};

    #[test]
    fn names_devices_from_identity_registers() {
        let discovery = SimulatedDiscovery::new(vec![
            Arc::new(SimulatedGrabber::new()),
            Arc::new(SimulatedGrabber::with_identity("Basler", "acA1920", "42")),
        ]);
        let devices = list_devices(&discovery).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Vieworks VP-151MX-M6H00 SIM0001");
        assert_eq!(devices[1].name, "Basler acA1920 42");
        assert_eq!(devices[1].id, "1");
        assert_eq!(devices[1].backend, "EGrabber");
    }
}
