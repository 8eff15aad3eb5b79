use std::sync::{Arc, Mutex, MutexGuard};

use rustcv_core::builder::CameraConfig;
use rustcv_core::capabilities::CapabilitySnapshot;
use rustcv_core::error::{CameraError, Result};
use rustcv_core::frame::{ImageInfo, ImageShape};
use rustcv_core::properties::PropertySet;
use rustcv_core::status::{guarded, DeviceStatus};
use rustcv_core::traits::Camera;

use crate::acquisition::FrameAcquisition;
use crate::capabilities::query_capabilities;
use crate::pixel_map;
use crate::properties::{apply_properties, query_properties};
use crate::register::{names, RegisterStore};

/// 启动失败后强制 stop 再试一次
const START_ATTEMPTS: usize = 2;

/// 配置锁保护的缓存
#[derive(Debug, Default)]
struct DeviceState {
    last_known_settings: PropertySet,
    last_known_capabilities: CapabilitySnapshot,
}

/// 一台通过 EGrabber 访问的相机
///
/// 除 `acquire_frame` 外的所有操作都在同一把锁下串行执行。
/// 取帧不持锁，因此另一个线程可以随时调用 `stop_acquisition` 唤醒它。
pub struct EGrabberCamera {
    store: Arc<dyn RegisterStore>,
    state: Mutex<DeviceState>,
    acquisition: FrameAcquisition,
    config: CameraConfig,
}

impl EGrabberCamera {
    /// 打开设备并读取当前状态与能力
    pub fn open(store: Arc<dyn RegisterStore>, config: CameraConfig) -> Result<Self> {
        if config.reset_on_open {
            // 上一个进程可能没有正常退出，采集还在跑
            store.stop()?;
            store.execute(names::ACQUISITION_STOP)?;
            store.set_string(names::TRIGGER_MODE, "Off")?;
        }

        let settings = query_properties(store.as_ref())?;
        let caps = query_capabilities(store.as_ref(), config.binning)?;

        tracing::info!(
            target: "rustcv::egrabber",
            "Camera opened: {}x{} {} exposure={}us",
            settings.shape.x,
            settings.shape.y,
            settings.pixel_type,
            settings.exposure_time_us
        );

        Ok(Self {
            acquisition: FrameAcquisition::new(store.clone()),
            store,
            state: Mutex::new(DeviceState {
                last_known_settings: settings,
                last_known_capabilities: caps,
            }),
            config,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, DeviceState>> {
        self.state.lock().map_err(|_| CameraError::Poisoned)
    }

    /// 写入参数，只写与缓存不同的字段
    pub fn apply_properties(&self, target: &PropertySet) -> Result<()> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        apply_properties(
            self.store.as_ref(),
            target,
            &mut state.last_known_settings,
            &state.last_known_capabilities,
        )
    }

    /// 从寄存器读回参数并刷新缓存
    pub fn query_properties(&self) -> Result<PropertySet> {
        let mut state = self.lock()?;
        let settings = query_properties(self.store.as_ref())?;
        state.last_known_settings = settings;
        Ok(settings)
    }

    /// 重新查询能力并刷新缓存
    pub fn query_capabilities(&self) -> Result<CapabilitySnapshot> {
        let mut state = self.lock()?;
        let caps = query_capabilities(self.store.as_ref(), self.config.binning)?;
        state.last_known_capabilities = caps.clone();
        Ok(caps)
    }

    /// 当前配置下一帧的形状
    pub fn query_shape(&self) -> Result<ImageShape> {
        let _state = self.lock()?;
        let width = self.store.width()?;
        let height = self.store.height()?;
        let pixel_type = pixel_map::from_pixel_format(&self.store.get_string(names::PIXEL_FORMAT)?);
        Ok(ImageShape::mono(width, height, pixel_type))
    }

    pub fn start_acquisition(&self) -> Result<()> {
        let mut attempt = 1;
        loop {
            let result = {
                let _state = self.lock()?;
                self.acquisition.start()
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < START_ATTEMPTS => {
                    tracing::warn!(
                        target: "rustcv::egrabber",
                        "Start failed ({}), stopping and retrying",
                        e
                    );
                    if let Err(e) = self.stop_acquisition() {
                        tracing::warn!(target: "rustcv::egrabber", "Stop before retry failed: {}", e);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 停止采集，唤醒阻塞中的 `acquire_frame`
    ///
    /// 停止时触发会被关闭，缓存同步更新。
    pub fn stop_acquisition(&self) -> Result<()> {
        let mut state = self.lock()?;
        let result = self.acquisition.stop();
        // TriggerMode=Off 无论其他步骤成败都已尝试过
        state.last_known_settings.input_triggers.frame_start.enable = false;
        result
    }

    pub fn fire_software_trigger(&self) -> Result<()> {
        let _state = self.lock()?;
        self.store.execute(names::TRIGGER_SOFTWARE)
    }

    /// 阻塞取帧，不持有配置锁
    pub fn acquire_frame(&self, dst: &mut [u8], nbytes: &mut usize, info: &mut ImageInfo) -> Result<()> {
        self.acquisition.get_frame(dst, nbytes, info)
    }

    /// 缓存状态的 JSON 快照 (调试与日志用)
    pub fn export_state(&self) -> Result<serde_json::Value> {
        let state = self.lock()?;
        let to_json = |e: serde_json::Error| CameraError::Hardware(format!("state export failed: {e}"));
        Ok(serde_json::json!({
            "settings": serde_json::to_value(state.last_known_settings).map_err(to_json)?,
            "capabilities": serde_json::to_value(&state.last_known_capabilities).map_err(to_json)?,
            "config": serde_json::to_value(&self.config).map_err(to_json)?,
        }))
    }
}

impl Drop for EGrabberCamera {
    fn drop(&mut self) {
        // 尽力而为：任何失败都只记录
        if let Err(e) = self.acquisition.stop() {
            tracing::debug!(target: "rustcv::egrabber", "Stop on close failed: {}", e);
        }
        if let Err(e) = self.store.execute(names::ACQUISITION_STOP) {
            tracing::debug!(target: "rustcv::egrabber", "AcquisitionStop on close failed: {}", e);
        }
        if let Err(e) = self.store.set_string(names::TRIGGER_MODE, "Off") {
            tracing::debug!(target: "rustcv::egrabber", "TriggerMode=Off on close failed: {}", e);
        }
        tracing::info!(target: "rustcv::egrabber", "Camera closed");
    }
}

impl Camera for EGrabberCamera {
    fn set(&self, settings: &PropertySet) -> DeviceStatus {
        guarded("set", || self.apply_properties(settings))
    }

    fn get(&self, settings: &mut PropertySet) -> DeviceStatus {
        guarded("get", || {
            *settings = self.query_properties()?;
            Ok(())
        })
    }

    fn get_metadata(&self, meta: &mut CapabilitySnapshot) -> DeviceStatus {
        guarded("get_metadata", || {
            *meta = self.query_capabilities()?;
            Ok(())
        })
    }

    fn get_shape(&self, shape: &mut ImageShape) -> DeviceStatus {
        guarded("get_shape", || {
            *shape = self.query_shape()?;
            Ok(())
        })
    }

    fn start(&self) -> DeviceStatus {
        guarded("start", || self.start_acquisition())
    }

    fn stop(&self) -> DeviceStatus {
        guarded("stop", || self.stop_acquisition())
    }

    fn execute_trigger(&self) -> DeviceStatus {
        guarded("execute_trigger", || self.fire_software_trigger())
    }

    fn get_frame(&self, im: &mut [u8], nbytes: &mut usize, info: &mut ImageInfo) -> DeviceStatus {
        guarded("get_frame", || self.acquire_frame(im, nbytes, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedGrabber;
    use rustcv_core::pixel_format::SampleType;
    use rustcv_core::properties::{Trigger, TriggerEdge, TriggerLine};

    fn open(sim: &Arc<SimulatedGrabber>) -> EGrabberCamera {
        EGrabberCamera::open(sim.clone(), CameraConfig::default()).unwrap()
    }

    #[test]
    fn open_resets_a_running_device() {
        let sim = Arc::new(SimulatedGrabber::new());
        sim.poke_string(names::TRIGGER_MODE, "On");
        sim.realloc_buffers(4).unwrap();
        sim.start().unwrap();

        let camera = open(&sim);
        assert!(!sim.is_running());
        assert_eq!(sim.writes_to(names::ACQUISITION_STOP).len(), 1);
        assert!(!camera.query_properties().unwrap().input_triggers.frame_start.enable);
    }

    #[test]
    fn open_without_reset_leaves_registers_alone() {
        let sim = Arc::new(SimulatedGrabber::new());
        let _camera =
            EGrabberCamera::open(sim.clone(), CameraConfig::new().reset_on_open(false)).unwrap();
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn start_is_retried_once() {
        let sim = Arc::new(SimulatedGrabber::new());
        let camera = open(&sim);

        sim.fail_next_starts(1);
        camera.start_acquisition().unwrap();
        assert!(sim.is_running());
        assert_eq!(sim.realloc_count(), 2);

        camera.stop_acquisition().unwrap();
        sim.fail_next_starts(2);
        assert!(camera.start_acquisition().is_err());
        assert!(!sim.is_running());
    }

    #[test]
    fn stop_clears_cached_trigger() {
        let sim = Arc::new(SimulatedGrabber::new());
        let camera = open(&sim);
        let target = PropertySet {
            input_triggers: rustcv_core::properties::InputTriggers {
                frame_start: Trigger::enabled_on(TriggerLine::Software, TriggerEdge::Rising),
            },
            ..camera.query_properties().unwrap()
        };
        camera.apply_properties(&target).unwrap();
        camera.start_acquisition().unwrap();
        camera.stop_acquisition().unwrap();

        // 缓存与寄存器一致，重新启用触发时会真正写入
        sim.clear_writes();
        camera.apply_properties(&target).unwrap();
        assert_eq!(sim.writes_to(names::TRIGGER_MODE), vec!["On"]);
    }

    #[test]
    fn failed_stop_still_clears_cached_trigger() {
        let sim = Arc::new(SimulatedGrabber::new());
        let camera = open(&sim);
        let target = PropertySet {
            input_triggers: rustcv_core::properties::InputTriggers {
                frame_start: Trigger::enabled_on(TriggerLine::Software, TriggerEdge::Rising),
            },
            ..camera.query_properties().unwrap()
        };
        camera.apply_properties(&target).unwrap();
        camera.start_acquisition().unwrap();

        sim.fail_next_stops(1);
        assert!(camera.stop_acquisition().is_err());
        assert_eq!(sim.get_string(names::TRIGGER_MODE).unwrap(), "Off");

        sim.clear_writes();
        camera.apply_properties(&target).unwrap();
        assert_eq!(sim.writes_to(names::TRIGGER_MODE), vec!["On"]);
        assert_eq!(sim.get_string(names::TRIGGER_MODE).unwrap(), "On");
    }

    #[test]
    fn shape_follows_registers() {
        let sim = Arc::new(SimulatedGrabber::new());
        let camera = open(&sim);
        let target = PropertySet {
            pixel_type: SampleType::U16,
            ..camera.query_properties().unwrap()
        };
        camera.apply_properties(&target).unwrap();

        let shape = camera.query_shape().unwrap();
        assert_eq!(shape.sample_type, SampleType::U16);
        assert_eq!(shape.bytes_of_image(), 64 * 48 * 2);
    }

    #[test]
    fn drop_leaves_device_idle() {
        let sim = Arc::new(SimulatedGrabber::new());
        let camera = open(&sim);
        camera.start_acquisition().unwrap();
        sim.clear_writes();

        drop(camera);
        assert!(!sim.is_running());
        assert_eq!(sim.writes_to(names::ACQUISITION_STOP).len(), 1);
        assert_eq!(sim.writes_to(names::TRIGGER_MODE), vec!["Off", "Off"]);
    }

    #[test]
    fn abi_reports_failures_as_status() {
        let sim = Arc::new(SimulatedGrabber::new());
        let camera = open(&sim);

        let mut buf = vec![0u8; 8];
        let mut nbytes = buf.len();
        let mut info = ImageInfo::default();
        // 尚未启动
        assert_eq!(
            Camera::get_frame(&camera, &mut buf, &mut nbytes, &mut info),
            DeviceStatus::Err
        );

        let bad = PropertySet {
            pixel_type: SampleType::I16,
            ..camera.query_properties().unwrap()
        };
        assert_eq!(Camera::set(&camera, &bad), DeviceStatus::Err);
    }

    #[test]
    fn export_state_is_json() {
        let sim = Arc::new(SimulatedGrabber::new());
        let camera = open(&sim);
        let state = camera.export_state().unwrap();
        assert_eq!(state["settings"]["binning"], 1);
        assert_eq!(state["settings"]["shape"]["x"], 64);
        assert_eq!(state["config"]["reset_on_open"], true);
    }
}
