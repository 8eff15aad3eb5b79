use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task;

use rustcv_core::error::{CameraError, Result};
use rustcv_core::frame::ImageInfo;
use rustcv_core::traits::Stream;

use crate::device::EGrabberCamera;

/// 在阻塞线程池上运行相机调用
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| CameraError::Hardware(format!("blocking task failed: {e}")))?
}

/// Tokio 适配层
///
/// 相机本身的取帧是阻塞且无超时的，这里把它搬到 `spawn_blocking`，
/// 并提供带超时的 `next_frame_timeout`。
pub struct EGrabberStream {
    camera: Arc<EGrabberCamera>,
}

impl EGrabberStream {
    pub fn new(camera: Arc<EGrabberCamera>) -> Self {
        Self { camera }
    }

    pub fn camera(&self) -> &Arc<EGrabberCamera> {
        &self.camera
    }

    /// 与 `next_frame` 相同，但最多等待 `timeout`
    ///
    /// 超时后先 stop 唤醒仍在等待的阻塞任务，再 start 恢复采集，
    /// 返回 `Cancelled`。超时时 `dst` 的内容未定义。
    pub async fn next_frame_timeout(&mut self, dst: &mut Vec<u8>, timeout: Duration) -> Result<ImageInfo> {
        match tokio::time::timeout(timeout, self.next_frame(dst)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    target: "rustcv::egrabber",
                    "No frame within {:?}, restarting acquisition",
                    timeout
                );
                self.stop().await?;
                self.start().await?;
                Err(CameraError::Cancelled)
            }
        }
    }
}

#[async_trait]
impl Stream for EGrabberStream {
    async fn start(&mut self) -> Result<()> {
        let camera = self.camera.clone();
        blocking(move || camera.start_acquisition()).await
    }

    async fn stop(&mut self) -> Result<()> {
        let camera = self.camera.clone();
        blocking(move || camera.stop_acquisition()).await
    }

    async fn next_frame(&mut self, dst: &mut Vec<u8>) -> Result<ImageInfo> {
        let camera = self.camera.clone();
        let mut buf = std::mem::take(dst);

        let (buf, result) = blocking(move || {
            let shape = camera.query_shape()?;
            buf.resize(shape.bytes_of_image(), 0);

            let mut nbytes = buf.len();
            let mut info = ImageInfo::default();
            let result = camera
                .acquire_frame(&mut buf, &mut nbytes, &mut info)
                .map(|()| {
                    buf.truncate(nbytes);
                    info
                });
            Ok((buf, result))
        })
        .await?;

        *dst = buf;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{names, RegisterStore};
    use crate::sim::SimulatedGrabber;
    use rustcv_core::builder::CameraConfig;
    use rustcv_core::pixel_format::SampleType;
    use rustcv_core::properties::{Trigger, TriggerEdge, TriggerLine};

    fn stream(sim: &Arc<SimulatedGrabber>) -> EGrabberStream {
        let store: Arc<dyn RegisterStore> = sim.clone();
        let camera = EGrabberCamera::open(store, CameraConfig::default()).unwrap();
        EGrabberStream::new(Arc::new(camera))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn free_running_frames() {
        let sim = Arc::new(SimulatedGrabber::new());
        let mut stream = stream(&sim);
        stream.start().await.unwrap();

        let mut buf = Vec::new();
        for expected in 0..3 {
            let info = stream.next_frame(&mut buf).await.unwrap();
            assert_eq!(info.hardware_frame_id, expected);
            assert_eq!(buf.len(), 64 * 48);
        }
        stream.stop().await.unwrap();
        assert_eq!(sim.outstanding_buffers(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unmapped_pixel_format_still_delivers() {
        let sim = Arc::new(SimulatedGrabber::new());
        sim.poke_string(names::PIXEL_FORMAT, "BayerRG8");
        let mut stream = stream(&sim);
        stream.start().await.unwrap();

        let mut buf = Vec::new();
        let info = stream.next_frame(&mut buf).await.unwrap();
        assert_eq!(info.shape.sample_type, SampleType::Unknown);
        assert_eq!(buf.len(), 64 * 48);
        stream.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timeout_restarts_acquisition() {
        let sim = Arc::new(SimulatedGrabber::new());
        let mut stream = stream(&sim);

        let camera = stream.camera().clone();
        let target = rustcv_core::properties::PropertySet {
            input_triggers: rustcv_core::properties::InputTriggers {
                frame_start: Trigger::enabled_on(TriggerLine::Software, TriggerEdge::Rising),
            },
            ..camera.query_properties().unwrap()
        };
        camera.apply_properties(&target).unwrap();
        stream.start().await.unwrap();

        let mut buf = Vec::new();
        let err = stream
            .next_frame_timeout(&mut buf, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CameraError::Cancelled));
        assert!(sim.is_running());

        // stop 关闭了触发，恢复后自由运行
        let info = stream
            .next_frame_timeout(&mut buf, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(info.hardware_frame_id, 0);
    }
}
