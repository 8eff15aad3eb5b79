use crate::builder::CameraConfig;
use crate::capabilities::CapabilitySnapshot;
use crate::error::Result;
use crate::frame::{ImageInfo, ImageShape};
use crate::properties::PropertySet;
use crate::status::DeviceStatus;
use async_trait::async_trait;

/// 设备基本信息
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// 对用户友好的显示名称 (e.g. "Vieworks VP-151MX-M6H00 1234")
    pub name: String,

    /// 唯一硬件 ID，用于 Driver::open 的参数
    pub id: String,

    /// 后端类型标识 (e.g. "EGrabber")
    pub backend: String,

    /// 硬件总线信息 (可选)
    pub bus_info: Option<String>,
}

/// 1. 驱动入口：设备枚举与管理
pub trait Driver: Send + Sync {
    /// 扫描总线，返回设备列表
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// 打开设备，返回相机能力表
    fn open(&self, id: &str, config: CameraConfig) -> Result<Box<dyn Camera>>;

    /// 打开第一个名称满足 `config.device_filter` 的设备
    fn open_first_matching(&self, config: CameraConfig) -> Result<Box<dyn Camera>> {
        let device = self
            .list_devices()?
            .into_iter()
            .find(|d| config.matches(&d.name))
            .ok_or_else(|| {
                crate::error::CameraError::DeviceNotFound(
                    config.device_filter.clone().unwrap_or_default(),
                )
            })?;
        self.open(&device.id, config)
    }
}

/// 2. 相机能力表 (宿主 ABI)
///
/// 每个操作只返回 Ok / Err。实现者必须捕获所有内部错误与 panic，
/// 记录日志后折叠为 DeviceStatus::Err。
pub trait Camera: Send + Sync {
    fn set(&self, settings: &PropertySet) -> DeviceStatus;

    fn get(&self, settings: &mut PropertySet) -> DeviceStatus;

    fn get_metadata(&self, meta: &mut CapabilitySnapshot) -> DeviceStatus;

    fn get_shape(&self, shape: &mut ImageShape) -> DeviceStatus;

    /// 启动采集 (Alloc buffers, Start DMA)
    fn start(&self) -> DeviceStatus;

    /// 停止采集，并唤醒阻塞中的 get_frame
    fn stop(&self) -> DeviceStatus;

    /// 软件触发一次
    fn execute_trigger(&self) -> DeviceStatus;

    /// 获取下一帧
    ///
    /// `nbytes` 输入为 `im` 的可用容量，成功后为实际写入的字节数。
    /// 会无限期阻塞，直到有帧到达或 stop() 被调用。
    fn get_frame(&self, im: &mut [u8], nbytes: &mut usize, info: &mut ImageInfo) -> DeviceStatus;
}

/// 3. 数据面：异步获取
/// 必须是 Send，以便在 Tokio 任务中运行
#[async_trait]
pub trait Stream: Send {
    async fn start(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;

    /// 获取下一帧，数据写入 `dst` (按需扩容)
    async fn next_frame(&mut self, dst: &mut Vec<u8>) -> Result<ImageInfo>;
}

// 为 Box<T> 实现 Stream，这样 Box<dyn Stream> 也能被当做 Stream 使用
#[async_trait]
impl<S: Stream + ?Sized + Send> Stream for Box<S> {
    async fn start(&mut self) -> Result<()> {
        (**self).start().await
    }

    async fn stop(&mut self) -> Result<()> {
        (**self).stop().await
    }

    async fn next_frame(&mut self, dst: &mut Vec<u8>) -> Result<ImageInfo> {
        (**self).next_frame(dst).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CameraError;
    use crate::pixel_format::SampleType;

    struct Counting {
        running: bool,
        next_id: u64,
    }

    #[async_trait]
    impl Stream for Counting {
        async fn start(&mut self) -> Result<()> {
            self.running = true;
            self.next_id = 0;
            Ok(())
        }

        async fn stop(&mut self) -> Result<()> {
            self.running = false;
            Ok(())
        }

        async fn next_frame(&mut self, dst: &mut Vec<u8>) -> Result<ImageInfo> {
            if !self.running {
                return Err(CameraError::NotStarted);
            }
            let shape = ImageShape::mono(4, 2, SampleType::U8);
            dst.resize(shape.bytes_of_image(), 0);
            let info = ImageInfo {
                shape,
                hardware_timestamp: 0,
                hardware_frame_id: self.next_id,
            };
            self.next_id += 1;
            Ok(info)
        }
    }

    #[tokio::test]
    async fn boxed_stream_forwards() {
        let mut stream: Box<dyn Stream> = Box::new(Counting {
            running: false,
            next_id: 7,
        });
        let mut buf = Vec::new();
        assert!(matches!(
            stream.next_frame(&mut buf).await,
            Err(CameraError::NotStarted)
        ));

        stream.start().await.unwrap();
        let a = stream.next_frame(&mut buf).await.unwrap();
        let b = stream.next_frame(&mut buf).await.unwrap();
        assert_eq!((a.hardware_frame_id, b.hardware_frame_id), (0, 1));
        assert_eq!(buf.len(), 8);
        stream.stop().await.unwrap();
    }
}
