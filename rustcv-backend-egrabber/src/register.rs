//! 采集卡的特征寄存器接口
//!
//! EGrabber 通过 GenICam 名称访问远端相机的寄存器 (RemoteModule)，
//! 并通过 StreamModule 交付帧 Buffer。这里只描述驱动需要的那一部分，
//! 具体实现 (FFI 或模拟) 由外部提供。

use rustcv_core::error::{CameraError, Result};

/// 寄存器名称 (必须与硬件逐字一致)
pub mod names {
    pub const EXPOSURE_TIME: &str = "ExposureTime";
    pub const EXPOSURE_TIME_MIN: &str = "ExposureTimeMinReg";
    pub const EXPOSURE_TIME_MAX: &str = "ExposureTimeMaxReg";

    pub const BINNING_HORIZONTAL: &str = "BinningHorizontal";
    pub const BINNING_VERTICAL: &str = "BinningVertical";

    pub const OFFSET_X: &str = "OffsetX";
    pub const OFFSET_Y: &str = "OffsetY";
    pub const OFFSET_X_MIN: &str = "OffsetXMinReg";
    pub const OFFSET_X_MAX: &str = "OffsetXMaxReg";
    pub const OFFSET_Y_MIN: &str = "OffsetYMinReg";
    pub const OFFSET_Y_MAX: &str = "OffsetYMaxReg";

    pub const WIDTH: &str = "Width";
    pub const HEIGHT: &str = "Height";
    pub const WIDTH_MIN: &str = "WidthMinReg";
    pub const WIDTH_MAX: &str = "WidthMaxReg";
    pub const HEIGHT_MIN: &str = "HeightMinReg";
    pub const HEIGHT_MAX: &str = "HeightMaxReg";

    pub const PIXEL_FORMAT: &str = "PixelFormat";

    pub const TRIGGER_SOURCE: &str = "TriggerSource";
    pub const TRIGGER_MODE: &str = "TriggerMode";
    pub const TRIGGER_ACTIVATION: &str = "TriggerActivation";

    /// 命令寄存器 (只能 execute)
    pub const TRIGGER_SOFTWARE: &str = "TriggerSoftware";
    pub const ACQUISITION_STOP: &str = "AcquisitionStop";

    pub const DEVICE_VENDOR_NAME: &str = "DeviceVendorName";
    pub const DEVICE_MODEL_NAME: &str = "DeviceModelName";
    pub const DEVICE_SERIAL_NUMBER: &str = "DeviceSerialNumber";

    /// ExposureTime 期望的单位
    pub const MICROSECONDS: &str = "us";
}

/// 采集卡交付的 Buffer 句柄 (所有权属于采集卡的空闲池)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// 交付 Buffer 的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferInfo {
    /// 有效数据字节数
    pub size: usize,
    pub width: u32,
    /// 配置的标称高度
    pub height: u32,
    /// 实际交付的行数，可能与标称高度不同
    pub delivered_height: u32,
    /// GenICam PixelFormat 名称
    pub pixel_format: String,
    /// 硬件时间戳 (纳秒)
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredBuffer {
    pub handle: BufferHandle,
    pub info: BufferInfo,
}

/// 具名寄存器存储 + 阻塞式 Buffer 交付
///
/// 所有方法都取 `&self`：get_frame 在配置锁之外调用 `pop_buffer`，
/// 同时 stop() 需要能从另一个线程调用 `cancel_pop` 唤醒它。
pub trait RegisterStore: Send + Sync {
    fn get_string(&self, name: &str) -> Result<String>;
    fn get_integer(&self, name: &str) -> Result<i64>;
    fn get_float(&self, name: &str) -> Result<f64>;

    fn set_string(&self, name: &str, value: &str) -> Result<()>;
    fn set_integer(&self, name: &str, value: i64) -> Result<()>;
    fn set_float(&self, name: &str, value: f64) -> Result<()>;

    /// 枚举型寄存器的可选项
    fn enum_entries(&self, name: &str) -> Result<Vec<String>>;

    fn is_writable(&self, name: &str) -> Result<bool>;

    /// 寄存器的计量单位 (e.g. "us")
    fn unit(&self, name: &str) -> Result<String>;

    /// 执行命令寄存器
    fn execute(&self, command: &str) -> Result<()>;

    // --- StreamModule ---

    /// 当前流配置的宽度 (像素)
    fn width(&self) -> Result<u32>;

    /// 当前流配置的高度 (像素)
    fn height(&self) -> Result<u32>;

    /// 按当前尺寸与像素格式重新分配 `count` 个 Buffer
    fn realloc_buffers(&self, count: usize) -> Result<()>;

    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// 取消正在等待中的 pop_buffer，使其返回错误
    fn cancel_pop(&self) -> Result<()>;

    /// 阻塞直到下一个 Buffer 交付
    fn pop_buffer(&self) -> Result<DeliveredBuffer>;

    /// 把 Buffer 的有效数据拷贝到 `dst`，`dst.len()` 必须等于 `info.size`
    fn copy_buffer(&self, buffer: &DeliveredBuffer, dst: &mut [u8]) -> Result<()>;

    /// 把 Buffer 归还空闲池
    fn requeue_buffer(&self, handle: BufferHandle) -> Result<()>;
}

/// 读取整数寄存器并检查是否能放入 u32
pub(crate) fn get_u32(store: &dyn RegisterStore, name: &str) -> Result<u32> {
    let raw = store.get_integer(name)?;
    u32::try_from(raw)
        .map_err(|_| CameraError::register(name, format!("value {raw} does not fit in u32")))
}

/// 读取整数寄存器并转为 f32 (用于能力区间)
pub(crate) fn get_integer_f32(store: &dyn RegisterStore, name: &str) -> Result<f32> {
    Ok(store.get_integer(name)? as f32)
}
