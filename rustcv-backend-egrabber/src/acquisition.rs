//! 取帧循环
//!
//! get_frame 不持有设备配置锁，可以和 stop() 并发：
//! stop() 通过 cancel_pop 唤醒阻塞中的等待者。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustcv_core::error::{CameraError, Result};
use rustcv_core::frame::{ImageInfo, ImageShape};

use crate::pixel_map;
use crate::register::{names, DeliveredBuffer, RegisterStore};

/// 采集卡 Buffer 池大小
pub const NBUFFERS: usize = 16;

/// 已交付的 Buffer，离开作用域时自动归还空闲池
///
/// 无论拷贝成功、目标太小还是中途出错，Buffer 都会被归还。
pub struct ScopedBuffer<'a> {
    store: &'a dyn RegisterStore,
    buffer: DeliveredBuffer,
}

impl<'a> ScopedBuffer<'a> {
    /// 阻塞等待下一个 Buffer
    pub fn pop(store: &'a dyn RegisterStore) -> Result<Self> {
        let buffer = store.pop_buffer()?;
        Ok(Self { store, buffer })
    }

    pub fn buffer(&self) -> &DeliveredBuffer {
        &self.buffer
    }

    pub fn copy_to(&self, dst: &mut [u8]) -> Result<()> {
        self.store.copy_buffer(&self.buffer, dst)
    }
}

impl Drop for ScopedBuffer<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.requeue_buffer(self.buffer.handle) {
            tracing::error!(
                target: "rustcv::egrabber",
                "Failed to requeue {:?}: {}",
                self.buffer.handle,
                e
            );
        }
    }
}

pub struct FrameAcquisition {
    store: Arc<dyn RegisterStore>,
    /// 进程内帧序号，start() 时归零
    frame_id: AtomicU64,
}

impl FrameAcquisition {
    pub fn new(store: Arc<dyn RegisterStore>) -> Self {
        Self {
            store,
            frame_id: AtomicU64::new(0),
        }
    }

    pub fn start(&self) -> Result<()> {
        self.frame_id.store(0, Ordering::SeqCst);
        self.store.realloc_buffers(NBUFFERS)?;
        self.store.start()?;
        tracing::info!(target: "rustcv::egrabber", "Acquisition started ({} buffers)", NBUFFERS);
        Ok(())
    }

    /// 停止交付、关闭触发、取消等待中的 pop
    ///
    /// 三步都会执行，返回遇到的第一个错误。
    pub fn stop(&self) -> Result<()> {
        let stopped = self.store.stop();
        let trigger_off = self.store.set_string(names::TRIGGER_MODE, "Off");
        let cancelled = self.store.cancel_pop();
        tracing::info!(target: "rustcv::egrabber", "Acquisition stopped");
        stopped.and(trigger_off).and(cancelled)
    }

    /// 阻塞直到下一帧到达，拷贝到 `dst`
    ///
    /// `nbytes` 输入为可用容量，成功时为写入的字节数。
    /// 容量不足时返回 `BufferTooSmall`，`dst` 不会被修改。
    pub fn get_frame(&self, dst: &mut [u8], nbytes: &mut usize, info: &mut ImageInfo) -> Result<()> {
        let scoped = ScopedBuffer::pop(self.store.as_ref())?;
        let delivered = &scoped.buffer().info;

        let size = delivered.size;
        let capacity = (*nbytes).min(dst.len());
        if capacity < size {
            return Err(CameraError::BufferTooSmall {
                required: size,
                capacity,
            });
        }

        if delivered.delivered_height != delivered.height {
            tracing::warn!(
                target: "rustcv::egrabber",
                "Delivered height {} differs from configured height {}",
                delivered.delivered_height,
                delivered.height
            );
        }

        scoped.copy_to(&mut dst[..size])?;

        *nbytes = size;
        *info = ImageInfo {
            shape: ImageShape::mono(
                delivered.width,
                delivered.delivered_height,
                pixel_map::from_pixel_format(&delivered.pixel_format),
            ),
            hardware_timestamp: delivered.timestamp_ns,
            hardware_frame_id: self.frame_id.fetch_add(1, Ordering::SeqCst),
        };
        Ok(())
    }
}
