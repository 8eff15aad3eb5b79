//! 参数转换：PropertySet <-> 具名寄存器
//!
//! 每个字段独立处理：与当前值相同就跳过，否则按能力快照 clamp 后写入，
//! 成功后立即更新 `current`。中途失败时 `current` 仍然反映已经写入的部分。

use rustcv_core::capabilities::CapabilitySnapshot;
use rustcv_core::error::{CameraError, Result};
use rustcv_core::pixel_format::SampleType;
use rustcv_core::properties::{InputTriggers, Point2, PropertySet, SignalKind, Trigger, TriggerEdge};

use crate::acquisition::NBUFFERS;
use crate::pixel_map::{self, TRIGGER_EDGES, TRIGGER_MODES, TRIGGER_SOURCES};
use crate::register::{get_u32, names, RegisterStore};
use crate::trigger;

const EXPOSURE_EPSILON: f64 = 1e-9;

/// 把 `target` 写到设备上
pub fn apply_properties(
    store: &dyn RegisterStore,
    target: &PropertySet,
    current: &mut PropertySet,
    caps: &CapabilitySnapshot,
) -> Result<()> {
    // 先全部校验，保证失败时没有任何寄存器被写过
    if !target.exposure_time_us.is_finite() {
        return Err(CameraError::Validation(format!(
            "exposure time must be finite, got {}",
            target.exposure_time_us
        )));
    }
    if target.pixel_type != current.pixel_type {
        check_pixel_type(target.pixel_type, caps)?;
    }
    if target.input_triggers.frame_start != current.input_triggers.frame_start {
        trigger::validate(&target.input_triggers.frame_start)?;
    }

    apply_exposure(store, target.exposure_time_us, current, caps)?;
    apply_binning(store, target.binning, current, caps)?;
    apply_offset(store, target.offset, current, caps)?;
    apply_shape(store, target.shape, current, caps)?;
    apply_pixel_type(store, target.pixel_type, current)?;

    current.input_triggers.frame_start = trigger::apply_trigger(
        store,
        &target.input_triggers.frame_start,
        &current.input_triggers.frame_start,
    )?;

    // 尺寸或格式可能变了，Buffer 必须按新配置重新分配
    store.realloc_buffers(NBUFFERS)?;
    Ok(())
}

fn check_pixel_type(ty: SampleType, caps: &CapabilitySnapshot) -> Result<()> {
    if pixel_map::to_pixel_format(ty).is_none() {
        return Err(CameraError::Validation(format!(
            "pixel type {ty} has no PixelFormat name"
        )));
    }
    if !caps.supported_pixel_types.is_empty() && !caps.supports_pixel_type(ty) {
        return Err(CameraError::Validation(format!(
            "pixel type {ty} is not offered by the device"
        )));
    }
    Ok(())
}

fn apply_exposure(
    store: &dyn RegisterStore,
    target: f32,
    current: &mut PropertySet,
    caps: &CapabilitySnapshot,
) -> Result<()> {
    if (target as f64 - current.exposure_time_us as f64).abs() < EXPOSURE_EPSILON {
        return Ok(());
    }
    let value = caps.exposure_time_us.clamp_f32(target);
    if value != target {
        tracing::debug!(target: "rustcv::egrabber", "ExposureTime {} clamped to {}", target, value);
    }
    store.set_float(names::EXPOSURE_TIME, value as f64)?;
    current.exposure_time_us = value;
    Ok(())
}

/// 水平与垂直 binning 总是一起写
///
/// 寄存器只读时不写，但 clamp 后的值照样记入缓存。
fn apply_binning(
    store: &dyn RegisterStore,
    target: u8,
    current: &mut PropertySet,
    caps: &CapabilitySnapshot,
) -> Result<()> {
    if target == current.binning {
        return Ok(());
    }
    let value = caps.binning.clamp_u8(target);
    if caps.binning.writable {
        store.set_integer(names::BINNING_HORIZONTAL, value as i64)?;
        store.set_integer(names::BINNING_VERTICAL, value as i64)?;
    }
    current.binning = value;
    Ok(())
}

fn apply_offset(
    store: &dyn RegisterStore,
    target: Point2,
    current: &mut PropertySet,
    caps: &CapabilitySnapshot,
) -> Result<()> {
    if target.x != current.offset.x {
        let x = caps.offset.x.clamp_u32(target.x);
        store.set_integer(names::OFFSET_X, x as i64)?;
        current.offset.x = x;
    }
    if target.y != current.offset.y {
        let y = caps.offset.y.clamp_u32(target.y);
        store.set_integer(names::OFFSET_Y, y as i64)?;
        current.offset.y = y;
    }
    Ok(())
}

fn apply_shape(
    store: &dyn RegisterStore,
    target: Point2,
    current: &mut PropertySet,
    caps: &CapabilitySnapshot,
) -> Result<()> {
    if target.x != current.shape.x {
        let x = caps.shape.x.clamp_u32(target.x);
        store.set_integer(names::WIDTH, x as i64)?;
        current.shape.x = x;
    }
    if target.y != current.shape.y {
        let y = caps.shape.y.clamp_u32(target.y);
        store.set_integer(names::HEIGHT, y as i64)?;
        current.shape.y = y;
    }
    Ok(())
}

fn apply_pixel_type(store: &dyn RegisterStore, target: SampleType, current: &mut PropertySet) -> Result<()> {
    if target == current.pixel_type {
        return Ok(());
    }
    let name = pixel_map::to_pixel_format(target)
        .ok_or_else(|| CameraError::Validation(format!("pixel type {target} has no PixelFormat name")))?;
    store.set_string(names::PIXEL_FORMAT, name)?;
    current.pixel_type = target;
    Ok(())
}

/// 从寄存器读回全部参数
pub fn query_properties(store: &dyn RegisterStore) -> Result<PropertySet> {
    let binning = get_u32(store, names::BINNING_HORIZONTAL)?;

    Ok(PropertySet {
        exposure_time_us: store.get_float(names::EXPOSURE_TIME)? as f32,
        binning: u8::try_from(binning).map_err(|_| {
            CameraError::register(names::BINNING_HORIZONTAL, format!("value {binning} does not fit in u8"))
        })?,
        pixel_type: pixel_map::from_pixel_format(&store.get_string(names::PIXEL_FORMAT)?),
        offset: Point2::new(
            get_u32(store, names::OFFSET_X)?,
            get_u32(store, names::OFFSET_Y)?,
        ),
        shape: Point2::new(get_u32(store, names::WIDTH)?, get_u32(store, names::HEIGHT)?),
        input_triggers: InputTriggers {
            frame_start: query_frame_start(store)?,
        },
    })
}

/// 只有一个触发选择器 (ExposureStart)
fn query_frame_start(store: &dyn RegisterStore) -> Result<Trigger> {
    let source = store.get_string(names::TRIGGER_SOURCE)?;
    let Some(line) = TRIGGER_SOURCES.value(&source) else {
        tracing::warn!(
            target: "rustcv::egrabber",
            "Unknown TriggerSource '{}', reporting the default trigger",
            source
        );
        return Ok(Trigger::default());
    };

    let mode = store.get_string(names::TRIGGER_MODE)?;
    let activation = store.get_string(names::TRIGGER_ACTIVATION)?;

    Ok(Trigger {
        enable: TRIGGER_MODES.value_or(&mode, false),
        line,
        kind: SignalKind::Input,
        edge: TRIGGER_EDGES.value_or(&activation, TriggerEdge::NotApplicable),
    })
}
