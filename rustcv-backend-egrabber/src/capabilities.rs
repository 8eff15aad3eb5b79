//! 能力查询：从寄存器读取可写性与取值区间

use rustcv_core::builder::BinningPolicy;
use rustcv_core::capabilities::{
    AxisMetadata, CapabilitySnapshot, PropertyMetadata, TriggerCapabilities, TriggerPorts,
};
use rustcv_core::error::{CameraError, Result};
use rustcv_core::pixel_format::{SampleType, SampleTypes};

use crate::pixel_map::PIXEL_FORMATS;
use crate::register::{get_integer_f32, names, RegisterStore};

/// 查询完整的能力快照
pub fn query_capabilities(
    store: &dyn RegisterStore,
    binning: BinningPolicy,
) -> Result<CapabilitySnapshot> {
    let (triggers, digital_lines) = triggering_capabilities();

    Ok(CapabilitySnapshot {
        exposure_time_us: query_exposure_time(store)?,
        binning: query_binning(store, binning)?,
        offset: query_roi_offset(store)?,
        shape: query_roi_shape(store)?,
        supported_pixel_types: query_pixel_types(store)?,
        triggers,
        digital_lines,
    })
}

fn query_exposure_time(store: &dyn RegisterStore) -> Result<PropertyMetadata> {
    let unit = store.unit(names::EXPOSURE_TIME)?;
    if unit != names::MICROSECONDS {
        return Err(CameraError::ConfigurationMismatch(format!(
            "expected {} in microseconds, device reports '{}'",
            names::EXPOSURE_TIME,
            unit
        )));
    }

    Ok(PropertyMetadata::floating(
        store.is_writable(names::EXPOSURE_TIME)?,
        store.get_float(names::EXPOSURE_TIME_MIN)? as f32,
        store.get_float(names::EXPOSURE_TIME_MAX)? as f32,
    ))
}

/// 假设水平与垂直 binning 相同
fn query_binning(store: &dyn RegisterStore, policy: BinningPolicy) -> Result<PropertyMetadata> {
    let writable = store.is_writable(names::BINNING_HORIZONTAL)?;

    let (low, high) = match policy {
        BinningPolicy::HardCoded { low, high } => (low, high),
        BinningPolicy::Introspect => {
            let entries = store.enum_entries(names::BINNING_HORIZONTAL)?;
            match binning_range(&entries) {
                Some(range) => range,
                None => {
                    tracing::warn!(
                        target: "rustcv::egrabber",
                        "No usable {} entries in {:?}, falling back to 1..4",
                        names::BINNING_HORIZONTAL,
                        entries
                    );
                    (1, 4)
                }
            }
        }
    };

    Ok(PropertyMetadata::fixed(writable, low as f32, high as f32))
}

/// 解析 "X1" / "X2" / "X4" 形式的枚举项
fn binning_range(entries: &[String]) -> Option<(u8, u8)> {
    let factors: Vec<u8> = entries
        .iter()
        .filter_map(|e| e.strip_prefix('X').unwrap_or(e).parse::<u8>().ok())
        .filter(|f| *f > 0)
        .collect();
    Some((*factors.iter().min()?, *factors.iter().max()?))
}

fn query_roi_offset(store: &dyn RegisterStore) -> Result<AxisMetadata> {
    Ok(AxisMetadata {
        x: PropertyMetadata::fixed(
            store.is_writable(names::OFFSET_X)?,
            get_integer_f32(store, names::OFFSET_X_MIN)?,
            get_integer_f32(store, names::OFFSET_X_MAX)?,
        ),
        y: PropertyMetadata::fixed(
            store.is_writable(names::OFFSET_Y)?,
            get_integer_f32(store, names::OFFSET_Y_MIN)?,
            get_integer_f32(store, names::OFFSET_Y_MAX)?,
        ),
    })
}

fn query_roi_shape(store: &dyn RegisterStore) -> Result<AxisMetadata> {
    Ok(AxisMetadata {
        x: PropertyMetadata::fixed(
            store.is_writable(names::WIDTH)?,
            get_integer_f32(store, names::WIDTH_MIN)?,
            get_integer_f32(store, names::WIDTH_MAX)?,
        ),
        y: PropertyMetadata::fixed(
            store.is_writable(names::HEIGHT)?,
            get_integer_f32(store, names::HEIGHT_MIN)?,
            get_integer_f32(store, names::HEIGHT_MAX)?,
        ),
    })
}

/// 不认识的 PixelFormat 名称直接丢弃
fn query_pixel_types(store: &dyn RegisterStore) -> Result<SampleTypes> {
    Ok(store
        .enum_entries(names::PIXEL_FORMAT)?
        .iter()
        .map(|name| PIXEL_FORMATS.value_or(name, SampleType::Unknown))
        .collect())
}

/// 触发能力是写死的：Vieworks 只有一条输入触发 (ExposureStart)，
/// 线路只关心 Line0 和 Software。换机型需要重新确认。
fn triggering_capabilities() -> (TriggerCapabilities, Vec<String>) {
    (
        TriggerCapabilities {
            frame_start: TriggerPorts {
                input: 1,
                output: 0,
            },
        },
        vec!["Line0".to_string(), "Software".to_string()],
    )
}
