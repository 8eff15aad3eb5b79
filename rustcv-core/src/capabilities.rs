use crate::pixel_format::{SampleType, SampleTypes};

/// 参数取值的精度类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyKind {
    /// 整数
    #[default]
    FixedPrecision,
    /// 浮点
    FloatingPrecision,
}

/// 单个参数的能力描述：是否可写以及 [low, high] 区间
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyMetadata {
    pub writable: bool,
    pub low: f32,
    pub high: f32,
    pub kind: PropertyKind,
}

impl PropertyMetadata {
    pub fn fixed(writable: bool, low: f32, high: f32) -> Self {
        Self {
            writable,
            low,
            high,
            kind: PropertyKind::FixedPrecision,
        }
    }

    pub fn floating(writable: bool, low: f32, high: f32) -> Self {
        Self {
            writable,
            low,
            high,
            kind: PropertyKind::FloatingPrecision,
        }
    }

    /// 将浮点值限制到区间内，NaN 取下界
    pub fn clamp_f32(&self, value: f32) -> f32 {
        if value.is_nan() || value < self.low {
            self.low
        } else if value > self.high {
            self.high
        } else {
            value
        }
    }

    /// 将整数值限制到区间内
    ///
    /// 比较在浮点域进行，越界时取边界值 (截断为整数)。
    pub fn clamp_u32(&self, value: u32) -> u32 {
        let v = value as f32;
        if v < self.low {
            self.low.max(0.0) as u32
        } else if v > self.high {
            self.high.max(0.0) as u32
        } else {
            value
        }
    }

    pub fn clamp_u8(&self, value: u8) -> u8 {
        self.clamp_u32(value as u32).min(u8::MAX as u32) as u8
    }

    pub fn contains(&self, value: f32) -> bool {
        self.low <= value && value <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisMetadata {
    pub x: PropertyMetadata,
    pub y: PropertyMetadata,
}

/// 触发口数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerPorts {
    pub input: u8,
    pub output: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerCapabilities {
    pub frame_start: TriggerPorts,
}

/// 能力快照
///
/// 打开设备时查询一次，之后视为不可变，直到显式重新查询。
/// 所有 clamp 决策都以它为准。
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CapabilitySnapshot {
    pub exposure_time_us: PropertyMetadata,
    pub binning: PropertyMetadata,
    pub offset: AxisMetadata,
    pub shape: AxisMetadata,
    pub supported_pixel_types: SampleTypes,
    pub triggers: TriggerCapabilities,
    /// 数字线路名称，下标即 TriggerLine 的序号
    pub digital_lines: Vec<String>,
}

impl CapabilitySnapshot {
    pub fn supports_pixel_type(&self, ty: SampleType) -> bool {
        self.supported_pixel_types.supports(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_float_to_range() {
        let meta = PropertyMetadata::floating(true, 10.0, 1e7);
        assert_eq!(meta.clamp_f32(5.0), 10.0);
        assert_eq!(meta.clamp_f32(1e6), 1e6);
        assert_eq!(meta.clamp_f32(2e7), 1e7);
        assert_eq!(meta.clamp_f32(f32::NAN), 10.0);
        assert_eq!(meta.clamp_f32(f32::INFINITY), 1e7);
    }

    #[test]
    fn clamp_integer_to_range() {
        let meta = PropertyMetadata::fixed(true, 1.0, 4.0);
        assert_eq!(meta.clamp_u8(0), 1);
        assert_eq!(meta.clamp_u8(3), 3);
        assert_eq!(meta.clamp_u8(9), 4);

        let roi = PropertyMetadata::fixed(true, 16.0, 14192.0);
        assert_eq!(roi.clamp_u32(8), 16);
        assert_eq!(roi.clamp_u32(20000), 14192);
    }

    #[test]
    fn clamped_value_always_in_range() {
        let meta = PropertyMetadata::fixed(true, 0.0, 100.0);
        for v in [0u32, 1, 50, 99, 100, 101, u32::MAX] {
            let w = meta.clamp_u32(v);
            assert!(meta.contains(w as f32), "{v} -> {w}");
            if v <= 100 {
                assert_eq!(w, v);
            }
        }
    }
}
