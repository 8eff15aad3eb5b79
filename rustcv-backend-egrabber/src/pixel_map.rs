use std::collections::HashMap;
use std::hash::Hash;
use std::sync::LazyLock;

use rustcv_core::pixel_format::SampleType;
use rustcv_core::properties::{TriggerEdge, TriggerLine};

/// 双向静态查找表：GenICam 名称 <-> 抽象枚举
///
/// 只在首次使用时构建一次。回读时查不到的名称走调用方给的默认值，
/// 不当作错误。
#[derive(Debug)]
pub struct NameTable<T: 'static> {
    forward: HashMap<&'static str, T>,
    inverse: HashMap<T, &'static str>,
}

impl<T: Copy + Eq + Hash> NameTable<T> {
    pub fn new(pairs: &[(&'static str, T)]) -> Self {
        Self {
            forward: pairs.iter().copied().collect(),
            inverse: pairs.iter().map(|(n, v)| (*v, *n)).collect(),
        }
    }

    pub fn value(&self, name: &str) -> Option<T> {
        self.forward.get(name).copied()
    }

    /// 查不到时返回 `default`
    pub fn value_or(&self, name: &str, default: T) -> T {
        self.value(name).unwrap_or(default)
    }

    pub fn name_of(&self, value: T) -> Option<&'static str> {
        self.inverse.get(&value).copied()
    }
}

pub static PIXEL_FORMATS: LazyLock<NameTable<SampleType>> = LazyLock::new(|| {
    NameTable::new(&[
        ("Mono8", SampleType::U8),
        ("Mono10", SampleType::U10),
        ("Mono12", SampleType::U12),
        ("Mono14", SampleType::U14),
        ("Mono16", SampleType::U16),
    ])
});

/// TriggerActivation。回读覆盖全部取值，写入只允许上升/下降沿。
pub static TRIGGER_EDGES: LazyLock<NameTable<TriggerEdge>> = LazyLock::new(|| {
    NameTable::new(&[
        ("RisingEdge", TriggerEdge::Rising),
        ("FallingEdge", TriggerEdge::Falling),
        ("AnyEdge", TriggerEdge::AnyEdge),
        ("LevelHigh", TriggerEdge::LevelHigh),
        ("LevelLow", TriggerEdge::LevelLow),
    ])
});

pub static TRIGGER_SOURCES: LazyLock<NameTable<TriggerLine>> = LazyLock::new(|| {
    NameTable::new(&[
        ("Line0", TriggerLine::Line0),
        ("Software", TriggerLine::Software),
    ])
});

pub static TRIGGER_MODES: LazyLock<NameTable<bool>> =
    LazyLock::new(|| NameTable::new(&[("Off", false), ("On", true)]));

/// 将 GenICam PixelFormat 名称转换为 SampleType
pub fn from_pixel_format(name: &str) -> SampleType {
    match PIXEL_FORMATS.value(name) {
        Some(ty) => ty,
        None => {
            tracing::warn!(target: "rustcv::egrabber", "Unknown pixel format: {}", name);
            SampleType::Unknown
        }
    }
}

/// 将 SampleType 转换为 GenICam PixelFormat 名称
/// 用于请求设备设置格式
pub fn to_pixel_format(ty: SampleType) -> Option<&'static str> {
    PIXEL_FORMATS.name_of(ty)
}

/// 只有这两种边沿可以写入 TriggerActivation
pub fn settable_activation(edge: TriggerEdge) -> Option<&'static str> {
    match edge {
        TriggerEdge::Rising | TriggerEdge::Falling => TRIGGER_EDGES.name_of(edge),
        _ => None,
    }
}
