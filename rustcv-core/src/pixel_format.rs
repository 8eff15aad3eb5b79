use bitflags::bitflags;
use std::fmt::{self, Display};

/// 采样类型 (每个像素的位深与符号)
///
/// 判别值同时是 [`SampleTypes`] 掩码中的位序号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SampleType {
    #[default]
    U8 = 0,
    U16 = 1,
    I8 = 2,
    I16 = 3,
    F32 = 4,
    U10 = 5,
    U12 = 6,
    U14 = 7,
    /// 驱动返回了库不认识的格式
    Unknown = 0xff,
}

impl SampleType {
    /// 所有已知类型，按位序号排列
    pub const ALL: [SampleType; 8] = [
        Self::U8,
        Self::U16,
        Self::I8,
        Self::I16,
        Self::F32,
        Self::U10,
        Self::U12,
        Self::U14,
    ];

    /// 每个采样在内存中占用的字节数
    /// 10/12/14 bit 按 16 bit 容器存放
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::U10 | Self::U12 | Self::U14 => 2,
            Self::F32 => 4,
            Self::Unknown => 0,
        }
    }

    /// 有效位深
    pub fn bit_depth(&self) -> u32 {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::U10 => 10,
            Self::U12 => 12,
            Self::U14 => 14,
            Self::U16 | Self::I16 => 16,
            Self::F32 => 32,
            Self::Unknown => 0,
        }
    }

    /// 对应的掩码位；Unknown 没有掩码位
    pub fn flag(&self) -> SampleTypes {
        match self {
            Self::Unknown => SampleTypes::empty(),
            other => SampleTypes::from_bits_truncate(1 << (*other as u8)),
        }
    }
}

impl Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::F32 => "f32",
            Self::U10 => "u10",
            Self::U12 => "u12",
            Self::U14 => "u14",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// 设备支持的像素类型集合
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    pub struct SampleTypes: u64 {
        const U8 = 1 << 0;
        const U16 = 1 << 1;
        const I8 = 1 << 2;
        const I16 = 1 << 3;
        const F32 = 1 << 4;
        const U10 = 1 << 5;
        const U12 = 1 << 6;
        const U14 = 1 << 7;
    }
}

impl SampleTypes {
    pub fn supports(&self, ty: SampleType) -> bool {
        ty != SampleType::Unknown && self.contains(ty.flag())
    }

    /// 展开为具体类型列表
    pub fn iter_types(&self) -> impl Iterator<Item = SampleType> + '_ {
        SampleType::ALL.into_iter().filter(|t| self.supports(*t))
    }
}

impl FromIterator<SampleType> for SampleTypes {
    fn from_iter<I: IntoIterator<Item = SampleType>>(iter: I) -> Self {
        iter.into_iter()
            .fold(SampleTypes::empty(), |acc, t| acc | t.flag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_follow_discriminant() {
        assert_eq!(SampleType::U12.flag(), SampleTypes::U12);
        assert_eq!(SampleType::F32.flag(), SampleTypes::F32);
        assert!(SampleType::Unknown.flag().is_empty());
    }

    #[test]
    fn unknown_is_never_supported() {
        assert!(!SampleTypes::all().supports(SampleType::Unknown));
    }

    #[test]
    fn collect_and_expand() {
        let set: SampleTypes = [SampleType::U8, SampleType::U14, SampleType::Unknown]
            .into_iter()
            .collect();
        assert_eq!(set, SampleTypes::U8 | SampleTypes::U14);
        let back: Vec<_> = set.iter_types().collect();
        assert_eq!(back, vec![SampleType::U8, SampleType::U14]);
    }

    #[test]
    fn container_sizes() {
        assert_eq!(SampleType::U8.bytes_per_sample(), 1);
        assert_eq!(SampleType::U12.bytes_per_sample(), 2);
        assert_eq!(SampleType::U12.bit_depth(), 12);
    }
}
