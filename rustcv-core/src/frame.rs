use crate::pixel_format::SampleType;

/// 图像各维度的尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageDims {
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    pub planes: u32,
}

/// 各维度的步长 (以采样为单位，而不是字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageStrides {
    pub channels: i64,
    pub width: i64,
    pub height: i64,
    pub planes: i64,
}

/// 图像形状：由寄存器状态或 Buffer 元数据推导，只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageShape {
    pub dims: ImageDims,
    pub strides: ImageStrides,
    pub sample_type: SampleType,
}

impl ImageShape {
    /// 单通道、单平面、紧密排列的图像
    pub fn mono(width: u32, height: u32, sample_type: SampleType) -> Self {
        Self {
            dims: ImageDims {
                channels: 1,
                width,
                height,
                planes: 1,
            },
            strides: ImageStrides {
                channels: 1,
                width: 1,
                height: width as i64,
                planes: width as i64 * height as i64,
            },
            sample_type,
        }
    }

    /// 一帧图像占用的字节数
    ///
    /// 未知采样类型按每像素 1 字节估算。
    pub fn bytes_of_image(&self) -> usize {
        self.strides.planes.max(0) as usize
            * self.dims.planes as usize
            * self.sample_type.bytes_per_sample().max(1)
    }
}

/// 每一帧附带的信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageInfo {
    pub shape: ImageShape,

    /// 硬件原始时间戳 (纳秒)
    pub hardware_timestamp: u64,

    /// 进程内单调递增的帧序号，与硬件序号无关
    /// start() 时归零
    pub hardware_frame_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_strides() {
        let shape = ImageShape::mono(640, 480, SampleType::U12);
        assert_eq!(shape.strides.width, 1);
        assert_eq!(shape.strides.height, 640);
        assert_eq!(shape.strides.planes, 640 * 480);
        assert_eq!(shape.bytes_of_image(), 640 * 480 * 2);
    }

    #[test]
    fn unknown_sample_type_still_has_size() {
        let shape = ImageShape::mono(64, 48, SampleType::Unknown);
        assert_eq!(shape.bytes_of_image(), 64 * 48);
    }
}
