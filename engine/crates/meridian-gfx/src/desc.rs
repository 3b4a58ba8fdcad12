#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MipmapMode {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Sampler descriptor
///
/// 每个 texture 在加载时按照该描述创建自己的 sampler。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub mipmap_mode: MipmapMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
    /// 0 表示不开启各向异性过滤
    pub max_anisotropy: u32,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            mipmap_mode: MipmapMode::Linear,
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            max_anisotropy: 0,
        }
    }
}

impl SamplerDesc {
    /// 适合地图瓦片这类不允许边缘采样越界的纹理
    pub fn clamp_to_edge() -> Self {
        Self {
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Rgba16Float,
    Rgba32Float,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8Srgb => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

/// 2D texture 的描述
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub mip_levels: u32,
}

// new & init
impl TextureDesc {
    /// 只有一个 mip level
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            mip_levels: 1,
        }
    }

    /// 带完整 mip 链：`floor(log2(max(w, h))) + 1`
    pub fn with_full_mips(mut self) -> Self {
        self.mip_levels = Self::full_mip_count(self.width, self.height);
        self
    }
}

// tools
impl TextureDesc {
    pub fn full_mip_count(width: u32, height: u32) -> u32 {
        let max_extent = width.max(height).max(1);
        u32::BITS - max_extent.leading_zeros()
    }

    /// 第 `level` 层的尺寸，每一层至少为 1x1
    #[inline]
    pub fn level_extent(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    #[inline]
    pub fn level_size_bytes(&self, level: u32) -> usize {
        let (w, h) = self.level_extent(level);
        w as usize * h as usize * self.format.bytes_per_pixel()
    }
}

/// device buffer 的用途；创建时总会额外带上 transfer dst
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    Storage,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferDesc {
    pub usage: BufferUsage,
    /// 单个元素的字节数，例如顶点的 stride；对于 uniform buffer 可以是整个 struct 的大小
    pub element_size: u32,
}

impl BufferDesc {
    pub fn new(usage: BufferUsage, element_size: u32) -> Self {
        Self { usage, element_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mip_count() {
        assert_eq!(TextureDesc::full_mip_count(1, 1), 1);
        assert_eq!(TextureDesc::full_mip_count(2, 2), 2);
        assert_eq!(TextureDesc::full_mip_count(256, 256), 9);
        assert_eq!(TextureDesc::full_mip_count(300, 17), 9);
        assert_eq!(TextureDesc::full_mip_count(1, 1024), 11);
    }

    #[test]
    fn test_level_extent_clamps_to_one() {
        let desc = TextureDesc::new(8, 2, TextureFormat::Rgba8Unorm).with_full_mips();
        assert_eq!(desc.mip_levels, 4);
        assert_eq!(desc.level_extent(0), (8, 2));
        assert_eq!(desc.level_extent(1), (4, 1));
        assert_eq!(desc.level_extent(3), (1, 1));
        assert_eq!(desc.level_size_bytes(1), 16);
    }
}
