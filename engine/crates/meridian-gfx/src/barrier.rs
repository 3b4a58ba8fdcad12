use crate::handles::GfxImageHandle;

/// upload 过程中 image 会经历的 layout
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ImageLayout {
    Undefined,
    TransferSrc,
    TransferDst,
    ShaderReadOnly,
}

/// 便捷创建 image layout transition 的结构体
///
/// old layout 为 `Undefined` 时表示丢弃原有内容，不做校验。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GfxImageBarrier {
    pub image: GfxImageHandle,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub base_mip_level: u32,
    pub level_count: u32,
}

impl GfxImageBarrier {
    pub fn new(image: GfxImageHandle) -> Self {
        Self {
            image,
            old_layout: ImageLayout::Undefined,
            new_layout: ImageLayout::Undefined,
            base_mip_level: 0,
            level_count: 1,
        }
    }

    /// builder
    #[inline]
    pub fn layout_transfer(mut self, old_layout: ImageLayout, new_layout: ImageLayout) -> Self {
        self.old_layout = old_layout;
        self.new_layout = new_layout;
        self
    }

    /// builder
    #[inline]
    pub fn mip_range(mut self, base_mip_level: u32, level_count: u32) -> Self {
        self.base_mip_level = base_mip_level;
        self.level_count = level_count;
        self
    }

    /// builder，只作用于单个 mip level
    #[inline]
    pub fn mip_level(self, level: u32) -> Self {
        self.mip_range(level, 1)
    }

    #[inline]
    pub fn levels(&self) -> std::ops::Range<u32> {
        self.base_mip_level..self.base_mip_level + self.level_count
    }
}
