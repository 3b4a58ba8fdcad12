//! 设备抽象层
//!
//! 流式加载只通过 [`GfxDevice`] 与设备打交道，不依赖具体的图形 API。
//! [`HeadlessDevice`] 是一个完整的软件实现，用于测试与 demo。

pub mod barrier;
pub mod desc;
pub mod device;
pub mod handles;
pub mod headless;

pub use barrier::{GfxImageBarrier, ImageLayout};
pub use desc::{AddressMode, BufferDesc, BufferUsage, Filter, MipmapMode, SamplerDesc, TextureDesc, TextureFormat};
pub use device::{FenceStatus, GfxDevice};
pub use handles::{
    GfxBufferHandle, GfxCommandBufferHandle, GfxCommandPoolHandle, GfxFenceHandle, GfxImageHandle, GfxSamplerHandle,
};
pub use headless::{FenceMode, HeadlessDevice, LiveCounts};
