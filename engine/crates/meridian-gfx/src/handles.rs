use slotmap::new_key_type;

// 设备对象的句柄，由具体的 GfxDevice 实现负责分配与回收
new_key_type! {
    /// Command Pool Handle
    pub struct GfxCommandPoolHandle;
    /// Command Buffer Handle
    pub struct GfxCommandBufferHandle;
    /// Fence Handle
    pub struct GfxFenceHandle;
    /// Buffer Handle（staging buffer 与 device buffer 共用）
    pub struct GfxBufferHandle;
    /// Image Handle
    pub struct GfxImageHandle;
    /// Sampler Handle
    pub struct GfxSamplerHandle;
}
