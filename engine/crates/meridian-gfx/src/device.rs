use crate::{
    barrier::GfxImageBarrier,
    desc::{BufferDesc, SamplerDesc, TextureDesc},
    handles::{
        GfxBufferHandle, GfxCommandBufferHandle, GfxCommandPoolHandle, GfxFenceHandle, GfxImageHandle,
        GfxSamplerHandle,
    },
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FenceStatus {
    Signaled,
    NotReady,
}

/// 流式加载所需要的设备接口
///
/// 实现需要是内部同步的（和 Vulkan device 一样），可以在多个线程同时调用。
/// 但是同一个 command pool 同一时间只能被一个线程使用，这一点由调用方保证。
///
/// 录制类的命令（`cmd_*`）不返回错误，错误的使用方式由实现自行校验。
pub trait GfxDevice: Send + Sync {
    // command pool & command buffer
    fn create_command_pool(&self, debug_name: &str) -> anyhow::Result<GfxCommandPoolHandle>;
    /// pool 中剩余的 command buffer 会一并释放
    fn destroy_command_pool(&self, pool: GfxCommandPoolHandle);
    fn allocate_command_buffer(
        &self,
        pool: GfxCommandPoolHandle,
        debug_name: &str,
    ) -> anyhow::Result<GfxCommandBufferHandle>;
    fn free_command_buffer(&self, pool: GfxCommandPoolHandle, command_buffer: GfxCommandBufferHandle);
    fn begin_command_buffer(&self, command_buffer: GfxCommandBufferHandle) -> anyhow::Result<()>;
    fn end_command_buffer(&self, command_buffer: GfxCommandBufferHandle) -> anyhow::Result<()>;

    // recording
    fn cmd_image_barrier(&self, command_buffer: GfxCommandBufferHandle, barrier: &GfxImageBarrier);
    fn cmd_copy_buffer(
        &self,
        command_buffer: GfxCommandBufferHandle,
        src: GfxBufferHandle,
        dst: GfxBufferHandle,
        size: u64,
    );
    /// 将 buffer 的内容整体拷贝到 image 的某个 mip level，image 需要处于 TransferDst
    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: GfxCommandBufferHandle,
        src: GfxBufferHandle,
        dst: GfxImageHandle,
        mip_level: u32,
    );
    /// 从 `src_level` blit 到 `src_level + 1`，尺寸减半
    fn cmd_blit_mip(&self, command_buffer: GfxCommandBufferHandle, image: GfxImageHandle, src_level: u32);

    // resources
    /// host visible 的 staging buffer，创建时写入 `data`
    fn create_staging_buffer(&self, data: &[u8], debug_name: &str) -> anyhow::Result<GfxBufferHandle>;
    fn create_buffer(&self, desc: &BufferDesc, size: u64, debug_name: &str) -> anyhow::Result<GfxBufferHandle>;
    fn destroy_buffer(&self, buffer: GfxBufferHandle);
    fn create_image(&self, desc: &TextureDesc, debug_name: &str) -> anyhow::Result<GfxImageHandle>;
    fn destroy_image(&self, image: GfxImageHandle);
    fn create_sampler(&self, desc: &SamplerDesc) -> anyhow::Result<GfxSamplerHandle>;
    fn destroy_sampler(&self, sampler: GfxSamplerHandle);

    // submission
    /// 提交一个已经 end 的 command buffer，返回一个新的 fence
    fn submit(&self, command_buffer: GfxCommandBufferHandle) -> anyhow::Result<GfxFenceHandle>;
    /// 非阻塞地查询 fence 状态
    fn fence_status(&self, fence: GfxFenceHandle) -> anyhow::Result<FenceStatus>;
    /// 阻塞等待 fence，没有超时
    fn wait_fence(&self, fence: GfxFenceHandle) -> anyhow::Result<()>;
    fn destroy_fence(&self, fence: GfxFenceHandle);
    fn wait_idle(&self) -> anyhow::Result<()>;
}
