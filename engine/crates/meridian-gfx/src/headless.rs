use anyhow::Context;
use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::{
    barrier::{GfxImageBarrier, ImageLayout},
    desc::{BufferDesc, BufferUsage, SamplerDesc, TextureDesc},
    device::{FenceStatus, GfxDevice},
    handles::{
        GfxBufferHandle, GfxCommandBufferHandle, GfxCommandPoolHandle, GfxFenceHandle, GfxImageHandle,
        GfxSamplerHandle,
    },
};

/// fence 何时变为 signaled
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FenceMode {
    /// 提交时立即执行并 signal
    Immediate,
    /// 被 `fence_status` 查询 n 次之后 signal，模拟设备延迟
    AfterPolls(u32),
    /// 只有 `signal_fence` / `signal_all` / `wait_fence` / `wait_idle` 才会 signal
    Manual,
}

/// 当前存活的设备对象数量
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct LiveCounts {
    pub command_pools: usize,
    pub command_buffers: usize,
    pub buffers: usize,
    pub images: usize,
    pub samplers: usize,
    pub fences: usize,
}

impl LiveCounts {
    pub fn total(&self) -> usize {
        self.command_pools + self.command_buffers + self.buffers + self.images + self.samplers + self.fences
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    Pending,
}

#[derive(Clone, Copy, Debug)]
enum RecordedOp {
    ImageBarrier(GfxImageBarrier),
    CopyBuffer {
        src: GfxBufferHandle,
        dst: GfxBufferHandle,
        size: u64,
    },
    CopyBufferToImage {
        src: GfxBufferHandle,
        dst: GfxImageHandle,
        mip_level: u32,
    },
    BlitMip {
        image: GfxImageHandle,
        src_level: u32,
    },
}

impl RecordedOp {
    fn references_buffer(&self, buffer: GfxBufferHandle) -> bool {
        match *self {
            RecordedOp::CopyBuffer { src, dst, .. } => src == buffer || dst == buffer,
            RecordedOp::CopyBufferToImage { src, .. } => src == buffer,
            _ => false,
        }
    }

    fn references_image(&self, image: GfxImageHandle) -> bool {
        match *self {
            RecordedOp::ImageBarrier(barrier) => barrier.image == image,
            RecordedOp::CopyBufferToImage { dst, .. } => dst == image,
            RecordedOp::BlitMip { image: target, .. } => target == image,
            RecordedOp::CopyBuffer { .. } => false,
        }
    }
}

struct CommandPoolSlot {
    name: String,
}

struct CommandBufferSlot {
    pool: GfxCommandPoolHandle,
    name: String,
    state: CommandBufferState,
    ops: Vec<RecordedOp>,
}

struct BufferSlot {
    name: String,
    bytes: Vec<u8>,
    /// None 表示 staging buffer
    usage: Option<BufferUsage>,
}

struct ImageSlot {
    name: String,
    desc: TextureDesc,
    levels: Vec<Vec<u8>>,
    layouts: Vec<ImageLayout>,
}

struct FenceSlot {
    command_buffer: GfxCommandBufferHandle,
    seq: u64,
    polls: u32,
    signaled: bool,
}

#[derive(Default)]
struct HeadlessState {
    command_pools: SlotMap<GfxCommandPoolHandle, CommandPoolSlot>,
    command_buffers: SlotMap<GfxCommandBufferHandle, CommandBufferSlot>,
    buffers: SlotMap<GfxBufferHandle, BufferSlot>,
    images: SlotMap<GfxImageHandle, ImageSlot>,
    samplers: SlotMap<GfxSamplerHandle, SamplerDesc>,
    fences: SlotMap<GfxFenceHandle, FenceSlot>,

    next_seq: u64,
    submit_count: u64,
}

// tools
impl HeadlessState {
    fn recording_ops(&mut self, command_buffer: GfxCommandBufferHandle) -> &mut Vec<RecordedOp> {
        let slot = self.command_buffers.get_mut(command_buffer).expect("recording into a freed command buffer");
        assert_eq!(
            slot.state,
            CommandBufferState::Recording,
            "command buffer <{}> is not in recording state",
            slot.name
        );
        &mut slot.ops
    }

    fn pending_ops(&self) -> impl Iterator<Item = &RecordedOp> {
        self.fences
            .values()
            .filter(|fence| !fence.signaled)
            .filter_map(|fence| self.command_buffers.get(fence.command_buffer))
            .flat_map(|cmd| cmd.ops.iter())
    }

    /// 执行 fence 对应的 command buffer，然后 signal
    fn signal(&mut self, fence: GfxFenceHandle) {
        let Some(fence_slot) = self.fences.get(fence) else {
            return;
        };
        if fence_slot.signaled {
            return;
        }
        let command_buffer = fence_slot.command_buffer;

        let ops = self
            .command_buffers
            .get(command_buffer)
            .map(|cmd| cmd.ops.clone())
            .expect("pending command buffer was freed before its fence signaled");
        for op in ops {
            self.execute(op);
        }

        if let Some(cmd) = self.command_buffers.get_mut(command_buffer) {
            cmd.state = CommandBufferState::Executable;
        }
        if let Some(fence_slot) = self.fences.get_mut(fence) {
            fence_slot.signaled = true;
        }
    }

    fn signal_all(&mut self) {
        let mut pending: Vec<_> =
            self.fences.iter().filter(|(_, fence)| !fence.signaled).map(|(handle, fence)| (fence.seq, handle)).collect();
        pending.sort_unstable_by_key(|(seq, _)| *seq);
        for (_, fence) in pending {
            self.signal(fence);
        }
    }

    fn execute(&mut self, op: RecordedOp) {
        match op {
            RecordedOp::ImageBarrier(barrier) => {
                let image = self.images.get_mut(barrier.image).expect("barrier on a destroyed image");
                for level in barrier.levels() {
                    let current = &mut image.layouts[level as usize];
                    if barrier.old_layout != ImageLayout::Undefined {
                        assert_eq!(
                            *current, barrier.old_layout,
                            "image <{}> mip {} layout mismatch in barrier",
                            image.name, level
                        );
                    }
                    *current = barrier.new_layout;
                }
            }
            RecordedOp::CopyBuffer { src, dst, size } => {
                let size = size as usize;
                let data = {
                    let src = self.buffers.get(src).expect("copy from a destroyed buffer");
                    assert!(src.bytes.len() >= size, "buffer <{}> is smaller than the copy region", src.name);
                    src.bytes[..size].to_vec()
                };
                let dst = self.buffers.get_mut(dst).expect("copy into a destroyed buffer");
                assert!(dst.bytes.len() >= size, "buffer <{}> is smaller than the copy region", dst.name);
                dst.bytes[..size].copy_from_slice(&data);
            }
            RecordedOp::CopyBufferToImage { src, dst, mip_level } => {
                let src = self.buffers.get(src).expect("copy from a destroyed buffer");
                let image = self.images.get_mut(dst).expect("copy into a destroyed image");
                assert_eq!(
                    image.layouts[mip_level as usize],
                    ImageLayout::TransferDst,
                    "image <{}> mip {} must be TransferDst for copy",
                    image.name,
                    mip_level
                );
                let size = image.desc.level_size_bytes(mip_level);
                assert!(src.bytes.len() >= size, "staging buffer <{}> is smaller than mip {}", src.name, mip_level);
                image.levels[mip_level as usize] = src.bytes[..size].to_vec();
            }
            RecordedOp::BlitMip { image, src_level } => {
                let image = self.images.get_mut(image).expect("blit on a destroyed image");
                let src = src_level as usize;
                let dst = src + 1;
                assert_eq!(image.layouts[src], ImageLayout::TransferSrc, "blit src of <{}> must be TransferSrc", image.name);
                assert_eq!(image.layouts[dst], ImageLayout::TransferDst, "blit dst of <{}> must be TransferDst", image.name);

                let bpp = image.desc.format.bytes_per_pixel();
                let (src_w, src_h) = image.desc.level_extent(src_level);
                let (dst_w, dst_h) = image.desc.level_extent(src_level + 1);
                let mut out = vec![0u8; dst_w as usize * dst_h as usize * bpp];
                // 最近邻降采样
                for y in 0..dst_h {
                    for x in 0..dst_w {
                        let sx = (x * 2).min(src_w - 1) as usize;
                        let sy = (y * 2).min(src_h - 1) as usize;
                        let src_offset = (sy * src_w as usize + sx) * bpp;
                        let dst_offset = (y as usize * dst_w as usize + x as usize) * bpp;
                        out[dst_offset..dst_offset + bpp]
                            .copy_from_slice(&image.levels[src][src_offset..src_offset + bpp]);
                    }
                }
                image.levels[dst] = out;
            }
        }
    }
}

/// 纯软件实现的设备
///
/// 按照 validation layer 的方式检查使用错误，出错时直接 panic：
/// - 释放仍在 pending 的 command buffer
/// - 销毁被 pending 提交引用的 buffer / image
/// - image layout 不匹配
/// - 向不处于 recording 状态的 command buffer 录制命令
pub struct HeadlessDevice {
    state: Mutex<HeadlessState>,
    fence_mode: FenceMode,
}

// new & init
impl HeadlessDevice {
    pub fn new(fence_mode: FenceMode) -> Self {
        log::info!("create headless device, fence mode: {:?}", fence_mode);
        Self {
            state: Mutex::new(HeadlessState::default()),
            fence_mode,
        }
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(FenceMode::Immediate)
    }
}

impl Drop for HeadlessDevice {
    fn drop(&mut self) {
        let counts = self.live_counts();
        if counts.total() > 0 {
            log::warn!("headless device dropped with live objects: {:?}", counts);
        } else {
            log::info!("drop headless device");
        }
    }
}

// getters
impl HeadlessDevice {
    #[inline]
    pub fn fence_mode(&self) -> FenceMode {
        self.fence_mode
    }

    pub fn live_counts(&self) -> LiveCounts {
        let state = self.state.lock();
        LiveCounts {
            command_pools: state.command_pools.len(),
            command_buffers: state.command_buffers.len(),
            buffers: state.buffers.len(),
            images: state.images.len(),
            samplers: state.samplers.len(),
            fences: state.fences.len(),
        }
    }

    /// 累计提交次数
    pub fn submit_count(&self) -> u64 {
        self.state.lock().submit_count
    }

    /// 尚未 signal 的 fence，按提交顺序排列
    pub fn pending_fences(&self) -> Vec<GfxFenceHandle> {
        let state = self.state.lock();
        let mut pending: Vec<_> =
            state.fences.iter().filter(|(_, fence)| !fence.signaled).map(|(handle, fence)| (fence.seq, handle)).collect();
        pending.sort_unstable_by_key(|(seq, _)| *seq);
        pending.into_iter().map(|(_, handle)| handle).collect()
    }

    pub fn buffer_contents(&self, buffer: GfxBufferHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(buffer).map(|slot| slot.bytes.clone())
    }

    pub fn buffer_usage(&self, buffer: GfxBufferHandle) -> Option<BufferUsage> {
        self.state.lock().buffers.get(buffer).and_then(|slot| slot.usage)
    }

    pub fn image_level(&self, image: GfxImageHandle, level: u32) -> Option<Vec<u8>> {
        self.state.lock().images.get(image).and_then(|slot| slot.levels.get(level as usize).cloned())
    }

    pub fn image_layout(&self, image: GfxImageHandle, level: u32) -> Option<ImageLayout> {
        self.state.lock().images.get(image).and_then(|slot| slot.layouts.get(level as usize).copied())
    }

    pub fn is_buffer_alive(&self, buffer: GfxBufferHandle) -> bool {
        self.state.lock().buffers.contains_key(buffer)
    }

    pub fn is_image_alive(&self, image: GfxImageHandle) -> bool {
        self.state.lock().images.contains_key(image)
    }

    pub fn is_sampler_alive(&self, sampler: GfxSamplerHandle) -> bool {
        self.state.lock().samplers.contains_key(sampler)
    }
}

// tools
impl HeadlessDevice {
    /// 手动 signal 一个 fence，会先执行对应的 command buffer
    pub fn signal_fence(&self, fence: GfxFenceHandle) {
        self.state.lock().signal(fence);
    }

    /// 按照提交顺序 signal 所有 pending 的 fence
    pub fn signal_all(&self) {
        self.state.lock().signal_all();
    }
}

impl GfxDevice for HeadlessDevice {
    fn create_command_pool(&self, debug_name: &str) -> anyhow::Result<GfxCommandPoolHandle> {
        let mut state = self.state.lock();
        Ok(state.command_pools.insert(CommandPoolSlot {
            name: debug_name.to_string(),
        }))
    }

    fn destroy_command_pool(&self, pool: GfxCommandPoolHandle) {
        let mut state = self.state.lock();
        let Some(slot) = state.command_pools.remove(pool) else {
            panic!("destroy an unknown command pool");
        };
        assert!(
            state.command_buffers.values().all(|cmd| cmd.pool != pool || cmd.state != CommandBufferState::Pending),
            "command pool <{}> destroyed while one of its command buffers is pending",
            slot.name
        );
        state.command_buffers.retain(|_, cmd| cmd.pool != pool);
    }

    fn allocate_command_buffer(
        &self,
        pool: GfxCommandPoolHandle,
        debug_name: &str,
    ) -> anyhow::Result<GfxCommandBufferHandle> {
        let mut state = self.state.lock();
        if !state.command_pools.contains_key(pool) {
            anyhow::bail!("allocate command buffer <{}> from an unknown command pool", debug_name);
        }
        Ok(state.command_buffers.insert(CommandBufferSlot {
            pool,
            name: debug_name.to_string(),
            state: CommandBufferState::Initial,
            ops: Vec::new(),
        }))
    }

    fn free_command_buffer(&self, pool: GfxCommandPoolHandle, command_buffer: GfxCommandBufferHandle) {
        let mut state = self.state.lock();
        let slot = state.command_buffers.get(command_buffer).expect("free an unknown command buffer");
        assert_eq!(slot.pool, pool, "command buffer <{}> freed into a different pool", slot.name);
        assert_ne!(slot.state, CommandBufferState::Pending, "command buffer <{}> freed while pending", slot.name);
        state.command_buffers.remove(command_buffer);
    }

    fn begin_command_buffer(&self, command_buffer: GfxCommandBufferHandle) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let slot = state.command_buffers.get_mut(command_buffer).context("begin an unknown command buffer")?;
        assert_ne!(slot.state, CommandBufferState::Pending, "command buffer <{}> begun while pending", slot.name);
        slot.state = CommandBufferState::Recording;
        slot.ops.clear();
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: GfxCommandBufferHandle) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let slot = state.command_buffers.get_mut(command_buffer).context("end an unknown command buffer")?;
        assert_eq!(slot.state, CommandBufferState::Recording, "command buffer <{}> ended without begin", slot.name);
        slot.state = CommandBufferState::Executable;
        Ok(())
    }

    fn cmd_image_barrier(&self, command_buffer: GfxCommandBufferHandle, barrier: &GfxImageBarrier) {
        let mut state = self.state.lock();
        let mip_levels = state.images.get(barrier.image).expect("barrier on an unknown image").desc.mip_levels;
        assert!(barrier.base_mip_level + barrier.level_count <= mip_levels, "barrier mip range out of bounds");
        state.recording_ops(command_buffer).push(RecordedOp::ImageBarrier(*barrier));
    }

    fn cmd_copy_buffer(
        &self,
        command_buffer: GfxCommandBufferHandle,
        src: GfxBufferHandle,
        dst: GfxBufferHandle,
        size: u64,
    ) {
        let mut state = self.state.lock();
        assert!(state.buffers.contains_key(src) && state.buffers.contains_key(dst), "copy between unknown buffers");
        state.recording_ops(command_buffer).push(RecordedOp::CopyBuffer { src, dst, size });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: GfxCommandBufferHandle,
        src: GfxBufferHandle,
        dst: GfxImageHandle,
        mip_level: u32,
    ) {
        let mut state = self.state.lock();
        assert!(state.buffers.contains_key(src), "copy from an unknown buffer");
        let mip_levels = state.images.get(dst).expect("copy into an unknown image").desc.mip_levels;
        assert!(mip_level < mip_levels, "copy mip level out of bounds");
        state.recording_ops(command_buffer).push(RecordedOp::CopyBufferToImage { src, dst, mip_level });
    }

    fn cmd_blit_mip(&self, command_buffer: GfxCommandBufferHandle, image: GfxImageHandle, src_level: u32) {
        let mut state = self.state.lock();
        let mip_levels = state.images.get(image).expect("blit on an unknown image").desc.mip_levels;
        assert!(src_level + 1 < mip_levels, "blit target mip level out of bounds");
        state.recording_ops(command_buffer).push(RecordedOp::BlitMip { image, src_level });
    }

    fn create_staging_buffer(&self, data: &[u8], debug_name: &str) -> anyhow::Result<GfxBufferHandle> {
        if data.is_empty() {
            anyhow::bail!("staging buffer <{}> has zero size", debug_name);
        }
        let mut state = self.state.lock();
        Ok(state.buffers.insert(BufferSlot {
            name: debug_name.to_string(),
            bytes: data.to_vec(),
            usage: None,
        }))
    }

    fn create_buffer(&self, desc: &BufferDesc, size: u64, debug_name: &str) -> anyhow::Result<GfxBufferHandle> {
        if size == 0 {
            anyhow::bail!("buffer <{}> has zero size", debug_name);
        }
        let mut state = self.state.lock();
        Ok(state.buffers.insert(BufferSlot {
            name: debug_name.to_string(),
            bytes: vec![0; size as usize],
            usage: Some(desc.usage),
        }))
    }

    fn destroy_buffer(&self, buffer: GfxBufferHandle) {
        let mut state = self.state.lock();
        assert!(
            !state.pending_ops().any(|op| op.references_buffer(buffer)),
            "buffer destroyed while referenced by a pending submission"
        );
        state.buffers.remove(buffer).expect("destroy an unknown buffer");
    }

    fn create_image(&self, desc: &TextureDesc, debug_name: &str) -> anyhow::Result<GfxImageHandle> {
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            anyhow::bail!("image <{}> has an empty extent: {:?}", debug_name, desc);
        }
        if desc.mip_levels > TextureDesc::full_mip_count(desc.width, desc.height) {
            anyhow::bail!("image <{}> requests too many mip levels: {}", debug_name, desc.mip_levels);
        }
        let mut state = self.state.lock();
        let levels = (0..desc.mip_levels).map(|level| vec![0; desc.level_size_bytes(level)]).collect();
        Ok(state.images.insert(ImageSlot {
            name: debug_name.to_string(),
            desc: *desc,
            levels,
            layouts: vec![ImageLayout::Undefined; desc.mip_levels as usize],
        }))
    }

    fn destroy_image(&self, image: GfxImageHandle) {
        let mut state = self.state.lock();
        assert!(
            !state.pending_ops().any(|op| op.references_image(image)),
            "image destroyed while referenced by a pending submission"
        );
        state.images.remove(image).expect("destroy an unknown image");
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> anyhow::Result<GfxSamplerHandle> {
        Ok(self.state.lock().samplers.insert(*desc))
    }

    fn destroy_sampler(&self, sampler: GfxSamplerHandle) {
        self.state.lock().samplers.remove(sampler).expect("destroy an unknown sampler");
    }

    fn submit(&self, command_buffer: GfxCommandBufferHandle) -> anyhow::Result<GfxFenceHandle> {
        let mut state = self.state.lock();
        let slot = state.command_buffers.get_mut(command_buffer).context("submit an unknown command buffer")?;
        assert_eq!(
            slot.state,
            CommandBufferState::Executable,
            "command buffer <{}> submitted without being ended",
            slot.name
        );
        slot.state = CommandBufferState::Pending;

        let seq = state.next_seq;
        state.next_seq += 1;
        state.submit_count += 1;
        let fence = state.fences.insert(FenceSlot {
            command_buffer,
            seq,
            polls: 0,
            signaled: false,
        });

        if self.fence_mode == FenceMode::Immediate {
            state.signal(fence);
        }
        Ok(fence)
    }

    fn fence_status(&self, fence: GfxFenceHandle) -> anyhow::Result<FenceStatus> {
        let mut state = self.state.lock();
        let slot = state.fences.get_mut(fence).context("query status of an unknown fence")?;
        if slot.signaled {
            return Ok(FenceStatus::Signaled);
        }

        slot.polls += 1;
        match self.fence_mode {
            FenceMode::AfterPolls(n) if slot.polls >= n => {
                state.signal(fence);
                Ok(FenceStatus::Signaled)
            }
            _ => Ok(FenceStatus::NotReady),
        }
    }

    fn wait_fence(&self, fence: GfxFenceHandle) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        if !state.fences.contains_key(fence) {
            anyhow::bail!("wait on an unknown fence");
        }
        state.signal(fence);
        Ok(())
    }

    fn destroy_fence(&self, fence: GfxFenceHandle) {
        let mut state = self.state.lock();
        let slot = state.fences.remove(fence).expect("destroy an unknown fence");
        assert!(slot.signaled, "fence destroyed while its submission is still pending");
    }

    fn wait_idle(&self) -> anyhow::Result<()> {
        self.state.lock().signal_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::TextureFormat;

    fn record_buffer_upload(device: &HeadlessDevice, data: &[u8]) -> (GfxCommandPoolHandle, GfxCommandBufferHandle, GfxBufferHandle, GfxBufferHandle) {
        let pool = device.create_command_pool("test-pool").unwrap();
        let cmd = device.allocate_command_buffer(pool, "test-cmd").unwrap();
        let staging = device.create_staging_buffer(data, "staging").unwrap();
        let dst = device.create_buffer(&BufferDesc::new(BufferUsage::Vertex, 4), data.len() as u64, "dst").unwrap();

        device.begin_command_buffer(cmd).unwrap();
        device.cmd_copy_buffer(cmd, staging, dst, data.len() as u64);
        device.end_command_buffer(cmd).unwrap();
        (pool, cmd, staging, dst)
    }

    #[test]
    fn test_buffer_copy_executes_on_signal() {
        let device = HeadlessDevice::new(FenceMode::Manual);
        let (pool, cmd, staging, dst) = record_buffer_upload(&device, &[1, 2, 3, 4]);

        let fence = device.submit(cmd).unwrap();
        assert_eq!(device.fence_status(fence).unwrap(), FenceStatus::NotReady);
        assert_eq!(device.buffer_contents(dst).unwrap(), vec![0, 0, 0, 0]);

        device.signal_fence(fence);
        assert_eq!(device.fence_status(fence).unwrap(), FenceStatus::Signaled);
        assert_eq!(device.buffer_contents(dst).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(device.buffer_usage(dst), Some(BufferUsage::Vertex));

        device.destroy_fence(fence);
        device.free_command_buffer(pool, cmd);
        device.destroy_buffer(staging);
        device.destroy_buffer(dst);
        device.destroy_command_pool(pool);
        assert_eq!(device.live_counts(), LiveCounts::default());
    }

    #[test]
    fn test_after_polls_signals_on_nth_poll() {
        let device = HeadlessDevice::new(FenceMode::AfterPolls(3));
        let (_pool, cmd, _staging, _dst) = record_buffer_upload(&device, &[7; 8]);
        let fence = device.submit(cmd).unwrap();

        assert_eq!(device.fence_status(fence).unwrap(), FenceStatus::NotReady);
        assert_eq!(device.fence_status(fence).unwrap(), FenceStatus::NotReady);
        assert_eq!(device.fence_status(fence).unwrap(), FenceStatus::Signaled);
        assert!(device.pending_fences().is_empty());
    }

    #[test]
    fn test_pending_fences_in_submission_order() {
        let device = HeadlessDevice::new(FenceMode::Manual);
        let (_, cmd_a, _, _) = record_buffer_upload(&device, &[1]);
        let (_, cmd_b, _, _) = record_buffer_upload(&device, &[2]);
        let fence_a = device.submit(cmd_a).unwrap();
        let fence_b = device.submit(cmd_b).unwrap();
        assert_eq!(device.pending_fences(), vec![fence_a, fence_b]);

        device.signal_fence(fence_b);
        assert_eq!(device.pending_fences(), vec![fence_a]);
        device.wait_idle().unwrap();
        assert!(device.pending_fences().is_empty());
        assert_eq!(device.submit_count(), 2);
    }

    #[test]
    #[should_panic(expected = "freed while pending")]
    fn test_free_pending_command_buffer_panics() {
        let device = HeadlessDevice::new(FenceMode::Manual);
        let (pool, cmd, _, _) = record_buffer_upload(&device, &[1, 2]);
        device.submit(cmd).unwrap();
        device.free_command_buffer(pool, cmd);
    }

    #[test]
    #[should_panic(expected = "referenced by a pending submission")]
    fn test_destroy_buffer_in_use_panics() {
        let device = HeadlessDevice::new(FenceMode::Manual);
        let (_, cmd, staging, _) = record_buffer_upload(&device, &[1, 2]);
        device.submit(cmd).unwrap();
        device.destroy_buffer(staging);
    }

    #[test]
    #[should_panic(expected = "not in recording state")]
    fn test_record_without_begin_panics() {
        let device = HeadlessDevice::default();
        let pool = device.create_command_pool("pool").unwrap();
        let cmd = device.allocate_command_buffer(pool, "cmd").unwrap();
        let a = device.create_staging_buffer(&[1], "a").unwrap();
        device.cmd_copy_buffer(cmd, a, a, 1);
    }

    #[test]
    fn test_texture_upload_with_blit_chain() {
        let device = HeadlessDevice::default();
        let desc = TextureDesc::new(4, 4, TextureFormat::R8Unorm).with_full_mips();
        assert_eq!(desc.mip_levels, 3);
        let pixels: Vec<u8> = (0..16).collect();

        let pool = device.create_command_pool("pool").unwrap();
        let cmd = device.allocate_command_buffer(pool, "cmd").unwrap();
        let staging = device.create_staging_buffer(&pixels, "staging").unwrap();
        let image = device.create_image(&desc, "image").unwrap();

        device.begin_command_buffer(cmd).unwrap();
        device.cmd_image_barrier(
            cmd,
            &GfxImageBarrier::new(image)
                .layout_transfer(ImageLayout::Undefined, ImageLayout::TransferDst)
                .mip_range(0, desc.mip_levels),
        );
        device.cmd_copy_buffer_to_image(cmd, staging, image, 0);
        for level in 1..desc.mip_levels {
            device.cmd_image_barrier(
                cmd,
                &GfxImageBarrier::new(image)
                    .layout_transfer(ImageLayout::TransferDst, ImageLayout::TransferSrc)
                    .mip_level(level - 1),
            );
            device.cmd_blit_mip(cmd, image, level - 1);
            device.cmd_image_barrier(
                cmd,
                &GfxImageBarrier::new(image)
                    .layout_transfer(ImageLayout::TransferSrc, ImageLayout::ShaderReadOnly)
                    .mip_level(level - 1),
            );
        }
        device.cmd_image_barrier(
            cmd,
            &GfxImageBarrier::new(image)
                .layout_transfer(ImageLayout::TransferDst, ImageLayout::ShaderReadOnly)
                .mip_level(desc.mip_levels - 1),
        );
        device.end_command_buffer(cmd).unwrap();
        device.submit(cmd).unwrap();

        assert_eq!(device.image_level(image, 0).unwrap(), pixels);
        assert_eq!(device.image_level(image, 1).unwrap(), vec![0, 2, 8, 10]);
        assert_eq!(device.image_level(image, 2).unwrap(), vec![0]);
        for level in 0..desc.mip_levels {
            assert_eq!(device.image_layout(image, level), Some(ImageLayout::ShaderReadOnly));
        }
    }

    #[test]
    #[should_panic(expected = "must be TransferDst for copy")]
    fn test_copy_into_wrong_layout_panics() {
        let device = HeadlessDevice::default();
        let desc = TextureDesc::new(2, 2, TextureFormat::R8Unorm);
        let pool = device.create_command_pool("pool").unwrap();
        let cmd = device.allocate_command_buffer(pool, "cmd").unwrap();
        let staging = device.create_staging_buffer(&[0; 4], "staging").unwrap();
        let image = device.create_image(&desc, "image").unwrap();

        device.begin_command_buffer(cmd).unwrap();
        device.cmd_copy_buffer_to_image(cmd, staging, image, 0);
        device.end_command_buffer(cmd).unwrap();
        device.submit(cmd).unwrap();
    }

    #[test]
    fn test_zero_sized_resources_are_errors() {
        let device = HeadlessDevice::default();
        assert!(device.create_staging_buffer(&[], "empty").is_err());
        assert!(device.create_buffer(&BufferDesc::new(BufferUsage::Index, 4), 0, "empty").is_err());
        assert!(device.create_image(&TextureDesc::new(0, 4, TextureFormat::Rgba8Unorm), "empty").is_err());
    }
}
