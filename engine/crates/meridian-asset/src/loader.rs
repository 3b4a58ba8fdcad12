use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;

use meridian_async::{BoundedQueue, WorkItem};
use meridian_gfx::{
    BufferDesc, GfxBufferHandle, GfxCommandBufferHandle, GfxDevice, GfxImageBarrier, GfxImageHandle,
    GfxSamplerHandle, ImageLayout, SamplerDesc, TextureDesc, TextureFormat,
};

use crate::{error::fatal, handle::AssetHandle, recording::RecordingContexts};

/// 已经解码好的像素数据
pub struct TextureSource {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// level 0 的像素，大小为 `width * height * bytes_per_pixel`
    pub pixels: Vec<u8>,
    /// 是否在 GPU 上通过 blit 生成完整的 mip 链
    pub generate_mips: bool,
}

impl TextureSource {
    pub fn new(width: u32, height: u32, format: TextureFormat, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            pixels,
            generate_mips: false,
        }
    }

    pub fn with_mips(mut self) -> Self {
        self.generate_mips = true;
        self
    }

    pub fn desc(&self) -> TextureDesc {
        let desc = TextureDesc::new(self.width, self.height, self.format);
        if self.generate_mips { desc.with_full_mips() } else { desc }
    }

    #[inline]
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// 加载完成的 texture
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TextureResource {
    pub image: GfxImageHandle,
    pub sampler: GfxSamplerHandle,
    pub desc: TextureDesc,
    /// 上传完成时分配
    pub bindless_index: Option<u32>,
}

/// 加载完成的 buffer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BufferResource {
    pub buffer: GfxBufferHandle,
    pub size: u64,
    pub desc: BufferDesc,
}

impl BufferResource {
    /// 按 element_size 计算的元素数量，例如顶点数
    #[inline]
    pub fn element_count(&self) -> u64 {
        if self.desc.element_size == 0 { 0 } else { self.size / self.desc.element_size as u64 }
    }
}

#[derive(Debug)]
pub enum UploadPayload {
    Texture(TextureResource),
    Buffer(BufferResource),
}

/// worker 录制完成后交给 owner 线程的数据
#[derive(Debug)]
pub struct RecordedUpload {
    pub worker_id: usize,
    pub command_buffer: GfxCommandBufferHandle,
    /// fence signal 之后才能销毁
    pub staging: GfxBufferHandle,
    pub handle: AssetHandle,
    pub payload: UploadPayload,
}

pub(crate) enum LoadRequest {
    Texture {
        handle: AssetHandle,
        sampler: SamplerDesc,
        source: TextureSource,
    },
    Buffer {
        handle: AssetHandle,
        desc: BufferDesc,
        bytes: Vec<u8>,
    },
}

impl LoadRequest {
    fn handle(&self) -> AssetHandle {
        match self {
            LoadRequest::Texture { handle, .. } | LoadRequest::Buffer { handle, .. } => *handle,
        }
    }
}

/// owner 线程与 worker 线程共享的加载状态
pub(crate) struct LoaderShared {
    pub device: Arc<dyn GfxDevice>,
    pub recorders: RecordingContexts,
    /// worker -> owner
    pub submissions: BoundedQueue<RecordedUpload>,
    /// 已投递但还没有进入 submission queue 的任务数量
    pub in_flight: AtomicUsize,
}

/// 任务结束时（包括 panic）减少 in-flight 计数
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl LoaderShared {
    /// 调用方负责在投递之前增加 `in_flight`
    pub fn make_job(self: &Arc<Self>, request: LoadRequest) -> WorkItem {
        let shared = self.clone();
        WorkItem::job(move |ctx| shared.run_job(ctx.thread_id, request))
    }

    fn run_job(&self, worker_id: usize, request: LoadRequest) {
        let _span = tracy_client::span!("load_job");
        let _in_flight = InFlightGuard(&self.in_flight);

        let handle = request.handle();
        match record_upload(self.device.as_ref(), &self.recorders, worker_id, request) {
            Ok(upload) => {
                log::debug!("worker {} recorded upload for {:?}", worker_id, handle);
                self.submissions.push(upload);
            }
            Err(err) => fatal(&format!("record upload for {:?}", handle), err),
        }
    }
}

/// 在 worker 线程上录制一次上传
///
/// 只在分配 command buffer 时持有 recording context 的锁，录制本身不加锁。
pub(crate) fn record_upload(
    device: &dyn GfxDevice,
    recorders: &RecordingContexts,
    worker_id: usize,
    request: LoadRequest,
) -> anyhow::Result<RecordedUpload> {
    let handle = request.handle();
    let name = format!("{:?}-{}v{}", handle.kind(), handle.index(), handle.generation());

    let command_buffer = recorders.allocate(worker_id, &name).context("Failed to allocate command buffer")?;
    device.begin_command_buffer(command_buffer)?;

    let (staging, payload) = match request {
        LoadRequest::Texture { sampler, source, .. } => {
            record_texture(device, command_buffer, &name, &sampler, &source).context("Failed to record texture")?
        }
        LoadRequest::Buffer { desc, bytes, .. } => {
            record_buffer(device, command_buffer, &name, &desc, &bytes).context("Failed to record buffer")?
        }
    };

    device.end_command_buffer(command_buffer)?;
    Ok(RecordedUpload {
        worker_id,
        command_buffer,
        staging,
        handle,
        payload,
    })
}

fn record_texture(
    device: &dyn GfxDevice,
    cmd: GfxCommandBufferHandle,
    name: &str,
    sampler_desc: &SamplerDesc,
    source: &TextureSource,
) -> anyhow::Result<(GfxBufferHandle, UploadPayload)> {
    let desc = source.desc();
    let staging = device.create_staging_buffer(&source.pixels, &format!("{}-staging", name))?;
    let image = device.create_image(&desc, name)?;
    let sampler = device.create_sampler(sampler_desc)?;

    device.cmd_image_barrier(
        cmd,
        &GfxImageBarrier::new(image)
            .layout_transfer(ImageLayout::Undefined, ImageLayout::TransferDst)
            .mip_range(0, desc.mip_levels),
    );
    device.cmd_copy_buffer_to_image(cmd, staging, image, 0);

    // 逐级 blit：L-1 作为 src，写入 L，随后 L-1 就可以给 shader 读取了
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

    let texture = TextureResource {
        image,
        sampler,
        desc,
        bindless_index: None,
    };
    Ok((staging, UploadPayload::Texture(texture)))
}

fn record_buffer(
    device: &dyn GfxDevice,
    cmd: GfxCommandBufferHandle,
    name: &str,
    desc: &BufferDesc,
    bytes: &[u8],
) -> anyhow::Result<(GfxBufferHandle, UploadPayload)> {
    let size = bytes.len() as u64;
    let staging = device.create_staging_buffer(bytes, &format!("{}-staging", name))?;
    let buffer = device.create_buffer(desc, size, name)?;
    device.cmd_copy_buffer(cmd, staging, buffer, size);

    let resource = BufferResource {
        buffer,
        size,
        desc: *desc,
    };
    Ok((staging, UploadPayload::Buffer(resource)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset_table::AssetTable,
        handle::{AssetId, AssetKind},
    };
    use meridian_gfx::{BufferUsage, FenceMode, HeadlessDevice};

    #[test]
    fn test_record_texture_with_mips() {
        let device = Arc::new(HeadlessDevice::new(FenceMode::Manual));
        let recorders = RecordingContexts::new(device.clone(), 1, "Test").unwrap();
        let mut table: AssetTable<TextureResource> = AssetTable::new(AssetKind::Texture, 4);
        let (handle, _) = table.get_or_create(AssetId(1));

        let pixels = vec![200u8; 8 * 8 * 4];
        let request = LoadRequest::Texture {
            handle,
            sampler: SamplerDesc::default(),
            source: TextureSource::new(8, 8, TextureFormat::Rgba8Unorm, pixels.clone()).with_mips(),
        };
        let upload = record_upload(device.as_ref(), &recorders, 0, request).unwrap();
        assert_eq!(upload.handle, handle);

        let UploadPayload::Texture(texture) = upload.payload else {
            panic!("expected texture payload");
        };
        assert_eq!(texture.desc.mip_levels, 4);

        device.submit(upload.command_buffer).unwrap();
        device.signal_all();
        assert_eq!(device.image_level(texture.image, 0).unwrap(), pixels);
        assert_eq!(device.image_level(texture.image, 3).unwrap(), vec![200u8; 4]);
        for level in 0..4 {
            assert_eq!(device.image_layout(texture.image, level), Some(ImageLayout::ShaderReadOnly));
        }
    }

    #[test]
    fn test_record_buffer_copies_full_size() {
        let device = Arc::new(HeadlessDevice::new(FenceMode::Immediate));
        let recorders = RecordingContexts::new(device.clone(), 2, "Test").unwrap();
        let mut table: AssetTable<BufferResource> = AssetTable::new(AssetKind::Buffer, 4);
        let (handle, _) = table.get_or_create(AssetId(9));

        let bytes: Vec<u8> = (0..48).collect();
        let request = LoadRequest::Buffer {
            handle,
            desc: BufferDesc::new(BufferUsage::Vertex, 12),
            bytes: bytes.clone(),
        };
        let upload = record_upload(device.as_ref(), &recorders, 1, request).unwrap();
        assert_eq!(upload.worker_id, 1);

        let UploadPayload::Buffer(buffer) = upload.payload else {
            panic!("expected buffer payload");
        };
        assert_eq!(buffer.size, 48);
        assert_eq!(buffer.element_count(), 4);

        device.submit(upload.command_buffer).unwrap();
        assert_eq!(device.buffer_contents(buffer.buffer).unwrap(), bytes);
        assert_eq!(device.buffer_usage(buffer.buffer), Some(BufferUsage::Vertex));
    }

    #[test]
    fn test_empty_buffer_is_an_error() {
        let device = Arc::new(HeadlessDevice::new(FenceMode::Immediate));
        let recorders = RecordingContexts::new(device.clone(), 1, "Test").unwrap();
        let mut table: AssetTable<BufferResource> = AssetTable::new(AssetKind::Buffer, 4);
        let (handle, _) = table.get_or_create(AssetId(1));

        let request = LoadRequest::Buffer {
            handle,
            desc: BufferDesc::new(BufferUsage::Index, 4),
            bytes: Vec::new(),
        };
        let err = record_upload(device.as_ref(), &recorders, 0, request).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to record buffer"));
    }
}
