use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use crossbeam_utils::Backoff;

use meridian_async::{BoundedQueue, WorkerPool};
use meridian_gfx::{BufferDesc, GfxDevice, SamplerDesc};

use crate::{
    asset_table::AssetTable,
    bindless::DescriptorIndexAllocator,
    config::AssetManagerConfig,
    deletion_queue::DeferredDeletionQueue,
    error::{StreamError, fatal},
    handle::{AssetHandle, AssetId, AssetKind, LoadStatus},
    loader::{BufferResource, LoadRequest, LoaderShared, TextureResource, TextureSource, UploadPayload},
    recording::RecordingContexts,
    submission::{CompletedUpload, SubmissionTracker},
};

/// 运行时统计
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct AssetManagerStats {
    /// 所有 load 请求，包括重复的
    pub requests: u64,
    /// 命中已有记录、没有产生新任务的请求
    pub deduplicated: u64,
    pub dispatched: u64,
    /// try_load 时因为队列已满被拒绝的请求
    pub rejected: u64,
    pub completed: u64,
    pub released: u64,
    pub destroyed: u64,

    pub in_flight_jobs: usize,
    pub pending_submissions: usize,
    pub pending_deletions: usize,
    pub textures: usize,
    pub buffers: usize,
    pub bindless_in_use: u32,
    pub current_frame: u64,
}

/// 两张资源表以及 bindless 下标，只由 owner 线程访问
struct AssetStorage {
    textures: AssetTable<TextureResource>,
    buffers: AssetTable<BufferResource>,
    bindless: DescriptorIndexAllocator,
}

impl AssetStorage {
    fn record_flags(&self, handle: AssetHandle) -> Option<(bool, bool, bool)> {
        match handle.kind() {
            AssetKind::Texture => self.textures.get(handle).map(|r| (r.is_loading(), r.is_loaded(), r.pending_release())),
            AssetKind::Buffer => self.buffers.get(handle).map(|r| (r.is_loading(), r.is_loaded(), r.pending_release())),
        }
    }

    /// 上传完成：texture 分配 bindless 下标，然后标记为 loaded
    ///
    /// 记录已经被回收（加载过程中被 release 并且延迟销毁已经执行）时，直接销毁设备资源。
    fn finish_upload(&mut self, device: &dyn GfxDevice, upload: CompletedUpload) {
        let handle = upload.handle;
        match upload.payload {
            UploadPayload::Texture(mut texture) => {
                if !self.textures.contains(handle) {
                    log::debug!("upload of {:?} finished after its record was freed", handle);
                    Self::destroy_texture(device, &mut self.bindless, texture);
                    return;
                }
                let Some(index) = self.bindless.allocate() else {
                    fatal(
                        "allocate bindless texture index",
                        anyhow::anyhow!("all {} bindless slots are in use", self.bindless.max_index()),
                    );
                };
                texture.bindless_index = Some(index);
                if let Err(texture) = self.textures.mark_loaded(handle, texture) {
                    Self::destroy_texture(device, &mut self.bindless, texture);
                }
            }
            UploadPayload::Buffer(buffer) => {
                if let Err(buffer) = self.buffers.mark_loaded(handle, buffer) {
                    log::debug!("upload of {:?} finished after its record was freed", handle);
                    Self::destroy_buffer(device, buffer);
                }
            }
        }
    }

    /// 释放记录与设备资源；句柄已失效时返回 false
    fn destroy(&mut self, device: &dyn GfxDevice, handle: AssetHandle) -> bool {
        match handle.kind() {
            AssetKind::Texture => {
                if !self.textures.contains(handle) {
                    return false;
                }
                if let Some(texture) = self.textures.free(handle) {
                    Self::destroy_texture(device, &mut self.bindless, texture);
                }
            }
            AssetKind::Buffer => {
                if !self.buffers.contains(handle) {
                    return false;
                }
                if let Some(buffer) = self.buffers.free(handle) {
                    Self::destroy_buffer(device, buffer);
                }
            }
        }
        true
    }

    /// 清空两张表，返回销毁的记录数量
    fn teardown(&mut self, device: &dyn GfxDevice) -> usize {
        let textures = self.textures.drain();
        let buffers = self.buffers.drain();
        let count = textures.len() + buffers.len();

        for texture in textures.into_iter().filter_map(|(_, payload)| payload) {
            Self::destroy_texture(device, &mut self.bindless, texture);
        }
        for buffer in buffers.into_iter().filter_map(|(_, payload)| payload) {
            Self::destroy_buffer(device, buffer);
        }
        count
    }

    fn destroy_texture(device: &dyn GfxDevice, bindless: &mut DescriptorIndexAllocator, texture: TextureResource) {
        device.destroy_image(texture.image);
        device.destroy_sampler(texture.sampler);
        if let Some(index) = texture.bindless_index {
            bindless.free(index);
        }
    }

    fn destroy_buffer(device: &dyn GfxDevice, buffer: BufferResource) {
        device.destroy_buffer(buffer.buffer);
    }
}

/// GPU 资源流式加载的入口
///
/// 不是全局单例，由调用方显式创建和持有。除了 worker 线程内部的录制之外，
/// 所有接口都只能在同一个 owner 线程（通常是渲染线程）上调用。
///
/// # 每帧流程
/// 1. 调用方通过 `load_*_async` 发起请求，立即拿到句柄。
/// 2. 每帧调用一次 `pump`：提交 worker 录制好的 command buffer，回收已完成的上传，推进延迟销毁。
/// 3. 不再需要的资源调用 `release`，`frames_in_flight` 帧之后才真正销毁。
///
/// # 线程生命周期
/// worker 线程的生命周期与 `AssetManager` 绑定，`shutdown` 或者 Drop 时：
/// 1. 等待所有已投递的任务录制完成，并提交到设备。
/// 2. 阻塞等待所有 fence，然后设备 idle。
/// 3. 销毁所有等待延迟销毁的资源，以及仍然存活的资源。
/// 4. 关闭 worker pool，销毁所有 recording context。
pub struct AssetManager {
    config: AssetManagerConfig,
    device: Arc<dyn GfxDevice>,

    storage: AssetStorage,
    loader: Arc<LoaderShared>,
    tracker: SubmissionTracker,
    deletion_queue: DeferredDeletionQueue,
    workers: WorkerPool,

    stats: AssetManagerStats,
    is_shut_down: bool,
}

// new & init
impl AssetManager {
    pub fn new(device: Arc<dyn GfxDevice>, config: AssetManagerConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid asset manager config")?;

        let recorders = RecordingContexts::new(device.clone(), config.worker_count, &config.thread_name_prefix)
            .context("Failed to create recording contexts")?;
        let loader = Arc::new(LoaderShared {
            device: device.clone(),
            recorders,
            submissions: BoundedQueue::new(config.submission_queue_capacity),
            in_flight: AtomicUsize::new(0),
        });

        let workers = match WorkerPool::with_panic_handler(
            config.worker_count,
            config.work_queue_capacity,
            &config.thread_name_prefix,
            Arc::new(abort_on_job_panic),
        ) {
            Ok(workers) => workers,
            Err(err) => {
                loader.recorders.destroy();
                return Err(err.context("Failed to start asset loader threads"));
            }
        };

        log::info!(
            "asset manager created: {} workers, work queue {}, submission queue {}, {} frames in flight",
            config.worker_count,
            config.work_queue_capacity,
            config.submission_queue_capacity,
            config.frames_in_flight
        );

        Ok(Self {
            storage: AssetStorage {
                textures: AssetTable::new(AssetKind::Texture, config.table_buckets),
                buffers: AssetTable::new(AssetKind::Buffer, config.table_buckets),
                bindless: DescriptorIndexAllocator::new(config.max_bindless_textures),
            },
            loader,
            tracker: SubmissionTracker::new(),
            deletion_queue: DeferredDeletionQueue::new(config.frames_in_flight),
            workers,
            stats: AssetManagerStats::default(),
            is_shut_down: false,
            device,
            config,
        })
    }
}

fn check_texture_source(id: AssetId, source: &TextureSource) {
    assert!(
        source.width > 0 && source.height > 0,
        "texture {} has zero extent {}x{}",
        id,
        source.width,
        source.height
    );
    assert_eq!(
        source.pixels.len(),
        source.expected_size(),
        "texture {} pixel size mismatch",
        id
    );
}

fn check_buffer_bytes(id: AssetId, bytes: &[u8]) {
    assert!(!bytes.is_empty(), "buffer {} has no data", id);
}

/// load job panic 之后对应的资源永远停留在 Loading，与资源耗尽一样按致命错误处理
fn abort_on_job_panic(worker_id: usize, message: &str) {
    fatal(&format!("load job on worker {}", worker_id), anyhow::anyhow!("{}", message))
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        log::info!("Dropping AssetManager");
        self.shutdown();
    }
}

// getters
impl AssetManager {
    #[inline]
    pub fn config(&self) -> &AssetManagerConfig {
        &self.config
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn GfxDevice> {
        &self.device
    }

    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.deletion_queue.current_frame()
    }

    pub fn load_status(&self, handle: AssetHandle) -> LoadStatus {
        match self.storage.record_flags(handle) {
            None => LoadStatus::Invalid,
            Some((_, _, true)) => LoadStatus::Released,
            Some((_, true, _)) => LoadStatus::Ready,
            Some(_) => LoadStatus::Loading,
        }
    }

    #[inline]
    pub fn is_resource_loaded(&self, handle: AssetHandle) -> bool {
        self.load_status(handle) == LoadStatus::Ready
    }

    /// 只有 Ready 状态的 texture 才会返回
    pub fn texture(&self, handle: AssetHandle) -> Option<&TextureResource> {
        self.storage.textures.get(handle).filter(|record| !record.pending_release()).and_then(|record| record.payload())
    }

    /// 只有 Ready 状态的 buffer 才会返回
    pub fn buffer(&self, handle: AssetHandle) -> Option<&BufferResource> {
        self.storage.buffers.get(handle).filter(|record| !record.pending_release()).and_then(|record| record.payload())
    }

    /// 着色器中 `textures[index]` 使用的下标
    #[inline]
    pub fn texture_bindless_index(&self, handle: AssetHandle) -> Option<u32> {
        self.texture(handle).and_then(|texture| texture.bindless_index)
    }

    pub fn stats(&self) -> AssetManagerStats {
        AssetManagerStats {
            in_flight_jobs: self.loader.in_flight.load(Ordering::Acquire),
            pending_submissions: self.tracker.len() + self.loader.submissions.len(),
            pending_deletions: self.deletion_queue.len(),
            textures: self.storage.textures.len(),
            buffers: self.storage.buffers.len(),
            bindless_in_use: self.storage.bindless.in_use(),
            current_frame: self.current_frame(),
            ..self.stats
        }
    }
}

// load
impl AssetManager {
    /// 请求加载 texture
    ///
    /// 非阻塞（任务队列满时会等待 worker 腾出位置）：
    /// 1. id 已经在加载或已经加载完成，直接返回已有的句柄，不会产生新的任务。
    /// 2. 否则创建记录，状态设为 Loading，把任务投递给 worker。
    ///
    /// # Panics
    /// 尺寸为 0，或者像素数据大小与 `width * height * bytes_per_pixel` 不一致。
    /// 这类错误在调用处暴露，而不是在 worker 或设备上。
    pub fn load_texture_async(&mut self, id: AssetId, sampler: SamplerDesc, source: TextureSource) -> AssetHandle {
        let _span = tracy_client::span!("AssetManager::load_texture_async");
        assert!(!self.is_shut_down, "load request after shutdown");
        check_texture_source(id, &source);
        self.stats.requests += 1;

        let (handle, created) = self.storage.textures.get_or_create(id);
        if !created {
            self.stats.deduplicated += 1;
            return handle;
        }

        self.storage.textures.mark_loading(handle);
        log::debug!("request texture {} {}x{} -> {:?}", id, source.width, source.height, handle);
        self.dispatch(LoadRequest::Texture { handle, sampler, source });
        handle
    }

    /// 请求加载 buffer，行为与 [`Self::load_texture_async`] 相同
    ///
    /// # Panics
    /// `bytes` 为空。
    pub fn load_buffer_async(&mut self, id: AssetId, desc: BufferDesc, bytes: Vec<u8>) -> AssetHandle {
        let _span = tracy_client::span!("AssetManager::load_buffer_async");
        assert!(!self.is_shut_down, "load request after shutdown");
        check_buffer_bytes(id, &bytes);
        self.stats.requests += 1;

        let (handle, created) = self.storage.buffers.get_or_create(id);
        if !created {
            self.stats.deduplicated += 1;
            return handle;
        }

        self.storage.buffers.mark_loading(handle);
        log::debug!("request buffer {} ({} bytes) -> {:?}", id, bytes.len(), handle);
        self.dispatch(LoadRequest::Buffer { handle, desc, bytes });
        handle
    }

    /// 任务队列满时不等待，新建的记录会被回滚
    pub fn try_load_texture_async(
        &mut self,
        id: AssetId,
        sampler: SamplerDesc,
        source: TextureSource,
    ) -> Result<AssetHandle, StreamError> {
        if self.is_shut_down {
            return Err(StreamError::ShutDown);
        }
        check_texture_source(id, &source);
        self.stats.requests += 1;

        let (handle, created) = self.storage.textures.get_or_create(id);
        if !created {
            self.stats.deduplicated += 1;
            return Ok(handle);
        }

        self.storage.textures.mark_loading(handle);
        if self.try_dispatch(LoadRequest::Texture { handle, sampler, source }) {
            Ok(handle)
        } else {
            self.storage.textures.free(handle);
            Err(StreamError::QueueSaturated)
        }
    }

    /// 任务队列满时不等待，新建的记录会被回滚
    pub fn try_load_buffer_async(
        &mut self,
        id: AssetId,
        desc: BufferDesc,
        bytes: Vec<u8>,
    ) -> Result<AssetHandle, StreamError> {
        if self.is_shut_down {
            return Err(StreamError::ShutDown);
        }
        check_buffer_bytes(id, &bytes);
        self.stats.requests += 1;

        let (handle, created) = self.storage.buffers.get_or_create(id);
        if !created {
            self.stats.deduplicated += 1;
            return Ok(handle);
        }

        self.storage.buffers.mark_loading(handle);
        if self.try_dispatch(LoadRequest::Buffer { handle, desc, bytes }) {
            Ok(handle)
        } else {
            self.storage.buffers.free(handle);
            Err(StreamError::QueueSaturated)
        }
    }

    fn dispatch(&mut self, request: LoadRequest) {
        self.loader.in_flight.fetch_add(1, Ordering::AcqRel);
        self.stats.dispatched += 1;

        let mut item = self.loader.make_job(request);
        let backoff = Backoff::new();
        loop {
            match self.workers.try_submit(item) {
                Ok(()) => return,
                Err(rejected) => {
                    item = rejected;
                    // worker 可能正阻塞在已满的 submission queue 上，先替它们腾出位置
                    self.execute_submissions();
                    backoff.snooze();
                }
            }
        }
    }

    fn try_dispatch(&mut self, request: LoadRequest) -> bool {
        self.loader.in_flight.fetch_add(1, Ordering::AcqRel);
        match self.workers.try_submit(self.loader.make_job(request)) {
            Ok(()) => {
                self.stats.dispatched += 1;
                true
            }
            Err(_rejected) => {
                self.loader.in_flight.fetch_sub(1, Ordering::AcqRel);
                self.stats.rejected += 1;
                false
            }
        }
    }
}

// release
impl AssetManager {
    /// 调度延迟销毁，之后不应该再使用该句柄
    ///
    /// 资源会在 `frames_in_flight` 帧之后，并且上传完成之后才真正销毁。
    pub fn release(&mut self, handle: AssetHandle) {
        let _span = tracy_client::span!("AssetManager::release");

        let Some((is_loading, _, pending_release)) = self.storage.record_flags(handle) else {
            debug_assert!(false, "release a stale handle {:?}", handle);
            log::warn!("release a stale handle {:?}, ignored", handle);
            return;
        };
        if pending_release {
            log::warn!("{:?} is released twice, ignored", handle);
            return;
        }
        if is_loading {
            log::warn!("{:?} is released while still loading", handle);
        }

        match handle.kind() {
            AssetKind::Texture => self.storage.textures.detach(handle),
            AssetKind::Buffer => self.storage.buffers.detach(handle),
        };
        let target_frame = self.deletion_queue.push(handle);
        self.stats.released += 1;
        log::debug!(
            "{} release {:?}, destroy at frame {}",
            self.deletion_queue.frame_counter().frame_name(),
            handle,
            target_frame
        );
    }
}

// update
impl AssetManager {
    /// 每个渲染帧调用一次
    ///
    /// 1. 提交 worker 录制好的上传。
    /// 2. 非阻塞地回收 fence 已经 signal 的上传，资源变为 Ready。
    /// 3. 推进帧号，销毁已经安全的资源。
    pub fn pump(&mut self) {
        let _span = tracy_client::span!("AssetManager::pump");
        if self.is_shut_down {
            log::warn!("pump after shutdown, ignored");
            return;
        }

        self.execute_submissions();
        self.reap_submissions();

        let device = self.device.as_ref();
        let storage = &mut self.storage;
        let destroyed = self.deletion_queue.advance_frame(|handle| {
            storage.destroy(device, handle);
        });
        self.stats.destroyed += destroyed as u64;
    }

    /// 把 submission queue 中所有录制结果提交到设备
    fn execute_submissions(&mut self) {
        while let Some(upload) = self.loader.submissions.try_pop() {
            let handle = upload.handle;
            if let Err(err) = self.tracker.enqueue(self.device.as_ref(), upload) {
                fatal(&format!("submit upload for {:?}", handle), err);
            }
        }
    }

    fn reap_submissions(&mut self) {
        let completed = self
            .tracker
            .reap(self.device.as_ref(), &self.loader.recorders)
            .unwrap_or_else(|err| fatal("poll upload fences", err));
        for upload in completed {
            log::debug!("upload finished: {:?}", upload.handle);
            self.storage.finish_upload(self.device.as_ref(), upload);
            self.stats.completed += 1;
        }
    }
}

// destroy
impl AssetManager {
    /// 阻塞直到所有任务完成，然后释放所有资源并关闭 worker 线程；可以重复调用
    pub fn shutdown(&mut self) {
        if self.is_shut_down {
            return;
        }
        let _span = tracy_client::span!("AssetManager::shutdown");
        log::info!(
            "shutdown asset manager: {} jobs in flight, {} submissions pending, {} deletions pending",
            self.loader.in_flight.load(Ordering::Acquire),
            self.tracker.len() + self.loader.submissions.len(),
            self.deletion_queue.len()
        );

        // 1. 等待所有已投递的任务进入 submission queue，并全部提交
        let backoff = Backoff::new();
        loop {
            let idle = self.loader.in_flight.load(Ordering::Acquire) == 0;
            self.execute_submissions();
            if idle && self.loader.submissions.is_empty() {
                break;
            }
            backoff.snooze();
        }

        // 2. 阻塞等待所有 fence
        let completed = self
            .tracker
            .drain_all(self.device.as_ref(), &self.loader.recorders)
            .unwrap_or_else(|err| fatal("wait upload fences", err));
        for upload in completed {
            self.storage.finish_upload(self.device.as_ref(), upload);
            self.stats.completed += 1;
        }
        if let Err(err) = self.device.wait_idle() {
            fatal("wait device idle", err);
        }

        // 3. 设备已经 idle，不再需要等待 target frame
        let device = self.device.as_ref();
        let storage = &mut self.storage;
        let destroyed = self.deletion_queue.drain_all(|handle| {
            storage.destroy(device, handle);
        });
        let remaining = self.storage.teardown(self.device.as_ref());
        self.stats.destroyed += (destroyed + remaining) as u64;

        // 4. worker 线程退出之后才能销毁它们的 command pool
        self.workers.shutdown();
        self.loader.recorders.destroy();

        self.is_shut_down = true;
        log::info!("asset manager shut down, destroyed {} pending and {} live assets", destroyed, remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_gfx::{BufferUsage, FenceMode, HeadlessDevice, TextureFormat};

    fn small_config() -> AssetManagerConfig {
        AssetManagerConfig {
            worker_count: 2,
            work_queue_capacity: 4,
            submission_queue_capacity: 2,
            frames_in_flight: 2,
            table_buckets: 8,
            max_bindless_textures: 16,
            thread_name_prefix: "Test-Loader".to_string(),
        }
    }

    fn source(seed: u8) -> TextureSource {
        TextureSource::new(4, 4, TextureFormat::Rgba8Unorm, vec![seed; 64])
    }

    fn pump_until_ready(manager: &mut AssetManager, handle: AssetHandle) {
        for _ in 0..10_000 {
            if manager.is_resource_loaded(handle) {
                return;
            }
            manager.pump();
            std::thread::yield_now();
        }
        panic!("{:?} never became ready", handle);
    }

    #[test]
    fn test_bindless_index_assigned_on_completion_and_recycled() {
        let device = Arc::new(HeadlessDevice::new(FenceMode::Immediate));
        let mut manager = AssetManager::new(device.clone(), small_config()).unwrap();

        let first = manager.load_texture_async(AssetId(1), SamplerDesc::default(), source(1));
        assert_eq!(manager.texture_bindless_index(first), None);
        pump_until_ready(&mut manager, first);
        assert_eq!(manager.texture_bindless_index(first), Some(0));

        manager.release(first);
        assert_eq!(manager.texture_bindless_index(first), None);
        for _ in 0..3 {
            manager.pump();
        }
        assert_eq!(manager.load_status(first), LoadStatus::Invalid);

        let second = manager.load_texture_async(AssetId(2), SamplerDesc::default(), source(2));
        pump_until_ready(&mut manager, second);
        assert_eq!(manager.texture_bindless_index(second), Some(0));
        manager.shutdown();
    }

    #[test]
    fn test_try_load_rolls_back_when_saturated() {
        let device = Arc::new(HeadlessDevice::new(FenceMode::Manual));
        let config = AssetManagerConfig {
            worker_count: 1,
            work_queue_capacity: 1,
            submission_queue_capacity: 1,
            ..small_config()
        };
        let mut manager = AssetManager::new(device.clone(), config).unwrap();

        // worker 阻塞在已满的 submission queue 上之后，任务队列才会被填满
        let mut accepted = Vec::new();
        let mut rejected_id = None;
        for id in 0..64u64 {
            match manager.try_load_buffer_async(AssetId(id), BufferDesc::new(BufferUsage::Index, 4), vec![1; 8]) {
                Ok(handle) => accepted.push(handle),
                Err(err) => {
                    assert_eq!(err, StreamError::QueueSaturated);
                    rejected_id = Some(AssetId(id));
                    break;
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let rejected_id = rejected_id.expect("work queue never saturated");
        assert!(manager.stats().rejected >= 1);
        assert_eq!(manager.stats().buffers, accepted.len());
        assert!(manager.storage.buffers.lookup(rejected_id).is_none());

        manager.shutdown();
        assert!(manager.try_load_buffer_async(rejected_id, BufferDesc::new(BufferUsage::Index, 4), vec![1; 8]).is_err());
        assert_eq!(device.live_counts().total(), 0);
    }

    #[test]
    fn test_release_while_loading_destroys_after_completion() {
        let device = Arc::new(HeadlessDevice::new(FenceMode::Manual));
        let mut manager = AssetManager::new(device.clone(), small_config()).unwrap();

        let handle = manager.load_buffer_async(AssetId(5), BufferDesc::new(BufferUsage::Uniform, 16), vec![3; 16]);
        // 等待录制结果被提交
        while manager.stats().pending_submissions == 0 || manager.stats().in_flight_jobs > 0 {
            manager.pump();
            std::thread::yield_now();
        }
        manager.release(handle);
        assert_eq!(manager.load_status(handle), LoadStatus::Released);

        // 延迟销毁先于上传完成执行：记录被回收，设备资源仍由 submission 持有
        for _ in 0..4 {
            manager.pump();
        }
        assert_eq!(manager.load_status(handle), LoadStatus::Invalid);
        assert_eq!(device.live_counts().buffers, 2);

        device.signal_all();
        manager.pump();
        assert_eq!(device.live_counts().buffers, 0);
        assert_eq!(manager.stats().pending_submissions, 0);
        manager.shutdown();
    }

    #[test]
    fn test_invalid_requests_fail_at_call_site() {
        let device = Arc::new(HeadlessDevice::new(FenceMode::Immediate));
        let mut manager = AssetManager::new(device.clone(), small_config()).unwrap();
        let desc = BufferDesc::new(BufferUsage::Vertex, 12);

        let requests: Vec<Box<dyn FnOnce(&mut AssetManager)>> = vec![
            Box::new(move |m: &mut AssetManager| {
                m.load_buffer_async(AssetId(1), desc, Vec::new());
            }),
            Box::new(move |m: &mut AssetManager| {
                let _ = m.try_load_buffer_async(AssetId(2), desc, Vec::new());
            }),
            Box::new(move |m: &mut AssetManager| {
                let empty = TextureSource::new(0, 4, TextureFormat::Rgba8Unorm, Vec::new());
                m.load_texture_async(AssetId(3), SamplerDesc::default(), empty);
            }),
            Box::new(move |m: &mut AssetManager| {
                let short = TextureSource::new(4, 4, TextureFormat::Rgba8Unorm, vec![0; 63]);
                m.load_texture_async(AssetId(4), SamplerDesc::default(), short);
            }),
            Box::new(move |m: &mut AssetManager| {
                let long = TextureSource::new(4, 4, TextureFormat::Rgba8Unorm, vec![0; 65]);
                let _ = m.try_load_texture_async(AssetId(5), SamplerDesc::default(), long);
            }),
        ];
        for request in requests {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| request(&mut manager)));
            assert!(result.is_err());
        }

        // 没有创建记录，也没有投递任务
        let stats = manager.stats();
        assert_eq!(stats.requests, 0);
        assert_eq!(stats.dispatched, 0);
        assert_eq!(stats.textures + stats.buffers, 0);
        assert_eq!(device.live_counts().total(), 0);

        let handle = manager.load_buffer_async(AssetId(1), desc, vec![7; 12]);
        pump_until_ready(&mut manager, handle);
        manager.shutdown();
    }
}
