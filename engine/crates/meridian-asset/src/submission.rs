use slotmap::{SlotMap, new_key_type};

use meridian_gfx::{FenceStatus, GfxBufferHandle, GfxCommandBufferHandle, GfxDevice, GfxFenceHandle};

use crate::{
    handle::AssetHandle,
    loader::{RecordedUpload, UploadPayload},
    recording::RecordingContexts,
};

new_key_type! { struct SubmissionKey; }

struct SubmissionEntry {
    prev: Option<SubmissionKey>,
    next: Option<SubmissionKey>,

    worker_id: usize,
    command_buffer: GfxCommandBufferHandle,
    fence: GfxFenceHandle,
    staging: GfxBufferHandle,

    handle: AssetHandle,
    payload: UploadPayload,
}

/// fence signal 之后的上传结果，staging 与 command buffer 已经回收
#[derive(Debug)]
pub struct CompletedUpload {
    pub handle: AssetHandle,
    pub payload: UploadPayload,
}

/// 已提交、尚未完成的上传
///
/// 双向链表，节点存放在 `SlotMap` 中，回收的节点会被复用，正常运行时不会每帧分配。
///
/// 设备完成的顺序不一定等于提交顺序，所以 `reap` 每次都扫描整个链表，
/// 而不是像按序完成的 timeline semaphore 那样只检查队首。
///
/// 只由 owner 线程使用。
pub struct SubmissionTracker {
    entries: SlotMap<SubmissionKey, SubmissionEntry>,
    head: Option<SubmissionKey>,
    tail: Option<SubmissionKey>,
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl SubmissionTracker {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }
}

// getters
impl SubmissionTracker {
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按提交顺序列出仍在等待的资源
    pub fn pending_handles(&self) -> Vec<AssetHandle> {
        let mut handles = Vec::with_capacity(self.entries.len());
        let mut cursor = self.head;
        while let Some(key) = cursor {
            let entry = &self.entries[key];
            handles.push(entry.handle);
            cursor = entry.next;
        }
        handles
    }
}

// tools
impl SubmissionTracker {
    /// 用新的 fence 提交 command buffer，追加到链表尾部
    pub fn enqueue(&mut self, device: &dyn GfxDevice, upload: RecordedUpload) -> anyhow::Result<()> {
        let _span = tracy_client::span!("SubmissionTracker::enqueue");
        let fence = device.submit(upload.command_buffer)?;

        let key = self.entries.insert(SubmissionEntry {
            prev: self.tail,
            next: None,
            worker_id: upload.worker_id,
            command_buffer: upload.command_buffer,
            fence,
            staging: upload.staging,
            handle: upload.handle,
            payload: upload.payload,
        });
        match self.tail {
            Some(tail) => self.entries[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        Ok(())
    }

    /// 非阻塞：回收所有 fence 已经 signal 的条目，未完成的条目保留
    ///
    /// 对每个完成的条目：在对应 worker 的 pool 锁下释放 command buffer，销毁 staging buffer 与 fence。
    /// 查询 fence 失败（设备丢失）时返回错误，此时已经回收的条目也不再返回。
    pub fn reap(
        &mut self,
        device: &dyn GfxDevice,
        recorders: &RecordingContexts,
    ) -> anyhow::Result<Vec<CompletedUpload>> {
        let _span = tracy_client::span!("SubmissionTracker::reap");

        let mut completed = Vec::new();
        let mut cursor = self.head;
        while let Some(key) = cursor {
            let (fence, next) = {
                let entry = &self.entries[key];
                (entry.fence, entry.next)
            };
            cursor = next;

            if device.fence_status(fence)? == FenceStatus::Signaled {
                completed.push(self.retire(key, device, recorders));
            }
        }
        Ok(completed)
    }

    /// 阻塞：等待所有条目完成，没有超时；用于 shutdown
    pub fn drain_all(
        &mut self,
        device: &dyn GfxDevice,
        recorders: &RecordingContexts,
    ) -> anyhow::Result<Vec<CompletedUpload>> {
        let _span = tracy_client::span!("SubmissionTracker::drain_all");

        let mut completed = Vec::with_capacity(self.entries.len());
        while let Some(key) = self.head {
            device.wait_fence(self.entries[key].fence)?;
            completed.push(self.retire(key, device, recorders));
        }
        Ok(completed)
    }

    fn retire(&mut self, key: SubmissionKey, device: &dyn GfxDevice, recorders: &RecordingContexts) -> CompletedUpload {
        self.unlink(key);
        let entry = self.entries.remove(key).unwrap_or_else(|| unreachable!("entry was just unlinked"));

        recorders.free(entry.worker_id, entry.command_buffer);
        device.destroy_buffer(entry.staging);
        device.destroy_fence(entry.fence);

        CompletedUpload {
            handle: entry.handle,
            payload: entry.payload,
        }
    }

    fn unlink(&mut self, key: SubmissionKey) {
        let (prev, next) = {
            let entry = &self.entries[key];
            (entry.prev, entry.next)
        };
        match prev {
            Some(prev) => self.entries[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.entries[next].prev = prev,
            None => self.tail = prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        asset_table::AssetTable,
        handle::{AssetId, AssetKind},
        loader::{BufferResource, LoadRequest, record_upload},
    };
    use meridian_gfx::{BufferDesc, BufferUsage, FenceMode, HeadlessDevice};

    struct Fixture {
        device: Arc<HeadlessDevice>,
        recorders: RecordingContexts,
        table: AssetTable<BufferResource>,
    }

    impl Fixture {
        fn new(fence_mode: FenceMode) -> Self {
            let device = Arc::new(HeadlessDevice::new(fence_mode));
            let recorders = RecordingContexts::new(device.clone(), 2, "Test").unwrap();
            Self {
                device,
                recorders,
                table: AssetTable::new(AssetKind::Buffer, 16),
            }
        }

        fn record(&mut self, id: u64) -> RecordedUpload {
            let (handle, _) = self.table.get_or_create(AssetId(id));
            let request = LoadRequest::Buffer {
                handle,
                desc: BufferDesc::new(BufferUsage::Storage, 4),
                bytes: vec![id as u8; 16],
            };
            record_upload(self.device.as_ref(), &self.recorders, (id % 2) as usize, request).unwrap()
        }
    }

    #[test]
    fn test_out_of_order_completion() {
        let mut fixture = Fixture::new(FenceMode::Manual);
        let mut tracker = SubmissionTracker::new();

        let a = fixture.record(1);
        let b = fixture.record(2);
        let (handle_a, handle_b) = (a.handle, b.handle);
        tracker.enqueue(fixture.device.as_ref(), a).unwrap();
        tracker.enqueue(fixture.device.as_ref(), b).unwrap();

        let fences = fixture.device.pending_fences();
        assert_eq!(fences.len(), 2);

        // B 先完成
        fixture.device.signal_fence(fences[1]);
        let completed = tracker.reap(fixture.device.as_ref(), &fixture.recorders).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].handle, handle_b);
        assert_eq!(tracker.pending_handles(), vec![handle_a]);

        // A 仍未完成，再次 reap 什么也不做
        assert!(tracker.reap(fixture.device.as_ref(), &fixture.recorders).unwrap().is_empty());

        fixture.device.signal_fence(fences[0]);
        let completed = tracker.reap(fixture.device.as_ref(), &fixture.recorders).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].handle, handle_a);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_reap_releases_staging_and_command_buffers() {
        let mut fixture = Fixture::new(FenceMode::Immediate);
        let mut tracker = SubmissionTracker::new();

        for id in 0..5 {
            let upload = fixture.record(id);
            tracker.enqueue(fixture.device.as_ref(), upload).unwrap();
        }
        // 5 个目标 buffer + 5 个 staging buffer
        assert_eq!(fixture.device.live_counts().buffers, 10);

        let completed = tracker.reap(fixture.device.as_ref(), &fixture.recorders).unwrap();
        assert_eq!(completed.len(), 5);

        let counts = fixture.device.live_counts();
        assert_eq!(counts.buffers, 5);
        assert_eq!(counts.command_buffers, 0);
        assert_eq!(counts.fences, 0);

        for upload in completed {
            let UploadPayload::Buffer(buffer) = upload.payload else {
                panic!("expected buffer payload");
            };
            assert_eq!(fixture.device.buffer_contents(buffer.buffer).unwrap().len(), 16);
        }
    }

    #[test]
    fn test_unlink_middle_keeps_list_consistent() {
        let mut fixture = Fixture::new(FenceMode::Manual);
        let mut tracker = SubmissionTracker::new();

        let handles: Vec<_> = (0..4)
            .map(|id| {
                let upload = fixture.record(id);
                let handle = upload.handle;
                tracker.enqueue(fixture.device.as_ref(), upload).unwrap();
                handle
            })
            .collect();
        let fences = fixture.device.pending_fences();

        fixture.device.signal_fence(fences[1]);
        fixture.device.signal_fence(fences[2]);
        tracker.reap(fixture.device.as_ref(), &fixture.recorders).unwrap();
        assert_eq!(tracker.pending_handles(), vec![handles[0], handles[3]]);

        // 回收的节点被复用，链表顺序仍然是提交顺序
        let upload = fixture.record(10);
        let handle = upload.handle;
        tracker.enqueue(fixture.device.as_ref(), upload).unwrap();
        assert_eq!(tracker.pending_handles(), vec![handles[0], handles[3], handle]);
    }

    #[test]
    fn test_drain_all_waits_for_everything() {
        let mut fixture = Fixture::new(FenceMode::Manual);
        let mut tracker = SubmissionTracker::new();
        for id in 0..3 {
            let upload = fixture.record(id);
            tracker.enqueue(fixture.device.as_ref(), upload).unwrap();
        }

        let completed = tracker.drain_all(fixture.device.as_ref(), &fixture.recorders).unwrap();
        assert_eq!(completed.len(), 3);
        assert!(tracker.is_empty());
        assert!(fixture.device.pending_fences().is_empty());
        assert_eq!(fixture.device.live_counts().command_buffers, 0);
    }
}
