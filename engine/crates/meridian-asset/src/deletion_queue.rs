use std::collections::VecDeque;

use crate::{frame_counter::FrameCounter, handle::AssetHandle};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PendingDeletion {
    pub handle: AssetHandle,
    /// 到达这一帧之后才可以销毁
    pub target_frame: u64,
}

/// 延迟销毁队列
///
/// `release` 时资源可能仍被之前几帧的 command buffer 引用，
/// 因此要等 `frames_in_flight` 帧之后才能真正销毁。
///
/// 所有条目的 `target_frame` 都由同一个单调递增的帧号加上固定的 `frames_in_flight` 得到，
/// 因此队列天然按 `target_frame` 非递减排列，推进时只需要检查队首。
pub struct DeferredDeletionQueue {
    entries: VecDeque<PendingDeletion>,
    frame_counter: FrameCounter,
}

// new & init
impl DeferredDeletionQueue {
    pub fn new(frames_in_flight: u64) -> Self {
        Self::with_start_frame(0, frames_in_flight)
    }

    pub fn with_start_frame(start_frame: u64, frames_in_flight: u64) -> Self {
        Self {
            entries: VecDeque::new(),
            frame_counter: FrameCounter::new(start_frame, frames_in_flight),
        }
    }
}

// getters
impl DeferredDeletionQueue {
    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.frame_counter.frame_id()
    }

    #[inline]
    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingDeletion> {
        self.entries.iter()
    }
}

// tools
impl DeferredDeletionQueue {
    /// `target_frame = current_frame + frames_in_flight`
    pub fn push(&mut self, handle: AssetHandle) -> u64 {
        let target_frame = self.current_frame() + self.frame_counter.frames_in_flight();
        debug_assert!(self.entries.back().is_none_or(|last| last.target_frame <= target_frame));
        self.entries.push_back(PendingDeletion { handle, target_frame });
        target_frame
    }

    /// 每帧调用一次：先销毁队首所有 `target_frame <= current_frame` 的条目，再推进帧号
    ///
    /// 返回本次销毁的数量。
    pub fn advance_frame(&mut self, mut destroy: impl FnMut(AssetHandle)) -> usize {
        let _span = tracy_client::span!("DeferredDeletionQueue::advance_frame");
        let current_frame = self.current_frame();

        let mut destroyed = 0;
        while let Some(front) = self.entries.front()
            && front.target_frame <= current_frame
        {
            let entry = self.entries.pop_front().unwrap_or_else(|| unreachable!());
            destroy(entry.handle);
            destroyed += 1;
        }
        if destroyed > 0 {
            log::debug!("{} destroyed {} released assets", self.frame_counter.frame_name(), destroyed);
        }

        self.frame_counter.next_frame();
        destroyed
    }

    /// 忽略 target_frame，销毁所有条目；只能在设备 idle 之后调用
    pub fn drain_all(&mut self, mut destroy: impl FnMut(AssetHandle)) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            destroy(entry.handle);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        asset_table::AssetTable,
        handle::{AssetId, AssetKind},
    };

    fn make_handles(count: u64) -> Vec<AssetHandle> {
        let mut table: AssetTable<()> = AssetTable::new(AssetKind::Texture, 8);
        (0..count).map(|id| table.get_or_create(AssetId(id)).0).collect()
    }

    #[test]
    fn test_release_at_frame_10_is_destroyed_reaching_13() {
        let handle = make_handles(1)[0];
        let mut queue = DeferredDeletionQueue::with_start_frame(10, 2);
        assert_eq!(queue.push(handle), 12);

        let mut destroyed = Vec::new();
        // 10 -> 11
        queue.advance_frame(|h| destroyed.push(h));
        assert!(destroyed.is_empty());
        // 11 -> 12
        queue.advance_frame(|h| destroyed.push(h));
        assert!(destroyed.is_empty());
        // 12 -> 13
        queue.advance_frame(|h| destroyed.push(h));
        assert_eq!(destroyed, vec![handle]);
        assert_eq!(queue.current_frame(), 13);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_never_destroyed_before_k_advances() {
        for frames_in_flight in 1..5 {
            let handle = make_handles(1)[0];
            let mut queue = DeferredDeletionQueue::with_start_frame(100, frames_in_flight);
            queue.push(handle);

            let mut advances = 0;
            let mut destroyed = false;
            while !destroyed {
                queue.advance_frame(|_| destroyed = true);
                advances += 1;
            }
            assert_eq!(advances, frames_in_flight + 1);
        }
    }

    #[test]
    fn test_stops_at_first_not_due_entry() {
        let handles = make_handles(3);
        let mut queue = DeferredDeletionQueue::new(1);
        queue.push(handles[0]);
        queue.advance_frame(|_| {});
        queue.push(handles[1]);
        queue.push(handles[2]);
        let targets = queue.iter().map(|entry| entry.target_frame).collect::<Vec<_>>();
        assert_eq!(targets, vec![1, 2, 2]);

        let mut destroyed = Vec::new();
        assert_eq!(queue.advance_frame(|h| destroyed.push(h)), 1);
        assert_eq!(destroyed, vec![handles[0]]);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.advance_frame(|h| destroyed.push(h)), 2);
        assert_eq!(destroyed, handles);
    }

    #[test]
    fn test_drain_all_ignores_target_frame() {
        let handles = make_handles(4);
        let mut queue = DeferredDeletionQueue::new(3);
        for handle in &handles {
            queue.push(*handle);
        }
        let mut destroyed = Vec::new();
        assert_eq!(queue.drain_all(|h| destroyed.push(h)), 4);
        assert_eq!(destroyed, handles);
        assert_eq!(queue.current_frame(), 0);
    }
}
