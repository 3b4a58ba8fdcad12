use slotmap::SlotMap;

use crate::handle::{AssetHandle, AssetId, AssetKind, AssetSlot};

/// 资源记录
///
/// `is_loading` 与 `is_loaded` 互斥，每次状态切换时都会断言。
pub struct AssetRecord<T> {
    /// 同一个 bucket 中的下一条记录
    next_in_bucket: Option<AssetSlot>,
    /// 是否仍挂在 bucket 链表上；release 之后摘下，等待延迟销毁
    linked: bool,

    id: AssetId,
    is_loading: bool,
    is_loaded: bool,
    pending_release: bool,

    payload: Option<T>,
}

// getters
impl<T> AssetRecord<T> {
    #[inline]
    pub fn id(&self) -> AssetId {
        self.id
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    #[inline]
    pub fn pending_release(&self) -> bool {
        self.pending_release
    }

    #[inline]
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }
}

impl<T> AssetRecord<T> {
    #[inline]
    fn check_flags(&self) {
        assert!(
            !(self.is_loading && self.is_loaded),
            "asset {} is both loading and loaded",
            self.id
        );
    }
}

/// id 到资源记录的映射
///
/// - 固定数量的 bucket，`id mod bucket_count` 定位，冲突时使用链表
/// - 记录本身存放在 `SlotMap` 中：slot 的内存不会归还，只会被逻辑上回收复用，
///   slot 的 version 就是句柄的 generation
///
/// 只由 owner 线程修改，不需要加锁。
pub struct AssetTable<T> {
    records: SlotMap<AssetSlot, AssetRecord<T>>,
    buckets: Box<[Option<AssetSlot>]>,
    kind: AssetKind,
}

// new & init
impl<T> AssetTable<T> {
    pub fn new(kind: AssetKind, bucket_count: usize) -> Self {
        assert!(bucket_count > 0, "asset table needs at least one bucket");
        Self {
            records: SlotMap::with_key(),
            buckets: vec![None; bucket_count].into_boxed_slice(),
            kind,
        }
    }
}

// getters
impl<T> AssetTable<T> {
    #[inline]
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// 存活的记录数量，包括等待延迟销毁的记录
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 句柄失效（slot 已回收、generation 不匹配或者类型不对）时返回 None
    pub fn get(&self, handle: AssetHandle) -> Option<&AssetRecord<T>> {
        if handle.kind() != self.kind {
            return None;
        }
        self.records.get(handle.slot())
    }

    pub fn get_mut(&mut self, handle: AssetHandle) -> Option<&mut AssetRecord<T>> {
        if handle.kind() != self.kind {
            return None;
        }
        self.records.get_mut(handle.slot())
    }

    #[inline]
    pub fn contains(&self, handle: AssetHandle) -> bool {
        self.get(handle).is_some()
    }

    /// 沿着 bucket 链表查找，不创建
    pub fn lookup(&self, id: AssetId) -> Option<AssetHandle> {
        let mut cursor = self.buckets[self.bucket_index(id)];
        while let Some(slot) = cursor {
            let record = &self.records[slot];
            if record.id == id {
                return Some(AssetHandle::new(slot, self.kind));
            }
            cursor = record.next_in_bucket;
        }
        None
    }
}

// tools
impl<T> AssetTable<T> {
    #[inline]
    fn bucket_index(&self, id: AssetId) -> usize {
        (id.0 % self.buckets.len() as u64) as usize
    }

    /// 查找 id 对应的记录，不存在时创建
    ///
    /// 返回的 bool 表示是否是新创建的记录。已存在的记录（正在加载或已经加载完成）原样返回，
    /// 因此重复请求是幂等的。新记录插入到 bucket 链表的头部，两个状态位都为 false。
    pub fn get_or_create(&mut self, id: AssetId) -> (AssetHandle, bool) {
        if let Some(handle) = self.lookup(id) {
            return (handle, false);
        }

        let bucket = self.bucket_index(id);
        let slot = self.records.insert(AssetRecord {
            next_in_bucket: self.buckets[bucket],
            linked: true,
            id,
            is_loading: false,
            is_loaded: false,
            pending_release: false,
            payload: None,
        });
        self.buckets[bucket] = Some(slot);
        (AssetHandle::new(slot, self.kind), true)
    }

    /// 返回 false 表示句柄已失效
    pub fn mark_loading(&mut self, handle: AssetHandle) -> bool {
        let Some(record) = self.get_mut(handle) else {
            return false;
        };
        assert!(!record.is_loaded, "asset {} is already loaded", record.id);
        record.is_loading = true;
        record.check_flags();
        true
    }

    /// 上传完成：存入 payload，`is_loaded = true, is_loading = false`
    ///
    /// 句柄失效时把 payload 原样返回，由调用方负责销毁。
    pub fn mark_loaded(&mut self, handle: AssetHandle, payload: T) -> Result<(), T> {
        let Some(record) = self.get_mut(handle) else {
            return Err(payload);
        };
        record.is_loading = false;
        record.is_loaded = true;
        record.payload = Some(payload);
        record.check_flags();
        Ok(())
    }

    /// 从 bucket 链表上摘下，并标记为等待释放
    ///
    /// 之后对同一个 id 的请求会创建新的记录，旧记录则等待延迟销毁后再 `free`。
    /// 返回 false 表示句柄已失效或者已经摘下。
    pub fn detach(&mut self, handle: AssetHandle) -> bool {
        match self.get(handle) {
            Some(record) if record.linked => {}
            _ => return false,
        }
        self.unlink(handle.slot());
        if let Some(record) = self.records.get_mut(handle.slot()) {
            record.pending_release = true;
        }
        true
    }

    /// 释放记录，slot 回到空闲列表，返回 payload（可能为空）
    pub fn free(&mut self, handle: AssetHandle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        if self.records[handle.slot()].linked {
            self.unlink(handle.slot());
        }
        self.records.remove(handle.slot())?.payload
    }

    /// 清空整张表，返回所有 payload；用于 shutdown
    pub fn drain(&mut self) -> Vec<(AssetHandle, Option<T>)> {
        self.buckets.iter_mut().for_each(|bucket| *bucket = None);
        let kind = self.kind;
        self.records.drain().map(|(slot, record)| (AssetHandle::new(slot, kind), record.payload)).collect()
    }

    fn unlink(&mut self, slot: AssetSlot) {
        let (id, next) = {
            let record = &self.records[slot];
            (record.id, record.next_in_bucket)
        };
        let bucket = self.bucket_index(id);

        if self.buckets[bucket] == Some(slot) {
            self.buckets[bucket] = next;
        } else {
            let mut cursor = self.buckets[bucket];
            while let Some(current) = cursor {
                let current_next = self.records[current].next_in_bucket;
                if current_next == Some(slot) {
                    self.records[current].next_in_bucket = next;
                    break;
                }
                cursor = current_next;
            }
        }

        let record = &mut self.records[slot];
        record.next_in_bucket = None;
        record.linked = false;
    }
}
