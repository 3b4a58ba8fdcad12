use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;

use meridian_gfx::{GfxCommandBufferHandle, GfxCommandPoolHandle, GfxDevice};

/// 单个 worker 线程独占的录制上下文
///
/// command pool 只被所属的 worker 线程用来分配和录制；
/// owner 线程在 fence signal 之后需要把 command buffer 释放回这个 pool，
/// 所以分配与释放都要持有这把锁。录制本身不持锁。
pub struct RecordingContext {
    worker_id: usize,
    /// destroy 之后为 None
    pool: Mutex<Option<GfxCommandPoolHandle>>,
}

// getters
impl RecordingContext {
    #[inline]
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }
}

/// 每个 worker 一个录制上下文，按 worker id 索引
pub struct RecordingContexts {
    contexts: Vec<RecordingContext>,
    device: Arc<dyn GfxDevice>,
}

// new & init
impl RecordingContexts {
    pub fn new(device: Arc<dyn GfxDevice>, worker_count: usize, name_prefix: &str) -> anyhow::Result<Self> {
        let mut recorders = Self {
            contexts: Vec::with_capacity(worker_count),
            device: device.clone(),
        };
        for worker_id in 0..worker_count {
            match device.create_command_pool(&format!("{}-{}-cmd-pool", name_prefix, worker_id)) {
                Ok(pool) => recorders.contexts.push(RecordingContext {
                    worker_id,
                    pool: Mutex::new(Some(pool)),
                }),
                Err(err) => {
                    // 已经创建的 pool 不能泄漏
                    recorders.destroy();
                    return Err(err.context(format!("Failed to create recording context {}", worker_id)));
                }
            }
        }
        Ok(recorders)
    }
}

// getters
impl RecordingContexts {
    #[inline]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn context(&self, worker_id: usize) -> &RecordingContext {
        &self.contexts[worker_id]
    }
}

// tools
impl RecordingContexts {
    /// 加锁，分配，解锁；之后的录制不需要持锁
    pub fn allocate(&self, worker_id: usize, debug_name: &str) -> anyhow::Result<GfxCommandBufferHandle> {
        let guard = self.contexts[worker_id].pool.lock();
        let Some(pool) = *guard else {
            anyhow::bail!("recording context {} is already destroyed", worker_id);
        };
        self.device.allocate_command_buffer(pool, debug_name)
    }

    /// 把 command buffer 释放回所属 worker 的 pool，由 owner 线程调用
    pub fn free(&self, worker_id: usize, command_buffer: GfxCommandBufferHandle) {
        let guard = self.contexts[worker_id].pool.lock();
        match *guard {
            Some(pool) => self.device.free_command_buffer(pool, command_buffer),
            None => log::warn!("free command buffer into destroyed recording context {}", worker_id),
        }
    }

    /// 销毁所有 pool；必须在所有 worker 线程退出之后调用，可以重复调用
    pub fn destroy(&self) {
        let pools = self.contexts.iter().filter_map(|context| context.pool.lock().take()).collect_vec();
        for pool in &pools {
            self.device.destroy_command_pool(*pool);
        }
        if !pools.is_empty() {
            log::info!("destroyed {} recording contexts", pools.len());
        }
    }
}
