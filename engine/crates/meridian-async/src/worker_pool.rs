use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;

use crate::bounded_queue::BoundedQueue;

/// 任务执行时可以访问的线程上下文
pub struct ThreadContext {
    /// 当前 pool 的任务队列，任务内部可以继续向其中投递任务
    pub queue: Arc<BoundedQueue<WorkItem>>,
    /// 线程在 pool 中的编号，范围是 `0..thread_count`，在整个生命周期中不变
    pub thread_id: usize,
}

/// 投递给 worker 线程的任务
///
/// 任务闭包的所有权在出队时转移给执行它的线程。
pub enum WorkItem {
    Job(Box<dyn FnOnce(&ThreadContext) + Send + 'static>),
    /// 取到 Poison 的线程退出循环
    Poison,
}

impl WorkItem {
    pub fn job<F>(f: F) -> Self
    where
        F: FnOnce(&ThreadContext) + Send + 'static,
    {
        WorkItem::Job(Box::new(f))
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkItem::Job(_) => f.write_str("WorkItem::Job"),
            WorkItem::Poison => f.write_str("WorkItem::Poison"),
        }
    }
}

/// 任务 panic 时调用，参数为 worker 编号与 panic 信息
///
/// 默认的处理方式见 [`abort_on_panic`]。处理函数返回时 worker 继续执行后续任务。
pub type PanicHandler = Arc<dyn Fn(usize, &str) + Send + Sync + 'static>;

/// 默认的 panic 处理：打印日志后终止进程
///
/// 任务 panic 意味着它的结果永远不会到达，等待它的一方会一直等下去，因此不能吞掉。
#[cold]
pub fn abort_on_panic(thread_id: usize, message: &str) {
    log::error!("fatal: job panicked on worker {}: {}", thread_id, message);
    std::process::abort()
}

/// 固定线程数的 worker pool
///
/// 所有线程共享一个 `BoundedQueue<WorkItem>`，阻塞地 pop 并执行任务，没有 work stealing，也没有优先级。
///
/// # 线程生命周期
/// `shutdown`（或者 Drop）时：
/// 1. 向队列中投递和线程数量相同的 Poison，排在所有已投递的任务之后。
/// 2. 每个线程取到一个 Poison 后退出循环。
/// 3. join 所有线程，之后队列才会随 pool 一起销毁。
pub struct WorkerPool {
    queue: Arc<BoundedQueue<WorkItem>>,
    threads: Vec<JoinHandle<()>>,
    name_prefix: String,
}

// new & init
impl WorkerPool {
    /// 线程命名为 `{name_prefix}-{id}`，方便在调试器和日志中区分；任务 panic 时终止进程
    pub fn new(thread_count: usize, queue_capacity: usize, name_prefix: &str) -> anyhow::Result<Self> {
        Self::with_panic_handler(thread_count, queue_capacity, name_prefix, Arc::new(abort_on_panic))
    }

    pub fn with_panic_handler(
        thread_count: usize,
        queue_capacity: usize,
        name_prefix: &str,
        on_panic: PanicHandler,
    ) -> anyhow::Result<Self> {
        if thread_count == 0 {
            anyhow::bail!("worker pool <{}> needs at least one thread", name_prefix);
        }
        if queue_capacity == 0 {
            anyhow::bail!("worker pool <{}> needs a positive queue capacity", name_prefix);
        }

        let mut pool = Self {
            queue: Arc::new(BoundedQueue::new(queue_capacity)),
            threads: Vec::with_capacity(thread_count),
            name_prefix: name_prefix.to_string(),
        };

        for thread_id in 0..thread_count {
            let ctx = ThreadContext {
                queue: pool.queue.clone(),
                thread_id,
            };
            let on_panic = on_panic.clone();
            let thread_name = format!("{}-{}", name_prefix, thread_id);
            // spawn 失败时 pool 被 drop，已经启动的线程会被正常关闭
            let handle = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker_loop(ctx, on_panic))
                .with_context(|| format!("Failed to spawn worker thread {}", thread_name))?;
            pool.threads.push(handle);
        }

        log::info!("worker pool <{}> started with {} threads", name_prefix, thread_count);
        Ok(pool)
    }
}

// getters
impl WorkerPool {
    #[inline]
    pub fn queue(&self) -> &Arc<BoundedQueue<WorkItem>> {
        &self.queue
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

// tools
impl WorkerPool {
    /// 队列满时阻塞
    pub fn submit(&self, item: WorkItem) {
        debug_assert!(matches!(item, WorkItem::Job(_)), "poison is reserved for shutdown");
        self.queue.push(item);
    }

    /// 队列满时把任务原样返回
    pub fn try_submit(&self, item: WorkItem) -> Result<(), WorkItem> {
        debug_assert!(matches!(item, WorkItem::Job(_)), "poison is reserved for shutdown");
        self.queue.try_push(item)
    }

    /// 执行完所有已投递的任务之后关闭所有线程，可以重复调用
    pub fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        let _span = tracy_client::span!("WorkerPool::shutdown");

        for _ in 0..self.threads.len() {
            self.queue.push(WorkItem::Poison);
        }
        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if handle.join().is_err() {
                log::error!("worker thread <{}> exited with a panic", name);
            }
        }
        log::info!("worker pool <{}> shut down", self.name_prefix);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(ctx: ThreadContext, on_panic: PanicHandler) {
    log::debug!("worker {} enter loop", ctx.thread_id);
    loop {
        match ctx.queue.pop() {
            WorkItem::Job(job) => {
                let _span = tracy_client::span!("WorkerPool::job");
                // panic 不会跨越线程边界，统一交给 on_panic
                if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| job(&ctx))) {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    on_panic(ctx.thread_id, &message);
                }
            }
            WorkItem::Poison => break,
        }
    }
    log::debug!("worker {} exit loop", ctx.thread_id);
}
