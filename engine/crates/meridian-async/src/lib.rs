//! 线程与队列
//!
//! - [`Semaphore`]：计数信号量
//! - [`BoundedQueue`]：固定容量的环形缓冲区，多生产者多消费者
//! - [`WorkerPool`]：固定数量的 OS 线程，从共享的 `BoundedQueue<WorkItem>` 中取任务执行，任务 panic 时默认终止进程

pub mod bounded_queue;
pub mod semaphore;
pub mod worker_pool;

pub use bounded_queue::BoundedQueue;
pub use semaphore::Semaphore;
pub use worker_pool::{PanicHandler, ThreadContext, WorkItem, WorkerPool, abort_on_panic};
