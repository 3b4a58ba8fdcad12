/// 调用方可以处理的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// 任务队列已满，稍后重试，或者改用阻塞版本的接口
    #[error("work queue is saturated")]
    QueueSaturated,
    #[error("asset manager is shut down")]
    ShutDown,
}

/// 不可恢复的错误（内存或设备资源耗尽、设备丢失）：打印日志后直接终止进程
///
/// 在 worker 线程中同样适用，不会以 panic 的形式跨越线程边界。
#[cold]
pub fn fatal(context: &str, err: anyhow::Error) -> ! {
    log::error!("fatal: {}: {:#}", context, err);
    std::process::abort()
}
