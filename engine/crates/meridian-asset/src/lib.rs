//! GPU 资源流式加载
//!
//! 在不阻塞渲染线程的前提下，把 texture 和 geometry buffer 从内存上传到设备：
//!
//! 1. `AssetManager::load_*_async` 在 [`AssetTable`] 中查找或创建记录，把加载任务投递到 worker pool。
//! 2. worker 线程用自己的 [`RecordingContext`] 录制 command buffer，通过有界的 submission queue 交还给 owner 线程。
//! 3. owner 线程在每帧的 `pump` 中提交录制结果，轮询 fence（[`SubmissionTracker`]），
//!    并推进 [`DeferredDeletionQueue`]，在没有任何 in-flight 帧引用之后才真正销毁资源。

pub mod asset_manager;
pub mod asset_table;
pub mod bindless;
pub mod config;
pub mod deletion_queue;
pub mod error;
pub mod frame_counter;
pub mod handle;
pub mod loader;
pub mod recording;
pub mod submission;

pub use asset_manager::{AssetManager, AssetManagerStats};
pub use asset_table::{AssetRecord, AssetTable};
pub use config::AssetManagerConfig;
pub use deletion_queue::DeferredDeletionQueue;
pub use error::StreamError;
pub use handle::{AssetHandle, AssetId, AssetKind, LoadStatus};
pub use loader::{BufferResource, RecordedUpload, TextureResource, TextureSource, UploadPayload};
pub use recording::{RecordingContext, RecordingContexts};
pub use submission::{CompletedUpload, SubmissionTracker};
