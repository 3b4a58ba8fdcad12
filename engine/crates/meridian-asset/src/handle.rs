use slotmap::{Key, new_key_type};

// 使用 slotmap 的 generational index，slot 被回收复用之后旧句柄的 generation 不再匹配
new_key_type! { pub struct AssetSlot; }

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AssetKind {
    Texture,
    Buffer,
}

/// 资源句柄
///
/// 只是身份标识与弱引用，不持有任何内存，可以随意 Copy。
/// 只有当 generation 与 slot 当前的 generation 一致时才有效。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AssetHandle {
    slot: AssetSlot,
    kind: AssetKind,
}

// new & init
impl AssetHandle {
    pub(crate) fn new(slot: AssetSlot, kind: AssetKind) -> Self {
        Self { slot, kind }
    }
}

// getters
impl AssetHandle {
    #[inline]
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    #[inline]
    pub(crate) fn slot(&self) -> AssetSlot {
        self.slot
    }

    /// slot 在 arena 中的下标
    #[inline]
    pub fn index(&self) -> u32 {
        (self.slot.data().as_ffi() & 0xffff_ffff) as u32
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        (self.slot.data().as_ffi() >> 32) as u32
    }
}

/// 由调用方决定的资源标识，用于去重（路径的 hash、瓦片的 key 等）
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct AssetId(pub u64);

impl From<u64> for AssetId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:016x}", self.0)
    }
}

/// 资源加载状态
///
/// 状态流转: Loading -> Ready -> Released
///
/// 句柄失效（slot 已被回收或复用）时为 Invalid。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadStatus {
    /// 已投递到 worker，或者正在等待 fence
    Loading,
    /// 上传完成，staging 资源已释放，可以用于渲染
    Ready,
    /// 已调用 release，等待延迟销毁
    Released,
    Invalid,
}
