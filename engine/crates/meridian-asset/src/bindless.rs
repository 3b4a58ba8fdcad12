/// bindless texture 数组中的下标分配器
///
/// 优先复用已归还的下标，否则从单调递增的计数器中取，直到 `max_index`。
/// texture 上传完成时分配，销毁时归还，同一个 texture 在整个生命周期中下标不变。
pub struct DescriptorIndexAllocator {
    free_indices: Vec<u32>,
    next_index: u32,
    max_index: u32,
}

// new & init
impl DescriptorIndexAllocator {
    pub fn new(max_index: u32) -> Self {
        Self {
            free_indices: Vec::new(),
            next_index: 0,
            max_index,
        }
    }
}

// getters
impl DescriptorIndexAllocator {
    #[inline]
    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    /// 当前正在使用的下标数量
    #[inline]
    pub fn in_use(&self) -> u32 {
        self.next_index - self.free_indices.len() as u32
    }
}

// tools
impl DescriptorIndexAllocator {
    /// 所有下标都在使用时返回 None
    pub fn allocate(&mut self) -> Option<u32> {
        if let Some(index) = self.free_indices.pop() {
            return Some(index);
        }
        if self.next_index >= self.max_index {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(index)
    }

    pub fn free(&mut self, index: u32) {
        debug_assert!(index < self.next_index, "descriptor index {} was never allocated", index);
        debug_assert!(!self.free_indices.contains(&index), "descriptor index {} freed twice", index);
        self.free_indices.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_recycled_before_growing() {
        let mut allocator = DescriptorIndexAllocator::new(8);
        assert_eq!(allocator.allocate(), Some(0));
        assert_eq!(allocator.allocate(), Some(1));
        assert_eq!(allocator.allocate(), Some(2));

        allocator.free(1);
        assert_eq!(allocator.in_use(), 2);
        assert_eq!(allocator.allocate(), Some(1));
        assert_eq!(allocator.allocate(), Some(3));
    }

    #[test]
    fn test_exhaustion() {
        let mut allocator = DescriptorIndexAllocator::new(2);
        assert!(allocator.allocate().is_some());
        assert!(allocator.allocate().is_some());
        assert_eq!(allocator.allocate(), None);

        allocator.free(0);
        assert_eq!(allocator.allocate(), Some(0));
        assert_eq!(allocator.in_use(), 2);
    }
}
