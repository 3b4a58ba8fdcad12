use parking_lot::Mutex;

use crate::semaphore::Semaphore;

struct Ring<T> {
    slots: Box<[Option<T>]>,
    /// 单调递增，写入位置为 `write % capacity`
    write: u64,
    /// 单调递增，读取位置为 `read % capacity`
    read: u64,
}

impl<T> Ring<T> {
    fn put(&mut self, item: T) {
        let capacity = self.slots.len() as u64;
        debug_assert!(self.write - self.read < capacity, "ring overflow");
        let index = (self.write % capacity) as usize;
        self.slots[index] = Some(item);
        self.write += 1;
    }

    fn take(&mut self) -> T {
        let capacity = self.slots.len() as u64;
        debug_assert!(self.read < self.write, "ring underflow");
        let index = (self.read % capacity) as usize;
        self.read += 1;
        // filled 信号量保证了这里一定有元素
        self.slots[index].take().unwrap_or_else(|| unreachable!("filled slot is empty"))
    }
}

/// 固定容量的环形队列，多生产者多消费者
///
/// 读写游标由一把锁保护；两个计数信号量 `empty_slots` / `filled_slots` 用于阻塞版本的 push / pop。
/// 成功入队的元素按照 FIFO 出队（多生产者时保证每个生产者自身的顺序）。
///
/// 队列不会扩容：阻塞的 `push` 在队列永远满的情况下会一直等待，这属于容量设置错误。
pub struct BoundedQueue<T> {
    ring: Mutex<Ring<T>>,
    empty_slots: Semaphore,
    filled_slots: Semaphore,
    capacity: usize,
}

// new & init
impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded queue capacity must be positive");
        let slots = std::iter::repeat_with(|| None).take(capacity).collect::<Vec<_>>().into_boxed_slice();
        Self {
            ring: Mutex::new(Ring { slots, write: 0, read: 0 }),
            empty_slots: Semaphore::new(capacity),
            filled_slots: Semaphore::new(0),
            capacity,
        }
    }
}

// getters
impl<T> BoundedQueue<T> {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前元素数量，并发情况下只是一个快照
    pub fn len(&self) -> usize {
        let ring = self.ring.lock();
        (ring.write - ring.read) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// tools
impl<T> BoundedQueue<T> {
    /// 队列满时阻塞
    pub fn push(&self, item: T) {
        self.empty_slots.acquire();
        self.ring.lock().put(item);
        self.filled_slots.release();
    }

    /// 队列满时立即失败，并把 item 原样返回
    pub fn try_push(&self, item: T) -> Result<(), T> {
        if !self.empty_slots.try_acquire() {
            return Err(item);
        }
        self.ring.lock().put(item);
        self.filled_slots.release();
        Ok(())
    }

    /// 队列空时阻塞
    pub fn pop(&self) -> T {
        self.filled_slots.acquire();
        let item = self.ring.lock().take();
        self.empty_slots.release();
        item
    }

    /// 队列空时返回 None
    pub fn try_pop(&self) -> Option<T> {
        if !self.filled_slots.try_acquire() {
            return None;
        }
        let item = self.ring.lock().take();
        self.empty_slots.release();
        Some(item)
    }
}
