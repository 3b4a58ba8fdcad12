use parking_lot::{Condvar, Mutex};

/// 计数信号量
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

// new & init
impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }
}

// tools
impl Semaphore {
    /// 阻塞直到计数大于 0，然后减 1
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    /// 计数为 0 时立即返回 false
    pub fn try_acquire(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    pub fn release(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }

    /// 当前计数，只用于观察，读到时可能已经过期
    #[inline]
    pub fn available(&self) -> usize {
        *self.count.lock()
    }
}
