/// 单调递增的帧计数器
///
/// 只由 owner 线程在每帧的 `pump` 末尾推进。
pub struct FrameCounter {
    /// 当前的帧序号，一直累加
    frame_id: u64,
    /// 同时在 GPU 上执行的帧数
    frames_in_flight: u64,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64, frames_in_flight: u64) -> Self {
        assert!(frames_in_flight > 0);
        Self {
            frame_id: init_frame_id,
            frames_in_flight,
        }
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id += 1;
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn frames_in_flight(&self) -> u64 {
        self.frames_in_flight
    }
    /// 帧在 frames-in-flight 环中的标签：A, B, C ...
    #[inline]
    pub fn frame_label(&self) -> char {
        (b'A' + (self.frame_id % self.frames_in_flight) as u8) as char
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, self.frame_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_name_cycles_labels() {
        let mut counter = FrameCounter::new(0, 3);
        assert_eq!(counter.frame_name(), "[F0A]");
        counter.next_frame();
        counter.next_frame();
        assert_eq!(counter.frame_name(), "[F2C]");
        counter.next_frame();
        assert_eq!(counter.frame_name(), "[F3A]");
    }
}
