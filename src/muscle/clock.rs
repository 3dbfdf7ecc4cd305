//! 物理时钟 - 把可变渲染帧时间切分为固定物理步

/// 固定步长累加器
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsClock {
    fixed_dt: f32,
    max_substeps: u32,
    accumulator: f32,
}

impl PhysicsClock {
    pub fn new(fixed_dt: f32, max_substeps: u32) -> Self {
        Self {
            fixed_dt: if fixed_dt > 0.0 { fixed_dt } else { 1.0 / 60.0 },
            max_substeps: max_substeps.max(1),
            accumulator: 0.0,
        }
    }

    #[inline]
    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// 累加一帧时间，返回本帧要执行的物理步数
    ///
    /// 超过上限的积压时间直接丢弃，防止卡顿后的螺旋追帧。
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        if !frame_dt.is_finite() || frame_dt <= 0.0 {
            return 0;
        }
        self.accumulator += frame_dt;

        let mut steps = 0;
        while self.accumulator >= self.fixed_dt && steps < self.max_substeps {
            self.accumulator -= self.fixed_dt;
            steps += 1;
        }
        if steps == self.max_substeps && self.accumulator >= self.fixed_dt {
            log::debug!("[时钟] 丢弃积压时间 {:.4}s", self.accumulator);
            self.accumulator = 0.0;
        }
        steps
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_partial_frames() {
        let mut clock = PhysicsClock::new(0.02, 5);
        assert_eq!(clock.advance(0.015), 0);
        assert_eq!(clock.advance(0.015), 1);
        assert_eq!(clock.advance(0.035), 2);
    }

    #[test]
    fn test_caps_substeps() {
        let mut clock = PhysicsClock::new(0.02, 3);
        assert_eq!(clock.advance(1.0), 3);
        // 积压已丢弃
        assert_eq!(clock.advance(0.001), 0);
    }

    #[test]
    fn test_invalid_frame_time() {
        let mut clock = PhysicsClock::new(0.02, 3);
        assert_eq!(clock.advance(-1.0), 0);
        assert_eq!(clock.advance(f32::NAN), 0);
    }
}
