//! 激活/停用渐变
//!
//! 每个渲染帧推进一次的小状态机。切换方向只是覆盖状态，不需要协程。

/// 渐变阶段
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RampPhase {
    /// 静止：权重为 0（休眠）或 1（完全激活）
    Idle { weight: f32 },
    RampingIn { weight: f32 },
    RampingOut { weight: f32 },
}

/// 激活请求的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampStart {
    /// 已处于目标状态，忽略
    Ignored,
    /// 从休眠开始激活，需要执行完整的激活序列
    Fresh,
    /// 反转正在进行的渐变，从当前权重继续
    Reversed,
}

/// 推进渐变时产生的事件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RampEvent {
    /// 渐入完成
    Activated,
    /// 渐出完成，调用方必须同步重置所有单元
    Deactivated,
}

/// 激活渐变
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivationRamp {
    phase: RampPhase,
}

impl Default for ActivationRamp {
    fn default() -> Self {
        Self {
            phase: RampPhase::Idle { weight: 0.0 },
        }
    }
}

impl ActivationRamp {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn phase(&self) -> RampPhase {
        self.phase
    }

    /// 当前激活权重 [0, 1]
    pub fn weight(&self) -> f32 {
        match self.phase {
            RampPhase::Idle { weight } | RampPhase::RampingIn { weight } | RampPhase::RampingOut { weight } => weight,
        }
    }

    /// 是否在驱动刚体（完全休眠以外的状态）
    pub fn is_driving(&self) -> bool {
        !matches!(self.phase, RampPhase::Idle { weight } if weight <= 0.0)
    }

    /// 是否处于激活或渐入中
    pub fn is_active(&self) -> bool {
        match self.phase {
            RampPhase::Idle { weight } => weight > 0.0,
            RampPhase::RampingIn { .. } => true,
            RampPhase::RampingOut { .. } => false,
        }
    }

    /// 请求激活
    pub fn start_in(&mut self, blend_time: f32) -> RampStart {
        match self.phase {
            RampPhase::Idle { weight } if weight > 0.0 => RampStart::Ignored,
            RampPhase::RampingIn { .. } => RampStart::Ignored,
            RampPhase::RampingOut { weight } => {
                self.phase = if blend_time <= 0.0 {
                    RampPhase::Idle { weight: 1.0 }
                } else {
                    RampPhase::RampingIn { weight }
                };
                RampStart::Reversed
            }
            RampPhase::Idle { .. } => {
                self.phase = if blend_time <= 0.0 {
                    RampPhase::Idle { weight: 1.0 }
                } else {
                    RampPhase::RampingIn { weight: 0.0 }
                };
                RampStart::Fresh
            }
        }
    }

    /// 请求停用
    ///
    /// 渐变时长为零时立即完成，返回 `Some(RampEvent::Deactivated)`。
    pub fn start_out(&mut self, blend_time: f32) -> Option<RampEvent> {
        let weight = match self.phase {
            RampPhase::Idle { weight } if weight <= 0.0 => return None,
            RampPhase::RampingOut { .. } => return None,
            RampPhase::Idle { weight } | RampPhase::RampingIn { weight } => weight,
        };

        if blend_time <= 0.0 {
            self.phase = RampPhase::Idle { weight: 0.0 };
            return Some(RampEvent::Deactivated);
        }
        self.phase = RampPhase::RampingOut { weight };
        None
    }

    /// 推进 `dt` 秒
    pub fn advance(&mut self, dt: f32, blend_time: f32) -> Option<RampEvent> {
        let step = if blend_time <= 0.0 { 1.0 } else { dt.max(0.0) / blend_time };

        match self.phase {
            RampPhase::RampingIn { weight } => {
                let weight = weight + step;
                if weight >= 1.0 {
                    self.phase = RampPhase::Idle { weight: 1.0 };
                    Some(RampEvent::Activated)
                } else {
                    self.phase = RampPhase::RampingIn { weight };
                    None
                }
            }
            RampPhase::RampingOut { weight } => {
                let weight = weight - step;
                if weight <= 0.0 {
                    self.phase = RampPhase::Idle { weight: 0.0 };
                    Some(RampEvent::Deactivated)
                } else {
                    self.phase = RampPhase::RampingOut { weight };
                    None
                }
            }
            RampPhase::Idle { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_in_linear() {
        let mut ramp = ActivationRamp::new();
        assert!(!ramp.is_driving());
        assert_eq!(ramp.start_in(1.0), RampStart::Fresh);
        assert_eq!(ramp.weight(), 0.0);

        assert_eq!(ramp.advance(0.25, 1.0), None);
        assert!((ramp.weight() - 0.25).abs() < 1e-6);
        assert_eq!(ramp.advance(0.5, 1.0), None);
        assert_eq!(ramp.advance(0.5, 1.0), Some(RampEvent::Activated));
        assert_eq!(ramp.phase(), RampPhase::Idle { weight: 1.0 });
    }

    #[test]
    fn test_zero_blend_time_snaps() {
        let mut ramp = ActivationRamp::new();
        assert_eq!(ramp.start_in(0.0), RampStart::Fresh);
        assert_eq!(ramp.weight(), 1.0);
        assert_eq!(ramp.start_out(0.0), Some(RampEvent::Deactivated));
        assert_eq!(ramp.weight(), 0.0);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut ramp = ActivationRamp::new();
        ramp.start_in(1.0);
        ramp.advance(0.3, 1.0);
        let before = ramp;
        assert_eq!(ramp.start_in(1.0), RampStart::Ignored);
        assert_eq!(ramp, before);

        ramp.advance(1.0, 1.0);
        assert_eq!(ramp.start_in(1.0), RampStart::Ignored);
        assert_eq!(ramp.weight(), 1.0);
    }

    #[test]
    fn test_reverse_keeps_weight() {
        let mut ramp = ActivationRamp::new();
        ramp.start_in(0.0);
        assert_eq!(ramp.start_out(1.0), None);
        ramp.advance(0.4, 1.0);
        assert!((ramp.weight() - 0.6).abs() < 1e-6);

        // 渐出中再次激活：从当前权重反转
        assert_eq!(ramp.start_in(1.0), RampStart::Reversed);
        assert!((ramp.weight() - 0.6).abs() < 1e-6);
        assert!(ramp.is_active());
        ramp.advance(0.1, 1.0);
        assert!((ramp.weight() - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_deactivate_when_dormant_is_noop() {
        let mut ramp = ActivationRamp::new();
        assert_eq!(ramp.start_out(1.0), None);
        assert_eq!(ramp.phase(), RampPhase::Idle { weight: 0.0 });

        ramp.start_in(0.0);
        ramp.start_out(1.0);
        let before = ramp;
        assert_eq!(ramp.start_out(1.0), None);
        assert_eq!(ramp, before);
        assert_eq!(ramp.advance(2.0, 1.0), Some(RampEvent::Deactivated));
        assert!(!ramp.is_driving());
    }
}
