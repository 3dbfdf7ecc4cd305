//! 碰撞信号中继
//!
//! 每个被驱动刚体一个中继，把模拟器的接触开始/保持/结束事件转发给监听者，
//! 并标明事件来自哪个肌肉单元。

use crate::physics::{BodyHandle, ContactPhase};

/// 接触事件
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactEvent {
    pub phase: ContactPhase,
    /// 本方刚体
    pub body: BodyHandle,
    /// 另一方刚体（静态几何体为 `None`）
    pub other_body: Option<BodyHandle>,
    /// 另一方所属的肌肉单元（同一肌肉组内的自碰撞）
    pub other_muscle: Option<usize>,
    /// 接触冲量大小
    pub impulse: f32,
}

impl ContactEvent {
    /// 是否是同一肌肉组内部的碰撞
    #[inline]
    pub fn is_self_collision(&self) -> bool {
        self.other_muscle.is_some()
    }
}

/// 接触监听者
pub trait ContactListener {
    fn on_contact_enter(&mut self, event: &ContactEvent, relay: &CollisionRelay);

    fn on_contact_stay(&mut self, _event: &ContactEvent, _relay: &CollisionRelay) {}

    fn on_contact_exit(&mut self, _event: &ContactEvent, _relay: &CollisionRelay) {}
}

/// 碰撞中继（与被驱动刚体一一对应）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollisionRelay {
    body: BodyHandle,
    muscle_index: usize,
}

impl CollisionRelay {
    pub fn new(body: BodyHandle, muscle_index: usize) -> Self {
        Self { body, muscle_index }
    }

    #[inline]
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    #[inline]
    pub fn muscle_index(&self) -> usize {
        self.muscle_index
    }

    /// 按接触阶段转发
    pub fn relay(&self, event: &ContactEvent, listener: &mut dyn ContactListener) {
        match event.phase {
            ContactPhase::Enter => listener.on_contact_enter(event, self),
            ContactPhase::Stay => listener.on_contact_stay(event, self),
            ContactPhase::Exit => listener.on_contact_exit(event, self),
        }
    }
}
