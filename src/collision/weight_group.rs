//! 碰撞权重组
//!
//! 一组肌肉在受到碰撞后临时降低固定/肌肉权重、提高阻力，
//! 效果以指数方式平滑渐入渐出。

use crate::physics::get_config;

/// 平滑量视为零的阈值
const RELEASE_EPSILON: f32 = 1e-3;

/// 向目标做指数逼近
///
/// `tau <= 0` 时直接到达目标。
#[inline]
pub fn approach(current: f32, target: f32, tau: f32, dt: f32) -> f32 {
    if tau <= 0.0 {
        return target;
    }
    let k = 1.0 - (-dt.max(0.0) / tau).exp();
    current + (target - current) * k
}

/// 碰撞权重组
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionWeightGroup {
    pub name: String,
    /// 成员肌肉索引
    pub muscles: Vec<usize>,
    /// 受击时的固定权重倍率
    pub pin_weight_mlp: f32,
    /// 受击时的肌肉权重倍率
    pub muscle_weight_mlp: f32,
    /// 受击时附加到成员刚体上的线/角阻力
    pub drag: f32,
    /// 渐入时间常数（秒）
    pub blend_in: f32,
    /// 渐出时间常数（秒）
    pub blend_out: f32,
    /// 有效碰撞的最小冲量
    pub collision_threshold: f32,
    /// 碰撞后保持受击的时间窗口（秒）
    pub collision_window: f32,

    damage: f32,
    mapping: f32,
    last_collision: Option<f32>,
    triggered: bool,
}

impl CollisionWeightGroup {
    pub fn new(name: impl Into<String>, muscles: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            muscles,
            pin_weight_mlp: 0.1,
            muscle_weight_mlp: 0.1,
            drag: 1.0,
            blend_in: 0.05,
            blend_out: 0.5,
            collision_threshold: 0.0,
            collision_window: get_config().collision_window,
            damage: 0.0,
            mapping: 0.0,
            last_collision: None,
            triggered: false,
        }
    }

    #[inline]
    pub fn contains(&self, muscle: usize) -> bool {
        self.muscles.contains(&muscle)
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// 平滑后的受击量 [0, 1]
    #[inline]
    pub fn damage(&self) -> f32 {
        self.damage
    }

    /// 平滑后的映射量 [0, 1]
    #[inline]
    pub fn mapping(&self) -> f32 {
        self.mapping
    }

    #[inline]
    pub fn last_collision(&self) -> Option<f32> {
        self.last_collision
    }

    /// 冲量是否达到阈值
    #[inline]
    pub fn qualifies(&self, impulse: f32) -> bool {
        impulse >= self.collision_threshold
    }

    /// 记录一次有效碰撞
    pub fn register_collision(&mut self, time: f32) {
        self.last_collision = Some(time);
        self.triggered = true;
    }

    fn within_window(&self, now: f32) -> bool {
        self.last_collision.is_some_and(|t| now - t <= self.collision_window)
    }

    /// 受击目标值
    pub fn damage_target(&self, now: f32, unpinned: bool) -> f32 {
        if unpinned || self.within_window(now) {
            1.0
        } else {
            0.0
        }
    }

    /// 映射目标值（未固定时恒为 1）
    pub fn mapping_target(&self, now: f32, unpinned: bool) -> f32 {
        self.damage_target(now, unpinned)
    }

    /// 推进平滑
    pub fn update(&mut self, now: f32, dt: f32, unpinned: bool) {
        let damage_target = self.damage_target(now, unpinned);
        let mapping_target = self.mapping_target(now, unpinned);

        let tau = |current: f32, target: f32| if target > current { self.blend_in } else { self.blend_out };
        let damage = approach(self.damage, damage_target, tau(self.damage, damage_target), dt);
        let mapping = approach(self.mapping, mapping_target, tau(self.mapping, mapping_target), dt);

        self.damage = damage.clamp(0.0, 1.0);
        self.mapping = mapping.clamp(0.0, 1.0);
        if unpinned {
            self.damage = self.damage.min(self.mapping);
        }

        if !unpinned && self.damage < RELEASE_EPSILON && self.mapping < RELEASE_EPSILON {
            self.damage = 0.0;
            self.mapping = 0.0;
            self.triggered = false;
        }
    }

    /// 当前阻力（未固定时为零）
    pub fn current_drag(&self, unpinned: bool) -> f32 {
        if unpinned {
            0.0
        } else {
            self.drag * self.mapping
        }
    }

    /// 当前固定权重倍率：在 1 与组倍率之间按受击量插值
    #[inline]
    pub fn current_pin_weight_mlp(&self) -> f32 {
        1.0 + (self.pin_weight_mlp - 1.0) * self.damage
    }

    #[inline]
    pub fn current_muscle_weight_mlp(&self) -> f32 {
        1.0 + (self.muscle_weight_mlp - 1.0) * self.damage
    }
}
