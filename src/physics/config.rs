//! 布娃娃物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 肌肉组创建时从这里取默认值（见 `MuscleSettings::from_config`）。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 物理配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    // ========== 重力 ==========
    /// 重力 Y 分量（负数向下），默认 -9.81
    pub gravity_y: f32,

    // ========== 模拟参数 ==========
    /// 物理 FPS，默认 50.0
    pub physics_fps: f32,
    /// 每帧最大子步数，默认 5
    pub max_substep_count: u32,

    // ========== 速度限制 ==========
    /// 最大线速度 (m/s)
    pub max_linear_velocity: f32,
    /// 最大角速度 (rad/s)
    pub max_angular_velocity: f32,

    // ========== 肌肉默认值 ==========
    /// 全局固定权重（0..1）
    pub pin_weight: f32,
    /// 全局肌肉权重（0..1）
    pub muscle_weight: f32,
    /// 全局映射权重（0..1）
    pub mapping_weight: f32,
    /// 关节驱动弹簧增益
    pub muscle_spring: f32,
    /// 关节驱动阻尼增益
    pub muscle_damper: f32,
    /// 激活/停用的混合时长（秒）
    pub blend_time: f32,

    // ========== 碰撞调制 ==========
    /// 碰撞后保持"受击"状态的时间窗口（秒）
    pub collision_window: f32,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            // ====== 重力 ======
            gravity_y: -9.81,

            // ====== 模拟参数 ======
            // 物理模拟的帧率，越高越稳定，CPU 消耗越大
            physics_fps: 50.0,
            max_substep_count: 5,

            // ====== 速度限制 ======
            // 大接触力下防止刚体爆炸
            max_linear_velocity: 50.0,
            max_angular_velocity: 50.0,

            // ====== 肌肉默认值 ======
            pin_weight: 1.0,
            muscle_weight: 1.0,
            mapping_weight: 1.0,
            muscle_spring: 100.0,
            muscle_damper: 0.0,
            blend_time: 0.1,

            // ====== 碰撞调制 ======
            collision_window: 0.2,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

impl PhysicsConfig {
    /// 固定物理步长（秒）
    pub fn fixed_dt(&self) -> f32 {
        1.0 / self.physics_fps.max(1.0)
    }
}

/// 全局配置实例
static PHYSICS_CONFIG: Lazy<RwLock<PhysicsConfig>> = Lazy::new(|| {
    RwLock::new(PhysicsConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> PhysicsConfig {
    PHYSICS_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: PhysicsConfig) {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *PHYSICS_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = PhysicsConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_dt() {
        let mut config = PhysicsConfig::default();
        assert!((config.fixed_dt() - 0.02).abs() < 1e-6);

        // 非法 FPS 不会除零
        config.physics_fps = 0.0;
        assert!(config.fixed_dt().is_finite());
    }
}
