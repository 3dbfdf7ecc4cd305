//! 肌肉单元的配置与运行时倍率

use bitflags::bitflags;

use crate::physics::{BodyHandle, JointHandle};

bitflags! {
    /// 肌肉标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MuscleFlags: u32 {
        /// 已初始化
        const INITIALIZED = 1 << 0;
        /// 回写阶段同时映射位置
        const MAP_POSITION = 1 << 1;
        /// 连接刚体的目标是本目标的直接父骨骼
        const DIRECT_TARGET_PARENT = 1 << 2;
    }
}

/// 单元级权重倍率（创作时设置，初始化后不变）
///
/// 各项取值 [0, 1]，与全局权重相乘。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MuscleProps {
    pub pin_weight: f32,
    pub muscle_weight: f32,
    pub muscle_damper: f32,
    pub mapping_weight: f32,
    /// 回写时是否映射位置（默认开启；关闭后只映射旋转）
    pub map_position: bool,
}

impl Default for MuscleProps {
    fn default() -> Self {
        Self {
            pin_weight: 1.0,
            muscle_weight: 1.0,
            muscle_damper: 1.0,
            mapping_weight: 1.0,
            map_position: true,
        }
    }
}

/// 运行时倍率（由碰撞调制器等外部层写入）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MuscleState {
    pub pin_weight_mlp: f32,
    pub muscle_weight_mlp: f32,
    pub mapping_weight_mlp: f32,
    pub muscle_damper_mlp: f32,
    pub muscle_damper_add: f32,
}

impl Default for MuscleState {
    fn default() -> Self {
        Self {
            pin_weight_mlp: 1.0,
            muscle_weight_mlp: 1.0,
            mapping_weight_mlp: 1.0,
            muscle_damper_mlp: 1.0,
            muscle_damper_add: 0.0,
        }
    }
}

/// 肌肉单元的创作描述
#[derive(Clone, Debug)]
pub struct MuscleDesc {
    pub name: String,
    /// 约束该刚体的关节
    pub joint: JointHandle,
    /// 被驱动的刚体
    pub body: BodyHandle,
    /// 目标骨骼索引（弱引用）
    pub target: usize,
    pub props: MuscleProps,
}

impl MuscleDesc {
    pub fn new(name: impl Into<String>, joint: JointHandle, body: BodyHandle, target: usize) -> Self {
        Self {
            name: name.into(),
            joint,
            body,
            target,
            props: MuscleProps::default(),
        }
    }

    pub fn with_props(mut self, props: MuscleProps) -> Self {
        self.props = props;
        self
    }
}
