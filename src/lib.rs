//! 主动布娃娃（Active Ragdoll）肌肉控制引擎
//!
//! 每个关节一个肌肉单元，持续把动画目标姿态与物理刚体混合：
//! 未受干扰时跟随动画，受到碰撞时被物理推动、失衡。
//!
//! 模块划分：
//! - `math`: 无状态的向量/四元数工具（预测、角速度、力矩缩放、射线检测）
//! - `physics`: 物理模拟器边界（trait）、全局配置、Rapier 后端
//! - `skeleton`: 外部拥有的目标骨架（动画骨骼）
//! - `animation`: 动画源接口
//! - `muscle`: 肌肉单元与肌肉组（三阶段更新协议）
//! - `collision`: 碰撞信号中继与碰撞权重调制器

pub mod animation;
pub mod collision;
pub mod math;
pub mod muscle;
pub mod physics;
pub mod skeleton;

use thiserror::Error;

pub use collision::{CollisionRelay, CollisionWeightGroup, ContactEvent, ContactListener, WeightModulator};
pub use muscle::{Muscle, MuscleAssembly, MuscleDesc, MuscleProps, MuscleSettings, UpdateMode};
pub use physics::{BodyHandle, ForceMode, JointHandle, PhysicsWorld, Simulator};
pub use skeleton::{BoneTransform, TargetSkeleton};

/// 引擎错误
///
/// 只有构建/配置阶段会返回错误；每步更新中的异常一律降级处理。
#[derive(Debug, Error)]
pub enum RagdollError {
    #[error("muscle {muscle}: joint {joint:?} is unknown to the physics world")]
    UnknownJoint { muscle: usize, joint: JointHandle },

    #[error("muscle {muscle}: driven body {body:?} is unknown to the physics world")]
    UnknownBody { muscle: usize, body: BodyHandle },

    #[error("muscle {muscle}: target bone {bone} is out of range ({bone_count} bones)")]
    InvalidTarget { muscle: usize, bone: usize, bone_count: usize },

    #[error("muscles {first} and {second} drive the same body {body:?}")]
    DuplicateBody { first: usize, second: usize, body: BodyHandle },

    #[error("muscle {muscle}: connected body chain forms a cycle")]
    ConnectedBodyCycle { muscle: usize },

    #[error("collision group '{group}': muscle index {muscle} is out of range")]
    InvalidGroupMember { group: String, muscle: usize },
}

/// 引擎结果类型
pub type Result<T> = std::result::Result<T, RagdollError>;
