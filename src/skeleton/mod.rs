//! 目标骨架 - 动画驱动的外部空间节点
//!
//! 核心设计思想：
//! - TargetBone: 单个骨骼节点（局部变换 + 缓存的世界变换）
//! - TargetSkeleton: 管理骨骼层次结构，父节点总在子节点之前
//!
//! 肌肉单元只通过骨骼索引弱引用目标，读取世界位姿，并在回写阶段写入；
//! 从不添加或删除骨骼。

mod target_bone;
mod target_skeleton;

pub use target_bone::TargetBone;
pub use target_skeleton::TargetSkeleton;

use glam::{Mat4, Quat, Vec3};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl BoneTransform {
    /// 仅平移与旋转
    #[inline]
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }
}
