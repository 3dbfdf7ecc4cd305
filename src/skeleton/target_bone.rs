//! 目标骨骼节点
//!
//! 每个 TargetBone 代表目标层次中的一个节点：
//! local_to_world = parent.local_to_world * local_to_parent

use glam::{Mat4, Quat, Vec3};

use super::BoneTransform;

/// 目标骨骼节点
#[derive(Clone, Debug)]
pub struct TargetBone {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    /// 骨骼名称
    pub name: String,

    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 局部变换（相对父骨骼）
    pub local: BoneTransform,

    /// 全局变换矩阵 (local_to_world)
    pub(crate) local_to_world: Mat4,
}

impl TargetBone {
    /// 创建新骨骼
    pub fn new(name: impl Into<String>, parent_index: i32, local: BoneTransform) -> Self {
        Self {
            name: name.into(),
            parent_index,
            local,
            local_to_world: local.to_matrix(),
        }
    }

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    /// 是否为根骨骼
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent_index < 0
    }

    /// 局部变换矩阵
    #[inline]
    pub fn local_to_parent(&self) -> Mat4 {
        self.local.to_matrix()
    }

    /// 获取世界位置
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.local_to_world.w_axis.truncate()
    }

    /// 获取世界旋转（去除缩放）
    #[inline]
    pub fn rotation(&self) -> Quat {
        let (_, rotation, _) = self.local_to_world.to_scale_rotation_translation();
        rotation
    }
}

impl Default for TargetBone {
    fn default() -> Self {
        Self::new(String::new(), -1, BoneTransform::default())
    }
}
