//! 目标骨架 - 管理骨骼层次结构

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use super::{BoneTransform, TargetBone};

/// 目标骨架
///
/// 骨骼按添加顺序存储；父骨骼必须先于子骨骼添加，
/// 所以按索引顺序遍历即可自上而下更新世界变换。
#[derive(Clone, Debug, Default)]
pub struct TargetSkeleton {
    bones: Vec<TargetBone>,
    name_to_index: HashMap<String, usize>,
    children_cache: Vec<Vec<usize>>,
}

impl TargetSkeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加骨骼，返回索引
    ///
    /// 父索引无效（不存在或不在自身之前）时按根骨骼处理。
    pub fn add_bone(&mut self, name: impl Into<String>, parent: Option<usize>, local: BoneTransform) -> usize {
        let index = self.bones.len();
        let name = name.into();

        let parent_index = match parent {
            Some(p) if p < index => p as i32,
            Some(p) => {
                log::warn!("[骨架] 骨骼 '{}' 的父索引 {} 无效，按根骨骼处理", name, p);
                -1
            }
            None => -1,
        };

        let mut bone = TargetBone::new(name.clone(), parent_index, local);
        if let Some(p) = bone.parent_id() {
            bone.local_to_world = self.bones[p].local_to_world * bone.local_to_parent();
            self.children_cache[p].push(index);
        }

        self.name_to_index.insert(name, index);
        self.bones.push(bone);
        self.children_cache.push(Vec::new());
        index
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn get_bone(&self, index: usize) -> Option<&TargetBone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[TargetBone] {
        &self.bones
    }

    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|b| b.parent_id())
    }

    /// `ancestor` 是否是 `index` 的祖先（不含自身）
    pub fn is_ancestor(&self, ancestor: usize, index: usize) -> bool {
        let mut current = self.parent_of(index);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent_of(p);
        }
        false
    }

    // ========================================
    // 世界变换
    // ========================================

    /// 按层次顺序更新所有骨骼的世界变换
    pub fn update_world_transforms(&mut self) {
        for i in 0..self.bones.len() {
            let local = self.bones[i].local_to_parent();
            self.bones[i].local_to_world = match self.bones[i].parent_id() {
                Some(p) => self.bones[p].local_to_world * local,
                None => local,
            };
        }
    }

    /// 递归更新子树的世界变换
    fn update_subtree(&mut self, index: usize) {
        let local = self.bones[index].local_to_parent();
        self.bones[index].local_to_world = match self.bones[index].parent_id() {
            Some(p) => self.bones[p].local_to_world * local,
            None => local,
        };

        for c in 0..self.children_cache[index].len() {
            let child = self.children_cache[index][c];
            self.update_subtree(child);
        }
    }

    fn parent_world(&self, index: usize) -> Mat4 {
        self.parent_of(index)
            .map(|p| self.bones[p].local_to_world)
            .unwrap_or(Mat4::IDENTITY)
    }

    pub fn world_position(&self, index: usize) -> Option<Vec3> {
        self.bones.get(index).map(|b| b.position())
    }

    pub fn world_rotation(&self, index: usize) -> Option<Quat> {
        self.bones.get(index).map(|b| b.rotation())
    }

    /// 设置世界位姿，反算局部变换并刷新子树
    pub fn set_world_pose(&mut self, index: usize, position: Vec3, rotation: Quat) {
        if index >= self.bones.len() {
            return;
        }

        let parent_world = self.parent_world(index);
        let (_, parent_rotation, _) = parent_world.to_scale_rotation_translation();
        let local_translation = parent_world.inverse().transform_point3(position);
        let local_rotation = (parent_rotation.inverse() * rotation).normalize();

        let bone = &mut self.bones[index];
        bone.local.translation = local_translation;
        bone.local.rotation = local_rotation;
        self.update_subtree(index);
    }

    // ========================================
    // 局部变换
    // ========================================

    pub fn local_pose(&self, index: usize) -> Option<BoneTransform> {
        self.bones.get(index).map(|b| b.local)
    }

    /// 设置局部变换并刷新子树
    pub fn set_local_pose(&mut self, index: usize, local: BoneTransform) {
        if index >= self.bones.len() {
            return;
        }
        self.bones[index].local = local;
        self.update_subtree(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> TargetSkeleton {
        let mut s = TargetSkeleton::new();
        let root = s.add_bone("root", None, BoneTransform::from_rotation_translation(Quat::IDENTITY, Vec3::new(0.0, 1.0, 0.0)));
        let mid = s.add_bone(
            "mid",
            Some(root),
            BoneTransform::from_rotation_translation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2), Vec3::new(0.0, 1.0, 0.0)),
        );
        s.add_bone("tip", Some(mid), BoneTransform::from_rotation_translation(Quat::IDENTITY, Vec3::new(1.0, 0.0, 0.0)));
        s
    }

    #[test]
    fn test_world_transforms() {
        let s = chain();
        assert!((s.world_position(1).unwrap() - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);
        // mid 绕 Z 转 90°，tip 的局部 +X 变成世界 +Y
        assert!((s.world_position(2).unwrap() - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-5);
        assert_eq!(s.find_bone_by_name("tip"), Some(2));
        assert!(s.is_ancestor(0, 2));
        assert!(!s.is_ancestor(2, 0));
    }

    #[test]
    fn test_set_world_pose_updates_children() {
        let mut s = chain();
        s.set_world_pose(1, Vec3::new(5.0, 2.0, 0.0), Quat::IDENTITY);

        assert!((s.world_position(1).unwrap() - Vec3::new(5.0, 2.0, 0.0)).length() < 1e-5);
        assert!((s.world_position(2).unwrap() - Vec3::new(6.0, 2.0, 0.0)).length() < 1e-5);
        // 局部平移相对 root
        assert!((s.local_pose(1).unwrap().translation - Vec3::new(5.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_invalid_parent_becomes_root() {
        let mut s = TargetSkeleton::new();
        let i = s.add_bone("orphan", Some(7), BoneTransform::default());
        assert!(s.get_bone(i).unwrap().is_root());
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut s = chain();
        s.set_world_pose(10, Vec3::ONE, Quat::IDENTITY);
        assert_eq!(s.world_position(10), None);
    }
}
