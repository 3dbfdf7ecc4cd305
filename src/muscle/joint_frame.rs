//! 关节空间坐标系
//!
//! 关节空间由关节的主轴（X）与副轴（Y）定义，Z = X × Y。
//! 驱动目标旋转以关节空间表达，并采用可配置关节的取逆约定。

use glam::{Mat3, Quat, Vec3};

/// 关节坐标系映射（初始化时计算一次）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointFrame {
    /// 关节空间 → 刚体局部空间
    pub to_joint_space: Quat,
    /// 刚体局部空间 → 关节空间
    pub to_joint_space_inverse: Quat,
    /// 默认局部旋转 · 关节空间
    pub to_joint_space_default: Quat,
}

impl JointFrame {
    /// 由主轴、副轴和默认局部旋转构建
    ///
    /// 轴为零或平行时退化为单位旋转。
    pub fn new(axis: Vec3, secondary_axis: Vec3, default_local_rotation: Quat) -> Self {
        let to_joint_space = joint_basis(axis, secondary_axis);
        Self {
            to_joint_space,
            to_joint_space_inverse: to_joint_space.inverse(),
            to_joint_space_default: default_local_rotation * to_joint_space,
        }
    }

    /// 父空间的局部旋转 → 关节驱动目标旋转
    #[inline]
    pub fn local_to_joint_space(&self, local_rotation: Quat) -> Quat {
        (self.to_joint_space_inverse * local_rotation.inverse() * self.to_joint_space_default).normalize()
    }
}

/// 以主轴为 X、副轴为 Y 的正交基
fn joint_basis(axis: Vec3, secondary_axis: Vec3) -> Quat {
    let x = axis.normalize_or_zero();
    let forward = x.cross(secondary_axis).normalize_or_zero();
    if x == Vec3::ZERO || forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let up = forward.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, up, forward)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_axes_are_identity() {
        let frame = JointFrame::new(Vec3::X, Vec3::Y, Quat::IDENTITY);
        assert!(frame.to_joint_space.angle_between(Quat::IDENTITY) < 1e-5);
    }

    #[test]
    fn test_basis_maps_axes() {
        let frame = JointFrame::new(Vec3::Y, Vec3::Z, Quat::IDENTITY);
        assert!((frame.to_joint_space * Vec3::X - Vec3::Y).length() < 1e-5);
        assert!((frame.to_joint_space * Vec3::Y - Vec3::Z).length() < 1e-5);
        assert!((frame.to_joint_space * Vec3::Z - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_default_pose_maps_to_identity() {
        let default = Quat::from_rotation_y(0.7);
        let frame = JointFrame::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), default);
        let target = frame.local_to_joint_space(default);
        assert!(target.angle_between(Quat::IDENTITY) < 1e-4);
    }

    #[test]
    fn test_degenerate_axes() {
        let frame = JointFrame::new(Vec3::X, Vec3::X, Quat::IDENTITY);
        assert_eq!(frame.to_joint_space, Quat::IDENTITY);
        let frame = JointFrame::new(Vec3::ZERO, Vec3::Y, Quat::IDENTITY);
        assert_eq!(frame.to_joint_space, Quat::IDENTITY);
    }
}
