//! 运动预测与旋转差分

use glam::{Quat, Vec3};
use std::f32::consts::PI;

use crate::physics::BodyState;

/// 预测结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// 预测无约束运动（忽略关节与碰撞）
///
/// 每步半隐式欧拉：
/// 1. `v += g·dt`，`v -= v·drag·dt`
/// 2. `pos += v·dt`
/// 3. `ω -= ω·angular_drag·dt`，`rot = rot · exp(ω·dt)`
#[allow(clippy::too_many_arguments)]
pub fn predict(
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    angular_velocity: Vec3,
    gravity: Vec3,
    linear_drag: f32,
    angular_drag: f32,
    steps: u32,
    dt: f32,
) -> Prediction {
    let mut p = Prediction {
        position,
        rotation,
        velocity,
        angular_velocity,
    };

    for _ in 0..steps {
        p.velocity += gravity * dt;
        p.velocity -= p.velocity * linear_drag * dt;
        p.position += p.velocity * dt;

        p.angular_velocity -= p.angular_velocity * angular_drag * dt;
        if p.angular_velocity != Vec3::ZERO {
            p.rotation = (p.rotation * Quat::from_scaled_axis(p.angular_velocity * dt)).normalize();
        }
    }

    p
}

/// 按质量加权的世界质心
///
/// 总质量为零（包括空集合）时返回 `None`，由调用方决定如何处理。
pub fn center_of_mass<'a, I>(bodies: I) -> Option<Vec3>
where
    I: IntoIterator<Item = &'a BodyState>,
{
    let mut weighted = Vec3::ZERO;
    let mut total_mass = 0.0f32;
    for body in bodies {
        weighted += body.center_of_mass * body.mass;
        total_mass += body.mass;
    }

    if total_mass > 0.0 {
        Some(weighted / total_mass)
    } else {
        None
    }
}

/// 把角度折叠到 (-π, π]
pub fn to_bipolar(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// 从两个朝向提取等效角速度
///
/// 相对旋转 `to · from⁻¹` 分解为轴角，角度折叠到 (-π, π] 后除以 `dt`。
/// 轴角分解退化（NaN/Inf）或 `dt <= 0` 时返回零向量。
pub fn angular_velocity(from: Quat, to: Quat, dt: f32) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::ZERO;
    }

    let delta = to * from.inverse();
    let (axis, angle) = delta.to_axis_angle();
    if !axis.is_finite() || !angle.is_finite() {
        return Vec3::ZERO;
    }

    let velocity = axis * (to_bipolar(angle) / dt);
    if velocity.is_finite() {
        velocity
    } else {
        Vec3::ZERO
    }
}

/// 近似一个物理步内从 `from` 转到 `to` 所需的角速度增量
///
/// 分别用前向轴与上向轴在两个朝向下的叉积合成旋转轴，归一化后乘以两个朝向的夹角，
/// 再除以 `dt`。多轴复合旋转时结果不精确（已知限制，弹簧/阻尼增益的调参依赖这一偏差）。
pub fn angular_acceleration(from: Quat, to: Quat, dt: f32) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::ZERO;
    }

    let axis = (from * Vec3::Z).cross(to * Vec3::Z);
    let axis2 = (from * Vec3::Y).cross(to * Vec3::Y);
    let angle = from.angle_between(to);

    let acceleration = (axis + axis2).normalize_or_zero() * angle / dt;
    if acceleration.is_finite() {
        acceleration
    } else {
        Vec3::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quat_close(a: Quat, b: Quat, eps: f32) -> bool {
        a.angle_between(b) < eps
    }

    #[test]
    fn test_predict_without_forces_is_linear() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let rotation = Quat::from_rotation_y(0.3);
        let velocity = Vec3::new(0.5, -1.0, 2.0);
        let dt = 0.02;

        for steps in [0u32, 1, 7, 50] {
            let p = predict(position, rotation, velocity, Vec3::ZERO, Vec3::ZERO, 0.0, 0.0, steps, dt);
            let expected = position + velocity * steps as f32 * dt;
            assert!((p.position - expected).length() < 1e-4);
            assert_eq!(p.rotation, rotation);
            assert_eq!(p.velocity, velocity);
        }
    }

    #[test]
    fn test_predict_gravity_single_step() {
        let gravity = Vec3::new(0.0, -10.0, 0.0);
        let dt = 0.02;
        let p = predict(Vec3::ZERO, Quat::IDENTITY, Vec3::ZERO, Vec3::ZERO, gravity, 0.0, 0.0, 1, dt);

        // 速度下降 0.2，位置按积分后的速度前进
        assert!((p.velocity.y - (-0.2)).abs() < 1e-6);
        assert!((p.position.y - p.velocity.y * dt).abs() < 1e-7);
        assert_eq!(p.velocity.x, 0.0);
    }

    #[test]
    fn test_predict_drag_slows_down() {
        let p = predict(Vec3::ZERO, Quat::IDENTITY, Vec3::X * 10.0, Vec3::Y * 3.0, Vec3::ZERO, 1.0, 1.0, 10, 0.02);
        assert!(p.velocity.x < 10.0 && p.velocity.x > 0.0);
        assert!(p.angular_velocity.y < 3.0 && p.angular_velocity.y > 0.0);
    }

    #[test]
    fn test_predict_rotates_with_angular_velocity() {
        let p = predict(Vec3::ZERO, Quat::IDENTITY, Vec3::ZERO, Vec3::Y * PI, Vec3::ZERO, 0.0, 0.0, 50, 0.01);
        // π rad/s × 0.5 s = π/2
        assert!(quat_close(p.rotation, Quat::from_rotation_y(PI * 0.5), 1e-3));
    }

    #[test]
    fn test_predict_applies_increment_on_the_right() {
        let start = Quat::from_rotation_x(PI * 0.5);
        let p = predict(Vec3::ZERO, start, Vec3::ZERO, Vec3::Y * PI, Vec3::ZERO, 0.0, 0.0, 50, 0.01);

        let increment = Quat::from_rotation_y(PI * 0.5);
        assert!(quat_close(p.rotation, start * increment, 1e-3));
        // 两种乘法顺序在此相差明显
        assert!(!quat_close(p.rotation, increment * start, 0.5));
    }

    #[test]
    fn test_center_of_mass_weighted() {
        let a = BodyState {
            center_of_mass: Vec3::ZERO,
            mass: 1.0,
            ..Default::default()
        };
        let b = BodyState {
            center_of_mass: Vec3::new(3.0, 0.0, 0.0),
            mass: 2.0,
            ..Default::default()
        };
        let com = center_of_mass([&a, &b]).unwrap();
        assert!((com - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-6);
        assert!(com.is_finite());
    }

    #[test]
    fn test_center_of_mass_zero_mass() {
        assert_eq!(center_of_mass(std::iter::empty::<&BodyState>()), None);

        let massless = BodyState {
            mass: 0.0,
            ..Default::default()
        };
        assert_eq!(center_of_mass([&massless]), None);
    }

    #[test]
    fn test_to_bipolar() {
        assert!((to_bipolar(PI * 1.5) - (-PI * 0.5)).abs() < 1e-5);
        assert!((to_bipolar(PI) - PI).abs() < 1e-6);
        assert!((to_bipolar(-PI) - PI).abs() < 1e-5);
        assert!((to_bipolar(0.25) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_angular_velocity_round_trip() {
        let dt = 0.02;
        let rotations = [
            Quat::from_rotation_x(0.4),
            Quat::from_rotation_y(-1.2),
            Quat::from_axis_angle(Vec3::new(1.0, 2.0, -0.5).normalize(), 2.5),
            Quat::from_axis_angle(Vec3::new(-0.3, 0.1, 0.9).normalize(), 3.0),
        ];

        for r in rotations {
            let w = angular_velocity(Quat::IDENTITY, r, dt);
            assert!(w.is_finite());
            let integrated = Quat::from_scaled_axis(w * dt);
            assert!(quat_close(integrated, r, 1e-3), "{:?} vs {:?}", integrated, r);
        }
    }

    #[test]
    fn test_angular_velocity_same_rotation_is_zero() {
        for r in [
            Quat::IDENTITY,
            Quat::from_rotation_z(1.0),
            Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), -2.0),
        ] {
            let w = angular_velocity(r, r, 0.02);
            assert!(w.length() < 1e-3, "{:?}", w);
        }
    }

    #[test]
    fn test_angular_velocity_degenerate_inputs() {
        // 零四元数会产生 NaN，结果必须是零向量
        let zero = Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);
        assert_eq!(angular_velocity(zero, Quat::IDENTITY, 0.02), Vec3::ZERO);
        assert_eq!(angular_velocity(Quat::IDENTITY, Quat::from_rotation_x(1.0), 0.0), Vec3::ZERO);
    }

    #[test]
    fn test_angular_acceleration_single_axis() {
        let dt = 0.02;
        let to = Quat::from_rotation_x(0.5);
        let acc = angular_acceleration(Quat::IDENTITY, to, dt);
        // 单轴旋转时结果与真实角速度一致
        assert!((acc - Vec3::X * (0.5 / dt)).length() < 1e-2, "{:?}", acc);
        assert_eq!(angular_acceleration(to, to, dt), Vec3::ZERO);
    }
}
