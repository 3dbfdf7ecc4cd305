//! 力/力矩换算
//!
//! 计算在一个物理步内把刚体带到目标位置/朝向所需的量，
//! 并按施力语义决定是否乘以质量或惯量张量。

use glam::{Quat, Vec3};

use super::prediction::angular_acceleration;
use crate::physics::{BodyHandle, BodyState, ForceMode, PhysicsWorld};

/// 用惯量张量缩放向量（角速度 → 角动量）
///
/// `I_world · v = R · diag(I) · R⁻¹ · v`，其中 `R = rotation · inertia_tensor_rotation`。
pub fn scale_by_inertia(v: Vec3, rotation: Quat, inertia_tensor: Vec3, inertia_tensor_rotation: Quat) -> Vec3 {
    let r = rotation * inertia_tensor_rotation;
    let local = r.inverse() * v;
    r * (local * inertia_tensor)
}

/// 转到目标朝向所需的力矩（按 `mode` 缩放）
///
/// 所需角速度增量 = 近似角加速度 − 当前角速度。
pub fn torque_to_rotation(state: &BodyState, target: Quat, dt: f32, mode: ForceMode) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::ZERO;
    }

    let required = angular_acceleration(state.rotation, target, dt) - state.angular_velocity;
    let torque = match mode {
        ForceMode::Acceleration => required / dt,
        ForceMode::Force => {
            scale_by_inertia(required, state.rotation, state.inertia_tensor, state.inertia_tensor_rotation) / dt
        }
        ForceMode::Impulse => {
            scale_by_inertia(required, state.rotation, state.inertia_tensor, state.inertia_tensor_rotation)
        }
        ForceMode::VelocityChange => required,
    };

    if torque.is_finite() {
        torque
    } else {
        Vec3::ZERO
    }
}

/// 把 `from` 点移动到 `to` 点所需的力（按 `mode` 缩放）
pub fn force_to_position(state: &BodyState, from: Vec3, to: Vec3, dt: f32, mode: ForceMode) -> Vec3 {
    if dt <= 0.0 {
        return Vec3::ZERO;
    }

    let required = (to - from) / dt - state.linear_velocity;
    let force = match mode {
        ForceMode::Acceleration => required / dt,
        ForceMode::Force => required * state.mass / dt,
        ForceMode::Impulse => required * state.mass,
        ForceMode::VelocityChange => required,
    };

    if force.is_finite() {
        force
    } else {
        Vec3::ZERO
    }
}

/// 对刚体施加转向目标朝向的力矩
pub fn apply_torque_to_rotation<W: PhysicsWorld + ?Sized>(
    world: &mut W,
    body: BodyHandle,
    target: Quat,
    mode: ForceMode,
) {
    let Some(state) = world.body_state(body) else {
        return;
    };
    let torque = torque_to_rotation(&state, target, world.fixed_dt(), mode);
    world.apply_torque(body, torque, mode);
}

/// 对刚体施加把 `from` 点带到 `to` 点的力
pub fn apply_force_to_position<W: PhysicsWorld + ?Sized>(
    world: &mut W,
    body: BodyHandle,
    from: Vec3,
    to: Vec3,
    mode: ForceMode,
) {
    let Some(state) = world.body_state(body) else {
        return;
    };
    let force = force_to_position(&state, from, to, world.fixed_dt(), mode);
    world.apply_force(body, force, mode);
}
