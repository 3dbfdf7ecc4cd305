//! 物理模拟器边界
//!
//! 肌肉系统不是物理引擎：积分、碰撞响应、关节约束求解都交给外部模拟器。
//! 这里只定义肌肉单元与模拟器交换的数据：
//! - 读取：刚体位姿/速度/质量属性、关节配置
//! - 写入：力/力矩、关节驱动目标与弹簧阻尼系数、锚点、阻尼
//!
//! `RapierWorld` 是基于 rapier3d 的实现。

pub mod config;
mod rapier_world;
#[cfg(test)]
pub(crate) mod test_world;

pub use config::{get_config, reset_config, set_config, PhysicsConfig};
pub use rapier_world::{BodyDesc, BodyShape, JointDesc, RapierWorld};

use glam::{Quat, Vec3};

/// 刚体句柄（由模拟器分配，稳定不变）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

/// 关节句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointHandle(pub u32);

/// 施力语义
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ForceMode {
    /// 力（乘以质量/惯量，按一个物理步持续作用）
    Force,
    /// 加速度（忽略质量，按一个物理步持续作用）
    Acceleration,
    /// 冲量（乘以质量/惯量，瞬时作用）
    Impulse,
    /// 速度变化（忽略质量，瞬时作用）
    #[default]
    VelocityChange,
}

/// 刚体状态快照
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    /// 刚体原点世界位置
    pub position: Vec3,
    /// 世界旋转
    pub rotation: Quat,
    /// 世界空间质心
    pub center_of_mass: Vec3,
    /// 刚体局部空间质心
    pub local_center_of_mass: Vec3,
    /// 线速度
    pub linear_velocity: Vec3,
    /// 角速度（世界空间）
    pub angular_velocity: Vec3,
    /// 质量
    pub mass: f32,
    /// 主惯量（惯量张量对角）
    pub inertia_tensor: Vec3,
    /// 主惯量坐标系相对刚体的旋转
    pub inertia_tensor_rotation: Quat,
    /// 线性阻尼
    pub linear_damping: f32,
    /// 角阻尼
    pub angular_damping: f32,
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            center_of_mass: Vec3::ZERO,
            local_center_of_mass: Vec3::ZERO,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
            inertia_tensor: Vec3::ONE,
            inertia_tensor_rotation: Quat::IDENTITY,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }
}

/// 关节配置快照
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointInfo {
    /// 被约束（被驱动）的刚体
    pub body: BodyHandle,
    /// 连接的父刚体；`None` 表示相对世界（根关节）
    pub connected_body: Option<BodyHandle>,
    /// 主轴（刚体局部空间）
    pub axis: Vec3,
    /// 副轴（刚体局部空间，与主轴垂直）
    pub secondary_axis: Vec3,
    /// 锚点（刚体局部空间）
    pub anchor: Vec3,
    /// 连接锚点（父刚体局部空间）
    pub connected_anchor: Vec3,
    /// 被连接的两个刚体之间是否产生碰撞
    pub contacts_enabled: bool,
}

/// 关节旋转驱动（slerp drive）
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct JointDrive {
    /// 位置弹簧（力矩/弧度）
    pub spring: f32,
    /// 阻尼（力矩/(弧度/秒)）
    pub damper: f32,
    /// 最大力
    pub max_force: f32,
}

/// 接触阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactPhase {
    Enter,
    Stay,
    Exit,
}

/// 模拟器上报的原始接触记录
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawContact {
    pub phase: ContactPhase,
    /// 发生接触的刚体
    pub body: BodyHandle,
    /// 另一方刚体（静态几何体没有刚体时为 `None`）
    pub other_body: Option<BodyHandle>,
    /// 本步的接触冲量大小
    pub impulse: f32,
}

/// 外部物理模拟器接口
///
/// 所有写操作对不存在的句柄静默忽略；读操作返回 `None`。
pub trait PhysicsWorld {
    /// 固定物理步长（秒）
    fn fixed_dt(&self) -> f32;

    fn body_state(&self, body: BodyHandle) -> Option<BodyState>;

    /// 直接设置刚体原点位姿（瞬移）
    fn set_body_pose(&mut self, body: BodyHandle, position: Vec3, rotation: Quat);

    fn set_body_velocity(&mut self, body: BodyHandle, linear: Vec3, angular: Vec3);

    /// 在质心处施加力
    fn apply_force(&mut self, body: BodyHandle, force: Vec3, mode: ForceMode);

    /// 施加力矩（世界空间）
    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3, mode: ForceMode);

    fn set_damping(&mut self, body: BodyHandle, linear: f32, angular: f32);

    fn wake_up(&mut self, body: BodyHandle);

    /// 刚体的统一缩放
    fn uniform_scale(&self, _body: BodyHandle) -> f32 {
        1.0
    }

    fn joint_info(&self, joint: JointHandle) -> Option<JointInfo>;

    fn set_joint_drive(&mut self, joint: JointHandle, drive: JointDrive);

    /// 设置关节驱动目标旋转
    ///
    /// 采用可配置关节约定：关节空间中的旋转，取逆。
    /// 单位四元数表示回到初始相对姿态。
    fn set_joint_target_rotation(&mut self, joint: JointHandle, rotation: Quat);

    /// 设置连接锚点（父刚体局部空间）
    fn set_connected_anchor(&mut self, joint: JointHandle, anchor: Vec3);

    /// 取出自上次调用以来的接触记录
    fn drain_contacts(&mut self) -> Vec<RawContact>;
}

/// 可步进的模拟器
pub trait Simulator: PhysicsWorld {
    /// 积分一个物理步
    fn step(&mut self, dt: f32);
}
