//! 肌肉单元 - 单个关节的控制器
//!
//! 拥有一个被约束、被驱动的刚体，弱引用一个动画目标骨骼。
//! 每个物理步：读取目标运动 → 更新锚点 → 固定力/力矩 → 关节驱动；
//! 物理步结束后再把模拟姿态按映射权重写回目标。
//!
//! 状态：`未初始化 → 已初始化 → {激活, 重置}`，激活/重置由肌肉组切换。

use glam::{Quat, Vec3};

use super::joint_frame::JointFrame;
use super::props::{MuscleDesc, MuscleFlags, MuscleProps, MuscleState};
use crate::math::angular_acceleration;
use crate::physics::{BodyHandle, ForceMode, JointDrive, JointHandle, PhysicsWorld};
use crate::skeleton::{BoneTransform, TargetSkeleton};

/// 固定权重的指数：滑块低端柔和、高端刚硬
pub const PIN_POW: i32 = 4;

/// 肌肉权重的放大系数（调参常量）
pub const MUSCLE_WEIGHT_SCALE: f32 = 10.0;

/// 连接关系：父肌肉单元
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectedLink {
    /// 父单元索引
    pub index: usize,
    /// 父单元的被驱动刚体
    pub body: BodyHandle,
    /// 父单元的目标骨骼
    pub target: usize,
}

/// 固定力（速度变化）
///
/// `force = w^4 · (−v + v_target + offset / dt)`，`w` 先截断到 [0, 1]。
pub fn pin_force(weight: f32, velocity: Vec3, target_velocity: Vec3, position_offset: Vec3, dt: f32) -> Vec3 {
    if weight <= 0.0 || dt <= 0.0 {
        return Vec3::ZERO;
    }
    let w = weight.min(1.0).powi(PIN_POW);
    let offset = if position_offset.is_finite() { position_offset } else { Vec3::ZERO };
    (-velocity + target_velocity + offset / dt) * w
}

/// 肌肉单元
#[derive(Clone, Debug)]
pub struct Muscle {
    pub name: String,
    index: usize,
    pub joint: JointHandle,
    pub body: BodyHandle,
    /// 目标骨骼索引（弱引用）
    pub target: usize,
    pub props: MuscleProps,
    /// 运行时倍率
    pub state: MuscleState,
    flags: MuscleFlags,
    connected: Option<ConnectedLink>,

    // ========================================
    // 初始化时缓存
    // ========================================

    frame: JointFrame,
    /// 默认局部位姿（根单元为世界位姿，否则相对连接刚体）
    default_local_position: Vec3,
    default_local_rotation: Quat,
    /// target_rotation⁻¹ · body_rotation
    rotation_relative_to_target: Quat,
    /// 目标局部旋转 → 刚体局部旋转
    local_rotation_convert: Quat,
    /// 连接目标旋转 → 连接刚体旋转
    to_parent_space: Quat,
    local_center_of_mass: Vec3,
    anchor: Vec3,

    // ========================================
    // 每步状态
    // ========================================

    target_animated_center_of_mass: Vec3,
    target_velocity: Vec3,
    target_animated_world_rotation: Quat,
    target_animated_rotation: Quat,
    has_read: bool,
    last_drive_weight: f32,
    last_rotation_damper: f32,
    /// 上次读取时的目标局部姿态（用于修正目标变换）
    stored_target_local: Option<BoneTransform>,
}

impl Muscle {
    pub fn new(index: usize, desc: MuscleDesc) -> Self {
        let mut flags = MuscleFlags::empty();
        flags.set(MuscleFlags::MAP_POSITION, desc.props.map_position);

        Self {
            name: desc.name,
            index,
            joint: desc.joint,
            body: desc.body,
            target: desc.target,
            props: desc.props,
            state: MuscleState::default(),
            flags,
            connected: None,
            frame: JointFrame::new(Vec3::X, Vec3::Y, Quat::IDENTITY),
            default_local_position: Vec3::ZERO,
            default_local_rotation: Quat::IDENTITY,
            rotation_relative_to_target: Quat::IDENTITY,
            local_rotation_convert: Quat::IDENTITY,
            to_parent_space: Quat::IDENTITY,
            local_center_of_mass: Vec3::ZERO,
            anchor: Vec3::ZERO,
            target_animated_center_of_mass: Vec3::ZERO,
            target_velocity: Vec3::ZERO,
            target_animated_world_rotation: Quat::IDENTITY,
            target_animated_rotation: Quat::IDENTITY,
            has_read: false,
            last_drive_weight: -1.0,
            last_rotation_damper: -1.0,
            stored_target_local: None,
        }
    }

    // ========================================
    // 访问器
    // ========================================

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.flags.contains(MuscleFlags::INITIALIZED)
    }

    #[inline]
    pub fn connected(&self) -> Option<ConnectedLink> {
        self.connected
    }

    #[inline]
    pub fn connected_body(&self) -> Option<BodyHandle> {
        self.connected.map(|c| c.body)
    }

    #[inline]
    pub fn target_velocity(&self) -> Vec3 {
        self.target_velocity
    }

    #[inline]
    pub fn target_center_of_mass(&self) -> Vec3 {
        self.target_animated_center_of_mass
    }

    #[inline]
    pub fn frame(&self) -> &JointFrame {
        &self.frame
    }

    #[inline]
    pub fn flags(&self) -> MuscleFlags {
        self.flags
    }

    // ========================================
    // 初始化
    // ========================================

    /// 初始化：解析连接关系并缓存默认姿态与坐标系映射
    ///
    /// 关节、刚体或目标不可用时返回 `false`，该单元之后不参与计算。
    pub fn initialize<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &W,
        skeleton: &TargetSkeleton,
        connected: Option<ConnectedLink>,
    ) -> bool {
        let Some(info) = world.joint_info(self.joint) else {
            log::warn!("[肌肉] '{}' 的关节不存在，跳过初始化", self.name);
            return false;
        };
        let Some(body) = world.body_state(self.body) else {
            log::warn!("[肌肉] '{}' 的刚体不存在，跳过初始化", self.name);
            return false;
        };
        let Some(target_rotation) = skeleton.world_rotation(self.target) else {
            log::warn!("[肌肉] '{}' 的目标骨骼 {} 不存在，跳过初始化", self.name, self.target);
            return false;
        };

        // 父刚体与父目标的世界位姿
        let parent = connected.and_then(|link| {
            let state = world.body_state(link.body)?;
            let target_rotation = skeleton.world_rotation(link.target)?;
            Some((link, state, target_rotation))
        });

        match parent {
            Some((link, parent_body, parent_target_rotation)) => {
                let inv = parent_body.rotation.inverse();
                self.default_local_position = inv * (body.position - parent_body.position);
                self.default_local_rotation = (inv * body.rotation).normalize();
                self.to_parent_space = (parent_target_rotation.inverse() * parent_body.rotation).normalize();

                let target_local_rotation = parent_target_rotation.inverse() * target_rotation;
                self.local_rotation_convert = (target_local_rotation.inverse() * self.default_local_rotation).normalize();

                self.flags.set(
                    MuscleFlags::DIRECT_TARGET_PARENT,
                    skeleton.parent_of(self.target) == Some(link.target),
                );
                self.connected = Some(link);
            }
            None => {
                if connected.is_some() {
                    log::warn!("[肌肉] '{}' 的连接刚体不可用，按根单元处理", self.name);
                }
                self.default_local_position = body.position;
                self.default_local_rotation = body.rotation;
                self.to_parent_space = Quat::IDENTITY;
                self.local_rotation_convert = (target_rotation.inverse() * body.rotation).normalize();
                self.connected = None;
            }
        }

        self.frame = JointFrame::new(info.axis, info.secondary_axis, self.default_local_rotation);
        self.rotation_relative_to_target = (target_rotation.inverse() * body.rotation).normalize();
        self.local_center_of_mass = body.local_center_of_mass;
        self.anchor = info.anchor;

        self.flags.insert(MuscleFlags::INITIALIZED);
        self.has_read = false;
        self.last_drive_weight = -1.0;
        self.last_rotation_damper = -1.0;
        true
    }

    // ========================================
    // 每步协议
    // ========================================

    /// 目标局部旋转（相对连接单元的目标）
    fn target_local_rotation(&self, skeleton: &TargetSkeleton, target_rotation: Quat) -> Quat {
        match self.connected.and_then(|link| skeleton.world_rotation(link.target)) {
            Some(parent_rotation) => parent_rotation.inverse() * target_rotation,
            None => target_rotation,
        }
    }

    /// 读取：目标质心速度、关节空间朝向、世界朝向
    ///
    /// `dt` 是两次读取之间的时间（有限差分用）。
    pub fn read(&mut self, skeleton: &TargetSkeleton, dt: f32) {
        if !self.is_initialized() {
            return;
        }
        let (Some(position), Some(rotation)) =
            (skeleton.world_position(self.target), skeleton.world_rotation(self.target))
        else {
            return;
        };

        let center_of_mass = position + rotation * self.rotation_relative_to_target * self.local_center_of_mass;
        self.target_velocity = if self.has_read && dt > 0.0 {
            let v = (center_of_mass - self.target_animated_center_of_mass) / dt;
            if v.is_finite() { v } else { Vec3::ZERO }
        } else {
            Vec3::ZERO
        };
        self.target_animated_center_of_mass = center_of_mass;
        self.target_animated_world_rotation = (rotation * self.rotation_relative_to_target).normalize();
        self.target_animated_rotation =
            (self.target_local_rotation(skeleton, rotation) * self.local_rotation_convert).normalize();
        self.stored_target_local = skeleton.local_pose(self.target);
        self.has_read = true;
    }

    /// 恢复上次读取时的目标局部姿态
    ///
    /// 回写阶段修改了目标；没有关键帧的骨骼不会被动画覆盖，需要在动画前恢复。
    pub fn fix_target_transform(&self, skeleton: &mut TargetSkeleton) {
        if let Some(local) = self.stored_target_local {
            skeleton.set_local_pose(self.target, local);
        }
    }

    /// 锚点更新：连接锚点 = 目标位置在连接目标空间中的坐标 / 连接刚体缩放
    ///
    /// 目标层次为刚性父子关系且不支持平移动画时跳过。
    pub fn update_anchor<W: PhysicsWorld + ?Sized>(
        &self,
        world: &mut W,
        skeleton: &TargetSkeleton,
        support_translation_animation: bool,
    ) {
        if !self.is_initialized() {
            return;
        }
        let Some(link) = self.connected else {
            return;
        };
        if self.flags.contains(MuscleFlags::DIRECT_TARGET_PARENT) && !support_translation_animation {
            return;
        }

        let (Some(position), Some(rotation)) =
            (skeleton.world_position(self.target), skeleton.world_rotation(self.target))
        else {
            return;
        };
        let (Some(parent_position), Some(parent_rotation)) =
            (skeleton.world_position(link.target), skeleton.world_rotation(link.target))
        else {
            return;
        };

        let anchor_world = position + rotation * self.rotation_relative_to_target * self.anchor;
        let parent_frame = parent_rotation * self.to_parent_space;
        let anchor = parent_frame.inverse() * (anchor_world - parent_position);

        let scale = world.uniform_scale(link.body);
        if scale <= 0.0 {
            return;
        }
        let anchor = anchor / scale;
        if anchor.is_finite() {
            world.set_connected_anchor(self.joint, anchor);
        }
    }

    /// 固定：以速度变化的方式把刚体拉向目标位置（可选朝向）
    pub fn pin<W: PhysicsWorld + ?Sized>(&self, world: &mut W, pin_weight: f32, angular_pinning: bool, dt: f32) {
        if !self.is_initialized() || !self.has_read || dt <= 0.0 {
            return;
        }
        let w = pin_weight * self.props.pin_weight * self.state.pin_weight_mlp;
        if w <= 0.0 {
            return;
        }
        let Some(body) = world.body_state(self.body) else {
            return;
        };

        let offset = self.target_animated_center_of_mass - body.center_of_mass;
        let force = pin_force(w, body.linear_velocity, self.target_velocity, offset, dt);
        world.apply_force(self.body, force, ForceMode::VelocityChange);

        if angular_pinning {
            let w = w.min(1.0).powi(PIN_POW);
            let torque =
                (angular_acceleration(body.rotation, self.target_animated_world_rotation, dt) - body.angular_velocity) * w;
            if torque.is_finite() {
                world.apply_torque(self.body, torque, ForceMode::VelocityChange);
            }
        }
    }

    /// 关节驱动：设置目标旋转，必要时更新弹簧/阻尼
    ///
    /// 返回本次是否写入了驱动系数。根单元没有弹簧驱动（只有固定）。
    pub fn muscle_rotation<W: PhysicsWorld + ?Sized>(
        &mut self,
        world: &mut W,
        muscle_weight: f32,
        muscle_spring: f32,
        muscle_damper: f32,
    ) -> bool {
        if !self.is_initialized() {
            return false;
        }

        let mut w = muscle_weight * muscle_spring * self.props.muscle_weight * self.state.muscle_weight_mlp
            * MUSCLE_WEIGHT_SCALE;
        if self.connected.is_none() {
            w = 0.0;
        } else if w > 0.0 && self.has_read {
            let target = self.frame.local_to_joint_space(self.target_animated_rotation);
            world.set_joint_target_rotation(self.joint, target);
        }
        let w = w.max(0.0);

        let d = (muscle_damper * self.props.muscle_damper * self.state.muscle_damper_mlp + self.state.muscle_damper_add)
            .max(0.0);

        if w == self.last_drive_weight && d == self.last_rotation_damper {
            return false;
        }
        self.last_drive_weight = w;
        self.last_rotation_damper = d;
        world.set_joint_drive(
            self.joint,
            JointDrive {
                spring: w,
                damper: d,
                max_force: w.max(d),
            },
        );
        true
    }

    /// 回写：按映射权重把模拟姿态混合到目标
    ///
    /// 权重 ≥ 1 时直接对齐；有连接刚体时位置相对连接刚体表达，避免父级运动被重复计入。
    pub fn write<W: PhysicsWorld + ?Sized>(&self, world: &W, skeleton: &mut TargetSkeleton, mapping_weight: f32) {
        if !self.is_initialized() {
            return;
        }
        let w = mapping_weight * self.props.mapping_weight * self.state.mapping_weight_mlp;
        if w <= 0.0 {
            return;
        }
        let Some(body) = world.body_state(self.body) else {
            return;
        };
        let (Some(current_position), Some(current_rotation)) =
            (skeleton.world_position(self.target), skeleton.world_rotation(self.target))
        else {
            return;
        };

        let rotation = (body.rotation * self.rotation_relative_to_target.inverse()).normalize();
        let map_position = self.flags.contains(MuscleFlags::MAP_POSITION);

        let position = if !map_position {
            current_position
        } else {
            match self.connected.and_then(|link| {
                let parent = world.body_state(link.body)?;
                let parent_target_position = skeleton.world_position(link.target)?;
                let parent_target_rotation = skeleton.world_rotation(link.target)?;
                Some((parent, parent_target_position, parent_target_rotation))
            }) {
                Some((parent, parent_target_position, parent_target_rotation)) => {
                    let relative = parent.rotation.inverse() * (body.position - parent.position);
                    parent_target_position + parent_target_rotation * self.to_parent_space * relative
                }
                None => body.position,
            }
        };

        if !position.is_finite() || !rotation.is_finite() {
            return;
        }

        if w >= 1.0 {
            skeleton.set_world_pose(self.target, position, rotation);
        } else {
            skeleton.set_world_pose(
                self.target,
                current_position.lerp(position, w),
                current_rotation.lerp(rotation, w),
            );
        }
    }

    // ========================================
    // 激活/重置
    // ========================================

    /// 重置：恢复默认局部位姿，并清空驱动缓存
    pub fn reset<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        if !self.is_initialized() {
            return;
        }
        let pose = match self.connected {
            Some(link) => world.body_state(link.body).map(|parent| {
                (
                    parent.position + parent.rotation * self.default_local_position,
                    (parent.rotation * self.default_local_rotation).normalize(),
                )
            }),
            None => Some((self.default_local_position, self.default_local_rotation)),
        };
        if let Some((position, rotation)) = pose {
            world.set_body_pose(self.body, position, rotation);
        }
        self.last_drive_weight = -1.0;
        self.last_rotation_damper = -1.0;
    }

    /// 直接把刚体对齐到目标位姿
    pub fn move_to_target<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, skeleton: &TargetSkeleton) {
        if !self.is_initialized() {
            return;
        }
        let (Some(position), Some(rotation)) =
            (skeleton.world_position(self.target), skeleton.world_rotation(self.target))
        else {
            return;
        };
        world.set_body_pose(self.body, position, (rotation * self.rotation_relative_to_target).normalize());
        // 速度有限差分从这里重新开始
        self.has_read = false;
    }

    /// 清零线速度与角速度
    pub fn clear_velocities<W: PhysicsWorld + ?Sized>(&self, world: &mut W) {
        world.set_body_velocity(self.body, Vec3::ZERO, Vec3::ZERO);
    }
}
