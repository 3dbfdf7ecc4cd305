//! Rapier 物理后端
//!
//! 用 rapier3d 实现 `PhysicsWorld`/`Simulator`：
//! - 每个 `BodyHandle` 对应一个刚体 + 一个碰撞体
//! - 有连接刚体的关节用球关节 + 三轴角度马达实现弹簧驱动；根关节只保留记录
//! - 每步之后钳制速度，并把碰撞事件整理成进入/保持/离开三阶段的接触记录

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use glam::{Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use super::config::{get_config, PhysicsConfig};
use super::{
    BodyHandle, BodyState, ContactPhase, ForceMode, JointDrive, JointHandle, JointInfo, PhysicsWorld, RawContact,
    Simulator,
};
use crate::muscle::JointFrame;

// ========================================
// 类型转换（glam <-> nalgebra）
// ========================================

#[inline]
fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

#[inline]
fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

#[inline]
fn from_point(p: &Point<Real>) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}

#[inline]
fn to_rotation(q: Quat) -> UnitQuaternion<Real> {
    UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
}

#[inline]
fn from_rotation(r: &UnitQuaternion<Real>) -> Quat {
    Quat::from_xyzw(r.i, r.j, r.k, r.w)
}

#[inline]
fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(Translation3::from(to_vector(position)), to_rotation(rotation))
}

// ========================================
// 创建参数
// ========================================

/// 碰撞形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyShape {
    Ball { radius: f32 },
    /// 沿刚体局部 Y 轴的胶囊体
    Capsule { half_height: f32, radius: f32 },
    Cuboid { half_extents: Vec3 },
}

/// 刚体创建参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyDesc {
    pub position: Vec3,
    pub rotation: Quat,
    pub shape: BodyShape,
    pub density: f32,
    pub friction: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// 统一缩放（只用于锚点换算）
    pub scale: f32,
    /// 静态刚体（地面等）
    pub fixed: bool,
}

impl BodyDesc {
    pub fn new(position: Vec3, shape: BodyShape) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            shape,
            density: 1.0,
            friction: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            scale: 1.0,
            fixed: false,
        }
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }
}

/// 关节创建参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointDesc {
    pub body: BodyHandle,
    pub connected_body: Option<BodyHandle>,
    pub axis: Vec3,
    pub secondary_axis: Vec3,
    /// 锚点（刚体局部空间）
    pub anchor: Vec3,
    /// 连接锚点（父刚体局部空间）；`None` 时由当前位姿推算
    pub connected_anchor: Option<Vec3>,
    pub contacts_enabled: bool,
}

impl JointDesc {
    pub fn new(body: BodyHandle, connected_body: Option<BodyHandle>) -> Self {
        Self {
            body,
            connected_body,
            axis: Vec3::X,
            secondary_axis: Vec3::Y,
            anchor: Vec3::ZERO,
            connected_anchor: None,
            contacts_enabled: false,
        }
    }
}

// ========================================
// 内部记录
// ========================================

struct JointRecord {
    info: JointInfo,
    /// 根关节没有 rapier 约束
    rapier: Option<ImpulseJointHandle>,
    drive: JointDrive,
    target_rotation: Quat,
}

/// 碰撞事件收集器（rapier 要求 `Send + Sync`）
#[derive(Default)]
struct ContactCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl ContactCollector {
    fn take(&self) -> Vec<CollisionEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

type ColliderPair = (ColliderHandle, ColliderHandle);

fn ordered_pair(a: ColliderHandle, b: ColliderHandle) -> ColliderPair {
    if a.into_raw_parts() <= b.into_raw_parts() {
        (a, b)
    } else {
        (b, a)
    }
}

/// 把驱动目标旋转与弹簧阻尼写入三轴角度马达
fn apply_motor(joints: &mut ImpulseJointSet, record: &JointRecord) {
    let Some(handle) = record.rapier else {
        return;
    };
    let Some(joint) = joints.get_mut(handle) else {
        return;
    };

    // 目标旋转按取逆约定存储
    let angles = record.target_rotation.inverse().to_scaled_axis();
    let drive = record.drive;
    for (axis, angle) in [
        (JointAxis::AngX, angles.x),
        (JointAxis::AngY, angles.y),
        (JointAxis::AngZ, angles.z),
    ] {
        joint.data.set_motor_position(axis, angle, drive.spring, drive.damper);
        joint.data.set_motor_max_force(axis, drive.max_force);
    }
}

/// Rapier 物理世界
pub struct RapierWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: ContactCollector,

    fixed_dt: f32,
    max_linear_velocity: f32,
    max_angular_velocity: f32,

    /// BodyHandle → rapier 刚体
    handles: Vec<RigidBodyHandle>,
    handle_lookup: HashMap<RigidBodyHandle, BodyHandle>,
    scales: Vec<f32>,
    joints: Vec<JointRecord>,
    active_pairs: HashSet<ColliderPair>,
    contacts: Vec<RawContact>,
}

impl RapierWorld {
    /// 用全局配置创建
    pub fn new() -> Self {
        Self::with_config(&get_config())
    }

    pub fn with_config(config: &PhysicsConfig) -> Self {
        if config.debug_log {
            log::info!("[Rapier] 物理世界创建: FPS={}, 重力Y={}", config.physics_fps, config.gravity_y);
        }

        let fixed_dt = config.fixed_dt();
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = fixed_dt;

        Self {
            gravity: vector![0.0, config.gravity_y, 0.0],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: ContactCollector::default(),
            fixed_dt,
            max_linear_velocity: config.max_linear_velocity,
            max_angular_velocity: config.max_angular_velocity,
            handles: Vec::new(),
            handle_lookup: HashMap::new(),
            scales: Vec::new(),
            joints: Vec::new(),
            active_pairs: HashSet::new(),
            contacts: Vec::new(),
        }
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    pub fn body_count(&self) -> usize {
        self.handles.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    fn rigid(&self, body: BodyHandle) -> Option<RigidBodyHandle> {
        self.handles.get(body.0 as usize).copied()
    }

    fn rigid_mut(&mut self, body: BodyHandle) -> Option<&mut RigidBody> {
        let handle = self.rigid(body)?;
        self.bodies.get_mut(handle)
    }

    // ========================================
    // 构建
    // ========================================

    /// 创建刚体及其碰撞体
    pub fn add_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let builder = if desc.fixed {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let rigid_body = builder
            .position(to_isometry(desc.position, desc.rotation))
            .linear_damping(desc.linear_damping)
            .angular_damping(desc.angular_damping)
            .build();
        let rb_handle = self.bodies.insert(rigid_body);

        let collider = match desc.shape {
            BodyShape::Ball { radius } => ColliderBuilder::ball(radius),
            BodyShape::Capsule { half_height, radius } => ColliderBuilder::capsule_y(half_height, radius),
            BodyShape::Cuboid { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
        }
        .density(desc.density)
        .friction(desc.friction)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
        self.colliders.insert_with_parent(collider, rb_handle, &mut self.bodies);

        let handle = BodyHandle(self.handles.len() as u32);
        self.handles.push(rb_handle);
        self.handle_lookup.insert(rb_handle, handle);
        self.scales.push(desc.scale);
        handle
    }

    /// 创建关节
    ///
    /// 关节坐标系按当前位姿对齐，所以当前相对姿态就是驱动的零点。
    /// 刚体句柄无效时返回 `None`。
    pub fn add_joint(&mut self, desc: JointDesc) -> Option<JointHandle> {
        let Some(child) = self.body_state(desc.body) else {
            log::warn!("[Rapier] 关节的刚体 {:?} 不存在，跳过", desc.body);
            return None;
        };
        let child_rb = self.rigid(desc.body)?;
        let basis = JointFrame::new(desc.axis, desc.secondary_axis, Quat::IDENTITY).to_joint_space;

        let (rapier, connected_anchor) = match desc.connected_body {
            Some(parent_body) => {
                let Some(parent) = self.body_state(parent_body) else {
                    log::warn!("[Rapier] 关节的连接刚体 {:?} 不存在，跳过", parent_body);
                    return None;
                };
                let parent_rb = self.rigid(parent_body)?;

                let anchor_world = child.position + child.rotation * desc.anchor;
                let parent_inv = parent.rotation.inverse();
                let connected_anchor = desc
                    .connected_anchor
                    .unwrap_or_else(|| parent_inv * (anchor_world - parent.position));
                let frame1_rotation = (parent_inv * child.rotation * basis).normalize();

                let mut joint = SphericalJointBuilder::new().contacts_enabled(desc.contacts_enabled).build();
                joint.data.set_local_frame1(to_isometry(connected_anchor, frame1_rotation));
                joint.data.set_local_frame2(to_isometry(desc.anchor, basis));
                for axis in [JointAxis::AngX, JointAxis::AngY, JointAxis::AngZ] {
                    joint.data.set_motor_model(axis, MotorModel::ForceBased);
                    joint.data.set_motor_max_force(axis, 0.0);
                }

                let handle = self.impulse_joints.insert(parent_rb, child_rb, joint, true);
                (Some(handle), connected_anchor)
            }
            None => (None, child.position + child.rotation * desc.anchor),
        };

        let handle = JointHandle(self.joints.len() as u32);
        self.joints.push(JointRecord {
            info: JointInfo {
                body: desc.body,
                connected_body: desc.connected_body,
                axis: desc.axis,
                secondary_axis: desc.secondary_axis,
                anchor: desc.anchor,
                connected_anchor,
                contacts_enabled: desc.contacts_enabled,
            },
            rapier,
            drive: JointDrive::default(),
            target_rotation: Quat::IDENTITY,
        });
        Some(handle)
    }

    // ========================================
    // 步进后处理
    // ========================================

    /// 速度钳制，防止大接触力下刚体爆炸
    fn clamp_velocities(&mut self) {
        let max_lin = self.max_linear_velocity;
        let max_ang = self.max_angular_velocity;
        let max_lin_sq = max_lin * max_lin;
        let max_ang_sq = max_ang * max_ang;

        for &handle in &self.handles {
            let Some(rb) = self.bodies.get_mut(handle) else {
                continue;
            };
            if !rb.is_dynamic() {
                continue;
            }

            let lin_vel = *rb.linvel();
            let lin_sq = lin_vel.norm_squared();
            if lin_sq > max_lin_sq {
                rb.set_linvel(lin_vel * (max_lin / lin_sq.sqrt()), false);
            }

            let ang_vel = *rb.angvel();
            let ang_sq = ang_vel.norm_squared();
            if ang_sq > max_ang_sq {
                rb.set_angvel(ang_vel * (max_ang / ang_sq.sqrt()), false);
            }
        }
    }

    fn collider_body(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        let parent = self.colliders.get(collider)?.parent()?;
        self.handle_lookup.get(&parent).copied()
    }

    fn push_pair(&mut self, pair: ColliderPair, phase: ContactPhase) {
        let impulse = self
            .narrow_phase
            .contact_pair(pair.0, pair.1)
            .map(|p| p.total_impulse_magnitude())
            .unwrap_or(0.0);
        let a = self.collider_body(pair.0);
        let b = self.collider_body(pair.1);

        if let Some(body) = a {
            self.contacts.push(RawContact { phase, body, other_body: b, impulse });
        }
        if let Some(body) = b {
            self.contacts.push(RawContact { phase, body, other_body: a, impulse });
        }
    }

    /// 把碰撞事件整理成进入/保持/离开
    fn collect_contacts(&mut self) {
        let mut started = HashSet::new();
        for event in self.collector.take() {
            let pair = ordered_pair(event.collider1(), event.collider2());
            if event.started() {
                self.active_pairs.insert(pair);
                started.insert(pair);
                self.push_pair(pair, ContactPhase::Enter);
            } else {
                self.active_pairs.remove(&pair);
                self.push_pair(pair, ContactPhase::Exit);
            }
        }

        let staying: Vec<ColliderPair> = self.active_pairs.iter().filter(|p| !started.contains(*p)).copied().collect();
        for pair in staying {
            self.push_pair(pair, ContactPhase::Stay);
        }
    }
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld for RapierWorld {
    fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        let rb = self.bodies.get(self.rigid(body)?)?;
        let mprops = &rb.mass_properties().local_mprops;

        Some(BodyState {
            position: from_vector(rb.translation()),
            rotation: from_rotation(rb.rotation()),
            center_of_mass: from_point(rb.center_of_mass()),
            local_center_of_mass: from_point(&mprops.local_com),
            linear_velocity: from_vector(rb.linvel()),
            angular_velocity: from_vector(rb.angvel()),
            mass: rb.mass(),
            inertia_tensor: from_vector(&mprops.principal_inertia()),
            inertia_tensor_rotation: from_rotation(&mprops.principal_inertia_local_frame),
            linear_damping: rb.linear_damping(),
            angular_damping: rb.angular_damping(),
        })
    }

    fn set_body_pose(&mut self, body: BodyHandle, position: Vec3, rotation: Quat) {
        if let Some(rb) = self.rigid_mut(body) {
            rb.set_position(to_isometry(position, rotation), true);
        }
    }

    fn set_body_velocity(&mut self, body: BodyHandle, linear: Vec3, angular: Vec3) {
        if let Some(rb) = self.rigid_mut(body) {
            rb.set_linvel(to_vector(linear), true);
            rb.set_angvel(to_vector(angular), true);
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3, mode: ForceMode) {
        let dt = self.fixed_dt;
        let Some(rb) = self.rigid_mut(body) else {
            return;
        };
        match mode {
            ForceMode::Force => rb.apply_impulse(to_vector(force * dt), true),
            ForceMode::Impulse => rb.apply_impulse(to_vector(force), true),
            ForceMode::Acceleration => {
                let v = *rb.linvel() + to_vector(force * dt);
                rb.set_linvel(v, true);
            }
            ForceMode::VelocityChange => {
                let v = *rb.linvel() + to_vector(force);
                rb.set_linvel(v, true);
            }
        }
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3, mode: ForceMode) {
        let dt = self.fixed_dt;
        let Some(rb) = self.rigid_mut(body) else {
            return;
        };
        match mode {
            ForceMode::Force => rb.apply_torque_impulse(to_vector(torque * dt), true),
            ForceMode::Impulse => rb.apply_torque_impulse(to_vector(torque), true),
            ForceMode::Acceleration => {
                let w = *rb.angvel() + to_vector(torque * dt);
                rb.set_angvel(w, true);
            }
            ForceMode::VelocityChange => {
                let w = *rb.angvel() + to_vector(torque);
                rb.set_angvel(w, true);
            }
        }
    }

    fn set_damping(&mut self, body: BodyHandle, linear: f32, angular: f32) {
        if let Some(rb) = self.rigid_mut(body) {
            rb.set_linear_damping(linear);
            rb.set_angular_damping(angular);
        }
    }

    fn wake_up(&mut self, body: BodyHandle) {
        if let Some(rb) = self.rigid_mut(body) {
            rb.wake_up(true);
        }
    }

    fn uniform_scale(&self, body: BodyHandle) -> f32 {
        self.scales.get(body.0 as usize).copied().unwrap_or(1.0)
    }

    fn joint_info(&self, joint: JointHandle) -> Option<JointInfo> {
        self.joints.get(joint.0 as usize).map(|j| j.info)
    }

    fn set_joint_drive(&mut self, joint: JointHandle, drive: JointDrive) {
        let Some(record) = self.joints.get_mut(joint.0 as usize) else {
            return;
        };
        record.drive = drive;
        apply_motor(&mut self.impulse_joints, record);
    }

    fn set_joint_target_rotation(&mut self, joint: JointHandle, rotation: Quat) {
        let Some(record) = self.joints.get_mut(joint.0 as usize) else {
            return;
        };
        if record.target_rotation == rotation {
            return;
        }
        record.target_rotation = rotation;
        apply_motor(&mut self.impulse_joints, record);
    }

    fn set_connected_anchor(&mut self, joint: JointHandle, anchor: Vec3) {
        let Some(record) = self.joints.get_mut(joint.0 as usize) else {
            return;
        };
        record.info.connected_anchor = anchor;
        let Some(handle) = record.rapier else {
            return;
        };
        if let Some(j) = self.impulse_joints.get_mut(handle) {
            let mut frame = j.data.local_frame1;
            frame.translation = Translation3::from(to_vector(anchor));
            j.data.set_local_frame1(frame);
        }
    }

    fn drain_contacts(&mut self) -> Vec<RawContact> {
        std::mem::take(&mut self.contacts)
    }
}

impl Simulator for RapierWorld {
    fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &self.collector,
        );

        self.clamp_velocities();
        self.collect_contacts();
    }
}
