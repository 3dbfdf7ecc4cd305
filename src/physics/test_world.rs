//! 测试用的简易模拟器
//!
//! 自由刚体半隐式欧拉积分，不求解关节；记录关节驱动的写入次数。

use glam::{Quat, Vec3};

use super::{
    BodyHandle, BodyState, ForceMode, JointDrive, JointHandle, JointInfo, PhysicsWorld, RawContact, Simulator,
};

pub(crate) struct TestJoint {
    pub info: JointInfo,
    pub drive: JointDrive,
    pub drive_writes: usize,
    pub target_rotation: Quat,
}

pub(crate) struct TestWorld {
    pub dt: f32,
    pub gravity: Vec3,
    pub bodies: Vec<BodyState>,
    pub joints: Vec<TestJoint>,
    pub contacts: Vec<RawContact>,
    pub awake: Vec<bool>,
}

impl TestWorld {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            gravity: Vec3::ZERO,
            bodies: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
            awake: Vec::new(),
        }
    }

    pub fn add_body(&mut self, position: Vec3, rotation: Quat, mass: f32) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(BodyState {
            position,
            rotation,
            center_of_mass: position,
            mass,
            inertia_tensor: Vec3::splat(mass),
            ..Default::default()
        });
        self.awake.push(false);
        handle
    }

    pub fn add_joint(&mut self, body: BodyHandle, connected_body: Option<BodyHandle>) -> JointHandle {
        let handle = JointHandle(self.joints.len() as u32);
        self.joints.push(TestJoint {
            info: JointInfo {
                body,
                connected_body,
                axis: Vec3::X,
                secondary_axis: Vec3::Y,
                anchor: Vec3::ZERO,
                connected_anchor: Vec3::ZERO,
                contacts_enabled: false,
            },
            drive: JointDrive::default(),
            drive_writes: 0,
            target_rotation: Quat::IDENTITY,
        });
        handle
    }

    pub fn joint(&self, joint: JointHandle) -> &TestJoint {
        &self.joints[joint.0 as usize]
    }

    pub fn integrate(&mut self, dt: f32) {
        let gravity = self.gravity;
        for body in &mut self.bodies {
            body.linear_velocity += gravity * dt;
            body.linear_velocity -= body.linear_velocity * body.linear_damping * dt;
            body.angular_velocity -= body.angular_velocity * body.angular_damping * dt;
            body.position += body.linear_velocity * dt;
            if body.angular_velocity != Vec3::ZERO {
                body.rotation = (Quat::from_scaled_axis(body.angular_velocity * dt) * body.rotation).normalize();
            }
            body.center_of_mass = body.position + body.rotation * body.local_center_of_mass;
        }
    }

    fn body_mut(&mut self, body: BodyHandle) -> Option<&mut BodyState> {
        self.bodies.get_mut(body.0 as usize)
    }
}

impl PhysicsWorld for TestWorld {
    fn fixed_dt(&self) -> f32 {
        self.dt
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        self.bodies.get(body.0 as usize).copied()
    }

    fn set_body_pose(&mut self, body: BodyHandle, position: Vec3, rotation: Quat) {
        if let Some(b) = self.body_mut(body) {
            b.position = position;
            b.rotation = rotation;
            b.center_of_mass = position + rotation * b.local_center_of_mass;
        }
    }

    fn set_body_velocity(&mut self, body: BodyHandle, linear: Vec3, angular: Vec3) {
        if let Some(b) = self.body_mut(body) {
            b.linear_velocity = linear;
            b.angular_velocity = angular;
        }
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3, mode: ForceMode) {
        let dt = self.dt;
        if let Some(b) = self.body_mut(body) {
            b.linear_velocity += match mode {
                ForceMode::Force => force * dt / b.mass,
                ForceMode::Acceleration => force * dt,
                ForceMode::Impulse => force / b.mass,
                ForceMode::VelocityChange => force,
            };
        }
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3, mode: ForceMode) {
        let dt = self.dt;
        if let Some(b) = self.body_mut(body) {
            // 各向同性惯量
            let inertia = b.inertia_tensor.x;
            b.angular_velocity += match mode {
                ForceMode::Force => torque * dt / inertia,
                ForceMode::Acceleration => torque * dt,
                ForceMode::Impulse => torque / inertia,
                ForceMode::VelocityChange => torque,
            };
        }
    }

    fn set_damping(&mut self, body: BodyHandle, linear: f32, angular: f32) {
        if let Some(b) = self.body_mut(body) {
            b.linear_damping = linear;
            b.angular_damping = angular;
        }
    }

    fn wake_up(&mut self, body: BodyHandle) {
        if let Some(a) = self.awake.get_mut(body.0 as usize) {
            *a = true;
        }
    }

    fn joint_info(&self, joint: JointHandle) -> Option<JointInfo> {
        self.joints.get(joint.0 as usize).map(|j| j.info)
    }

    fn set_joint_drive(&mut self, joint: JointHandle, drive: JointDrive) {
        if let Some(j) = self.joints.get_mut(joint.0 as usize) {
            j.drive = drive;
            j.drive_writes += 1;
        }
    }

    fn set_joint_target_rotation(&mut self, joint: JointHandle, rotation: Quat) {
        if let Some(j) = self.joints.get_mut(joint.0 as usize) {
            j.target_rotation = rotation;
        }
    }

    fn set_connected_anchor(&mut self, joint: JointHandle, anchor: Vec3) {
        if let Some(j) = self.joints.get_mut(joint.0 as usize) {
            j.info.connected_anchor = anchor;
        }
    }

    fn drain_contacts(&mut self) -> Vec<RawContact> {
        std::mem::take(&mut self.contacts)
    }
}

impl Simulator for TestWorld {
    fn step(&mut self, dt: f32) {
        self.integrate(dt);
    }
}
