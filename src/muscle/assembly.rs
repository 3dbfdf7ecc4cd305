//! 肌肉组 - 一个骨架的全部肌肉单元与三阶段更新协议
//!
//! 更新顺序（每个渲染帧）：
//! 1. `on_update`: 重新判断更新模式，修正目标变换并推进动画，推进激活渐变
//! 2. `on_fixed_update` × N: 读取（Fixed 模式）→ 锚点 → 固定 → 关节驱动，随后由调用方步进模拟器
//! 3. `on_late_update`: 读取（Normal 模式）→ 回写
//!
//! `advance_frame` 把以上三步与模拟器步进串起来。

use std::collections::HashMap;

use glam::Vec3;

use super::clock::PhysicsClock;
use super::hooks::UpdateHooks;
use super::props::MuscleDesc;
use super::ramp::{ActivationRamp, RampEvent, RampStart};
use super::unit::{ConnectedLink, Muscle};
use crate::animation::AnimationSource;
use crate::collision::{CollisionRelay, ContactEvent, ContactListener, WeightModulator};
use crate::math;
use crate::physics::{get_config, BodyHandle, PhysicsConfig, PhysicsWorld, Simulator};
use crate::skeleton::TargetSkeleton;
use crate::{RagdollError, Result};

/// 肌肉组的全局参数（随时可读写，下一步生效）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MuscleSettings {
    /// 全局固定权重 [0, 1]
    pub pin_weight: f32,
    /// 全局肌肉权重 [0, 1]
    pub muscle_weight: f32,
    /// 全局映射权重 [0, 1]
    pub mapping_weight: f32,
    /// 弹簧增益（力矩/弧度）
    pub muscle_spring: f32,
    /// 阻尼增益（力矩/(弧度/秒)）
    pub muscle_damper: f32,
    /// 是否同时固定朝向
    pub angular_pinning: bool,
    /// 是否每步重新计算连接锚点
    pub update_joint_anchors: bool,
    /// 目标骨骼是否有平移动画
    pub support_translation_animation: bool,
    /// 动画前恢复上次读取的目标局部姿态
    pub fix_target_transforms: bool,
    /// 激活/停用的混合时长（秒）
    pub blend_time: f32,
}

impl MuscleSettings {
    pub fn from_config(config: &PhysicsConfig) -> Self {
        Self {
            pin_weight: config.pin_weight,
            muscle_weight: config.muscle_weight,
            mapping_weight: config.mapping_weight,
            muscle_spring: config.muscle_spring,
            muscle_damper: config.muscle_damper,
            angular_pinning: false,
            update_joint_anchors: true,
            support_translation_animation: false,
            fix_target_transforms: true,
            blend_time: config.blend_time,
        }
    }
}

impl Default for MuscleSettings {
    fn default() -> Self {
        Self::from_config(&get_config())
    }
}

/// 更新模式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// 动画按渲染帧更新
    #[default]
    Normal,
    /// 动画按物理步手动推进
    Fixed,
}

/// 肌肉组
#[derive(Debug)]
pub struct MuscleAssembly {
    muscles: Vec<Muscle>,
    relays: Vec<CollisionRelay>,
    /// 刚体 → 肌肉索引
    body_to_muscle: HashMap<BodyHandle, usize>,
    pub settings: MuscleSettings,
    ramp: ActivationRamp,
    update_mode: UpdateMode,
    /// 上次 late update 之后是否执行过物理步
    fixed_frame: bool,
    /// 外部层（碰撞调制器）写入的映射权重倍率
    mapping_weight_mlp: f32,
    hooks: UpdateHooks,
    clock: PhysicsClock,
}

impl MuscleAssembly {
    /// 创建肌肉组
    ///
    /// 单元按给定顺序初始化；顺序应与约束层次一致（父单元在前）。
    pub fn new<W: PhysicsWorld + ?Sized>(
        world: &W,
        skeleton: &TargetSkeleton,
        descs: Vec<MuscleDesc>,
        settings: MuscleSettings,
    ) -> Result<Self> {
        let bone_count = skeleton.bone_count();
        let mut body_to_muscle: HashMap<BodyHandle, usize> = HashMap::with_capacity(descs.len());
        let mut infos = Vec::with_capacity(descs.len());

        // ========================================
        // 校验
        // ========================================

        for (i, desc) in descs.iter().enumerate() {
            let info = world
                .joint_info(desc.joint)
                .ok_or(RagdollError::UnknownJoint { muscle: i, joint: desc.joint })?;
            let state = world
                .body_state(desc.body)
                .ok_or(RagdollError::UnknownBody { muscle: i, body: desc.body })?;
            if desc.target >= bone_count {
                return Err(RagdollError::InvalidTarget {
                    muscle: i,
                    bone: desc.target,
                    bone_count,
                });
            }
            if let Some(&first) = body_to_muscle.get(&desc.body) {
                return Err(RagdollError::DuplicateBody {
                    first,
                    second: i,
                    body: desc.body,
                });
            }
            body_to_muscle.insert(desc.body, i);

            if info.body != desc.body {
                log::warn!("[肌肉组] 肌肉 '{}' 的关节约束的不是它的刚体", desc.name);
            }
            if state.mass <= 0.0 {
                log::warn!("[肌肉组] 肌肉 '{}' 的刚体质量为零", desc.name);
            }
            infos.push(info);
        }

        // 连接关系：关节的连接刚体 → 父单元
        let parents: Vec<Option<usize>> = infos
            .iter()
            .zip(&descs)
            .map(|(info, desc)| {
                let connected = info.connected_body?;
                let parent = body_to_muscle.get(&connected).copied();
                if parent.is_none() {
                    log::warn!("[肌肉组] 肌肉 '{}' 连接的刚体不属于任何肌肉，按根单元处理", desc.name);
                }
                parent
            })
            .collect();

        for i in 0..parents.len() {
            let mut current = parents[i];
            let mut depth = 0;
            while let Some(p) = current {
                if p == i || depth > parents.len() {
                    return Err(RagdollError::ConnectedBodyCycle { muscle: i });
                }
                current = parents[p];
                depth += 1;
            }
        }

        Self::warn_setup(skeleton, &descs, &infos, &parents);

        // ========================================
        // 初始化
        // ========================================

        let links: Vec<Option<ConnectedLink>> = parents
            .iter()
            .map(|p| {
                p.map(|index| ConnectedLink {
                    index,
                    body: descs[index].body,
                    target: descs[index].target,
                })
            })
            .collect();

        let mut muscles = Vec::with_capacity(descs.len());
        let mut relays = Vec::with_capacity(descs.len());
        for (i, (desc, link)) in descs.into_iter().zip(links).enumerate() {
            relays.push(CollisionRelay::new(desc.body, i));
            let mut muscle = Muscle::new(i, desc);
            muscle.initialize(world, skeleton, link);
            muscles.push(muscle);
        }

        let config = get_config();
        log::info!("[肌肉组] 构建完成: {} 个肌肉单元", muscles.len());

        Ok(Self {
            muscles,
            relays,
            body_to_muscle,
            settings,
            ramp: ActivationRamp::new(),
            update_mode: UpdateMode::Normal,
            fixed_frame: false,
            mapping_weight_mlp: 1.0,
            hooks: UpdateHooks::new(),
            clock: PhysicsClock::new(world.fixed_dt(), config.max_substep_count),
        })
    }

    /// 配置诊断（只输出警告，不阻止运行）
    fn warn_setup(
        skeleton: &TargetSkeleton,
        descs: &[MuscleDesc],
        infos: &[crate::physics::JointInfo],
        parents: &[Option<usize>],
    ) {
        let mut targets: HashMap<usize, usize> = HashMap::new();
        for (i, desc) in descs.iter().enumerate() {
            if infos[i].contacts_enabled {
                log::warn!("[肌肉组] 肌肉 '{}' 的关节允许被连接的刚体相互碰撞", desc.name);
            }
            if let Some(p) = parents[i] {
                if p > i {
                    log::warn!(
                        "[肌肉组] 肌肉 '{}' 排在它的父肌肉 '{}' 之前，锚点会滞后一步",
                        desc.name,
                        descs[p].name
                    );
                }
                let parent_target = descs[p].target;
                if parent_target != desc.target && !skeleton.is_ancestor(parent_target, desc.target) {
                    log::warn!("[肌肉组] 肌肉 '{}' 的目标骨骼不在父肌肉目标之下", desc.name);
                }
            }
            if let Some(&other) = targets.get(&desc.target) {
                log::warn!(
                    "[肌肉组] 肌肉 '{}' 与 '{}' 共享同一个目标骨骼",
                    descs[other].name,
                    desc.name
                );
            } else {
                targets.insert(desc.target, i);
            }
        }
    }

    // ========================================
    // 访问器
    // ========================================

    pub fn muscles(&self) -> &[Muscle] {
        &self.muscles
    }

    pub fn muscle(&self, index: usize) -> Option<&Muscle> {
        self.muscles.get(index)
    }

    pub fn muscle_mut(&mut self, index: usize) -> Option<&mut Muscle> {
        self.muscles.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.muscles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.muscles.is_empty()
    }

    pub fn relays(&self) -> &[CollisionRelay] {
        &self.relays
    }

    /// 刚体所属的肌肉索引
    pub fn muscle_of_body(&self, body: BodyHandle) -> Option<usize> {
        self.body_to_muscle.get(&body).copied()
    }

    pub fn hooks_mut(&mut self) -> &mut UpdateHooks {
        &mut self.hooks
    }

    #[inline]
    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    /// 是否激活（含渐入中）
    pub fn is_active(&self) -> bool {
        self.ramp.is_active()
    }

    /// 是否正在驱动刚体（完全休眠以外）
    pub fn is_driving(&self) -> bool {
        self.ramp.is_driving()
    }

    /// 激活渐变权重 [0, 1]
    pub fn activation_weight(&self) -> f32 {
        self.ramp.weight()
    }

    pub fn mapping_weight_multiplier(&self) -> f32 {
        self.mapping_weight_mlp
    }

    pub fn set_mapping_weight_multiplier(&mut self, value: f32) {
        self.mapping_weight_mlp = value.clamp(0.0, 1.0);
    }

    /// 实际用于回写的映射权重
    pub fn mapping_weight(&self) -> f32 {
        (self.settings.mapping_weight * self.ramp.weight() * self.mapping_weight_mlp).clamp(0.0, 1.0)
    }

    /// 全部刚体的质心；总质量为零时返回 `None`
    pub fn center_of_mass<W: PhysicsWorld + ?Sized>(&self, world: &W) -> Option<Vec3> {
        let states: Vec<_> = self.muscles.iter().filter_map(|m| world.body_state(m.body)).collect();
        math::center_of_mass(states.iter())
    }

    // ========================================
    // 激活/停用
    // ========================================

    /// 激活
    ///
    /// 已激活或渐入中时忽略；渐出中时从当前权重反转。
    pub fn activate<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W, skeleton: &TargetSkeleton) {
        match self.ramp.start_in(self.settings.blend_time) {
            RampStart::Ignored => {}
            RampStart::Reversed => {
                log::debug!("[肌肉组] 停用被取消，从权重 {:.3} 继续激活", self.ramp.weight());
            }
            RampStart::Fresh => {
                for muscle in &mut self.muscles {
                    muscle.reset(world);
                }
                for muscle in &mut self.muscles {
                    world.wake_up(muscle.body);
                    muscle.move_to_target(world, skeleton);
                    muscle.clear_velocities(world);
                }
                for muscle in &mut self.muscles {
                    muscle.read(skeleton, 0.0);
                }
                self.fixed_frame = false;
                self.clock.reset();
                log::info!("[肌肉组] 激活 (混合时长 {:.3}s)", self.settings.blend_time);
            }
        }
    }

    /// 停用
    ///
    /// 已休眠或渐出中时忽略。渐出完成时同步重置所有单元。
    pub fn deactivate<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        if let Some(RampEvent::Deactivated) = self.ramp.start_out(self.settings.blend_time) {
            self.finish_deactivation(world);
        }
    }

    fn finish_deactivation<W: PhysicsWorld + ?Sized>(&mut self, world: &mut W) {
        for muscle in &mut self.muscles {
            muscle.reset(world);
        }
        for muscle in &self.muscles {
            muscle.clear_velocities(world);
        }
        self.fixed_frame = false;
        log::info!("[肌肉组] 已停用");
    }

    // ========================================
    // 更新协议
    // ========================================

    fn read_all(&mut self, skeleton: &mut TargetSkeleton, dt: f32) {
        self.hooks.run_pre_read(skeleton);
        for muscle in &mut self.muscles {
            muscle.read(skeleton, dt);
        }
    }

    fn write_all<W: PhysicsWorld + ?Sized>(&mut self, world: &W, skeleton: &mut TargetSkeleton) {
        let weight = self.mapping_weight();
        for muscle in &self.muscles {
            muscle.write(world, skeleton, weight);
        }
        self.hooks.run_post_write(skeleton);
    }

    fn fix_target_transforms(&self, skeleton: &mut TargetSkeleton) {
        if !self.settings.fix_target_transforms || !self.ramp.is_driving() {
            return;
        }
        for muscle in &self.muscles {
            muscle.fix_target_transform(skeleton);
        }
    }

    /// 渲染帧开始
    pub fn on_update<W: PhysicsWorld + ?Sized, A: AnimationSource + ?Sized>(
        &mut self,
        world: &mut W,
        skeleton: &mut TargetSkeleton,
        animation: &mut A,
        frame_dt: f32,
    ) {
        self.update_mode = if animation.animate_physics() {
            UpdateMode::Fixed
        } else {
            UpdateMode::Normal
        };

        if self.update_mode == UpdateMode::Normal {
            self.fix_target_transforms(skeleton);
            animation.animate(skeleton, frame_dt);
            skeleton.update_world_transforms();
        }

        if let Some(RampEvent::Deactivated) = self.ramp.advance(frame_dt, self.settings.blend_time) {
            self.finish_deactivation(world);
        }
    }

    /// 物理步之前
    pub fn on_fixed_update<W: PhysicsWorld + ?Sized, A: AnimationSource + ?Sized>(
        &mut self,
        world: &mut W,
        skeleton: &mut TargetSkeleton,
        animation: &mut A,
        dt: f32,
    ) {
        if self.update_mode == UpdateMode::Fixed {
            self.fix_target_transforms(skeleton);
            animation.animate(skeleton, dt);
            skeleton.update_world_transforms();
        }

        if !self.ramp.is_driving() {
            return;
        }

        if self.update_mode == UpdateMode::Fixed {
            self.read_all(skeleton, dt);
        }

        let s = self.settings;
        if s.update_joint_anchors {
            for muscle in &self.muscles {
                muscle.update_anchor(world, skeleton, s.support_translation_animation);
            }
        }
        for muscle in &self.muscles {
            muscle.pin(world, s.pin_weight, s.angular_pinning, dt);
        }
        for muscle in &mut self.muscles {
            muscle.muscle_rotation(world, s.muscle_weight, s.muscle_spring, s.muscle_damper);
        }

        self.fixed_frame = true;
    }

    /// 物理步之后（渲染帧末尾）
    pub fn on_late_update<W: PhysicsWorld + ?Sized>(&mut self, world: &W, skeleton: &mut TargetSkeleton, frame_dt: f32) {
        if !self.ramp.is_driving() {
            self.fixed_frame = false;
            return;
        }

        match self.update_mode {
            UpdateMode::Normal => {
                self.read_all(skeleton, frame_dt);
                self.write_all(world, skeleton);
            }
            UpdateMode::Fixed => {
                if self.fixed_frame {
                    self.write_all(world, skeleton);
                }
            }
        }
        self.fixed_frame = false;
    }

    /// 推进一个渲染帧：更新 → (碰撞调制 + 物理步前 + 模拟器步进)* → 回写
    ///
    /// 返回本帧执行的物理步数。
    pub fn advance_frame<S: Simulator + ?Sized, A: AnimationSource + ?Sized>(
        &mut self,
        sim: &mut S,
        skeleton: &mut TargetSkeleton,
        animation: &mut A,
        frame_dt: f32,
        mut modulator: Option<&mut WeightModulator>,
    ) -> u32 {
        self.on_update(sim, skeleton, animation, frame_dt);

        let steps = self.clock.advance(frame_dt);
        let dt = self.clock.fixed_dt();
        for _ in 0..steps {
            match modulator.as_deref_mut() {
                Some(m) => {
                    self.dispatch_contacts(sim, m);
                    m.apply(self, sim, dt);
                }
                None => {
                    sim.drain_contacts();
                }
            }
            self.on_fixed_update(sim, skeleton, animation, dt);
            sim.step(dt);
        }

        self.on_late_update(sim, skeleton, frame_dt);
        steps
    }

    // ========================================
    // 碰撞
    // ========================================

    /// 把模拟器的接触记录经由各刚体的中继转发给监听者
    ///
    /// 不属于本组的刚体上的接触被忽略。
    pub fn dispatch_contacts<W: PhysicsWorld + ?Sized>(&self, world: &mut W, listener: &mut dyn ContactListener) {
        for raw in world.drain_contacts() {
            let Some(index) = self.muscle_of_body(raw.body) else {
                continue;
            };
            let event = ContactEvent {
                phase: raw.phase,
                body: raw.body,
                other_body: raw.other_body,
                other_muscle: raw.other_body.and_then(|b| self.muscle_of_body(b)),
                impulse: raw.impulse,
            };
            self.relays[index].relay(&event, listener);
        }
    }
}
