//! 碰撞权重调制器
//!
//! 监听肌肉组的接触事件；受击的组临时降低成员的固定/肌肉权重、提高刚体阻力，
//! 并给出肌肉组的全局映射权重倍率（"受击变软"）。
//!
//! 每个物理步在肌肉组的 `on_fixed_update` 之前调用一次 `apply`。

use super::relay::{CollisionRelay, ContactEvent, ContactListener};
use super::weight_group::CollisionWeightGroup;
use crate::muscle::MuscleAssembly;
use crate::physics::{get_config, PhysicsWorld};
use crate::{RagdollError, Result};

/// 碰撞权重调制器
#[derive(Clone, Debug)]
pub struct WeightModulator {
    groups: Vec<CollisionWeightGroup>,
    /// 自身时钟（秒）
    time: f32,
    /// 构建时各刚体的基础阻尼（线, 角）
    base_damping: Vec<(f32, f32)>,
    /// 上次写入的附加阻力
    applied_drag: Vec<f32>,
}

impl WeightModulator {
    /// 创建调制器并记录成员刚体的基础阻尼
    pub fn new<W: PhysicsWorld + ?Sized>(
        assembly: &MuscleAssembly,
        world: &W,
        groups: Vec<CollisionWeightGroup>,
    ) -> Result<Self> {
        let count = assembly.len();
        for group in &groups {
            if let Some(&muscle) = group.muscles.iter().find(|&&m| m >= count) {
                return Err(RagdollError::InvalidGroupMember {
                    group: group.name.clone(),
                    muscle,
                });
            }
        }

        let base_damping = assembly
            .muscles()
            .iter()
            .map(|m| {
                world
                    .body_state(m.body)
                    .map(|s| (s.linear_damping, s.angular_damping))
                    .unwrap_or((0.0, 0.0))
            })
            .collect();

        if get_config().debug_log {
            log::debug!("[碰撞调制] {} 个权重组, {} 个肌肉", groups.len(), count);
        }

        Ok(Self {
            groups,
            time: 0.0,
            base_damping,
            applied_drag: vec![0.0; count],
        })
    }

    pub fn groups(&self) -> &[CollisionWeightGroup] {
        &self.groups
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut CollisionWeightGroup> {
        self.groups.get_mut(index)
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// 处理一次接触
    ///
    /// 同一肌肉组内的自碰撞与低于阈值的冲量都不算有效碰撞。
    fn on_collision(&mut self, event: &ContactEvent, relay: &CollisionRelay) {
        if event.is_self_collision() {
            return;
        }
        let muscle = relay.muscle_index();
        let now = self.time;
        for group in &mut self.groups {
            if group.contains(muscle) && group.qualifies(event.impulse) {
                if !group.is_triggered() {
                    log::debug!("[碰撞调制] 组 '{}' 受击 (肌肉 {}, 冲量 {:.3})", group.name, muscle, event.impulse);
                }
                group.register_collision(now);
            }
        }
    }

    /// 推进一个物理步，并把结果写入肌肉组与模拟器
    ///
    /// 成员属于多个组时取最小的权重倍率和最大的阻力。
    pub fn apply<W: PhysicsWorld + ?Sized>(&mut self, assembly: &mut MuscleAssembly, world: &mut W, dt: f32) {
        self.time += dt;
        let unpinned = assembly.settings.pin_weight <= 0.0;

        let count = assembly.len();
        let mut pin_mlp = vec![1.0f32; count];
        let mut muscle_mlp = vec![1.0f32; count];
        let mut drag = vec![0.0f32; count];
        let mut mapping: f32 = 0.0;

        for group in &mut self.groups {
            if !group.is_triggered() && !unpinned {
                continue;
            }
            group.update(self.time, dt, unpinned);
            mapping = mapping.max(group.mapping());

            let group_drag = group.current_drag(unpinned);
            let group_pin = group.current_pin_weight_mlp();
            let group_muscle = group.current_muscle_weight_mlp();
            for &m in &group.muscles {
                if m >= count {
                    continue;
                }
                pin_mlp[m] = pin_mlp[m].min(group_pin);
                muscle_mlp[m] = muscle_mlp[m].min(group_muscle);
                drag[m] = drag[m].max(group_drag);
            }

            if !group.is_triggered() {
                log::debug!("[碰撞调制] 组 '{}' 恢复", group.name);
            }
        }

        for i in 0..count {
            let Some(muscle) = assembly.muscle_mut(i) else {
                continue;
            };
            muscle.state.pin_weight_mlp = pin_mlp[i];
            muscle.state.muscle_weight_mlp = muscle_mlp[i];

            let (Some(&(linear, angular)), Some(applied)) = (self.base_damping.get(i), self.applied_drag.get_mut(i))
            else {
                continue;
            };
            if *applied != drag[i] {
                *applied = drag[i];
                world.set_damping(muscle.body, linear + drag[i], angular + drag[i]);
            }
        }

        assembly.set_mapping_weight_multiplier(mapping);
    }
}

impl ContactListener for WeightModulator {
    fn on_contact_enter(&mut self, event: &ContactEvent, relay: &CollisionRelay) {
        self.on_collision(event, relay);
    }

    fn on_contact_stay(&mut self, event: &ContactEvent, relay: &CollisionRelay) {
        self.on_collision(event, relay);
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::muscle::{MuscleDesc, MuscleSettings};
    use crate::physics::test_world::TestWorld;
    use crate::physics::{BodyHandle, ContactPhase, PhysicsConfig, RawContact};
    use crate::skeleton::{BoneTransform, TargetSkeleton};

    fn setup() -> (TestWorld, MuscleAssembly) {
        let mut world = TestWorld::new(0.02);
        let b0 = world.add_body(Vec3::ZERO, Quat::IDENTITY, 1.0);
        let b1 = world.add_body(Vec3::Y, Quat::IDENTITY, 1.0);
        world.set_damping(b1, 0.1, 0.2);
        let j0 = world.add_joint(b0, None);
        let j1 = world.add_joint(b1, Some(b0));

        let mut skeleton = TargetSkeleton::new();
        skeleton.add_bone("hips", None, BoneTransform::default());
        skeleton.add_bone(
            "arm",
            Some(0),
            BoneTransform::from_rotation_translation(Quat::IDENTITY, Vec3::Y),
        );

        let descs = vec![MuscleDesc::new("hips", j0, b0, 0), MuscleDesc::new("arm", j1, b1, 1)];
        let settings = MuscleSettings::from_config(&PhysicsConfig::default());
        let assembly = MuscleAssembly::new(&world, &skeleton, descs, settings).unwrap();
        (world, assembly)
    }

    fn arm_group() -> CollisionWeightGroup {
        let mut group = CollisionWeightGroup::new("arm", vec![1]);
        group.pin_weight_mlp = 0.0;
        group.muscle_weight_mlp = 0.5;
        group.drag = 2.0;
        group.blend_in = 0.0;
        group.blend_out = 0.1;
        group.collision_threshold = 1.0;
        group.collision_window = 0.2;
        group
    }

    fn hit(world: &mut TestWorld, body: u32, other: Option<u32>, impulse: f32) {
        world.contacts.push(RawContact {
            phase: ContactPhase::Enter,
            body: BodyHandle(body),
            other_body: other.map(BodyHandle),
            impulse,
        });
    }

    #[test]
    fn test_invalid_member() {
        let (world, assembly) = setup();
        let group = CollisionWeightGroup::new("bad", vec![0, 7]);
        assert!(matches!(
            WeightModulator::new(&assembly, &world, vec![group]),
            Err(RagdollError::InvalidGroupMember { muscle: 7, .. })
        ));
    }

    #[test]
    fn test_collision_softens_group() {
        let (mut world, mut assembly) = setup();
        let mut modulator = WeightModulator::new(&assembly, &world, vec![arm_group()]).unwrap();

        hit(&mut world, 1, None, 5.0);
        assembly.dispatch_contacts(&mut world, &mut modulator);
        modulator.apply(&mut assembly, &mut world, 0.02);

        let arm = assembly.muscle(1).unwrap();
        assert_eq!(arm.state.pin_weight_mlp, 0.0);
        assert!((arm.state.muscle_weight_mlp - 0.5).abs() < 1e-6);
        assert_eq!(assembly.muscle(0).unwrap().state.pin_weight_mlp, 1.0);
        assert_eq!(assembly.mapping_weight_multiplier(), 1.0);

        let body = world.body_state(BodyHandle(1)).unwrap();
        assert!((body.linear_damping - 2.1).abs() < 1e-5);
        assert!((body.angular_damping - 2.2).abs() < 1e-5);
    }

    #[test]
    fn test_weak_and_self_collisions_ignored() {
        let (mut world, mut assembly) = setup();
        let mut modulator = WeightModulator::new(&assembly, &world, vec![arm_group()]).unwrap();

        hit(&mut world, 1, None, 0.5);
        hit(&mut world, 1, Some(0), 50.0);
        assembly.dispatch_contacts(&mut world, &mut modulator);
        modulator.apply(&mut assembly, &mut world, 0.02);

        assert!(!modulator.groups()[0].is_triggered());
        assert_eq!(assembly.muscle(1).unwrap().state.pin_weight_mlp, 1.0);
        assert_eq!(assembly.mapping_weight_multiplier(), 0.0);
    }

    #[test]
    fn test_release_restores_damping() {
        let (mut world, mut assembly) = setup();
        let mut modulator = WeightModulator::new(&assembly, &world, vec![arm_group()]).unwrap();

        hit(&mut world, 1, None, 5.0);
        assembly.dispatch_contacts(&mut world, &mut modulator);

        let mut last = f32::MAX;
        for step in 0..200 {
            modulator.apply(&mut assembly, &mut world, 0.02);
            let damage = modulator.groups()[0].damage();
            if step > 10 {
                assert!(damage <= last);
            }
            last = damage;
        }

        assert!(!modulator.groups()[0].is_triggered());
        assert_eq!(assembly.muscle(1).unwrap().state.pin_weight_mlp, 1.0);
        let body = world.body_state(BodyHandle(1)).unwrap();
        assert!((body.linear_damping - 0.1).abs() < 1e-6);
        assert!((body.angular_damping - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_unpinned_evaluates_all_groups() {
        let (mut world, mut assembly) = setup();
        assembly.settings.pin_weight = 0.0;
        let mut modulator = WeightModulator::new(&assembly, &world, vec![arm_group()]).unwrap();

        modulator.apply(&mut assembly, &mut world, 0.02);
        let group = &modulator.groups()[0];
        assert_eq!(group.mapping(), 1.0);
        assert!(group.damage() <= group.mapping());
        assert_eq!(assembly.mapping_weight_multiplier(), 1.0);
        // 未固定时不加阻力
        assert!((world.body_state(BodyHandle(1)).unwrap().linear_damping - 0.1).abs() < 1e-6);
    }
}
