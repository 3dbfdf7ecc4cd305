//! 动画源接口
//!
//! 动画系统是外部协作者：它把动画姿态写入目标骨架。
//! 肌肉组只关心两件事：它是否与物理时钟同步，以及如何手动推进它。

use crate::skeleton::TargetSkeleton;

/// 动画源
pub trait AnimationSource {
    /// 动画是否按物理时钟更新
    ///
    /// 为 `true` 时肌肉组在每个物理步中手动推进动画（Fixed 模式），
    /// 否则动画按渲染帧更新（Normal 模式）。外部系统可能在运行时切换它，
    /// 所以每个渲染帧都会重新查询。
    fn animate_physics(&self) -> bool;

    /// 推进动画 `dt` 秒，并把结果写入目标骨架的局部变换
    fn animate(&mut self, skeleton: &mut TargetSkeleton, dt: f32);
}
