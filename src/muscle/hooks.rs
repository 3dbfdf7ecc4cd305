//! 更新周期的扩展点
//!
//! 外部系统可以在读取之前注入目标姿态，或在回写之后消费它。

use crate::skeleton::TargetSkeleton;

pub type PoseHook = Box<dyn FnMut(&mut TargetSkeleton)>;

/// 读取前/回写后回调列表
#[derive(Default)]
pub struct UpdateHooks {
    pre_read: Vec<PoseHook>,
    post_write: Vec<PoseHook>,
}

impl UpdateHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre_read(&mut self, hook: impl FnMut(&mut TargetSkeleton) + 'static) {
        self.pre_read.push(Box::new(hook));
    }

    pub fn add_post_write(&mut self, hook: impl FnMut(&mut TargetSkeleton) + 'static) {
        self.post_write.push(Box::new(hook));
    }

    pub fn clear(&mut self) {
        self.pre_read.clear();
        self.post_write.clear();
    }

    pub(crate) fn run_pre_read(&mut self, skeleton: &mut TargetSkeleton) {
        for hook in &mut self.pre_read {
            hook(skeleton);
        }
    }

    pub(crate) fn run_post_write(&mut self, skeleton: &mut TargetSkeleton) {
        for hook in &mut self.post_write {
            hook(skeleton);
        }
    }
}

impl std::fmt::Debug for UpdateHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateHooks")
            .field("pre_read", &self.pre_read.len())
            .field("post_write", &self.post_write.len())
            .finish()
    }
}
