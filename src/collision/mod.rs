//! 碰撞系统
//!
//! - `relay`: 每个被驱动刚体一个中继，转发接触事件
//! - `weight_group`: 碰撞权重组（受击平滑量）
//! - `modulator`: 碰撞权重调制器，把受击效果写入肌肉组与模拟器

mod modulator;
mod relay;
mod weight_group;

pub use modulator::WeightModulator;
pub use relay::{CollisionRelay, ContactEvent, ContactListener};
pub use weight_group::{approach, CollisionWeightGroup};
