//! 肌肉系统
//!
//! - `unit`: 肌肉单元（读取、锚点、固定、关节驱动、回写）
//! - `assembly`: 肌肉组（更新协议、激活渐变、碰撞转发）
//! - `joint_frame`: 关节空间坐标系
//! - `props`: 单元配置与运行时倍率
//! - `ramp` / `clock` / `hooks`: 激活渐变、物理时钟、扩展点

mod assembly;
mod clock;
mod hooks;
mod joint_frame;
mod props;
mod ramp;
mod unit;

pub use assembly::{MuscleAssembly, MuscleSettings, UpdateMode};
pub use clock::PhysicsClock;
pub use hooks::{PoseHook, UpdateHooks};
pub use joint_frame::JointFrame;
pub use props::{MuscleDesc, MuscleFlags, MuscleProps, MuscleState};
pub use ramp::{ActivationRamp, RampEvent, RampPhase, RampStart};
pub use unit::{pin_force, ConnectedLink, Muscle, MUSCLE_WEIGHT_SCALE, PIN_POW};
