//! 数学工具库 - 无状态的向量/四元数运算
//!
//! - `prediction`: 无约束运动预测、质心、角速度/角加速度提取
//! - `force`: 考虑质量与惯量张量的力/力矩换算
//! - `intersect`: 射线与胶囊体求交

mod force;
mod intersect;
mod prediction;

pub use force::{
    apply_force_to_position, apply_torque_to_rotation, force_to_position, scale_by_inertia,
    torque_to_rotation,
};
pub use intersect::ray_capsule_intersect;
pub use prediction::{
    angular_acceleration, angular_velocity, center_of_mass, predict, to_bipolar, Prediction,
};
