//! 射线与胶囊体求交（用于拾取选择）

use glam::Vec3;

const PARALLEL_EPSILON: f32 = 1e-6;

/// 射线是否与胶囊体相交
///
/// 胶囊体 = 圆柱体 + 两端半球。先对圆柱部分解二次方程，
/// 交点落在线段投影范围外时回退到两端球体检测。
/// 射线起点在胶囊体内部也算命中；只返回是否命中，不返回距离。
pub fn ray_capsule_intersect(origin: Vec3, direction: Vec3, capsule_start: Vec3, capsule_end: Vec3, radius: f32) -> bool {
    if radius <= 0.0 {
        return false;
    }
    let rd = direction.normalize_or_zero();
    if rd == Vec3::ZERO {
        return false;
    }

    let ba = capsule_end - capsule_start;
    let oa = origin - capsule_start;
    let baba = ba.dot(ba);
    let bard = ba.dot(rd);
    let baoa = ba.dot(oa);
    let rdoa = rd.dot(oa);
    let oaoa = oa.dot(oa);

    // 圆柱部分（射线与轴平行时跳过，交由端球处理）
    let a = baba - bard * bard;
    if baba > 0.0 && a > PARALLEL_EPSILON * baba {
        let b = baba * rdoa - baoa * bard;
        let c = baba * oaoa - baoa * baoa - radius * radius * baba;
        let h = b * b - a * c;
        if h >= 0.0 {
            let sqrt_h = h.sqrt();
            for t in [(-b - sqrt_h) / a, (-b + sqrt_h) / a] {
                if t < 0.0 {
                    continue;
                }
                let y = baoa + t * bard;
                if y > 0.0 && y < baba {
                    return true;
                }
            }
        }
    }

    ray_sphere_intersect(origin, rd, capsule_start, radius) || ray_sphere_intersect(origin, rd, capsule_end, radius)
}

/// 射线与球体求交（`rd` 已归一化）
fn ray_sphere_intersect(origin: Vec3, rd: Vec3, center: Vec3, radius: f32) -> bool {
    let oc = origin - center;
    let b = oc.dot(rd);
    let c = oc.dot(oc) - radius * radius;
    let h = b * b - c;
    if h < 0.0 {
        return false;
    }
    // 远交点在起点之后即命中（包括起点在球内）
    -b + h.sqrt() >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    const END: Vec3 = Vec3::new(0.0, 2.0, 0.0);

    #[test]
    fn test_ray_through_axis_hits() {
        for radius in [0.001, 0.1, 1.0, 10.0] {
            // 垂直穿过轴线
            assert!(ray_capsule_intersect(Vec3::new(-5.0, 1.0, 0.0), Vec3::X, START, END, radius));
            // 沿轴线方向
            assert!(ray_capsule_intersect(Vec3::new(0.0, -5.0, 0.0), Vec3::Y, START, END, radius));
            assert!(ray_capsule_intersect(Vec3::new(0.0, 7.0, 0.0), -Vec3::Y, START, END, radius));
        }
    }

    #[test]
    fn test_ray_offset_misses() {
        // 距离轴线 0.6 > 半径 0.5，垂直于轴，不经过端球
        assert!(!ray_capsule_intersect(Vec3::new(-5.0, 1.0, 0.6), Vec3::X, START, END, 0.5));
        assert!(!ray_capsule_intersect(Vec3::new(0.6, 1.0, -5.0), Vec3::Z, START, END, 0.5));
    }

    #[test]
    fn test_ray_hits_end_cap() {
        // 高于圆柱段，但擦过上端半球
        assert!(ray_capsule_intersect(Vec3::new(-5.0, 2.3, 0.0), Vec3::X, START, END, 0.5));
        assert!(!ray_capsule_intersect(Vec3::new(-5.0, 2.6, 0.0), Vec3::X, START, END, 0.5));
    }

    #[test]
    fn test_ray_pointing_away_misses() {
        assert!(!ray_capsule_intersect(Vec3::new(-5.0, 1.0, 0.0), -Vec3::X, START, END, 0.5));
    }

    #[test]
    fn test_origin_inside_hits() {
        assert!(ray_capsule_intersect(Vec3::new(0.0, 1.0, 0.0), Vec3::Z, START, END, 0.5));
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(!ray_capsule_intersect(Vec3::new(-5.0, 1.0, 0.0), Vec3::ZERO, START, END, 0.5));
        assert!(!ray_capsule_intersect(Vec3::new(-5.0, 1.0, 0.0), Vec3::X, START, END, 0.0));
        // 退化为球体
        assert!(ray_capsule_intersect(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, START, START, 0.5));
    }
}
