//! 曲线与渐变求值
//!
//! 每个粒子每帧都会多次调用这里的函数，因此全部是无分配的纯函数。
//! 随机混合因子（lerp）由调用方提供；`evaluate_cached` 负责粒子级的惰性缓存。

use glam::{Vec3, Vec4};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 未抽取的 lerp 缓存标记
pub const LERP_UNSET: f32 = -1.0;

/// 读取缓存的混合因子；首次使用时抽取并写回
#[inline]
pub fn cached_lerp<R: Rng + ?Sized>(slot: &mut f32, rng: &mut R) -> f32 {
    if *slot < 0.0 {
        *slot = rng.gen::<f32>();
    }
    *slot
}

// ============================================================================
// 动画曲线
// ============================================================================

/// 关键帧（Hermite 切线）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }

    pub fn with_tangents(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }
}

/// 动画曲线
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationCurve {
    /// 关键帧列表（按时间排序）
    pub keys: Vec<Keyframe>,
}

impl AnimationCurve {
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(vec![Keyframe::new(0.0, value), Keyframe::new(1.0, value)])
    }

    /// 两点直线，切线等于斜率
    pub fn linear(time_start: f32, value_start: f32, time_end: f32, value_end: f32) -> Self {
        let span = time_end - time_start;
        let slope = if span.abs() > f32::EPSILON {
            (value_end - value_start) / span
        } else {
            0.0
        };
        Self::new(vec![
            Keyframe::with_tangents(time_start, value_start, slope, slope),
            Keyframe::with_tangents(time_end, value_end, slope, slope),
        ])
    }

    /// 两点平滑曲线，端点切线为零
    pub fn ease_in_out(time_start: f32, value_start: f32, time_end: f32, value_end: f32) -> Self {
        Self::new(vec![
            Keyframe::new(time_start, value_start),
            Keyframe::new(time_end, value_end),
        ])
    }

    /// 添加关键帧并保持排序
    pub fn add_key(&mut self, key: Keyframe) {
        let index = self
            .keys
            .partition_point(|k| k.time.total_cmp(&key.time).is_lt());
        self.keys.insert(index, key);
    }

    /// 评估曲线在指定时间的值
    pub fn evaluate(&self, time: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };

        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        // 第一个时间大于 time 的关键帧；边界已在上面处理
        let upper = self.keys.partition_point(|k| k.time <= time);
        let k0 = &self.keys[upper - 1];
        let k1 = &self.keys[upper];
        hermite(k0, k1, time)
    }
}

#[inline]
fn hermite(k0: &Keyframe, k1: &Keyframe, time: f32) -> f32 {
    let dt = k1.time - k0.time;
    if dt <= f32::EPSILON {
        return k1.value;
    }

    let t = (time - k0.time) / dt;
    let t2 = t * t;
    let t3 = t2 * t;

    let m0 = k0.out_tangent * dt;
    let m1 = k1.in_tangent * dt;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * k0.value + h10 * m0 + h01 * k1.value + h11 * m1
}

// ============================================================================
// MinMaxCurve
// ============================================================================

/// 标量调制曲线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MinMaxCurve {
    Constant {
        value: f32,
    },
    TwoConstants {
        min: f32,
        max: f32,
    },
    Curve {
        curve: AnimationCurve,
        #[serde(default = "one")]
        multiplier: f32,
    },
    TwoCurves {
        min: AnimationCurve,
        max: AnimationCurve,
        #[serde(default = "one")]
        multiplier: f32,
    },
}

fn one() -> f32 {
    1.0
}

impl Default for MinMaxCurve {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl MinMaxCurve {
    pub fn constant(value: f32) -> Self {
        Self::Constant { value }
    }

    pub fn two_constants(min: f32, max: f32) -> Self {
        Self::TwoConstants { min, max }
    }

    pub fn curve(curve: AnimationCurve, multiplier: f32) -> Self {
        Self::Curve { curve, multiplier }
    }

    pub fn two_curves(min: AnimationCurve, max: AnimationCurve, multiplier: f32) -> Self {
        Self::TwoCurves {
            min,
            max,
            multiplier,
        }
    }

    /// 是否需要随机混合因子
    pub fn uses_lerp(&self) -> bool {
        matches!(self, Self::TwoConstants { .. } | Self::TwoCurves { .. })
    }

    pub fn evaluate(&self, time: f32, lerp: f32) -> f32 {
        let time = time.clamp(0.0, 1.0);
        match self {
            Self::Constant { value } => *value,
            Self::TwoConstants { min, max } => lerp_f32(*min, *max, lerp),
            Self::Curve { curve, multiplier } => curve.evaluate(time) * multiplier,
            Self::TwoCurves {
                min,
                max,
                multiplier,
            } => lerp_f32(min.evaluate(time), max.evaluate(time), lerp) * multiplier,
        }
    }

    /// 使用粒子级缓存的混合因子求值；只有随机模式才会消耗随机数
    #[inline]
    pub fn evaluate_cached<R: Rng + ?Sized>(&self, time: f32, slot: &mut f32, rng: &mut R) -> f32 {
        let lerp = if self.uses_lerp() {
            cached_lerp(slot, rng)
        } else {
            0.0
        };
        self.evaluate(time, lerp)
    }

    /// 使用一次性随机数求值（发射时的 start_* 曲线）
    #[inline]
    pub fn evaluate_random<R: Rng + ?Sized>(&self, time: f32, rng: &mut R) -> f32 {
        let lerp = if self.uses_lerp() { rng.gen::<f32>() } else { 0.0 };
        self.evaluate(time, lerp)
    }
}

#[inline]
fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// ============================================================================
// 颜色渐变
// ============================================================================

/// 渐变插值方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientMode {
    #[default]
    Blend,
    Fixed,
}

/// 颜色关键点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientColorKey {
    pub time: f32,
    pub color: Vec3,
}

/// 透明度关键点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientAlphaKey {
    pub time: f32,
    pub alpha: f32,
}

/// 颜色渐变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gradient {
    pub mode: GradientMode,
    /// 颜色关键点（按时间排序）
    pub color_keys: Vec<GradientColorKey>,
    /// 透明度关键点（按时间排序）
    pub alpha_keys: Vec<GradientAlphaKey>,
}

impl Gradient {
    pub fn new(
        mode: GradientMode,
        mut color_keys: Vec<GradientColorKey>,
        mut alpha_keys: Vec<GradientAlphaKey>,
    ) -> Self {
        color_keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        alpha_keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            mode,
            color_keys,
            alpha_keys,
        }
    }

    /// 两端颜色的线性渐变
    pub fn two_point(start: Vec4, end: Vec4) -> Self {
        Self::new(
            GradientMode::Blend,
            vec![
                GradientColorKey {
                    time: 0.0,
                    color: start.truncate(),
                },
                GradientColorKey {
                    time: 1.0,
                    color: end.truncate(),
                },
            ],
            vec![
                GradientAlphaKey {
                    time: 0.0,
                    alpha: start.w,
                },
                GradientAlphaKey {
                    time: 1.0,
                    alpha: end.w,
                },
            ],
        )
    }

    /// 采样颜色
    pub fn evaluate(&self, time: f32) -> Vec4 {
        let rgb = sample_keys(&self.color_keys, self.mode, time, |k| k.time, |k| k.color)
            .unwrap_or(Vec3::ONE);
        let alpha = sample_keys(&self.alpha_keys, self.mode, time, |k| k.time, |k| k.alpha)
            .unwrap_or(1.0);
        rgb.extend(alpha)
    }
}

fn sample_keys<K, V>(
    keys: &[K],
    mode: GradientMode,
    time: f32,
    key_time: impl Fn(&K) -> f32,
    key_value: impl Fn(&K) -> V,
) -> Option<V>
where
    V: Copy + std::ops::Add<Output = V> + std::ops::Sub<Output = V> + std::ops::Mul<f32, Output = V>,
{
    let first = keys.first()?;
    let last = keys.last()?;

    if time <= key_time(first) {
        return Some(key_value(first));
    }
    if time >= key_time(last) {
        return Some(key_value(last));
    }

    // 区间 (k0.time, k1.time]
    let upper = keys.partition_point(|k| key_time(k) < time);
    let k0 = &keys[upper - 1];
    let k1 = &keys[upper];

    match mode {
        GradientMode::Blend => {
            let span = key_time(k1) - key_time(k0);
            let t = if span > f32::EPSILON {
                (time - key_time(k0)) / span
            } else {
                1.0
            };
            let a = key_value(k0);
            let b = key_value(k1);
            Some(a + (b - a) * t)
        }
        GradientMode::Fixed => Some(key_value(k1)),
    }
}

// ============================================================================
// MinMaxGradient
// ============================================================================

/// 颜色调制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MinMaxGradient {
    Color { color: Vec4 },
    Gradient { gradient: Gradient },
    TwoColors { min: Vec4, max: Vec4 },
    TwoGradients { min: Gradient, max: Gradient },
    RandomColor { gradient: Gradient },
}

impl Default for MinMaxGradient {
    fn default() -> Self {
        Self::Color { color: Vec4::ONE }
    }
}

impl MinMaxGradient {
    pub fn color(color: Vec4) -> Self {
        Self::Color { color }
    }

    pub fn gradient(gradient: Gradient) -> Self {
        Self::Gradient { gradient }
    }

    pub fn two_colors(min: Vec4, max: Vec4) -> Self {
        Self::TwoColors { min, max }
    }

    pub fn uses_lerp(&self) -> bool {
        matches!(
            self,
            Self::TwoColors { .. } | Self::TwoGradients { .. } | Self::RandomColor { .. }
        )
    }

    pub fn evaluate(&self, time: f32, lerp: f32) -> Vec4 {
        let time = time.clamp(0.0, 1.0);
        match self {
            Self::Color { color } => *color,
            Self::Gradient { gradient } => gradient.evaluate(time),
            Self::TwoColors { min, max } => min.lerp(*max, lerp),
            Self::TwoGradients { min, max } => min.evaluate(time).lerp(max.evaluate(time), lerp),
            Self::RandomColor { gradient } => gradient.evaluate(lerp),
        }
    }

    #[inline]
    pub fn evaluate_cached<R: Rng + ?Sized>(&self, time: f32, slot: &mut f32, rng: &mut R) -> Vec4 {
        let lerp = if self.uses_lerp() {
            cached_lerp(slot, rng)
        } else {
            0.0
        };
        self.evaluate(time, lerp)
    }

    #[inline]
    pub fn evaluate_random<R: Rng + ?Sized>(&self, time: f32, rng: &mut R) -> Vec4 {
        let lerp = if self.uses_lerp() { rng.gen::<f32>() } else { 0.0 };
        self.evaluate(time, lerp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_animation_curve_linear() {
        let curve = AnimationCurve::linear(0.0, 0.0, 1.0, 2.0);
        assert!(approx(curve.evaluate(0.0), 0.0));
        assert!(approx(curve.evaluate(0.25), 0.5));
        assert!(approx(curve.evaluate(0.5), 1.0));
        assert!(approx(curve.evaluate(1.0), 2.0));
    }

    #[test]
    fn test_animation_curve_clamps_outside_keys() {
        let curve = AnimationCurve::linear(0.2, 1.0, 0.8, 3.0);
        assert!(approx(curve.evaluate(0.0), 1.0));
        assert!(approx(curve.evaluate(1.0), 3.0));
        assert_eq!(AnimationCurve::default().evaluate(0.5), 0.0);
    }

    #[test]
    fn test_animation_curve_ease() {
        let curve = AnimationCurve::ease_in_out(0.0, 0.0, 1.0, 1.0);
        assert!(approx(curve.evaluate(0.5), 0.5));
        // 平滑曲线在起点附近低于直线
        assert!(curve.evaluate(0.1) < 0.1);
    }

    #[test]
    fn test_add_key_keeps_order() {
        let mut curve = AnimationCurve::ease_in_out(0.0, 0.0, 1.0, 1.0);
        curve.add_key(Keyframe::new(0.5, 4.0));
        let times: Vec<f32> = curve.keys.iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        assert!(approx(curve.evaluate(0.5), 4.0));
    }

    #[test]
    fn test_min_max_curve_modes() {
        assert_eq!(MinMaxCurve::constant(3.0).evaluate(0.7, 0.9), 3.0);
        assert!(approx(MinMaxCurve::two_constants(2.0, 4.0).evaluate(0.0, 0.5), 3.0));

        let curve = MinMaxCurve::curve(AnimationCurve::linear(0.0, 0.0, 1.0, 1.0), 10.0);
        assert!(approx(curve.evaluate(0.5, 0.0), 5.0));
        // 时间被钳制到 [0, 1]
        assert!(approx(curve.evaluate(2.0, 0.0), 10.0));

        let two = MinMaxCurve::two_curves(
            AnimationCurve::constant(0.0),
            AnimationCurve::linear(0.0, 0.0, 1.0, 4.0),
            2.0,
        );
        assert!(approx(two.evaluate(0.5, 0.5), 2.0));
    }

    #[test]
    fn test_evaluate_cached_only_draws_for_random_modes() {
        let mut rng = StdRng::seed_from_u64(1);

        let mut slot = LERP_UNSET;
        MinMaxCurve::constant(1.0).evaluate_cached(0.5, &mut slot, &mut rng);
        assert_eq!(slot, LERP_UNSET);

        let curve = MinMaxCurve::two_constants(0.0, 1.0);
        let first = curve.evaluate_cached(0.1, &mut slot, &mut rng);
        assert!(slot >= 0.0);
        let second = curve.evaluate_cached(0.9, &mut slot, &mut rng);
        assert_eq!(first, second);
    }

    #[test]
    fn test_gradient_blend() {
        let gradient = Gradient::two_point(Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 0.0));
        let mid = gradient.evaluate(0.5);
        assert!(approx(mid.x, 0.5));
        assert!(approx(mid.z, 0.5));
        assert!(approx(mid.w, 0.5));
        assert_eq!(gradient.evaluate(-1.0), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_gradient_fixed_uses_upper_key() {
        let mut gradient = Gradient::two_point(Vec4::ONE, Vec4::new(0.0, 0.0, 0.0, 0.5));
        gradient.mode = GradientMode::Fixed;
        let c = gradient.evaluate(0.3);
        assert_eq!(c, Vec4::new(0.0, 0.0, 0.0, 0.5));
    }

    #[test]
    fn test_gradient_without_keys_is_white() {
        assert_eq!(Gradient::default().evaluate(0.4), Vec4::ONE);
    }

    #[test]
    fn test_min_max_gradient_modes() {
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(MinMaxGradient::color(red).evaluate(0.5, 0.5), red);
        let two = MinMaxGradient::two_colors(red, blue).evaluate(0.0, 0.25);
        assert!(approx(two.x, 0.75));
        assert!(approx(two.z, 0.25));

        let random = MinMaxGradient::RandomColor {
            gradient: Gradient::two_point(red, blue),
        };
        // RandomColor 在 lerp 位置采样渐变，与时间无关
        assert_eq!(random.evaluate(0.0, 1.0), random.evaluate(1.0, 1.0));
    }

    #[test]
    fn test_curve_serde_tagging() {
        let curve = MinMaxCurve::two_constants(1.0, 2.0);
        let json = serde_json::to_string(&curve).unwrap();
        assert!(json.contains("\"mode\":\"two_constants\""));
        let parsed: MinMaxCurve = serde_json::from_str(r#"{"mode":"curve","curve":{"keys":[]}}"#).unwrap();
        assert_eq!(parsed, MinMaxCurve::curve(AnimationCurve::default(), 1.0));
    }

    proptest! {
        #[test]
        fn two_constants_stay_in_range(
            a in -100.0f32..100.0,
            b in -100.0f32..100.0,
            time in 0.0f32..1.0,
            lerp in 0.0f32..1.0,
        ) {
            let value = MinMaxCurve::two_constants(a, b).evaluate(time, lerp);
            prop_assert!(value >= a.min(b) - 1e-3);
            prop_assert!(value <= a.max(b) + 1e-3);
        }

        #[test]
        fn linear_curve_is_monotonic(
            v0 in -10.0f32..10.0,
            v1 in -10.0f32..10.0,
            t0 in 0.0f32..1.0,
            t1 in 0.0f32..1.0,
        ) {
            let curve = AnimationCurve::linear(0.0, v0, 1.0, v1);
            let (lo, hi) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            let a = curve.evaluate(lo);
            let b = curve.evaluate(hi);
            if v1 >= v0 {
                prop_assert!(b >= a - 1e-4);
            } else {
                prop_assert!(b <= a + 1e-4);
            }
        }
    }
}
