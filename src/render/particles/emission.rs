//! 发射调度
//!
//! 根据播放时间、发射速率和爆发配置计算本帧要创建的粒子数，以及每个粒子的帧内时间偏移。
//! 爆发的运行时状态与只读配置分离，循环重启时显式重置。

use rand::Rng;

use super::modules::{EmissionModule, MainModule};

/// 速率比较与取整的容差，吸收 `f32` 时钟在 `1/rate` 整数倍处的累积误差
pub const EMISSION_EPSILON: f32 = 1e-4;

/// 单个爆发的运行时状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstState {
    pub emit_count: i32,
    /// 上次触发时刻；`< 0` 表示尚未触发
    pub emit_time: f32,
}

impl Default for BurstState {
    fn default() -> Self {
        Self {
            emit_count: 0,
            emit_time: -1.0,
        }
    }
}

/// 发射器的运行时时钟
#[derive(Debug, Clone)]
pub struct EmissionState {
    /// 当前循环内的播放时间（已乘模拟速度）
    pub time: f32,
    /// 当前循环的开始时刻
    pub time_start: f32,
    pub start_delay: f32,
    /// 速率发射时钟，已发射的速率粒子覆盖到此刻；`< 0` 表示从未发射
    ///
    /// 每次按发射数量整数倍的间隔推进，不足一个间隔的余量留到下一帧。
    pub time_emit: f32,
    /// 发射速率曲线的系统级混合因子
    pub rate_lerp: f32,
    pub bursts: Vec<BurstState>,
}

impl Default for EmissionState {
    fn default() -> Self {
        Self {
            time: 0.0,
            time_start: 0.0,
            start_delay: 0.0,
            time_emit: -1.0,
            rate_lerp: -1.0,
            bursts: Vec::new(),
        }
    }
}

impl EmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动时钟；播放从 `now + start_delay` 开始
    pub fn start(&mut self, now: f32, start_delay: f32) {
        self.start_delay = start_delay;
        self.time_start = now + start_delay;
        self.time = 0.0;
    }

    /// 重置所有爆发状态
    pub fn reset_bursts(&mut self) {
        self.bursts.iter_mut().for_each(|b| *b = BurstState::default());
    }

    /// 回到未发射状态，保留开始时刻
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.time_emit = -1.0;
        self.reset_bursts();
    }

    /// 把速率发射时钟对齐到 `now`
    #[inline]
    pub fn mark_emitted(&mut self, now: f32) {
        self.time_emit = now;
    }

    /// 推进播放时钟，返回本帧是否允许发射
    ///
    /// 播放结束且循环时，时钟和爆发状态在此处重置。
    pub fn check_time(&mut self, main: &MainModule, now: f32) -> bool {
        if now < self.time_start || main.duration <= 0.0 {
            return false;
        }

        let play_time = (now - self.time_start) * main.simulation_speed;
        if play_time < main.duration {
            self.time = play_time;
            true
        } else if main.looping {
            self.time = 0.0;
            self.time_start = now;
            self.reset_bursts();
            tracing::debug!(target: "particles", now, "Particle system loop restarted");
            true
        } else {
            false
        }
    }

    /// 计算本帧的发射请求，把每个粒子的时间偏移写入 `offsets`
    ///
    /// 爆发粒子排在前面（偏移为 0），其后是按速率发射的粒子。
    /// 请求总数不超过 `capacity`；超出部分直接丢弃，爆发周期和速率时钟照常推进。
    pub fn schedule<R: Rng + ?Sized>(
        &mut self,
        emission: &EmissionModule,
        main: &MainModule,
        now: f32,
        capacity: usize,
        rng: &mut R,
        offsets: &mut Vec<f32>,
    ) {
        offsets.clear();

        if !emission.enabled || !self.check_time(main, now) {
            return;
        }

        let rate = emission
            .rate_over_time
            .evaluate_cached(self.time, &mut self.rate_lerp, rng);

        if self.bursts.len() != emission.bursts.len() {
            self.bursts.resize(emission.bursts.len(), BurstState::default());
        }

        for (index, (burst, state)) in emission.bursts.iter().zip(self.bursts.iter_mut()).enumerate() {
            if self.time < burst.time {
                continue;
            }
            if burst.cycle_count > 0 && state.emit_count >= burst.cycle_count {
                continue;
            }
            if state.emit_time >= 0.0 && now - state.emit_time < burst.repeat_interval {
                continue;
            }

            state.emit_time = now;
            state.emit_count += 1;

            let low = burst.min_count.min(burst.max_count);
            let high = burst.min_count.max(burst.max_count);
            let count = rng.gen_range(low..=high) as usize;
            let accepted = count.min(capacity.saturating_sub(offsets.len()));
            offsets.resize(offsets.len() + accepted, 0.0);

            tracing::debug!(
                target: "particles",
                burst = index,
                cycle = state.emit_count,
                count,
                accepted,
                "Burst fired"
            );
        }

        if rate > 0.0 {
            let room = capacity.saturating_sub(offsets.len());
            if self.time_emit < 0.0 {
                self.mark_emitted(now);
                if room > 0 {
                    offsets.push(0.0);
                }
            } else {
                let delta = now - self.time_emit;
                let rate = rate * main.simulation_speed;
                let expected = delta * rate;
                if expected >= 1.0 - EMISSION_EPSILON {
                    let count = (expected + EMISSION_EPSILON).floor() as usize;
                    // 时钟只推进已发射数量对应的时长，小数余量累积到后续帧
                    self.time_emit += count as f32 / rate;
                    let accepted = count.min(room);
                    offsets.extend((0..accepted).map(|i| i as f32 * delta / count as f32));
                    if accepted < count {
                        tracing::trace!(target: "particles", requested = count, accepted, "Emission capped");
                    }
                }
            }
        }

        if !offsets.is_empty() {
            tracing::trace!(target: "particles", requested = offsets.len(), play_time = self.time, "Emission scheduled");
        }
    }
}

/// 受上限约束后可接受的发射数量
#[inline]
pub fn emission_cap(requested: usize, max_particles: usize, live: usize) -> usize {
    requested.min(max_particles.saturating_sub(live))
}
