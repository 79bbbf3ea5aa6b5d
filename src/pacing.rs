//! 节奏评分与时长校验

/// 场景分析失败时使用的中性节奏分
pub const NEUTRAL_PACING_SCORE: u32 = 50;

/// 理想节奏区间（秒/场景）
pub const IDEAL_PACING_MIN: f64 = 1.5;
pub const IDEAL_PACING_MAX: f64 = 2.5;

/// 超过该节奏（秒/场景）即按最低分计
pub const SLOW_PACING_LIMIT: f64 = 4.0;

/// 节奏分的下限和上限
pub const PACING_FLOOR: u32 = 40;
pub const PACING_CEILING: u32 = 100;

/// 节奏偏快（低于理想区间）时的得分
pub const FAST_PACING_SCORE: u32 = 80;

/// 有效时长区间（秒）
pub const MIN_VALID_DURATION: f64 = 15.0;
pub const MAX_VALID_DURATION: f64 = 45.0;

/// 节奏分：把平均每场景秒数映射到 [40, 100]
///
/// - `1.5 ≤ rate ≤ 2.5` → 100
/// - `2.5 < rate ≤ 4.0` → 从 100 线性降到 40
/// - `rate > 4.0` → 40
/// - `rate < 1.5` → 80
pub fn pacing_score(rate: f64) -> u32 {
    if (IDEAL_PACING_MIN..=IDEAL_PACING_MAX).contains(&rate) {
        PACING_CEILING
    } else if rate > SLOW_PACING_LIMIT {
        PACING_FLOOR
    } else if rate > IDEAL_PACING_MAX {
        let span = (PACING_CEILING - PACING_FLOOR) as f64;
        let slope = span / (SLOW_PACING_LIMIT - IDEAL_PACING_MAX);
        let score = PACING_CEILING as f64 - slope * (rate - IDEAL_PACING_MAX);
        score.max(PACING_FLOOR as f64) as u32
    } else {
        FAST_PACING_SCORE
    }
}

/// 时长是否在 15-45 秒之间（含边界）
pub fn is_valid_duration(duration_seconds: f64) -> bool {
    (MIN_VALID_DURATION..=MAX_VALID_DURATION).contains(&duration_seconds)
}

/// 保留两位小数
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
