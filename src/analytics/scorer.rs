//! Composite trend scoring
//!
//! Maps one [`MetricSnapshot`] (plus the previous snapshot of the same topic,
//! when there is one) to a comparable score in `[0, 100]`:
//!
//! - **engagement**: `ln(1 + likes + amplification) / ln(1 + cap)`, clamped to 1
//! - **velocity**: relative volume change per hour, squashed with
//!   `0.5 + 0.5 * tanh(rate / saturation)`; 0.5 without a previous snapshot
//!   or when either volume is unreported
//! - **recency**: `0.5 ^ (age_minutes / half_life)`
//!
//! The scorer is pure: the same inputs always produce the same score.

use serde::{Deserialize, Serialize};

use super::error::{TrendError, TrendResult};
use crate::models::MetricSnapshot;

/// Velocity sub-score when there is nothing to compare against
pub const NEUTRAL_VELOCITY: f64 = 0.5;

/// Weights and constants of the scoring formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Engagement count at which the engagement sub-score saturates
    pub engagement_cap: f64,

    /// Hourly relative volume change mapped to ~0.88 velocity
    pub velocity_saturation: f64,

    /// Age at which recency halves
    pub recency_half_life_minutes: f64,

    pub engagement_weight: f64,
    pub velocity_weight: f64,
    pub recency_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            engagement_cap: 10_000.0,
            velocity_saturation: 1.0,
            recency_half_life_minutes: 60.0,
            engagement_weight: 0.5,
            velocity_weight: 0.3,
            recency_weight: 0.2,
        }
    }
}

impl ScoringConfig {
    const WEIGHT_TOLERANCE: f64 = 1e-6;

    /// Check that the constants are positive and the weights sum to 1
    pub fn validate(&self) -> TrendResult<()> {
        let positive = [
            ("engagement_cap", self.engagement_cap),
            ("velocity_saturation", self.velocity_saturation),
            ("recency_half_life_minutes", self.recency_half_life_minutes),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrendError::invalid_config(
                    field,
                    format!("must be a positive number, got {value}"),
                ));
            }
        }

        let weights = [
            ("engagement_weight", self.engagement_weight),
            ("velocity_weight", self.velocity_weight),
            ("recency_weight", self.recency_weight),
        ];
        for (field, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(TrendError::invalid_config(
                    field,
                    format!("must be non-negative, got {value}"),
                ));
            }
        }

        let sum = self.engagement_weight + self.velocity_weight + self.recency_weight;
        if (sum - 1.0).abs() > Self::WEIGHT_TOLERANCE {
            return Err(TrendError::invalid_config(
                "weights",
                format!("must sum to 1.0, got {sum}"),
            ));
        }

        Ok(())
    }
}

/// Sub-scores behind a [`Score`], each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub engagement: f64,
    pub velocity: f64,
    pub recency: f64,
}

/// A scored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Composite score in `[0, 100]`, one decimal
    pub value: f64,

    /// The snapshot the score was derived from
    pub snapshot: MetricSnapshot,

    pub breakdown: ScoreBreakdown,
}

/// Stateless scorer
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    /// Create a scorer, rejecting unusable weights
    pub fn new(config: ScoringConfig) -> TrendResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score `snapshot`, using `previous` for the velocity component
    ///
    /// # Errors
    ///
    /// [`TrendError::InvalidMetric`] when a count is negative, the age is
    /// negative or not finite, the topic id is blank or names another
    /// platform, or `previous` belongs to another topic or is newer than
    /// `snapshot`.
    pub fn score(
        &self,
        snapshot: &MetricSnapshot,
        previous: Option<&MetricSnapshot>,
    ) -> TrendResult<Score> {
        validate_snapshot(snapshot)?;
        if let Some(prev) = previous {
            validate_previous(snapshot, prev)?;
        }

        let breakdown = ScoreBreakdown {
            engagement: engagement_score(snapshot.total_engagement(), self.config.engagement_cap),
            velocity: previous.map_or(NEUTRAL_VELOCITY, |prev| {
                velocity_score(prev, snapshot, self.config.velocity_saturation)
            }),
            recency: recency_score(snapshot.age_minutes, self.config.recency_half_life_minutes),
        };

        let raw = 100.0
            * (self.config.engagement_weight * breakdown.engagement
                + self.config.velocity_weight * breakdown.velocity
                + self.config.recency_weight * breakdown.recency);

        Ok(Score {
            value: round_one_decimal(raw.clamp(0.0, 100.0)),
            snapshot: snapshot.clone(),
            breakdown,
        })
    }
}

/// Log-scaled engagement in `[0, 1]`
pub fn engagement_score(total_engagement: i64, cap: f64) -> f64 {
    let total = total_engagement.max(0) as f64;
    ((1.0 + total).ln() / (1.0 + cap).ln()).clamp(0.0, 1.0)
}

/// Hourly relative volume change squashed into `[0, 1]`
///
/// Elapsed time is clamped to at least one minute and a zero previous volume
/// is treated as one. An unreported volume on either side gives
/// [`NEUTRAL_VELOCITY`]: a missing reading is not a collapse.
pub fn velocity_score(previous: &MetricSnapshot, current: &MetricSnapshot, saturation: f64) -> f64 {
    let (Some(previous_volume), Some(current_volume)) = (previous.volume, current.volume) else {
        return NEUTRAL_VELOCITY;
    };

    let elapsed_minutes = (current.observed_at - previous.observed_at).num_milliseconds() as f64
        / 60_000.0;
    let elapsed_hours = elapsed_minutes.max(1.0) / 60.0;

    let base = previous_volume.max(1) as f64;
    let relative_change = (current_volume - previous_volume) as f64 / base;
    let rate = relative_change / elapsed_hours;

    (0.5 + 0.5 * (rate / saturation).tanh()).clamp(0.0, 1.0)
}

/// Exponential decay by age
pub fn recency_score(age_minutes: f64, half_life_minutes: f64) -> f64 {
    0.5_f64.powf(age_minutes / half_life_minutes).clamp(0.0, 1.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn validate_snapshot(snapshot: &MetricSnapshot) -> TrendResult<()> {
    if snapshot.topic_id.is_blank() {
        return Err(TrendError::invalid_metric("topic_id", "topic name is empty"));
    }

    match snapshot.topic_id.platform() {
        Some(platform) if platform == snapshot.platform => {}
        other => {
            return Err(TrendError::invalid_metric(
                "platform",
                format!(
                    "topic id {} does not belong to {} (id platform: {:?})",
                    snapshot.topic_id, snapshot.platform, other
                ),
            ));
        }
    }

    let counts = [
        ("volume", snapshot.volume.unwrap_or(0)),
        ("positive_engagement", snapshot.positive_engagement),
        ("amplification", snapshot.amplification),
    ];
    for (field, value) in counts {
        if value < 0 {
            return Err(TrendError::invalid_metric(
                field,
                format!("must be >= 0, got {value}"),
            ));
        }
    }

    if !snapshot.age_minutes.is_finite() || snapshot.age_minutes < 0.0 {
        return Err(TrendError::invalid_metric(
            "age_minutes",
            format!("must be finite and >= 0, got {}", snapshot.age_minutes),
        ));
    }

    Ok(())
}

fn validate_previous(current: &MetricSnapshot, previous: &MetricSnapshot) -> TrendResult<()> {
    if previous.topic_id != current.topic_id {
        return Err(TrendError::invalid_metric(
            "previous.topic_id",
            format!(
                "previous snapshot is for {}, not {}",
                previous.topic_id, current.topic_id
            ),
        ));
    }
    if previous.observed_at > current.observed_at {
        return Err(TrendError::invalid_metric(
            "previous.observed_at",
            format!(
                "previous snapshot ({}) is newer than current ({})",
                previous.observed_at, current.observed_at
            ),
        ));
    }
    if let Some(volume) = previous.volume.filter(|v| *v < 0) {
        return Err(TrendError::invalid_metric(
            "previous.volume",
            format!("must be >= 0, got {volume}"),
        ));
    }
    Ok(())
}
