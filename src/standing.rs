use std::fmt;
use std::num::NonZeroU32;

use crate::error::ConfigError;

pub const VERY_ACTIVE_FLOOR: i64 = 300;
pub const ACTIVE_FLOOR: i64 = 250;
pub const SUFFICIENT_FLOOR: i64 = 150;

pub const DEFAULT_GRADUATION_TARGET: u32 = 300;

/// Point total that counts as 100% graduation readiness for a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraduationTarget(NonZeroU32);

impl GraduationTarget {
    pub fn new(points: u32) -> Result<Self, ConfigError> {
        NonZeroU32::new(points)
            .map(Self)
            .ok_or(ConfigError::ZeroTarget)
    }

    pub fn points(&self) -> u32 {
        self.0.get()
    }
}

impl Default for GraduationTarget {
    fn default() -> Self {
        Self(NonZeroU32::MIN.saturating_add(DEFAULT_GRADUATION_TARGET - 1))
    }
}

impl fmt::Display for GraduationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.points())
    }
}

/// Ordered lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandingTier {
    Passive,
    SufficientlyActive,
    Active,
    VeryActive,
}

impl StandingTier {
    pub const ALL: [StandingTier; 4] = [
        Self::VeryActive,
        Self::Active,
        Self::SufficientlyActive,
        Self::Passive,
    ];

    pub fn for_total(total: i64) -> Self {
        match total {
            t if t >= VERY_ACTIVE_FLOOR => Self::VeryActive,
            t if t >= ACTIVE_FLOOR => Self::Active,
            t if t >= SUFFICIENT_FLOOR => Self::SufficientlyActive,
            _ => Self::Passive,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryActive => "Very Active",
            Self::Active => "Active",
            Self::SufficientlyActive => "Sufficiently Active",
            Self::Passive => "Passive",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::VeryActive => "green",
            Self::Active => "blue",
            Self::SufficientlyActive => "yellow",
            Self::Passive => "red",
        }
    }
}

impl fmt::Display for StandingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub tier: StandingTier,
    pub progress_percentage: u8,
}

impl Standing {
    pub fn label(&self) -> &'static str {
        self.tier.label()
    }
}

/// Tier breakpoints are absolute point values; only the percentage depends on `target`.
pub fn classify(total: i64, target: GraduationTarget) -> Standing {
    Standing {
        tier: StandingTier::for_total(total),
        progress_percentage: progress_percentage(total, target),
    }
}

/// `round(total / target * 100)` clamped to 0..=100, rounding halves up.
pub fn progress_percentage(total: i64, target: GraduationTarget) -> u8 {
    if total <= 0 {
        return 0;
    }

    let target = i64::from(target.points());
    let scaled = total.saturating_mul(100).saturating_add(target / 2) / target;
    scaled.min(100) as u8
}
