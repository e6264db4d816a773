use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{CategoryError, ParseEnumError};
use crate::standing::{classify, GraduationTarget, Standing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Approved and rejected are terminal; pending is the only state a review may leave.
    pub fn is_decision(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError::new("record status", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    pub fn apply(&self, weight: u32) -> i64 {
        match self {
            Self::Positive => i64::from(weight),
            Self::Negative => -i64::from(weight),
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sign {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" | "positif" | "+" => Ok(Self::Positive),
            "negative" | "negatif" | "-" => Ok(Self::Negative),
            _ => Err(ParseEnumError::new("sign", value)),
        }
    }
}

/// A scoring rule activities are filed under.
///
/// The weight is always a magnitude; only `sign` decides the direction. Build
/// categories through [`Category::new`] so a negative weight is refused where the
/// category is defined rather than surfacing during aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    weight: u32,
    pub sign: Sign,
    pub group: String,
    pub is_active: bool,
}

impl Category {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        weight: i64,
        sign: Sign,
        group: impl Into<String>,
    ) -> Result<Self, CategoryError> {
        let name = name.into().trim().to_string();
        let group = group.into().trim().to_string();

        if name.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        if group.is_empty() {
            return Err(CategoryError::EmptyGroup);
        }
        if weight < 0 {
            return Err(CategoryError::NegativeWeight(weight));
        }
        let weight = u32::try_from(weight).map_err(|_| CategoryError::WeightTooLarge(weight))?;

        Ok(Self {
            id,
            name,
            weight,
            sign,
            group,
            is_active: true,
        })
    }

    pub fn retired(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn signed_value(&self) -> i64 {
        self.sign.apply(self.weight)
    }
}

pub fn index_categories(categories: Vec<Category>) -> HashMap<Uuid, Category> {
    categories
        .into_iter()
        .map(|category| (category.id, category))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub category_id: Uuid,
    pub status: RecordStatus,
    pub occurred_on: NaiveDate,
    pub description: String,
    pub reviewer_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: Uuid,
    pub nim: String,
    pub full_name: String,
    pub program: String,
    pub cohort: i32,
}

#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub record_id: Uuid,
    pub nim: String,
    pub student_name: String,
    pub category_name: String,
    pub occurred_on: NaiveDate,
    pub description: String,
    pub submitted_at: DateTime<Utc>,
}

/// Sums over the approved records of one student.
///
/// `total_positive` and `total_negative` hold magnitudes; `total` and every
/// group subtotal are signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointTotals {
    pub total_positive: i64,
    pub total_negative: i64,
    pub total: i64,
    pub groups: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointSummary {
    pub totals: PointTotals,
    pub standing: Standing,
}

impl PointSummary {
    pub fn new(totals: PointTotals, target: GraduationTarget) -> Self {
        let standing = classify(totals.total, target);
        Self { totals, standing }
    }
}
