//! Weighted 0-100 inspection score and its status bands.

use serde::{Deserialize, Serialize};

use super::catalog::{ComponentCatalog, ComponentCategory, ComponentId};
use super::domain::{ComponentRating, RatingSheet};

/// Weighted mean of the star percentages, rounded to the nearest integer.
///
/// Ratings for ids missing from the catalog are skipped. Returns 0 when
/// nothing contributes weight.
pub fn score<'a>(
    catalog: &ComponentCatalog,
    ratings: impl IntoIterator<Item = &'a ComponentRating>,
) -> u8 {
    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;

    for rating in ratings {
        let Some(definition) = catalog.get(&rating.component) else {
            continue;
        };
        weighted_sum += f64::from(rating.rating.percentage()) * definition.weight;
        total_weight += definition.weight;
    }

    if total_weight == 0.0 {
        return 0;
    }

    (weighted_sum / total_weight).round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

/// Lower bounds, checked top-down; the first match wins.
const STATUS_THRESHOLDS: [(u8, ScoreStatus); 5] = [
    (85, ScoreStatus::Excellent),
    (70, ScoreStatus::Good),
    (50, ScoreStatus::Fair),
    (30, ScoreStatus::Poor),
    (0, ScoreStatus::Critical),
];

impl ScoreStatus {
    pub fn classify(score: u8) -> Self {
        STATUS_THRESHOLDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, status)| *status)
            .unwrap_or(ScoreStatus::Critical)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Critical => "Critical",
        }
    }

    pub const fn color_tag(self) -> &'static str {
        match self {
            Self::Excellent => "green",
            Self::Good => "teal",
            Self::Fair => "amber",
            Self::Poor => "orange",
            Self::Critical => "red",
        }
    }

    pub const fn emoji_tag(self) -> &'static str {
        match self {
            Self::Excellent => "🌟",
            Self::Good => "👍",
            Self::Fair => "😐",
            Self::Poor => "👎",
            Self::Critical => "🚨",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub category: ComponentCategory,
    pub label: &'static str,
    pub rated: usize,
    pub total: usize,
    /// `None` until at least one component in the category is rated.
    pub score: Option<u8>,
}

/// Live summary of a ratings sheet, recomputed after every edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub score: u8,
    pub status: ScoreStatus,
    pub status_label: &'static str,
    pub color_tag: &'static str,
    pub emoji_tag: &'static str,
    pub rated: usize,
    pub total: usize,
    pub missing_required: Vec<ComponentId>,
    pub categories: Vec<CategoryScore>,
}

impl ScoreCard {
    pub fn from_sheet(catalog: &ComponentCatalog, sheet: &RatingSheet) -> Self {
        let overall = score(catalog, sheet.iter());
        let status = ScoreStatus::classify(overall);

        let categories = ComponentCategory::ordered()
            .into_iter()
            .map(|category| {
                let members: Vec<&ComponentId> = catalog
                    .in_category(category)
                    .map(|component| &component.id)
                    .collect();
                let rated: Vec<&ComponentRating> = members
                    .iter()
                    .filter_map(|id| sheet.get(id))
                    .collect();
                CategoryScore {
                    category,
                    label: category.label(),
                    rated: rated.len(),
                    total: members.len(),
                    score: (!rated.is_empty()).then(|| score(catalog, rated.iter().copied())),
                }
            })
            .filter(|entry| entry.total > 0)
            .collect();

        Self {
            score: overall,
            status,
            status_label: status.label(),
            color_tag: status.color_tag(),
            emoji_tag: status.emoji_tag(),
            rated: sheet.len(),
            total: catalog.len(),
            missing_required: sheet.missing_required(catalog),
            categories,
        }
    }
}
