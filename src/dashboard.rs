use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::record::{CalculationRecord, sort_oldest_first};

/// One point of the BMI / weight evolution series
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionPoint {
    pub created_at: DateTime<Utc>,
    pub index: f64,
    pub weight: f64,
}

/// How many records fell in one category
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySlice {
    pub name: String,
    pub count: usize,
    pub average_index: f64,
    /// Share of all records, 0..=100
    pub percentage: f64,
}

/// Everything the dashboard page shows
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_records: usize,
    pub latest_index: Option<f64>,
    pub evolution: Vec<EvolutionPoint>,
    pub categories: Vec<CategorySlice>,
    pub most_frequent: Option<String>,
}

/// Aggregate a user's history into the dashboard summary
///
/// Records may arrive in any order; they are read oldest first. Categories
/// are listed in order of first appearance, and a tie for the most frequent
/// category goes to the one seen first.
pub fn summarize(records: &[CalculationRecord]) -> DashboardSummary {
    let mut ordered = records.to_vec();
    sort_oldest_first(&mut ordered);

    let total = ordered.len();

    // (name, count, index sum)
    let mut groups: Vec<(String, usize, f64)> = Vec::new();
    for record in &ordered {
        match groups.iter_mut().find(|(name, _, _)| *name == record.category) {
            Some(group) => {
                group.1 += 1;
                group.2 += record.index;
            }
            None => groups.push((record.category.clone(), 1, record.index)),
        }
    }

    let categories: Vec<CategorySlice> = groups
        .into_iter()
        .map(|(name, count, sum)| CategorySlice {
            name,
            count,
            average_index: sum / count as f64,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();

    let mut most_frequent: Option<&CategorySlice> = None;
    for slice in &categories {
        if most_frequent.is_none_or(|best| slice.count > best.count) {
            most_frequent = Some(slice);
        }
    }
    let most_frequent = most_frequent.map(|slice| slice.name.clone());

    let evolution = ordered
        .iter()
        .map(|record| EvolutionPoint {
            created_at: record.created_at,
            index: record.index,
            weight: record.weight,
        })
        .collect();

    DashboardSummary {
        total_records: total,
        latest_index: ordered.last().map(|record| record.index),
        evolution,
        categories,
        most_frequent,
    }
}
