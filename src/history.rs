//! History table projection
//!
//! Turns the full list of fetched calculations into the rows of one page of
//! the history table: date-range filter, then optional column sort, then
//! pagination. Nothing here mutates the input list.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::record::CalculationRecord;

/// Rows per history page
pub const PAGE_SIZE: usize = 10;

/// Inclusive calendar-date range applied to `created_at`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FilterSpec {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    fn contains(&self, date: NaiveDate) -> bool {
        let after_start = self.from.is_none_or(|from| date >= from);
        let before_end = self.to.is_none_or(|to| date <= to);
        after_start && before_end
    }
}

/// Column the history table can be ordered by
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Weight,
    Height,
    Index,
}

impl SortKey {
    fn value(self, record: &CalculationRecord) -> f64 {
        match self {
            SortKey::Weight => record.weight,
            SortKey::Height => record.height,
            SortKey::Index => record.index,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "weight" | "peso" => Some(SortKey::Weight),
            "height" | "altura" => Some(SortKey::Height),
            "index" | "imc" | "resultado" => Some(SortKey::Index),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

/// Active column sort; no key keeps the supplied order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn by(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }

    /// Apply a click on a column header
    ///
    /// Clicking the active column while it is descending switches it to
    /// ascending; every other click sorts the clicked column descending.
    pub fn select(self, key: SortKey) -> Self {
        let direction = if self.key == Some(key) && self.direction == SortDirection::Descending {
            SortDirection::Ascending
        } else {
            SortDirection::Descending
        };
        Self::by(key, direction)
    }
}

/// Which page of the table is shown
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page_size: usize,

    /// 1-based
    pub current_page: usize,
}

impl PageWindow {
    pub fn new(current_page: usize) -> Self {
        Self {
            page_size: PAGE_SIZE,
            current_page,
        }
    }

    fn offset(&self) -> usize {
        self.current_page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(1)
    }
}

/// The rows of one page plus what the pager needs
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    /// Records on the requested page, in display order
    #[serde(rename = "rows")]
    pub visible: Vec<CalculationRecord>,

    /// Page count as displayed: never below 1, even with no records
    pub total_pages: usize,

    /// Real number of pages (0 when nothing survives the filter)
    pub page_count: usize,

    /// Records left after filtering
    pub filtered_count: usize,

    pub current_page: usize,
}

impl Projection {
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_count > 0 && self.current_page < self.page_count
    }
}

/// Derives history pages with dates read in a fixed reference zone
///
/// Timestamps are converted to the reference zone before their calendar date
/// is compared with the filter, so a record's own offset never moves it
/// across a day boundary.
#[derive(Clone, Copy, Debug)]
pub struct HistoryProjector {
    reference_offset: FixedOffset,
}

impl Default for HistoryProjector {
    fn default() -> Self {
        Self {
            reference_offset: Utc.fix(),
        }
    }
}

impl HistoryProjector {
    pub fn new(reference_offset: FixedOffset) -> Self {
        Self { reference_offset }
    }

    pub fn reference_offset(&self) -> FixedOffset {
        self.reference_offset
    }

    /// Calendar date of a record in the reference zone
    pub fn record_date(&self, record: &CalculationRecord) -> NaiveDate {
        record
            .created_at
            .with_timezone(&self.reference_offset)
            .date_naive()
    }

    /// Filter, sort and paginate `records`
    ///
    /// Sorting is stable, so records with equal values keep their relative
    /// order. A page past the end yields no rows; clamping the page number is
    /// left to the caller.
    pub fn project(
        &self,
        records: &[CalculationRecord],
        filter: &FilterSpec,
        sort: &SortSpec,
        page: &PageWindow,
    ) -> Projection {
        let mut rows: Vec<&CalculationRecord> = if filter.is_empty() {
            records.iter().collect()
        } else {
            records
                .iter()
                .filter(|record| filter.contains(self.record_date(record)))
                .collect()
        };

        if let Some(key) = sort.key {
            rows.sort_by(|a, b| {
                let ordering = key.value(a).total_cmp(&key.value(b));
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let filtered_count = rows.len();
        let page_count = filtered_count.div_ceil(page.page_size.max(1));

        let visible = rows
            .into_iter()
            .skip(page.offset())
            .take(page.page_size)
            .cloned()
            .collect();

        Projection {
            visible,
            total_pages: page_count.max(1),
            page_count,
            filtered_count,
            current_page: page.current_page.max(1),
        }
    }
}

/// [`HistoryProjector::project`] with UTC as the reference zone
pub fn project(
    records: &[CalculationRecord],
    filter: &FilterSpec,
    sort: &SortSpec,
    page: &PageWindow,
) -> Projection {
    HistoryProjector::default().project(records, filter, sort, page)
}
