//! Sort, filter and search semantics of the interactive report view
//!
//! The HTML report ships a script that behaves exactly like these functions;
//! the tier of every row is computed here and embedded, so the browser never
//! re-derives the thresholds.

use gpumon_shared::utils::{GIB, MIB};
use gpumon_shared::UnitRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Lower bound of the medium tier, in bytes
pub const MEDIUM_TIER_MIN: u64 = 500 * MIB;

/// Lower bound of the high tier, in bytes
pub const HIGH_TIER_MIN: u64 = GIB;

/// Sortable column of the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Status,
    PeakAllocated,
    Duration,
    MemoryIncrease,
    PeakReserved,
    InitialAllocated,
}

impl Column {
    /// Columns in display order
    pub const ALL: [Column; 7] = [
        Column::Id,
        Column::Status,
        Column::PeakAllocated,
        Column::Duration,
        Column::MemoryIncrease,
        Column::PeakReserved,
        Column::InitialAllocated,
    ];

    /// Field name of the column in the embedded row data
    pub fn key(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Status => "status",
            Column::PeakAllocated => "peak_allocated",
            Column::Duration => "duration_seconds",
            Column::MemoryIncrease => "memory_increase",
            Column::PeakReserved => "peak_reserved",
            Column::InitialAllocated => "initial_allocated",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Column::Id => "Test Name",
            Column::Status => "Status",
            Column::PeakAllocated => "Peak Allocated (MiB)",
            Column::Duration => "Duration (s)",
            Column::MemoryIncrease => "Memory Increase (MiB)",
            Column::PeakReserved => "Peak Reserved (MiB)",
            Column::InitialAllocated => "Initial Allocated (MiB)",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Column::Id | Column::Status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    /// Short name used by the embedded script
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub column: Column,
    pub direction: SortDirection,
}

impl SortState {
    /// State after clicking `column`: a new column sorts ascending, the
    /// current column flips direction.
    pub fn toggled(current: Option<SortState>, column: Column) -> SortState {
        match current {
            Some(state) if state.column == column => SortState {
                column,
                direction: state.direction.reversed(),
            },
            _ => SortState {
                column,
                direction: SortDirection::Ascending,
            },
        }
    }
}

/// Peak-memory bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// `peak >= 1 GiB`
    High,
    /// `500 MiB <= peak < 1 GiB`
    Medium,
    /// `peak < 500 MiB`
    Low,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::High, Tier::Medium, Tier::Low];

    pub fn of(peak_allocated: u64) -> Tier {
        if peak_allocated >= HIGH_TIER_MIN {
            Tier::High
        } else if peak_allocated >= MEDIUM_TIER_MIN {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    pub fn contains(&self, peak_allocated: u64) -> bool {
        Tier::of(peak_allocated) == *self
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::High => "High Memory (\u{2265} 1 GiB)",
            Tier::Medium => "Medium (500 MiB \u{2013} 1 GiB)",
            Tier::Low => "Low (< 500 MiB)",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierFilter {
    #[default]
    All,
    Only(Tier),
}

impl TierFilter {
    pub fn matches(&self, record: &UnitRecord) -> bool {
        match self {
            TierFilter::All => true,
            TierFilter::Only(tier) => tier.contains(record.peak_allocated),
        }
    }
}

/// Case-insensitive substring match over the record id. An empty query
/// matches everything.
pub fn matches_search(record: &UnitRecord, query: &str) -> bool {
    query.is_empty() || record.id.to_lowercase().contains(&query.to_lowercase())
}

/// Ascending comparison of two records on `column`
pub fn compare(a: &UnitRecord, b: &UnitRecord, column: Column) -> Ordering {
    match column {
        Column::Id => a.id.cmp(&b.id),
        Column::Status => a.status.as_str().cmp(b.status.as_str()),
        Column::PeakAllocated => a.peak_allocated.cmp(&b.peak_allocated),
        Column::Duration => a.duration_seconds.total_cmp(&b.duration_seconds),
        Column::MemoryIncrease => a.memory_increase.cmp(&b.memory_increase),
        Column::PeakReserved => a.peak_reserved.cmp(&b.peak_reserved),
        Column::InitialAllocated => a.initial_allocated.cmp(&b.initial_allocated),
    }
}

/// Sort, tier filter and search query of the view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub sort: Option<SortState>,
    pub filter: TierFilter,
    pub query: String,
}

impl Default for ViewState {
    /// Highest peak first, everything visible
    fn default() -> Self {
        Self {
            sort: Some(SortState {
                column: Column::PeakAllocated,
                direction: SortDirection::Descending,
            }),
            filter: TierFilter::All,
            query: String::new(),
        }
    }
}

impl ViewState {
    /// Click on a column header
    pub fn sort_by(&mut self, column: Column) {
        self.sort = Some(SortState::toggled(self.sort, column));
    }

    pub fn set_filter(&mut self, filter: TierFilter) {
        self.filter = filter;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Indices into `records` of the visible rows, in display order.
    ///
    /// Rows must pass both the tier filter and the search. Equal keys keep
    /// execution order whichever the direction. `records` is not modified.
    pub fn visible(&self, records: &[UnitRecord]) -> Vec<usize> {
        let mut rows: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| self.filter.matches(r) && matches_search(r, &self.query))
            .map(|(i, _)| i)
            .collect();

        if let Some(sort) = self.sort {
            rows.sort_by(|&a, &b| {
                let ord = compare(&records[a], &records[b], sort.column);
                let ord = match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                };
                ord.then(a.cmp(&b))
            });
        }

        rows
    }
}
