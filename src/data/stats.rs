//! Derived statistics computed from recorded entries.
//!
//! Rates whose denominator is zero are reported as `None` instead of an
//! infinite or NaN float, and aggregates skip them rather than counting
//! them as zero.

use std::collections::BTreeMap;

use serde::Serialize;

use super::models::RunEntry;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Values that can be derived from a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Coins,
    Cells,
    CoinsPerHour,
    CoinsPerWave,
    CellsPerHour,
    CellsPerWave,
}

impl Metric {
    /// Rates shown in the tier distribution view
    pub const RATES: [Metric; 4] = [
        Metric::CoinsPerHour,
        Metric::CoinsPerWave,
        Metric::CellsPerHour,
        Metric::CellsPerWave,
    ];

    /// Metrics charted over time for a single run
    pub const RUN_SERIES: [Metric; 4] = [
        Metric::Coins,
        Metric::CoinsPerHour,
        Metric::Cells,
        Metric::CellsPerHour,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Coins => "Coins",
            Metric::Cells => "Cells",
            Metric::CoinsPerHour => "Coins/Hour",
            Metric::CoinsPerWave => "Coins/Wave",
            Metric::CellsPerHour => "Cells/Hour",
            Metric::CellsPerWave => "Cells/Wave",
        }
    }

    /// Whether values of this metric are coin amounts (shown with K/M/B)
    pub fn is_coin_amount(self) -> bool {
        matches!(
            self,
            Metric::Coins | Metric::CoinsPerHour | Metric::CoinsPerWave
        )
    }

    /// Value of this metric for an entry, `None` when undefined
    pub fn value(self, entry: &RunEntry) -> Option<f64> {
        let derived = DerivedMetrics::from_entry(entry);
        match self {
            Metric::Coins => Some(entry.coins),
            Metric::Cells => Some(entry.cells as f64),
            Metric::CoinsPerHour => derived.coins_per_hour,
            Metric::CoinsPerWave => derived.coins_per_wave,
            Metric::CellsPerHour => derived.cells_per_hour,
            Metric::CellsPerWave => derived.cells_per_wave,
        }
    }
}

/// Per-hour and per-wave rates for one entry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DerivedMetrics {
    pub coins_per_hour: Option<f64>,
    pub coins_per_wave: Option<f64>,
    pub cells_per_hour: Option<f64>,
    pub cells_per_wave: Option<f64>,
}

impl DerivedMetrics {
    pub fn from_entry(entry: &RunEntry) -> Self {
        let hours = entry.time_spent as f64 / SECONDS_PER_HOUR;
        let waves = entry.wave as f64;
        let cells = entry.cells as f64;
        DerivedMetrics {
            coins_per_hour: rate(entry.coins, hours),
            coins_per_wave: rate(entry.coins, waves),
            cells_per_hour: rate(cells, hours),
            cells_per_wave: rate(cells, waves),
        }
    }
}

fn rate(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator).filter(|v| v.is_finite())
}

/// Averages over every entry recorded at one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummary {
    pub tier: i64,
    pub entries: usize,
    pub avg_wave: f64,
    pub avg_coins_per_hour: Option<f64>,
    pub avg_coins_per_wave: Option<f64>,
    pub avg_cells_per_hour: Option<f64>,
    pub avg_cells_per_wave: Option<f64>,
}

/// Running mean that ignores undefined samples
#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn get(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Default)]
struct TierAccumulator {
    wave: Mean,
    coins_per_hour: Mean,
    coins_per_wave: Mean,
    cells_per_hour: Mean,
    cells_per_wave: Mean,
}

/// Group entries by tier and average their wave and rates, ascending by tier
pub fn summarize_by_tier(entries: &[RunEntry]) -> Vec<TierSummary> {
    let mut groups: BTreeMap<i64, TierAccumulator> = BTreeMap::new();

    for entry in entries {
        let derived = DerivedMetrics::from_entry(entry);
        let acc = groups.entry(entry.tier).or_default();
        acc.wave.push(Some(entry.wave as f64));
        acc.coins_per_hour.push(derived.coins_per_hour);
        acc.coins_per_wave.push(derived.coins_per_wave);
        acc.cells_per_hour.push(derived.cells_per_hour);
        acc.cells_per_wave.push(derived.cells_per_wave);
    }

    groups
        .into_iter()
        .map(|(tier, acc)| TierSummary {
            tier,
            entries: acc.wave.count,
            avg_wave: acc.wave.get().unwrap_or_default(),
            avg_coins_per_hour: acc.coins_per_hour.get(),
            avg_coins_per_wave: acc.coins_per_wave.get(),
            avg_cells_per_hour: acc.cells_per_hour.get(),
            avg_cells_per_wave: acc.cells_per_wave.get(),
        })
        .collect()
}

/// Metric values per tier, ascending by tier, for distribution plots.
///
/// Undefined and non-positive values are left out.
pub fn tier_distributions(entries: &[RunEntry], metric: Metric) -> Vec<(i64, Vec<f64>)> {
    let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for entry in entries {
        let values = groups.entry(entry.tier).or_default();
        if let Some(v) = metric.value(entry).filter(|v| *v > 0.0) {
            values.push(v);
        }
    }
    groups.into_iter().collect()
}

/// Points `(time_spent, value)` of a metric for one run's entries
pub fn run_series(entries: &[RunEntry], metric: Metric) -> Vec<(f64, f64)> {
    entries
        .iter()
        .filter_map(|e| metric.value(e).map(|v| (e.time_spent as f64, v)))
        .collect()
}

/// Five-number summary plus whiskers and outliers for a box-and-whisker plot
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSummary {
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    /// Furthest values still within 1.5 IQR of the quartiles
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxSummary {
    /// Returns `None` for an empty sample
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        let low_fence = q1 - 1.5 * iqr;
        let high_fence = q3 + 1.5 * iqr;

        let (inside, outliers): (Vec<f64>, Vec<f64>) = sorted
            .iter()
            .partition(|v| **v >= low_fence && **v <= high_fence);
        let lower_whisker = inside.first().copied().unwrap_or(q1);
        let upper_whisker = inside.last().copied().unwrap_or(q3);

        Some(BoxSummary {
            count: sorted.len(),
            min: sorted[0],
            q1,
            median,
            q3,
            max: sorted[sorted.len() - 1],
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }
}

/// Linear interpolation between closest ranks; `sorted` must be non-empty
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
