//! Data models representing recorded run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded snapshot of a run's progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub id: i64,
    pub run_id: i64,
    pub tier: i64,
    pub wave: i64,
    pub coins: f64,
    pub cells: i64,
    /// Seconds elapsed in the run when the snapshot was taken
    pub time_spent: i64,
    pub notes: Option<String>,
    pub end_of_round: bool,
    pub datetime_collected: DateTime<Utc>,
}

/// Values for an entry that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub run_id: i64,
    pub tier: i64,
    pub wave: i64,
    pub coins: f64,
    pub cells: i64,
    pub time_spent: i64,
    pub notes: Option<String>,
    pub end_of_round: bool,
}

impl NewEntry {
    /// Notes as stored: an empty string becomes NULL, anything else is kept verbatim
    pub fn normalized_notes(&self) -> Option<&str> {
        self.notes.as_deref().filter(|n| !n.is_empty())
    }
}

/// Columns of the entries table, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryColumn {
    Id,
    RunId,
    Tier,
    Wave,
    Coins,
    Cells,
    TimeSpent,
    Notes,
    EndOfRound,
    Collected,
}

impl EntryColumn {
    pub const ALL: [EntryColumn; 10] = [
        EntryColumn::Id,
        EntryColumn::RunId,
        EntryColumn::Tier,
        EntryColumn::Wave,
        EntryColumn::Coins,
        EntryColumn::Cells,
        EntryColumn::TimeSpent,
        EntryColumn::Notes,
        EntryColumn::EndOfRound,
        EntryColumn::Collected,
    ];

    pub fn title(self) -> &'static str {
        match self {
            EntryColumn::Id => "ID",
            EntryColumn::RunId => "Run ID",
            EntryColumn::Tier => "Tier",
            EntryColumn::Wave => "Wave",
            EntryColumn::Coins => "Coins",
            EntryColumn::Cells => "Cells",
            EntryColumn::TimeSpent => "Time Spent",
            EntryColumn::Notes => "Notes",
            EntryColumn::EndOfRound => "End of Round",
            EntryColumn::Collected => "Collected",
        }
    }

    /// Column `step` places away, wrapping around in both directions
    pub fn cycle(self, step: isize) -> Self {
        let len = Self::ALL.len() as isize;
        let current = Self::ALL.iter().position(|c| *c == self).unwrap_or(0) as isize;
        Self::ALL[(current + step).rem_euclid(len) as usize]
    }
}

/// Sort entries in place by a column.
///
/// Coins compare numerically, so "1.50M" never sorts before "999.00".
pub fn sort_entries(entries: &mut [RunEntry], column: EntryColumn, descending: bool) {
    entries.sort_by(|a, b| {
        let ord = match column {
            EntryColumn::Id => a.id.cmp(&b.id),
            EntryColumn::RunId => a.run_id.cmp(&b.run_id),
            EntryColumn::Tier => a.tier.cmp(&b.tier),
            EntryColumn::Wave => a.wave.cmp(&b.wave),
            EntryColumn::Coins => a.coins.total_cmp(&b.coins),
            EntryColumn::Cells => a.cells.cmp(&b.cells),
            EntryColumn::TimeSpent => a.time_spent.cmp(&b.time_spent),
            EntryColumn::Notes => a.notes.cmp(&b.notes),
            EntryColumn::EndOfRound => a.end_of_round.cmp(&b.end_of_round),
            EntryColumn::Collected => a.datetime_collected.cmp(&b.datetime_collected),
        };
        // Stable tiebreak keeps rows from jumping around between refreshes
        let ord = ord.then_with(|| a.id.cmp(&b.id));
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, coins: f64, notes: Option<&str>) -> RunEntry {
        RunEntry {
            id,
            run_id: 1,
            tier: 1,
            wave: 1,
            coins,
            cells: 0,
            time_spent: 60,
            notes: notes.map(str::to_string),
            end_of_round: false,
            datetime_collected: Utc::now(),
        }
    }

    #[test]
    fn test_sort_by_coins_is_numeric() {
        let mut entries = vec![
            entry(1, 1_500_000.0, None),
            entry(2, 999.0, None),
            entry(3, 2_300_000_000.0, None),
        ];
        sort_entries(&mut entries, EntryColumn::Coins, false);
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);

        sort_entries(&mut entries, EntryColumn::Coins, true);
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_ties_fall_back_to_id() {
        let mut entries = vec![entry(3, 10.0, None), entry(1, 10.0, None), entry(2, 10.0, None)];
        sort_entries(&mut entries, EntryColumn::Coins, false);
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_column_cycle_wraps() {
        assert_eq!(EntryColumn::Id.cycle(-1), EntryColumn::Collected);
        assert_eq!(EntryColumn::Collected.cycle(1), EntryColumn::Id);
        assert_eq!(EntryColumn::Tier.cycle(2), EntryColumn::Coins);
    }

    #[test]
    fn test_empty_notes_normalize_to_none() {
        let mut new = NewEntry {
            run_id: 1,
            tier: 1,
            wave: 1,
            coins: 0.0,
            cells: 0,
            time_spent: 0,
            notes: Some(String::new()),
            end_of_round: false,
        };
        assert_eq!(new.normalized_notes(), None);
        new.notes = Some(" boss ".to_string());
        assert_eq!(new.normalized_notes(), Some(" boss "));
    }
}
