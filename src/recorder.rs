//! Turning typed-in entry fields into a stored entry.
//!
//! Shared by the `add` subcommand and the dashboard's entry form. This is
//! where the per-run rules live: a run keeps the tier of its first entry and
//! an ended run accepts no further entries.

use anyhow::{bail, Result};
use log::warn;

use crate::data::format::{parse_coins, parse_duration, parse_integer};
use crate::data::{NewEntry, Storage};

/// Raw field values for a new entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDraft {
    pub tier: String,
    pub wave: String,
    pub coins: String,
    pub cells: String,
    pub time: String,
    pub notes: String,
    pub end_of_round: bool,
}

/// Run that new entries go to when none is given: the active run, or a fresh one
pub fn default_run_id(storage: &Storage) -> Result<i64> {
    match storage.get_active_run_id()? {
        Some(id) => Ok(id),
        None => storage.generate_new_run_id(),
    }
}

/// Parse the draft and check it against the run it is added to
pub fn validate(storage: &Storage, run_id: i64, draft: &EntryDraft) -> Result<NewEntry> {
    if storage.get_run_status(run_id)? {
        bail!("Run {run_id} has already ended; start a new run instead");
    }

    let tier = match storage.get_run_tier(run_id)? {
        Some(locked) => {
            if !draft.tier.trim().is_empty() && parse_integer("tier", &draft.tier)? != locked {
                bail!("Run {run_id} is tier {locked}; the tier of a run cannot change");
            }
            locked
        }
        None => {
            if draft.tier.trim().is_empty() {
                bail!("A tier is required for the first entry of a run");
            }
            parse_integer("tier", &draft.tier)?
        }
    };

    let notes = draft.notes.trim();
    Ok(NewEntry {
        run_id,
        tier,
        wave: parse_integer("wave", &draft.wave)?,
        coins: parse_coins(&draft.coins)?,
        cells: parse_integer("cells", &draft.cells)?,
        time_spent: parse_duration(&draft.time)?,
        notes: (!notes.is_empty()).then(|| notes.to_string()),
        end_of_round: draft.end_of_round,
    })
}

/// Validate and store a draft, returning the new entry's id
pub fn submit(storage: &Storage, run_id: i64, draft: &EntryDraft) -> Result<i64> {
    let entry = match validate(storage, run_id, draft) {
        Ok(entry) => entry,
        Err(err) => {
            warn!("event=entry_submit module=recorder status=rejected run_id={run_id} error={err}");
            return Err(err);
        }
    };
    storage.insert_entry(&entry)
}
