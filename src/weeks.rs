//! Week-recurrence decomposition.
//!
//! Each placement item carries a 52-bit mask: bit `i` (1-indexed) set means
//! the item is active in ISO week `i`. A course element may also carry one
//! cancellation mask applied uniformly to every item. The decomposer turns
//! these into the minimal list of contiguous week runs such that every
//! item's active/inactive status is constant within a run.

/// Weeks are numbered 1..=52; bit 0 of a mask is unused.
pub const LAST_WEEK: u8 = 52;

/// A contiguous span of weeks over which the item configuration is constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekRun {
    pub start_week: u8,
    pub end_week: u8,
    /// Per input item, whether it is active during this run.
    pub active: Vec<bool>,
}

impl WeekRun {
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.then_some(i))
    }
}

fn week_bits(masks: &[u64], cancel: Option<u64>, week: u8) -> Vec<bool> {
    if week > LAST_WEEK {
        // The virtual boundary week after week 52: everything inactive, so
        // any run still open gets flushed by the final comparison.
        return vec![false; masks.len()];
    }
    let bit = 1u64 << week;
    let cancelled = cancel.map(|c| c & bit != 0).unwrap_or(false);
    masks
        .iter()
        .map(|m| !cancelled && (m & bit != 0))
        .collect()
}

/// Decomposes the masks into ordered, non-overlapping runs. Runs in which no
/// item is active are never emitted.
pub fn decompose(masks: &[u64], cancel: Option<u64>) -> Vec<WeekRun> {
    let mut runs = Vec::new();
    if masks.is_empty() {
        return runs;
    }
    let mut last = vec![false; masks.len()];
    let mut start_week: u8 = 0;
    for week in 1..=LAST_WEEK + 1 {
        let current = week_bits(masks, cancel, week);
        if current != last {
            if start_week > 0 {
                runs.push(WeekRun {
                    start_week,
                    end_week: week - 1,
                    active: last,
                });
            }
            start_week = if current.iter().any(|b| *b) { week } else { 0 };
            last = current;
        }
    }
    runs
}

/// Builds a mask from 1-indexed week numbers. Out-of-range weeks are
/// dropped.
pub fn mask_from_weeks<I: IntoIterator<Item = u8>>(weeks: I) -> u64 {
    let mut mask = 0u64;
    for w in weeks {
        if (1..=LAST_WEEK).contains(&w) {
            mask |= 1u64 << w;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_weeks_yield_one_run() {
        let runs = decompose(&[mask_from_weeks([2, 3, 4])], None);
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].start_week, runs[0].end_week), (2, 4));
        assert_eq!(runs[0].active, vec![true]);
    }

    #[test]
    fn gap_splits_into_two_runs() {
        let runs = decompose(&[mask_from_weeks([2, 3, 5])], None);
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start_week, runs[0].end_week), (2, 3));
        assert_eq!((runs[1].start_week, runs[1].end_week), (5, 5));
    }

    #[test]
    fn run_reaching_week_52_is_flushed() {
        let runs = decompose(&[mask_from_weeks([51, 52])], None);
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].start_week, runs[0].end_week), (51, 52));
    }

    #[test]
    fn items_with_different_masks_split_on_every_change() {
        // Item 0 active weeks 1..=4; item 1 active weeks 3..=6.
        let runs = decompose(
            &[mask_from_weeks(1..=4), mask_from_weeks(3..=6)],
            None,
        );
        assert_eq!(runs.len(), 3);
        assert_eq!((runs[0].start_week, runs[0].end_week), (1, 2));
        assert_eq!(runs[0].active, vec![true, false]);
        assert_eq!((runs[1].start_week, runs[1].end_week), (3, 4));
        assert_eq!(runs[1].active, vec![true, true]);
        assert_eq!((runs[2].start_week, runs[2].end_week), (5, 6));
        assert_eq!(runs[2].active, vec![false, true]);
    }

    #[test]
    fn cancellation_masks_out_weeks_for_all_items() {
        let runs = decompose(
            &[mask_from_weeks(2..=6), mask_from_weeks(2..=6)],
            Some(mask_from_weeks([4])),
        );
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start_week, runs[0].end_week), (2, 3));
        assert_eq!((runs[1].start_week, runs[1].end_week), (5, 6));
    }

    #[test]
    fn empty_masks_emit_nothing() {
        assert!(decompose(&[0], None).is_empty());
        assert!(decompose(&[], None).is_empty());
        // Cancellation wiping every active week also emits nothing.
        let wiped = decompose(&[mask_from_weeks([7, 8])], Some(mask_from_weeks([7, 8])));
        assert!(wiped.is_empty());
    }

    #[test]
    fn union_of_runs_equals_mask_and_not_cancel() {
        let masks = [mask_from_weeks([2, 3, 4, 9, 10, 52]), mask_from_weeks(3..=11)];
        let cancel = mask_from_weeks([10]);
        let runs = decompose(&masks, Some(cancel));

        // Rebuild per-item week sets from the emitted runs.
        let mut rebuilt = vec![0u64; masks.len()];
        let mut prev_end = 0u8;
        for run in &runs {
            assert!(run.start_week > prev_end, "runs are ordered and disjoint");
            prev_end = run.end_week;
            for (i, active) in run.active.iter().enumerate() {
                if *active {
                    rebuilt[i] |= mask_from_weeks(run.start_week..=run.end_week);
                }
            }
        }
        for (i, mask) in masks.iter().enumerate() {
            assert_eq!(rebuilt[i], mask & !cancel, "item {}", i);
        }
    }
}
