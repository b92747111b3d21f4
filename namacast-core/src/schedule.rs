//! Schedule selection for picking which broadcast to track.

use crate::program::ScheduleEntry;

/// Pick the schedule entry the engine should track.
///
/// Only user-community programs are considered. An entry that is currently
/// open (test segment through scheduled end) wins, taking the first such
/// entry in listing order; otherwise the entry with the earliest test start
/// wins. Returns `None` when no user program is listed.
#[must_use]
pub fn select_program(schedules: &[ScheduleEntry], now: i64) -> Option<&ScheduleEntry> {
    let candidates: Vec<&ScheduleEntry> = schedules
        .iter()
        .filter(|entry| entry.is_user_program())
        .collect();

    if let Some(live) = candidates.iter().copied().find(|entry| entry.is_live_at(now)) {
        return Some(live);
    }

    candidates
        .into_iter()
        .min_by_key(|entry| entry.test_begin_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(program_id: &str, group_id: &str, test_begin_at: i64, end: i64) -> ScheduleEntry {
        ScheduleEntry {
            program_id: program_id.to_string(),
            group_id: group_id.to_string(),
            title: String::new(),
            test_begin_at,
            on_air_begin_at: test_begin_at + 60,
            on_air_end_at: end,
        }
    }

    #[test]
    fn test_empty_listing() {
        assert!(select_program(&[], 100).is_none());
    }

    #[test]
    fn test_ignores_non_user_programs() {
        let schedules = vec![entry("lv1", "ch100", 0, 1000)];
        assert!(select_program(&schedules, 100).is_none());
    }

    #[test]
    fn test_prefers_live_over_earlier_future() {
        let schedules = vec![
            entry("lv_future", "co1", 500, 2000),
            entry("lv_live", "co2", 50, 1000),
        ];
        let selected = select_program(&schedules, 100).unwrap();
        assert_eq!(selected.program_id, "lv_live");
    }

    #[test]
    fn test_live_ties_break_by_listing_order() {
        let schedules = vec![
            entry("lv_a", "co1", 10, 1000),
            entry("lv_b", "co2", 20, 1000),
        ];
        let selected = select_program(&schedules, 100).unwrap();
        assert_eq!(selected.program_id, "lv_a");
    }

    #[test]
    fn test_no_live_picks_earliest_test_begin() {
        let schedules = vec![
            entry("lv_later", "co1", 900, 2000),
            entry("lv_sooner", "co2", 400, 2000),
        ];
        let selected = select_program(&schedules, 100).unwrap();
        assert_eq!(selected.program_id, "lv_sooner");
    }

    #[test]
    fn test_ended_entry_still_selectable_when_nothing_live() {
        // An already-ended listing row is not live, but remains the earliest
        // candidate when no open program exists.
        let schedules = vec![
            entry("lv_done", "co1", 10, 50),
            entry("lv_future", "co2", 800, 2000),
        ];
        let selected = select_program(&schedules, 100).unwrap();
        assert_eq!(selected.program_id, "lv_done");
    }

    #[test]
    fn test_live_user_program_beats_live_channel() {
        let schedules = vec![
            entry("lv_channel", "ch9", 0, 1000),
            entry("lv_user", "co9", 600, 2000),
        ];
        let selected = select_program(&schedules, 100).unwrap();
        assert_eq!(selected.program_id, "lv_user");
    }
}
