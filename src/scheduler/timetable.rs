use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};

/// A single timetable field; `All` is the wildcard that matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    All,
    Value(u8),
}

impl Field {
    fn matches(&self, actual: u32) -> bool {
        match self {
            Field::All => true,
            Field::Value(v) => *v as u32 == actual,
        }
    }
}

/// One timetable row: minute, hour, day-of-month, month, day-of-week
/// (spec.md §4.8 "timetable matcher"), plus the action id to dispatch
/// when all five fields match the wall clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub minute: Field,
    pub hour: Field,
    pub day_of_month: Field,
    pub month: Field,
    pub day_of_week: Field,
    pub action_id: i32,
}

impl TimetableEntry {
    fn matches(&self, now: &DateTime<Local>) -> bool {
        self.minute.matches(now.minute())
            && self.hour.matches(now.hour())
            && self.day_of_month.matches(now.day())
            && self.month.matches(now.month())
            && self.day_of_week.matches(now.weekday().num_days_from_sunday())
    }
}

/// Matches wall-clock time against a timetable list. Runs at 1 Hz while
/// seconds-to-next-minute is non-zero and at 60 Hz once minute-aligned,
/// per spec.md §4.8; this type is the pure match step, the caller owns
/// picking the poll rate.
pub fn matching_actions<'a>(
    entries: &'a [TimetableEntry],
    now: &DateTime<Local>,
) -> impl Iterator<Item = i32> + 'a {
    let now = *now;
    entries.iter().filter(move |e| e.matches(&now)).map(|e| e.action_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn all_wildcard_fields_match_any_time() {
        let entry = TimetableEntry {
            minute: Field::All,
            hour: Field::All,
            day_of_month: Field::All,
            month: Field::All,
            day_of_week: Field::All,
            action_id: 42,
        };
        let now = Local.with_ymd_and_hms(2026, 7, 26, 13, 37, 0).unwrap();
        let matches: Vec<i32> = matching_actions(&[entry], &now).collect();
        assert_eq!(matches, vec![42]);
    }

    #[test]
    fn non_matching_minute_excludes_entry() {
        let entry = TimetableEntry {
            minute: Field::Value(0),
            hour: Field::All,
            day_of_month: Field::All,
            month: Field::All,
            day_of_week: Field::All,
            action_id: 1,
        };
        let now = Local.with_ymd_and_hms(2026, 7, 26, 13, 37, 0).unwrap();
        assert!(matching_actions(&[entry], &now).next().is_none());
    }
}
