use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::record::CompletionRecord;
use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub completed: bool,
    /// Covered by the grace token rather than a genuine completion.
    pub streak_saver: bool,
}

/// One month of completion state for a routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthCalendar {
    pub routine_id: String,
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
    pub completed_days: u32,
    pub streak_saver_days: u32,
}

/// First and last date of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let invalid = || ValidationError::InvalidValue {
        field: "month".into(),
        message: format!("{year:04}-{month:02} is not a valid month"),
    };
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next_first.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
    Ok((first, last))
}

impl MonthCalendar {
    /// Build the calendar from completion records; records outside the month are ignored.
    pub fn build(
        routine_id: &str,
        year: i32,
        month: u32,
        records: &[CompletionRecord],
    ) -> Result<Self, ValidationError> {
        let (first, last) = month_bounds(year, month)?;

        let mut days = Vec::with_capacity(last.day() as usize);
        let mut completed_days = 0;
        let mut streak_saver_days = 0;
        for date in first.iter_days().take_while(|d| *d <= last) {
            let record = records
                .iter()
                .find(|r| r.routine_id == routine_id && r.completed_date == date);
            let (completed, streak_saver) = match record {
                Some(r) if r.is_streak_saver => (true, true),
                Some(_) => (true, false),
                None => (false, false),
            };
            if completed {
                completed_days += 1;
            }
            if streak_saver {
                streak_saver_days += 1;
            }
            days.push(CalendarDay {
                date,
                completed,
                streak_saver,
            });
        }

        Ok(Self {
            routine_id: routine_id.to_string(),
            year,
            month,
            days,
            completed_days,
            streak_saver_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_february_has_29_days() {
        let cal = MonthCalendar::build("r", 2024, 2, &[]).unwrap();
        assert_eq!(cal.days.len(), 29);
        assert_eq!(cal.completed_days, 0);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let (first, last) = month_bounds(2023, 12).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn invalid_month_rejected() {
        assert!(month_bounds(2024, 0).is_err());
        assert!(month_bounds(2024, 13).is_err());
    }

    #[test]
    fn marks_genuine_and_saver_days() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let records = vec![
            CompletionRecord::genuine("r", d(10)),
            CompletionRecord::streak_saver("r", d(9)),
            CompletionRecord::genuine("r", d(8)),
            CompletionRecord::genuine("other", d(7)),
            CompletionRecord::genuine("r", NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
        ];
        let cal = MonthCalendar::build("r", 2024, 1, &records).unwrap();
        assert_eq!(cal.days.len(), 31);
        assert_eq!(cal.completed_days, 3);
        assert_eq!(cal.streak_saver_days, 1);
        assert!(cal.days[8].streak_saver);
        assert!(!cal.days[6].completed);
    }
}
