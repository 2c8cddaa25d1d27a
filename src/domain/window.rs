use crate::domain::clock::DAY_ROLLOVER_HOUR;
use crate::domain::models::DayInfo;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

/// The "effective today" rolls over at 4 AM: clock times before the
/// boundary still belong to the previous calendar day.
pub fn effective_today(now: DateTime<Utc>) -> NaiveDate {
    let date = now.date_naive();
    if now.hour() < DAY_ROLLOVER_HOUR {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// The next instant at which the effective day changes.
pub fn next_rollover(now: DateTime<Utc>) -> DateTime<Utc> {
    let boundary = now
        .date_naive()
        .and_hms_opt(DAY_ROLLOVER_HOUR, 0, 0)
        .expect("valid fixed time")
        .and_utc();
    if boundary <= now {
        boundary + Duration::days(1)
    } else {
        boundary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Week,
    Day,
}

impl ViewMode {
    fn day_count(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Day => 2,
        }
    }
}

/// The currently visible run of days. Block `day` indices are relative to
/// this window and must be re-derived whenever it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    start: NaiveDate,
    view: ViewMode,
}

impl DayWindow {
    pub fn new(start: NaiveDate, view: ViewMode) -> Self {
        Self { start, view }
    }

    /// Window anchored at the effective today for `now`.
    pub fn for_now(now: DateTime<Utc>, view: ViewMode) -> Self {
        Self::new(effective_today(now), view)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn len(&self) -> u32 {
        self.view.day_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.day_for(date).is_some()
    }

    /// The absolute date behind a view-relative day index.
    pub fn date_for(&self, day: u32) -> Option<NaiveDate> {
        if day >= self.len() {
            return None;
        }
        self.start.checked_add_days(chrono::Days::new(day as u64))
    }

    /// The view-relative day index for an absolute date, if visible.
    pub fn day_for(&self, date: NaiveDate) -> Option<u32> {
        let offset = (date - self.start).num_days();
        if (0..self.len() as i64).contains(&offset) {
            Some(offset as u32)
        } else {
            None
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.len()).filter_map(|day| self.date_for(day))
    }

    /// Header projections for the visible days. Week view shows short
    /// weekday labels; day view labels the two columns Today/Tomorrow.
    pub fn days_info(&self) -> Vec<DayInfo> {
        self.dates()
            .enumerate()
            .map(|(index, date)| {
                let short = match self.view {
                    ViewMode::Week => date.format("%a").to_string().to_uppercase(),
                    ViewMode::Day => {
                        if index == 0 {
                            "Today".to_string()
                        } else {
                            "Tomorrow".to_string()
                        }
                    }
                };
                DayInfo {
                    short,
                    num: date.day(),
                    date,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn effective_today_rolls_back_before_4am() {
        let late_night = fixed_time("2026-03-02T01:30:00Z");
        assert_eq!(
            effective_today(late_night),
            NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
        );
        let morning = fixed_time("2026-03-02T04:00:00Z");
        assert_eq!(
            effective_today(morning),
            NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
        );
    }

    #[test]
    fn next_rollover_is_the_upcoming_4am() {
        let before = fixed_time("2026-03-02T01:30:00Z");
        assert_eq!(next_rollover(before), fixed_time("2026-03-02T04:00:00Z"));
        let after = fixed_time("2026-03-02T10:00:00Z");
        assert_eq!(next_rollover(after), fixed_time("2026-03-03T04:00:00Z"));
        let exactly = fixed_time("2026-03-02T04:00:00Z");
        assert_eq!(next_rollover(exactly), fixed_time("2026-03-03T04:00:00Z"));
    }

    #[test]
    fn week_window_spans_seven_days() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        let window = DayWindow::new(start, ViewMode::Week);
        assert_eq!(window.len(), 7);
        assert!(!window.is_empty());
        assert_eq!(window.date_for(0), Some(start));
        assert_eq!(
            window.date_for(6),
            NaiveDate::from_ymd_opt(2026, 3, 7)
        );
        assert_eq!(window.date_for(7), None);
    }

    #[test]
    fn day_index_roundtrips_through_dates() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        let window = DayWindow::new(start, ViewMode::Week);
        for day in 0..window.len() {
            let date = window.date_for(day).expect("visible date");
            assert_eq!(window.day_for(date), Some(day));
        }
        assert_eq!(window.day_for(start.pred_opt().expect("valid date")), None);
    }

    #[test]
    fn week_labels_are_short_uppercase_weekdays() {
        // 2026-03-01 is a Sunday.
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        let info = DayWindow::new(start, ViewMode::Week).days_info();
        assert_eq!(info.len(), 7);
        assert_eq!(info[0].short, "SUN");
        assert_eq!(info[1].short, "MON");
        assert_eq!(info[0].num, 1);
        assert_eq!(info[6].date, NaiveDate::from_ymd_opt(2026, 3, 7).expect("valid date"));
    }

    #[test]
    fn day_view_labels_today_and_tomorrow() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
        let info = DayWindow::new(start, ViewMode::Day).days_info();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].short, "Today");
        assert_eq!(info[1].short, "Tomorrow");
    }
}
