use serde::{Deserialize, Serialize};

/// The calendar "day" runs from 4 AM to 4 AM rather than midnight to
/// midnight. Times below this hour belong conceptually to the previous
/// visible day.
pub const DAY_ROLLOVER_HOUR: u32 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Pm => "PM",
        }
    }
}

/// 12-hour rendering of a decimal hour: zero-padded `HH:MM` plus AM/PM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDisplay {
    pub time: String,
    pub meridiem: Meridiem,
}

/// Parses `H:MM` / `HH:MM` into decimal hours.
///
/// Without a meridiem the hour is taken as-is (24-hour clock). With a
/// meridiem the hour must be in 1..=12 and is converted (12 AM -> 0,
/// PM adds 12 except for 12 PM). Any other shape, or a minute >= 60,
/// yields `None`.
pub fn parse_clock_time(text: &str, meridiem: Option<Meridiem>) -> Option<f64> {
    let (hour_text, minute_text) = text.split_once(':')?;
    if hour_text.is_empty() || hour_text.len() > 2 || minute_text.len() != 2 {
        return None;
    }
    if !all_ascii_digits(hour_text) || !all_ascii_digits(minute_text) {
        return None;
    }

    let mut hours: u32 = hour_text.parse().ok()?;
    let minutes: u32 = minute_text.parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    if let Some(meridiem) = meridiem {
        if !(1..=12).contains(&hours) {
            return None;
        }
        match meridiem {
            Meridiem::Am => {
                if hours == 12 {
                    hours = 0;
                }
            }
            Meridiem::Pm => {
                if hours != 12 {
                    hours += 12;
                }
            }
        }
    }

    Some(hours as f64 + minutes as f64 / 60.0)
}

/// Day-boundary rule for end times: a parsed end time below the 4 AM
/// boundary is pushed past the current day's rows, so "11 PM to 1 AM"
/// becomes start=23, end=25 instead of wrapping to 1.
pub fn extend_past_midnight(decimal: f64) -> f64 {
    if decimal < DAY_ROLLOVER_HOUR as f64 {
        decimal + 24.0
    } else {
        decimal
    }
}

/// 24-hour `HH:MM` rendering. The hour component is taken mod 24,
/// independent of any day-boundary adjustment.
pub fn to_clock_time(decimal: f64) -> String {
    let (hour, minute) = split_decimal(decimal);
    format!("{hour:02}:{minute:02}")
}

/// 12-hour rendering with AM/PM, handling the 0 -> 12 and > 12 cases.
pub fn to_12_hour(decimal: f64) -> ClockDisplay {
    let (h24, minute) = split_decimal(decimal);
    let meridiem = if h24 >= 12 { Meridiem::Pm } else { Meridiem::Am };
    let mut hour12 = h24 % 12;
    if hour12 == 0 {
        hour12 = 12;
    }
    ClockDisplay {
        time: format!("{hour12:02}:{minute:02}"),
        meridiem,
    }
}

/// Short grid label for a whole hour, e.g. "9 AM", "12 PM".
pub fn format_hour(hour: i64) -> String {
    let h24 = hour.rem_euclid(24);
    match h24 {
        0 => "12 AM".to_string(),
        12 => "12 PM".to_string(),
        h if h > 12 => format!("{} PM", h - 12),
        h => format!("{h} AM"),
    }
}

/// Splits a decimal-hour difference into whole hours and minutes.
pub fn duration_parts(start: f64, end: f64) -> (i64, u32) {
    let diff = end - start;
    let hours = diff.floor() as i64;
    let minutes = ((diff - diff.floor()) * 60.0).round() as u32;
    if minutes == 60 {
        (hours + 1, 0)
    } else {
        (hours, minutes)
    }
}

// Minute derivation is round(fraction * 60), which can land on 60 at the
// boundary; the carry into the hour happens here so every rendered string
// is already normalized.
fn split_decimal(decimal: f64) -> (u32, u32) {
    let mut hour = (decimal.floor() as i64).rem_euclid(24) as u32;
    let mut minute = ((decimal - decimal.floor()) * 60.0).round() as u32;
    if minute >= 60 {
        minute -= 60;
        hour = (hour + 1) % 24;
    }
    (hour, minute)
}

fn all_ascii_digits(text: &str) -> bool {
    text.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_24_hour_text() {
        assert_eq!(parse_clock_time("09:30", None), Some(9.5));
        assert_eq!(parse_clock_time("9:30", None), Some(9.5));
        assert_eq!(parse_clock_time("23:00", None), Some(23.0));
        assert_eq!(parse_clock_time("00:00", None), Some(0.0));
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!(parse_clock_time("930", None), None);
        assert_eq!(parse_clock_time("9:3", None), None);
        assert_eq!(parse_clock_time("9:300", None), None);
        assert_eq!(parse_clock_time("abc", None), None);
        assert_eq!(parse_clock_time("9:60", None), None);
        assert_eq!(parse_clock_time(":30", None), None);
        assert_eq!(parse_clock_time("9.5:00", None), None);
    }

    #[test]
    fn meridiem_converts_and_bounds_the_hour() {
        assert_eq!(parse_clock_time("09:00", Some(Meridiem::Am)), Some(9.0));
        assert_eq!(parse_clock_time("09:00", Some(Meridiem::Pm)), Some(21.0));
        assert_eq!(parse_clock_time("12:00", Some(Meridiem::Am)), Some(0.0));
        assert_eq!(parse_clock_time("12:00", Some(Meridiem::Pm)), Some(12.0));
        // Hour out of 1..=12 for a meridiem-qualified string.
        assert_eq!(parse_clock_time("13:00", Some(Meridiem::Am)), None);
        assert_eq!(parse_clock_time("00:30", Some(Meridiem::Pm)), None);
    }

    #[test]
    fn end_times_before_boundary_are_pushed_past_midnight() {
        assert_eq!(extend_past_midnight(1.0), 25.0);
        assert_eq!(extend_past_midnight(3.5), 27.5);
        assert_eq!(extend_past_midnight(4.0), 4.0);
        assert_eq!(extend_past_midnight(23.0), 23.0);
    }

    #[test]
    fn eleven_pm_to_one_am_stays_unwrapped() {
        let start = parse_clock_time("11:00", Some(Meridiem::Pm)).expect("valid start");
        let end = extend_past_midnight(parse_clock_time("01:00", Some(Meridiem::Am)).expect("valid end"));
        assert_eq!(start, 23.0);
        assert_eq!(end, 25.0);
    }

    #[test]
    fn clock_time_renders_mod_24() {
        assert_eq!(to_clock_time(9.5), "09:30");
        assert_eq!(to_clock_time(25.0), "01:00");
        assert_eq!(to_clock_time(0.0), "00:00");
        assert_eq!(to_clock_time(23.75), "23:45");
    }

    #[test]
    fn twelve_hour_rendering_handles_noon_and_midnight() {
        let midnight = to_12_hour(0.0);
        assert_eq!(midnight.time, "12:00");
        assert_eq!(midnight.meridiem, Meridiem::Am);

        let noon = to_12_hour(12.0);
        assert_eq!(noon.time, "12:00");
        assert_eq!(noon.meridiem, Meridiem::Pm);

        let evening = to_12_hour(21.5);
        assert_eq!(evening.time, "09:30");
        assert_eq!(evening.meridiem, Meridiem::Pm);
    }

    #[test]
    fn hour_labels() {
        assert_eq!(format_hour(0), "12 AM");
        assert_eq!(format_hour(9), "9 AM");
        assert_eq!(format_hour(12), "12 PM");
        assert_eq!(format_hour(15), "3 PM");
        assert_eq!(format_hour(25), "1 AM");
    }

    #[test]
    fn duration_parts_splits_hours_and_minutes() {
        assert_eq!(duration_parts(9.0, 10.5), (1, 30));
        assert_eq!(duration_parts(23.0, 25.0), (2, 0));
        assert_eq!(duration_parts(9.0, 9.5), (0, 30));
    }

    proptest! {
        // Parsing a valid meridiem-qualified string and rendering it back
        // reproduces the same text and meridiem.
        #[test]
        fn twelve_hour_roundtrip(hour in 1u32..=12u32, minute in 0u32..60u32, pm in any::<bool>()) {
            let meridiem = if pm { Meridiem::Pm } else { Meridiem::Am };
            let text = format!("{hour:02}:{minute:02}");
            let decimal = parse_clock_time(&text, Some(meridiem)).expect("valid clock text");
            let display = to_12_hour(decimal);
            prop_assert_eq!(display.time, text);
            prop_assert_eq!(display.meridiem, meridiem);
        }

        // 24-hour parse/render roundtrip over the plain 0..24 range.
        #[test]
        fn clock_time_roundtrip(hour in 0u32..24u32, minute in 0u32..60u32) {
            let text = format!("{hour:02}:{minute:02}");
            let decimal = parse_clock_time(&text, None).expect("valid clock text");
            prop_assert_eq!(to_clock_time(decimal), text);
        }
    }
}
