//! Calendar week helpers for the agenda view. Weeks always start on Monday,
//! whatever the locale; the locale only affects labels.

use chrono::{
    Datelike, Days, Local, Locale, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday,
};
use serde::Serialize;

/// One day of a rendered week.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WeekDay {
    pub date: NaiveDate,
    pub key: String,
    pub day_number: u32,
    pub label: String,
    pub is_weekend: bool,
}

/// Canonical `YYYY-MM-DD` key built from the calendar fields of `date`.
pub fn to_date_key<D: Datelike>(date: &D) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Monday 00:00 of the week containing `reference`, `None` when that Monday
/// falls before the first representable date.
#[must_use]
pub fn start_of_week(reference: NaiveDateTime) -> Option<NaiveDateTime> {
    let back = u64::from(reference.weekday().num_days_from_monday());
    reference
        .date()
        .checked_sub_days(Days::new(back))
        .map(|monday| monday.and_time(NaiveTime::MIN))
}

/// The seven days of the week `offset` weeks away from the one containing `reference`.
/// Returns an empty list when any day of the target week falls outside the
/// supported calendar; a week is never partial.
pub fn get_week_by_offset(offset: i32, reference: NaiveDateTime, locale: Locale) -> Vec<WeekDay> {
    let Some(first) = TimeDelta::try_days(i64::from(offset) * 7).and_then(|shift| {
        start_of_week(reference).and_then(|monday| monday.date().checked_add_signed(shift))
    }) else {
        return Vec::new();
    };

    (0..7)
        .map(|index| {
            first
                .checked_add_days(Days::new(index))
                .map(|date| week_day(date, locale))
        })
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

/// The week containing the local "now".
pub fn current_week(locale: Locale) -> Vec<WeekDay> {
    get_week_by_offset(0, Local::now().naive_local(), locale)
}

/// `"1 - 7 Gen"` within a month, `"29 Gen - 4 Feb"` across months.
pub fn format_week_range(days: &[WeekDay], locale: Locale) -> String {
    let (Some(first), Some(last)) = (days.first(), days.last()) else {
        return String::new();
    };

    let same_month =
        first.date.year() == last.date.year() && first.date.month() == last.date.month();

    if same_month {
        format!(
            "{} - {} {}",
            first.day_number,
            last.day_number,
            month_label(last.date, locale)
        )
    } else {
        format!(
            "{} {} - {} {}",
            first.day_number,
            month_label(first.date, locale),
            last.day_number,
            month_label(last.date, locale)
        )
    }
}

fn week_day(date: NaiveDate, locale: Locale) -> WeekDay {
    let label = localized(date, "%a", locale).to_uppercase();
    WeekDay {
        key: to_date_key(&date),
        day_number: date.day(),
        label,
        is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        date,
    }
}

fn month_label(date: NaiveDate, locale: Locale) -> String {
    let month = localized(date, "%b", locale);
    let mut chars = month.chars();
    match chars.next() {
        Some(head) => head.to_uppercase().chain(chars).collect(),
        None => month,
    }
}

// Weekday and month names do not depend on the offset, so UTC midnight is enough.
fn localized(date: NaiveDate, format: &str, locale: Locale) -> String {
    date.and_time(NaiveTime::MIN)
        .and_utc()
        .format_localized(format, locale)
        .to_string()
        .trim()
        .trim_end_matches('.')
        .to_string()
}
