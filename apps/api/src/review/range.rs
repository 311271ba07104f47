use chrono::{Duration, NaiveDate};

use crate::errors::AppError;

/// Longest allowed `end - start`, in days.
pub const MAX_REVIEW_SPAN_DAYS: i64 = 14;
/// `end - start` for the default trailing week.
pub const DEFAULT_SPAN_DAYS: i64 = 6;

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{field} must be a YYYY-MM-DD date")))
}

/// Resolves the requested review window.
///
/// Both bounds missing means the trailing seven days ending `today`; one
/// bound missing is filled in from the other. Inclusive on both ends.
pub fn resolve_range(
    week_start: Option<&str>,
    week_end: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let start = week_start.map(|s| parse_date("weekStart", s)).transpose()?;
    let end = week_end.map(|s| parse_date("weekEnd", s)).transpose()?;
    let default_span = Duration::days(DEFAULT_SPAN_DAYS);

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start, start + default_span),
        (None, Some(end)) => (end - default_span, end),
        (None, None) => (today - default_span, today),
    };

    if start > end {
        return Err(AppError::Validation(
            "weekStart must not be after weekEnd".into(),
        ));
    }
    if (end - start).num_days() > MAX_REVIEW_SPAN_DAYS {
        return Err(AppError::Validation(format!(
            "Date range cannot exceed {MAX_REVIEW_SPAN_DAYS} days"
        )));
    }
    Ok((start, end))
}
