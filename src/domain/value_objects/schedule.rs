use chrono::{Months, NaiveDate};

/// Monthly due dates starting at `first`, one per installment.
///
/// Day-of-month overflow clamps to the last day of the target month
/// (Jan 31 -> Feb 28/29). `None` when a date falls outside the calendar.
pub fn monthly_due_dates(first: NaiveDate, count: u32) -> Option<Vec<NaiveDate>> {
    (0..count)
        .map(|i| first.checked_add_months(Months::new(i)))
        .collect()
}
