use chrono::{DateTime, Datelike, Utc};

/// A calendar month, ordered chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn format(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Every `YYYY-MM` from `first` through `last`, inclusive.
///
/// Empty when `first` lies after `last`.
pub fn months_between(first: YearMonth, last: YearMonth) -> Vec<String> {
    let mut months = Vec::new();
    let mut current = first;
    while current <= last {
        months.push(current.format());
        current = current.next();
    }
    months
}

/// Month list for the creation-month filter, from the earliest record to `now`.
pub fn month_range(earliest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Vec<String> {
    match earliest {
        Some(earliest) => months_between(YearMonth::of(&earliest), YearMonth::of(&now)),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_no_records_yields_empty_range() {
        assert!(month_range(None, at(2024, 2, 10)).is_empty());
    }

    #[test]
    fn test_range_crosses_year_boundary() {
        let months = month_range(Some(at(2023, 11, 30)), at(2024, 2, 1));
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_same_month_yields_single_entry() {
        let months = month_range(Some(at(2024, 5, 1)), at(2024, 5, 31));
        assert_eq!(months, vec!["2024-05"]);
    }

    #[test]
    fn test_earliest_after_now_yields_empty_range() {
        assert!(month_range(Some(at(2025, 1, 1)), at(2024, 12, 31)).is_empty());
    }

    #[test]
    fn test_format_pads_year_and_month() {
        let month = YearMonth { year: 987, month: 3 };
        assert_eq!(month.format(), "0987-03");
    }
}
