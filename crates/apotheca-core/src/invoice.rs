//! # Invoice Numbers
//!
//! Invoice numbers look like `B01-031525-1442-0004`:
//!
//! ```text
//! B01   - 031525 - 1442 - 0004
//! │       │        │      │
//! │       │        │      └── daily sequence, zero-padded to 4 digits
//! │       │        └───────── local time of the sale (HHMM)
//! │       └────────────────── local business date (MMDDYY)
//! └────────────────────────── branch code
//! ```
//!
//! The date and time come from the branch's business clock, not UTC, so a
//! sale rung up at 07:30 in Manila lands on the correct business day.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::ValidationError;

/// Converts UTC instants into the pharmacy's local business time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessClock {
    offset: FixedOffset,
}

impl BusinessClock {
    /// Creates a clock `utc_offset_minutes` east of UTC (+480 for Manila).
    pub fn new(utc_offset_minutes: i32) -> Result<Self, ValidationError> {
        FixedOffset::east_opt(utc_offset_minutes * 60)
            .map(|offset| BusinessClock { offset })
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "utc_offset_minutes".to_string(),
                min: -1439,
                max: 1439,
            })
    }

    /// UTC clock, mostly for tests.
    pub fn utc() -> Self {
        BusinessClock {
            offset: Utc.fix(),
        }
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    /// The calendar day that `at` belongs to for sequencing purposes.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }
}

/// Formats `{branchCode}-{MMDDYY}-{HHMM}-{seq:04}`.
pub fn format_invoice_number(
    branch_code: &str,
    local_time: &DateTime<FixedOffset>,
    sequence: i64,
) -> String {
    format!(
        "{}-{}-{}-{:04}",
        branch_code,
        local_time.format("%m%d%y"),
        local_time.format("%H%M"),
        sequence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_invoice_number() {
        let at = Utc.with_ymd_and_hms(2025, 3, 15, 14, 42, 10).unwrap();
        let clock = BusinessClock::utc();
        assert_eq!(
            format_invoice_number("B01", &clock.local(at), 4),
            "B01-031525-1442-0004"
        );
    }

    #[test]
    fn test_sequence_wider_than_padding() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 0).unwrap();
        let number = format_invoice_number("MNL", &BusinessClock::utc().local(at), 12_345);
        assert_eq!(number, "MNL-010225-0304-12345");
    }

    #[test]
    fn test_business_date_uses_local_offset() {
        let manila = BusinessClock::new(480).unwrap();
        // 2025-03-15 23:30 UTC is already 2025-03-16 07:30 in Manila
        let at = Utc.with_ymd_and_hms(2025, 3, 15, 23, 30, 0).unwrap();
        assert_eq!(
            manila.business_date(at),
            NaiveDate::from_ymd_opt(2025, 3, 16).unwrap()
        );
        assert_eq!(
            format_invoice_number("B01", &manila.local(at), 1),
            "B01-031625-0730-0001"
        );
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(BusinessClock::new(24 * 60).is_err());
    }
}
