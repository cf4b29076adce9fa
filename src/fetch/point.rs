// src/fetch/point.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// One (year, month, day, hour) coordinate of the fetch grid.
///
/// Nothing checks calendar validity: February 31st is a perfectly good point
/// that simply yields no data. Ordering is grid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FetchPoint {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl FetchPoint {
    pub const fn new(year: u32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
        }
    }

    /// Query parameters understood by the air quality history page.
    pub fn query(&self) -> [(&'static str, String); 4] {
        [
            ("start_year", self.year.to_string()),
            ("start_month", self.month.to_string()),
            ("start_day", self.day.to_string()),
            ("my_hour", self.hour.to_string()),
        ]
    }

    /// The four leading fields of every row scraped for this point.
    pub fn prefix(&self) -> [String; 4] {
        [
            self.year.to_string(),
            self.month.to_string(),
            self.day.to_string(),
            self.hour.to_string(),
        ]
    }
}

impl fmt::Display for FetchPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{} {}:00", self.year, self.month, self.day, self.hour)
    }
}

/// Cell texts of one table row, tagged with the point it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub point: FetchPoint,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new(point: FetchPoint, cells: Vec<String>) -> Self {
        Self { point, cells }
    }

    /// Number of fields once the point prefix is included.
    pub fn width(&self) -> usize {
        4 + self.cells.len()
    }

    pub fn into_fields(self) -> Vec<String> {
        let mut fields = Vec::with_capacity(self.width());
        fields.extend(self.point.prefix());
        fields.extend(self.cells);
        fields
    }
}
