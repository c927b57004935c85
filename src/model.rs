use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned integer identifiers.
pub type RoomId = i64;
pub type CustomerId = i64;
pub type BookingId = i64;

/// Half-open date interval `[check_in, check_out)`.
///
/// The check-in night is included, the check-out day is not: a guest leaving
/// on the 5th and a guest arriving on the 5th can hold the same room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stay {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl Stay {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            check_in,
            check_out,
        }
    }

    /// Number of nights between check-in and check-out. Negative for an
    /// inverted candidate; validation rejects those before anything is priced.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.check_in <= date && date < self.check_out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub number: String,
    /// Nightly rate in minor currency units.
    pub price: i64,
    pub capacity: u32,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub room_id: RoomId,
    pub customer_id: CustomerId,
    #[serde(flatten)]
    pub stay: Stay,
    /// Total for the stay, nights x nightly rate at creation time.
    pub price: i64,
}

// ── Creation payloads (ids are assigned by the store) ────────────

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub number: String,
    pub price: i64,
    pub capacity: u32,
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
}

/// Partial customer update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub room_id: RoomId,
    pub customer_id: CustomerId,
    pub stay: Stay,
    pub price: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn stay_basics() {
        let s = Stay::new(d("2024-01-01"), d("2024-01-05"));
        assert_eq!(s.nights(), 4);
        assert!(s.contains_date(d("2024-01-01")));
        assert!(s.contains_date(d("2024-01-04")));
        assert!(!s.contains_date(d("2024-01-05"))); // half-open
    }

    #[test]
    fn stay_overlap() {
        let a = Stay::new(d("2024-01-01"), d("2024-01-05"));
        let b = Stay::new(d("2024-01-03"), d("2024-01-10"));
        let c = Stay::new(d("2024-01-05"), d("2024-01-08"));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // back-to-back, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn stay_overlap_containment() {
        let outer = Stay::new(d("2024-01-01"), d("2024-01-31"));
        let inner = Stay::new(d("2024-01-10"), d("2024-01-12"));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn stay_single_night_overlap() {
        // [1st, 6th) and [5th, 9th) share only the night of the 5th
        let a = Stay::new(d("2024-01-01"), d("2024-01-06"));
        let b = Stay::new(d("2024-01-05"), d("2024-01-09"));
        assert!(a.overlaps(&b));
    }

    #[test]
    fn inverted_stay_has_negative_nights() {
        let s = Stay::new(d("2024-01-05"), d("2024-01-01"));
        assert_eq!(s.nights(), -4);
    }

    #[test]
    fn booking_serializes_flat_dates() {
        let booking = Booking {
            id: 7,
            room_id: 1,
            customer_id: 2,
            stay: Stay::new(d("2024-02-01"), d("2024-02-03")),
            price: 18000,
        };
        let value = serde_json::to_value(&booking).unwrap();
        assert_eq!(value["check_in"], "2024-02-01");
        assert_eq!(value["check_out"], "2024-02-03");
        assert_eq!(value["price"], 18000);
    }
}
