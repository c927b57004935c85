use chrono::NaiveDate;

use crate::model::{BookingId, RoomId};
use crate::store::StoreError;

/// Entity kinds referenced by not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Room,
    Customer,
    Booking,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Room => "Room",
            Resource::Customer => "Customer",
            Resource::Booking => "Booking",
        }
    }
}

/// One-shot error values raised by the operations service and translated to
/// HTTP responses at the API boundary. Flat taxonomy, no nesting.
#[derive(Debug)]
pub enum OpsError {
    NotFound {
        resource: Resource,
        id: i64,
    },
    /// Zero or negative stay duration.
    InvalidDateRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    /// Candidate stay overlaps an existing booking for the same room.
    /// Carries the existing booking's id and dates.
    StayConflict {
        room_id: RoomId,
        booking_id: BookingId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    /// Request-level validation failure outside the date-range rules.
    Validation {
        detail: String,
    },
    /// Integrity violation reported by the store: a client input problem,
    /// not a server fault.
    ForeignKeyViolation {
        detail: String,
    },
    /// Unanticipated persistence failure.
    Database {
        detail: String,
    },
}

impl std::fmt::Display for OpsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpsError::NotFound { resource, id } => {
                write!(f, "{} with ID {id} not found", resource.as_str())
            }
            OpsError::InvalidDateRange { .. } => {
                write!(f, "Check-out date must be after check-in date")
            }
            OpsError::StayConflict {
                room_id,
                booking_id,
                check_in,
                check_out,
            } => {
                write!(
                    f,
                    "Room {room_id} is already booked from {check_in} to {check_out} (booking {booking_id})"
                )
            }
            OpsError::Validation { detail } => write!(f, "{detail}"),
            OpsError::ForeignKeyViolation { .. } => {
                write!(f, "Referenced resource does not exist")
            }
            OpsError::Database { detail } => write!(f, "Database operation failed: {detail}"),
        }
    }
}

impl std::error::Error for OpsError {}

impl From<StoreError> for OpsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ForeignKey { detail } => OpsError::ForeignKeyViolation { detail },
            StoreError::Overlap { conflicting } => OpsError::StayConflict {
                room_id: conflicting.room_id,
                booking_id: conflicting.id,
                check_in: conflicting.stay.check_in,
                check_out: conflicting.stay.check_out,
            },
            StoreError::Unavailable(detail) => OpsError::Database { detail },
        }
    }
}
