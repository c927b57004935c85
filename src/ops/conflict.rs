use crate::model::{Booking, BookingId, Stay};

use super::OpsError;

/// Reject zero- and negative-duration candidates before anything else looks
/// at them.
pub(crate) fn validate_stay(stay: &Stay) -> Result<(), OpsError> {
    if stay.check_out <= stay.check_in {
        return Err(OpsError::InvalidDateRange {
            check_in: stay.check_in,
            check_out: stay.check_out,
        });
    }
    Ok(())
}

/// First existing booking whose half-open interval overlaps the candidate,
/// in the order the store returned them (check-in order).
pub(crate) fn find_conflict<'a>(
    stay: &Stay,
    existing: &'a [Booking],
    exclude: Option<BookingId>,
) -> Option<&'a Booking> {
    existing
        .iter()
        .filter(|b| exclude != Some(b.id))
        .find(|b| b.stay.overlaps(stay))
}

/// Full candidate check: date-range validity, then conflict search.
/// `exclude` skips the booking being rescheduled. Pure; works only on the
/// snapshot it was handed.
pub(crate) fn check_stay(
    stay: &Stay,
    existing: &[Booking],
    exclude: Option<BookingId>,
) -> Result<(), OpsError> {
    validate_stay(stay)?;
    if let Some(hit) = find_conflict(stay, existing, exclude) {
        return Err(OpsError::StayConflict {
            room_id: hit.room_id,
            booking_id: hit.id,
            check_in: hit.stay.check_in,
            check_out: hit.stay.check_out,
        });
    }
    Ok(())
}
