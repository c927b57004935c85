use crate::model::{Booking, BookingId, CustomerId, NewBooking, RoomId, Stay};
use crate::observability;
use crate::store::{BookingFilter, BookingSortField, EntityStore, Page, SortOrder};

use super::conflict;
use super::error::{OpsError, Resource};
use super::Desk;

impl Desk {
    /// Validates the candidate stay against the room's existing bookings and
    /// persists it. The store's overlap constraint backstops the snapshot
    /// check under concurrent creation.
    pub async fn create_booking(
        &self,
        room_id: RoomId,
        customer_id: CustomerId,
        stay: Stay,
    ) -> Result<Booking, OpsError> {
        let room = self
            .store
            .get_room(room_id)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Room,
                id: room_id,
            })?;
        self.store
            .get_customer(customer_id)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Customer,
                id: customer_id,
            })?;

        let existing = self.store.bookings_for_room(room_id).await?;
        if let Err(err) = conflict::check_stay(&stay, &existing, None) {
            if matches!(err, OpsError::StayConflict { .. }) {
                metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            }
            return Err(err);
        }

        let price = room.price * stay.nights();
        let booking = self
            .store
            .insert_booking(NewBooking {
                room_id,
                customer_id,
                stay,
                price,
            })
            .await?;

        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        tracing::info!(
            booking = booking.id,
            room = room_id,
            customer = customer_id,
            "booking created"
        );
        Ok(booking)
    }

    /// Reschedules a booking. The candidate is validated against all other
    /// bookings for the room, excluding the one being moved, and the price is
    /// recomputed from the room's current rate.
    pub async fn update_booking_dates(
        &self,
        id: BookingId,
        stay: Stay,
    ) -> Result<Booking, OpsError> {
        let current = self
            .store
            .get_booking(id)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Booking,
                id,
            })?;
        let room = self
            .store
            .get_room(current.room_id)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Room,
                id: current.room_id,
            })?;

        let existing = self.store.bookings_for_room(current.room_id).await?;
        if let Err(err) = conflict::check_stay(&stay, &existing, Some(id)) {
            if matches!(err, OpsError::StayConflict { .. }) {
                metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            }
            return Err(err);
        }

        let updated = Booking {
            stay,
            price: room.price * stay.nights(),
            ..current
        };
        let replaced = self
            .store
            .replace_booking(updated)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Booking,
                id,
            })?;

        tracing::info!(booking = id, room = replaced.room_id, "booking rescheduled");
        Ok(replaced)
    }

    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, OpsError> {
        self.store
            .get_booking(id)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Booking,
                id,
            })
    }

    pub async fn delete_booking(&self, id: BookingId) -> Result<(), OpsError> {
        if self.store.delete_booking(id).await? {
            tracing::info!(booking = id, "booking deleted");
            Ok(())
        } else {
            Err(OpsError::NotFound {
                resource: Resource::Booking,
                id,
            })
        }
    }

    pub async fn list_bookings(
        &self,
        filter: BookingFilter,
        page: Page,
        sort: BookingSortField,
        order: SortOrder,
    ) -> Result<Vec<Booking>, OpsError> {
        self.store
            .list_bookings(&filter, page, sort, order)
            .await
            .map_err(OpsError::from)
    }
}
