use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::model::*;

/// Failures surfaced by an entity store. Integrity violations are split out
/// so callers can report them as client errors rather than server faults.
#[derive(Debug)]
pub enum StoreError {
    /// A referenced entity does not exist (the relational FK case).
    ForeignKey { detail: String },
    /// The per-room no-overlap constraint rejected an insert. Carries the
    /// booking already holding the interval.
    Overlap { conflicting: Booking },
    /// The backing store is unreachable or failed mid-operation.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ForeignKey { detail } => write!(f, "foreign key violation: {detail}"),
            StoreError::Overlap { conflicting } => {
                write!(f, "overlap constraint: conflicts with booking {}", conflicting.id)
            }
            StoreError::Unavailable(detail) => write!(f, "store unavailable: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ── Query modifiers ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub skip: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { skip: 0, limit: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomSortField {
    #[default]
    Id,
    Price,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSortField {
    #[default]
    Id,
    Name,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSortField {
    #[default]
    Id,
    CheckIn,
    CheckOut,
}

#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    pub available: Option<bool>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    /// Case-insensitive substring match on first name.
    pub name: Option<String>,
    /// Case-insensitive substring match on email address.
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BookingFilter {
    pub customer_id: Option<CustomerId>,
    pub room_id: Option<RoomId>,
}

// ── Store interface ──────────────────────────────────────────────

/// Narrow persistence seam for rooms, customers, and bookings.
///
/// `insert_booking` assigns the id and enforces referential integrity plus
/// the per-room no-overlap constraint; everything else is plain CRUD.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Readiness hook: verifies the backing store answers at all.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError>;
    async fn list_rooms(
        &self,
        filter: &RoomFilter,
        page: Page,
        sort: RoomSortField,
        order: SortOrder,
    ) -> Result<Vec<Room>, StoreError>;
    async fn insert_room(&self, new: NewRoom) -> Result<Room, StoreError>;

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: Page,
        sort: CustomerSortField,
        order: SortOrder,
    ) -> Result<Vec<Customer>, StoreError>;
    async fn insert_customer(&self, new: NewCustomer) -> Result<Customer, StoreError>;
    /// Applies the patch; `Ok(None)` when the customer does not exist.
    async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, StoreError>;

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError>;
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: Page,
        sort: BookingSortField,
        order: SortOrder,
    ) -> Result<Vec<Booking>, StoreError>;
    /// All bookings for a room, ordered by check-in date.
    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError>;
    async fn insert_booking(&self, new: NewBooking) -> Result<Booking, StoreError>;
    /// Swaps the stored record under the same id (date changes).
    /// `Ok(None)` when the booking does not exist.
    async fn replace_booking(&self, booking: Booking) -> Result<Option<Booking>, StoreError>;
    /// Returns whether the booking existed.
    async fn delete_booking(&self, id: BookingId) -> Result<bool, StoreError>;
}

// ── In-memory implementation ─────────────────────────────────────

/// DashMap-backed store with sequential id assignment.
///
/// The per-room booking index doubles as the overlap constraint's
/// serialization point: inserts re-check the interval predicate while holding
/// the room's index entry, so two racing creations for the same room cannot
/// both land even though each validated against its own snapshot.
pub struct MemoryStore {
    rooms: DashMap<RoomId, Room>,
    customers: DashMap<CustomerId, Customer>,
    bookings: DashMap<BookingId, Booking>,
    room_bookings: DashMap<RoomId, Vec<BookingId>>,
    next_room_id: AtomicI64,
    next_customer_id: AtomicI64,
    next_booking_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            customers: DashMap::new(),
            bookings: DashMap::new(),
            room_bookings: DashMap::new(),
            next_room_id: AtomicI64::new(1),
            next_customer_id: AtomicI64::new(1),
            next_booking_id: AtomicI64::new(1),
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn compare_rooms(a: &Room, b: &Room, sort: RoomSortField) -> Ordering {
        match sort {
            RoomSortField::Id => a.id.cmp(&b.id),
            RoomSortField::Price => a.price.cmp(&b.price).then(a.id.cmp(&b.id)),
            RoomSortField::Number => a.number.cmp(&b.number).then(a.id.cmp(&b.id)),
        }
    }

    fn compare_customers(a: &Customer, b: &Customer, sort: CustomerSortField) -> Ordering {
        match sort {
            CustomerSortField::Id => a.id.cmp(&b.id),
            CustomerSortField::Name => a.first_name.cmp(&b.first_name).then(a.id.cmp(&b.id)),
            CustomerSortField::Email => {
                a.email_address.cmp(&b.email_address).then(a.id.cmp(&b.id))
            }
        }
    }

    fn compare_bookings(a: &Booking, b: &Booking, sort: BookingSortField) -> Ordering {
        match sort {
            BookingSortField::Id => a.id.cmp(&b.id),
            BookingSortField::CheckIn => {
                a.stay.check_in.cmp(&b.stay.check_in).then(a.id.cmp(&b.id))
            }
            BookingSortField::CheckOut => {
                a.stay.check_out.cmp(&b.stay.check_out).then(a.id.cmp(&b.id))
            }
        }
    }

    fn paginate<T>(mut items: Vec<T>, page: Page, order: SortOrder) -> Vec<T> {
        if order == SortOrder::Desc {
            items.reverse();
        }
        items.into_iter().skip(page.skip).take(page.limit).collect()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_room(&self, id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.get(&id).map(|e| e.value().clone()))
    }

    async fn list_rooms(
        &self,
        filter: &RoomFilter,
        page: Page,
        sort: RoomSortField,
        order: SortOrder,
    ) -> Result<Vec<Room>, StoreError> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .map(|e| e.value().clone())
            .filter(|r| filter.available.is_none_or(|want| r.available == want))
            .filter(|r| filter.min_price.is_none_or(|min| r.price >= min))
            .filter(|r| filter.max_price.is_none_or(|max| r.price <= max))
            .collect();
        rooms.sort_by(|a, b| Self::compare_rooms(a, b, sort));
        Ok(Self::paginate(rooms, page, order))
    }

    async fn insert_room(&self, new: NewRoom) -> Result<Room, StoreError> {
        let id = self.next_room_id.fetch_add(1, AtomicOrdering::Relaxed);
        let room = Room {
            id,
            number: new.number,
            price: new.price,
            capacity: new.capacity,
            available: new.available,
        };
        self.rooms.insert(id, room.clone());
        Ok(room)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.get(&id).map(|e| e.value().clone()))
    }

    async fn list_customers(
        &self,
        filter: &CustomerFilter,
        page: Page,
        sort: CustomerSortField,
        order: SortOrder,
    ) -> Result<Vec<Customer>, StoreError> {
        let name = filter.name.as_ref().map(|s| s.to_lowercase());
        let email = filter.email.as_ref().map(|s| s.to_lowercase());
        let mut customers: Vec<Customer> = self
            .customers
            .iter()
            .map(|e| e.value().clone())
            .filter(|c| {
                name.as_ref()
                    .is_none_or(|n| c.first_name.to_lowercase().contains(n))
            })
            .filter(|c| {
                email
                    .as_ref()
                    .is_none_or(|m| c.email_address.to_lowercase().contains(m))
            })
            .collect();
        customers.sort_by(|a, b| Self::compare_customers(a, b, sort));
        Ok(Self::paginate(customers, page, order))
    }

    async fn insert_customer(&self, new: NewCustomer) -> Result<Customer, StoreError> {
        let id = self.next_customer_id.fetch_add(1, AtomicOrdering::Relaxed);
        let customer = Customer {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            email_address: new.email_address,
        };
        self.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, StoreError> {
        let Some(mut entry) = self.customers.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(first_name) = patch.first_name {
            entry.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            entry.last_name = last_name;
        }
        if let Some(email_address) = patch.email_address {
            entry.email_address = email_address;
        }
        Ok(Some(entry.value().clone()))
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: Page,
        sort: BookingSortField,
        order: SortOrder,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .iter()
            .map(|e| e.value().clone())
            .filter(|b| filter.customer_id.is_none_or(|cid| b.customer_id == cid))
            .filter(|b| filter.room_id.is_none_or(|rid| b.room_id == rid))
            .collect();
        bookings.sort_by(|a, b| Self::compare_bookings(a, b, sort));
        Ok(Self::paginate(bookings, page, order))
    }

    async fn bookings_for_room(&self, room_id: RoomId) -> Result<Vec<Booking>, StoreError> {
        let ids: Vec<BookingId> = self
            .room_bookings
            .get(&room_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut bookings: Vec<Booking> = ids
            .iter()
            .filter_map(|id| self.bookings.get(id).map(|e| e.value().clone()))
            .collect();
        bookings.sort_by_key(|b| b.stay.check_in);
        Ok(bookings)
    }

    async fn insert_booking(&self, new: NewBooking) -> Result<Booking, StoreError> {
        if !self.rooms.contains_key(&new.room_id) {
            return Err(StoreError::ForeignKey {
                detail: format!("room {} does not exist", new.room_id),
            });
        }
        if !self.customers.contains_key(&new.customer_id) {
            return Err(StoreError::ForeignKey {
                detail: format!("customer {} does not exist", new.customer_id),
            });
        }

        // Entry guard held across check + insert: the exclusion constraint.
        let mut index = self.room_bookings.entry(new.room_id).or_default();
        for id in index.iter() {
            if let Some(existing) = self.bookings.get(id)
                && existing.stay.overlaps(&new.stay)
            {
                return Err(StoreError::Overlap {
                    conflicting: existing.value().clone(),
                });
            }
        }

        let id = self.next_booking_id.fetch_add(1, AtomicOrdering::Relaxed);
        let booking = Booking {
            id,
            room_id: new.room_id,
            customer_id: new.customer_id,
            stay: new.stay,
            price: new.price,
        };
        self.bookings.insert(id, booking.clone());
        index.push(id);
        Ok(booking)
    }

    async fn replace_booking(&self, booking: Booking) -> Result<Option<Booking>, StoreError> {
        if !self.bookings.contains_key(&booking.id) {
            return Ok(None);
        }

        let index = self.room_bookings.entry(booking.room_id).or_default();
        for id in index.iter() {
            if *id == booking.id {
                continue;
            }
            if let Some(existing) = self.bookings.get(id)
                && existing.stay.overlaps(&booking.stay)
            {
                return Err(StoreError::Overlap {
                    conflicting: existing.value().clone(),
                });
            }
        }

        self.bookings.insert(booking.id, booking.clone());
        drop(index);
        Ok(Some(booking))
    }

    async fn delete_booking(&self, id: BookingId) -> Result<bool, StoreError> {
        let Some(room_id) = self.bookings.get(&id).map(|e| e.room_id) else {
            return Ok(false);
        };
        let mut index = self.room_bookings.entry(room_id).or_default();
        index.retain(|b| *b != id);
        let existed = self.bookings.remove(&id).is_some();
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stay;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn room() -> NewRoom {
        NewRoom {
            number: "101".into(),
            price: 9000,
            capacity: 2,
            available: true,
        }
    }

    fn customer() -> NewCustomer {
        NewCustomer {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email_address: "ada@example.com".into(),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_per_entity() {
        let store = MemoryStore::new();
        let r1 = store.insert_room(room()).await.unwrap();
        let r2 = store.insert_room(room()).await.unwrap();
        let c1 = store.insert_customer(customer()).await.unwrap();
        assert_eq!(r1.id, 1);
        assert_eq!(r2.id, 2);
        assert_eq!(c1.id, 1);
    }

    #[tokio::test]
    async fn insert_booking_requires_room_and_customer() {
        let store = MemoryStore::new();
        let stay = Stay::new(d("2024-02-01"), d("2024-02-03"));
        let err = store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay,
                price: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { .. }));

        store.insert_room(room()).await.unwrap();
        let err = store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay,
                price: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey { .. }));
    }

    #[tokio::test]
    async fn overlap_constraint_rejects_second_insert() {
        let store = MemoryStore::new();
        store.insert_room(room()).await.unwrap();
        store.insert_customer(customer()).await.unwrap();

        let first = store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay: Stay::new(d("2024-02-01"), d("2024-02-05")),
                price: 36000,
            })
            .await
            .unwrap();

        let err = store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay: Stay::new(d("2024-02-03"), d("2024-02-07")),
                price: 36000,
            })
            .await
            .unwrap_err();
        match err {
            StoreError::Overlap { conflicting } => assert_eq!(conflicting.id, first.id),
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn adjacent_stays_both_land() {
        let store = MemoryStore::new();
        store.insert_room(room()).await.unwrap();
        store.insert_customer(customer()).await.unwrap();

        store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay: Stay::new(d("2024-02-01"), d("2024-02-05")),
                price: 36000,
            })
            .await
            .unwrap();
        store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay: Stay::new(d("2024-02-05"), d("2024-02-08")),
                price: 27000,
            })
            .await
            .unwrap();
        assert_eq!(store.bookings_for_room(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_inserts_one_wins() {
        let store = Arc::new(MemoryStore::new());
        store.insert_room(room()).await.unwrap();
        store.insert_customer(customer()).await.unwrap();

        let stay = Stay::new(d("2024-03-01"), d("2024-03-04"));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_booking(NewBooking {
                        room_id: 1,
                        customer_id: 1,
                        stay,
                        price: 27000,
                    })
                    .await
            }));
        }

        let mut landed = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                landed += 1;
            }
        }
        assert_eq!(landed, 1);
        assert_eq!(store.bookings_for_room(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_booking_clears_room_index() {
        let store = MemoryStore::new();
        store.insert_room(room()).await.unwrap();
        store.insert_customer(customer()).await.unwrap();

        let stay = Stay::new(d("2024-02-01"), d("2024-02-05"));
        let booking = store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay,
                price: 36000,
            })
            .await
            .unwrap();

        assert!(store.delete_booking(booking.id).await.unwrap());
        assert!(!store.delete_booking(booking.id).await.unwrap());

        // Interval is free again
        store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay,
                price: 36000,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replace_booking_skips_self_when_checking() {
        let store = MemoryStore::new();
        store.insert_room(room()).await.unwrap();
        store.insert_customer(customer()).await.unwrap();

        let mut booking = store
            .insert_booking(NewBooking {
                room_id: 1,
                customer_id: 1,
                stay: Stay::new(d("2024-02-01"), d("2024-02-05")),
                price: 36000,
            })
            .await
            .unwrap();

        // Shifting within its own interval must not self-conflict
        booking.stay = Stay::new(d("2024-02-02"), d("2024-02-06"));
        let replaced = store.replace_booking(booking.clone()).await.unwrap();
        assert_eq!(replaced.unwrap().stay.check_in, d("2024-02-02"));
    }

    #[tokio::test]
    async fn list_rooms_filters_and_sorts() {
        let store = MemoryStore::new();
        for (number, price, available) in
            [("301", 15000, true), ("101", 9000, true), ("201", 12000, false)]
        {
            store
                .insert_room(NewRoom {
                    number: number.into(),
                    price,
                    capacity: 2,
                    available,
                })
                .await
                .unwrap();
        }

        let filter = RoomFilter {
            available: Some(true),
            ..Default::default()
        };
        let rooms = store
            .list_rooms(&filter, Page::default(), RoomSortField::Price, SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].number, "101");
        assert_eq!(rooms[1].number, "301");

        let filter = RoomFilter {
            min_price: Some(10000),
            max_price: Some(13000),
            ..Default::default()
        };
        let rooms = store
            .list_rooms(&filter, Page::default(), RoomSortField::Id, SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].number, "201");
    }

    #[tokio::test]
    async fn pagination_skips_and_limits() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .insert_customer(NewCustomer {
                    first_name: format!("c{i}"),
                    last_name: "x".into(),
                    email_address: format!("c{i}@example.com"),
                })
                .await
                .unwrap();
        }

        let page = Page { skip: 4, limit: 3 };
        let customers = store
            .list_customers(
                &CustomerFilter::default(),
                page,
                CustomerSortField::Id,
                SortOrder::Asc,
            )
            .await
            .unwrap();
        assert_eq!(customers.len(), 3);
        assert_eq!(customers[0].id, 5);
        assert_eq!(customers[2].id, 7);
    }

    #[tokio::test]
    async fn customer_filters_match_substrings_case_insensitive() {
        let store = MemoryStore::new();
        store
            .insert_customer(NewCustomer {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email_address: "grace@navy.mil".into(),
            })
            .await
            .unwrap();
        store.insert_customer(customer()).await.unwrap();

        let filter = CustomerFilter {
            name: Some("RAC".into()),
            ..Default::default()
        };
        let hits = store
            .list_customers(&filter, Page::default(), CustomerSortField::Id, SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first_name, "Grace");

        let filter = CustomerFilter {
            email: Some("example.com".into()),
            ..Default::default()
        };
        let hits = store
            .list_customers(&filter, Page::default(), CustomerSortField::Id, SortOrder::Asc)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first_name, "Ada");
    }
}
