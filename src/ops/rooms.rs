use crate::model::{NewRoom, Room, RoomId};
use crate::store::{EntityStore, Page, RoomFilter, RoomSortField, SortOrder};

use super::error::{OpsError, Resource};
use super::Desk;

impl Desk {
    pub async fn get_room(&self, id: RoomId) -> Result<Room, OpsError> {
        self.store.get_room(id).await?.ok_or(OpsError::NotFound {
            resource: Resource::Room,
            id,
        })
    }

    pub async fn list_rooms(
        &self,
        filter: RoomFilter,
        page: Page,
        sort: RoomSortField,
        order: SortOrder,
    ) -> Result<Vec<Room>, OpsError> {
        self.store
            .list_rooms(&filter, page, sort, order)
            .await
            .map_err(OpsError::from)
    }

    /// Inventory entry point used by seeding and tests; the public API only
    /// reads rooms.
    pub async fn add_room(&self, new: NewRoom) -> Result<Room, OpsError> {
        let room = self.store.insert_room(new).await?;
        tracing::info!(room = room.id, number = %room.number, "room added");
        Ok(room)
    }
}
