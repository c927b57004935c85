use crate::model::{Customer, CustomerId, CustomerPatch, NewCustomer};
use crate::store::{CustomerFilter, CustomerSortField, EntityStore, Page, SortOrder};

use super::error::{OpsError, Resource};
use super::Desk;

impl Desk {
    pub async fn create_customer(&self, new: NewCustomer) -> Result<Customer, OpsError> {
        let customer = self.store.insert_customer(new).await?;
        tracing::info!(customer = customer.id, "customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, OpsError> {
        self.store
            .get_customer(id)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Customer,
                id,
            })
    }

    pub async fn update_customer(
        &self,
        id: CustomerId,
        patch: CustomerPatch,
    ) -> Result<Customer, OpsError> {
        self.store
            .update_customer(id, patch)
            .await?
            .ok_or(OpsError::NotFound {
                resource: Resource::Customer,
                id,
            })
    }

    pub async fn list_customers(
        &self,
        filter: CustomerFilter,
        page: Page,
        sort: CustomerSortField,
        order: SortOrder,
    ) -> Result<Vec<Customer>, OpsError> {
        self.store
            .list_customers(&filter, page, sort, order)
            .await
            .map_err(OpsError::from)
    }
}
