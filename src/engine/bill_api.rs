use async_trait::async_trait;
use uuid::Uuid;

use super::Engine;

use crate::{api::BillAPI, auth::User, db::Store, entities::Bill, error::Error};

#[async_trait]
impl<S: Store> BillAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn find_bill(&self, user: User, ride_id: Uuid) -> Result<Bill, Error> {
        let bill = self.store.find_bill(&ride_id).await?;

        self.authorize(user, "read", bill.clone())?;

        Ok(bill)
    }

    #[tracing::instrument(skip(self))]
    async fn list_my_bills(&self, user: User) -> Result<Vec<Bill>, Error> {
        let mut bills = self.store.list_bills(&user.id).await?;
        bills.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        Ok(bills)
    }
}
