use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{RideFilter, RideUpdate, Store};
use crate::entities::{Bill, Member, Ride};
use crate::error::{Error, Violation};

/// Process-local store. Each ride sits behind its own mutex so updates to
/// different rides never contend.
#[derive(Default)]
pub struct MemoryStore {
    rides: RwLock<HashMap<Uuid, Arc<Mutex<Ride>>>>,
    bills: RwLock<HashMap<Uuid, Bill>>,
    members: RwLock<HashMap<Uuid, Member>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ride_slot(&self, id: &Uuid) -> Result<Arc<Mutex<Ride>>, Error> {
        self.rides
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(Error::not_found_error)
    }
}

#[async_trait]
impl Store for MemoryStore {
    #[tracing::instrument(skip(self))]
    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error> {
        let mut rides = self.rides.write().await;

        if rides.contains_key(&ride.id) {
            return Err(Error::database_error("duplicate ride id"));
        }

        rides.insert(ride.id, Arc::new(Mutex::new(ride.clone())));

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, id: &Uuid) -> Result<Ride, Error> {
        let slot = self.ride_slot(id).await?;
        let ride = slot.lock().await.clone();

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn list_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, Error> {
        let slots: Vec<Arc<Mutex<Ride>>> = self.rides.read().await.values().cloned().collect();

        let mut rides = vec![];
        for slot in slots {
            let ride = slot.lock().await;
            if filter.matches(&ride) {
                rides.push(ride.clone());
            }
        }

        Ok(rides)
    }

    #[tracing::instrument(skip(self, update))]
    async fn update_ride(&self, id: &Uuid, update: RideUpdate) -> Result<(Ride, Option<Bill>), Error> {
        let slot = self.ride_slot(id).await?;
        let mut guard = slot.lock().await;

        // work on a copy so a failed update leaves the stored ride intact
        let mut ride = guard.clone();
        let bill = update(&mut ride)?;

        if let Some(bill) = &bill {
            let mut bills = self.bills.write().await;

            if bills.contains_key(&bill.ride_id) {
                return Err(Error::invalid_state_error());
            }

            bills.insert(bill.ride_id, bill.clone());
        }

        *guard = ride.clone();

        Ok((ride, bill))
    }

    #[tracing::instrument(skip(self))]
    async fn find_bill(&self, ride_id: &Uuid) -> Result<Bill, Error> {
        self.bills
            .read()
            .await
            .get(ride_id)
            .cloned()
            .ok_or_else(Error::not_found_error)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bills(&self, member_id: &Uuid) -> Result<Vec<Bill>, Error> {
        let bills = self
            .bills
            .read()
            .await
            .values()
            .filter(|bill| bill.is_participant(member_id))
            .cloned()
            .collect();

        Ok(bills)
    }

    #[tracing::instrument(skip(self))]
    async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        let mut members = self.members.write().await;

        if members.contains_key(&member.id) {
            return Err(Error::validation_error(vec![Violation::new(
                "id",
                "member already exists",
            )]));
        }

        members.insert(member.id, member.clone());

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_member(&self, id: &Uuid) -> Result<Member, Error> {
        self.members
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(Error::not_found_error)
    }

    #[tracing::instrument(skip(self))]
    async fn find_members(&self, ids: &[Uuid]) -> Result<Vec<Member>, Error> {
        let members = self.members.read().await;

        Ok(ids.iter().filter_map(|id| members.get(id).cloned()).collect())
    }
}
