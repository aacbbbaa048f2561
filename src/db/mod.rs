mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{Bill, Member, Ride, RideStatus};
use crate::error::Error;

/// Selects rides by scalar fields. Unset fields do not constrain.
#[derive(Clone, Debug, Default)]
pub struct RideFilter {
    pub statuses: Option<Vec<RideStatus>>,
    pub destination: Option<String>,
    pub creator_id: Option<Uuid>,
    pub passenger_id: Option<Uuid>,
}

impl RideFilter {
    pub fn matches(&self, ride: &Ride) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&ride.status) {
                return false;
            }
        }

        if let Some(destination) = &self.destination {
            if !ride
                .destination
                .to_lowercase()
                .contains(&destination.to_lowercase())
            {
                return false;
            }
        }

        if let Some(creator_id) = &self.creator_id {
            if ride.creator_id != *creator_id {
                return false;
            }
        }

        if let Some(passenger_id) = &self.passenger_id {
            if !ride.is_passenger(passenger_id) {
                return false;
            }
        }

        true
    }
}

/// Ride mutation applied while the ride is exclusively held. A returned bill
/// is persisted in the same unit of work as the ride.
pub type RideUpdate = Box<dyn FnOnce(&mut Ride) -> Result<Option<Bill>, Error> + Send>;

/// A ride update that produces no bill.
pub fn mutate<F>(f: F) -> RideUpdate
where
    F: FnOnce(&mut Ride) -> Result<(), Error> + Send + 'static,
{
    Box::new(move |ride: &mut Ride| -> Result<Option<Bill>, Error> {
        f(ride)?;
        Ok(None)
    })
}

/// A ride update that closes the ride out with a bill.
pub fn settle<F>(f: F) -> RideUpdate
where
    F: FnOnce(&mut Ride) -> Result<Bill, Error> + Send + 'static,
{
    Box::new(move |ride: &mut Ride| -> Result<Option<Bill>, Error> { f(ride).map(Some) })
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error>;

    async fn find_ride(&self, id: &Uuid) -> Result<Ride, Error>;

    async fn list_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, Error>;

    /// Loads the ride under a per-ride lock, applies `update` and writes the
    /// result back. Concurrent updates of one ride are serialized; if `update`
    /// fails nothing is written.
    async fn update_ride(&self, id: &Uuid, update: RideUpdate) -> Result<(Ride, Option<Bill>), Error>;

    async fn find_bill(&self, ride_id: &Uuid) -> Result<Bill, Error>;

    async fn list_bills(&self, member_id: &Uuid) -> Result<Vec<Bill>, Error>;

    async fn insert_member(&self, member: &Member) -> Result<(), Error>;

    async fn find_member(&self, id: &Uuid) -> Result<Member, Error>;

    async fn find_members(&self, ids: &[Uuid]) -> Result<Vec<Member>, Error>;
}
