use super::Engine;

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::{CompletedRide, MyRides, RideAPI},
    auth::{Platform, User},
    db::{mutate, settle, RideFilter, Store},
    entities::{Bill, Coordinates, NewRide, Ride, RideStatus, RideView},
    error::Error,
};

impl<S: Store> Engine<S> {
    // the creator never changes, so authorizing against an unlocked read is
    // as good as authorizing against the locked row
    async fn authorize_on_ride(&self, user: &User, action: &str, id: &Uuid) -> Result<Ride, Error> {
        let ride = self.store.find_ride(id).await?;

        self.authorize(user.clone(), action.to_string(), ride.clone())?;

        Ok(ride)
    }

    fn views_for(&self, user: &User, rides: &[Ride]) -> Result<Vec<RideView>, Error> {
        rides.iter().map(|ride| self.view_for(user, ride)).collect()
    }
}

#[async_trait]
impl<S: Store> RideAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_ride(&self, user: User, params: NewRide) -> Result<RideView, Error> {
        self.authorize(user.clone(), "create_ride", Platform::default())?;

        let ride = Ride::new(user.id, params)?;

        self.store.insert_ride(&ride).await?;

        tracing::info!(ride_id = %ride.id, fare_per_person = ride.fare_per_person, "ride created");

        self.view_for(&user, &ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<RideView, Error> {
        let ride = self.authorize_on_ride(&user, "read", &id).await?;

        self.view_for(&user, &ride)
    }

    #[tracing::instrument(skip(self))]
    async fn list_rides(
        &self,
        user: User,
        status: Option<RideStatus>,
        destination: Option<String>,
    ) -> Result<Vec<RideView>, Error> {
        let filter = RideFilter {
            statuses: Some(match status {
                Some(status) => vec![status],
                None => vec![RideStatus::Open, RideStatus::Full],
            }),
            destination: destination
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            ..Default::default()
        };

        let mut rides = self.store.list_rides(&filter).await?;
        rides.sort_by_key(|ride| ride.departure_time);

        self.views_for(&user, &rides)
    }

    #[tracing::instrument(skip(self))]
    async fn list_my_rides(&self, user: User) -> Result<MyRides, Error> {
        let mut created = self
            .store
            .list_rides(&RideFilter {
                creator_id: Some(user.id),
                ..Default::default()
            })
            .await?;
        created.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut joined = self
            .store
            .list_rides(&RideFilter {
                passenger_id: Some(user.id),
                ..Default::default()
            })
            .await?;
        joined.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(MyRides {
            created: self.views_for(&user, &created)?,
            joined: self.views_for(&user, &joined)?,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn add_passenger(&self, user: User, id: Uuid) -> Result<RideView, Error> {
        self.authorize_on_ride(&user, "join", &id).await?;

        let passenger_id = user.id;
        let (ride, _) = self
            .store
            .update_ride(
                &id,
                mutate(move |ride| ride.add_passenger(passenger_id)),
            )
            .await?;

        tracing::info!(
            ride_id = %ride.id,
            passengers = ride.passengers.len(),
            status = ride.status.name(),
            "passenger joined"
        );

        self.view_for(&user, &ride)
    }

    #[tracing::instrument(skip(self))]
    async fn remove_passenger(
        &self,
        user: User,
        id: Uuid,
        passenger_id: Uuid,
    ) -> Result<RideView, Error> {
        // leaving is always allowed, removing someone else is not
        if user.id != passenger_id {
            self.authorize_on_ride(&user, "remove_passenger", &id).await?;
        }

        let (ride, _) = self
            .store
            .update_ride(
                &id,
                mutate(move |ride| ride.remove_passenger(&passenger_id)),
            )
            .await?;

        tracing::info!(
            ride_id = %ride.id,
            passengers = ride.passengers.len(),
            "passenger left"
        );

        self.view_for(&user, &ride)
    }

    #[tracing::instrument(skip(self))]
    async fn revise_fare(&self, user: User, id: Uuid, total_fare: f64) -> Result<RideView, Error> {
        self.authorize_on_ride(&user, "revise_fare", &id).await?;

        let (ride, _) = self
            .store
            .update_ride(
                &id,
                mutate(move |ride| ride.revise_fare(total_fare)),
            )
            .await?;

        tracing::info!(
            ride_id = %ride.id,
            total_fare = ride.total_fare,
            fare_per_person = ride.fare_per_person,
            "fare revised"
        );

        self.view_for(&user, &ride)
    }

    #[tracing::instrument(skip(self, otp))]
    async fn start_ride(&self, user: User, id: Uuid, otp: String) -> Result<RideView, Error> {
        self.authorize_on_ride(&user, "start", &id).await?;

        let result = self
            .store
            .update_ride(&id, mutate(move |ride| ride.start(&otp)))
            .await;

        let (ride, _) = result.map_err(|err| {
            if err.is_otp_mismatch_error() {
                tracing::warn!(ride_id = %id, "rejected otp");
            }
            err
        })?;

        tracing::info!(ride_id = %ride.id, "ride started");

        self.view_for(&user, &ride)
    }

    #[tracing::instrument(skip(self))]
    async fn update_vehicle_location(
        &self,
        user: User,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<(), Error> {
        self.authorize_on_ride(&user, "update_location", &id).await?;

        self.store
            .update_ride(
                &id,
                mutate(move |ride| ride.update_vehicle_location(coordinates)),
            )
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn complete_ride(
        &self,
        user: User,
        id: Uuid,
        distance_km: Option<f64>,
    ) -> Result<CompletedRide, Error> {
        let snapshot = self.authorize_on_ride(&user, "complete", &id).await?;

        // membership is frozen once a ride is ongoing, so contacts looked up
        // from an ongoing snapshot match the participants billed under the lock
        if snapshot.status != RideStatus::Ongoing {
            return Err(Error::invalid_state_error());
        }

        let members: HashMap<_, _> = self
            .store
            .find_members(&snapshot.participants())
            .await?
            .into_iter()
            .map(|member| (member.id, member))
            .collect();

        let (ride, bill) = self
            .store
            .update_ride(
                &id,
                settle(move |ride| {
                    let distance = distance_km.unwrap_or(ride.tracked_distance);
                    ride.complete(distance)?;

                    Bill::generate(ride, &members)
                }),
            )
            .await?;

        let bill = bill.ok_or_else(Error::unexpected_error)?;

        tracing::info!(
            ride_id = %ride.id,
            bill_id = %bill.id,
            distance = ride.distance,
            "ride completed and billed"
        );

        Ok(CompletedRide {
            ride: self.view_for(&user, &ride)?,
            bill,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<RideView, Error> {
        self.authorize_on_ride(&user, "cancel", &id).await?;

        let (ride, _) = self
            .store
            .update_ride(&id, mutate(|ride| ride.cancel()))
            .await?;

        tracing::info!(ride_id = %ride.id, "ride cancelled");

        self.view_for(&user, &ride)
    }
}
