use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Bill, Coordinates, Member, NewRide, RideStatus, RideView};
use crate::error::Error;

#[async_trait]
pub trait MemberAPI {
    async fn create_member(&self, user: User, name: String, email: String) -> Result<Member, Error>;
    async fn find_member(&self, user: User, id: Uuid) -> Result<Member, Error>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MyRides {
    pub created: Vec<RideView>,
    pub joined: Vec<RideView>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedRide {
    pub ride: RideView,
    pub bill: Bill,
}

#[async_trait]
pub trait RideAPI {
    async fn create_ride(&self, user: User, params: NewRide) -> Result<RideView, Error>;
    async fn find_ride(&self, user: User, id: Uuid) -> Result<RideView, Error>;

    /// Without a status filter only open and full rides are listed.
    async fn list_rides(
        &self,
        user: User,
        status: Option<RideStatus>,
        destination: Option<String>,
    ) -> Result<Vec<RideView>, Error>;

    async fn list_my_rides(&self, user: User) -> Result<MyRides, Error>;

    async fn add_passenger(&self, user: User, id: Uuid) -> Result<RideView, Error>;
    async fn remove_passenger(
        &self,
        user: User,
        id: Uuid,
        passenger_id: Uuid,
    ) -> Result<RideView, Error>;
    async fn revise_fare(&self, user: User, id: Uuid, total_fare: f64) -> Result<RideView, Error>;

    async fn start_ride(&self, user: User, id: Uuid, otp: String) -> Result<RideView, Error>;
    async fn update_vehicle_location(
        &self,
        user: User,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<(), Error>;

    /// Without an explicit distance the distance tracked from location
    /// updates is billed.
    async fn complete_ride(
        &self,
        user: User,
        id: Uuid,
        distance_km: Option<f64>,
    ) -> Result<CompletedRide, Error>;
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<RideView, Error>;
}

#[async_trait]
pub trait BillAPI {
    async fn find_bill(&self, user: User, ride_id: Uuid) -> Result<Bill, Error>;
    async fn list_my_bills(&self, user: User) -> Result<Vec<Bill>, Error>;
}

pub trait API: MemberAPI + RideAPI + BillAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
