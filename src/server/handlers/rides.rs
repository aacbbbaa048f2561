use axum::extract::{Extension, Json, Path, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{CompletedRide, DynAPI, MyRides};
use crate::auth::User;
use crate::entities::{Coordinates, NewRide, RideStatus, RideView};
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    destination: String,
    pickup_location: String,
    departure_time: DateTime<Utc>,
    total_fare: f64,
    max_seats: i64,
}

impl From<CreateParams> for NewRide {
    fn from(params: CreateParams) -> Self {
        Self {
            destination: params.destination,
            pickup_location: params.pickup_location,
            departure_time: params.departure_time,
            total_fare: params.total_fare,
            max_seats: params.max_seats,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct ListParams {
    status: Option<RideStatus>,
    destination: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ReviseFareParams {
    total_fare: f64,
}

#[derive(Serialize, Deserialize)]
pub struct VerifyOtpParams {
    otp: String,
}

#[derive(Serialize, Deserialize)]
pub struct UpdateLocationParams {
    coordinates: Coordinates,
}

#[derive(Serialize, Deserialize)]
pub struct CompleteParams {
    #[serde(default)]
    distance: Option<f64>,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<CreateParams>,
) -> Result<Json<RideView>, Error> {
    let ride = api.create_ride(user, params.into()).await?;

    Ok(ride.into())
}

pub async fn list(
    Extension(api): Extension<DynAPI>,
    user: User,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RideView>>, Error> {
    let rides = api
        .list_rides(user, params.status, params.destination)
        .await?;

    Ok(rides.into())
}

pub async fn mine(Extension(api): Extension<DynAPI>, user: User) -> Result<Json<MyRides>, Error> {
    let rides = api.list_my_rides(user).await?;

    Ok(rides.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RideView>, Error> {
    let ride = api.find_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn join(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RideView>, Error> {
    let ride = api.add_passenger(user, id).await?;

    Ok(ride.into())
}

pub async fn leave(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RideView>, Error> {
    let passenger_id = user.id;
    let ride = api.remove_passenger(user, id, passenger_id).await?;

    Ok(ride.into())
}

pub async fn remove_passenger(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path((id, passenger_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RideView>, Error> {
    let ride = api.remove_passenger(user, id, passenger_id).await?;

    Ok(ride.into())
}

pub async fn revise_fare(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<ReviseFareParams>,
) -> Result<Json<RideView>, Error> {
    let ride = api.revise_fare(user, id, params.total_fare).await?;

    Ok(ride.into())
}

pub async fn verify_otp(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<VerifyOtpParams>,
) -> Result<Json<RideView>, Error> {
    let ride = api.start_ride(user, id, params.otp).await?;

    Ok(ride.into())
}

pub async fn update_location(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateLocationParams>,
) -> Result<Json<()>, Error> {
    api.update_vehicle_location(user, id, params.coordinates)
        .await?;

    Ok(().into())
}

pub async fn complete(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
    params: Option<Json<CompleteParams>>,
) -> Result<Json<CompletedRide>, Error> {
    // without a body the tracked distance is billed
    let distance = params.and_then(|Json(params)| params.distance);
    let completed = api.complete_ride(user, id, distance).await?;

    Ok(completed.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<RideView>, Error> {
    let ride = api.cancel_ride(user, id).await?;

    Ok(ride.into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use tokio_test::block_on;

    use super::*;
    use crate::db::MemoryStore;
    use crate::engine::Engine;

    fn api() -> DynAPI {
        Arc::new(Engine::new(MemoryStore::new()).unwrap())
    }

    fn create_params(max_seats: i64) -> CreateParams {
        serde_json::from_value(serde_json::json!({
            "destination": "Whitefield",
            "pickup_location": "MG Road",
            "departure_time": Utc::now() + Duration::hours(1),
            "total_fare": 100.0,
            "max_seats": max_seats,
        }))
        .unwrap()
    }

    #[test]
    fn ride_flow_through_handlers() {
        let api = api();
        let creator = User::new(Uuid::new_v4());
        let passenger = User::new(Uuid::new_v4());

        let Json(ride) = block_on(create(
            Extension(api.clone()),
            creator.clone(),
            Json(create_params(1)),
        ))
        .unwrap();

        let Json(joined) = block_on(join(
            Extension(api.clone()),
            passenger.clone(),
            Path(ride.id),
        ))
        .unwrap();
        assert_eq!(joined.status, RideStatus::Full);
        assert_eq!(joined.otp, None);

        let Json(started) = block_on(verify_otp(
            Extension(api.clone()),
            creator.clone(),
            Path(ride.id),
            Json(VerifyOtpParams {
                otp: ride.otp.clone().unwrap(),
            }),
        ))
        .unwrap();
        assert_eq!(started.status, RideStatus::Ongoing);

        let params: CompleteParams = serde_json::from_str("{}").unwrap();
        let Json(completed) = block_on(complete(
            Extension(api.clone()),
            creator,
            Path(ride.id),
            Some(Json(params)),
        ))
        .unwrap();
        assert_eq!(completed.bill.distance, 0.0);
        assert_eq!(completed.bill.creator.amount, 50.0);
    }

    #[test]
    fn completing_without_a_body_bills_tracked_distance() {
        let api = api();
        let creator = User::new(Uuid::new_v4());

        let Json(ride) = block_on(create(
            Extension(api.clone()),
            creator.clone(),
            Json(create_params(2)),
        ))
        .unwrap();

        block_on(verify_otp(
            Extension(api.clone()),
            creator.clone(),
            Path(ride.id),
            Json(VerifyOtpParams {
                otp: ride.otp.clone().unwrap(),
            }),
        ))
        .unwrap();

        for (lat, lng) in [(0.0, 0.0), (0.0, 1.0)] {
            block_on(update_location(
                Extension(api.clone()),
                creator.clone(),
                Path(ride.id),
                Json(UpdateLocationParams {
                    coordinates: Coordinates { lat, lng },
                }),
            ))
            .unwrap();
        }

        let Json(completed) =
            block_on(complete(Extension(api), creator, Path(ride.id), None)).unwrap();
        assert!((completed.bill.distance - 111.19).abs() < 0.01);
        assert_eq!(completed.bill.creator.amount, 100.0);
    }

    #[test]
    fn leaving_removes_the_caller() {
        let api = api();
        let creator = User::new(Uuid::new_v4());
        let passenger = User::new(Uuid::new_v4());

        let Json(ride) =
            block_on(create(Extension(api.clone()), creator, Json(create_params(2)))).unwrap();
        block_on(join(Extension(api.clone()), passenger.clone(), Path(ride.id))).unwrap();

        let Json(left) = block_on(leave(Extension(api), passenger, Path(ride.id))).unwrap();
        assert!(left.passengers.is_empty());
        assert_eq!(left.fare_per_person, 100.0);
    }

    #[test]
    fn list_filters_parse_from_query() {
        let params: ListParams =
            serde_json::from_value(serde_json::json!({ "status": "cancelled" })).unwrap();
        assert_eq!(params.status, Some(RideStatus::Cancelled));
        assert_eq!(params.destination, None);
    }
}
