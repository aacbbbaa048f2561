use std::fmt;

use chrono::{DateTime, Utc};
use oso::PolarClass;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Coordinates;
use crate::error::{Error, Violation};
use crate::fare::compute_fare_per_person;

pub const MIN_SEATS: i64 = 1;
pub const MAX_SEATS: i64 = 10;

#[derive(Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub pickup_location: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub total_fare: f64,
    pub max_seats: u32,
    pub passengers: Vec<Uuid>,
    pub fare_per_person: f64,
    pub status: Status,
    otp: String,
    pub otp_verified: bool,
    pub vehicle_location: Option<Coordinates>,
    pub tracked_distance: f64,
    pub distance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    Full,
    Ongoing,
    Completed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Full => "full",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Open and full rides still accept membership changes and cancellation.
    pub fn is_boarding(&self) -> bool {
        matches!(self, Self::Open | Self::Full)
    }
}

/// Caller-supplied fields for a new ride.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRide {
    pub destination: String,
    pub pickup_location: String,
    pub departure_time: DateTime<Utc>,
    pub total_fare: f64,
    pub max_seats: i64,
}

pub fn validate_ride_input(input: &NewRide) -> Result<(), Error> {
    let mut violations = vec![];

    if input.destination.trim().is_empty() {
        violations.push(Violation::new("destination", "please provide a destination"));
    }

    if input.pickup_location.trim().is_empty() {
        violations.push(Violation::new(
            "pickup_location",
            "please provide a pickup location",
        ));
    }

    if let Err(violation) = validate_fare(input.total_fare) {
        violations.push(violation);
    }

    if input.max_seats < MIN_SEATS {
        violations.push(Violation::new("max_seats", "at least 1 seat required"));
    } else if input.max_seats > MAX_SEATS {
        violations.push(Violation::new("max_seats", "maximum 10 seats allowed"));
    }

    if !violations.is_empty() {
        return Err(Error::validation_error(violations));
    }

    Ok(())
}

fn validate_fare(total_fare: f64) -> Result<(), Violation> {
    if !total_fare.is_finite() {
        return Err(Violation::new("total_fare", "please provide total fare"));
    }

    if total_fare < 0.0 {
        return Err(Violation::new("total_fare", "fare cannot be negative"));
    }

    Ok(())
}

fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

impl Ride {
    pub fn new(creator_id: Uuid, input: NewRide) -> Result<Self, Error> {
        validate_ride_input(&input)?;

        let now = Utc::now();

        let mut ride = Self {
            id: Uuid::new_v4(),
            creator_id,
            pickup_location: input.pickup_location.trim().into(),
            destination: input.destination.trim().into(),
            departure_time: input.departure_time,
            total_fare: input.total_fare,
            max_seats: input.max_seats as u32,
            passengers: vec![],
            fare_per_person: input.total_fare,
            status: Status::Open,
            otp: generate_otp(),
            otp_verified: false,
            vehicle_location: None,
            tracked_distance: 0.0,
            distance: 0.0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        ride.recompute();

        Ok(ride)
    }

    pub fn otp(&self) -> &str {
        &self.otp
    }

    pub fn available_seats(&self) -> u32 {
        self.max_seats.saturating_sub(self.passengers.len() as u32)
    }

    pub fn is_passenger(&self, user_id: &Uuid) -> bool {
        self.passengers.contains(user_id)
    }

    pub fn is_participant(&self, user_id: &Uuid) -> bool {
        self.creator_id == *user_id || self.is_passenger(user_id)
    }

    /// Creator first, then passengers in join order.
    pub fn participants(&self) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(self.passengers.len() + 1);
        ids.push(self.creator_id);
        ids.extend(self.passengers.iter().copied());
        ids
    }

    pub fn add_passenger(&mut self, user_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::Open | Status::Full => {}
            _ => return Err(Error::invalid_state_error()),
        }

        if self.is_participant(&user_id) {
            return Err(Error::already_joined_error());
        }

        if self.status == Status::Full || self.available_seats() == 0 {
            return Err(Error::capacity_exceeded_error());
        }

        self.passengers.push(user_id);
        self.touch();

        Ok(())
    }

    pub fn remove_passenger(&mut self, user_id: &Uuid) -> Result<(), Error> {
        if !self.status.is_boarding() {
            return Err(Error::invalid_state_error());
        }

        let index = self
            .passengers
            .iter()
            .position(|id| id == user_id)
            .ok_or_else(Error::not_a_passenger_error)?;

        self.passengers.remove(index);
        self.status = Status::Open;
        self.touch();

        Ok(())
    }

    pub fn revise_fare(&mut self, total_fare: f64) -> Result<(), Error> {
        if !self.status.is_boarding() {
            return Err(Error::invalid_state_error());
        }

        validate_fare(total_fare).map_err(|violation| Error::validation_error(vec![violation]))?;

        self.total_fare = total_fare;
        self.touch();

        Ok(())
    }

    pub fn start(&mut self, presented_otp: &str) -> Result<(), Error> {
        if !self.status.is_boarding() {
            return Err(Error::invalid_state_error());
        }

        if presented_otp != self.otp {
            return Err(Error::otp_mismatch_error());
        }

        self.otp_verified = true;
        self.status = Status::Ongoing;
        self.started_at = Some(Utc::now());
        self.touch();

        Ok(())
    }

    /// Last write wins; fixes are not reordered.
    pub fn update_vehicle_location(&mut self, coordinates: Coordinates) -> Result<(), Error> {
        match self.status {
            Status::Ongoing => {}
            _ => return Err(Error::invalid_state_error()),
        }

        if !coordinates.is_valid() {
            return Err(Error::validation_error(vec![Violation::new(
                "coordinates",
                "coordinates out of range",
            )]));
        }

        if let Some(previous) = &self.vehicle_location {
            self.tracked_distance += previous.distance_km(&coordinates);
        }

        self.vehicle_location = Some(coordinates);
        self.touch();

        Ok(())
    }

    pub fn complete(&mut self, distance_km: f64) -> Result<(), Error> {
        match self.status {
            Status::Ongoing => {}
            _ => return Err(Error::invalid_state_error()),
        }

        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(Error::validation_error(vec![Violation::new(
                "distance",
                "distance must be a non-negative number",
            )]));
        }

        let now = Utc::now();

        self.distance = distance_km;
        self.status = Status::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;

        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), Error> {
        if !self.status.is_boarding() {
            return Err(Error::invalid_state_error());
        }

        self.status = Status::Cancelled;
        self.updated_at = Utc::now();

        Ok(())
    }

    /// Read-side projection. The OTP is only carried when `reveal_otp` is set.
    pub fn view(&self, reveal_otp: bool) -> RideView {
        RideView {
            id: self.id,
            creator_id: self.creator_id,
            pickup_location: self.pickup_location.clone(),
            destination: self.destination.clone(),
            departure_time: self.departure_time,
            total_fare: self.total_fare,
            max_seats: self.max_seats,
            available_seats: self.available_seats(),
            passengers: self.passengers.clone(),
            fare_per_person: self.fare_per_person,
            status: self.status,
            otp: reveal_otp.then(|| self.otp.clone()),
            otp_verified: self.otp_verified,
            vehicle_location: self.vehicle_location,
            tracked_distance: self.tracked_distance,
            distance: self.distance,
            created_at: self.created_at,
            updated_at: self.updated_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }

    fn touch(&mut self) {
        self.recompute();
        self.updated_at = Utc::now();
    }

    // farePerPerson and the open/full flip are derived from membership and
    // must be refreshed after every change to either.
    fn recompute(&mut self) {
        self.fare_per_person = compute_fare_per_person(self.total_fare, self.passengers.len() + 1);

        if self.status.is_boarding() {
            self.status = if self.available_seats() == 0 {
                Status::Full
            } else {
                Status::Open
            };
        }
    }
}

impl fmt::Debug for Ride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ride")
            .field("id", &self.id)
            .field("creator_id", &self.creator_id)
            .field("status", &self.status)
            .field("total_fare", &self.total_fare)
            .field("max_seats", &self.max_seats)
            .field("passengers", &self.passengers)
            .field("fare_per_person", &self.fare_per_person)
            .field("otp", &"<redacted>")
            .field("otp_verified", &self.otp_verified)
            .finish_non_exhaustive()
    }
}

impl PolarClass for Ride {
    fn get_polar_class_builder() -> oso::ClassBuilder<Ride> {
        oso::Class::builder()
            .name("Ride")
            .add_attribute_getter("id", |recv: &Ride| recv.id.to_string())
            .add_attribute_getter("creator_id", |recv: &Ride| recv.creator_id.to_string())
            .add_attribute_getter("status", |recv: &Ride| recv.status.name().to_string())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Ride::get_polar_class_builder();
        builder.build()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RideView {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub pickup_location: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub total_fare: f64,
    pub max_seats: u32,
    pub available_seats: u32,
    pub passengers: Vec<Uuid>,
    pub fare_per_person: f64,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    pub otp_verified: bool,
    pub vehicle_location: Option<Coordinates>,
    pub tracked_distance: f64,
    pub distance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
pub(crate) fn new_ride(total_fare: f64, max_seats: i64) -> Ride {
    Ride::new(
        Uuid::new_v4(),
        NewRide {
            destination: "Koramangala".into(),
            pickup_location: "Indiranagar".into(),
            departure_time: Utc::now(),
            total_fare,
            max_seats,
        },
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ride_is_open_with_single_share() {
        let ride = new_ride(100.0, 3);

        assert_eq!(ride.status, Status::Open);
        assert_eq!(ride.fare_per_person, 100.0);
        assert_eq!(ride.available_seats(), 3);
        assert!(!ride.otp_verified);
        assert_eq!(ride.otp().len(), 6);
        assert!(ride.otp().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn validation_collects_every_violation() {
        let input = NewRide {
            destination: "  ".into(),
            pickup_location: "".into(),
            departure_time: Utc::now(),
            total_fare: -1.0,
            max_seats: 11,
        };

        let err = validate_ride_input(&input).unwrap_err();
        assert!(err.is_validation_error());

        let fields: Vec<&str> = err.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["destination", "pickup_location", "total_fare", "max_seats"]
        );
    }

    #[test]
    fn validation_rejects_zero_seats_and_nan_fare() {
        let mut input = NewRide {
            destination: "Airport".into(),
            pickup_location: "Station".into(),
            departure_time: Utc::now(),
            total_fare: f64::NAN,
            max_seats: 0,
        };
        assert_eq!(validate_ride_input(&input).unwrap_err().violations.len(), 2);

        input.total_fare = 0.0;
        input.max_seats = 10;
        assert!(validate_ride_input(&input).is_ok());
    }

    #[test]
    fn fills_up_and_recomputes_fare() {
        let mut ride = new_ride(100.0, 3);

        ride.add_passenger(Uuid::new_v4()).unwrap();
        ride.add_passenger(Uuid::new_v4()).unwrap();
        assert_eq!(ride.fare_per_person, 34.0);
        assert_eq!(ride.status, Status::Open);

        ride.add_passenger(Uuid::new_v4()).unwrap();
        assert_eq!(ride.fare_per_person, 25.0);
        assert_eq!(ride.status, Status::Full);
        assert_eq!(ride.available_seats(), 0);

        let before = ride.passengers.clone();
        let err = ride.add_passenger(Uuid::new_v4()).unwrap_err();
        assert!(err.is_capacity_exceeded_error());
        assert_eq!(ride.passengers, before);
    }

    #[test]
    fn rejects_duplicate_and_creator() {
        let mut ride = new_ride(90.0, 3);
        let passenger = Uuid::new_v4();

        ride.add_passenger(passenger).unwrap();
        assert!(ride.add_passenger(passenger).unwrap_err().is_already_joined_error());

        let creator = ride.creator_id;
        assert!(ride.add_passenger(creator).unwrap_err().is_already_joined_error());
        assert_eq!(ride.passengers, vec![passenger]);
    }

    #[test]
    fn leaving_a_full_ride_reopens_it() {
        let mut ride = new_ride(100.0, 2);
        let first = Uuid::new_v4();

        ride.add_passenger(first).unwrap();
        ride.add_passenger(Uuid::new_v4()).unwrap();
        assert_eq!(ride.status, Status::Full);

        ride.remove_passenger(&first).unwrap();
        assert_eq!(ride.status, Status::Open);
        assert_eq!(ride.fare_per_person, 50.0);

        let err = ride.remove_passenger(&first).unwrap_err();
        assert!(err.is_not_a_passenger_error());
    }

    #[test]
    fn wrong_otp_leaves_ride_untouched() {
        let mut ride = new_ride(100.0, 1);
        ride.add_passenger(Uuid::new_v4()).unwrap();

        let wrong = if ride.otp() == "123456" { "654321" } else { "123456" };
        assert!(ride.start(wrong).unwrap_err().is_otp_mismatch_error());
        assert_eq!(ride.status, Status::Full);
        assert!(!ride.otp_verified);

        let otp = ride.otp().to_string();
        ride.start(&otp).unwrap();
        assert_eq!(ride.status, Status::Ongoing);
        assert!(ride.otp_verified);
        assert!(ride.started_at.is_some());
    }

    #[test]
    fn membership_is_frozen_once_ongoing() {
        let mut ride = new_ride(100.0, 3);
        let passenger = Uuid::new_v4();
        ride.add_passenger(passenger).unwrap();

        let otp = ride.otp().to_string();
        ride.start(&otp).unwrap();

        assert!(ride.add_passenger(Uuid::new_v4()).unwrap_err().is_invalid_state_error());
        assert!(ride.remove_passenger(&passenger).unwrap_err().is_invalid_state_error());
        assert!(ride.cancel().unwrap_err().is_invalid_state_error());
        assert!(ride.revise_fare(10.0).unwrap_err().is_invalid_state_error());
        assert!(ride.start(&otp).unwrap_err().is_invalid_state_error());
        assert_eq!(ride.passengers, vec![passenger]);
        assert_eq!(ride.status, Status::Ongoing);
    }

    #[test]
    fn location_updates_only_while_ongoing() {
        let mut ride = new_ride(100.0, 3);
        let fix = Coordinates { lat: 0.0, lng: 0.0 };

        assert!(ride.update_vehicle_location(fix).unwrap_err().is_invalid_state_error());

        let otp = ride.otp().to_string();
        ride.start(&otp).unwrap();

        ride.update_vehicle_location(fix).unwrap();
        ride.update_vehicle_location(Coordinates { lat: 0.0, lng: 1.0 }).unwrap();
        assert_eq!(ride.vehicle_location, Some(Coordinates { lat: 0.0, lng: 1.0 }));
        assert!((ride.tracked_distance - 111.19).abs() < 0.01);

        let err = ride
            .update_vehicle_location(Coordinates { lat: 91.0, lng: 0.0 })
            .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn completes_only_from_ongoing() {
        let mut ride = new_ride(100.0, 3);
        assert!(ride.complete(5.0).unwrap_err().is_invalid_state_error());

        let passenger = Uuid::new_v4();
        ride.add_passenger(passenger).unwrap();

        let otp = ride.otp().to_string();
        ride.start(&otp).unwrap();
        assert!(ride.complete(-1.0).unwrap_err().is_validation_error());

        ride.complete(12.5).unwrap();
        assert_eq!(ride.status, Status::Completed);
        assert_eq!(ride.distance, 12.5);
        assert!(ride.complete(12.5).unwrap_err().is_invalid_state_error());
        assert!(ride.cancel().unwrap_err().is_invalid_state_error());

        assert!(ride.add_passenger(Uuid::new_v4()).unwrap_err().is_invalid_state_error());
        assert!(ride.remove_passenger(&passenger).unwrap_err().is_invalid_state_error());
        assert_eq!(ride.passengers, vec![passenger]);
        assert_eq!(ride.status, Status::Completed);
    }

    #[test]
    fn cancelled_ride_is_terminal() {
        let mut ride = new_ride(100.0, 3);
        let passenger = Uuid::new_v4();
        ride.add_passenger(passenger).unwrap();

        ride.cancel().unwrap();
        assert_eq!(ride.status, Status::Cancelled);

        assert!(ride.add_passenger(Uuid::new_v4()).unwrap_err().is_invalid_state_error());
        assert!(ride.remove_passenger(&passenger).unwrap_err().is_invalid_state_error());
        assert!(ride.cancel().unwrap_err().is_invalid_state_error());
        let otp = ride.otp().to_string();
        assert!(ride.start(&otp).unwrap_err().is_invalid_state_error());
        assert_eq!(ride.passengers, vec![passenger]);
        assert_eq!(ride.status, Status::Cancelled);
    }

    #[test]
    fn otp_must_match_exactly() {
        let mut ride = new_ride(100.0, 3);
        let padded = format!(" {} ", ride.otp());

        assert!(ride.start(&padded).unwrap_err().is_otp_mismatch_error());
        assert_eq!(ride.status, Status::Open);
        assert!(!ride.otp_verified);

        let otp = ride.otp().to_string();
        ride.start(&otp).unwrap();
        assert_eq!(ride.status, Status::Ongoing);
    }

    #[test]
    fn revised_fare_is_split_again() {
        let mut ride = new_ride(100.0, 3);
        ride.add_passenger(Uuid::new_v4()).unwrap();
        assert_eq!(ride.fare_per_person, 50.0);

        ride.revise_fare(75.0).unwrap();
        assert_eq!(ride.fare_per_person, 38.0);
        assert!(ride.revise_fare(-5.0).unwrap_err().is_validation_error());
        assert_eq!(ride.total_fare, 75.0);
    }

    #[test]
    fn view_hides_otp_unless_revealed() {
        let ride = new_ride(100.0, 3);

        assert_eq!(ride.view(false).otp, None);
        assert_eq!(ride.view(true).otp.as_deref(), Some(ride.otp()));
        assert_eq!(ride.view(false).available_seats, 3);

        let json = serde_json::to_value(ride.view(false)).unwrap();
        assert!(json.get("otp").is_none());
        assert!(!format!("{:?}", ride).contains(ride.otp()));
    }
}
