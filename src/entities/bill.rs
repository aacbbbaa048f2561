use std::collections::HashMap;

use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Member, Ride, RideStatus};
use crate::error::Error;

/// Immutable post-completion snapshot of a ride's charges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub reference: String,
    pub distance: f64,
    pub total_fare: f64,
    pub creator: BillParty,
    pub passengers: Vec<BillParty>,
    pub pickup_location: String,
    pub destination: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BillParty {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub amount: f64,
}

impl BillParty {
    fn new(user_id: Uuid, amount: f64, members: &HashMap<Uuid, Member>) -> Self {
        let member = members.get(&user_id);

        Self {
            user_id,
            name: member.map(|m| m.name.clone()),
            email: member.map(|m| m.email.clone()),
            amount,
        }
    }
}

/// Short display code for a ride: the last eight hex digits of its id.
pub fn ride_reference(ride_id: &Uuid) -> String {
    let simple = ride_id.simple().to_string();
    simple[simple.len() - 8..].to_uppercase()
}

impl Bill {
    /// Every participant, creator included, is charged the ride's stored
    /// `fare_per_person`. The rounding surplus is kept, not redistributed.
    ///
    /// `members` supplies names and emails; participants missing from it are
    /// billed without contact details.
    pub fn generate(ride: &Ride, members: &HashMap<Uuid, Member>) -> Result<Self, Error> {
        if ride.status != RideStatus::Completed {
            return Err(Error::invalid_state_error());
        }

        let amount = ride.fare_per_person;

        Ok(Self {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            reference: ride_reference(&ride.id),
            distance: ride.distance,
            total_fare: ride.total_fare,
            creator: BillParty::new(ride.creator_id, amount, members),
            passengers: ride
                .passengers
                .iter()
                .map(|id| BillParty::new(*id, amount, members))
                .collect(),
            pickup_location: ride.pickup_location.clone(),
            destination: ride.destination.clone(),
            completed_at: ride.completed_at.unwrap_or_else(Utc::now),
        })
    }

    pub fn collected(&self) -> f64 {
        self.creator.amount + self.passengers.iter().map(|p| p.amount).sum::<f64>()
    }

    pub fn is_participant(&self, user_id: &Uuid) -> bool {
        self.creator.user_id == *user_id || self.passengers.iter().any(|p| p.user_id == *user_id)
    }

    fn participant_ids(&self) -> Vec<String> {
        std::iter::once(&self.creator)
            .chain(self.passengers.iter())
            .map(|p| p.user_id.to_string())
            .collect()
    }
}

impl PolarClass for Bill {
    fn get_polar_class_builder() -> oso::ClassBuilder<Bill> {
        oso::Class::builder()
            .name("Bill")
            .add_attribute_getter("creator_id", |recv: &Bill| recv.creator.user_id.to_string())
            .add_attribute_getter("participant_ids", |recv: &Bill| recv.participant_ids())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Bill::get_polar_class_builder();
        builder.build()
    }
}
