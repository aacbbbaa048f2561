use oso::{Oso, PolarClass};

use crate::auth::{Platform, User};
use crate::entities::{Bill, Ride};
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(Platform::get_polar_class())?;
    o.register_class(User::get_polar_class())?;
    o.register_class(Ride::get_polar_class())?;
    o.register_class(Bill::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use uuid::Uuid;

    use super::*;
    use crate::entities::ride::new_ride;

    fn user(id: Uuid) -> User {
        User::new(id)
    }

    #[test]
    fn creator_controls_the_ride() {
        let authorizor = new().unwrap();
        let ride = new_ride(100.0, 3);
        let creator = user(ride.creator_id);

        for action in ["read_otp", "start", "update_location", "complete", "cancel", "revise_fare"] {
            assert!(authorizor
                .is_allowed(creator.clone(), action, ride.clone())
                .unwrap());
        }
    }

    #[test]
    fn strangers_can_only_read_and_join() {
        let authorizor = new().unwrap();
        let ride = new_ride(100.0, 3);
        let stranger = user(Uuid::new_v4());

        assert!(authorizor.is_allowed(stranger.clone(), "read", ride.clone()).unwrap());
        assert!(authorizor.is_allowed(stranger.clone(), "join", ride.clone()).unwrap());

        for action in ["read_otp", "start", "complete", "cancel", "remove_passenger"] {
            assert!(!authorizor
                .is_allowed(stranger.clone(), action, ride.clone())
                .unwrap());
        }
    }

    #[test]
    fn system_user_may_do_anything() {
        let authorizor = new().unwrap();
        let ride = new_ride(100.0, 3);

        assert!(authorizor
            .is_allowed(User::new_system_user(), "complete", ride)
            .unwrap());
        assert!(authorizor
            .is_allowed(User::new_system_user(), "create_ride", Platform::default())
            .unwrap());
    }

    #[test]
    fn only_participants_read_bills() {
        let authorizor = new().unwrap();

        let mut ride = new_ride(100.0, 3);
        let passenger = Uuid::new_v4();
        ride.add_passenger(passenger).unwrap();
        let otp = ride.otp().to_string();
        ride.start(&otp).unwrap();
        ride.complete(1.0).unwrap();

        let bill = Bill::generate(&ride, &HashMap::new()).unwrap();

        assert!(authorizor
            .is_allowed(user(passenger), "read", bill.clone())
            .unwrap());
        assert!(authorizor
            .is_allowed(user(ride.creator_id), "read", bill.clone())
            .unwrap());
        assert!(!authorizor
            .is_allowed(user(Uuid::new_v4()), "read", bill)
            .unwrap());
    }
}
