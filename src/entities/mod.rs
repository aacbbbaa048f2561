mod bill;
mod location;
mod member;
pub(crate) mod ride;

pub use bill::{ride_reference, Bill, BillParty};
pub use location::Coordinates;
pub use member::Member;
pub use ride::{validate_ride_input, NewRide, Ride, RideView, Status as RideStatus};
