mod bill_api;
mod member_api;
mod ride_api;


use oso::Oso;

use crate::{
    api::API,
    auth::{authorizor, User},
    db::Store,
    entities::{Ride, RideView},
    error::Error,
};

pub struct Engine<S> {
    store: S,
    authorizor: Oso,
}

impl<S: Store> Engine<S> {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(store: S) -> Result<Self, Error> {
        Ok(Self {
            store,
            authorizor: authorizor::new()?,
        })
    }
}

impl<S> Engine<S> {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(Error::unauthorized_error())
    }

    /// Projects `ride` for `user`; only the creator sees the OTP.
    fn view_for(&self, user: &User, ride: &Ride) -> Result<RideView, Error> {
        let reveal_otp = self
            .authorizor
            .is_allowed(user.clone(), "read_otp", ride.clone())?;

        Ok(ride.view(reveal_otp))
    }
}

impl<S: Store> API for Engine<S> {}
