mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{delete, get, patch, post},
    Router,
};

use crate::api::{DynAPI, API};
use crate::error::Error;
use crate::server::handlers::{bills, members, rides};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/members", post(members::create))
        .route("/members/:id", get(members::find))
        .route("/rides", post(rides::create).get(rides::list))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/join", post(rides::join))
        .route("/rides/:id/leave", post(rides::leave))
        .route(
            "/rides/:id/passengers/:passenger_id",
            delete(rides::remove_passenger),
        )
        .route("/rides/:id/fare", patch(rides::revise_fare))
        .route("/rides/:id/verify-otp", post(rides::verify_otp))
        .route("/rides/:id/location", patch(rides::update_location))
        .route("/rides/:id/complete", patch(rides::complete))
        .route("/rides/:id/cancel", patch(rides::cancel))
        .route("/my/rides", get(rides::mine))
        .route("/my/bills", get(bills::mine))
        .route("/bills/:ride_id", get(bills::find))
        .layer(Extension(api))
}

pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    let app = router(Arc::new(api) as DynAPI);

    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|err| {
            tracing::error!("server error: {:?}", err);
            Error::unexpected_error()
        })
}
