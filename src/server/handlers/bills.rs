use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::Bill;
use crate::error::Error;

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Bill>, Error> {
    let bill = api.find_bill(user, ride_id).await?;

    Ok(bill.into())
}

pub async fn mine(Extension(api): Extension<DynAPI>, user: User) -> Result<Json<Vec<Bill>>, Error> {
    let bills = api.list_my_bills(user).await?;

    Ok(bills.into())
}
