use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::DynAPI;
use crate::auth::User;
use crate::entities::Member;
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    name: String,
    email: String,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<CreateParams>,
) -> Result<Json<Member>, Error> {
    let member = api.create_member(user, params.name, params.email).await?;

    Ok(member.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Member>, Error> {
    let member = api.find_member(user, id).await?;

    Ok(member.into())
}
