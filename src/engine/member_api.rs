use async_trait::async_trait;
use uuid::Uuid;

use super::Engine;

use crate::{
    api::MemberAPI,
    auth::{Platform, User},
    db::Store,
    entities::Member,
    error::Error,
};

#[async_trait]
impl<S: Store> MemberAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_member(&self, user: User, name: String, email: String) -> Result<Member, Error> {
        self.authorize(user.clone(), "create_member", Platform::default())?;

        let member = Member::new(user.id, name, email)?;

        self.store.insert_member(&member).await?;

        tracing::info!(member_id = %member.id, "member registered");

        Ok(member)
    }

    #[tracing::instrument(skip(self, _user))]
    async fn find_member(&self, _user: User, id: Uuid) -> Result<Member, Error> {
        self.store.find_member(&id).await
    }
}
