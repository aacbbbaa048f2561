use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{RideFilter, RideUpdate, Store};
use crate::entities::{Bill, Member, Ride};
use crate::error::{Error, Violation};

type Database = Postgres;

/// Document store on Postgres: every entity is a JSONB blob next to the
/// scalar columns used for lookups.
pub struct PgStore {
    pool: Pool<Database>,
}

impl PgStore {
    #[tracing::instrument(name = "PgStore::new", skip(db_uri))]
    pub async fn new(db_uri: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_uri)
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS members (id UUID PRIMARY KEY, data JSONB NOT NULL)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS rides (id UUID PRIMARY KEY, creator_id UUID NOT NULL, status VARCHAR NOT NULL, passenger_ids UUID[] NOT NULL, departure_time TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS rides_status_idx ON rides (status, departure_time)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS rides_creator_idx ON rides (creator_id)")
            .await?;

        pool.execute("CREATE TABLE IF NOT EXISTS bills (id UUID PRIMARY KEY, ride_id UUID NOT NULL UNIQUE REFERENCES rides(id), participant_ids UUID[] NOT NULL, completed_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL)")
            .await?;

        Ok(Self { pool })
    }
}

#[tracing::instrument(skip(tx))]
async fn fetch_ride_for_update(tx: &mut Transaction<'_, Database>, id: &Uuid) -> Result<Ride, Error> {
    let Json(ride): Json<Ride> = tx
        .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(Error::not_found_error)?
        .try_get("data")?;

    Ok(ride)
}

#[tracing::instrument(skip(tx))]
async fn write_ride(tx: &mut Transaction<'_, Database>, ride: &Ride) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "UPDATE rides SET status = $2, passenger_ids = $3, departure_time = $4, data = $5 WHERE id = $1",
        )
        .bind(&ride.id)
        .bind(ride.status.name())
        .bind(&ride.passengers)
        .bind(&ride.departure_time)
        .bind(Json(ride)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
async fn insert_bill(tx: &mut Transaction<'_, Database>, bill: &Bill) -> Result<(), Error> {
    let participant_ids: Vec<Uuid> = std::iter::once(bill.creator.user_id)
        .chain(bill.passengers.iter().map(|p| p.user_id))
        .collect();

    let result = tx
        .execute(
            sqlx::query(
                "INSERT INTO bills (id, ride_id, participant_ids, completed_at, data) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (ride_id) DO NOTHING",
            )
            .bind(&bill.id)
            .bind(&bill.ride_id)
            .bind(participant_ids)
            .bind(&bill.completed_at)
            .bind(Json(bill)),
        )
        .await?;

    // a ride is billed once
    if result.rows_affected() == 0 {
        return Err(Error::invalid_state_error());
    }

    Ok(())
}

fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    format!("%{}%", escaped)
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(skip(self))]
    async fn insert_ride(&self, ride: &Ride) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query(
                "INSERT INTO rides (id, creator_id, status, passenger_ids, departure_time, data) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&ride.id)
            .bind(&ride.creator_id)
            .bind(ride.status.name())
            .bind(&ride.passengers)
            .bind(&ride.departure_time)
            .bind(Json(ride)),
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, id: &Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(ride): Json<Ride> = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(id))
            .await?
            .ok_or_else(Error::not_found_error)?
            .try_get("data")?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn list_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, Error> {
        let query = "
            SELECT
                data
            FROM
                rides
            WHERE
                ($1::TEXT[] IS NULL OR status = ANY($1))
                AND ($2::TEXT IS NULL OR data->>'destination' ILIKE $2)
                AND ($3::UUID IS NULL OR creator_id = $3)
                AND ($4::UUID IS NULL OR $4 = ANY(passenger_ids))
        ";

        let statuses: Option<Vec<String>> = filter
            .statuses
            .as_ref()
            .map(|statuses| statuses.iter().map(|s| s.name().to_string()).collect());
        let destination = filter.destination.as_deref().map(like_pattern);

        let mut conn = self.pool.acquire().await?;
        let mut results = conn.fetch(
            sqlx::query(query)
                .bind(statuses)
                .bind(destination)
                .bind(filter.creator_id)
                .bind(filter.passenger_id),
        );

        let mut rides = vec![];
        while let Some(row) = results.try_next().await? {
            let Json(ride): Json<Ride> = row.try_get("data")?;
            rides.push(ride);
        }

        Ok(rides)
    }

    #[tracing::instrument(skip(self, update))]
    async fn update_ride(&self, id: &Uuid, update: RideUpdate) -> Result<(Ride, Option<Bill>), Error> {
        let mut tx = self.pool.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, id).await?;

        // dropping `tx` on error rolls back and releases the row lock
        let bill = update(&mut ride)?;

        write_ride(&mut tx, &ride).await?;

        if let Some(bill) = &bill {
            insert_bill(&mut tx, bill).await?;
        }

        tx.commit().await?;

        Ok((ride, bill))
    }

    #[tracing::instrument(skip(self))]
    async fn find_bill(&self, ride_id: &Uuid) -> Result<Bill, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(bill): Json<Bill> = conn
            .fetch_optional(sqlx::query("SELECT data FROM bills WHERE ride_id = $1").bind(ride_id))
            .await?
            .ok_or_else(Error::not_found_error)?
            .try_get("data")?;

        Ok(bill)
    }

    #[tracing::instrument(skip(self))]
    async fn list_bills(&self, member_id: &Uuid) -> Result<Vec<Bill>, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut results = conn.fetch(
            sqlx::query(
                "SELECT data FROM bills WHERE $1 = ANY(participant_ids) ORDER BY completed_at DESC",
            )
            .bind(member_id),
        );

        let mut bills = vec![];
        while let Some(row) = results.try_next().await? {
            let Json(bill): Json<Bill> = row.try_get("data")?;
            bills.push(bill);
        }

        Ok(bills)
    }

    #[tracing::instrument(skip(self))]
    async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;

        let result = conn
            .execute(
                sqlx::query(
                    "INSERT INTO members (id, data) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
                )
                .bind(&member.id)
                .bind(Json(member)),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::validation_error(vec![Violation::new(
                "id",
                "member already exists",
            )]));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_member(&self, id: &Uuid) -> Result<Member, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(member): Json<Member> = conn
            .fetch_optional(sqlx::query("SELECT data FROM members WHERE id = $1").bind(id))
            .await?
            .ok_or_else(Error::not_found_error)?
            .try_get("data")?;

        Ok(member)
    }

    #[tracing::instrument(skip(self))]
    async fn find_members(&self, ids: &[Uuid]) -> Result<Vec<Member>, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut results = conn.fetch(
            sqlx::query("SELECT data FROM members WHERE id = ANY($1)").bind(ids.to_vec()),
        );

        let mut members = vec![];
        while let Some(row) = results.try_next().await? {
            let Json(member): Json<Member> = row.try_get("data")?;
            members.push(member);
        }

        Ok(members)
    }
}

#[test]
fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("MG Road"), "%MG Road%");
    assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
}
