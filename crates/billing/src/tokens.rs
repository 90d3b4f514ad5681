//! Token directory
//!
//! Pure lookup over registered device tokens. A nonexistent member simply has
//! no tokens; lookups never fail on absence.

use std::collections::HashMap;

use async_trait::async_trait;
use duespay_shared::Role;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BillingResult;

#[async_trait]
pub trait TokenDirectory: Send + Sync {
    /// Tokens currently registered to one member (possibly empty)
    async fn tokens_for(&self, member_id: Uuid) -> BillingResult<Vec<String>>;

    /// Tokens for every member holding `role`, keyed by member.
    ///
    /// Implementations must iterate the full population without assuming an
    /// upper bound on its size.
    async fn tokens_for_role(&self, role: Role) -> BillingResult<HashMap<Uuid, Vec<String>>>;
}

/// Postgres-backed token directory
#[derive(Clone)]
pub struct PgTokenDirectory {
    pool: PgPool,
}

/// Page size for the role-wide token scan
const ROLE_SCAN_PAGE: i64 = 1000;

impl PgTokenDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenDirectory for PgTokenDirectory {
    async fn tokens_for(&self, member_id: Uuid) -> BillingResult<Vec<String>> {
        let tokens: Vec<String> =
            sqlx::query_scalar("SELECT token FROM device_tokens WHERE member_id = $1")
                .bind(member_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(tokens)
    }

    async fn tokens_for_role(&self, role: Role) -> BillingResult<HashMap<Uuid, Vec<String>>> {
        let mut by_member: HashMap<Uuid, Vec<String>> = HashMap::new();
        let mut cursor: Option<Uuid> = None;

        // Keyset pagination over members so an unbounded population never
        // materializes in one query.
        loop {
            let members: Vec<Uuid> = sqlx::query_scalar(
                r#"
                SELECT id FROM members
                WHERE role = $1
                  AND ($2::uuid IS NULL OR id > $2)
                ORDER BY id
                LIMIT $3
                "#,
            )
            .bind(role.as_str())
            .bind(cursor)
            .bind(ROLE_SCAN_PAGE)
            .fetch_all(&self.pool)
            .await?;

            let Some(last) = members.last().copied() else {
                break;
            };

            let rows: Vec<(Uuid, String)> = sqlx::query_as(
                "SELECT member_id, token FROM device_tokens WHERE member_id = ANY($1)",
            )
            .bind(&members)
            .fetch_all(&self.pool)
            .await?;

            for (member_id, token) in rows {
                by_member.entry(member_id).or_default().push(token);
            }

            if members.len() < ROLE_SCAN_PAGE as usize {
                break;
            }
            cursor = Some(last);
        }

        Ok(by_member)
    }
}
