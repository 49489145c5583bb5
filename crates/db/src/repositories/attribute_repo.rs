//! Read-only repository for the `attributes` table.

use sqlx::PgPool;

use crate::models::attribute::AttributeRow;

pub struct AttributeRepo;

impl AttributeRepo {
    pub async fn count_by_value(pool: &PgPool, value: &str) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attributes WHERE value = $1")
            .bind(value)
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn find_by_value(
        pool: &PgPool,
        value: &str,
        limit: i64,
    ) -> Result<Vec<AttributeRow>, sqlx::Error> {
        sqlx::query_as::<_, AttributeRow>(
            "SELECT id, event_id, value FROM attributes \
             WHERE value = $1 ORDER BY id LIMIT $2",
        )
        .bind(value)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Seed helper used by tests and imports.
    pub async fn insert(
        pool: &PgPool,
        event_id: &str,
        value: &str,
    ) -> Result<AttributeRow, sqlx::Error> {
        sqlx::query_as::<_, AttributeRow>(
            "INSERT INTO attributes (event_id, value) VALUES ($1, $2) \
             RETURNING id, event_id, value",
        )
        .bind(event_id)
        .bind(value)
        .fetch_one(pool)
        .await
    }
}
