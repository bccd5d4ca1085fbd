use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub department: Option<String>,
    pub contact_email: Option<String>,
    pub capacity: i64,
    pub current_load: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    pub fn utilization(&self) -> f64 {
        if self.capacity <= 0 {
            return 0.0;
        }
        self.current_load as f64 / self.capacity as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTeam {
    pub name: String,
    pub department: Option<String>,
    pub contact_email: Option<String>,
    pub capacity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTeam {
    pub name: Option<String>,
    pub department: Option<String>,
    pub contact_email: Option<String>,
    pub capacity: Option<i64>,
    pub active: Option<bool>,
}

impl Team {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"SELECT id, name, department, contact_email, capacity, current_load, active, created_at, updated_at
               FROM teams
               ORDER BY name ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Team>(
            r#"SELECT id, name, department, contact_email, capacity, current_load, active, created_at, updated_at
               FROM teams
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn create<'e, E>(
        executor: E,
        id: Uuid,
        data: &CreateTeam,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Team>(
            r#"INSERT INTO teams (id, name, department, contact_email, capacity, current_load, active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, 0, 1, $6, $6)
               RETURNING id, name, department, contact_email, capacity, current_load, active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(data.name.clone())
        .bind(data.department.clone())
        .bind(data.contact_email.clone())
        .bind(data.capacity)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Overwrites the editable columns; `current_load` is owned by the slot operations.
    pub async fn update<'e, E>(
        executor: E,
        team: &Team,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Team>(
            r#"UPDATE teams
               SET name = $2, department = $3, contact_email = $4, capacity = $5, active = $6, updated_at = $7
               WHERE id = $1
               RETURNING id, name, department, contact_email, capacity, current_load, active, created_at, updated_at"#,
        )
        .bind(team.id)
        .bind(team.name.clone())
        .bind(team.department.clone())
        .bind(team.contact_email.clone())
        .bind(team.capacity)
        .bind(team.active)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Takes one unit of capacity if any is free. Returns false when the team is full.
    pub async fn try_acquire_slot<'e, E>(
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE teams SET current_load = current_load + 1, updated_at = $2 WHERE id = $1 AND current_load < capacity",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn release_slot<'e, E>(
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            "UPDATE teams SET current_load = MAX(current_load - 1, 0), updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
