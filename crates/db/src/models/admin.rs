use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type, types::Json};
use strum_macros::{Display, EnumIter, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "admin_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    Admin,
    Staff,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    ViewReports,
    ManageReports,
    AssignReports,
    ManageTeams,
    ViewAnalytics,
    ManageAdmins,
}

impl AdminRole {
    /// Permissions granted when an admin is created without an explicit list.
    pub fn default_permissions(self) -> Vec<Permission> {
        use Permission::*;
        match self {
            AdminRole::SuperAdmin => vec![
                ViewReports,
                ManageReports,
                AssignReports,
                ManageTeams,
                ViewAnalytics,
                ManageAdmins,
            ],
            AdminRole::Admin => vec![
                ViewReports,
                ManageReports,
                AssignReports,
                ManageTeams,
                ViewAnalytics,
            ],
            AdminRole::Staff => vec![ViewReports, ManageReports],
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub permissions: Json<Vec<Permission>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Admin as exposed over the API, without credentials.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AdminProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    pub permissions: Vec<Permission>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Admin> for AdminProfile {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            name: admin.name,
            role: admin.role,
            permissions: admin.permissions.0,
            last_login_at: admin.last_login_at,
            created_at: admin.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: AdminRole,
    pub permissions: Vec<Permission>,
}

impl Admin {
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Admin>(
            r#"SELECT id, email, name, password_hash, role, permissions, last_login_at, created_at
               FROM admins
               WHERE email = $1"#,
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Admin>(
            r#"SELECT id, email, name, password_hash, role, permissions, last_login_at, created_at
               FROM admins
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Admin>(
            r#"SELECT id, email, name, password_hash, role, permissions, last_login_at, created_at
               FROM admins
               ORDER BY created_at ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM admins")
            .fetch_one(pool)
            .await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: NewAdmin,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Admin>(
            r#"INSERT INTO admins (id, email, name, password_hash, role, permissions, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, email, name, password_hash, role, permissions, last_login_at, created_at"#,
        )
        .bind(id)
        .bind(data.email.trim().to_lowercase())
        .bind(data.name)
        .bind(data.password_hash)
        .bind(data.role)
        .bind(Json(data.permissions))
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn touch_last_login<'e, E>(
        executor: E,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE admins SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(executor)
            .await?;
        Ok(())
    }
}
