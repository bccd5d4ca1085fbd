//! Admin accounts, password and guest login, and session tokens.

use std::{str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, TimeZone, Utc};
use db::{
    DBService,
    models::admin::{Admin, AdminProfile, AdminRole, NewAdmin, Permission},
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::{
    jwt::{self, TokenClaims, TokenError},
    password,
};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const GUEST_SUBJECT: &str = "guest";
// compared against when the email is unknown so both failures cost the same
const DUMMY_HASH: &str =
    "sha256$00000000000000000000000000000000$0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("guest access is disabled")]
    GuestDisabled,
    #[error("session expired")]
    TokenExpired,
    #[error("invalid session token")]
    InvalidToken,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("{0}")]
    Validation(String),
    #[error("an admin with email {0} already exists")]
    DuplicateEmail(String),
    #[error("only a super admin can do that")]
    Forbidden,
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid(_) => AuthError::InvalidToken,
            TokenError::Signing(e) => AuthError::Signing(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionRole {
    SuperAdmin,
    Admin,
    Staff,
    Guest,
}

impl From<AdminRole> for SessionRole {
    fn from(role: AdminRole) -> Self {
        match role {
            AdminRole::SuperAdmin => SessionRole::SuperAdmin,
            AdminRole::Admin => SessionRole::Admin,
            AdminRole::Staff => SessionRole::Staff,
        }
    }
}

/// Verified identity behind a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Session {
    pub subject: String,
    pub admin_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: SessionRole,
    pub permissions: Vec<Permission>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_guest(&self) -> bool {
        self.role == SessionRole::Guest
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role == SessionRole::SuperAdmin || self.permissions.contains(&permission)
    }

    /// Name written into report logs for actions taken in this session.
    pub fn actor(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.subject)
    }
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub guest_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct GuestLoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: SessionRole,
    pub admin: Option<AdminProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateAdminRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: AdminRole,
    /// Falls back to the role's defaults when omitted
    pub permissions: Option<Vec<Permission>>,
}

#[derive(Clone)]
pub struct AuthService {
    db: DBService,
    settings: Arc<AuthSettings>,
}

impl AuthService {
    pub fn new(db: DBService, settings: AuthSettings) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
        }
    }

    pub fn guest_enabled(&self) -> bool {
        self.settings.guest_password.is_some()
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let admin = Admin::find_by_email(&self.db.pool, &request.email).await?;
        let stored = admin
            .as_ref()
            .map(|a| a.password_hash.as_str())
            .unwrap_or(DUMMY_HASH);
        let password_ok = password::verify_password(&request.password, stored);
        let Some(admin) = admin.filter(|_| password_ok) else {
            warn!(email = %request.email.trim(), "Failed admin login");
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();
        Admin::touch_last_login(&self.db.pool, admin.id, now).await?;
        let claims = TokenClaims::new(
            admin.id.to_string(),
            Some(admin.email.clone()),
            SessionRole::from(admin.role).to_string(),
            admin.permissions.0.iter().map(ToString::to_string).collect(),
            self.settings.token_ttl,
        );
        let token = jwt::issue(self.settings.jwt_secret.as_bytes(), &claims)?;

        info!(admin_id = %admin.id, role = %admin.role, "Admin logged in");
        let mut profile = AdminProfile::from(admin);
        profile.last_login_at = Some(now);
        Ok(LoginResponse {
            token,
            expires_at: timestamp(claims.exp),
            role: claims_role(&claims)?,
            admin: Some(profile),
        })
    }

    pub fn guest_login(&self, request: GuestLoginRequest) -> Result<LoginResponse, AuthError> {
        let Some(expected) = self.settings.guest_password.as_deref() else {
            return Err(AuthError::GuestDisabled);
        };
        if !password::secrets_match(&request.password, expected) {
            return Err(AuthError::InvalidCredentials);
        }

        let claims = TokenClaims::new(
            GUEST_SUBJECT,
            None,
            SessionRole::Guest.to_string(),
            Vec::new(),
            self.settings.token_ttl,
        );
        let token = jwt::issue(self.settings.jwt_secret.as_bytes(), &claims)?;
        info!("Guest session issued");
        Ok(LoginResponse {
            token,
            expires_at: timestamp(claims.exp),
            role: SessionRole::Guest,
            admin: None,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Session, AuthError> {
        let claims = jwt::verify(self.settings.jwt_secret.as_bytes(), token)?;
        let role = claims_role(&claims)?;
        let admin_id = match role {
            SessionRole::Guest => None,
            _ => Some(Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?),
        };
        let permissions = claims
            .permissions
            .iter()
            .filter_map(|p| Permission::from_str(p).ok())
            .collect();
        Ok(Session {
            expires_at: timestamp(claims.exp),
            subject: claims.sub,
            admin_id,
            email: claims.email,
            role,
            permissions,
        })
    }

    pub async fn profile(&self, admin_id: Uuid) -> Result<Option<AdminProfile>, AuthError> {
        Ok(Admin::find_by_id(&self.db.pool, admin_id)
            .await?
            .map(Into::into))
    }

    pub async fn list_admins(&self) -> Result<Vec<AdminProfile>, AuthError> {
        let admins = Admin::find_all(&self.db.pool).await?;
        Ok(admins.into_iter().map(Into::into).collect())
    }

    pub async fn create_admin(
        &self,
        creator: &Session,
        request: CreateAdminRequest,
    ) -> Result<AdminProfile, AuthError> {
        if request.role == AdminRole::SuperAdmin && creator.role != SessionRole::SuperAdmin {
            return Err(AuthError::Forbidden);
        }
        let admin = self.insert_admin(request).await?;
        info!(
            admin_id = %admin.id,
            role = %admin.role,
            created_by = creator.actor(),
            "Admin created"
        );
        Ok(admin.into())
    }

    /// Creates the first super admin when the table is empty. Returns None if
    /// any admin already exists.
    pub async fn seed_super_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AdminProfile>, AuthError> {
        if Admin::count(&self.db.pool).await? > 0 {
            return Ok(None);
        }
        let admin = self
            .insert_admin(CreateAdminRequest {
                email: email.to_string(),
                name: "Super Admin".to_string(),
                password: password.to_string(),
                role: AdminRole::SuperAdmin,
                permissions: Some(Permission::iter().collect()),
            })
            .await?;
        info!(admin_id = %admin.id, email = %admin.email, "Seeded bootstrap super admin");
        Ok(Some(admin.into()))
    }

    async fn insert_admin(&self, request: CreateAdminRequest) -> Result<Admin, AuthError> {
        let email = request.email.trim().to_lowercase();
        if !email.contains('@') || email.len() < 3 {
            return Err(AuthError::Validation(format!(
                "{email} is not an email address"
            )));
        }
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AuthError::Validation("name is required".to_string()));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut permissions: Vec<Permission> = Vec::new();
        for permission in request
            .permissions
            .unwrap_or_else(|| request.role.default_permissions())
        {
            if !permissions.contains(&permission) {
                permissions.push(permission);
            }
        }

        Admin::create(
            &self.db.pool,
            NewAdmin {
                email: email.clone(),
                name,
                password_hash: password::hash_password(&request.password),
                role: request.role,
                permissions,
            },
            Utc::now(),
        )
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AuthError::DuplicateEmail(email)
            } else {
                AuthError::Database(e)
            }
        })
    }
}

fn claims_role(claims: &TokenClaims) -> Result<SessionRole, AuthError> {
    SessionRole::from_str(&claims.role).map_err(|_| AuthError::InvalidToken)
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}
