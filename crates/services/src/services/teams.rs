use chrono::Utc;
use db::{
    DBService,
    models::{
        report::Report,
        team::{CreateTeam, Team, UpdateTeam},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("team not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("a team named {0} already exists")]
    DuplicateName(String),
    #[error("team still holds {0} open assignments")]
    HasOpenAssignments(i64),
}

/// Team with its derived utilisation, as listed in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TeamWithLoad {
    #[serde(flatten)]
    pub team: Team,
    pub utilization: f64,
    pub available_slots: i64,
}

impl From<Team> for TeamWithLoad {
    fn from(team: Team) -> Self {
        Self {
            utilization: team.utilization(),
            available_slots: (team.capacity - team.current_load).max(0),
            team,
        }
    }
}

#[derive(Clone)]
pub struct TeamService {
    db: DBService,
}

impl TeamService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<TeamWithLoad>, TeamError> {
        let teams = Team::find_all(&self.db.pool).await?;
        Ok(teams.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<TeamWithLoad, TeamError> {
        Team::find_by_id(&self.db.pool, id)
            .await?
            .map(Into::into)
            .ok_or(TeamError::NotFound)
    }

    pub async fn create(&self, payload: CreateTeam) -> Result<Team, TeamError> {
        let payload = CreateTeam {
            name: validate_name(&payload.name)?,
            department: blank_to_none(payload.department),
            contact_email: validate_email(payload.contact_email)?,
            capacity: payload.capacity,
        };
        if payload.capacity < 1 {
            return Err(TeamError::Validation(
                "capacity must be at least 1".to_string(),
            ));
        }

        let team = Team::create(&self.db.pool, Uuid::new_v4(), &payload, Utc::now())
            .await
            .map_err(|e| duplicate_or(e, &payload.name))?;
        info!(team_id = %team.id, name = %team.name, capacity = team.capacity, "Team created");
        Ok(team)
    }

    pub async fn update(&self, id: Uuid, payload: UpdateTeam) -> Result<Team, TeamError> {
        let mut tx = self.db.begin_write().await?;
        let mut team = Team::find_by_id(&mut *tx, id)
            .await?
            .ok_or(TeamError::NotFound)?;

        if let Some(name) = payload.name {
            team.name = validate_name(&name)?;
        }
        if let Some(department) = payload.department {
            team.department = blank_to_none(Some(department));
        }
        if let Some(contact_email) = payload.contact_email {
            team.contact_email = validate_email(Some(contact_email))?;
        }
        if let Some(capacity) = payload.capacity {
            if capacity < 1 {
                return Err(TeamError::Validation(
                    "capacity must be at least 1".to_string(),
                ));
            }
            if capacity < team.current_load {
                return Err(TeamError::Validation(format!(
                    "capacity cannot drop below the current load of {}",
                    team.current_load
                )));
            }
            team.capacity = capacity;
        }
        if let Some(active) = payload.active {
            team.active = active;
        }

        let name = team.name.clone();
        let updated = Team::update(&mut *tx, &team, Utc::now())
            .await
            .map_err(|e| duplicate_or(e, &name))?;
        tx.commit().await?;
        info!(team_id = %updated.id, "Team updated");
        Ok(updated)
    }

    /// Removes an idle team; reports that still reference it are detached.
    pub async fn delete(&self, id: Uuid) -> Result<(), TeamError> {
        let mut tx = self.db.begin_write().await?;
        let team = Team::find_by_id(&mut *tx, id)
            .await?
            .ok_or(TeamError::NotFound)?;
        if team.current_load > 0 {
            return Err(TeamError::HasOpenAssignments(team.current_load));
        }
        let detached = Report::clear_team(&mut *tx, id).await?;
        Team::delete(&mut *tx, id).await?;
        tx.commit().await?;
        info!(team_id = %id, name = %team.name, detached, "Team deleted");
        Ok(())
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_name(name: &str) -> Result<String, TeamError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TeamError::Validation("team name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(TeamError::Validation(format!(
            "team name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_email(email: Option<String>) -> Result<Option<String>, TeamError> {
    match blank_to_none(email) {
        Some(email) if !email.contains('@') => Err(TeamError::Validation(format!(
            "{email} is not an email address"
        ))),
        email => Ok(email),
    }
}

fn duplicate_or(error: sqlx::Error, name: &str) -> TeamError {
    if error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
    {
        TeamError::DuplicateName(name.to_string())
    } else {
        TeamError::Database(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_team(name: &str, capacity: i64) -> CreateTeam {
        CreateTeam {
            name: name.to_string(),
            department: Some("Public Works".to_string()),
            contact_email: None,
            capacity,
        }
    }

    async fn service() -> (DBService, TeamService) {
        let db = DBService::new_in_memory().await.unwrap();
        (db.clone(), TeamService::new(db))
    }

    #[tokio::test]
    async fn names_are_unique_ignoring_case() {
        let (_, teams) = service().await;
        teams.create(new_team("Roads", 3)).await.unwrap();
        assert!(matches!(
            teams.create(new_team(" roads ", 2)).await,
            Err(TeamError::DuplicateName(_))
        ));
    }

    #[tokio::test]
    async fn capacity_must_be_positive() {
        let (_, teams) = service().await;
        assert!(matches!(
            teams.create(new_team("Parks", 0)).await,
            Err(TeamError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn capacity_cannot_shrink_below_load() {
        let (db, teams) = service().await;
        let team = teams.create(new_team("Water", 3)).await.unwrap();
        Team::try_acquire_slot(&db.pool, team.id, Utc::now())
            .await
            .unwrap();
        Team::try_acquire_slot(&db.pool, team.id, Utc::now())
            .await
            .unwrap();

        let shrink = UpdateTeam {
            capacity: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            teams.update(team.id, shrink).await,
            Err(TeamError::Validation(_))
        ));

        let updated = teams
            .update(
                team.id,
                UpdateTeam {
                    capacity: Some(2),
                    contact_email: Some("water@city.gov".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.capacity, 2);
        assert_eq!(updated.current_load, 2);

        let listed = teams.get(team.id).await.unwrap();
        assert_eq!(listed.utilization, 1.0);
        assert_eq!(listed.available_slots, 0);
    }

    #[tokio::test]
    async fn busy_teams_cannot_be_deleted() {
        let (db, teams) = service().await;
        let team = teams.create(new_team("Lighting", 2)).await.unwrap();
        Team::try_acquire_slot(&db.pool, team.id, Utc::now())
            .await
            .unwrap();
        assert!(matches!(
            teams.delete(team.id).await,
            Err(TeamError::HasOpenAssignments(1))
        ));

        Team::release_slot(&db.pool, team.id, Utc::now())
            .await
            .unwrap();
        teams.delete(team.id).await.unwrap();
        assert!(matches!(teams.get(team.id).await, Err(TeamError::NotFound)));
    }
}
