use crate::models::epoch_timestamp;
use crate::models::participants::ParticipantId;
use crate::models::tournaments::Tournament;
use crate::schema::{match_results, team_members, teams};
use crate::save_fn;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamRole {
    Captain,
    Member,
}

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
    #[error("[De]serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[error("User {0} already belongs to a team in this tournament")]
    DuplicateEnrollment(i32),
    #[error("Team roster is full (max {0})")]
    TeamFull(i32),
    #[error("User {0} is already on this roster")]
    AlreadyMember(i32),
    #[error("The captain cannot be removed; transfer captaincy first")]
    CannotRemoveCaptain,
    #[error("User {0} is not on this roster")]
    NotAMember(i32),
    #[error("Teams with submitted results cannot be deleted")]
    TeamHasResults,
    #[error("Team {0} has no captain (roster corrupted)")]
    MissingCaptain(i32),
}

/// A tournament-scoped roster. The same people may form a different roster in
/// another tournament; team identity never crosses tournaments.
#[derive(Queryable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = teams)]
pub struct Team {
    pub id: i32,
    pub tournament_id: i32,
    pub name: String,
    pub created_at: i64,
}

#[derive(Queryable, Identifiable, AsChangeset, Debug)]
#[diesel(table_name = team_members)]
pub struct TeamMember {
    pub id: i32,
    pub team_id: i32,
    pub user_id: i32,
    role: String,
}

impl TeamMember {
    pub fn role(&self) -> Result<TeamRole, serde_json::Error> {
        serde_json::from_str(&self.role)
    }

    fn set_role(&mut self, role: TeamRole) -> Result<(), serde_json::Error> {
        self.role = serde_json::to_string(&role)?;
        Ok(())
    }
}

/// true if the user is on any roster of the given tournament
fn user_on_any_roster(
    tournament_id: i32,
    user_id: i32,
    conn: &mut SqliteConnection,
) -> Result<bool, diesel::result::Error> {
    let found: i64 = team_members::table
        .inner_join(teams::table)
        .filter(teams::tournament_id.eq(tournament_id))
        .filter(team_members::user_id.eq(user_id))
        .count()
        .get_result(conn)?;
    Ok(found > 0)
}

/// Creates a team with its captain as the only member. Fails if the captain
/// already captains or belongs to another team in the same tournament.
pub fn create_team<S: Into<String>>(
    tournament: &Tournament,
    captain_user_id: i32,
    name: S,
    conn: &mut SqliteConnection,
) -> Result<Team, TeamError> {
    if user_on_any_roster(tournament.id, captain_user_id, conn)? {
        return Err(TeamError::DuplicateEnrollment(captain_user_id));
    }
    let name = name.into();
    let team = conn.transaction(|c| {
        let team = NewTeam::new(tournament, name).save(c)?;
        NewTeamMember::new(&team, captain_user_id, TeamRole::Captain)?.save(c)?;
        Ok::<Team, TeamError>(team)
    })?;
    debug!(
        "created team {} in tournament {} with captain {}",
        team.id, tournament.id, captain_user_id
    );
    Ok(team)
}

impl Team {
    pub fn get_by_id(
        id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<Option<Self>, diesel::result::Error> {
        teams::table.find(id).first(conn).optional()
    }

    pub fn participant_id(&self) -> ParticipantId {
        ParticipantId::Team(self.id)
    }

    pub fn members(&self, conn: &mut SqliteConnection) -> Result<Vec<TeamMember>, diesel::result::Error> {
        team_members::table
            .filter(team_members::team_id.eq(self.id))
            .order(team_members::user_id.asc())
            .load(conn)
    }

    /// Invariant: exactly one captain at all times.
    pub fn captain(&self, conn: &mut SqliteConnection) -> Result<TeamMember, TeamError> {
        let captain_role = serde_json::to_string(&TeamRole::Captain)?;
        let mut captains: Vec<TeamMember> = team_members::table
            .filter(team_members::team_id.eq(self.id))
            .filter(team_members::role.eq(captain_role))
            .load(conn)?;
        captains.pop().ok_or(TeamError::MissingCaptain(self.id))
    }

    pub fn add_member(
        &self,
        tournament: &Tournament,
        user_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<TeamMember, TeamError> {
        // enrollment in any team of the tournament counts, not just this one
        if user_on_any_roster(tournament.id, user_id, conn)? {
            let on_this_team = self
                .members(conn)?
                .iter()
                .any(|m| m.user_id == user_id);
            return Err(if on_this_team {
                TeamError::AlreadyMember(user_id)
            } else {
                TeamError::DuplicateEnrollment(user_id)
            });
        }
        if let Some(max) = tournament.max_roster_size {
            let current = self.members(conn)?.len() as i32;
            if current >= max {
                return Err(TeamError::TeamFull(max));
            }
        }
        let member = NewTeamMember::new(self, user_id, TeamRole::Member)?.save(conn)?;
        Ok(member)
    }

    pub fn remove_member(
        &self,
        user_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<(), TeamError> {
        let member = self
            .members(conn)?
            .into_iter()
            .find(|m| m.user_id == user_id)
            .ok_or(TeamError::NotAMember(user_id))?;
        if member.role()? == TeamRole::Captain {
            return Err(TeamError::CannotRemoveCaptain);
        }
        diesel::delete(team_members::table.find(member.id)).execute(conn)?;
        Ok(())
    }

    /// Demotes the current captain and promotes the target in one transaction;
    /// there is never an observable window with zero or two captains.
    pub fn transfer_captaincy(
        &self,
        new_captain_user_id: i32,
        conn: &mut SqliteConnection,
    ) -> Result<(), TeamError> {
        let mut old_captain = self.captain(conn)?;
        let mut target = self
            .members(conn)?
            .into_iter()
            .find(|m| m.user_id == new_captain_user_id)
            .ok_or(TeamError::NotAMember(new_captain_user_id))?;
        if old_captain.id == target.id {
            return Ok(());
        }
        old_captain.set_role(TeamRole::Member)?;
        target.set_role(TeamRole::Captain)?;
        conn.transaction(|c| {
            diesel::update(&old_captain).set(&old_captain).execute(c)?;
            diesel::update(&target).set(&target).execute(c)?;
            Ok::<(), diesel::result::Error>(())
        })?;
        Ok(())
    }

    /// Deleting a roster with submitted results would corrupt ranking
    /// identity, so that is refused.
    pub fn delete(self, conn: &mut SqliteConnection) -> Result<(), TeamError> {
        let participant = self.participant_id().to_column()?;
        let results: i64 = match_results::table
            .filter(match_results::tournament_id.eq(self.tournament_id))
            .filter(match_results::participant.eq(participant))
            .count()
            .get_result(conn)?;
        if results > 0 {
            return Err(TeamError::TeamHasResults);
        }
        conn.transaction(|c| {
            diesel::delete(team_members::table.filter(team_members::team_id.eq(self.id)))
                .execute(c)?;
            diesel::delete(teams::table.find(self.id)).execute(c)?;
            Ok::<(), diesel::result::Error>(())
        })?;
        Ok(())
    }
}

#[derive(Insertable)]
#[diesel(table_name = teams)]
pub struct NewTeam {
    tournament_id: i32,
    name: String,
    created_at: i64,
}

impl NewTeam {
    pub fn new<S: Into<String>>(tournament: &Tournament, name: S) -> Self {
        Self {
            tournament_id: tournament.id,
            name: name.into(),
            created_at: epoch_timestamp(),
        }
    }

    save_fn!(teams::table, Team);
}

#[derive(Insertable)]
#[diesel(table_name = team_members)]
pub struct NewTeamMember {
    team_id: i32,
    user_id: i32,
    role: String,
}

impl NewTeamMember {
    pub fn new(team: &Team, user_id: i32, role: TeamRole) -> Result<Self, serde_json::Error> {
        Ok(Self {
            team_id: team.id,
            user_id,
            role: serde_json::to_string(&role)?,
        })
    }

    save_fn!(team_members::table, TeamMember);
}
