//! Administrator and team commands, applied to a guild's state.
//!
//! Every command is a pure mutation of [`GuildState`] returning a typed
//! outcome; [`CommandService`] wraps them in a load-apply-save section and
//! performs the publishing side effects.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use common::storage::GuildStore;
use common::team::{ChannelHandles, MAX_ROSTER};
use common::{GuildId, GuildState, MemberName, RaceEvent, ScoringMode, Team};
use thiserror::Error;
use tracing::info;

use crate::dungeons;
use crate::error::EngineError;
use crate::publish::Publisher;

/// Who is issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub member: MemberName,
    pub is_admin: bool,
}

impl Actor {
    pub fn player(member: impl Into<MemberName>) -> Self {
        Self {
            member: member.into(),
            is_admin: false,
        }
    }

    pub fn admin(member: impl Into<MemberName>) -> Self {
        Self {
            member: member.into(),
            is_admin: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Administrator permission required")]
    PermissionDenied,

    #[error("Race '{0}' not found")]
    RaceNotFound(String),

    #[error("A race named '{0}' already exists")]
    RaceExists(String),

    #[error("Race '{0}' has already been run; reset teams or pick another name")]
    RaceConcluded(String),

    #[error("Unknown dungeon '{0}'")]
    UnknownDungeon(String),

    #[error("Invalid race type '{0}'. Use 'average' or 'best'")]
    UnknownScoringMode(String),

    #[error("End date must be after start date")]
    InvalidWindow,

    #[error("Team '{0}' not found")]
    TeamNotFound(String),

    #[error("A team named '{0}' already exists")]
    TeamExists(String),

    #[error("Name must not be empty")]
    InvalidName,

    #[error("{member} is already on team '{team}'")]
    MemberTaken { member: MemberName, team: String },

    #[error("Invalid roster: {0}")]
    InvalidRoster(String),

    #[error("Team is full (max {MAX_ROSTER} players)")]
    TeamFull,

    #[error("You're already on this team")]
    AlreadyOnTeam,

    #[error("You're not on this team")]
    NotOnTeam,

    #[error("Only the team captain can do that")]
    NotCaptain,
}

/// Administrator request to open a race.
#[derive(Debug, Clone)]
pub struct NewRace {
    /// Defaults to `Dungeon Race: {dungeon}`.
    pub name: Option<String>,
    pub dungeon: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub scoring: String,
}

/// What a race cancellation removed.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelledRace {
    pub race: RaceEvent,
    pub teams: Vec<Team>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamCommand {
    /// The actor becomes captain; `members` are the optional other players.
    Create {
        race: String,
        name: String,
        members: Vec<MemberName>,
    },
    Join {
        team: String,
    },
    Leave {
        team: String,
    },
    Rename {
        team: String,
        new_name: String,
    },
    Delete {
        team: String,
    },
    AttachChannels {
        team: String,
        channels: ChannelHandles,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamOutcome {
    Created(Team),
    Updated(Team),
    Renamed { from: String, team: Team },
    /// Deleted explicitly or because the last member left.
    Deleted(Team),
}

/// Drop a team's entries from every race still in progress.
fn drop_live_results(state: &mut GuildState, team: &str) {
    for results in state.results.values_mut().filter(|r| !r.is_finalized()) {
        results.remove(team);
    }
}

fn require_admin(actor: &Actor) -> Result<(), CommandError> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(CommandError::PermissionDenied)
    }
}

fn clean_name(raw: &str) -> Result<String, CommandError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CommandError::InvalidName);
    }
    Ok(name.to_string())
}

pub fn create_race(
    state: &mut GuildState,
    actor: &Actor,
    req: NewRace,
) -> Result<RaceEvent, CommandError> {
    require_admin(actor)?;

    let dungeon =
        dungeons::by_name(&req.dungeon).ok_or_else(|| CommandError::UnknownDungeon(req.dungeon.clone()))?;
    let scoring: ScoringMode = req
        .scoring
        .parse()
        .map_err(|_| CommandError::UnknownScoringMode(req.scoring.clone()))?;
    if req.end <= req.start {
        return Err(CommandError::InvalidWindow);
    }

    let name = match req.name.as_deref() {
        Some(n) => clean_name(n)?,
        None => dungeon.default_race_name(),
    };
    if state.race(&name).is_some() {
        return Err(CommandError::RaceExists(name));
    }

    let race = RaceEvent {
        name,
        dungeon_name: dungeon.name.to_string(),
        dungeon_hash: dungeon.hash,
        start: req.start,
        end: req.end,
        scoring,
    };
    // Teams and frozen results of a concluded race are matched by name and
    // would be picked up by a successor.
    let frozen = state
        .results
        .get(&race.results_key())
        .is_some_and(|r| r.is_finalized());
    if frozen || state.teams_in_race(&race.name).next().is_some() {
        return Err(CommandError::RaceConcluded(race.name));
    }
    state.races.push(race.clone());
    Ok(race)
}

/// Remove a race, every team entered in it, and its unfrozen results.
pub fn cancel_race(
    state: &mut GuildState,
    actor: &Actor,
    name: &str,
) -> Result<CancelledRace, CommandError> {
    require_admin(actor)?;

    let race = state
        .race(name)
        .cloned()
        .ok_or_else(|| CommandError::RaceNotFound(name.to_string()))?;

    let teams = state.remove_teams_in_race(name);
    state.remove_race(name);
    let key = race.results_key();
    if state.results.get(&key).is_some_and(|r| !r.is_finalized()) {
        state.results.remove(&key);
    }

    Ok(CancelledRace { race, teams })
}

/// Remove every team in the guild, along with unfrozen results.
pub fn reset_teams(state: &mut GuildState, actor: &Actor) -> Result<Vec<Team>, CommandError> {
    require_admin(actor)?;
    state.results.retain(|_, r| r.is_finalized());
    Ok(std::mem::take(&mut state.teams))
}

pub fn apply_team_command(
    state: &mut GuildState,
    actor: &Actor,
    cmd: TeamCommand,
) -> Result<TeamOutcome, CommandError> {
    match cmd {
        TeamCommand::Create {
            race,
            name,
            members,
        } => create_team(state, actor, &race, &name, members),
        TeamCommand::Join { team } => join_team(state, actor, &team),
        TeamCommand::Leave { team } => leave_team(state, actor, &team),
        TeamCommand::Rename { team, new_name } => rename_team(state, actor, &team, &new_name),
        TeamCommand::Delete { team } => delete_team(state, actor, &team),
        TeamCommand::AttachChannels { team, channels } => {
            let t = state
                .team_mut(&team)
                .ok_or(CommandError::TeamNotFound(team))?;
            t.channels = channels;
            Ok(TeamOutcome::Updated(t.clone()))
        }
    }
}

fn create_team(
    state: &mut GuildState,
    actor: &Actor,
    race: &str,
    name: &str,
    members: Vec<MemberName>,
) -> Result<TeamOutcome, CommandError> {
    if state.race(race).is_none() {
        return Err(CommandError::RaceNotFound(race.to_string()));
    }
    let name = clean_name(name)?;

    let mut roster = vec![actor.member.clone()];
    for member in members {
        let member = member.trim();
        if member.is_empty() {
            continue;
        }
        if roster.iter().any(|m| m == member) {
            return Err(CommandError::InvalidRoster(format!(
                "{member} is listed twice"
            )));
        }
        roster.push(member.to_string());
    }
    if roster.len() > MAX_ROSTER {
        return Err(CommandError::InvalidRoster(format!(
            "at most {MAX_ROSTER} players per team"
        )));
    }

    for member in &roster {
        if let Some(existing) = state.team_of_member(race, member) {
            return Err(CommandError::MemberTaken {
                member: member.clone(),
                team: existing.name.clone(),
            });
        }
    }
    if state.team(&name).is_some() {
        return Err(CommandError::TeamExists(name));
    }

    let team = Team::new(name, race, roster);
    info!(team = %team.name, race, members = ?team.members, "Team created");
    state.teams.push(team.clone());
    Ok(TeamOutcome::Created(team))
}

fn join_team(state: &mut GuildState, actor: &Actor, name: &str) -> Result<TeamOutcome, CommandError> {
    let team = state
        .team(name)
        .ok_or_else(|| CommandError::TeamNotFound(name.to_string()))?;

    if team.is_full() {
        return Err(CommandError::TeamFull);
    }
    if team.has_member(&actor.member) {
        return Err(CommandError::AlreadyOnTeam);
    }
    if let Some(other) = state.team_of_member(&team.race, &actor.member) {
        return Err(CommandError::MemberTaken {
            member: actor.member.clone(),
            team: other.name.clone(),
        });
    }

    let team = state
        .team_mut(name)
        .ok_or_else(|| CommandError::TeamNotFound(name.to_string()))?;
    team.members.push(actor.member.clone());
    Ok(TeamOutcome::Updated(team.clone()))
}

fn leave_team(state: &mut GuildState, actor: &Actor, name: &str) -> Result<TeamOutcome, CommandError> {
    let team = state
        .team_mut(name)
        .ok_or_else(|| CommandError::TeamNotFound(name.to_string()))?;
    if !team.has_member(&actor.member) {
        return Err(CommandError::NotOnTeam);
    }

    team.members.retain(|m| *m != actor.member);
    if team.is_captain(&actor.member) {
        if let Some(next) = team.members.first() {
            team.captain = next.clone();
        }
    }

    if team.members.is_empty() {
        let removed = team.clone();
        state.teams.retain(|t| t.name != name);
        drop_live_results(state, name);
        info!(team = name, "Last member left, team deleted");
        return Ok(TeamOutcome::Deleted(removed));
    }
    Ok(TeamOutcome::Updated(team.clone()))
}

fn rename_team(
    state: &mut GuildState,
    actor: &Actor,
    name: &str,
    new_name: &str,
) -> Result<TeamOutcome, CommandError> {
    let new_name = clean_name(new_name)?;
    let team = state
        .team(name)
        .ok_or_else(|| CommandError::TeamNotFound(name.to_string()))?;
    if !team.is_captain(&actor.member) {
        return Err(CommandError::NotCaptain);
    }
    if new_name != name && state.team(&new_name).is_some() {
        return Err(CommandError::TeamExists(new_name));
    }

    for results in state.results.values_mut().filter(|r| !r.is_finalized()) {
        results.rename(name, &new_name);
    }
    let team = state
        .team_mut(name)
        .ok_or_else(|| CommandError::TeamNotFound(name.to_string()))?;
    team.name = new_name;
    Ok(TeamOutcome::Renamed {
        from: name.to_string(),
        team: team.clone(),
    })
}

fn delete_team(state: &mut GuildState, actor: &Actor, name: &str) -> Result<TeamOutcome, CommandError> {
    let team = state
        .team(name)
        .cloned()
        .ok_or_else(|| CommandError::TeamNotFound(name.to_string()))?;
    if !team.is_captain(&actor.member) {
        return Err(CommandError::NotCaptain);
    }
    state.teams.retain(|t| t.name != name);
    drop_live_results(state, name);
    Ok(TeamOutcome::Deleted(team))
}

/// Runs commands against the store in explicit load-apply-save sections.
pub struct CommandService {
    store: Arc<dyn GuildStore>,
    publisher: Arc<dyn Publisher>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<common::storage::StorageError> for ServiceError {
    fn from(err: common::storage::StorageError) -> Self {
        Self::Engine(err.into())
    }
}

impl CommandService {
    pub fn new(store: Arc<dyn GuildStore>, publisher: Arc<dyn Publisher>) -> Self {
        Self { store, publisher }
    }

    pub async fn create_race(
        &self,
        guild: GuildId,
        actor: &Actor,
        req: NewRace,
    ) -> Result<RaceEvent, ServiceError> {
        let mut state = self.store.load(guild).await?;
        let race = create_race(&mut state, actor, req)?;
        self.store.save(guild, &state).await?;
        info!(guild_id = guild, race = %race.name, scoring = %race.scoring, "Race created");
        Ok(race)
    }

    pub async fn cancel_race(
        &self,
        guild: GuildId,
        actor: &Actor,
        name: &str,
    ) -> Result<CancelledRace, ServiceError> {
        let mut state = self.store.load(guild).await?;
        let cancelled = cancel_race(&mut state, actor, name)?;
        self.store.save(guild, &state).await?;
        self.publisher.remove_leaderboard(guild, name).await?;
        info!(guild_id = guild, race = name, teams = cancelled.teams.len(), "Race cancelled");
        Ok(cancelled)
    }

    pub async fn reset_teams(&self, guild: GuildId, actor: &Actor) -> Result<Vec<Team>, ServiceError> {
        let mut state = self.store.load(guild).await?;
        let removed = reset_teams(&mut state, actor)?;
        self.store.save(guild, &state).await?;
        info!(guild_id = guild, teams = removed.len(), "Teams reset");
        Ok(removed)
    }

    pub async fn team(
        &self,
        guild: GuildId,
        actor: &Actor,
        cmd: TeamCommand,
    ) -> Result<TeamOutcome, ServiceError> {
        let mut state = self.store.load(guild).await?;
        let outcome = apply_team_command(&mut state, actor, cmd)?;
        self.store.save(guild, &state).await?;
        Ok(outcome)
    }
}
