use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::race::RaceEvent;
use crate::results::RaceResults;
use crate::team::Team;

/// Chat-platform server identifier; all state is partitioned by it.
pub type GuildId = u64;

/// Everything persisted for one guild.
///
/// Races and teams are kept in insertion order, which is also the order
/// teams are polled and the tie-break order in standings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildState {
    #[serde(default)]
    pub races: Vec<RaceEvent>,
    #[serde(default)]
    pub teams: Vec<Team>,
    /// Keyed by [`RaceEvent::results_key`].
    #[serde(default)]
    pub results: BTreeMap<String, RaceResults>,
}

impl GuildState {
    pub fn race(&self, name: &str) -> Option<&RaceEvent> {
        self.races.iter().find(|r| r.name == name)
    }

    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.name == name)
    }

    pub fn team_mut(&mut self, name: &str) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.name == name)
    }

    pub fn teams_in_race<'a>(&'a self, race: &'a str) -> impl Iterator<Item = &'a Team> + 'a {
        self.teams.iter().filter(move |t| t.race == race)
    }

    /// The team in `race` that has `member` on its roster, if any.
    pub fn team_of_member<'a>(&'a self, race: &'a str, member: &str) -> Option<&'a Team> {
        self.teams_in_race(race).find(|t| t.has_member(member))
    }

    /// Remove a race from the active set. Returns `false` if it was already gone.
    pub fn remove_race(&mut self, name: &str) -> bool {
        let before = self.races.len();
        self.races.retain(|r| r.name != name);
        self.races.len() != before
    }

    /// Remove and return every team entered in `race`.
    pub fn remove_teams_in_race(&mut self, race: &str) -> Vec<Team> {
        let (removed, kept) = std::mem::take(&mut self.teams)
            .into_iter()
            .partition(|t| t.race == race);
        self.teams = kept;
        removed
    }
}
