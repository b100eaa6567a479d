//! Pure projections from stored results to ranked views.

use std::fmt;

use common::{MemberName, RaceEvent, RaceResults, ScoringMode, Team};

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Number of teams announced as winners.
pub const PODIUM: usize = 3;

/// `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds else {
        return "No time".to_string();
    };
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    /// 1-based.
    pub rank: usize,
    pub team: String,
    pub time: f64,
    pub completions: usize,
    /// e.g. `2/3 runs` for incomplete averages.
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandingsView {
    pub race: String,
    pub dungeon_name: String,
    pub scoring: ScoringMode,
    pub ranked: Vec<RankedEntry>,
    /// Teams with no statistic yet, in result order.
    pub unranked: Vec<String>,
}

impl StandingsView {
    /// The race name is embedded so a later view for the same race can replace this one.
    pub fn title(&self) -> String {
        format!("🏆 {} - Leaderboard", self.race)
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StandingsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.title())?;
        writeln!(f, "**Dungeon:** {}", self.dungeon_name)?;
        writeln!(f, "**Type:** {}", self.scoring.label())?;
        for entry in &self.ranked {
            writeln!(f)?;
            writeln!(f, "{}. {}", entry.rank, entry.team)?;
            let time = format_duration(Some(entry.time));
            match &entry.note {
                Some(note) => writeln!(f, "⏱️ {time} ({note})")?,
                None => writeln!(f, "⏱️ {time}")?,
            }
        }
        if !self.unranked.is_empty() {
            writeln!(f)?;
            writeln!(f, "No Completions Yet")?;
            for team in &self.unranked {
                writeln!(f, "• {team}")?;
            }
        }
        Ok(())
    }
}

/// Rank every team with a statistic, fastest first.
///
/// Ties keep result order (the order teams were first polled).
pub fn project(race: &RaceEvent, results: &RaceResults) -> StandingsView {
    let (mut timed, untimed): (Vec<_>, Vec<_>) =
        results.entries.iter().partition(|e| e.record.time.is_some());

    timed.sort_by(|a, b| {
        let (a, b) = (a.record.time.unwrap_or(f64::MAX), b.record.time.unwrap_or(f64::MAX));
        a.total_cmp(&b)
    });

    let required = race.scoring.required_completions();
    let ranked = timed
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            let note = (race.scoring == ScoringMode::Average && e.record.completions < required)
                .then(|| format!("{}/{required} runs", e.record.completions));
            RankedEntry {
                rank: i + 1,
                team: e.team.clone(),
                time: e.record.time.unwrap_or_default(),
                completions: e.record.completions,
                note,
            }
        })
        .collect();

    StandingsView {
        race: race.name.clone(),
        dungeon_name: race.dungeon_name.clone(),
        scoring: race.scoring,
        ranked,
        unranked: untimed.into_iter().map(|e| e.team.clone()).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Podium {
    pub rank: usize,
    pub medal: &'static str,
    pub team: String,
    pub time: f64,
    pub members: Vec<MemberName>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WinnersView {
    pub race: String,
    pub dungeon_name: String,
    pub podium: Vec<Podium>,
}

impl WinnersView {
    pub fn title(&self) -> String {
        format!("🏆 {} - Results", self.race)
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WinnersView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.title())?;
        writeln!(f, "**Dungeon:** {}", self.dungeon_name)?;
        for place in &self.podium {
            writeln!(f)?;
            writeln!(f, "{} {}. {}", place.medal, place.rank, place.team)?;
            writeln!(f, "⏱️ {}", format_duration(Some(place.time)))?;
            writeln!(f, "**Team:**")?;
            for member in &place.members {
                writeln!(f, "• {member}")?;
            }
        }
        Ok(())
    }
}

/// Top three finished teams, or `None` when nobody finished.
pub fn winners(race: &RaceEvent, results: &RaceResults, teams: &[Team]) -> Option<WinnersView> {
    let standings = project(race, results);
    let podium: Vec<Podium> = standings
        .ranked
        .into_iter()
        .filter(|e| results.get(&e.team).is_some_and(|r| !r.is_dnf()))
        .take(PODIUM)
        .enumerate()
        .map(|(i, e)| Podium {
            rank: i + 1,
            medal: MEDALS[i],
            members: teams
                .iter()
                .find(|t| t.name == e.team)
                .map(|t| t.members.clone())
                .unwrap_or_default(),
            team: e.team,
            time: e.time,
        })
        .collect();

    if podium.is_empty() {
        return None;
    }
    Some(WinnersView {
        race: race.name.clone(),
        dungeon_name: race.dungeon_name.clone(),
        podium,
    })
}
