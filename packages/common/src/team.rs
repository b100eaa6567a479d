use serde::{Deserialize, Serialize};

/// Maximum number of players on a team.
pub const MAX_ROSTER: usize = 3;

/// A player's stats-service name in `Name#1234` form.
pub type MemberName = String;

/// Chat-platform handles linked to a team. The engine only stores them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHandles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_channel_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_channel_id: Option<u64>,
    /// Announcement message in the teams channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
}

/// A roster of one to three players entered in exactly one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    /// Name of the race this team is entered in.
    pub race: String,
    /// Roster member whose activity history is polled.
    pub captain: MemberName,
    /// Ordered roster; the captain is always present.
    pub members: Vec<MemberName>,
    #[serde(default)]
    pub channels: ChannelHandles,
}

impl Team {
    pub fn new(name: impl Into<String>, race: impl Into<String>, members: Vec<MemberName>) -> Self {
        let captain = members.first().cloned().unwrap_or_default();
        Self {
            name: name.into(),
            race: race.into(),
            captain,
            members,
            channels: ChannelHandles::default(),
        }
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_ROSTER
    }

    pub fn is_captain(&self, member: &str) -> bool {
        self.captain == member
    }

    /// Chat channel name derived from the team name.
    pub fn channel_slug(&self) -> String {
        format!("team-{}", self.name.to_lowercase().replace(' ', "-"))
    }
}
