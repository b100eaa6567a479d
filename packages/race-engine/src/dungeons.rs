//! Dungeons a race can target.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dungeon {
    pub name: &'static str,
    pub hash: u64,
}

pub const DUNGEONS: &[Dungeon] = &[
    Dungeon {
        name: "Grasp of Avarice",
        hash: 4078656646,
    },
    Dungeon {
        name: "Duality",
        hash: 2823159265,
    },
    Dungeon {
        name: "Spire of the Watcher",
        hash: 1262462921,
    },
    Dungeon {
        name: "Ghosts of the Deep",
        hash: 4169648179,
    },
    Dungeon {
        name: "Warlord's Ruin",
        hash: 2136320021,
    },
    Dungeon {
        name: "Vesper's Host",
        hash: 442508465,
    },
];

/// Case-insensitive lookup by name.
pub fn by_name(name: &str) -> Option<&'static Dungeon> {
    let name = name.trim();
    DUNGEONS.iter().find(|d| d.name.eq_ignore_ascii_case(name))
}

pub fn by_hash(hash: u64) -> Option<&'static Dungeon> {
    DUNGEONS.iter().find(|d| d.hash == hash)
}

impl Dungeon {
    pub fn default_race_name(&self) -> String {
        format!("Dungeon Race: {}", self.name)
    }
}
