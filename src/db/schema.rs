use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VotingContext {
    MainPvp,
    MainPve,
    Offspec,
}

impl VotingContext {
    pub const ALL: [VotingContext; 3] = [VotingContext::MainPvp, VotingContext::MainPve, VotingContext::Offspec];

    pub fn as_str(&self) -> &'static str {
        match self {
            VotingContext::MainPvp => "main_pvp",
            VotingContext::MainPve => "main_pve",
            VotingContext::Offspec => "offspec",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VotingContext::MainPvp => "Main PvP",
            VotingContext::MainPve => "Main PvE",
            VotingContext::Offspec => "Off-spec",
        }
    }
}

impl fmt::Display for VotingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingContext {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "main_pvp" => Ok(VotingContext::MainPvp),
            "main_pve" => Ok(VotingContext::MainPve),
            "offspec" => Ok(VotingContext::Offspec),
            other => Err(anyhow::anyhow!("unknown voting context '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Weapon,
    Armor,
    Accessory,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Weapon => "weapon",
            Category::Armor => "armor",
            Category::Accessory => "accessory",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weapon" => Ok(Category::Weapon),
            "armor" => Ok(Category::Armor),
            "accessory" => Ok(Category::Accessory),
            other => Err(anyhow::anyhow!("unknown item category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BossType {
    WorldBoss,
    Archboss,
    Mixed,
}

impl BossType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BossType::WorldBoss => "world_boss",
            BossType::Archboss => "archboss",
            BossType::Mixed => "mixed",
        }
    }
}

impl fmt::Display for BossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BossType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "world_boss" => Ok(BossType::WorldBoss),
            "archboss" => Ok(BossType::Archboss),
            "mixed" => Ok(BossType::Mixed),
            other => Err(anyhow::anyhow!("unknown boss type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ballot {
    pub id: i32,
    pub time_created: DateTime<Utc>,
    pub id_guild: u64,
    pub name: String,
    pub open: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub boss_type: BossType,
    pub context: VotingContext,
}

/// Fields needed to create a ballot; the store assigns `id` and `time_created`.
#[derive(Debug, Clone)]
pub struct NewBallot {
    pub id_guild: u64,
    pub name: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub boss_type: BossType,
    pub context: VotingContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: i32,
    pub id_ballot: i32,
    pub name: String,
    pub name_key: String,
    pub category: Category,
    /// Already normalized through `engine::bucket::normalize_slot`.
    pub slot: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteKey {
    pub id_ballot: i32,
    pub id_entry: i32,
    pub id_user: u64,
    pub context: VotingContext,
}

impl fmt::Display for VoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.id_ballot, self.id_entry, self.id_user, self.context)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub id_ballot: i32,
    pub id_entry: i32,
    pub id_user: u64,
    pub user_name: String,
    pub context: VotingContext,
    pub time_cast: DateTime<Utc>,
}

impl Vote {
    pub fn key(&self) -> VoteKey {
        VoteKey {
            id_ballot: self.id_ballot,
            id_entry: self.id_entry,
            id_user: self.id_user,
            context: self.context,
        }
    }
}

/// A vote joined with the entry it targets and the name of its ballot.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldVote {
    pub vote: Vote,
    pub entry: Entry,
    pub ballot_name: String,
}

pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
