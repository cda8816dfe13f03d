//! Role catalog: static reference text for every character on the script.
//!
//! Lookups never fail. An unrecognized name resolves to the `Unknown` entry so
//! a moderator can hand out home-brew roles without the relay rejecting them.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Name of the fallback entry.
pub const UNKNOWN_ROLE: &str = "Unknown";

/// Alignment of a role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    /// Townsfolk and Outsiders.
    Good,
    /// Minions and Demons.
    Evil,
    /// Unassigned or custom.
    Unknown,
}

/// Character category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleType {
    /// Good, usually with information or protection abilities.
    Townsfolk,
    /// Good, with abilities that hurt their own team.
    Outsider,
    /// Evil helpers.
    Minion,
    /// The evil player the town must execute.
    Demon,
    /// Not yet assigned.
    Unknown,
    /// Storyteller-defined.
    Custom,
}

/// Descriptive text for one role. Copied onto a player when assigned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    /// Alignment.
    pub team: Team,
    /// Category.
    #[serde(rename = "type")]
    pub role_type: RoleType,
    /// Ability text as printed on the character sheet.
    pub ability: Cow<'static, str>,
    /// Play guidance shown to the player.
    pub tips: Cow<'static, str>,
}

const fn role(team: Team, role_type: RoleType, ability: &'static str, tips: &'static str) -> RoleInfo {
    RoleInfo {
        team,
        role_type,
        ability: Cow::Borrowed(ability),
        tips: Cow::Borrowed(tips),
    }
}

const BUILTIN: &[(&str, RoleInfo)] = &[
    // Townsfolk
    ("Washerwoman", role(Team::Good, RoleType::Townsfolk,
        "You start knowing that 1 of 2 players is a particular Townsfolk.",
        "Share your information carefully. One of the two players you learned about is the role you were shown.")),
    ("Librarian", role(Team::Good, RoleType::Townsfolk,
        "You start knowing that 1 of 2 players is a particular Outsider. (Or that zero are in play.)",
        "Your information helps identify Outsiders, which can be valuable for finding the Drunk or confirming claims.")),
    ("Investigator", role(Team::Good, RoleType::Townsfolk,
        "You start knowing that 1 of 2 players is a particular Minion.",
        "You know one of two players is evil! Be strategic about when and how you share this information.")),
    ("Chef", role(Team::Good, RoleType::Townsfolk,
        "You start knowing how many pairs of evil players there are.",
        "Pairs means adjacent evil players in the seating order. Zero pairs means no evil players are sitting next to each other.")),
    ("Empath", role(Team::Good, RoleType::Townsfolk,
        "Each night, you learn how many of your 2 alive neighbours are evil.",
        "Your information updates each night. If neighbors die, you get info about new neighbors. Track changes carefully.")),
    ("Fortune Teller", role(Team::Good, RoleType::Townsfolk,
        "Each night, choose 2 players: you learn if either is a Demon. There is a good player that registers as a Demon to you.",
        "One good player will always show as the Demon to you - the 'Red Herring'. Use process of elimination.")),
    ("Undertaker", role(Team::Good, RoleType::Townsfolk,
        "Each night*, you learn which character died by execution today.",
        "You learn the TRUE role, even if they were the Drunk or poisoned. Very powerful for confirming claims.")),
    ("Monk", role(Team::Good, RoleType::Townsfolk,
        "Each night*, choose a player (not yourself): they are safe from the Demon tonight.",
        "Protect key players but don't be predictable. You cannot protect yourself.")),
    ("Ravenkeeper", role(Team::Good, RoleType::Townsfolk,
        "If you die at night, you are woken to choose a player: you learn their character.",
        "You only get info if you die at NIGHT (not execution). Choose someone suspicious to confirm or deny their claim.")),
    ("Virgin", role(Team::Good, RoleType::Townsfolk,
        "The 1st time you are nominated, if the nominator is a Townsfolk, they are executed immediately.",
        "Get nominated by someone you trust to confirm them as Townsfolk. This only works ONCE.")),
    ("Slayer", role(Team::Good, RoleType::Townsfolk,
        "Once per game, during the day, publicly choose a player: if they are the Demon, they die.",
        "You only get ONE shot. Make it count! Use it when you're confident, or to test a strong suspicion.")),
    ("Soldier", role(Team::Good, RoleType::Townsfolk,
        "You are safe from the Demon.",
        "The Demon cannot kill you at night. You can be executed or die from other effects though. Use this to be bold!")),
    ("Mayor", role(Team::Good, RoleType::Townsfolk,
        "If only 3 players live & no execution occurs, your team wins. If you die at night, another player might die instead.",
        "In the final 3, convince town not to execute. Your night death might bounce to another player (Storyteller's choice).")),
    // Outsiders
    ("Butler", role(Team::Good, RoleType::Outsider,
        "Each night, choose a player (not yourself): tomorrow, you may only vote if they are voting too.",
        "You MUST choose a master each night. You can only raise your hand to vote when your master's hand is raised.")),
    ("Drunk", role(Team::Good, RoleType::Outsider,
        "You do not know you are the Drunk. You think you are a Townsfolk character, but you are not.",
        "If you're reading this, you ARE the Drunk. Your Townsfolk ability doesn't work. Your info may be wrong.")),
    ("Recluse", role(Team::Good, RoleType::Outsider,
        "You might register as evil & as a Minion or Demon, even if dead.",
        "Other players' abilities might see you as evil. This can cause chaos - be prepared to be suspected!")),
    ("Saint", role(Team::Good, RoleType::Outsider,
        "If you die by execution, your team loses.",
        "Do NOT get executed! Convince town you're good. If evil knows you're the Saint, they may try to get you killed.")),
    // Minions
    ("Poisoner", role(Team::Evil, RoleType::Minion,
        "Each night, choose a player: they are poisoned tonight and tomorrow day.",
        "Poison key information roles to corrupt their data. The poisoned player doesn't know they're poisoned.")),
    ("Spy", role(Team::Evil, RoleType::Minion,
        "Each night, you see the Grimoire. You might register as good & as a Townsfolk or Outsider, even if dead.",
        "You see all roles and tokens! Use this knowledge carefully. You may appear good to other abilities.")),
    ("Scarlet Woman", role(Team::Evil, RoleType::Minion,
        "If there are 5 or more players alive & the Demon dies, you become the Demon.",
        "You're the backup Demon! If the Imp dies with 5+ alive, you become the new Imp. Stay alive and unsuspected.")),
    ("Baron", role(Team::Evil, RoleType::Minion,
        "There are extra Outsiders in play. [+2 Outsiders]",
        "The game has 2 extra Outsiders. This means 2 fewer Townsfolk. Use Outsider claims as safe bluffs for evil.")),
    // Demon
    ("Imp", role(Team::Evil, RoleType::Demon,
        "Each night*, choose a player: they die. If you kill yourself this way, a Minion becomes the Imp.",
        "Kill strategically. You can 'starpass' by killing yourself to make a Minion the new Imp if you're about to be caught.")),
    // Placeholders
    (UNKNOWN_ROLE, role(Team::Unknown, RoleType::Unknown,
        "Your role has not been assigned yet.",
        "Wait for the Storyteller to assign your role.")),
    ("Custom", role(Team::Unknown, RoleType::Custom,
        "You have a custom role.",
        "Ask the Storyteller about your ability.")),
];

/// Read-only mapping from role name to [`RoleInfo`].
#[derive(Clone, Debug)]
pub struct RoleCatalog {
    entries: HashMap<String, RoleInfo>,
    fallback: RoleInfo,
}

impl RoleCatalog {
    /// The Trouble Brewing script plus `Unknown` and `Custom`.
    pub fn builtin() -> Self {
        let entries: HashMap<String, RoleInfo> = BUILTIN
            .iter()
            .map(|(name, info)| ((*name).to_owned(), info.clone()))
            .collect();
        let fallback = entries
            .get(UNKNOWN_ROLE)
            .cloned()
            .unwrap_or_else(|| role(Team::Unknown, RoleType::Unknown, "", ""));
        Self { entries, fallback }
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&RoleInfo> {
        self.entries.get(name)
    }

    /// Lookup with fallback to the `Unknown` entry.
    pub fn resolve(&self, name: &str) -> RoleInfo {
        self.get(name).cloned().unwrap_or_else(|| self.fallback.clone())
    }

    /// The fallback entry used for unrecognized names.
    pub fn fallback(&self) -> &RoleInfo {
        &self.fallback
    }

    /// All role names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of entries including the placeholders.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
