use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const UNMAPPED_TEAM: &str = "Unmapped";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Expert → team lookup built from the `teams` collection.
///
/// Membership is matched case-insensitively because expert e-mails are
/// recorded with inconsistent casing across collections.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    teams: Vec<Team>,
    by_expert: HashMap<String, usize>,
}

impl TeamDirectory {
    pub fn new(teams: Vec<Team>) -> Self {
        let mut by_expert = HashMap::new();
        for (idx, team) in teams.iter().enumerate() {
            for member in &team.members {
                // a later team wins when an expert is listed twice
                by_expert.insert(member.to_lowercase(), idx);
            }
        }
        Self { teams, by_expert }
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn names(&self) -> Vec<String> {
        self.teams.iter().map(|team| team.name.clone()).collect()
    }

    pub fn team_of(&self, expert: &str) -> Option<&str> {
        self.by_expert
            .get(&expert.to_lowercase())
            .map(|idx| self.teams[*idx].name.as_str())
    }

    pub fn team_or_unmapped(&self, expert: &str) -> String {
        self.team_of(expert).unwrap_or(UNMAPPED_TEAM).to_string()
    }

    pub fn members(&self, team: &str) -> Option<&[String]> {
        self.teams
            .iter()
            .find(|candidate| candidate.name == team)
            .map(|team| team.members.as_slice())
    }
}
