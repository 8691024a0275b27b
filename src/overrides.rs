//! Literal per-monster skill corrections.
//!
//! Some monsters have stats that change during the fight, and the ask query
//! only returns one of them. Those are corrected here, keyed by exact
//! `(name, version)`. New cases are new table entries.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::normalize::split_key;
use crate::types::{MonsterRecord, Skill};

/// Built-in corrections: (name, version, defence, strength).
const BUILTIN: &[(&str, &str, i64, i64)] = &[
    ("Vardorvis", "Post-Quest", 215, 270),
    ("Vardorvis", "Awakened", 268, 391),
    ("Vardorvis", "Quest", 180, 210),
];

/// Replacement skill levels. Unset skills keep the wiki value.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillOverride {
    pub attack: Option<i64>,
    pub defence: Option<i64>,
    pub hitpoints: Option<i64>,
    pub magic: Option<i64>,
    pub ranged: Option<i64>,
    pub strength: Option<i64>,
}

impl SkillOverride {
    fn entries(&self) -> [(Skill, Option<i64>); 6] {
        [
            (Skill::Attack, self.attack),
            (Skill::Defence, self.defence),
            (Skill::Hitpoints, self.hitpoints),
            (Skill::Magic, self.magic),
            (Skill::Ranged, self.ranged),
            (Skill::Strength, self.strength),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct OverrideTable {
    entries: HashMap<(String, String), SkillOverride>,
}

impl OverrideTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for (name, version, defence, strength) in BUILTIN {
            table.insert(
                name,
                version,
                SkillOverride {
                    defence: Some(*defence),
                    strength: Some(*strength),
                    ..Default::default()
                },
            );
        }
        table
    }

    pub fn insert(&mut self, name: &str, version: &str, skills: SkillOverride) {
        self.entries
            .insert((name.to_string(), version.to_string()), skills);
    }

    pub fn get(&self, name: &str, version: &str) -> Option<&SkillOverride> {
        self.entries.get(&(name.to_string(), version.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Parses a CONL override file and layers it on top of this table.
    ///
    /// Keys are wiki result keys (`Name` or `Name#Version`):
    ///
    /// ```text
    /// Vardorvis#Awakened
    ///   defence = 268
    ///   strength = 391
    /// ```
    pub fn merge_conl(&mut self, content: &str) -> Result<usize> {
        let parsed: HashMap<String, SkillOverride> =
            serde_conl::from_str(content).context("Failed to parse override table")?;

        for (key, skills) in &parsed {
            if skills.entries().iter().all(|(_, v)| v.is_none()) {
                bail!("Override for '{}' does not set any skill", key);
            }
            let (name, version) = split_key(key);
            self.insert(name, version, skills.clone());
        }

        Ok(parsed.len())
    }

    /// Loads the built-in table plus the entries in `path`.
    pub fn load_with(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read override file: {}", path.display()))?;
        let mut table = Self::builtin();
        table
            .merge_conl(&content)
            .with_context(|| format!("Invalid override file: {}", path.display()))?;
        Ok(table)
    }

    /// Returns the record with any matching correction applied.
    pub fn apply(&self, mut monster: MonsterRecord) -> MonsterRecord {
        if let Some(skills) = self.get(&monster.name, &monster.version) {
            for (skill, value) in skills.entries() {
                if let Some(value) = value {
                    monster.skills[skill as usize] = value;
                }
            }
        }
        monster
    }
}
