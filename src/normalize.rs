//! Turns raw ask results into `MonsterRecord`s.
//!
//! Each record runs through the same ordered steps: exclusion checks on the
//! key and categories, field extraction, pruning, then the literal override
//! table. A step either rejects the record with a `Skip` reason or passes it
//! on; records never affect each other.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::overrides::OverrideTable;
use crate::types::{value_as_text, MonsterRecord, Printouts, RawRecord, Skill};

/// Printouts packed into `skills`, in output order.
pub const SKILL_PRINTOUTS: [&str; 6] = [
    "Attack level",
    "Defence level",
    "Hitpoints",
    "Magic level",
    "Ranged level",
    "Strength level",
];

/// Printouts packed into `offensive`, in output order.
pub const OFFENSIVE_PRINTOUTS: [&str; 6] = [
    "Attack bonus",
    "Magic Damage bonus",
    "Magic attack bonus",
    "Range attack bonus",
    "Ranged Strength bonus",
    "Strength bonus",
];

/// Printouts packed into `defensive`, in output order.
pub const DEFENSIVE_PRINTOUTS: [&str; 5] = [
    "Crush defence bonus",
    "Magic defence bonus",
    "Range defence bonus",
    "Slash defence bonus",
    "Stab defence bonus",
];

/// Categories whose members are not real monsters.
const EXCLUDED_CATEGORIES: &[&str] = &[
    "Category:Non-interactive scenery",
    "Category:Discontinued content",
];

/// Lowercased name fragments of variants the calculator doesn't offer.
const PRUNED_NAME_FRAGMENTS: &[&str] = &["(historical)", "(pvm arena)", "(deadman: apocalypse)"];

static NAMESPACE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+:").expect("valid namespace regex"));

/// Why a record was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    MissingPrintouts,
    ChallengeMode,
    Namespace,
    Category(String),
    NoHitpoints,
    NoId,
    NameVariant(&'static str),
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::MissingPrintouts => write!(f, "missing SMW printouts"),
            Skip::ChallengeMode => write!(f, "CoX Challenge Mode variant"),
            Skip::Namespace => write!(f, "not in the main namespace"),
            Skip::Category(c) => write!(f, "in {}", c),
            Skip::NoHitpoints => write!(f, "no hitpoints"),
            Skip::NoId => write!(f, "no NPC ID"),
            Skip::NameVariant(v) => write!(f, "{} variant", v),
        }
    }
}

/// Splits a result key into `(name, version)` at the first `#`.
pub fn split_key(key: &str) -> (&str, &str) {
    key.split_once('#').unwrap_or((key, ""))
}

fn check_version(version: &str) -> Result<(), Skip> {
    if version.contains("Challenge Mode") {
        return Err(Skip::ChallengeMode);
    }
    Ok(())
}

fn check_namespace(key: &str) -> Result<(), Skip> {
    if NAMESPACE_PREFIX.is_match(key) {
        return Err(Skip::Namespace);
    }
    Ok(())
}

fn check_categories(po: &Printouts<'_>) -> Result<(), Skip> {
    match po
        .titles("Category")
        .find(|title| EXCLUDED_CATEGORIES.contains(title))
    {
        Some(title) => Err(Skip::Category(title.to_string())),
        None => Ok(()),
    }
}

fn pack<const N: usize>(po: &Printouts<'_>, properties: [&str; N]) -> [i64; N] {
    properties.map(|p| po.int(p))
}

fn image_name(po: &Printouts<'_>) -> String {
    po.first("Image")
        .and_then(value_as_text)
        .map(|file| file.strip_prefix("File:").unwrap_or(file).to_string())
        .unwrap_or_default()
}

/// Builds the canonical record from a key and its printouts. No filtering.
pub fn extract(key: &str, po: &Printouts<'_>) -> MonsterRecord {
    let (name, version) = split_key(key);
    MonsterRecord {
        id: po.opt_int("NPC ID"),
        name: name.to_string(),
        version: version.to_string(),
        image: image_name(po),
        level: po.int("Combat level"),
        speed: po.int("Attack speed"),
        size: po.int("Size"),
        skills: pack(po, SKILL_PRINTOUTS),
        offensive: pack(po, OFFENSIVE_PRINTOUTS),
        defensive: pack(po, DEFENSIVE_PRINTOUTS),
        attributes: po
            .values("Monster attribute")
            .iter()
            .filter_map(value_as_text)
            .map(str::to_string)
            .collect(),
    }
}

fn prune(monster: &MonsterRecord) -> Result<(), Skip> {
    if monster.skill(Skill::Hitpoints) == 0 {
        return Err(Skip::NoHitpoints);
    }
    if monster.id.is_none() {
        return Err(Skip::NoId);
    }
    let lower = monster.name.to_lowercase();
    if let Some(fragment) = PRUNED_NAME_FRAGMENTS.iter().find(|f| lower.contains(*f)) {
        return Err(Skip::NameVariant(*fragment));
    }
    Ok(())
}

/// Runs one raw record through every step.
pub fn normalize_record(
    key: &str,
    raw: &RawRecord,
    overrides: &OverrideTable,
) -> Result<MonsterRecord, Skip> {
    let po = raw.printouts().ok_or(Skip::MissingPrintouts)?;
    let (_, version) = split_key(key);
    check_version(version)?;
    check_namespace(key)?;
    check_categories(&po)?;

    let monster = extract(key, &po);
    prune(&monster)?;
    Ok(overrides.apply(monster))
}

/// Normalized output plus the images it references.
#[derive(Debug, Default)]
pub struct Normalized {
    pub monsters: Vec<MonsterRecord>,
    pub images: BTreeSet<String>,
    pub skipped: usize,
}

pub fn normalize(raw: &BTreeMap<String, RawRecord>, overrides: &OverrideTable) -> Normalized {
    let mut out = Normalized::default();

    for (key, record) in raw {
        debug!("Processing {}", key);
        match normalize_record(key, record, overrides) {
            Ok(monster) => {
                if !monster.image.is_empty() {
                    out.images.insert(monster.image.clone());
                }
                out.monsters.push(monster);
            }
            Err(reason) => {
                info!("Skipping {}: {}", key, reason);
                out.skipped += 1;
            }
        }
    }

    info!(
        "Normalized {} monsters ({} skipped, {} images)",
        out.monsters.len(),
        out.skipped,
        out.images.len()
    );
    out
}
