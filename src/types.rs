//! Wiki query results and the flattened monster schema written to monsters.json

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of `query.results`, keyed by `Name` or `Name#Version`.
///
/// Only `printouts` is read; SMW also sends `fulltext`, `fullurl`,
/// `namespace` and friends which are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub printouts: Option<Value>,
}

impl RawRecord {
    /// Returns the printout set, or None when the record carries no usable
    /// printouts structure.
    ///
    /// SMW serializes an empty property map as `[]`, so an empty array is an
    /// empty printout set rather than a malformed record.
    pub fn printouts(&self) -> Option<Printouts<'_>> {
        match self.printouts.as_ref()? {
            Value::Object(map) => Some(Printouts::Map(map)),
            Value::Array(items) if items.is_empty() => Some(Printouts::Empty),
            _ => None,
        }
    }
}

/// Borrowed view over a record's printouts.
#[derive(Debug, Clone, Copy)]
pub enum Printouts<'a> {
    Map(&'a Map<String, Value>),
    Empty,
}

impl<'a> Printouts<'a> {
    /// All values of a property. Missing properties read as empty.
    pub fn values(&self, property: &str) -> &'a [Value] {
        match *self {
            Printouts::Map(map) => match map.get(property) {
                Some(Value::Array(values)) => values.as_slice(),
                _ => &[],
            },
            Printouts::Empty => &[],
        }
    }

    /// First value of a property, if any.
    pub fn first(&self, property: &str) -> Option<&'a Value> {
        self.values(property).first()
    }

    /// First value read as an integer, or 0.
    pub fn int(&self, property: &str) -> i64 {
        self.first(property).and_then(value_as_i64).unwrap_or(0)
    }

    /// First value read as an integer, or None.
    pub fn opt_int(&self, property: &str) -> Option<i64> {
        self.first(property).and_then(value_as_i64)
    }

    /// Page titles (`fulltext`) of every page-typed value of a property.
    pub fn titles(&self, property: &str) -> impl Iterator<Item = &'a str> {
        self.values(property).iter().filter_map(value_as_text)
    }
}

/// Reads a printout value as an integer. SMW sends numbers as JSON numbers,
/// but hand-built or older responses carry numeric strings.
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Reads a printout value as text: plain strings as-is, page values by
/// their `fulltext` title.
pub fn value_as_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("fulltext").and_then(Value::as_str),
        _ => None,
    }
}

/// A monster as consumed by the calculator.
///
/// Field order is the serialized order. `skills`, `offensive` and `defensive`
/// are positional; see the `*_PRINTOUTS` tables in `normalize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub image: String,
    pub level: i64,
    pub speed: i64,
    pub size: i64,
    /// attack, defence, hitpoints, magic, ranged, strength
    pub skills: [i64; 6],
    /// attack, magic damage, magic attack, range attack, ranged strength, strength
    pub offensive: [i64; 6],
    /// crush, magic, range, slash, stab
    pub defensive: [i64; 5],
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// Index of each skill inside `MonsterRecord::skills`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skill {
    Attack = 0,
    Defence = 1,
    Hitpoints = 2,
    Magic = 3,
    Ranged = 4,
    Strength = 5,
}

impl MonsterRecord {
    pub fn skill(&self, skill: Skill) -> i64 {
        self.skills[skill as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_printouts_empty_array_is_empty_set() {
        let raw: RawRecord = serde_json::from_value(json!({ "printouts": [] })).unwrap();
        let po = raw.printouts().expect("empty array should be accepted");
        assert!(po.values("Hitpoints").is_empty());
        assert_eq!(po.int("Hitpoints"), 0);
    }

    #[test]
    fn test_printouts_missing_or_malformed() {
        let raw: RawRecord = serde_json::from_value(json!({ "fulltext": "Goblin" })).unwrap();
        assert!(raw.printouts().is_none());

        let raw: RawRecord = serde_json::from_value(json!({ "printouts": "oops" })).unwrap();
        assert!(raw.printouts().is_none());
    }

    #[test]
    fn test_value_as_i64() {
        assert_eq!(value_as_i64(&json!(12)), Some(12));
        assert_eq!(value_as_i64(&json!("1000")), Some(1000));
        assert_eq!(value_as_i64(&json!(" 4 ")), Some(4));
        assert_eq!(value_as_i64(&json!(2.0)), Some(2));
        assert_eq!(value_as_i64(&json!("-5")), Some(-5));
        assert_eq!(value_as_i64(&json!("n/a")), None);
        assert_eq!(value_as_i64(&json!(null)), None);
    }

    #[test]
    fn test_titles_reads_fulltext_and_strings() {
        let raw: RawRecord = serde_json::from_value(json!({
            "printouts": {
                "Category": [{ "fulltext": "Category:Monsters" }, "Category:Bosses", 3]
            }
        }))
        .unwrap();
        let po = raw.printouts().unwrap();
        let titles: Vec<&str> = po.titles("Category").collect();
        assert_eq!(titles, vec!["Category:Monsters", "Category:Bosses"]);
    }
}
