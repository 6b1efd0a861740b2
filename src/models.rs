//! Data models for the keyspace profiler.
//!
//! This module contains the core data structures shared by the scanner,
//! the pattern aggregator, the analysis rules and the report renderers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Data type of a key as reported by the store's `TYPE` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Plain string value
    String,
    /// Field/value hash
    Hash,
    /// Linked/quick list
    List,
    /// Unordered set
    Set,
    /// Sorted set
    #[serde(rename = "zset")]
    ZSet,
}

impl KeyType {
    /// Every supported type, in report order.
    pub const ALL: [KeyType; 5] = [
        KeyType::String,
        KeyType::Hash,
        KeyType::List,
        KeyType::Set,
        KeyType::ZSet,
    ];

    /// The name the store uses for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::Hash => "hash",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
        }
    }

    /// Map a `TYPE` reply onto a supported type.
    ///
    /// Returns `None` for `none`, `stream` and module types.
    pub fn from_type_reply(reply: &str) -> Option<Self> {
        reply.parse().ok()
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" => Ok(KeyType::String),
            "hash" => Ok(KeyType::Hash),
            "list" => Ok(KeyType::List),
            "set" => Ok(KeyType::Set),
            "zset" => Ok(KeyType::ZSet),
            other => Err(format!("unknown key type: {}", other)),
        }
    }
}

/// A single key returned by the key record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Full key name.
    pub name: String,
    /// Data type of the key.
    #[serde(rename = "type")]
    pub key_type: KeyType,
}

impl KeyRecord {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
        }
    }
}

/// Which analysis phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behaviour {
    /// Run every phase (default)
    #[default]
    All,
    /// Server-wide summaries only
    Global,
    /// Top patterns by key count only
    Scanner,
    /// Per-type memory rules only
    Ram,
}

impl Behaviour {
    pub fn runs_global(&self) -> bool {
        matches!(self, Behaviour::All | Behaviour::Global)
    }

    pub fn runs_scanner(&self) -> bool {
        matches!(self, Behaviour::All | Behaviour::Scanner)
    }

    pub fn runs_ram(&self) -> bool {
        matches!(self, Behaviour::All | Behaviour::Ram)
    }
}

impl fmt::Display for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behaviour::All => write!(f, "all"),
            Behaviour::Global => write!(f, "global"),
            Behaviour::Scanner => write!(f, "scanner"),
            Behaviour::Ram => write!(f, "ram"),
        }
    }
}

impl FromStr for Behaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Behaviour::All),
            "global" => Ok(Behaviour::Global),
            "scanner" => Ok(Behaviour::Scanner),
            "ram" => Ok(Behaviour::Ram),
            other => Err(format!(
                "invalid behaviour: {}. Must be one of: all, global, scanner, ram",
                other
            )),
        }
    }
}

/// The recognized run filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    /// Types to scan and analyze.
    pub types: BTreeSet<KeyType>,
    /// Phases to execute.
    pub behaviour: Behaviour,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            types: KeyType::ALL.into_iter().collect(),
            behaviour: Behaviour::All,
        }
    }
}

impl Filters {
    /// Build a type set from user supplied names.
    ///
    /// Unknown names are dropped with a warning. An empty or absent list
    /// selects every type.
    pub fn types_from_names<S: AsRef<str>>(names: &[S]) -> BTreeSet<KeyType> {
        if names.is_empty() {
            return KeyType::ALL.into_iter().collect();
        }

        let mut types = BTreeSet::new();
        for name in names {
            match name.as_ref().parse::<KeyType>() {
                Ok(t) => {
                    types.insert(t);
                }
                Err(e) => tracing::warn!("Ignoring type filter entry: {}", e),
            }
        }
        types
    }

    pub fn accepts(&self, key_type: KeyType) -> bool {
        self.types.contains(&key_type)
    }
}

/// A single value in an analysis table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Int(u64),
    Float(f64),
    /// Percentage value; serialized as a plain number and read back as `Float`.
    Percent(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) | Cell::Percent(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{:.2}", v),
            Cell::Percent(v) => write!(f, "{:.2}%", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Cell {
    fn from(v: u64) -> Self {
        Cell::Int(v)
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Int(v as u64)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

/// Headers plus positionally aligned rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTable {
    /// Column names.
    pub headers: Vec<String>,
    /// Rows; every row has `headers.len()` cells.
    pub data: Vec<Vec<Cell>>,
}

impl AnalysisTable {
    /// Creates an empty table with the given headers.
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            data: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.headers.len(), "row arity mismatch");
        self.data.push(row);
    }

    pub fn truncate(&mut self, limit: usize) {
        self.data.truncate(limit);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the index of a header, if present.
    pub fn column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }
}

/// One fragment of a report, in the order phases produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Global analyzer summaries.
    Nodes(Vec<AnalysisTable>),
    /// Top patterns across all types.
    Keys(AnalysisTable),
    /// Surviving rule table per type.
    Stat(BTreeMap<KeyType, AnalysisTable>),
    /// Anything the renderers have no dedicated layout for.
    Other(serde_json::Value),
}

/// The merged result of one analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Sections in production order.
    pub sections: Vec<Section>,
    /// Records pulled from the key source.
    pub records: usize,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn nodes(&self) -> Option<&[AnalysisTable]> {
        self.sections.iter().find_map(|s| match s {
            Section::Nodes(nodes) => Some(nodes.as_slice()),
            _ => None,
        })
    }

    pub fn keys(&self) -> Option<&AnalysisTable> {
        self.sections.iter().find_map(|s| match s {
            Section::Keys(table) => Some(table),
            _ => None,
        })
    }

    pub fn stat(&self) -> Option<&BTreeMap<KeyType, AnalysisTable>> {
        self.sections.iter().find_map(|s| match s {
            Section::Stat(stat) => Some(stat),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_parse() {
        assert_eq!("STRING".parse::<KeyType>(), Ok(KeyType::String));
        assert_eq!("zset".parse::<KeyType>(), Ok(KeyType::ZSet));
        assert!("stream".parse::<KeyType>().is_err());
        assert_eq!(KeyType::from_type_reply("none"), None);
    }

    #[test]
    fn test_key_type_display_roundtrip() {
        for t in KeyType::ALL {
            assert_eq!(t.to_string().parse::<KeyType>(), Ok(t));
        }
    }

    #[test]
    fn test_behaviour_phases() {
        assert!(Behaviour::All.runs_global());
        assert!(Behaviour::All.runs_scanner());
        assert!(Behaviour::All.runs_ram());
        assert!(Behaviour::Scanner.runs_scanner());
        assert!(!Behaviour::Scanner.runs_ram());
        assert!(!Behaviour::Ram.runs_global());
        assert!("bogus".parse::<Behaviour>().is_err());
    }

    #[test]
    fn test_types_from_names() {
        let types = Filters::types_from_names(&["hash", "SET", "stream"]);
        assert_eq!(types.len(), 2);
        assert!(types.contains(&KeyType::Hash));
        assert!(types.contains(&KeyType::Set));

        let empty: [&str; 0] = [];
        assert_eq!(Filters::types_from_names(&empty).len(), 5);
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Int(12).to_string(), "12");
        assert_eq!(Cell::Float(1.5).to_string(), "1.50");
        assert_eq!(Cell::Percent(33.33).to_string(), "33.33%");
        assert_eq!(Cell::from("x").to_string(), "x");
    }

    #[test]
    fn test_cell_json_shape() {
        let row = vec![Cell::from("a"), Cell::Int(3), Cell::Percent(12.5)];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["a",3,12.5]"#);

        let back: Vec<Cell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0], Cell::Text("a".to_string()));
        assert_eq!(back[1], Cell::Int(3));
        assert_eq!(back[2].as_f64(), Some(12.5));
    }

    #[test]
    fn test_report_accessors() {
        let mut report = Report::new();
        assert!(report.keys().is_none());

        report.push(Section::Keys(AnalysisTable::new(&["name", "count"])));
        report.push(Section::Stat(BTreeMap::new()));

        assert!(report.keys().is_some());
        assert!(report.stat().is_some());
        assert!(report.nodes().is_none());
    }
}
