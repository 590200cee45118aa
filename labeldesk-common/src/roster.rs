//! Fixed roster of labellers

use serde::Serialize;
use std::collections::HashSet;

use crate::{Error, Result};

/// Names offered when no roster is configured
pub const DEFAULT_ROSTER: [&str; 6] = ["Gabriel", "Jessica", "Jiayi", "Leanne", "Pradyu", "Shaun"];

/// The labeller names a session may pick from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    /// Build a roster; names must be non-empty and unique
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::Config("Labeller roster is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &names {
            if name.trim().is_empty() {
                return Err(Error::Config("Labeller roster contains a blank name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::Config(format!(
                    "Labeller '{}' appears more than once in the roster",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Resolve a submitted name to a labeller identity
    pub fn resolve(&self, name: &str) -> Result<Labeller> {
        if self.contains(name) {
            Ok(Labeller(name.to_string()))
        } else {
            Err(Error::InvalidInput(format!("'{}' is not on the labeller roster", name)))
        }
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            names: DEFAULT_ROSTER.iter().map(|n| n.to_string()).collect(),
        }
    }
}

/// A labeller identity drawn from the roster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Labeller(String);

impl Labeller {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Labeller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
