//! Employee identity resolution across the CAR and the Receipt Report.
//!
//! The only fuzzy behaviour allowed is the alias table: no string-distance
//! or probabilistic matching.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::model::{CarRecord, EmployeeKey};

/// Uppercase, with whitespace and punctuation removed.
pub fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// Known name variants that refer to the same person.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    exact: BTreeMap<String, String>,
    normalized: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new(aliases: &BTreeMap<String, String>) -> Self {
        let exact = aliases
            .iter()
            .map(|(from, to)| (from.trim().to_string(), to.clone()))
            .collect();
        let normalized = aliases
            .iter()
            .map(|(from, to)| (normalize_name(from), to.clone()))
            .collect();
        Self { exact, normalized }
    }

    /// Raw spelling first, then its normalized form.
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.exact
            .get(raw.trim())
            .or_else(|| self.normalized.get(&normalize_name(raw)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

/// A receipt name that matched nothing, kept under a synthetic key.
#[derive(Debug, Clone)]
pub struct Unresolved {
    pub key: EmployeeKey,
    pub error: ReconError,
}

/// Maps raw (name, id) pairs from either parser to one canonical key.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    aliases: AliasTable,
    /// Canonical name → CAR employee IDs registered under it.
    known: BTreeMap<String, BTreeSet<u32>>,
}

impl IdentityResolver {
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases, known: BTreeMap::new() }
    }

    pub fn from_config(config: &ReconConfig) -> Self {
        Self::new(AliasTable::new(&config.aliases))
    }

    /// Alias substitution, then case/whitespace normalization.
    pub fn canonical_name(&self, raw: &str) -> String {
        match self.aliases.lookup(raw) {
            Some(target) => normalize_name(target),
            None => normalize_name(raw),
        }
    }

    /// Register a CAR identity and return its key.
    pub fn register_car(&mut self, car: &CarRecord) -> EmployeeKey {
        self.register(&car.display_name, car.employee_id)
    }

    /// Register a CAR header identity, including ones whose record failed to parse.
    pub fn register(&mut self, raw_name: &str, employee_id: u32) -> EmployeeKey {
        let name = self.canonical_name(raw_name);
        self.known.entry(name.clone()).or_default().insert(employee_id);
        EmployeeKey::new(name, Some(employee_id))
    }

    /// Resolve a receipt's employee name against registered CAR identities.
    pub fn resolve_receipt(&self, raw_name: &str) -> Result<EmployeeKey, Unresolved> {
        let name = self.canonical_name(raw_name);

        if let Some(ids) = self.known.get(&name) {
            let id = ids.iter().next().copied();
            if ids.len() > 1 {
                log::warn!(
                    "receipt name '{raw_name}' matches {} CAR IDs for {name}; using {:?}",
                    ids.len(),
                    id
                );
            }
            return Ok(EmployeeKey::new(name, id));
        }

        // An alias entry is a deliberate identity even without a CAR block.
        if self.aliases.lookup(raw_name).is_some() {
            return Ok(EmployeeKey::new(name, None));
        }

        Err(Unresolved {
            key: EmployeeKey::new(name, None),
            error: ReconError::UnresolvableIdentity { name: raw_name.trim().to_string() },
        })
    }
}
