//! Parameter metadata and the per-instance settings cache.
//!
//! Parameter names shown to automation and stored in legacy presets are
//! synthesized so that they stay unique even when a unit reuses a display
//! name for several parameters:
//!
//! ```text
//! <[Name,]idhex>                       without a clump
//! <[ClumpName,]clumpidhex><[Name,]idhex> with a clump
//! ```
//!
//! `<`, `,` and `>` inside either name are replaced with `_`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const ID_BEGIN: char = '<';
const ID_SEP: char = ',';
const ID_END: char = '>';

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ID_BEGIN | ID_SEP | ID_END => '_',
            c => c,
        })
        .collect()
}

fn bracket(name: Option<&str>, id: u32) -> String {
    match name {
        Some(name) if !name.is_empty() => {
            format!("{ID_BEGIN}{}{ID_SEP}{:x}{ID_END}", sanitize(name), id)
        }
        _ => format!("{ID_BEGIN}{:x}{ID_END}", id),
    }
}

/// Build the unique automation name of a parameter.
///
/// `clump` is the clump id plus its name if the unit could report one.
pub fn synthesize_name(raw_name: &str, id: u32, clump: Option<(u32, Option<&str>)>) -> String {
    let name = bracket(Some(raw_name), id);
    match clump {
        Some((clump_id, clump_name)) => format!("{}{}", bracket(clump_name, clump_id), name),
        None => name,
    }
}

/// Metadata for one parameter, queried once from the unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub id: u32,
    /// Synthesized unique name.
    pub name: String,
    /// Name as reported by the unit.
    pub raw_name: String,
    pub clump_id: Option<u32>,
    pub clump_name: Option<String>,
    pub writable: bool,
}

impl ParameterInfo {
    pub fn new(id: u32, raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        Self {
            id,
            name: synthesize_name(&raw_name, id, None),
            raw_name,
            clump_id: None,
            clump_name: None,
            writable: true,
        }
    }

    pub fn with_clump(mut self, clump_id: u32, clump_name: Option<String>) -> Self {
        self.name = synthesize_name(
            &self.raw_name,
            self.id,
            Some((clump_id, clump_name.as_deref())),
        );
        self.clump_id = Some(clump_id);
        self.clump_name = clump_name;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// Declared parameters of one instance.
///
/// Every id the unit lists is kept, in declaration order. Metadata is present
/// only for ids whose info query succeeded; ids without metadata are skipped
/// by fetch, store and automation.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    ids: Vec<u32>,
    info: BTreeMap<u32, ParameterInfo>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a declared id with the result of its info query.
    pub fn insert(&mut self, id: u32, info: Option<ParameterInfo>) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
        match info {
            Some(info) => {
                self.info.insert(id, info);
            }
            None => {
                self.info.remove(&id);
            }
        }
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn info(&self, id: u32) -> Option<&ParameterInfo> {
        self.info.get(&id)
    }

    /// Parameters with metadata, in declaration order.
    pub fn known(&self) -> impl Iterator<Item = &ParameterInfo> {
        self.ids.iter().filter_map(|id| self.info.get(id))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ParameterInfo> {
        self.known().find(|info| info.name == name)
    }

    pub fn has_writable(&self) -> bool {
        self.known().any(|info| info.writable)
    }
}

/// Snapshot of parameter values keyed by id.
///
/// Only ids of the owning table are ever present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsCache {
    values: BTreeMap<u32, f32>,
}

impl SettingsCache {
    /// Cache holding every declared id at zero.
    pub fn for_table(table: &ParameterTable) -> Self {
        Self {
            values: table.ids().iter().map(|&id| (id, 0.0)).collect(),
        }
    }

    /// Zero every value, keeping the key set.
    pub fn reset_values(&mut self) {
        self.values.values_mut().for_each(|v| *v = 0.0);
    }

    pub fn get(&self, id: u32) -> Option<f32> {
        self.values.get(&id).copied()
    }

    /// Set a value. Returns false and leaves the cache untouched when `id`
    /// is not part of the cache.
    pub fn set(&mut self, id: u32, value: f32) -> bool {
        match self.values.get_mut(&id) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Drop an entry so a later store leaves that parameter alone.
    pub fn remove(&mut self, id: u32) -> Option<f32> {
        self.values.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.values.iter().map(|(&id, &v)| (id, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Name/value view of the parameters, keyed by synthesized name.
pub type AutomationParameters = BTreeMap<String, f64>;
