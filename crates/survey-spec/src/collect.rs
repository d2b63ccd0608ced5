use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::answers::{AnswerMap, AnswerValue};
use crate::render::{ControlDescription, ControlKind};

static ENTITY_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\[(.+?)\]$").expect("static pattern compiles"));

/// Ordered `(key, value)` pairs as produced by a form toolkit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormEntries(Vec<(String, String)>);

impl FormEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Entries a form would submit for the checked options of `controls`.
    pub fn from_controls(controls: &[ControlDescription]) -> Self {
        let mut entries = Self::new();
        for control in controls {
            for group in control.groups() {
                for option in group.options.iter().filter(|option| option.checked) {
                    entries.push(group.key.clone(), option.value.clone());
                }
            }
        }
        entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormEntries {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Decoded form key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKey<'a> {
    Plain(&'a str),
    Entity { base: &'a str, entity: &'a str },
}

pub fn parse_key(key: &str) -> EntryKey<'_> {
    match ENTITY_KEY.captures(key) {
        Some(captures) => match (captures.get(1), captures.get(2)) {
            (Some(base), Some(entity)) => EntryKey::Entity {
                base: base.as_str(),
                entity: entity.as_str(),
            },
            _ => EntryKey::Plain(key),
        },
        None => EntryKey::Plain(key),
    }
}

/// Folds raw entries: `base[sub]` builds a per-entity map, repeated keys become a set.
pub fn fold_entries(entries: &FormEntries) -> AnswerMap {
    let mut result = AnswerMap::new();
    for (key, value) in entries.iter() {
        match parse_key(key) {
            EntryKey::Entity { base, entity } => {
                let slot = result
                    .entry(base.to_string())
                    .or_insert_with(|| AnswerValue::ByEntity(BTreeMap::new()));
                match slot {
                    AnswerValue::ByEntity(map) => {
                        map.insert(entity.to_string(), value.to_string());
                    }
                    other => {
                        *other = AnswerValue::ByEntity(BTreeMap::from([(
                            entity.to_string(),
                            value.to_string(),
                        )]));
                    }
                }
            }
            EntryKey::Plain(name) => match result.get_mut(name) {
                Some(existing) => existing.push(value.to_string()),
                None => {
                    result.insert(name.to_string(), AnswerValue::Scalar(value.to_string()));
                }
            },
        }
    }
    result
}

/// Reads the entries of a rendered stage into canonical answers.
///
/// Only keys backed by an applicable control are kept. Multi-choice answers
/// are always present, possibly as an empty set. Required-ness is not checked.
pub fn collect(controls: &[ControlDescription], entries: &FormEntries) -> AnswerMap {
    let mut raw = fold_entries(entries);
    let mut result = AnswerMap::new();

    for control in controls {
        let value = raw.remove(&control.name);
        match &control.kind {
            ControlKind::Placeholder { .. } => {}
            ControlKind::Single { .. } => {
                if let Some(value) = value {
                    result.insert(control.name.clone(), value);
                }
            }
            ControlKind::Multi { .. } => {
                let set = match value {
                    Some(AnswerValue::Scalar(single)) => AnswerValue::multi([single]),
                    Some(multi @ AnswerValue::MultiValue(_)) => multi,
                    _ => AnswerValue::MultiValue(Vec::new()),
                };
                result.insert(control.name.clone(), set);
            }
            ControlKind::Matrix { entities } => {
                if let Some(AnswerValue::ByEntity(mut map)) = value {
                    map.retain(|entity_id, _| {
                        entities.iter().any(|entity| &entity.entity_id == entity_id)
                    });
                    if !map.is_empty() {
                        result.insert(control.name.clone(), AnswerValue::ByEntity(map));
                    }
                }
            }
        }
    }

    if !raw.is_empty() {
        tracing::debug!(
            ignored = ?raw.keys().collect::<Vec<_>>(),
            "dropped entries without a rendered control"
        );
    }
    result
}
