//! Non-overwriting deep merge of duplicate entries
//!
//! The retained entry keeps every field it already has; the absorbed
//! entry only fills gaps.

use super::CatalogEntry;
use serde_json::{Map, Value};

impl CatalogEntry {
    /// Merge `other` into `self` without overwriting populated fields.
    pub fn absorb(&mut self, other: CatalogEntry) {
        if self.uri.is_empty() {
            self.uri = other.uri;
        } else if !other.uri.is_empty() && other.uri != self.uri {
            push_unique(&mut self.identifier, other.uri);
        }
        for id in other.identifier {
            if id != self.uri {
                push_unique(&mut self.identifier, id);
            }
        }

        if self.notation.is_empty() {
            self.notation = other.notation;
        }
        for (lang, label) in other.pref_label {
            self.pref_label.entry(lang).or_insert(label);
        }
        for (lang, labels) in other.alt_label {
            self.alt_label.entry(lang).or_insert(labels);
        }
        for (lang, notes) in other.definition {
            self.definition.entry(lang).or_insert(notes);
        }
        if self.in_scheme.is_empty() {
            self.in_scheme = other.in_scheme;
        }

        fill_list(&mut self.children, other.children);
        fill_list(&mut self.parents, other.parents);

        for hint in other.api {
            if !self.api.contains(&hint) {
                self.api.push(hint);
            }
        }

        merge_maps(&mut self.extra, other.extra);
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Take `other` only where `target` is unknown or known-empty.
fn fill_list(target: &mut Option<Vec<CatalogEntry>>, other: Option<Vec<CatalogEntry>>) {
    let Some(other) = other else {
        return;
    };
    match target {
        None => *target = Some(other),
        Some(existing) if existing.is_empty() && !other.is_empty() => *target = Some(other),
        Some(_) => {}
    }
}

fn merge_maps(target: &mut Map<String, Value>, other: Map<String, Value>) {
    for (key, value) in other {
        match target.get_mut(&key) {
            Some(existing) => merge_values(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

fn merge_values(target: &mut Value, other: Value) {
    if target.is_null() {
        *target = other;
        return;
    }
    if let (Value::Object(t), Value::Object(o)) = (target, other) {
        merge_maps(t, o);
    }
}
