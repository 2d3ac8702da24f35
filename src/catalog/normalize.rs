//! Label canonicalization applied to every result entry

use super::CatalogEntry;
use unicode_normalization::UnicodeNormalization;

/// NFC-normalize, collapse runs of whitespace, and trim.
pub fn normalize_label(label: &str) -> String {
    let composed: String = label.nfc().collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl CatalogEntry {
    /// Normalize labels, notes and notations, including nested entries.
    pub fn normalize_labels(&mut self) {
        for label in self.pref_label.values_mut() {
            *label = normalize_label(label);
        }
        for labels in self.alt_label.values_mut().chain(self.definition.values_mut()) {
            for label in labels.iter_mut() {
                *label = normalize_label(label);
            }
        }
        for notation in &mut self.notation {
            *notation = normalize_label(notation);
        }
        for nested in self
            .children
            .iter_mut()
            .chain(self.parents.iter_mut())
            .flatten()
        {
            nested.normalize_labels();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize_label("  Music \n and\tDance  "), "Music and Dance");
    }

    #[test]
    fn composes_combining_characters() {
        // "e" + combining acute accent
        let decomposed = "Caf\u{0065}\u{0301}";
        assert_eq!(normalize_label(decomposed), "Caf\u{00e9}");
    }

    #[test]
    fn normalizes_nested_entries() {
        let mut entry = CatalogEntry::concept("c1")
            .with_label("en", " Top ")
            .with_children(vec![CatalogEntry::concept("c2").with_label("en", "Child  label")]);

        entry.normalize_labels();

        assert_eq!(entry.pref_label["en"], "Top");
        assert_eq!(entry.children.unwrap()[0].pref_label["en"], "Child label");
    }
}
