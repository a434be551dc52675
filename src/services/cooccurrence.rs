use indexmap::{IndexMap, IndexSet};

/// Titles that users paired with each title, in the order the pairs were read
///
/// The relation is one-directional: a pair `(a, b)` makes `b` a partner of
/// `a` only.
#[derive(Debug, Clone, Default)]
pub struct CoOccurrenceMap {
    partners: IndexMap<String, Vec<String>>,
}

impl CoOccurrenceMap {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut sets: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for (first, second) in pairs {
            sets.entry(first).or_default().insert(second);
        }

        let partners = sets
            .into_iter()
            .map(|(title, set)| (title, set.into_iter().collect()))
            .collect();

        Self { partners }
    }

    /// Partners of `title`, empty when it never appears first in a pair
    pub fn partners(&self, title: &str) -> &[String] {
        self.partners.get(title).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of titles with at least one partner
    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_partners_keep_insertion_order_and_dedupe() {
        let map = CoOccurrenceMap::from_pairs(pairs(&[
            ("Naruto", "Bleach"),
            ("Naruto", "One Piece"),
            ("Naruto", "Bleach"),
            ("Naruto", "Hunter x Hunter"),
        ]));

        assert_eq!(map.partners("Naruto"), ["Bleach", "One Piece", "Hunter x Hunter"]);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_pairs_are_one_directional() {
        let map = CoOccurrenceMap::from_pairs(pairs(&[("Naruto", "Bleach")]));
        assert_eq!(map.partners("Naruto"), ["Bleach"]);
        assert!(map.partners("Bleach").is_empty());
    }

    #[test]
    fn test_unknown_title_has_no_partners() {
        let map = CoOccurrenceMap::default();
        assert!(map.is_empty());
        assert!(map.partners("Monster").is_empty());
    }
}
