use std::collections::HashMap;
use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use super::OptionText;

/// Per-option vote counts for a single poll.
///
/// Every option of the poll is present, in the poll's own order, even when
/// nobody has voted for it. Serialises as a JSON object keyed by option text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally(Vec<(OptionText, u64)>);

impl Tally {
    /// Build a tally from the poll's current options and raw grouped counts
    /// from the vote ledger.
    ///
    /// Counts for option texts that are no longer options of the poll are
    /// dropped. Repeated options are reported once, at their first position.
    pub fn new<I>(options: &[OptionText], counts: I) -> Self
    where
        I: IntoIterator<Item = (OptionText, u64)>,
    {
        let mut counts: HashMap<OptionText, u64> = counts.into_iter().fold(
            HashMap::new(),
            |mut acc, (option, count)| {
                *acc.entry(option).or_default() += count;
                acc
            },
        );
        let mut tally = Vec::with_capacity(options.len());
        for option in options {
            if tally.iter().any(|(existing, _)| existing == option) {
                continue;
            }
            let count = counts.remove(option).unwrap_or(0);
            tally.push((option.clone(), count));
        }
        Self(tally)
    }

    /// The count for a single option, if it is an option of this poll.
    pub fn get(&self, option: &str) -> Option<u64> {
        self.0
            .iter()
            .find(|(existing, _)| existing == option)
            .map(|(_, count)| *count)
    }

    /// Total number of counted votes.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (option, count) in &self.0 {
            map.serialize_entry(option, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Tally {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TallyVisitor;

        impl<'de> Visitor<'de> for TallyVisitor {
            type Value = Tally;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from option text to vote count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut counts = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((option, count)) = access.next_entry::<OptionText, u64>()? {
                    counts.push((option, count));
                }
                Ok(Tally(counts))
            }
        }

        deserializer.deserialize_map(TallyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::serde::json::serde_json;

    fn options(opts: &[&str]) -> Vec<OptionText> {
        opts.iter().map(|o| o.to_string()).collect()
    }

    #[test]
    fn every_option_present_even_without_votes() {
        let tally = Tally::new(&options(&["Yes", "No", "Maybe"]), vec![("Yes".into(), 3)]);
        assert_eq!(tally.get("Yes"), Some(3));
        assert_eq!(tally.get("No"), Some(0));
        assert_eq!(tally.get("Maybe"), Some(0));
        assert_eq!(tally.len(), 3);
    }

    #[test]
    fn orphaned_votes_are_ignored() {
        let tally = Tally::new(
            &options(&["Yes", "No"]),
            vec![("Yes".into(), 2), ("Old option".into(), 5), ("No".into(), 1)],
        );
        assert_eq!(tally.get("Old option"), None);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn sums_match_counted_votes() {
        let raw = vec![("A".to_string(), 4), ("B".to_string(), 7), ("C".to_string(), 1)];
        let tally = Tally::new(&options(&["A", "B", "C"]), raw.clone());
        let expected: u64 = raw.iter().map(|(_, c)| c).sum();
        assert_eq!(tally.total(), expected);
    }

    #[test]
    fn repeated_options_reported_once() {
        let tally = Tally::new(&options(&["Yes", "No", "Yes"]), vec![("Yes".into(), 2)]);
        assert_eq!(tally.len(), 2);
        assert_eq!(tally.get("Yes"), Some(2));
        assert_eq!(tally.total(), 2);
    }

    #[test]
    fn serialises_in_option_order() {
        let tally = Tally::new(&options(&["Zebra", "Apple"]), vec![("Apple".into(), 1)]);
        let json = serde_json::to_string(&tally).unwrap();
        assert_eq!(json, r#"{"Zebra":0,"Apple":1}"#);

        let parsed: Tally = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tally);
    }
}
