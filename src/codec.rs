//! Persisted form of a user's bookmark list.
//!
//! The list lives in the user record as JSON text. Reading it is lenient: a
//! missing, empty or malformed value reads as an empty list, so a corrupted
//! record never blocks a lookup. Elements are never rewritten: a number with a
//! fractional form such as `10.0` still matches movie 10 and is stored back
//! as written. Strings, objects and other non-numbers never match.

use log::warn;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Movie id named by a client. Numbers that are not whole or do not fit an
/// `i64` name no catalog movie but still match entries equal to them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovieKey {
    Id(i64),
    Number(f64),
}

impl fmt::Display for MovieKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovieKey::Id(id) => write!(f, "{}", id),
            MovieKey::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum BookmarkEntry {
    Movie(i64),
    Foreign(Value),
}

impl BookmarkEntry {
    fn from_value(value: Value) -> Self {
        match value.as_i64() {
            Some(id) => BookmarkEntry::Movie(id),
            None => BookmarkEntry::Foreign(value),
        }
    }

    fn into_value(self) -> Value {
        match self {
            BookmarkEntry::Movie(id) => Value::from(id),
            BookmarkEntry::Foreign(value) => value,
        }
    }

    pub fn matches(&self, key: MovieKey) -> bool {
        match (self, key) {
            (BookmarkEntry::Movie(id), MovieKey::Id(movie_id)) => *id == movie_id,
            (BookmarkEntry::Movie(_), MovieKey::Number(_)) => false,
            (BookmarkEntry::Foreign(Value::Number(n)), MovieKey::Id(movie_id)) => n
                .as_f64()
                .map_or(false, |f| f == movie_id as f64 && f as i64 == movie_id),
            (BookmarkEntry::Foreign(Value::Number(n)), MovieKey::Number(wanted)) => {
                n.as_f64() == Some(wanted)
            }
            (BookmarkEntry::Foreign(_), _) => false,
        }
    }
}

/// Decoded bookmark list. Order is kept and duplicates are tolerated.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct Bookmarks(Vec<BookmarkEntry>);

impl Bookmarks {
    pub fn decode(raw: Option<&str>) -> Self {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Bookmarks::default(),
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(values)) => {
                Bookmarks(values.into_iter().map(BookmarkEntry::from_value).collect())
            }
            Ok(other) => {
                warn!("Bookmark field is not an array: {}", other);
                Bookmarks::default()
            }
            Err(err) => {
                warn!("Failed to parse bookmarks JSON: {}", err);
                Bookmarks::default()
            }
        }
    }

    pub fn encode(&self) -> String {
        Value::Array(self.0.iter().cloned().map(BookmarkEntry::into_value).collect()).to_string()
    }

    pub fn contains(&self, movie_id: i64) -> bool {
        self.contains_key(MovieKey::Id(movie_id))
    }

    pub fn contains_key(&self, key: MovieKey) -> bool {
        self.0.iter().any(|entry| entry.matches(key))
    }

    /// Drops every entry matching `key`.
    pub fn remove(&mut self, key: MovieKey) {
        self.0.retain(|entry| !entry.matches(key));
    }

    /// Appends `key` unless a matching entry is already present.
    pub fn insert(&mut self, key: MovieKey) {
        if self.contains_key(key) {
            return;
        }
        self.0.push(match key {
            MovieKey::Id(id) => BookmarkEntry::Movie(id),
            MovieKey::Number(n) => BookmarkEntry::Foreign(Value::from(n)),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i64>> for Bookmarks {
    fn from(ids: Vec<i64>) -> Self {
        Bookmarks(ids.into_iter().map(BookmarkEntry::Movie).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for ids in vec![vec![], vec![7], vec![5, 10, 22], vec![3, 3, -1, 0]] {
            let list = Bookmarks::from(ids);
            assert_eq!(Bookmarks::decode(Some(&list.encode())), list);
        }
    }

    #[test]
    fn round_trip_generated_lists() {
        // Deterministic xorshift so failures reproduce.
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };
        for _ in 0..500 {
            let len = (next() % 12) as usize;
            let ids = (0..len)
                .map(|_| match next() % 4 {
                    0 => next() as i64,
                    1 => -((next() % 1000) as i64),
                    _ => (next() % 50) as i64,
                })
                .collect::<Vec<_>>();
            let list = Bookmarks::from(ids.clone());
            let encoded = list.encode();
            let decoded = Bookmarks::decode(Some(&encoded));
            assert_eq!(decoded, list, "{}", encoded);
            assert_eq!(decoded.encode(), encoded);
            assert_eq!(decoded.len(), ids.len());
            for id in &ids {
                assert!(decoded.contains(*id), "{} in {}", id, encoded);
            }
        }
    }

    #[test]
    fn empty_encodes_to_empty_array() {
        assert_eq!(Bookmarks::default().encode(), "[]");
        assert_eq!(Bookmarks::from(vec![5, 22]).encode(), "[5,22]");
    }

    #[test]
    fn malformed_input_reads_as_empty() {
        assert!(Bookmarks::decode(None).is_empty());
        assert!(Bookmarks::decode(Some("")).is_empty());
        assert!(Bookmarks::decode(Some("not json")).is_empty());
        assert!(Bookmarks::decode(Some("{}")).is_empty());
        assert!(Bookmarks::decode(Some("42")).is_empty());
        assert!(Bookmarks::decode(Some("null")).is_empty());
    }

    #[test]
    fn foreign_entries_survive_but_never_match() {
        let mut list = Bookmarks::decode(Some(r#"[1,"2",null,2.5,{"id":3}]"#));
        assert_eq!(list.len(), 5);
        assert!(list.contains(1));
        assert!(!list.contains(2));
        assert!(!list.contains(3));
        list.insert(MovieKey::Id(2));
        assert_eq!(list.len(), 6);
        list.remove(MovieKey::Id(2));
        list.remove(MovieKey::Id(1));
        assert_eq!(list.encode(), r#"["2",null,2.5,{"id":3}]"#);
    }

    #[test]
    fn whole_floats_match_their_integer() {
        let mut list = Bookmarks::decode(Some("[10.0,5,1e1]"));
        assert!(list.contains(10));
        assert!(!list.contains(1));
        list.insert(MovieKey::Id(10));
        assert_eq!(list.len(), 3);
        assert_eq!(list.encode(), "[10.0,5,10.0]");
        list.remove(MovieKey::Id(10));
        assert_eq!(list.encode(), "[5]");
    }

    #[test]
    fn fractional_keys_match_only_equal_numbers() {
        let mut list = Bookmarks::decode(Some("[2,2.5,3]"));
        assert!(list.contains_key(MovieKey::Number(2.5)));
        assert!(!list.contains_key(MovieKey::Number(2.0)));
        list.insert(MovieKey::Number(7.25));
        list.insert(MovieKey::Number(2.5));
        assert_eq!(list.encode(), "[2,2.5,3,7.25]");
        list.remove(MovieKey::Number(2.5));
        assert_eq!(list.encode(), "[2,3,7.25]");
    }

    #[test]
    fn remove_drops_all_occurrences() {
        let mut list = Bookmarks::decode(Some("[4,9,4,4]"));
        list.remove(MovieKey::Id(4));
        assert_eq!(list, Bookmarks::from(vec![9]));
        list.remove(MovieKey::Id(4));
        assert_eq!(list, Bookmarks::from(vec![9]));
    }

    #[test]
    fn insert_keeps_order_and_skips_present() {
        let mut list = Bookmarks::decode(Some("[8,2]"));
        list.insert(MovieKey::Id(2));
        list.insert(MovieKey::Id(5));
        assert_eq!(list.encode(), "[8,2,5]");
    }

    #[test]
    fn serializes_as_plain_array() {
        let list = Bookmarks::decode(Some(r#"[5,"x"]"#));
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"[5,"x"]"#);
    }
}
