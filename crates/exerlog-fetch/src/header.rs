//! Case-insensitive, multi-valued header map.
//!
//! Names keep the casing they were first inserted with, but every lookup
//! matches ASCII case-insensitively. Iteration is ordered by lower-cased
//! name.

use std::collections::{BTreeMap, HashMap};

use crate::error::FetchError;

/// An HTTP header as a name-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Header values as handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl HeaderValues {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            HeaderValues::One(value) => std::slice::from_ref(value),
            HeaderValues::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    name: String,
    values: Vec<String>,
}

/// Case-insensitive, multi-valued collection of HTTP headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    // keyed by lower-cased name
    entries: BTreeMap<String, Entry>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Build a header map from any supported initializer.
    pub fn try_from_init(init: impl Into<HeadersInit>) -> Result<Self, FetchError> {
        match init.into() {
            HeadersInit::Map(map) => Ok(map),
            HeadersInit::Pairs(pairs) => {
                let mut map = Self::new();
                for (name, value) in pairs {
                    map.append(&name, &value)?;
                }
                Ok(map)
            }
        }
    }

    /// Build a header map from transport output, skipping entries that fail
    /// validation instead of rejecting the whole set.
    pub fn from_lenient<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            let (name, value) = (name.as_ref(), value.as_ref());
            if validate_name(name).is_ok() && validate_value(value).is_ok() {
                map.push(name, value);
            }
        }
        map
    }

    /// Values for `name` joined with `", "`, or `None` if absent.
    ///
    /// `Content-Encoding` values are returned lower-cased.
    pub fn get(&self, name: &str) -> Result<Option<String>, FetchError> {
        validate_name(name)?;
        Ok(self.find(name).map(|entry| {
            let joined = entry.values.join(", ");
            if name.eq_ignore_ascii_case("content-encoding") {
                joined.to_lowercase()
            } else {
                joined
            }
        }))
    }

    /// Every value stored for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Result<&[String], FetchError> {
        validate_name(name)?;
        Ok(self.find(name).map(|entry| entry.values.as_slice()).unwrap_or(&[]))
    }

    /// Replace all values for `name` with `value`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), FetchError> {
        validate_name(name)?;
        validate_value(value)?;
        let key = name.to_ascii_lowercase();
        match self.entries.get_mut(&key) {
            Some(entry) => entry.values = vec![value.to_owned()],
            None => {
                self.entries.insert(
                    key,
                    Entry {
                        name: name.to_owned(),
                        values: vec![value.to_owned()],
                    },
                );
            }
        }
        Ok(())
    }

    /// Add `value` after any existing values for `name`.
    pub fn append(&mut self, name: &str, value: &str) -> Result<(), FetchError> {
        validate_name(name)?;
        validate_value(value)?;
        self.push(name, value);
        Ok(())
    }

    pub fn has(&self, name: &str) -> Result<bool, FetchError> {
        validate_name(name)?;
        Ok(self.find(name).is_some())
    }

    /// Remove `name`. Absent names are ignored.
    pub fn delete(&mut self, name: &str) -> Result<(), FetchError> {
        validate_name(name)?;
        self.entries.remove(&name.to_ascii_lowercase());
        Ok(())
    }

    /// Lower-cased names in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Joined values, ordered by lower-cased name.
    pub fn values(&self) -> impl Iterator<Item = String> + Clone + '_ {
        self.entries.values().map(|entry| entry.values.join(", "))
    }

    /// `(lower-cased name, joined value)` pairs ordered by name.
    pub fn entries(&self) -> impl Iterator<Item = Header> + Clone + '_ {
        self.entries
            .iter()
            .map(|(key, entry)| Header::new(key.clone(), entry.values.join(", ")))
    }

    /// Names with their original casing and raw value lists.
    pub fn raw(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .values()
            .map(|entry| (entry.name.as_str(), entry.values.as_slice()))
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export for a transport layer: every name maps to its value list,
    /// except `Host`, which is collapsed to its first value.
    pub fn to_transport_record(&self) -> Vec<(String, HeaderValues)> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| {
                let values = if key == "host" {
                    HeaderValues::One(entry.values.first()?.clone())
                } else {
                    HeaderValues::Many(entry.values.clone())
                };
                Some((entry.name.clone(), values))
            })
            .collect()
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.entries.get(&name.to_ascii_lowercase())
        } else {
            self.entries.get(name)
        }
    }

    fn push(&mut self, name: &str, value: &str) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| Entry {
                name: name.to_owned(),
                values: Vec::new(),
            })
            .values
            .push(value.to_owned());
    }
}

/// Accepted initializers for a [`HeaderMap`].
#[derive(Debug, Clone)]
pub enum HeadersInit {
    /// Copy of an existing map.
    Map(HeaderMap),
    /// Name/value pairs appended in order. Records convert into this form.
    Pairs(Vec<(String, String)>),
}

impl HeadersInit {
    /// Append one more pair to this initializer.
    pub fn push(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut pairs = match self {
            HeadersInit::Pairs(pairs) => pairs,
            HeadersInit::Map(map) => map
                .raw()
                .flat_map(|(name, values)| {
                    values.iter().map(move |value| (name.to_owned(), value.clone()))
                })
                .collect(),
        };
        pairs.push((name.into(), value.into()));
        HeadersInit::Pairs(pairs)
    }
}

impl From<HeaderMap> for HeadersInit {
    fn from(map: HeaderMap) -> Self {
        HeadersInit::Map(map)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for HeadersInit {
    fn from(pairs: Vec<(K, V)>) -> Self {
        HeadersInit::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for HeadersInit {
    fn from(pairs: [(K, V); N]) -> Self {
        HeadersInit::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for HeadersInit {
    fn from(record: HashMap<String, String>) -> Self {
        HeadersInit::Pairs(record.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for HeadersInit {
    fn from(record: BTreeMap<String, String>) -> Self {
        HeadersInit::Pairs(record.into_iter().collect())
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

pub(crate) fn validate_name(name: &str) -> Result<(), FetchError> {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(FetchError::InvalidHeaderName(name.to_owned()));
    }
    Ok(())
}

pub(crate) fn validate_value(value: &str) -> Result<(), FetchError> {
    let legal = value
        .chars()
        .all(|c| c == '\t' || (' '..='~').contains(&c) || ('\u{80}'..='\u{ff}').contains(&c));
    if !legal {
        return Err(FetchError::InvalidHeaderValue(value.to_owned()));
    }
    Ok(())
}
