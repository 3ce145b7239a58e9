//! Property references: where a schema field's value comes from and how a
//! relationship target is matched on it.

use std::fmt;

use crate::{Error, Result};

/// Where the value of a [`PropertyRef`] is read from at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// A field of the record currently being ingested (`item.<name>`).
    Record,
    /// A keyword parameter fixed for the whole call (`$<name>`).
    Kwargs,
}

/// How a target-node property is compared against a [`PropertyRef`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// `node.key = value`
    Exact,
    /// `toLower(node.key) = toLower(value)`
    IgnoreCase,
    /// `toLower(node.key) CONTAINS toLower(value)`
    FuzzyAndIgnoreCase,
    /// `node.key IN value`; the value is a list.
    OneToMany,
}

/// A reference to a value, used for node properties, relationship
/// properties and target/source matchers.
///
/// At most one matching modifier may be set; [`PropertyRef::match_mode`]
/// rejects combinations, and schema builders call it for every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyRef {
    name: String,
    source: ValueSource,
    ignore_case: bool,
    fuzzy_and_ignore_case: bool,
    one_to_many: bool,
    extra_index: bool,
}

impl PropertyRef {
    fn new(name: impl Into<String>, source: ValueSource) -> Self {
        Self {
            name: name.into(),
            source,
            ignore_case: false,
            fuzzy_and_ignore_case: false,
            one_to_many: false,
            extra_index: false,
        }
    }

    /// Read `name` from the current record.
    pub fn record(name: impl Into<String>) -> Self {
        Self::new(name, ValueSource::Record)
    }

    /// Read `name` from the call's keyword parameters.
    pub fn kwarg(name: impl Into<String>) -> Self {
        Self::new(name, ValueSource::Kwargs)
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn fuzzy_and_ignore_case(mut self) -> Self {
        self.fuzzy_and_ignore_case = true;
        self
    }

    pub fn one_to_many(mut self) -> Self {
        self.one_to_many = true;
        self
    }

    /// Request a secondary index on the node property this ref feeds.
    pub fn extra_index(mut self) -> Self {
        self.extra_index = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> ValueSource {
        self.source
    }

    pub fn is_kwarg(&self) -> bool {
        self.source == ValueSource::Kwargs
    }

    pub fn wants_extra_index(&self) -> bool {
        self.extra_index
    }

    /// The single active matching modifier, `Exact` when none is set.
    pub fn match_mode(&self) -> Result<MatchMode> {
        let active = [
            (self.ignore_case, MatchMode::IgnoreCase),
            (self.fuzzy_and_ignore_case, MatchMode::FuzzyAndIgnoreCase),
            (self.one_to_many, MatchMode::OneToMany),
        ];
        let mut modes = active.iter().filter(|(set, _)| *set).map(|(_, mode)| *mode);
        match (modes.next(), modes.next()) {
            (None, _) => Ok(MatchMode::Exact),
            (Some(mode), None) => Ok(mode),
            (Some(_), Some(_)) => Err(Error::Schema(format!(
                "PropertyRef '{}' sets more than one of ignore_case, fuzzy_and_ignore_case, one_to_many",
                self.name
            ))),
        }
    }
}

/// Renders the value expression: `item.Name` or `$Name`.
impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            ValueSource::Record => write!(f, "item.{}", self.name),
            ValueSource::Kwargs => write!(f, "${}", self.name),
        }
    }
}

/// Ordered attribute-name → [`PropertyRef`] mapping.
///
/// Insertion order is preserved so compiled queries are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RefMap {
    entries: Vec<(String, PropertyRef)>,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyRef) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyRef> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyRef)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every key and ref name is a plain identifier and every ref has
    /// a valid modifier combination.
    pub(crate) fn validate(&self, owner: &str) -> Result<()> {
        for (key, prop) in self.iter() {
            validate_identifier(owner, key)?;
            validate_identifier(owner, prop.name())?;
            prop.match_mode()?;
        }
        Ok(())
    }
}

impl<K: Into<String>> FromIterator<(K, PropertyRef)> for RefMap {
    fn from_iter<I: IntoIterator<Item = (K, PropertyRef)>>(iter: I) -> Self {
        let mut map = RefMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Labels, relationship types and property keys are spliced into query text,
/// so they must be plain identifiers.
pub(crate) fn validate_identifier(owner: &str, ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Schema(format!("{owner}: '{ident}' is not a valid identifier")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(PropertyRef::record("Arn").to_string(), "item.Arn");
        assert_eq!(PropertyRef::kwarg("UPDATE_TAG").to_string(), "$UPDATE_TAG");
    }

    #[test]
    fn test_match_mode_default_exact() {
        assert_eq!(PropertyRef::record("id").match_mode().unwrap(), MatchMode::Exact);
        assert_eq!(
            PropertyRef::record("id").extra_index().match_mode().unwrap(),
            MatchMode::Exact
        );
    }

    #[test]
    fn test_match_mode_single_modifier() {
        assert_eq!(PropertyRef::record("a").ignore_case().match_mode().unwrap(), MatchMode::IgnoreCase);
        assert_eq!(
            PropertyRef::record("a").fuzzy_and_ignore_case().match_mode().unwrap(),
            MatchMode::FuzzyAndIgnoreCase
        );
        assert_eq!(PropertyRef::record("a").one_to_many().match_mode().unwrap(), MatchMode::OneToMany);
    }

    #[test]
    fn test_ref_map_keeps_order_on_replace() {
        let mut map = RefMap::new();
        map.insert("id", PropertyRef::record("Id"));
        map.insert("name", PropertyRef::record("Name"));
        map.insert("id", PropertyRef::record("Arn"));
        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert_eq!(map.get("id").unwrap().name(), "Arn");
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("X", "_module_name").is_ok());
        assert!(validate_identifier("X", "AWSAccount").is_ok());
        assert!(validate_identifier("X", "").is_err());
        assert!(validate_identifier("X", "1abc").is_err());
        assert!(validate_identifier("X", "a}) DETACH DELETE (x").is_err());
    }

    #[test]
    fn test_match_mode_rejects_two_modifiers() {
        let err = PropertyRef::record("Email").ignore_case().one_to_many().match_mode().unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("Email")));
    }
}
