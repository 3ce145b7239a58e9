//! PropertyMap: records and keyword parameters.

use std::collections::BTreeMap;
use super::Value;

/// A map of property names to values.
///
/// Ordered so that rendered parameters and serialized jobs are stable.
pub type PropertyMap = BTreeMap<String, Value>;

/// Build a PropertyMap from (key, value) pairs.
///
/// ```
/// use cartography::{property_map, Value};
///
/// let params = property_map([("UPDATE_TAG", Value::from(1)), ("OwnerId", "acct-1".into())]);
/// assert_eq!(params["OwnerId"], Value::from("acct-1"));
/// ```
pub fn property_map<K, V, I>(pairs: I) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Copy `base`, then overlay `extra` on the copy. Neither input is touched.
pub fn merged(base: &PropertyMap, extra: &PropertyMap) -> PropertyMap {
    let mut out = base.clone();
    out.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}
