//! Shared pieces: value expressions, target matching, stamping.

use crate::cypher::ast::*;
use crate::schema::{LinkDirection, MatchMode, ModuleInfo, PropertyRef, RefMap, ValueSource};
use crate::{Error, Result};

/// Name the UNWIND binds each record to.
pub(crate) const ITEM: &str = "item";

/// The value expression a ref reads: `item.Name` or `$Name`.
pub(crate) fn value_expr(prop: &PropertyRef) -> Expr {
    match prop.source() {
        ValueSource::Record => Expr::prop(ITEM, prop.name()),
        ValueSource::Kwargs => Expr::param(prop.name()),
    }
}

/// A node to look up: exact fields inline in the pattern, everything else
/// as predicates over `alias`.
pub(crate) struct TargetMatch {
    pub node: NodePattern,
    pub predicates: Vec<Expr>,
}

impl TargetMatch {
    /// `keep_alias = false` drops the alias when no predicate needs it.
    pub(crate) fn new(alias: &str, label: &str, matcher: &RefMap, keep_alias: bool) -> Result<Self> {
        let mut node = NodePattern::new(Some(alias), Some(label));
        let mut predicates = Vec::new();
        for (key, prop) in matcher.iter() {
            let value = value_expr(prop);
            let field = Expr::prop(alias, key);
            match prop.match_mode()? {
                MatchMode::Exact => node.properties.push((key.to_owned(), value)),
                MatchMode::IgnoreCase => predicates.push(Expr::equals(lower(field), lower(value))),
                MatchMode::FuzzyAndIgnoreCase => predicates.push(Expr::StringOp {
                    left: Box::new(lower(field)),
                    op: StringOp::Contains,
                    right: Box::new(lower(value)),
                }),
                MatchMode::OneToMany => predicates.push(Expr::In { expr: Box::new(field), list: Box::new(value) }),
            }
        }
        if !keep_alias && predicates.is_empty() {
            node.alias = None;
        }
        Ok(Self { node, predicates })
    }

    /// AND of all predicates plus `extra`.
    pub(crate) fn where_with(&self, extra: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        Expr::all(self.predicates.iter().cloned().chain(extra))
    }
}

fn lower(expr: Expr) -> Expr {
    Expr::call("toLower", vec![expr])
}

/// Relationship pattern from the point of view of the left-hand node.
pub(crate) fn rel_pattern(alias: Option<&str>, rel_type: &str, direction: LinkDirection) -> RelPattern {
    RelPattern {
        alias: alias.map(str::to_owned),
        rel_type: Some(rel_type.to_owned()),
        direction: match direction {
            LinkDirection::Inward => PatternDirection::Left,
            LinkDirection::Outward => PatternDirection::Right,
        },
    }
}

/// `variable.firstseen = timestamp()`
pub(crate) fn firstseen(variable: &str) -> SetItem {
    SetItem::Property {
        variable: variable.to_owned(),
        key: "firstseen".to_owned(),
        value: Expr::call("timestamp", Vec::new()),
    }
}

/// SET items for every declared property except those in `skip`, followed by
/// the provenance stamps.
pub(crate) fn property_set_items(variable: &str, props: &RefMap, skip: &[&str], module: &ModuleInfo) -> Vec<SetItem> {
    let mut items: Vec<SetItem> = props
        .iter()
        .filter(|(key, _)| !skip.contains(key))
        .map(|(key, prop)| SetItem::Property {
            variable: variable.to_owned(),
            key: key.to_owned(),
            value: value_expr(prop),
        })
        .collect();
    items.push(SetItem::Property {
        variable: variable.to_owned(),
        key: "_module_name".to_owned(),
        value: Expr::string(module.name.clone()),
    });
    items.push(SetItem::Property {
        variable: variable.to_owned(),
        key: "_module_version".to_owned(),
        value: Expr::string(module.version.clone()),
    });
    items
}

/// At cleanup time there is no current record, so a matcher used to scope
/// cleanup may only read keyword parameters.
pub(crate) fn require_kwargs_only(owner: &str, matcher: &RefMap) -> Result<()> {
    match matcher.iter().find(|(_, prop)| !prop.is_kwarg()) {
        Some((key, prop)) => Err(Error::Schema(format!(
            "{owner}: cleanup matcher field '{key}' reads record field '{}'; only keyword parameters are available at cleanup time",
            prop.name()
        ))),
        None => Ok(()),
    }
}
