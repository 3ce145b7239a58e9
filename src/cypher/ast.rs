//! Cypher write-query IR.
//!
//! These types describe the queries the compilers emit. Beyond parameter
//! collection they carry no behavior. Text is produced only by
//! [`super::render`].

use std::collections::BTreeSet;

/// A single (possibly multi-clause) Cypher query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

/// One clause of a query, rendered on its own line(s).
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// UNWIND expr AS alias
    Unwind { expr: Expr, alias: String },
    /// [OPTIONAL] MATCH pattern, ... [WHERE ...]
    Match(MatchClause),
    /// MERGE pattern [ON CREATE SET ...]
    Merge(MergeClause),
    /// SET item, ...
    Set(Vec<SetItem>),
    /// WITH a, b [WHERE ...] [LIMIT ...]
    With(WithClause),
    /// CALL { q1 UNION q2 ... }
    Call(Vec<Query>),
    /// [DETACH] DELETE a, b
    Delete { variables: Vec<String>, detach: bool },
    /// Schema commands (CREATE INDEX ...)
    Schema(SchemaCommand),
}

/// MATCH clause with patterns and optional WHERE.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub optional: bool,
    pub patterns: Vec<Pattern>,
    pub where_clause: Option<Expr>,
}

/// MERGE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeClause {
    pub pattern: Pattern,
    pub on_create: Vec<SetItem>,
}

/// WITH clause (pipeline boundary).
#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub items: Vec<String>,
    pub where_clause: Option<Expr>,
    pub limit: Option<Expr>,
}

/// A pattern: (a:Person)-[:KNOWS]->(b:Person)
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub elements: Vec<PatternElement>,
}

/// Element of a pattern: a node or a relationship.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternElement {
    Node(NodePattern),
    Relationship(RelPattern),
}

/// Node pattern: (alias:Label1:Label2 {prop: value})
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub alias: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expr)>,
}

/// Relationship pattern: -[alias:TYPE]->
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub alias: Option<String>,
    pub rel_type: Option<String>,
    pub direction: PatternDirection,
}

/// Pattern direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDirection {
    /// ->
    Right,
    /// <-
    Left,
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression in Cypher.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Literal),
    /// Variable reference: `n`, `r`
    Variable(String),
    /// Property access: `n.name`
    Property { expr: Box<Expr>, key: String },
    /// Parameter: `$name`
    Parameter(String),
    /// Function call: `timestamp()`, `toLower(x)`
    FunctionCall { name: String, args: Vec<Expr> },
    /// Binary operation: `a = b`, `a AND b`
    BinaryOp { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    /// IN predicate: `x IN list`
    In { expr: Box<Expr>, list: Box<Expr> },
    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },
    /// `a CONTAINS b`
    StringOp { left: Box<Expr>, op: StringOp, right: Box<Expr> },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Neq,
    And,
}

/// String-specific operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Contains,
}

/// Single SET item.
#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    /// SET n.prop = expr
    Property { variable: String, key: String, value: Expr },
    /// SET n:Label1:Label2
    Labels { variable: String, labels: Vec<String> },
}

/// Schema commands.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaCommand {
    /// CREATE INDEX IF NOT EXISTS FOR ... ON (...)
    CreateIndex(IndexTarget),
}

/// What an index covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexTarget {
    Node { label: String, properties: Vec<String> },
    Relationship { rel_type: String, properties: Vec<String> },
}

// ============================================================================
// Constructors
// ============================================================================

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Expr::Parameter(name.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(s.into()))
    }

    /// `variable.key`
    pub fn prop(variable: impl Into<String>, key: impl Into<String>) -> Self {
        Expr::Property { expr: Box::new(Expr::var(variable)), key: key.into() }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::FunctionCall { name: name.into(), args }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::BinaryOp { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn equals(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Eq, right)
    }

    pub fn not_equals(left: Expr, right: Expr) -> Self {
        Self::binary(left, BinaryOp::Neq, right)
    }

    pub fn is_not_null(expr: Expr) -> Self {
        Expr::IsNull { expr: Box::new(expr), negated: true }
    }

    /// Fold predicates with AND. `None` for an empty input.
    pub fn all(predicates: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        predicates.into_iter().reduce(|acc, p| Self::binary(acc, BinaryOp::And, p))
    }
}

impl NodePattern {
    pub fn new(alias: Option<&str>, label: Option<&str>) -> Self {
        Self {
            alias: alias.map(str::to_owned),
            labels: label.map(|l| vec![l.to_owned()]).unwrap_or_default(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Expr) -> Self {
        self.properties.push((key.into(), value));
        self
    }
}

impl Pattern {
    pub fn node(node: NodePattern) -> Self {
        Pattern { elements: vec![PatternElement::Node(node)] }
    }

    /// Extend the pattern: `... -[rel]- (node)`.
    pub fn link(mut self, rel: RelPattern, node: NodePattern) -> Self {
        self.elements.push(PatternElement::Relationship(rel));
        self.elements.push(PatternElement::Node(node));
        self
    }
}

impl WithClause {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { items: items.into_iter().map(Into::into).collect(), where_clause: None, limit: None }
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn limit(mut self, limit: Expr) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ============================================================================
// Parameter collection
// ============================================================================

impl Query {
    /// Every `$parameter` the query references, including inside subqueries.
    pub fn parameters(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_parameters(&mut out);
        out
    }

    fn collect_parameters(&self, out: &mut BTreeSet<String>) {
        for clause in &self.clauses {
            match clause {
                Clause::Unwind { expr, .. } => expr.collect_parameters(out),
                Clause::Match(m) => {
                    m.patterns.iter().for_each(|p| p.collect_parameters(out));
                    if let Some(w) = &m.where_clause {
                        w.collect_parameters(out);
                    }
                }
                Clause::Merge(m) => {
                    m.pattern.collect_parameters(out);
                    m.on_create.iter().for_each(|s| s.collect_parameters(out));
                }
                Clause::Set(items) => items.iter().for_each(|s| s.collect_parameters(out)),
                Clause::With(w) => {
                    w.where_clause.iter().chain(w.limit.iter()).for_each(|e| e.collect_parameters(out));
                }
                Clause::Call(branches) => branches.iter().for_each(|q| q.collect_parameters(out)),
                Clause::Delete { .. } | Clause::Schema(_) => {}
            }
        }
    }
}

impl Pattern {
    fn collect_parameters(&self, out: &mut BTreeSet<String>) {
        for element in &self.elements {
            if let PatternElement::Node(node) = element {
                node.properties.iter().for_each(|(_, e)| e.collect_parameters(out));
            }
        }
    }
}

impl SetItem {
    fn collect_parameters(&self, out: &mut BTreeSet<String>) {
        if let SetItem::Property { value, .. } = self {
            value.collect_parameters(out);
        }
    }
}

impl Expr {
    fn collect_parameters(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Parameter(name) => {
                out.insert(name.clone());
            }
            Expr::Literal(_) | Expr::Variable(_) => {}
            Expr::Property { expr, .. } | Expr::IsNull { expr, .. } => expr.collect_parameters(out),
            Expr::FunctionCall { args, .. } => args.iter().for_each(|a| a.collect_parameters(out)),
            Expr::BinaryOp { left, right, .. } | Expr::StringOp { left, right, .. } => {
                left.collect_parameters(out);
                right.collect_parameters(out);
            }
            Expr::In { expr, list } => {
                expr.collect_parameters(out);
                list.collect_parameters(out);
            }
        }
    }
}
