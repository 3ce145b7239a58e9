//! Cypher renderer: IR to query text.
//!
//! One clause per line; `CALL { ... }` bodies are indented four spaces per
//! level with `UNION` between branches. Output is deterministic for a given
//! IR value.

use std::fmt;

use super::ast::*;

const INDENT: &str = "    ";

/// Render a query to Cypher text.
pub fn render(query: &Query) -> String {
    let mut lines = Vec::new();
    push_query(query, 0, &mut lines);
    lines.join("\n")
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

fn push_query(query: &Query, depth: usize, out: &mut Vec<String>) {
    let pad = INDENT.repeat(depth);
    for clause in &query.clauses {
        match clause {
            Clause::Call(branches) => {
                out.push(format!("{pad}CALL {{"));
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        out.push(format!("{pad}{INDENT}UNION"));
                    }
                    push_query(branch, depth + 1, out);
                }
                out.push(format!("{pad}}}"));
            }
            other => {
                for line in clause_lines(other) {
                    out.push(format!("{pad}{line}"));
                }
            }
        }
    }
}

fn clause_lines(clause: &Clause) -> Vec<String> {
    match clause {
        Clause::Unwind { expr, alias } => vec![format!("UNWIND {expr} AS {alias}")],
        Clause::Match(m) => {
            let keyword = if m.optional { "OPTIONAL MATCH" } else { "MATCH" };
            let mut lines = vec![format!("{keyword} {}", join(&m.patterns))];
            if let Some(w) = &m.where_clause {
                lines.push(format!("WHERE {w}"));
            }
            lines
        }
        Clause::Merge(m) => {
            let mut lines = vec![format!("MERGE {}", m.pattern)];
            if !m.on_create.is_empty() {
                lines.push(format!("ON CREATE SET {}", join(&m.on_create)));
            }
            lines
        }
        Clause::Set(items) => vec![format!("SET {}", join(items))],
        Clause::With(w) => {
            let mut line = format!("WITH {}", w.items.join(", "));
            if let Some(limit) = &w.limit {
                line.push_str(&format!(" LIMIT {limit}"));
            }
            if let Some(pred) = &w.where_clause {
                line.push_str(&format!(" WHERE {pred}"));
            }
            vec![line]
        }
        Clause::Delete { variables, detach } => {
            let keyword = if *detach { "DETACH DELETE" } else { "DELETE" };
            vec![format!("{keyword} {}", variables.join(", "))]
        }
        Clause::Schema(cmd) => vec![cmd.to_string()],
        // Handled by push_query so nested bodies get their own indentation.
        Clause::Call(_) => Vec::new(),
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// Patterns
// ============================================================================

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.elements {
            match element {
                PatternElement::Node(n) => write!(f, "{n}")?,
                PatternElement::Relationship(r) => write!(f, "{r}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for NodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        if let Some(alias) = &self.alias {
            write!(f, "{alias}")?;
        }
        for label in &self.labels {
            write!(f, ":{label}")?;
        }
        if !self.properties.is_empty() {
            let props: Vec<String> = self.properties.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            write!(f, " {{{}}}", props.join(", "))?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for RelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = format!(
            "[{}{}]",
            self.alias.as_deref().unwrap_or(""),
            self.rel_type.as_ref().map(|t| format!(":{t}")).unwrap_or_default(),
        );
        match self.direction {
            PatternDirection::Right => write!(f, "-{body}->"),
            PatternDirection::Left => write!(f, "<-{body}-"),
        }
    }
}

impl fmt::Display for SetItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetItem::Property { variable, key, value } => write!(f, "{variable}.{key} = {value}"),
            SetItem::Labels { variable, labels } => write!(f, "{variable}:{}", labels.join(":")),
        }
    }
}

impl fmt::Display for SchemaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaCommand::CreateIndex(IndexTarget::Node { label, properties }) => {
                let on: Vec<String> = properties.iter().map(|p| format!("n.{p}")).collect();
                write!(f, "CREATE INDEX IF NOT EXISTS FOR (n:{label}) ON ({})", on.join(", "))
            }
            SchemaCommand::CreateIndex(IndexTarget::Relationship { rel_type, properties }) => {
                let on: Vec<String> = properties.iter().map(|p| format!("r.{p}")).collect();
                write!(f, "CREATE INDEX IF NOT EXISTS FOR ()-[r:{rel_type}]-() ON ({})", on.join(", "))
            }
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Variable(name) => write!(f, "{name}"),
            Expr::Property { expr, key } => write!(f, "{expr}.{key}"),
            Expr::Parameter(name) => write!(f, "${name}"),
            Expr::FunctionCall { name, args } => write!(f, "{name}({})", join(args)),
            Expr::BinaryOp { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::In { expr, list } => write!(f, "{expr} IN {list}"),
            Expr::IsNull { expr, negated: false } => write!(f, "{expr} IS NULL"),
            Expr::IsNull { expr, negated: true } => write!(f, "{expr} IS NOT NULL"),
            Expr::StringOp { left, op, right } => write!(f, "{left} {op} {right}"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::And => "AND",
        })
    }
}

impl fmt::Display for StringOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StringOp::Contains => "CONTAINS",
        })
    }
}
