// src/repositories/sqlite/sql_translator.rs
//
// QuerySpec -> SQLite predicate
//
// RULES:
// - Output is a WHERE predicate over `posts p` with positional `?` params
// - Values are always bound, never spliced; only column names and operators
//   (all from closed enums) reach the SQL text
// - Metadata and taxonomy predicates are correlated EXISTS subqueries, so a
//   post with several matching rows is never duplicated
// - Negated metadata comparisons require the key to be present:
//   "has the key, and no value of it matches"

use std::collections::HashSet;

use crate::query::{
    BindValue, Clause, ClauseValue, Compare, DateClause, DateColumn, DateBound, FieldClause,
    MetaClause, Order, OrderBy, PostField, QuerySpec, Scalar, TaxonomyClause, TermField,
    TermOperator,
};
use crate::query::clause::FieldKind;
use crate::query::dates::format_storage;

/// Predicate text plus its bindings, in placeholder order
#[derive(Debug, Default)]
pub struct Predicate {
    pub sql: String,
    pub bindings: Vec<BindValue>,
}

struct SqlBuilder {
    parts: Vec<String>,
    bindings: Vec<BindValue>,
}

impl SqlBuilder {
    fn new() -> Self {
        Self {
            parts: Vec::new(),
            bindings: Vec::new(),
        }
    }

    fn bind(&mut self, value: BindValue) -> &'static str {
        self.bindings.push(value);
        "?"
    }

    fn bind_list(&mut self, values: impl IntoIterator<Item = BindValue>) -> String {
        let placeholders: Vec<&str> = values.into_iter().map(|v| self.bind(v)).collect();
        placeholders.join(", ")
    }

    fn push(&mut self, part: String) {
        self.parts.push(part);
    }

    fn finish(self) -> Predicate {
        let sql = if self.parts.is_empty() {
            "1".to_string()
        } else {
            self.parts.join(" AND ")
        };
        Predicate {
            sql,
            bindings: self.bindings,
        }
    }
}

pub fn translate(spec: &QuerySpec) -> Predicate {
    let mut builder = SqlBuilder::new();

    if let Some(statuses) = &spec.statuses {
        let list = builder.bind_list(statuses.iter().cloned().map(BindValue::Text));
        builder.push(format!("p.status IN ({})", list));
    }

    for clause in &spec.clauses {
        let part = match clause {
            Clause::Field(field) => field_predicate(&mut builder, field),
            Clause::Meta(meta) => meta_predicate(&mut builder, meta),
            Clause::Taxonomy(tax) => taxonomy_predicate(&mut builder, tax),
            Clause::Date(date) => date_predicate(&mut builder, date),
            Clause::Status(_) => continue,
            Clause::NotRelatedTo(keys) => not_related_predicate(&mut builder, keys),
            Clause::Search(text) => search_predicate(&mut builder, text),
        };
        builder.push(part);
    }

    builder.finish()
}

pub fn order_clause(order_by: OrderBy, order: Order) -> String {
    let column = match order_by {
        OrderBy::Id => "p.id",
        OrderBy::Date => "p.date",
        OrderBy::Title => "p.title",
        OrderBy::MenuOrder => "p.menu_order",
    };
    let direction = match order {
        Order::Asc => "ASC",
        Order::Desc => "DESC",
    };
    if order_by == OrderBy::Id {
        format!("ORDER BY p.id {}", direction)
    } else {
        format!("ORDER BY {} {}, p.id {}", column, direction, direction)
    }
}

// ============================================================================
// VALUES
// ============================================================================

fn scalar_bind(value: &Scalar) -> BindValue {
    match value {
        Scalar::Int(i) => BindValue::Int(*i),
        Scalar::Float(f) => BindValue::Real(*f),
        Scalar::Text(s) => BindValue::Text(s.clone()),
    }
}

fn text_bind(value: &Scalar) -> BindValue {
    BindValue::Text(value.to_string())
}

/// `%value%` with LIKE wildcards escaped
fn like_bind(value: &Scalar) -> BindValue {
    let raw = value.to_string();
    let mut escaped = String::with_capacity(raw.len() + 2);
    escaped.push('%');
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    BindValue::Text(escaped)
}

/// Comparison of `column` against `value`. `numeric` binds as-is; otherwise
/// every value is bound as text.
fn comparison(
    builder: &mut SqlBuilder,
    column: &str,
    compare: Compare,
    value: &ClauseValue,
    numeric: bool,
) -> String {
    let bind = |v: &Scalar| if numeric { scalar_bind(v) } else { text_bind(v) };

    match (compare, value) {
        (Compare::Like | Compare::NotLike, ClauseValue::One(v)) => {
            let not = if compare == Compare::NotLike { "NOT " } else { "" };
            let p = builder.bind(like_bind(v));
            format!("{} {}LIKE {} ESCAPE '\\'", column, not, p)
        }
        (Compare::Regexp | Compare::NotRegexp, ClauseValue::One(v)) => {
            let not = if compare == Compare::NotRegexp { "NOT " } else { "" };
            let p = builder.bind(text_bind(v));
            format!("{} {}REGEXP {}", column, not, p)
        }
        (Compare::In | Compare::NotIn, ClauseValue::Many(items)) => {
            if items.is_empty() {
                // Unreachable through validated filters; keep the set semantics anyway.
                return if compare == Compare::In { "0" } else { "1" }.to_string();
            }
            let not = if compare == Compare::NotIn { "NOT " } else { "" };
            let list = builder.bind_list(items.iter().map(bind));
            format!("{} {}IN ({})", column, not, list)
        }
        (Compare::Between | Compare::NotBetween, ClauseValue::Range(low, high)) => {
            let not = if compare == Compare::NotBetween { "NOT " } else { "" };
            let lo = builder.bind(bind(low));
            let hi = builder.bind(bind(high));
            format!("{} {}BETWEEN {} AND {}", column, not, lo, hi)
        }
        (_, ClauseValue::One(v)) => {
            let op = match compare {
                Compare::NotEquals => "!=",
                Compare::Gt => ">",
                Compare::Gte => ">=",
                Compare::Lt => "<",
                Compare::Lte => "<=",
                _ => "=",
            };
            let p = builder.bind(bind(v));
            format!("{} {} {}", column, op, p)
        }
        // Shapes are validated before a clause exists.
        _ => "0".to_string(),
    }
}

// ============================================================================
// CLAUSES
// ============================================================================

fn field_column(field: PostField) -> &'static str {
    match field {
        PostField::Id => "p.id",
        PostField::Author => "p.author",
        PostField::Parent => "p.parent",
        PostField::MenuOrder => "p.menu_order",
        PostField::Title => "p.title",
        PostField::Content => "p.content",
        PostField::Excerpt => "p.excerpt",
        PostField::Slug => "p.slug",
        PostField::PostType => "p.post_type",
    }
}

fn field_predicate(builder: &mut SqlBuilder, clause: &FieldClause) -> String {
    let numeric = clause.field.kind() == FieldKind::Numeric;
    comparison(
        builder,
        field_column(clause.field),
        clause.compare,
        &clause.value,
        numeric,
    )
}

fn meta_predicate(builder: &mut SqlBuilder, clause: &MetaClause) -> String {
    const HAS_KEY: &str = "SELECT 1 FROM postmeta m WHERE m.post_id = p.id AND m.meta_key = ";

    match clause.compare {
        Compare::Exists => {
            let key = builder.bind(BindValue::Text(clause.key.clone()));
            format!("EXISTS ({}{})", HAS_KEY, key)
        }
        Compare::NotExists => {
            let key = builder.bind(BindValue::Text(clause.key.clone()));
            format!("NOT EXISTS ({}{})", HAS_KEY, key)
        }
        compare => {
            let numeric = clause.value.is_numeric()
                && !matches!(compare.positive(), Compare::Like | Compare::Regexp);
            let column = if numeric {
                "CAST(m.meta_value AS REAL)"
            } else {
                "m.meta_value"
            };

            if compare.is_negated() {
                let present = builder.bind(BindValue::Text(clause.key.clone()));
                let key = builder.bind(BindValue::Text(clause.key.clone()));
                let test = comparison(builder, column, compare.positive(), &clause.value, numeric);
                format!(
                    "EXISTS ({}{}) AND NOT EXISTS ({}{} AND {})",
                    HAS_KEY, present, HAS_KEY, key, test
                )
            } else {
                let key = builder.bind(BindValue::Text(clause.key.clone()));
                let test = comparison(builder, column, compare, &clause.value, numeric);
                format!("EXISTS ({}{} AND {})", HAS_KEY, key, test)
            }
        }
    }
}

fn taxonomy_predicate(builder: &mut SqlBuilder, clause: &TaxonomyClause) -> String {
    const IN_TAXONOMY: &str = "FROM term_relationships tr JOIN terms t ON t.id = tr.term_id \
                               WHERE tr.post_id = p.id AND t.taxonomy = ";

    match clause {
        TaxonomyClause::Exists { taxonomy } => {
            let tax = builder.bind(BindValue::Text(taxonomy.clone()));
            format!("EXISTS (SELECT 1 {}{})", IN_TAXONOMY, tax)
        }
        TaxonomyClause::NotExists { taxonomy } => {
            let tax = builder.bind(BindValue::Text(taxonomy.clone()));
            format!("NOT EXISTS (SELECT 1 {}{})", IN_TAXONOMY, tax)
        }
        TaxonomyClause::Terms {
            taxonomy,
            field,
            operator,
            terms,
        } => {
            let column = match field {
                TermField::Id => "t.id",
                TermField::Name => "t.name",
                TermField::Slug => "t.slug",
            };
            let mut seen = HashSet::new();
            let distinct: Vec<BindValue> = terms
                .iter()
                .filter(|t| seen.insert(t.to_string()))
                .map(scalar_bind)
                .collect();
            if distinct.is_empty() {
                return match operator {
                    TermOperator::NotIn => "1",
                    TermOperator::In | TermOperator::And => "0",
                }
                .to_string();
            }
            let wanted = distinct.len();

            let tax = builder.bind(BindValue::Text(taxonomy.clone()));
            let list = builder.bind_list(distinct);
            match operator {
                TermOperator::In => format!(
                    "EXISTS (SELECT 1 {}{} AND {} IN ({}))",
                    IN_TAXONOMY, tax, column, list
                ),
                TermOperator::NotIn => format!(
                    "NOT EXISTS (SELECT 1 {}{} AND {} IN ({}))",
                    IN_TAXONOMY, tax, column, list
                ),
                TermOperator::And => format!(
                    "(SELECT COUNT(DISTINCT {}) {}{} AND {} IN ({})) = {}",
                    column, IN_TAXONOMY, tax, column, list, wanted
                ),
            }
        }
    }
}

fn date_predicate(builder: &mut SqlBuilder, clause: &DateClause) -> String {
    let column = match clause.column {
        DateColumn::Local => "p.date",
        DateColumn::Gmt => "p.date_gmt",
    };
    let op = match clause.bound {
        DateBound::AtOrAfter => ">=",
        DateBound::After => ">",
        DateBound::AtOrBefore => "<=",
    };
    let at = builder.bind(BindValue::Text(format_storage(&clause.at)));
    format!("{} {} {}", column, op, at)
}

fn not_related_predicate(builder: &mut SqlBuilder, keys: &[String]) -> String {
    if keys.is_empty() {
        return "1".to_string();
    }
    let list = builder.bind_list(keys.iter().cloned().map(BindValue::Text));
    // Joining the source post drops references left behind by deleted posts.
    // A post pointing at itself is not related to anything else.
    format!(
        "NOT EXISTS (SELECT 1 FROM postmeta r JOIN posts src ON src.id = r.post_id \
         WHERE r.meta_key IN ({}) AND r.meta_value = CAST(p.id AS TEXT) AND src.id != p.id)",
        list
    )
}

fn search_predicate(builder: &mut SqlBuilder, text: &str) -> String {
    let needle = Scalar::Text(text.to_string());
    let columns = ["p.title", "p.content", "p.excerpt"];
    let parts: Vec<String> = columns
        .iter()
        .map(|column| {
            let p = builder.bind(like_bind(&needle));
            format!("{} LIKE {} ESCAPE '\\'", column, p)
        })
        .collect();
    format!("({})", parts.join(" OR "))
}
