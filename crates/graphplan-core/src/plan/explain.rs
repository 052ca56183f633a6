//! Readable pseudo-SQL rendering of plans.

use graphplan_proto::OrderDirection;

use super::column::{Column, ColumnExpr};
use super::predicate::{Predicate, Scalar};
use super::query::{OrderKey, QueryPlan};
use super::source::{Source, SourceKind};

impl QueryPlan {
    /// Render the plan as pseudo-SQL, one clause per line.
    ///
    /// Split plans render their seed, path, secondary and count plans as
    /// separate sections.
    pub fn explain(&self) -> String {
        let mut lines = Vec::new();

        match &self.seed {
            Some(seed) => {
                lines.push("-- seed".to_string());
                lines.extend(render_plan(seed));
                if let Some(path) = &self.path {
                    lines.push("-- path".to_string());
                    lines.extend(render_plan(path));
                }
                for (idx, secondary) in self.secondary.iter().enumerate() {
                    lines.push(format!("-- secondary {}", idx + 1));
                    lines.extend(render_plan(secondary));
                }
            }
            None => lines.extend(render_plan(self)),
        }

        if let Some(count) = &self.count {
            lines.push("-- count".to_string());
            lines.extend(render_plan(count));
        }

        lines.join("\n")
    }
}

fn render_plan(plan: &QueryPlan) -> Vec<String> {
    let mut lines = Vec::new();

    let mut head = String::from("SELECT ");
    if plan.distinct {
        head.push_str("DISTINCT ");
    }
    if let Some(top) = plan.top {
        head.push_str(&format!("TOP {} ", top));
    }
    let columns: Vec<String> = plan.all_columns().map(render_column).collect();
    if columns.is_empty() {
        head.push('1');
    } else {
        head.push_str(&columns.join(", "));
    }
    lines.push(head);

    lines.push(format!("FROM {}", render_source(&plan.source)));

    for join in &plan.joins {
        let mut on: Vec<String> = join
            .statements
            .iter()
            .map(|(l, r)| format!("{} = {}", l, r))
            .collect();
        if let Some(filter) = &join.filter {
            on.push(render_predicate(filter));
        }
        let via = join
            .intermediate
            .as_ref()
            .map(|t| format!(" /* via {} */", t))
            .unwrap_or_default();
        lines.push(format!(
            "{} {} ON {}{}",
            join.join_type.keyword(),
            render_source(&join.target),
            on.join(" AND "),
            via
        ));
    }

    if let Some(filter) = &plan.filter {
        lines.push(format!("WHERE {}", render_predicate(filter)));
    }

    for group in &plan.group_by {
        let cols: Vec<String> = group.columns.iter().map(|c| c.to_string()).collect();
        if group.rollup {
            lines.push(format!("GROUP BY ROLLUP({})", cols.join(", ")));
        } else {
            lines.push(format!("GROUP BY {}", cols.join(", ")));
        }
    }

    if !plan.order_by.is_empty() {
        let items: Vec<String> = plan
            .order_by
            .iter()
            .map(|item| {
                let key = match &item.key {
                    OrderKey::Column(c) => c.to_string(),
                    OrderKey::Alias(a) => format!("\"{}\"", a),
                };
                match item.direction {
                    OrderDirection::Asc => key,
                    OrderDirection::Desc => format!("{} DESC", key),
                }
            })
            .collect();
        lines.push(format!("ORDER BY {}", items.join(", ")));
    }

    if let Some(skip) = plan.skip {
        lines.push(format!("OFFSET {}", skip));
    }

    lines
}

fn render_inline(plan: &QueryPlan) -> String {
    render_plan(plan).join(" ")
}

fn render_column(column: &Column) -> String {
    let expr = match &column.expr {
        ColumnExpr::Field => format!("{}.{}", column.source, column.name),
        ColumnExpr::Null => "NULL".to_string(),
        ColumnExpr::Constant(value) => value.to_string(),
        ColumnExpr::Aggregate { kind, args } => {
            if args.is_empty() {
                column.name.clone()
            } else {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                format!("{}({})", kind.name(), args.join(", "))
            }
        }
    };
    format!("{} AS \"{}\"", expr, column.alias)
}

fn render_source(source: &Source) -> String {
    match &source.kind {
        SourceKind::Table { table } => format!("{} {}", table, source.id),
        SourceKind::Select(plan) => format!("({}) {}", render_inline(plan), source.id),
        SourceKind::Union(selects) => {
            let parts: Vec<String> = selects.iter().map(render_inline).collect();
            format!("({}) {}", parts.join(" UNION ALL "), source.id)
        }
        SourceKind::Script(script) => format!("({}) {}", script, source.id),
    }
}

fn render_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Column(c) => c.to_string(),
        Scalar::Literal(v) => v.to_string(),
    }
}

fn render_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Compare { left, op, right } => format!(
            "{} {} {}",
            render_scalar(left),
            op.symbol(),
            render_scalar(right)
        ),
        Predicate::In {
            operand,
            values,
            negated,
        } => {
            let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            format!(
                "{} {}IN ({})",
                render_scalar(operand),
                if *negated { "NOT " } else { "" },
                values.join(", ")
            )
        }
        Predicate::IsNull { operand, negated } => format!(
            "{} IS {}NULL",
            render_scalar(operand),
            if *negated { "NOT " } else { "" }
        ),
        Predicate::And(terms) => {
            let parts: Vec<String> = terms.iter().map(render_predicate).collect();
            format!("({})", parts.join(" AND "))
        }
        Predicate::Or(terms) => {
            let parts: Vec<String> = terms.iter().map(render_predicate).collect();
            format!("({})", parts.join(" OR "))
        }
        Predicate::Not(inner) => format!("NOT ({})", render_predicate(inner)),
        Predicate::Exists { subquery, negated } => format!(
            "{}EXISTS ({})",
            if *negated { "NOT " } else { "" },
            render_inline(subquery)
        ),
    }
}
