//! Immutable SELECT value over one registered entity, rendered to parameterized SQL.
//! Identifiers come from the registry only; values are always bound.

use crate::config::EntityDef;
use crate::sql::path::{ColumnRef, JoinStep, ROOT_ALIAS};
use crate::sql::PgBindValue;
use std::sync::Arc;

/// Quote identifier for PostgreSQL (safe: only from the registry).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_column(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, quoted(column))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn push_param(&mut self, v: PgBindValue) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFn {
    Sum,
    Min,
    Max,
}

impl AggregateFn {
    fn sql_name(self) -> &'static str {
        match self {
            AggregateFn::Sum => "SUM",
            AggregateFn::Min => "MIN",
            AggregateFn::Max => "MAX",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Eq(ColumnRef, PgBindValue),
    IsNull(ColumnRef),
}

#[derive(Clone, Debug, PartialEq)]
struct OrderTerm {
    column: String,
    descending: bool,
}

/// Rows grouped by the root key and filtered or ranked by SUM of a joined column.
#[derive(Clone, Debug, PartialEq)]
struct SumRank {
    column: ColumnRef,
    over: Option<f64>,
    descending: bool,
}

/// Unexecuted query selecting rows of `entity`, possibly joined and filtered.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    entity: Arc<EntityDef>,
    joins: Vec<JoinStep>,
    predicates: Vec<Predicate>,
    order_by: Vec<OrderTerm>,
    sum_rank: Option<SumRank>,
    offset: Option<u64>,
    limit: Option<u64>,
}

impl SelectQuery {
    /// `SELECT * FROM entity`.
    pub fn from_entity(entity: Arc<EntityDef>) -> Self {
        SelectQuery {
            entity,
            joins: Vec::new(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            sum_rank: None,
            offset: None,
            limit: None,
        }
    }

    pub fn entity(&self) -> &Arc<EntityDef> {
        &self.entity
    }

    pub fn with_joins(mut self, joins: Vec<JoinStep>) -> Self {
        self.joins = joins;
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Appends one ORDER BY term on a column of the selected entity.
    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order_by.push(OrderTerm {
            column: column.to_string(),
            descending,
        });
        self
    }

    /// Group rows by the entity's primary key, keep groups whose `SUM(column)` exceeds `over`
    /// (when given) and, when `descending`, order by that sum before any other term.
    pub fn rank_by_sum(mut self, column: ColumnRef, over: Option<f64>, descending: bool) -> Self {
        self.sum_rank = Some(SumRank {
            column,
            over,
            descending,
        });
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    fn from_clause(&self) -> String {
        let mut out = format!("{} {}", quoted(&self.entity.table_name), ROOT_ALIAS);
        for j in &self.joins {
            out.push_str(&format!(
                " JOIN {} {} ON {} = {}",
                quoted(&j.target.table_name),
                j.alias,
                qualified_column(&j.alias, &j.relationship.remote_key),
                qualified_column(&j.parent_alias, &j.relationship.local_key),
            ));
        }
        out
    }

    fn where_clause(&self, q: &mut QueryBuf) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .predicates
            .iter()
            .map(|p| match p {
                Predicate::Eq(col, v) => {
                    let n = q.push_param(v.clone());
                    format!("{} = ${}", qualified_column(&col.alias, &col.column), n)
                }
                Predicate::IsNull(col) => {
                    format!("{} IS NULL", qualified_column(&col.alias, &col.column))
                }
            })
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    fn column_list(&self) -> String {
        Self::column_list_of(ROOT_ALIAS, &self.entity)
    }

    fn column_list_of(alias: &str, entity: &EntityDef) -> String {
        entity
            .fields
            .iter()
            .map(|f| qualified_column(alias, &f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Row query: entity columns, filters, ordering in given sequence, then LIMIT/OFFSET.
    pub fn rows(&self) -> QueryBuf {
        let mut q = QueryBuf::default();
        let where_clause = self.where_clause(&mut q);
        let mut terms: Vec<String> = Vec::new();
        let mut group_clause = String::new();
        if let Some(rank) = &self.sum_rank {
            let sum = format!("SUM({})", qualified_column(&rank.column.alias, &rank.column.column));
            group_clause = format!(" GROUP BY {}", qualified_column(ROOT_ALIAS, &self.entity.primary_key));
            if let Some(over) = rank.over {
                let n = q.push_param(PgBindValue::F64(over));
                group_clause.push_str(&format!(" HAVING {} > ${}", sum, n));
            }
            if rank.descending {
                terms.push(format!("{} DESC", sum));
            }
        }
        terms.extend(self.order_by.iter().map(|t| {
            let col = qualified_column(ROOT_ALIAS, &t.column);
            if t.descending {
                format!("{} DESC", col)
            } else {
                col
            }
        }));
        let order_clause = if terms.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", terms.join(", "))
        };
        let limit_clause = self.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
        let offset_clause = self.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
        q.sql = format!(
            "SELECT {} FROM {}{}{}{}{}{}",
            self.column_list(),
            self.from_clause(),
            where_clause,
            group_clause,
            order_clause,
            limit_clause,
            offset_clause
        );
        q
    }

    /// `SELECT COUNT(*) FROM (rows) sub`.
    pub fn count(&self) -> QueryBuf {
        let inner = self.rows();
        QueryBuf {
            sql: format!("SELECT COUNT(*) FROM ({}) sub", inner.sql),
            params: inner.params,
        }
    }

    /// Same joins and filters re-projected to one aggregate, cast to float8.
    /// Ordering and pagination do not apply to the projection.
    pub fn aggregate(&self, func: AggregateFn, column: &ColumnRef) -> QueryBuf {
        let mut q = QueryBuf::default();
        let where_clause = self.where_clause(&mut q);
        q.sql = format!(
            "SELECT CAST({}({}) AS DOUBLE PRECISION) FROM {}{}",
            func.sql_name(),
            qualified_column(&column.alias, &column.column),
            self.from_clause(),
            where_clause
        );
        q
    }

    /// `SELECT COUNT(DISTINCT col)` over the same joins and filters.
    pub fn count_distinct(&self, column: &ColumnRef) -> QueryBuf {
        let mut q = QueryBuf::default();
        let where_clause = self.where_clause(&mut q);
        q.sql = format!(
            "SELECT COUNT(DISTINCT {}) FROM {}{}",
            qualified_column(&column.alias, &column.column),
            self.from_clause(),
            where_clause
        );
        q
    }

    /// `SELECT COUNT(col)`: non-null values of one (possibly joined) column.
    pub fn count_column(&self, column: &ColumnRef) -> QueryBuf {
        let mut q = QueryBuf::default();
        let where_clause = self.where_clause(&mut q);
        q.sql = format!(
            "SELECT COUNT({}) FROM {}{}",
            qualified_column(&column.alias, &column.column),
            self.from_clause(),
            where_clause
        );
        q
    }

    /// Columns of the joined `entity` at `alias` for the row with the largest `by`; NULLs sort last.
    pub fn top_row(&self, alias: &str, entity: &EntityDef, by: &ColumnRef) -> QueryBuf {
        let mut q = QueryBuf::default();
        let where_clause = self.where_clause(&mut q);
        q.sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} DESC NULLS LAST LIMIT 1",
            Self::column_list_of(alias, entity),
            self.from_clause(),
            where_clause,
            qualified_column(&by.alias, &by.column)
        );
        q
    }

    /// `SELECT <cols> ... GROUP BY <cols>`; the i-th column is aliased `g{i}`.
    /// No ORDER BY: groups come back in the store's order.
    pub fn group_by(&self, columns: &[ColumnRef]) -> QueryBuf {
        let mut q = QueryBuf::default();
        let where_clause = self.where_clause(&mut q);
        let cols: Vec<String> = columns
            .iter()
            .map(|c| qualified_column(&c.alias, &c.column))
            .collect();
        let select: Vec<String> = cols
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} AS {}", c, quoted(&group_column_alias(i))))
            .collect();
        q.sql = format!(
            "SELECT {} FROM {}{} GROUP BY {}",
            select.join(", "),
            self.from_clause(),
            where_clause,
            cols.join(", ")
        );
        q
    }
}

pub fn group_column_alias(i: usize) -> String {
    format!("g{}", i)
}
