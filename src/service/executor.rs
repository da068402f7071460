//! Resolves one caller-selected surface field against the assembled schema.

use crate::error::QueryError;
use crate::schema::{AggregateOp, AggregateType, EntitySchema, QueryFieldKind, Schema};
use crate::service::{AggregateService, ListArgs, QueryService, QueryWrapper, StatisticsService, SumFilter};
use crate::session::DataSession;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Arguments and selection for one surface field.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FieldRequest {
    /// List of `OrderBy<Entity>` objects.
    #[serde(default)]
    pub order_by: Value,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Numeric path whose per-row SUM drives `having_sum_over` and `top_k_by_sum`.
    #[serde(default)]
    pub sum_path: Option<String>,
    #[serde(default)]
    pub having_sum_over: Option<f64>,
    #[serde(default)]
    pub top_k_by_sum: Option<i64>,
    #[serde(default)]
    pub select: Selection,
}

impl FieldRequest {
    /// Names of the arguments the caller actually supplied.
    fn supplied(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut add = |present: bool, name: &'static str| {
            if present {
                out.push(name);
            }
        };
        add(!self.order_by.is_null(), "order_by");
        add(self.offset.is_some(), "offset");
        add(self.limit.is_some(), "limit");
        add(!self.group_by.is_empty(), "group_by");
        add(self.sum_path.is_some(), "sum_path");
        add(self.having_sum_over.is_some(), "having_sum_over");
        add(self.top_k_by_sum.is_some(), "top_k_by_sum");
        add(self.select.nodes, "select.nodes");
        add(self.select.aggregate.is_some(), "select.aggregate");
        add(!self.select.statistics.is_empty(), "select.statistics");
        out
    }

    fn only(&self, field: &str, allowed: &[&str]) -> Result<(), QueryError> {
        match self.supplied().into_iter().find(|a| !allowed.contains(a)) {
            Some(arg) => Err(QueryError::InvalidArgument(format!("'{}' does not apply to {}", arg, field))),
            None => Ok(()),
        }
    }

    fn sum_filter(&self) -> Result<Option<SumFilter>, QueryError> {
        match &self.sum_path {
            Some(path) => Ok(Some(SumFilter {
                path: path.clone(),
                over: self.having_sum_over,
                top_k: self.top_k_by_sum,
            })),
            None if self.having_sum_over.is_some() || self.top_k_by_sum.is_some() => Err(
                QueryError::InvalidArgument("having_sum_over and top_k_by_sum need sum_path".into()),
            ),
            None => Ok(None),
        }
    }
}

const LIST_ARGS: &[&str] = &[
    "order_by",
    "offset",
    "limit",
    "sum_path",
    "having_sum_over",
    "top_k_by_sum",
    "select.statistics",
];
const GROUPED_ARGS: &[&str] = &["group_by", "select.nodes", "select.aggregate", "select.statistics"];
const AGGREGATE_ARGS: &[&str] = &["select.aggregate"];

/// What to resolve per group (grouped fields) or on the aggregate root (aggregate fields).
#[derive(Clone, Debug, Deserialize)]
pub struct Selection {
    #[serde(default = "default_true")]
    pub keys: bool,
    #[serde(default)]
    pub nodes: bool,
    #[serde(default)]
    pub aggregate: Option<AggregateSelection>,
    /// Row statistics attached to each returned row under `statistics`.
    #[serde(default)]
    pub statistics: Vec<String>,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            keys: true,
            nodes: false,
            aggregate: None,
            statistics: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AggregateSelection {
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub sum: Vec<String>,
    #[serde(default)]
    pub min: Vec<String>,
    #[serde(default)]
    pub max: Vec<String>,
    #[serde(default)]
    pub avg: Vec<String>,
}

impl AggregateSelection {
    fn ops(&self) -> [(AggregateOp, &[String]); 4] {
        [
            (AggregateOp::Sum, self.sum.as_slice()),
            (AggregateOp::Min, self.min.as_slice()),
            (AggregateOp::Max, self.max.as_slice()),
            (AggregateOp::Avg, self.avg.as_slice()),
        ]
    }

    fn validate(&self, ty: &AggregateType) -> Result<(), QueryError> {
        for (op, fields) in self.ops() {
            if let Some(bad) = fields.iter().find(|f| !ty.supports(op, f)) {
                return Err(QueryError::InvalidArgument(format!(
                    "{} has no '{}.{}'",
                    ty.name,
                    op.name(),
                    bad
                )));
            }
        }
        Ok(())
    }
}

pub struct Executor<'s> {
    schema: &'s Schema,
}

impl<'s> Executor<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Executor { schema }
    }

    pub async fn execute(
        &self,
        session: &mut dyn DataSession,
        field: &str,
        request: &FieldRequest,
    ) -> Result<Value, QueryError> {
        let query_field = self
            .schema
            .field(field)
            .ok_or_else(|| QueryError::UnknownField(field.to_string()))?;
        let entity = match (&query_field.kind, &query_field.entity) {
            (QueryFieldKind::Statistics, _) => {
                request.only(field, &[])?;
                return self.general_statistics(session).await;
            }
            (_, Some(name)) => self
                .schema
                .entity(name)
                .ok_or_else(|| QueryError::UnknownField(name.clone()))?,
            (_, None) => return Err(QueryError::UnknownField(field.to_string())),
        };

        match query_field.kind {
            QueryFieldKind::List => {
                request.only(field, LIST_ARGS)?;
                self.list(session, entity, request).await
            }
            QueryFieldKind::Grouped => {
                request.only(field, GROUPED_ARGS)?;
                self.grouped(session, entity, request).await
            }
            QueryFieldKind::Aggregate => {
                request.only(field, AGGREGATE_ARGS)?;
                let selection = request.select.aggregate.clone().unwrap_or_default();
                selection.validate(&entity.aggregate_type)?;
                let root = QueryService::whole_set(entity.def.clone());
                resolve_aggregate(session, &root, &selection).await
            }
            QueryFieldKind::Statistics => self.general_statistics(session).await,
        }
    }

    async fn list(
        &self,
        session: &mut dyn DataSession,
        entity: &EntitySchema,
        request: &FieldRequest,
    ) -> Result<Value, QueryError> {
        check_statistics(entity, &request.select.statistics)?;
        let args = ListArgs {
            order_by: entity.order_by_type.parse(&request.order_by)?,
            offset: request.offset,
            limit: request.limit,
            sum_filter: request.sum_filter()?,
        };
        let rows = QueryService::list(session, &self.schema.registry, entity.def.clone(), &args).await?;
        let rows = self
            .attach_statistics(session, entity, rows, &request.select.statistics)
            .await?;
        Ok(Value::Array(rows))
    }

    async fn grouped(
        &self,
        session: &mut dyn DataSession,
        entity: &EntitySchema,
        request: &FieldRequest,
    ) -> Result<Value, QueryError> {
        if let Some(selection) = &request.select.aggregate {
            selection.validate(&entity.aggregate_type)?;
        }
        if !request.select.statistics.is_empty() && !request.select.nodes {
            return Err(QueryError::InvalidArgument("select.statistics needs select.nodes".into()));
        }
        check_statistics(entity, &request.select.statistics)?;
        let groups =
            QueryService::grouped(session, &self.schema.registry, entity.def.clone(), &request.group_by).await?;

        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            let mut obj = Map::new();
            if request.select.keys {
                obj.insert("keys".into(), json!(group.keys));
            }
            if request.select.nodes {
                let nodes = group.wrapper.nodes(session).await?;
                let nodes = self
                    .attach_statistics(session, entity, nodes, &request.select.statistics)
                    .await?;
                obj.insert("nodes".into(), Value::Array(nodes));
            }
            if let Some(selection) = &request.select.aggregate {
                obj.insert(
                    "aggregate".into(),
                    resolve_aggregate(session, &group.wrapper, selection).await?,
                );
            }
            out.push(Value::Object(obj));
        }
        Ok(Value::Array(out))
    }

    /// Adds a `statistics` object to every row, evaluated in the order the names were given.
    async fn attach_statistics(
        &self,
        session: &mut dyn DataSession,
        entity: &EntitySchema,
        mut rows: Vec<Value>,
        names: &[String],
    ) -> Result<Vec<Value>, QueryError> {
        if names.is_empty() {
            return Ok(rows);
        }
        for row in &mut rows {
            let key = row.get(&entity.def.primary_key).cloned().unwrap_or(Value::Null);
            let mut stats = Map::new();
            for name in names {
                let stat = entity
                    .def
                    .statistic(name)
                    .ok_or_else(|| QueryError::InvalidArgument(format!("unknown statistic '{}'", name)))?;
                let v = StatisticsService::evaluate_row(session, &self.schema.registry, &entity.def, stat, &key).await?;
                stats.insert(name.clone(), v);
            }
            if let Value::Object(map) = row {
                map.insert("statistics".into(), Value::Object(stats));
            }
        }
        Ok(rows)
    }

    pub async fn general_statistics(&self, session: &mut dyn DataSession) -> Result<Value, QueryError> {
        let mut obj = Map::new();
        for stat in &self.schema.registry.statistics {
            let v = StatisticsService::evaluate(session, &self.schema.registry, stat).await?;
            obj.insert(stat.name.clone(), json!(v));
        }
        Ok(Value::Object(obj))
    }
}

fn check_statistics(entity: &EntitySchema, names: &[String]) -> Result<(), QueryError> {
    match names.iter().find(|n| entity.def.statistic(n).is_none()) {
        Some(bad) => Err(QueryError::InvalidArgument(format!(
            "{} has no statistic '{}'",
            entity.def.name, bad
        ))),
        None => Ok(()),
    }
}

/// Aggregate object for one wrapper: `count` on the root, then one sub-object per operation.
async fn resolve_aggregate(
    session: &mut dyn DataSession,
    root: &QueryWrapper,
    selection: &AggregateSelection,
) -> Result<Value, QueryError> {
    let mut obj = Map::new();
    if selection.count {
        obj.insert("count".into(), json!(AggregateService::count(session, root).await?));
    }
    for (op, fields) in selection.ops() {
        if fields.is_empty() {
            continue;
        }
        let mut sub = Map::new();
        for field in fields {
            let v = AggregateService::compute(session, root, op, field).await?;
            sub.insert(field.clone(), json!(v));
        }
        obj.insert(op.name().into(), Value::Object(sub));
    }
    Ok(Value::Object(obj))
}
