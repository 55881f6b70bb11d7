//! Query builder: lowers a [`Query`] into a [`Select`] statement.
//!
//! The builder resolves every schema path against the mapping, allocates
//! join aliases (`t0` for the root table, `t1`, `t2`, ... in first-use
//! order), and translates the predicate tree with one exhaustive match.
//! Identical relation hops (same parent alias, relation and condition)
//! share one join.

use crate::filter::{
    ComparisonOperator, ComparisonPredicate, CounterFilter, LogicalOperator, LogicalPredicate,
    Operand, Predicate, Query, ResourceIdPredicate, SortOrder, SpatialPredicate,
};
use crate::schema::{
    FeatureType, MappingError, NodeCondition, PathElement, SchemaMapping, SchemaPathError,
    ValueReference,
};

use super::expr::{self, always_false, table_col, Expr, ExprExt};
use super::select::{Join, JoinKind, OrderByExpr, Select, SortDirection, TableRef};

/// Errors raised while lowering a query to SQL.
#[derive(Debug, thiserror::Error)]
pub enum QueryBuildError {
    #[error("Schema path roots at {found}, query roots at {expected}")]
    RootMismatch { expected: String, found: String },

    #[error("Logical predicate has no operands")]
    EmptyLogical,

    #[error("Comparison predicate is missing its right-hand operand")]
    IncompleteComparison,

    #[error("Feature type {0} has no geometry column")]
    NoGeometryColumn(String),

    #[error("Envelope has non-finite or unordered coordinates")]
    InvalidEnvelope,

    #[error("No SRID available: set one on the predicate, envelope or query")]
    MissingSrid,

    #[error("Cache select needs exactly one surrogate-id projection, got {found}")]
    CacheIdProjection { found: usize },

    #[error(transparent)]
    SchemaPath(#[from] SchemaPathError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

pub type BuildResult<T> = Result<T, QueryBuildError>;

const ROOT_ALIAS: &str = "t0";

/// Compiles queries against one schema mapping.
pub struct QueryBuilder<'a> {
    mapping: &'a SchemaMapping,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(mapping: &'a SchemaMapping) -> Self {
        Self { mapping }
    }

    /// Build the SELECT statement for a query.
    ///
    /// The root surrogate id and external id always lead the select list so
    /// results can be materialized; declared projection columns follow,
    /// each aliased with its dotted path.
    pub fn build_select(&self, query: &Query) -> BuildResult<Select> {
        let ft = self.mapping.feature_type(query.feature_type())?;
        let mut ctx = JoinContext::new(self.mapping, ft);

        let id_column = table_col(ROOT_ALIAS, &ft.id_column);
        let gmlid_column = table_col(ROOT_ALIAS, &ft.gmlid_column);
        let mut columns = vec![
            super::select::SelectExpr::new(id_column.clone()),
            super::select::SelectExpr::new(gmlid_column.clone()),
        ];
        for value_ref in query.projection().iter() {
            let column = ctx.resolve_ref(value_ref)?;
            if column == id_column || column == gmlid_column {
                continue;
            }
            columns.push(super::select::SelectExpr::aliased(
                column,
                &value_ref.to_string(),
            ));
        }

        let mut selection = match query.selection() {
            Some(predicate) => Some(self.lower_predicate(&mut ctx, ft, query, predicate)?),
            None => None,
        };

        let mut order_by: Vec<OrderByExpr> = Vec::new();
        for sort in query.sorting() {
            let column = ctx.resolve_ref(sort.target())?;
            let direction = match sort.order() {
                SortOrder::Ascending => SortDirection::Asc,
                SortOrder::Descending => SortDirection::Desc,
            };
            order_by.push(OrderByExpr { expr: column, direction });
        }

        let mut limit = None;
        let mut offset = None;
        if let Some(counter) = query.counter_filter() {
            limit = Some(counter.count());
            if let Some(start_id) = counter.start_id() {
                // Keyed paging: window by id predicate plus id sort.
                let keyed = keyed_paging_predicate(counter, &ft.id_column, start_id)?;
                selection = Some(match selection.take() {
                    Some(existing) => Expr::Paren(Box::new(existing)).and(keyed),
                    None => keyed,
                });
                let id_column = table_col(ROOT_ALIAS, &ft.id_column);
                if !order_by.iter().any(|o| o.expr == id_column) {
                    order_by.push(OrderByExpr::asc(id_column));
                }
            } else if let Some(index) = counter.start_index() {
                offset = Some(index);
            }
        }

        let mut stmt = Select::new();
        stmt.projection = columns;
        stmt.from = Some(TableRef::aliased(&ft.table, ROOT_ALIAS));
        stmt.joins = ctx.joins;
        stmt.selection = selection;
        stmt.order_by = order_by;
        stmt.limit = limit;
        stmt.offset = offset;
        Ok(stmt)
    }

    /// Build the COUNT statement for a query's selection.
    ///
    /// Paging and sorting are ignored: the count answers "how many rows
    /// match", not "how many fit the window". Joins duplicate root rows,
    /// so the count is over distinct root ids whenever a join is present.
    pub fn build_count(&self, query: &Query) -> BuildResult<Select> {
        let ft = self.mapping.feature_type(query.feature_type())?;
        let mut ctx = JoinContext::new(self.mapping, ft);

        let selection = match query.selection() {
            Some(predicate) => Some(self.lower_predicate(&mut ctx, ft, query, predicate)?),
            None => None,
        };

        let count = if ctx.joins.is_empty() {
            expr::count_star()
        } else {
            Expr::Function {
                name: "COUNT".into(),
                args: vec![Expr::Distinct(Box::new(table_col(
                    ROOT_ALIAS,
                    &ft.id_column,
                )))],
            }
        };

        let mut stmt = Select::new();
        stmt.projection = vec![super::select::SelectExpr::new(count)];
        stmt.from = Some(TableRef::aliased(&ft.table, ROOT_ALIAS));
        stmt.joins = ctx.joins;
        stmt.selection = selection;
        Ok(stmt)
    }

    /// Build the statement materializing a query into an id cache.
    ///
    /// The select list is the query's declared projection, which must carry
    /// exactly one surrogate-id reference; anything else would leave the
    /// cache without a key or with an ambiguous one.
    pub fn build_cache_select(&self, query: &Query) -> BuildResult<Select> {
        let ft = self.mapping.feature_type(query.feature_type())?;
        let mut ctx = JoinContext::new(self.mapping, ft);

        let mut columns = Vec::new();
        let mut id_refs = 0;
        for value_ref in query.projection().iter() {
            if value_ref.is_surrogate_id(self.mapping) {
                id_refs += 1;
            }
            let column = ctx.resolve_ref(value_ref)?;
            columns.push(super::select::SelectExpr::aliased(
                column,
                &value_ref.to_string(),
            ));
        }
        if id_refs != 1 {
            return Err(QueryBuildError::CacheIdProjection { found: id_refs });
        }

        let selection = match query.selection() {
            Some(predicate) => Some(self.lower_predicate(&mut ctx, ft, query, predicate)?),
            None => None,
        };

        let mut stmt = Select::new();
        stmt.projection = columns;
        stmt.from = Some(TableRef::aliased(&ft.table, ROOT_ALIAS));
        stmt.joins = ctx.joins;
        stmt.selection = selection;
        Ok(stmt)
    }

    /// Build the id-cache backfill statement: surrogate ids for a batch of
    /// external ids. An empty batch yields a statement selecting nothing.
    pub fn build_backfill_select(
        &self,
        feature_type: &str,
        gmlids: &[String],
    ) -> BuildResult<Select> {
        let ft = self.mapping.feature_type(feature_type)?;

        let selection = if gmlids.is_empty() {
            always_false()
        } else {
            Expr::In {
                expr: Box::new(expr::col(&ft.gmlid_column)),
                values: gmlids.iter().map(|id| expr::lit_str(id)).collect(),
                negated: false,
            }
        };

        Ok(Select::new()
            .column(expr::col(&ft.id_column))
            .column(expr::col(&ft.gmlid_column))
            .from(TableRef::new(&ft.table))
            .filter(selection))
    }

    // =========================================================================
    // Predicate lowering
    // =========================================================================

    fn lower_predicate(
        &self,
        ctx: &mut JoinContext<'_>,
        ft: &FeatureType,
        query: &Query,
        predicate: &Predicate,
    ) -> BuildResult<Expr> {
        match predicate {
            Predicate::Logical(p) => self.lower_logical(ctx, ft, query, p),
            Predicate::Comparison(p) => self.lower_comparison(ctx, p),
            Predicate::Spatial(p) => self.lower_spatial(ft, query, p),
            Predicate::ResourceId(p) => Ok(Self::lower_resource_ids(ft, p)),
            Predicate::RawSql(p) => Ok(Expr::IdSubquery {
                expr: Box::new(table_col(ROOT_ALIAS, &ft.id_column)),
                select: p.select.clone(),
                id_column: ft.id_column.clone(),
            }),
        }
    }

    fn lower_logical(
        &self,
        ctx: &mut JoinContext<'_>,
        ft: &FeatureType,
        query: &Query,
        predicate: &LogicalPredicate,
    ) -> BuildResult<Expr> {
        if predicate.operands.is_empty() {
            return Err(QueryBuildError::EmptyLogical);
        }

        let mut lowered = Vec::with_capacity(predicate.operands.len());
        for operand in &predicate.operands {
            lowered.push(self.lower_predicate(ctx, ft, query, operand)?);
        }

        let op = match predicate.op {
            LogicalOperator::And => super::expr::BinaryOperator::And,
            LogicalOperator::Or => super::expr::BinaryOperator::Or,
            LogicalOperator::Not => {
                let inner = fold(lowered, super::expr::BinaryOperator::And);
                return Ok(Expr::UnaryOp {
                    op: super::expr::UnaryOperator::Not,
                    expr: Box::new(Expr::Paren(Box::new(inner))),
                });
            }
        };
        Ok(Expr::Paren(Box::new(fold(lowered, op))))
    }

    fn lower_comparison(
        &self,
        ctx: &mut JoinContext<'_>,
        predicate: &ComparisonPredicate,
    ) -> BuildResult<Expr> {
        let left = self.lower_operand(ctx, &predicate.left)?;

        if predicate.op.is_null_test() {
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated: predicate.op == ComparisonOperator::IsNotNull,
            });
        }

        let right = predicate
            .right
            .as_ref()
            .ok_or(QueryBuildError::IncompleteComparison)?;
        let right = self.lower_operand(ctx, right)?;

        if predicate.op == ComparisonOperator::Between {
            let upper = predicate
                .upper
                .as_ref()
                .ok_or(QueryBuildError::IncompleteComparison)?;
            let upper = self.lower_operand(ctx, upper)?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(right),
                high: Box::new(upper),
            });
        }

        let op = match predicate.op {
            ComparisonOperator::Eq => super::expr::BinaryOperator::Eq,
            ComparisonOperator::Ne => super::expr::BinaryOperator::Ne,
            ComparisonOperator::Lt => super::expr::BinaryOperator::Lt,
            ComparisonOperator::Gt => super::expr::BinaryOperator::Gt,
            ComparisonOperator::Lte => super::expr::BinaryOperator::Lte,
            ComparisonOperator::Gte => super::expr::BinaryOperator::Gte,
            ComparisonOperator::Like => super::expr::BinaryOperator::Like,
            // Handled above.
            ComparisonOperator::Between
            | ComparisonOperator::IsNull
            | ComparisonOperator::IsNotNull => unreachable!(),
        };
        Ok(left.binary(op, right))
    }

    fn lower_operand(&self, ctx: &mut JoinContext<'_>, operand: &Operand) -> BuildResult<Expr> {
        match operand {
            Operand::Ref(value_ref) => ctx.resolve_ref(value_ref),
            Operand::Lit(literal) => Ok(Expr::Literal(literal.into())),
        }
    }

    fn lower_spatial(
        &self,
        ft: &FeatureType,
        query: &Query,
        predicate: &SpatialPredicate,
    ) -> BuildResult<Expr> {
        let column = ft
            .envelope_column
            .as_ref()
            .ok_or_else(|| QueryBuildError::NoGeometryColumn(ft.name.clone()))?;

        if !predicate.envelope.is_valid() {
            return Err(QueryBuildError::InvalidEnvelope);
        }

        let srid = predicate
            .srid
            .or(predicate.envelope.srid)
            .or(query.srid())
            .ok_or(QueryBuildError::MissingSrid)?;

        Ok(Expr::Bbox {
            column: Box::new(table_col(ROOT_ALIAS, column)),
            op: predicate.op,
            envelope: predicate.envelope,
            srid,
        })
    }

    /// An empty id set selects nothing, never everything.
    fn lower_resource_ids(ft: &FeatureType, predicate: &ResourceIdPredicate) -> Expr {
        if predicate.ids.is_empty() {
            return always_false();
        }
        Expr::In {
            expr: Box::new(table_col(ROOT_ALIAS, &ft.gmlid_column)),
            values: predicate.ids.iter().map(|id| expr::lit_str(id)).collect(),
            negated: false,
        }
    }
}

fn keyed_paging_predicate(
    counter: &CounterFilter,
    id_column: &str,
    start_id: i64,
) -> BuildResult<Expr> {
    let op = match counter.operator() {
        ComparisonOperator::Gt => super::expr::BinaryOperator::Gt,
        ComparisonOperator::Gte => super::expr::BinaryOperator::Gte,
        ComparisonOperator::Lt => super::expr::BinaryOperator::Lt,
        ComparisonOperator::Lte => super::expr::BinaryOperator::Lte,
        _ => return Err(QueryBuildError::IncompleteComparison),
    };
    Ok(table_col(ROOT_ALIAS, id_column).binary(op, expr::lit_int(start_id)))
}

fn fold(mut exprs: Vec<Expr>, op: super::expr::BinaryOperator) -> Expr {
    // Callers guarantee at least one element.
    let first = exprs.remove(0);
    exprs
        .into_iter()
        .fold(first, |acc, next| acc.binary(op, next))
}

// =============================================================================
// Join resolution
// =============================================================================

/// Allocates table aliases and deduplicates relation joins while paths are
/// resolved.
struct JoinContext<'a> {
    mapping: &'a SchemaMapping,
    root_type: String,
    next_alias: usize,
    joins: Vec<Join>,
    /// (parent alias, relation name, condition) -> allocated alias
    seen: Vec<(String, String, Option<NodeCondition>, String)>,
}

impl<'a> JoinContext<'a> {
    fn new(mapping: &'a SchemaMapping, root: &FeatureType) -> Self {
        Self {
            mapping,
            root_type: root.name.clone(),
            next_alias: 1,
            joins: Vec::new(),
            seen: Vec::new(),
        }
    }

    /// Resolve a value reference to its aliased column, adding any joins the
    /// path requires.
    fn resolve_ref(&mut self, value_ref: &ValueReference) -> BuildResult<Expr> {
        let path = value_ref.path();
        if path.root_feature_type() != self.root_type {
            return Err(QueryBuildError::RootMismatch {
                expected: self.root_type.clone(),
                found: path.root_feature_type().to_string(),
            });
        }

        let mut alias = ROOT_ALIAS.to_string();
        let mut current_type = self.root_type.clone();

        for step in path.iter() {
            match &step.element {
                PathElement::FeatureType { .. } => {}
                PathElement::Relation { name, .. } => {
                    let (next_alias, next_type) = self.join_relation(
                        &alias,
                        &current_type,
                        name,
                        step.condition.as_ref(),
                    )?;
                    alias = next_alias;
                    current_type = next_type;
                }
                PathElement::Attribute { column, .. } => {
                    let mut target = table_col(&alias, column);
                    if let Some(condition) = &step.condition {
                        // Attribute-level conditions narrow the same row, so
                        // they wrap the column in a conjunction at the caller.
                        let ft = self.mapping.feature_type(&current_type)?;
                        let lowered = lower_node_condition(ft, &alias, condition)?;
                        target = Expr::Paren(Box::new(target.and(lowered)));
                    }
                    return Ok(target);
                }
            }
        }

        // ValueReference construction guarantees an attribute terminal.
        Err(QueryBuildError::SchemaPath(SchemaPathError::Empty))
    }

    fn join_relation(
        &mut self,
        parent_alias: &str,
        parent_type: &str,
        relation: &str,
        condition: Option<&NodeCondition>,
    ) -> BuildResult<(String, String)> {
        let rel = self.mapping.relation(parent_type, relation)?;
        let target = self.mapping.feature_type(&rel.target)?;

        if let Some((_, _, _, alias)) = self.seen.iter().find(|(p, r, c, _)| {
            p == parent_alias && r == relation && c.as_ref() == condition
        }) {
            return Ok((alias.clone(), target.name.clone()));
        }

        let alias = format!("t{}", self.next_alias);
        self.next_alias += 1;

        let parent_ft = self.mapping.feature_type(parent_type)?;
        let mut on = match &rel.join {
            crate::schema::JoinKind::SourceFk { column } => {
                table_col(&alias, &target.id_column).eq(table_col(parent_alias, column))
            }
            crate::schema::JoinKind::TargetFk { column } => {
                table_col(&alias, column).eq(table_col(parent_alias, &parent_ft.id_column))
            }
        };

        if let Some((attribute, value)) = &rel.discriminator {
            let attr = self.mapping.attribute(&target.name, attribute)?;
            on = on.and(table_col(&alias, &attr.column).eq(expr::lit_str(value)));
        }
        if let Some(condition) = condition {
            on = on.and(lower_node_condition(target, &alias, condition)?);
        }

        self.joins.push(Join {
            kind: JoinKind::Inner,
            table: TableRef::aliased(&target.table, &alias),
            on,
        });
        self.seen.push((
            parent_alias.to_string(),
            relation.to_string(),
            condition.cloned(),
            alias.clone(),
        ));
        Ok((alias, target.name.clone()))
    }
}

fn lower_node_condition(
    ft: &FeatureType,
    alias: &str,
    condition: &NodeCondition,
) -> BuildResult<Expr> {
    match condition {
        NodeCondition::Equals { attribute, value } => {
            let column = if let Some(attr) = ft.attribute(attribute) {
                attr.column.clone()
            } else if attribute == "id" {
                ft.id_column.clone()
            } else if attribute == "gmlid" {
                ft.gmlid_column.clone()
            } else {
                return Err(QueryBuildError::Mapping(MappingError::UnknownAttribute {
                    feature_type: ft.name.clone(),
                    attribute: attribute.clone(),
                }));
            };
            Ok(table_col(alias, &column).eq(Expr::Literal(value.into())))
        }
        NodeCondition::And(parts) | NodeCondition::Or(parts) => {
            if parts.is_empty() {
                return Err(QueryBuildError::EmptyLogical);
            }
            let op = if matches!(condition, NodeCondition::And(_)) {
                super::expr::BinaryOperator::And
            } else {
                super::expr::BinaryOperator::Or
            };
            let mut lowered = Vec::with_capacity(parts.len());
            for part in parts {
                lowered.push(lower_node_condition(ft, alias, part)?);
            }
            Ok(Expr::Paren(Box::new(fold(lowered, op))))
        }
        NodeCondition::Not(inner) => {
            let lowered = lower_node_condition(ft, alias, inner)?;
            Ok(Expr::UnaryOp {
                op: super::expr::UnaryOperator::Not,
                expr: Box::new(Expr::Paren(Box::new(lowered))),
            })
        }
    }
}
