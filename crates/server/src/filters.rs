//! Dynamic filter and pagination engine.
//!
//! Each entity declares a static table of [`FilterRule`]s mapping a query
//! parameter name to a column, a comparison, and an expected value type.
//! [`FilterSet::plan`] resolves raw `name=value` pairs against that table,
//! silently ignoring unrecognized names (the permissive-filter policy), and
//! produces a [`FilterPlan`] of typed, bound clauses. The same plan backs
//! both the page query and the `COUNT(*)` query so the two always see the
//! same criteria.
//!
//! No reflection anywhere: the rule tables are the entire filter vocabulary.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

/// Hard cap on page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size when `count` is not supplied.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Query parameter names consumed by pagination rather than filtering.
const RESERVED_PARAMS: &[&str] = &["page", "count"];

/// Errors from parsing filter or pagination parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid value for filter '{name}': {message}")]
    InvalidValue { name: String, message: String },

    #[error("page must be >= 1")]
    InvalidPage,

    #[error("count must be between 1 and {MAX_PAGE_SIZE}")]
    InvalidCount,
}

/// Comparison applied by a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Exact equality.
    Eq,
    /// Case-insensitive substring match (`ILIKE '%value%'`).
    Contains,
    /// Lower bound (`>=`).
    Gte,
    /// Upper bound (`<=`).
    Lte,
}

impl Comparison {
    const fn sql_operator(self) -> &'static str {
        match self {
            Self::Eq => " = ",
            Self::Contains => " ILIKE ",
            Self::Gte => " >= ",
            Self::Lte => " <= ",
        }
    }
}

/// Expected type of a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Arbitrary string.
    Text,
    /// Boolean (`true`/`false`/`1`/`0`).
    Flag,
    /// Decimal amount.
    Amount,
    /// RFC 3339 timestamp.
    Instant,
    /// Entity UUID.
    Id,
}

/// A typed filter value after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Flag(bool),
    Amount(Decimal),
    Instant(DateTime<Utc>),
    Id(Uuid),
}

impl FilterValue {
    fn parse(kind: ValueKind, raw: &str) -> Result<Self, String> {
        match kind {
            ValueKind::Text => Ok(Self::Text(raw.to_owned())),
            ValueKind::Flag => crate::config::parse_bool(raw)
                .map(Self::Flag)
                .ok_or_else(|| format!("expected a boolean, got '{raw}'")),
            ValueKind::Amount => raw
                .parse::<Decimal>()
                .map(Self::Amount)
                .map_err(|e| e.to_string()),
            ValueKind::Instant => raw
                .parse::<DateTime<Utc>>()
                .map(Self::Instant)
                .map_err(|e| e.to_string()),
            ValueKind::Id => raw.parse::<Uuid>().map(Self::Id).map_err(|e| e.to_string()),
        }
    }
}

/// One entry in an entity's filter vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct FilterRule {
    pub name: &'static str,
    pub column: &'static str,
    pub cmp: Comparison,
    pub kind: ValueKind,
}

impl FilterRule {
    /// Exact-match rule.
    #[must_use]
    pub const fn eq(name: &'static str, column: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            column,
            cmp: Comparison::Eq,
            kind,
        }
    }

    /// Case-insensitive substring rule over a text column.
    #[must_use]
    pub const fn contains(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            cmp: Comparison::Contains,
            kind: ValueKind::Text,
        }
    }

    /// Lower-bound rule (`column >= value`).
    #[must_use]
    pub const fn gte(name: &'static str, column: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            column,
            cmp: Comparison::Gte,
            kind,
        }
    }

    /// Upper-bound rule (`column <= value`).
    #[must_use]
    pub const fn lte(name: &'static str, column: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            column,
            cmp: Comparison::Lte,
            kind,
        }
    }
}

/// An entity's filter vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct FilterSet {
    rules: &'static [FilterRule],
}

impl FilterSet {
    #[must_use]
    pub const fn new(rules: &'static [FilterRule]) -> Self {
        Self { rules }
    }

    /// Resolve raw query pairs into a typed plan.
    ///
    /// Unknown parameter names are ignored; a recognized name with an
    /// unparseable value is an error.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidValue`] when a recognized filter carries
    /// a value that does not parse as its declared kind.
    pub fn plan<'a, I>(&self, params: I) -> Result<FilterPlan, FilterError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut plan = FilterPlan::default();
        for (name, raw) in params {
            if RESERVED_PARAMS.contains(&name) {
                continue;
            }
            let Some(rule) = self.rules.iter().find(|r| r.name == name) else {
                continue;
            };
            let value =
                FilterValue::parse(rule.kind, raw).map_err(|message| FilterError::InvalidValue {
                    name: name.to_owned(),
                    message,
                })?;
            plan.push(rule.column, rule.cmp, value);
        }
        Ok(plan)
    }
}

/// Filter vocabularies, one per entity.
pub static USER_FILTERS: FilterSet = FilterSet::new(&[
    FilterRule::eq("username", "username", ValueKind::Text),
    FilterRule::eq("email", "email", ValueKind::Text),
]);

pub static ADDRESS_FILTERS: FilterSet = FilterSet::new(&[
    FilterRule::eq("user_id", "user_id", ValueKind::Id),
    FilterRule::eq("city", "city", ValueKind::Text),
    FilterRule::eq("country", "country", ValueKind::Text),
    FilterRule::eq("is_primary", "is_primary", ValueKind::Flag),
]);

pub static PRODUCT_FILTERS: FilterSet = FilterSet::new(&[
    FilterRule::eq("category", "category", ValueKind::Text),
    FilterRule::eq("in_stock", "in_stock", ValueKind::Flag),
    FilterRule::gte("price_min", "price", ValueKind::Amount),
    FilterRule::lte("price_max", "price", ValueKind::Amount),
    FilterRule::contains("name_query", "name"),
]);

pub static ORDER_FILTERS: FilterSet = FilterSet::new(&[
    FilterRule::eq("user_id", "user_id", ValueKind::Id),
    FilterRule::eq("status", "status", ValueKind::Text),
    FilterRule::gte("min_amount", "total_amount", ValueKind::Amount),
    FilterRule::lte("max_amount", "total_amount", ValueKind::Amount),
    FilterRule::gte("created_after", "created_at", ValueKind::Instant),
    FilterRule::lte("created_before", "created_at", ValueKind::Instant),
]);

/// Escape `LIKE` wildcards so user-supplied text matches literally.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    column: &'static str,
    cmp: Comparison,
    value: FilterValue,
}

/// A resolved set of filter clauses ready to be bound onto a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPlan {
    clauses: Vec<Clause>,
}

impl FilterPlan {
    /// Plan with a single equality clause; used by sub-resource listings
    /// such as "orders of one user".
    #[must_use]
    pub fn eq(column: &'static str, value: FilterValue) -> Self {
        let mut plan = Self::default();
        plan.push(column, Comparison::Eq, value);
        plan
    }

    /// Append a clause.
    pub fn push(&mut self, column: &'static str, cmp: Comparison, value: FilterValue) {
        let value = match (cmp, value) {
            // Pre-wrap the pattern so binding stays a plain parameter.
            (Comparison::Contains, FilterValue::Text(text)) => {
                FilterValue::Text(format!("%{}%", escape_like(&text)))
            }
            (_, value) => value,
        };
        self.clauses.push(Clause { column, cmp, value });
    }

    /// Whether the plan has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Number of clauses in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Push `WHERE …` with bound parameters onto a query builder.
    pub fn push_where<'a>(&'a self, qb: &mut QueryBuilder<'a, Postgres>) {
        let mut separator = " WHERE ";
        for clause in &self.clauses {
            qb.push(separator);
            qb.push(clause.column);
            qb.push(clause.cmp.sql_operator());
            match &clause.value {
                FilterValue::Text(text) => qb.push_bind(text),
                FilterValue::Flag(flag) => qb.push_bind(*flag),
                FilterValue::Amount(amount) => qb.push_bind(*amount),
                FilterValue::Instant(instant) => qb.push_bind(*instant),
                FilterValue::Id(id) => qb.push_bind(*id),
            };
            separator = " AND ";
        }
    }
}

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    count: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            count: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Build a page, enforcing `page >= 1` and `1 <= count <= 100`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidPage`] or [`FilterError::InvalidCount`]
    /// when a bound is violated.
    pub const fn new(page: u32, count: u32) -> Result<Self, FilterError> {
        if page < 1 {
            return Err(FilterError::InvalidPage);
        }
        if count < 1 || count > MAX_PAGE_SIZE {
            return Err(FilterError::InvalidCount);
        }
        Ok(Self { page, count })
    }

    /// Parse `page` and `count` from raw query pairs, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] for non-numeric or out-of-range values.
    pub fn from_query<'a, I>(params: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut page = 1;
        let mut count = DEFAULT_PAGE_SIZE;
        for (name, raw) in params {
            match name {
                "page" => page = raw.parse().map_err(|_| FilterError::InvalidPage)?,
                "count" => count = raw.parse().map_err(|_| FilterError::InvalidCount)?,
                _ => {}
            }
        }
        Self::new(page, count)
    }

    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn count(self) -> u32 {
        self.count
    }

    /// Row offset of the first record on this page.
    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.page as i64 - 1) * self.count as i64
    }

    /// Page size as a bindable limit.
    #[must_use]
    pub const fn limit(self) -> i64 {
        self.count as i64
    }
}

/// Fetch one page of rows plus the unpaginated match count.
///
/// Both queries are assembled from the same [`FilterPlan`], so the slice and
/// the count always reflect the same criteria. They run as two statements;
/// skew under concurrent writes is accepted.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` on query failure.
pub async fn fetch_page<T>(
    pool: &PgPool,
    table: &str,
    default_order: &str,
    plan: &FilterPlan,
    page: Page,
) -> Result<(Vec<T>, i64), sqlx::Error>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut query = QueryBuilder::new(format!("SELECT * FROM {table}"));
    plan.push_where(&mut query);
    query.push(format!(" ORDER BY {default_order}"));
    query.push(" LIMIT ");
    query.push_bind(page.limit());
    query.push(" OFFSET ");
    query.push_bind(page.offset());
    let items = query.build_query_as::<T>().fetch_all(pool).await?;

    let mut count_query = QueryBuilder::new(format!("SELECT COUNT(*) FROM {table}"));
    plan.push_where(&mut count_query);
    let total_count = count_query
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total_count))
}
