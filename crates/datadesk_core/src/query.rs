//! Pagination and search statement builder.
//!
//! # Responsibility
//! - Turn a page request, a base predicate and search criteria into a
//!   `COUNT(*)` + data statement pair sharing one WHERE clause.
//! - Compute page metadata from the total row count.
//!
//! # Invariants
//! - Table, column and ordering identifiers come only from `'static`
//!   allow-lists; caller text is always bound as a parameter.
//! - The count statement binds the same parameters as the data statement
//!   minus the trailing `LIMIT`/`OFFSET` values.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderDirection {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Caller-facing page request.
///
/// `order_by` is resolved against the entity allow-list by the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
}

impl PageRequest {
    /// Creates a request for one page with the given size.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Sets the free-text search term.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Effective page number, never below 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(DEFAULT_PAGE).max(1)
    }

    /// Effective page size clamped into `[1, MAX_LIMIT]`.
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Row offset of the first row on the effective page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }
}

/// Page metadata returned alongside rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Rows of one page plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Converts every row while keeping metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            rows: self.rows.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// Base filter applied before search.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Conjunction of `column = ?` terms. `Value::Null` becomes `IS NULL`.
    Equals(Vec<(&'static str, Value)>),
    /// Static SQL fragment with its own positional `?` parameters.
    Fragment {
        sql: &'static str,
        params: Vec<Value>,
    },
    /// Every nested predicate must hold.
    All(Vec<Predicate>),
}

impl Predicate {
    /// Matches every row.
    pub fn none() -> Self {
        Self::All(Vec::new())
    }

    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self::Equals(vec![(column, value.into())])
    }

    pub fn fragment(sql: &'static str, params: Vec<Value>) -> Self {
        Self::Fragment { sql, params }
    }

    /// Combines two predicates with `AND`.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::All(mut items) => {
                items.push(other);
                Self::All(items)
            }
            first => Self::All(vec![first, other]),
        }
    }

    fn render(&self, clauses: &mut Vec<String>, params: &mut Vec<Value>) {
        match self {
            Self::Equals(terms) => {
                for (column, value) in terms {
                    if matches!(value, Value::Null) {
                        clauses.push(format!("{column} IS NULL"));
                    } else {
                        clauses.push(format!("{column} = ?"));
                        params.push(value.clone());
                    }
                }
            }
            Self::Fragment { sql, params: bound } => {
                clauses.push(format!("({sql})"));
                params.extend(bound.iter().cloned());
            }
            Self::All(items) => {
                for item in items {
                    item.render(clauses, params);
                }
            }
        }
    }
}

/// Statement pair produced by [`build_page_plan`].
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub count_sql: String,
    pub data_sql: String,
    /// Parameters shared by both statements.
    pub params: Vec<Value>,
    pub limit: u32,
    pub offset: u64,
}

impl PagePlan {
    /// Parameters for the data statement: shared ones plus limit and offset.
    pub fn data_params(&self) -> Vec<Value> {
        let mut params = self.params.clone();
        params.push(Value::Integer(i64::from(self.limit)));
        params.push(Value::Integer(i64::try_from(self.offset).unwrap_or(i64::MAX)));
        params
    }
}

/// Inputs of one paginated select after identifier resolution.
#[derive(Debug, Clone)]
pub struct PageSpec<'a> {
    pub table: &'static str,
    pub select: &'a str,
    pub predicate: &'a Predicate,
    pub search: Option<&'a str>,
    pub search_columns: &'a [&'static str],
    pub order_column: &'static str,
    pub tie_breaker: &'static str,
    pub direction: OrderDirection,
    pub page: u32,
    pub limit: u32,
}

/// Builds the count and data statements for one page.
pub fn build_page_plan(spec: &PageSpec<'_>) -> PagePlan {
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    spec.predicate.render(&mut clauses, &mut params);

    let term = spec.search.map(str::trim).filter(|term| !term.is_empty());
    if let (Some(term), false) = (term, spec.search_columns.is_empty()) {
        let pattern = format!("%{}%", escape_like(term));
        let search_clause = spec
            .search_columns
            .iter()
            .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        clauses.push(format!("({search_clause})"));
        params.extend(spec.search_columns.iter().map(|_| Value::Text(pattern.clone())));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let order_clause = if spec.order_column == spec.tie_breaker {
        format!("{} {}", spec.order_column, spec.direction.as_sql())
    } else {
        format!(
            "{} {}, {} {}",
            spec.order_column,
            spec.direction.as_sql(),
            spec.tie_breaker,
            spec.direction.as_sql()
        )
    };

    let limit = spec.limit.clamp(1, MAX_LIMIT);
    let page = spec.page.max(1);
    PagePlan {
        count_sql: format!("SELECT COUNT(*) FROM {}{}", spec.table, where_clause),
        data_sql: format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT ? OFFSET ?",
            spec.select, spec.table, where_clause, order_clause
        ),
        params,
        limit,
        offset: u64::from(page - 1) * u64::from(limit),
    }
}

/// Escapes `LIKE` wildcards so the term matches literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::{build_page_plan, escape_like, OrderDirection, PageMeta, PageSpec, Predicate};
    use rusqlite::types::Value;

    fn spec<'a>(predicate: &'a Predicate, search: Option<&'a str>) -> PageSpec<'a> {
        PageSpec {
            table: "documents",
            select: "*",
            predicate,
            search,
            search_columns: &["title", "body"],
            order_column: "id",
            tie_breaker: "id",
            direction: OrderDirection::Desc,
            page: 2,
            limit: 10,
        }
    }

    #[test]
    fn meta_math_matches_page_boundaries() {
        let first = PageMeta::new(1, 10, 25);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);
        assert!(!first.has_prev);

        let last = PageMeta::new(3, 10, 25);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let empty = PageMeta::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn count_and_data_share_where_clause_and_params() {
        let predicate = Predicate::eq("category", "notes".to_string());
        let plan = build_page_plan(&spec(&predicate, Some("rust")));

        assert_eq!(
            plan.count_sql,
            "SELECT COUNT(*) FROM documents WHERE category = ? AND (title LIKE ? ESCAPE '\\' OR body LIKE ? ESCAPE '\\')"
        );
        assert!(plan.data_sql.ends_with("ORDER BY id DESC LIMIT ? OFFSET ?"));
        assert_eq!(plan.params.len(), 3);
        assert_eq!(plan.params[1], Value::Text("%rust%".to_string()));
        assert_eq!(plan.offset, 10);

        let data_params = plan.data_params();
        assert_eq!(data_params.len(), 5);
        assert_eq!(data_params[3], Value::Integer(10));
        assert_eq!(data_params[4], Value::Integer(10));
    }

    #[test]
    fn blank_search_or_missing_columns_is_ignored() {
        let predicate = Predicate::none();
        let plan = build_page_plan(&spec(&predicate, Some("   ")));
        assert_eq!(plan.count_sql, "SELECT COUNT(*) FROM documents");

        let mut no_columns = spec(&predicate, Some("rust"));
        no_columns.search_columns = &[];
        let plan = build_page_plan(&no_columns);
        assert!(plan.params.is_empty());
    }

    #[test]
    fn null_equality_renders_is_null_and_fragments_keep_params() {
        let predicate = Predicate::eq("owner_ref", Value::Null).and(Predicate::fragment(
            "tags LIKE ?",
            vec![Value::Text("%\"work\"%".to_string())],
        ));
        let plan = build_page_plan(&spec(&predicate, None));
        assert!(plan
            .count_sql
            .ends_with("WHERE owner_ref IS NULL AND (tags LIKE ?)"));
        assert_eq!(plan.params.len(), 1);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
