//! Allow-listed filters and sorts over users joined with their live detail.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use super::{User, UserDetail};
use crate::common::{AppError, AppResult, Filter, FilterOp, ListRequest, Sort, SortDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Email,
    Role,
    IsVerified,
    IsOauth,
    IsActive,
    CreatedAt,
    UpdatedAt,
    FullName,
    Sex,
    PhoneNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Bool,
    Code,
    Timestamp,
}

impl UserField {
    fn filterable(name: &str) -> Option<Self> {
        Some(match name {
            "email" => Self::Email,
            "role" => Self::Role,
            "is_verified" => Self::IsVerified,
            "is_oauth" => Self::IsOauth,
            "is_active" => Self::IsActive,
            "created_at" => Self::CreatedAt,
            "full_name" => Self::FullName,
            "sex" => Self::Sex,
            "phone_number" => Self::PhoneNumber,
            _ => return None,
        })
    }

    fn sortable(name: &str) -> Option<Self> {
        Some(match name {
            "email" => Self::Email,
            "role" => Self::Role,
            "created_at" => Self::CreatedAt,
            "updated_at" => Self::UpdatedAt,
            "full_name" => Self::FullName,
            _ => return None,
        })
    }

    fn column(self) -> &'static str {
        match self {
            Self::Email => "u.email",
            Self::Role => "u.role",
            Self::IsVerified => "u.is_verified",
            Self::IsOauth => "u.is_oauth",
            Self::IsActive => "u.is_active",
            Self::CreatedAt => "u.created_at",
            Self::UpdatedAt => "u.updated_at",
            Self::FullName => "ud.full_name",
            Self::Sex => "ud.sex",
            Self::PhoneNumber => "ud.phone_number",
        }
    }

    fn kind(self) -> ValueKind {
        match self {
            Self::Email | Self::FullName | Self::PhoneNumber => ValueKind::Text,
            Self::IsVerified | Self::IsOauth | Self::IsActive => ValueKind::Bool,
            Self::Role | Self::Sex => ValueKind::Code,
            Self::CreatedAt | Self::UpdatedAt => ValueKind::Timestamp,
        }
    }

    /// `None` where the SQL column would be NULL.
    fn value_of(self, user: &User, detail: Option<&UserDetail>) -> Option<FieldValue> {
        match self {
            Self::Email => Some(FieldValue::Text(user.email.clone())),
            Self::Role => Some(FieldValue::Code(user.role.into())),
            Self::IsVerified => Some(FieldValue::Bool(user.is_verified)),
            Self::IsOauth => Some(FieldValue::Bool(user.is_oauth)),
            Self::IsActive => Some(FieldValue::Bool(user.is_active)),
            Self::CreatedAt => Some(FieldValue::Timestamp(user.created_at)),
            Self::UpdatedAt => Some(FieldValue::Timestamp(user.updated_at)),
            Self::FullName => detail.map(|d| FieldValue::Text(d.full_name.clone())),
            Self::Sex => detail.map(|d| FieldValue::Code(d.sex.into())),
            Self::PhoneNumber => detail
                .and_then(|d| d.phone_number.clone())
                .map(FieldValue::Text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Code(i16),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    fn parse(kind: ValueKind, field: &str, value: &Value) -> AppResult<Self> {
        let parsed = match kind {
            ValueKind::Text => value.as_str().map(|s| Self::Text(s.to_string())),
            ValueKind::Bool => value.as_bool().map(Self::Bool),
            ValueKind::Code => value
                .as_i64()
                .and_then(|n| i16::try_from(n).ok())
                .map(Self::Code),
            ValueKind::Timestamp => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| Self::Timestamp(t.with_timezone(&Utc))),
        };
        parsed.ok_or_else(|| {
            AppError::InvalidRequest(format!("invalid value {value} for filter on {field:?}"))
        })
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Text(s) => qb.push_bind(s.clone()),
            Self::Bool(b) => qb.push_bind(*b),
            Self::Code(c) => qb.push_bind(*c),
            Self::Timestamp(t) => qb.push_bind(*t),
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserFilter {
    field: UserField,
    op: FilterOp,
    values: Vec<FieldValue>,
}

impl UserFilter {
    fn parse(filter: &Filter) -> AppResult<Self> {
        let field = UserField::filterable(&filter.field).ok_or_else(|| {
            AppError::InvalidRequest(format!("filter on field {:?} is not allowed", filter.field))
        })?;
        let kind = field.kind();
        if matches!(filter.operator, FilterOp::Like | FilterOp::Ilike) && kind != ValueKind::Text {
            return Err(AppError::InvalidRequest(format!(
                "like filters only apply to text fields, not {:?}",
                filter.field
            )));
        }

        let values = match filter.operator {
            FilterOp::Null | FilterOp::Notnull => Vec::new(),
            FilterOp::In | FilterOp::Nin => filter
                .value
                .as_array()
                .filter(|values| !values.is_empty())
                .ok_or_else(|| {
                    AppError::InvalidRequest("in/nin filters need a non-empty array".into())
                })?
                .iter()
                .map(|v| FieldValue::parse(kind, &filter.field, v))
                .collect::<AppResult<_>>()?,
            _ => vec![FieldValue::parse(kind, &filter.field, &filter.value)?],
        };

        Ok(Self {
            field,
            op: filter.operator,
            values,
        })
    }

    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let column = self.field.column();
        let comparison = match self.op {
            FilterOp::Eq => "=",
            FilterOp::Neq => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::Null => {
                qb.push(format_args!("{column} IS NULL"));
                return;
            }
            FilterOp::Notnull => {
                qb.push(format_args!("{column} IS NOT NULL"));
                return;
            }
            FilterOp::Like | FilterOp::Ilike => {
                let keyword = if self.op == FilterOp::Like { "LIKE" } else { "ILIKE" };
                qb.push(format_args!("{column} {keyword} "));
                qb.push_bind(format!("%{}%", escape_like(self.text())));
                return;
            }
            FilterOp::In | FilterOp::Nin => {
                let keyword = if self.op == FilterOp::In { "IN" } else { "NOT IN" };
                qb.push(format_args!("{column} {keyword} ("));
                let mut separated = qb.separated(", ");
                for value in &self.values {
                    match value {
                        FieldValue::Text(s) => separated.push_bind(s.clone()),
                        FieldValue::Bool(b) => separated.push_bind(*b),
                        FieldValue::Code(c) => separated.push_bind(*c),
                        FieldValue::Timestamp(t) => separated.push_bind(*t),
                    };
                }
                separated.push_unseparated(")");
                return;
            }
        };
        qb.push(format_args!("{column} {comparison} "));
        self.values[0].push_bind(qb);
    }

    fn text(&self) -> &str {
        match self.values.first() {
            Some(FieldValue::Text(s)) => s,
            _ => "",
        }
    }

    /// Row predicate with SQL NULL semantics: any comparison against a
    /// missing value is false.
    pub fn matches(&self, user: &User, detail: Option<&UserDetail>) -> bool {
        let expected = &self.values;
        match (self.op, self.field.value_of(user, detail)) {
            (FilterOp::Null, actual) => actual.is_none(),
            (FilterOp::Notnull, actual) => actual.is_some(),
            (_, None) => false,
            (FilterOp::Eq, Some(actual)) => actual == expected[0],
            (FilterOp::Neq, Some(actual)) => actual != expected[0],
            (FilterOp::Gt, Some(actual)) => actual > expected[0],
            (FilterOp::Gte, Some(actual)) => actual >= expected[0],
            (FilterOp::Lt, Some(actual)) => actual < expected[0],
            (FilterOp::Lte, Some(actual)) => actual <= expected[0],
            (FilterOp::Like, Some(FieldValue::Text(s))) => s.contains(self.text()),
            (FilterOp::Ilike, Some(FieldValue::Text(s))) => {
                s.to_lowercase().contains(&self.text().to_lowercase())
            }
            (FilterOp::Like | FilterOp::Ilike, Some(_)) => false,
            (FilterOp::In, Some(actual)) => expected.contains(&actual),
            (FilterOp::Nin, Some(actual)) => !expected.contains(&actual),
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSort {
    field: UserField,
    direction: SortDirection,
}

impl UserSort {
    fn parse(sort: &Sort) -> AppResult<Self> {
        let field = UserField::sortable(&sort.field).ok_or_else(|| {
            AppError::InvalidRequest(format!("sort on field {:?} is not allowed", sort.field))
        })?;
        Ok(Self {
            field,
            direction: sort.direction,
        })
    }

    /// Postgres ordering: NULLs sort as larger than every value.
    fn compare(&self, a: (&User, Option<&UserDetail>), b: (&User, Option<&UserDetail>)) -> Ordering {
        let ordering = match (self.field.value_of(a.0, a.1), self.field.value_of(b.0, b.1)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Validated filter and sort set for the user listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserQuery {
    pub filters: Vec<UserFilter>,
    pub sort: Vec<UserSort>,
}

impl UserQuery {
    /// `InvalidRequest` for a field outside the allow-list or a value of the wrong type.
    pub fn from_request(request: &ListRequest) -> AppResult<Self> {
        Ok(Self {
            filters: request
                .filters
                .iter()
                .map(UserFilter::parse)
                .collect::<AppResult<_>>()?,
            sort: request
                .sort
                .iter()
                .map(UserSort::parse)
                .collect::<AppResult<_>>()?,
        })
    }

    /// Appends `AND <condition>` for every filter.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for filter in &self.filters {
            qb.push(" AND ");
            filter.push_sql(qb);
        }
    }

    /// Requested sorts, newest first by default; id breaks ties.
    pub fn push_order_by(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ");
        if self.sort.is_empty() {
            qb.push("u.created_at DESC, ");
        }
        for sort in &self.sort {
            qb.push(format_args!("{} {}, ", sort.field.column(), sort.direction.as_sql()));
        }
        qb.push("u.id DESC");
    }

    pub fn matches(&self, user: &User, detail: Option<&UserDetail>) -> bool {
        self.filters.iter().all(|f| f.matches(user, detail))
    }

    /// In-memory equivalent of [`push_order_by`](Self::push_order_by).
    pub fn compare(&self, a: (&User, Option<&UserDetail>), b: (&User, Option<&UserDetail>)) -> Ordering {
        let requested = if self.sort.is_empty() {
            b.0.created_at.cmp(&a.0.created_at)
        } else {
            self.sort
                .iter()
                .map(|s| s.compare(a, b))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        };
        requested.then_with(|| b.0.id.as_uuid().cmp(a.0.id.as_uuid()))
    }
}
