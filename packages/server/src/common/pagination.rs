//! Offset pagination, filtering and sorting for list endpoints.
//!
//! Filters and sorts travel as base64url encoded JSON arrays, e.g.
//! `[{"field":"role","operator":"eq","value":1}]` and
//! `[{"field":"email","direction":"asc"}]`. This module only checks their
//! shape; which fields may be used is decided by the repository being queried.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::encoding::decode_url;
use super::error::{AppError, AppResult};

pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Nin,
    Null,
    Notnull,
}

impl FilterOp {
    pub fn takes_value(self) -> bool {
        !matches!(self, FilterOp::Null | FilterOp::Notnull)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOp,
    #[serde(default)]
    pub value: Value,
}

impl Filter {
    pub fn new(field: &str, operator: FilterOp, value: Value) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value,
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.field.is_empty() {
            return Err(AppError::InvalidRequest("filter field is required".into()));
        }
        if self.operator.takes_value() && self.value.is_null() {
            return Err(AppError::InvalidRequest(format!(
                "filter on {:?} needs a value",
                self.field
            )));
        }
        if matches!(self.operator, FilterOp::In | FilterOp::Nin)
            && !self.value.as_array().is_some_and(|values| !values.is_empty())
        {
            return Err(AppError::InvalidRequest(
                "in/nin filters need a non-empty array".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl TryFrom<String> for SortDirection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(format!("invalid sort direction {value:?}, expected asc or desc")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: &str, direction: SortDirection) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub page: u64,
    pub limit: u64,
    pub filters: Vec<Filter>,
    pub sort: Vec<Sort>,
}

impl ListRequest {
    /// `InvalidRequest` unless `page >= 1`, `limit` is within bounds and the
    /// resulting offset fits a SQL `BIGINT`.
    pub fn new(page: u64, limit: u64) -> AppResult<Self> {
        if page < 1 {
            return Err(AppError::InvalidRequest("page must be at least 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let in_range = (page - 1)
            .checked_mul(limit)
            .is_some_and(|offset| i64::try_from(offset).is_ok());
        if !in_range {
            return Err(AppError::InvalidRequest("page is out of range".into()));
        }
        Ok(Self {
            page,
            limit,
            filters: Vec::new(),
            sort: Vec::new(),
        })
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> AppResult<Self> {
        for filter in &filters {
            filter.validate()?;
        }
        self.filters = filters;
        Ok(self)
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }

    /// Decode the `filters` query parameter.
    pub fn decode_filters(encoded: &str) -> AppResult<Vec<Filter>> {
        decode_param(encoded, "filters")
    }

    /// Decode the `sort` query parameter.
    pub fn decode_sort(encoded: &str) -> AppResult<Vec<Sort>> {
        decode_param(encoded, "sort")
    }

    pub fn offset(&self) -> i64 {
        let offset = self.page.saturating_sub(1).saturating_mul(self.limit);
        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        i64::try_from(self.limit).unwrap_or(i64::MAX)
    }
}

fn decode_param<T: serde::de::DeserializeOwned>(encoded: &str, name: &str) -> AppResult<Vec<T>> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    let json = decode_url(encoded)
        .ok_or_else(|| AppError::InvalidRequest(format!("{name} is not base64url")))?;
    serde_json::from_str(&json)
        .map_err(|e| AppError::InvalidRequest(format!("invalid {name}: {e}")))
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, request: &ListRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages: total.div_ceil(request.limit),
        }
    }
}
