//! [`SqlTranslator`] turns a [`ListRequest`] into an SQLite `WHERE` /
//! `ORDER BY` / `LIMIT` triple over the `offers` table.
//!
//! Like any [`QueryTranslator`], it only expresses the first page of a result
//! set: the request's page number is ignored and no `OFFSET` is produced. The
//! repository applies the offset itself.

use offer_core::{
  Error as CoreError,
  query::{FieldFilter, FilterOp, ListRequest, QueryTranslator, SortDirection},
};
use rusqlite::types::Value;

use crate::encode::encode_dt;

/// A translated, parameterised query fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
  /// `WHERE ...` clause, or empty.
  pub where_clause: String,
  pub params:       Vec<Value>,
  /// `ORDER BY ...` clause; always present for a stable order.
  pub order_by:     String,
  /// Rows per page; `None` when the request is unpaginated.
  pub limit:        Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
  Text,
  Integer,
  Timestamp,
}

/// Filterable/sortable fields and their column kinds. Field names equal
/// column names.
fn column(field: &str) -> Option<Column> {
  match field {
    "code" | "status" => Some(Column::Text),
    "id" | "seller_id" => Some(Column::Integer),
    "new_at" | "sales_at" | "in_order_at" | "sold_at" | "returned_to_seller_at"
    | "indexed_at" => Some(Column::Timestamp),
    _ => None,
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlTranslator;

impl SqlTranslator {
  fn condition(
    &self,
    filter: &FieldFilter,
    params: &mut Vec<Value>,
  ) -> offer_core::Result<String> {
    let kind = column(&filter.field)
      .ok_or_else(|| CoreError::UnknownField(filter.field.clone()))?;
    let field = filter.field.as_str();

    match (&filter.op, kind) {
      (FilterOp::TextIn { values }, Column::Text) => {
        Ok(in_list(field, values.iter().map(|v| Value::Text(v.clone())), params))
      }
      (FilterOp::NumberIn { values }, Column::Integer) => {
        Ok(in_list(field, values.iter().map(|v| Value::Integer(*v)), params))
      }
      (FilterOp::DateRange { from, to }, Column::Timestamp) => {
        let mut parts = Vec::new();
        if let Some(from) = from {
          params.push(Value::Text(encode_dt(*from)));
          parts.push(format!("{field} >= ?{}", params.len()));
        }
        if let Some(to) = to {
          params.push(Value::Text(encode_dt(*to)));
          parts.push(format!("{field} <= ?{}", params.len()));
        }
        if parts.is_empty() {
          Ok(format!("{field} IS NOT NULL"))
        } else {
          Ok(parts.join(" AND "))
        }
      }
      (op, _) => Err(CoreError::InvalidQuery(format!(
        "filter {} is not applicable to field {field:?}",
        op_name(op)
      ))),
    }
  }
}

fn op_name(op: &FilterOp) -> &'static str {
  match op {
    FilterOp::TextIn { .. } => "text_in",
    FilterOp::NumberIn { .. } => "number_in",
    FilterOp::DateRange { .. } => "date_range",
  }
}

fn in_list(
  field: &str,
  values: impl Iterator<Item = Value>,
  params: &mut Vec<Value>,
) -> String {
  let placeholders: Vec<String> = values
    .map(|v| {
      params.push(v);
      format!("?{}", params.len())
    })
    .collect();

  if placeholders.is_empty() {
    // An empty value-set matches nothing.
    "0".to_owned()
  } else {
    format!("{field} IN ({})", placeholders.join(", "))
  }
}

impl QueryTranslator for SqlTranslator {
  type Query = SqlQuery;

  fn translate(&self, request: &ListRequest) -> offer_core::Result<SqlQuery> {
    let mut params = Vec::new();
    let conds = request
      .filters
      .iter()
      .map(|f| self.condition(f, &mut params))
      .collect::<offer_core::Result<Vec<_>>>()?;

    let where_clause = if conds.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", conds.join(" AND "))
    };

    let order_by = match &request.sort {
      Some(sort) => {
        if column(&sort.field).is_none() {
          return Err(CoreError::UnknownField(sort.field.clone()));
        }
        let dir = match sort.direction {
          SortDirection::Asc => "ASC",
          SortDirection::Desc => "DESC",
        };
        format!("ORDER BY {} {dir}, code ASC", sort.field)
      }
      None => "ORDER BY id DESC, code ASC".to_owned(),
    };

    Ok(SqlQuery {
      where_clause,
      params,
      order_by,
      limit: request.pagination.map(|p| i64::from(p.per_page)),
    })
  }
}
