//! Turns an untrusted JSON request body into a numeric batch.
//!
//! Accepted table layouts, the ones a dataframe constructor takes:
//!
//! - rows: `[[1, 2, 3, 4, 5], ...]`
//! - records: `[{"a": 1, "b": 2, ...}, ...]`, columns in first-seen key order
//! - columns: `{"a": [1, ...], "b": [2, ...], ...}`
//! - indexed columns: `{"a": {"r0": 1, ...}, ...}`, rows in the first column's label order
//! - a bare list of scalars, read as a single column
//!
//! Structure is checked first ([`decode`]), values second ([`Table::coerce`]).

use itertools::Itertools;
use serde_json::{Map, Value};

use crate::{error::InferenceError, model::Matrix};

/// A rectangular table of not-yet-numeric cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
  columns: Vec<String>,
  rows: Vec<Vec<Value>>,
}

impl Table {
  pub fn columns(&self) -> &[String] {
    &self.columns
  }

  pub fn n_rows(&self) -> usize {
    self.rows.len()
  }

  pub fn n_cols(&self) -> usize {
    self.columns.len()
  }

  /// Casts every cell to f32. Numeric strings are parsed; anything else that is
  /// not a finite number fails, naming the first offending cell.
  pub fn coerce(self) -> Result<Matrix, InferenceError> {
    let (n_rows, n_cols) = (self.n_rows(), self.n_cols());
    let mut data = Vec::with_capacity(n_rows * n_cols);
    for (row, cells) in self.rows.iter().enumerate() {
      for (col, cell) in cells.iter().enumerate() {
        let value = coerce_cell(cell).map_err(|reason| InferenceError::TypeCoercion {
          row,
          column: self.columns[col].clone(),
          reason,
        })?;
        data.push(value);
      }
    }
    Matrix::new(data, n_rows, n_cols).map_err(InferenceError::from)
  }
}

fn coerce_cell(cell: &Value) -> Result<f32, String> {
  let wide = match cell {
    Value::Number(n) => n
      .as_f64()
      .ok_or_else(|| format!("{n} is not representable as a float"))?,
    Value::String(s) => s
      .trim()
      .parse::<f64>()
      .map_err(|_| format!("{s:?} is not a number"))?,
    other => return Err(format!("expected a number, found {}", type_name(other))),
  };
  let narrow = wide as f32;
  if !narrow.is_finite() {
    return Err(format!("{cell} is not a finite 32-bit float"));
  }
  Ok(narrow)
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

fn decode_error(message: impl Into<String>) -> InferenceError {
  InferenceError::Decode(message.into())
}

/// Parses a request body and checks that it describes a rectangular table.
pub fn decode(body: &[u8]) -> Result<Table, InferenceError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Err(decode_error("request body is empty"));
  }
  let value: Value = serde_json::from_slice(body)
    .map_err(|err| decode_error(format!("request body is not valid JSON: {err}")))?;
  decode_value(value)
}

pub fn decode_value(value: Value) -> Result<Table, InferenceError> {
  let table = match value {
    Value::Array(items) => decode_array(items)?,
    Value::Object(map) => decode_object(map)?,
    other => {
      return Err(decode_error(format!(
        "expected a table (JSON array or object), found {}",
        type_name(&other)
      )))
    }
  };
  if table.n_rows() > 0 && table.n_cols() == 0 {
    return Err(decode_error("table has rows but no columns"));
  }
  Ok(table)
}

fn positional_columns(n: usize) -> Vec<String> {
  (0..n).map(|i| i.to_string()).collect()
}

fn decode_array(items: Vec<Value>) -> Result<Table, InferenceError> {
  let (is_array, is_object) = match items.first() {
    None => return Ok(Table::default()),
    Some(first) => (first.is_array(), first.is_object()),
  };
  if is_array {
    decode_rows(items)
  } else if is_object {
    decode_records(items)
  } else {
    decode_single_column(items)
  }
}

fn decode_rows(items: Vec<Value>) -> Result<Table, InferenceError> {
  let mut rows = Vec::with_capacity(items.len());
  let mut width = None;
  for (i, item) in items.into_iter().enumerate() {
    let cells = match item {
      Value::Array(cells) => cells,
      other => {
        return Err(decode_error(format!(
          "row {i} is {}, expected an array like the rows before it",
          type_name(&other)
        )));
      }
    };
    match width {
      None => width = Some(cells.len()),
      Some(w) if w != cells.len() => {
        return Err(decode_error(format!(
          "ragged rows: row {i} has {} values, row 0 has {w}",
          cells.len()
        )))
      }
      Some(_) => {}
    }
    rows.push(cells);
  }
  Ok(Table {
    columns: positional_columns(width.unwrap_or(0)),
    rows,
  })
}

fn decode_records(items: Vec<Value>) -> Result<Table, InferenceError> {
  let mut columns: Vec<String> = Vec::new();
  let mut rows = Vec::with_capacity(items.len());
  for (i, item) in items.into_iter().enumerate() {
    let mut record = match item {
      Value::Object(record) => record,
      other => {
        return Err(decode_error(format!(
          "record {i} is {}, expected an object like the records before it",
          type_name(&other)
        )));
      }
    };
    if i == 0 {
      columns = record.keys().cloned().collect();
    } else if record.len() != columns.len() || !columns.iter().all(|c| record.contains_key(c)) {
      return Err(decode_error(format!(
        "record {i} has columns [{}], expected [{}]",
        record.keys().join(", "),
        columns.join(", ")
      )));
    }
    rows.push(
      columns
        .iter()
        .map(|c| record.remove(c).unwrap_or(Value::Null))
        .collect(),
    );
  }
  Ok(Table { columns, rows })
}

fn decode_single_column(items: Vec<Value>) -> Result<Table, InferenceError> {
  if let Some((i, item)) = items
    .iter()
    .find_position(|item| item.is_array() || item.is_object())
  {
    return Err(decode_error(format!(
      "item {i} is {}, but the items before it are scalars",
      type_name(item)
    )));
  }
  Ok(Table {
    columns: positional_columns(1),
    rows: items.into_iter().map(|item| vec![item]).collect(),
  })
}

fn decode_object(map: Map<String, Value>) -> Result<Table, InferenceError> {
  let (is_array, is_object) = match map.values().next() {
    None => return Ok(Table::default()),
    Some(first) => (first.is_array(), first.is_object()),
  };
  if is_array {
    decode_columns(map)
  } else if is_object {
    decode_indexed_columns(map)
  } else {
    Err(decode_error(
      "object values must be column arrays or {row label: value} objects, found a scalar",
    ))
  }
}

fn decode_columns(map: Map<String, Value>) -> Result<Table, InferenceError> {
  let mut columns = Vec::with_capacity(map.len());
  let mut values = Vec::with_capacity(map.len());
  for (name, column) in map {
    let cells = match column {
      Value::Array(cells) => cells,
      other => {
        return Err(decode_error(format!(
          "column {name:?} is {}, expected an array like the columns before it",
          type_name(&other)
        )));
      }
    };
    columns.push(name);
    values.push(cells);
  }
  if !values.iter().map(Vec::len).all_equal() {
    return Err(decode_error(format!(
      "columns differ in length: {}",
      columns
        .iter()
        .zip(&values)
        .map(|(name, cells)| format!("{name:?} has {}", cells.len()))
        .join(", ")
    )));
  }
  Ok(Table {
    rows: transpose(values),
    columns,
  })
}

fn decode_indexed_columns(map: Map<String, Value>) -> Result<Table, InferenceError> {
  let mut columns = Vec::with_capacity(map.len());
  let mut labels: Vec<String> = Vec::new();
  let mut values = Vec::with_capacity(map.len());
  for (i, (name, column)) in map.into_iter().enumerate() {
    let mut cells = match column {
      Value::Object(cells) => cells,
      other => {
        return Err(decode_error(format!(
          "column {name:?} is {}, expected an object like the columns before it",
          type_name(&other)
        )));
      }
    };
    if i == 0 {
      labels = cells.keys().cloned().collect();
    } else if cells.len() != labels.len() || !labels.iter().all(|l| cells.contains_key(l)) {
      return Err(decode_error(format!(
        "column {name:?} has row labels [{}], expected [{}]",
        cells.keys().join(", "),
        labels.join(", ")
      )));
    }
    values.push(
      labels
        .iter()
        .map(|l| cells.remove(l).unwrap_or(Value::Null))
        .collect::<Vec<_>>(),
    );
    columns.push(name);
  }
  Ok(Table {
    rows: transpose(values),
    columns,
  })
}

// column-major to row-major; all columns have the same length
fn transpose(columns: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
  let n_rows = columns.first().map_or(0, Vec::len);
  let mut rows: Vec<Vec<Value>> = (0..n_rows)
    .map(|_| Vec::with_capacity(columns.len()))
    .collect();
  for column in columns {
    for (row, cell) in rows.iter_mut().zip(column) {
      row.push(cell);
    }
  }
  rows
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::error::ErrorKind;

  fn decode_json(value: Value) -> Result<Table, InferenceError> {
    decode(value.to_string().as_bytes())
  }

  fn matrix_of(value: Value) -> Result<Matrix, InferenceError> {
    decode_json(value)?.coerce()
  }

  #[test]
  fn rows_layout() {
    let m = matrix_of(json!([[1, 2, 3, 4, 5], [6, 7, 8, 9, 10]])).unwrap();
    assert_eq!((m.rows(), m.cols()), (2, 5));
    assert_eq!(m.row(1).to_vec(), &[6.0, 7.0, 8.0, 9.0, 10.0]);
  }

  #[test]
  fn records_layout_keeps_key_order() {
    let table = decode(br#"[{"w": 1, "h": 2}, {"h": 4, "w": 3}]"#).unwrap();
    assert_eq!(table.columns(), &["w", "h"]);
    let m = table.coerce().unwrap();
    assert_eq!(m.values(), &[1.0, 2.0, 3.0, 4.0]);
  }

  #[test]
  fn columns_layout_is_transposed() {
    let m = matrix_of(json!({"a": [1, 2], "b": [3, 4], "c": [5, 6]})).unwrap();
    assert_eq!((m.rows(), m.cols()), (2, 3));
    assert_eq!(m.values(), &[1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
  }

  #[test]
  fn indexed_columns_follow_first_column_labels() {
    let body = br#"{"a": {"r1": 1, "r0": 2}, "b": {"r0": 4, "r1": 3}}"#;
    let m = decode(body).unwrap().coerce().unwrap();
    assert_eq!(m.values(), &[1.0, 3.0, 2.0, 4.0]);
  }

  #[test]
  fn scalars_form_one_column() {
    let m = matrix_of(json!([1, 2, 3])).unwrap();
    assert_eq!((m.rows(), m.cols()), (3, 1));
  }

  #[test]
  fn empty_tables_have_no_rows() {
    for value in [json!([]), json!({})] {
      let table = decode_json(value).unwrap();
      assert_eq!((table.n_rows(), table.n_cols()), (0, 0));
    }
  }

  #[test]
  fn structural_problems_are_decode_errors() {
    let cases = [
      json!(null),
      json!(5),
      json!("rows"),
      json!([[1, 2, 3], [1, 2]]),
      json!([[1, 2], {"a": 1}]),
      json!([{"a": 1, "b": 2}, {"a": 1}]),
      json!([{"a": 1}, {"b": 1}]),
      json!({"a": [1, 2], "b": [1]}),
      json!({"a": [1], "b": 2}),
      json!({"a": 1, "b": 2}),
      json!({"a": {"r0": 1}, "b": {"r1": 1}}),
      json!([1, [2]]),
      json!([[]]),
      json!([{}]),
    ];
    for case in cases {
      let err = decode_json(case.clone()).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::Decode, "{case} gave {err}");
    }
  }

  #[test]
  fn invalid_json_and_empty_body_are_decode_errors() {
    let bodies: [&[u8]; 4] = [b"", b"   ", b"[[1, 2", b"{\"a\": nan}"];
    for body in bodies {
      assert_eq!(decode(body).unwrap_err().kind(), ErrorKind::Decode);
    }
  }

  #[test]
  fn numeric_strings_are_parsed() {
    let m = matrix_of(json!([["1.5", " -2 ", "3e2"]])).unwrap();
    assert_eq!(m.values(), &[1.5, -2.0, 300.0]);
  }

  #[test]
  fn non_numeric_cells_are_coercion_errors() {
    let cases = [
      json!([[1, 2, "x", 4, 5]]),
      json!([[1, null]]),
      json!([[true, 1]]),
      json!([[[1], 2]]),
      json!([["NaN", 1]]),
      json!([["inf", 1]]),
      json!([[1e300, 1]]),
      json!({"a": [1, {"b": 2}]}),
    ];
    for case in cases {
      let err = matrix_of(case.clone()).unwrap_err();
      assert_eq!(err.kind(), ErrorKind::TypeCoercion, "{case} gave {err}");
    }
  }

  #[test]
  fn coercion_error_names_row_and_column() {
    let err = matrix_of(json!([{"a": 1, "b": 2}, {"a": 3, "b": "oops"}])).unwrap_err();
    assert_eq!(
      err,
      InferenceError::TypeCoercion {
        row: 1,
        column: "b".to_string(),
        reason: "\"oops\" is not a number".to_string(),
      }
    );
  }
}
