// src/interop/dataframe.rs
//
// Columnar interchange: a dataset flattens to an Arrow RecordBatch with
// one column per dimension index plus one per data variable, rows laid
// out over the cartesian product of the dimension labels. The index
// columns are recorded in the schema metadata so the batch converts
// back without guessing.

use crate::core::dataarray::DataArray;
use crate::core::dataset::Dataset;
use crate::core::index::CoordIndex;
use crate::core::value::{Value, ValueType};
use crate::core::variable::Variable;
use crate::engine::error::{Error, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampNanosecondArray,
};
use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, TimeUnit};
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::sync::Arc;

/// Schema metadata key listing the index columns, as a JSON array.
pub const INDEX_COLUMNS_KEY: &str = "dimal:index_columns";

fn column_type(values: &[Value]) -> ValueType {
    values
        .iter()
        .find(|v| !v.is_null())
        .map(|v| v.value_type())
        .unwrap_or(ValueType::Float)
}

fn values_to_array(name: &str, values: &[Value]) -> Result<(ArrowField, ArrayRef)> {
    let vtype = column_type(values);
    let (data_type, array): (DataType, ArrayRef) = match vtype {
        ValueType::Int => {
            let cells: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Ok(Some(*i)),
                    Value::Null => Ok(None),
                    other => Err(Error::type_err(format!(
                        "column '{}' mixes integer and {} cells",
                        name,
                        other.value_type()
                    ))),
                })
                .collect::<Result<_>>()?;
            (DataType::Int64, Arc::new(Int64Array::from(cells)))
        }
        ValueType::Float => {
            let cells: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    Value::Float(f) => Ok(Some(*f)),
                    Value::Int(i) => Ok(Some(*i as f64)),
                    Value::Null => Ok(None),
                    other => Err(Error::type_err(format!(
                        "column '{}' mixes float and {} cells",
                        name,
                        other.value_type()
                    ))),
                })
                .collect::<Result<_>>()?;
            (DataType::Float64, Arc::new(Float64Array::from(cells)))
        }
        ValueType::Str => {
            let cells: Vec<Option<&str>> = values
                .iter()
                .map(|v| match v {
                    Value::Str(s) => Ok(Some(s.as_str())),
                    Value::Null => Ok(None),
                    other => Err(Error::type_err(format!(
                        "column '{}' mixes string and {} cells",
                        name,
                        other.value_type()
                    ))),
                })
                .collect::<Result<_>>()?;
            (DataType::Utf8, Arc::new(StringArray::from(cells)))
        }
        ValueType::Bool => {
            let cells: Vec<Option<bool>> = values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Ok(Some(*b)),
                    Value::Null => Ok(None),
                    other => Err(Error::type_err(format!(
                        "column '{}' mixes boolean and {} cells",
                        name,
                        other.value_type()
                    ))),
                })
                .collect::<Result<_>>()?;
            (DataType::Boolean, Arc::new(BooleanArray::from(cells)))
        }
        ValueType::DateTime => {
            let cells: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Value::DateTime(t) => {
                        t.and_utc().timestamp_nanos_opt().map(Some).ok_or_else(|| {
                            Error::value(format!(
                                "timestamp in column '{}' out of nanosecond range",
                                name
                            ))
                        })
                    }
                    Value::Null => Ok(None),
                    other => Err(Error::type_err(format!(
                        "column '{}' mixes datetime and {} cells",
                        name,
                        other.value_type()
                    ))),
                })
                .collect::<Result<_>>()?;
            (
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                Arc::new(TimestampNanosecondArray::from(cells)),
            )
        }
        ValueType::Null => {
            return Err(Error::not_implemented(format!(
                "cannot export column '{}': no supported cell type",
                name
            )))
        }
    };
    Ok((ArrowField::new(name, data_type, true), array))
}

fn array_to_values(name: &str, column: &ArrayRef) -> Result<Vec<Value>> {
    let n = column.len();
    let cell = |i: usize| -> Result<Value> {
        if column.is_null(i) {
            return Ok(Value::Null);
        }
        let any = column.as_any();
        if let Some(a) = any.downcast_ref::<Int64Array>() {
            Ok(Value::Int(a.value(i)))
        } else if let Some(a) = any.downcast_ref::<Float64Array>() {
            Ok(Value::Float(a.value(i)))
        } else if let Some(a) = any.downcast_ref::<StringArray>() {
            Ok(Value::Str(a.value(i).to_string()))
        } else if let Some(a) = any.downcast_ref::<BooleanArray>() {
            Ok(Value::Bool(a.value(i)))
        } else if let Some(a) = any.downcast_ref::<TimestampNanosecondArray>() {
            Ok(Value::DateTime(
                chrono::DateTime::from_timestamp_nanos(a.value(i)).naive_utc(),
            ))
        } else {
            Err(Error::not_implemented(format!(
                "unsupported Arrow column type for '{}': {}",
                name,
                column.data_type()
            )))
        }
    };
    (0..n).map(cell).collect()
}

/// Flatten a dataset into a RecordBatch over the cartesian product of
/// its dimension labels, first dimension varying slowest.
pub fn to_record_batch(ds: &Dataset) -> Result<RecordBatch> {
    let dims = ds.dim_names();
    let sizes = ds.dims();
    let shape: Vec<usize> = dims.iter().map(|d| sizes[d]).collect();
    let total: usize = shape.iter().product();

    let mut fields: Vec<ArrowField> = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();

    // index columns: each dimension's labels tiled over the product
    for (axis, dim) in dims.iter().enumerate() {
        let labels = ds.index(dim)?.into_values();
        let inner: usize = shape[axis + 1..].iter().product();
        let mut column = Vec::with_capacity(total);
        while column.len() < total {
            for label in &labels {
                for _ in 0..inner {
                    column.push(label.clone());
                }
            }
        }
        let (field, array) = values_to_array(dim, &column)?;
        fields.push(field);
        columns.push(array);
    }

    for name in ds.data_var_names() {
        let var = ds
            .variable(&name)
            .ok_or_else(|| Error::key(format!("no variable named '{}'", name)))?;
        let full = var.broadcast_to(&dims, &sizes)?;
        let (field, array) = values_to_array(&name, &full.values()?)?;
        fields.push(field);
        columns.push(array);
    }

    let mut metadata = HashMap::new();
    metadata.insert(
        INDEX_COLUMNS_KEY.to_string(),
        serde_json::to_string(&dims).map_err(|e| Error::value(e.to_string()))?,
    );
    let schema = Arc::new(ArrowSchema::new_with_metadata(fields, metadata));
    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Rebuild a dataset from a RecordBatch produced by `to_record_batch`
/// (or any batch carrying the index-columns metadata). Label
/// combinations absent from the batch fill with the missing-value
/// sentinel.
pub fn from_record_batch(batch: &RecordBatch) -> Result<Dataset> {
    let schema = batch.schema();
    let dims: Vec<String> = match schema.metadata().get(INDEX_COLUMNS_KEY) {
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            Error::value(format!("malformed index-columns metadata: {}", e))
        })?,
        None => Vec::new(),
    };

    // factorize each index column into unique labels plus per-row positions
    let mut indexes: Vec<CoordIndex> = Vec::new();
    let mut row_positions: Vec<Vec<usize>> = Vec::new();
    for dim in &dims {
        let (i, _) = schema.column_with_name(dim).ok_or_else(|| {
            Error::key(format!("index column '{}' missing from the batch", dim))
        })?;
        let cells = array_to_values(dim, batch.column(i))?;
        let mut labels: Vec<Value> = Vec::new();
        let mut table: HashMap<Value, usize> = HashMap::new();
        let mut positions = Vec::with_capacity(cells.len());
        for cell in cells {
            let pos = *table.entry(cell.clone()).or_insert_with(|| {
                labels.push(cell);
                labels.len() - 1
            });
            positions.push(pos);
        }
        indexes.push(CoordIndex::new(dim.clone(), labels));
        row_positions.push(positions);
    }

    let shape: Vec<usize> = indexes.iter().map(|i| i.len()).collect();
    let total: usize = shape.iter().product();
    let strides = crate::core::variable::strides(&shape);

    let mut out = Dataset::new();
    for index in &indexes {
        out.insert_variable(
            index.name(),
            index.clone().into_variable(),
            true,
        )?;
    }

    for (i, field) in schema.fields().iter().enumerate() {
        let name = field.name();
        if dims.contains(name) {
            continue;
        }
        let cells = array_to_values(name, batch.column(i))?;
        let var = if dims.is_empty() {
            if cells.len() != 1 {
                return Err(Error::value(format!(
                    "column '{}' has {} rows but the batch carries no index columns",
                    name,
                    cells.len()
                )));
            }
            Variable::scalar(cells.into_iter().next().expect("one cell"))
        } else {
            // scatter rows into the dense block by their label positions
            let mut data = vec![Value::Null; total];
            for (row, cell) in cells.into_iter().enumerate() {
                let mut flat = 0;
                for (axis, positions) in row_positions.iter().enumerate() {
                    flat += positions[row] * strides[axis];
                }
                data[flat] = cell;
            }
            Variable::new(dims.clone(), shape.clone(), data)?
        };
        out.insert_variable(name, var, false)?;
    }
    Ok(out)
}

/// One-column form of `to_record_batch` for a single labeled array.
pub fn to_series(array: &DataArray) -> Result<RecordBatch> {
    to_record_batch(array.dataset())
}

/// Rebuild an array from a batch holding exactly one non-index column.
pub fn from_series(batch: &RecordBatch) -> Result<DataArray> {
    let ds = from_record_batch(batch)?;
    let data_vars = ds.data_var_names();
    match data_vars.as_slice() {
        [name] => ds.get(name),
        other => Err(Error::value(format!(
            "expected exactly one value column, found {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::VarInput;
    use crate::core::value::{float_values, int_values, str_values};

    fn sample() -> Dataset {
        let var = Variable::new(
            vec!["x".into(), "y".into()],
            vec![2, 3],
            float_values((0..6).map(|i| i as f64)),
        )
        .unwrap();
        Dataset::from_parts(
            vec![("var1".into(), var)],
            vec![
                CoordIndex::new("x", str_values(vec!["a", "b"])),
                CoordIndex::new("y", int_values(vec![10, 20, 30])),
            ],
            crate::core::Attrs::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_batch_layout() {
        let batch = to_record_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 6);
        assert_eq!(batch.num_columns(), 3);
        let x = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        // first dimension varies slowest
        assert_eq!(x.value(0), "a");
        assert_eq!(x.value(2), "a");
        assert_eq!(x.value(3), "b");
        assert!(batch
            .schema()
            .metadata()
            .contains_key(INDEX_COLUMNS_KEY));
    }

    #[test]
    fn test_round_trip() {
        let ds = sample();
        let back = from_record_batch(&to_record_batch(&ds).unwrap()).unwrap();
        assert!(back.equals(&ds).unwrap());
    }

    #[test]
    fn test_round_trip_without_explicit_coords() {
        let mut ds = Dataset::new();
        ds.set(
            "v",
            VarInput::Variable(Variable::new_1d("x", int_values(vec![5, 6, 7]))),
        )
        .unwrap();
        let back = from_record_batch(&to_record_batch(&ds).unwrap()).unwrap();
        // the default integer index materializes as a real coordinate
        assert_eq!(
            back.index("x").unwrap().values(),
            &int_values(vec![0, 1, 2])[..]
        );
        assert_eq!(
            back.get("v").unwrap().values().unwrap(),
            int_values(vec![5, 6, 7])
        );
    }

    #[test]
    fn test_series_round_trip() {
        let array = DataArray::new_1d(
            "x",
            float_values(vec![1.5, 2.5]),
            Some(str_values(vec!["p", "q"])),
            Some("temp"),
        )
        .unwrap();
        let back = from_series(&to_series(&array).unwrap()).unwrap();
        assert!(back.equals(&array).unwrap());
        assert_eq!(back.name(), "temp");
    }

    #[test]
    fn test_datetime_column_round_trip() {
        use chrono::NaiveDate;
        let t0 = NaiveDate::from_ymd_opt(2001, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap();
        let array = DataArray::new_1d(
            "time",
            int_values(vec![1, 2]),
            Some(vec![Value::DateTime(t0), Value::DateTime(t0 + chrono::Duration::days(1))]),
            Some("v"),
        )
        .unwrap();
        let back = from_series(&to_series(&array).unwrap()).unwrap();
        assert!(back.equals(&array).unwrap());
    }
}
