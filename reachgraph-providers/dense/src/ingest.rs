//! Validation and copying of `FixedSizeList<Float32, D>` columns.
use arrow_array::{Array, FixedSizeListArray, Float32Array};
use arrow_schema::{DataType, Field};

use crate::errors::DenseMatrixError;

/// Checks a schema field and returns its row width.
pub(crate) fn validate_field(field: &Field, column: &str) -> Result<usize, DenseMatrixError> {
    let DataType::FixedSizeList(child, width) = field.data_type() else {
        return Err(DenseMatrixError::InvalidColumnType {
            column: column.to_owned(),
            actual: field.data_type().clone(),
        });
    };
    if field.is_nullable() || child.is_nullable() {
        return Err(DenseMatrixError::NullableField {
            column: column.to_owned(),
            nullable_child: child.is_nullable(),
        });
    }
    if child.data_type() != &DataType::Float32 {
        return Err(DenseMatrixError::InvalidListValueType {
            actual: child.data_type().clone(),
        });
    }
    dimension_of(*width)
}

fn dimension_of(width: i32) -> Result<usize, DenseMatrixError> {
    match usize::try_from(width) {
        Ok(dimension) if dimension > 0 => Ok(dimension),
        _ => Err(DenseMatrixError::InvalidDimension { actual: width }),
    }
}

/// Appends the rows of `array` to `out` and returns their width.
///
/// `start_row` offsets the row numbers reported in errors so callers reading
/// several batches get absolute positions.
pub(crate) fn append_rows(
    array: &FixedSizeListArray,
    expected_dimension: Option<usize>,
    start_row: usize,
    out: &mut Vec<f32>,
) -> Result<usize, DenseMatrixError> {
    let value_type = array.value_type();
    if value_type != DataType::Float32 {
        return Err(DenseMatrixError::InvalidListValueType { actual: value_type });
    }
    let dimension = dimension_of(array.value_length())?;
    if let Some(expected) = expected_dimension.filter(|&expected| expected != dimension) {
        return Err(DenseMatrixError::InconsistentBatchDimension {
            expected,
            actual: dimension,
        });
    }
    let floats = array
        .values()
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| DenseMatrixError::InvalidListValueType {
            actual: array.values().data_type().clone(),
        })?;

    let rows = array.len();
    let additional = rows
        .checked_mul(dimension)
        .ok_or(DenseMatrixError::CapacityOverflow { rows, dimension })?;
    out.reserve(additional);

    for row in 0..rows {
        let absolute_row = start_row + row;
        if array.is_null(row) {
            return Err(DenseMatrixError::NullRow { row: absolute_row });
        }
        let start = usize::try_from(array.value_offset(row)).map_err(|_| {
            DenseMatrixError::InvalidDimension {
                actual: array.value_offset(row),
            }
        })?;
        let end = start + dimension;
        if let Some(value_index) = (start..end).position(|index| floats.is_null(index)) {
            return Err(DenseMatrixError::NullValue {
                row: absolute_row,
                value_index,
            });
        }
        let values = floats
            .values()
            .get(start..end)
            .ok_or(DenseMatrixError::CapacityOverflow { rows, dimension })?;
        out.extend_from_slice(values);
    }
    Ok(dimension)
}
