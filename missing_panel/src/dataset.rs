//! Helpers for moving between polars frames and plain numeric columns.
//!
//! Every stage reads its inputs through [`numeric_column`] and writes new
//! frames; no helper mutates the frame it was given.

use crate::AnalysisError;
use polars::prelude::*;

fn is_numeric_dtype(dtype: &DataType) -> bool {
    dtype.is_numeric() || matches!(dtype, DataType::Boolean | DataType::Null)
}

/// Extracts a column as `f64` values, mapping nulls and `NaN`s to `None`.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, AnalysisError> {
    let column = df
        .column(name)
        .map_err(|_| AnalysisError::ColumnNotFound(name.to_string()))?;
    if !is_numeric_dtype(column.dtype()) {
        return Err(AnalysisError::NonNumericColumn(name.to_string()));
    }
    let cast = column.cast(&DataType::Float64)?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Extracts several columns at once, in the given order.
pub fn numeric_columns(
    df: &DataFrame,
    names: &[String],
) -> Result<Vec<Vec<Option<f64>>>, AnalysisError> {
    names.iter().map(|n| numeric_column(df, n)).collect()
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Names of the columns that can be read as numbers, in frame order,
/// skipping the names in `exclude`.
pub fn numeric_column_names(df: &DataFrame, exclude: &[String]) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| is_numeric_dtype(c.dtype()))
        .map(|c| c.name().to_string())
        .filter(|name| !exclude.contains(name))
        .collect()
}

/// Fails with `ColumnNotFound` for the first missing column.
pub fn ensure_columns(df: &DataFrame, names: &[String]) -> Result<(), AnalysisError> {
    for name in names {
        if df.column(name).is_err() {
            return Err(AnalysisError::ColumnNotFound(name.clone()));
        }
    }
    Ok(())
}

/// Builds a nullable `Float64` column.
pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::from(Series::new(name.into(), values))
}

/// Returns a copy of `df` where each named column is replaced (or appended)
/// with the given values.
pub fn with_columns(
    df: &DataFrame,
    columns: Vec<(String, Vec<Option<f64>>)>,
) -> Result<DataFrame, AnalysisError> {
    let mut out = df.clone();
    for (name, values) in columns {
        out.with_column(float_column(&name, values))?;
    }
    Ok(out)
}

/// Returns a copy of `df` without the named columns. Names that are not
/// present are ignored.
pub fn without_columns(df: &DataFrame, names: &[String]) -> Result<DataFrame, AnalysisError> {
    let keep: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| !names.contains(c))
        .collect();
    Ok(df.select(keep)?)
}

/// Keeps the rows whose `mask` entry is `true`.
pub fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame, AnalysisError> {
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    Ok(df.filter(&mask)?)
}

/// Row positions of the two groups defined by a 0/1 column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySplit {
    pub group0: Vec<usize>,
    pub group1: Vec<usize>,
    /// Rows whose grouping value is missing.
    pub excluded: Vec<usize>,
}

/// Splits row positions by a strictly binary column.
///
/// Missing grouping values are excluded from both groups. Any value other than
/// 0 or 1, or a group without rows, is an `InvalidGrouping` error.
pub fn split_binary(values: &[Option<f64>], column: &str) -> Result<BinarySplit, AnalysisError> {
    let mut split = BinarySplit {
        group0: Vec::new(),
        group1: Vec::new(),
        excluded: Vec::new(),
    };
    for (i, v) in values.iter().enumerate() {
        match v {
            Some(x) if *x == 0.0 => split.group0.push(i),
            Some(x) if *x == 1.0 => split.group1.push(i),
            Some(x) => {
                return Err(AnalysisError::InvalidGrouping {
                    column: column.to_string(),
                    reason: format!("value {} at row {} is not 0 or 1", x, i),
                })
            }
            None => split.excluded.push(i),
        }
    }
    if split.group0.is_empty() || split.group1.is_empty() {
        return Err(AnalysisError::InvalidGrouping {
            column: column.to_string(),
            reason: format!(
                "Not enough groups for comparison ({} rows with 0, {} rows with 1)",
                split.group0.len(),
                split.group1.len()
            ),
        });
    }
    Ok(split)
}

/// Gathers the values at the given row positions.
pub fn take(values: &[Option<f64>], rows: &[usize]) -> Vec<Option<f64>> {
    rows.iter().map(|&i| values[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_column_maps_nan_to_missing() {
        let df = df!("a" => &[Some(1.0), None, Some(f64::NAN)]).unwrap();
        assert_eq!(numeric_column(&df, "a").unwrap(), vec![Some(1.0), None, None]);
    }

    #[test]
    fn test_numeric_column_casts_integers() {
        let df = df!("a" => &[1i64, 0, 1]).unwrap();
        assert_eq!(
            numeric_column(&df, "a").unwrap(),
            vec![Some(1.0), Some(0.0), Some(1.0)]
        );
    }

    #[test]
    fn test_numeric_column_errors() {
        let df = df!("s" => &["x", "y"]).unwrap();
        assert!(matches!(
            numeric_column(&df, "s"),
            Err(AnalysisError::NonNumericColumn(_))
        ));
        assert!(matches!(
            numeric_column(&df, "nope"),
            Err(AnalysisError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_numeric_column_names_skips_text_and_excluded() {
        let df = df!(
            "id" => &["a", "b"],
            "x" => &[1.0, 2.0],
            "g" => &[0i32, 1]
        )
        .unwrap();
        assert_eq!(numeric_column_names(&df, &["g".to_string()]), vec!["x"]);
    }

    #[test]
    fn test_split_binary() {
        let values = [Some(1.0), Some(0.0), None, Some(1.0)];
        let split = split_binary(&values, "g").unwrap();
        assert_eq!(split.group0, vec![1]);
        assert_eq!(split.group1, vec![0, 3]);
        assert_eq!(split.excluded, vec![2]);
    }

    #[test]
    fn test_split_binary_rejects_other_values() {
        let values = [Some(1.0), Some(2.0)];
        assert!(matches!(
            split_binary(&values, "g"),
            Err(AnalysisError::InvalidGrouping { .. })
        ));
        let single = [Some(1.0), Some(1.0)];
        assert!(split_binary(&single, "g").is_err());
    }

    #[test]
    fn test_with_columns_does_not_touch_source() {
        let df = df!("a" => &[1.0, 2.0]).unwrap();
        let out = with_columns(&df, vec![("a".to_string(), vec![Some(5.0), None])]).unwrap();
        assert_eq!(numeric_column(&df, "a").unwrap(), vec![Some(1.0), Some(2.0)]);
        assert_eq!(numeric_column(&out, "a").unwrap(), vec![Some(5.0), None]);
    }
}
