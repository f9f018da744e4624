use anyhow::{anyhow, Context, Result};
use polars::prelude::{DataFrame, DataType, Column};

fn typed_column(df: &DataFrame, name: &str, dtype: &DataType) -> Result<Column> {
    df.column(name)
        .with_context(|| format!("[frame] missing column '{name}'"))?
        .cast(dtype)
        .with_context(|| format!("[frame] column '{name}' cannot be read as {dtype}"))
}

/// Non-null `u32` values of column `name` (CSV round trips widen integers, so values are cast).
pub(crate) fn u32_column(df: &DataFrame, name: &str) -> Result<Vec<u32>> {
    opt_u32_column(df, name)?.into_iter()
        .map(|v| v.ok_or_else(|| anyhow!("[frame] null value in column '{name}'")))
        .collect()
}

pub(crate) fn opt_u32_column(df: &DataFrame, name: &str) -> Result<Vec<Option<u32>>> {
    let col = typed_column(df, name, &DataType::UInt32)?;
    Ok(col.as_materialized_series().u32()?.into_iter().collect())
}

pub(crate) fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = typed_column(df, name, &DataType::Float64)?;
    Ok(col.as_materialized_series().f64()?.into_iter().collect())
}

pub(crate) fn opt_str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = typed_column(df, name, &DataType::String)?;
    Ok(col.as_materialized_series().str()?.into_iter().map(|v| v.map(String::from)).collect())
}
