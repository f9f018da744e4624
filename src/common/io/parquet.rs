use std::io::Cursor;

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::{ParquetReader, ParquetWriter}};

/// Write Parquet into bytes.
pub(crate) fn write_parquet_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ParquetWriter::new(&mut out)
        .finish(&mut df.clone())
        .context("[io::parquet] Failed to write Parquet to bytes")?;
    Ok(out)
}

/// Read Parquet from bytes.
pub(crate) fn read_parquet_bytes(bytes: &[u8]) -> Result<DataFrame> {
    ParquetReader::new(Cursor::new(bytes))
        .finish()
        .context("[io::parquet] Failed to read Parquet from bytes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn parquet_preserves_dtypes() {
        let df = df!("grid_id" => [1u32, 2], "md_sdbAre" => [Some(1.5f64), None]).unwrap();
        let back = read_parquet_bytes(&write_parquet_bytes(&df).unwrap()).unwrap();
        assert!(back.equals_missing(&df));
    }
}
