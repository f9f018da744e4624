use std::io::Cursor;

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::{SerReader, SerWriter}, prelude::{CsvReader, CsvWriter}};

/// Write DataFrame to CSV bytes.
pub(crate) fn write_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(&mut df.clone())
        .context("[io::csv] Failed to write CSV to bytes")?;
    Ok(out)
}

/// Read DataFrame from CSV bytes.
pub(crate) fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    CsvReader::new(Cursor::new(bytes))
        .finish()
        .context("[io::csv] Failed to read CSV from bytes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn csv_round_trip() {
        let df = df!("uID" => [0u32, 1, 2], "sdbAre" => [10.5f64, 20.0, 30.25]).unwrap();
        let back = read_csv_bytes(&write_csv_bytes(&df).unwrap()).unwrap();
        assert_eq!(back.height(), 3);
        let area = back.column("sdbAre").unwrap().cast(&DataType::Float64).unwrap();
        assert_eq!(area.f64().unwrap().get(2), Some(30.25));
    }
}
