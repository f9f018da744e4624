use std::{io::Write, sync::Arc};

use anyhow::{anyhow, Result};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_schema::{Field, Schema};
use bytes::Bytes;
use geo::{LineString, MultiLineString, MultiPolygon};
use geo_traits::to_geo::{ToGeoMultiLineString, ToGeoMultiPolygon};
use geoarrow_array::{
    array::{MultiLineStringArray, MultiPolygonArray},
    builder::{MultiLineStringBuilder, MultiPolygonBuilder},
    GeoArrowArray,
    GeoArrowArrayAccessor,
};
use geoarrow_schema::{Dimension, MultiLineStringType, MultiPolygonType};
use geoparquet::{
    reader::{GeoParquetReaderBuilder, GeoParquetRecordBatchReader},
    writer::{GeoParquetRecordBatchEncoder, GeoParquetWriterOptions},
};
use parquet::{
    arrow::{ArrowWriter, arrow_reader::ParquetRecordBatchReaderBuilder},
    basic::{Compression, ZstdLevel},
    file::{properties::WriterProperties, reader::ChunkReader},
};

/// Write areal geometries to GeoParquet bytes (single `geometry` column).
pub(crate) fn write_polygons_geoparquet_bytes(shapes: &[MultiPolygon<f64>]) -> Result<Vec<u8>> {
    let geom_type = MultiPolygonType::new(Dimension::XY, Default::default());
    let field = geom_type.to_field("geometry", false);

    let mut builder = MultiPolygonBuilder::new(geom_type);
    builder.extend_from_geometry_iter(shapes.iter().map(Some))?;

    let mut out = Vec::new();
    write_geoparquet(&mut out, field, builder.finish().to_array_ref())?;
    Ok(out)
}

/// Write line geometries to GeoParquet bytes (single `geometry` column).
pub(crate) fn write_lines_geoparquet_bytes(lines: &[LineString<f64>]) -> Result<Vec<u8>> {
    let geom_type = MultiLineStringType::new(Dimension::XY, Default::default());
    let field = geom_type.to_field("geometry", false);

    let multi = lines.iter().map(|line| MultiLineString::new(vec![line.clone()])).collect::<Vec<_>>();
    let mut builder = MultiLineStringBuilder::new(geom_type);
    builder.extend_from_geometry_iter(multi.iter().map(Some))?;

    let mut out = Vec::new();
    write_geoparquet(&mut out, field, builder.finish().to_array_ref())?;
    Ok(out)
}

/// Read areal geometries from GeoParquet bytes.
pub(crate) fn read_polygons_geoparquet_bytes(bytes: &[u8]) -> Result<Vec<MultiPolygon<f64>>> {
    read_geoparquet(Bytes::copy_from_slice(bytes), |arr, field, out| {
        out.extend(
            MultiPolygonArray::try_from((arr, field))?
                .iter()
                .filter_map(|opt| opt.and_then(Result::ok))
                .map(|scalar| scalar.to_multi_polygon()),
        );
        Ok(())
    })
}

/// Read line geometries from GeoParquet bytes; multi-part lines keep their first part.
pub(crate) fn read_lines_geoparquet_bytes(bytes: &[u8]) -> Result<Vec<LineString<f64>>> {
    read_geoparquet(Bytes::copy_from_slice(bytes), |arr, field, out| {
        out.extend(
            MultiLineStringArray::try_from((arr, field))?
                .iter()
                .filter_map(|opt| opt.and_then(Result::ok))
                .map(|scalar| scalar.to_multi_line_string().0.into_iter().next()
                    .unwrap_or_else(|| LineString::new(vec![]))),
        );
        Ok(())
    })
}

/// Internal helper: write a single geometry column to any ArrowWriter-compatible sink.
fn write_geoparquet<W: Write + Send>(writer: W, field: Field, column: ArrayRef) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![field]));
    let batch = RecordBatch::try_new(schema.clone(), vec![column])?;

    let gp_opts = GeoParquetWriterOptions::default();
    let mut gp_encoder = GeoParquetRecordBatchEncoder::try_new(schema.as_ref(), &gp_opts)?;

    let writer_props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(4)?))
        .build();

    let mut writer = ArrowWriter::try_new(writer, gp_encoder.target_schema(), Some(writer_props))?;

    let encoded = gp_encoder.encode_record_batch(&batch)?;
    writer.write(&encoded)?;

    writer.append_key_value_metadata(gp_encoder.into_keyvalue()?);
    writer.finish()?;
    Ok(())
}

/// Internal helper: read the first (geometry) column from any ChunkReader-compatible source.
fn read_geoparquet<R, T, F>(reader: R, mut convert: F) -> Result<Vec<T>>
where
    R: ChunkReader + 'static,
    F: FnMut(&dyn Array, &Field, &mut Vec<T>) -> Result<()>,
{
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader)?;

    let gp_meta = builder
        .geoparquet_metadata()
        .ok_or_else(|| anyhow!("[io::geoparquet] Not a GeoParquet file (missing 'geo' metadata)"))??;

    let ga_schema =
        builder.geoarrow_schema(&gp_meta, /*parse_to_geoarrow=*/ true, Default::default())?;

    let parquet_reader = builder.with_batch_size(64 * 1024).build()?;
    let geo_reader = GeoParquetRecordBatchReader::try_new(parquet_reader, ga_schema)?;

    let mut out = Vec::new();
    for batch in geo_reader {
        let batch = batch?;

        // Avoid borrowing from a temporary Arc<Schema>.
        let schema = batch.schema();
        convert(batch.column(0).as_ref(), schema.field(0), &mut out)?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn polygons_round_trip() {
        let shapes = vec![
            MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)]]),
            MultiPolygon::new(vec![polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 7.0), (x: 5.0, y: 5.0)]]),
        ];
        let bytes = write_polygons_geoparquet_bytes(&shapes).unwrap();
        assert_eq!(read_polygons_geoparquet_bytes(&bytes).unwrap(), shapes);
    }

    #[test]
    fn lines_round_trip() {
        let lines = vec![
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]),
            LineString::from(vec![(0.0, 5.0), (3.0, 6.0), (10.0, 5.0)]),
        ];
        let bytes = write_lines_geoparquet_bytes(&lines).unwrap();
        assert_eq!(read_lines_geoparquet_bytes(&bytes).unwrap(), lines);
    }
}
