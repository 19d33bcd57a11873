use arrow::datatypes::DataType;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pdp_ingest::config::OutputCompression;
use pdp_ingest::engine::{JoinedRecord, PartitionSink, SampleTable, join_chunk, process};
use pdp_ingest::io::{ParquetPartitionWriter, list_partitions, read_partition, year_dir};
use pdp_ingest::standardize::{SampleRecord, standardize_results, standardize_samples};
use pdp_ingest::testing::*;
use pdp_ingest::PipelineError;
use std::fs::File;

fn scenario_rows(year: i32) -> Vec<JoinedRecord> {
    let (samples, results) = scenario_frames();
    let table = SampleTable::new(standardize_samples(&samples).records);
    join_chunk(year, &table, standardize_results(&results).records)
}

#[test]
fn scenario_survives_a_parquet_roundtrip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut writer =
        ParquetPartitionWriter::create(tmp.path(), 2020, OutputCompression::Snappy, false)?;
    let rows = scenario_rows(2020);
    let written = writer.write_partition(0, &rows)?;

    assert_eq!(written.rows, 2);
    assert_eq!(written.path, year_dir(tmp.path(), 2020).join("part-000000.parquet"));
    assert!(!written.path.with_extension("parquet.tmp").exists());

    let back = read_partition(&written.path)?;
    assert_eq!(back, rows);
    assert_eq!(back[0].state.as_deref(), Some("CA"));
    assert_eq!(back[0].above_tolerance, Some(false));
    assert_eq!(back[1].state, None);
    assert_eq!(back[1].above_tolerance, Some(true));
    Ok(())
}

#[test]
fn schema_is_fixed_and_typed() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut writer =
        ParquetPartitionWriter::create(tmp.path(), 2011, OutputCompression::Zstd, false)?;
    let table = SampleTable::new(vec![SampleRecord {
        sample_date: NaiveDate::from_ymd_opt(2011, 6, 30),
        ..SampleRecord::keyed("A1")
    }]);
    let (_, results) = scenario_frames();
    let rows = join_chunk(2011, &table, standardize_results(&results).records);
    let written = writer.write_partition(0, &rows)?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&written.path)?)?;
    let schema = builder.schema().clone();
    let dtype = |name: &str| schema.field_with_name(name).map(|f| f.data_type().clone());
    assert_eq!(dtype("year")?, DataType::Int32);
    assert_eq!(dtype("concen")?, DataType::Float64);
    assert_eq!(dtype("above_tolerance")?, DataType::Boolean);
    assert_eq!(dtype("sample_date")?, DataType::Date32);
    assert!(schema.field_with_name("pestname")?.is_nullable());

    let back = read_partition(&written.path)?;
    assert_eq!(back[0].sample_date, NaiveDate::from_ymd_opt(2011, 6, 30));
    assert_eq!(back[1].sample_date, None);
    Ok(())
}

#[test]
fn existing_partitions_fail_unless_overwrite() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    {
        let mut writer =
            ParquetPartitionWriter::create(tmp.path(), 2005, OutputCompression::None, false)?;
        writer.write_partition(0, &scenario_rows(2005))?;
        writer.write_partition(1, &scenario_rows(2005))?;
    }

    let err = ParquetPartitionWriter::create(tmp.path(), 2005, OutputCompression::None, false)
        .err()
        .expect("second create must fail");
    assert!(matches!(err, PipelineError::OutputExists(_)));

    let mut writer =
        ParquetPartitionWriter::create(tmp.path(), 2005, OutputCompression::Gzip, true)?;
    assert!(list_partitions(tmp.path(), 2005)?.is_empty());
    writer.write_partition(0, &scenario_rows(2005))?;
    assert_eq!(list_partitions(tmp.path(), 2005)?.len(), 1);
    Ok(())
}

#[test]
fn stream_writes_numbered_files_in_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = TempDirPath::new()?;
    let path = write_text(dir.path(), "results.txt", &results_text("K1", 25))?;
    let chunks = pdp_ingest::io::ChunkedReader::open(
        &path,
        pdp_ingest::io::DelimitedOptions::default(),
        pdp_ingest::schema::RESULTS_LAYOUT,
        10,
    )?;
    let table = SampleTable::new(vec![SampleRecord::keyed("K1")]);
    let writer = ParquetPartitionWriter::create(tmp.path(), 1997, OutputCompression::Snappy, false)?;

    let written = process(1997, &table, chunks, writer).collect::<Result<Vec<_>, _>>()?;
    assert_contiguous_partitions(&written);

    let parts = list_partitions(tmp.path(), 1997)?;
    assert_eq!(parts.len(), 3);
    let mut counts = Vec::new();
    for part in &parts {
        let rows = read_partition(part)?;
        assert_flag_invariants(&rows);
        assert!(rows.iter().all(|r| r.year == 1997 && r.sample_matched));
        counts.push(rows.len());
    }
    assert_eq!(counts, vec![10, 10, 5]);
    Ok(())
}

#[test]
fn failed_write_leaves_no_tmp_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut writer =
        ParquetPartitionWriter::create(tmp.path(), 2006, OutputCompression::Snappy, false)?;
    // a non-empty directory at the final path makes the rename fail
    let blocker = writer.dir().join("part-000000.parquet");
    std::fs::create_dir_all(blocker.join("occupied"))?;

    let err = writer.write_partition(0, &scenario_rows(2006)).unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }), "{err}");
    assert!(!writer.dir().join("part-000000.parquet.tmp").exists());
    assert!(list_partitions(tmp.path(), 2006)?.is_empty());
    Ok(())
}
