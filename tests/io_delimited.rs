use pdp_ingest::config::HeaderMode;
use pdp_ingest::io::{ChunkedReader, DelimitedOptions, read_frame};
use pdp_ingest::schema::{RESULTS_LAYOUT, SAMPLES_LAYOUT};
use pdp_ingest::standardize::{standardize_results, standardize_samples};
use pdp_ingest::testing::*;

#[test]
fn headered_file_uses_its_own_columns() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = write_text(dir.path(), "samples.txt", SAMPLES_HEADERED)?;
    let frame = read_frame(&path, DelimitedOptions::default(), SAMPLES_LAYOUT)?;
    assert_eq!(frame.columns()[0], "SAMPLE_PK");
    assert_eq!(frame.len(), 3);
    // trailing empty VARIETY reads as absent
    assert_eq!(frame.cell(1, Some(10)), None);
    Ok(())
}

#[test]
fn headerless_file_takes_the_dictionary_layout() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let samples = write_text(dir.path(), "samples.txt", SAMPLES_HEADERLESS)?;
    let results = write_text(dir.path(), "results.txt", RESULTS_HEADERLESS)?;

    let frame = read_frame(&samples, DelimitedOptions::default(), SAMPLES_LAYOUT)?;
    assert_eq!(frame.len(), 2);
    let recs = standardize_samples(&frame).records;
    assert_eq!(recs[0].sample_key, "A1");
    assert_eq!(recs[0].site.as_deref(), Some("S01"));
    assert_eq!(recs[1].variety, None);
    assert_eq!(recs[1].distst.as_deref(), Some("NY"));

    let frame = read_frame(&results, DelimitedOptions::default(), RESULTS_LAYOUT)?;
    let recs = standardize_results(&frame).records;
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[1].confmethod.as_deref(), Some("GC"));
    // short row: everything after CONUNIT is absent
    assert_eq!(recs[2].determin, None);
    assert_eq!(recs[2].conunit.as_deref(), Some("M"));
    assert!(recs.iter().all(|r| r.above_tolerance.is_none()));
    Ok(())
}

#[test]
fn forced_header_modes_override_detection() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = write_text(dir.path(), "r.txt", "KEY|VAL\nA|1\n")?;

    let present = DelimitedOptions {
        header: HeaderMode::Present,
        ..DelimitedOptions::default()
    };
    let frame = read_frame(&path, present, RESULTS_LAYOUT)?;
    assert_eq!(frame.columns().to_vec(), vec!["KEY", "VAL"]);
    assert_eq!(frame.len(), 1);

    let auto = read_frame(&path, DelimitedOptions::default(), RESULTS_LAYOUT)?;
    assert_eq!(auto.columns()[0], "SAMPLE_PK");
    assert_eq!(auto.len(), 2);
    Ok(())
}

#[test]
fn chunks_are_bounded_and_cover_every_row() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = write_text(dir.path(), "results.txt", &results_text("K", 10))?;
    let reader = ChunkedReader::open(&path, DelimitedOptions::default(), RESULTS_LAYOUT, 4)?;
    assert_eq!(reader.columns()[2], "CONCEN");

    let sizes: Vec<usize> = reader
        .map(|chunk| chunk.map(|f| f.len()))
        .collect::<Result<_, _>>()?;
    assert_eq!(sizes, vec![4, 4, 2]);
    Ok(())
}

#[test]
fn stray_quotes_and_latin1_bytes_do_not_break_rows() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("results.txt");
    let mut bytes = b"SAMPLE_PK|PESTNAME|CONCEN\nA|6\" \"bad|0.1\nB|Ca\xf1a|0.2\n".to_vec();
    bytes.extend_from_slice(b"C||0.3\n");
    std::fs::write(&path, bytes)?;

    let frame = read_frame(&path, DelimitedOptions::default(), RESULTS_LAYOUT)?;
    assert_eq!(frame.len(), 3);
    let recs = standardize_results(&frame).records;
    assert_eq!(recs[0].concen, Some(0.1));
    assert_eq!(recs[0].pestname.as_deref(), Some("6\" \"bad"));
    assert!(recs[1].pestname.as_deref().is_some_and(|n| n.starts_with("Ca")));
    assert_eq!(recs[2].pestname, None);
    Ok(())
}

#[test]
fn empty_file_reads_as_no_chunks() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = write_text(dir.path(), "results.txt", "")?;
    let reader = ChunkedReader::open(&path, DelimitedOptions::default(), RESULTS_LAYOUT, 10)?;
    assert_eq!(reader.count(), 0);
    Ok(())
}
