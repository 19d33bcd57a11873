use pdp_ingest::io::{list_partitions, read_partition};
use pdp_ingest::testing::*;
use pdp_ingest::{
    ErrorKind, PipelineConfig, RunReport, SkipReason, YearRange, YearStatus, discover_archives,
    run,
};
use std::path::Path;

fn config(input: &Path, output: &Path) -> PipelineConfig {
    PipelineConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        work_dir: Some(output.join("_scratch")),
        chunk_size: 2,
        ..PipelineConfig::default()
    }
}

fn status(report: &RunReport, year: i32) -> &YearStatus {
    &report.outcome(year).expect("outcome for year").status
}

#[test]
fn processes_each_year_into_its_own_partition_tree() -> anyhow::Result<()> {
    let input = TempDirPath::new()?;
    let output = TempDirPath::new()?;
    write_year_archive(input.path(), "PDP2019.zip", SAMPLES_HEADERED, RESULTS_HEADERED)?;
    write_year_archive(input.path(), "pdp_1998_data.zip", SAMPLES_HEADERLESS, RESULTS_HEADERLESS)?;

    let report = run(&config(input.path(), output.path()))?;
    assert_eq!(report.processed(), 2);
    assert_eq!(report.failed(), 0);

    let YearStatus::Processed(stats) = status(&report, 2019) else {
        panic!("2019 not processed: {report:?}");
    };
    assert_eq!(stats.rows, 5);
    assert_eq!(stats.partitions, 3);
    assert_eq!(stats.unmatched_rows, 1);
    assert_eq!(stats.samples, 3);
    assert_eq!(stats.parse_warnings, 1);

    let parts = list_partitions(output.path(), 2019)?;
    assert_eq!(parts.len(), 3);
    assert!(parts[0].ends_with("year=2019/part-000000.parquet"));
    let mut rows = Vec::new();
    for part in &parts {
        rows.extend(read_partition(part)?);
    }
    assert_eq!(rows.len(), 5);
    assert_flag_invariants(&rows);
    assert_eq!(rows[2].state.as_deref(), Some("NY"));
    assert_eq!(rows[2].above_tolerance, Some(true));

    let old: Vec<_> = list_partitions(output.path(), 1998)?
        .iter()
        .map(read_partition)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(old.len(), 3);
    assert!(old.iter().all(|r| r.above_tolerance.is_none()));
    assert_eq!(old[0].site.as_deref(), Some("S01"));

    // scratch directories are cleaned up
    let scratch = output.file_path("_scratch");
    assert_eq!(std::fs::read_dir(scratch)?.count(), 0);
    Ok(())
}

#[test]
fn failures_and_skips_do_not_stop_other_years() -> anyhow::Result<()> {
    let input = TempDirPath::new()?;
    let output = TempDirPath::new()?;
    write_year_archive(input.path(), "2010.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;
    write_corrupt_archive(input.path(), "2011.zip")?;
    ArchiveBuilder::new()
        .file("samples.txt", SCENARIO_SAMPLES)
        .write(input.file_path("2012.zip"))?;
    write_year_archive(input.path(), "latest.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;

    let report = run(&config(input.path(), output.path()))?;
    assert!(matches!(status(&report, 2010), YearStatus::Processed(_)));
    assert!(matches!(
        status(&report, 2011),
        YearStatus::Failed {
            kind: ErrorKind::Archive,
            ..
        }
    ));
    assert!(matches!(
        status(&report, 2012),
        YearStatus::Failed {
            kind: ErrorKind::Schema,
            ..
        }
    ));
    let undated = report.outcomes.last().expect("undated outcome");
    assert_eq!(undated.year, None);
    assert_eq!(
        undated.status,
        YearStatus::Skipped {
            reason: SkipReason::NoYear
        }
    );
    assert_eq!((report.processed(), report.failed(), report.skipped()), (1, 2, 1));
    Ok(())
}

#[test]
fn expected_years_and_duplicate_archives_are_reported() -> anyhow::Result<()> {
    let input = TempDirPath::new()?;
    let output = TempDirPath::new()?;
    write_year_archive(input.path(), "a_2001.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;
    write_year_archive(input.path(), "b_2001.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;
    write_year_archive(input.path(), "1990.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;

    let cfg = PipelineConfig {
        expected_years: Some(YearRange {
            from: 2000,
            to: 2002,
        }),
        ..config(input.path(), output.path())
    };
    let report = run(&cfg)?;

    let for_year = |y: i32| -> Vec<&YearStatus> {
        report
            .outcomes
            .iter()
            .filter(|o| o.year == Some(y))
            .map(|o| &o.status)
            .collect()
    };
    assert_eq!(
        for_year(1990),
        vec![&YearStatus::Skipped {
            reason: SkipReason::OutsideRange
        }]
    );
    assert_eq!(
        for_year(2000),
        vec![&YearStatus::Skipped {
            reason: SkipReason::NoArchive
        }]
    );
    let y2001 = for_year(2001);
    assert_eq!(y2001.len(), 2);
    assert!(y2001.iter().any(|s| matches!(s, YearStatus::Processed(_))));
    assert!(y2001.contains(&&YearStatus::Skipped {
        reason: SkipReason::DuplicateYear
    }));
    assert!(!output.file_path("year=1990").exists());
    Ok(())
}

#[test]
fn rerun_requires_overwrite_and_reproduces_partitions() -> anyhow::Result<()> {
    let input = TempDirPath::new()?;
    let output = TempDirPath::new()?;
    write_year_archive(input.path(), "PDP2019.zip", SAMPLES_HEADERED, &results_text("A1", 7))?;
    let cfg = config(input.path(), output.path());

    let first = run(&cfg)?;
    let first_rows: Vec<usize> = list_partitions(output.path(), 2019)?
        .iter()
        .map(|p| read_partition(p).map(|r| r.len()))
        .collect::<Result<_, _>>()?;
    assert_eq!(first_rows, vec![2, 2, 2, 1]);

    let blocked = run(&cfg)?;
    assert!(matches!(
        status(&blocked, 2019),
        YearStatus::Failed {
            kind: ErrorKind::Output,
            ..
        }
    ));
    assert_eq!(list_partitions(output.path(), 2019)?.len(), 4);

    let again = run(&PipelineConfig {
        overwrite: true,
        ..cfg.clone()
    })?;
    let again_rows: Vec<usize> = list_partitions(output.path(), 2019)?
        .iter()
        .map(|p| read_partition(p).map(|r| r.len()))
        .collect::<Result<_, _>>()?;
    assert_eq!(again_rows, first_rows);
    assert_eq!(status(&first, 2019), status(&again, 2019));
    Ok(())
}

#[test]
fn parallel_years_match_sequential_output() -> anyhow::Result<()> {
    let input = TempDirPath::new()?;
    for year in 2013..=2016 {
        write_year_archive(
            input.path(),
            &format!("PDP{year}.zip"),
            SAMPLES_HEADERED,
            RESULTS_HEADERED,
        )?;
    }
    let seq_out = TempDirPath::new()?;
    let par_out = TempDirPath::new()?;

    let sequential = run(&config(input.path(), seq_out.path()))?;
    let parallel = run(&PipelineConfig {
        parallel: true,
        threads: Some(3),
        ..config(input.path(), par_out.path())
    })?;

    assert_eq!(parallel.processed(), 4);
    for year in 2013..=2016 {
        assert_eq!(status(&sequential, year), status(&parallel, year));
        let a = list_partitions(seq_out.path(), year)?;
        let b = list_partitions(par_out.path(), year)?;
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(&b) {
            assert_eq!(read_partition(pa)?, read_partition(pb)?);
        }
    }
    Ok(())
}

#[test]
fn discovery_is_sorted_and_missing_input_is_empty() -> anyhow::Result<()> {
    let input = TempDirPath::new()?;
    write_text(input.path(), "notes.txt", "x")?;
    write_year_archive(input.path(), "2003.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;
    write_year_archive(input.path(), "2001.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;
    let cfg = config(input.path(), input.path());
    let found = discover_archives(&cfg)?;
    assert_eq!(found.len(), 2);
    assert!(found[0].ends_with("2001.zip"));

    let missing = config(&input.file_path("nope"), input.path());
    assert!(discover_archives(&missing)?.is_empty());
    let report = run(&missing)?;
    assert!(report.outcomes.is_empty());
    Ok(())
}

#[test]
fn report_serializes_to_json() -> anyhow::Result<()> {
    let input = TempDirPath::new()?;
    let output = TempDirPath::new()?;
    write_year_archive(input.path(), "2010.zip", SCENARIO_SAMPLES, SCENARIO_RESULTS)?;
    write_corrupt_archive(input.path(), "2011.zip")?;

    let report = run(&config(input.path(), output.path()))?;
    let path = output.file_path("report.json");
    report.save_to_file(&path)?;

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let outcomes = value["outcomes"].as_array().expect("outcomes array");
    assert_eq!(outcomes[0]["year"], 2010);
    assert_eq!(outcomes[0]["status"], "processed");
    assert_eq!(outcomes[0]["rows"], 2);
    assert_eq!(outcomes[1]["status"], "failed");
    assert_eq!(outcomes[1]["kind"], "archive");

    let back: RunReport = serde_json::from_value(value)?;
    assert_eq!(back, report);
    Ok(())
}
