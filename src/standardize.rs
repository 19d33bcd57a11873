//! Schema standardization: raw frames to typed records.
//!
//! Both entry points are pure transforms. They project a [`RawFrame`] onto the
//! canonical allow-list (see [`crate::schema`]), coerce types, and never drop a
//! row because a value failed to coerce: the value becomes absent and a
//! [`ParseWarning`] is recorded instead.
//!
//! Absence is kept distinct from every real value:
//! - text columns are `Option<String>`, never an empty string;
//! - numeric columns are `Option<f64>`, never a substituted zero;
//! - `above_tolerance` is `None` ("unknown") when the year's schema has no
//!   tolerance column at all, which is different from a per-row `Some(false)`.

use crate::schema::{CanonicalColumn, ColumnMap, RawFrame, ResultColumn, SampleColumn};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical sample and its administrative metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_key: String,
    pub state: Option<String>,
    pub commod: Option<String>,
    pub commtype: Option<String>,
    pub origin: Option<String>,
    pub country: Option<String>,
    pub claim: Option<String>,
    pub variety: Option<String>,
    pub sample_date: Option<NaiveDate>,
    pub site: Option<String>,
    pub source_id: Option<String>,
    pub disttype: Option<String>,
    pub quantity: Option<String>,
    pub growst: Option<String>,
    pub packst: Option<String>,
    pub distst: Option<String>,
}

impl SampleRecord {
    /// A record with only the key set.
    #[must_use]
    pub fn keyed(sample_key: impl Into<String>) -> Self {
        Self {
            sample_key: sample_key.into(),
            state: None,
            commod: None,
            commtype: None,
            origin: None,
            country: None,
            claim: None,
            variety: None,
            sample_date: None,
            site: None,
            source_id: None,
            disttype: None,
            quantity: None,
            growst: None,
            packst: None,
            distst: None,
        }
    }
}

/// One analyte measurement, with derived detection flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// `None` when the row carried no key; such rows join as unmatched.
    pub sample_key: Option<String>,
    pub commod: Option<String>,
    pub commtype: Option<String>,
    pub lab: Option<String>,
    pub pestcode: Option<String>,
    pub pestname: Option<String>,
    pub testclass: Option<String>,
    pub concen: Option<f64>,
    pub lod: Option<f64>,
    pub conunit: Option<String>,
    pub confmethod: Option<String>,
    pub confmethod2: Option<String>,
    pub annotate: Option<String>,
    pub quantitate: Option<String>,
    pub mean: Option<String>,
    pub extract: Option<String>,
    pub determin: Option<String>,
    pub epa_tolerance: Option<f64>,
    pub tolerance_unit: Option<String>,
    pub is_non_detect: bool,
    pub is_detect: bool,
    pub above_tolerance: Option<bool>,
}

/// Derived per-row analytical flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionFlags {
    pub is_non_detect: bool,
    pub is_detect: bool,
    /// `None` when the tolerance column is missing from the year's schema.
    pub above_tolerance: Option<bool>,
}

impl DetectionFlags {
    /// `tolerance_known` is whether the schema carries a tolerance column,
    /// not whether this row has a value in it.
    #[must_use]
    pub fn compute(concen: Option<f64>, tolerance: Option<f64>, tolerance_known: bool) -> Self {
        let is_non_detect = concen.is_none_or(|c| c <= 0.0);
        let is_detect = !is_non_detect;
        let above_tolerance = tolerance_known.then(|| match (concen, tolerance) {
            (Some(c), Some(t)) => is_detect && c > t,
            _ => false,
        });
        Self {
            is_non_detect,
            is_detect,
            above_tolerance,
        }
    }
}

/// A recognized cell that failed type coercion and was replaced by "absent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// Row index within the standardized frame.
    pub row: usize,
    pub column: String,
    pub value: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: [{}] unparseable value {:?}", self.row, self.column, self.value)
    }
}

/// Output of a standardization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardized<T> {
    pub records: Vec<T>,
    pub warnings: Vec<ParseWarning>,
    /// Rows that carried no sample key. Samples without one are dropped;
    /// results without one are kept.
    pub missing_key: usize,
}

impl<T> Default for Standardized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
            missing_key: 0,
        }
    }
}

fn text(frame: &RawFrame, row: usize, pos: Option<usize>) -> Option<String> {
    frame
        .cell(row, pos)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a numeric cell. Blank is absent without a warning; anything that is
/// not a finite number is absent with one.
fn numeric<C: CanonicalColumn>(
    frame: &RawFrame,
    row: usize,
    map: &ColumnMap<C>,
    col: C,
    warnings: &mut Vec<ParseWarning>,
) -> Option<f64> {
    let raw = text(frame, row, map.position(col))?;
    match parse_numeric(&raw) {
        Some(v) => Some(v),
        None => {
            warnings.push(ParseWarning {
                row,
                column: col.aliases()[0].to_string(),
                value: raw,
            });
            None
        }
    }
}

#[must_use]
pub fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Sample years outside this range are treated as unparseable.
const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1900..=2099;

/// Expand a two-digit year: `00..=49` is 20xx, `50..=99` is 19xx.
#[must_use]
pub fn expand_year(y: i32) -> i32 {
    match y {
        0..=49 => 2000 + y,
        50..=99 => 1900 + y,
        _ => y,
    }
}

#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn sample_date(
    frame: &RawFrame,
    row: usize,
    map: &ColumnMap<SampleColumn>,
    warnings: &mut Vec<ParseWarning>,
) -> Option<NaiveDate> {
    if let Some(raw) = text(frame, row, map.position(SampleColumn::SampleDate)) {
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            warnings.push(ParseWarning {
                row,
                column: SampleColumn::SampleDate.aliases()[0].to_string(),
                value: raw,
            });
        }
        return parsed;
    }

    let year = text(frame, row, map.position(SampleColumn::Year))?;
    let month = text(frame, row, map.position(SampleColumn::Month))?;
    let day = text(frame, row, map.position(SampleColumn::Day))?;
    let date = match (
        year.parse::<i32>(),
        month.parse::<u32>(),
        day.parse::<u32>(),
    ) {
        (Ok(y), Ok(m), Ok(d)) => Some(expand_year(y))
            .filter(|y| PLAUSIBLE_YEARS.contains(y))
            .and_then(|y| NaiveDate::from_ymd_opt(y, m, d)),
        _ => None,
    };
    if date.is_none() {
        warnings.push(ParseWarning {
            row,
            column: "YEAR/MONTH/DAY".to_string(),
            value: format!("{year}/{month}/{day}"),
        });
    }
    date
}

/// Project a raw samples frame onto [`SampleRecord`]s.
///
/// Unrecognized columns are ignored. Rows without a sample key are dropped and
/// counted in [`Standardized::missing_key`].
#[must_use]
pub fn standardize_samples(frame: &RawFrame) -> Standardized<SampleRecord> {
    let map = ColumnMap::<SampleColumn>::resolve(frame.columns());
    let mut out = Standardized {
        records: Vec::with_capacity(frame.len()),
        ..Standardized::default()
    };
    let key_pos = map.position(SampleColumn::SampleKey);

    for row in 0..frame.len() {
        let Some(sample_key) = text(frame, row, key_pos) else {
            out.missing_key += 1;
            continue;
        };
        let t = |col: SampleColumn| text(frame, row, map.position(col));
        let sample_date = sample_date(frame, row, &map, &mut out.warnings);
        out.records.push(SampleRecord {
            sample_key,
            state: t(SampleColumn::State),
            commod: t(SampleColumn::Commod),
            commtype: t(SampleColumn::CommType),
            origin: t(SampleColumn::Origin),
            country: t(SampleColumn::Country),
            claim: t(SampleColumn::Claim),
            variety: t(SampleColumn::Variety),
            sample_date,
            site: t(SampleColumn::Site),
            source_id: t(SampleColumn::SourceId),
            disttype: t(SampleColumn::DistType),
            quantity: t(SampleColumn::Quantity),
            growst: t(SampleColumn::GrowSt),
            packst: t(SampleColumn::PackSt),
            distst: t(SampleColumn::DistSt),
        });
    }
    out
}

/// Project a raw results frame onto [`ResultRecord`]s and derive flags.
///
/// If the frame has no tolerance column, every row's `above_tolerance` is
/// `None`. Rows without a sample key are kept with `sample_key: None` and
/// counted in [`Standardized::missing_key`].
#[must_use]
pub fn standardize_results(frame: &RawFrame) -> Standardized<ResultRecord> {
    let map = ColumnMap::<ResultColumn>::resolve(frame.columns());
    let tolerance_known = map.has(ResultColumn::Tolerance);
    let mut out = Standardized {
        records: Vec::with_capacity(frame.len()),
        ..Standardized::default()
    };
    let key_pos = map.position(ResultColumn::SampleKey);

    for row in 0..frame.len() {
        let sample_key = text(frame, row, key_pos);
        if sample_key.is_none() {
            out.missing_key += 1;
        }
        let t = |col: ResultColumn| text(frame, row, map.position(col));
        let concen = numeric(frame, row, &map, ResultColumn::Concen, &mut out.warnings);
        let lod = numeric(frame, row, &map, ResultColumn::Lod, &mut out.warnings);
        let epa_tolerance = numeric(frame, row, &map, ResultColumn::Tolerance, &mut out.warnings);
        let flags = DetectionFlags::compute(concen, epa_tolerance, tolerance_known);

        out.records.push(ResultRecord {
            sample_key,
            commod: t(ResultColumn::Commod),
            commtype: t(ResultColumn::CommType),
            lab: t(ResultColumn::Lab),
            pestcode: t(ResultColumn::PestCode),
            pestname: t(ResultColumn::PestName),
            testclass: t(ResultColumn::TestClass),
            concen,
            lod,
            conunit: t(ResultColumn::ConUnit),
            confmethod: t(ResultColumn::ConfMethod),
            confmethod2: t(ResultColumn::ConfMethod2),
            annotate: t(ResultColumn::Annotate),
            quantitate: t(ResultColumn::Quantitate),
            mean: t(ResultColumn::Mean),
            extract: t(ResultColumn::Extract),
            determin: t(ResultColumn::Determin),
            epa_tolerance,
            tolerance_unit: t(ResultColumn::ToleranceUnit),
            is_non_detect: flags.is_non_detect,
            is_detect: flags.is_detect,
            above_tolerance: flags.above_tolerance,
        });
    }
    out
}
