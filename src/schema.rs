//! Canonical column sets and name resolution.
//!
//! Yearly files do not agree on their columns: some years add a tolerance or
//! analyte name column, some headers use different spellings. Instead of
//! probing a frame for attributes at runtime, each standardizer resolves a
//! [`ColumnMap`] once per frame: for every canonical column, the position of
//! the first source column whose normalized name is one of its aliases.
//! Unrecognized source columns are simply never looked at.

use std::marker::PhantomData;

/// Column layout of a headerless samples file (PDP data dictionary order).
pub const SAMPLES_LAYOUT: &[&str] = &[
    "SAMPLE_PK", "STATE", "YEAR", "MONTH", "DAY", "SITE", "COMMOD", "SOURCE_ID", "VARIETY",
    "ORIGIN", "COUNTRY", "DISTTYPE", "COMMTYPE", "CLAIM", "QUANTITY", "GROWST", "PACKST",
    "DISTST",
];

/// Column layout of a headerless results file (PDP data dictionary order).
pub const RESULTS_LAYOUT: &[&str] = &[
    "SAMPLE_PK", "COMMOD", "COMMTYPE", "LAB", "PESTCODE", "TESTCLASS", "CONCEN", "LOD",
    "CONUNIT", "CONFMETHOD", "CONFMETHOD2", "ANNOTATE", "QUANTITATE", "MEAN", "EXTRACT",
    "DETERMIN",
];

const SAMPLE_KEY_ALIASES: &[&str] = &["SAMPLE_PK", "SAMPLE_KEY", "SAMPLEPK", "SAMPLE_ID"];

/// An untyped batch of rows as read from a delimited file.
///
/// Cells are `None` when the field was missing or blank; a present cell is
/// never an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawFrame {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Build a frame from string literals; blank cells become `None`.
    #[must_use]
    pub fn from_strs(columns: &[&str], rows: &[&[&str]]) -> Self {
        let columns = columns.iter().map(|c| (*c).to_string()).collect();
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| normalize_cell(c)).collect())
            .collect();
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<Option<String>>> {
        self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `(row, col)`; out-of-range columns (short rows) read as absent.
    #[must_use]
    pub fn cell(&self, row: usize, col: Option<usize>) -> Option<&str> {
        let col = col?;
        self.rows.get(row)?.get(col)?.as_deref()
    }
}

/// Trim a raw field; blank fields are absent.
#[must_use]
pub fn normalize_cell(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Header normalization: trimmed, upper-cased, spaces and dashes folded to `_`.
#[must_use]
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// `true` when any of `fields` names the sample key column.
pub fn names_sample_key<'a>(fields: impl IntoIterator<Item = &'a str>) -> bool {
    fields
        .into_iter()
        .any(|f| SAMPLE_KEY_ALIASES.contains(&normalize_header(f).as_str()))
}

/// A closed set of canonical columns with accepted header spellings.
pub trait CanonicalColumn: Copy + 'static {
    const ALL: &'static [Self];

    fn index(self) -> usize;

    /// Accepted normalized header names, preferred spelling first.
    fn aliases(self) -> &'static [&'static str];
}

/// Positions of canonical columns within one frame's column list.
#[derive(Debug, Clone)]
pub struct ColumnMap<C> {
    positions: Vec<Option<usize>>,
    _columns: PhantomData<C>,
}

impl<C: CanonicalColumn> ColumnMap<C> {
    #[must_use]
    pub fn resolve(columns: &[String]) -> Self {
        let normalized: Vec<String> = columns.iter().map(|c| normalize_header(c)).collect();
        let mut positions = vec![None; C::ALL.len()];
        for &col in C::ALL {
            positions[col.index()] = normalized
                .iter()
                .position(|name| col.aliases().contains(&name.as_str()));
        }
        Self {
            positions,
            _columns: PhantomData,
        }
    }

    #[must_use]
    pub fn position(&self, col: C) -> Option<usize> {
        self.positions[col.index()]
    }

    #[must_use]
    pub fn has(&self, col: C) -> bool {
        self.position(col).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleColumn {
    SampleKey,
    State,
    Year,
    Month,
    Day,
    SampleDate,
    Site,
    Commod,
    SourceId,
    Variety,
    Origin,
    Country,
    DistType,
    CommType,
    Claim,
    Quantity,
    GrowSt,
    PackSt,
    DistSt,
}

impl CanonicalColumn for SampleColumn {
    const ALL: &'static [Self] = &[
        Self::SampleKey,
        Self::State,
        Self::Year,
        Self::Month,
        Self::Day,
        Self::SampleDate,
        Self::Site,
        Self::Commod,
        Self::SourceId,
        Self::Variety,
        Self::Origin,
        Self::Country,
        Self::DistType,
        Self::CommType,
        Self::Claim,
        Self::Quantity,
        Self::GrowSt,
        Self::PackSt,
        Self::DistSt,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::SampleKey => SAMPLE_KEY_ALIASES,
            Self::State => &["STATE"],
            Self::Year => &["YEAR"],
            Self::Month => &["MONTH"],
            Self::Day => &["DAY"],
            Self::SampleDate => &["SAMPLE_DATE", "SAMPDATE", "DATE"],
            Self::Site => &["SITE"],
            Self::Commod => &["COMMOD", "COMMODITY"],
            Self::SourceId => &["SOURCE_ID", "SOURCEID"],
            Self::Variety => &["VARIETY"],
            Self::Origin => &["ORIGIN"],
            Self::Country => &["COUNTRY"],
            Self::DistType => &["DISTTYPE"],
            Self::CommType => &["COMMTYPE"],
            Self::Claim => &["CLAIM"],
            Self::Quantity => &["QUANTITY"],
            Self::GrowSt => &["GROWST"],
            Self::PackSt => &["PACKST"],
            Self::DistSt => &["DISTST"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultColumn {
    SampleKey,
    Commod,
    CommType,
    Lab,
    PestCode,
    PestName,
    TestClass,
    Concen,
    Lod,
    ConUnit,
    ConfMethod,
    ConfMethod2,
    Annotate,
    Quantitate,
    Mean,
    Extract,
    Determin,
    Tolerance,
    ToleranceUnit,
}

impl CanonicalColumn for ResultColumn {
    const ALL: &'static [Self] = &[
        Self::SampleKey,
        Self::Commod,
        Self::CommType,
        Self::Lab,
        Self::PestCode,
        Self::PestName,
        Self::TestClass,
        Self::Concen,
        Self::Lod,
        Self::ConUnit,
        Self::ConfMethod,
        Self::ConfMethod2,
        Self::Annotate,
        Self::Quantitate,
        Self::Mean,
        Self::Extract,
        Self::Determin,
        Self::Tolerance,
        Self::ToleranceUnit,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::SampleKey => SAMPLE_KEY_ALIASES,
            Self::Commod => &["COMMOD", "COMMODITY"],
            Self::CommType => &["COMMTYPE"],
            Self::Lab => &["LAB"],
            Self::PestCode => &["PESTCODE", "ANALYTE_CODE"],
            Self::PestName => &["PESTNAME", "PESTICIDE", "ANALYTE", "ANALYTE_NAME"],
            Self::TestClass => &["TESTCLASS"],
            Self::Concen => &["CONCEN", "CONCENTRATION"],
            Self::Lod => &["LOD"],
            Self::ConUnit => &["CONUNIT"],
            Self::ConfMethod => &["CONFMETHOD"],
            Self::ConfMethod2 => &["CONFMETHOD2"],
            Self::Annotate => &["ANNOTATE"],
            Self::Quantitate => &["QUANTITATE"],
            Self::Mean => &["MEAN"],
            Self::Extract => &["EXTRACT"],
            Self::Determin => &["DETERMIN"],
            Self::Tolerance => &["EPATOL", "EPA_TOL", "EPA_TOLERANCE", "TOLERANCE", "TOL"],
            Self::ToleranceUnit => &["TOLUNIT", "TOL_UNIT", "EPATOL_UNIT"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn resolves_trimmed_case_insensitive_names() {
        let map = ColumnMap::<ResultColumn>::resolve(&cols(&[" sample_pk ", "Concen", "epa tol"]));
        assert_eq!(map.position(ResultColumn::SampleKey), Some(0));
        assert_eq!(map.position(ResultColumn::Concen), Some(1));
        assert_eq!(map.position(ResultColumn::Tolerance), Some(2));
        assert!(!map.has(ResultColumn::Lod));
    }

    #[test]
    fn first_matching_column_wins() {
        let map = ColumnMap::<SampleColumn>::resolve(&cols(&["STATE", "SAMPLE_PK", "state"]));
        assert_eq!(map.position(SampleColumn::State), Some(0));
    }

    #[test]
    fn short_rows_read_absent() {
        let frame = RawFrame::from_strs(&["A", "B"], &[&["x"]]);
        assert_eq!(frame.cell(0, Some(0)), Some("x"));
        assert_eq!(frame.cell(0, Some(1)), None);
        assert_eq!(frame.cell(0, None), None);
    }

    #[test]
    fn layouts_name_the_sample_key() {
        assert!(names_sample_key(SAMPLES_LAYOUT.iter().copied()));
        assert!(names_sample_key(RESULTS_LAYOUT.iter().copied()));
        assert!(!names_sample_key(["1234", "CA"]));
    }
}
