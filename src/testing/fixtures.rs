//! Pre-built samples and results texts.
//!
//! The headered fixtures use one year's spellings (`SAMPLE_PK`, `EPATOL`); the
//! headerless ones follow the data-dictionary layouts in [`crate::schema`].

use crate::schema::RawFrame;

/// Samples for three keys, with a calendar date split over `YEAR/MONTH/DAY`.
pub const SAMPLES_HEADERED: &str = "\
SAMPLE_PK|STATE|YEAR|MONTH|DAY|COMMOD|COMMTYPE|ORIGIN|COUNTRY|CLAIM|VARIETY
A1|CA|19|03|14|AP|FR|1|US|NC|GALA
A2|NY|19|04|02|BN|FR|2|MX|NC|
A3|FL|19|05|21|ST|FZ|1|US|OG|
";

/// Results for the samples above plus one orphan key, with a tolerance column.
pub const RESULTS_HEADERED: &str = "\
SAMPLE_PK|COMMOD|COMMTYPE|LAB|PESTCODE|PESTNAME|TESTCLASS|CONCEN|LOD|CONUNIT|EPATOL
A1|AP|FR|CA1|001|Azinphos methyl|A|0.000|0.010|M|1.0
A1|AP|FR|CA1|002|Captan|B|0.500|0.020|M|25
A2|BN|FR|NY2|003|Diazinon|A|0.300|0.005|M|0.1
A3|ST|FZ|FL1|004|Malathion|A|n/a|0.010|M|8
Z9|PE|FR|TX1|005|Carbaryl|C|1.200|0.050|M|
";

/// Same data as [`SAMPLES_HEADERED`] without a header row.
pub const SAMPLES_HEADERLESS: &str = "\
A1|CA|19|03|14|S01|AP|001|GALA|1|US|R|FR|NC|10|WA|WA|CA
A2|NY|19|04|02|S02|BN|002||2|MX|W|FR|NC|5|MX|TX|NY
";

/// Results without a header row and, as in every headerless year, no tolerance.
pub const RESULTS_HEADERLESS: &str = "\
A1|AP|FR|CA1|001|A|0.000|0.010|M|||||||
A2|BN|FR|NY2|003|A|0.300|0.005|M|GC||||||
Z9|PE|FR|TX1|005|C|1.200|0.050|M
";

/// Results text with `rows` lines, all keyed to `key`.
#[must_use]
pub fn results_text(key: &str, rows: usize) -> String {
    let mut out = String::from("SAMPLE_PK|PESTCODE|CONCEN|LOD|EPATOL\n");
    for i in 0..rows {
        out.push_str(&format!("{key}|{:03}|{}|0.01|1\n", i % 1000, i % 3));
    }
    out
}

/// The canonical join scenario: one sample, two results.
///
/// Returns `(samples, results)` frames. `A1` is a non-detect that matches the
/// sample; `B9` exceeds its tolerance and matches nothing.
#[must_use]
pub fn scenario_frames() -> (RawFrame, RawFrame) {
    let samples = RawFrame::from_strs(&["SAMPLE_PK", "STATE"], &[&["A1", "CA"]]);
    let results = RawFrame::from_strs(
        &["SAMPLE_PK", "CONCEN", "LOD", "EPATOL"],
        &[&["A1", "0", "0.01", ""], &["B9", "5", "", "2"]],
    );
    (samples, results)
}

/// [`scenario_frames`] as pipe-delimited texts `(samples, results)`.
pub const SCENARIO_SAMPLES: &str = "SAMPLE_PK|STATE\nA1|CA\n";
pub const SCENARIO_RESULTS: &str = "SAMPLE_PK|CONCEN|LOD|EPATOL\nA1|0|0.01|\nB9|5||2\n";
