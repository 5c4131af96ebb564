#![allow(clippy::needless_return)]

use std::path::{Path, PathBuf};

use itertools::{Itertools, MinMaxResult};

pub mod plot;

pub const METRIC_COUNT: usize = 7;

const STATS_FILE_PATTERN: &str = "search-stats-*.csv";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("cannot read {}: {source}", .path.display())]
	Io { path: PathBuf, source: std::io::Error },
	#[error("malformed csv: {0}")]
	Csv(#[from] csv::Error),
	#[error("line {line}: missing {name} column {column}")]
	MissingColumn { line: usize, column: usize, name: &'static str },
	#[error("line {line}, column {column}: expected {expected}, found {value:?}")]
	Format { line: usize, column: usize, value: String, expected: &'static str },
	#[error("invalid schema: {0}")]
	Schema(String),
	#[error("invalid schema file: {0}")]
	Json(#[from] serde_json::Error),
	#[error("bad search pattern: {0}")]
	Pattern(#[from] glob::PatternError),
	#[error("no stats file matching {pattern} in {}", .dir.display())]
	NoStatsFile { dir: PathBuf, pattern: &'static str },
	#[error("no samples to plot")]
	NoSamples,
	#[error("cannot render chart: {0}")]
	Render(String),
}

/// The cost metrics recorded for every solution, in chart order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
	FourNoteDiminished,
	ThreeNote,
	FundamentalNoDoubleBass,
	Incomplete,
	CommonNotesSoprano,
	CommonNotesSameVoice,
	MelodicIntervals,
}

impl Metric {
	pub const ALL: [Metric; METRIC_COUNT] = [
		Metric::FourNoteDiminished,
		Metric::ThreeNote,
		Metric::FundamentalNoDoubleBass,
		Metric::Incomplete,
		Metric::CommonNotesSoprano,
		Metric::CommonNotesSameVoice,
		Metric::MelodicIntervals,
	];

	pub fn index(self) -> usize {
		return self as usize;
	}

	pub fn display_name(self) -> &'static str {
		return match self {
			Metric::FourNoteDiminished => "Number of 4-note diminished chords",
			Metric::ThreeNote => "Number of 3-note chords",
			Metric::FundamentalNoDoubleBass => "Number of fundamental chords without double bass",
			Metric::Incomplete => "Number of incomplete chords",
			Metric::CommonNotesSoprano => "Number of common notes in the soprano",
			Metric::CommonNotesSameVoice => "Number of common notes in the same voice",
			Metric::MelodicIntervals => "Melodic intervals cost",
		};
	}

	pub fn slug(self) -> &'static str {
		return match self {
			Metric::FourNoteDiminished => "four-note-diminished",
			Metric::ThreeNote => "three-note",
			Metric::FundamentalNoDoubleBass => "fundamental-no-double-bass",
			Metric::Incomplete => "incomplete",
			Metric::CommonNotesSoprano => "common-notes-soprano",
			Metric::CommonNotesSameVoice => "common-notes-same-voice",
			Metric::MelodicIntervals => "melodic-intervals",
		};
	}
}

/// What a single field inside a stride holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
	Time,
	Cost(Metric),
	NegatedCost(Metric), // stored as -value
	Skip,
}

/// Positional layout of a stats row.
///
/// Columns before `series_start_column` (apart from the label and tonality)
/// are run metadata and are ignored. From there on the row repeats `stride`
/// once per solution found by the search.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Schema {
	pub label_column: usize,
	pub tonality_column: usize,
	pub series_start_column: usize,
	pub stride: Vec<FieldRole>,
	// when false a stride is only decoded if at least one field follows it,
	// so a tail of exactly n strides yields n - 1 samples
	pub keep_final_stride: bool,
}

impl Default for Schema {
	fn default() -> Self {
		return Self {
			label_column: 0,
			tonality_column: 1,
			series_start_column: 31,
			stride: vec![
				FieldRole::Time,
				FieldRole::Cost(Metric::FourNoteDiminished),
				FieldRole::Cost(Metric::ThreeNote),
				FieldRole::Cost(Metric::FundamentalNoDoubleBass),
				FieldRole::Cost(Metric::Incomplete),
				FieldRole::Cost(Metric::CommonNotesSoprano),
				FieldRole::NegatedCost(Metric::CommonNotesSameVoice),
				FieldRole::Cost(Metric::MelodicIntervals),
				FieldRole::Skip,
			],
			keep_final_stride: false,
		};
	}
}

impl Schema {
	pub fn from_json_file(path: &Path) -> Result<Self, Error> {
		let text = std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
		let schema: Schema = serde_json::from_str(&text)?;
		schema.validate()?;
		return Ok(schema);
	}

	pub fn validate(&self) -> Result<(), Error> {
		let time_fields = self.stride.iter().filter(|role| **role == FieldRole::Time).count();
		if time_fields != 1 {
			return Err(Error::Schema(format!("stride needs exactly one time field, found {}", time_fields)));
		}
		let mut seen = [0usize; METRIC_COUNT];
		for role in &self.stride {
			if let FieldRole::Cost(metric) | FieldRole::NegatedCost(metric) = role {
				seen[metric.index()] += 1;
			}
		}
		for metric in Metric::ALL {
			if seen[metric.index()] != 1 {
				return Err(Error::Schema(format!("stride must hold {:?} exactly once, found {}", metric, seen[metric.index()])));
			}
		}
		return Ok(());
	}

	pub fn stride_width(&self) -> usize {
		return self.stride.len();
	}

	fn stride_fits(&self, cursor: usize, tail_len: usize) -> bool {
		if self.keep_final_stride {
			return cursor + self.stride_width() <= tail_len;
		}
		return cursor + self.stride_width() < tail_len;
	}
}

/// One solution snapshot: when it was found and what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
	pub time: f64,
	pub costs: [i64; METRIC_COUNT],
}

impl Sample {
	pub fn cost(&self, metric: Metric) -> i64 {
		return self.costs[metric.index()];
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
	pub label: String, // chord progression
	pub tonality: String,
	pub samples: Vec<Sample>,
}

impl TestCase {
	pub fn times(&self) -> Vec<f64> {
		return self.samples.iter().map(|sample| sample.time).collect();
	}

	pub fn series(&self, metric: Metric) -> Vec<i64> {
		return self.samples.iter().map(|sample| sample.cost(metric)).collect();
	}

	pub fn legend_label(&self) -> String {
		return format!("{} - {}", self.label, self.tonality);
	}
}

pub type Row = Vec<String>;

pub fn load_rows(path: &Path) -> Result<Vec<Row>, Error> {
	let file = std::fs::File::open(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
	return rows_from_reader(file);
}

/// Splits every line on commas and trims the fields. Quotes are not special.
pub fn rows_from_reader<R: std::io::Read>(input: R) -> Result<Vec<Row>, Error> {
	let mut reader = csv::ReaderBuilder::new()
		.has_headers(false)
		.flexible(true)
		.quoting(false)
		.trim(csv::Trim::All)
		.from_reader(input);
	let mut rows = Vec::new();
	for result in reader.records() {
		let record = result?;
		rows.push(record.iter().map(str::to_owned).collect());
	}
	return Ok(rows);
}

pub fn split_header(mut rows: Vec<Row>) -> (Option<Row>, Vec<Row>) {
	if rows.is_empty() {
		return (None, rows);
	}
	let data = rows.split_off(1);
	return (rows.pop(), data);
}

/// Every stats file in `dir`, oldest first (the timestamp in the name sorts lexicographically).
pub fn stats_files(dir: &Path) -> Result<Vec<PathBuf>, Error> {
	let pattern = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join(STATS_FILE_PATTERN);
	let mut files = Vec::new();
	for entry in glob::glob(&pattern.to_string_lossy())? {
		let file = entry.map_err(|e| Error::Io { path: e.path().to_path_buf(), source: e.into_error() })?;
		if file.is_file() {
			files.push(file);
		}
	}
	files.sort();
	return Ok(files);
}

pub fn latest_stats_file(dir: &Path) -> Result<PathBuf, Error> {
	return stats_files(dir)?
		.pop()
		.ok_or_else(|| Error::NoStatsFile { dir: dir.to_path_buf(), pattern: STATS_FILE_PATTERN });
}

fn parse_field<T: std::str::FromStr>(text: &str, line: usize, column: usize, expected: &'static str) -> Result<T, Error> {
	return text.parse::<T>().map_err(|_| Error::Format { line, column, value: text.to_owned(), expected });
}

fn required_field<'a>(row: &'a [String], line: usize, column: usize, name: &'static str) -> Result<&'a String, Error> {
	return row.get(column).ok_or(Error::MissingColumn { line, column, name });
}

pub fn unpack_row(row: &[String], line: usize, schema: &Schema) -> Result<TestCase, Error> {
	let label = required_field(row, line, schema.label_column, "label")?.clone();
	let tonality = required_field(row, line, schema.tonality_column, "tonality")?.clone();
	let tail = row.get(schema.series_start_column..).unwrap_or(&[]);

	let mut samples = Vec::new();
	let mut cursor = 0;
	while schema.stride_fits(cursor, tail.len()) {
		let mut sample = Sample { time: 0.0, costs: [0; METRIC_COUNT] };
		for (offset, role) in schema.stride.iter().enumerate() {
			let text = tail[cursor + offset].as_str();
			let column = schema.series_start_column + cursor + offset;
			match *role {
				FieldRole::Time => {
					let time: f64 = parse_field(text, line, column, "a float")?;
					// nan or inf would poison the shared time axis
					if !time.is_finite() {
						return Err(Error::Format { line, column, value: text.to_owned(), expected: "a finite float" });
					}
					sample.time = time;
				}
				FieldRole::Cost(metric) => sample.costs[metric.index()] = parse_field(text, line, column, "an integer")?,
				FieldRole::NegatedCost(metric) => {
					let value: i64 = parse_field(text, line, column, "an integer")?;
					sample.costs[metric.index()] = value.checked_neg().ok_or_else(|| Error::Format {
						line,
						column,
						value: text.to_owned(),
						expected: "a negatable integer",
					})?;
				}
				FieldRole::Skip => {}
			}
		}
		samples.push(sample);
		cursor += schema.stride_width();
	}

	log::debug!("line {}: {} - {} has {} samples", line, label, tonality, samples.len());
	return Ok(TestCase { label, tonality, samples });
}

/// Decodes every data row, stopping at the first malformed one.
pub fn unpack(rows: &[Row], schema: &Schema) -> Result<Vec<TestCase>, Error> {
	let mut cases = Vec::with_capacity(rows.len());
	for (index, row) in rows.iter().enumerate() {
		// the header sits on line 1
		cases.push(unpack_row(row, index + 2, schema)?);
	}
	return Ok(cases);
}

pub fn read_test_cases(path: &Path, schema: &Schema) -> Result<Vec<TestCase>, Error> {
	let (_, data) = split_header(load_rows(path)?);
	return unpack(&data, schema);
}

fn into_bounds<T: Copy>(result: MinMaxResult<T>) -> Option<(T, T)> {
	return match result {
		MinMaxResult::NoElements => None,
		MinMaxResult::OneElement(value) => Some((value, value)),
		MinMaxResult::MinMax(min, max) => Some((min, max)),
	};
}

/// `(min_t, max_t)` over every sample of every case.
pub fn time_bounds(cases: &[TestCase]) -> Option<(f64, f64)> {
	let times = cases.iter().flat_map(|case| case.samples.iter().map(|sample| sample.time));
	return into_bounds(times.minmax_by(|a, b| a.total_cmp(b)));
}

pub fn value_bounds(cases: &[TestCase], metric: Metric) -> Option<(i64, i64)> {
	let values = cases.iter().flat_map(|case| case.samples.iter().map(move |sample| sample.cost(metric)));
	return into_bounds(values.minmax());
}
