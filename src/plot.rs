use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::{time_bounds, value_bounds, Error, Metric, TestCase, METRIC_COUNT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ChartFormat {
	Svg,
	Png,
}

impl ChartFormat {
	pub fn extension(self) -> &'static str {
		return match self {
			ChartFormat::Svg => "svg",
			ChartFormat::Png => "png",
		};
	}
}

#[derive(Debug, Clone)]
pub struct ChartSettings {
	pub output_dir: PathBuf,
	pub format: ChartFormat,
	pub width: u32,
	pub height: u32,
}

impl Default for ChartSettings {
	fn default() -> Self {
		return Self {
			output_dir: PathBuf::from("out/charts"),
			format: ChartFormat::Svg,
			width: 1280,
			height: 760,
		};
	}
}

// gradient stops for the per-case line colours
const LINE_GRADIENT: [(u8, u8, u8); 4] = [(31, 119, 180), (44, 160, 44), (255, 127, 14), (214, 39, 40)];

pub fn chart_title(metric: Metric) -> String {
	return format!("Evolution of the {} over time", metric.display_name());
}

pub fn chart_path(settings: &ChartSettings, stem: &str, metric: Metric) -> PathBuf {
	return settings.output_dir.join(format!("{}-{:02}-{}.{}", stem, metric.index() + 1, metric.slug(), settings.format.extension()));
}

/// One colour per test case, spread evenly over the gradient.
pub fn line_colors(count: usize) -> Result<Vec<RGBColor>, Error> {
	let stops: Vec<colorgrad::Color> = LINE_GRADIENT.iter().map(|&(r, g, b)| colorgrad::Color::from_rgba8(r, g, b, 255)).collect();
	let gradient = colorgrad::CustomGradient::new()
		.colors(&stops)
		.build()
		.map_err(|e| Error::Render(format!("bad colour gradient: {}", e)))?;
	let step = if count > 1 { 1.0 / (count - 1) as f64 } else { 0.0 };
	return Ok((0..count)
		.map(|index| {
			let [r, g, b, _] = gradient.at(index as f64 * step).to_rgba8();
			RGBColor(r, g, b)
		})
		.collect());
}

/// Widens a degenerate range and adds `margin` (a fraction of the span) on both sides.
pub fn axis_range(min: f64, max: f64, margin: f64) -> Range<f64> {
	if max <= min {
		return (min - 1.0)..(min + 1.0);
	}
	let pad = (max - min) * margin;
	return (min - pad)..(max + pad);
}

/// Renders one chart per metric, in the fixed metric order, and returns the files written.
pub fn render_all(cases: &[TestCase], stem: &str, settings: &ChartSettings) -> Result<Vec<PathBuf>, Error> {
	let (min_t, max_t) = time_bounds(cases).ok_or(Error::NoSamples)?;
	log::info!("{} test cases, time from {} to {}", cases.len(), min_t, max_t);
	for case in cases.iter().filter(|case| case.samples.is_empty()) {
		log::warn!("{} has no samples", case.legend_label());
	}

	std::fs::create_dir_all(&settings.output_dir)
		.map_err(|e| Error::Render(format!("cannot create {}: {}", settings.output_dir.display(), e)))?;
	let colors = line_colors(cases.len())?;
	let x_range = axis_range(min_t, max_t, 0.0);

	let mut written = Vec::with_capacity(METRIC_COUNT);
	for metric in Metric::ALL {
		let path = chart_path(settings, stem, metric);
		render_metric(cases, metric, x_range.clone(), &colors, &path, settings)?;
		log::info!("{} -> {}", metric.display_name(), path.display());
		written.push(path);
	}
	return Ok(written);
}

fn render_metric(cases: &[TestCase], metric: Metric, x_range: Range<f64>, colors: &[RGBColor], path: &Path, settings: &ChartSettings) -> Result<(), Error> {
	let size = (settings.width, settings.height);
	let result = match settings.format {
		ChartFormat::Svg => draw_chart(SVGBackend::new(path, size).into_drawing_area(), cases, metric, x_range, colors).map_err(|e| e.to_string()),
		ChartFormat::Png => draw_chart(BitMapBackend::new(path, size).into_drawing_area(), cases, metric, x_range, colors).map_err(|e| e.to_string()),
	};
	return result.map_err(|message| Error::Render(format!("{}: {}", path.display(), message)));
}

fn draw_chart<DB: DrawingBackend>(
	root: DrawingArea<DB, Shift>,
	cases: &[TestCase],
	metric: Metric,
	x_range: Range<f64>,
	colors: &[RGBColor],
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
	root.fill(&WHITE)?;

	let (min_value, max_value) = value_bounds(cases, metric).unwrap_or((0, 0));
	let mut chart = ChartBuilder::on(&root)
		.caption(chart_title(metric), ("sans-serif", 24).into_font())
		.margin(20)
		.set_label_area_size(LabelAreaPosition::Left, 60)
		.set_label_area_size(LabelAreaPosition::Bottom, 40)
		.build_cartesian_2d(x_range, axis_range(min_value as f64, max_value as f64, 0.05))?;

	chart.configure_mesh().x_desc("Time").y_desc(metric.display_name()).draw()?;

	for (case, &color) in cases.iter().zip(colors) {
		chart
			.draw_series(LineSeries::new(
				case.samples.iter().map(|sample| (sample.time, sample.cost(metric) as f64)),
				color.stroke_width(2),
			))?
			.label(case.legend_label())
			.legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
	}

	chart
		.configure_series_labels()
		.background_style(WHITE.mix(0.8))
		.border_style(BLACK)
		.position(SeriesLabelPosition::UpperRight)
		.draw()?;

	root.present()?;
	return Ok(());
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Sample;

	fn case(label: &str, times: &[f64]) -> TestCase {
		return TestCase {
			label: label.to_string(),
			tonality: "Cmaj".to_string(),
			samples: times.iter().map(|&time| Sample { time, costs: [1, 2, 3, 4, 5, -6, 7] }).collect(),
		};
	}

	#[test]
	fn titles_follow_metric_names() {
		assert_eq!(chart_title(Metric::ThreeNote), "Evolution of the Number of 3-note chords over time");
		assert_eq!(chart_title(Metric::MelodicIntervals), "Evolution of the Melodic intervals cost over time");
	}

	#[test]
	fn chart_paths_are_ordered_by_metric() {
		let settings = ChartSettings { output_dir: PathBuf::from("charts"), format: ChartFormat::Png, ..ChartSettings::default() };
		let paths: Vec<PathBuf> = Metric::ALL.iter().map(|&metric| chart_path(&settings, "search-stats-x", metric)).collect();
		assert_eq!(paths[0], PathBuf::from("charts/search-stats-x-01-four-note-diminished.png"));
		assert_eq!(paths[6], PathBuf::from("charts/search-stats-x-07-melodic-intervals.png"));
		let mut sorted = paths.clone();
		sorted.sort();
		assert_eq!(sorted, paths);
	}

	#[test]
	fn one_colour_per_case() {
		assert!(line_colors(0).unwrap().is_empty());
		assert_eq!(line_colors(1).unwrap().len(), 1);
		let colors = line_colors(5).unwrap();
		assert_eq!(colors.len(), 5);
		assert_ne!(colors[0], colors[4]);
	}

	#[test]
	fn degenerate_ranges_are_widened() {
		assert_eq!(axis_range(3.0, 3.0, 0.05), 2.0..4.0);
		assert_eq!(axis_range(0.0, 10.0, 0.0), 0.0..10.0);
		assert_eq!(axis_range(0.0, 10.0, 0.1), -1.0..11.0);
	}

	#[test]
	fn nothing_to_plot() {
		let dir = tempfile::tempdir().unwrap();
		let settings = ChartSettings { output_dir: dir.path().join("charts"), ..ChartSettings::default() };
		let cases = vec![case("Empty", &[])];
		assert!(matches!(render_all(&cases, "stats", &settings), Err(Error::NoSamples)));
		assert!(matches!(render_all(&[], "stats", &settings), Err(Error::NoSamples)));
		assert!(!settings.output_dir.exists());
	}

	#[test]
	fn renders_one_svg_per_metric() {
		let dir = tempfile::tempdir().unwrap();
		let settings = ChartSettings { output_dir: dir.path().join("charts"), ..ChartSettings::default() };
		let mut second = case("Prog2", &[0.2, 0.5, 0.9]);
		second.tonality = "Amin".to_string();
		let cases = vec![case("Prog1", &[0.1, 0.4]), second];

		let written = render_all(&cases, "search-stats-test", &settings).unwrap();
		let expected: Vec<PathBuf> = Metric::ALL.iter().map(|&metric| chart_path(&settings, "search-stats-test", metric)).collect();
		assert_eq!(written, expected);

		for (path, metric) in written.iter().zip(Metric::ALL) {
			let svg = std::fs::read_to_string(path).unwrap();
			assert!(svg.contains(&chart_title(metric)), "{} lacks its title", path.display());
			assert!(svg.contains("Time"));
			assert!(svg.contains(metric.display_name()));
			assert!(svg.contains("Prog1 - Cmaj"));
			assert!(svg.contains("Prog2 - Amin"));
		}
	}

	#[test]
	fn unusable_output_dir_is_a_render_error() {
		let file = tempfile::NamedTempFile::new().unwrap();
		let settings = ChartSettings { output_dir: file.path().to_path_buf(), ..ChartSettings::default() };
		let cases = vec![case("Prog1", &[0.1, 0.4])];
		assert!(matches!(render_all(&cases, "stats", &settings), Err(Error::Render(_))));
	}
}
