use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;

use search_stats_plot::plot::{ChartFormat, ChartSettings};
use search_stats_plot::Schema;

const DEFAULT_STATS_DIR: &str = "out";

#[derive(Parser)]
#[command(about = "Plots how the solution costs of each test case evolve during the search")]
struct Config {
	#[arg(short, long)]
	batch: bool, // plot every stats file in a directory
	/// Stats file, or directory with --batch. Defaults to the newest out/search-stats-*.csv
	#[arg(short, long)]
	path: Option<PathBuf>,
	#[arg(short, long, default_value = "out/charts")]
	output: PathBuf,
	#[arg(long, value_enum, default_value_t = ChartFormat::Svg)]
	format: ChartFormat,
	#[arg(long, default_value_t = 1280)]
	width: u32,
	#[arg(long, default_value_t = 760)]
	height: u32,
	/// JSON file overriding the column layout
	#[arg(long)]
	schema: Option<PathBuf>,
	#[arg(long, name = "keep-final-stride")]
	keep_final_stride: bool,
}

fn plot_file(path: &Path, schema: &Schema, settings: &ChartSettings) -> anyhow::Result<()> {
	log::info!("reading {}", path.display());
	let cases = search_stats_plot::read_test_cases(path, schema).with_context(|| format!("cannot decode {}", path.display()))?;
	let stem = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| "search-stats".to_string());
	search_stats_plot::plot::render_all(&cases, &stem, settings).with_context(|| format!("cannot plot {}", path.display()))?;
	return Ok(());
}

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let config = Config::parse();

	let mut schema = match &config.schema {
		Some(path) => Schema::from_json_file(path).with_context(|| format!("cannot load schema {}", path.display()))?,
		None => Schema::default(),
	};
	schema.keep_final_stride |= config.keep_final_stride;

	let settings = ChartSettings {
		output_dir: config.output,
		format: config.format,
		width: config.width,
		height: config.height,
	};

	if config.batch {
		let dir = config.path.unwrap_or_else(|| PathBuf::from(DEFAULT_STATS_DIR));
		let files = search_stats_plot::stats_files(&dir)?;
		if files.is_empty() {
			log::warn!("no stats files in {}", dir.display());
		}
		for file in files {
			plot_file(&file, &schema, &settings)?;
		}
	} else {
		let path = match config.path {
			Some(path) => path,
			None => search_stats_plot::latest_stats_file(Path::new(DEFAULT_STATS_DIR))?,
		};
		plot_file(&path, &schema, &settings)?;
	}
	return Ok(());
}
