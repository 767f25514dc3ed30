use anyhow::Context;
use clap::Parser;
use log::info;

use rustdia::config::DiaIndexConfig;
use rustdia::data::dia::TimsDatasetDIA;
use rustdia::index::query::{FramePredicate, Selector};

/// Query raw peaks of a DIA dataset by window group, frame and window.
#[derive(Parser, Debug)]
#[command(name = "rustdia", version, about)]
struct Args {
    /// Path to the Bruker .d folder
    data_path: String,

    /// JSON file with index settings
    #[arg(long)]
    config: Option<String>,

    /// Window groups: "all", "1-4" or "1,3"
    #[arg(long, default_value = "all")]
    window_groups: String,

    /// Frame ids: "all", "100-200" or "5,6,7"
    #[arg(long, default_value = "all")]
    frames: String,

    /// Window indices, 0 is the MS1 window
    #[arg(long, default_value = "all")]
    windows: String,

    /// Lower retention time bound in seconds
    #[arg(long)]
    rt_min: Option<f64>,

    /// Upper retention time bound in seconds
    #[arg(long)]
    rt_max: Option<f64>,

    #[arg(long)]
    threads: Option<usize>,

    /// Load analysis.tdf_bin into memory
    #[arg(long)]
    in_memory: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DiaIndexConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path))?,
        None => DiaIndexConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.num_threads = threads.max(1);
    }
    config.in_memory |= args.in_memory;

    let window_groups: Selector<u32> = args.window_groups.parse()?;
    let frames: Selector<u32> = args.frames.parse()?;
    let windows: Selector<usize> = args.windows.parse()?;
    let predicate = match (args.rt_min, args.rt_max) {
        (None, None) => None,
        (min, max) => Some(FramePredicate::retention_time(
            min.unwrap_or(f64::NEG_INFINITY),
            max.unwrap_or(f64::INFINITY),
        )),
    };

    let dataset = TimsDatasetDIA::open(&args.data_path, config)
        .with_context(|| format!("failed to open {}", args.data_path))?;

    for window in dataset.windows.windows() {
        println!("{}", window);
    }

    let result = dataset.query(&window_groups, &frames, &windows, predicate.as_ref())?;
    info!("query returned {} rows", result.len());

    println!("columns: {}", result.columns().join(", "));
    println!("rows: {}", result.len());
    println!("frames: {}", result.distinct_frames().len());
    println!("summed intensity: {}", result.intensity_sum());

    Ok(())
}
