// File: crates/demo/src/main.rs
// Summary: Restores a chart session from a share link, waits for its data and writes a PNG.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use timechart_core::csv_input;
use timechart_core::{Backend, Chart, ChartConfig, ViewState};
use timechart_http::HttpBackend;
use timechart_render_skia::SkiaRenderer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "timechart-demo", about = "Render a time-series chart session to PNG")]
struct Args {
    /// CSV with `dataset,date,value` columns, served from memory.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Store base URL, e.g. http://localhost:5000. With --csv, the rows are uploaded first.
    #[arg(long)]
    server: Option<String>,
    /// Share-link query (or whole URL). Defaults to every CSV dataset over its full extent.
    #[arg(long)]
    link: Option<String>,
    #[arg(long, default_value = "target/out/timechart.png")]
    out: PathBuf,
    /// JSON5 chart configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = timechart_core::types::WIDTH)]
    width: i32,
    #[arg(long, default_value_t = timechart_core::types::HEIGHT)]
    height: i32,
    /// Bin long windows into min/mean/max aggregates like the store does.
    #[arg(long)]
    fidelity: bool,
    /// Skip text so output does not depend on installed fonts.
    #[arg(long)]
    no_text: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ChartConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => ChartConfig::default(),
    };
    let points = args.csv.as_deref().map(csv_input::load).transpose()?;

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let backend: Rc<dyn Backend> = match (&args.server, &points) {
        (Some(url), points) => {
            let http = HttpBackend::new(url)?;
            if let Some(points) = points {
                rt.block_on(http.upload(points.iter().map(|(id, pts)| (id.as_str(), pts.as_slice()))))
                    .context("uploading csv rows")?;
            }
            Rc::new(http)
        }
        (None, Some(points)) => Rc::new(csv_input::into_memory(points, args.fidelity)),
        (None, None) => anyhow::bail!("nothing to chart: pass --csv and/or --server"),
    };

    let mut chart = Chart::new(backend, config)?;
    chart.resize(args.width, args.height);
    let link = match (&args.link, &points) {
        (Some(link), _) => link.clone(),
        (None, Some(points)) => extent_view(points).map(|v| v.to_query()).unwrap_or_default(),
        (None, None) => String::new(),
    };
    if let Some(alert) = chart.load_share_query(&link) {
        warn!(error = %alert, "share link partly applied");
    }

    rt.block_on(chart.settle());
    if chart.refreshes_failed() > 0 {
        warn!(failed = chart.refreshes_failed(), "some refreshes failed; drawing what arrived");
    }

    let frame = chart.render();
    let renderer = if args.no_text { SkiaRenderer::new().without_text() } else { SkiaRenderer::new() };
    renderer.render_to_png(&frame, &args.out)?;
    info!(out = %args.out.display(), link = %chart.share_query(), "wrote chart");
    Ok(())
}

/// Every loaded dataset on the left axis, over the span of all their points.
fn extent_view(points: &csv_input::Points) -> Option<ViewState> {
    let times = points.values().flatten().map(|p| p.timestamp());
    let (start, end) = times.fold(None, |acc, t| match acc {
        None => Some((t, t)),
        Some((lo, hi)) => Some((t.min(lo), t.max(hi))),
    })?;
    let end = if end > start { end } else { start + chrono::Duration::seconds(1) };
    Some(ViewState { start, end, left: points.keys().cloned().collect(), right: Vec::new() })
}
