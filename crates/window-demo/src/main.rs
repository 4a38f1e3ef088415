// File: crates/window-demo/src/main.rs
// Summary: Interactive chart window: winit events drive the engine, frames are rasterized on the CPU and blitted with softbuffer.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::task::Context;

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::task::{waker, ArcWake};
use timechart_core::csv_input;
use timechart_core::{Backend, Chart, ChartConfig, DragMode};
use timechart_http::HttpBackend;
use timechart_render_skia::SkiaRenderer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use winit::event::{ElementState, Event, KeyboardInput, MouseButton, MouseScrollDelta, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::window::WindowBuilder;

#[derive(Parser, Debug)]
#[command(name = "timechart-window-demo", about = "Explore a time-series chart session in a window")]
struct Args {
    /// CSV with `dataset,date,value` columns, served from memory.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Store base URL; takes precedence over --csv.
    #[arg(long)]
    server: Option<String>,
    /// Share-link query (or whole URL) to start from.
    #[arg(long, default_value = "")]
    link: String,
    /// JSON5 chart configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    fidelity: bool,
}

/// Posted to the event loop when a pending refresh or edit can make progress.
#[derive(Debug)]
struct Wake;

/// Waker that hands wake-ups from the runtime threads to the event loop.
struct LoopWaker(Mutex<EventLoopProxy<Wake>>);

impl ArcWake for LoopWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if let Ok(proxy) = arc_self.0.lock() {
            // fails only once the loop has exited
            let _ = proxy.send_event(Wake);
        }
    }
}

const KEYS: &str = "Z zoom-drag | P pan-drag | +/- zoom | Enter save note | Delete remove note | Esc close note | L print link";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ChartConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => ChartConfig::default(),
    };

    // HTTP futures are polled from the event loop; the runtime drives their sockets.
    let rt = tokio::runtime::Builder::new_multi_thread().worker_threads(1).enable_all().build()?;
    let _enter = rt.enter();
    let (backend, ids): (Rc<dyn Backend>, Vec<String>) = match (&args.server, &args.csv) {
        (Some(url), _) => (Rc::new(HttpBackend::new(url)?), Vec::new()),
        (None, Some(path)) => {
            let points = csv_input::load(path)?;
            let ids = points.keys().cloned().collect();
            (Rc::new(csv_input::into_memory(&points, args.fidelity)), ids)
        }
        (None, None) => anyhow::bail!("nothing to chart: pass --csv or --server"),
    };

    let event_loop = EventLoopBuilder::<Wake>::with_user_event().build();
    let loop_waker = waker(Arc::new(LoopWaker(Mutex::new(event_loop.create_proxy()))));
    let window = WindowBuilder::new()
        .with_title("Timechart")
        .with_inner_size(winit::dpi::LogicalSize::new(
            timechart_core::types::WIDTH as f64,
            timechart_core::types::HEIGHT as f64,
        ))
        .build(&event_loop)?;
    // SAFETY: the event loop never returns, so `context` stays alive and `window` moves
    // into the loop alongside `surface`.
    let context = unsafe { softbuffer::Context::new(&window) }.map_err(|e| anyhow::anyhow!("softbuffer context: {e}"))?;
    let mut surface =
        unsafe { softbuffer::Surface::new(&context, &window) }.map_err(|e| anyhow::anyhow!("softbuffer surface: {e}"))?;

    let mut chart = Chart::new(backend, config)?;
    let size = window.inner_size();
    chart.resize(size.width as i32, size.height as i32);
    // a link naming datasets replaces the default of showing everything loaded
    for id in &ids {
        chart.add_dataset(id);
    }
    if let Some(alert) = chart.load_share_query(&args.link) {
        warn!(error = %alert, "share link partly applied");
    }
    info!("{KEYS}");

    let renderer = SkiaRenderer::new();
    let mut pixels: Vec<u32> = Vec::new();
    let mut cursor = (0.0_f64, 0.0_f64);
    let mut draft = String::new();

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
                WindowEvent::Resized(size) => chart.resize(size.width as i32, size.height as i32),
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = (position.x, position.y);
                    chart.on_pointer_move(cursor.0, cursor.1);
                }
                WindowEvent::CursorLeft { .. } => chart.on_pointer_leave(),
                WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => match state {
                    ElementState::Pressed => chart.on_pointer_down(cursor.0, cursor.1),
                    ElementState::Released => {
                        chart.on_pointer_up(cursor.0, cursor.1);
                        draft.clear();
                    }
                },
                WindowEvent::MouseWheel { delta, .. } => {
                    // winit reports scrolling up as positive; the engine zooms out on positive
                    let delta = match delta {
                        MouseScrollDelta::LineDelta(_, y) => -f64::from(y),
                        MouseScrollDelta::PixelDelta(p) => -p.y,
                    };
                    chart.on_wheel(cursor.0, delta);
                }
                WindowEvent::ReceivedCharacter(c) if chart.form().is_some() && !c.is_control() => draft.push(c),
                WindowEvent::KeyboardInput {
                    input: KeyboardInput { state: ElementState::Pressed, virtual_keycode: Some(key), .. },
                    ..
                } => on_key(&mut chart, &mut draft, key),
                _ => {}
            },
            // a wake-up only needs to reach MainEventsCleared, which polls below
            Event::UserEvent(Wake) => {}
            Event::MainEventsCleared => {
                let mut cx = Context::from_waker(&loop_waker);
                let _ = chart.poll_refresh(&mut cx);
                if chart.take_needs_render() {
                    window.request_redraw();
                }
            }
            Event::RedrawRequested(_) => {
                if let Err(e) = present(&mut chart, &renderer, &mut surface, &mut pixels) {
                    warn!(error = %e, "frame not presented");
                }
            }
            _ => {}
        }
    })
}

fn on_key(chart: &mut Chart, draft: &mut String, key: VirtualKeyCode) {
    let editing = chart.form().is_some();
    match key {
        VirtualKeyCode::Return if editing => {
            let text = std::mem::take(draft);
            if let Err(e) = chart.submit_annotation(&text) {
                warn!(error = %e, "annotation not saved");
            }
        }
        VirtualKeyCode::Back if editing => {
            draft.pop();
        }
        VirtualKeyCode::Escape => {
            draft.clear();
            chart.close_annotation_form();
        }
        VirtualKeyCode::Delete if editing => {
            draft.clear();
            if let Err(e) = chart.delete_annotation() {
                warn!(error = %e, "annotation not deleted");
            }
        }
        _ if editing => {}
        VirtualKeyCode::Z => chart.set_mode(DragMode::Zoom),
        VirtualKeyCode::P => chart.set_mode(DragMode::Pan),
        VirtualKeyCode::Plus | VirtualKeyCode::Equals | VirtualKeyCode::NumpadAdd => {
            chart.zoom_in();
        }
        VirtualKeyCode::Minus | VirtualKeyCode::NumpadSubtract => {
            chart.zoom_out();
        }
        VirtualKeyCode::L => info!(link = %chart.share_query(), "share link"),
        _ => {}
    }
}

/// Rasterize the current frame and copy it into the window as 0RGB words.
fn present(
    chart: &mut Chart,
    renderer: &SkiaRenderer,
    surface: &mut softbuffer::Surface,
    pixels: &mut Vec<u32>,
) -> Result<()> {
    let frame = chart.render();
    let (rgba, w, h, _) = renderer.render_rgba8(&frame)?;
    let (Some(nw), Some(nh)) = (NonZeroU32::new(w), NonZeroU32::new(h)) else {
        return Ok(());
    };
    surface.resize(nw, nh).map_err(|e| anyhow::anyhow!("resize: {e}"))?;
    pixels.clear();
    pixels.extend(rgba.chunks_exact(4).map(|px| (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2])));
    let mut buffer = surface.buffer_mut().map_err(|e| anyhow::anyhow!("buffer: {e}"))?;
    let n = buffer.len().min(pixels.len());
    buffer[..n].copy_from_slice(&pixels[..n]);
    buffer.present().map_err(|e| anyhow::anyhow!("present: {e}"))?;
    Ok(())
}
