//! Simulate command - drive the engine through a scripted fling.
//!
//! Opens two synthetic wells, binds several panes to the first, flings one
//! of them with a drag and release, and runs the frame loop on simulated
//! time, then prints the diagnostics a UI would show.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use depthsync::app::{render_strip, ViewportEngine};
use depthsync::coord::DepthRange;
use depthsync::crosshole::{
    Color, CurveStyle, DisplayChange, DisplayConfig, DisplaySink, DocumentId, MemoryStore,
};
use depthsync::stream::InMemorySource;
use depthsync::sync::{DepthPane, Modifiers, PaneEvent, PaneId};
use depthsync::telemetry::format_bytes;
use tracing::{debug, info};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Sample spacing of the synthetic logs.
const SAMPLE_STEP_M: f64 = 0.1;

/// Curves in each synthetic log.
const CURVES: [&str; 3] = ["GR", "RHOB", "NPHI"];

/// Drag samples making up the fling gesture.
const GESTURE_SAMPLES: u32 = 5;

/// The pane the fling is performed in.
const FLUNG_PANE: PaneId = PaneId(1);

const PRIMARY: DocumentId = DocumentId(1);
const OFFSET_WELL: DocumentId = DocumentId(2);

/// Arguments for the simulate command.
pub struct SimulateArgs {
    pub depth: f64,
    pub chunk_span: Option<f64>,
    pub frames: u32,
    pub velocity: f64,
    pub panes: u32,
    pub verbose: bool,
}

/// A pane that only counts what it is told.
#[derive(Default)]
struct CountingPane {
    viewport_updates: u64,
}

impl DepthPane for CountingPane {
    fn apply_viewport(&mut self, _range: DepthRange) {
        self.viewport_updates += 1;
    }

    fn apply_cursor(&mut self, _depth: f64) {}

    fn apply_selection(&mut self, _selection: Option<DepthRange>) {}

    fn apply_zoom(&mut self, _zoom: f64) {}
}

/// Stands in for a document window receiving mirrored display edits.
#[derive(Default)]
struct CountingView {
    changes: Cell<u64>,
}

impl DisplaySink for CountingView {
    fn apply_display_change(&self, change: &DisplayChange) {
        self.changes.set(self.changes.get() + 1);
        debug!(change = ?change, "Display change received");
    }
}

/// Totals gathered over the frame loop.
#[derive(Debug, Default)]
struct RunSummary {
    frames: u32,
    applied_px: f64,
    fast_motion_frame: Option<u32>,
    settled_frame: Option<u32>,
    prefetch_started: usize,
    chunks_inserted: usize,
}

fn validate(args: &SimulateArgs) -> Result<(), CliError> {
    if !(args.depth.is_finite() && args.depth > 0.0) {
        return Err(CliError::Usage("--depth must be a positive number".to_string()));
    }
    if args
        .chunk_span
        .is_some_and(|span| !(span.is_finite() && span > 0.0))
    {
        return Err(CliError::Usage(
            "--chunk-span must be a positive number".to_string(),
        ));
    }
    if args.frames == 0 {
        return Err(CliError::Usage("--frames must be at least 1".to_string()));
    }
    if args.panes == 0 {
        return Err(CliError::Usage("--panes must be at least 1".to_string()));
    }
    if !args.velocity.is_finite() {
        return Err(CliError::Usage("--velocity must be a number".to_string()));
    }
    Ok(())
}

fn well_display() -> DisplayConfig {
    CURVES
        .iter()
        .fold(DisplayConfig::new(), |config, curve| {
            config.with_curve(*curve, CurveStyle::default())
        })
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    validate(&args)?;
    let runner = CliRunner::new(args.verbose)?;
    runner.log_startup("simulate");

    let mut config = runner.config().to_engine_config();
    if let Some(span) = args.chunk_span {
        let stream = config.stream.clone().with_chunk_span(span);
        config = config.with_stream(stream);
    }
    let frame_interval = config.scroll.frame_interval;
    let chunk_span = config.stream.chunk_span_m;

    // Simulation runs must not rewrite the user's persisted sync settings.
    let mut engine = ViewportEngine::start_sync_with_store(config, Box::new(MemoryStore::new()))?;

    let offset_view = Rc::new(CountingView::default());
    let mut sample_count = 0;
    for (id, view) in [
        (PRIMARY, Rc::new(CountingView::default())),
        (OFFSET_WELL, Rc::clone(&offset_view)),
    ] {
        let source = InMemorySource::synthetic(args.depth, SAMPLE_STEP_M, &CURVES);
        sample_count = source.len();
        engine.open_document(id, Arc::new(source), well_display(), view)?;
    }

    let panes: Vec<_> = (0..args.panes)
        .map(|_| Rc::new(RefCell::new(CountingPane::default())))
        .collect();
    {
        let session = engine.session(PRIMARY)?;
        for (n, pane) in panes.iter().enumerate() {
            session.bind_pane(PaneId(n as u32 + 1), pane.clone());
        }
    }

    println!("DepthSync Simulation v{}", depthsync::VERSION);
    println!("========================");
    println!();
    println!(
        "Document:   {:.1} m, {} samples, {} curves",
        args.depth,
        sample_count,
        CURVES.len()
    );
    println!("Chunks:     {:.1} m span", chunk_span);
    println!("Panes:      {}", args.panes);
    println!("Gesture:    fling at {:.0} px/s", args.velocity);
    println!();

    let start = Instant::now();
    let summary = run_frames(&mut engine, &args, start, frame_interval)?;

    let delivered = engine.cross_hole().publish_change(
        PRIMARY,
        DisplayChange::Color {
            curve: CURVES[0].to_string(),
            color: Color::rgb(200, 40, 40),
        },
    );

    let session = engine.session(PRIMARY)?;
    let diagnostics = session.diagnostics();
    let pane_updates: u64 = panes.iter().map(|p| p.borrow().viewport_updates).sum();
    let scale = session
        .manager()
        .borrow()
        .coordinate_system()
        .scale();

    println!("Scroll");
    println!("  Frames run:   {}", summary.frames);
    println!(
        "  Distance:     {:.0} px ({:.1} m)",
        summary.applied_px,
        summary.applied_px / scale
    );
    println!("  Viewport:     {}", session.viewport_range());
    match summary.fast_motion_frame {
        Some(frame) => println!("  Fast motion:  entered at frame {}", frame),
        None => println!("  Fast motion:  never"),
    }
    match summary.settled_frame {
        Some(frame) => println!("  Settled:      frame {}", frame),
        None => println!("  Settled:      still moving"),
    }
    println!("  Scroll FPS:   {:.1}", diagnostics.fps);
    println!();

    println!("Cache");
    println!("  Hit rate:     {:.1}%", diagnostics.cache_hit_rate * 100.0);
    println!("  Usage:        {}", diagnostics.cache_usage_human());
    println!("  Entries:      {}", diagnostics.cache_entries);
    println!("  Evictions:    {}", diagnostics.cache_evictions);
    println!();

    println!("Stream");
    println!("  Resident:     {} chunks", diagnostics.loaded_chunks);
    println!("  Pending:      {}", diagnostics.pending_loads);
    println!(
        "  Loads:        {} ({} prefetch started, {} inserted)",
        diagnostics.chunk_loads, summary.prefetch_started, summary.chunks_inserted
    );
    println!("  Gaps:         {}", diagnostics.unavailable_chunks);
    println!();

    println!("Synchronization");
    println!("  Pane updates: {}", pane_updates);
    println!("  Propagated:   {}", diagnostics.propagated_updates);
    println!("  Echoes:       {} dropped", diagnostics.dropped_echoes);
    println!(
        "  Cross-hole:   color edit delivered to {} document(s), {} change(s) applied",
        delivered,
        offset_view.changes.get()
    );

    info!(
        frames = summary.frames,
        cache = %format_bytes(diagnostics.cache_bytes),
        revision = diagnostics.state_revision,
        "Simulation complete"
    );
    engine.shutdown();
    Ok(())
}

fn run_frames(
    engine: &mut ViewportEngine,
    args: &SimulateArgs,
    start: Instant,
    frame_interval: Duration,
) -> Result<RunSummary, CliError> {
    let mut now = start;
    let step_px = args.velocity * frame_interval.as_secs_f64();
    let mut summary = RunSummary::default();
    let mut frame = 0;

    // A drag pans by start minus end: `step_px` deeper per sample.
    let drag = PaneEvent::Drag {
        start_px: step_px,
        end_px: 0.0,
        modifiers: Modifiers::NONE,
    };
    for _ in 0..GESTURE_SAMPLES {
        engine
            .session_mut(PRIMARY)?
            .handle_pane_event(FLUNG_PANE, &drag, now)?;
        frame += 1;
        run_frame(engine, frame, now, &mut summary)?;
        now += frame_interval;
    }
    engine
        .session_mut(PRIMARY)?
        .handle_pane_event(FLUNG_PANE, &PaneEvent::Release, now)?;

    while frame < args.frames {
        frame += 1;
        run_frame(engine, frame, now, &mut summary)?;
        now += frame_interval;
    }
    Ok(summary)
}

fn run_frame(
    engine: &mut ViewportEngine,
    frame: u32,
    now: Instant,
    summary: &mut RunSummary,
) -> Result<(), CliError> {
    for (id, report) in engine.frame(now)? {
        if id != PRIMARY {
            continue;
        }
        summary.applied_px += report.applied_px.abs();
        summary.prefetch_started += report.prefetch_started;
        summary.chunks_inserted += report.chunks_inserted;
        if report.entered_fast_motion && summary.fast_motion_frame.is_none() {
            summary.fast_motion_frame = Some(frame);
        }
        if report.settled && summary.settled_frame.is_none() {
            summary.settled_frame = Some(frame);
        }
    }
    engine.session_mut(PRIMARY)?.render_viewport(render_strip);
    summary.frames = frame;
    Ok(())
}
