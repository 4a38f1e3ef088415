// File: crates/timechart-core/src/chart.rs
// Summary: Chart engine: owns the view window, both value axes, interaction state and the refresh schedulers.

use std::rc::Rc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::annotation::{self, AnnotationForm};
use crate::axis::{AxisSide, XAxis, YAxis};
use crate::backend::{Backend, BackendFuture, Comment, CommentQuery};
use crate::color::ColorTable;
use crate::config::ChartConfig;
use crate::error::ChartError;
use crate::geometry::{PixelPoint, Rect};
use crate::hit::{hit_test, AnnotationHitbox, Hit, Tooltip};
use crate::histogram::Histogram;
use crate::interaction::{DragMode, DragState, Gesture, Interaction};
use crate::scale::{project, PixelTable};
use crate::scheduler::{Admission, Scheduler};
use crate::series::{format_timestamp, from_ms, parse_timestamp, to_ms, Dataset};
use crate::theme::Theme;
use crate::types::{Insets, HEIGHT, WIDTH};
use crate::view::ViewState;

/// Approximate advance of one label glyph, for laying out legend entries and boxes.
pub(crate) const CHAR_ADVANCE_PX: f64 = 7.0;
pub(crate) const LEGEND_SWATCH_PX: f64 = 10.0;

/// Text of the two datetime fields, and whether they currently hold a rejected range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeFields {
    pub start: String,
    pub end: String,
    pub invalid: bool,
}

/// One legend entry; `rect` is in plot coordinates (the legend sits above the plot).
#[derive(Clone, Debug, PartialEq)]
pub struct LegendEntry {
    pub id: String,
    pub side: AxisSide,
    pub rect: Rect,
}

impl LegendEntry {
    pub fn label(&self) -> String {
        let tag = match self.side {
            AxisSide::Left => 'L',
            AxisSide::Right => 'R',
        };
        format!("{} ({tag})", self.id)
    }
}

/// Everything fetched by one refresh job.
pub struct RefreshBatch {
    datasets: Vec<(String, Option<Dataset>)>,
    /// `None` when the comment query failed; the previous annotations stay.
    comments: Option<Vec<Comment>>,
}

/// A finished annotation edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Created(i64),
    Updated(i64),
    Deleted(i64),
}

enum Edit {
    Create(Comment),
    Update(Comment),
    Delete(i64),
}

/// Interactive time-series chart session.
///
/// Public pointer entry points take surface coordinates; everything stored inside
/// is relative to the plot's top-left corner. Every mutation of the view window
/// re-projects all datasets before returning, so hit-testing never sees stale
/// pixels.
pub struct Chart {
    pub(crate) config: ChartConfig,
    pub(crate) theme: Theme,
    backend: Rc<dyn Backend>,
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) insets: Insets,
    pub(crate) x_axis: XAxis,
    pub(crate) y_axes: [YAxis; 2],
    pub(crate) colors: ColorTable,
    pub(crate) interaction: Interaction,
    /// Domain at the start of a pan drag, restored if the pointer leaves.
    pan_origin: Option<(f64, f64)>,
    refreshes: Scheduler<RefreshBatch>,
    edits: Scheduler<EditOutcome>,
    pub(crate) comments: Vec<Comment>,
    pub(crate) pixels: PixelTable,
    pub(crate) hitboxes: Vec<AnnotationHitbox>,
    pub(crate) legend: Vec<LegendEntry>,
    pub(crate) tooltip: Option<Tooltip>,
    pub(crate) hovered_annotation: Option<i64>,
    pub(crate) pointer: Option<PixelPoint>,
    pub(crate) distribution: Option<String>,
    distribution_from_legend: bool,
    pub(crate) form: Option<AnnotationForm>,
    pub(crate) fields: RangeFields,
    needs_render: bool,
}

fn plot_extent(total: i32, inset: u32) -> f64 {
    (f64::from(total) - f64::from(inset)).max(1.0)
}

impl Chart {
    /// New session showing the trailing `default_window_secs` with no datasets.
    pub fn new(backend: Rc<dyn Backend>, config: ChartConfig) -> Result<Self, ChartError> {
        config.validate()?;
        let insets = Insets::default();
        let end = to_ms(Utc::now());
        let start = end - config.default_window_secs as f64 * 1_000.0;
        let mut chart = Self {
            theme: crate::theme::find(&config.theme),
            backend,
            width: WIDTH,
            height: HEIGHT,
            insets,
            x_axis: XAxis::new(start, end, plot_extent(WIDTH, insets.hsum())),
            y_axes: [YAxis::new(AxisSide::Left), YAxis::new(AxisSide::Right)],
            colors: ColorTable::new(),
            interaction: Interaction::new(config.drag_mode, config.click_threshold_px),
            pan_origin: None,
            refreshes: Scheduler::new("refresh", config.max_concurrent_refreshes, config.refresh_queue_capacity),
            edits: Scheduler::new("edit", 1, config.edit_queue_capacity),
            comments: Vec::new(),
            pixels: PixelTable::default(),
            hitboxes: Vec::new(),
            legend: Vec::new(),
            tooltip: None,
            hovered_annotation: None,
            pointer: None,
            distribution: None,
            distribution_from_legend: false,
            form: None,
            fields: RangeFields::default(),
            needs_render: true,
            config,
        };
        chart.relayout();
        Ok(chart)
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self.needs_render = true;
        self
    }

    pub fn with_insets(mut self, insets: Insets) -> Self {
        self.insets = insets;
        self.x_axis.pixel_width = self.plot_width();
        self.relayout();
        self
    }

    // ---- accessors ----------------------------------------------------------

    pub fn config(&self) -> &ChartConfig { &self.config }
    pub fn theme(&self) -> &Theme { &self.theme }
    pub fn size(&self) -> (i32, i32) { (self.width, self.height) }
    pub fn insets(&self) -> Insets { self.insets }
    pub fn x_axis(&self) -> &XAxis { &self.x_axis }
    pub fn y_axis(&self, side: AxisSide) -> &YAxis { &self.y_axes[side.index()] }
    pub fn pixels(&self) -> &PixelTable { &self.pixels }
    pub fn comments(&self) -> &[Comment] { &self.comments }
    pub fn legend(&self) -> &[LegendEntry] { &self.legend }
    pub fn colors(&self) -> &ColorTable { &self.colors }
    pub fn tooltip(&self) -> Option<&Tooltip> { self.tooltip.as_ref() }
    pub fn hovered_annotation(&self) -> Option<i64> { self.hovered_annotation }
    pub fn form(&self) -> Option<&AnnotationForm> { self.form.as_ref() }
    pub fn range_fields(&self) -> &RangeFields { &self.fields }
    pub fn drag_state(&self) -> &DragState { self.interaction.state() }
    pub fn mode(&self) -> DragMode { self.interaction.mode }
    pub fn distribution_target(&self) -> Option<&str> { self.distribution.as_deref() }

    pub fn plot_width(&self) -> f64 { plot_extent(self.width, self.insets.hsum()) }
    pub fn plot_height(&self) -> f64 { plot_extent(self.height, self.insets.vsum()) }

    /// Plot area in plot coordinates.
    pub fn plot_rect(&self) -> Rect {
        Rect::from_ltwh(0.0, 0.0, self.plot_width(), self.plot_height())
    }

    pub fn owner_of(&self, id: &str) -> Option<AxisSide> {
        AxisSide::BOTH.into_iter().find(|s| self.y_axes[s.index()].owns(id))
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.y_axes.iter().find_map(|a| a.get(id))
    }

    /// Ids of every dataset on the chart, left axis first.
    pub fn dataset_ids(&self) -> Vec<String> {
        self.y_axes.iter().flat_map(|a| a.ids().map(str::to_string)).collect()
    }

    /// Refresh and edit jobs still running or waiting.
    pub fn pending_jobs(&self) -> usize {
        self.refreshes.running() + self.refreshes.waiting() + self.edits.running() + self.edits.waiting()
    }

    pub fn refreshes_evicted(&self) -> u64 { self.refreshes.evicted() }
    pub fn refreshes_failed(&self) -> u64 { self.refreshes.failed() }

    /// Whether anything changed since the last call.
    pub fn take_needs_render(&mut self) -> bool {
        std::mem::take(&mut self.needs_render)
    }

    // ---- surface ------------------------------------------------------------

    pub fn resize(&mut self, width: i32, height: i32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.x_axis.pixel_width = self.plot_width();
        debug!(width = self.width, height = self.height, "resized");
        self.relayout();
        self.request_refresh();
    }

    fn to_plot(&self, x: f64, y: f64) -> PixelPoint {
        PixelPoint::new(x - f64::from(self.insets.left), y - f64::from(self.insets.top))
    }

    // ---- pointer ------------------------------------------------------------

    pub fn on_pointer_down(&mut self, x: f64, y: f64) {
        let p = self.to_plot(x, y);
        let axis = if p.x < 0.0 {
            Some(AxisSide::Left)
        } else if p.x > self.plot_width() {
            Some(AxisSide::Right)
        } else {
            None
        };
        self.interaction.on_pointer_down(p.x, p.y, axis);
        self.pan_origin = (self.interaction.mode == DragMode::Pan && axis.is_none())
            .then_some((self.x_axis.domain_start, self.x_axis.domain_end));
        self.tooltip = None;
        self.needs_render = true;
    }

    pub fn on_pointer_move(&mut self, x: f64, y: f64) {
        let p = self.to_plot(x, y);
        self.pointer = Some(p);
        if self.interaction.is_dragging() {
            if let Some(dx) = self.interaction.on_pointer_move(p.x, p.y) {
                self.x_axis.pan_px(dx);
                self.relayout();
            }
            self.needs_render = true;
            return;
        }
        self.hover(p);
    }

    pub fn on_pointer_up(&mut self, x: f64, y: f64) {
        let p = self.to_plot(x, y);
        let gesture = self.interaction.on_pointer_up(p.x, p.y);
        let pan_origin = self.pan_origin.take();
        match gesture {
            Gesture::Click { x, y } => {
                if let Some((start, end)) = pan_origin {
                    if (start, end) != (self.x_axis.domain_start, self.x_axis.domain_end) {
                        self.x_axis.set_domain(start, end);
                        self.relayout();
                    }
                }
                self.click(PixelPoint::new(x, y));
            }
            Gesture::Zoom { from_px, to_px } => {
                let w = self.plot_width();
                let start = self.x_axis.from_px(from_px.clamp(0.0, w));
                let end = self.x_axis.from_px(to_px.clamp(0.0, w));
                if end - start > self.config.min_domain_ms {
                    self.x_axis.set_domain(start, end);
                    info!(start, end, "zoomed to selection");
                    self.relayout();
                    self.request_refresh();
                } else {
                    debug!(width_ms = end - start, "zoom selection below minimum width; ignored");
                }
            }
            Gesture::PanEnd { dx } => {
                self.x_axis.pan_px(dx);
                self.relayout();
                self.request_refresh();
            }
            Gesture::Ignored => {}
        }
        self.needs_render = true;
    }

    /// Pointer left the surface: any drag is discarded; a pan returns to where it began.
    pub fn on_pointer_leave(&mut self) {
        let origin = self.pan_origin.take();
        if self.interaction.on_pointer_leave() {
            if let Some((start, end)) = origin {
                self.x_axis.set_domain(start, end);
                self.relayout();
            }
        }
        self.pointer = None;
        self.tooltip = None;
        self.hovered_annotation = None;
        if self.distribution_from_legend {
            self.distribution = None;
            self.distribution_from_legend = false;
        }
        self.needs_render = true;
    }

    /// Wheel zoom around surface `x`. Positive `delta` (scrolling down) zooms out.
    pub fn on_wheel(&mut self, x: f64, delta: f64) {
        if delta == 0.0 || !delta.is_finite() {
            return;
        }
        let pivot = (x - f64::from(self.insets.left)).clamp(0.0, self.plot_width());
        self.zoom_around(pivot, self.config.wheel_zoom_step.copysign(delta));
    }

    pub fn zoom_in(&mut self) -> bool {
        self.zoom_around(self.plot_width() / 2.0, -self.config.wheel_zoom_step)
    }

    pub fn zoom_out(&mut self) -> bool {
        self.zoom_around(self.plot_width() / 2.0, self.config.wheel_zoom_step)
    }

    fn zoom_around(&mut self, pivot_px: f64, factor: f64) -> bool {
        if !self.x_axis.zoom_at(pivot_px, factor, self.config.min_domain_ms) {
            debug!(factor, width_ms = self.x_axis.width(), "zoom refused");
            return false;
        }
        self.relayout();
        self.request_refresh();
        true
    }

    pub fn set_mode(&mut self, mode: DragMode) {
        if self.interaction.mode != mode {
            debug!(?mode, "drag mode changed");
            self.interaction.mode = mode;
            self.needs_render = true;
        }
    }

    fn hover(&mut self, p: PixelPoint) {
        let legend_hit = self.legend_at(p);
        match legend_hit {
            Some(id) => {
                if self.distribution.as_deref() != Some(id.as_str()) {
                    self.distribution = Some(id);
                    self.needs_render = true;
                }
                self.distribution_from_legend = true;
            }
            None if self.distribution_from_legend => {
                self.distribution = None;
                self.distribution_from_legend = false;
                self.needs_render = true;
            }
            None => {}
        }

        let hit = if self.plot_rect().contains(p) {
            hit_test(p, &self.hitboxes, &self.pixels, self.config.hit_tolerance_px)
        } else {
            None
        };
        let (tooltip, hovered) = match hit {
            Some(Hit::Annotation(id)) => (None, Some(id)),
            Some(Hit::Point(t)) => (Some(t), None),
            None => (None, None),
        };
        if tooltip != self.tooltip || hovered != self.hovered_annotation {
            self.tooltip = tooltip;
            self.hovered_annotation = hovered;
            self.needs_render = true;
        }
    }

    /// A legend entry toggles its dataset's axis. On the plot: an annotation opens
    /// its edit form; otherwise an open form closes, or a new-annotation form opens
    /// at the clicked time.
    fn click(&mut self, p: PixelPoint) {
        if let Some(id) = self.legend_at(p) {
            if let Err(e) = self.toggle_dataset_axis(&id) {
                warn!(dataset = %id, error = %e, "legend toggle failed");
            }
            return;
        }
        let annotation = self.hitboxes.iter().find(|h| h.rect.contains(p)).map(|h| h.id);
        if let Some(comment) = annotation.and_then(|id| self.comments.iter().find(|c| c.id == id)) {
            debug!(id = comment.id, "editing annotation");
            self.form = Some(AnnotationForm::Edit { comment: comment.clone() });
        } else if self.form.take().is_some() {
            debug!("annotation form closed");
        } else if self.plot_rect().contains(p) {
            if let Some(at) = from_ms(self.x_axis.from_px(p.x)) {
                debug!(at = %format_timestamp(at), "new annotation form");
                self.form = Some(AnnotationForm::New { at });
            }
        }
        self.needs_render = true;
    }

    // ---- window -------------------------------------------------------------

    pub fn set_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ChartError> {
        if start >= end {
            let err = ChartError::InvalidRange { start: format_timestamp(start), end: format_timestamp(end) };
            self.reject_fields(format_timestamp(start), format_timestamp(end), &err);
            return Err(err);
        }
        self.x_axis.set_domain(to_ms(start), to_ms(end));
        info!(start = %format_timestamp(start), end = %format_timestamp(end), "range set");
        self.relayout();
        self.request_refresh();
        Ok(())
    }

    /// Apply text typed into the datetime fields. Rejected text stays in the fields,
    /// flagged invalid, and the current window is kept.
    pub fn set_range_text(&mut self, start: &str, end: &str) -> Result<(), ChartError> {
        let parsed = parse_timestamp(start).and_then(|s| parse_timestamp(end).map(|e| (s, e)));
        let result = parsed.and_then(|(s, e)| self.set_range(s, e));
        if let Err(e) = &result {
            self.reject_fields(start.to_string(), end.to_string(), e);
        }
        result
    }

    fn reject_fields(&mut self, start: String, end: String, err: &ChartError) {
        warn!(error = %err, "range edit rejected");
        self.fields = RangeFields { start, end, invalid: true };
        self.needs_render = true;
    }

    fn sync_fields(&mut self) {
        let text = |ms: f64| from_ms(ms).map(format_timestamp).unwrap_or_default();
        self.fields = RangeFields {
            start: text(self.x_axis.domain_start),
            end: text(self.x_axis.domain_end),
            invalid: false,
        };
    }

    // ---- datasets -----------------------------------------------------------

    /// Put `id` on the left axis and fetch it. No-op if either axis already owns it.
    pub fn add_dataset(&mut self, id: &str) -> bool {
        self.add_dataset_to(id, AxisSide::Left)
    }

    pub fn add_dataset_to(&mut self, id: &str, side: AxisSide) -> bool {
        if let Some(owner) = self.owner_of(id) {
            debug!(dataset = id, axis = ?owner, "dataset already on the chart");
            return false;
        }
        self.colors.color_for(id);
        self.y_axes[side.index()].adopt(Dataset::new(id));
        info!(dataset = id, axis = ?side, "dataset added");
        self.relayout();
        self.request_refresh();
        true
    }

    pub fn remove_dataset(&mut self, id: &str) -> Result<(), ChartError> {
        let side = self.owner_of(id).ok_or_else(|| ChartError::UnknownDataset(id.to_string()))?;
        self.y_axes[side.index()].release(id);
        if self.distribution.as_deref() == Some(id) {
            self.distribution = None;
            self.distribution_from_legend = false;
        }
        info!(dataset = id, axis = ?side, "dataset removed");
        self.relayout();
        Ok(())
    }

    /// Move `id` to the other axis, keeping its points. Returns the new side.
    pub fn toggle_dataset_axis(&mut self, id: &str) -> Result<AxisSide, ChartError> {
        let from = self.owner_of(id).ok_or_else(|| ChartError::UnknownDataset(id.to_string()))?;
        let to = from.other();
        if let Some(d) = self.y_axes[from.index()].release(id) {
            self.y_axes[to.index()].adopt(d);
        }
        info!(dataset = id, axis = ?to, "dataset moved");
        self.relayout();
        Ok(to)
    }

    /// Hand free-text dataset discovery to the backend.
    pub fn search_datasets(&self, text: &str) -> BackendFuture<Vec<String>> {
        self.backend.search_datasets(text)
    }

    /// Select the dataset whose value distribution is drawn, or clear it.
    pub fn set_distribution_target(&mut self, id: Option<&str>) -> Result<(), ChartError> {
        if let Some(id) = id {
            if self.owner_of(id).is_none() {
                return Err(ChartError::UnknownDataset(id.to_string()));
            }
        }
        self.distribution = id.map(str::to_string);
        self.distribution_from_legend = false;
        self.needs_render = true;
        Ok(())
    }

    /// Histogram of the target dataset over the visible window, if it has values there.
    pub fn distribution(&self) -> Option<(&str, Histogram)> {
        let id = self.distribution.as_deref()?;
        let dataset = self.dataset(id)?;
        Histogram::for_window(dataset, self.x_axis.domain_start, self.x_axis.domain_end, self.config.histogram_max_bars)
            .map(|h| (id, h))
    }

    // ---- annotations --------------------------------------------------------

    /// Save the open form with `text`: creates a new annotation or updates the one
    /// being edited. The form closes; the chart refreshes once the store answers.
    pub fn submit_annotation(&mut self, text: &str) -> Result<Admission, ChartError> {
        let form = self.form.take().ok_or(ChartError::NoAnnotationForm)?;
        let edit = match form {
            AnnotationForm::New { at } => Edit::Create(Comment::new(at, text, self.config.comment_tags.clone())),
            AnnotationForm::Edit { mut comment } => {
                comment.text = text.to_string();
                Edit::Update(comment)
            }
        };
        self.needs_render = true;
        Ok(self.edits.enqueue(run_edit(Rc::clone(&self.backend), edit)))
    }

    /// Delete the annotation being edited. A draft for a new annotation is just
    /// discarded (`Ok(None)`).
    pub fn delete_annotation(&mut self) -> Result<Option<Admission>, ChartError> {
        let form = self.form.take().ok_or(ChartError::NoAnnotationForm)?;
        self.needs_render = true;
        Ok(form.editing().map(|id| self.edits.enqueue(run_edit(Rc::clone(&self.backend), Edit::Delete(id)))))
    }

    pub fn close_annotation_form(&mut self) {
        if self.form.take().is_some() {
            self.needs_render = true;
        }
    }

    // ---- share link ---------------------------------------------------------

    pub fn view_state(&self) -> ViewState {
        ViewState {
            start: from_ms(self.x_axis.domain_start).unwrap_or_default(),
            end: from_ms(self.x_axis.domain_end).unwrap_or_default(),
            left: self.y_axes[0].ids().map(str::to_string).collect(),
            right: self.y_axes[1].ids().map(str::to_string).collect(),
        }
    }

    pub fn share_query(&self) -> String {
        self.view_state().to_query()
    }

    /// Make the chart show `view`: window, and exactly its datasets on its axes.
    pub fn apply_view(&mut self, view: &ViewState) -> Result<(), ChartError> {
        if view.start >= view.end {
            return Err(ChartError::InvalidRange { start: format_timestamp(view.start), end: format_timestamp(view.end) });
        }
        for id in self.dataset_ids() {
            if !view.left.contains(&id) && !view.right.contains(&id) {
                if let Some(side) = self.owner_of(&id) {
                    self.y_axes[side.index()].release(&id);
                }
            }
        }
        for (side, ids) in [(AxisSide::Left, &view.left), (AxisSide::Right, &view.right)] {
            for id in ids {
                match self.owner_of(id) {
                    Some(owner) if owner == side => {}
                    Some(owner) => {
                        if let Some(d) = self.y_axes[owner.index()].release(id) {
                            self.y_axes[side.index()].adopt(d);
                        }
                    }
                    None => {
                        self.colors.color_for(id);
                        self.y_axes[side.index()].adopt(Dataset::new(id.as_str()));
                    }
                }
            }
        }
        if self.distribution.as_deref().is_some_and(|id| self.owner_of(id).is_none()) {
            self.distribution = None;
        }
        self.x_axis.set_domain(to_ms(view.start), to_ms(view.end));
        info!(left = view.left.len(), right = view.right.len(), "view applied");
        self.relayout();
        self.request_refresh();
        Ok(())
    }

    /// Restore a session from a share-link query. Bad parameters fall back to the
    /// current view; the returned error is the alert to show, if any.
    pub fn load_share_query(&mut self, query: &str) -> Option<ChartError> {
        let parsed = ViewState::from_query(query, &self.view_state());
        if let Err(e) = self.apply_view(&parsed.view) {
            warn!(error = %e, "share link not applied");
            return Some(e);
        }
        if let Some(alert) = &parsed.alert {
            warn!(error = %alert, "share link window rejected");
        }
        parsed.alert
    }

    // ---- refresh ------------------------------------------------------------

    /// Queue a fetch of every owned dataset and the annotations for the current window.
    pub fn request_refresh(&mut self) -> Admission {
        let (Some(start), Some(end)) = (from_ms(self.x_axis.domain_start), from_ms(self.x_axis.domain_end)) else {
            warn!(start = self.x_axis.domain_start, end = self.x_axis.domain_end, "window outside representable time");
            return Admission::Rejected;
        };
        let query = CommentQuery { start, end, tags: self.config.comment_tags.clone() };
        let admission = self.refreshes.enqueue(fetch_view(Rc::clone(&self.backend), self.dataset_ids(), query));
        debug!(?admission, "refresh requested");
        admission
    }

    /// Drive pending edits and refreshes, applying whatever has arrived.
    /// `Ready` once nothing is left running or waiting.
    pub fn poll_refresh(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        loop {
            let edits = self.edits.poll_next(cx);
            let edited = matches!(edits, Poll::Ready(Some(_)));
            if let Poll::Ready(Some(outcome)) = edits {
                self.apply_edit(outcome);
            }
            let refreshes = self.refreshes.poll_next(cx);
            let refreshed = matches!(refreshes, Poll::Ready(Some(_)));
            if let Poll::Ready(Some(batch)) = refreshes {
                self.apply_refresh(batch);
            }
            if edited || refreshed {
                continue;
            }
            if self.edits.is_idle() && self.refreshes.is_idle() {
                return Poll::Ready(());
            }
            return Poll::Pending;
        }
    }

    /// Wait until every queued edit and refresh has finished and been applied.
    pub async fn settle(&mut self) {
        futures::future::poll_fn(|cx| self.poll_refresh(cx)).await
    }

    fn apply_edit(&mut self, outcome: EditOutcome) {
        info!(?outcome, "annotation saved");
        self.request_refresh();
    }

    /// Replace each returned dataset wholesale. No staleness check: a response for
    /// an older window still lands. Invalid responses and datasets no longer on the
    /// chart are skipped.
    fn apply_refresh(&mut self, batch: RefreshBatch) {
        for (id, dataset) in batch.datasets {
            let Some(dataset) = dataset else {
                warn!(dataset = %id, "invalid data response dropped");
                continue;
            };
            match self.owner_of(&id).and_then(|side| self.y_axes[side.index()].get_mut(&id)) {
                Some(slot) => slot.points = dataset.points,
                None => debug!(dataset = %id, "response for a dataset no longer on the chart"),
            }
        }
        if let Some(comments) = batch.comments {
            self.comments = comments;
        }
        debug!(comments = self.comments.len(), "refresh applied");
        self.relayout();
        if let Some(p) = self.pointer.filter(|_| !self.interaction.is_dragging()) {
            self.hover(p);
        }
    }

    // ---- layout -------------------------------------------------------------

    /// After a view or data change: re-project, drop hover state, resync the fields.
    fn relayout(&mut self) {
        self.reproject();
        self.tooltip = None;
        self.hovered_annotation = None;
        self.sync_fields();
        self.needs_render = true;
    }

    /// Rescale both value axes to the window, re-project every dataset, and
    /// rebuild annotation hitboxes and the legend.
    pub(crate) fn reproject(&mut self) {
        let plot_h = self.plot_height();
        let (start, end) = (self.x_axis.domain_start, self.x_axis.domain_end);
        for axis in &mut self.y_axes {
            axis.rescale(start, end, plot_h, self.config.y_padding_fraction, self.config.flat_range_margin);
        }
        self.pixels = project(&self.x_axis, &self.y_axes);
        self.hitboxes = annotation::hitboxes(&self.comments, &self.x_axis, plot_h, self.config.annotation_glyph_px);
        self.legend = self.layout_legend();
    }

    fn legend_at(&self, p: PixelPoint) -> Option<String> {
        self.legend.iter().find(|e| e.rect.contains(p)).map(|e| e.id.clone())
    }

    fn layout_legend(&self) -> Vec<LegendEntry> {
        let top = f64::from(self.insets.top);
        let height = (top - 8.0).max(8.0);
        let y = -top + (top - height) / 2.0;
        let mut x = 0.0;
        let mut out = Vec::new();
        for axis in &self.y_axes {
            for id in axis.ids() {
                let mut entry = LegendEntry { id: id.to_string(), side: axis.side, rect: Rect::default() };
                let width = LEGEND_SWATCH_PX + 6.0 + entry.label().chars().count() as f64 * CHAR_ADVANCE_PX;
                entry.rect = Rect::from_ltwh(x, y, width, height);
                x += width + 12.0;
                out.push(entry);
            }
        }
        out
    }
}

/// Each dataset and the comment query succeed or fail on their own; a failed
/// fetch leaves its slot untouched. The job only fails when nothing arrived.
async fn fetch_view(backend: Rc<dyn Backend>, ids: Vec<String>, query: CommentQuery) -> anyhow::Result<RefreshBatch> {
    let fetches = futures::future::join_all(ids.iter().map(|id| backend.fetch_dataset(id, query.start, query.end)));
    let (results, comments) = futures::future::join(fetches, backend.fetch_comments(&query)).await;

    let mut datasets = Vec::with_capacity(ids.len());
    let mut last_error = None;
    for (id, result) in ids.into_iter().zip(results) {
        match result {
            Ok(dataset) => datasets.push((id, dataset)),
            Err(e) => {
                warn!(dataset = %id, error = %e, "dataset fetch failed; keeping last good points");
                last_error = Some(e);
            }
        }
    }
    let comments = match comments {
        Ok(comments) => Some(comments),
        Err(e) => {
            warn!(error = %e, "comment fetch failed; keeping current annotations");
            last_error = Some(e);
            None
        }
    };
    match last_error {
        Some(e) if datasets.is_empty() && comments.is_none() => Err(e.into()),
        _ => Ok(RefreshBatch { datasets, comments }),
    }
}

async fn run_edit(backend: Rc<dyn Backend>, edit: Edit) -> anyhow::Result<EditOutcome> {
    Ok(match edit {
        Edit::Create(comment) => EditOutcome::Created(backend.create_comment(&comment).await?),
        Edit::Update(comment) => {
            backend.update_comment(&comment).await?;
            EditOutcome::Updated(comment.id)
        }
        Edit::Delete(id) => {
            backend.delete_comment(id).await?;
            EditOutcome::Deleted(id)
        }
    })
}
