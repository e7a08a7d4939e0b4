use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use anyhow::Result;
use ratatui::layout::Rect;
use ratatui_image::picker::Picker;
use ratatui_image::protocol::StatefulProtocol;
use tracing::{debug, info, warn};

use crate::config::Args;
use crate::data;
use crate::events::{EventCatalog, HistoricalEvent};
use crate::imagery::{DisplayImage, ImageFrame, ImageSource, RasterRecolorer};
use crate::legend::Legend;
use crate::map::{classify_regions, MapRenderer, Viewport};
use crate::timeline::TimeSlider;

/// What the map panel shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Imagery,
    Borders,
    Choropleth,
}

impl ViewMode {
    pub fn next(self) -> Self {
        match self {
            ViewMode::Imagery => ViewMode::Borders,
            ViewMode::Borders => ViewMode::Choropleth,
            ViewMode::Choropleth => ViewMode::Imagery,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Imagery => "Imagery",
            ViewMode::Borders => "Borders",
            ViewMode::Choropleth => "Choropleth",
        }
    }
}

/// State of the imagery for the committed date
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading { seq: u64, date: String },
    Ready { date: String },
    /// Recoloring failed; the untransformed image is shown when it was fetched
    Raw { date: String, url: String },
}

impl LoadState {
    /// Date being loaded or shown, if any
    pub fn date(&self) -> Option<&str> {
        match self {
            LoadState::Idle => None,
            LoadState::Loading { date, .. } | LoadState::Ready { date } | LoadState::Raw { date, .. } => Some(date),
        }
    }
}

/// Application state
pub struct App {
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub slider: TimeSlider,
    pub recolorer: RasterRecolorer,
    pub legend: Legend,
    pub events: EventCatalog,
    pub view: ViewMode,
    pub load_state: LoadState,
    /// Terminal image of the latest recolored frame
    pub imagery: Option<StatefulProtocol>,
    /// Modal class per entry of `map_renderer.regions`
    pub region_classes: Vec<Option<usize>>,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position for cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    /// Map drawing area inside the border, set by the UI each frame
    pub map_area: Rect,
    /// Slider widget area, set by the UI each frame
    pub slider_area: Rect,
    picker: Option<Picker>,
    date_rx: Receiver<String>,
    frame_rx: Receiver<ImageFrame>,
    /// Sequence number of the newest request
    requested_seq: u64,
    /// Sequence number of the frame on screen
    shown_seq: u64,
}

impl App {
    pub fn new(args: &Args, picker: Option<Picker>, source: Arc<dyn ImageSource>) -> Result<Self> {
        // Committed dates are forwarded to the event loop, which owns the recolorer
        let (date_tx, date_rx) = mpsc::channel::<String>();
        let slider = TimeSlider::with_anchor(args.start_year, args.end_year, args.month, args.day, move |date: &str| {
            if date_tx.send(date.to_string()).is_err() {
                debug!(date, "event loop gone; date change dropped");
            }
        })?;

        let (frame_tx, frame_rx) = mpsc::channel::<ImageFrame>();
        let palette = args.palette();
        let legend = Legend::from_palette(&palette);
        let recolorer = RasterRecolorer::new(args.layer(), palette, args.bbox, source, Arc::new(frame_tx));

        let events = match &args.events {
            Some(path) => EventCatalog::from_json_file(path)?,
            None => EventCatalog::builtin(),
        };

        let mut map_renderer = MapRenderer::new();
        load_map_data(&mut map_renderer, &args.data_dir);

        Ok(Self {
            viewport: Viewport::fit(&args.bbox, 0, 0),
            map_renderer,
            slider,
            recolorer,
            legend,
            events,
            view: ViewMode::Imagery,
            load_state: LoadState::Idle,
            imagery: None,
            region_classes: Vec::new(),
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            map_area: Rect::default(),
            slider_area: Rect::default(),
            picker,
            date_rx,
            frame_rx,
            requested_seq: 0,
            shown_seq: 0,
        })
    }

    /// Start loads for newly committed dates and take in finished frames.
    /// Returns true if anything changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;

        while let Ok(date) = self.date_rx.try_recv() {
            let seq = self.recolorer.load_and_recolor(&date);
            self.requested_seq = seq;
            self.load_state = LoadState::Loading { seq, date };
            changed = true;
        }

        while let Ok(frame) = self.frame_rx.try_recv() {
            changed |= self.accept_frame(frame);
        }

        changed
    }

    fn accept_frame(&mut self, frame: ImageFrame) -> bool {
        let ImageFrame { seq, date, bbox, image } = frame;
        // Frames older than the newest request or the shown frame are superseded
        if seq < self.requested_seq.max(self.shown_seq) {
            debug!(seq, requested = self.requested_seq, shown = self.shown_seq, "superseded frame ignored");
            return false;
        }
        self.shown_seq = seq;

        match image {
            DisplayImage::Recolored { png, classes } => {
                // Classes line up with the extent the frame was requested for
                let class_count = self.recolorer.palette().len();
                self.region_classes = classify_regions(&self.map_renderer.regions, &classes, &bbox, class_count);
                match self.image_protocol(&png) {
                    Some(Err(e)) => {
                        warn!(seq, error = %e, "recolored frame could not be displayed");
                        self.imagery = None;
                        let url = self.recolorer.layer().request_url(&date, &bbox);
                        self.load_state = LoadState::Raw { date, url };
                    }
                    protocol => {
                        self.imagery = protocol.and_then(Result::ok);
                        info!(seq, date = %date, "imagery ready");
                        self.load_state = LoadState::Ready { date };
                    }
                }
            }
            DisplayImage::Raw { url, bytes } => {
                // Classes from another year would be misleading
                self.region_classes.clear();
                self.imagery = match bytes.as_deref().and_then(|b| self.image_protocol(b)) {
                    Some(Ok(protocol)) => Some(protocol),
                    Some(Err(e)) => {
                        warn!(seq, error = %e, "unprocessed imagery could not be decoded");
                        None
                    }
                    None => None,
                };
                self.load_state = LoadState::Raw { date, url };
            }
        }
        true
    }

    /// `None` without an image protocol
    fn image_protocol(&self, bytes: &[u8]) -> Option<Result<StatefulProtocol, image::ImageError>> {
        let picker = self.picker.as_ref()?;
        Some(image::load_from_memory(bytes).map(|img| picker.new_resize_protocol(img)))
    }

    pub fn has_image_support(&self) -> bool {
        self.picker.is_some()
    }

    pub fn year_events(&self) -> &[HistoricalEvent] {
        self.slider
            .committed_year()
            .map(|year| self.events.for_year(year))
            .unwrap_or(&[])
    }

    pub fn cycle_view(&mut self) {
        self.view = self.view.next();
    }

    /// Move the committed year; loads start on the next pump
    pub fn step_year(&mut self, delta: isize) {
        self.slider.step(delta);
    }

    pub fn first_year(&mut self) {
        self.slider.step(-(self.slider.dates().len() as isize));
    }

    pub fn last_year(&mut self) {
        self.slider.step(self.slider.dates().len() as isize);
    }

    pub fn in_slider(&self, col: u16, row: u16) -> bool {
        let a = self.slider_area;
        col >= a.x && col < a.x + a.width && row >= a.y && row < a.y + a.height
    }

    /// Grab the handle if the press is on it, otherwise jump to the pressed year
    pub fn slider_press(&mut self, col: u16) {
        let x = col as f64;
        if (x - self.slider.handle_position()).abs() <= 1.0 {
            self.slider.on_drag_move(x);
        } else {
            self.slider.on_click(x);
        }
    }

    pub fn slider_drag(&mut self, col: u16) {
        self.slider.on_drag_move(col as f64);
    }

    pub fn slider_release(&mut self, col: u16) {
        if self.slider.is_dragging() {
            self.slider.on_drag_end(col as f64);
        }
    }

    /// Pan the map
    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = self.to_map_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = self.to_map_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
    }

    /// Back to the imagery extent
    pub fn reset_view(&mut self) {
        let bbox = self.recolorer.default_bounding_box();
        self.viewport = Viewport::fit(&bbox, self.viewport.width, self.viewport.height);
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.viewport.zoom)
    }

    pub fn center_coords(&self) -> String {
        format!(
            "{:.1}°{}, {:.1}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }

    /// Pan by the mouse movement since the last drag event
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = (last_x as i32 - x as i32) * 2;
            let dy = (last_y as i32 - y as i32) * 4;
            self.pan(dx, dy);
        }
        self.last_mouse = Some((x, y));
    }

    /// Reset drag state when mouse button released
    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Mouse position in braille pixels relative to the map area
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        let (col, row) = self.mouse_pos?;
        let a = self.map_area;
        if col < a.x || row < a.y || col >= a.x + a.width || row >= a.y + a.height {
            return None;
        }
        Some(self.to_map_pixel(col, row))
    }

    /// Lon/lat under the mouse, if it is over the map
    pub fn mouse_coords(&self) -> Option<(f64, f64)> {
        let (px, py) = self.mouse_pixel_pos()?;
        Some(self.viewport.unproject(px, py))
    }

    /// Terminal cell to braille pixel (2x4 per cell) in map coordinates
    fn to_map_pixel(&self, col: u16, row: u16) -> (i32, i32) {
        let px = col.saturating_sub(self.map_area.x) as i32 * 2;
        let py = row.saturating_sub(self.map_area.y) as i32 * 4;
        (px, py)
    }
}

fn load_map_data(renderer: &mut MapRenderer, data_dir: &Path) {
    if data_dir.exists() {
        if let Err(e) = data::load_boundaries(renderer, data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "boundary data unavailable");
        }
    }

    // Fall back to a coarse outline if no data loaded
    if !renderer.has_data() {
        info!("no boundary files found; using built-in outline");
        data::generate_south_america(renderer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::{BoundingBox, ImageryError, Palette, RasterBuffer};
    use clap::Parser;
    use image::{Rgba, RgbaImage};
    use std::thread;
    use std::time::{Duration, Instant};

    struct Offline;

    impl ImageSource for Offline {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageryError> {
            Err(ImageryError::Fetch { url: url.to_string(), reason: "offline".into() })
        }
    }

    fn app() -> App {
        let args = Args::try_parse_from(["canopy", "--data-dir", "/nonexistent"]).unwrap();
        App::new(&args, None, Arc::new(Offline)).unwrap()
    }

    fn pump_until(app: &mut App, done: impl Fn(&App) -> bool) {
        let start = Instant::now();
        while !done(app) {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out: {:?}", app.load_state);
            app.pump();
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_initial_load_falls_back_to_raw() {
        let mut app = app();
        assert_eq!(app.load_state, LoadState::Idle);
        assert!(app.pump());
        assert_eq!(app.load_state.date(), Some("2005-01-01"));

        pump_until(&mut app, |a| matches!(a.load_state, LoadState::Raw { .. }));
        let LoadState::Raw { date, url } = &app.load_state else { unreachable!() };
        assert_eq!(date, "2005-01-01");
        assert!(url.ends_with("time=2005-01-01"));
        assert!(app.imagery.is_none());
    }

    #[test]
    fn test_step_year_requests_new_date() {
        let mut app = app();
        app.pump();
        app.step_year(5);
        assert_eq!(app.slider.committed_year(), Some(2010));
        assert_eq!(app.year_events()[0].title, "Major Drought");

        app.pump();
        assert_eq!(app.load_state.date(), Some("2010-01-01"));

        app.last_year();
        app.pump();
        assert_eq!(app.load_state.date(), Some("2024-01-01"));
        app.first_year();
        assert_eq!(app.slider.committed_date(), "2005-01-01");
    }

    #[test]
    fn test_recolored_frame_classifies_regions() {
        let mut app = app();
        let mut buf = RasterBuffer::from_rgba(RgbaImage::from_pixel(20, 20, Rgba([0, 240, 0, 255])));
        buf.recolor(&Palette::default());

        let accepted = app.accept_frame(ImageFrame {
            seq: 3,
            date: "2005-01-01".into(),
            bbox: BoundingBox::AMAZON,
            image: DisplayImage::Recolored { png: buf.encode_png().unwrap(), classes: buf.into_classes() },
        });
        assert!(accepted);
        assert_eq!(app.load_state, LoadState::Ready { date: "2005-01-01".into() });
        assert_eq!(app.region_classes, vec![Some(4)]);

        // Older frames never replace a newer one
        let stale = app.accept_frame(ImageFrame {
            seq: 2,
            date: "2006-01-01".into(),
            bbox: BoundingBox::AMAZON,
            image: DisplayImage::Raw { url: "http://x".into(), bytes: None },
        });
        assert!(!stale);
        assert_eq!(app.load_state, LoadState::Ready { date: "2005-01-01".into() });
    }

    #[test]
    fn test_regions_classified_against_frame_bbox() {
        let mut app = app();
        let mut buf = RasterBuffer::from_rgba(RgbaImage::from_pixel(20, 20, Rgba([0, 240, 0, 255])));
        buf.recolor(&Palette::default());

        // Requested over Europe; the default extent no longer matters
        let europe = BoundingBox::new(40.0, 0.0, 50.0, 10.0).unwrap();
        app.accept_frame(ImageFrame {
            seq: 1,
            date: "2005-01-01".into(),
            bbox: europe,
            image: DisplayImage::Recolored { png: buf.encode_png().unwrap(), classes: buf.into_classes() },
        });
        assert_eq!(app.region_classes, vec![None]);
    }

    #[test]
    fn test_raw_frame_with_bytes_clears_classes() {
        let mut app = app();
        app.region_classes = vec![Some(2)];
        let body = RasterBuffer::from_rgba(RgbaImage::from_pixel(4, 4, Rgba([0, 90, 0, 255])))
            .encode_png()
            .unwrap();

        assert!(app.accept_frame(ImageFrame {
            seq: 1,
            date: "2007-01-01".into(),
            bbox: BoundingBox::AMAZON,
            image: DisplayImage::Raw { url: "http://x".into(), bytes: Some(body) },
        }));
        assert_eq!(app.load_state, LoadState::Raw { date: "2007-01-01".into(), url: "http://x".into() });
        assert!(app.region_classes.is_empty());
        // No image protocol in tests, so nothing to draw
        assert!(app.imagery.is_none());
    }

    #[test]
    fn test_slider_mouse() {
        let mut app = app();
        app.slider_area = Rect::new(0, 30, 40, 3);
        app.slider.set_track(1.0, 39.0);
        app.pump();

        assert!(app.in_slider(10, 31));
        assert!(!app.in_slider(10, 29));

        // Press away from the handle jumps
        app.slider_press(39);
        assert_eq!(app.slider.committed_year(), Some(2024));

        // Press on the handle drags, and only the release commits
        app.slider_press(39);
        assert!(app.slider.is_dragging());
        app.slider_drag(1);
        assert_eq!(app.slider.committed_year(), Some(2024));
        app.slider_release(1);
        assert_eq!(app.slider.committed_year(), Some(2005));
        assert!(!app.slider.is_dragging());
    }

    #[test]
    fn test_view_cycle_and_reset() {
        let mut app = app();
        assert_eq!(app.view, ViewMode::Imagery);
        app.cycle_view();
        app.cycle_view();
        assert_eq!(app.view, ViewMode::Choropleth);
        app.cycle_view();
        assert_eq!(app.view, ViewMode::Imagery);

        app.viewport.width = 80;
        app.viewport.height = 80;
        app.zoom_in();
        app.pan(10, 10);
        app.reset_view();
        assert_eq!(app.viewport.zoom, 1.0);
        assert_eq!(app.viewport.width, 80);
    }

    #[test]
    fn test_mouse_coords_over_map() {
        let mut app = app();
        app.map_area = Rect::new(1, 1, 40, 20);
        app.viewport.width = 80;
        app.viewport.height = 80;
        app.set_mouse_pos(0, 0);
        assert_eq!(app.mouse_coords(), None);
        app.set_mouse_pos(21, 11);
        let (lon, lat) = app.mouse_coords().unwrap();
        assert!((lon - -57.7).abs() < 1.0);
        assert!((lat - -14.0).abs() < 1.0);
    }
}
