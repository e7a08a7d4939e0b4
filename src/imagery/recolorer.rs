use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use super::raster::{recolor_image, ClassGrid};
use super::{BoundingBox, ImageSource, ImageryError, Palette, WmsLayer};

/// Fetches allowed to block at once; later requests wait or give up when superseded
pub const MAX_CONCURRENT_FETCHES: usize = 2;

/// What the display should show for a finished request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayImage {
    /// Recolored imagery as PNG, with the class of every pixel
    Recolored { png: Vec<u8>, classes: ClassGrid },
    /// Classification failed; show the untransformed image at this URL.
    /// `bytes` holds the fetched image when it was fetched and decodes.
    Raw { url: String, bytes: Option<Vec<u8>> },
}

/// One completed request, tagged with its sequence number and the extent it covers
#[derive(Clone, Debug, PartialEq)]
pub struct ImageFrame {
    pub seq: u64,
    pub date: String,
    pub bbox: BoundingBox,
    pub image: DisplayImage,
}

/// Receives finished frames. Must tolerate being called from worker threads.
pub trait DisplaySink: Send + Sync {
    fn present(&self, frame: ImageFrame);
}

impl DisplaySink for Sender<ImageFrame> {
    fn present(&self, frame: ImageFrame) {
        if self.send(frame).is_err() {
            debug!("display receiver dropped; frame discarded");
        }
    }
}

/// Counts fetches in flight. Waiters wake on every release and every new request.
#[derive(Default)]
struct FetchSlots {
    in_flight: Mutex<usize>,
    changed: Condvar,
}

impl FetchSlots {
    /// Blocks until a slot frees up. `None` if the request went stale while waiting.
    fn acquire(&self, limit: usize, is_stale: impl Fn() -> bool) -> Option<FetchSlot<'_>> {
        let guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self
            .changed
            .wait_while(guard, |n| *n >= limit && !is_stale())
            .unwrap_or_else(PoisonError::into_inner);
        if is_stale() {
            return None;
        }
        *guard += 1;
        Some(FetchSlot(self))
    }

    fn wake_all(&self) {
        // Take the lock so a waiter cannot miss the wakeup between its check and its wait
        drop(self.in_flight.lock().unwrap_or_else(PoisonError::into_inner));
        self.changed.notify_all();
    }
}

struct FetchSlot<'a>(&'a FetchSlots);

impl Drop for FetchSlot<'_> {
    fn drop(&mut self) {
        let mut n = self.0.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        *n = n.saturating_sub(1);
        drop(n);
        self.0.changed.notify_all();
    }
}

/// Fetches imagery for a date and recolors it into palette classes in the background
pub struct RasterRecolorer {
    layer: WmsLayer,
    palette: Arc<Palette>,
    bbox: BoundingBox,
    source: Arc<dyn ImageSource>,
    sink: Arc<dyn DisplaySink>,
    latest: Arc<AtomicU64>,
    slots: Arc<FetchSlots>,
}

impl RasterRecolorer {
    pub fn new(
        layer: WmsLayer,
        palette: Palette,
        bbox: BoundingBox,
        source: Arc<dyn ImageSource>,
        sink: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            layer,
            palette: Arc::new(palette),
            bbox,
            source,
            sink,
            latest: Arc::new(AtomicU64::new(0)),
            slots: Arc::new(FetchSlots::default()),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn layer(&self) -> &WmsLayer {
        &self.layer
    }

    pub fn default_bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Used by later requests only; in-flight ones keep the URL they started with
    pub fn set_default_bounding_box(&mut self, bbox: BoundingBox) {
        info!(%bbox, "default bounding box changed");
        self.bbox = bbox;
    }

    pub fn request_url(&self, date: &str) -> String {
        self.layer.request_url(date, &self.bbox)
    }

    /// Start a fetch-and-recolor pipeline for `date` and return its sequence number.
    /// Failures are logged and turned into a raw-image frame, never returned.
    pub fn load_and_recolor(&self, date: &str) -> u64 {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        // Requests waiting for a fetch slot are now stale
        self.slots.wake_all();

        let job = RecolorJob {
            seq,
            date: date.to_string(),
            bbox: self.bbox,
            url: self.request_url(date),
            width: self.layer.width,
            height: self.layer.height,
            palette: Arc::clone(&self.palette),
            source: Arc::clone(&self.source),
            sink: Arc::clone(&self.sink),
            latest: Arc::clone(&self.latest),
            slots: Arc::clone(&self.slots),
        };
        info!(seq, date, url = %job.url, "imagery requested");

        let spawned = thread::Builder::new()
            .name(format!("recolor-{seq}"))
            .spawn({
                let job = job.clone();
                move || job.run()
            });
        if let Err(e) = spawned {
            warn!(seq, error = %e, "could not start imagery worker; showing raw imagery");
            job.deliver(DisplayImage::Raw { url: job.url.clone(), bytes: None });
        }
        seq
    }
}

#[derive(Clone)]
struct RecolorJob {
    seq: u64,
    date: String,
    bbox: BoundingBox,
    url: String,
    width: u32,
    height: u32,
    palette: Arc<Palette>,
    source: Arc<dyn ImageSource>,
    sink: Arc<dyn DisplaySink>,
    latest: Arc<AtomicU64>,
    slots: Arc<FetchSlots>,
}

impl RecolorJob {
    fn is_stale(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.seq
    }

    fn run(self) {
        let Some(image) = self.process() else {
            debug!(seq = self.seq, date = %self.date, "superseded before recoloring");
            return;
        };
        if self.is_stale() {
            debug!(seq = self.seq, date = %self.date, "superseded; result discarded");
            return;
        }
        self.deliver(image);
    }

    /// `None` when a newer request arrived before the fetch finished
    fn process(&self) -> Option<DisplayImage> {
        let fetched = {
            let _slot = self.slots.acquire(MAX_CONCURRENT_FETCHES, || self.is_stale())?;
            self.source.fetch(&self.url)
        };
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => return Some(self.raw_fallback(&e, None)),
        };
        if self.is_stale() {
            return None;
        }
        match recolor_image(&bytes, self.width, self.height, &self.palette, &self.url) {
            Ok((png, classes)) => Some(DisplayImage::Recolored { png, classes }),
            // Undecodable bytes are no use to the display either
            Err(e @ ImageryError::Decode { .. }) => Some(self.raw_fallback(&e, None)),
            Err(e) => Some(self.raw_fallback(&e, Some(bytes))),
        }
    }

    fn raw_fallback(&self, error: &ImageryError, bytes: Option<Vec<u8>>) -> DisplayImage {
        warn!(seq = self.seq, date = %self.date, error = %error, "recolor failed; showing raw imagery");
        DisplayImage::Raw { url: self.url.clone(), bytes }
    }

    fn deliver(&self, image: DisplayImage) {
        self.sink.present(ImageFrame {
            seq: self.seq,
            date: self.date.clone(),
            bbox: self.bbox,
            image,
        });
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::RasterBuffer;
    use image::{Rgba, RgbaImage};
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Mutex;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn png(color: [u8; 4]) -> Vec<u8> {
        RasterBuffer::from_rgba(RgbaImage::from_pixel(4, 5, Rgba(color)))
            .encode_png()
            .unwrap()
    }

    struct Fixed(Vec<u8>);

    impl ImageSource for Fixed {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, ImageryError> {
            Ok(self.0.clone())
        }
    }

    struct Offline;

    impl ImageSource for Offline {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageryError> {
            Err(ImageryError::Fetch { url: url.to_string(), reason: "offline".into() })
        }
    }

    /// Blocks requests for `slow_date` until the gate opens
    struct Gated {
        slow_date: &'static str,
        gate: Mutex<Receiver<()>>,
        body: Vec<u8>,
    }

    impl ImageSource for Gated {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageryError> {
            if url.ends_with(self.slow_date) {
                let _ = self.gate.lock().unwrap().recv();
            }
            Ok(self.body.clone())
        }
    }

    fn recolorer(source: Arc<dyn ImageSource>) -> (RasterRecolorer, Receiver<ImageFrame>) {
        let (tx, rx) = mpsc::channel();
        let layer = WmsLayer { width: 4, height: 5, ..WmsLayer::default() };
        let r = RasterRecolorer::new(layer, Palette::default(), BoundingBox::AMAZON, source, Arc::new(tx));
        (r, rx)
    }

    #[test]
    fn test_recolored_frame() {
        let (r, rx) = recolorer(Arc::new(Fixed(png([0, 30, 0, 255]))));
        let seq = r.load_and_recolor("2010-01-01");
        let frame = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(frame.seq, seq);
        assert_eq!(frame.date, "2010-01-01");
        match frame.image {
            DisplayImage::Recolored { png, classes } => {
                let img = image::load_from_memory(&png).unwrap().into_rgba8();
                assert_eq!(img.dimensions(), (4, 5));
                assert_eq!(img.get_pixel(2, 2).0, [101, 67, 33, 255]);
                assert_eq!(classes.histogram(5)[0], 20);
            }
            other => panic!("expected recolored frame, got {other:?}"),
        }
    }

    #[test]
    fn test_transparent_pixels_survive_pipeline() {
        let (r, rx) = recolorer(Arc::new(Fixed(png([12, 200, 40, 0]))));
        r.load_and_recolor("2015-01-01");
        let DisplayImage::Recolored { png, .. } = rx.recv_timeout(WAIT).unwrap().image else {
            panic!("expected recolored frame");
        };
        let img = image::load_from_memory(&png).unwrap().into_rgba8();
        assert!(img.pixels().all(|p| p.0 == [12, 200, 40, 0]));
    }

    #[test]
    fn test_fetch_failure_falls_back_to_raw_url() {
        let (r, rx) = recolorer(Arc::new(Offline));
        let expected = r.request_url("2020-01-01");
        r.load_and_recolor("2020-01-01");
        let frame = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(frame.image, DisplayImage::Raw { url: expected, bytes: None });
    }

    #[test]
    fn test_decode_failure_falls_back_to_raw_url() {
        let (r, rx) = recolorer(Arc::new(Fixed(b"<ServiceException/>".to_vec())));
        r.load_and_recolor("2008-01-01");
        let frame = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(
            frame.image,
            DisplayImage::Raw { ref url, bytes: None } if url.ends_with("time=2008-01-01")
        ));
    }

    #[test]
    fn test_bbox_change_applies_to_later_requests() {
        let (mut r, rx) = recolorer(Arc::new(Offline));
        r.set_default_bounding_box(BoundingBox::new(-5.0, -70.0, 5.0, -60.0).unwrap());
        r.load_and_recolor("2009-01-01");
        r.set_default_bounding_box(BoundingBox::AMAZON);
        let bbox = BoundingBox::new(-5.0, -70.0, 5.0, -60.0).unwrap();
        let frame = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(frame.bbox, bbox);
        let DisplayImage::Raw { url, .. } = frame.image else {
            panic!("expected raw frame");
        };
        assert!(url.contains("bbox=-5%2C-70%2C5%2C-60"));
    }

    #[test]
    fn test_stale_result_discarded() {
        let (open, gate) = mpsc::channel();
        let source = Gated { slow_date: "2005-01-01", gate: Mutex::new(gate), body: png([0, 90, 0, 255]) };
        let (r, rx) = recolorer(Arc::new(source));

        let first = r.load_and_recolor("2005-01-01");
        let second = r.load_and_recolor("2006-01-01");
        assert!(second > first);

        let frame = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(frame.seq, second);
        assert_eq!(frame.date, "2006-01-01");

        open.send(()).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_frame_keeps_request_bbox() {
        let (mut r, rx) = recolorer(Arc::new(Fixed(png([0, 30, 0, 255]))));
        r.load_and_recolor("2011-01-01");
        r.set_default_bounding_box(BoundingBox::new(-5.0, -70.0, 5.0, -60.0).unwrap());
        let frame = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(frame.bbox, BoundingBox::AMAZON);
    }

    /// Records every URL it is asked for; URLs ending in a gated date block until released
    struct Recording {
        gated: Vec<&'static str>,
        gate: Mutex<Receiver<()>>,
        fetched: Mutex<Vec<String>>,
        body: Vec<u8>,
    }

    impl ImageSource for Recording {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageryError> {
            self.fetched.lock().unwrap().push(url.to_string());
            if self.gated.iter().any(|d| url.ends_with(d)) {
                let _ = self.gate.lock().unwrap().recv();
            }
            Ok(self.body.clone())
        }
    }

    #[test]
    fn test_superseded_request_skips_fetch() {
        let (open, gate) = mpsc::channel();
        let source = Arc::new(Recording {
            gated: vec!["2005-01-01", "2006-01-01"],
            gate: Mutex::new(gate),
            fetched: Mutex::new(Vec::new()),
            body: png([0, 90, 0, 255]),
        });
        let (r, rx) = recolorer(Arc::clone(&source) as Arc<dyn ImageSource>);

        // Fill every fetch slot with a blocked request
        r.load_and_recolor("2005-01-01");
        r.load_and_recolor("2006-01-01");
        let started = std::time::Instant::now();
        while source.fetched.lock().unwrap().len() < MAX_CONCURRENT_FETCHES {
            assert!(started.elapsed() < WAIT, "blocked fetches never started");
            thread::sleep(Duration::from_millis(5));
        }

        r.load_and_recolor("2007-01-01");
        let last = r.load_and_recolor("2008-01-01");

        open.send(()).unwrap();
        open.send(()).unwrap();
        let frame = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(frame.seq, last);
        assert_eq!(frame.date, "2008-01-01");
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

        let fetched = source.fetched.lock().unwrap();
        assert!(!fetched.iter().any(|u| u.ends_with("2007-01-01")));
        assert_eq!(fetched.len(), 3);
    }

    #[test]
    fn test_stale_job_never_fetches() {
        let source = Arc::new(Recording {
            gated: vec![],
            gate: Mutex::new(mpsc::channel().1),
            fetched: Mutex::new(Vec::new()),
            body: png([0, 90, 0, 255]),
        });
        let (tx, rx) = mpsc::channel();
        let job = RecolorJob {
            seq: 1,
            date: "2010-01-01".into(),
            bbox: BoundingBox::AMAZON,
            url: "http://gibs.test/?time=2010-01-01".into(),
            width: 4,
            height: 5,
            palette: Arc::new(Palette::default()),
            source: Arc::clone(&source) as Arc<dyn ImageSource>,
            sink: Arc::new(tx),
            latest: Arc::new(AtomicU64::new(2)),
            slots: Arc::new(FetchSlots::default()),
        };
        job.run();
        assert!(source.fetched.lock().unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fetch_slots_release_on_drop() {
        let slots = FetchSlots::default();
        let a = slots.acquire(2, || false).unwrap();
        let _b = slots.acquire(2, || false).unwrap();
        assert_eq!(*slots.in_flight.lock().unwrap(), 2);
        drop(a);
        assert_eq!(*slots.in_flight.lock().unwrap(), 1);
        // A stale waiter gives up instead of blocking
        assert!(slots.acquire(1, || true).is_none());
    }
}
