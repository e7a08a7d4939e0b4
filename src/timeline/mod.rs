//! Year slider: maps a continuous pointer coordinate onto a fixed sequence of
//! dates and tells a listener when the committed date changes.
//!
//! Dragging only moves the preview position. A date is committed on drag end,
//! click, keyboard step or an explicit [`TimeSlider::set_date`].

mod scale;
mod sequence;

pub use scale::LinearScale;
pub use sequence::DateSequence;

use std::fmt;

/// Pixel range used until the UI reports a real track
const DEFAULT_TRACK: (f64, f64) = (50.0, 950.0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// `end_year` is before `start_year`
    InvalidRange { start_year: i32, end_year: i32 },
    /// The anchor month/day does not exist in `year`
    InvalidDate { year: i32, month: u32, day: u32 },
    /// `set_date` was given a date outside the sequence
    DateNotFound(String),
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineError::InvalidRange { start_year, end_year } => {
                write!(f, "end year {end_year} is before start year {start_year}")
            }
            TimelineError::InvalidDate { year, month, day } => {
                write!(f, "{year:04}-{month:02}-{day:02} is not a calendar date")
            }
            TimelineError::DateNotFound(date) => write!(f, "date {date} is not on the timeline"),
        }
    }
}

impl std::error::Error for TimelineError {}

/// Receives committed dates as ISO strings
pub trait DateListener {
    fn date_changed(&mut self, date: &str);
}

impl<F> DateListener for F
where
    F: FnMut(&str),
{
    fn date_changed(&mut self, date: &str) {
        self(date)
    }
}

/// Preview and committed positions. Both are always valid indices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SliderState {
    /// Where the handle is drawn; follows the pointer while dragging
    pub index: usize,
    /// Index of the last emitted date
    pub committed: usize,
}

pub struct TimeSlider {
    dates: DateSequence,
    scale: LinearScale,
    state: SliderState,
    dragging: bool,
    listener: Box<dyn DateListener>,
}

impl TimeSlider {
    /// Slider over January 1st of every year in `[start_year, end_year]`.
    /// Emits the first date before returning.
    pub fn new<L>(start_year: i32, end_year: i32, listener: L) -> Result<Self, TimelineError>
    where
        L: DateListener + 'static,
    {
        Self::with_anchor(start_year, end_year, 1, 1, listener)
    }

    /// Slider with a custom month/day anchor
    pub fn with_anchor<L>(
        start_year: i32,
        end_year: i32,
        month: u32,
        day: u32,
        listener: L,
    ) -> Result<Self, TimelineError>
    where
        L: DateListener + 'static,
    {
        let dates = DateSequence::yearly(start_year, end_year, month, day)?;
        let scale = LinearScale::new((0.0, dates.last_index() as f64), DEFAULT_TRACK);

        let mut slider = Self {
            dates,
            scale,
            state: SliderState::default(),
            dragging: false,
            listener: Box::new(listener),
        };
        slider.emit(0);
        Ok(slider)
    }

    pub fn dates(&self) -> &DateSequence {
        &self.dates
    }

    pub fn state(&self) -> SliderState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn committed_date(&self) -> &str {
        self.dates.get(self.state.committed).unwrap_or_default()
    }

    pub fn committed_year(&self) -> Option<i32> {
        self.dates.year(self.state.committed)
    }

    /// Date under the handle, which may not be committed yet
    pub fn preview_date(&self) -> &str {
        self.dates.get(self.state.index).unwrap_or_default()
    }

    /// Set the pixel span of the track. Reversed spans are normalized.
    pub fn set_track(&mut self, start: f64, end: f64) {
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        self.scale.set_range(lo, hi);
    }

    pub fn track(&self) -> (f64, f64) {
        self.scale.range()
    }

    /// Nearest index for a pointer coordinate, clamped to the sequence
    pub fn position_to_index(&self, coordinate: f64) -> usize {
        let raw = self.scale.invert(coordinate);
        if !raw.is_finite() {
            return 0;
        }
        raw.round().clamp(0.0, self.dates.last_index() as f64) as usize
    }

    pub fn index_to_position(&self, index: usize) -> f64 {
        self.scale.scale(index.min(self.dates.last_index()) as f64)
    }

    /// Handle position for the current preview index
    pub fn handle_position(&self) -> f64 {
        self.index_to_position(self.state.index)
    }

    /// Move the handle without committing
    pub fn on_drag_move(&mut self, coordinate: f64) {
        self.dragging = true;
        self.state.index = self.position_to_index(coordinate);
    }

    /// Finish a drag. Returns true if a new date was emitted.
    pub fn on_drag_end(&mut self, coordinate: f64) -> bool {
        self.dragging = false;
        self.commit(self.position_to_index(coordinate))
    }

    /// Jump to the nearest date. Returns true if a new date was emitted.
    pub fn on_click(&mut self, coordinate: f64) -> bool {
        self.commit(self.position_to_index(coordinate))
    }

    /// Move the committed index by `delta` entries, clamped at both ends
    pub fn step(&mut self, delta: isize) -> bool {
        let last = self.dates.last_index() as isize;
        let target = (self.state.committed as isize).saturating_add(delta).clamp(0, last);
        self.commit(target as usize)
    }

    /// Programmatic jump. Always notifies, even if the date is already committed.
    pub fn set_date(&mut self, date: &str) -> Result<(), TimelineError> {
        let index = self
            .dates
            .index_of(date)
            .ok_or_else(|| TimelineError::DateNotFound(date.to_string()))?;
        self.dragging = false;
        self.emit(index);
        Ok(())
    }

    /// Axis ticks: every `step`-th entry plus the last one
    pub fn tick_indices(&self, step: usize) -> Vec<usize> {
        let step = step.max(1);
        let last = self.dates.last_index();
        let mut ticks: Vec<usize> = (0..self.dates.len()).step_by(step).collect();
        if ticks.last() != Some(&last) {
            ticks.push(last);
        }
        ticks
    }

    fn commit(&mut self, index: usize) -> bool {
        self.state.index = index;
        if index == self.state.committed {
            return false;
        }
        self.emit(index);
        true
    }

    fn emit(&mut self, index: usize) {
        self.state.index = index;
        self.state.committed = index;
        if let Some(date) = self.dates.get(index) {
            tracing::debug!(date, index, "timeline commit");
            self.listener.date_changed(date);
        }
    }
}
