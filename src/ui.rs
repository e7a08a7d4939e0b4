use crate::app::{App, LoadState, ViewMode};
use crate::braille::BrailleCanvas;
use crate::events::HistoricalEvent;
use crate::legend::{LEGEND_TITLE, LEGEND_UNITS};
use crate::map::MapLayers;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};
use ratatui_image::StatefulImage;

/// Years between labelled slider ticks
const TICK_EVERY: usize = 4;

/// Render the UI
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // Map + side panel
            Constraint::Length(4), // Year slider
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(34)])
        .split(chunks[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(app.legend.len() as u16 + 4), Constraint::Min(4)])
        .split(body[1]);

    render_map(frame, app, body[0]);
    render_legend(frame, app, side[0]);
    render_events(frame, app, side[1]);
    render_slider(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);
}

fn rgb(color: [u8; 3]) -> Color {
    Color::Rgb(color[0], color[1], color[2])
}

fn render_map(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = match app.slider.committed_year() {
        Some(year) => format!(" South America · {year} · {} ", app.view.label()),
        None => format!(" South America · {} ", app.view.label()),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Braille gives 2x4 resolution per character
    app.map_area = inner;
    app.viewport.width = inner.width as usize * 2;
    app.viewport.height = inner.height as usize * 4;

    let cursor_pos = app.mouse_pixel_pos().map(|(px, py)| ((px / 2) as u16, (py / 4) as u16));
    let (w, h) = (inner.width as usize, inner.height as usize);

    match app.view {
        ViewMode::Imagery => {
            let message = imagery_message(app);
            match app.imagery.as_mut() {
                Some(protocol) => frame.render_stateful_widget(StatefulImage::default(), inner, protocol),
                None => frame.render_widget(
                    Paragraph::new(message)
                        .style(Style::default().fg(Color::DarkGray))
                        .wrap(Wrap { trim: true }),
                    inner,
                ),
            }
        }
        ViewMode::Borders => {
            let layers = app.map_renderer.render(w, h, &app.viewport);
            frame.render_widget(MapWidget { layers, fills: Vec::new(), cursor_pos }, inner);
        }
        ViewMode::Choropleth => {
            let palette = app.recolorer.palette();
            let fills = app
                .map_renderer
                .render_fills(w, h, &app.viewport, &app.region_classes, palette.len())
                .into_iter()
                .zip(palette.buckets().iter().map(|b| rgb(b.color)))
                .collect();
            let layers = app.map_renderer.render(w, h, &app.viewport);
            frame.render_widget(MapWidget { layers, fills, cursor_pos }, inner);
        }
    }
}

/// Text shown in place of the image
fn imagery_message(app: &App) -> Vec<Line<'static>> {
    if !app.has_image_support() {
        return vec![
            Line::from("This terminal has no image protocol."),
            Line::from("Press v for the border and choropleth views."),
        ];
    }
    match &app.load_state {
        LoadState::Idle => vec![Line::from("Waiting for a date…")],
        LoadState::Loading { date, .. } => vec![Line::from(format!("Loading imagery for {date}…"))],
        LoadState::Ready { date } => vec![Line::from(format!("Imagery for {date} could not be displayed."))],
        LoadState::Raw { date, url } => vec![
            Line::from(format!("Recoloring failed for {date}; unprocessed imagery:")),
            Line::from(""),
            Line::from(Span::styled(url.clone(), Style::default().fg(Color::Blue))),
        ],
    }
}

/// Braille outlines with optional per-class fills underneath
struct MapWidget {
    layers: MapLayers,
    fills: Vec<(BrailleCanvas, Color)>,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        for (col, row, ch) in canvas.cells() {
            if col >= area.width as usize || row >= area.height as usize {
                continue;
            }
            let x = area.x + col as u16;
            let y = area.y + row as u16;
            buf[(x, y)].set_char(ch).set_fg(color);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front: fills, subdivisions, country borders
        for (canvas, color) in &self.fills {
            Self::render_layer(canvas, *color, area, buf);
        }
        Self::render_layer(&self.layers.subdivisions, Color::DarkGray, area, buf);
        Self::render_layer(&self.layers.borders, Color::Yellow, area, buf);

        if let Some((cx, cy)) = self.cursor_pos {
            let x = area.x + cx;
            let y = area.y + cy;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn render_legend(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {LEGEND_TITLE} "),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let mut lines = vec![Line::from(Span::styled(LEGEND_UNITS, Style::default().fg(Color::DarkGray)))];
    lines.extend(app.legend.entries.iter().map(|entry| {
        Line::from(vec![
            Span::styled("██ ", Style::default().fg(rgb(entry.color))),
            Span::raw(entry.label.clone()),
        ])
    }));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_events(frame: &mut Frame, app: &App, area: Rect) {
    let panel = EventsPanel { year: app.slider.committed_year(), events: app.year_events() };
    frame.render_widget(panel, area);
}

/// Notable events for the committed year
struct EventsPanel<'a> {
    year: Option<i32>,
    events: &'a [HistoricalEvent],
}

impl Widget for EventsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.year {
            Some(year) => format!(" {year} Events "),
            None => " Events ".to_string(),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)));

        let lines: Vec<Line> = if self.events.is_empty() {
            vec![Line::from(Span::styled(
                "No major events recorded for this year",
                Style::default().fg(Color::DarkGray),
            ))]
        } else {
            self.events
                .iter()
                .flat_map(|event| {
                    [
                        Line::from(Span::styled(
                            format!("{} {}", event.icon, event.title),
                            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                        )),
                        Line::from(Span::styled(event.description.clone(), Style::default().fg(Color::Gray))),
                        Line::from(""),
                    ]
                })
                .collect()
        };

        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }).render(area, buf);
    }
}

fn render_slider(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            format!(" {} ", app.slider.preview_date()),
            Style::default().fg(Color::Yellow),
        ));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Leave room for half a year label on each side
    app.slider_area = area;
    let start = inner.x.saturating_add(2) as f64;
    let end = (inner.x + inner.width).saturating_sub(3) as f64;
    app.slider.set_track(start, end);

    let ticks = app
        .slider
        .tick_indices(TICK_EVERY)
        .into_iter()
        .map(|i| {
            let x = app.slider.index_to_position(i).round() as u16;
            let label = app.slider.dates().year(i).map(|y| y.to_string()).unwrap_or_default();
            (x, label)
        })
        .collect();

    let widget = SliderWidget {
        track: (start as u16, end as u16),
        ticks,
        handle: app.slider.handle_position().round() as u16,
        dragging: app.slider.is_dragging(),
    };
    frame.render_widget(widget, inner);
}

/// Track on the first row, year labels under the ticks on the second
struct SliderWidget {
    track: (u16, u16),
    ticks: Vec<(u16, String)>,
    handle: u16,
    dragging: bool,
}

impl Widget for SliderWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let right = area.x + area.width;
        let track_style = Style::default().fg(Color::DarkGray);

        for x in self.track.0..=self.track.1.min(right.saturating_sub(1)) {
            buf[(x, area.y)].set_char('─').set_style(track_style);
        }

        for (x, label) in &self.ticks {
            if *x < right {
                buf[(*x, area.y)].set_char('┼').set_style(track_style);
            }
            if area.height > 1 {
                let begin = x.saturating_sub(label.len() as u16 / 2).max(area.x);
                for (i, ch) in label.chars().enumerate() {
                    let lx = begin + i as u16;
                    if lx < right {
                        buf[(lx, area.y + 1)].set_char(ch).set_fg(Color::Gray);
                    }
                }
            }
        }

        if self.handle >= area.x && self.handle < right {
            let color = if self.dragging { Color::Yellow } else { Color::Cyan };
            buf[(self.handle, area.y)]
                .set_char('●')
                .set_style(Style::default().fg(color).add_modifier(Modifier::BOLD));
        }
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let settings = &app.map_renderer.settings;

    let (load_text, load_color) = match &app.load_state {
        LoadState::Idle => ("idle".to_string(), Color::DarkGray),
        LoadState::Loading { .. } => ("loading".to_string(), Color::Yellow),
        LoadState::Ready { .. } => ("ready".to_string(), Color::Green),
        LoadState::Raw { .. } => ("raw imagery".to_string(), Color::Red),
    };

    let mut spans = vec![
        Span::styled(" ", Style::default()),
        Span::styled(app.slider.committed_date().to_string(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.view.label(), Style::default().fg(Color::Magenta)),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        Span::styled(load_text, Style::default().fg(load_color)),
        Span::styled(" | Zoom: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" ", Style::default()),
        Span::styled(
            if settings.show_borders { "[B]order " } else { "[b]order " },
            Style::default().fg(if settings.show_borders { Color::Green } else { Color::DarkGray }),
        ),
        Span::styled(
            if settings.show_subdivisions { "[S]tate " } else { "[s]tate " },
            Style::default().fg(if settings.show_subdivisions { Color::Green } else { Color::DarkGray }),
        ),
        Span::styled("| ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
    ];

    if let Some((lon, lat)) = app.mouse_coords() {
        spans.push(Span::styled(
            format!(" ({lat:.2}, {lon:.2})"),
            Style::default().fg(Color::Red),
        ));
    }

    spans.push(Span::styled(
        " | [ ]:year v:view hjkl:pan +/-:zoom r:reset q:quit",
        Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCatalog;

    #[test]
    fn test_slider_widget_draws_handle_and_labels() {
        let area = Rect::new(0, 0, 30, 2);
        let mut buf = Buffer::empty(area);
        SliderWidget {
            track: (2, 27),
            ticks: vec![(2, "2005".into()), (27, "2024".into())],
            handle: 10,
            dragging: false,
        }
        .render(area, &mut buf);

        assert_eq!(buf[(10, 0)].symbol(), "●");
        assert_eq!(buf[(2, 0)].symbol(), "┼");
        assert_eq!(buf[(5, 0)].symbol(), "─");
        assert_eq!(buf[(0, 1)].symbol(), "2");
        assert_eq!(buf[(3, 1)].symbol(), "5");
        assert_eq!(buf[(25, 1)].symbol(), "2");
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    #[test]
    fn test_events_panel_empty_year() {
        let catalog = EventCatalog::builtin();
        let area = Rect::new(0, 0, 50, 6);
        let mut buf = Buffer::empty(area);
        EventsPanel { year: Some(2006), events: catalog.for_year(2006) }.render(area, &mut buf);

        assert!(row_text(&buf, 0).contains("2006 Events"));
        assert!(row_text(&buf, 1).contains("No major events recorded for this year"));
    }

    #[test]
    fn test_events_panel_lists_events() {
        let catalog = EventCatalog::builtin();
        let area = Rect::new(0, 0, 60, 8);
        let mut buf = Buffer::empty(area);
        EventsPanel { year: Some(2019), events: catalog.for_year(2019) }.render(area, &mut buf);

        let text: String = (0..area.height).map(|y| row_text(&buf, y)).collect();
        assert!(text.contains("Amazon Wildfires"));
        assert!(!text.contains("No major events"));
    }
}
