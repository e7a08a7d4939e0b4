use anyhow::{Context, Result};
use canopy::app::App;
use canopy::config::Args;
use canopy::imagery::HttpImageSource;
use canopy::ui;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use ratatui_image::picker::Picker;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_file)?;
    info!(start = args.start_year, end = args.end_year, bbox = %args.bbox, "starting");

    let source = Arc::new(HttpImageSource::new(args.timeout())?);

    // Query image protocol support before entering the alternate screen
    let picker = Picker::from_query_stdio()
        .map_err(|e| warn!(error = ?e, "no terminal image protocol; imagery view disabled"))
        .ok();

    let mut app = App::new(&args, picker, source)?;

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &mut app);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    info!("exiting");
    result
}

/// Log to a file; the terminal belongs to the UI
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Mouse over the slider scrubs years; over the map it pans and zooms
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    // Always track mouse position for cursor marker
    app.set_mouse_pos(mouse.column, mouse.row);
    let on_slider = app.in_slider(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp if on_slider => app.step_year(1),
        MouseEventKind::ScrollDown if on_slider => app.step_year(-1),
        // Scroll wheel for zooming towards mouse position
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),

        MouseEventKind::Down(MouseButton::Left) if on_slider => app.slider_press(mouse.column),
        MouseEventKind::Down(MouseButton::Left) => {
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        // A drag that starts on the slider scrubs even if it began off the handle
        MouseEventKind::Drag(MouseButton::Left)
            if app.slider.is_dragging() || (on_slider && app.last_mouse.is_none()) =>
        {
            app.slider_drag(mouse.column);
        }
        MouseEventKind::Drag(MouseButton::Left) => app.handle_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) if app.slider.is_dragging() => {
            app.slider_release(mouse.column);
        }
        MouseEventKind::Up(MouseButton::Left) => app.end_drag(),
        _ => {}
    }
}

fn handle_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),

        // Year navigation
        KeyCode::Char('[') | KeyCode::Char(',') => app.step_year(-1),
        KeyCode::Char(']') | KeyCode::Char('.') => app.step_year(1),
        KeyCode::Home => app.first_year(),
        KeyCode::End => app.last_year(),

        KeyCode::Char('v') | KeyCode::Char('V') => app.cycle_view(),

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

        // Zoom
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

        // Layer toggles
        KeyCode::Char('b') | KeyCode::Char('B') => app.map_renderer.toggle_borders(),
        KeyCode::Char('s') | KeyCode::Char('S') => app.map_renderer.toggle_subdivisions(),

        // Reset view
        KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),

        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    loop {
        // Start requested loads and pick up finished imagery
        app.pump();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events with ~60fps target
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                // Only handle key press events (not release)
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key.code),
                Event::Mouse(mouse) => handle_mouse(app, mouse),
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
