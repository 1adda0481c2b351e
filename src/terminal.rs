// SPDX-License-Identifier: GPL-3.0-only

//! Terminal scan interface
//!
//! Renders the scan surface with ratatui. The live camera panel draws the
//! frames handed to the detector using Unicode half-block characters for
//! improved vertical resolution.

use crate::app::{
    ActionPerformed, DesktopActions, FormatRegistry, ScanApp, ScanController, ScanOutcome,
    ScanView, staggered_reveal,
};
use crate::backends::camera::{CameraFrame, CameraSource, get_backend};
use crate::backends::detector;
use crate::config::Config;
use crate::constants::{messages, timing};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Widget, Wrap},
};
use std::io::{self, stdout};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Run the terminal scan interface
pub fn run(config: Config, source: CameraSource) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = runtime.block_on(run_app(&mut terminal, config, source));

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: Config,
    source: CameraSource,
) -> Result<(), Box<dyn std::error::Error>> {
    let (controller, mut events) = ScanController::new(
        get_backend(&source),
        detector::select(config.detector),
        Arc::new(FormatRegistry::new()),
        config.session_settings(),
    );
    let controller = Arc::new(controller);
    let mut preview = controller.preview();
    let mut app = ScanApp::new(Arc::clone(&controller), Arc::new(DesktopActions::new()));

    let formats = app.load_formats().await;
    let mut status: Option<String> = formats
        .is_empty()
        .then(|| messages::NO_FORMATS.to_string());

    let (reveal_tx, mut reveals) = mpsc::unbounded_channel();
    let delay = config.format_reveal_delay();
    tokio::spawn(async move {
        staggered_reveal(&formats, delay, |_, format| {
            let _ = reveal_tx.send(format);
        })
        .await;
    });

    let (key_tx, mut keys) = mpsc::unbounded_channel();
    std::thread::spawn(move || read_keys(key_tx));

    let mut ticker = tokio::time::interval(timing::UI_TICK);

    loop {
        let frame = preview.borrow().clone();
        terminal.draw(|f| draw(f, &app.view, frame, status.as_deref()))?;

        tokio::select! {
            Some(key) = keys.recv() => {
                if is_quit(&key) {
                    break;
                }
                match key.code {
                    KeyCode::Char('s') => {
                        status = None;
                        app.start_scan().await;
                    }
                    KeyCode::Char('a') => {
                        status = match app.perform_action().await {
                            Some(Ok(ActionPerformed::Opened)) => Some("Opened in browser".to_string()),
                            Some(Err(e)) => {
                                error!(error = %e, "Result action failed");
                                Some(e.to_string())
                            }
                            _ => None,
                        };
                    }
                    KeyCode::Char('c') => {
                        let outcome = app.cancel_scan().await;
                        if let Some(message) = cancel_status(outcome.as_ref()) {
                            status = Some(message.to_string());
                        }
                    }
                    _ => {}
                }
            }
            Some(event) = events.recv() => {
                if !app.handle_event(&event) {
                    debug!(session = %event.session, "Dropped event from superseded session");
                }
            }
            Some(format) = reveals.recv() => app.reveal_format(format),
            Ok(()) = preview.changed() => {}
            _ = ticker.tick() => {}
        }
    }

    // Release the camera before the terminal is restored
    app.cancel_scan().await;
    info!("Terminal interface closed");
    Ok(())
}

/// Forward key presses until the interface stops listening
fn read_keys(sender: mpsc::UnboundedSender<KeyEvent>) {
    loop {
        match event::poll(timing::UI_TICK) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if sender.send(key).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to read terminal event");
                    return;
                }
            },
            Ok(false) => {
                if sender.is_closed() {
                    return;
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to poll terminal events");
                return;
            }
        }
    }
}

/// Status line after the cancel key
///
/// Only a session that was still running counts as cancelled; one that had
/// already finished keeps its result or error on screen.
fn cancel_status(outcome: Option<&ScanOutcome>) -> Option<&'static str> {
    match outcome {
        Some(ScanOutcome::Cancelled) => Some("Scan cancelled"),
        _ => None,
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    // Ctrl+C arrives as a key press in raw mode
    key.code == KeyCode::Char('q')
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

fn draw(f: &mut Frame, view: &ScanView, frame: Option<Arc<CameraFrame>>, status: Option<&str>) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(f.area());

    let button = Paragraph::new(Line::from(vec![
        Span::styled("[s] ", Style::default().fg(Color::DarkGray)),
        Span::styled(view.scan_label, Style::default().add_modifier(Modifier::BOLD)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Barcode Scanner"));
    f.render_widget(button, header);

    let [formats_area, main_area] =
        Layout::horizontal([Constraint::Length(18), Constraint::Min(0)]).areas(body);

    let items: Vec<ListItem> = view
        .formats
        .iter()
        .map(|format| ListItem::new(format.as_str()))
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Formats")),
        formats_area,
    );

    if view.video_visible {
        draw_video(f, view, frame, main_area);
    } else if let Some(panel) = &view.error {
        let text = Text::from(panel.text());
        f.render_widget(
            Paragraph::new(text)
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Error")),
            main_area,
        );
    } else if let Some(panel) = &view.result {
        let lines = vec![
            Line::from(vec![
                Span::styled("Format: ", Style::default().fg(Color::DarkGray)),
                Span::raw(panel.format.as_str()),
            ]),
            Line::raw(""),
            Line::styled(panel.raw_value.as_str(), Style::default().add_modifier(Modifier::BOLD)),
            Line::raw(""),
            Line::from(vec![
                Span::styled("[a] ", Style::default().fg(Color::DarkGray)),
                Span::styled(panel.action_label, Style::default().fg(Color::Cyan)),
            ]),
        ];
        f.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title("Result")),
            main_area,
        );
    } else {
        f.render_widget(Block::default().borders(Borders::ALL), main_area);
    }

    let message = status.map(str::to_string).unwrap_or_else(build_status_message);
    f.render_widget(StatusBar { message: &message }, footer);
}

fn draw_video(f: &mut Frame, view: &ScanView, frame: Option<Arc<CameraFrame>>, area: Rect) {
    let mut title = match &view.device {
        Some(device) => format!("Camera: {}", device),
        None => "Camera".to_string(),
    };
    if let Some(secs) = view.elapsed_secs() {
        title.push_str(&format!(" ({}s)", secs));
    }

    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(&FrameWidget { frame }, inner);
}

fn build_status_message() -> String {
    "'s' scan | 'a' copy/open | 'c' cancel | 'q' quit".to_string()
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget {
    frame: Option<Arc<CameraFrame>>,
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_deref().filter(|f| f.width > 0 && f.height > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        // Upper pixel is the foreground of '▀', lower pixel the background
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(gray(frame.luma(src_x, src_y_top)));
                    cell.set_bg(gray(frame.luma(src_x, src_y_bottom)));
                }
            }
        }
    }
}

fn gray(luma: u8) -> Color {
    Color::Rgb(luma, luma, luma)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_widget_placeholder() {
        let area = Rect::new(0, 0, 30, 5);
        let mut buf = Buffer::empty(area);
        (&FrameWidget { frame: None }).render(area, &mut buf);

        let row: String = (0..area.width)
            .map(|x| buf[(x, 2)].symbol().to_string())
            .collect();
        assert!(row.contains("Waiting for camera..."));
    }

    #[test]
    fn test_frame_widget_draws_half_blocks() {
        let frame = CameraFrame::gray(4, 4, vec![200u8; 16]);
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        (&FrameWidget {
            frame: Some(Arc::new(frame)),
        })
            .render(area, &mut buf);

        assert_eq!(buf[(0, 0)].symbol(), "▀");
        assert_eq!(buf[(0, 0)].fg, Color::Rgb(200, 200, 200));
    }

    #[test]
    fn test_quit_keys() {
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn test_cancel_status_only_for_running_session() {
        use crate::backends::detector::{BarcodeFormat, DetectionResult};

        assert_eq!(cancel_status(Some(&ScanOutcome::Cancelled)), Some("Scan cancelled"));
        assert_eq!(cancel_status(None), None);

        let completed = ScanOutcome::Completed(DetectionResult::new("12345", BarcodeFormat::QrCode));
        assert_eq!(cancel_status(Some(&completed)), None);
    }
}
