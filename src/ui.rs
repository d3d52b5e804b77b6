pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Rectangle},
        Block, Borders, Clear, Paragraph, Row, Table, Widget, Wrap,
    },
};
use spotype::{
    celebration::Celebration,
    labels::{LabelTable, LabelTranslator},
    render_loop::RenderCommand,
    session::{EndReason, GameMode, NO_TARGET},
};
use unicode_width::UnicodeWidthStr;

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::ModeSelect => render_mode_select(self, area, buf),
            AppState::Playing => render_playing(self, area, buf),
            AppState::Results => {
                if self.celebration.is_active() {
                    render_celebration(&self.celebration, area, buf);
                }
                render_results(self, area, buf);
            }
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

pub fn render_mode_select(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    Paragraph::new(Span::styled("spotype", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let camera_state = if app.controller.camera_ready() {
        Span::styled("camera ready", Style::default().fg(Color::Green))
    } else {
        Span::styled("camera not available", Style::default().fg(Color::Red))
    };
    Paragraph::new(Line::from(vec![
        camera_state,
        Span::raw(format!(
            "   {} words   {}s per session",
            app.controller.vocabulary().len(),
            app.controller.config().session_secs
        )),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[2], buf);

    let status = Span::styled(app.hud.status.as_str(), Style::default().fg(Color::Yellow));
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        "(c) camera / (l) list / (d) label table / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);

    if app.show_labels {
        render_label_table(&app.labels, area, buf);
    }
}

/// Centered overlay listing every label with its display name
fn render_label_table(labels: &LabelTable, area: Rect, buf: &mut Buffer) {
    let label_width = labels
        .entries()
        .iter()
        .map(|e| e.label.width())
        .max()
        .unwrap_or(5)
        .max(5) as u16;
    let display_width = labels
        .entries()
        .iter()
        .map(|e| e.display.width())
        .max()
        .unwrap_or(7)
        .max(7) as u16;

    let width = (label_width + display_width + 5).min(area.width);
    let height = area.height.saturating_sub(2).max(3).min(area.height);
    let overlay = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let header = Row::new(["label", "display"]).style(bold().fg(Color::Yellow));
    let rows = labels
        .entries()
        .iter()
        .map(|e| Row::new([e.label.as_str(), e.display.as_str()]));
    let widths = [
        Constraint::Length(label_width),
        Constraint::Length(display_width),
    ];
    let title = format!("{} ({})", labels.name, labels.len());

    Clear.render(overlay, buf);
    Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(title))
        .render(overlay, buf);
}

fn render_playing(app: &App, area: Rect, buf: &mut Buffer) {
    let session = app.controller.session();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // hud
            Constraint::Length(2), // target
            Constraint::Min(0),    // camera
            Constraint::Length(1), // input
            Constraint::Length(1), // feedback
            Constraint::Length(1), // status
            Constraint::Length(1), // legend
        ])
        .split(area);

    let dim = Style::default().add_modifier(Modifier::DIM);
    Paragraph::new(Line::from(vec![
        Span::styled(format!("{}", session.mode), dim),
        Span::raw("   "),
        Span::styled(format!("Score: {}", app.hud.score), bold()),
        Span::raw("   "),
        Span::styled(format!("Time: {}s", app.hud.remaining_secs), bold()),
    ]))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    let target = app.hud.target.as_deref().unwrap_or(NO_TARGET);
    let mut target_line = vec![
        Span::styled("Target: ", dim),
        Span::styled(target, bold().fg(Color::Yellow)),
    ];
    if let Some(display) = app.labels.translate(target) {
        target_line.push(Span::styled(format!("  ({display})"), dim));
    }
    Paragraph::new(Line::from(target_line))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    if session.mode == GameMode::Camera {
        render_camera(&app.frame, chunks[2], buf);
    }

    render_input(&session.input, app.hud.target.as_deref(), chunks[3], buf);

    Paragraph::new(Span::styled(
        app.hud.feedback.to_string(),
        Style::default().fg(Color::Magenta),
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);

    Paragraph::new(Span::styled(
        app.hud.status.as_str(),
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[5], buf);

    Paragraph::new(Span::styled(
        "(esc) stop",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[6], buf);
}

/// Typed text: the part matching the target in green, the rest in red
fn render_input(typed: &str, target: Option<&str>, area: Rect, buf: &mut Buffer) {
    let target = target.unwrap_or_default();
    let matched = typed
        .chars()
        .zip(target.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum::<usize>();

    let (good, bad) = typed.split_at(matched);
    let cursor = Style::default()
        .add_modifier(Modifier::UNDERLINED)
        .add_modifier(Modifier::DIM);
    Paragraph::new(Line::from(vec![
        Span::styled("> ", Style::default().add_modifier(Modifier::DIM)),
        Span::styled(good, bold().fg(Color::Green)),
        Span::styled(bad, bold().fg(Color::Red)),
        Span::styled(" ", cursor),
    ]))
    .alignment(Alignment::Center)
    .render(area, buf);
}

/// Draws the render commands of one frame. Canvas y grows upwards, frame
/// pixel y grows downwards.
fn render_camera(commands: &[RenderCommand], area: Rect, buf: &mut Buffer) {
    let frame = commands.iter().find_map(|c| match c {
        RenderCommand::DrawFrame { width, height } => Some((*width as f64, *height as f64)),
        _ => None,
    });
    let Some((width, height)) = frame else {
        return;
    };

    Canvas::default()
        .block(Block::default().borders(Borders::ALL).title("camera"))
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(|ctx| {
            let boxes = commands.iter().filter_map(|c| match c {
                RenderCommand::DrawBox {
                    bbox,
                    caption,
                    highlighted,
                } => Some((bbox, caption, *highlighted)),
                _ => None,
            });
            for (bbox, caption, highlighted) in boxes {
                let color = if highlighted {
                    Color::Yellow
                } else {
                    Color::Cyan
                };
                let (x, top) = (bbox.x as f64, bbox.y as f64);
                let (w, h) = (bbox.width as f64, bbox.height as f64);
                ctx.draw(&Rectangle {
                    x,
                    y: height - top - h,
                    width: w,
                    height: h,
                    color,
                });
                ctx.print(
                    x,
                    (height - top).min(height),
                    Line::styled(caption.clone(), Style::default().fg(color)),
                );
            }
        })
        .render(area, buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let fallback = (app.hud.score, EndReason::Stopped);
    let (score, reason) = app.hud.result.unwrap_or(fallback);
    let headline = match reason {
        EndReason::AllCleared => "All clear!",
        EndReason::TimeUp => "Time is up!",
        EndReason::Stopped => "Game over!",
    };

    Paragraph::new(Span::styled(headline, bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
    Paragraph::new(Span::styled(format!("Score: {score}"), bold()))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);
    Paragraph::new(Span::styled(
        format!("{}s left", app.hud.remaining_secs),
        Style::default().add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
    Paragraph::new(Span::styled(
        "(enter) play again / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[5], buf);
}

/// Celebration sparks, drawn before the results text so the score stays readable
fn render_celebration(celebration: &Celebration, area: Rect, buf: &mut Buffer) {
    let colors = [
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::Green,
        Color::Red,
        Color::LightYellow,
    ];

    for spark in &celebration.sparks {
        if spark.x < 0.0 || spark.y < 0.0 {
            continue;
        }
        let (x, y) = (spark.x as u16, spark.y as u16);
        if x >= area.width || y >= area.height {
            continue;
        }
        let color = colors[spark.color_index % colors.len()];
        let mut style = Style::default().fg(color);
        if spark.slot.is_some() {
            style = style.add_modifier(Modifier::BOLD);
        }
        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(&spark.symbol.to_string());
            cell.set_style(style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::App;
    use rand::{rngs::StdRng, SeedableRng};
    use ratatui::{buffer::Buffer, layout::Rect};
    use spotype::{
        config::Config,
        controller::{CameraRig, GameController},
        detection::InlineDetector,
        scene::{scripted_pair, Scene},
    };
    use std::time::Duration;

    fn list_app(words: &[&str]) -> App {
        let labels = LabelTable::coco().unwrap();
        let controller = GameController::new(
            Config::default(),
            words.iter().map(|w| w.to_string()).collect(),
            &labels,
            None,
        );
        App::new(controller, labels)
    }

    fn camera_app() -> App {
        let labels = LabelTable::coco().unwrap();
        let (camera, detector) = scripted_pair(Scene::demo().unwrap(), Duration::ZERO);
        let rig = CameraRig::new(camera, InlineDetector(detector));
        let controller = GameController::new(Config::default(), vec![], &labels, Some(rig));
        App::new(controller, labels)
    }

    fn rendered(app: &App, area: Rect) -> String {
        let mut buffer = Buffer::empty(area);
        app.render(area, &mut buffer);
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn test_mode_select_lists_choices() {
        let app = list_app(&["cup"]);
        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("(c) camera"));
        assert!(text.contains("camera not available"));
        assert!(text.contains("1 words"));
    }

    #[test]
    fn test_label_table_overlay() {
        let mut app = list_app(&["cup"]);
        app.show_labels = true;
        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("coco (80)"));
        assert!(text.contains("person"));
    }

    #[test]
    fn test_playing_shows_target_and_translation() {
        let mut app = list_app(&["cup"]);
        app.start(GameMode::List, 0);
        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("Target: cup"));
        assert!(text.contains("コ"));
        assert!(text.contains("Score: 0"));
        assert!(text.contains("Time: 60s"));
    }

    #[test]
    fn test_camera_canvas_draws_captions() {
        let mut app = camera_app();
        app.start(GameMode::Camera, 0);
        // the first frame dispatches, the next one draws the result
        app.on_tick(0, (100, 30));
        app.on_tick(16, (100, 30));
        let text = rendered(&app, Rect::new(0, 0, 100, 30));
        assert!(text.contains("camera"));
        assert!(text.contains("%)"));
    }

    #[test]
    fn test_results_and_celebration() {
        let mut app = list_app(&["hi"]);
        app.start(GameMode::List, 0);
        app.controller.input("hi");
        app.on_tick(10, (80, 24));
        assert_eq!(app.state, AppState::Results);
        assert!(app.celebration.is_active());

        let mut rng = StdRng::seed_from_u64(4);
        app.celebration.start_with(80, 24, 10, &mut rng);
        let text = rendered(&app, Rect::new(0, 0, 80, 24));
        assert!(text.contains("All clear!"));
        assert!(text.contains("Score: 1"));
        assert!(text.chars().any(|c| ['*', '+', '\''].contains(&c)));
    }

    #[test]
    fn test_celebration_never_covers_the_score() {
        let mut app = list_app(&["hi"]);
        app.start(GameMode::List, 0);
        app.controller.input("hi");
        app.on_tick(10, (80, 24));

        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            app.celebration.start_with(80, 24, 10, &mut rng);
            for now in [10, 400, 1200] {
                app.celebration.update(now);
                let text = rendered(&app, Rect::new(0, 0, 80, 24));
                assert!(text.contains("Score: 1"), "seed {seed} at {now}ms");
                assert!(text.contains("All clear!"), "seed {seed} at {now}ms");
            }
        }
    }

    #[test]
    fn test_extreme_sizes_do_not_panic() {
        let mut app = camera_app();
        for area in [
            Rect::new(0, 0, 10, 5),
            Rect::new(0, 0, 200, 5),
            Rect::new(0, 0, 20, 50),
        ] {
            rendered(&app, area);
        }
        app.show_labels = true;
        rendered(&app, Rect::new(0, 0, 4, 2));
        app.start(GameMode::Camera, 0);
        app.on_tick(0, (10, 5));
        rendered(&app, Rect::new(0, 0, 10, 5));
    }

    #[test]
    fn test_input_split_marks_mismatch() {
        let area = Rect::new(0, 0, 20, 1);
        let mut buffer = Buffer::empty(area);
        render_input("cax", Some("cat"), area, &mut buffer);
        let red = buffer
            .content()
            .iter()
            .filter(|c| c.fg == Color::Red && c.symbol() == "x")
            .count();
        assert_eq!(red, 1);
    }
}
