//! Arena and status line rendering.

use std::net::SocketAddr;

use fakeblok_types::{EntityId, Game, Rectangle};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Block, Borders, Paragraph,
        canvas::{Canvas, Context, Rectangle as CanvasRect},
    },
};

use crate::theme::Palette;

/// Everything one frame shows.
pub struct View<'a> {
    pub game: &'a Game,
    pub player: EntityId,
    pub server: SocketAddr,
    pub connected: bool,
    pub palette: Palette,
}

pub fn draw(frame: &mut Frame, view: &View<'_>) {
    let [status, arena] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(frame.area());
    draw_status(frame, status, view);
    draw_arena(frame, arena, view);
}

fn draw_status(frame: &mut Frame, area: Rect, view: &View<'_>) {
    let palette = &view.palette;
    let hits = view.game.entity(view.player).map_or(0, |e| e.hits);
    let (state, state_color) = if view.connected {
        ("connected", palette.connected)
    } else {
        ("disconnected", palette.disconnected)
    };
    let separator = || Span::styled(" | ", palette.muted());

    let line = Line::from(vec![
        Span::styled(" fakeblok ", palette.title()),
        Span::styled(view.server.to_string(), Style::default().fg(palette.text)),
        separator(),
        Span::styled(format!("player {}", view.player), Style::default().fg(palette.own)),
        separator(),
        Span::styled(format!("hits {hits}"), Style::default().fg(palette.text)),
        separator(),
        Span::styled(
            format!("{} players", view.game.entity_count()),
            Style::default().fg(palette.text),
        ),
        separator(),
        Span::styled(state, Style::default().fg(state_color)),
        Span::styled("   WASD move, Space shoot, q quit", palette.muted()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_arena(frame: &mut Frame, area: Rect, view: &View<'_>) {
    let game = view.game;
    let palette = view.palette;
    let bounds = game.bounds();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .style(Style::default().bg(palette.bg));

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .background_color(palette.bg)
        .x_bounds([0.0, f64::from(bounds.x)])
        .y_bounds([0.0, f64::from(bounds.y)])
        .paint(move |ctx| {
            for (id, entity) in game.entities() {
                let color = if id == view.player {
                    palette.own
                } else {
                    palette.other
                };
                paint_wrapped(ctx, &entity.rect, game, color);
            }
            for bullet in game.bullets() {
                paint_wrapped(ctx, &bullet.rect, game, palette.bullet);
            }
        });
    frame.render_widget(canvas, area);
}

/// Draw `rect` split at the arena edges. Game y grows downward, canvas y
/// upward.
fn paint_wrapped(ctx: &mut Context<'_>, rect: &Rectangle, game: &Game, color: Color) {
    let height = u32::from(game.height());
    for part in rect.wrapped_parts(game.bounds()) {
        ctx.draw(&CanvasRect {
            x: f64::from(part.top_left.x),
            y: f64::from(height.saturating_sub(part.bottom())),
            width: f64::from(part.width),
            height: f64::from(part.height),
            color,
        });
    }
}
