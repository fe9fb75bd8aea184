//! Drawing the chat screen

use super::app::{ChatApp, Focus};
use crate::api::{ChatMessageTurn, ProductColor};
use crate::products::info_preview;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

const MAX_MENTION_ROWS: u16 = 6;

pub fn product_color(color: ProductColor) -> Color {
    match color {
        ProductColor::Red => Color::Red,
        ProductColor::Purple => Color::Magenta,
        ProductColor::Orange => Color::Rgb(255, 165, 0),
        ProductColor::Green => Color::Green,
        ProductColor::Blue => Color::Blue,
        ProductColor::White => Color::White,
    }
}

pub fn draw(frame: &mut Frame, app: &ChatApp) {
    let area = frame.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(area);

    draw_header(frame, app, rows[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(rows[1]);
    draw_sidebar(frame, app, body[0]);
    draw_transcript(frame, app, body[1]);

    draw_banner(frame, app, rows[2]);
    draw_input(frame, app, rows[3]);

    if app.mentions().is_visible() {
        draw_mentions(frame, app, rows[3]);
    }
}

fn draw_header(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let user = app
        .session()
        .identity()
        .map(|id| id.username.clone())
        .unwrap_or_else(|| "not signed in".to_string());
    let line = Line::from(vec![
        Span::styled(
            " GCN ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            app.chat().chat_name().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  [{}]", user), Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_sidebar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let focused = app.focus() == Focus::Sidebar;
    let active_id = app.chat().active_chat_id();

    let items: Vec<ListItem> = app
        .visible_chats()
        .into_iter()
        .map(|chat| {
            let mut spans: Vec<Span> = chat
                .product_colors
                .iter()
                .map(|tag| Span::styled("● ", Style::default().fg(product_color(tag.color))))
                .collect();
            let style = if active_id == Some(chat.chat_id.as_str()) {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            spans.push(Span::styled(chat.display_name().to_string(), style));
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = if app.sidebar_filter().is_empty() {
        " Chats ".to_string()
    } else {
        format!(" Chats /{} ", app.sidebar_filter())
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style(focused));
    if app.pending_delete().is_some() {
        block = block.title_bottom(Line::styled(
            " Delete chat? (y/n) ",
            Style::default().fg(Color::Red),
        ));
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if focused {
        state.select(Some(app.sidebar_index()));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_transcript(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let lines = transcript_lines(app);
    let height = area.height.saturating_sub(2);
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let offset = total
        .saturating_sub(height)
        .saturating_sub(app.scroll_back());

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(paragraph, area);
}

/// Every line of the transcript, oldest turn first
pub fn transcript_lines(app: &ChatApp) -> Vec<Line<'static>> {
    let messages = app.chat().messages();
    let mut lines = Vec::new();

    if messages.is_empty() && !app.is_waiting() {
        lines.push(Line::styled(
            "Ask a compliance question to get started.",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        lines.push(Line::raw(""));
        push_suggestions(&mut lines, app, "Try asking (Ctrl-R):");
        return lines;
    }

    for turn in messages {
        push_turn(&mut lines, app, turn);
    }
    if app.is_waiting() {
        lines.push(Line::styled(
            "Processing your request...",
            Style::default().fg(Color::Yellow),
        ));
    } else {
        push_suggestions(&mut lines, app, "Related (Ctrl-R):");
    }
    lines
}

fn push_turn(lines: &mut Vec<Line<'static>>, app: &ChatApp, turn: &ChatMessageTurn) {
    let heading = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);

    lines.push(Line::from(vec![
        Span::styled("You: ", heading),
        Span::raw(turn.query.clone()),
    ]));
    for text in turn.answer.lines() {
        lines.push(Line::raw(text.to_string()));
    }

    if !turn.pdf_references.is_empty() {
        lines.push(Line::styled("  Sources", heading));
        for pdf in &turn.pdf_references {
            let pages: Vec<String> = pdf.sorted_pages().iter().map(u32::to_string).collect();
            let label = if pages.is_empty() {
                pdf.display_name().to_string()
            } else {
                format!("{} (p. {})", pdf.display_name(), pages.join(", "))
            };
            lines.push(Line::raw(format!("    • {}", label)));
            for link in pdf.citation_links(app.citation_base()) {
                lines.push(Line::styled(format!("      {}", link), dim));
            }
        }
    }

    if !turn.online_links.is_empty() {
        lines.push(Line::styled("  Links", heading));
        for url in &turn.online_links {
            match app.link_preview(url) {
                Some(meta) => {
                    lines.push(Line::from(vec![
                        Span::raw("    • "),
                        Span::styled(meta.title, Style::default().add_modifier(Modifier::BOLD)),
                    ]));
                    lines.push(Line::raw(format!("      {}", info_preview(&meta.description))));
                }
                None => lines.push(Line::raw("    • Loading preview...")),
            }
            lines.push(Line::styled(format!("      {}", url), dim));
        }
    }

    let videos = turn.video_embed_urls();
    if !videos.is_empty() {
        lines.push(Line::styled("  Videos", heading));
        for video in videos {
            lines.push(Line::raw(format!("    • {}", video)));
        }
    }

    if !turn.online_images.is_empty() {
        lines.push(Line::styled("  Images", heading));
        for image in &turn.online_images {
            lines.push(Line::styled(format!("    • {}", image), dim));
        }
    }
    lines.push(Line::raw(""));
}

fn push_suggestions(lines: &mut Vec<Line<'static>>, app: &ChatApp, title: &str) {
    let suggestions = app.suggestions();
    if suggestions.is_empty() {
        return;
    }
    lines.push(Line::styled(
        title.to_string(),
        Style::default().fg(Color::Green),
    ));
    for suggestion in suggestions {
        lines.push(Line::raw(format!("  › {}", suggestion)));
    }
}

fn draw_banner(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let line = if let Some(error) = app.chat().error() {
        Line::styled(format!(" {}", error), Style::default().fg(Color::Red))
    } else if let Some(notice) = app.notice() {
        Line::styled(format!(" {}", notice), Style::default().fg(Color::Green))
    } else if let Some(banner) = app.banner().filter(|b| b.visible) {
        Line::styled(format!(" {}", banner.message), Style::default().fg(Color::Cyan))
    } else if app.is_waiting() {
        Line::styled(" Generating answer...", Style::default().fg(Color::Yellow))
    } else {
        Line::styled(
            " Enter send · Tab chats · Ctrl-N new chat · Ctrl-R suggestion · Ctrl-Y copy · Ctrl-C quit",
            Style::default().fg(Color::DarkGray),
        )
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_input(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let focused = app.focus() == Focus::Input;
    let input = app.input();
    let inner_width = area.width.saturating_sub(2);

    let before_caret: String = input.text().chars().take(input.caret()).collect();
    let caret_col = u16::try_from(before_caret.width()).unwrap_or(u16::MAX);
    let skip = caret_col.saturating_sub(inner_width.saturating_sub(1));

    let paragraph = Paragraph::new(input.text().to_string())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Ask ")
                .border_style(border_style(focused)),
        )
        .scroll((0, skip));
    frame.render_widget(paragraph, area);

    if focused {
        frame.set_cursor_position((area.x + 1 + caret_col - skip, area.y + 1));
    }
}

fn draw_mentions(frame: &mut Frame, app: &ChatApp, input_area: Rect) {
    let mentions = app.mentions();
    let rows = u16::try_from(mentions.len())
        .unwrap_or(MAX_MENTION_ROWS)
        .clamp(1, MAX_MENTION_ROWS);
    let height = rows + 2;
    let area = Rect {
        x: input_area.x + 1,
        y: input_area.y.saturating_sub(height),
        width: input_area.width.saturating_sub(2).min(40),
        height,
    };

    let items: Vec<ListItem> = if mentions.is_empty() {
        vec![ListItem::new(Line::styled(
            "No matching products",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        mentions
            .suggestions()
            .map(|product| {
                ListItem::new(Line::from(vec![
                    Span::styled("● ", Style::default().fg(product_color(product.color))),
                    Span::raw(product.title.clone()),
                ]))
            })
            .collect()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Products "))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if !mentions.is_empty() {
        state.select(Some(mentions.selected_index()));
    }

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}
