use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
    },
};

use crate::app::{App, InputMode};
use crate::session::ChatSession;
use crate::toast::{ToastKind, ToastPhase};
use crate::transcript::{Body, Direction, Message, Status};

const SEND_LABEL: &str = "[ Send ]";
const CLEAR_LABEL: &str = "[ Clear ]";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
    render_toasts(app, frame, chat_area);

    if app.confirm_clear {
        render_confirm_clear(frame, area);
    }
}

/// Project a message into display lines. Outgoing bubbles hug the right
/// edge, incoming ones the left.
fn message_lines(message: &Message, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let (label, label_color, alignment) = match message.direction {
        Direction::Outgoing => ("You", Color::Cyan, Alignment::Right),
        Direction::Incoming => ("SAI", Color::Yellow, Alignment::Left),
    };
    lines.push(
        Line::from(Span::styled(
            format!("{label}:"),
            Style::default().fg(label_color).add_modifier(Modifier::BOLD),
        ))
        .alignment(alignment),
    );

    match (&message.body, message.status) {
        (_, Status::Loading) => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        (Body::Text(text), Status::Error) => {
            for line in text.lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )));
            }
        }
        (Body::Text(text), _) => {
            let style = match message.direction {
                Direction::Outgoing => Style::default().fg(Color::Cyan),
                Direction::Incoming => Style::default(),
            };
            for line in text.split('\n') {
                lines.push(Line::from(Span::styled(line.to_string(), style)).alignment(alignment));
            }
        }
        (Body::Formatted { lines: rendered, .. }, _) => {
            lines.extend(rendered.iter().cloned());
        }
    }

    lines.push(Line::default());
    lines
}

pub fn transcript_lines(session: &ChatSession, animation_frame: u8) -> Vec<Line<'static>> {
    session
        .transcript()
        .messages()
        .iter()
        .flat_map(|m| message_lines(m, animation_frame))
        .collect()
}

/// Rows a wrapping paragraph occupies at `width` columns, measured with the
/// same word wrapping it is drawn with
pub fn wrapped_height(paragraph: &Paragraph<'_>, width: u16) -> u16 {
    u16::try_from(paragraph.line_count(width.max(1))).unwrap_or(u16::MAX)
}

fn render_header(app: &mut App, frame: &mut Frame, area: Rect) {
    let [title_area, clear_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(CLEAR_LABEL.len() as u16 + 1),
    ])
    .areas(area);
    app.clear_area = Some(clear_area);

    let title = Line::from(vec![
        Span::styled(" SAI Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.endpoint.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, title_area);

    let clear = Paragraph::new(CLEAR_LABEL)
        .style(Style::default().bg(Color::DarkGray).fg(Color::White).bold());
    frame.render_widget(clear, clear_area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);
    app.chat_height = inner_height;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.input_mode == InputMode::Normal {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
        .title(" Chat ");

    if app.session.transcript().is_empty() {
        app.max_scroll = 0;
        app.scroll = 0;
        app.session.take_scroll_request();
        let placeholder = Paragraph::new(Text::from(Span::styled(
            "Ask the assistant anything...",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let chat = Paragraph::new(Text::from(transcript_lines(&app.session, app.animation_frame)))
        .wrap(Wrap { trim: false });
    let total = wrapped_height(&chat, inner_width);
    app.max_scroll = total.saturating_sub(inner_height);
    if app.session.take_scroll_request() {
        app.scroll = app.max_scroll;
    } else {
        app.scroll = app.scroll.min(app.max_scroll);
    }

    let chat = chat.block(block).scroll((app.scroll, 0));
    frame.render_widget(chat, area);

    if app.max_scroll > 0 {
        let mut state = ScrollbarState::new(app.max_scroll as usize).position(app.scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let [field_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(SEND_LABEL.len() as u16 + 2),
    ])
    .areas(area);
    app.send_area = Some(send_area);

    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Prompt ");

    // Keep the cursor in view by scrolling the field horizontally
    let inner_width = field_area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 || app.cursor < inner_width {
        0
    } else {
        app.cursor - inner_width + 1
    };
    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, field_area);

    if editing && !app.confirm_clear {
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((field_area.x + cursor_x + 1, field_area.y + 1));
    }

    // Dimmed while an answer is on its way
    let send_style = if app.session.is_generating() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Green).bold()
    };
    let send = Paragraph::new(SEND_LABEL)
        .style(send_style)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(send_style));
    frame.render_widget(send, send_area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " VIEW ",
        InputMode::Editing => " TYPE ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" ^L ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
            Span::styled(" ^C ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" clear ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Stack toasts in the bottom-right corner of `area`, newest at the bottom
fn render_toasts(app: &App, frame: &mut Frame, area: Rect) {
    if area.width < 6 || area.height < 5 {
        return;
    }
    let toasts: Vec<_> = app.session.toasts().iter().collect();
    let mut bottom = area.y + area.height - 1;
    for toast in toasts.into_iter().rev() {
        if bottom < area.y + 4 {
            break;
        }
        let text_width = u16::try_from(Line::from(toast.message.as_str()).width())
            .unwrap_or(u16::MAX);
        let width = text_width.saturating_add(4).min(area.width - 2);
        let rect = Rect::new(area.x + area.width - width - 1, bottom - 3, width, 3);

        let color = match (toast.phase, toast.kind) {
            (ToastPhase::Hiding, _) => Color::DarkGray,
            (ToastPhase::Visible, ToastKind::Info) => Color::Cyan,
            (ToastPhase::Visible, ToastKind::Warning) => Color::Yellow,
        };
        let widget = Paragraph::new(toast.message.as_str())
            .style(Style::default().fg(color))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            );

        frame.render_widget(Clear, rect);
        frame.render_widget(widget, rect);
        bottom -= 3;
    }
}

fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    let popup = centered_rect(44, 5, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear conversation ");

    let text = Text::from(vec![
        Line::from("Remove every message?"),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" clear   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" keep"),
        ]),
    ]);

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(text).block(block).alignment(Alignment::Center),
        popup,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::markdown;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for row in buffer.content.chunks(buffer.area.width as usize) {
            for cell in row {
                out.push_str(cell.symbol());
            }
            out.push('\n');
        }
        out
    }

    fn wrapping(lines: Vec<Line<'static>>) -> Paragraph<'static> {
        Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false })
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("abcdef"), Line::default(), Line::from("abc")];
        assert_eq!(wrapped_height(&wrapping(lines.clone()), 3), 2 + 1 + 1);
        assert_eq!(wrapped_height(&wrapping(lines), 10), 3);
    }

    #[test]
    fn test_wrapped_height_breaks_on_words() {
        // 14 columns of text, but the words only fit one per row
        let lines = vec![Line::from("aaaa bbbb cccc")];
        assert_eq!(wrapped_height(&wrapping(lines), 7), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_request_reaches_end_of_wrapped_reply() {
        let (mut app, mut rx) = test_app();
        let words: Vec<String> = ('a'..='k').map(|c| c.to_string().repeat(4)).collect();
        app.input = format!("{} LASTWORD", words.join(" "));
        app.send();
        while app.session.is_generating() {
            let event = rx.recv().await.unwrap();
            app.session.apply(event);
        }
        // let the final deferred scroll settle
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(500), rx.recv()).await
        {
            app.session.apply(event);
        }

        let mut terminal = Terminal::new(TestBackend::new(24, 14)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        assert!(app.max_scroll > 0);
        assert_eq!(app.scroll, app.max_scroll);
        // the reply's last wrapped row sits just above its trailing blank line,
        // at the bottom of the bordered chat area
        let text = screen(&terminal);
        let last_row = text.lines().nth(7).unwrap();
        assert!(last_row.contains("LASTWORD"), "{text}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_reply_projects_rendered_markdown() {
        let (mut app, mut rx) = test_app();
        app.input = "**Hello**".to_string();
        app.send();
        while app.session.is_generating() {
            let event = rx.recv().await.unwrap();
            app.session.apply(event);
        }

        let lines = transcript_lines(&app.session, 0);
        let reply_start = lines
            .iter()
            .position(|l| markdown::plain_text(std::slice::from_ref(l)) == "SAI:")
            .unwrap();
        assert_eq!(
            lines[reply_start + 1..lines.len() - 1].to_vec(),
            markdown::render("echo: **Hello**")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_toast_is_clamped_to_chat_area() {
        let (mut app, _rx) = test_app();
        app.session.toast(ToastKind::Info, "x".repeat(70_000));

        let mut terminal = Terminal::new(TestBackend::new(40, 12)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        assert!(screen(&terminal).contains("xxxx"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_draws_bubbles_toasts_and_popup() {
        let (mut app, mut rx) = test_app();
        app.input = "Hello".to_string();
        app.send();
        // loading bubble
        while app.session.transcript().len() < 2 {
            let event = rx.recv().await.unwrap();
            app.session.apply(event);
        }
        app.send();

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("You:"));
        assert!(text.contains("Hello"));
        assert!(text.contains("Thinking."));
        assert!(text.contains("Send"));
        assert!(text.contains("Enter a prompt."));

        app.request_clear();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        assert!(screen(&terminal).contains("Remove every message?"));
    }
}
