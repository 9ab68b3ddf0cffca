use crate::application::{App, AppMode, FormKind, FormView};
use crate::domain::{CODE_FIELD, FieldId, OtpStatus, StepMarker, SubmissionStatus};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};

pub fn render_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    match app.active_form() {
        Some(kind) => render_form(f, app, kind, chunks[1]),
        None => render_menu(f, app, chunks[1]),
    }
    render_status_bar(f, app, chunks[2]);

    if matches!(app.mode, AppMode::Help(_)) {
        render_help_popup(f, app.help_scroll);
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let location = app.active_form().map(FormKind::title).unwrap_or("Menu");
    let busy = if app.is_busy() { " | working…" } else { "" };
    let header = Paragraph::new(format!("formstage | {location}{busy}"))
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(header, area);
}

fn render_menu(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = FormKind::ALL
        .iter()
        .map(|kind| ListItem::new(kind.title()))
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Choose a form"))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("› ");
    let mut state = ListState::default().with_selected(Some(app.menu_index));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_form(f: &mut Frame, app: &App, kind: FormKind, area: Rect) {
    let view = app.form_view(kind);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    render_stepper(f, &view, chunks[0], chunks[1]);
    if view.progress.completed {
        render_completed(f, &view, chunks[2]);
    } else {
        render_fields(f, app, &view, chunks[2]);
    }
}

fn render_stepper(f: &mut Frame, view: &FormView<'_>, gauge_area: Rect, steps_area: Rect) {
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(view.progress.label()))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(view.progress.fraction().clamp(0.0, 1.0));
    f.render_widget(gauge, gauge_area);

    let mut spans = Vec::new();
    for (i, step) in view.progress.steps.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  ›  "));
        }
        let (mark, style) = match step.marker {
            StepMarker::Done => ("✓", Style::default().fg(Color::Green)),
            StepMarker::Active => ("●", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            StepMarker::Upcoming => ("○", Style::default().fg(Color::DarkGray)),
        };
        spans.push(Span::styled(format!("{mark} {}", step.title), style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), steps_area);
}

fn render_fields(f: &mut Frame, app: &App, view: &FormView<'_>, area: Rect) {
    let mut lines = Vec::new();
    for (index, id) in view.step.fields().iter().enumerate() {
        let focused = index == app.focus;
        lines.push(field_line(app, view, *id, focused));
        if let Some(issue) = view.fields.issue(*id)
            && (focused || view.rejection.is_some())
            && (view.step.is_required(*id) || !view.fields.value(*id).is_blank())
        {
            lines.push(Line::from(Span::styled(
                format!("    {issue}"),
                Style::default().fg(Color::Red),
            )));
        }
        lines.push(Line::raw(""));
    }

    if let Some(otp) = view.otp
        && view.step.fields().contains(&CODE_FIELD)
    {
        lines.extend(otp_lines(app, view, otp));
    }

    if view.submission == SubmissionStatus::Failed
        && let Some(err) = view.submission_error
    {
        lines.push(Line::from(Span::styled(
            format!("{err}. Press Enter to try again."),
            Style::default().fg(Color::Red),
        )));
    }

    let action = if view.progress.current + 1 == view.progress.total() {
        "Submit"
    } else {
        "Continue"
    };
    let title = format!("{} | Enter: {action} | Esc: Back", view.step.title);
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn field_line(app: &App, view: &FormView<'_>, id: FieldId, focused: bool) -> Line<'static> {
    let label = view.kind.field_label(id);
    let required = if view.step.is_required(id) { "*" } else { " " };
    let marker = if view.fields.is_valid(id) {
        Span::styled(" ✓", Style::default().fg(Color::Green))
    } else if view.fields.value(id).is_blank() {
        Span::raw("  ")
    } else {
        Span::styled(" ✗", Style::default().fg(Color::Red))
    };

    let value = match view.options(id) {
        Some(options) => {
            let shown = view.display_value(id);
            let shown = if shown.is_empty() { "select".to_string() } else { shown };
            if options.is_empty() {
                "(answer the previous question first)".to_string()
            } else {
                format!("◀ {shown} ▶")
            }
        }
        None if focused => {
            let text = view.display_value(id);
            let split = text
                .char_indices()
                .nth(app.cursor_position)
                .map(|(i, _)| i)
                .unwrap_or(text.len());
            format!("{}▏{}", &text[..split], &text[split..])
        }
        None => view.display_value(id),
    };

    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let pointer = if focused { "› " } else { "  " };
    Line::from(vec![
        Span::styled(format!("{pointer}{label}{required} "), style.add_modifier(Modifier::BOLD)),
        Span::styled(value, style),
        marker,
    ])
}

fn otp_lines(app: &App, view: &FormView<'_>, otp: &crate::domain::OtpChallenge) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let state = match otp.status() {
        OtpStatus::NotRequested if app.is_awaiting_code() => "sending code…".to_string(),
        OtpStatus::NotRequested => "no code requested yet".to_string(),
        OtpStatus::Issued | OtpStatus::Failed => match otp.remaining(view.now) {
            Some(left) => format!(
                "code expires in {}:{:02}, {} attempt(s) left",
                left.num_minutes(),
                left.num_seconds() % 60,
                otp.attempts_remaining()
            ),
            None => format!("{} attempt(s) left", otp.attempts_remaining()),
        },
        OtpStatus::Verifying => "checking code…".to_string(),
        OtpStatus::Verified => "verified".to_string(),
        OtpStatus::Expired => "code expired, press Ctrl+R for a new one".to_string(),
    };
    let color = match otp.status() {
        OtpStatus::Verified => Color::Green,
        OtpStatus::Expired | OtpStatus::Failed => Color::Red,
        _ => Color::Cyan,
    };
    lines.push(Line::from(Span::styled(
        format!("  Delivery: {} (Ctrl+T to switch) | {state}", app.otp_channel),
        Style::default().fg(color),
    )));
    lines
}

fn render_completed(f: &mut Frame, view: &FormView<'_>, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Thank you! Your submission was received.",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
    ];
    if let Some(reference) = view.receipt.and_then(|r| r.reference.as_deref()) {
        lines.push(Line::raw(format!("Reference: {reference}")));
        lines.push(Line::raw(""));
    }
    lines.push(Line::raw("Press Enter or Esc to return to the menu."));
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Completed"));
    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let text = match (&app.status_message, app.mode) {
        (Some(status), AppMode::Menu | AppMode::Form(_)) => status.clone(),
        (_, AppMode::Menu) => "↑↓: choose | Enter: open | F1: help | q: quit".to_string(),
        (_, AppMode::Form(_)) => {
            "↑↓/Tab: field | ←→: choose option | Ctrl+V: paste | Ctrl+R: resend code | F1: help"
                .to_string()
        }
        (_, AppMode::Help(_)) => {
            "↑↓/jk: scroll | PgUp/PgDn: fast scroll | Home: top | Esc/q: close help".to_string()
        }
    };

    let style = match app.mode {
        AppMode::Menu => Style::default(),
        AppMode::Form(_) => Style::default().fg(Color::Green),
        AppMode::Help(_) => Style::default().fg(Color::Cyan),
    };
    let status = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(style);
    f.render_widget(status, area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;

    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let visible_text = help_lines[start_line..end_line].join("\n");

    let help_widget = Paragraph::new(visible_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("formstage Help (Line {}/{})", start_line + 1, help_lines.len()))
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

const HELP_TEXT: &str = r#"FORMSTAGE

=== FORMS ===
Register as an Expert   Four steps: Account Setup, Verify, Confirm Role, Profile
Contact Us              Two steps: how we can help, then your details

=== MOVING THROUGH A FORM ===
Enter           Continue to the next step, or submit from the last one
Esc             Back one step; from the first step, return to the menu
↑↓ / Tab        Move between fields
←→              Pick an option in a choice field, or move the cursor
Home / End      Jump to the start or end of a text field
Ctrl+V          Paste from the clipboard

Fields marked * are required. ✓ means the value is accepted,
✗ means it still needs attention. A step only lets you continue
once every required field is accepted.

=== CONTACT FORM ===
The reasons you can pick depend on who you are. Changing your
answer to "I am a" clears a reason that no longer applies.

=== VERIFICATION ===
A code is sent when you reach the Verify step.
Enter           Check the typed code
Ctrl+R          Send a new code (also after it expires)
Ctrl+T          Switch delivery between email and mobile
Codes expire after a few minutes and allow a limited number
of wrong attempts. Without a configured server, the code is
shown in the status line.

=== SUBMITTING ===
While a request is in flight the form is locked. If it fails,
your answers are kept and Enter tries again. Leaving the form
cancels anything still pending.

=== HELP NAVIGATION ===
↑↓ or j/k       Scroll help text up/down one line
Page Up/Down    Scroll help text up/down 5 lines
Home            Jump to top of help text
Esc/F1/q        Close this help window

q in the menu quits."#;
