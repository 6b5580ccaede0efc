use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use bankdash_core::models::{Notification, TransactionLimits};

use crate::app::{App, AppState, LoginFocus, Tab};
use crate::utils::{format_currency, format_date, format_remaining, truncate_string};

use super::styles;

/// Below this many minutes to expiry the status bar turns amber
const EXPIRY_WARNING_MINUTES: i64 = 5;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Length(2), // Tabs
            Constraint::Min(8),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  bankdash";
    let location = if app.state == AppState::LoggingIn {
        "/login".to_string()
    } else {
        app.current_tab.route().path()
    };
    let help_hint = "[?] Help";

    let used = title.len() + location.len() + help_hint.len() + 6;
    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::styled(format!("  {}", location), styles::muted_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let unread = app.snapshot.as_ref().map(|s| s.unread_count()).unwrap_or(0);

    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in [Tab::Overview, Tab::Notifications, Tab::Settings].into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let mut label = format!("[{}] {}", i + 1, tab.title());
        if tab == Tab::Notifications && unread > 0 {
            label.push_str(&format!(" ({})", unread));
        }
        spans.push(Span::styled(label, styles::tab_style(app.current_tab == tab)));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Overview => render_overview(frame, app, area),
        Tab::Notifications => render_notifications(frame, app, area),
        Tab::Settings => render_settings(frame, app, area),
    }
}

fn placeholder(app: &App) -> &'static str {
    if app.loading {
        "  Loading..."
    } else {
        "  No data. Press [r] to refresh."
    }
}

fn field_line(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<22}", label), styles::muted_style()),
        Span::styled(value.into(), styles::list_item_style()),
    ])
}

fn render_overview(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Account ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let Some(ref snapshot) = app.snapshot else {
        frame.render_widget(Paragraph::new(placeholder(app)).block(block), area);
        return;
    };
    let account = &snapshot.account;

    let balance = account
        .balance
        .map(|b| format_currency(b, account.currency_code()))
        .unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Available balance     ", styles::muted_style()),
            Span::styled(balance, styles::positive_style()),
        ]),
        Line::from(""),
        field_line(
            "Account number",
            account.masked_account_number().unwrap_or_else(|| "-".to_string()),
        ),
        field_line("Account type", account.account_type.clone().unwrap_or_default()),
        field_line("Status", account.status.clone().unwrap_or_default()),
        field_line("KYC", account.kyc_status.clone().unwrap_or_default()),
        Line::from(""),
    ];

    let unread = snapshot.unread_count();
    lines.push(Line::from(Span::styled(
        format!("  {} unread notification{}", unread, if unread == 1 { "" } else { "s" }),
        if unread > 0 {
            styles::highlight_style()
        } else {
            styles::muted_style()
        },
    )));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn notification_item(notification: &Notification, width: usize) -> ListItem<'static> {
    let marker = if notification.read { "  " } else { "● " };
    let date = notification
        .created_at
        .as_deref()
        .map(format_date)
        .unwrap_or_default();
    let title_width = width.saturating_sub(date.len() + 6);
    let style = if notification.read {
        styles::muted_style()
    } else {
        styles::unread_style()
    };

    ListItem::new(Line::from(vec![
        Span::styled(marker, styles::highlight_style()),
        Span::styled(
            format!(
                "{:<w$}",
                truncate_string(notification.display_title(), title_width),
                w = title_width
            ),
            style,
        ),
        Span::styled(format!("  {}", date), styles::muted_style()),
    ]))
}

fn render_notifications(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(5)])
        .split(area);

    let block = Block::default()
        .title(" Notifications ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let notifications = match app.snapshot {
        Some(ref snapshot) if !snapshot.notifications.is_empty() => &snapshot.notifications,
        Some(_) => {
            frame.render_widget(Paragraph::new("  No notifications").block(block), area);
            return;
        }
        None => {
            frame.render_widget(Paragraph::new(placeholder(app)).block(block), area);
            return;
        }
    };

    let width = chunks[0].width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = notifications
        .iter()
        .map(|n| notification_item(n, width))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(styles::selected_style());
    let mut state = ListState::default().with_selected(Some(app.notification_selection));
    frame.render_stateful_widget(list, chunks[0], &mut state);

    let message = notifications
        .get(app.notification_selection)
        .and_then(|n| n.message.clone())
        .unwrap_or_default();
    let detail = Paragraph::new(message)
        .style(styles::list_item_style())
        .wrap(ratatui::widgets::Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_style(false)),
        );
    frame.render_widget(detail, chunks[1]);
}

fn limit_line(label: &str, value: Option<f64>, currency: &str) -> Line<'static> {
    field_line(
        label,
        value
            .map(|v| format_currency(v, currency))
            .unwrap_or_else(|| "not set".to_string()),
    )
}

fn render_settings(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Settings ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let Some(ref settings) = app.settings else {
        frame.render_widget(Paragraph::new(placeholder(app)).block(block), area);
        return;
    };

    let currency = app
        .snapshot
        .as_ref()
        .map(|s| s.account.currency_code().to_string())
        .unwrap_or_else(|| "USD".to_string());
    let limits = settings.transaction_limits.clone().unwrap_or_default();
    let TransactionLimits {
        daily_transfer,
        daily_withdrawal,
        single_transaction,
    } = limits;

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("  Profile", styles::highlight_style())),
        field_line("Name", settings.full_name()),
        field_line("Email", settings.email.clone().unwrap_or_default()),
        field_line("Phone", settings.phone.clone().unwrap_or_default()),
        field_line("Language", settings.language.clone().unwrap_or_default()),
        Line::from(""),
        Line::from(Span::styled("  Transaction limits", styles::highlight_style())),
        limit_line("Daily transfer", daily_transfer, &currency),
        limit_line("Daily withdrawal", daily_withdrawal, &currency),
        limit_line("Single transaction", single_transaction, &currency),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[r]efresh | [L]ogout | [q]uit";
    let minutes_left = app.session_minutes_left();

    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else if let Some(minutes) = minutes_left {
        format!(" Session expires in {} ", format_remaining(minutes))
    } else {
        " Not signed in ".to_string()
    };
    let right_text = format!(" {} ", shortcuts);

    let bar_style = match minutes_left {
        Some(m) if m < EXPIRY_WARNING_MINUTES => styles::warning_bar_style(),
        _ => styles::status_bar_style(),
    };

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::raw(left_text),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(status_line).style(bar_style), area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(48, 18, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled(
            format!("  bankdash {}", version),
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-3", "Switch page"),
        help_line("←/→", "Previous/next page"),
        help_line("↑/↓", "Move through notifications"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_line("r", "Refresh account data"),
        help_line("m", "Mark all notifications read"),
        help_line("L", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "  Idle sessions end after 30 minutes.",
            styles::muted_style(),
        )),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn input_line(label: &str, value: String, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::raw("   "),
        Span::styled(format!("{:<10}[", label), styles::muted_style()),
        Span::styled(format!("{:<24}{}", value, cursor), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 13 } else { 11 };
    let area = centered_rect_fixed(46, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled("   Sign in to bankdash", styles::title_style())),
        Line::from(""),
    ];

    // Show the tail of long addresses so the cursor stays visible
    let email: String = {
        let chars: Vec<char> = app.login_email.chars().collect();
        chars[chars.len().saturating_sub(24)..].iter().collect()
    };
    lines.push(input_line("Email:", email, app.login_focus == LoginFocus::Email));
    lines.push(input_line(
        "Password:",
        "*".repeat(app.login_password.chars().count().min(24)),
        app.login_focus == LoginFocus::Password,
    ));

    let remember_style = if app.login_focus == LoginFocus::Remember {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    lines.push(Line::from(vec![
        Span::raw("   "),
        Span::styled(
            format!(
                "[{}] Remember password",
                if app.remember_credentials { "x" } else { " " }
            ),
            remember_style,
        ),
    ]));

    lines.push(Line::from(""));
    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let label = if button_focused { " ▶ Login ◀ " } else { "   Login   " };
    lines.push(Line::from(vec![
        Span::raw("               ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", truncate_string(error, 42)),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
