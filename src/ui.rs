use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use tracing::{error, info};

use initech_crm::{
    Customer, CustomerBackend, CustomerCollection, CustomerStatus, CustomerStore, FunnelGrouping,
    StartPage,
};

/// How long a notification stays in the status bar
const NOTIFICATION_TTL_SECS: i64 = 5;

/// Event poll interval; bounds how late a notification expires
const EVENT_POLL_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Funnel,
    Customers,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Funnel => Page::Customers,
            Page::Customers => Page::Funnel,
        }
    }

    pub fn previous(&self) -> Self {
        // Two pages: previous and next coincide
        self.next()
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Funnel => "Funnel",
            Page::Customers => "Customers",
        }
    }
}

impl From<StartPage> for Page {
    fn from(start: StartPage) -> Self {
        match start {
            StartPage::Funnel => Page::Funnel,
            StartPage::Customers => Page::Customers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Open status dropdown for one customer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPicker {
    pub customer_id: u32,
    pub selected: usize,
}

pub struct App {
    pub store: CustomerStore,
    backend: Box<dyn CustomerBackend>,
    pub current_page: Page,
    pub table_state: TableState,
    pub focused_stage: CustomerStatus,
    pub open_stage: Option<CustomerStatus>,
    pub bucket_selected: Option<usize>,
    pub picker: Option<StatusPicker>,
    pub notification: Option<Notification>,
    pub should_quit: bool,
}

impl App {
    pub fn new(store: CustomerStore, backend: Box<dyn CustomerBackend>, start_page: Page) -> Self {
        let mut table_state = TableState::default();
        if !store.snapshot().is_empty() {
            table_state.select(Some(0));
        }

        Self {
            store,
            backend,
            current_page: start_page,
            table_state,
            focused_stage: CustomerStatus::New,
            open_stage: None,
            bucket_selected: None,
            picker: None,
            notification: None,
            should_quit: false,
        }
    }

    pub fn snapshot(&self) -> CustomerCollection {
        self.store.snapshot()
    }

    /// Regrouped from the current snapshot on every call
    pub fn funnel(&self) -> FunnelGrouping {
        FunnelGrouping::group(&self.store.snapshot())
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Customer under the cursor on the current page
    pub fn selected_customer(&self) -> Option<Arc<Customer>> {
        match self.current_page {
            Page::Customers => self
                .table_state
                .selected()
                .and_then(|i| self.snapshot().get(i).cloned()),
            Page::Funnel => {
                let stage = self.open_stage?;
                let index = self.bucket_selected?;
                self.funnel().bucket(stage).get(index).cloned()
            }
        }
    }

    pub fn next(&mut self) {
        match self.current_page {
            Page::Customers => {
                let len = self.snapshot().len();
                if len == 0 {
                    return;
                }
                let i = match self.table_state.selected() {
                    Some(i) if i >= len - 1 => 0,
                    Some(i) => i + 1,
                    None => 0,
                };
                self.table_state.select(Some(i));
            }
            Page::Funnel => {
                let len = self.open_bucket_len();
                if len == 0 {
                    return;
                }
                self.bucket_selected = Some(match self.bucket_selected {
                    Some(i) if i >= len - 1 => 0,
                    Some(i) => i + 1,
                    None => 0,
                });
            }
        }
    }

    pub fn previous(&mut self) {
        match self.current_page {
            Page::Customers => {
                let len = self.snapshot().len();
                if len == 0 {
                    return;
                }
                let i = match self.table_state.selected() {
                    Some(0) | None => len - 1,
                    Some(i) => i - 1,
                };
                self.table_state.select(Some(i));
            }
            Page::Funnel => {
                let len = self.open_bucket_len();
                if len == 0 {
                    return;
                }
                self.bucket_selected = Some(match self.bucket_selected {
                    Some(0) | None => len - 1,
                    Some(i) => i - 1,
                });
            }
        }
    }

    fn open_bucket_len(&self) -> usize {
        self.open_stage
            .map(|stage| self.funnel().count(stage))
            .unwrap_or(0)
    }

    pub fn focus_stage(&mut self, stage: CustomerStatus) {
        self.focused_stage = stage;
    }

    pub fn focus_next_stage(&mut self) {
        let next = (self.focused_stage.index() + 1) % CustomerStatus::ALL.len();
        self.focused_stage = CustomerStatus::ALL[next];
    }

    pub fn focus_previous_stage(&mut self) {
        let len = CustomerStatus::ALL.len();
        let prev = (self.focused_stage.index() + len - 1) % len;
        self.focused_stage = CustomerStatus::ALL[prev];
    }

    /// Accordion: one item open at most, open item collapses on toggle
    pub fn toggle_stage(&mut self) {
        if self.open_stage == Some(self.focused_stage) {
            self.open_stage = None;
            self.bucket_selected = None;
        } else {
            self.open_stage = Some(self.focused_stage);
            self.bucket_selected = (self.funnel().count(self.focused_stage) > 0).then_some(0);
        }
    }

    // ------------------------------------------------------------------------
    // Status control
    // ------------------------------------------------------------------------

    pub fn open_picker(&mut self) {
        if let Some(customer) = self.selected_customer() {
            self.picker = Some(StatusPicker {
                customer_id: customer.id,
                selected: customer.status.index(),
            });
        }
    }

    pub fn picker_next(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            picker.selected = (picker.selected + 1) % CustomerStatus::ALL.len();
        }
    }

    pub fn picker_previous(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            let len = CustomerStatus::ALL.len();
            picker.selected = (picker.selected + len - 1) % len;
        }
    }

    pub fn cancel_picker(&mut self) {
        self.picker = None;
    }

    pub fn apply_picker(&mut self) {
        if let Some(picker) = self.picker.take() {
            if let Some(status) = CustomerStatus::from_index(picker.selected) {
                self.change_status(picker.customer_id, status);
            }
        }
    }

    /// The one user event both views emit: "status changed for X to Y"
    ///
    /// The local store is updated first; a failing backend only produces a
    /// notification and never reverts the local change.
    pub fn change_status(&mut self, customer_id: u32, status: CustomerStatus) {
        if !self.store.set_status(customer_id, status) {
            return;
        }

        if let Some(updated) = self.store.snapshot().find(customer_id).cloned() {
            match self.backend.update_customer_status(&updated, status) {
                Ok(_) => self.notify(
                    NotificationLevel::Info,
                    format!("{} → {}", updated.name, status),
                ),
                Err(err) => {
                    error!(customer_id, backend = self.backend.name(), error = %err, "failed to persist status");
                    self.notify(NotificationLevel::Error, err.to_string());
                }
            }
        }

        self.clamp_bucket_selection();
    }

    fn clamp_bucket_selection(&mut self) {
        let len = self.open_bucket_len();
        self.bucket_selected = match self.bucket_selected {
            _ if len == 0 => None,
            Some(i) if i >= len => Some(len - 1),
            other => other,
        };
    }

    pub fn notify(&mut self, level: NotificationLevel, message: String) {
        self.notification = Some(Notification {
            level,
            message,
            created_at: Utc::now(),
        });
    }

    pub fn expire_notification(&mut self, now: DateTime<Utc>) {
        let expired = self
            .notification
            .as_ref()
            .map(|n| now - n.created_at >= Duration::seconds(NOTIFICATION_TTL_SECS))
            .unwrap_or(false);
        if expired {
            self.notification = None;
        }
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.picker.is_some() {
            match key.code {
                KeyCode::Esc => self.cancel_picker(),
                KeyCode::Enter => self.apply_picker(),
                KeyCode::Down | KeyCode::Char('j') => self.picker_next(),
                KeyCode::Up | KeyCode::Char('k') => self.picker_previous(),
                KeyCode::Char(c @ '1'..='3') => {
                    if let Some(picker) = self.picker.as_mut() {
                        picker.selected = c as usize - '1' as usize;
                    }
                    self.apply_picker();
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => self.previous_page(),
            KeyCode::Tab => self.next_page(),
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Char('s') => self.open_picker(),
            _ => match self.current_page {
                Page::Customers => self.handle_customers_key(key),
                Page::Funnel => self.handle_funnel_key(key),
            },
        }
    }

    fn handle_customers_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.open_picker(),
            KeyCode::Home => {
                if !self.snapshot().is_empty() {
                    self.table_state.select(Some(0));
                }
            }
            KeyCode::End => {
                let len = self.snapshot().len();
                if len > 0 {
                    self.table_state.select(Some(len - 1));
                }
            }
            _ => {}
        }
    }

    fn handle_funnel_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.focus_previous_stage(),
            KeyCode::Right | KeyCode::Char('l') => self.focus_next_stage(),
            KeyCode::Char(c @ '1'..='3') => {
                if let Some(stage) = CustomerStatus::from_index(c as usize - '1' as usize) {
                    self.focus_stage(stage);
                }
            }
            KeyCode::Char(' ') => self.toggle_stage(),
            KeyCode::Enter => {
                if self.selected_customer().is_some() && self.open_stage == Some(self.focused_stage) {
                    self.open_picker();
                } else {
                    self.toggle_stage();
                }
            }
            _ => {}
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    info!(page = app.current_page.title(), "terminal UI started");
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = %err, "terminal UI failed");
    }

    Ok(res?)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    while !app.should_quit {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(std::time::Duration::from_millis(EVENT_POLL_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
        app.expire_notification(Utc::now());
    }
    Ok(())
}

// ============================================================================
// Rendering
// ============================================================================

fn stage_color(status: CustomerStatus) -> Color {
    match status {
        CustomerStatus::New => Color::Blue,
        CustomerStatus::ContractSent => Color::Yellow,
        CustomerStatus::ContractSigned => Color::Green,
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Title + page tabs
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Funnel => render_funnel(f, chunks[1], app),
        Page::Customers => render_customers(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);

    if app.picker.is_some() {
        let area = f.size();
        render_picker(f, area, app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Funnel, Page::Customers].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Customers: {}", app.snapshot().len()),
        Style::default().fg(Color::White),
    ));

    let header_text = vec![
        Line::from(vec![
            Span::styled("Initech CRM", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                "Manage your customers and sales funnel",
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(tab_spans),
    ];

    let header = Paragraph::new(header_text)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_funnel(f: &mut Frame, area: Rect, app: &App) {
    let funnel = app.funnel();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    // Stage cards
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(chunks[0]);

    for (card, (status, bucket)) in cards.iter().zip(funnel.stages()) {
        render_stage_card(f, *card, status, bucket.len(), status == app.focused_stage);
    }

    // Accordion
    let mut lines = vec![];
    for (status, bucket) in funnel.stages() {
        let is_open = app.open_stage == Some(status);
        let marker = if is_open { "▾" } else { "▸" };
        let title_style = if status == app.focused_stage {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };

        lines.push(Line::from(vec![
            Span::raw(format!(" {} ", marker)),
            Span::styled(format!("{} ({})", status, bucket.len()), title_style),
        ]));

        if is_open {
            if bucket.is_empty() {
                lines.push(Line::from(Span::styled(
                    "     No customers in this stage",
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            }
            for (i, customer) in bucket.iter().enumerate() {
                let selected = app.bucket_selected == Some(i);
                lines.push(customer_line(customer, selected));
            }
        }
        lines.push(Line::from(""));
    }

    let accordion = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" All Customers - by current status "),
    );

    f.render_widget(accordion, chunks[1]);
}

fn render_stage_card(f: &mut Frame, area: Rect, status: CustomerStatus, count: usize, focused: bool) {
    let border = if focused { Color::Yellow } else { Color::White };
    let bar_width = area.width.saturating_sub(4) as usize;

    let content = vec![
        Line::from(Span::styled(
            format!(" {}", count),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(" {}", "▀".repeat(bar_width)),
            Style::default().fg(stage_color(status)),
        )),
    ];

    let card = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(format!(" {} ", status)),
    );

    f.render_widget(card, area);
}

fn customer_line(customer: &Customer, selected: bool) -> Line<'static> {
    let row_style = if selected {
        Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(if selected { "   → " } else { "     " }),
        Span::styled(
            format!("[{}] ", customer.initials()),
            Style::default().fg(stage_color(customer.status)),
        ),
        Span::styled(format!("{:<20}", truncate(&customer.name, 20)), row_style),
        Span::styled(
            format!("{:<28}", truncate(&customer.email, 28)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("▾ {}", customer.status), Style::default().fg(stage_color(customer.status))),
    ])
}

fn render_customers(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Name", "Email", "Status"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let snapshot = app.snapshot();
    let rows = snapshot.iter().map(|customer| {
        let color = stage_color(customer.status);

        let cells = vec![
            Cell::from(Line::from(vec![
                Span::styled(format!("[{}] ", customer.initials()), Style::default().fg(color)),
                Span::raw(truncate(&customer.name, 28)),
            ])),
            Cell::from(truncate(&customer.email, 30)),
            Cell::from(format!("▾ {}", customer.status)).style(Style::default().fg(color)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(34),
            Constraint::Length(32),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" All Customers "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_picker(f: &mut Frame, area: Rect, app: &App) {
    let picker = match &app.picker {
        Some(p) => p,
        None => return,
    };
    let name = app
        .snapshot()
        .find(picker.customer_id)
        .map(|c| c.name.clone())
        .unwrap_or_default();

    let popup = centered_rect(34, (CustomerStatus::ALL.len() + 2) as u16, area);

    let items: Vec<ListItem> = CustomerStatus::ALL
        .iter()
        .enumerate()
        .map(|(i, status)| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", i + 1), Style::default().fg(Color::Yellow)),
                Span::styled(status.as_str(), Style::default().fg(stage_color(*status))),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(format!(" Status: {} ", name)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    let mut state = ListState::default();
    state.select(Some(picker.selected));

    f.render_widget(Clear, popup);
    f.render_stateful_widget(list, popup, &mut state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    match app.current_page {
        Page::Customers => {
            let selected = app.table_state.selected().map(|i| i + 1).unwrap_or(0);
            status_spans.push(Span::styled(
                format!(" Row: {}/{} ", selected, app.snapshot().len()),
                Style::default().fg(Color::Cyan),
            ));
        }
        Page::Funnel => {
            status_spans.push(Span::styled(
                format!(" Stage: {} ", app.focused_stage),
                Style::default().fg(Color::Cyan),
            ));
        }
    }

    if let Some(notification) = &app.notification {
        let color = match notification.level {
            NotificationLevel::Info => Color::Green,
            NotificationLevel::Error => Color::Red,
        };
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(notification.message.clone(), Style::default().fg(color)));
    } else if let Some(change) = app.store.last_change() {
        status_spans.push(Span::raw(" | Last: "));
        status_spans.push(Span::styled(
            format!("{} {} → {}", change.customer_name, change.from, change.to),
            Style::default().fg(Color::DarkGray),
        ));
    }

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("s", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Status | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    if app.current_page == Page::Funnel {
        status_spans.push(Span::styled("←/→", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Stage | "));
        status_spans.push(Span::styled("Space", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Expand | "));
    }
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)])
        .alignment(Alignment::Left)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White)),
        );

    f.render_widget(status_bar, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
