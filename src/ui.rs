use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use registration_dashboard::{
    format_count, format_percent, Dashboard, DashboardFilter, DashboardView, FilterOptions, Granularity,
    VehicleCategory,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Manufacturers,
    Categories,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Manufacturers,
            Page::Manufacturers => Page::Categories,
            Page::Categories => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Categories,
            Page::Manufacturers => Page::Overview,
            Page::Categories => Page::Manufacturers,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Manufacturers => "Manufacturers",
            Page::Categories => "Categories",
        }
    }
}

pub struct App {
    pub dashboard: Dashboard,
    pub options: FilterOptions,
    pub filter: DashboardFilter,
    pub view: DashboardView,
    pub current_page: Page,
    pub makers_state: TableState,
    pub all_makers: bool,
}

impl App {
    pub fn new(dashboard: Dashboard) -> Result<Self> {
        let options = dashboard
            .options()
            .cloned()
            .ok_or(registration_dashboard::FilterError::NoData)?;
        let filter = options.default_filter();
        let view = dashboard.view(&filter);

        let mut makers_state = TableState::default();
        makers_state.select(Some(0));

        Ok(Self {
            dashboard,
            options,
            filter,
            view,
            current_page: Page::Overview,
            makers_state,
            all_makers: false,
        })
    }

    /// Recompute the whole view after any filter change
    fn refresh(&mut self) {
        self.view = self.dashboard.view(&self.filter);
        let len = self.view.market_share.len();
        match self.makers_state.selected() {
            _ if len == 0 => self.makers_state.select(None),
            Some(i) if i >= len => self.makers_state.select(Some(len - 1)),
            None => self.makers_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn cycle_granularity(&mut self) {
        self.filter.granularity = self.filter.granularity.next(self.options.latest_month);
        self.refresh();
    }

    /// Step the selected period, or the start of the year range in overall mode
    pub fn step_period(&mut self, forward: bool) {
        match self.filter.granularity {
            Granularity::Overall => {
                let (from, to) = self.filter.year_range;
                let from = if forward { (from + 1).min(to) } else { (from - 1).max(self.options.min_year) };
                self.filter.year_range = (from, to);
            }
            g => self.filter.granularity = g.step(forward),
        }
        self.refresh();
    }

    pub fn toggle_category(&mut self, category: VehicleCategory) {
        if !self.filter.categories.remove(&category) {
            self.filter.categories.insert(category);
        }
        self.refresh();
    }

    pub fn toggle_all_makers(&mut self) {
        self.all_makers = !self.all_makers;
        let source = if self.all_makers { &self.options.makers } else { &self.options.default_makers };
        self.filter.makers = source.iter().cloned().collect();
        self.refresh();
    }

    pub fn reset(&mut self) {
        self.filter = self.options.default_filter();
        self.all_makers = false;
        self.refresh();
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.view.market_share.len();
        if len == 0 {
            return;
        }
        let i = match self.makers_state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.makers_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.view.market_share.len();
        if len == 0 {
            return;
        }
        let i = match self.makers_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.makers_state.select(Some(i));
    }

    fn period_label(&self) -> String {
        match self.filter.granularity {
            Granularity::Overall => {
                let (from, to) = self.filter.year_range;
                format!("{} - {}", from, to)
            }
            Granularity::Quarterly { period } => period.label(),
            Granularity::Monthly { period } => format!("{} {}", period.month_name(), period.year),
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

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('g') => app.cycle_granularity(),
                KeyCode::Char('[') | KeyCode::Left => app.step_period(false),
                KeyCode::Char(']') | KeyCode::Right => app.step_period(true),
                KeyCode::Char('1') => app.toggle_category(VehicleCategory::TwoWheeler),
                KeyCode::Char('2') => app.toggle_category(VehicleCategory::ThreeWheeler),
                KeyCode::Char('3') => app.toggle_category(VehicleCategory::FourWheeler),
                KeyCode::Char('a') => app.toggle_all_makers(),
                KeyCode::Char('r') => app.reset(),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Length(3), // Active filters
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_filters(f, chunks[1], app);

    if app.view.empty {
        let message = app.view.message.clone().unwrap_or_default();
        let empty = Paragraph::new(format!("\n  {}", message))
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL).title(" No Data "));
        f.render_widget(empty, chunks[2]);
    } else {
        match app.current_page {
            Page::Overview => render_overview(f, chunks[2], app),
            Page::Manufacturers => render_manufacturers(f, chunks[2], app),
            Page::Categories => render_categories(f, chunks[2], app),
        }
    }

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Overview, Page::Manufacturers, Page::Categories];

    let mut tab_spans = vec![Span::styled(
        "🚗 Vehicle Registrations  ",
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];
    for (i, page) in pages.iter().enumerate() {
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

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(metrics) = &app.view.metrics {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("Total: {}", format_count(metrics.total_registrations)),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_filters(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled(app.filter.granularity.name(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(": "),
        Span::styled(app.period_label(), Style::default().fg(Color::White)),
        Span::raw("  |  "),
    ];

    for category in VehicleCategory::ALL {
        let selected = app.filter.categories.contains(&category);
        spans.push(Span::styled(
            format!("[{}] {} ", if selected { "x" } else { " " }, category.code()),
            Style::default().fg(if selected { Color::Green } else { Color::DarkGray }),
        ));
    }

    spans.push(Span::raw(" |  "));
    spans.push(Span::styled(
        if app.all_makers {
            format!("All {} makers", app.options.makers.len())
        } else {
            format!("Top {} makers", app.options.default_makers.len())
        },
        Style::default().fg(Color::White),
    ));

    let filters = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Filters "),
    );
    f.render_widget(filters, area);
}

fn growth_color(pct: Option<f64>) -> Color {
    match pct {
        Some(p) if p > 0.0 => Color::Green,
        Some(p) if p < 0.0 => Color::Red,
        _ => Color::DarkGray,
    }
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);

    let mut content = vec![Line::from("")];
    if let Some(metrics) = &app.view.metrics {
        content.push(Line::from(vec![
            Span::styled("  Total Registrations: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw(format_count(metrics.total_registrations)),
        ]));
        for g in &metrics.growth {
            content.push(Line::from(vec![
                Span::styled(
                    format!("  {} Growth ({}): ", g.kind.label(), g.period),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format_percent(g.percent), Style::default().fg(growth_color(g.percent))),
                Span::styled(
                    format!("   vs {} ({})", g.comparison_period, format_count(g.previous)),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
        }
        if let Some(caption) = &metrics.caption {
            content.push(Line::from(Span::styled(
                format!("  {}", caption),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }

    let title = app
        .view
        .metrics
        .as_ref()
        .map(|m| format!(" {} ", m.heading))
        .unwrap_or_else(|| " Key Metrics ".to_string());
    let metrics = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );
    f.render_widget(metrics, chunks[0]);

    // Keep the most recent months that fit the chart width
    let bar_width: u16 = 7;
    let fits = (chunks[1].width.saturating_sub(2) / (bar_width + 1)).max(1) as usize;
    let skip = app.view.trend.len().saturating_sub(fits);
    let labels: Vec<String> = app.view.trend[skip..].iter().map(|p| p.period.clone()).collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(&app.view.trend[skip..])
        .map(|(label, p)| (label.as_str(), p.registrations))
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Total Vehicle Registrations by Month "),
        )
        .data(data.as_slice())
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    f.render_widget(chart, chunks[1]);
}

fn render_manufacturers(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["#", "Manufacturer", "Registrations", "Share"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.view.market_share.iter().enumerate().map(|(i, slice)| {
        Row::new(vec![
            Cell::from(format!("{}", i + 1)),
            Cell::from(truncate(&slice.maker, 40)),
            Cell::from(format_count(slice.registrations)),
            Cell::from(format!("{:.2}%", slice.share_pct)).style(Style::default().fg(Color::Green)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(42),
            Constraint::Length(16),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Market Share (by Registrations) "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.makers_state);
}

fn render_categories(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let labels: Vec<&str> = app.view.categories.iter().map(|c| c.category.code()).collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(&app.view.categories)
        .map(|(label, c)| (*label, c.registrations))
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Registrations by Vehicle Category "),
        )
        .data(data.as_slice())
        .bar_width(12)
        .bar_gap(3)
        .bar_style(Style::default().fg(Color::Magenta))
        .value_style(Style::default().fg(Color::Black).bg(Color::Magenta));
    f.render_widget(chart, chunks[0]);

    let mut content = vec![Line::from("")];
    if app.view.leaders.is_empty() {
        content.push(Line::from(Span::styled(
            "  Please select at least one vehicle category to see the leader.",
            Style::default().fg(Color::Yellow),
        )));
    }
    for leader in &app.view.leaders {
        content.push(Line::from(vec![Span::styled(
            format!("  Leader in {} ({})", leader.category.code(), leader.category.name()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )]));
        let line = match &leader.maker {
            Some(maker) => Line::from(vec![
                Span::styled(format!("    {}", maker), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
                Span::styled(
                    format!("  {} Registrations", format_count(leader.registrations)),
                    Style::default().fg(Color::Green),
                ),
            ]),
            None => Line::from(Span::styled(
                format!("    No registration data for the selected manufacturers in the {} category.", leader.category.code()),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )),
        };
        content.push(line);
        content.push(Line::from(""));
    }

    let leaders = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Category-Specific Leaders "),
    );
    f.render_widget(leaders, chunks[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if !app.view.warnings.is_empty() {
        status_spans.push(Span::styled(
            format!(" ⚠ {} load warnings ", app.view.warnings.len()),
            Style::default().fg(Color::Red),
        ));
        status_spans.push(Span::raw("| "));
    }

    for (key, label) in [
        ("Tab", " Page | "),
        ("g", " Mode | "),
        ("[/]", " Period | "),
        ("1-3", " Category | "),
        ("a", " Makers | "),
        ("r", " Reset | "),
    ] {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}
