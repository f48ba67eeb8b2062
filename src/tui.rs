use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::ApiClient;
use crate::models::{Chance, LocationOption, Vacancy};
use crate::state::{App, PageItem, Pager, MAJOR_OPTIONS};
use crate::store::Store;

const DISCLAIMER: &str = "This is an unofficial browser for MagangHub internship vacancies. \
All data comes straight from the public kemnaker.go.id API and may be \
incomplete or out of date. Always verify details on the official site \
before applying.\n\nPress any key to continue.";

/// Fetch outcomes delivered back to the UI loop. City and vacancy results
/// carry the generation token of the request that produced them.
enum Fetched {
    Provinces(Result<Vec<LocationOption>>),
    Cities(u64, Result<Vec<LocationOption>>),
    Vacancies(u64, Result<Vec<Vacancy>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    Province,
    City,
    Major,
    List,
}

struct Ui {
    app: App,
    focus: Focus,
    selected: usize,
    scroll_offset: u16,
    show_disclaimer: bool,
    fetched_at: Option<DateTime<Local>>,
    batch: u32,
    major_options: Vec<String>,
}

impl Ui {
    fn new(batch: u32, page_size: u32) -> Self {
        Self {
            app: App::new(page_size),
            focus: Focus::List,
            selected: 0,
            scroll_offset: 0,
            show_disclaimer: false,
            fetched_at: None,
            batch,
            major_options: MAJOR_OPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn next_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Search => Focus::Province,
            Focus::Province => Focus::City,
            Focus::City => Focus::Major,
            Focus::Major => Focus::List,
            Focus::List => Focus::Search,
        };
    }

    fn prev_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Search => Focus::List,
            Focus::Province => Focus::Search,
            Focus::City => Focus::Province,
            Focus::Major => Focus::City,
            Focus::List => Focus::Major,
        };
    }

    fn reset_selection(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }

    fn current_vacancy(&self) -> Option<&Vacancy> {
        self.app.page_items().get(self.selected)
    }
}

/// Steps through `[None, options...]` in either direction.
fn cycle_option<T: Clone + PartialEq>(options: &[T], current: &Option<T>, delta: i32) -> Option<T> {
    let len = options.len() as i32;
    let cur = match current {
        None => 0,
        Some(v) => options
            .iter()
            .position(|o| o == v)
            .map(|i| i as i32 + 1)
            .unwrap_or(0),
    };
    let next = (cur + delta).rem_euclid(len + 1);
    if next == 0 {
        None
    } else {
        Some(options[(next - 1) as usize].clone())
    }
}

fn spawn_province_fetch(client: &ApiClient, tx: &mpsc::UnboundedSender<Fetched>) {
    let client = client.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = client.list_provinces().await;
        let _ = tx.send(Fetched::Provinces(result));
    });
}

fn spawn_city_fetch(
    client: &ApiClient,
    tx: &mpsc::UnboundedSender<Fetched>,
    token: u64,
    province_code: String,
) {
    let client = client.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = client.list_cities(&province_code).await;
        let _ = tx.send(Fetched::Cities(token, result));
    });
}

fn spawn_vacancy_fetch(
    client: &ApiClient,
    tx: &mpsc::UnboundedSender<Fetched>,
    token: u64,
    batch: u32,
    province_code: Option<String>,
) {
    let client = client.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = client
            .fetch_all_vacancies(batch, province_code.as_deref())
            .await;
        let _ = tx.send(Fetched::Vacancies(token, result));
    });
}

pub async fn run_browse(
    client: ApiClient,
    store: Option<Store>,
    batch: u32,
    page_size: u32,
) -> Result<()> {
    let mut ui = Ui::new(batch, page_size);
    ui.show_disclaimer = match &store {
        Some(s) => !s.disclaimer_shown().unwrap_or(false),
        None => true,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_province_fetch(&client, &tx);
    let token = ui.app.begin_vacancy_fetch();
    spawn_vacancy_fetch(&client, &tx, token, batch, None);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut ui, &client, store.as_ref(), &tx, &mut rx).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ui: &mut Ui,
    client: &ApiClient,
    store: Option<&Store>,
    tx: &mpsc::UnboundedSender<Fetched>,
    rx: &mut mpsc::UnboundedReceiver<Fetched>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        while let Ok(msg) = rx.try_recv() {
            match msg {
                Fetched::Provinces(result) => ui.app.set_provinces(result),
                Fetched::Cities(token, result) => {
                    ui.app.apply_city_result(token, result);
                }
                Fetched::Vacancies(token, result) => {
                    if ui.app.apply_vacancy_result(token, result) {
                        ui.fetched_at = Some(Local::now());
                        ui.reset_selection();
                    }
                }
            }
        }

        let page_len = ui.app.page_items().len();
        if ui.selected >= page_len {
            ui.selected = page_len.saturating_sub(1);
        }
        list_state.select(if page_len == 0 { None } else { Some(ui.selected) });

        terminal.draw(|frame| draw(frame, ui, &mut list_state))?;

        // Keep the loop turning so fetch results are applied promptly.
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if ui.show_disclaimer {
            ui.show_disclaimer = false;
            if let Some(store) = store {
                if let Err(err) = store.mark_disclaimer_shown() {
                    warn!(error = %err, "could not persist disclaimer flag");
                }
            }
            continue;
        }

        match key.code {
            KeyCode::Esc => break,
            KeyCode::Char('q') if ui.focus != Focus::Search => break,
            KeyCode::Tab => ui.next_focus(),
            KeyCode::BackTab => ui.prev_focus(),
            code => handle_key(ui, client, tx, code),
        }
    }
    Ok(())
}

fn handle_key(
    ui: &mut Ui,
    client: &ApiClient,
    tx: &mpsc::UnboundedSender<Fetched>,
    code: KeyCode,
) {
    match ui.focus {
        Focus::Search => match code {
            KeyCode::Char(c) => {
                let mut search = ui.app.filters.search.clone();
                search.push(c);
                ui.app.set_search(search);
                ui.reset_selection();
            }
            KeyCode::Backspace => {
                let mut search = ui.app.filters.search.clone();
                search.pop();
                ui.app.set_search(search);
                ui.reset_selection();
            }
            KeyCode::Enter => ui.focus = Focus::List,
            _ => {}
        },
        Focus::Province => match code {
            KeyCode::Up | KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('k') => {
                let delta = if matches!(code, KeyCode::Down | KeyCode::Char('j')) {
                    1
                } else {
                    -1
                };
                let next = cycle_option(&ui.app.provinces, &ui.app.filters.province, delta);
                change_province(ui, client, tx, next);
            }
            KeyCode::Delete | KeyCode::Char('x') => change_province(ui, client, tx, None),
            _ => {}
        },
        Focus::City => {
            // The city picker is inert until a province is selected.
            if ui.app.filters.province.is_none() {
                return;
            }
            match code {
                KeyCode::Up | KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('k') => {
                    let delta = if matches!(code, KeyCode::Down | KeyCode::Char('j')) {
                        1
                    } else {
                        -1
                    };
                    let next = cycle_option(&ui.app.cities, &ui.app.filters.city, delta);
                    ui.app.set_city(next);
                    ui.reset_selection();
                }
                KeyCode::Delete | KeyCode::Char('x') => {
                    ui.app.set_city(None);
                    ui.reset_selection();
                }
                _ => {}
            }
        }
        Focus::Major => match code {
            KeyCode::Up | KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('k') => {
                let delta = if matches!(code, KeyCode::Down | KeyCode::Char('j')) {
                    1
                } else {
                    -1
                };
                let next = cycle_option(&ui.major_options, &ui.app.filters.major, delta);
                ui.app.set_major(next);
                ui.reset_selection();
            }
            KeyCode::Delete | KeyCode::Char('x') => {
                ui.app.set_major(None);
                ui.reset_selection();
            }
            _ => {}
        },
        Focus::List => match code {
            KeyCode::Down | KeyCode::Char('j') => {
                if ui.selected + 1 < ui.app.page_items().len() {
                    ui.selected += 1;
                    ui.scroll_offset = 0;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if ui.selected > 0 {
                    ui.selected -= 1;
                    ui.scroll_offset = 0;
                }
            }
            KeyCode::Right | KeyCode::Char('n') => {
                ui.app.next_page();
                ui.reset_selection();
            }
            KeyCode::Left | KeyCode::Char('p') => {
                ui.app.prev_page();
                ui.reset_selection();
            }
            KeyCode::Home => {
                ui.app.set_page(1);
                ui.reset_selection();
            }
            KeyCode::End => {
                let last = ui.app.total_pages();
                ui.app.set_page(last);
                ui.reset_selection();
            }
            KeyCode::Char('J') | KeyCode::PageDown => {
                ui.scroll_offset = ui.scroll_offset.saturating_add(3);
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                ui.scroll_offset = ui.scroll_offset.saturating_sub(3);
            }
            _ => {}
        },
    }
}

fn change_province(
    ui: &mut Ui,
    client: &ApiClient,
    tx: &mpsc::UnboundedSender<Fetched>,
    province: Option<LocationOption>,
) {
    let code = province.as_ref().map(|p| p.value.clone());
    let change = ui.app.set_province(province);
    if let (Some(token), Some(code)) = (change.city_token, code.clone()) {
        spawn_city_fetch(client, tx, token, code);
    }
    spawn_vacancy_fetch(client, tx, change.vacancy_token, ui.batch, code);
    ui.reset_selection();
}

fn draw(frame: &mut Frame, ui: &Ui, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_filter_bar(frame, ui, rows[0]);
    draw_main(frame, ui, rows[1], list_state);
    draw_page_line(frame, ui, rows[2]);
    draw_help(frame, ui, rows[3]);

    if ui.show_disclaimer {
        draw_disclaimer(frame);
    }
}

fn picker_box(frame: &mut Frame, area: Rect, title: &str, value: &str, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let widget = Paragraph::new(value.to_string()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(format!(" {title} ")),
    );
    frame.render_widget(widget, area);
}

fn draw_filter_bar(frame: &mut Frame, ui: &Ui, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(22),
            Constraint::Percentage(22),
            Constraint::Percentage(22),
        ])
        .split(area);

    let search = if ui.focus == Focus::Search {
        format!("{}_", ui.app.filters.search)
    } else {
        ui.app.filters.search.clone()
    };
    picker_box(frame, cols[0], "Search", &search, ui.focus == Focus::Search);

    let province = ui
        .app
        .filters
        .province
        .as_ref()
        .map(|p| p.label.as_str())
        .unwrap_or("All provinces");
    picker_box(
        frame,
        cols[1],
        "Province",
        province,
        ui.focus == Focus::Province,
    );

    let city = if ui.app.filters.province.is_none() {
        "(select province)"
    } else {
        ui.app
            .filters
            .city
            .as_ref()
            .map(|c| c.label.as_str())
            .unwrap_or("All cities")
    };
    picker_box(frame, cols[2], "City", city, ui.focus == Focus::City);

    let major = ui.app.filters.major.as_deref().unwrap_or("All majors");
    picker_box(frame, cols[3], "Major", major, ui.focus == Focus::Major);
}

fn draw_main(frame: &mut Frame, ui: &Ui, area: Rect, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let title = format!(
        " Vacancies ({} matches, page {}/{}) ",
        ui.app.visible().len(),
        ui.app.pager.current,
        ui.app.total_pages()
    );
    let list_block = Block::default().borders(Borders::ALL).title(title);

    if ui.app.loading {
        let loading = Paragraph::new("Loading vacancies...").block(list_block);
        frame.render_widget(loading, chunks[0]);
    } else if ui.app.page_items().is_empty() {
        // Zero matches and a failed fetch read the same here.
        let empty = Paragraph::new("No vacancies found.").block(list_block);
        frame.render_widget(empty, chunks[0]);
    } else {
        let items: Vec<ListItem> = ui
            .app
            .page_items()
            .iter()
            .map(|v| {
                let title = if v.posisi.chars().count() > 30 {
                    let cut: String = v.posisi.chars().take(27).collect();
                    format!("{cut}...")
                } else {
                    v.posisi.clone()
                };
                let chance = match v.chance() {
                    Chance::High => "H",
                    Chance::Medium => "M",
                    Chance::Low => "L",
                };
                ListItem::new(format!("[{}] {} | {}", chance, title, v.employer_name()))
            })
            .collect();

        let list = List::new(items)
            .block(list_block)
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, chunks[0], list_state);
    }

    let detail = build_detail(ui);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((ui.scroll_offset, 0));
    frame.render_widget(detail_widget, chunks[1]);
}

fn build_detail(ui: &Ui) -> Text<'_> {
    if ui.app.loading {
        return Text::raw("Loading...");
    }
    let Some(v) = ui.current_vacancy() else {
        return Text::raw("No vacancy selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        v.posisi.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", v.employer_name())));
    lines.push(Line::from(format!("{}, {}", v.city(), v.province())));

    if !v.status().is_empty() {
        lines.push(Line::from(format!("Status: {}", v.status())));
    }

    let chance = v.chance();
    let chance_style = match chance {
        Chance::High => Style::default().fg(Color::Green),
        Chance::Medium => Style::default().fg(Color::Yellow),
        Chance::Low => Style::default().fg(Color::Red),
    };
    lines.push(Line::from(vec![
        Span::raw(format!(
            "Registrants: {} / {} ({:.0}%)  Chance: ",
            v.jumlah_terdaftar,
            v.jumlah_kuota,
            v.fill_percent()
        )),
        Span::styled(chance.label(), chance_style),
    ]));

    let majors = v.majors();
    if !majors.is_empty() {
        let titles: Vec<String> = majors.into_iter().map(|m| m.title).collect();
        lines.push(Line::from(format!("Majors: {}", titles.join(", "))));
    }

    lines.push(Line::from(""));
    for line in textwrap::fill(&v.short_description(), 70).lines() {
        lines.push(Line::from(line.to_string()));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        v.detail_url(),
        Style::default().fg(Color::Blue),
    )));

    Text::from(lines)
}

fn draw_page_line(frame: &mut Frame, ui: &Ui, area: Rect) {
    let current = ui.app.pager.current;
    let total = ui.app.total_pages();
    let mut parts: Vec<String> = Vec::new();
    for item in Pager::window(current, total) {
        match item {
            PageItem::Page(n) if n == current => parts.push(format!("[{n}]")),
            PageItem::Page(n) => parts.push(n.to_string()),
            PageItem::Gap => parts.push("...".to_string()),
        }
    }
    let fetched = ui
        .fetched_at
        .map(|t| format!("  fetched {}", t.format("%H:%M:%S")))
        .unwrap_or_default();
    let line = Paragraph::new(format!(" Pages: {}{}", parts.join(" "), fetched))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(line, area);
}

fn draw_help(frame: &mut Frame, ui: &Ui, area: Rect) {
    let help = match ui.focus {
        Focus::Search => " type to search  Enter:done  Tab:next field  Esc:quit",
        Focus::Province | Focus::City | Focus::Major => {
            " j/k:cycle option  x:clear  Tab:next field  q:quit"
        }
        Focus::List => " j/k:select  n/p:page  J/K:scroll detail  Tab:filters  q:quit",
    };
    let widget = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(widget, area);
}

fn draw_disclaimer(frame: &mut Frame) {
    let area = frame.area();
    let width = area.width.min(60);
    let height = area.height.min(10);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    frame.render_widget(Clear, popup);
    let widget = Paragraph::new(DISCLAIMER)
        .block(Block::default().borders(Borders::ALL).title(" Heads up "))
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, popup);
}
