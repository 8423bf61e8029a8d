use std::{collections::HashMap, io, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use bannerwatch_core::{
    api::ApiClient,
    countdown::{phase_countdowns, BannerCountdown, CountdownEngine, Lifecycle},
    error::FetchError,
    i18n::Translator,
    images::resolve_image,
    models::{GameId, HistoryResponse, VersionPhase},
    refresh::{RefreshCommand, RefreshTrigger, SyncEvent},
    snapshot::SnapshotStore,
    status::{aggregate, GameView, Health},
    time::TimeSource,
};
use chrono::{DateTime, Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use tokio::{
    spawn,
    sync::mpsc::{self, error::TrySendError},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::block_font;

const INPUT_POLL: Duration = Duration::from_millis(250);
const FALLBACK_IMAGE: &str = "/images/placeholder.webp";

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
    danger: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
        }
    }
}

impl Theme {
    fn health(&self, health: Health) -> Color {
        match health {
            Health::Ok => self.success,
            Health::Maintenance => self.warning,
            Health::Error => self.danger,
            Health::Unknown => self.muted,
        }
    }

    fn lifecycle(&self, lifecycle: Lifecycle) -> Color {
        match lifecycle {
            Lifecycle::Active => self.success,
            Lifecycle::Upcoming => self.accent,
            Lifecycle::Finished => self.muted,
        }
    }
}

fn parse_hex_color(input: &str) -> Option<Color> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    // Byte slicing below needs single-byte characters.
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1].repeat(2), 16).ok()?;
            let g = u8::from_str_radix(&hex[1..2].repeat(2), 16).ok()?;
            let b = u8::from_str_radix(&hex[2..3].repeat(2), 16).ok()?;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

fn contrast_color(color: &Color, fallback: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let luminance =
                0.299 * f64::from(*r) + 0.587 * f64::from(*g) + 0.114 * f64::from(*b);
            if luminance > 186.0 {
                Color::Black
            } else {
                Color::White
            }
        }
        _ => fallback,
    }
}

/// Game tab selected in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    All,
    Game(GameId),
}

impl Filter {
    const TABS: [Filter; 4] = [
        Filter::All,
        Filter::Game(GameId::Genshin),
        Filter::Game(GameId::Hsr),
        Filter::Game(GameId::Zzz),
    ];

    fn index(self) -> usize {
        Self::TABS
            .iter()
            .position(|tab| *tab == self)
            .unwrap_or(0)
    }

    fn from_index(index: usize) -> Option<Self> {
        Self::TABS.get(index).copied()
    }

    fn cycle(self, delta: isize) -> Self {
        let len = Self::TABS.len() as isize;
        let next = (self.index() as isize + delta).rem_euclid(len);
        Self::TABS[next as usize]
    }

    fn nav_key(self) -> &'static str {
        match self {
            Filter::All => "nav.all",
            Filter::Game(game) => game.nav_key(),
        }
    }

    fn matches(self, game: GameId) -> bool {
        match self {
            Filter::All => true,
            Filter::Game(selected) => selected == game,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Banners,
    Versions(GameId),
}

enum AppEvent {
    Input(Event),
    VersionsLoaded(GameId, Result<Vec<VersionPhase>, FetchError>),
    HistoryLoaded(String, Result<HistoryResponse, FetchError>),
}

/// Sync state as last reported by the refresh scheduler.
#[derive(Debug, Default)]
struct SyncStatus {
    fetching: bool,
    last_fetch: Option<DateTime<Utc>>,
    next_refresh: Option<DateTime<Utc>>,
    degraded: bool,
    failures: u32,
    last_error: Option<String>,
    cooldown_until: Option<DateTime<Utc>>,
}

/// Expired banner ids waiting to reach the scheduler.
///
/// The countdown engine reports each expiry once; ids stay queued until a send succeeds.
#[derive(Debug, Default)]
struct ExpiryOutbox {
    pending: Vec<String>,
}

impl ExpiryOutbox {
    fn queue(&mut self, banner_ids: Vec<String>) {
        for id in banner_ids {
            if !self.pending.contains(&id) {
                self.pending.push(id);
            }
        }
    }

    /// Try to hand the queued ids over. Returns whether anything was sent.
    fn flush(&mut self, commands: &mpsc::Sender<RefreshCommand>) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let command = RefreshCommand::Expired {
            banner_ids: std::mem::take(&mut self.pending),
        };
        match commands.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(RefreshCommand::Expired { banner_ids })) => {
                debug!(banners = ?banner_ids, "command channel full; expiry retried next tick");
                self.pending = banner_ids;
                false
            }
            Err(err) => {
                warn!(?err, "failed to request refresh after expiry");
                false
            }
        }
    }
}

/// Terminal front end: renders the shared snapshot and forwards refresh requests.
pub struct BannerApp {
    store: SnapshotStore,
    api: ApiClient,
    clock: Arc<dyn TimeSource>,
    commands: mpsc::Sender<RefreshCommand>,
    sync_rx: Option<mpsc::Receiver<SyncEvent>>,
    event_tx: Option<mpsc::Sender<AppEvent>>,
    translator: Translator,
    theme: Theme,
    tick_interval: Duration,
    engine: CountdownEngine,
    countdowns: Vec<BannerCountdown>,
    games: Vec<GameView>,
    sync: SyncStatus,
    versions: HashMap<GameId, Vec<VersionPhase>>,
    pending_versions: Option<GameId>,
    history: Option<HistoryResponse>,
    pending_history: Option<String>,
    expiries: ExpiryOutbox,
    state: UiState,
}

impl BannerApp {
    pub fn new(
        store: SnapshotStore,
        api: ApiClient,
        clock: Arc<dyn TimeSource>,
        commands: mpsc::Sender<RefreshCommand>,
        translator: Translator,
        tick_interval: Duration,
    ) -> Self {
        Self {
            store,
            api,
            clock,
            commands,
            sync_rx: None,
            event_tx: None,
            translator,
            theme: Theme::default(),
            tick_interval,
            engine: CountdownEngine::new(),
            countdowns: Vec::new(),
            games: Vec::new(),
            sync: SyncStatus::default(),
            versions: HashMap::new(),
            pending_versions: None,
            history: None,
            pending_history: None,
            expiries: ExpiryOutbox::default(),
            state: UiState::default(),
        }
    }

    pub fn attach_sync(&mut self, receiver: mpsc::Receiver<SyncEvent>) {
        self.sync_rx = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        self.handle_snapshot_replaced();
        if self.store.is_loading() {
            self.state
                .set_status(self.translator.t("loading.message").to_string());
        } else {
            self.state
                .set_status(self.translator.t("ui.restored").to_string());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx.clone());
        self.event_tx = Some(event_tx);

        let mut revisions = self.store.subscribe();
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sync_rx = self.sync_rx.take();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.state.should_quit {
                break;
            }

            let mut sync_closed = false;
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    if !self.process_app_event(maybe_event) {
                        break;
                    }
                }
                _ = ticker.tick() => self.handle_tick(),
                Ok(()) = revisions.changed() => self.handle_snapshot_replaced(),
                maybe_sync = next_sync(&mut sync_rx) => match maybe_sync {
                    Some(event) => self.handle_sync_event(event),
                    None => sync_closed = true,
                },
            }
            if sync_closed {
                warn!("refresh scheduler channel closed");
                sync_rx = None;
            }
        }

        if self.commands.try_send(RefreshCommand::Shutdown).is_err() {
            debug!("scheduler already stopped");
        }
        restore_terminal(&mut terminal)?;
        self.event_tx = None;
        Ok(())
    }

    fn handle_tick(&mut self) {
        let now = self.clock.now();
        let snapshot = self.store.current();
        let banners = snapshot
            .as_deref()
            .map(|envelope| envelope.banners.as_slice())
            .unwrap_or(&[]);

        let report = self.engine.tick(banners, now);
        let mut countdowns = report.banners;
        sort_countdowns(&mut countdowns);
        self.countdowns = countdowns;
        self.state.clamp_cursor(self.visible_count());

        if !report.expired.is_empty() {
            info!(banners = ?report.expired, "banners expired");
            self.expiries.queue(report.expired);
        }
        self.expiries.flush(&self.commands);
    }

    fn handle_snapshot_replaced(&mut self) {
        if let Some(envelope) = self.store.current() {
            self.games = aggregate(&envelope.game_statuses, &envelope.banners);
            self.sync.last_fetch = Some(envelope.fetched_at);
            self.sync.next_refresh = Some(envelope.next_refresh_at);
            debug!(
                revision = self.store.revision(),
                hash = %envelope.data_hash,
                banners = envelope.banners.len(),
                "snapshot replaced"
            );
        }
        self.handle_tick();
    }

    fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Started { attempt, trigger } => {
                debug!(attempt, ?trigger, "sync started");
                self.sync.fetching = true;
                if trigger == RefreshTrigger::Manual {
                    self.state
                        .set_status(self.translator.t("sync.fetching").to_string());
                }
            }
            SyncEvent::Applied {
                outcome,
                fetched_at,
                next_refresh_at,
                ..
            } => {
                self.sync.fetching = false;
                self.sync.last_fetch = Some(fetched_at);
                self.sync.next_refresh = Some(next_refresh_at);
                self.sync.failures = 0;
                self.sync.last_error = None;
                self.state.set_status(format!(
                    "{} ({outcome:?})",
                    self.translator.t("header.sync")
                ));
            }
            SyncEvent::Superseded { attempt } => {
                debug!(attempt, "stale sync result dropped");
            }
            SyncEvent::Failed {
                error,
                consecutive_failures,
                retry_in,
                ..
            } => {
                self.sync.fetching = false;
                self.sync.failures = consecutive_failures;
                self.sync.last_error = Some(error.to_string());
                self.state.set_status(format!(
                    "{}: {error} ({} {}s)",
                    self.translator.t("error.title"),
                    self.translator.t("sync.retry_in"),
                    retry_in.as_secs()
                ));
            }
            SyncEvent::Degraded {
                consecutive_failures,
            } => {
                error!(consecutive_failures, "sync degraded");
                self.sync.degraded = true;
            }
            SyncEvent::Recovered => {
                self.sync.degraded = false;
            }
            SyncEvent::CooldownActive { retry_after } => {
                let retry_after = chrono::Duration::from_std(retry_after)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                self.sync.cooldown_until = Some(self.clock.now() + retry_after);
                self.state
                    .set_status(self.translator.t("sync.cooldown").to_string());
            }
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                if let Event::Key(key) = event {
                    self.handle_key(key);
                }
                true
            }
            Some(AppEvent::VersionsLoaded(game, result)) => {
                if self.pending_versions == Some(game) {
                    self.pending_versions = None;
                }
                match result {
                    Ok(phases) => {
                        info!(game = %game, phases = phases.len(), "versions loaded");
                        self.versions.insert(game, phases);
                        self.state.phase_cursor = 0;
                    }
                    Err(err) => {
                        error!(game = %game, %err, "versions fetch failed");
                        self.state.set_status(format!(
                            "{}: {err}",
                            self.translator.t("error.title")
                        ));
                    }
                }
                true
            }
            Some(AppEvent::HistoryLoaded(phase_id, result)) => {
                if self.pending_history.as_deref() == Some(phase_id.as_str()) {
                    self.pending_history = None;
                }
                match result {
                    Ok(history) => {
                        info!(phase = %phase_id, banners = history.banners.len(), "history loaded");
                        self.history = Some(history);
                    }
                    Err(err) => {
                        error!(phase = %phase_id, %err, "history fetch failed");
                        self.state.set_status(format!(
                            "{}: {err}",
                            self.translator.t("error.title")
                        ));
                    }
                }
                true
            }
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.state.should_quit = true;
            return;
        }
        if self.history.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Enter) {
                self.history = None;
            } else if key.code == KeyCode::Char('q') {
                self.state.should_quit = true;
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.state.should_quit = true,
            KeyCode::Esc => match self.state.panel {
                Panel::Versions(_) => self.state.panel = Panel::Banners,
                Panel::Banners => self.state.should_quit = true,
            },
            KeyCode::Tab => self.set_filter(self.state.filter.cycle(1)),
            KeyCode::BackTab => self.set_filter(self.state.filter.cycle(-1)),
            KeyCode::Char(ch @ '0'..='3') => {
                let index = ch.to_digit(10).unwrap_or(0) as usize;
                if let Some(filter) = Filter::from_index(index) {
                    self.set_filter(filter);
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Char('r') => self.request_manual_refresh(),
            KeyCode::Char('l') => {
                let locale = self.translator.locale().toggled();
                self.translator.set_locale(locale);
                info!(%locale, "locale switched");
            }
            KeyCode::Char('v') => self.toggle_versions(),
            KeyCode::Char('h') | KeyCode::Enter => {
                if let Panel::Versions(game) = self.state.panel {
                    self.request_history(game);
                }
            }
            _ => {}
        }
    }

    fn set_filter(&mut self, filter: Filter) {
        self.state.filter = filter;
        self.state.cursor = 0;
        if let (Filter::Game(game), Panel::Versions(_)) = (filter, self.state.panel) {
            self.open_versions(game);
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        match self.state.panel {
            Panel::Banners => {
                let total = self.visible_count();
                self.state.cursor = step(self.state.cursor, delta, total);
            }
            Panel::Versions(game) => {
                let total = self.versions.get(&game).map(Vec::len).unwrap_or(0);
                self.state.phase_cursor = step(self.state.phase_cursor, delta, total);
            }
        }
    }

    fn request_manual_refresh(&mut self) {
        match self.commands.try_send(RefreshCommand::Manual) {
            Ok(()) => info!("manual refresh requested"),
            Err(err) => {
                warn!(?err, "manual refresh not delivered");
                self.state
                    .set_status(self.translator.t("sync.unavailable").to_string());
            }
        }
    }

    fn toggle_versions(&mut self) {
        if let Panel::Versions(_) = self.state.panel {
            self.state.panel = Panel::Banners;
            return;
        }
        let game = match self.state.filter {
            Filter::Game(game) => Some(game),
            Filter::All => self.selected_countdown().map(|entry| entry.banner.game_id),
        };
        let Some(game) = game else {
            self.state
                .set_status(self.translator.t("ui.pick_game").to_string());
            return;
        };
        self.open_versions(game);
    }

    fn open_versions(&mut self, game: GameId) {
        self.state.panel = Panel::Versions(game);
        self.state.phase_cursor = 0;
        if self.versions.contains_key(&game) || self.pending_versions == Some(game) {
            return;
        }
        let Some(sender) = self.event_tx.clone() else {
            error!("event_channel_missing");
            return;
        };
        self.pending_versions = Some(game);
        let api = self.api.clone();
        spawn(async move {
            let result = api.versions(game).await;
            let _ = sender.send(AppEvent::VersionsLoaded(game, result)).await;
        });
    }

    fn request_history(&mut self, game: GameId) {
        let Some(phase) = self
            .versions
            .get(&game)
            .and_then(|phases| phases.get(self.state.phase_cursor))
        else {
            return;
        };
        if self.pending_history.as_deref() == Some(phase.phase_id.as_str()) {
            return;
        }
        let Some(sender) = self.event_tx.clone() else {
            error!("event_channel_missing");
            return;
        };
        let phase_id = phase.phase_id.clone();
        self.pending_history = Some(phase_id.clone());
        let api = self.api.clone();
        spawn(async move {
            let result = api.history(&phase_id).await;
            let _ = sender
                .send(AppEvent::HistoryLoaded(phase_id, result))
                .await;
        });
    }

    fn visible(&self) -> impl Iterator<Item = &BannerCountdown> {
        let filter = self.state.filter;
        self.countdowns
            .iter()
            .filter(move |entry| filter.matches(entry.banner.game_id))
    }

    fn visible_count(&self) -> usize {
        self.visible().count()
    }

    fn selected_countdown(&self) -> Option<&BannerCountdown> {
        self.visible().nth(self.state.cursor)
    }

    fn draw(&mut self, frame: &mut Frame) {
        let size = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(size);

        self.render_tabs(frame, chunks[0]);
        self.render_game_status(frame, chunks[1]);

        if self.store.is_loading() {
            self.render_message(frame, chunks[2], "loading.message", None);
        } else {
            match self.state.panel {
                Panel::Banners => {
                    let body = Layout::default()
                        .direction(Direction::Horizontal)
                        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
                        .split(chunks[2]);
                    self.render_banner_list(frame, body[0]);
                    self.render_banner_detail(frame, body[1]);
                }
                Panel::Versions(game) => self.render_versions(frame, chunks[2], game),
            }
        }
        self.render_status(frame, chunks[3]);

        if let Some(history) = &self.history {
            self.render_history(frame, history);
        }
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = Filter::TABS
            .iter()
            .enumerate()
            .map(|(index, tab)| Line::from(format!("{index} {}", self.translator.t(tab.nav_key()))))
            .collect();
        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("bannerwatch"))
            .select(self.state.filter.index())
            .style(Style::default().fg(self.theme.muted))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn render_game_status(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        for view in self
            .games
            .iter()
            .filter(|view| self.state.filter.matches(view.game_id))
        {
            if !spans.is_empty() {
                spans.push(Span::raw("  │  "));
            }
            let health = view.health();
            spans.push(Span::styled(
                self.translator.t(view.game_id.nav_key()).to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                self.translator.t(health.label_key()).to_string(),
                Style::default().fg(self.theme.health(health)),
            ));
            spans.push(Span::styled(
                format!(" {}/{}", view.live_banners, view.reported_banner_count),
                Style::default().fg(self.theme.muted),
            ));
            if view.possible_maintenance {
                spans.push(Span::styled(
                    format!(" {}", self.translator.t("status.maintenance")),
                    Style::default().fg(self.theme.warning),
                ));
            }
        }
        let paragraph = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title(self.translator.t("ui.status")))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_message(&self, frame: &mut Frame, area: Rect, key: &str, sub_key: Option<&str>) {
        let mut lines = vec![Line::from(Span::styled(
            self.translator.t(key).to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        if let Some(sub_key) = sub_key {
            lines.push(Line::from(Span::styled(
                self.translator.t(sub_key).to_string(),
                Style::default().fg(self.theme.muted),
            )));
        }
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_banner_list(&self, frame: &mut Frame, area: Rect) {
        let title = self.translator.t(self.state.filter.nav_key()).to_string();
        let visible: Vec<&BannerCountdown> = self.visible().collect();
        if visible.is_empty() {
            self.render_message(frame, area, "empty.message", Some("empty.submessage"));
            return;
        }

        let mut list_state = ListState::default();
        list_state.select(Some(self.state.cursor.min(visible.len() - 1)));
        let items: Vec<ListItem> = visible
            .iter()
            .map(|entry| {
                let color = self.theme.lifecycle(entry.lifecycle);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<18}", entry.banner.character),
                        Style::default()
                            .fg(self.theme.primary_fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" {:<5}", self.translator.t(entry.banner.game_id.nav_key())),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::styled(format!(" {}", entry.remaining.clock()), Style::default().fg(color)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_banner_detail(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.translator.t("ui.banner"));
        let Some(entry) = self.selected_countdown() else {
            frame.render_widget(Paragraph::new("").block(block), area);
            return;
        };
        let banner = &entry.banner;
        let banner_color = parse_hex_color(&banner.color).unwrap_or(self.theme.accent);
        let lifecycle_key = match entry.lifecycle {
            Lifecycle::Active => "card.open",
            Lifecycle::Upcoming => "card.upcoming",
            Lifecycle::Finished => "card.finished",
        };

        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    format!(" {} ", banner.character),
                    Style::default()
                        .fg(contrast_color(&banner_color, Color::Black))
                        .bg(banner_color)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::styled(
                    self.translator.t(lifecycle_key).to_string(),
                    Style::default().fg(self.theme.lifecycle(entry.lifecycle)),
                ),
            ]),
            Line::from(Span::styled(
                self.translator.t(banner.game_id.title_key()).to_string(),
                Style::default().fg(self.theme.muted),
            )),
        ];
        if !banner.featured_characters.is_empty() {
            lines.push(Line::from(format!(
                "{}: {}",
                self.translator.t("card.view"),
                banner.featured_characters.join(", ")
            )));
        }
        lines.push(Line::from(format!(
            "{}: {}",
            self.translator.t("detail.image"),
            resolve_image(&banner.character, FALLBACK_IMAGE)
        )));
        if let Some(start) = banner.start_date {
            lines.push(Line::from(format!(
                "{}: {}",
                self.translator.t("detail.start"),
                format_local(start)
            )));
        }
        lines.push(Line::from(format!(
            "{}: {}",
            self.translator.t("detail.end"),
            format_local(banner.end_date)
        )));
        lines.push(Line::from(""));

        let clock = entry.remaining.clock();
        let inner_width = area.width.saturating_sub(2) as usize;
        if block_font::width(&clock) <= inner_width {
            for row in block_font::render_countdown(&entry.remaining) {
                lines.push(Line::from(Span::styled(row, Style::default().fg(banner_color))));
            }
        } else {
            lines.push(Line::from(Span::styled(
                clock,
                Style::default()
                    .fg(banner_color)
                    .add_modifier(Modifier::BOLD),
            )));
        }

        let paragraph = Paragraph::new(lines).block(block);
        frame.render_widget(paragraph, area);
    }

    fn render_versions(&self, frame: &mut Frame, area: Rect, game: GameId) {
        let title = format!(
            "{} · {}",
            self.translator.t("versions.title"),
            self.translator.t(game.title_key())
        );
        let block = Block::default().borders(Borders::ALL).title(title);
        let Some(phases) = self.versions.get(&game) else {
            let paragraph =
                Paragraph::new(self.translator.t("loading.message").to_string()).block(block);
            frame.render_widget(paragraph, area);
            return;
        };

        let now = self.clock.now();
        let items: Vec<ListItem> = phase_countdowns(phases, now)
            .into_iter()
            .map(|entry| {
                let color = self.theme.lifecycle(entry.lifecycle);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<10}", entry.phase.label()),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(
                            " {} → {}",
                            format_local(entry.phase.start_date),
                            format_local(entry.phase.end_date)
                        ),
                        Style::default().fg(self.theme.muted),
                    ),
                    Span::styled(format!("  {}", entry.remaining.clock()), Style::default().fg(color)),
                ]))
            })
            .collect();

        let mut list_state = ListState::default();
        if !phases.is_empty() {
            list_state.select(Some(self.state.phase_cursor.min(phases.len() - 1)));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn render_history(&self, frame: &mut Frame, history: &HistoryResponse) {
        let area = centered_rect(64, 16, frame.size());
        let title = format!(
            "{} · {}",
            self.translator.t("history.title"),
            history.phase.label()
        );
        let mut lines: Vec<Line> = history
            .banners
            .iter()
            .map(|banner| {
                Line::from(vec![
                    Span::styled(
                        format!("{:<18}", banner.character),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" {}", format_local(banner.end_date)),
                        Style::default().fg(self.theme.muted),
                    ),
                ])
            })
            .collect();
        if lines.is_empty() {
            lines.push(Line::from(self.translator.t("empty.message").to_string()));
        }
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(Clear, area);
        frame.render_widget(paragraph, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let now = self.clock.now();
        let mut sync_line = Vec::new();
        if self.sync.fetching {
            sync_line.push(Span::styled(
                self.translator.t("sync.fetching").to_string(),
                Style::default().fg(self.theme.accent),
            ));
        } else if let Some(fetched) = self.sync.last_fetch {
            sync_line.push(Span::raw(format!(
                "{} {}",
                self.translator.t("card.sync"),
                fetched.format("%H:%M:%S")
            )));
        }
        if let Some(next) = self.sync.next_refresh {
            sync_line.push(Span::styled(
                format!("  {} {}", self.translator.t("sync.next"), format_local(next)),
                Style::default().fg(self.theme.muted),
            ));
        }
        if self.sync.degraded {
            sync_line.push(Span::styled(
                format!(
                    "  {} ({})",
                    self.translator.t("sync.degraded"),
                    self.sync.failures
                ),
                Style::default()
                    .fg(self.theme.danger)
                    .add_modifier(Modifier::BOLD),
            ));
        }
        if let Some(err) = self.sync.last_error.as_deref() {
            sync_line.push(Span::styled(
                format!("  {}: {err}", self.translator.t("error.title")),
                Style::default().fg(self.theme.danger),
            ));
        }
        if self.sync.cooldown_until.is_some_and(|until| until > now) {
            sync_line.push(Span::styled(
                format!("  {}", self.translator.t("sync.cooldown")),
                Style::default().fg(self.theme.warning),
            ));
        }

        let block = Block::default().borders(Borders::ALL).title(format!(
            "{}  [r] {}  [v] {}  [l] {}  [q] {}",
            self.translator.t("header.sync"),
            self.translator.t("help.refresh"),
            self.translator.t("help.versions"),
            self.translator.locale(),
            self.translator.t("help.quit")
        ));
        let paragraph = Paragraph::new(vec![Line::from(self.state.status.clone()), Line::from(sync_line)])
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

/// Order banners Active, Upcoming, Finished; each group by remaining time.
fn sort_countdowns(countdowns: &mut [BannerCountdown]) {
    countdowns.sort_by(|a, b| {
        a.lifecycle
            .cmp(&b.lifecycle)
            .then_with(|| a.remaining.total_seconds().cmp(&b.remaining.total_seconds()))
            .then_with(|| a.banner.id.cmp(&b.banner.id))
    });
}

fn step(cursor: usize, delta: isize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    let next = cursor as isize + delta;
    next.clamp(0, total as isize - 1) as usize
}

fn format_local(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

async fn next_sync(receiver: &mut Option<mpsc::Receiver<SyncEvent>>) -> Option<SyncEvent> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.is_closed() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

struct UiState {
    filter: Filter,
    panel: Panel,
    cursor: usize,
    phase_cursor: usize,
    status: String,
    should_quit: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            filter: Filter::All,
            panel: Panel::Banners,
            cursor: 0,
            phase_cursor: 0,
            status: String::new(),
            should_quit: false,
        }
    }
}

impl UiState {
    fn set_status(&mut self, message: String) {
        self.status = message;
    }

    fn clamp_cursor(&mut self, total: usize) {
        if total == 0 {
            self.cursor = 0;
        } else if self.cursor >= total {
            self.cursor = total - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bannerwatch_core::{countdown::Remaining, models::Banner};
    use chrono::TimeZone;

    fn countdown(id: &str, lifecycle: Lifecycle, seconds: i64) -> BannerCountdown {
        BannerCountdown {
            banner: Banner {
                id: id.to_string(),
                game_id: GameId::Hsr,
                character: id.to_string(),
                start_date: None,
                end_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                color: String::new(),
                featured_characters: Vec::new(),
            },
            lifecycle,
            remaining: Remaining::from_seconds(seconds),
        }
    }

    #[test]
    fn banners_sort_by_lifecycle_then_remaining() {
        let mut entries = vec![
            countdown("done", Lifecycle::Finished, 0),
            countdown("soon", Lifecycle::Upcoming, 60),
            countdown("long", Lifecycle::Active, 9_000),
            countdown("short", Lifecycle::Active, 30),
        ];
        sort_countdowns(&mut entries);
        let ids: Vec<_> = entries.iter().map(|entry| entry.banner.id.as_str()).collect();
        assert_eq!(ids, ["short", "long", "soon", "done"]);
    }

    #[test]
    fn tabs_cycle_in_both_directions() {
        assert_eq!(Filter::All.cycle(1), Filter::Game(GameId::Genshin));
        assert_eq!(Filter::All.cycle(-1), Filter::Game(GameId::Zzz));
        assert_eq!(Filter::from_index(2), Some(Filter::Game(GameId::Hsr)));
        assert_eq!(Filter::from_index(4), None);
        assert!(Filter::All.matches(GameId::Zzz));
        assert!(!Filter::Game(GameId::Hsr).matches(GameId::Zzz));
    }

    #[test]
    fn cursor_steps_stay_in_range() {
        assert_eq!(step(0, -1, 3), 0);
        assert_eq!(step(2, 1, 3), 2);
        assert_eq!(step(1, 1, 3), 2);
        assert_eq!(step(5, 1, 0), 0);
    }

    #[test]
    fn banner_colors_parse_from_hex() {
        assert_eq!(parse_hex_color("#FB923C"), Some(Color::Rgb(0xFB, 0x92, 0x3C)));
        assert_eq!(parse_hex_color("fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_color("not-a-color"), None);
        assert_eq!(contrast_color(&Color::Rgb(255, 255, 255), Color::Red), Color::Black);
    }

    #[test]
    fn expiries_survive_a_full_command_channel() {
        let (commands, mut receiver) = mpsc::channel(1);
        commands.try_send(RefreshCommand::Manual).expect("capacity one");

        let mut outbox = ExpiryOutbox::default();
        outbox.queue(vec!["banner-a".to_string()]);
        assert!(!outbox.flush(&commands));

        // The next tick may report more ids; duplicates are folded.
        outbox.queue(vec!["banner-b".to_string(), "banner-a".to_string()]);
        assert!(matches!(receiver.try_recv(), Ok(RefreshCommand::Manual)));
        assert!(outbox.flush(&commands));
        match receiver.try_recv() {
            Ok(RefreshCommand::Expired { banner_ids }) => {
                assert_eq!(banner_ids, vec!["banner-a", "banner-b"]);
            }
            other => panic!("expected expiry command, got {other:?}"),
        }
        assert!(!outbox.flush(&commands));
    }

    #[test]
    fn multibyte_colors_are_rejected_without_panicking() {
        // Six and three bytes long, but not six or three hex digits.
        assert_eq!(parse_hex_color("aébcd"), None);
        assert_eq!(parse_hex_color("#aébcd"), None);
        assert_eq!(parse_hex_color("aé"), None);
        assert_eq!(parse_hex_color("ééé"), None);
    }

    #[test]
    fn centered_rect_is_clamped_to_area() {
        let area = Rect::new(0, 0, 40, 10);
        assert_eq!(centered_rect(64, 16, area), area);
        assert_eq!(centered_rect(20, 4, area), Rect::new(10, 3, 20, 4));
    }
}
