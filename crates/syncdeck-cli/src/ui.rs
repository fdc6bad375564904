use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;
use std::sync::mpsc;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use chrono::Utc;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseButton, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use tracing::info;
use tracing::warn;

use syncdeck_core::actions::{RuntimeAction, ShellAction, SnapshotResult, UserAction};
use syncdeck_core::config::RefreshConfig;
use syncdeck_core::control::{fetch_snapshot, SessionControl};
use syncdeck_core::discovery::ProjectDiscovery;
use syncdeck_core::dispatcher::{execute, ControlAction};
use syncdeck_core::editor::{EditorCommand, EditorKind, ProcessEnv};
use syncdeck_core::project::{Project, SyncSpec, SyncSpecState};
use syncdeck_core::reducer::{reduce, Effect};
use syncdeck_core::selection::SelectableItem;
use syncdeck_core::session::{format_bytes, format_number, EndpointRecord, SessionRecord};
use syncdeck_core::state::{AppState, DisplayMode, Overlay, StatusLevel, StatusMessage};

use crate::ticker::Ticker;

const STATUS_TICK: Duration = Duration::from_millis(250);

pub struct UiContext {
    pub control: Arc<dyn SessionControl + Send + Sync>,
    pub discovery: ProjectDiscovery,
    pub refresh: RefreshConfig,
}

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableMouseCapture,
            crossterm::cursor::Show
        );
    }
}

pub fn run(mut state: AppState, context: UiContext) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    let _guard = TuiGuard; // Ensures terminal is restored on exit or panic

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    run_app(&mut terminal, &mut state, &context).map_err(|e| e.into())
}

/// Results handed back to the update loop by background threads.
enum UiEvent {
    Snapshot {
        generation: u64,
        result: SnapshotResult,
    },
    ActionDone {
        generation: u64,
        status: StatusMessage,
        refresh: SnapshotResult,
    },
    Projects(Vec<Project>),
    AutoRefresh,
}

impl UiEvent {
    fn into_action(self) -> RuntimeAction {
        match self {
            UiEvent::Snapshot { generation, result } => {
                RuntimeAction::SnapshotFetched { generation, result }
            }
            UiEvent::ActionDone {
                generation,
                status,
                refresh,
            } => RuntimeAction::ActionFinished {
                generation,
                status,
                refresh,
            },
            UiEvent::Projects(projects) => RuntimeAction::ProjectsLoaded(projects),
            UiEvent::AutoRefresh => RuntimeAction::AutoRefresh,
        }
    }
}

#[derive(Clone, Copy)]
struct UiPalette {
    accent: Color,
    accent_alt: Color,
    success: Color,
    warning: Color,
    danger: Color,
    muted: Color,
    border: Color,
    panel_bg: Color,
    selected_bg: Color,
}

fn palette() -> UiPalette {
    UiPalette {
        accent: Color::Cyan,
        accent_alt: Color::Magenta,
        success: Color::Green,
        warning: Color::Yellow,
        danger: Color::Red,
        muted: Color::DarkGray,
        border: Color::Gray,
        panel_bg: Color::Reset,
        selected_bg: Color::Rgb(40, 44, 52),
    }
}

enum KeyHandlerResult {
    Continue(Vec<Effect>),
    Exit,
}

fn user(state: &mut AppState, action: UserAction) -> Vec<Effect> {
    reduce(state, ShellAction::User(action))
}

fn handle_help_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
            user(state, UserAction::CloseOverlay)
        }
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_conflicts_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('c') => {
            user(state, UserAction::CloseOverlay)
        }
        KeyCode::Char('b') => {
            let mut effects = user(state, UserAction::Control(ControlAction::ResolveConflicts));
            if effects.iter().any(|effect| matches!(effect, Effect::Dispatch { .. })) {
                effects.extend(user(state, UserAction::CloseOverlay));
            }
            effects
        }
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_sync_status_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('i') => {
            user(state, UserAction::CloseOverlay)
        }
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_global_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('k') => UserAction::SelectPrevious,
        KeyCode::Down | KeyCode::Char('j') => UserAction::SelectNext,
        KeyCode::Enter | KeyCode::Char('h') | KeyCode::Char('l') => UserAction::ToggleFold,
        KeyCode::Char('q') => UserAction::Quit,
        KeyCode::Char('?') => UserAction::ToggleHelp,
        KeyCode::Char('r') => UserAction::Refresh,
        KeyCode::Char('s') => UserAction::Control(ControlAction::Start),
        KeyCode::Char('t') => UserAction::Control(ControlAction::Terminate),
        KeyCode::Char('f') => UserAction::Control(ControlAction::Flush),
        KeyCode::Char('p') | KeyCode::Char(' ') => UserAction::Control(ControlAction::TogglePause),
        KeyCode::Char('u') => UserAction::Control(ControlAction::Resume),
        KeyCode::Char('P') => UserAction::Control(ControlAction::Push),
        KeyCode::Char('c') => UserAction::ToggleConflicts,
        KeyCode::Char('i') => UserAction::ToggleSyncStatus,
        KeyCode::Char('e') => UserAction::OpenEditor,
        KeyCode::Char('m') => UserAction::ToggleDisplayMode,
        KeyCode::Esc => UserAction::CloseOverlay,
        _ => return KeyHandlerResult::Continue(Vec::new()),
    };
    KeyHandlerResult::Continue(user(state, action))
}

fn handle_key_event(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    if key.kind != KeyEventKind::Press {
        return KeyHandlerResult::Continue(Vec::new());
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyHandlerResult::Exit;
    }

    match state.overlay {
        Overlay::Help => handle_help_keys(key, state),
        Overlay::Conflicts => handle_conflicts_keys(key, state),
        Overlay::SyncStatus => handle_sync_status_keys(key, state),
        Overlay::None => handle_global_keys(key, state),
    }
}

fn handle_mouse_event<B: Backend>(
    mouse: event::MouseEvent,
    state: &mut AppState,
    terminal: &mut Terminal<B>,
) -> io::Result<Vec<Effect>> {
    if state.overlay != Overlay::None {
        return Ok(Vec::new());
    }
    let effects = match mouse.kind {
        MouseEventKind::ScrollDown => user(state, UserAction::SelectNext),
        MouseEventKind::ScrollUp => user(state, UserAction::SelectPrevious),
        MouseEventKind::Down(MouseButton::Left) => {
            let size = terminal.size()?;
            let areas = screen_layout(Rect::new(0, 0, size.width, size.height));
            let list = list_block(palette()).inner(areas.list);
            let inside = mouse.row >= list.y
                && mouse.row < list.y + list.height
                && mouse.column >= list.x
                && mouse.column < list.x + list.width;
            if inside {
                let offset = list_offset(state.selection.raw_index(), list.height as usize);
                let index = offset + (mouse.row - list.y) as usize;
                user(state, UserAction::SelectIndex(index))
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    };
    Ok(effects)
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    context: &UiContext,
) -> io::Result<()> {
    let (tx, rx) = mpsc::channel();
    let _ticker = context.refresh.enabled.then(|| {
        let tx = tx.clone();
        Ticker::spawn(context.refresh.interval(), move || {
            tx.send(UiEvent::AutoRefresh).is_ok()
        })
    });
    let mut last_status_tick = Instant::now();

    loop {
        let mut effects = VecDeque::new();

        // Process background results
        while let Ok(event) = rx.try_recv() {
            effects.extend(reduce(state, ShellAction::Runtime(event.into_action())));
        }
        if last_status_tick.elapsed() >= STATUS_TICK {
            effects.extend(reduce(
                state,
                ShellAction::Runtime(RuntimeAction::Tick(Utc::now())),
            ));
            last_status_tick = Instant::now();
        }

        terminal.draw(|f| ui(f, state))?;

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) => match handle_key_event(key, state) {
                    KeyHandlerResult::Continue(e) => effects.extend(e),
                    KeyHandlerResult::Exit => return Ok(()),
                },
                Event::Mouse(mouse) => effects.extend(handle_mouse_event(mouse, state, terminal)?),
                _ => {}
            }
        }

        while let Some(effect) = effects.pop_front() {
            match effect {
                Effect::RequestFrame => {}
                Effect::Quit => return Ok(()),
                Effect::RequestRefresh { generation } => spawn_refresh(context, &tx, generation),
                Effect::Dispatch { plan, generation } => {
                    info!(action = ?plan.action, ops = plan.ops.len(), "dispatching");
                    let control = Arc::clone(&context.control);
                    let tx = tx.clone();
                    thread::spawn(move || {
                        let status = execute(&plan, control.as_ref());
                        let refresh = fetch_snapshot(control.as_ref()).map_err(|e| e.to_string());
                        let _ = tx.send(UiEvent::ActionDone {
                            generation,
                            status,
                            refresh,
                        });
                    });
                }
                Effect::ReloadProjects => {
                    let discovery = context.discovery.clone();
                    let tx = tx.clone();
                    thread::spawn(move || {
                        let _ = tx.send(UiEvent::Projects(discovery.discover()));
                    });
                }
                Effect::LaunchEditor(path) => {
                    let action = launch_editor(terminal, &path)?;
                    effects.extend(reduce(state, ShellAction::Runtime(action)));
                }
            }
        }
    }
}

fn spawn_refresh(context: &UiContext, tx: &Sender<UiEvent>, generation: u64) {
    let control = Arc::clone(&context.control);
    let tx = tx.clone();
    thread::spawn(move || {
        let result = fetch_snapshot(control.as_ref()).map_err(|e| e.to_string());
        let _ = tx.send(UiEvent::Snapshot { generation, result });
    });
}

/// GUI editors are spawned detached. Terminal editors take over the screen
/// until they exit.
fn launch_editor<B: Backend>(
    terminal: &mut Terminal<B>,
    path: &Path,
) -> io::Result<RuntimeAction> {
    let display_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let command = match EditorCommand::resolve(&ProcessEnv, path) {
        Ok(command) => command,
        Err(err) => {
            return Ok(RuntimeAction::SetStatus(StatusMessage::error(format!(
                "Invalid editor command: {err}"
            ))))
        }
    };
    info!(program = %command.program, kind = ?command.kind, "launching editor");

    match command.kind {
        EditorKind::Gui => {
            let spawned = Command::new(&command.program)
                .args(&command.args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();
            let status = match spawned {
                Ok(mut child) => {
                    thread::spawn(move || {
                        let _ = child.wait();
                    });
                    StatusMessage::info(format!("Opened in {}: {display_name}", command.program))
                }
                Err(err) => {
                    warn!("editor launch failed: {err}");
                    StatusMessage::error(format!("Failed to launch editor: {err}"))
                }
            };
            Ok(RuntimeAction::SetStatus(status))
        }
        EditorKind::Terminal => {
            suspend_terminal()?;
            let result = Command::new(&command.program).args(&command.args).status();
            resume_terminal(terminal)?;
            Ok(RuntimeAction::EditorFinished(match result {
                Ok(status) if status.success() => Ok(format!("Edited {display_name}")),
                Ok(status) => Err(format!("{} exited with {status}", command.program)),
                Err(err) => Err(format!("Failed to launch editor: {err}")),
            }))
        }
    }
}

fn suspend_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        io::stdout(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        crossterm::cursor::Show
    )
}

fn resume_terminal<B: Backend>(terminal: &mut Terminal<B>) -> io::Result<()> {
    enable_raw_mode()?;
    execute!(
        io::stdout(),
        EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    terminal.clear()
}

fn get_spinner() -> &'static str {
    let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let idx = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
        / 100) as usize
        % frames.len();
    frames[idx]
}

struct ScreenAreas {
    header: Rect,
    list: Rect,
    status: Rect,
    footer: Rect,
}

fn screen_layout(area: Rect) -> ScreenAreas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(3),    // Projects
            Constraint::Length(3), // Status
            Constraint::Length(1), // Footer
        ])
        .split(area);
    ScreenAreas {
        header: chunks[0],
        list: chunks[1],
        status: chunks[2],
        footer: chunks[3],
    }
}

/// First visible row for a list of `height` rows keeping `selected` in view.
fn list_offset(selected: usize, height: usize) -> usize {
    (selected + 1).saturating_sub(height.max(1))
}

fn list_block(palette: UiPalette) -> Block<'static> {
    Block::default()
        .title(" Projects ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .style(Style::default().bg(palette.panel_bg))
}

fn ui(f: &mut ratatui::Frame, state: &AppState) {
    let palette = palette();
    let areas = screen_layout(f.area());

    render_header(f, areas.header, state, palette);
    render_projects(f, areas.list, state, palette);
    render_status(f, areas.status, state, palette);
    render_footer(f, areas.footer, palette);

    match state.overlay {
        Overlay::None => {}
        Overlay::Help => render_help(f, palette),
        Overlay::Conflicts => render_conflicts(f, state, palette),
        Overlay::SyncStatus => render_sync_status(f, state, palette),
    }
}

fn render_header(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let running: usize = state.projects.iter().map(Project::running_count).sum();
    let conflicts = state.total_conflicts();
    let activity = match (&state.busy, state.refreshing) {
        (Some(label), _) => format!("{} {label}...", get_spinner()),
        (None, true) => format!("{} refreshing", get_spinner()),
        (None, false) => "idle".to_string(),
    };

    let mut spans = vec![
        Span::styled(
            "syncdeck",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                " | {} projects | {running} running | view: {}",
                state.projects.len(),
                state.display_mode.label()
            ),
            Style::default().fg(palette.muted),
        ),
    ];
    if conflicts > 0 {
        spans.push(Span::styled(
            format!(" | ⚠ {conflicts} conflicts"),
            Style::default().fg(palette.warning),
        ));
    }
    spans.push(Span::styled(
        format!(" | {activity}"),
        Style::default().fg(palette.accent_alt),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_projects(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let block = list_block(palette);
    if state.projects.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "No mutagen project files found",
                Style::default().fg(palette.warning),
            )),
            Line::from(Span::styled(
                "Looked for mutagen.yml / mutagen-*.yml up to 4 levels deep",
                Style::default().fg(palette.muted),
            )),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = state
        .selection
        .items()
        .iter()
        .filter_map(|item| match *item {
            SelectableItem::Project { project } => state
                .projects
                .get(project)
                .map(|project| project_row(project, palette)),
            SelectableItem::Spec { project, spec } => state.projects.get(project).and_then(|p| {
                p.specs
                    .get(spec)
                    .map(|spec| spec_row(p, spec, state.display_mode, palette))
            }),
        })
        .map(ListItem::new)
        .collect();

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(palette.selected_bg)
            .add_modifier(Modifier::BOLD),
    );
    let mut list_state = ListState::default().with_selected(Some(state.selection.raw_index()));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn project_summary(project: &Project) -> String {
    let total = project.specs.len();
    let running = project.running_count();
    let paused = project.specs.iter().filter(|spec| spec.is_paused()).count();
    let push = project
        .specs
        .iter()
        .filter(|spec| spec.state == SyncSpecState::RunningPush)
        .count();

    let mut text = if running == 0 {
        "Not running".to_string()
    } else if paused == running {
        if running == total {
            "Paused".to_string()
        } else {
            format!("{running}/{total} paused")
        }
    } else if running == total {
        match push {
            0 => "Running".to_string(),
            n if n == running => "Running (all one-way)".to_string(),
            n => format!("Running ({n} one-way)"),
        }
    } else if push > 0 {
        format!("{running}/{total} running ({push} one-way)")
    } else {
        format!("{running}/{total} running")
    };

    let waiting = project
        .specs
        .iter()
        .filter_map(|spec| spec.running_session.as_ref())
        .filter(|session| !session.alpha.connected || !session.beta.connected)
        .count();
    if waiting > 0 {
        text.push_str(&format!(", {waiting} waiting"));
    }
    text
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn project_row(project: &Project, palette: UiPalette) -> Line<'static> {
    let fold = if project.folded { "▸" } else { "▾" };
    let (icon, color) = if project.running_count() > 0 {
        ("✓", palette.success)
    } else {
        ("○", palette.muted)
    };
    let mut spans = vec![
        Span::raw(format!("{fold} ")),
        Span::styled(icon, Style::default().fg(color)),
        Span::raw(" "),
        Span::styled(
            format!("{:<30}", project.display_name()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", project_summary(project)),
            Style::default().fg(palette.muted),
        ),
    ];
    let conflicts = project.conflict_count();
    if conflicts > 0 {
        spans.push(Span::styled(
            format!("  ⚠ {}", plural(conflicts, "conflict")),
            Style::default()
                .fg(palette.warning)
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn endpoint_spans(endpoint: &EndpointRecord, palette: UiPalette) -> Vec<Span<'static>> {
    let color = if endpoint.connected {
        palette.success
    } else {
        palette.warning
    };
    vec![
        Span::styled(endpoint.status_icon(), Style::default().fg(color)),
        Span::raw(endpoint.display_path()),
    ]
}

fn spec_row(
    project: &Project,
    spec: &SyncSpec,
    mode: DisplayMode,
    palette: UiPalette,
) -> Line<'static> {
    let indent = Span::raw("    ");
    let Some(session) = &spec.running_session else {
        let mut spans = vec![
            indent,
            Span::styled("○ ", Style::default().fg(palette.muted)),
            Span::raw(format!("{:<32}", spec.name)),
        ];
        match (mode, project.definition(&spec.name)) {
            (DisplayMode::Paths, Some(definition)) => {
                spans.push(Span::styled(
                    format!(" {} ⇄ {}", tilde(&definition.alpha), tilde(&definition.beta)),
                    Style::default().fg(palette.muted),
                ));
            }
            _ => spans.push(Span::styled(
                " Not running",
                Style::default().fg(palette.muted),
            )),
        }
        return Line::from(spans);
    };

    let (icon, color) = if session.paused {
        ("⏸", palette.warning)
    } else {
        ("●", palette.success)
    };
    let name = if spec.state == SyncSpecState::RunningPush {
        format!("{} (push)", spec.name)
    } else {
        spec.name.clone()
    };
    let mut spans = vec![
        indent,
        Span::styled(format!("{icon} "), Style::default().fg(color)),
        Span::styled(
            format!("{name:<32}"),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {} ", session.status_icon())),
    ];

    match mode {
        DisplayMode::Paths => {
            let arrow = if spec.state == SyncSpecState::RunningPush {
                " ⬆ "
            } else {
                " ⇄ "
            };
            spans.extend(endpoint_spans(&session.alpha, palette));
            spans.push(Span::raw(arrow));
            spans.extend(endpoint_spans(&session.beta, palette));
        }
        DisplayMode::LastRefresh => {
            spans.push(Span::raw(session.status_text()));
            if let Some(cycles) = session.successful_cycles.filter(|cycles| *cycles > 0) {
                spans.push(Span::styled(
                    format!(" ({cycles} cycles)"),
                    Style::default().fg(palette.muted),
                ));
            }
        }
    }

    if session.has_conflicts() {
        spans.push(Span::styled(
            format!(" ⚠ {}", plural(session.conflict_count(), "conflict")),
            Style::default()
                .fg(palette.warning)
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn tilde(path: &str) -> String {
    match dirs::home_dir() {
        Some(home) => syncdeck_core::session::shorten_home(path, &home),
        None => path.to_string(),
    }
}

/// Status line for the selected session. A receiving side adds its
/// direction and byte progress.
fn session_status_line(session: &SessionRecord) -> String {
    let mut text = format!("{}: {}", session.name, session.status_text());
    let staging = match (&session.alpha.staging_progress, &session.beta.staging_progress) {
        (Some(progress), _) => Some(("↓", progress)),
        (None, Some(progress)) => Some(("↑", progress)),
        (None, None) => None,
    };
    if let Some((direction, progress)) = staging {
        text.push_str(&format!(" {direction}"));
        if let (Some(received), Some(expected)) = (progress.received_size, progress.expected_size) {
            if expected > 0 {
                text.push_str(&format!(" {}%", (received * 100 / expected).min(100)));
            }
        }
    }
    if session.has_conflicts() {
        text.push_str(&format!(" | ⚠ {}", plural(session.conflict_count(), "conflict")));
    }
    text
}

fn render_status(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let important = state.status.as_ref().filter(|status| !status.is_routine());
    let (mut text, color) = match (important, state.selected_spec()) {
        (Some(status), _) => {
            let color = match status.level {
                StatusLevel::Info => palette.accent,
                StatusLevel::Warning => palette.warning,
                StatusLevel::Error => palette.danger,
            };
            (status.text.clone(), color)
        }
        (None, Some((_, spec))) => match &spec.running_session {
            Some(session) => (session_status_line(session), Color::Reset),
            None => (format!("{}: Not running", spec.name), palette.muted),
        },
        (None, None) => match &state.status {
            Some(status) => (status.text.clone(), Color::Reset),
            None => ("Ready".to_string(), Color::Reset),
        },
    };
    if let Some(last) = state.last_refresh {
        text.push_str(&format!(" | Last refresh: {}", last.format("%H:%M:%S")));
    }

    let status = Paragraph::new(Span::styled(text, Style::default().fg(color)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border))
                .title(" Status "),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

fn render_footer(f: &mut ratatui::Frame, area: Rect, palette: UiPalette) {
    let keys = [
        ("↑↓", "move"),
        ("⏎", "fold"),
        ("s", "start"),
        ("t", "terminate"),
        ("p", "pause"),
        ("P", "push"),
        ("f", "flush"),
        ("c", "conflicts"),
        ("e", "edit"),
        ("?", "help"),
        ("q", "quit"),
    ];
    let mut spans = Vec::new();
    for (key, label) in keys {
        spans.push(Span::styled(key, Style::default().fg(palette.accent)));
        spans.push(Span::styled(
            format!(" {label}  "),
            Style::default().fg(palette.muted),
        ));
    }
    f.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

fn modal_block(title: &str, palette: UiPalette) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg))
        .border_style(Style::default().fg(palette.accent))
}

fn render_help(f: &mut ratatui::Frame, palette: UiPalette) {
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);

    let heading = Style::default()
        .fg(palette.accent)
        .add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(Span::styled("Navigation", heading)),
        Line::from("  ↑/k ↓/j       Move selection"),
        Line::from("  h/l/Enter     Fold or unfold project"),
        Line::from("  mouse         Click to select, click again to fold"),
        Line::from(""),
        Line::from(Span::styled("Sessions", heading)),
        Line::from("  s             Start (project: every stopped spec)"),
        Line::from("  t             Terminate"),
        Line::from("  p/Space       Toggle pause"),
        Line::from("  u             Resume"),
        Line::from("  P             Push (one-way replica alpha → beta)"),
        Line::from("  f             Flush"),
        Line::from("  r             Refresh now"),
        Line::from(""),
        Line::from(Span::styled("Views", heading)),
        Line::from("  c             Conflicts (b pushes to resolve)"),
        Line::from("  i             Sync status details"),
        Line::from("  m             Toggle paths / status display"),
        Line::from("  e             Edit project file"),
        Line::from("  q/Ctrl-C      Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc to close",
            Style::default().fg(palette.warning),
        )),
    ];

    let text = Paragraph::new(help_text)
        .block(modal_block("Help", palette))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    f.render_widget(text, area);
}

fn render_conflicts(f: &mut ratatui::Frame, state: &AppState, palette: UiPalette) {
    let area = centered_rect(80, 70, f.area());
    f.render_widget(Clear, area);

    let conflicts = state.conflicts_for_selection();
    let mut lines = Vec::new();
    if conflicts.is_empty() {
        lines.push(Line::from(Span::styled(
            "No conflicts for the current selection",
            Style::default().fg(palette.muted),
        )));
    }
    for entry in &conflicts {
        lines.push(Line::from(Span::styled(
            format!(
                "{} ({})",
                entry.spec_name,
                plural(entry.conflicts().len(), "conflict")
            ),
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        )));
        for conflict in entry.conflicts() {
            let root = if conflict.root.is_empty() {
                "(root)"
            } else {
                conflict.root.as_str()
            };
            lines.push(Line::from(vec![
                Span::styled("  ⚠ ", Style::default().fg(palette.warning)),
                Span::raw(root.to_string()),
            ]));
            for (side, changes) in [("α", &conflict.alpha_changes), ("β", &conflict.beta_changes)] {
                for change in changes {
                    let kind = change
                        .new
                        .as_ref()
                        .map(|state| state.kind.as_str())
                        .unwrap_or("deleted");
                    lines.push(Line::from(Span::styled(
                        format!("      {side} {} ({kind})", change.path),
                        Style::default().fg(palette.muted),
                    )));
                }
            }
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(vec![
        Span::styled("b", Style::default().fg(palette.accent)),
        Span::styled(
            " push alpha over beta to resolve   ",
            Style::default().fg(palette.muted),
        ),
        Span::styled("Esc", Style::default().fg(palette.accent)),
        Span::styled(" close", Style::default().fg(palette.muted)),
    ]));

    let text = Paragraph::new(lines)
        .block(modal_block("Conflicts", palette))
        .wrap(Wrap { trim: false });
    f.render_widget(text, area);
}

fn endpoint_lines(
    label: &str,
    endpoint: &EndpointRecord,
    palette: UiPalette,
) -> Vec<Line<'static>> {
    let muted = Style::default().fg(palette.muted);
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{label:<8}"), Style::default().fg(palette.accent)),
        Span::raw(format!("{} {}", endpoint.status_icon(), endpoint.display_path())),
    ])];
    let connection = if endpoint.connected {
        if endpoint.scanned {
            "connected, scanned"
        } else {
            "connected, scanning"
        }
    } else {
        "disconnected"
    };
    lines.push(Line::from(Span::styled(format!("        {connection}"), muted)));
    if let (Some(files), Some(directories)) = (endpoint.files, endpoint.directories) {
        lines.push(Line::from(Span::styled(
            format!(
                "        {} files, {} directories, {}",
                format_number(files),
                format_number(directories),
                format_bytes(endpoint.total_file_size.unwrap_or_default())
            ),
            muted,
        )));
    }
    lines
}

fn render_sync_status(f: &mut ratatui::Frame, state: &AppState, palette: UiPalette) {
    let area = centered_rect(70, 60, f.area());
    f.render_widget(Clear, area);

    let lines = match state.selected_spec() {
        Some((_, spec)) => match &spec.running_session {
            Some(session) => {
                let field = |name: &str, value: String| {
                    Line::from(vec![
                        Span::styled(format!("{name:<8}"), Style::default().fg(palette.accent)),
                        Span::raw(value),
                    ])
                };
                let mut lines = vec![
                    field("Session", session.name.clone()),
                    field("Spec", format!("{} ({})", spec.name, spec.state.label())),
                    field(
                        "Mode",
                        session.mode.clone().unwrap_or_else(|| "default".to_string()),
                    ),
                    field("Status", session_status_line(session)),
                ];
                if session.paused {
                    lines.push(field("Paused", "yes".to_string()));
                }
                if let Some(cycles) = session.successful_cycles {
                    lines.push(field("Cycles", format_number(cycles)));
                }
                if !session.identifier.is_empty() {
                    lines.push(field("Id", session.identifier.clone()));
                }
                lines.push(Line::from(""));
                lines.extend(endpoint_lines("Alpha", &session.alpha, palette));
                lines.extend(endpoint_lines("Beta", &session.beta, palette));
                lines
            }
            None => vec![Line::from(format!("{}: Not running", spec.name))],
        },
        None => vec![Line::from("Select a spec to see its sync status")],
    };

    let text = Paragraph::new(lines)
        .block(modal_block("Sync Status", palette))
        .wrap(Wrap { trim: false });
    f.render_widget(text, area);
}

fn centered_rect(
    percent_x: u16,
    percent_y: u16,
    r: ratatui::layout::Rect,
) -> ratatui::layout::Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
