mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use env_logger::{Env, Target};
use log::{info, warn};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use spotype::{
    app_dirs::AppDirs,
    celebration::Celebration,
    config::{Config, ConfigStore, FileConfigStore},
    controller::{CameraRig, Command, GameController, Notice},
    detection::DetectionReport,
    labels::{load_word_file, LabelTable, UnknownLabels},
    render_loop::RenderCommand,
    runtime::{
        CrosstermEventSource, DetectionWorker, FixedTicker, GameEvent, GameEventSource, Runner,
        Ticker,
    },
    scene::{scripted_pair, Scene},
    session::{EndReason, Feedback, GameMode},
};
use std::{
    error::Error,
    fs::{self, File},
    io::{self, stdin},
    path::PathBuf,
    sync::mpsc::Sender,
    time::Duration,
};

use crate::ui::screen::current_screen;

const TICK_RATE_MS: u64 = 16;

/// timed typing challenge: type the names of what the camera sees, or words from a list
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A timed typing challenge: type the objects the camera sees, or words from a list."
)]
pub struct Cli {
    /// start this mode right away instead of showing the mode screen
    #[clap(short = 'm', long, value_enum)]
    mode: Option<GameMode>,

    /// number of seconds per session
    #[clap(short = 's', long)]
    number_of_secs: Option<u32>,

    /// comma separated words for list mode
    #[clap(short = 'w', long, value_delimiter = ',')]
    words: Vec<String>,

    /// file with one list mode word per line
    #[clap(long)]
    word_file: Option<PathBuf>,

    /// start over when the word list is cleared instead of ending the session
    #[clap(long)]
    cycle: bool,

    /// scripted camera scene (JSON) to use instead of the bundled demo
    #[clap(long)]
    scene: Option<PathBuf>,

    /// simulated detector latency in milliseconds
    #[clap(long, default_value_t = 0)]
    detector_latency_ms: u64,

    /// minimum milliseconds between two detections
    #[clap(long)]
    interval_ms: Option<u64>,

    /// detections at or below this confidence are ignored
    #[clap(long)]
    threshold: Option<f32>,

    /// what to do with detected labels missing from the label table
    #[clap(long, value_enum)]
    unknown_labels: Option<UnknownLabels>,

    /// print the label table and exit
    #[clap(long)]
    list_labels: bool,

    /// write the effective settings to the config file
    #[clap(long)]
    save_config: bool,
}

impl Cli {
    /// Overrides loaded settings with the flags given on the command line
    fn apply(&self, mut config: Config) -> Config {
        if let Some(secs) = self.number_of_secs {
            config.session_secs = secs;
        }
        if let Some(ms) = self.interval_ms {
            config.detection_interval_ms = ms;
        }
        if let Some(threshold) = self.threshold {
            config.detection_threshold = threshold;
        }
        if let Some(policy) = self.unknown_labels {
            config.unknown_labels = policy;
        }
        if self.cycle {
            config.cycle_list = true;
        }
        config.sanitized()
    }

    /// List mode words: `--words`, then `--word-file`, then the label table
    fn vocabulary(&self, labels: &LabelTable) -> io::Result<Vec<String>> {
        let words: Vec<String> = self
            .words
            .iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if !words.is_empty() {
            return Ok(words);
        }
        match &self.word_file {
            Some(path) => load_word_file(path),
            None => Ok(labels.vocabulary()),
        }
    }

    fn scene(&self) -> Result<Scene, spotype::error::SceneError> {
        match &self.scene {
            Some(path) => Scene::load(path),
            None => Scene::demo(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    ModeSelect,
    Playing,
    Results,
}

/// What the screens show, kept current from controller notices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hud {
    pub score: u32,
    pub remaining_secs: u32,
    pub target: Option<String>,
    pub feedback: Feedback,
    pub status: String,
    pub result: Option<(u32, EndReason)>,
}

impl Hud {
    fn apply(&mut self, notice: Notice) {
        match notice {
            Notice::Status(text) => self.status = text,
            Notice::Feedback(feedback) => self.feedback = feedback,
            Notice::Score(score) => self.score = score,
            Notice::Timer(secs) => self.remaining_secs = secs,
            Notice::Target(target) => self.target = target,
            Notice::Ended { score, reason } => self.result = Some((score, reason)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    pub controller: GameController,
    pub labels: LabelTable,
    pub state: AppState,
    pub hud: Hud,
    pub show_labels: bool,
    /// Render commands from the latest frame callback
    pub frame: Vec<RenderCommand>,
    pub celebration: Celebration,
    size: (u16, u16),
}

impl App {
    pub fn new(controller: GameController, labels: LabelTable) -> Self {
        let hud = Hud {
            remaining_secs: controller.config().session_secs,
            status: "Choose a mode.".to_string(),
            ..Hud::default()
        };
        Self {
            controller,
            labels,
            state: AppState::ModeSelect,
            hud,
            show_labels: false,
            frame: Vec::new(),
            celebration: Celebration::new(),
            size: (80, 24),
        }
    }

    pub fn start(&mut self, mode: GameMode, now_ms: u64) {
        let started = self.controller.dispatch(Command::Start(mode), now_ms);
        if started.is_ok() {
            self.hud.result = None;
            self.show_labels = false;
            self.state = AppState::Playing;
        }
        self.sync(now_ms);
    }

    pub fn reset(&mut self, now_ms: u64) {
        self.controller.reset();
        self.sync(now_ms);
        self.celebration.stop();
        self.frame.clear();
        self.hud.result = None;
        self.state = AppState::ModeSelect;
    }

    /// Host tick: countdown, frame callback, notices, animation
    pub fn on_tick(&mut self, now_ms: u64, size: (u16, u16)) {
        self.size = size;
        self.controller.on_clock(now_ms);
        self.frame = self.controller.on_frame(now_ms);
        self.sync(now_ms);
        self.celebration.update(now_ms);
    }

    pub fn on_detection(&mut self, report: DetectionReport, now_ms: u64) {
        self.controller.on_detection(report);
        self.sync(now_ms);
    }

    pub fn on_key(&mut self, key: KeyEvent, now_ms: u64) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        match self.state {
            AppState::ModeSelect => match key.code {
                KeyCode::Esc => return Flow::Quit,
                KeyCode::Char('c') => self.start(GameMode::Camera, now_ms),
                KeyCode::Char('l') => self.start(GameMode::List, now_ms),
                KeyCode::Char('d') => self.show_labels = !self.show_labels,
                _ => {}
            },
            AppState::Playing => match key.code {
                KeyCode::Esc => {
                    let _ = self.controller.dispatch(Command::Stop, now_ms);
                }
                KeyCode::Backspace => {
                    let mut typed = self.controller.session().input.clone();
                    if typed.pop().is_some() {
                        let _ = self.controller.dispatch(Command::Input(typed), now_ms);
                    }
                }
                // modified chars would let a paste shortcut through
                KeyCode::Char(c)
                    if !key
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
                {
                    let mut typed = self.controller.session().input.clone();
                    typed.push(c);
                    let _ = self.controller.dispatch(Command::Input(typed), now_ms);
                }
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Esc => return Flow::Quit,
                KeyCode::Enter | KeyCode::Char('r') => self.reset(now_ms),
                _ => {}
            },
        }
        self.sync(now_ms);
        Flow::Continue
    }

    fn sync(&mut self, now_ms: u64) {
        for notice in self.controller.drain_notices() {
            if let Notice::Ended { reason, .. } = notice {
                self.state = AppState::Results;
                self.frame.clear();
                if reason == EndReason::AllCleared {
                    self.celebration.start(self.size.0, self.size.1, now_ms);
                }
            }
            self.hud.apply(notice);
        }
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = File::options().create(true).append(true).open(&path) else {
        return;
    };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder
        .format_timestamp_millis()
        .target(Target::Pipe(Box::new(file)));
    let _ = builder.try_init();
}

fn print_labels(labels: &LabelTable) {
    println!("{} ({} labels)", labels.name, labels.len());
    for entry in labels.entries() {
        println!("{:<16} {}", entry.label, entry.display);
    }
}

fn build_camera(cli: &Cli, events: Sender<GameEvent>) -> Option<CameraRig> {
    match cli.scene() {
        Ok(scene) => {
            info!(
                "scripted camera {:?}: {} frames at {}x{}",
                scene.name,
                scene.len(),
                scene.width,
                scene.height
            );
            let (camera, detector) =
                scripted_pair(scene, Duration::from_millis(cli.detector_latency_ms));
            let worker = DetectionWorker::spawn(detector, events);
            Some(CameraRig::new(camera, worker))
        }
        Err(err) => {
            warn!("camera unavailable: {err}");
            None
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let labels = LabelTable::coco()?;
    if cli.list_labels {
        print_labels(&labels);
        return Ok(());
    }

    let store = FileConfigStore::new();
    let config = cli.apply(store.load());
    if cli.save_config {
        store.save(&config)?;
        info!("saved config to {}", store.path().display());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let vocabulary = cli.vocabulary(&labels)?;
    let events = CrosstermEventSource::new();
    let camera = build_camera(&cli, events.sender());
    let controller = GameController::new(config, vocabulary, &labels, camera);
    let mut app = App::new(controller, labels);
    let ticker = FixedTicker::new(Duration::from_millis(TICK_RATE_MS));
    let runner = Runner::new(events, ticker);
    if let Some(mode) = cli.mode {
        app.start(mode, runner.now_ms());
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: GameEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        let size = terminal.size()?;
        app.on_tick(runner.now_ms(), (size.width, size.height));
        terminal.draw(|f| ui(app, f))?;

        match runner.step() {
            GameEvent::Tick | GameEvent::Resize => {}
            GameEvent::Detection(report) => app.on_detection(report, runner.now_ms()),
            GameEvent::Key(key) => {
                if app.on_key(key, runner.now_ms()) == Flow::Quit {
                    break;
                }
            }
        }
    }
    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}
