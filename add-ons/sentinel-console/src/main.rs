//! Sentinel Console
//!
//! Interactive terminal host for a mock proctored interview. Stands in for the browser:
//! typed commands become environment signals (tab hidden, window blur), the warning toast
//! and session health are printed as they change, and the dashboard report is rendered when
//! the interview ends.

use sentinel_core::{
    DashboardReport, EnvironmentSignal, GrammarAnalyzer, Phase, ProctorConfig, Role, SessionController,
    SessionHandle, SessionSnapshot, SignalBus, ViolationType, VirtualMediaDevice, Visibility, DEMO_TRANSCRIPT,
};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  join <candidate|interviewer> [api-key]   enter the interview room
  hide | show                              tab hidden / visible again
  blur | focus                             window lost / regained focus
  simulate <type>                          inject a violation (phone, gaze, face, voices, noise, tab, blur)
  camera | mic                             toggle local media
  status                                   print the session health panel
  end                                      end the interview
  reset                                    back to the lobby
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Join { role: Role, credential: String },
    Signal(EnvironmentSignal),
    Simulate(ViolationType),
    Camera,
    Mic,
    Status,
    End,
    Reset,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "join" => {
            let role = words.next().ok_or("usage: join <candidate|interviewer> [api-key]")?.parse::<Role>()?;
            let credential = words.next().unwrap_or_default().to_string();
            ConsoleCommand::Join { role, credential }
        }
        "hide" => ConsoleCommand::Signal(EnvironmentSignal::VisibilityChanged(Visibility::Hidden)),
        "show" => ConsoleCommand::Signal(EnvironmentSignal::VisibilityChanged(Visibility::Visible)),
        "blur" => ConsoleCommand::Signal(EnvironmentSignal::FocusLost),
        "focus" => ConsoleCommand::Signal(EnvironmentSignal::FocusGained),
        "simulate" | "sim" => ConsoleCommand::Simulate(words.next().ok_or("usage: simulate <type>")?.parse::<ViolationType>()?),
        "camera" | "cam" => ConsoleCommand::Camera,
        "mic" => ConsoleCommand::Mic,
        "status" => ConsoleCommand::Status,
        "end" => ConsoleCommand::End,
        "reset" => ConsoleCommand::Reset,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(Some(command))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[sentinel-console] .env not loaded: {} (using system environment)", e);
    }

    // Logs on stderr so the rendered session stays readable on stdout.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Arc::new(ProctorConfig::load()?);
    let bus = SignalBus::default();
    let (handle, controller) =
        SessionController::spawn(Arc::clone(&config), &bus, Box::new(VirtualMediaDevice::new()));
    let analyzer = GrammarAnalyzer::gemini(&config.analysis);

    tracing::info!(
        max_warnings = config.max_warnings,
        model = %config.analysis.model,
        "Sentinel console started"
    );
    println!("Sentinel mock interview. Type 'help' for commands.");

    let reporter = Arc::new(Reporter::new(analyzer));
    let renderer = tokio::spawn(render_updates(handle.watch(), Arc::clone(&reporter)));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => execute(command, &handle, &bus, &reporter).await?,
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; leaving the session");
                break;
            }
        }
    }

    drop(handle);
    controller.await?;
    renderer.abort();
    Ok(())
}

async fn execute(
    command: ConsoleCommand,
    handle: &SessionHandle,
    bus: &SignalBus,
    reporter: &Reporter,
) -> sentinel_core::SentinelResult<()> {
    match command {
        ConsoleCommand::Join { role, credential } => {
            handle.join(role, credential).await?;
        }
        ConsoleCommand::Signal(signal) => {
            let delivered = bus.emit(signal);
            tracing::debug!(?signal, delivered, "environment signal emitted");
        }
        ConsoleCommand::Simulate(kind) => {
            handle.simulate(kind).await?;
        }
        ConsoleCommand::Camera => {
            handle.toggle_camera().await?;
        }
        ConsoleCommand::Mic => {
            handle.toggle_mic().await?;
        }
        ConsoleCommand::Status => {
            let snapshot = handle.snapshot().await?;
            println!("[{}] {}", snapshot.phase, snapshot.role);
            print!("{}", snapshot.health());
        }
        ConsoleCommand::End => {
            handle.end_interview().await?;
        }
        ConsoleCommand::Reset => {
            // The renderer may not have seen the dashboard yet; report before leaving it.
            reporter.report_once(&handle.snapshot().await?);
            handle.reset().await?;
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

/// Prints the dashboard report exactly once per ended interview.
///
/// Both the snapshot renderer and the `reset` command offer snapshots; `watch` may skip
/// intermediate states, so neither alone is guaranteed to see the DASHBOARD phase.
struct Reporter {
    analyzer: GrammarAnalyzer,
    last_reported: Mutex<Option<(Option<i64>, Option<i64>)>>,
}

impl Reporter {
    fn new(analyzer: GrammarAnalyzer) -> Self {
        Self {
            analyzer,
            last_reported: Mutex::new(None),
        }
    }

    /// True the first time a given ended interview is offered.
    fn claim(&self, snapshot: &SessionSnapshot) -> bool {
        if snapshot.phase != Phase::Dashboard {
            return false;
        }
        let key = Some((snapshot.started_at, snapshot.ended_at));
        let mut last = self.last_reported.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *last == key {
            return false;
        }
        *last = key;
        true
    }

    fn report_once(&self, snapshot: &SessionSnapshot) {
        if !self.claim(snapshot) {
            return;
        }
        println!("== DASHBOARD == analyzing communication...");
        let snapshot = snapshot.clone();
        let analyzer = self.analyzer.clone();
        tokio::spawn(async move {
            let credential = snapshot.credential.as_ref().map(|c| c.expose()).unwrap_or_default();
            let outcome = analyzer.analyze_with_source(DEMO_TRANSCRIPT, credential).await;
            let report = DashboardReport::build(&snapshot, outcome);
            println!("\n{}", report.to_markdown());
        });
    }
}

/// Print what changed between consecutive snapshots.
async fn render_updates(mut rx: watch::Receiver<SessionSnapshot>, reporter: Arc<Reporter>) {
    let mut previous = rx.borrow_and_update().clone();
    while rx.changed().await.is_ok() {
        let current = rx.borrow_and_update().clone();

        if current.phase != previous.phase {
            render_phase(&current, &reporter);
        }
        if current.toast != previous.toast {
            if let Some(toast) = &current.toast {
                println!("\n{toast}\n");
            }
        }
        if current.phase == Phase::Interview && current.count() != previous.count() {
            print!("{}", current.health());
        }
        if current.phase == Phase::Interview && current.camera != previous.camera {
            println!("camera: {:?}", current.camera);
        }
        if current.phase == Phase::Interview && current.mic_on != previous.mic_on {
            println!("microphone: {}", if current.mic_on { "on" } else { "muted" });
        }

        previous = current;
    }
}

fn render_phase(snapshot: &SessionSnapshot, reporter: &Reporter) {
    match snapshot.phase {
        Phase::Lobby => println!("== LOBBY == choose a role with 'join'"),
        Phase::Interview => println!(
            "== INTERVIEW == you: {} | remote: {} | camera: {:?}",
            snapshot.role,
            snapshot.role.counterpart(),
            snapshot.camera
        ),
        Phase::Dashboard => reporter.report_once(snapshot),
    }
}
