use chat_client::config::ChatConfig;
use chat_client::controller::{
    ChatController, ChatEvent, ClearOutcome, LoadingState, Turn, VoiceState,
    VoiceToggle, CLEAR_CONFIRMATION_PROMPT,
};
use chat_client::models::{Answer, Message, Role};
use chat_client::services::metrics;
use chat_client::services::providers::ProviderError;
use chat_client::services::speech::RecognitionEvent;
use chat_client::startup::Application;
use chat_client::view::{self, Command, DraftEnding, LineAssembler};

use chat_core::observability::init_tracing;
use std::any::Any;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};

type TurnHandle = JoinHandle<(Turn, Result<Answer, ProviderError>)>;
type Lines = Arc<Mutex<mpsc::Receiver<String>>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ChatConfig::load()?;

    init_tracing(
        "chat-client",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        environment = %config.common.environment,
        model = %config.models.text_model,
        "Starting chat client"
    );

    let app = Arc::new(Application::build(config)?);

    // Stdin outlives any one UI instance so a reload keeps reading it.
    let (line_tx, line_rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line_tx.send(line).await.is_err() {
                break;
            }
        }
    });
    let lines: Lines = Arc::new(Mutex::new(line_rx));

    loop {
        let ui = tokio::spawn(run_ui(app.clone(), lines.clone()));
        match ui.await {
            Ok(result) => {
                result?;
                break;
            }
            Err(e) if e.is_panic() => {
                let detail = panic_detail(e.into_panic());
                tracing::error!(error = %detail, "UI crashed");
                println!("\n{}", view::format_recovery(&detail));
                if lines.lock().await.recv().await.is_none() {
                    break;
                }
                tracing::info!("Reloading UI from saved history");
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!("Chat client stopped");
    Ok(())
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown error".to_string()
    }
}

enum Action {
    Line(String),
    Eof,
    TurnDone(Result<(Turn, Result<Answer, ProviderError>), JoinError>),
    Voice(RecognitionEvent),
    Event(ChatEvent),
    Interrupt,
}

/// Terminal presentation state that is not part of the conversation.
#[derive(Default)]
struct Screen {
    assembler: LineAssembler,
    confirming_clear: bool,
    /// Streaming draft text already printed.
    drafted: String,
}

async fn run_ui(app: Arc<Application>, lines: Lines) -> anyhow::Result<()> {
    let mut lines = lines.lock().await;
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut controller = app.controller(events_tx);
    let mut screen = Screen::default();
    let mut in_flight: Option<TurnHandle> = None;

    render_history(&controller);

    loop {
        let action = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => Action::Line(line),
                None => Action::Eof,
            },
            done = join_turn(&mut in_flight) => Action::TurnDone(done),
            event = controller.next_voice_event() => Action::Voice(event),
            Some(event) = events.recv() => Action::Event(event),
            _ = signal::ctrl_c() => Action::Interrupt,
        };

        match action {
            Action::Line(line) => {
                if !handle_line(&mut controller, &mut screen, &mut in_flight, &line).await {
                    break;
                }
            }
            Action::Eof | Action::Interrupt => break,
            Action::TurnDone(done) => {
                in_flight = None;
                let (turn, result) = match done {
                    Ok(done) => done,
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(e) => {
                        tracing::warn!(error = %e, "Turn task cancelled");
                        continue;
                    }
                };
                controller.complete_turn(turn, result);
            }
            Action::Voice(event) => {
                controller.apply_voice_event(event);
                show_input(&controller);
            }
            Action::Event(event) => render_event(&controller, &mut screen, event),
        }
    }

    if let Some(handle) = in_flight.take() {
        handle.abort();
    }
    Ok(())
}

/// Resolves when the in-flight turn finishes; pends when there is none.
async fn join_turn(
    in_flight: &mut Option<TurnHandle>,
) -> Result<(Turn, Result<Answer, ProviderError>), JoinError> {
    match in_flight.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Returns false when the user asked to quit.
async fn handle_line(
    controller: &mut ChatController,
    screen: &mut Screen,
    in_flight: &mut Option<TurnHandle>,
    raw: &str,
) -> bool {
    if screen.confirming_clear {
        screen.confirming_clear = false;
        let confirmed = matches!(raw.trim().to_lowercase().as_str(), "y" | "yes");
        match controller.clear(confirmed) {
            ClearOutcome::Cleared => {
                if let Some(handle) = in_flight.take() {
                    handle.abort();
                }
            }
            ClearOutcome::Cancelled => println!("Kept the conversation."),
            ClearOutcome::NothingToClear => {}
        }
        return true;
    }

    let Some(line) = screen.assembler.push(raw) else {
        return true;
    };

    match Command::parse(&line) {
        Command::Quit => return false,
        Command::Help => println!("{}", view::HELP),
        Command::Metrics => print!("{}", metrics::gather_metrics()),
        Command::Clear => {
            if controller.can_clear() {
                println!("{} [y/N]", CLEAR_CONFIRMATION_PROMPT);
                screen.confirming_clear = true;
            } else {
                println!("Nothing to clear.");
            }
        }
        Command::Voice => match controller.toggle_voice().await {
            VoiceToggle::Started => println!("(listening... /voice to stop)"),
            VoiceToggle::Stopped => show_input(controller),
            VoiceToggle::Rejected(_) => {}
        },
        Command::Suggest(index) => {
            if index.is_some_and(|i| controller.use_suggestion(i)) {
                show_input(controller);
            } else {
                println!("{}", view::format_welcome());
            }
        }
        Command::Submit(text) => {
            // A blank line sends whatever voice or a suggestion left in the buffer.
            if !text.trim().is_empty() {
                controller.set_input(text);
            }
            if let Some(turn) = controller.begin_submit() {
                let handle = tokio::spawn(async move {
                    let result = turn.run().await;
                    (turn, result)
                });
                if let Some(stale) = in_flight.replace(handle) {
                    stale.abort();
                }
            } else if controller.state() == LoadingState::Loading {
                println!("(still thinking, please wait)");
            }
        }
    }
    true
}

fn render_history(controller: &ChatController) {
    let messages = controller.messages();
    if messages.is_empty() {
        println!("{}", view::format_welcome());
        return;
    }
    for message in messages {
        println!("{}\n", view::format_message(message));
    }
}

fn render_event(controller: &ChatController, screen: &mut Screen, event: ChatEvent) {
    match event {
        ChatEvent::Caption(caption) => {
            if screen.drafted.is_empty() {
                if let Some(status) =
                    view::format_status(LoadingState::Loading, Some(caption), None)
                {
                    println!("{}", status);
                }
            }
        }
        ChatEvent::Draft(draft) => print_draft(screen, &draft),
        ChatEvent::Appended(message) if message.role == Role::Model => {
            let drafted = std::mem::take(&mut screen.drafted);
            match view::finish_draft(&drafted, &message.content) {
                DraftEnding::Continue(rest) => {
                    println!("{}", rest);
                    let sources = view::format_sources(&message);
                    if !sources.is_empty() {
                        println!("{}", sources);
                    }
                    println!();
                }
                DraftEnding::Replace => {
                    if !drafted.is_empty() {
                        println!();
                    }
                    println!("{}\n", view::format_message(&message));
                }
            }
        }
        ChatEvent::Appended(_) => {}
        ChatEvent::StateChanged(LoadingState::Error) => {
            if let Some(status) =
                view::format_status(LoadingState::Error, None, controller.last_error())
            {
                println!("{}", status);
            }
        }
        ChatEvent::StateChanged(_) => {}
        ChatEvent::Cleared => {
            screen.drafted.clear();
            println!("\n--- new conversation ---");
            println!("{}", view::format_welcome());
        }
        ChatEvent::Notice(notice) => println!("! {}", notice),
        ChatEvent::VoiceChanged(VoiceState::Off) => println!("(voice off)"),
        ChatEvent::VoiceChanged(VoiceState::Listening) => {}
        ChatEvent::InputChanged(_) => {}
    }
}

fn print_draft(screen: &mut Screen, draft: &Message) {
    use std::io::Write;

    if screen.drafted.is_empty() {
        print!("{}> ", view::role_label(Role::Model));
    }
    if let Some(delta) = draft.content.strip_prefix(screen.drafted.as_str()) {
        print!("{}", delta);
    }
    screen.drafted = draft.content.clone();
    let _ = std::io::stdout().flush();
}

fn show_input(controller: &ChatController) {
    if !controller.input().is_empty() {
        println!("input> {}  (Enter to send)", controller.input());
    }
}
