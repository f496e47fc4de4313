use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use electric_chat::app::{App, AppEvent, AppMsg};
use electric_chat::config::{AppConfig, BackendKind, StoreKind, APP_ID};
use electric_chat::models::{Chat, ChatSummary, MessageStatus, TodoCommand, TodoEvent};
use electric_chat::providers::{HttpBackend, ReplyBackend, SimulatedBackend};
use electric_chat::services::summaries::partition_pinned;
use electric_chat::services::{ChatRepository, Database, JsonFileStore, SettingsService};

const HELP: &str = "\
Commands:
  /new <message>     start a chat with its first message
  /open <chat id>    open an existing chat
  /chats             list chats
  /retry <msg id>    ask again for a failed or stopped reply
  /stop              stop waiting for pending replies
  /name <username>   change the name your messages are sent as
  /pin <chat id>     pin a chat to the top of the list
  /unpin <chat id>   unpin a chat
  /todo new <name>             create a todo list
  /todo drop <list id>         delete a todo list
  /todo add <list id> <task>   add an item
  /todo done <item id>         mark an item done
  /todo undo <item id>         mark an item not done
  /todo rm <item id>           delete an item
  /sidebar           toggle the sidebar
  /resize <width>    report a new viewport width
  /export            print the open chat as Markdown
  /quit              exit
Anything else is sent to the open chat.";

#[derive(Debug, PartialEq)]
enum Input {
    App(AppMsg),
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::App(AppMsg::SendMessage(line.to_string()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    let needs_arg = |msg: fn(String) -> AppMsg| {
        if arg.is_empty() {
            Input::Invalid(format!("/{} needs an argument", name))
        } else {
            Input::App(msg(arg.to_string()))
        }
    };

    match name {
        "new" => needs_arg(AppMsg::NewChat),
        "open" => needs_arg(AppMsg::OpenChat),
        "retry" => needs_arg(AppMsg::RetryReply),
        "chats" => Input::App(AppMsg::ListChats),
        "stop" => Input::App(AppMsg::AbortReply),
        "sidebar" => Input::App(AppMsg::ToggleSidebar),
        "export" => Input::App(AppMsg::Export),
        "resize" => match arg.parse() {
            Ok(width) => Input::App(AppMsg::ViewportResized(width)),
            Err(_) => Input::Invalid(format!("Not a width: {}", arg)),
        },
        "name" => needs_arg(AppMsg::SetUsername),
        "pin" | "unpin" if arg.is_empty() => Input::Invalid(format!("/{} needs an argument", name)),
        "pin" | "unpin" => Input::App(AppMsg::PinChat {
            chat_id: arg.to_string(),
            pinned: name == "pin",
        }),
        "todo" => match parse_todo(arg) {
            Ok(command) => Input::App(AppMsg::Todo(command)),
            Err(reason) => Input::Invalid(reason),
        },
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Invalid(format!("Unknown command: /{}", name)),
    }
}

fn parse_todo(arg: &str) -> Result<TodoCommand, String> {
    let mut parts = arg.splitn(3, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let first = parts.next().map(str::trim).filter(|s| !s.is_empty());
    let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let missing = || format!("Usage: /todo {} ...; see /help", verb);
    match verb {
        "new" => {
            let name = arg["new".len()..].trim();
            if name.is_empty() {
                return Err(missing());
            }
            Ok(TodoCommand::CreateList {
                name: name.to_string(),
            })
        }
        "drop" => Ok(TodoCommand::DeleteList {
            list_id: first.ok_or_else(missing)?.to_string(),
        }),
        "add" => Ok(TodoCommand::AddItem {
            list_id: first.ok_or_else(missing)?.to_string(),
            task: rest.ok_or_else(missing)?.to_string(),
        }),
        "done" | "undo" => Ok(TodoCommand::SetDone {
            item_id: first.ok_or_else(missing)?.to_string(),
            done: verb == "done",
        }),
        "rm" => Ok(TodoCommand::DeleteItem {
            item_id: first.ok_or_else(missing)?.to_string(),
        }),
        _ => Err("Unknown todo command; see /help".to_string()),
    }
}

fn render_chats(chats: Vec<ChatSummary>) -> String {
    if chats.is_empty() {
        return "No chats yet.\n".to_string();
    }

    let line = |chat: &ChatSummary| {
        format!(
            "  {}  {}  ({})\n",
            chat.id,
            chat.name,
            chat.created_at.format("%Y-%m-%d %H:%M")
        )
    };

    let (pinned, others) = partition_pinned(chats);
    let mut out = String::new();
    if !pinned.is_empty() {
        out.push_str("Pinned:\n");
        pinned.iter().for_each(|c| out.push_str(&line(c)));
    }
    if !others.is_empty() {
        out.push_str("Chats:\n");
        others.iter().for_each(|c| out.push_str(&line(c)));
    }
    out
}

fn render_todo(event: &TodoEvent) -> String {
    match event {
        TodoEvent::ListCreated(list) => format!("Created todo list {} [{}]", list.name, list.id),
        TodoEvent::ItemSaved(item) => format!(
            "[{}] {} ({} in list {})",
            if item.done { "x" } else { " " },
            item.task,
            item.id,
            item.list_id
        ),
        TodoEvent::Deleted { id } => format!("Deleted {}", id),
    }
}

fn render_chat(chat: &Chat) -> String {
    let mut out = format!("== {} [{}]\n", chat.title, chat.id);
    for msg in &chat.messages {
        let status = match msg.status {
            MessageStatus::Completed => "",
            MessageStatus::Pending => " …",
            MessageStatus::Failed => " (failed, /retry to ask again)",
            MessageStatus::Aborted => " (stopped)",
        };
        out.push_str(&format!("{}: {}{}\n", msg.sender, msg.content, status));
        if msg.status == MessageStatus::Failed || msg.status == MessageStatus::Aborted {
            out.push_str(&format!("   id {}\n", msg.id));
        }
    }
    out
}

async fn print_events(mut events: mpsc::UnboundedReceiver<AppEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            AppEvent::ChatUpdated(chat) => print!("{}", render_chat(&chat)),
            AppEvent::Redirect { missing_id } => {
                println!("Chat {} does not exist. Start one with /new <message>.", missing_id)
            }
            AppEvent::ReplyFailed { reason, .. } => println!("! Reply failed: {}", reason),
            AppEvent::Warning(warning) => println!("! {}", warning),
            AppEvent::Chats(chats) => print!("{}", render_chats(chats)),
            AppEvent::Todo(event) => println!("{}", render_todo(&event)),
            AppEvent::Sidebar(view) => {
                println!("Sidebar {}", if view.open { "open" } else { "closed" })
            }
            AppEvent::Exported(markdown) => println!("{}", markdown),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        "Starting {} ({:?} store, {:?} backend)",
        APP_ID,
        config.store,
        config.backend
    );

    let db = Database::open(&config.database_path()).context("Failed to open database")?;
    let settings = SettingsService::load(&db);

    let repo: Arc<dyn ChatRepository> = match config.store {
        StoreKind::Sqlite => Arc::new(db.clone()),
        StoreKind::Json => Arc::new(JsonFileStore::new(config.chats_json_path())),
    };
    let http = Arc::new(HttpBackend::new(config.api_url.clone()));
    let backend: Arc<dyn ReplyBackend> = match config.backend {
        BackendKind::Http => http.clone(),
        BackendKind::Simulated => Arc::new(SimulatedBackend::new(Duration::from_millis(
            settings.simulated_delay_ms,
        ))),
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (msg_tx, msg_rx) = mpsc::channel(32);

    let app = App::new(repo, db, backend, settings.clone(), event_tx).with_todo_api(http);
    let session = tokio::spawn(app.run(msg_rx));
    let printer = tokio::spawn(print_events(event_rx));

    println!("Signed in as {}. Type /help for commands.", settings.username);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_input(&line) {
            Input::App(msg) => {
                if msg_tx.send(msg).await.is_err() {
                    tracing::error!("Session stopped unexpectedly");
                    break;
                }
            }
            Input::Help => println!("{}", HELP),
            Input::Quit => break,
            Input::Invalid(reason) => println!("{}", reason),
        }
    }

    drop(msg_tx);
    session.await?;
    printer.await?;
    Ok(())
}
