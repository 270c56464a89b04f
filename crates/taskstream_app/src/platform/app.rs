use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::{Context, Result};
use stream_logging::{stream_info, stream_warn};
use taskstream_core::{AppViewModel, ControlAction};
use taskstream_engine::{ensure_state_dir, EngineHandle, WsTransport};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::logging::{self, LogDestination};
use super::persistence::{resolve_state_dir, FileConversationStore};
use super::settings::{AppSettings, SETTINGS_FILENAME};
use super::ui::commands::{self, UserCommand, HELP};
use super::ui::render::{render_changes, render_conversation_list};

pub async fn run_app() -> Result<()> {
    let cwd = std::env::current_dir().context("resolving working directory")?;
    let settings = AppSettings::load(&cwd.join(SETTINGS_FILENAME))?
        .apply_overrides(|name| std::env::var(name).ok());
    logging::initialize(
        LogDestination::from_settings(settings.log_file.as_deref()),
        settings.level_filter(),
    );

    let state_dir = resolve_state_dir(&cwd, &settings.state_dir);
    ensure_state_dir(&state_dir)
        .with_context(|| format!("preparing state directory {}", state_dir.display()))?;
    let store = Arc::new(FileConversationStore::new(state_dir));
    stream_info!("Conversations are kept in {:?}", store.path());

    let engine = EngineHandle::start(settings.engine_config(), Arc::new(WsTransport), store)
        .context("starting engine")?;
    println!("taskstream connected to {} (/help for commands)", settings.endpoint);

    let mut snapshots = engine.subscribe();
    let mut shown = snapshots.borrow_and_update().clone();
    print_lines(render_changes(&AppViewModel::default(), &shown));

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    stream_warn!("Engine stopped publishing snapshots");
                    break;
                }
                let current = snapshots.borrow_and_update().clone();
                print_lines(render_changes(&shown, &current));
                shown = current;
            }
            line = input.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if handle_line(&engine, &shown, &line).is_break() {
                    break;
                }
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

fn handle_line(engine: &EngineHandle, shown: &AppViewModel, line: &str) -> ControlFlow<()> {
    let command = match commands::parse(line) {
        Ok(command) => command,
        Err(err) => {
            println!("! {err}");
            return ControlFlow::Continue(());
        }
    };

    match command {
        UserCommand::NewConversation(title) => engine.new_conversation(title),
        UserCommand::Select(id) => engine.select_conversation(id),
        UserCommand::Delete(id) => engine.delete_conversation(id),
        UserCommand::List => print_lines(render_conversation_list(shown)),
        UserCommand::Control(action) => engine.control(action, task_id_for(action, shown)),
        UserCommand::Research(topic) => engine.start_research(topic),
        UserCommand::Scroll(offset) => engine.scroll_logs(offset),
        UserCommand::ClearLogs => engine.clear_logs(),
        UserCommand::Help => println!("{HELP}"),
        UserCommand::Quit => return ControlFlow::Break(()),
        UserCommand::Task(task) => engine.submit_task(task, None),
        UserCommand::Nothing => {}
    }
    ControlFlow::Continue(())
}

/// Research controls name the research run; the id is on the user message
/// that started it.
fn task_id_for(action: ControlAction, shown: &AppViewModel) -> Option<String> {
    if !matches!(
        action,
        ControlAction::StopResearch | ControlAction::ResumeResearch
    ) {
        return None;
    }
    shown.messages.iter().rev().find_map(|message| {
        let metadata = message.metadata.as_ref()?;
        if metadata.get("kind")?.as_str()? != "research" {
            return None;
        }
        metadata.get("task_id")?.as_str().map(ToOwned::to_owned)
    })
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use taskstream_core::{Message, Sender};

    fn view_with(metadata: Vec<serde_json::Value>) -> AppViewModel {
        let messages = metadata
            .into_iter()
            .enumerate()
            .map(|(index, metadata)| Message {
                id: format!("m{index}"),
                content: "Research: bikes".to_string(),
                sender: Sender::User,
                timestamp: Utc::now(),
                metadata: Some(metadata),
            })
            .collect();
        AppViewModel {
            messages,
            ..AppViewModel::default()
        }
    }

    #[test]
    fn research_controls_target_the_latest_research_run() {
        let view = view_with(vec![
            json!({ "kind": "research", "task_id": "research-1" }),
            json!({ "kind": "task", "llm_model": "gpt-4o" }),
            json!({ "kind": "research", "task_id": "research-2" }),
        ]);
        assert_eq!(
            task_id_for(ControlAction::StopResearch, &view),
            Some("research-2".to_string())
        );
        assert_eq!(task_id_for(ControlAction::Pause, &view), None);
    }

    #[test]
    fn research_control_without_a_run_has_no_task_id() {
        let view = view_with(vec![json!({ "kind": "task" })]);
        assert_eq!(task_id_for(ControlAction::ResumeResearch, &view), None);
    }
}
