//! Parsing of stdin lines into user commands.
use taskstream_core::ControlAction;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UserCommand {
    NewConversation(Option<String>),
    Select(String),
    Delete(String),
    List,
    Control(ControlAction),
    Research(String),
    Scroll(usize),
    ClearLogs,
    Help,
    Quit,
    Task(String),
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CommandError {
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("not a log offset: {0}")]
    BadOffset(String),
    #[error("unknown command /{0}; try /help")]
    Unknown(String),
}

pub(crate) const HELP: &str = "\
/new [title]        start a conversation
/select <id>        switch conversation
/delete <id>        delete a conversation
/list               list conversations
/stop /pause /resume /close
/research <topic>   start deep research
/stop-research /resume-research
/scroll <offset>    log position from the newest entry (0 follows)
/clear-logs
/quit
anything else is sent as a task";

pub(crate) fn parse(line: &str) -> Result<UserCommand, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        if line.is_empty() {
            return Ok(UserCommand::Nothing);
        }
        return Ok(UserCommand::Task(line.to_string()));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    let required = |name: &'static str| {
        if argument.is_empty() {
            Err(CommandError::MissingArgument(name))
        } else {
            Ok(argument.to_string())
        }
    };

    let command = match name {
        "new" => UserCommand::NewConversation(Some(argument.to_string()).filter(|t| !t.is_empty())),
        "select" => UserCommand::Select(required("select")?),
        "delete" => UserCommand::Delete(required("delete")?),
        "list" => UserCommand::List,
        "stop" => UserCommand::Control(ControlAction::Stop),
        "pause" => UserCommand::Control(ControlAction::Pause),
        "resume" => UserCommand::Control(ControlAction::Resume),
        "close" => UserCommand::Control(ControlAction::Close),
        "research" => UserCommand::Research(required("research")?),
        "stop-research" => UserCommand::Control(ControlAction::StopResearch),
        "resume-research" => UserCommand::Control(ControlAction::ResumeResearch),
        "scroll" => {
            let offset = required("scroll")?;
            UserCommand::Scroll(offset.parse().map_err(|_| CommandError::BadOffset(offset))?)
        }
        "clear-logs" => UserCommand::ClearLogs,
        "help" => UserCommand::Help,
        "quit" | "exit" => UserCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}
