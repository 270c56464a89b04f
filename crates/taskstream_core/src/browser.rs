use serde::{Deserialize, Serialize};

use crate::event::ServerEvent;
use crate::routing::{not_applicable, Target};
use crate::ProjectionError;

/// Last known state of the remote browser.
///
/// Also the payload of `status_update`: every field is optional, and merging
/// only overwrites the fields that are present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BrowserStatus {
    #[serde(alias = "currentUrl", alias = "url")]
    pub current_url: Option<String>,
    #[serde(alias = "isLoading")]
    pub is_loading: Option<bool>,
    #[serde(alias = "currentAction")]
    pub current_action: Option<String>,
    #[serde(alias = "browserReady")]
    pub browser_ready: Option<bool>,
}

impl BrowserStatus {
    /// Shallow merge: `None` in the patch leaves the current value untouched.
    pub fn merge(&mut self, patch: &BrowserStatus) {
        if let Some(url) = &patch.current_url {
            self.current_url = Some(url.clone());
        }
        if let Some(loading) = patch.is_loading {
            self.is_loading = Some(loading);
        }
        if let Some(action) = &patch.current_action {
            self.current_action = Some(action.clone());
        }
        if let Some(ready) = patch.browser_ready {
            self.browser_ready = Some(ready);
        }
    }
}

pub(crate) fn reduce(status: &mut BrowserStatus, event: &ServerEvent) -> Result<(), ProjectionError> {
    let patch = match event {
        ServerEvent::TaskStarted(_) => BrowserStatus {
            is_loading: Some(true),
            browser_ready: Some(true),
            ..BrowserStatus::default()
        },
        ServerEvent::Action(action) | ServerEvent::BrowserAction(action) => BrowserStatus {
            current_url: action.url.clone(),
            current_action: Some(action.describe()),
            ..BrowserStatus::default()
        },
        ServerEvent::BrowserStep(step) => BrowserStatus {
            current_url: step.url.clone(),
            current_action: step.action.clone().or_else(|| step.goal.clone()),
            ..BrowserStatus::default()
        },
        ServerEvent::TaskComplete(_)
        | ServerEvent::TaskCancelled(_)
        | ServerEvent::TaskError(_)
        | ServerEvent::CustomTaskComplete(_) => BrowserStatus {
            is_loading: Some(false),
            ..BrowserStatus::default()
        },
        ServerEvent::BrowserClosed(_) => BrowserStatus {
            is_loading: Some(false),
            browser_ready: Some(false),
            ..BrowserStatus::default()
        },
        ServerEvent::StatusUpdate(patch) => patch.clone(),
        other => return Err(not_applicable(other, Target::Browser)),
    };
    status.merge(&patch);
    Ok(())
}
