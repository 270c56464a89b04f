use serde::Serialize;
use serde_json::Value;

use crate::event::ServerEvent;
use crate::routing::{not_applicable, Target};
use crate::ProjectionError;

/// The most recent data export the server announced.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DataExport {
    pub available: bool,
    pub filename: Option<String>,
    pub item_count: Option<u64>,
    pub preview: Option<Value>,
    pub path: Option<String>,
}

pub(crate) fn reduce(export: &mut DataExport, event: &ServerEvent) -> Result<(), ProjectionError> {
    match event {
        // Replaced wholesale: stale fields from an earlier export must not survive.
        ServerEvent::DataExportReady(notice) => {
            *export = DataExport {
                available: true,
                filename: notice.filename.clone(),
                item_count: notice.item_count,
                preview: notice.preview.clone(),
                path: notice.path.clone(),
            };
            Ok(())
        }
        other => Err(not_applicable(other, Target::Export)),
    }
}
