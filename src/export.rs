//! Hand-off to the participants page: the enriched roster plus run summary as
//! one JSON document. Rendering it is the page generator's job.

use crate::roster::{Roster, RosterSource};
use crate::state::enrich::EnrichStats;
use anyhow::Context;
use chrono::{DateTime, Local};
use fide_api::resolve_flag;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument<'a> {
    pub generated_at: String,
    pub roster_source: &'a RosterSource,
    pub summary: &'a EnrichStats,
    pub divisions: Vec<String>,
    pub header: &'a [String],
    pub records: Vec<Map<String, Value>>,
}

pub fn build_export<'a>(
    roster: &'a Roster,
    source: &'a RosterSource,
    stats: &'a EnrichStats,
    generated_at: DateTime<Local>,
) -> ExportDocument<'a> {
    let divisions: BTreeSet<&str> = roster
        .records
        .iter()
        .map(|r| r.division())
        .filter(|d| !d.is_empty())
        .collect();

    let records = roster
        .records
        .iter()
        .map(|record| {
            let mut row: Map<String, Value> = record
                .fields
                .iter()
                .map(|(col, value)| (col.clone(), Value::String(value.clone())))
                .collect();
            let e = &record.enrichment;
            row.insert("FIDETitle".into(), e.federation_title.clone().into());
            row.insert("FIDERating".into(), e.standard_rating.clone().into());
            row.insert("FIDEId".into(), e.federation_id.clone().into());
            row.insert("FIDEName".into(), e.display_name.clone().into());
            row.insert(
                "flag".into(),
                resolve_flag(record.country()).unwrap_or_default().into(),
            );
            row
        })
        .collect();

    ExportDocument {
        generated_at: generated_at.to_rfc3339(),
        roster_source: source,
        summary: stats,
        divisions: divisions.into_iter().map(str::to_owned).collect(),
        header: &roster.header,
        records,
    }
}

/// Write the document. Failing here is the one error that ends a run.
pub fn write_export(path: &Path, document: &ExportDocument<'_>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(path, json).with_context(|| format!("could not write {}", path.display()))
}
