use std::io::Write;

use bson::Bson;

use super::command::Command;
use super::util::{parse_json_document, parse_json_documents, parse_optional_document, to_json_line};
use crate::errors::DbError;
use crate::query::{FindOptions, UpdateOptions};
use crate::{Database, MontyClient};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    /// One relaxed Extended JSON value per line.
    Json,
    /// Indented JSON.
    Pretty,
}

fn emit(out: &mut dyn Write, mode: OutputMode, value: Bson) -> Result<(), DbError> {
    let text = match mode {
        OutputMode::Json => to_json_line(value),
        OutputMode::Pretty => serde_json::to_string_pretty(&value.into_relaxed_extjson())?,
    };
    writeln!(out, "{text}")?;
    Ok(())
}

/// Run `cmd` against database `db`, printing to stdout.
///
/// # Errors
/// Any error the underlying operation reports.
pub fn run(client: &MontyClient, db: &str, cmd: Command) -> Result<(), DbError> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    run_with_writer(client, db, cmd, OutputMode::Json, &mut lock)
}

/// Like [`run`], writing to `out` in the given mode.
///
/// # Errors
/// Any error the underlying operation reports.
pub fn run_with_writer(
    client: &MontyClient,
    db: &str,
    cmd: Command,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<(), DbError> {
    let database: Database = client.database(db)?;
    log::debug!("cli: {cmd:?} on {db}");
    match cmd {
        Command::Collections => {
            for name in database.list_collection_names()? {
                writeln!(out, "{name}")?;
            }
        }
        Command::Drop { collection } => {
            let dropped = database.drop_collection(&collection)?;
            emit(out, mode, Bson::Document(bson::doc! {"dropped": dropped}))?;
        }
        Command::Insert { collection, docs_json, ordered } => {
            let col = database.collection(&collection)?;
            let docs = parse_json_documents(&docs_json)?;
            let result = col.insert_many(docs, ordered)?;
            for id in result.inserted_ids {
                emit(out, mode, Bson::Document(bson::doc! {"inserted_id": id}))?;
            }
        }
        Command::Find { collection, filter_json, projection, sort, skip, limit, max_time_ms } => {
            let col = database.collection(&collection)?;
            let filter = parse_json_document(&filter_json)?;
            let opts = FindOptions {
                projection: parse_optional_document(projection.as_deref())?,
                sort: parse_optional_document(sort.as_deref())?,
                skip,
                limit,
                max_scan: None,
                max_time_ms,
            };
            for doc in col.find(&filter, opts)? {
                emit(out, mode, Bson::Document(doc?))?;
            }
        }
        Command::Count { collection, filter_json } => {
            let n = database.collection(&collection)?.count_documents(&parse_json_document(&filter_json)?)?;
            writeln!(out, "{n}")?;
        }
        Command::Distinct { collection, key, filter_json } => {
            let values = database.collection(&collection)?.distinct(&key, &parse_json_document(&filter_json)?)?;
            emit(out, mode, Bson::Array(values))?;
        }
        Command::Update { collection, filter_json, update_json, many, upsert, array_filters } => {
            let col = database.collection(&collection)?;
            let filter = parse_json_document(&filter_json)?;
            let update = parse_json_document(&update_json)?;
            let array_filters = match array_filters {
                Some(text) => parse_json_documents(&text)?,
                None => Vec::new(),
            };
            let opts = UpdateOptions { upsert, array_filters };
            let result = if many { col.update_many(&filter, &update, opts)? } else { col.update_one(&filter, &update, opts)? };
            let mut report = bson::doc! {
                "matched": i64::try_from(result.matched_count).unwrap_or(i64::MAX),
                "modified": i64::try_from(result.modified_count).unwrap_or(i64::MAX),
            };
            if let Some(id) = result.upserted_id {
                report.insert("upserted_id", id);
            }
            emit(out, mode, Bson::Document(report))?;
        }
        Command::Delete { collection, filter_json, many } => {
            let col = database.collection(&collection)?;
            let filter = parse_json_document(&filter_json)?;
            let result = if many { col.delete_many(&filter)? } else { col.delete_one(&filter)? };
            writeln!(out, "{}", result.deleted_count)?;
        }
        Command::Metrics => {
            write!(out, "{}", crate::query::telemetry::metrics_text())?;
        }
    }
    Ok(())
}
