//! Command-line front end for dataset ingestion and review inspection.
//!
//! # Responsibility
//! - Ingest delimited files into a labeling database.
//! - Print datasets, assignments and evaluations as JSON for scripting.

use cplabel_core::db::open_db;
use cplabel_core::{
    AssignmentService, DatasetId, DatasetListQuery, DatasetService, DatasetStatus, EvaluationRepository,
    IngestMode, IngestOptions, SqliteAssignmentRepository, SqliteDatasetRepository,
    SqliteEvaluationRepository,
};
use serde::Serialize;
use std::{env, fs};

#[derive(Serialize)]
struct DatasetSummary {
    id: String,
    name: String,
    length: usize,
    status: &'static str,
    mean: f64,
    std: f64,
}

#[derive(Serialize)]
struct IngestSummary {
    summary: String,
    dataset_ids: Vec<String>,
    coerced_cells: usize,
    dropped_rows: usize,
    skipped_columns: Vec<String>,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  cplabel_cli --version\n  \
  cplabel_cli ingest DB FILE [--multiple] [--column NAME] [--name NAME] [--tag TAG]...\n  \
  cplabel_cli datasets DB [--status active|inactive|completed]\n  \
  cplabel_cli set-status DB DATASET_ID active|inactive|completed\n  \
  cplabel_cli assign DB USER DATASET_ID\n  \
  cplabel_cli evaluations DB DATASET_ID"
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Could not serialize output: {e}"))?;
    println!("{text}");
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

fn flag_values(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|pair| pair[0] == flag)
        .map(|pair| pair[1].clone())
        .collect()
}

fn parse_status(value: &str) -> Result<DatasetStatus, String> {
    DatasetStatus::parse(value).ok_or_else(|| format!("Unknown dataset status '{value}'"))
}

fn parse_dataset_id(value: &str) -> Result<DatasetId, String> {
    value
        .trim()
        .parse::<DatasetId>()
        .map_err(|e| format!("Invalid dataset id '{value}': {e}"))
}

fn run_ingest(db: &str, file: &str, rest: &[String]) -> Result<(), String> {
    let raw = fs::read_to_string(file).map_err(|e| format!("Could not read '{file}': {e}"))?;
    let options = IngestOptions {
        mode: if rest.iter().any(|arg| arg == "--multiple") {
            IngestMode::Multiple
        } else {
            IngestMode::Single
        },
        selected_column: flag_value(rest, "--column"),
        name: flag_value(rest, "--name"),
        tags: flag_values(rest, "--tag"),
        ..IngestOptions::default()
    };

    let conn = open_db(db).map_err(|e| e.to_string())?;
    let repo = SqliteDatasetRepository::try_new(&conn).map_err(|e| e.to_string())?;
    let report = DatasetService::new(repo)
        .ingest(&raw, &options)
        .map_err(|e| e.to_string())?;

    print_json(&IngestSummary {
        summary: report.summary(),
        dataset_ids: report.datasets.iter().map(|d| d.id.to_string()).collect(),
        coerced_cells: report.log.coercions.len(),
        dropped_rows: report.log.dropped_rows.len(),
        skipped_columns: report
            .log
            .skipped_columns
            .iter()
            .map(|skipped| skipped.column.clone())
            .collect(),
    })
}

fn run_datasets(db: &str, rest: &[String]) -> Result<(), String> {
    let status = flag_value(rest, "--status")
        .map(|value| parse_status(&value))
        .transpose()?;
    let conn = open_db(db).map_err(|e| e.to_string())?;
    let repo = SqliteDatasetRepository::try_new(&conn).map_err(|e| e.to_string())?;
    let datasets = DatasetService::new(repo)
        .list_datasets(&DatasetListQuery {
            status,
            ..DatasetListQuery::default()
        })
        .map_err(|e| e.to_string())?;

    let summaries: Vec<DatasetSummary> = datasets
        .into_iter()
        .map(|d| DatasetSummary {
            id: d.id.to_string(),
            name: d.name,
            length: d.length,
            status: d.status.as_str(),
            mean: d.mean_value,
            std: d.std_value,
        })
        .collect();
    print_json(&summaries)
}

fn run_set_status(db: &str, dataset_id: &str, status: &str) -> Result<(), String> {
    let id = parse_dataset_id(dataset_id)?;
    let status = parse_status(status)?;
    let conn = open_db(db).map_err(|e| e.to_string())?;
    let repo = SqliteDatasetRepository::try_new(&conn).map_err(|e| e.to_string())?;
    let dataset = DatasetService::new(repo)
        .set_status(id, status)
        .map_err(|e| e.to_string())?;
    print_json(&dataset)
}

fn run_assign(db: &str, user: &str, dataset_id: &str) -> Result<(), String> {
    let id = parse_dataset_id(dataset_id)?;
    let conn = open_db(db).map_err(|e| e.to_string())?;
    let repo = SqliteAssignmentRepository::try_new(&conn).map_err(|e| e.to_string())?;
    let assignment = AssignmentService::new(repo)
        .assign(user, id)
        .map_err(|e| e.to_string())?;
    print_json(&assignment)
}

fn run_evaluations(db: &str, dataset_id: &str) -> Result<(), String> {
    let id = parse_dataset_id(dataset_id)?;
    let conn = open_db(db).map_err(|e| e.to_string())?;
    let repo = SqliteEvaluationRepository::try_new(&conn).map_err(|e| e.to_string())?;
    let evaluations = repo.list_for_dataset(id).map_err(|e| e.to_string())?;
    print_json(&evaluations)
}

fn run(args: &[String]) -> Result<(), String> {
    let command = args[1].as_str();
    let operands = &args[2..];
    let need = |count: usize| -> Result<(), String> {
        if operands.len() < count {
            usage();
            return Err(format!("'{command}' needs {count} argument(s)"));
        }
        Ok(())
    };

    match command {
        "ingest" => {
            need(2)?;
            run_ingest(&operands[0], &operands[1], &operands[2..])
        }
        "datasets" => {
            need(1)?;
            run_datasets(&operands[0], &operands[1..])
        }
        "set-status" => {
            need(3)?;
            run_set_status(&operands[0], &operands[1], &operands[2])
        }
        "assign" => {
            need(3)?;
            run_assign(&operands[0], &operands[1], &operands[2])
        }
        "evaluations" => {
            need(2)?;
            run_evaluations(&operands[0], &operands[1])
        }
        other => {
            usage();
            Err(format!("Unknown command '{other}'"))
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() <= 1 {
        usage();
        std::process::exit(2);
    }
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("cplabel_core {}", cplabel_core::core_version());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
