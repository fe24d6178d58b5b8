//! Command-line entry point for the marks portal core.
//!
//! Reads and writes a marks database through the same gateway a web handler
//! would use, printing the JSON response body to stdout. The caller is
//! trusted as an authorized admin.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use marks_core::db::open_db;
use marks_core::{
    init_from_config, GatewayResponse, MarksGateway, PortalConfig, RosterRepository,
    SqliteRosterRepository,
};
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "marks", version, about = "School portal marks reconciliation")]
struct Cli {
    /// TOML config file (`db_path`, `log_level`, `log_dir`).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Overrides the configured database path.
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a mark batch from a JSON file (`-` reads stdin).
    Submit {
        #[arg(long, short)]
        file: PathBuf,
    },
    /// List marks for one subject and exam.
    Marks {
        #[arg(long)]
        subject: Option<i64>,
        #[arg(long)]
        exam: Option<String>,
    },
    /// Register a student.
    AddStudent {
        #[arg(long)]
        roll: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Register a subject.
    AddSubject {
        #[arg(long)]
        name: String,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Marks { .. } => "marks",
            Self::AddStudent { .. } => "add_student",
            Self::AddSubject { .. } => "add_subject",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_from_config(&config)
        .map_err(anyhow::Error::msg)
        .context("failed to initialize logging")?;
    info!(
        "event=cli_start module=cli status=ok command={} version={}",
        cli.command.name(),
        marks_core::core_version()
    );

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open `{}`", config.db_path.display()))?;

    let response = match cli.command {
        Command::Submit { file } => {
            let body: Value = serde_json::from_str(&read_input(&file)?)
                .with_context(|| format!("`{}` is not valid JSON", file.display()))?;
            MarksGateway::new(&conn).handle("POST", body)
        }
        Command::Marks { subject, exam } => MarksGateway::new(&conn).handle(
            "GET",
            json!({ "subject_id": subject, "exam_type": exam }),
        ),
        Command::AddStudent { roll, name, email } => {
            let id = SqliteRosterRepository::new(&conn)
                .create_student(&roll, &name, email.as_deref())
                .context("failed to add student")?;
            created(json!({ "id": id, "roll_number": roll.trim() }))
        }
        Command::AddSubject { name } => {
            let id = SqliteRosterRepository::new(&conn)
                .create_subject(&name)
                .context("failed to add subject")?;
            created(json!({ "id": id, "name": name.trim() }))
        }
    };

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if response.status >= 400 {
        bail!("request failed with status {}", response.status);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<PortalConfig> {
    let mut config = match &cli.config {
        Some(path) => PortalConfig::load(path)?,
        None => PortalConfig::default(),
    }
    .with_env_overrides();

    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    config.validate()?;
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))
}

fn created(body: Value) -> GatewayResponse {
    GatewayResponse { status: 201, body }
}
