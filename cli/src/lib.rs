//! iamrisk command line
//!
//! ## Commands
//!
//! - `iamrisk [menu]` - interactive risk-analysis menu
//! - `iamrisk check [--json]` - data integrity report
//! - `iamrisk list [--json]` - risk query catalog
//! - `iamrisk query <SLUG> [--json]` - run one catalog query
//! - `iamrisk sql <TEXT> [--json]` - run ad-hoc read-only SQL
//!
//! ## Exit Codes
//!
//! - 0: Success
//! - 1: Query failed
//! - 2: Integrity checks failed (`check` only)
//! - 3: Infrastructure error (config, snapshot, store)

pub mod menu;
pub mod render;

use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use iamrisk_analyzer::{AnalyzerConfig, IamAnalyzer, IntegrityReport, RiskQuery, RowSet};

pub const EXIT_OK: i32 = 0;
pub const EXIT_QUERY_FAILED: i32 = 1;
pub const EXIT_INTEGRITY_FAILED: i32 = 2;
pub const EXIT_INFRA: i32 = 3;

/// IAM snapshot risk analyzer
#[derive(Debug, Parser)]
#[command(name = "iamrisk", version)]
pub struct Cli {
    /// Snapshot JSON file (overrides `snapshot_path` from config)
    #[arg(long, global = true, value_name = "PATH")]
    pub data: Option<PathBuf>,

    /// Config file (default: $IAMRISK_CONFIG or ~/.config/iamrisk/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Reference date for windowed queries (default: today)
    #[arg(long = "as-of", global = true, value_name = "YYYY-MM-DD")]
    pub as_of: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive menu (default)
    Menu,

    /// Print the data integrity report
    ///
    /// Exits 2 when any check fails.
    Check(OutputArgs),

    /// List the risk query catalog
    List(OutputArgs),

    /// Run one catalog query
    Query(QueryArgs),

    /// Run ad-hoc read-only SQL against the projected tables
    ///
    /// `:as_of` is bound to the reference date when present.
    Sql(SqlArgs),
}

#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// Catalog entry (see `iamrisk list`)
    #[arg(value_name = "SLUG", value_parser = parse_risk_query)]
    pub query: RiskQuery,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Parser)]
pub struct SqlArgs {
    /// Query text
    #[arg(value_name = "TEXT")]
    pub sql: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

fn parse_risk_query(slug: &str) -> Result<RiskQuery, String> {
    RiskQuery::from_str(slug).map_err(|_| {
        let known: Vec<&str> = RiskQuery::all().into_iter().map(RiskQuery::slug).collect();
        format!("unknown query '{slug}' (expected one of: {})", known.join(", "))
    })
}

impl Cli {
    /// Run the selected command against stdin/stdout and return the exit code
    pub fn run(self) -> i32 {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match self.dispatch(&mut out) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "iamrisk failed");
                eprintln!("Error: {e:#}");
                EXIT_INFRA
            }
        }
    }

    fn dispatch<W: Write>(mut self, out: &mut W) -> anyhow::Result<i32> {
        let as_of = self.as_of.unwrap_or_else(iamrisk_analyzer::today);
        let command = self.command.take().unwrap_or(Command::Menu);

        if let Command::List(args) = &command {
            print_catalog(out, args.json)?;
            return Ok(EXIT_OK);
        }

        if matches!(command, Command::Menu) {
            writeln!(out, "Loading IAM data and performing integrity checks...")?;
        }
        let analyzer = self.load_analyzer()?;

        match command {
            Command::Menu => {
                writeln!(out, "Data loading complete.")?;
                let color = render::stdout_supports_color();
                menu::Menu::new(&analyzer, as_of, color).run(io::stdin().lock(), out)?;
                Ok(EXIT_OK)
            }
            Command::Check(args) => {
                let report = analyzer.integrity_report();
                print_report(out, report, args.json)?;
                Ok(if report.passed() {
                    EXIT_OK
                } else {
                    EXIT_INTEGRITY_FAILED
                })
            }
            Command::Query(args) => {
                let result = analyzer.run_risk(args.query, as_of);
                print_rows(out, result, args.output.json)
            }
            Command::Sql(args) => {
                let result = analyzer.run_sql(&args.sql, as_of);
                print_rows(out, result, args.output.json)
            }
            Command::List(_) => Ok(EXIT_OK),
        }
    }

    fn load_analyzer(&self) -> anyhow::Result<IamAnalyzer> {
        let mut cfg = match &self.config {
            Some(path) => AnalyzerConfig::load_from_path(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => AnalyzerConfig::load().context("failed to load config")?,
        };
        if let Some(data) = &self.data {
            cfg.snapshot_path = data.to_string_lossy().into_owned();
        }

        IamAnalyzer::load(&cfg).with_context(|| {
            format!(
                "failed to load IAM snapshot {}",
                cfg.resolved_snapshot_path().display()
            )
        })
    }
}

fn print_report<W: Write>(out: &mut W, report: &IntegrityReport, json: bool) -> anyhow::Result<()> {
    if json {
        let output = serde_json::json!({
            "checks": report.iter().collect::<Vec<_>>(),
            "overall": if report.passed() { "pass" } else { "fail" },
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        let color = render::stdout_supports_color();
        write!(out, "{}", render::integrity_report(report, color))?;
    }
    Ok(())
}

fn print_catalog<W: Write>(out: &mut W, json: bool) -> anyhow::Result<()> {
    if json {
        let entries: Vec<serde_json::Value> = RiskQuery::all()
            .into_iter()
            .map(|q| {
                serde_json::json!({
                    "slug": q.slug(),
                    "title": q.title(),
                    "description": q.description(),
                    "uses_as_of": q.uses_as_of(),
                    "sql": q.sql().trim(),
                })
            })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        write!(out, "{}", render::catalog())?;
    }
    Ok(())
}

/// Recoverable query failures are reported and mapped to exit 1; anything
/// else propagates as an infrastructure error.
fn print_rows<W: Write>(
    out: &mut W,
    result: iamrisk_analyzer::Result<RowSet>,
    json: bool,
) -> anyhow::Result<i32> {
    let rows = match result {
        Ok(rows) => rows,
        Err(e) if !e.category().recoverable() => {
            return Err(anyhow::Error::new(e).context("query could not run"));
        }
        Err(e) => {
            tracing::warn!(category = e.category().as_str(), "Query failed");
            if json {
                let output = serde_json::json!({
                    "error": e.detail(),
                    "category": e.category().as_str(),
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
            } else {
                eprintln!("An error occurred while executing the query: {}", e.detail());
            }
            return Ok(EXIT_QUERY_FAILED);
        }
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
    } else if rows.is_empty() {
        writeln!(out, "No results found for this query.")?;
    } else {
        write!(out, "{}", render::table(&rows))?;
    }
    Ok(EXIT_OK)
}
