//! Interactive risk-analysis menu.
//!
//! Entry `1` shows the integrity report, entries `2..` run catalog queries in
//! catalog order and `0` (or end of input) exits. Bad input never ends the
//! loop.

use std::io::{self, BufRead, Write};

use chrono::NaiveDate;
use iamrisk_analyzer::{IamAnalyzer, RiskQuery};

use crate::render;

/// What a line of input asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    IntegrityReport,
    Run(RiskQuery),
    OutOfRange,
    NotANumber,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Self {
        let Ok(choice) = input.trim().parse::<i64>() else {
            return Self::NotANumber;
        };
        match choice {
            0 => Self::Exit,
            1 => Self::IntegrityReport,
            n => n
                .checked_sub(1)
                .and_then(|position| usize::try_from(position).ok())
                .and_then(RiskQuery::from_position)
                .map_or(Self::OutOfRange, Self::Run),
        }
    }
}

pub struct Menu<'a> {
    analyzer: &'a IamAnalyzer,
    as_of: NaiveDate,
    color: bool,
}

impl<'a> Menu<'a> {
    pub fn new(analyzer: &'a IamAnalyzer, as_of: NaiveDate, color: bool) -> Self {
        Self {
            analyzer,
            as_of,
            color,
        }
    }

    /// Run until the user exits or input ends
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, out: &mut W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            self.print_menu(out)?;
            write!(out, "Enter your choice: ")?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                writeln!(out, "Exiting Risk Analyzer. Goodbye!")?;
                return Ok(());
            }

            match MenuChoice::parse(&line) {
                MenuChoice::Exit => {
                    writeln!(out, "Exiting Risk Analyzer. Goodbye!")?;
                    return Ok(());
                }
                MenuChoice::IntegrityReport => {
                    let report = self.analyzer.integrity_report();
                    write!(out, "{}", render::integrity_report(report, self.color))?;
                }
                MenuChoice::Run(query) => self.run_query(query, out)?,
                MenuChoice::OutOfRange => {
                    writeln!(out, "Invalid choice. Please enter a number from the menu.")?;
                }
                MenuChoice::NotANumber => {
                    writeln!(out, "Invalid input. Please enter a number.")?;
                }
            }
        }
    }

    fn print_menu<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "--- Risk Analysis Menu ---")?;
        writeln!(out, "1. View Data Integrity Check Results")?;
        for (idx, query) in RiskQuery::all().into_iter().enumerate() {
            writeln!(out, "{}. {}: {}", idx + 2, query.title(), query.description())?;
        }
        writeln!(out, "0. Exit")?;
        writeln!(out, "--------------------------")
    }

    fn run_query<W: Write>(&self, query: RiskQuery, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "--- Running: {} ---", query.title())?;
        writeln!(out, "Description: {}", query.description())?;
        writeln!(out, "Executing SQL query...")?;

        match self.analyzer.run_risk(query, self.as_of) {
            Ok(rows) if rows.is_empty() => writeln!(out, "No results found for this query."),
            Ok(rows) => {
                writeln!(out)?;
                writeln!(out, "--- Results ---")?;
                write!(out, "{}", render::table(&rows))
            }
            Err(e) => {
                tracing::warn!(
                    query = query.slug(),
                    error = %e.detail(),
                    "Risk query failed"
                );
                writeln!(
                    out,
                    "An error occurred while executing the query: {}",
                    e.detail()
                )
            }
        }
    }
}
