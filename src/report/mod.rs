//! Exporting a user's expenses as a downloadable PDF or CSV report.

mod csv_report;
mod pdf_report;
mod report_endpoint;

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::AppState;

pub use csv_report::render_csv;
pub use pdf_report::render_pdf;
pub use report_endpoint::get_report_endpoint;

/// The file formats a report can be downloaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Csv,
}

impl ReportFormat {
    /// Parse the `format` query parameter. Only the exact lowercase names are accepted.
    pub fn parse(format: Option<&str>) -> Option<Self> {
        match format {
            Some("pdf") => Some(Self::Pdf),
            Some("csv") => Some(Self::Csv),
            _ => None,
        }
    }

    /// The file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Csv => "text/csv",
        }
    }

    /// The `Content-Disposition` header value that makes browsers download the report.
    pub fn content_disposition(self) -> &'static str {
        match self {
            Self::Pdf => "attachment; filename=expense_report.pdf",
            Self::Csv => "attachment; filename=expense_report.csv",
        }
    }
}

/// The state needed to generate reports.
#[derive(Debug, Clone)]
pub struct ReportState {
    /// The shared database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Where a copy of every generated report is kept.
    pub report_dir: PathBuf,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            report_dir: state.report_dir.clone(),
        }
    }
}
