use axum::{
    Extension,
    extract::{Query, State, rejection::QueryRejection},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    db::acquire,
    expense::{ExpenseQuery, list_expenses},
    media::unique_stem,
    report::{ReportFormat, ReportState, render_csv, render_pdf},
};

/// The query string for downloading a report.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    /// Either "pdf" or "csv".
    pub format: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
}

impl ReportQuery {
    fn expense_query(&self) -> ExpenseQuery {
        ExpenseQuery {
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            category: self.category.clone(),
        }
    }
}

/// A route handler that renders the caller's expenses as a PDF or CSV download.
///
/// A copy of the report is kept in the report directory under a unique name.
///
/// # Errors
///
/// Returns a:
/// - [Error::InvalidReportFormat] if the format is missing or unknown,
/// - [Error::NoReportData] if no expenses match, in which case nothing is written,
/// - [Error::Io] if the copy could not be written.
pub async fn get_report_endpoint(
    State(state): State<ReportState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Response, Error> {
    let Query(query) = query?;
    let format = ReportFormat::parse(query.format.as_deref()).ok_or(Error::InvalidReportFormat)?;
    let filter = query.expense_query().into_filter()?;

    let expenses = {
        let connection = acquire(&state.db_connection)?;
        list_expenses(user_id, &filter, &connection)?
    };

    if expenses.is_empty() {
        return Err(Error::NoReportData);
    }

    let report = match format {
        ReportFormat::Pdf => render_pdf(&expenses)?,
        ReportFormat::Csv => render_csv(&expenses)?,
    };

    tokio::fs::create_dir_all(&state.report_dir).await?;
    let file_name = format!(
        "expense_report-{}.{}",
        unique_stem(OffsetDateTime::now_utc()),
        format.extension()
    );
    tokio::fs::write(state.report_dir.join(&file_name), &report).await?;

    tracing::info!(
        "Wrote {} report {file_name} with {} expenses for user {user_id}",
        format.extension(),
        expenses.len()
    );

    Ok((
        [
            (CONTENT_TYPE, format.content_type()),
            (CONTENT_DISPOSITION, format.content_disposition()),
        ],
        report,
    )
        .into_response())
}
