//! Serving and removing the media files attached to expenses.
//!
//! Both routes share one path: the GET route names a stored file, the DELETE route names an expense.

use axum::{
    Extension, Json,
    extract::{Path, Request, State, rejection::PathRejection},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{
    Error,
    auth::UserID,
    database_id::ExpenseId,
    db::acquire,
    expense::{ExpenseState, clear_media_file, get_expense},
};

/// A route handler that streams a stored media file.
///
/// The content type is guessed from the file extension.
pub async fn get_media_endpoint(
    State(state): State<ExpenseState>,
    file_name: Result<Path<String>, PathRejection>,
    request: Request,
) -> Result<Response, Error> {
    let Path(file_name) = file_name?;

    let Some(path) = state.media_store.resolve(&file_name) else {
        tracing::warn!("Rejected request for media file {file_name:?}");
        return Err(Error::NotFound);
    };

    let is_file = tokio::fs::metadata(&path)
        .await
        .is_ok_and(|metadata| metadata.is_file());
    if !is_file {
        return Err(Error::NotFound);
    }

    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    Ok(response.into_response())
}

/// A route handler that deletes the media file of one of the caller's expenses, keeping the expense.
///
/// The expense stops referring to the file before the file is removed.
///
/// # Errors
///
/// Unlike deleting the whole expense, a file that cannot be removed fails the request.
pub async fn delete_media_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    expense_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Value>, Error> {
    let Path(expense_id) = expense_id?;
    let expense_id: ExpenseId = expense_id.parse().map_err(|_| Error::NotFound)?;

    let expense = {
        let connection = acquire(&state.db_connection)?;
        get_expense(expense_id, user_id, &connection)?
    };

    let Some(file_name) = expense.media_file else {
        return Err(Error::NoMediaFile);
    };

    {
        let connection = acquire(&state.db_connection)?;
        clear_media_file(expense_id, user_id, &connection)?;
    }

    let deletion = state.media_store.delete(&file_name).await?;
    tracing::info!("Media file {file_name} of expense {expense_id}: {deletion:?}");

    Ok(Json(json!({ "message": "Media file deleted successfully!" })))
}
