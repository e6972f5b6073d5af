use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
};
use serde_json::{Value, json};

use crate::{
    Error,
    auth::UserID,
    database_id::ExpenseId,
    db::acquire,
    expense::{ExpenseState, delete_expense, discard_media_file, get_expense},
};

/// A route handler for deleting one of the caller's expenses along with its media file.
///
/// A media file that cannot be deleted is logged and does not stop the expense being deleted.
pub async fn delete_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    expense_id: Result<Path<ExpenseId>, PathRejection>,
) -> Result<Json<Value>, Error> {
    let Path(expense_id) = expense_id?;

    let expense = {
        let connection = acquire(&state.db_connection)?;
        get_expense(expense_id, user_id, &connection)?
    };

    if let Some(file_name) = &expense.media_file {
        discard_media_file(&state.media_store, file_name).await;
    }

    {
        let connection = acquire(&state.db_connection)?;
        delete_expense(expense_id, user_id, &connection)?;
    }

    tracing::info!("User {user_id} deleted expense {expense_id}");

    Ok(Json(json!({ "message": "Expense deleted successfully!" })))
}
