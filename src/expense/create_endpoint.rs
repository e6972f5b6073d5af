use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    db::acquire,
    expense::{Expense, ExpensePayload, ExpenseState, create_expense, discard_media_file},
};

/// A route handler for recording a new expense, optionally with a media file attached.
///
/// The media file is only written to disk once every field has validated.
/// If the expense then cannot be stored, the file is deleted again.
pub async fn create_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    payload: ExpensePayload,
) -> Result<(StatusCode, Json<Expense>), Error> {
    let ExpensePayload { input, file } = payload;
    let expense = input.validate_new(OffsetDateTime::now_utc().date())?;

    let media_file = match file {
        Some(file) => Some(state.media_store.save(&file).await?),
        None => None,
    };

    let builder = Expense::build(user_id, expense.date, &expense.category, expense.amount)
        .description(expense.description)
        .payment_method(Some(expense.payment_method))
        .media_file(media_file.clone());

    let result = acquire(&state.db_connection)
        .and_then(|connection| create_expense(builder, &connection));

    match result {
        Ok(expense) => {
            tracing::info!("User {user_id} created expense {}", expense.id);
            Ok((StatusCode::CREATED, Json(expense)))
        }
        Err(error) => {
            if let Some(file_name) = media_file {
                discard_media_file(&state.media_store, &file_name).await;
            }
            Err(error)
        }
    }
}
