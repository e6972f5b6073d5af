use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    auth::UserID,
    database_id::ExpenseId,
    db::acquire,
    expense::{Expense, ExpensePayload, ExpenseState, discard_media_file, get_expense, update_expense},
};

/// The response body for a successful update.
#[derive(Debug, Serialize)]
pub struct UpdatedExpense {
    message: &'static str,
    expense: Expense,
}

/// A route handler for editing one of the caller's expenses.
///
/// Only the fields present in the request are changed. A new media file replaces
/// the old one, which is deleted once the expense points at the new file.
pub async fn update_expense_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    expense_id: Result<Path<ExpenseId>, PathRejection>,
    payload: ExpensePayload,
) -> Result<Json<UpdatedExpense>, Error> {
    let Path(expense_id) = expense_id?;
    let ExpensePayload { input, file } = payload;
    let mut changes = input.validate_changes(OffsetDateTime::now_utc().date())?;

    let existing = {
        let connection = acquire(&state.db_connection)?;
        get_expense(expense_id, user_id, &connection)?
    };

    if let Some(file) = file {
        changes.media_file = Some(state.media_store.save(&file).await?);
    }
    let new_media_file = changes.media_file.clone();

    let result = acquire(&state.db_connection)
        .and_then(|connection| update_expense(expense_id, user_id, changes, &connection));

    let expense = match result {
        Ok(expense) => expense,
        Err(error) => {
            if let Some(file_name) = new_media_file {
                discard_media_file(&state.media_store, &file_name).await;
            }
            return Err(error);
        }
    };

    if let (Some(_), Some(old_file)) = (&new_media_file, &existing.media_file) {
        discard_media_file(&state.media_store, old_file).await;
    }

    tracing::info!("User {user_id} updated expense {expense_id}");

    Ok(Json(UpdatedExpense {
        message: "Expense updated successfully",
        expense,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_extra::extract::cookie::Cookie;
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        test_utils::{sign_up_user, test_app},
    };

    async fn create(server: &TestServer, cookie: &Cookie<'static>) -> Value {
        let response = server
            .post(endpoints::EXPENSES)
            .add_cookie(cookie.clone())
            .json(&json!({
                "date": "2024-01-05",
                "category": "Food",
                "amount": 12.5,
                "description": "Lunch",
                "paymentMethod": "Card",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    fn receipt_form(file_name: &str, data: &[u8]) -> MultipartForm {
        MultipartForm::new().add_part(
            "mediaFile",
            Part::bytes(data.to_vec())
                .file_name(file_name)
                .mime_type("image/png"),
        )
    }

    #[tokio::test]
    async fn updates_only_given_fields() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;
        let expense = create(&app.server, &alice).await;
        let id = expense["_id"].as_i64().unwrap();

        let response = app
            .server
            .put(&format_endpoint(endpoints::EXPENSE, id))
            .add_cookie(alice)
            .json(&json!({ "amount": "20" }))
            .await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["message"], "Expense updated successfully");
        assert_eq!(body["expense"]["amount"], 20.0);
        assert_eq!(body["expense"]["category"], "Food");
        assert_eq!(body["expense"]["description"], "Lunch");
        assert_eq!(body["expense"]["date"], "2024-01-05");
    }

    #[tokio::test]
    async fn rejects_invalid_changes() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;
        let expense = create(&app.server, &alice).await;
        let id = expense["_id"].as_i64().unwrap();

        let response = app
            .server
            .put(&format_endpoint(endpoints::EXPENSE, id))
            .add_cookie(alice)
            .json(&json!({ "date": "2999-01-01" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "errors": [{ "field": "date", "message": "Expense date cannot be in the future" }]
        }));
    }

    #[tokio::test]
    async fn other_users_expense_is_not_found() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;
        let bob = sign_up_user(&app.server, "bob").await;
        let expense = create(&app.server, &alice).await;
        let id = expense["_id"].as_i64().unwrap();

        let response = app
            .server
            .put(&format_endpoint(endpoints::EXPENSE, id))
            .add_cookie(bob)
            .json(&json!({ "amount": 0 }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "The requested resource could not be found." }));

        let list = app
            .server
            .get(endpoints::EXPENSES)
            .add_cookie(alice)
            .await
            .json::<Value>();
        assert_eq!(list[0]["amount"], 12.5);
    }

    #[tokio::test]
    async fn non_numeric_id_is_not_found() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;

        let response = app
            .server
            .put("/api/expenses/abc")
            .add_cookie(alice)
            .json(&json!({ "amount": 1 }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn replacing_media_file_deletes_old_one() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;
        let expense = create(&app.server, &alice).await;
        let id = expense["_id"].as_i64().unwrap();
        let endpoint = format_endpoint(endpoints::EXPENSE, id);

        let first = app
            .server
            .put(&endpoint)
            .add_cookie(alice.clone())
            .multipart(receipt_form("first.png", b"first"))
            .await
            .json::<Value>();
        let first_file = first["expense"]["mediaFile"].as_str().unwrap().to_owned();
        let first_path = app.state.media_store.dir().join(&first_file);
        assert!(first_path.exists());

        let second = app
            .server
            .put(&endpoint)
            .add_cookie(alice)
            .multipart(receipt_form("second.png", b"second"))
            .await;

        second.assert_status_ok();
        let second_file = second.json::<Value>()["expense"]["mediaFile"]
            .as_str()
            .unwrap()
            .to_owned();
        assert!(second_file.ends_with("-second.png"));
        assert!(!first_path.exists());
        assert_eq!(
            std::fs::read(app.state.media_store.dir().join(second_file)).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn failed_lookup_stores_no_file() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;

        let response = app
            .server
            .put(&format_endpoint(endpoints::EXPENSE, 404))
            .add_cookie(alice)
            .multipart(receipt_form("receipt.png", b"data"))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert!(!app.state.media_store.dir().exists());
    }
}
