use axum::{
    Extension, Json,
    extract::{Query, State, rejection::QueryRejection},
};

use crate::{
    Error,
    auth::UserID,
    db::acquire,
    expense::{Expense, ExpenseQuery, ExpenseState, list_expenses},
};

/// A route handler for listing the caller's expenses, newest first.
///
/// The query parameters `startDate`, `endDate` and `category` narrow the list down.
pub async fn list_expenses_endpoint(
    State(state): State<ExpenseState>,
    Extension(user_id): Extension<UserID>,
    query: Result<Query<ExpenseQuery>, QueryRejection>,
) -> Result<Json<Vec<Expense>>, Error> {
    let Query(query) = query?;
    let filter = query.into_filter()?;

    let connection = acquire(&state.db_connection)?;
    let expenses = list_expenses(user_id, &filter, &connection)?;

    Ok(Json(expenses))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_extra::extract::cookie::Cookie;
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{
        endpoints,
        test_utils::{sign_up_user, test_app},
    };

    async fn create(server: &TestServer, cookie: &Cookie<'static>, date: &str, category: &str) {
        server
            .post(endpoints::EXPENSES)
            .add_cookie(cookie.clone())
            .json(&json!({
                "date": date,
                "category": category,
                "amount": 10,
                "paymentMethod": "Cash",
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    fn dates(body: &Value) -> Vec<&str> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|expense| expense["date"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn lists_only_own_expenses_newest_first() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;
        let bob = sign_up_user(&app.server, "bob").await;
        create(&app.server, &alice, "2024-01-01", "Food").await;
        create(&app.server, &alice, "2024-03-01", "Rent").await;
        create(&app.server, &bob, "2024-02-01", "Food").await;

        let response = app
            .server
            .get(endpoints::EXPENSES)
            .add_cookie(alice)
            .await;

        response.assert_status_ok();
        assert_eq!(dates(&response.json()), ["2024-03-01", "2024-01-01"]);
    }

    #[tokio::test]
    async fn filters_by_date_range_and_category() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;
        for (date, category) in [
            ("2024-01-01", "Food"),
            ("2024-01-10", "Food"),
            ("2024-01-15", "Rent"),
            ("2024-01-20", "Food"),
        ] {
            create(&app.server, &alice, date, category).await;
        }

        let response = app
            .server
            .get(endpoints::EXPENSES)
            .add_query_param("startDate", "2024-01-10")
            .add_query_param("endDate", "2024-01-20")
            .add_query_param("category", "Food")
            .add_cookie(alice)
            .await;

        response.assert_status_ok();
        assert_eq!(dates(&response.json()), ["2024-01-20", "2024-01-10"]);
    }

    #[tokio::test]
    async fn empty_list_is_ok() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;

        let response = app
            .server
            .get(endpoints::EXPENSES)
            .add_cookie(alice)
            .await;

        response.assert_status_ok();
        response.assert_json(&json!([]));
    }

    #[tokio::test]
    async fn rejects_malformed_date_filter() {
        let app = test_app();
        let alice = sign_up_user(&app.server, "alice").await;

        let response = app
            .server
            .get(endpoints::EXPENSES)
            .add_query_param("startDate", "last week")
            .add_cookie(alice)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({
            "errors": [{ "field": "startDate", "message": "Invalid date format, use YYYY-MM-DD" }]
        }));
    }

    #[tokio::test]
    async fn requires_auth_cookie() {
        let app = test_app();

        app.server
            .get(endpoints::EXPENSES)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
