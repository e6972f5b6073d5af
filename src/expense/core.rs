//! Defines the core data models and database queries for expenses.

use rusqlite::{Connection, Row, named_params};
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::{Error, auth::UserID, database_id::ExpenseId};

// ============================================================================
// MODELS
// ============================================================================

/// Money a user spent on something.
///
/// To create a new `Expense`, use [Expense::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// The ID of the expense.
    #[serde(rename = "_id")]
    pub id: ExpenseId,
    /// The user who recorded the expense.
    pub user_id: UserID,
    /// When the money was spent.
    #[serde(with = "date_format")]
    pub date: Date,
    /// What kind of thing the money was spent on, e.g. "Groceries".
    pub category: String,
    /// How much was spent.
    pub amount: f64,
    /// A free text note about the expense.
    pub description: Option<String>,
    /// How the expense was paid for, e.g. "Card".
    pub payment_method: Option<String>,
    /// The stored name of an attached receipt, see [crate::media::MediaStore].
    pub media_file: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Expense {
    /// Create a new expense.
    ///
    /// Shortcut for [ExpenseBuilder] for discoverability.
    pub fn build(user_id: UserID, date: Date, category: &str, amount: f64) -> ExpenseBuilder {
        ExpenseBuilder {
            user_id,
            date,
            category: category.to_owned(),
            amount,
            description: None,
            payment_method: None,
            media_file: None,
        }
    }
}

/// A builder for creating [Expense] instances.
///
/// Required fields are given to [Expense::build], the optional ones default to `None`.
#[derive(Debug, PartialEq, Clone)]
pub struct ExpenseBuilder {
    pub user_id: UserID,
    pub date: Date,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub media_file: Option<String>,
}

impl ExpenseBuilder {
    /// Set the description for the expense.
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Set the payment method for the expense.
    pub fn payment_method(mut self, payment_method: Option<String>) -> Self {
        self.payment_method = payment_method;
        self
    }

    /// Set the stored media file name for the expense.
    pub fn media_file(mut self, media_file: Option<String>) -> Self {
        self.media_file = media_file;
        self
    }
}

/// The fields to overwrite when updating an expense.
///
/// Fields that are `None` keep their stored value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExpenseChanges {
    pub date: Option<Date>,
    pub category: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub media_file: Option<String>,
}

/// Which of a user's expenses to list. Every bound is optional and inclusive.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExpenseFilter {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub category: Option<String>,
}

pub(crate) mod date_format {
    //! Serializes a [time::Date] as "YYYY-MM-DD".
    use serde::Serializer;
    use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

    pub(crate) const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = date
            .format(DATE_FORMAT)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const EXPENSE_COLUMNS: &str = "id, user_id, date, category, amount, description, payment_method, \
    media_file, created_at, updated_at";

/// Create a new expense in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the owner does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_expense(builder: ExpenseBuilder, connection: &Connection) -> Result<Expense, Error> {
    let now = OffsetDateTime::now_utc();

    let expense = connection
        .prepare(&format!(
            "INSERT INTO expense (user_id, date, category, amount, description, payment_method, media_file, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_row(
            (
                builder.user_id.as_i64(),
                builder.date,
                builder.category,
                builder.amount,
                builder.description,
                builder.payment_method,
                builder.media_file,
                now,
            ),
            map_expense_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })?;

    Ok(expense)
}

/// Retrieve the expense `id` owned by `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an expense owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_expense(id: ExpenseId, owner: UserID, connection: &Connection) -> Result<Expense, Error> {
    let expense = connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense WHERE id = :id AND user_id = :user_id"
        ))?
        .query_one(
            named_params! { ":id": id, ":user_id": owner.as_i64() },
            map_expense_row,
        )?;

    Ok(expense)
}

/// List the expenses owned by `owner` that match `filter`, newest first.
///
/// Expenses on the same date are ordered by ID, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn list_expenses(
    owner: UserID,
    filter: &ExpenseFilter,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    let mut statement = connection.prepare(&format!(
        "SELECT {EXPENSE_COLUMNS} FROM expense
         WHERE user_id = :user_id
           AND (:start_date IS NULL OR date >= :start_date)
           AND (:end_date IS NULL OR date <= :end_date)
           AND (:category IS NULL OR category = :category)
         ORDER BY date DESC, id DESC"
    ))?;

    let expenses = statement
        .query_map(
            named_params! {
                ":user_id": owner.as_i64(),
                ":start_date": filter.start_date,
                ":end_date": filter.end_date,
                ":category": filter.category,
            },
            map_expense_row,
        )?
        .map(|row| row.map_err(Error::from))
        .collect();

    expenses
}

/// Overwrite the fields set in `changes` on the expense `id` owned by `owner`.
///
/// The update time is always refreshed.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an expense owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_expense(
    id: ExpenseId,
    owner: UserID,
    changes: ExpenseChanges,
    connection: &Connection,
) -> Result<Expense, Error> {
    let expense = connection
        .prepare(&format!(
            "UPDATE expense SET
                date = COALESCE(:date, date),
                category = COALESCE(:category, category),
                amount = COALESCE(:amount, amount),
                description = COALESCE(:description, description),
                payment_method = COALESCE(:payment_method, payment_method),
                media_file = COALESCE(:media_file, media_file),
                updated_at = :updated_at
             WHERE id = :id AND user_id = :user_id
             RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_one(
            named_params! {
                ":date": changes.date,
                ":category": changes.category,
                ":amount": changes.amount,
                ":description": changes.description,
                ":payment_method": changes.payment_method,
                ":media_file": changes.media_file,
                ":updated_at": OffsetDateTime::now_utc(),
                ":id": id,
                ":user_id": owner.as_i64(),
            },
            map_expense_row,
        )?;

    Ok(expense)
}

/// Remove the media file reference from the expense `id` owned by `owner`.
///
/// The stored file itself is left for the caller to delete.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an expense owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn clear_media_file(
    id: ExpenseId,
    owner: UserID,
    connection: &Connection,
) -> Result<Expense, Error> {
    let expense = connection
        .prepare(&format!(
            "UPDATE expense SET media_file = NULL, updated_at = :updated_at
             WHERE id = :id AND user_id = :user_id
             RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_one(
            named_params! {
                ":updated_at": OffsetDateTime::now_utc(),
                ":id": id,
                ":user_id": owner.as_i64(),
            },
            map_expense_row,
        )?;

    Ok(expense)
}

/// Delete the expense `id` owned by `owner`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an expense owned by `owner`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_expense(id: ExpenseId, owner: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM expense WHERE id = :id AND user_id = :user_id",
        named_params! { ":id": id, ":user_id": owner.as_i64() },
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Create the expense table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT,
                payment_method TEXT,
                media_file TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Every query is scoped to one user and most filter or sort by date.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_expense_user_date ON expense(user_id, date);",
        (),
    )?;

    Ok(())
}

/// Map a database row to an Expense.
pub fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    Ok(Expense {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        date: row.get(2)?,
        category: row.get(3)?,
        amount: row.get(4)?,
        description: row.get(5)?,
        payment_method: row.get(6)?,
        media_file: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use serde_json::json;
    use time::macros::{date, datetime};

    use crate::{
        Error,
        auth::{NewUser, PasswordHash, UserID, create_user},
        db::initialize,
        expense::{
            Expense, ExpenseChanges, ExpenseFilter, clear_media_file, create_expense,
            delete_expense, get_expense, list_expenses, update_expense,
        },
    };

    fn get_test_connection() -> (Connection, UserID, UserID) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let create = |username: &str| {
            create_user(
                NewUser {
                    full_name: username.to_owned(),
                    username: username.to_owned(),
                    password_hash: Some(PasswordHash::new_unchecked("hunter2")),
                    ..Default::default()
                },
                &conn,
            )
            .unwrap()
            .id
        };
        let alice = create("alice");
        let bob = create("bob");

        (conn, alice, bob)
    }

    #[test]
    fn create_succeeds() {
        let (conn, alice, _) = get_test_connection();

        let expense = create_expense(
            Expense::build(alice, date!(2024 - 01 - 05), "Food", 12.5)
                .description(Some("Lunch".to_owned()))
                .payment_method(Some("Card".to_owned())),
            &conn,
        )
        .unwrap();

        assert!(expense.id > 0);
        assert_eq!(expense.user_id, alice);
        assert_eq!(expense.date, date!(2024 - 01 - 05));
        assert_eq!(expense.category, "Food");
        assert_eq!(expense.amount, 12.5);
        assert_eq!(expense.description.as_deref(), Some("Lunch"));
        assert_eq!(expense.payment_method.as_deref(), Some("Card"));
        assert_eq!(expense.media_file, None);
        assert_eq!(expense.created_at, expense.updated_at);
    }

    #[test]
    fn create_fails_for_unknown_owner() {
        let (conn, _, _) = get_test_connection();

        let result = create_expense(
            Expense::build(UserID::new(999), date!(2024 - 01 - 05), "Food", 1.0),
            &conn,
        );

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn get_is_scoped_to_owner() {
        let (conn, alice, bob) = get_test_connection();
        let expense = create_expense(
            Expense::build(alice, date!(2024 - 01 - 05), "Food", 12.5),
            &conn,
        )
        .unwrap();

        assert_eq!(get_expense(expense.id, alice, &conn), Ok(expense.clone()));
        assert_eq!(get_expense(expense.id, bob, &conn), Err(Error::NotFound));
    }

    #[test]
    fn list_orders_by_date_then_id_descending() {
        let (conn, alice, bob) = get_test_connection();
        let build = |date, category: &str| Expense::build(alice, date, category, 1.0);
        let older = create_expense(build(date!(2024 - 01 - 01), "Food"), &conn).unwrap();
        let first = create_expense(build(date!(2024 - 01 - 03), "Food"), &conn).unwrap();
        let second = create_expense(build(date!(2024 - 01 - 03), "Rent"), &conn).unwrap();
        create_expense(
            Expense::build(bob, date!(2024 - 01 - 02), "Food", 1.0),
            &conn,
        )
        .unwrap();

        let expenses = list_expenses(alice, &ExpenseFilter::default(), &conn).unwrap();

        let ids: Vec<_> = expenses.iter().map(|expense| expense.id).collect();
        assert_eq!(ids, [second.id, first.id, older.id]);
    }

    #[test]
    fn list_filters_by_inclusive_date_range_and_category() {
        let (conn, alice, _) = get_test_connection();
        for (date, category) in [
            (date!(2024 - 01 - 01), "Food"),
            (date!(2024 - 01 - 10), "Food"),
            (date!(2024 - 01 - 15), "Rent"),
            (date!(2024 - 01 - 20), "Food"),
            (date!(2024 - 01 - 31), "Food"),
        ] {
            create_expense(Expense::build(alice, date, category, 1.0), &conn).unwrap();
        }

        let in_range = list_expenses(
            alice,
            &ExpenseFilter {
                start_date: Some(date!(2024 - 01 - 10)),
                end_date: Some(date!(2024 - 01 - 20)),
                category: None,
            },
            &conn,
        )
        .unwrap();
        let food_since = list_expenses(
            alice,
            &ExpenseFilter {
                start_date: Some(date!(2024 - 01 - 10)),
                end_date: None,
                category: Some("Food".to_owned()),
            },
            &conn,
        )
        .unwrap();

        let dates = |expenses: &[Expense]| expenses.iter().map(|e| e.date).collect::<Vec<_>>();
        assert_eq!(
            dates(&in_range),
            [date!(2024 - 01 - 20), date!(2024 - 01 - 15), date!(2024 - 01 - 10)]
        );
        assert_eq!(
            dates(&food_since),
            [date!(2024 - 01 - 31), date!(2024 - 01 - 20), date!(2024 - 01 - 10)]
        );
    }

    #[test]
    fn update_overwrites_only_given_fields() {
        let (conn, alice, _) = get_test_connection();
        let expense = create_expense(
            Expense::build(alice, date!(2024 - 01 - 05), "Food", 12.5)
                .description(Some("Lunch".to_owned()))
                .payment_method(Some("Card".to_owned())),
            &conn,
        )
        .unwrap();

        let updated = update_expense(
            expense.id,
            alice,
            ExpenseChanges {
                amount: Some(20.0),
                ..Default::default()
            },
            &conn,
        )
        .unwrap();

        assert_eq!(updated.amount, 20.0);
        assert_eq!(updated.date, expense.date);
        assert_eq!(updated.category, expense.category);
        assert_eq!(updated.description, expense.description);
        assert_eq!(updated.payment_method, expense.payment_method);
        assert!(updated.updated_at >= expense.updated_at);
        assert_eq!(updated.created_at, expense.created_at);
    }

    #[test]
    fn update_of_other_users_expense_is_not_found() {
        let (conn, alice, bob) = get_test_connection();
        let expense = create_expense(
            Expense::build(alice, date!(2024 - 01 - 05), "Food", 12.5),
            &conn,
        )
        .unwrap();

        let result = update_expense(
            expense.id,
            bob,
            ExpenseChanges {
                amount: Some(0.0),
                ..Default::default()
            },
            &conn,
        );

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(get_expense(expense.id, alice, &conn).unwrap().amount, 12.5);
    }

    #[test]
    fn clear_media_file_keeps_record() {
        let (conn, alice, _) = get_test_connection();
        let expense = create_expense(
            Expense::build(alice, date!(2024 - 01 - 05), "Food", 12.5)
                .media_file(Some("1-123456789-receipt.png".to_owned())),
            &conn,
        )
        .unwrap();

        let cleared = clear_media_file(expense.id, alice, &conn).unwrap();

        assert_eq!(cleared.media_file, None);
        assert_eq!(cleared.amount, expense.amount);
    }

    #[test]
    fn delete_is_scoped_to_owner() {
        let (conn, alice, bob) = get_test_connection();
        let expense = create_expense(
            Expense::build(alice, date!(2024 - 01 - 05), "Food", 12.5),
            &conn,
        )
        .unwrap();

        assert_eq!(delete_expense(expense.id, bob, &conn), Err(Error::NotFound));
        assert_eq!(delete_expense(expense.id, alice, &conn), Ok(()));
        assert_eq!(get_expense(expense.id, alice, &conn), Err(Error::NotFound));
        assert_eq!(delete_expense(expense.id, alice, &conn), Err(Error::NotFound));
    }

    #[test]
    fn serializes_with_client_field_names() {
        let expense = Expense {
            id: 3,
            user_id: UserID::new(1),
            date: date!(2024 - 01 - 05),
            category: "Food".to_owned(),
            amount: 12.0,
            description: None,
            payment_method: Some("Cash".to_owned()),
            media_file: None,
            created_at: datetime!(2024-01-05 10:00:00 UTC),
            updated_at: datetime!(2024-01-06 10:00:00 UTC),
        };

        assert_eq!(
            serde_json::to_value(&expense).unwrap(),
            json!({
                "_id": 3,
                "userId": 1,
                "date": "2024-01-05",
                "category": "Food",
                "amount": 12.0,
                "description": null,
                "paymentMethod": "Cash",
                "mediaFile": null,
                "createdAt": "2024-01-05T10:00:00Z",
                "updatedAt": "2024-01-06T10:00:00Z",
            })
        );
    }
}
