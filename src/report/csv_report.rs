use crate::{
    Error,
    expense::{Expense, date_format::DATE_FORMAT},
};

const HEADER: [&str; 5] = ["Date", "Category", "Amount", "Description", "Payment Method"];

/// Write `expenses` as CSV, one row per expense in the order given.
///
/// # Errors
///
/// Returns an [Error::ReportError] if a row could not be written.
pub fn render_csv(expenses: &[Expense]) -> Result<Vec<u8>, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER).map_err(report_error)?;

    for expense in expenses {
        let date = expense
            .date
            .format(DATE_FORMAT)
            .map_err(|error| Error::ReportError(error.to_string()))?;

        writer
            .write_record([
                date.as_str(),
                expense.category.as_str(),
                expense.amount.to_string().as_str(),
                expense.description.as_deref().unwrap_or("N/A"),
                expense.payment_method.as_deref().unwrap_or_default(),
            ])
            .map_err(report_error)?;
    }

    writer
        .into_inner()
        .map_err(|error| Error::ReportError(error.to_string()))
}

fn report_error(error: csv::Error) -> Error {
    Error::ReportError(error.to_string())
}
