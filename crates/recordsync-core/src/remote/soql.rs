//! SOQL text for keyset recency scans.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::modules::repository::ScanCursor;

/// SOQL datetime literals are unquoted UTC timestamps.
pub fn datetime_literal(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Quote a string literal, escaping backslashes and single quotes.
pub fn string_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

/// `Id`, the modstamp field, then `fields` without duplicates.
pub fn select_list<'a>(modstamp_field: &'a str, fields: &'a [String]) -> Vec<&'a str> {
    let mut columns = vec!["Id", modstamp_field];
    for field in fields {
        if !columns.contains(&field.as_str()) {
            columns.push(field);
        }
    }
    columns
}

/// Records with `modstamp < until` past `cursor`, ordered by `(modstamp, Id)`.
pub fn recency_query(
    object: &str,
    modstamp_field: &str,
    fields: &[String],
    cursor: &ScanCursor<String>,
    until: DateTime<Utc>,
    limit: usize,
) -> String {
    let mut conditions = vec![format!("{modstamp_field} < {}", datetime_literal(until))];
    match cursor {
        ScanCursor::Start(None) => {},
        ScanCursor::Start(Some(since)) => {
            conditions.push(format!("{modstamp_field} >= {}", datetime_literal(*since)));
        },
        ScanCursor::After { timestamp, id } => {
            let at = datetime_literal(*timestamp);
            conditions.push(format!(
                "({modstamp_field} > {at} OR ({modstamp_field} = {at} AND Id > {}))",
                string_literal(id)
            ));
        },
    }

    format!(
        "SELECT {} FROM {object} WHERE {} ORDER BY {modstamp_field} ASC, Id ASC LIMIT {limit}",
        select_list(modstamp_field, fields).join(", "),
        conditions.join(" AND ")
    )
}
