use sqlx::{Pool, Postgres};

use crate::error::{ApiError, QueryError};

/// Splits one CSV line into fields, honouring double-quoted fields with
/// doubled-quote escapes. Enough for the seed files; not a general parser.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}

fn parse_records(data: &str) -> Result<Vec<(String, String)>, ApiError> {
    let mut records = Vec::new();
    for (n, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_csv_line(line);
        match fields.as_slice() {
            [first, second] if !first.is_empty() && !second.is_empty() => {
                records.push((first.to_owned(), second.to_owned()));
            }
            _ => {
                return Err(ApiError::validation(
                    "file",
                    &format!("Expected two fields on line {}", n + 1),
                ));
            }
        }
    }
    Ok(records)
}

/// Seeds the ingredient table from "name,measurement_unit" lines, skipping
/// rows that already exist. Returns the number of inserted rows.
pub async fn import_ingredients(data: &str, pool: &Pool<Postgres>) -> Result<u64, ApiError> {
    let records = parse_records(data)?;

    let mut inserted = 0;
    for (name, unit) in records {
        let result = sqlx::query(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(name)
        .bind(unit)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;
        inserted += result.rows_affected();
    }

    log::info!("Imported {inserted} ingredients");
    Ok(inserted)
}

/// Seeds the tag table from "name,slug" lines.
pub async fn import_tags(data: &str, pool: &Pool<Postgres>) -> Result<u64, ApiError> {
    let records = parse_records(data)?;

    let mut inserted = 0;
    for (name, slug) in records {
        let result =
            sqlx::query("INSERT INTO tags (name, slug) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(name)
                .bind(slug)
                .execute(pool)
                .await
                .map_err(|e| QueryError::from(e).into())?;
        inserted += result.rows_affected();
    }

    log::info!("Imported {inserted} tags");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields() {
        assert_eq!(parse_csv_line("salt,g"), vec!["salt", "g"]);
    }

    #[test]
    fn quoted_field_with_comma() {
        assert_eq!(
            parse_csv_line("\"salt, coarse\",g"),
            vec!["salt, coarse", "g"]
        );
    }

    #[test]
    fn doubled_quotes_are_literal() {
        assert_eq!(parse_csv_line("\"say \"\"hi\"\"\",x"), vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn records_need_two_non_empty_fields() {
        assert!(parse_records("salt,g\nsugar,kg\n").is_ok());
        assert!(parse_records("salt\n").is_err());
        assert!(parse_records("salt,\n").is_err());
        assert_eq!(parse_records("\n\nsalt,g\n").unwrap().len(), 1);
    }
}
