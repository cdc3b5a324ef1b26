//! Data loading behind the `foodgram-manage` commands.

use std::{fs::File, io::Read, path::Path};

use sqlx::{Pool, Postgres};

use crate::{
    actions::{create_tag, get_or_create_ingredient},
    constants::DEFAULT_TAGS,
    error::Error,
    validators::validate_color,
};

#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Line {line}: expected `name,measurement_unit`")]
    InvalidRow { line: u64 },
    #[error("Tag {slug}: {info}")]
    InvalidTag { slug: String, info: String },
    #[error("Database error: {0}")]
    Database(#[from] Error),
}

/// How many records a load created and how many already existed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub created: usize,
    pub existing: usize,
}

impl LoadReport {
    fn count(&mut self, created: bool) {
        if created {
            self.created += 1;
        } else {
            self.existing += 1;
        }
    }
}

/// Reads headerless `name,measurement_unit` rows.
pub fn parse_ingredients_csv<R: Read>(reader: R) -> Result<Vec<(String, String)>, ManagementError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        if record.iter().all(str::is_empty) {
            continue;
        }
        match (record.get(0), record.get(1)) {
            (Some(name), Some(unit)) if !name.is_empty() && !unit.is_empty() => {
                rows.push((name.to_string(), unit.to_string()))
            }
            _ => return Err(ManagementError::InvalidRow { line }),
        }
    }

    Ok(rows)
}

/// Imports ingredients from a CSV file. Rows already present are skipped, so
/// the import can be repeated.
pub async fn load_ingredients(
    pool: &Pool<Postgres>,
    path: &Path,
) -> Result<LoadReport, ManagementError> {
    let file = File::open(path).map_err(|source| ManagementError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let rows = parse_ingredients_csv(file)?;

    let mut report = LoadReport::default();
    for (name, unit) in rows {
        report.count(get_or_create_ingredient(pool, &name, &unit).await?);
    }

    log::info!(
        "Loaded ingredients from {}: {} created, {} already present",
        path.display(),
        report.created,
        report.existing
    );
    Ok(report)
}

/// Seeds the default tags, skipping any whose name or slug is taken.
pub async fn load_tags(pool: &Pool<Postgres>) -> Result<LoadReport, ManagementError> {
    let mut report = LoadReport::default();

    for (name, color, slug) in DEFAULT_TAGS {
        validate_color(color).map_err(|info| ManagementError::InvalidTag {
            slug: slug.to_string(),
            info,
        })?;
        report.count(create_tag(pool, name, color, slug).await?);
    }

    log::info!(
        "Seeded tags: {} created, {} already present",
        report.created,
        report.existing
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_trims_fields() {
        let rows = parse_ingredients_csv("salt, g\n\"flour, wheat\",g\n\nmilk,ml\n".as_bytes())
            .unwrap();

        assert_eq!(
            rows,
            vec![
                (String::from("salt"), String::from("g")),
                (String::from("flour, wheat"), String::from("g")),
                (String::from("milk"), String::from("ml")),
            ]
        );
    }

    #[test]
    fn rows_without_unit_are_rejected() {
        let error = parse_ingredients_csv("salt,g\npepper\n".as_bytes()).unwrap_err();
        assert!(matches!(error, ManagementError::InvalidRow { line: 2 }));
    }

    #[test]
    fn bundled_ingredient_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(crate::INGREDIENTS_CSV_PATH);
        let rows = parse_ingredients_csv(File::open(path).unwrap()).unwrap();
        assert!(!rows.is_empty());
    }

    #[test]
    fn default_tags_have_valid_colors() {
        for (_, color, _) in DEFAULT_TAGS {
            assert!(validate_color(color).is_ok());
        }
    }

    #[test]
    fn report_counts_created_and_existing() {
        let mut report = LoadReport::default();
        report.count(true);
        report.count(false);
        report.count(false);
        assert_eq!(
            report,
            LoadReport {
                created: 1,
                existing: 2
            }
        );
    }
}
