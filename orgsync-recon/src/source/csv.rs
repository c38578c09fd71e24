//! CSV candidate source
//!
//! Reads the column layouts the registry's upstream exports actually use;
//! header names are matched case-insensitively against a small alias table
//! (IRS extract columns like FILEREIN alongside the friendly names).

use std::path::{Path, PathBuf};

use crate::error::{ReconError, ReconResult};
use crate::models::CandidateRecord;
use crate::source::CandidateSource;

const EIN_ALIASES: &[&str] = &["EIN", "FILEREIN", "EIN_CHARITY_NUMBER"];
const NAME_ALIASES: &[&str] = &["NAME", "FILERNAME1", "ORGANIZATION NAME"];
const WEBSITE_ALIASES: &[&str] = &["WEBSITE", "WEBSITSITEIT"];
const STREET_ALIASES: &[&str] = &["STREET", "ADDRESS", "FILERUS1"];
const CITY_ALIASES: &[&str] = &["CITY", "FILERUSCITY"];
const STATE_ALIASES: &[&str] = &["STATE", "FILERUSSTATE"];
const ZIP_ALIASES: &[&str] = &["ZIP", "ZIP CODE", "POSTAL CODE", "FILERUSZIP"];
const PHONE_ALIASES: &[&str] = &["PHONE", "PHONE NUMBER"];
const REVENUE_ALIASES: &[&str] = &["ANNUAL_REVENUE", "REVENUE", "TOTREVCURYEA"];
const PUBLIC_FACING_ALIASES: &[&str] =
    &["PUBLIC FACING", "PUBLIC-FACING", "PUBLIC_FACING", "CLASSIFICATION"];
const TAX_STATUS_ALIASES: &[&str] = &["TAX_STATUS", "TAX STATUS"];
const ORG_TYPE_ALIASES: &[&str] = &["ORGANIZATION_TYPE", "ORGANIZATION TYPE"];

/// CSV-file-backed candidate source
pub struct CsvSource {
    path: PathBuf,
    name: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct Columns {
    ein: Option<usize>,
    name: Option<usize>,
    website: Option<usize>,
    street: Option<usize>,
    city: Option<usize>,
    state: Option<usize>,
    zip: Option<usize>,
    phone: Option<usize>,
    revenue: Option<usize>,
    public_facing: Option<usize>,
    tax_status: Option<usize>,
    organization_type: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Columns {
        let mut columns = Columns::default();
        for (idx, header) in headers.iter().enumerate() {
            let key = header.trim().to_uppercase();
            let slot = if EIN_ALIASES.contains(&key.as_str()) {
                &mut columns.ein
            } else if NAME_ALIASES.contains(&key.as_str()) {
                &mut columns.name
            } else if WEBSITE_ALIASES.contains(&key.as_str()) {
                &mut columns.website
            } else if STREET_ALIASES.contains(&key.as_str()) {
                &mut columns.street
            } else if CITY_ALIASES.contains(&key.as_str()) {
                &mut columns.city
            } else if STATE_ALIASES.contains(&key.as_str()) {
                &mut columns.state
            } else if ZIP_ALIASES.contains(&key.as_str()) {
                &mut columns.zip
            } else if PHONE_ALIASES.contains(&key.as_str()) {
                &mut columns.phone
            } else if REVENUE_ALIASES.contains(&key.as_str()) {
                &mut columns.revenue
            } else if PUBLIC_FACING_ALIASES.contains(&key.as_str()) {
                &mut columns.public_facing
            } else if TAX_STATUS_ALIASES.contains(&key.as_str()) {
                &mut columns.tax_status
            } else if ORG_TYPE_ALIASES.contains(&key.as_str()) {
                &mut columns.organization_type
            } else {
                continue;
            };
            // First matching column wins
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        columns
    }
}

impl CsvSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.display().to_string();
        Self { path, name }
    }
}

impl CandidateSource for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(
        &self,
    ) -> ReconResult<Box<dyn Iterator<Item = ReconResult<CandidateRecord>> + '_>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| ReconError::Source(format!("Open {}: {}", self.path.display(), e)))?;

        let headers = reader
            .headers()
            .map_err(|e| ReconError::Source(format!("Read headers: {}", e)))?;
        let columns = Columns::from_headers(headers);

        if columns.name.is_none() {
            return Err(ReconError::Source(format!(
                "{}: no recognizable name column",
                self.path.display()
            )));
        }

        Ok(Box::new(CsvIter {
            records: reader.into_records(),
            columns,
            row: 0,
        }))
    }
}

struct CsvIter {
    records: csv::StringRecordsIntoIter<std::fs::File>,
    columns: Columns,
    row: usize,
}

impl Iterator for CsvIter {
    type Item = ReconResult<CandidateRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let source_row = self.row;
        self.row += 1;

        Some(match record {
            Ok(record) => Ok(candidate_from_record(&record, &self.columns, source_row)),
            Err(e) => Err(ReconError::Source(format!("row {}: {}", source_row, e))),
        })
    }
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn candidate_from_record(
    record: &csv::StringRecord,
    columns: &Columns,
    source_row: usize,
) -> CandidateRecord {
    CandidateRecord {
        source_row,
        ein: field(record, columns.ein),
        name: field(record, columns.name).unwrap_or_default(),
        website: field(record, columns.website),
        street: field(record, columns.street),
        city: field(record, columns.city),
        state: field(record, columns.state),
        postal_code: field(record, columns.zip),
        phone: field(record, columns.phone),
        annual_revenue: field(record, columns.revenue).and_then(|v| parse_revenue(&v)),
        public_facing: field(record, columns.public_facing)
            .and_then(|v| parse_classification(&v)),
        tax_status: field(record, columns.tax_status),
        organization_type: field(record, columns.organization_type),
    }
}

/// Revenue columns sometimes carry float formatting ("1234567.0")
fn parse_revenue(raw: &str) -> Option<i64> {
    raw.parse::<f64>().ok().map(|v| v as i64)
}

/// Tri-state classification: TRUE/FALSE flags or the label forms older
/// exports used
fn parse_classification(raw: &str) -> Option<bool> {
    match raw.to_uppercase().as_str() {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => match raw.to_lowercase().as_str() {
            "public-facing" => Some(true),
            "internal corporate benefit trusts" => Some(false),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_friendly_headers() {
        let file = write_csv(
            "EIN,Name,Website,City,State,Zip,Annual_Revenue,Public Facing\n\
             12-3456789,Example Foundation,www.example.org,Springfield,IL,62704,1234567.0,TRUE\n",
        );
        let source = CsvSource::new(file.path());

        let rows: Vec<_> = source
            .candidates()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.ein.as_deref(), Some("12-3456789"));
        assert_eq!(row.name, "Example Foundation");
        assert_eq!(row.website.as_deref(), Some("www.example.org"));
        assert_eq!(row.city.as_deref(), Some("Springfield"));
        assert_eq!(row.annual_revenue, Some(1234567));
        assert_eq!(row.public_facing, Some(true));
    }

    #[test]
    fn test_reads_filing_extract_headers() {
        let file = write_csv(
            "FILEREIN,FILERNAME1,WEBSITSITEIT,FILERUSCITY,FILERUSSTATE,FILERUSZIP,TOTREVCURYEA\n\
             123456789,EXAMPLE FOUNDATION,N/A,SPRINGFIELD,IL,62704,500000\n",
        );
        let source = CsvSource::new(file.path());

        let rows: Vec<_> = source
            .candidates()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows[0].ein.as_deref(), Some("123456789"));
        assert_eq!(rows[0].name, "EXAMPLE FOUNDATION");
        // Placeholder survives here; normalization decides it is absent
        assert_eq!(rows[0].website.as_deref(), Some("N/A"));
        assert_eq!(rows[0].public_facing, None);
    }

    #[test]
    fn test_classification_labels_map_to_tri_state() {
        let file = write_csv(
            "Name,Classification\n\
             A,public-facing\n\
             B,Internal Corporate Benefit Trusts\n\
             C,\n\
             D,maybe\n",
        );
        let source = CsvSource::new(file.path());

        let rows: Vec<_> = source
            .candidates()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows[0].public_facing, Some(true));
        assert_eq!(rows[1].public_facing, Some(false));
        assert_eq!(rows[2].public_facing, None);
        assert_eq!(rows[3].public_facing, None);
    }

    #[test]
    fn test_restartable_from_beginning() {
        let file = write_csv("EIN,Name\n1,A\n2,B\n");
        let source = CsvSource::new(file.path());

        let first: Vec<_> = source.candidates().unwrap().map(|r| r.unwrap().name).collect();
        let second: Vec<_> = source.candidates().unwrap().map(|r| r.unwrap().name).collect();
        assert_eq!(first, vec!["A", "B"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_name_column_is_source_error() {
        let file = write_csv("EIN,Website\n123456789,example.org\n");
        let source = CsvSource::new(file.path());
        assert!(matches!(source.candidates(), Err(ReconError::Source(_))));
    }
}
