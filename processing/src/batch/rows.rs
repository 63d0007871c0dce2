use csv::{Position, ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::batch::BatchError;
use crate::model::{BeneficiaryRecord, RawAge, RawBeneficiaryRecord, RowError, RowErrorKind};

const BANK_ACCOUNT_HEADERS: &[&str] = &["bankaccount", "account", "accountnumber", "bankaccountnumber"];
const MOBILE_HEADERS: &[&str] = &["mobile", "mobilenumber", "phone", "phonenumber"];
const AGE_HEADERS: &[&str] = &["age"];
const SCHEME_HEADERS: &[&str] = &["schemeid", "scheme"];

/// A data row of the uploaded file, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub line: u64,
    pub raw: RawBeneficiaryRecord,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    bank_account: usize,
    mobile: usize,
    age: usize,
    scheme_id: Option<usize>,
}

fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| aliases.contains(&h.as_str()))
}

/// Physical line of a record start, counted from the byte offset so CRLF and
/// LF files agree. The header is line 1.
fn line_at(bytes: &[u8], position: Option<&Position>, fallback: u64) -> u64 {
    match position {
        Some(position) => {
            let end = usize::try_from(position.byte()).map_or(bytes.len(), |b| b.min(bytes.len()));
            bytes[..end].iter().filter(|b| **b == b'\n').count() as u64 + 1
        }
        None => fallback,
    }
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, BatchError> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let bank_account = find_column(&normalized, BANK_ACCOUNT_HEADERS);
        let mobile = find_column(&normalized, MOBILE_HEADERS);
        let age = find_column(&normalized, AGE_HEADERS);

        match (bank_account, mobile, age) {
            (Some(bank_account), Some(mobile), Some(age)) => Ok(Self {
                bank_account,
                mobile,
                age,
                scheme_id: find_column(&normalized, SCHEME_HEADERS),
            }),
            _ => {
                let missing = [("bankAccount", bank_account), ("mobile", mobile), ("age", age)]
                    .into_iter()
                    .filter(|(_, column)| column.is_none())
                    .map(|(name, _)| name)
                    .collect();
                Err(BatchError::MissingColumns(missing))
            }
        }
    }

    fn extract(&self, record: &StringRecord) -> RawBeneficiaryRecord {
        let field = |index: usize| {
            record
                .get(index)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        RawBeneficiaryRecord {
            bank_account: field(self.bank_account),
            mobile: field(self.mobile),
            age: field(self.age).map(RawAge::Text),
            scheme_id: self.scheme_id.and_then(field),
        }
    }
}

/// Reads a headered CSV into raw rows. Unreadable rows come back as row
/// errors; only an unusable header fails the whole file. Rows whose cells
/// are all blank are skipped.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<Result<ParsedRow, RowError>>, BatchError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = reader.headers().map_err(|e| BatchError::Csv(e.to_string()))?.clone();
    let columns = Columns::resolve(&headers)?;
    debug!(?columns, "Resolved CSV columns");

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        match result {
            Ok(record) => {
                if record.iter().all(str::is_empty) {
                    continue;
                }
                let line = line_at(bytes, record.position(), fallback_line);
                rows.push(Ok(ParsedRow {
                    line,
                    raw: columns.extract(&record),
                }));
            }
            Err(e) => {
                let line = line_at(bytes, e.position(), fallback_line);
                rows.push(Err(RowError {
                    line,
                    kind: RowErrorKind::Validation,
                    message: format!("Unreadable row: {}", e),
                }));
            }
        }
    }
    Ok(rows)
}

/// Parses and validates every row, splitting valid records from row errors.
pub fn validated_rows(bytes: &[u8]) -> Result<(Vec<(u64, BeneficiaryRecord)>, Vec<RowError>), BatchError> {
    let mut valid = Vec::new();
    let mut errors = Vec::new();
    for row in parse_rows(bytes)? {
        match row {
            Ok(ParsedRow { line, raw }) => match raw.validate() {
                Ok(record) => valid.push((line, record)),
                Err(e) => errors.push(RowError {
                    line,
                    kind: RowErrorKind::Validation,
                    message: e.to_string(),
                }),
            },
            Err(e) => errors.push(e),
        }
    }
    Ok((valid, errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_aliases_are_recognised() {
        let csv = "\u{feff}Bank_Account,Mobile Number,AGE,scheme\n123456,9876543210,45,PM-KISAN\n";
        let rows = parse_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.line, 2);
        assert_eq!(row.raw.bank_account.as_deref(), Some("123456"));
        assert_eq!(row.raw.mobile.as_deref(), Some("9876543210"));
        assert_eq!(row.raw.age, Some(RawAge::Text("45".to_string())));
        assert_eq!(row.raw.scheme_id.as_deref(), Some("PM-KISAN"));
    }

    #[test]
    fn columns_can_come_in_any_order() {
        let csv = "age,mobile,account\n30,900,111\n";
        let (valid, errors) = validated_rows(csv.as_bytes()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(valid[0].1.bank_account(), "111");
        assert_eq!(valid[0].1.age(), 30);
    }

    #[test]
    fn missing_required_columns_fail_the_file() {
        let err = parse_rows(b"account,age\n1,2\n").unwrap_err();
        assert!(matches!(err, BatchError::MissingColumns(ref cols) if cols == &vec!["mobile"]));

        let err = parse_rows(b"").unwrap_err();
        assert!(matches!(err, BatchError::MissingColumns(ref cols) if cols.len() == 3));
    }

    #[test]
    fn malformed_rows_are_reported_with_line_numbers() {
        let csv = "bankAccount,mobile,age\n111,900,30\n,901,40\n222,902,abc\n,,\n333\n444,903,50\n";
        let (valid, errors) = validated_rows(csv.as_bytes()).unwrap();

        let lines: Vec<u64> = valid.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![2, 7]);

        let error_lines: Vec<u64> = errors.iter().map(|e| e.line).collect();
        assert_eq!(error_lines, vec![3, 4, 6]);
        assert!(errors[0].message.contains("bankAccount"));
        assert!(errors[1].message.contains("Invalid age"));
        assert!(errors[2].message.contains("mobile"));
        assert!(errors.iter().all(|e| e.kind == RowErrorKind::Validation));

        let (valid, errors) = validated_rows(csv.replace('\n', "\r\n").as_bytes()).unwrap();
        assert_eq!(valid.iter().map(|(line, _)| *line).collect::<Vec<_>>(), vec![2, 7]);
        assert_eq!(errors.iter().map(|e| e.line).collect::<Vec<_>>(), vec![3, 4, 6]);
    }

    #[test]
    fn quoted_newlines_keep_physical_line_numbers() {
        let csv = "bankAccount,mobile,age\r\n\"11\r\n1\",900,30\r\n222,,40\r\n";
        let (valid, errors) = validated_rows(csv.as_bytes()).unwrap();
        assert_eq!(valid[0].0, 2);
        assert_eq!(errors[0].line, 4);
    }
}
