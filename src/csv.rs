use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::{Amount, Operation, Transaction, User, UserId};

/// Errors that can occur when reading operations or writing reports
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open input: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation type '{op_type}'")]
    UnrecognizedType { line: usize, op_type: String },

    #[error("line {line}: {op_type} missing {field}")]
    MissingField {
        line: usize,
        op_type: &'static str,
        field: &'static str,
    },

    #[error("failed to write output: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    account: UserId,
    counterparty: Option<UserId>,
    amount: Option<f64>,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserRow<'a> {
    id: &'a str,
    name: &'a str,
    balance: String,
}

#[derive(Debug, Serialize)]
struct TransactionRow<'a> {
    id: &'a str,
    source: &'a str,
    destination: &'a str,
    amount: String,
    state: &'static str,
}

impl InputRow {
    fn into_operation(self, line: usize) -> Result<Operation, CsvError> {
        let missing = |op_type, field| CsvError::MissingField {
            line,
            op_type,
            field,
        };
        match self.r#type.as_str() {
            "open" => Ok(Operation::Open {
                name: self.name.ok_or_else(|| missing("open", "name"))?,
                user: self.account,
            }),
            "credit" => Ok(Operation::Credit {
                amount: self
                    .amount
                    .map(Amount::from_float)
                    .ok_or_else(|| missing("credit", "amount"))?,
                user: self.account,
            }),
            "transfer" => Ok(Operation::Transfer {
                destination: self
                    .counterparty
                    .ok_or_else(|| missing("transfer", "counterparty"))?,
                amount: self
                    .amount
                    .map(Amount::from_float)
                    .ok_or_else(|| missing("transfer", "amount"))?,
                source: self.account,
            }),
            other => Err(CsvError::UnrecognizedType {
                line,
                op_type: other.to_string(),
            }),
        }
    }
}

/// Read operations from a csv file
pub fn read_operations(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Operation, CsvError>>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_operation(line)
        }))
}

/// Write users in csv format, sorted by id
pub fn write_users<'a>(
    out: impl io::Write,
    users: impl IntoIterator<Item = &'a User>,
) -> Result<(), CsvError> {
    let mut users: Vec<&User> = users.into_iter().collect();
    users.sort_by(|a, b| a.id.cmp(&b.id));

    let mut writer = csv::Writer::from_writer(out);
    for user in users {
        writer.serialize(UserRow {
            id: &user.id,
            name: &user.name,
            balance: user.balance.to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write transactions in csv format, in the given order
pub fn write_transactions<'a>(
    out: impl io::Write,
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);
    for tx in transactions {
        writer.serialize(TransactionRow {
            id: &tx.id,
            source: tx.source_id.as_deref().unwrap_or(""),
            destination: &tx.destination_id,
            amount: tx.amount.to_string(),
            state: tx.state.as_str(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionState;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,account,counterparty,amount,name\n";

    fn write_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file
    }

    fn read_all(file: &NamedTempFile) -> Vec<Result<Operation, CsvError>> {
        read_operations(file.path()).unwrap().collect()
    }

    #[test]
    fn read_open() {
        let file = write_csv("open,alice,,,Alice\n");
        let ops = read_all(&file);
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops.into_iter().next().unwrap().unwrap(),
            Operation::Open {
                user: "alice".to_string(),
                name: "Alice".to_string(),
            }
        );
    }

    #[test]
    fn read_credit_and_transfer() {
        let file = write_csv("credit,alice,,200,\ntransfer,alice,bob,100.10,\n");
        let ops: Vec<_> = read_all(&file).into_iter().map(Result::unwrap).collect();
        assert_eq!(
            ops,
            vec![
                Operation::Credit {
                    user: "alice".to_string(),
                    amount: Amount::from_float(200.0),
                },
                Operation::Transfer {
                    source: "alice".to_string(),
                    destination: "bob".to_string(),
                    amount: Amount::from_float(100.10),
                },
            ]
        );
    }

    #[test]
    fn read_with_whitespace() {
        let file = write_csv("credit, alice, , 10.0, \n");
        let ops = read_all(&file);
        assert_eq!(ops.len(), 1);
        assert!(ops[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_type() {
        let file = write_csv("withdraw,alice,,10.0,\n");
        let ops = read_all(&file);
        let err = ops[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedType { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_fields() {
        let file = write_csv("credit,alice,,,\ntransfer,alice,,5,\nopen,bob,,,\n");
        let ops = read_all(&file);
        assert!(matches!(
            ops[0],
            Err(CsvError::MissingField { line: 2, field: "amount", .. })
        ));
        assert!(matches!(
            ops[1],
            Err(CsvError::MissingField { line: 3, field: "counterparty", .. })
        ));
        assert!(matches!(
            ops[2],
            Err(CsvError::MissingField { line: 4, field: "name", .. })
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            read_operations("/definitely/not/here.csv"),
            Err(CsvError::Open(_))
        ));
    }

    #[test]
    fn write_users_sorted() {
        let mut bob = User::with_id("bob", "Bob");
        bob.balance = Amount::from_float(100.0);
        let alice = User::with_id("alice", "Alice");

        let mut out = Vec::new();
        write_users(&mut out, [&bob, &alice]).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["id,name,balance", "alice,Alice,0.0000", "bob,Bob,100.0000"]);
    }

    #[test]
    fn write_transactions_renders_state() {
        let mut tx = Transaction::transfer("a", "b", Amount::from_float(100.0));
        tx.state = TransactionState::Booked;
        let credit = Transaction::credit("b", Amount::from_float(5.0));

        let mut out = Vec::new();
        write_transactions(&mut out, [&tx, &credit]).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,source,destination,amount,state");
        assert_eq!(lines[1], format!("{},a,b,100.0000,BOOKED", tx.id));
        assert_eq!(lines[2], format!("{},,b,5.0000,OPEN", credit.id));
    }
}
