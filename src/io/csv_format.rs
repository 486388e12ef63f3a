//! CSV format handling for command ledgers and replay output
//!
//! This module provides shared CSV functionality used by both sync and async
//! readers, and the writers for replay output.
//!
//! # Input Format
//!
//! ```csv
//! type,caller,time,stream,party,duration,kind,amount,reason
//! create,alice,0,s1,bob,3600,1,1000,
//! release,bob,1800,s1,,,,,
//! batch,keeper,3600,s1;s2,,,,,
//! cancel,alice,2700,s2,,,,,3
//! fee_recipient,owner,0,,treasury,,,,
//! withdraw,owner,9000,,,,,,
//! ```
//!
//! # Output Formats
//!
//! - streams: `stream,payer,payee,start,end,total,released,status,kind`
//! - balances: `principal,balance`
//! - events: `event,stream,payer,payee,amount,fee,released,refund,owed,stranded,reason,time`

use crate::types::{
    Amount, Command, CommandRecord, Principal, Stream, StreamEvent, StreamRef, Timestamp,
};
use serde::Deserialize;
use std::io::Write;

/// Separator between references in a `batch` record's `stream` column
pub const REFERENCE_SEPARATOR: char = ';';

/// Raw CSV record structure for deserialization
///
/// Which optional columns are required depends on `type`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    #[serde(rename = "type")]
    pub command: String,
    pub caller: String,
    pub time: Timestamp,
    pub stream: Option<String>,
    pub party: Option<String>,
    pub duration: Option<u64>,
    pub kind: Option<u8>,
    pub amount: Option<String>,
    pub reason: Option<u8>,
}

fn required<T>(value: Option<T>, column: &str, record: &CsvRecord) -> Result<T, String> {
    value.ok_or_else(|| {
        format!(
            "'{}' record at time {} requires a {} value",
            record.command, record.time, column
        )
    })
}

fn required_text(value: &Option<String>, column: &str, record: &CsvRecord) -> Result<String, String> {
    let text = value.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(format!(
            "'{}' record at time {} requires a {} value",
            record.command, record.time, column
        ));
    }
    Ok(text.to_string())
}

/// Convert a CSV record to a CommandRecord
///
/// # Arguments
///
/// * `csv_record` - The raw CSV record to convert
///
/// # Returns
///
/// * `Ok(CommandRecord)` - Successfully converted record
/// * `Err(String)` - Unknown type, unparsable amount, or missing column
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<CommandRecord, String> {
    let command = match csv_record.command.to_lowercase().as_str() {
        "create" => {
            let amount_str = required_text(&csv_record.amount, "amount", &csv_record)?;
            let amount: Amount = amount_str.parse().map_err(|_| {
                format!(
                    "Invalid amount '{}' at time {}",
                    amount_str, csv_record.time
                )
            })?;
            Command::Create {
                reference: required_text(&csv_record.stream, "stream", &csv_record)?,
                payee: Principal::new(required_text(&csv_record.party, "party", &csv_record)?),
                duration: required(csv_record.duration, "duration", &csv_record)?,
                stream_type: required(csv_record.kind, "kind", &csv_record)?,
                amount,
            }
        }
        "release" => Command::Release {
            reference: required_text(&csv_record.stream, "stream", &csv_record)?,
        },
        "batch" => {
            let references: Vec<StreamRef> = csv_record
                .stream
                .as_deref()
                .unwrap_or_default()
                .split(REFERENCE_SEPARATOR)
                .map(str::trim)
                .filter(|reference| !reference.is_empty())
                .map(str::to_string)
                .collect();
            Command::BatchRelease { references }
        }
        "cancel" => Command::Cancel {
            reference: required_text(&csv_record.stream, "stream", &csv_record)?,
            reason: csv_record.reason.unwrap_or(0),
        },
        "fee_recipient" => Command::SetFeeRecipient {
            recipient: Principal::new(required_text(&csv_record.party, "party", &csv_record)?),
        },
        "grant_admin" => Command::GrantAdmin {
            principal: Principal::new(required_text(&csv_record.party, "party", &csv_record)?),
        },
        "revoke_admin" => Command::RevokeAdmin {
            principal: Principal::new(required_text(&csv_record.party, "party", &csv_record)?),
        },
        "withdraw" => Command::EmergencyWithdraw,
        _ => {
            return Err(format!(
                "Invalid command type: '{}' at time {}",
                csv_record.command, csv_record.time
            ))
        }
    };

    Ok(CommandRecord {
        caller: Principal::new(csv_record.caller),
        time: csv_record.time,
        command,
    })
}

/// Write stream snapshots to CSV format
///
/// # Arguments
///
/// * `rows` - Streams with their ledger references
/// * `output` - Writer to output CSV data to
///
/// # Output Format
///
/// ```csv
/// stream,payer,payee,start,end,total,released,status,kind
/// s1,alice,bob,0,3600,1000,500,active,1
/// ```
///
/// Rows are sorted by reference for deterministic output.
pub fn write_streams_csv(rows: &[(StreamRef, Stream)], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "stream", "payer", "payee", "start", "end", "total", "released", "status", "kind",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted: Vec<&(StreamRef, Stream)> = rows.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    for (reference, stream) in sorted {
        writer
            .write_record(&[
                reference.clone(),
                stream.payer.to_string(),
                stream.payee.to_string(),
                stream.start_time.to_string(),
                stream.end_time.to_string(),
                stream.total_amount.to_string(),
                stream.released_amount.to_string(),
                stream.status.to_string(),
                stream.stream_type.to_string(),
            ])
            .map_err(|e| format!("Failed to write stream record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write ledger balances to CSV format (`principal,balance`), sorted by principal
pub fn write_balances_csv(
    balances: &[(Principal, Amount)],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["principal", "balance"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = balances.to_vec();
    sorted.sort();

    for (principal, balance) in sorted {
        writer
            .write_record(&[principal.to_string(), balance.to_string()])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

fn event_row(event: &StreamEvent) -> [String; 12] {
    let blank = String::new;
    let stream = event.stream().to_hex();
    let time = event.time().to_string();

    match event {
        StreamEvent::Created {
            payer, payee, amount, ..
        } => [
            "created".into(), stream, payer.to_string(), payee.to_string(),
            amount.to_string(), blank(), blank(), blank(), blank(), blank(), blank(), time,
        ],
        StreamEvent::Released {
            payer, payee, amount, fee, released_total, ..
        } => [
            "released".into(), stream, payer.to_string(), payee.to_string(),
            amount.to_string(), fee.to_string(), released_total.to_string(),
            blank(), blank(), blank(), blank(), time,
        ],
        StreamEvent::Cancelled {
            payer, payee, refund, owed, stranded, reason, ..
        } => [
            "cancelled".into(), stream, payer.to_string(), payee.to_string(),
            blank(), blank(), blank(), refund.to_string(), owed.to_string(),
            stranded.to_string(), reason.to_string(), time,
        ],
        StreamEvent::Completed {
            payer, payee, total_amount, ..
        } => [
            "completed".into(), stream, payer.to_string(), payee.to_string(),
            total_amount.to_string(), blank(), total_amount.to_string(),
            blank(), blank(), blank(), blank(), time,
        ],
    }
}

/// Write notifications to CSV format, in emission order
///
/// Columns that do not apply to an event are left empty.
pub fn write_events_csv(events: &[StreamEvent], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "event", "stream", "payer", "payee", "amount", "fee", "released", "refund", "owed",
            "stranded", "reason", "time",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for event in events {
        writer
            .write_record(event_row(event))
            .map_err(|e| format!("Failed to write event record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StreamId, StreamStatus, StreamType};
    use rstest::rstest;

    fn csv_record(command: &str) -> CsvRecord {
        CsvRecord {
            command: command.to_string(),
            caller: "alice".to_string(),
            time: 100,
            stream: None,
            party: None,
            duration: None,
            kind: None,
            amount: None,
            reason: None,
        }
    }

    #[rstest]
    #[case::lowercase("create")]
    #[case::uppercase("CREATE")]
    fn test_convert_create(#[case] command: &str) {
        let record = CsvRecord {
            stream: Some("s1".to_string()),
            party: Some("bob".to_string()),
            duration: Some(3_600),
            kind: Some(2),
            amount: Some(" 1000 ".to_string()),
            ..csv_record(command)
        };

        let converted = convert_csv_record(record).unwrap();

        assert_eq!(converted.caller, Principal::new("alice"));
        assert_eq!(converted.time, 100);
        assert_eq!(
            converted.command,
            Command::Create {
                reference: "s1".to_string(),
                payee: Principal::new("bob"),
                duration: 3_600,
                stream_type: 2,
                amount: 1_000,
            }
        );
    }

    #[test]
    fn test_convert_large_amount() {
        let record = CsvRecord {
            stream: Some("s1".to_string()),
            party: Some("bob".to_string()),
            duration: Some(3_600),
            kind: Some(1),
            amount: Some("340282366920938463463374607431768211455".to_string()),
            ..csv_record("create")
        };

        let converted = convert_csv_record(record).unwrap();
        assert!(matches!(converted.command, Command::Create { amount: u128::MAX, .. }));
    }

    #[rstest]
    #[case::missing_amount(None, Some(3_600), Some(1), "amount")]
    #[case::bad_amount(Some("1.5"), Some(3_600), Some(1), "Invalid amount")]
    #[case::negative_amount(Some("-5"), Some(3_600), Some(1), "Invalid amount")]
    #[case::missing_duration(Some("1000"), None, Some(1), "duration")]
    #[case::missing_kind(Some("1000"), Some(3_600), None, "kind")]
    fn test_convert_create_errors(
        #[case] amount: Option<&str>,
        #[case] duration: Option<u64>,
        #[case] kind: Option<u8>,
        #[case] message: &str,
    ) {
        let record = CsvRecord {
            stream: Some("s1".to_string()),
            party: Some("bob".to_string()),
            duration,
            kind,
            amount: amount.map(str::to_string),
            ..csv_record("create")
        };

        let error = convert_csv_record(record).unwrap_err();
        assert!(error.contains(message), "{}", error);
    }

    #[test]
    fn test_convert_batch_splits_references() {
        let record = CsvRecord {
            stream: Some("a; b;;c ".to_string()),
            ..csv_record("batch")
        };

        let converted = convert_csv_record(record).unwrap();
        assert_eq!(
            converted.command,
            Command::BatchRelease {
                references: vec!["a".to_string(), "b".to_string(), "c".to_string()]
            }
        );
    }

    #[rstest]
    #[case::cancel_default_reason(
        CsvRecord { stream: Some("s1".to_string()), ..csv_record("cancel") },
        Command::Cancel { reference: "s1".to_string(), reason: 0 }
    )]
    #[case::cancel_with_reason(
        CsvRecord { stream: Some("s1".to_string()), reason: Some(7), ..csv_record("cancel") },
        Command::Cancel { reference: "s1".to_string(), reason: 7 }
    )]
    #[case::release(
        CsvRecord { stream: Some("s1".to_string()), ..csv_record("release") },
        Command::Release { reference: "s1".to_string() }
    )]
    #[case::fee_recipient(
        CsvRecord { party: Some("dao".to_string()), ..csv_record("fee_recipient") },
        Command::SetFeeRecipient { recipient: Principal::new("dao") }
    )]
    #[case::grant_admin(
        CsvRecord { party: Some("ops".to_string()), ..csv_record("grant_admin") },
        Command::GrantAdmin { principal: Principal::new("ops") }
    )]
    #[case::revoke_admin(
        CsvRecord { party: Some("ops".to_string()), ..csv_record("revoke_admin") },
        Command::RevokeAdmin { principal: Principal::new("ops") }
    )]
    #[case::withdraw(csv_record("withdraw"), Command::EmergencyWithdraw)]
    fn test_convert_other_commands(#[case] record: CsvRecord, #[case] expected: Command) {
        assert_eq!(convert_csv_record(record).unwrap().command, expected);
    }

    #[rstest]
    #[case::release_without_stream(csv_record("release"))]
    #[case::cancel_blank_stream(CsvRecord { stream: Some("  ".to_string()), ..csv_record("cancel") })]
    #[case::grant_without_party(csv_record("grant_admin"))]
    #[case::unknown_type(csv_record("deposit"))]
    fn test_convert_invalid_records(#[case] record: CsvRecord) {
        assert!(convert_csv_record(record).is_err());
    }

    fn stream(payee: &str, released: Amount, status: StreamStatus) -> Stream {
        Stream {
            id: StreamId::from_bytes([7; 32]),
            payer: Principal::new("alice"),
            payee: Principal::new(payee),
            start_time: 0,
            end_time: 3_600,
            total_amount: 1_000,
            released_amount: released,
            last_release_time: 0,
            status,
            stream_type: StreamType::new(3).unwrap(),
        }
    }

    #[test]
    fn test_write_streams_csv_sorted() {
        let rows = vec![
            ("s2".to_string(), stream("carol", 1_000, StreamStatus::Completed)),
            ("s1".to_string(), stream("bob", 500, StreamStatus::Active)),
        ];
        let mut output = Vec::new();

        write_streams_csv(&rows, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "stream,payer,payee,start,end,total,released,status,kind\n\
             s1,alice,bob,0,3600,1000,500,active,3\n\
             s2,alice,carol,0,3600,1000,1000,completed,3\n"
        );
    }

    #[test]
    fn test_write_balances_csv() {
        let balances = vec![(Principal::new("bob"), 488), (Principal::new("alice"), 250)];
        let mut output = Vec::new();

        write_balances_csv(&balances, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output, "principal,balance\nalice,250\nbob,488\n");
    }

    #[test]
    fn test_write_events_csv() {
        let id = StreamId::from_bytes([7; 32]);
        let events = vec![StreamEvent::Cancelled {
            stream: id,
            payer: Principal::new("alice"),
            payee: Principal::new("bob"),
            refund: 250,
            owed: 750,
            stranded: 750,
            reason: 3,
            time: 2_700,
        }];
        let mut output = Vec::new();

        write_events_csv(&events, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("event,stream,payer,payee,amount,fee,released,refund,owed,stranded,reason,time")
        );
        assert_eq!(
            lines.next(),
            Some(format!("cancelled,{},alice,bob,,,,250,750,750,3,2700", id.to_hex()).as_str())
        );
        assert_eq!(lines.next(), None);
    }
}
