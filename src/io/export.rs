//! Account data export
//!
//! A self-contained JSON document with everything held about one account:
//! its profile, its full ledger and its orders.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Account, Order, TransactionRecord};

/// Everything held about one account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountExport {
    pub profile: Account,

    /// Ledger records, newest first
    pub audit_trail: Vec<TransactionRecord>,

    /// Orders, newest first
    pub acquisition_history: Vec<Order>,

    pub exported_at: DateTime<Utc>,
}

/// Write an export as pretty-printed JSON followed by a newline
pub fn write_export_json(export: &AccountExport, output: &mut dyn Write) -> Result<(), String> {
    serde_json::to_writer_pretty(&mut *output, export)
        .map_err(|e| format!("Failed to serialize export: {}", e))?;
    writeln!(output).map_err(|e| format!("Failed to write export: {}", e))?;
    output
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LedgerPosition, NewAccount, TransactionType};

    #[test]
    fn test_export_document_shape() {
        let now = Utc::now();
        let mut account = Account::open(NewAccount::new("alice", "alice@example.com", "Alice"), 1000, now);
        let position: LedgerPosition = account.post(TransactionType::TopUp, 500, now).unwrap();
        let record = TransactionRecord::completed(
            account.id.clone(),
            TransactionType::TopUp,
            500,
            position,
            "Top-up via Credit Card",
            now,
        )
        .with_payment_method("Credit Card");

        let export = AccountExport {
            profile: account,
            audit_trail: vec![record],
            acquisition_history: Vec::new(),
            exported_at: now,
        };

        let mut output = Vec::new();
        write_export_json(&export, &mut output).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();

        assert_eq!(value["profile"]["id"], "alice");
        assert_eq!(value["profile"]["balance"], 1500);
        assert_eq!(value["profile"]["role"], "CUSTOMER");
        assert_eq!(value["audit_trail"][0]["tx_type"], "TOPUP");
        assert_eq!(value["audit_trail"][0]["payment_method"], "Credit Card");
        assert_eq!(value["audit_trail"][0]["status"], "completed");
        assert!(value["acquisition_history"].as_array().unwrap().is_empty());
        assert!(value["exported_at"].is_string());
    }
}
