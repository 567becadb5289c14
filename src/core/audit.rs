//! Ledger replay
//!
//! An account's records, replayed in sequence order from its opening
//! balance, must reproduce every recorded `balance_after` and finally the
//! stored balance. [`replay`] walks the trail and reports every place where
//! that does not hold.

use serde::Serialize;

use crate::types::{Account, AccountId, TransactionRecord};

/// A single inconsistency found while replaying a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// Sequence numbers are not contiguous from 1
    SequenceGap { expected: u64, found: u64 },

    /// A record's movement could not be applied to the running balance
    InvalidMovement { sequence: u64, balance: u64, amount: u64 },

    /// A record's `balance_after` disagrees with the replayed balance
    BalanceMismatch {
        sequence: u64,
        replayed: u64,
        recorded: u64,
    },

    /// The account's sequence counter disagrees with the records found
    RecordCount { expected: u64, found: u64 },

    /// The stored balance disagrees with the end of the replay
    FinalBalance { replayed: u64, stored: u64 },
}

/// Result of replaying one account's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub account_id: AccountId,
    pub opening_balance: u64,
    pub replayed_balance: u64,
    pub stored_balance: u64,
    pub records: usize,
    pub divergences: Vec<Divergence>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.divergences.is_empty()
    }

    /// Earliest problem found, in replay order
    pub fn first_divergence(&self) -> Option<&Divergence> {
        self.divergences.first()
    }
}

/// Replay `records` against `account`
///
/// Records of other accounts are ignored. Order of the input does not
/// matter; records are replayed by sequence number.
pub fn replay(account: &Account, records: &[TransactionRecord]) -> LedgerAudit {
    let mut trail: Vec<&TransactionRecord> = records
        .iter()
        .filter(|record| record.account_id == account.id)
        .collect();
    trail.sort_by_key(|record| record.sequence);

    let mut divergences = Vec::new();
    let mut balance = account.opening_balance;

    for (expected, record) in (1u64..).zip(&trail) {
        if record.sequence != expected {
            divergences.push(Divergence::SequenceGap {
                expected,
                found: record.sequence,
            });
        }

        match record.tx_type.apply(balance, record.amount) {
            Some(next) => balance = next,
            None => {
                divergences.push(Divergence::InvalidMovement {
                    sequence: record.sequence,
                    balance,
                    amount: record.amount,
                });
                // Resynchronise on the recorded value so one bad record
                // is not reported again for every later one
                balance = record.balance_after;
                continue;
            }
        }

        if record.balance_after != balance {
            divergences.push(Divergence::BalanceMismatch {
                sequence: record.sequence,
                replayed: balance,
                recorded: record.balance_after,
            });
            balance = record.balance_after;
        }
    }

    let found = trail.len() as u64;
    if found != account.ledger_sequence {
        divergences.push(Divergence::RecordCount {
            expected: account.ledger_sequence,
            found,
        });
    }
    if balance != account.balance {
        divergences.push(Divergence::FinalBalance {
            replayed: balance,
            stored: account.balance,
        });
    }

    LedgerAudit {
        account_id: account.id.clone(),
        opening_balance: account.opening_balance,
        replayed_balance: balance,
        stored_balance: account.balance,
        records: trail.len(),
        divergences,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewAccount, TransactionType};
    use chrono::Utc;

    /// Account opened with 1000 and the records produced by posting `moves`
    fn ledger(moves: &[(TransactionType, u64)]) -> (Account, Vec<TransactionRecord>) {
        let now = Utc::now();
        let mut account = Account::open(NewAccount::new("alice", "a@example.com", "Alice"), 1000, now);
        let records = moves
            .iter()
            .map(|(tx_type, amount)| {
                let position = account.post(*tx_type, *amount, now).unwrap();
                TransactionRecord::completed(
                    account.id.clone(),
                    *tx_type,
                    *amount,
                    position,
                    tx_type.label(),
                    now,
                )
            })
            .collect();
        (account, records)
    }

    #[test]
    fn test_consistent_ledger() {
        let (account, mut records) = ledger(&[
            (TransactionType::TopUp, 500),
            (TransactionType::Purchase, 400),
            (TransactionType::Refund, 400),
        ]);
        records.reverse();

        let audit = replay(&account, &records);
        assert!(audit.is_consistent(), "{:?}", audit.divergences);
        assert_eq!(audit.replayed_balance, 1500);
        assert_eq!(audit.records, 3);
    }

    #[test]
    fn test_empty_ledger_is_consistent() {
        let (account, records) = ledger(&[]);
        assert!(replay(&account, &records).is_consistent());
    }

    #[test]
    fn test_missing_record_is_reported() {
        let (account, mut records) = ledger(&[
            (TransactionType::TopUp, 500),
            (TransactionType::Purchase, 200),
        ]);
        records.remove(0);

        let audit = replay(&account, &records);
        assert!(audit
            .divergences
            .contains(&Divergence::SequenceGap { expected: 1, found: 2 }));
        assert!(audit
            .divergences
            .contains(&Divergence::RecordCount { expected: 2, found: 1 }));
    }

    #[test]
    fn test_tampered_balance_is_reported() {
        let (mut account, records) = ledger(&[(TransactionType::TopUp, 500)]);
        account.balance = 9_999;

        let audit = replay(&account, &records);
        assert_eq!(
            audit.divergences,
            vec![Divergence::FinalBalance {
                replayed: 1500,
                stored: 9_999
            }]
        );
    }
}
