//! CSV format handling for scenario rows and state output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to engine operations
//! - Final state serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input columns
//!
//! `op,account,target,quantity,amount`
//!
//! | op         | account | target                      | quantity | amount          |
//! |------------|---------|-----------------------------|----------|-----------------|
//! | `open`     | id      | email (optional)            |          | opening balance (optional) |
//! | `product`  |         | product id                  | stock    | price           |
//! | `retire`   |         | product id                  |          |                 |
//! | `topup`    | id      | payment method (optional)   |          | points          |
//! | `purchase` | id      | `P1:2;P2:1`                 |          |                 |

use std::io::Write;

use serde::Deserialize;

use crate::core::{PurchaseRequest, TopUpRequest};
use crate::types::{Account, AccountId, LineItemRequest, NewAccount, NewProduct, Product, ProductId};

/// Payment method recorded when a `topup` row names none
pub const DEFAULT_PAYMENT_METHOD: &str = "Credit Card";

/// Destination recorded on orders placed by `purchase` rows
pub const DEFAULT_DESTINATION: &str = "Standard Delivery";

/// CSV record structure for deserialization
///
/// Every column but `op` is optional; which ones are required depends on
/// the operation.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CsvRecord {
    pub op: String,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
}

/// One engine call described by a scenario row
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    OpenAccount(NewAccount),
    AddProduct(NewProduct),
    RetireProduct(ProductId),
    TopUp(TopUpRequest),
    Purchase(PurchaseRequest),
}

impl Operation {
    /// Catalog operations touch no account
    pub fn is_catalog(&self) -> bool {
        matches!(self, Operation::AddProduct(_) | Operation::RetireProduct(_))
    }

    /// Account the operation belongs to
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            Operation::OpenAccount(new) => Some(&new.id),
            Operation::TopUp(request) => Some(&request.account_id),
            Operation::Purchase(request) => Some(&request.account_id),
            Operation::AddProduct(_) | Operation::RetireProduct(_) => None,
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn required<'a>(field: &'a Option<String>, name: &str, op: &str) -> Result<&'a str, String> {
    present(field).ok_or_else(|| format!("'{}' row requires {}", op, name))
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {} '{}'", name, value))
}

/// Parse a `P1:2;P2:1` cart into line items
///
/// Empty segments are skipped; whitespace around ids and quantities is
/// ignored.
pub fn parse_line_items(cart: &str) -> Result<Vec<LineItemRequest>, String> {
    cart.split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (product, quantity) = segment
                .split_once(':')
                .ok_or_else(|| format!("Invalid line item '{}', expected PRODUCT:QUANTITY", segment))?;
            let product = product.trim();
            if product.is_empty() {
                return Err(format!("Invalid line item '{}', missing product", segment));
            }
            let quantity = parse_number::<u32>(quantity.trim(), "quantity")?;
            Ok(LineItemRequest::new(product, quantity))
        })
        .collect()
}

/// Convert a CsvRecord to an Operation
///
/// # Returns
///
/// Result containing either:
/// - Ok(Operation) - Successfully converted row
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(csv_record: CsvRecord) -> Result<Operation, String> {
    let op = csv_record.op.trim().to_lowercase();

    match op.as_str() {
        "open" => {
            let account = required(&csv_record.account, "an account", &op)?;
            let email = present(&csv_record.target).unwrap_or_default();
            let mut new = NewAccount::new(account, email, account);
            if let Some(balance) = present(&csv_record.amount) {
                new = new.with_opening_balance(parse_number(balance, "amount")?);
            }
            Ok(Operation::OpenAccount(new))
        }
        "product" => {
            let id = required(&csv_record.target, "a product id", &op)?;
            let stock = parse_number(required(&csv_record.quantity, "a quantity", &op)?, "quantity")?;
            let price = parse_number(required(&csv_record.amount, "an amount", &op)?, "amount")?;
            Ok(Operation::AddProduct(NewProduct::new(id, id, price, stock)))
        }
        "retire" => {
            let id = required(&csv_record.target, "a product id", &op)?;
            Ok(Operation::RetireProduct(ProductId::new(id)))
        }
        "topup" => {
            let account = required(&csv_record.account, "an account", &op)?;
            let amount = parse_number(required(&csv_record.amount, "an amount", &op)?, "amount")?;
            let method = present(&csv_record.target).unwrap_or(DEFAULT_PAYMENT_METHOD);
            Ok(Operation::TopUp(TopUpRequest::new(account, amount, method)))
        }
        "purchase" => {
            let account = required(&csv_record.account, "an account", &op)?;
            let items = parse_line_items(required(&csv_record.target, "line items", &op)?)?;
            Ok(Operation::Purchase(PurchaseRequest::new(
                account,
                items,
                DEFAULT_DESTINATION,
            )))
        }
        _ => Err(format!("Invalid operation: '{}'", csv_record.op)),
    }
}

/// Write final state to CSV format
///
/// Writes rows with columns: kind, id, balance, stock. Accounts carry a
/// balance, products a stock. Rows are sorted by kind, then id, for
/// deterministic output.
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_state_csv(
    accounts: &[Account],
    products: &[Product],
    output: &mut dyn Write,
) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["kind", "id", "balance", "stock"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut rows: Vec<[String; 4]> = accounts
        .iter()
        .map(|account| {
            [
                "account".to_string(),
                account.id.to_string(),
                account.balance.to_string(),
                String::new(),
            ]
        })
        .chain(products.iter().map(|product| {
            [
                "product".to_string(),
                product.id.to_string(),
                String::new(),
                product.stock.to_string(),
            ]
        }))
        .collect();
    rows.sort_by(|a, b| (&a[0], &a[1]).cmp(&(&b[0], &b[1])));

    for row in rows {
        writer
            .write_record(&row)
            .map_err(|e| format!("Failed to write state record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn record(op: &str, account: &str, target: &str, quantity: &str, amount: &str) -> CsvRecord {
        let field = |value: &str| (!value.is_empty()).then(|| value.to_string());
        CsvRecord {
            op: op.to_string(),
            account: field(account),
            target: field(target),
            quantity: field(quantity),
            amount: field(amount),
        }
    }

    #[test]
    fn test_convert_open_with_balance() {
        let operation = convert_csv_record(record("open", "alice", "a@example.com", "", "500")).unwrap();
        assert_eq!(
            operation,
            Operation::OpenAccount(
                NewAccount::new("alice", "a@example.com", "alice").with_opening_balance(500)
            )
        );
    }

    #[test]
    fn test_convert_open_without_balance_uses_engine_default() {
        let operation = convert_csv_record(record("open", "alice", "", "", "")).unwrap();
        match operation {
            Operation::OpenAccount(new) => assert_eq!(new.opening_balance, None),
            other => panic!("Expected OpenAccount, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_product() {
        let operation = convert_csv_record(record("product", "", "P1", "5", "200")).unwrap();
        assert_eq!(
            operation,
            Operation::AddProduct(NewProduct::new("P1", "P1", 200, 5))
        );
        assert!(operation.is_catalog());
        assert_eq!(operation.account(), None);
    }

    #[test]
    fn test_convert_topup_defaults_method() {
        let operation = convert_csv_record(record("TOPUP", "alice", "", "", "1000")).unwrap();
        assert_eq!(
            operation,
            Operation::TopUp(TopUpRequest::new("alice", 1000, DEFAULT_PAYMENT_METHOD))
        );
        assert_eq!(operation.account(), Some(&AccountId::new("alice")));
    }

    #[test]
    fn test_convert_purchase() {
        let operation = convert_csv_record(record("purchase", "alice", "P1:2;P2:1", "", "")).unwrap();
        assert_eq!(
            operation,
            Operation::Purchase(PurchaseRequest::new(
                "alice",
                vec![LineItemRequest::new("P1", 2), LineItemRequest::new("P2", 1)],
                DEFAULT_DESTINATION,
            ))
        );
    }

    #[rstest]
    #[case::unknown_op(record("withdraw", "alice", "", "", "1"), "Invalid operation")]
    #[case::open_without_account(record("open", "", "", "", ""), "requires an account")]
    #[case::topup_without_amount(record("topup", "alice", "", "", ""), "requires an amount")]
    #[case::topup_negative(record("topup", "alice", "", "", "-5"), "Invalid amount")]
    #[case::product_without_stock(record("product", "", "P1", "", "200"), "requires a quantity")]
    #[case::purchase_without_items(record("purchase", "alice", "", "", ""), "requires line items")]
    #[case::purchase_bad_item(record("purchase", "alice", "P1", "", ""), "Invalid line item")]
    fn test_convert_errors(#[case] csv_record: CsvRecord, #[case] expected_error: &str) {
        let result = convert_csv_record(csv_record);
        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(error.contains(expected_error), "unexpected error: {}", error);
    }

    #[rstest]
    #[case::single("P1:2", vec![LineItemRequest::new("P1", 2)])]
    #[case::whitespace(" P1 : 2 ; P2:1 ", vec![LineItemRequest::new("P1", 2), LineItemRequest::new("P2", 1)])]
    #[case::trailing_separator("P1:1;", vec![LineItemRequest::new("P1", 1)])]
    #[case::zero_quantity_is_left_to_the_engine("P1:0", vec![LineItemRequest::new("P1", 0)])]
    fn test_parse_line_items(#[case] cart: &str, #[case] expected: Vec<LineItemRequest>) {
        assert_eq!(parse_line_items(cart).unwrap(), expected);
    }

    #[test]
    fn test_write_state_csv_sorted_by_kind_then_id() {
        let now = Utc::now();
        let accounts = vec![
            Account::open(NewAccount::new("bob", "", "bob"), 300, now),
            Account::open(NewAccount::new("alice", "", "alice"), 1000, now),
        ];
        let products = vec![Product::create(NewProduct::new("P1", "P1", 200, 3), now).unwrap()];

        let mut output = Vec::new();
        write_state_csv(&accounts, &products, &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "kind,id,balance,stock\naccount,alice,1000,\naccount,bob,300,\nproduct,P1,,3\n"
        );
    }

    #[test]
    fn test_write_state_csv_empty() {
        let mut output = Vec::new();
        write_state_csv(&[], &[], &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "kind,id,balance,stock\n");
    }
}
