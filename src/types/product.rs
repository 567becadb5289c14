//! Catalog product types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::ids::ProductId;

/// Lifecycle of a catalog product
///
/// Products are never hard-deleted: retiring one hides it from the catalog
/// and blocks new purchases while keeping historical orders intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProductStatus {
    Active,
    Retired,
}

/// A purchasable catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,

    /// Price in points, always positive
    pub price: u64,

    /// Units available for purchase
    pub stock: u32,

    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog entry to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: u64,
    pub stock: u32,
}

impl NewProduct {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: u64, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: String::new(),
            price,
            stock,
        }
    }
}

/// Partial edit of a catalog entry; `None` leaves the field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<u64>,
    pub stock: Option<u32>,
}

impl Product {
    /// Create an active product
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when the price is zero.
    pub fn create(new: NewProduct, now: DateTime<Utc>) -> Result<Self, LedgerError> {
        validate_price(&new.id, new.price)?;
        Ok(Product {
            id: new.id,
            name: new.name,
            description: new.description,
            category: new.category,
            price: new.price,
            stock: new.stock,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Apply a catalog edit
    pub fn apply_update(&mut self, update: &ProductUpdate, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if let Some(price) = update.price {
            validate_price(&self.id, price)?;
            self.price = price;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
        if let Some(name) = &update.name {
            self.name.clone_from(name);
        }
        if let Some(description) = &update.description {
            self.description.clone_from(description);
        }
        if let Some(category) = &update.category {
            self.category.clone_from(category);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Remove `quantity` units from stock
    ///
    /// # Errors
    ///
    /// `InsufficientStock` naming this product when fewer units remain.
    pub fn take_stock(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.stock = self.stock.checked_sub(quantity).ok_or_else(|| {
            LedgerError::insufficient_stock(self.id.clone(), self.stock, quantity)
        })?;
        self.updated_at = now;
        Ok(())
    }

    /// Return `quantity` units to stock
    pub fn restock(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), LedgerError> {
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| LedgerError::arithmetic_overflow("restock"))?;
        self.updated_at = now;
        Ok(())
    }
}

fn validate_price(id: &ProductId, price: u64) -> Result<(), LedgerError> {
    if price == 0 {
        return Err(LedgerError::invalid_request(format!(
            "price of product {} must be positive",
            id
        )));
    }
    Ok(())
}
