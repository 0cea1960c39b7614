//! Product records and form validation.

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ID_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// A stocked product.
///
/// Serialized with camelCase keys so exported files stay compatible with
/// the web front end's storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique id, `product_<millis>_<suffix>`.
    pub id: String,
    /// Barcode as scanned or typed.
    pub barcode: String,
    /// Display name.
    pub name: String,
    /// Unit cost.
    pub purchase_price: f64,
    /// Unit shelf price.
    pub selling_price: f64,
    /// Units on hand.
    pub quantity: u32,
    /// When the product was added.
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Gross margin as a fraction of the selling price.
    ///
    /// `None` when the selling price is zero.
    pub fn gross_margin(&self) -> Option<f64> {
        if self.selling_price == 0.0 {
            return None;
        }
        Some((self.selling_price - self.purchase_price) / self.selling_price)
    }

    /// Value of the stock on hand at purchase price.
    pub fn stock_value(&self) -> f64 {
        self.purchase_price * f64::from(self.quantity)
    }
}

/// Product data as entered in the add-product form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    /// Barcode; surrounding whitespace is trimmed.
    pub barcode: String,
    /// Name; surrounding whitespace is trimmed.
    pub name: String,
    /// Unit cost, non-negative.
    pub purchase_price: f64,
    /// Unit shelf price, non-negative.
    pub selling_price: f64,
    /// Units on hand.
    pub quantity: u32,
}

/// Form validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Name is blank.
    #[error("product name must not be empty")]
    EmptyName,
    /// Barcode is blank.
    #[error("barcode must not be empty")]
    EmptyBarcode,
    /// A price is negative or not finite.
    #[error("{field} must be a number >= 0 (got {value})")]
    InvalidPrice {
        /// Which price.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

impl ProductDraft {
    /// Checks the draft the way the form does before submission.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.barcode.trim().is_empty() {
            return Err(ValidationError::EmptyBarcode);
        }
        for (field, value) in [
            ("selling price", self.selling_price),
            ("purchase price", self.purchase_price),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::InvalidPrice { field, value });
            }
        }
        Ok(())
    }

    /// Validates and stamps the draft into a product.
    pub fn into_product(self, now: DateTime<Utc>) -> Result<Product, ValidationError> {
        self.validate()?;
        Ok(Product {
            id: generate_id(now),
            barcode: self.barcode.trim().to_string(),
            name: self.name.trim().to_string(),
            purchase_price: self.purchase_price,
            selling_price: self.selling_price,
            quantity: self.quantity,
            created_at: now,
        })
    }
}

/// Generates `product_<unix millis>_<9 base36 chars>`.
pub fn generate_id(now: DateTime<Utc>) -> String {
    let mut n = OsRng.next_u64();
    let mut suffix = [0u8; ID_SUFFIX_LEN];
    for slot in suffix.iter_mut() {
        *slot = ID_ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    let suffix: String = suffix.iter().map(|&b| b as char).collect();
    format!("product_{}_{}", now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> ProductDraft {
        ProductDraft {
            barcode: "6901234567892".into(),
            name: "Green Tea 500ml".into(),
            purchase_price: 2.5,
            selling_price: 4.0,
            quantity: 24,
        }
    }

    #[test]
    fn test_valid_draft() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let product = draft().into_product(now).unwrap();
        assert_eq!(product.barcode, "6901234567892");
        assert_eq!(product.created_at, now);
        assert!(product.id.starts_with(&format!("product_{}_", now.timestamp_millis())));
    }

    #[test]
    fn test_validation_errors() {
        let mut d = draft();
        d.name = "  ".into();
        assert_eq!(d.validate(), Err(ValidationError::EmptyName));

        let mut d = draft();
        d.barcode = String::new();
        assert_eq!(d.validate(), Err(ValidationError::EmptyBarcode));

        let mut d = draft();
        d.selling_price = -1.0;
        assert!(matches!(
            d.validate(),
            Err(ValidationError::InvalidPrice { field: "selling price", .. })
        ));

        let mut d = draft();
        d.purchase_price = f64::NAN;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_gross_margin() {
        let product = draft().into_product(Utc::now()).unwrap();
        let margin = product.gross_margin().unwrap();
        assert!((margin - 0.375).abs() < 1e-9);
        assert!((product.stock_value() - 60.0).abs() < 1e-9);

        let free = Product {
            selling_price: 0.0,
            ..product
        };
        assert_eq!(free.gross_margin(), None);
    }

    #[test]
    fn test_id_shape() {
        let id = generate_id(Utc::now());
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_camel_case_json() {
        let product = draft().into_product(Utc::now()).unwrap();
        let json = serde_json::to_value(&product).unwrap();
        assert!(json.get("purchasePrice").is_some());
        assert!(json.get("sellingPrice").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
