//! # Product Catalog
//!
//! Products and discount codes for the in-memory store.
//! Loaded from `config/products.toml`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Stock available for one size of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub size: String,
    pub stock: u32,
}

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Price in cents
    pub price: i64,

    #[serde(default)]
    pub sizes: Vec<SizeStock>,

    /// Whether this product is available for purchase
    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Product {
    pub fn new(id: i64, name: impl Into<String>, price: i64) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            price,
            sizes: Vec::new(),
            active: true,
            image_url: None,
        }
    }

    /// Builder: add a size with its stock
    pub fn with_size(mut self, size: impl Into<String>, stock: u32) -> Self {
        self.sizes.push(SizeStock {
            size: size.into(),
            stock,
        });
        self
    }

    pub fn has_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s.size == size)
    }
}

/// A percentage discount code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub name: String,
    pub percent: u8,
    /// Attached to every newly registered account
    #[serde(default, skip_serializing)]
    pub on_register: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub discounts: Vec<DiscountCode>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Builder: add a discount code
    pub fn with_discount(mut self, name: impl Into<String>, percent: u8) -> Self {
        self.discounts.push(DiscountCode {
            name: name.into(),
            percent: percent.min(100),
            on_register: false,
        });
        self
    }

    /// Builder: add a discount code attached to new accounts
    pub fn with_welcome_discount(mut self, name: impl Into<String>, percent: u8) -> Self {
        self.discounts.push(DiscountCode {
            name: name.into(),
            percent: percent.min(100),
            on_register: true,
        });
        self
    }

    /// Find an active product by ID
    pub fn get(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id && p.active)
    }

    /// Find a discount code, ignoring case
    pub fn discount(&self, name: &str) -> Option<&DiscountCode> {
        self.discounts
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// First discount marked `on_register`
    pub fn welcome_discount(&self) -> Option<&DiscountCode> {
        self.discounts.iter().find(|d| d.on_register)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load the catalog from the first `config/products.toml` found walking up
    /// from the working directory. An absent file yields an empty catalog.
    pub fn load() -> Result<Self, CatalogError> {
        let config_paths = [
            "config/products.toml",
            "../config/products.toml",
            "../../config/products.toml",
        ];

        for path in config_paths {
            if let Ok(content) = std::fs::read_to_string(path) {
                let catalog = Self::from_toml(&content).map_err(|source| CatalogError::Parse {
                    path: path.to_string(),
                    source,
                })?;
                tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
                return Ok(catalog);
            }
        }

        tracing::warn!("No product catalog found, using empty catalog");
        Ok(Self::new())
    }
}
