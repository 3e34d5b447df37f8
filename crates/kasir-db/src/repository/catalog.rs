//! # Catalog Repository
//!
//! Products, their unit graphs, variants and pricing tiers.
//!
//! ## Product Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  NewProduct                                                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  validate name, UnitGraph::resolve(units), SKUs, tiers (pure)          │
//! │      │                                                                  │
//! │      ▼  BEGIN                                                           │
//! │  INSERT products                                                        │
//! │  INSERT product_units   in creation order: Pcs → Dozen → Box           │
//! │                         (parent id known before each child)            │
//! │  INSERT product_variants, pricing_tiers, stock_levels                  │
//! │  APPEND stock_movements (initial)                                       │
//! │      │                                                                  │
//! │      ▼  COMMIT                                                          │
//! │  Product                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checkout never writes here; it only calls [`lookup_line`].

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceError};
use crate::repository::{ledger, stock};
use kasir_core::checkout::LineCatalog;
use kasir_core::pricing::validate_tiers;
use kasir_core::validation::{
    validate_attribute, validate_product_name, validate_sku, validate_stock_quantity,
};
use kasir_core::{
    CoreError, MovementType, NewProduct, PricingTier, Product, ProductUnit, ProductVariant,
    StockMovementEntry, UnitDeclaration, UnitGraph, ValidationError, VariantAttribute,
};

/// Repository for catalog operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Creates a product, its units, variants, tiers and opening stock in
    /// one transaction.
    ///
    /// ## Errors
    /// - `Validation` for a bad name, unit graph, SKU or tier list
    /// - `Conflict` when a SKU already exists
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, ServiceError> {
        validate_new_product(&new)?;
        let graph = UnitGraph::resolve(&new.units)?;

        let product_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let name = new.name.trim().to_string();

        debug!(id = %product_id, name = %name, units = graph.units().len(), "Creating product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            "#,
        )
        .bind(&product_id)
        .bind(&name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Parents come first in the graph, so every converts_to id is known
        // by the time its child is inserted.
        let mut unit_ids: HashMap<String, String> = HashMap::new();
        let mut units = Vec::with_capacity(graph.units().len());
        for (position, unit) in graph.units().iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            let converts_to_unit_id = unit
                .converts_to
                .as_ref()
                .and_then(|parent| unit_ids.get(&parent.to_lowercase()).cloned());

            sqlx::query(
                r#"
                INSERT INTO product_units (
                    id, product_id, name, is_base, conversion_factor,
                    converts_to_unit_id, to_base, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&id)
            .bind(&product_id)
            .bind(&unit.name)
            .bind(unit.is_base)
            .bind(unit.conversion_factor)
            .bind(&converts_to_unit_id)
            .bind(unit.to_base)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;

            unit_ids.insert(unit.name.to_lowercase(), id.clone());
            units.push(ProductUnit {
                id,
                product_id: product_id.clone(),
                name: unit.name.clone(),
                is_base: unit.is_base,
                conversion_factor: unit.conversion_factor,
                converts_to_unit_id,
                to_base: unit.to_base,
            });
        }

        let mut variants = Vec::with_capacity(new.variants.len());
        for (position, variant) in new.variants.into_iter().enumerate() {
            let id = Uuid::new_v4().to_string();
            let sku = variant.sku.trim().to_string();
            let tiers = variant.tiers;

            sqlx::query(
                r#"
                INSERT INTO product_variants (id, product_id, sku, attributes, position)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&id)
            .bind(&product_id)
            .bind(&sku)
            .bind(serde_json::to_string(&variant.attributes).map_err(DbError::from)?)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;

            for tier in &tiers {
                sqlx::query(
                    "INSERT INTO pricing_tiers (variant_id, min_quantity, price) VALUES (?1, ?2, ?3)",
                )
                .bind(&id)
                .bind(tier.min_quantity)
                .bind(tier.price.amount())
                .execute(&mut *tx)
                .await?;
            }

            stock::insert_level(&mut *tx, &id, variant.initial_stock).await?;
            if variant.initial_stock > 0 {
                ledger::append(
                    &mut *tx,
                    &StockMovementEntry {
                        id: Uuid::new_v4().to_string(),
                        variant_id: id.clone(),
                        product_id: product_id.clone(),
                        transaction_id: None,
                        movement_type: MovementType::Initial,
                        quantity: variant.initial_stock,
                        reference: Some(sku.clone()),
                        created_at: now,
                    },
                )
                .await?;
            }

            variants.push(ProductVariant {
                id,
                product_id: product_id.clone(),
                sku,
                attributes: variant.attributes,
                tiers,
            });
        }

        tx.commit().await?;

        info!(id = %product_id, name = %name, variants = variants.len(), "Product created");

        Ok(Product {
            id: product_id,
            name,
            units,
            variants,
            created_at: now,
            updated_at: now,
        })
    }

    /// Gets a product with its units and variants.
    pub async fn get_product(&self, product_id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, created_at, updated_at FROM products WHERE id = ?1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let units = sqlx::query_as::<_, UnitRow>(
            r#"
            SELECT id, product_id, name, is_base, conversion_factor,
                   converts_to_unit_id, to_base
            FROM product_units
            WHERE product_id = ?1
            ORDER BY position
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ProductUnit::from)
        .collect();

        let variant_rows = sqlx::query_as::<_, VariantRow>(
            r#"
            SELECT id, product_id, sku, attributes
            FROM product_variants
            WHERE product_id = ?1
            ORDER BY position
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut variants = Vec::with_capacity(variant_rows.len());
        for v in variant_rows {
            let tiers = tiers_for_variant(&mut conn, &v.id).await?;
            variants.push(ProductVariant {
                attributes: serde_json::from_str(&v.attributes)?,
                id: v.id,
                product_id: v.product_id,
                sku: v.sku,
                tiers,
            });
        }

        Ok(Some(Product {
            id: row.id,
            name: row.name,
            units,
            variants,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    /// Reads a product's units back as declarations.
    ///
    /// Resolving the result yields the same `to_base` values that were
    /// stored at creation.
    pub async fn unit_declarations(&self, product_id: &str) -> DbResult<Vec<UnitDeclaration>> {
        let mut conn = self.pool.acquire().await?;
        unit_declarations_on(&mut conn, product_id).await
    }

    /// Finds a variant id by SKU.
    pub async fn variant_id_by_sku(&self, sku: &str) -> DbResult<Option<String>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM product_variants WHERE sku = ?1")
                .bind(sku.trim())
                .fetch_optional(&self.pool)
                .await?;

        Ok(id)
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_new_product(new: &NewProduct) -> Result<(), CoreError> {
    validate_product_name(&new.name)?;

    if new.variants.is_empty() {
        return Err(ValidationError::Required {
            field: "variants".to_string(),
        }
        .into());
    }

    let mut skus = HashSet::new();
    for variant in &new.variants {
        validate_sku(&variant.sku)?;
        if !skus.insert(variant.sku.trim().to_string()) {
            return Err(ValidationError::Duplicate {
                field: "sku".to_string(),
                value: variant.sku.trim().to_string(),
            }
            .into());
        }

        for attr in &variant.attributes {
            validate_attribute(&attr.name, &attr.value)?;
        }

        validate_tiers(&variant.tiers)?;

        validate_stock_quantity(variant.initial_stock)?;
    }

    Ok(())
}

// =============================================================================
// Unit-of-work operations
// =============================================================================

/// Catalog data for one cart line, read on the checkout's connection.
///
/// Fails `NotFound` when any id is unknown or when the variant or unit
/// belongs to a different product.
pub async fn lookup_line(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_id: &str,
    unit_id: &str,
) -> Result<LineCatalog, ServiceError> {
    let product_name: Option<String> = sqlx::query_scalar("SELECT name FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;
    let product_name = product_name.ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

    let variant: Option<(String, String)> = sqlx::query_as(
        "SELECT sku, attributes FROM product_variants WHERE id = ?1 AND product_id = ?2",
    )
    .bind(variant_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    let (sku, attributes) = variant.ok_or_else(|| CoreError::VariantNotFound(variant_id.to_string()))?;
    let attributes: Vec<VariantAttribute> =
        serde_json::from_str(&attributes).map_err(DbError::from)?;

    let unit_name: Option<String> =
        sqlx::query_scalar("SELECT name FROM product_units WHERE id = ?1 AND product_id = ?2")
            .bind(unit_id)
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
    let unit_name = unit_name.ok_or_else(|| CoreError::UnitNotFound(unit_id.to_string()))?;

    let units = unit_declarations_on(conn, product_id).await?;
    let tiers = tiers_for_variant(conn, variant_id).await?;

    Ok(LineCatalog {
        product_name,
        sku,
        attributes,
        unit_name,
        units,
        tiers,
    })
}

/// Declared units of a product, in creation order.
pub async fn unit_declarations_on(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<Vec<UnitDeclaration>> {
    let rows = sqlx::query_as::<_, DeclarationRow>(
        r#"
        SELECT u.name, u.is_base, u.conversion_factor, parent.name AS converts_to
        FROM product_units u
        LEFT JOIN product_units parent ON parent.id = u.converts_to_unit_id
        WHERE u.product_id = ?1
        ORDER BY u.position
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| UnitDeclaration {
            name: r.name,
            is_base: r.is_base,
            conversion_factor: r.conversion_factor,
            converts_to: r.converts_to,
        })
        .collect())
}

async fn tiers_for_variant(conn: &mut SqliteConnection, variant_id: &str) -> DbResult<Vec<PricingTier>> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT min_quantity, price
        FROM pricing_tiers
        WHERE variant_id = ?1
        ORDER BY min_quantity
        "#,
    )
    .bind(variant_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(min_quantity, price)| PricingTier::new(min_quantity, price))
        .collect())
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UnitRow {
    id: String,
    product_id: String,
    name: String,
    is_base: bool,
    conversion_factor: i64,
    converts_to_unit_id: Option<String>,
    to_base: i64,
}

impl From<UnitRow> for ProductUnit {
    fn from(row: UnitRow) -> Self {
        ProductUnit {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            is_base: row.is_base,
            conversion_factor: row.conversion_factor,
            converts_to_unit_id: row.converts_to_unit_id,
            to_base: row.to_base,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: String,
    product_id: String,
    sku: String,
    attributes: String,
}

#[derive(sqlx::FromRow)]
struct DeclarationRow {
    name: String,
    is_base: bool,
    conversion_factor: i64,
    converts_to: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::eggs;
    use kasir_core::{ErrorKind, NewVariant};

    #[tokio::test]
    async fn test_create_and_get_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.catalog().create_product(eggs("EGG-L", 144)).await.unwrap();

        assert_eq!(created.units.len(), 3);
        assert!(created.units[0].is_base);
        assert_eq!(created.unit_named("box").unwrap().to_base, 144);

        let loaded = db.catalog().get_product(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Eggs");
        assert_eq!(loaded.units, created.units);
        assert_eq!(loaded.variants, created.variants);
        assert_eq!(loaded.variants[0].label(), "Large / White");

        assert!(db.catalog().get_product("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_units_reference_parent_ids() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(eggs("EGG-L", 0)).await.unwrap();

        let pcs = product.unit_named("Pcs").unwrap();
        let dozen = product.unit_named("Dozen").unwrap();
        let bx = product.unit_named("Box").unwrap();
        assert_eq!(pcs.converts_to_unit_id, None);
        assert_eq!(dozen.converts_to_unit_id.as_deref(), Some(pcs.id.as_str()));
        assert_eq!(bx.converts_to_unit_id.as_deref(), Some(dozen.id.as_str()));
    }

    #[tokio::test]
    async fn test_unit_graph_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(eggs("EGG-L", 0)).await.unwrap();

        let declarations = db.catalog().unit_declarations(&product.id).await.unwrap();
        let graph = UnitGraph::resolve(&declarations).unwrap();
        for unit in &product.units {
            assert_eq!(graph.to_base(&unit.name), Some(unit.to_base));
        }
    }

    #[tokio::test]
    async fn test_initial_stock_and_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.catalog().create_product(eggs("EGG-L", 144)).await.unwrap();
        let variant_id = &product.variants[0].id;

        assert_eq!(db.stock().level(variant_id).await.unwrap(), 144);
        let movements = db.ledger().movements_for_variant(variant_id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Initial);
        assert_eq!(movements[0].quantity, 144);
    }

    #[tokio::test]
    async fn test_invalid_unit_graph_rejected_before_insert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut new = eggs("EGG-L", 0);
        new.units = vec![
            UnitDeclaration::derived("A", 2, "B"),
            UnitDeclaration::derived("B", 3, "A"),
        ];

        let err = db.catalog().create_product(new).await.unwrap_err();
        assert_eq!(err.to_string(), "exactly one base unit is required");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_tier_rules() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut new = eggs("EGG-L", 0);
        new.variants[0].tiers = vec![PricingTier::new(6, 100)];
        let err = db.catalog().create_product(new).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let mut new = eggs("EGG-L", 0);
        new.variants[0].tiers = vec![PricingTier::new(1, 100), PricingTier::new(1, 90)];
        assert!(db.catalog().create_product(new).await.is_err());

        let mut new = eggs("EGG-L", 0);
        new.variants[0].tiers = vec![PricingTier::new(12, 90), PricingTier::new(1, 100)];
        let err = db.catalog().create_product(new).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);

        let mut new = eggs("EGG-L", 0);
        new.variants[0].tiers = vec![PricingTier::new(1, 100), PricingTier::new(12, 90)];
        let product = db.catalog().create_product(new).await.unwrap();
        let minimums: Vec<i64> = product.variants[0].tiers.iter().map(|t| t.min_quantity).collect();
        assert_eq!(minimums, vec![1, 12]);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog().create_product(eggs("EGG-L", 0)).await.unwrap();

        let err = db.catalog().create_product(eggs("EGG-L", 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let mut new = eggs("EGG-M", 0);
        new.variants.push(NewVariant {
            sku: "EGG-M".into(),
            attributes: vec![],
            tiers: vec![PricingTier::new(1, 100)],
            initial_stock: 0,
        });
        let err = db.catalog().create_product(new).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_lookup_line_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = db.catalog().create_product(eggs("EGG-A", 0)).await.unwrap();
        let b = db.catalog().create_product(eggs("EGG-B", 0)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();

        let line = lookup_line(&mut conn, &a.id, &a.variants[0].id, &a.units[1].id)
            .await
            .unwrap();
        assert_eq!(line.product_name, "Eggs");
        assert_eq!(line.unit_name, "Dozen");
        assert_eq!(line.to_base().unwrap(), 12);

        let err = lookup_line(&mut conn, "nope", &a.variants[0].id, &a.units[0].id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // variant of another product
        let err = lookup_line(&mut conn, &a.id, &b.variants[0].id, &a.units[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::VariantNotFound(_))));

        // unit of another product
        let err = lookup_line(&mut conn, &a.id, &a.variants[0].id, &b.units[0].id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::UnitNotFound(_))));
    }
}
