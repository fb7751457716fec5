//! # Bundle Repository
//!
//! Bundle definition rows. Replacing or removing rows never touches the
//! allocation ledger: sales already costed keep their component rows.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use cogs_core::BundleComponent;

#[derive(Debug, sqlx::FromRow)]
struct ComponentRow {
    bundle_sku: String,
    component_sku: String,
    quantity_per_bundle: i64,
}

impl From<ComponentRow> for BundleComponent {
    fn from(row: ComponentRow) -> Self {
        BundleComponent {
            bundle_sku: row.bundle_sku,
            component_sku: row.component_sku,
            quantity_per_bundle: row.quantity_per_bundle,
        }
    }
}

/// Component rows of `bundle_sku`, ordered by component SKU.
pub async fn components_of(
    conn: &mut SqliteConnection,
    bundle_sku: &str,
) -> DbResult<Vec<BundleComponent>> {
    let rows = sqlx::query_as::<_, ComponentRow>(
        r#"
        SELECT bundle_sku, component_sku, quantity_per_bundle
        FROM bundle_components
        WHERE bundle_sku = ?1
        ORDER BY component_sku
        "#,
    )
    .bind(bundle_sku)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(BundleComponent::from).collect())
}

/// Replaces the whole definition of `bundle_sku` with `rows`.
///
/// Run inside a transaction so readers never see a half-written definition.
pub async fn replace(
    conn: &mut SqliteConnection,
    bundle_sku: &str,
    rows: &[BundleComponent],
) -> DbResult<()> {
    debug!(bundle_sku = %bundle_sku, components = rows.len(), "Replacing bundle definition");

    sqlx::query("DELETE FROM bundle_components WHERE bundle_sku = ?1")
        .bind(bundle_sku)
        .execute(&mut *conn)
        .await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO bundle_components (bundle_sku, component_sku, quantity_per_bundle)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&row.bundle_sku)
        .bind(&row.component_sku)
        .bind(row.quantity_per_bundle)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Deletes one component row. Returns whether a row existed.
pub async fn remove(
    conn: &mut SqliteConnection,
    bundle_sku: &str,
    component_sku: &str,
) -> DbResult<bool> {
    let result = sqlx::query(
        "DELETE FROM bundle_components WHERE bundle_sku = ?1 AND component_sku = ?2",
    )
    .bind(bundle_sku)
    .bind(component_sku)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Repository for bundle definition reads.
#[derive(Debug, Clone)]
pub struct BundleRepository {
    pool: SqlitePool,
}

impl BundleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BundleRepository { pool }
    }

    /// Gets the components of a bundle.
    pub async fn components(&self, bundle_sku: &str) -> DbResult<Vec<BundleComponent>> {
        let mut conn = self.pool.acquire().await?;
        components_of(&mut conn, bundle_sku).await
    }

    /// Bundles that list `component_sku` as a component.
    pub async fn bundles_containing(&self, component_sku: &str) -> DbResult<Vec<String>> {
        let skus: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT bundle_sku FROM bundle_components
            WHERE component_sku = ?1
            ORDER BY bundle_sku
            "#,
        )
        .bind(component_sku)
        .fetch_all(&self.pool)
        .await?;

        Ok(skus)
    }
}
