//! Product and bug listing across the three ZenTao dialects.
//!
//! [`ZentaoClient::list_products`] and [`ZentaoClient::list_bugs_for_product`]
//! pick one accessor for the active dialect and run it under the
//! relogin-and-retry-once policy. Every bug leaves this module normalized.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::client::{legacy_data, ZentaoClient};
use super::error::{ApiError, Result};
use super::types::{text_of, Bug, Product};

/// Page size requested from the REST dialects.
const REST_PAGE_LIMIT: u32 = 500;

/// Product whose legacy bug list is used to discover products.
const DEFAULT_PRODUCT_ID: &str = "1";

/// Name of the placeholder product returned when none can be discovered.
pub const PLACEHOLDER_PRODUCT_NAME: &str = "Default product";

/// Accessor for the token-based REST dialects.
struct RestAccessor<'a> {
    client: &'a ZentaoClient,
    prefix: &'static str,
}

impl RestAccessor<'_> {
    async fn products(&self) -> Result<Vec<Product>> {
        let path = format!("{}/products?limit={}", self.prefix, REST_PAGE_LIMIT);
        let body = self.client.get_json(&path).await?;
        let products = body
            .get("products")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::InvalidResponse("response has no products list".to_string()))?;
        Ok(products.iter().filter_map(Product::from_raw).collect())
    }

    async fn bugs(&self, product_id: &str) -> Result<Vec<Bug>> {
        let path = format!(
            "{}/products/{}/bugs?limit={}",
            self.prefix, product_id, REST_PAGE_LIMIT
        );
        let body = self.client.get_json(&path).await?;
        let bugs = body
            .get("bugs")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ApiError::InvalidResponse(format!(
                    "product {} response has no bugs list",
                    product_id
                ))
            })?;
        Ok(bugs.iter().map(Bug::from_raw).collect())
    }
}

/// Accessor for the legacy session dialect.
struct LegacyAccessor<'a> {
    client: &'a ZentaoClient,
}

impl LegacyAccessor<'_> {
    /// List products, falling back to discovery from a bug list and then to
    /// a single placeholder product.
    ///
    /// Only a missing endpoint or an unusable payload moves on to the next
    /// source; server and transport failures propagate.
    async fn products(&self) -> Result<Vec<Product>> {
        let products = self
            .discover("product-all.json", products_from_data)
            .await?;
        if !products.is_empty() {
            return Ok(products);
        }

        let path = format!("bug-browse-{}.json", DEFAULT_PRODUCT_ID);
        let products = self.discover(&path, products_from_bug_browse).await?;
        if !products.is_empty() {
            return Ok(products);
        }

        warn!("No products discovered, using placeholder product {}", DEFAULT_PRODUCT_ID);
        Ok(vec![Product::new(DEFAULT_PRODUCT_ID, PLACEHOLDER_PRODUCT_NAME)])
    }

    /// Products extracted from one legacy endpoint, or none when the
    /// endpoint is missing or its payload carries no product data.
    async fn discover(
        &self,
        path: &str,
        extract: fn(&Value) -> Vec<Product>,
    ) -> Result<Vec<Product>> {
        match self.client.get_json(path).await {
            Ok(body) => {
                let products = legacy_data(&body)
                    .map(|data| extract(&data))
                    .unwrap_or_default();
                if products.is_empty() {
                    debug!("{} returned no products", path);
                }
                Ok(products)
            }
            Err(e) if e.is_not_found() || !e.is_core() => {
                debug!("{} unusable: {}", path, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn bugs(&self, product_id: &str) -> Result<Vec<Bug>> {
        let path = format!("bug-browse-{}.json", product_id);
        let body = self.client.get_json(&path).await?;
        let data = legacy_data(&body).ok_or_else(|| {
            ApiError::InvalidResponse(format!("product {} response has no data", product_id))
        })?;
        match data.get("bugs") {
            Some(Value::Array(bugs)) => Ok(bugs.iter().map(Bug::from_raw).collect()),
            Some(Value::Object(bugs)) => {
                let mut bugs: Vec<Bug> = bugs.values().map(Bug::from_raw).collect();
                bugs.sort_by_key(|bug| id_sort_key(&bug.id));
                Ok(bugs)
            }
            _ => Err(ApiError::InvalidResponse(format!(
                "product {} response has no bugs",
                product_id
            ))),
        }
    }
}

/// The accessor for the active dialect.
enum Accessor<'a> {
    Rest(RestAccessor<'a>),
    Legacy(LegacyAccessor<'a>),
}

impl Accessor<'_> {
    async fn products(&self) -> Result<Vec<Product>> {
        match self {
            Accessor::Rest(rest) => rest.products().await,
            Accessor::Legacy(legacy) => legacy.products().await,
        }
    }

    async fn bugs(&self, product_id: &str) -> Result<Vec<Bug>> {
        match self {
            Accessor::Rest(rest) => rest.bugs(product_id).await,
            Accessor::Legacy(legacy) => legacy.bugs(product_id).await,
        }
    }
}

impl ZentaoClient {
    /// Select the accessor for the active dialect.
    fn accessor(&self) -> Result<Accessor<'_>> {
        let dialect = self
            .dialect()
            .ok_or_else(|| ApiError::SessionExpired("no dialect negotiated".to_string()))?;
        Ok(match dialect.rest_prefix() {
            Some(prefix) => Accessor::Rest(RestAccessor {
                client: self,
                prefix,
            }),
            None => Accessor::Legacy(LegacyAccessor { client: self }),
        })
    }

    async fn fetch_products(&self) -> Result<Vec<Product>> {
        self.accessor()?.products().await
    }

    async fn fetch_bugs(&self, product_id: &str) -> Result<Vec<Bug>> {
        self.accessor()?.bugs(product_id).await
    }

    /// List all products visible to the account.
    ///
    /// Retries once after a relogin if the session expired.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let products = self
            .with_relogin(move || self.fetch_products())
            .await?;
        debug!("Listed {} products", products.len());
        Ok(products)
    }

    /// List the normalized bugs of one product.
    ///
    /// Retries once after a relogin if the session expired; other failures
    /// propagate.
    #[instrument(skip(self))]
    pub async fn list_bugs_for_product(&self, product_id: &str) -> Result<Vec<Bug>> {
        let bugs = self
            .with_relogin(move || self.fetch_bugs(product_id))
            .await?;
        debug!("Product {} has {} bugs", product_id, bugs.len());
        Ok(bugs)
    }

    /// List bugs opened or edited at or after `watermark`.
    ///
    /// With no `product_ids` every product is scanned. Products are fetched
    /// one after another; a product whose response cannot be understood is
    /// logged and skipped, while any other error aborts the whole call.
    /// Without a watermark the unfiltered union is returned. Bugs are not
    /// deduplicated.
    #[instrument(skip(self, product_ids))]
    pub async fn list_bugs_since(
        &self,
        watermark: Option<&str>,
        product_ids: Option<&[String]>,
    ) -> Result<Vec<Bug>> {
        let product_ids: Vec<String> = match product_ids {
            Some(ids) if !ids.is_empty() => ids.to_vec(),
            _ => self
                .list_products()
                .await?
                .into_iter()
                .map(|product| product.id)
                .collect(),
        };

        let mut all_bugs = Vec::new();
        for product_id in &product_ids {
            match self.list_bugs_for_product(product_id).await {
                Ok(bugs) => all_bugs.extend(bugs),
                Err(e) if e.is_core() => return Err(e),
                Err(e) => warn!(product_id = %product_id, "Skipping product: {}", e),
            }
        }

        let bugs = match watermark.map(str::trim).filter(|w| !w.is_empty()) {
            Some(watermark) => filter_since(all_bugs, watermark),
            None => all_bugs,
        };
        info!(
            "Fetched {} bugs across {} products",
            bugs.len(),
            product_ids.len()
        );
        Ok(bugs)
    }
}

/// Keep bugs opened or last edited at or after `watermark`.
pub fn filter_since(bugs: Vec<Bug>, watermark: &str) -> Vec<Bug> {
    bugs.into_iter()
        .filter(|bug| bug.touched_since(watermark))
        .collect()
}

/// Products from a legacy `products` field (id-keyed map or list).
fn products_from_data(data: &Value) -> Vec<Product> {
    let mut products: Vec<Product> = match data.get("products") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(id, value)| match value {
                Value::Object(_) => Product::from_raw(value),
                other => Some(Product::new(id.clone(), text_of(Some(other)))),
            })
            .collect(),
        Some(Value::Array(list)) => list.iter().filter_map(Product::from_raw).collect(),
        _ => Vec::new(),
    };
    products.sort_by_key(|product| id_sort_key(&product.id));
    products
}

/// Products discovered from a legacy bug-browse payload.
///
/// Uses its `products` field when present, else the distinct products the
/// bugs belong to.
fn products_from_bug_browse(data: &Value) -> Vec<Product> {
    let products = products_from_data(data);
    if !products.is_empty() {
        return products;
    }

    let raw_bugs: Vec<&Value> = match data.get("bugs") {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    };

    let mut products: Vec<Product> = Vec::new();
    for raw in raw_bugs {
        let product = match raw.get("product") {
            Some(value @ Value::Object(_)) => Product::from_raw(value),
            other => {
                let id = text_of(other);
                (!id.is_empty() && id != "0")
                    .then(|| Product::new(id.clone(), id))
            }
        };
        if let Some(product) = product {
            if !products.iter().any(|p| p.id == product.id) {
                products.push(product);
            }
        }
    }
    products.sort_by_key(|product| id_sort_key(&product.id));
    products
}

/// Sort key ordering numeric ids numerically, then others lexically.
fn id_sort_key(id: &str) -> (u64, String) {
    (id.parse().unwrap_or(u64::MAX), id.to_string())
}
