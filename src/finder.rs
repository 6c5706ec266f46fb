//! Supplier search: join-style assembly over the CRM and BI wrappers.
//!
//! The finder answers "which suppliers carry these products in this state
//! (or its region), and how active have they been lately?". It loads four
//! source tables once at construction — product catalogue and state codes
//! from the CRM, supplier activity from the BI store — key-joins them into
//! one denormalized supplier×product×location table, and filters that in
//! memory. Nothing is cached beyond the struct's lifetime and nothing is
//! re-fetched; build a new finder for fresh data.

use crate::clients::metabase::MetabaseClient;
use crate::clients::salesforce::SalesforceClient;
use crate::error::ClientError;
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::{debug, info};

/// SQL/SOQL text supplied inline or loaded from a file.
#[derive(Debug, Clone)]
pub enum QuerySource {
    Inline(String),
    Path(PathBuf),
}

impl QuerySource {
    /// The query text, reading the file for the path variant.
    pub fn read(&self) -> Result<String, ClientError> {
        match self {
            QuerySource::Inline(text) => Ok(text.clone()),
            QuerySource::Path(path) => {
                std::fs::read_to_string(path).map_err(|source| ClientError::CredentialIo {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// The five queries the finder runs at load time.
///
/// The CRM queries must select the columns named in the rename tables below;
/// the BI docs query must produce `doc_id`, `mp_id`, `tipo` and `doc_date`
/// and carry the pagination placeholder comments.
#[derive(Debug, Clone)]
pub struct FinderQueries {
    /// SOQL: product catalogue (`Id`, `Name`, `Family`, `rm_material__c`).
    pub catalogue: QuerySource,
    /// SOQL: supplier accounts (`Id`, `Name`).
    pub suppliers: QuerySource,
    /// SOQL: state codes (`States__c`, `state_code__c`, `Region__c`).
    pub states: QuerySource,
    /// SOQL: supplier↔product links (`product__c`, `account__c`).
    pub supplier_products: QuerySource,
    /// SOQL: supplier addresses (`Account__c`, `location__StateCode__s`).
    pub addresses: QuerySource,
    /// BI SQL: quote/work-order documents per supplier.
    pub docs: QuerySource,
}

/// Load-time knobs.
#[derive(Debug, Clone)]
pub struct FinderOptions {
    /// How many days back a document still counts as recent activity.
    pub interval_days: i64,
    /// BI database the docs query runs against.
    pub database_id: i64,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            interval_days: 30,
            database_id: 6,
        }
    }
}

/// Output controls for [`SupplierFinder::filter_suppliers`].
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Match the whole region of the requested state, not just the state.
    pub include_region: bool,
    /// Include the recent-quote count in the result rows.
    pub show_quotes: bool,
    /// Include the recent-work-order count in the result rows.
    pub show_wos: bool,
}

/// One supplier in a filter result: which of the requested products it
/// carries, where it sits, and how active it has been.
#[derive(Debug, Clone)]
pub struct SupplierMatch {
    pub supplier_name: String,
    /// Set in region mode, where matches span several states.
    pub state: Option<String>,
    pub quotes: Option<i64>,
    pub wos: Option<i64>,
    /// Requested product name → carried by this supplier.
    pub products: BTreeMap<String, bool>,
}

impl SupplierMatch {
    fn coverage(&self) -> usize {
        self.products.values().filter(|v| **v).count()
    }
}

/// The assembled lookup structure.
pub struct SupplierFinder {
    catalogue: Table,
    states: Table,
    suppliers: Table,
    db: Table,
}

fn rename(mut table: Table, pairs: &[(&str, &str)]) -> Table {
    let mapping: HashMap<String, String> = pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
    table.rename_columns(&mapping);
    table
}

/// Whether `date` falls within `n_days` of `now`, either side.
fn on_interval(date: DateTime<Utc>, now: DateTime<Utc>, n_days: i64) -> bool {
    (now - date).num_days().abs() <= n_days
}

/// Count recent documents per supplier and kind.
///
/// `docs` rows carry `mp_id`, `tipo` (`quotes` / `wos`) and an ISO-8601
/// `doc_date`; rows outside the interval or with unparseable dates are
/// ignored.
fn count_recent_docs(
    docs: &Table,
    now: DateTime<Utc>,
    interval_days: i64,
) -> Result<Table, ClientError> {
    let mp_idx = docs.column_index("mp_id");
    let tipo_idx = docs.column_index("tipo");
    let date_idx = docs.column_index("doc_date");
    let (Some(mp_idx), Some(tipo_idx), Some(date_idx)) = (mp_idx, tipo_idx, date_idx) else {
        return Err(ClientError::InvalidQuery(
            "docs query must produce mp_id, tipo and doc_date".into(),
        ));
    };

    let mut counts: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for row in docs.rows() {
        let Some(date) = row[date_idx]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        else {
            continue;
        };
        if !on_interval(date.with_timezone(&Utc), now, interval_days) {
            continue;
        }
        let Some(mp_id) = row[mp_idx].as_str() else {
            continue;
        };
        let entry = counts.entry(mp_id.to_string()).or_default();
        match row[tipo_idx].as_str() {
            Some("quotes") => entry.0 += 1,
            Some("wos") => entry.1 += 1,
            _ => {}
        }
    }

    let mut table = Table::with_columns(vec!["supplier_id", "quotes", "wos"]);
    for (mp_id, (quotes, wos)) in counts {
        table.push_row(vec![Value::String(mp_id), quotes.into(), wos.into()])?;
    }
    Ok(table)
}

impl SupplierFinder {
    /// Run the five load queries and assemble the denormalized table.
    pub async fn load(
        sf: &SalesforceClient,
        mb: &MetabaseClient,
        queries: &FinderQueries,
        options: &FinderOptions,
    ) -> Result<Self, ClientError> {
        let catalogue = rename(
            sf.query(&queries.catalogue.read()?).await?,
            &[
                ("Id", "product_id"),
                ("Name", "product_name"),
                ("Family", "product_family"),
                ("rm_material__c", "material"),
            ],
        );

        let states = rename(
            sf.query(&queries.states.read()?).await?,
            &[
                ("States__c", "state"),
                ("state_code__c", "state_code"),
                ("Region__c", "region"),
            ],
        );

        let suppliers = {
            let names = rename(
                sf.query(&queries.suppliers.read()?).await?,
                &[("Id", "supplier_id"), ("Name", "supplier_name")],
            );

            // Activity lives in the BI store and routinely exceeds the
            // server's page cap, hence the paginated fetch.
            let docs = mb
                .query_paginated(
                    &queries.docs.read()?,
                    "doc_id",
                    0.0,
                    options.database_id,
                )
                .await?;
            let counts = count_recent_docs(&docs, Utc::now(), options.interval_days)?;
            let mut joined = names.left_join(&counts, "supplier_id", "supplier_id")?;
            fill_null_counts(&mut joined)?;
            joined
        };

        let addresses = rename(
            sf.query(&queries.addresses.read()?).await?,
            &[
                ("Account__c", "supplier_id"),
                ("location__StateCode__s", "state_code"),
            ],
        );
        let supplier_products = rename(
            sf.query(&queries.supplier_products.read()?).await?,
            &[("product__c", "product_id"), ("account__c", "supplier_id")],
        );

        let db = addresses
            .left_join(&suppliers, "supplier_id", "supplier_id")?
            .inner_join(&states, "state_code", "state_code")?
            .inner_join(&supplier_products, "supplier_id", "supplier_id")?
            .inner_join(&catalogue, "product_id", "product_id")?;

        info!(
            "Supplier finder loaded: {} suppliers, {} products, {} db rows",
            suppliers.len(),
            catalogue.len(),
            db.len()
        );

        Ok(Self {
            catalogue,
            states,
            suppliers,
            db,
        })
    }

    pub fn catalogue(&self) -> &Table {
        &self.catalogue
    }

    pub fn states(&self) -> &Table {
        &self.states
    }

    pub fn suppliers(&self) -> &Table {
        &self.suppliers
    }

    pub fn db(&self) -> &Table {
        &self.db
    }

    /// Suppliers carrying any of `products` in `state` (or its whole region),
    /// sorted by how many of the requested products each one covers.
    pub fn filter_suppliers(
        &self,
        products: &[&str],
        state: &str,
        options: &FilterOptions,
    ) -> Result<Vec<SupplierMatch>, ClientError> {
        let region = if options.include_region {
            Some(self.region_of(state)?)
        } else {
            None
        };

        let col = |name: &str| {
            self.db.column_index(name).ok_or_else(|| {
                ClientError::Internal(format!("assembled table lacks column '{name}'"))
            })
        };
        let (name_idx, state_idx, region_idx, product_idx) = (
            col("supplier_name")?,
            col("state")?,
            col("region")?,
            col("product_name")?,
        );
        let quotes_idx = col("quotes")?;
        let wos_idx = col("wos")?;

        // Key: supplier (plus state in region mode, where one supplier may
        // appear in several states).
        let mut matches: BTreeMap<String, SupplierMatch> = BTreeMap::new();

        for row in self.db.rows() {
            let product = row[product_idx].as_str().unwrap_or_default();
            if !products.contains(&product) {
                continue;
            }
            let row_state = row[state_idx].as_str().unwrap_or_default();
            let located = match region {
                Some(ref r) => row[region_idx].as_str() == Some(r.as_str()),
                None => row_state == state,
            };
            if !located {
                continue;
            }

            let name = row[name_idx].as_str().unwrap_or_default().to_string();
            let key = match region {
                Some(_) => format!("{name}\u{1f}{row_state}"),
                None => name.clone(),
            };

            let entry = matches.entry(key).or_insert_with(|| SupplierMatch {
                supplier_name: name,
                state: region.is_some().then(|| row_state.to_string()),
                quotes: options.show_quotes.then(|| row[quotes_idx].as_i64()).flatten(),
                wos: options.show_wos.then(|| row[wos_idx].as_i64()).flatten(),
                products: products.iter().map(|p| (p.to_string(), false)).collect(),
            });
            entry.products.insert(product.to_string(), true);
        }

        let mut result: Vec<SupplierMatch> = matches.into_values().collect();
        result.sort_by(|a, b| {
            b.coverage()
                .cmp(&a.coverage())
                .then_with(|| a.supplier_name.cmp(&b.supplier_name))
        });
        debug!("Filter matched {} suppliers", result.len());
        Ok(result)
    }

    fn region_of(&self, state: &str) -> Result<String, ClientError> {
        let state_idx = self
            .states
            .column_index("state")
            .ok_or_else(|| ClientError::Internal("states table lacks 'state'".into()))?;
        let region_idx = self
            .states
            .column_index("region")
            .ok_or_else(|| ClientError::Internal("states table lacks 'region'".into()))?;

        self.states
            .rows()
            .iter()
            .find(|r| r[state_idx].as_str() == Some(state))
            .and_then(|r| r[region_idx].as_str())
            .map(str::to_string)
            .ok_or_else(|| ClientError::InvalidInput(format!("unknown state '{state}'")))
    }

    /// Contact rows for the named suppliers, dropping contacts with no
    /// phone, mobile, email or title.
    pub async fn contact_info(
        &self,
        sf: &SalesforceClient,
        supplier_names: &[&str],
    ) -> Result<Table, ClientError> {
        let id_idx = self
            .suppliers
            .column_index("supplier_id")
            .ok_or_else(|| ClientError::Internal("suppliers table lacks 'supplier_id'".into()))?;
        let name_idx = self
            .suppliers
            .column_index("supplier_name")
            .ok_or_else(|| ClientError::Internal("suppliers table lacks 'supplier_name'".into()))?;

        let chosen_ids: Vec<&str> = self
            .suppliers
            .rows()
            .iter()
            .filter(|r| {
                r[name_idx]
                    .as_str()
                    .is_some_and(|n| supplier_names.contains(&n))
            })
            .filter_map(|r| r[id_idx].as_str())
            .collect();

        if chosen_ids.is_empty() {
            return Ok(Table::default());
        }

        let filter = chosen_ids
            .iter()
            .map(|id| format!("AccountId = '{id}'"))
            .collect::<Vec<_>>()
            .join(" or ");
        let soql = format!(
            "select AccountId, LastName, FirstName, Phone, MobilePhone, Email, Title \
             from Contact where {filter}"
        );

        let contacts = rename(sf.query(&soql).await?, &[("AccountId", "supplier_id")]);
        let contacts = drop_rows_without_contact_channel(contacts)?;
        contacts.inner_join(&self.suppliers, "supplier_id", "supplier_id")
    }
}

/// Replace null quote/work-order counts (suppliers with no recent activity)
/// with zero so the columns stay numeric.
fn fill_null_counts(table: &mut Table) -> Result<(), ClientError> {
    let quotes_idx = table.column_index("quotes");
    let wos_idx = table.column_index("wos");
    let (Some(quotes_idx), Some(wos_idx)) = (quotes_idx, wos_idx) else {
        return Err(ClientError::Internal(
            "activity join lost the quotes/wos columns".into(),
        ));
    };

    let mut filled = Table::with_columns(table.columns().to_vec());
    for row in table.rows() {
        let mut row = row.clone();
        for idx in [quotes_idx, wos_idx] {
            if row[idx].is_null() {
                row[idx] = 0.into();
            }
        }
        filled.push_row(row)?;
    }
    *table = filled;
    Ok(())
}

/// Keep only contact rows with at least one way to reach the person.
fn drop_rows_without_contact_channel(table: Table) -> Result<Table, ClientError> {
    let channel_indices: Vec<usize> = ["Phone", "MobilePhone", "Email", "Title"]
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();

    let mut kept = Table::with_columns(table.columns().to_vec());
    for row in table.rows() {
        if channel_indices.iter().any(|&i| !row[i].is_null()) {
            kept.push_row(row.clone())?;
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn interval_check_is_symmetric() {
        let now = Utc::now();
        assert!(on_interval(now - Duration::days(10), now, 30));
        assert!(on_interval(now + Duration::days(10), now, 30));
        assert!(!on_interval(now - Duration::days(31), now, 30));
    }

    fn docs_table(rows: Vec<Vec<Value>>) -> Table {
        Table::new(
            vec![
                "doc_id".into(),
                "mp_id".into(),
                "tipo".into(),
                "doc_date".into(),
            ],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn counts_recent_docs_per_supplier() {
        let now = Utc::now();
        let recent = (now - Duration::days(5)).to_rfc3339();
        let stale = (now - Duration::days(90)).to_rfc3339();

        let docs = docs_table(vec![
            vec![json!(1), json!("acc1"), json!("quotes"), json!(recent)],
            vec![json!(2), json!("acc1"), json!("quotes"), json!(recent)],
            vec![json!(3), json!("acc1"), json!("wos"), json!(recent)],
            vec![json!(4), json!("acc1"), json!("quotes"), json!(stale)],
            vec![json!(5), json!("acc2"), json!("wos"), json!(recent)],
            vec![json!(6), json!("acc3"), json!("quotes"), json!("not-a-date")],
        ]);

        let counts = count_recent_docs(&docs, now, 30).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get(0, "quotes"), Some(&json!(2)));
        assert_eq!(counts.get(0, "wos"), Some(&json!(1)));
        assert_eq!(counts.get(1, "quotes"), Some(&json!(0)));
        assert_eq!(counts.get(1, "wos"), Some(&json!(1)));
    }

    #[test]
    fn docs_without_expected_columns_is_invalid_query() {
        let docs = Table::with_columns(vec!["id"]);
        let err = count_recent_docs(&docs, Utc::now(), 30).unwrap_err();
        assert!(matches!(err, ClientError::InvalidQuery(_)));
    }

    #[test]
    fn fill_null_counts_zeroes_missing_activity() {
        let mut t = Table::new(
            vec!["supplier_id".into(), "quotes".into(), "wos".into()],
            vec![
                vec![json!("a"), json!(3), json!(1)],
                vec![json!("b"), Value::Null, Value::Null],
            ],
        )
        .unwrap();
        fill_null_counts(&mut t).unwrap();
        assert_eq!(t.get(1, "quotes"), Some(&json!(0)));
        assert_eq!(t.get(1, "wos"), Some(&json!(0)));
    }

    #[test]
    fn contact_rows_without_any_channel_are_dropped() {
        let t = Table::new(
            vec!["supplier_id".into(), "Phone".into(), "Email".into(), "Title".into(), "MobilePhone".into()],
            vec![
                vec![json!("a"), Value::Null, json!("x@y.mx"), Value::Null, Value::Null],
                vec![json!("b"), Value::Null, Value::Null, Value::Null, Value::Null],
            ],
        )
        .unwrap();
        let kept = drop_rows_without_contact_channel(t).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get(0, "supplier_id"), Some(&json!("a")));
    }

    fn finder_with_db() -> SupplierFinder {
        let db = Table::new(
            vec![
                "supplier_id".into(),
                "state_code".into(),
                "supplier_name".into(),
                "quotes".into(),
                "wos".into(),
                "state".into(),
                "region".into(),
                "product_id".into(),
                "product_name".into(),
                "product_family".into(),
                "material".into(),
            ],
            vec![
                vec![
                    json!("a1"), json!("CMX"), json!("Aceros Norte"), json!(4), json!(1),
                    json!("CDMX"), json!("Centro"), json!("p1"), json!("Lámina"),
                    json!("plano"), json!("acero"),
                ],
                vec![
                    json!("a1"), json!("CMX"), json!("Aceros Norte"), json!(4), json!(1),
                    json!("CDMX"), json!("Centro"), json!("p2"), json!("Placa"),
                    json!("plano"), json!("acero"),
                ],
                vec![
                    json!("a2"), json!("CMX"), json!("Metales Sur"), json!(0), json!(0),
                    json!("CDMX"), json!("Centro"), json!("p1"), json!("Lámina"),
                    json!("plano"), json!("acero"),
                ],
                vec![
                    json!("a3"), json!("MOR"), json!("Hierros MOR"), json!(2), json!(2),
                    json!("Morelos"), json!("Centro"), json!("p1"), json!("Lámina"),
                    json!("plano"), json!("acero"),
                ],
            ],
        )
        .unwrap();

        let states = Table::new(
            vec!["state".into(), "state_code".into(), "region".into()],
            vec![
                vec![json!("CDMX"), json!("CMX"), json!("Centro")],
                vec![json!("Morelos"), json!("MOR"), json!("Centro")],
            ],
        )
        .unwrap();

        SupplierFinder {
            catalogue: Table::default(),
            states,
            suppliers: Table::default(),
            db,
        }
    }

    #[test]
    fn filter_by_state_ranks_by_coverage() {
        let finder = finder_with_db();
        let result = finder
            .filter_suppliers(&["Lámina", "Placa"], "CDMX", &FilterOptions::default())
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].supplier_name, "Aceros Norte");
        assert_eq!(result[0].products["Lámina"], true);
        assert_eq!(result[0].products["Placa"], true);
        assert_eq!(result[1].supplier_name, "Metales Sur");
        assert_eq!(result[1].products["Placa"], false);
        // State mode: no per-row state, counts hidden by default.
        assert!(result[0].state.is_none());
        assert!(result[0].quotes.is_none());
    }

    #[test]
    fn filter_by_region_includes_neighbouring_states() {
        let finder = finder_with_db();
        let options = FilterOptions {
            include_region: true,
            show_quotes: true,
            show_wos: true,
        };
        let result = finder
            .filter_suppliers(&["Lámina"], "CDMX", &options)
            .unwrap();

        let names: Vec<&str> = result.iter().map(|m| m.supplier_name.as_str()).collect();
        assert!(names.contains(&"Hierros MOR"));
        let hierros = result
            .iter()
            .find(|m| m.supplier_name == "Hierros MOR")
            .unwrap();
        assert_eq!(hierros.state.as_deref(), Some("Morelos"));
        assert_eq!(hierros.quotes, Some(2));
    }

    #[test]
    fn unknown_state_in_region_mode_is_invalid_input() {
        let finder = finder_with_db();
        let options = FilterOptions {
            include_region: true,
            ..Default::default()
        };
        let err = finder
            .filter_suppliers(&["Lámina"], "Aztlán", &options)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }
}
