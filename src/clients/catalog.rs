//! Catalog (GraphQL) wrapper: master codes, item mutations, dimension
//! building.
//!
//! The catalog platform models every enumerable attribute (material, grade,
//! finish, thickness…) as a "master code" keyed by a type string, and every
//! item as a set of coded attributes plus a list of typed dimensions. This
//! wrapper builds the GraphQL documents, performs one POST per operation,
//! and reshapes the responses.
//!
//! Thickness is the awkward one: the platform stores it as a bare integer
//! master code that is the physical measure ×10 000 for real widths, but an
//! opaque table entry for sheet gauges ("Cal. 18") and pipe schedules
//! ("XXS"). The equivalence table and the mixed-fraction parser in this
//! module are the single place that mapping lives.

use crate::error::ClientError;
use crate::table::Table;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Master-code type prefix for the raw-material attribute families.
const RAW_MATERIAL_PREFIX: &str = "RawMaterial";

/// Which deployment of the catalog platform to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEnv {
    Production,
    Uat,
}

impl CatalogEnv {
    fn endpoint(self) -> &'static str {
        match self {
            CatalogEnv::Production => "https://api.ichigo.prima.ai/graphql/",
            CatalogEnv::Uat => "https://api.uat.prima.ai/graphql/",
        }
    }
}

/// Measurement units the platform accepts on a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    Meter,
    Feet,
    Inch,
}

/// One typed dimension of an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimension {
    pub type_code: String,
    pub unit_code: Option<Unit>,
    pub measure: Value,
}

impl Dimension {
    fn new(type_code: &str, unit_code: Option<Unit>, measure: Value) -> Self {
        Self {
            type_code: type_code.to_string(),
            unit_code,
            measure,
        }
    }
}

/// Item families, each with its own set of mandatory dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFamily {
    /// Flat products: sheet and plate.
    Plano,
    /// Angles and structural profiles.
    Perfil,
    /// Purlins.
    Polin,
    /// Beams and channels.
    VigaCanal,
    /// Solid bars.
    LargoSolido,
    /// Pipe.
    Tuberia,
}

/// The raw measurements an item may carry; [`build_dimensions`] validates
/// the subset a family requires and assembles the platform's dimension list.
#[derive(Debug, Clone, Default)]
pub struct DimensionSpec {
    /// Thickness as a measure ("0.25", "1-1/2") or a gauge label ("Cal. 18").
    pub thickness: Option<String>,
    pub width_unit: Option<Unit>,
    pub width_value: Option<f64>,
    pub length_unit: Option<Unit>,
    pub length_value: Option<f64>,
    pub wall_length: Option<f64>,
    pub wall_width: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub d: Option<f64>,
    pub kg_m: Option<f64>,
    pub depth: Option<f64>,
    pub diameter: Option<f64>,
    /// Pipe schedule: numeric ("40") or the reinforced designations
    /// ("XXS", "X") routed through the equivalence table.
    pub schedule: Option<String>,
}

/// A newly created master code as echoed back by the platform.
#[derive(Debug, Clone)]
pub struct MasterCode {
    pub code: String,
    pub type_: String,
}

/// Id and SKU of a newly created catalog item.
#[derive(Debug, Clone)]
pub struct CreatedItem {
    pub id: i64,
    pub sku: String,
}

/// Input for [`CatalogClient::create_item`].
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub weight: f64,
    pub material: String,
    pub classification: String,
    pub grade: String,
    pub presentation: Option<String>,
    pub finish: Option<String>,
    /// Profile designation, only meaningful for beams and channels.
    pub dimension: Option<String>,
    pub dimensions: Vec<Dimension>,
}

/// Bearer-token GraphQL client for the catalog platform.
pub struct CatalogClient {
    http: reqwest::Client,
    endpoint: String,
    bearer_token: String,
}

impl CatalogClient {
    pub fn new(bearer_token: impl Into<String>, env: CatalogEnv) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: env.endpoint().to_string(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Point the client at a non-standard deployment (e.g. a local stub).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// POST one GraphQL document and unwrap the `data` payload.
    ///
    /// GraphQL transports errors in-band with HTTP 200; a non-empty `errors`
    /// array is surfaced as [`ClientError::RemoteApi`].
    async fn execute(
        &self,
        operation_name: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("authorization", &self.bearer_token)
            .json(&json!({
                "query": query,
                "variables": variables,
                "operationName": operation_name,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        if status >= 400 {
            return Err(ClientError::from_status("catalog", status, body));
        }

        let json: Value =
            serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
                platform: "catalog".into(),
                detail: e.to_string(),
            })?;

        if let Some(errors) = json.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(ClientError::RemoteApi {
                    status,
                    body: Value::Array(errors.clone()).to_string(),
                });
            }
        }

        debug!("{} completed", operation_name);
        json.get("data")
            .cloned()
            .ok_or_else(|| ClientError::MalformedResponse {
                platform: "catalog".into(),
                detail: "response has no data".into(),
            })
    }

    /// Create a master code under the given attribute type.
    pub async fn create_master_code(
        &self,
        code: &str,
        type_: &str,
        order: i64,
        grouping_code: Option<&str>,
    ) -> Result<MasterCode, ClientError> {
        let data = self
            .execute(
                "CreateMasterCode",
                r#"mutation CreateMasterCode($createMasterCode: CreateMasterCode) {
                    createMasterCode(createMasterCode: $createMasterCode) {
                        code
                        type
                    }
                }"#,
                json!({
                    "createMasterCode": {
                        "code": code,
                        "type": type_,
                        "groupingCode": grouping_code.unwrap_or("all"),
                        "order": order,
                    },
                }),
            )
            .await?;

        let created = data.get("createMasterCode").ok_or_else(|| {
            ClientError::MalformedResponse {
                platform: "catalog".into(),
                detail: "no createMasterCode in response".into(),
            }
        })?;
        Ok(MasterCode {
            code: str_field(created, "code")?,
            type_: str_field(created, "type")?,
        })
    }

    /// Upload an item to the catalog; returns its id and generated SKU.
    pub async fn create_item(&self, item: &NewItem) -> Result<CreatedItem, ClientError> {
        let data = self
            .execute(
                "CreateItemCatalog",
                r#"mutation CreateItemCatalog($createItemCatalogInput: CreateItemCatalogInput!) {
                    createItemCatalog(createItemCatalogInput: $createItemCatalogInput) {
                        id
                        sku
                    }
                }"#,
                json!({
                    "createItemCatalogInput": {
                        "classificationCode": &item.classification,
                        "materialCode": &item.material,
                        "gradeCode": &item.grade,
                        "presentationCode": &item.presentation,
                        "finishCode": &item.finish,
                        "name": &item.name,
                        "weight": item.weight,
                        "overriteWeight": true,
                        "dimensions": &item.dimensions,
                        "dimension": &item.dimension,
                    },
                }),
            )
            .await?;

        let created = data.get("createItemCatalog").ok_or_else(|| {
            ClientError::MalformedResponse {
                platform: "catalog".into(),
                detail: "no createItemCatalog in response".into(),
            }
        })?;
        Ok(CreatedItem {
            id: created
                .get("id")
                .and_then(Value::as_i64)
                .ok_or_else(|| ClientError::MalformedResponse {
                    platform: "catalog".into(),
                    detail: "created item has no id".into(),
                })?,
            sku: str_field(created, "sku")?,
        })
    }

    /// Remove an item from the catalog.
    pub async fn remove_item(&self, id: i64) -> Result<(), ClientError> {
        self.execute(
            "RemoveItemCatalog",
            r#"mutation RemoveItemCatalog($removeItemCatalogId: Int!) {
                removeItemCatalog(id: $removeItemCatalogId) {
                    id
                    name
                    skuRmt
                }
            }"#,
            json!({ "removeItemCatalogId": id }),
        )
        .await?;
        Ok(())
    }

    /// Patch fields of an existing item. Keys follow the platform's input
    /// names (`finishCode`, `gradeCode`, `name`, `weight`, …).
    pub async fn update_item(
        &self,
        item_id: i64,
        patch: Map<String, Value>,
    ) -> Result<(), ClientError> {
        let mut input = patch;
        input.insert("id".into(), json!(item_id));

        self.execute(
            "UpdateItemCatalog",
            r#"mutation UpdateItemCatalog($updateItemCatalogInput: UpdateItemCatalogInput!) {
                updateItemCatalog(updateItemCatalogInput: $updateItemCatalogInput) {
                    id
                }
            }"#,
            json!({ "updateItemCatalogInput": input }),
        )
        .await?;
        Ok(())
    }

    /// The raw-material master-code types and the options each one offers.
    pub async fn master_code_types(&self) -> Result<BTreeMap<String, Vec<String>>, ClientError> {
        let data = self
            .execute(
                "MasterCodes",
                r#"query MasterCodes {
                    masterCodes {
                        code
                        type
                    }
                }"#,
                json!({}),
            )
            .await?;
        group_master_codes(&data)
    }

    /// The highest display order currently used per raw-material type;
    /// needed to append new master codes at the end of each list.
    pub async fn max_order_by_type(&self) -> Result<BTreeMap<String, i64>, ClientError> {
        let data = self
            .execute(
                "MasterCodes",
                r#"query MasterCodes {
                    masterCodes {
                        code
                        type
                        order
                        groupingCode
                        validationCode
                    }
                }"#,
                json!({}),
            )
            .await?;
        max_orders(&data)
    }

    /// The full item catalog as a table.
    pub async fn load_items(&self) -> Result<Table, ClientError> {
        let data = self
            .execute(
                "ItemsCatalog",
                r#"query ItemsCatalog {
                    itemsCatalog {
                        id
                        erpId
                        name
                        sku
                        skuRmt
                        weight
                        unitCode
                        materialCode
                        classificationCode
                        gradeCode
                        presentationCode
                        finishCode
                        categoryCode
                        schedule
                        dimension
                        pricePerKg
                        dimensions {
                            typeCode
                            unitCode
                            measure
                        }
                    }
                }"#,
                json!({}),
            )
            .await?;

        let items = data
            .get("itemsCatalog")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::MalformedResponse {
                platform: "catalog".into(),
                detail: "no itemsCatalog array".into(),
            })?;
        objects_to_table(items)
    }
}

fn str_field(value: &Value, key: &str) -> Result<String, ClientError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "catalog".into(),
            detail: format!("missing field '{key}'"),
        })
}

/// Reshape an array of uniform JSON objects into a table; columns come from
/// the first object's keys.
fn objects_to_table(items: &[Value]) -> Result<Table, ClientError> {
    let Some(Value::Object(first)) = items.first() else {
        return Ok(Table::default());
    };
    let columns: Vec<String> = first.keys().cloned().collect();

    let mut table = Table::with_columns(columns.clone());
    for item in items {
        let obj = item.as_object().ok_or_else(|| ClientError::MalformedResponse {
            platform: "catalog".into(),
            detail: "item is not an object".into(),
        })?;
        table.push_row(
            columns
                .iter()
                .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
                .collect(),
        )?;
    }
    Ok(table)
}

/// Group master codes by type, keeping only raw-material types.
fn group_master_codes(data: &Value) -> Result<BTreeMap<String, Vec<String>>, ClientError> {
    let codes = data
        .get("masterCodes")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "catalog".into(),
            detail: "no masterCodes array".into(),
        })?;

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for entry in codes {
        let (Some(type_), Some(code)) = (
            entry.get("type").and_then(Value::as_str),
            entry.get("code").and_then(Value::as_str),
        ) else {
            continue;
        };
        if type_.starts_with(RAW_MATERIAL_PREFIX) {
            grouped.entry(type_.to_string()).or_default().push(code.to_string());
        }
    }
    Ok(grouped)
}

/// Maximum display order per raw-material type.
fn max_orders(data: &Value) -> Result<BTreeMap<String, i64>, ClientError> {
    let codes = data
        .get("masterCodes")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "catalog".into(),
            detail: "no masterCodes array".into(),
        })?;

    let mut maxima: BTreeMap<String, i64> = BTreeMap::new();
    for entry in codes {
        let (Some(type_), Some(order)) = (
            entry.get("type").and_then(Value::as_str),
            entry.get("order").and_then(Value::as_i64),
        ) else {
            continue;
        };
        if type_.starts_with(RAW_MATERIAL_PREFIX) {
            maxima
                .entry(type_.to_string())
                .and_modify(|m| *m = (*m).max(order))
                .or_insert(order);
        }
    }
    Ok(maxima)
}

// ── Thickness equivalences ───────────────────────────────────────────────

/// Sheet-gauge and pipe-schedule labels and their opaque master-code values.
///
/// Real widths are measure ×10 000; these labels have assigned codes that
/// cannot be derived, so the table is the contract.
const GAUGE_EQUIVALENTS: &[(&str, i64)] = &[
    ("Cal. 32", 90),
    ("Cal. 30", 120),
    ("Cal. 29", 135),
    ("Cal. 28", 149),
    ("Cal. 27", 164),
    ("Cal. 26", 179),
    ("Cal. 25", 209),
    ("Cal. 24", 239),
    ("Cal. 23", 269),
    ("Cal. 22", 299),
    ("Cal. 21", 329),
    ("Cal. 20", 359),
    ("Cal. 19", 418),
    ("Cal. 18", 478),
    ("Cal. 17", 538),
    ("Cal. 16", 598),
    ("Cal. 15", 673),
    ("Cal. 14", 747),
    ("Cal. 13", 897),
    ("Cal. 12", 1046),
    ("Cal. 11", 1196),
    ("Cal. 10", 1345),
    ("Cal. 9", 1495),
    ("Cal. 8", 1644),
    ("Cal. 7", 1443),
    ("Cal. 6", 1620),
    ("Cal. 5", 1819),
    ("Cal. 4", 2043),
    ("Cal. 3", 2294),
    // Pipe schedules.
    ("XXS", 1),
    ("X", 5),
];

/// Parse a mixed-fraction measure like `"1-1/2"`, `"3/4"` or `"0.25"` into
/// its decimal value. Hyphens separate the whole part from the fraction.
fn parse_mixed_fraction(text: &str) -> Option<f64> {
    let cleaned: String = text
        .to_lowercase()
        .replace('-', " ")
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '/' | '.' | ' '))
        .collect();

    let mut total = 0.0;
    let mut any = false;
    for token in cleaned.split_whitespace() {
        let part = match token.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().ok()?;
                let den: f64 = den.parse().ok()?;
                if den == 0.0 {
                    return None;
                }
                num / den
            }
            None => token.parse().ok()?,
        };
        total += part;
        any = true;
    }
    any.then_some(total)
}

/// Convert a thickness — a measure string or a gauge/schedule label — into
/// its master-code value.
///
/// Measures scale ×10 000 (`"1-1/2"` → 15 000); labels go through the
/// equivalence table (`"Cal. 18"` → 478). Anything else is rejected.
pub fn width_to_master_code(width: &str) -> Result<i64, ClientError> {
    // Gauge labels contain a 'c'; never feed those to the fraction parser
    // (it would happily parse the digits out of "Cal. 18").
    if !width.to_lowercase().contains('c') {
        if let Some(value) = parse_mixed_fraction(width) {
            return Ok((value * 10_000.0).round() as i64);
        }
    }

    GAUGE_EQUIVALENTS
        .iter()
        .find(|(label, _)| *label == width)
        .map(|(_, code)| *code)
        .ok_or_else(|| {
            ClientError::InvalidInput(format!("unrecognized thickness or gauge '{width}'"))
        })
}

/// Inverse of [`width_to_master_code`]: a gauge/schedule label when the code
/// is in the table, otherwise the decimal measure as text.
pub fn master_code_to_width(code: i64) -> String {
    GAUGE_EQUIVALENTS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| (code as f64 / 10_000.0).to_string())
}

// ── Dimension building ───────────────────────────────────────────────────

struct FamilyNeeds {
    thickness: bool,
    width: bool,
    length: bool,
    walls: bool,
    a_b: bool,
    kg_m_depth: bool,
    diameter: bool,
}

fn needs(family: ItemFamily) -> FamilyNeeds {
    use ItemFamily::*;
    FamilyNeeds {
        thickness: !matches!(family, VigaCanal),
        width: matches!(family, Plano),
        length: true,
        walls: matches!(family, Perfil),
        a_b: matches!(family, Polin),
        kg_m_depth: matches!(family, VigaCanal),
        diameter: matches!(family, Tuberia),
    }
}

/// Assemble the dimension list an item mutation needs for its family.
///
/// Every measurement the family requires must be present in `spec`; extra
/// measurements that no family requires (C, D, pipe schedule) ride along
/// when supplied. Thickness is routed through
/// [`width_to_master_code`] so gauges and fractions both work.
pub fn build_dimensions(
    family: ItemFamily,
    spec: &DimensionSpec,
) -> Result<Vec<Dimension>, ClientError> {
    let needs = needs(family);
    let mut missing: Vec<&str> = Vec::new();

    if needs.thickness && spec.thickness.is_none() {
        missing.push("thickness");
    }
    if needs.width && (spec.width_unit.is_none() || spec.width_value.is_none()) {
        missing.push("width");
    }
    if needs.length && (spec.length_unit.is_none() || spec.length_value.is_none()) {
        missing.push("length");
    }
    if needs.walls && (spec.wall_length.is_none() || spec.wall_width.is_none()) {
        missing.push("wall dimensions");
    }
    if needs.a_b && (spec.a.is_none() || spec.b.is_none()) {
        missing.push("A/B");
    }
    if needs.kg_m_depth && (spec.kg_m.is_none() || spec.depth.is_none()) {
        missing.push("kg/m and depth");
    }
    if needs.diameter && spec.diameter.is_none() {
        missing.push("diameter");
    }
    if !missing.is_empty() {
        return Err(ClientError::InvalidInput(format!(
            "{family:?} items need: {}",
            missing.join(", ")
        )));
    }

    let mut dimensions = Vec::new();

    if needs.thickness {
        let thickness = spec.thickness.as_deref().unwrap_or_default();
        dimensions.push(Dimension::new(
            "Thickness",
            None,
            json!(width_to_master_code(thickness)?),
        ));
    }
    if needs.width {
        dimensions.push(Dimension::new(
            "Width",
            spec.width_unit,
            json!(spec.width_value),
        ));
    }
    if needs.length {
        dimensions.push(Dimension::new(
            "Length",
            spec.length_unit,
            json!(spec.length_value),
        ));
    }
    if needs.walls {
        dimensions.push(Dimension::new(
            "Wall length",
            Some(Unit::Inch),
            json!(spec.wall_length),
        ));
        dimensions.push(Dimension::new(
            "Wall width",
            Some(Unit::Inch),
            json!(spec.wall_width),
        ));
    }
    if needs.a_b {
        dimensions.push(Dimension::new("A", Some(Unit::Inch), json!(spec.a)));
        dimensions.push(Dimension::new("B", Some(Unit::Inch), json!(spec.b)));
    }
    if let Some(c) = spec.c {
        dimensions.push(Dimension::new("C", Some(Unit::Inch), json!(c)));
    }
    if let Some(d) = spec.d {
        dimensions.push(Dimension::new("D", Some(Unit::Inch), json!(d)));
    }
    if needs.kg_m_depth {
        dimensions.push(Dimension::new("Kg/m", None, json!(spec.kg_m)));
        dimensions.push(Dimension::new("Depth", None, json!(spec.depth)));
    }
    if needs.diameter {
        dimensions.push(Dimension::new(
            "External diameter",
            Some(Unit::Inch),
            json!(spec.diameter),
        ));
        dimensions.push(Dimension::new(
            "Nominal diameter",
            Some(Unit::Inch),
            json!(spec.diameter),
        ));
    }
    if let Some(ref schedule) = spec.schedule {
        let measure = match schedule.parse::<f64>() {
            Ok(n) => json!(n),
            Err(_) => json!(width_to_master_code(schedule)?),
        };
        dimensions.push(Dimension::new("Depth", None, measure));
    }

    Ok(dimensions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_per_environment() {
        assert!(CatalogEnv::Production.endpoint().contains("ichigo"));
        assert!(CatalogEnv::Uat.endpoint().contains("uat"));
    }

    #[test]
    fn fraction_parsing() {
        assert_eq!(parse_mixed_fraction("1/2"), Some(0.5));
        assert_eq!(parse_mixed_fraction("1-1/2"), Some(1.5));
        assert_eq!(parse_mixed_fraction("0.25"), Some(0.25));
        assert_eq!(parse_mixed_fraction("3"), Some(3.0));
        assert_eq!(parse_mixed_fraction("1/0"), None);
        assert_eq!(parse_mixed_fraction(""), None);
    }

    #[test]
    fn width_scales_and_gauges_look_up() {
        assert_eq!(width_to_master_code("1-1/2").unwrap(), 15_000);
        assert_eq!(width_to_master_code("0.25\"").unwrap(), 2_500);
        assert_eq!(width_to_master_code("Cal. 18").unwrap(), 478);
        assert_eq!(width_to_master_code("XXS").unwrap(), 1);
        assert!(width_to_master_code("Cal. 99").is_err());
    }

    #[test]
    fn master_code_inverse() {
        assert_eq!(master_code_to_width(478), "Cal. 18");
        assert_eq!(master_code_to_width(15_000), "1.5");
    }

    #[test]
    fn plano_requires_width_and_length() {
        let spec = DimensionSpec {
            thickness: Some("Cal. 18".into()),
            ..Default::default()
        };
        let err = build_dimensions(ItemFamily::Plano, &spec).unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));

        let spec = DimensionSpec {
            thickness: Some("Cal. 18".into()),
            width_unit: Some(Unit::Inch),
            width_value: Some(48.0),
            length_unit: Some(Unit::Feet),
            length_value: Some(10.0),
            ..Default::default()
        };
        let dims = build_dimensions(ItemFamily::Plano, &spec).unwrap();
        let types: Vec<&str> = dims.iter().map(|d| d.type_code.as_str()).collect();
        assert_eq!(types, vec!["Thickness", "Width", "Length"]);
        assert_eq!(dims[0].measure, json!(478));
    }

    #[test]
    fn viga_canal_skips_thickness() {
        let spec = DimensionSpec {
            length_unit: Some(Unit::Meter),
            length_value: Some(12.0),
            kg_m: Some(44.8),
            depth: Some(12.0),
            ..Default::default()
        };
        let dims = build_dimensions(ItemFamily::VigaCanal, &spec).unwrap();
        let types: Vec<&str> = dims.iter().map(|d| d.type_code.as_str()).collect();
        assert_eq!(types, vec!["Length", "Kg/m", "Depth"]);
    }

    #[test]
    fn tuberia_duplicates_diameter_and_routes_schedule() {
        let spec = DimensionSpec {
            thickness: Some("1/4".into()),
            length_unit: Some(Unit::Meter),
            length_value: Some(6.0),
            diameter: Some(2.0),
            schedule: Some("XXS".into()),
            ..Default::default()
        };
        let dims = build_dimensions(ItemFamily::Tuberia, &spec).unwrap();
        let types: Vec<&str> = dims.iter().map(|d| d.type_code.as_str()).collect();
        assert_eq!(
            types,
            vec![
                "Thickness",
                "Length",
                "External diameter",
                "Nominal diameter",
                "Depth"
            ]
        );
        // The schedule designation went through the equivalence table.
        assert_eq!(dims.last().unwrap().measure, json!(1));
    }

    #[test]
    fn numeric_schedule_stays_numeric() {
        let spec = DimensionSpec {
            thickness: Some("1/4".into()),
            length_unit: Some(Unit::Meter),
            length_value: Some(6.0),
            diameter: Some(2.0),
            schedule: Some("40".into()),
            ..Default::default()
        };
        let dims = build_dimensions(ItemFamily::Tuberia, &spec).unwrap();
        assert_eq!(dims.last().unwrap().measure, json!(40.0));
    }

    #[test]
    fn grouping_filters_to_raw_material_types() {
        let data = serde_json::json!({
            "masterCodes": [
                {"code": "Acero", "type": "RawMaterialMaterial"},
                {"code": "Inoxidable", "type": "RawMaterialMaterial"},
                {"code": "Planos", "type": "RawMaterialCategory"},
                {"code": "MXN", "type": "Currency"},
            ]
        });
        let grouped = group_master_codes(&data).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(
            grouped["RawMaterialMaterial"],
            vec!["Acero".to_string(), "Inoxidable".to_string()]
        );
        assert!(!grouped.contains_key("Currency"));
    }

    #[test]
    fn max_orders_per_type() {
        let data = serde_json::json!({
            "masterCodes": [
                {"code": "a", "type": "RawMaterialGrade", "order": 3},
                {"code": "b", "type": "RawMaterialGrade", "order": 7},
                {"code": "c", "type": "RawMaterialFinish", "order": 1},
                {"code": "d", "type": "Currency", "order": 99},
            ]
        });
        let maxima = max_orders(&data).unwrap();
        assert_eq!(maxima["RawMaterialGrade"], 7);
        assert_eq!(maxima["RawMaterialFinish"], 1);
        assert!(!maxima.contains_key("Currency"));
    }

    #[test]
    fn dimension_serialises_camel_case() {
        let d = Dimension::new("Thickness", Some(Unit::Inch), json!(478));
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(
            v,
            json!({"typeCode": "Thickness", "unitCode": "Inch", "measure": 478})
        );
    }
}
