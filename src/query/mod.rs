//! Typed query translator for the list endpoints.
//!
//! List requests carry loosely structured JSON in the `where`, `sort` and
//! `select` query parameters. Instead of forwarding those blobs to the driver,
//! they are parsed into [`Filter`], [`SortSpec`] and [`Projection`] values and
//! validated up front; only well-formed queries ever reach MongoDB.

use futures::stream::StreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::Collection;
use serde::Deserialize;
use serde_json::Value;

use crate::utils::bson::document_to_json;
use crate::utils::error::ApiError;

/// Raw query string of a list endpoint (`GET /tasks`, `GET /users`).
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// JSON filter, e.g. `{"completed": false}`.
    #[serde(rename = "where")]
    pub filter: Option<String>,
    /// JSON sort spec, e.g. `{"deadline": 1, "name": -1}`.
    pub sort: Option<String>,
    /// JSON projection, e.g. `{"name": 1}` or `{"pendingTasks": 0}`.
    pub select: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    /// The literal string `"true"` switches the endpoint to count mode.
    pub count: Option<String>,
}

/// Raw query string of an item endpoint (`GET /tasks/{id}`).
#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub select: Option<String>,
}

/// Comparison operators accepted inside a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    In,
}

impl CmpOp {
    fn from_key(key: &str) -> Option<CmpOp> {
        match key {
            "$gt" => Some(CmpOp::Gt),
            "$gte" => Some(CmpOp::Gte),
            "$lt" => Some(CmpOp::Lt),
            "$lte" => Some(CmpOp::Lte),
            "$ne" => Some(CmpOp::Ne),
            "$in" => Some(CmpOp::In),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Gt => "$gt",
            CmpOp::Gte => "$gte",
            CmpOp::Lt => "$lt",
            CmpOp::Lte => "$lte",
            CmpOp::Ne => "$ne",
            CmpOp::In => "$in",
        }
    }
}

/// Validated predicate over stored documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Bson },
    Cmp { field: String, op: CmpOp, value: Bson },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn parse(raw: &str) -> Result<Filter, ApiError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid where parameter: {}", e)))?;
        Filter::from_json(&value)
    }

    fn from_json(value: &Value) -> Result<Filter, ApiError> {
        let object = value.as_object().ok_or_else(|| {
            ApiError::InvalidRequest("Invalid where parameter: expected a JSON object".to_string())
        })?;

        let mut clauses = Vec::new();
        for (key, entry) in object {
            match key.as_str() {
                "$and" | "$or" => {
                    let branches = entry.as_array().filter(|a| !a.is_empty()).ok_or_else(|| {
                        ApiError::InvalidRequest(format!(
                            "Invalid where parameter: {} expects a non-empty array",
                            key
                        ))
                    })?;
                    let parsed = branches
                        .iter()
                        .map(Filter::from_json)
                        .collect::<Result<Vec<_>, _>>()?;
                    clauses.push(if key == "$and" {
                        Filter::And(parsed)
                    } else {
                        Filter::Or(parsed)
                    });
                }
                op if op.starts_with('$') => {
                    return Err(ApiError::InvalidRequest(format!(
                        "Invalid where parameter: unsupported operator '{}'",
                        op
                    )));
                }
                field => clauses.extend(Filter::field_clauses(field, entry)?),
            }
        }

        Ok(match clauses.len() {
            1 => clauses.pop().unwrap_or(Filter::And(vec![])),
            _ => Filter::And(clauses),
        })
    }

    fn field_clauses(field: &str, entry: &Value) -> Result<Vec<Filter>, ApiError> {
        let Some(operators) = entry.as_object() else {
            // Bare value: field equality.
            return Ok(vec![Filter::Eq {
                field: field.to_string(),
                value: scalar_to_bson(field, entry)?,
            }]);
        };

        let mut clauses = Vec::new();
        for (key, operand) in operators {
            let op = CmpOp::from_key(key).ok_or_else(|| {
                ApiError::InvalidRequest(format!(
                    "Invalid where parameter: unsupported operator '{}' on field '{}'",
                    key, field
                ))
            })?;
            let value = if op == CmpOp::In {
                let items = operand.as_array().ok_or_else(|| {
                    ApiError::InvalidRequest(format!(
                        "Invalid where parameter: $in on field '{}' expects an array",
                        field
                    ))
                })?;
                Bson::Array(
                    items
                        .iter()
                        .map(|item| scalar_to_bson(field, item))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            } else {
                scalar_to_bson(field, operand)?
            };
            clauses.push(Filter::Cmp {
                field: field.to_string(),
                op,
                value,
            });
        }
        Ok(clauses)
    }

    pub fn to_document(&self) -> Document {
        match self {
            Filter::Eq { field, value } => {
                let mut doc = Document::new();
                doc.insert(field.clone(), value.clone());
                doc
            }
            Filter::Cmp { field, op, value } => {
                let mut operator = Document::new();
                operator.insert(op.as_str(), value.clone());
                let mut doc = Document::new();
                doc.insert(field.clone(), operator);
                doc
            }
            Filter::And(clauses) => match clauses.len() {
                0 => doc! {},
                1 => clauses[0].to_document(),
                _ => doc! { "$and": clauses.iter().map(Filter::to_document).collect::<Vec<_>>() },
            },
            Filter::Or(clauses) => {
                doc! { "$or": clauses.iter().map(Filter::to_document).collect::<Vec<_>>() }
            }
        }
    }
}

/// `_id` comparisons get the hex string promoted to an ObjectId so they can
/// match stored identities; everything else maps structurally.
fn scalar_to_bson(field: &str, value: &Value) -> Result<Bson, ApiError> {
    match value {
        Value::Null => Ok(Bson::Null),
        Value::Bool(flag) => Ok(Bson::Boolean(*flag)),
        Value::Number(number) => number
            .as_i64()
            .map(Bson::Int64)
            .or_else(|| number.as_f64().map(Bson::Double))
            .ok_or_else(|| {
                ApiError::InvalidRequest(format!(
                    "Invalid where parameter: unrepresentable number for field '{}'",
                    field
                ))
            }),
        Value::String(text) => {
            if field == "_id" {
                if let Ok(oid) = ObjectId::parse_str(text) {
                    return Ok(Bson::ObjectId(oid));
                }
            }
            Ok(Bson::String(text.clone()))
        }
        Value::Array(items) => Ok(Bson::Array(
            items
                .iter()
                .map(|item| scalar_to_bson(field, item))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Object(_) => Err(ApiError::InvalidRequest(format!(
            "Invalid where parameter: unexpected nested object for field '{}'",
            field
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordered sort keys parsed from the `sort` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    pub fn parse(raw: &str) -> Result<SortSpec, ApiError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid sort parameter: {}", e)))?;
        let object = value.as_object().ok_or_else(|| {
            ApiError::InvalidRequest("Invalid sort parameter: expected a JSON object".to_string())
        })?;

        let mut keys = Vec::new();
        for (field, direction) in object {
            let direction = match direction.as_i64() {
                Some(1) => SortDirection::Ascending,
                Some(-1) => SortDirection::Descending,
                _ => {
                    return Err(ApiError::InvalidRequest(format!(
                        "Invalid sort parameter: field '{}' must be 1 or -1",
                        field
                    )));
                }
            };
            keys.push((field.clone(), direction));
        }
        Ok(SortSpec { keys })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        for (field, direction) in &self.keys {
            let order = match direction {
                SortDirection::Ascending => 1_i32,
                SortDirection::Descending => -1_i32,
            };
            doc.insert(field.clone(), order);
        }
        doc
    }
}

/// Field projection parsed from the `select` parameter. MongoDB forbids
/// mixing inclusion and exclusion (apart from suppressing `_id`), so the
/// parse rejects mixed specs instead of letting the driver fail per-request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include { fields: Vec<String>, suppress_id: bool },
    Exclude { fields: Vec<String> },
}

impl Projection {
    pub fn parse(raw: &str) -> Result<Projection, ApiError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid select parameter: {}", e)))?;
        let object = value.as_object().ok_or_else(|| {
            ApiError::InvalidRequest("Invalid select parameter: expected a JSON object".to_string())
        })?;

        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for (field, flag) in object {
            let include = match (flag.as_i64(), flag.as_bool()) {
                (Some(1), _) | (_, Some(true)) => true,
                (Some(0), _) | (_, Some(false)) => false,
                _ => {
                    return Err(ApiError::InvalidRequest(format!(
                        "Invalid select parameter: field '{}' must be 0 or 1",
                        field
                    )));
                }
            };
            if include {
                included.push(field.clone());
            } else {
                excluded.push(field.clone());
            }
        }

        if included.is_empty() {
            return Ok(Projection::Exclude { fields: excluded });
        }
        let suppress_id = excluded.iter().any(|f| f == "_id");
        if excluded.iter().any(|f| f != "_id") {
            return Err(ApiError::InvalidRequest(
                "Invalid select parameter: cannot mix included and excluded fields".to_string(),
            ));
        }
        Ok(Projection::Include {
            fields: included,
            suppress_id,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        match self {
            Projection::Include { fields, suppress_id } => {
                for field in fields {
                    doc.insert(field.clone(), 1_i32);
                }
                if *suppress_id {
                    doc.insert("_id", 0_i32);
                }
            }
            Projection::Exclude { fields } => {
                for field in fields {
                    doc.insert(field.clone(), 0_i32);
                }
            }
        }
        doc
    }
}

/// Fully validated list query, ready to hand to the driver.
#[derive(Debug, Default)]
pub struct ListOptions {
    pub filter: Option<Filter>,
    pub sort: Option<SortSpec>,
    pub projection: Option<Projection>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub count_only: bool,
}

impl ListOptions {
    /// Parse and validate the raw query string. `default_limit` is the cap
    /// applied when the caller supplies none (tasks: 100, users: unbounded).
    pub fn from_query(query: &ListQuery, default_limit: Option<i64>) -> Result<Self, ApiError> {
        Ok(ListOptions {
            filter: query.filter.as_deref().map(Filter::parse).transpose()?,
            sort: query.sort.as_deref().map(SortSpec::parse).transpose()?,
            projection: query.select.as_deref().map(Projection::parse).transpose()?,
            skip: query.skip,
            limit: query.limit.or(default_limit),
            count_only: query.count.as_deref() == Some("true"),
        })
    }

    pub fn filter_document(&self) -> Document {
        self.filter
            .as_ref()
            .map(Filter::to_document)
            .unwrap_or_default()
    }
}

/// Run a translated list query: count in count mode, otherwise
/// filter -> sort -> projection -> skip -> limit.
pub async fn execute(
    collection: &Collection<Document>,
    options: &ListOptions,
) -> Result<Value, ApiError> {
    let filter = options.filter_document();

    if options.count_only {
        let total = collection
            .count_documents(filter)
            .await
            .map_err(ApiError::database)?;
        return Ok(Value::from(total));
    }

    let mut find = collection.find(filter);
    if let Some(sort) = &options.sort {
        find = find.sort(sort.to_document());
    }
    if let Some(projection) = &options.projection {
        find = find.projection(projection.to_document());
    }
    if let Some(skip) = options.skip {
        if skip > 0 {
            find = find.skip(skip);
        }
    }
    if let Some(limit) = options.limit {
        if limit > 0 {
            find = find.limit(limit);
        }
    }

    let mut cursor = find.await.map_err(ApiError::database)?;
    let mut records = Vec::new();
    while let Some(document) = cursor.next().await {
        records.push(document_to_json(document.map_err(ApiError::database)?));
    }
    Ok(Value::Array(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_filter_parses_to_plain_match() {
        let filter = Filter::parse(r#"{"completed": false}"#).unwrap();
        assert_eq!(filter.to_document(), doc! { "completed": false });
    }

    #[test]
    fn comparison_filter_keeps_operator() {
        let filter = Filter::parse(r#"{"deadline": {"$gte": 1700000000000}}"#).unwrap();
        assert_eq!(
            filter.to_document(),
            doc! { "deadline": { "$gte": 1_700_000_000_000_i64 } }
        );
    }

    #[test]
    fn multiple_operators_on_one_field_become_an_and() {
        let filter = Filter::parse(r#"{"deadline": {"$gte": 1, "$lt": 9}}"#).unwrap();
        assert_eq!(
            filter.to_document(),
            doc! { "$and": [
                { "deadline": { "$gte": 1_i64 } },
                { "deadline": { "$lt": 9_i64 } },
            ] }
        );
    }

    #[test]
    fn logical_or_recurses_into_branches() {
        let filter =
            Filter::parse(r#"{"$or": [{"completed": true}, {"assignedUser": ""}]}"#).unwrap();
        assert_eq!(
            filter.to_document(),
            doc! { "$or": [ { "completed": true }, { "assignedUser": "" } ] }
        );
    }

    #[test]
    fn in_operator_requires_an_array() {
        let ok = Filter::parse(r#"{"name": {"$in": ["a", "b"]}}"#).unwrap();
        assert_eq!(ok.to_document(), doc! { "name": { "$in": ["a", "b"] } });

        let err = Filter::parse(r#"{"name": {"$in": "a"}}"#).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = Filter::parse(r#"{"name": {"$regex": "^a"}}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));

        let err = Filter::parse(r#"{"$where": "1 == 1"}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn malformed_json_is_a_request_error() {
        let err = Filter::parse("{not json").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn id_equality_promotes_hex_to_object_id() {
        let oid = ObjectId::new();
        let filter = Filter::parse(&format!(r#"{{"_id": "{}"}}"#, oid.to_hex())).unwrap();
        assert_eq!(filter.to_document(), doc! { "_id": oid });
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = Filter::parse("{}").unwrap();
        assert_eq!(filter.to_document(), doc! {});
    }

    #[test]
    fn sort_spec_preserves_key_order() {
        let sort = SortSpec::parse(r#"{"deadline": 1, "name": -1}"#).unwrap();
        let doc = sort.to_document();
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, vec!["deadline", "name"]);
        assert_eq!(doc.get_i32("name").unwrap(), -1);
    }

    #[test]
    fn sort_direction_must_be_one_or_minus_one() {
        let err = SortSpec::parse(r#"{"deadline": 2}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn inclusion_projection_allows_id_suppression() {
        let projection = Projection::parse(r#"{"name": 1, "_id": 0}"#).unwrap();
        assert_eq!(projection.to_document(), doc! { "name": 1, "_id": 0 });
    }

    #[test]
    fn exclusion_projection_parses() {
        let projection = Projection::parse(r#"{"pendingTasks": 0}"#).unwrap();
        assert_eq!(projection.to_document(), doc! { "pendingTasks": 0 });
    }

    #[test]
    fn mixed_projection_is_rejected() {
        let err = Projection::parse(r#"{"name": 1, "email": 0}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn default_limit_applies_only_when_absent() {
        let defaulted = ListOptions::from_query(&ListQuery::default(), Some(100)).unwrap();
        assert_eq!(defaulted.limit, Some(100));

        let explicit = ListQuery {
            limit: Some(5),
            ..Default::default()
        };
        let options = ListOptions::from_query(&explicit, Some(100)).unwrap();
        assert_eq!(options.limit, Some(5));

        let unbounded = ListOptions::from_query(&ListQuery::default(), None).unwrap();
        assert_eq!(unbounded.limit, None);
    }

    #[test]
    fn count_flag_requires_literal_true() {
        let counting = ListQuery {
            count: Some("true".to_string()),
            ..Default::default()
        };
        assert!(ListOptions::from_query(&counting, None).unwrap().count_only);

        let not_counting = ListQuery {
            count: Some("yes".to_string()),
            ..Default::default()
        };
        assert!(!ListOptions::from_query(&not_counting, None).unwrap().count_only);
    }
}
