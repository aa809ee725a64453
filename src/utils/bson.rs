use mongodb::bson::{Bson, Document};
use serde_json::Value;

/// Convert a BSON document into the JSON shape clients see: ObjectIds become
/// hex strings (so `_id` reads as a plain identifier) and datetimes become
/// Unix millisecond timestamps. Everything else follows relaxed Extended JSON.
pub fn document_to_json(doc: Document) -> Value {
    bson_to_json(Bson::Document(doc))
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::Number(dt.timestamp_millis().into()),
        Bson::Document(doc) => Value::Object(
            doc.into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};

    #[test]
    fn object_ids_render_as_hex_strings() {
        let oid = ObjectId::new();
        let json = document_to_json(doc! { "_id": oid, "name": "Write report" });
        assert_eq!(json["_id"], Value::String(oid.to_hex()));
        assert_eq!(json["name"], "Write report");
    }

    #[test]
    fn datetimes_render_as_millis() {
        let dt = DateTime::from_millis(1_700_000_000_000);
        let json = document_to_json(doc! { "dateCreated": dt });
        assert_eq!(json["dateCreated"], 1_700_000_000_000_i64);
    }

    #[test]
    fn nested_arrays_and_documents_are_converted() {
        let oid = ObjectId::new();
        let json = document_to_json(doc! {
            "pendingTasks": [oid.to_hex()],
            "nested": { "ref": oid },
        });
        assert_eq!(json["pendingTasks"][0], Value::String(oid.to_hex()));
        assert_eq!(json["nested"]["ref"], Value::String(oid.to_hex()));
    }

    #[test]
    fn scalars_stay_plain_json() {
        let json = document_to_json(doc! { "completed": false, "deadline": 42_i64 });
        assert_eq!(json["completed"], false);
        assert_eq!(json["deadline"], 42);
    }
}
