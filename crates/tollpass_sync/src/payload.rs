//! Mapping between local passes and remote field maps.

use serde_json::{json, Value};
use tollpass_remote::TransportError;
use tollpass_store::{RemoteRef, SubscriptionPass, VehicleClass};

/// Fields requested by `search_read`.
pub(crate) const REMOTE_FIELDS: [&str; 4] = ["name", "plate", "vehicle_type", "balance"];

/// Field map sent by `create` and `write`.
///
/// The cost per passage is local-only and always goes out as zero.
pub(crate) fn push_payload(pass: &SubscriptionPass, label_prefix: Option<&str>) -> Value {
    json!({
        "name": strip_label(&pass.holder_name, label_prefix),
        "plate": pass.plate,
        "vehicle_type": pass.vehicle_class.remote_code(),
        "balance": pass.balance,
        "cost_per_passage": 0,
    })
}

/// Prepends `prefix` to `name` unless it is already there.
pub(crate) fn apply_label(name: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) if !name.starts_with(prefix) => {
            if name.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix} {name}")
            }
        }
        _ => name.to_string(),
    }
}

/// Removes a leading `prefix` from `name`.
pub(crate) fn strip_label(name: &str, prefix: Option<&str>) -> String {
    match prefix.and_then(|p| name.strip_prefix(p)) {
        Some(rest) => rest.trim_start().to_string(),
        None => name.to_string(),
    }
}

/// One row of a `search_read` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemoteRecord {
    pub remote_ref: RemoteRef,
    pub name: String,
    pub plate: String,
    pub vehicle_class: VehicleClass,
    pub balance: i64,
}

impl RemoteRecord {
    /// Decodes a row. Unset char fields arrive as `false`.
    pub fn decode(row: &Value) -> Result<Self, TransportError> {
        let id = row
            .get("id")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
            .ok_or_else(|| TransportError::malformed(format!("row without a valid id: {row}")))?;

        let plate = row
            .get("plate")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TransportError::malformed(format!("record {id} has no plate")))?;

        let name = row.get("name").and_then(Value::as_str).unwrap_or_default();

        let vehicle_class = match row.get("vehicle_type").and_then(Value::as_str) {
            Some(code) => VehicleClass::from_code(code)
                .map_err(|e| TransportError::malformed(format!("record {id}: {e}")))?,
            None => VehicleClass::Other,
        };

        let balance = decode_balance(row.get("balance"))
            .ok_or_else(|| {
                TransportError::malformed(format!("record {id} has an invalid balance"))
            })?;

        Ok(Self {
            remote_ref: RemoteRef::new(id),
            name: name.to_string(),
            plate: plate.to_string(),
            vehicle_class,
            balance,
        })
    }
}

/// Integer balances pass through; floats are rounded. Negative or
/// non-finite values are rejected.
fn decode_balance(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    let balance = match value.as_i64() {
        Some(balance) => balance,
        None => {
            let float = value.as_f64().filter(|f| f.is_finite())?.round();
            if float < i64::MIN as f64 || float > i64::MAX as f64 {
                return None;
            }
            float as i64
        }
    };
    (balance >= 0).then_some(balance)
}

/// Plate of a row for failure reports, even if the row is malformed.
pub(crate) fn row_plate(row: &Value) -> String {
    row.get("plate")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            format!("<remote {id}>")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollpass_remote::TransportErrorKind;
    use tollpass_store::{Origin, PassId};

    fn pass() -> SubscriptionPass {
        SubscriptionPass {
            id: PassId::new(1),
            plate: "GA-123".into(),
            holder_name: "[DISTANT] Awa".into(),
            vehicle_class: VehicleClass::Truck,
            balance: 500,
            cost_per_passage: 500,
            remote_ref: None,
            last_sync_at: None,
            origin: Origin::Local,
            pending_push: true,
        }
    }

    #[test]
    fn payload_zeroes_cost_and_strips_label() {
        let payload = push_payload(&pass(), Some("[DISTANT]"));
        assert_eq!(
            payload,
            json!({
                "name": "Awa",
                "plate": "GA-123",
                "vehicle_type": "camion",
                "balance": 500,
                "cost_per_passage": 0,
            })
        );
    }

    #[test]
    fn label_is_added_once() {
        let once = apply_label("Awa", Some("[DISTANT]"));
        assert_eq!(once, "[DISTANT] Awa");
        assert_eq!(apply_label(&once, Some("[DISTANT]")), once);
        assert_eq!(apply_label("Awa", None), "Awa");
        assert_eq!(strip_label(&once, Some("[DISTANT]")), "Awa");
        assert_eq!(strip_label("Awa", Some("[DISTANT]")), "Awa");
    }

    #[test]
    fn decode_row() {
        let row = json!({
            "id": 7,
            "name": "Awa",
            "plate": " GA-123 ",
            "vehicle_type": "4x4",
            "balance": 1500,
        });
        let record = RemoteRecord::decode(&row).unwrap();
        assert_eq!(record.remote_ref, RemoteRef::new(7));
        assert_eq!(record.plate, "GA-123");
        assert_eq!(record.vehicle_class, VehicleClass::Suv);
        assert_eq!(record.balance, 1500);
    }

    #[test]
    fn decode_tolerates_unset_fields_and_float_balance() {
        let row = json!({
            "id": 3,
            "name": false,
            "plate": "GA-9",
            "vehicle_type": false,
            "balance": 249.6,
        });
        let record = RemoteRecord::decode(&row).unwrap();
        assert_eq!(record.name, "");
        assert_eq!(record.vehicle_class, VehicleClass::Other);
        assert_eq!(record.balance, 250);
    }

    #[test]
    fn decode_rejects_bad_rows() {
        for row in [
            json!({"name": "x", "plate": "GA-1", "balance": 1}),
            json!({"id": 1, "plate": false, "balance": 1}),
            json!({"id": 1, "plate": "GA-1", "balance": "lots"}),
            json!({"id": 1, "plate": "GA-1", "balance": -5}),
            json!({"id": 1, "plate": "GA-1", "vehicle_type": "tractor", "balance": 1}),
        ] {
            let err = RemoteRecord::decode(&row).unwrap_err();
            assert_eq!(err.kind, TransportErrorKind::Malformed, "{row}");
        }
    }

    #[test]
    fn row_plate_falls_back_to_id() {
        assert_eq!(row_plate(&json!({"id": 4, "plate": "GA-4"})), "GA-4");
        assert_eq!(row_plate(&json!({"id": 4})), "<remote 4>");
    }
}
