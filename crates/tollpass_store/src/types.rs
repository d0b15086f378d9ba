//! Subscription pass records and their field types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Cost charged per passage when none is given at creation.
pub const DEFAULT_COST_PER_PASSAGE: i64 = 500;

/// Store-local record identifier.
///
/// Ids are assigned by the store that holds the record and mean nothing to
/// any other store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassId(u64);

impl PassId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the counterpart record on the remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRef(i64);

impl RemoteRef {
    /// Wraps a remote record id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the remote record id.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vehicle category of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    /// Passenger car.
    Car,
    /// 4x4 or SUV.
    Suv,
    /// Bus.
    Bus,
    /// Truck.
    Truck,
    /// Anything else.
    Other,
}

impl VehicleClass {
    /// Every class, in declaration order.
    pub const ALL: [VehicleClass; 5] = [
        VehicleClass::Car,
        VehicleClass::Suv,
        VehicleClass::Bus,
        VehicleClass::Truck,
        VehicleClass::Other,
    ];

    /// Local name of the class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Suv => "suv",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
            VehicleClass::Other => "other",
        }
    }

    /// Selection code used by the remote peer for this class.
    #[must_use]
    pub fn remote_code(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Suv => "4x4",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "camion",
            VehicleClass::Other => "autres",
        }
    }

    /// Parses either a local name or a remote selection code.
    pub fn from_code(code: &str) -> Result<Self, UnknownVehicleClass> {
        match code.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleClass::Car),
            "suv" | "4x4" => Ok(VehicleClass::Suv),
            "bus" => Ok(VehicleClass::Bus),
            "truck" | "camion" => Ok(VehicleClass::Truck),
            "other" | "autres" => Ok(VehicleClass::Other),
            _ => Err(UnknownVehicleClass(code.to_string())),
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = UnknownVehicleClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

/// A vehicle class code that matches no known class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vehicle class: {0:?}")]
pub struct UnknownVehicleClass(pub String);

/// Which side last authored a record's balance and identity fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Written by a local caller.
    Local,
    /// Written by a pull from the remote peer.
    Remote,
}

impl Origin {
    /// Lowercase name of the origin.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Remote => "remote",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prepaid toll-passage account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPass {
    /// Store-local id.
    pub id: PassId,
    /// Vehicle plate, unique within the store.
    pub plate: String,
    /// Name of the subscriber.
    pub holder_name: String,
    /// Vehicle category.
    pub vehicle_class: VehicleClass,
    /// Remaining balance in currency minor units. Never negative.
    pub balance: i64,
    /// Amount debited per passage. Local-only, always positive.
    pub cost_per_passage: i64,
    /// Remote counterpart, once linked.
    pub remote_ref: Option<RemoteRef>,
    /// Last successful sync in either direction.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Side that last authored balance and identity fields.
    pub origin: Origin,
    /// Local changes the remote has not acknowledged yet.
    pub pending_push: bool,
}

impl SubscriptionPass {
    /// Returns true once the record has a remote counterpart.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.remote_ref.is_some()
    }

    /// Returns true if the balance covers `amount`.
    #[must_use]
    pub fn can_cover(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}

/// Field values for a record about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPass {
    /// Vehicle plate.
    pub plate: String,
    /// Name of the subscriber.
    pub holder_name: String,
    /// Vehicle category.
    pub vehicle_class: VehicleClass,
    /// Opening balance.
    pub balance: i64,
    /// Amount debited per passage.
    pub cost_per_passage: i64,
    /// Authoring side.
    pub origin: Origin,
    /// Remote counterpart, if already known.
    pub remote_ref: Option<RemoteRef>,
    /// Sync timestamp, if the record arrives through a sync.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Whether the record still has to be pushed.
    pub pending_push: bool,
}

impl NewPass {
    /// A locally authored pass with the default cost per passage.
    pub fn local(
        plate: impl Into<String>,
        holder_name: impl Into<String>,
        vehicle_class: VehicleClass,
        balance: i64,
    ) -> Self {
        Self {
            plate: plate.into(),
            holder_name: holder_name.into(),
            vehicle_class,
            balance,
            cost_per_passage: DEFAULT_COST_PER_PASSAGE,
            origin: Origin::Local,
            remote_ref: None,
            last_sync_at: None,
            pending_push: true,
        }
    }

    /// A pass materialized from a remote record during a pull.
    pub fn from_remote(
        remote_ref: RemoteRef,
        plate: impl Into<String>,
        holder_name: impl Into<String>,
        vehicle_class: VehicleClass,
        balance: i64,
        synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            plate: plate.into(),
            holder_name: holder_name.into(),
            vehicle_class,
            balance,
            cost_per_passage: DEFAULT_COST_PER_PASSAGE,
            origin: Origin::Remote,
            remote_ref: Some(remote_ref),
            last_sync_at: Some(synced_at),
            pending_push: false,
        }
    }

    /// Sets the cost per passage.
    #[must_use]
    pub fn with_cost_per_passage(mut self, cost: i64) -> Self {
        self.cost_per_passage = cost;
        self
    }

    /// Links the pass to an existing remote record.
    #[must_use]
    pub fn with_remote_ref(mut self, remote_ref: RemoteRef) -> Self {
        self.remote_ref = Some(remote_ref);
        self
    }

    /// Sets the last sync timestamp.
    #[must_use]
    pub fn with_last_sync_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_sync_at = Some(at);
        self
    }

    /// Sets whether the pass still has to be pushed.
    #[must_use]
    pub fn with_pending_push(mut self, pending: bool) -> Self {
        self.pending_push = pending;
        self
    }

    pub(crate) fn into_pass(self, id: PassId) -> SubscriptionPass {
        SubscriptionPass {
            id,
            plate: self.plate.trim().to_string(),
            holder_name: self.holder_name,
            vehicle_class: self.vehicle_class,
            balance: self.balance,
            cost_per_passage: self.cost_per_passage,
            remote_ref: self.remote_ref,
            last_sync_at: self.last_sync_at,
            origin: self.origin,
            pending_push: self.pending_push,
        }
    }
}

/// A partial update; `None` leaves the field as it is.
///
/// A link, once set, is never removed, so there is no way to clear
/// `remote_ref` or `last_sync_at` through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassPatch {
    /// New plate.
    pub plate: Option<String>,
    /// New holder name.
    pub holder_name: Option<String>,
    /// New vehicle class.
    pub vehicle_class: Option<VehicleClass>,
    /// New balance.
    pub balance: Option<i64>,
    /// New cost per passage.
    pub cost_per_passage: Option<i64>,
    /// Remote counterpart.
    pub remote_ref: Option<RemoteRef>,
    /// Sync timestamp.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Authoring side.
    pub origin: Option<Origin>,
    /// Pending push flag.
    pub pending_push: Option<bool>,
}

impl PassPatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plate.
    #[must_use]
    pub fn plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = Some(plate.into());
        self
    }

    /// Sets the holder name.
    #[must_use]
    pub fn holder_name(mut self, name: impl Into<String>) -> Self {
        self.holder_name = Some(name.into());
        self
    }

    /// Sets the vehicle class.
    #[must_use]
    pub fn vehicle_class(mut self, class: VehicleClass) -> Self {
        self.vehicle_class = Some(class);
        self
    }

    /// Sets the balance.
    #[must_use]
    pub fn balance(mut self, balance: i64) -> Self {
        self.balance = Some(balance);
        self
    }

    /// Sets the cost per passage.
    #[must_use]
    pub fn cost_per_passage(mut self, cost: i64) -> Self {
        self.cost_per_passage = Some(cost);
        self
    }

    /// Links the record to a remote counterpart.
    #[must_use]
    pub fn remote_ref(mut self, remote_ref: RemoteRef) -> Self {
        self.remote_ref = Some(remote_ref);
        self
    }

    /// Sets the sync timestamp.
    #[must_use]
    pub fn last_sync_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_sync_at = Some(at);
        self
    }

    /// Sets the origin.
    #[must_use]
    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Sets the pending push flag.
    #[must_use]
    pub fn pending_push(mut self, pending: bool) -> Self {
        self.pending_push = Some(pending);
        self
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to(&self, pass: &mut SubscriptionPass) {
        if let Some(plate) = &self.plate {
            pass.plate = plate.trim().to_string();
        }
        if let Some(name) = &self.holder_name {
            pass.holder_name = name.clone();
        }
        if let Some(class) = self.vehicle_class {
            pass.vehicle_class = class;
        }
        if let Some(balance) = self.balance {
            pass.balance = balance;
        }
        if let Some(cost) = self.cost_per_passage {
            pass.cost_per_passage = cost;
        }
        if let Some(remote_ref) = self.remote_ref {
            pass.remote_ref = Some(remote_ref);
        }
        if let Some(at) = self.last_sync_at {
            pass.last_sync_at = Some(at);
        }
        if let Some(origin) = self.origin {
            pass.origin = origin;
        }
        if let Some(pending) = self.pending_push {
            pass.pending_push = pending;
        }
    }
}
