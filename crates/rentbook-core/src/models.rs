use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{Collection, Document, StorageError};

/// A typed entity that lives in one collection of the document store.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);

    fn to_document(&self) -> Result<Document, StorageError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Other(format!(
                "{} did not serialize to an object: {}",
                Self::COLLECTION.singular(),
                other
            ))),
        }
    }

    fn from_document(doc: Document) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(Value::Object(doc))?)
    }
}

macro_rules! impl_record {
    ($ty:ty, $collection:expr) => {
        impl Record for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

fn default_water_charge() -> f64 {
    200.0
}

fn default_electric_rate() -> f64 {
    8.0
}

fn default_source() -> String {
    "direct".to_string()
}

fn default_preferred_contact() -> String {
    "Whatsapp".to_string()
}

fn default_rent_type() -> String {
    "month".to_string()
}

fn default_status() -> String {
    "future".to_string()
}

fn default_payment_category() -> String {
    "Rent".to_string()
}

fn default_expense_category() -> String {
    "Repairs".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// A rentable unit inside a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    #[serde(default)]
    pub id: String,
    pub property_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub internal_notes: String,
    #[serde(default)]
    pub daily_rate: f64,
    #[serde(default)]
    pub weekly_rate: f64,
    #[serde(default)]
    pub monthly_rate: f64,
    #[serde(default = "default_water_charge")]
    pub monthly_water_charge: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub date: String,
    pub reading: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub date: String,
    pub amount: f64,
    #[serde(default = "default_payment_category")]
    pub category: String,
}

/// One billed period of a stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub start_date: String,
    pub end_date: String,
    pub cost: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub rate: f64,
}

/// A guest stay on a unit. Rates are snapshotted from the unit at booking time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default)]
    pub id: String,
    pub unit_id: String,
    #[serde(default)]
    pub name: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub whatsapp: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default = "default_preferred_contact")]
    pub preferred_contact: String,
    pub check_in: String,
    pub checkout: String,
    #[serde(default)]
    pub deposit: f64,
    pub monthly_rate: f64,
    pub weekly_rate: f64,
    pub daily_rate: f64,
    #[serde(default = "default_water_charge")]
    pub monthly_water_charge: f64,
    #[serde(default = "default_electric_rate")]
    pub electric_rate: f64,
    #[serde(default = "default_rent_type")]
    pub rent_type: String,
    #[serde(default)]
    pub meter_readings: Vec<MeterReading>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// A cost, optionally attached to a property, a unit, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: String,
    pub date: String,
    pub amount: f64,
    pub description: String,
    #[serde(default = "default_expense_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
}

impl_record!(Property, Collection::Properties);
impl_record!(Unit, Collection::Units);
impl_record!(Booking, Collection::Bookings);
impl_record!(Expense, Collection::Expenses);
