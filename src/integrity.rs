//! Cascading deletes for parent records.
//!
//! Properties own units; units own bookings and expenses. Expenses may also
//! hang directly off a property. Removing a parent removes every dependent in
//! a fixed order inside one storage transaction.

use serde_json::Value;

use crate::{
    manager::RentalManager,
    storage::{Collection, Filter, StorageError},
};

/// Number of dependent records removed by one cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub removed_parent: bool,
    pub units: usize,
    pub bookings: usize,
    pub expenses: usize,
}

impl CascadeReport {
    fn record_metrics(&self, entity: &'static str) {
        metrics::increment_counter!("rentbook_cascade_deletes_total", "entity" => entity);
        metrics::counter!("rentbook_cascade_children_removed_total", self.units as u64, "collection" => "units");
        metrics::counter!("rentbook_cascade_children_removed_total", self.bookings as u64, "collection" => "bookings");
        metrics::counter!("rentbook_cascade_children_removed_total", self.expenses as u64, "collection" => "expenses");
    }
}

impl RentalManager {
    /// Deletes a property, its units, the bookings on those units and the
    /// expenses filed against the property.
    pub fn delete_property_cascade(&self, property_id: &str) -> Result<CascadeReport, StorageError> {
        let _guard = self.write_guard();
        let report = self.in_transaction(|store| {
            let removed_parent = store.delete_by_id(Collection::Properties, property_id)?;

            let owned_by_property = Filter::field_eq("propertyId", property_id);
            // Unit ids must be collected before the units themselves go
            let unit_ids: Vec<String> = store
                .find_by_filter(Collection::Units, &owned_by_property)?
                .iter()
                .filter_map(|unit| unit.get("id").and_then(Value::as_str).map(str::to_string))
                .collect();

            let units = store.delete_by_filter(Collection::Units, &owned_by_property)?;
            let bookings = store.delete_by_filter(Collection::Bookings, &Filter::field_in("unitId", unit_ids))?;
            let expenses = store.delete_by_filter(Collection::Expenses, &owned_by_property)?;

            Ok(CascadeReport {
                removed_parent,
                units,
                bookings,
                expenses,
            })
        })?;

        tracing::info!(
            property_id,
            found = report.removed_parent,
            units = report.units,
            bookings = report.bookings,
            expenses = report.expenses,
            "Property deleted with dependents"
        );
        report.record_metrics("property");
        Ok(report)
    }

    /// Deletes a unit together with its bookings and expenses.
    pub fn delete_unit_cascade(&self, unit_id: &str) -> Result<CascadeReport, StorageError> {
        let _guard = self.write_guard();
        let report = self.in_transaction(|store| {
            let removed_parent = store.delete_by_id(Collection::Units, unit_id)?;
            let owned_by_unit = Filter::field_eq("unitId", unit_id);
            let bookings = store.delete_by_filter(Collection::Bookings, &owned_by_unit)?;
            let expenses = store.delete_by_filter(Collection::Expenses, &owned_by_unit)?;

            Ok(CascadeReport {
                removed_parent,
                units: usize::from(removed_parent),
                bookings,
                expenses,
            })
        })?;

        tracing::info!(
            unit_id,
            found = report.removed_parent,
            bookings = report.bookings,
            expenses = report.expenses,
            "Unit deleted with dependents"
        );
        report.record_metrics("unit");
        Ok(report)
    }
}
