use rentbook_core::{Property, Record, Unit};

use crate::{
    manager::RentalManager,
    storage::{Collection, StorageError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Initialized,
    AlreadyPresent,
}

impl SeedOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SeedOutcome::Initialized => "Sample data initialized successfully",
            SeedOutcome::AlreadyPresent => "Data already exists",
        }
    }
}

pub fn sample_properties() -> Vec<Property> {
    [("prop-1", "Bura Paradise"), ("prop-2", "Lily House"), ("prop-3", "28/12 Maenam Soi 5")]
        .into_iter()
        .map(|(id, name)| Property {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}

pub fn sample_units() -> Vec<Unit> {
    let unit = |id: &str, property_id: &str, name: &str, description: &str, monthly_rate: f64| Unit {
        id: id.to_string(),
        property_id: property_id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        internal_notes: String::new(),
        daily_rate: 500.0,
        weekly_rate: 3000.0,
        monthly_rate,
        monthly_water_charge: 200.0,
    };

    vec![
        unit("unit-1", "prop-3", "MaenamHouse", "3 bedroom, 2 bathroom house with yard", 15000.0),
        unit("unit-2", "prop-1", "Bura1", "Studio apartment", 9000.0),
        unit("unit-3", "prop-2", "Lily1", "Small apartment, bathroom on balcony, fake staircase", 7500.0),
        unit("unit-4", "prop-2", "Lily2", "Large apartment", 9500.0),
        unit("unit-5", "prop-2", "Lily3", "Large apartment", 9000.0),
    ]
}

impl RentalManager {
    /// Inserts the baseline properties and units unless any property exists.
    ///
    /// Only the properties collection is checked: a store holding units but
    /// no properties is seeded again.
    pub fn initialize_sample_data(&self) -> Result<SeedOutcome, StorageError> {
        let _guard = self.write_guard();
        let outcome = self.in_transaction(|store| {
            if store.count(Collection::Properties)? > 0 {
                return Ok(SeedOutcome::AlreadyPresent);
            }

            let properties = sample_properties()
                .iter()
                .map(|record| record.to_document())
                .collect::<Result<Vec<_>, _>>()?;
            let units = sample_units()
                .iter()
                .map(|record| record.to_document())
                .collect::<Result<Vec<_>, _>>()?;
            store.insert_many(Collection::Properties, properties)?;
            store.insert_many(Collection::Units, units)?;
            Ok(SeedOutcome::Initialized)
        })?;

        tracing::info!(?outcome, "Sample data initialization finished");
        let label = match outcome {
            SeedOutcome::Initialized => "initialized",
            SeedOutcome::AlreadyPresent => "skipped",
        };
        metrics::increment_counter!("rentbook_seed_runs_total", "outcome" => label);
        Ok(outcome)
    }
}
