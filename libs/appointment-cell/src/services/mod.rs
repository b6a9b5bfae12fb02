// libs/appointment-cell/src/services/mod.rs
pub mod allocation;
pub mod calendar;
pub mod directory;
pub mod lifecycle;
pub mod query;
pub mod store;
pub mod supabase;

use std::sync::Arc;

use shared_config::{AppConfig, StoreBackend};
use shared_database::supabase::SupabaseClient;
use tracing::info;

use crate::models::SchedulingSettings;

pub use allocation::SlotAllocationService;
pub use directory::{ClinicCapacityDirectory, InMemoryClinicDirectory, InMemoryPatientDirectory, PatientDirectory};
pub use lifecycle::ConsultationLifecycleService;
pub use query::AppointmentQueryService;
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use supabase::SupabaseBackend;

/// Everything the HTTP layer needs, wired over one set of backends.
pub struct AppointmentServices {
    pub allocator: SlotAllocationService,
    pub lifecycle: ConsultationLifecycleService,
    pub queries: AppointmentQueryService,
    pub clinics: Arc<dyn ClinicCapacityDirectory>,
    pub patients: Arc<dyn PatientDirectory>,
    pub settings: SchedulingSettings,
}

impl AppointmentServices {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        clinics: Arc<dyn ClinicCapacityDirectory>,
        patients: Arc<dyn PatientDirectory>,
        settings: SchedulingSettings,
    ) -> Self {
        Self {
            allocator: SlotAllocationService::new(
                store.clone(),
                clinics.clone(),
                patients.clone(),
                settings.clone(),
            ),
            lifecycle: ConsultationLifecycleService::new(store.clone()),
            queries: AppointmentQueryService::new(store, clinics.clone(), settings.clone()),
            clinics,
            patients,
            settings,
        }
    }

    pub fn in_memory(
        store: Arc<InMemoryAppointmentStore>,
        clinics: Arc<InMemoryClinicDirectory>,
        patients: Arc<InMemoryPatientDirectory>,
        settings: SchedulingSettings,
    ) -> Self {
        Self::new(store, clinics, patients, settings)
    }

    /// Picks the backend named by `STORE_BACKEND`.
    pub fn from_config(config: &AppConfig) -> Self {
        let settings = SchedulingSettings::from_config(config);

        match config.store_backend {
            StoreBackend::Supabase => {
                info!("Using Supabase appointment store at {}", config.supabase_url);
                let backend = Arc::new(SupabaseBackend::new(Arc::new(SupabaseClient::new(config))));
                Self::new(backend.clone(), backend.clone(), backend, settings)
            }
            StoreBackend::Memory => {
                info!("Using in-memory appointment store");
                Self::in_memory(
                    Arc::new(InMemoryAppointmentStore::new()),
                    Arc::new(InMemoryClinicDirectory::new()),
                    Arc::new(InMemoryPatientDirectory::new()),
                    settings,
                )
            }
        }
    }
}
