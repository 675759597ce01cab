pub mod dose_log;
pub mod medication;
pub mod profile;

pub use dose_log::{DoseLog, DoseStatus};
pub use medication::{
    classify_expiry, DoseTime, ExpiryState, Frequency, Medication, NewMedication, StockState,
};
pub use profile::{photo_data_url, UserProfile};
