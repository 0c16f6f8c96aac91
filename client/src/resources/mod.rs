//! One client per REST resource under `/datastores/{id}/`.

mod check;
mod configuration;
mod datastore;
mod offering;
mod processing;
mod static_file;
mod stored_data;
mod upload;
mod user;

pub use check::CheckClient;
pub use configuration::{relations_from_tree, ConfigurationClient};
pub use datastore::DatastoreClient;
pub use offering::OfferingClient;
pub use processing::ProcessingClient;
pub use static_file::StaticClient;
pub use stored_data::StoredDataClient;
pub use upload::UploadClient;
pub use user::UserClient;
