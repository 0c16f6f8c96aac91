//! Async client for the Géoplateforme "Entrepôt" API: deliver vector data,
//! drive the server-side integration and tiling jobs, publish the results as
//! WMTS-TMS / WFS / WMS-VECTOR services.

pub mod error;
pub mod http;
pub mod multipart;
pub mod pagination;
pub mod pipeline;
pub mod resources;
pub mod settings;

pub use error::ApiError;
pub use http::ApiClient;
pub use settings::Settings;
