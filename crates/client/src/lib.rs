//! # geoscout-client
//!
//! Async clients for the services the geoscout batch jobs talk to.
//!
//! ## Features
//!
//! - **Google Maps**: geocoding, directions, nearby search, place details,
//!   time zone and Street View imagery
//! - **Ollama**: image descriptions from a local `/api/generate` server
//! - **Retries**: exponential backoff for transient failures only
//! - **Call budgets**: hard ceilings on the number of billed requests
//!
//! ## Example
//!
//! ```no_run
//! use geoscout_client::prelude::*;
//!
//! # async fn run() -> geoscout_client::Result<()> {
//! let client = GoogleMapsClient::new("API_KEY");
//! let mut budget = CallBudget::new(10);
//!
//! budget.acquire()?;
//! if let Some(location) = client.locate("台南市政府").await? {
//!     println!("{}", location.to_query());
//! }
//! # Ok(())
//! # }
//! ```

pub mod budget;
pub mod error;
pub mod google;
pub mod identifiers;
pub mod ollama;
pub mod retry;

// Re-exports for convenience
pub mod prelude {
    pub use crate::budget::CallBudget;
    pub use crate::error::{ClientError, Result};
    pub use crate::google::{
        DirectionsSource, GoogleMapsClient, LatLng, StreetViewImage, StreetViewRequest,
        TravelMode,
    };
    pub use crate::identifiers::*;
    pub use crate::ollama::OllamaClient;
    pub use crate::retry::RetryPolicy;
}

pub use prelude::*;
