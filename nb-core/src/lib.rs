pub mod builds;
pub mod client;
pub mod constants;
pub mod errors;
pub mod interrupt;
pub mod logging;
pub mod output;
pub mod progress;
pub mod properties;
pub mod services;
pub mod time;
pub mod waiter;

pub mod prelude {
    pub use nb_api::v1::{
        Build,
        BuildStatus,
        Cluster,
        Instance,
        Operation,
    };
    pub use nb_api::{
        ReleaseTrack,
        Service,
    };

    pub use crate::client::RestClient;
    pub use crate::constants::*;
    pub use crate::errors::EmptyResult;
    pub use crate::output::OutputFormat;
    pub use crate::properties::Properties;
}
