pub mod track;
pub mod v1;

pub use track::{
    ReleaseTrack,
    Service,
};
