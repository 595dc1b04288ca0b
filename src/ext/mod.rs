mod duration_ext;
mod error_ext;

pub use duration_ext::DurationExt;
pub use error_ext::ErrorChainExt;
