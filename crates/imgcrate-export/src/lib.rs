pub mod compress;
pub mod encoder;
pub mod error;
pub mod naming;
pub mod resample;
pub mod thumbnail;
