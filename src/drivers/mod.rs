//! Converter drivers and the shared bus they sit on.

pub mod ads112c04;
pub mod bus;
pub mod local_adc;
