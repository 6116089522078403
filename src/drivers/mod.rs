//! Input and output drivers, plus one-shot hardware initialisation.

pub mod button;
pub mod hw_init;
pub mod light;
