pub mod clock;
pub mod models;
pub mod overlap;
pub mod window;
