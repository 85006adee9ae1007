pub mod drivers;
pub mod monitor;
pub mod rides;
