pub mod bills;
pub mod members;
pub mod rides;
