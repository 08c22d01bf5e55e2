pub mod extract;
pub mod model;
pub mod numbered;
pub mod windower;
