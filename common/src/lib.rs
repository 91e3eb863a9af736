pub mod combine;
pub mod extract;
pub mod reshape;
