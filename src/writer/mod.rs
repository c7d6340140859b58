pub mod bin;
pub mod bundle;
pub mod c;
