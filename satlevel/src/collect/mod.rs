pub mod global_variables;
pub mod ocean_obs;
