pub mod ocean_obs_collect;
