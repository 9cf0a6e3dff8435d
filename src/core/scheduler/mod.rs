pub mod cycle_state;
pub mod interface;
pub mod load_aware;
pub mod plugin;
pub mod score_profile;
