pub mod fake_marketplace;
pub mod prepare_env;
