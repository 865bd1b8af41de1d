use std::sync::Arc;

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::config::IdGeneration;

const RANDOM_ID_LEN: usize = 32;

/// Custom primary key generator, called with the framework model name.
pub type IdGenerator = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[must_use]
pub fn random_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_ID_LEN)
        .map(char::from)
        .collect()
}

/// Key for a new record of `model`, or `None` when generation is disabled.
#[must_use]
pub fn generate_id(strategy: IdGeneration, custom: Option<&IdGenerator>, model: &str) -> Option<String> {
    if let Some(generator) = custom {
        return Some(generator(model));
    }
    match strategy {
        IdGeneration::Random => Some(random_id()),
        IdGeneration::Uuid => Some(uuid::Uuid::now_v7().to_string()),
        IdGeneration::Disabled => None,
    }
}
