//! Shared setup for unit and integration tests.

use std::sync::Once;

static DOTENV: Once = Once::new();

/// Loads `.env` from the working directory once per process. A missing
/// file is not an error; live tests skip when their variables are unset.
pub fn load_dotenv() {
    DOTENV.call_once(|| {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env loaded: {}", e);
        }
    });
}
