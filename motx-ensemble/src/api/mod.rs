//! HTTP API handlers for motx-ensemble
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /health` | [`health::health_check`] |
//! | `POST /extract` | [`extract::extract_image`] |
//! | `POST /fuse` | [`fuse::fuse_results`] |
//! | `POST /validate/registration` | [`validate::validate_registration`] |
//! | `POST /validate/date` | [`validate::validate_date`] |
//! | `GET /models/info` | [`models::models_info`] |

pub mod extract;
pub mod fuse;
pub mod health;
pub mod models;
pub mod validate;

pub use extract::extract_routes;
pub use fuse::fuse_routes;
pub use health::health_routes;
pub use models::models_routes;
pub use validate::validate_routes;
