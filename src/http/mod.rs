//! HTTP protocol layer module
//!
//! Response builders shared by the query endpoints, decoupled from the
//! endpoint logic itself.

pub mod response;

// Re-export commonly used types
pub use response::{
    build_204_response, build_404_response, build_405_response, build_413_response,
    build_500_response, build_bytes_response, build_health_response, build_json_response,
    build_text_response,
};
