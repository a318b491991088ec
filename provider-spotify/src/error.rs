//! Mapping of Web API failures onto [`CatalogError`]

use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use core_catalog::CatalogError;
use std::time::Duration;

use crate::types::ErrorResponse;

/// Classifies a non-success response. 401 is handled by the caller, which
/// owns the refresh-and-retry.
pub(crate) fn status_error(response: &HttpResponse, resource: &str) -> CatalogError {
    match response.status {
        401 => CatalogError::Auth,
        404 => CatalogError::NotFound {
            resource: resource.to_string(),
        },
        429 => CatalogError::RateLimited {
            retry_after: retry_after(response),
        },
        status if status >= 500 => {
            CatalogError::Transient(format!("status {}: {}", status, error_message(response)))
        }
        status => CatalogError::BadRequest {
            status,
            message: error_message(response),
        },
    }
}

/// Transport failures are always transient.
pub(crate) fn transport_error(error: BridgeError) -> CatalogError {
    CatalogError::Transient(error.to_string())
}

/// `Retry-After` in delta-seconds. HTTP-date values are not used by the API.
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("Retry-After")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn error_message(response: &HttpResponse) -> String {
    match response.json::<ErrorResponse>() {
        Ok(body) => body.error.message,
        Err(_) => response
            .text()
            .unwrap_or_else(|_| "Unable to read error response".to_string()),
    }
}
