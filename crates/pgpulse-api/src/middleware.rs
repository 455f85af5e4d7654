//! Middleware — converting handler panics into error responses.

use axum::body::Body;
use axum::http::Response;
use pgpulse_common::error::{ApiError, ErrorResponder};
use std::any::Any;
use tower_http::catch_panic::ResponseForPanic;

/// Routes a caught panic through the generic error responder as a 500.
#[derive(Debug, Clone, Copy)]
pub struct PanicResponder {
    errors: ErrorResponder,
}

impl PanicResponder {
    pub fn new(errors: ErrorResponder) -> Self {
        Self { errors }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let cause = if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            (*s).to_owned()
        } else {
            "unknown panic payload".to_owned()
        };

        self.errors.respond(&ApiError::Internal(cause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgpulse_common::config::DeploymentMode;

    #[test]
    fn panic_payloads_become_500() {
        let mut responder = PanicResponder::new(ErrorResponder::new(DeploymentMode::Production));
        let response = responder.response_for_panic(Box::new("lease poisoned"));
        assert_eq!(response.status(), 500);

        let response = responder.response_for_panic(Box::new(String::from("owned")));
        assert_eq!(response.status(), 500);

        let response = responder.response_for_panic(Box::new(42_u8));
        assert_eq!(response.status(), 500);
    }
}
