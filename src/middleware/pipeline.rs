use std::sync::Arc;

use tracing::debug;

use super::Middleware;
use crate::request::Request;
use crate::response::Response;

/// The middleware resolved for one request, in application order.
#[derive(Default)]
pub(crate) struct Pipeline {
    stages: Vec<(String, Arc<dyn Middleware>)>,
}

impl Pipeline {
    pub(crate) fn push(&mut self, name: String, middleware: Arc<dyn Middleware>) {
        self.stages.push((name, middleware));
    }

    pub(crate) fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Runs `before` hooks in order. On short-circuit returns the response
    /// together with how many stages ran, so only those get `after`.
    pub(crate) async fn before(&self, req: &mut Request) -> Result<(), (usize, Response)> {
        for (i, (name, stage)) in self.stages.iter().enumerate() {
            if let Err(res) = stage.before(req).await {
                debug!(middleware = %name, status = %res.status_code(), "middleware short-circuited");
                return Err((i + 1, res));
            }
        }
        Ok(())
    }

    /// Runs `after` hooks of the first `ran` stages in reverse order.
    pub(crate) async fn after(&self, ran: usize, mut res: Response) -> Response {
        for (_, stage) in self.stages[..ran].iter().rev() {
            res = stage.after(res).await;
        }
        res
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.len()
    }
}
