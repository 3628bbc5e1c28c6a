//! Message and query routing by module name

use crate::{NodeError, NodeResult};
use chain_core::Handler;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps a module route to its handler
#[derive(Clone, Default)]
pub struct Router {
    routes: BTreeMap<String, Arc<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `path`. Routes are alphanumeric and unique.
    pub fn add_route(&mut self, path: &str, handler: Arc<dyn Handler>) -> NodeResult<()> {
        if path.is_empty() || !path.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(NodeError::Config(format!(
                "route expressions can only contain alphanumeric characters: {}",
                path
            )));
        }
        if self.routes.contains_key(path) {
            return Err(NodeError::Config(format!(
                "route {} has already been initialized",
                path
            )));
        }
        self.routes.insert(path.to_string(), handler);
        Ok(())
    }

    pub fn route(&self, path: &str) -> Option<&Arc<dyn Handler>> {
        self.routes.get(path)
    }

    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::{Context, Msg, StdResult, TxResult};

    struct Echo;

    impl Handler for Echo {
        fn process(&self, _ctx: &Context, _msg: &Msg) -> TxResult {
            TxResult::ok()
        }

        fn query(&self, _ctx: &Context, path: &str, _data: &[u8]) -> StdResult<Vec<u8>> {
            Ok(path.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_add_route() {
        let mut router = Router::new();
        router.add_route("bank", Arc::new(Echo)).unwrap();
        router.add_route("vm", Arc::new(Echo)).unwrap();
        assert!(router.route("bank").is_some());
        assert!(router.route("staking").is_none());
        assert_eq!(router.routes().collect::<Vec<_>>(), vec!["bank", "vm"]);
    }

    #[test]
    fn test_invalid_routes() {
        let mut router = Router::new();
        assert!(router.add_route("", Arc::new(Echo)).is_err());
        assert!(router.add_route("bank/send", Arc::new(Echo)).is_err());
        router.add_route("bank", Arc::new(Echo)).unwrap();
        assert!(matches!(
            router.add_route("bank", Arc::new(Echo)),
            Err(NodeError::Config(_))
        ));
    }
}
