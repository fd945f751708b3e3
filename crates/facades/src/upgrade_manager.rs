use crate::{Error, FeatureReferences, Resolve, Result, Reusable, Slot};
use features::{AcceptContext, Features, HttpRequest, Upgraded, WebSocketUpgrade};
use std::future::Future;
use std::sync::Arc;

/// UpgradeManager is a reusable view through which a request
/// may be inspected for, and accepted as, a websocket upgrade.
///
/// Unlike ConnectionInfo, no defaults are installed: queries degrade
/// to a negative answer when the transport can't upgrade, while accept()
/// fails with Error::Unsupported.
#[derive(Default)]
pub struct UpgradeManager {
    features: FeatureReferences<UpgradeFeatures>,
}

#[derive(Default)]
struct UpgradeFeatures {
    request: Slot<Arc<dyn HttpRequest>>,
    upgrade: Slot<Arc<dyn WebSocketUpgrade>>,
}

const REQUEST: Resolve<Arc<dyn HttpRequest>> = Resolve::OrAbsent;
const UPGRADE: Resolve<Arc<dyn WebSocketUpgrade>> = Resolve::OrAbsent;

impl UpgradeManager {
    pub fn new(features: Arc<Features>) -> Self {
        Self {
            features: FeatureReferences::new(features),
        }
    }

    fn request(&mut self) -> Result<Option<&dyn HttpRequest>> {
        Ok(self
            .features
            .fetch(|f| &mut f.request, &REQUEST)?
            .map(|request| &**request))
    }

    fn upgrade(&mut self) -> Result<Option<&dyn WebSocketUpgrade>> {
        Ok(self
            .features
            .fetch(|f| &mut f.upgrade, &UPGRADE)?
            .map(|upgrade| &**upgrade))
    }

    /// Returns true if the request asks for a websocket upgrade
    /// which the transport is able to perform.
    pub fn is_upgrade_request(&mut self) -> Result<bool> {
        Ok(self
            .upgrade()?
            .map_or(false, |upgrade| upgrade.is_upgrade_request()))
    }

    /// Sub-protocols requested by the client through `Sec-WebSocket-Protocol`,
    /// in the order given.
    pub fn requested_sub_protocols(&mut self) -> Result<Vec<String>> {
        let Some(request) = self.request()? else {
            return Ok(Vec::new());
        };
        Ok(crate::split_values(
            request
                .headers()
                .get_all(http::header::SEC_WEBSOCKET_PROTOCOL),
        ))
    }

    /// Accept the upgrade, selecting `sub_protocol`.
    /// The upgrade feature is resolved immediately, and the returned
    /// future doesn't borrow this UpgradeManager.
    pub fn accept(
        &mut self,
        sub_protocol: Option<String>,
    ) -> impl Future<Output = Result<Upgraded>> + Send + 'static {
        let accept = match self.upgrade() {
            Ok(Some(upgrade)) => Ok(upgrade.accept(AcceptContext { sub_protocol })),
            Ok(None) => Err(Error::Unsupported("upgrade")),
            Err(err) => Err(err),
        };

        async move { Ok::<_, Error>(accept?.await?) }
    }
}

impl Reusable for UpgradeManager {
    fn initialize(&mut self, features: Arc<Features>) {
        self.features.initialize(features);
    }
    fn uninitialize(&mut self) {
        self.features.uninitialize();
    }
}
