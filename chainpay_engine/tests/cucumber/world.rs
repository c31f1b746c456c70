use chainpay_engine::{cpe_api::order_objects::WebhookSummary, ReconciliationError};
use cucumber::World;

use crate::common::TestSystem;

#[derive(Default, Debug, World)]
pub struct ChainpayWorld {
    pub system: Option<TestSystem>,
    pub last_error: Option<ReconciliationError>,
    pub last_summary: Option<WebhookSummary>,
}

impl ChainpayWorld {
    pub async fn system(&mut self) -> &TestSystem {
        if self.system.is_none() {
            self.system = Some(TestSystem::new().await);
        }
        self.system.as_ref().expect("Test system not initialised")
    }
}
