use tokio_util::sync::CancellationToken;

use crate::report::Combination;
use crate::reporter::CombinationLog;
use crate::types::BaselineRecords;

/// Everything a component needs to know about the combination it runs in
pub struct CombinationContext<'a> {
    pub combination: &'a Combination,
    pub baselines: &'a BaselineRecords,
    pub log: &'a CombinationLog,
    pub cancel: &'a CancellationToken,
}
