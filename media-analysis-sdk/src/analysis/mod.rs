//! Media analysis: request identity, result normalization, the request
//! governor and its sequential batch wrapper

mod governor;
mod key;
mod media;
mod result;
mod sequential;

pub use governor::{
    ActiveRequestRecord, AnalysisOptions, AnalysisQueueSnapshot, AnalysisQueueState, MediaAnalysisGovernor,
};
pub use key::AnalysisRequestKey;
pub use media::MediaType;
pub use result::{
    detect_non_conformity, ActionPlan, MediaAnalysisResult, NON_CONFORMITY_KEYWORDS, NO_ACTION_SENTINEL,
};
pub use sequential::{SequentialAnalysisQueue, SequentialAnalysisState};
