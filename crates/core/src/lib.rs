pub mod classify;
pub mod config;
pub mod dom;
pub mod error;
pub mod features;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod model;
pub mod transcoder;
pub mod utils;

pub use classify::{Classifier, ClassifierSet, SwitchFn, Verdict};
pub use config::{AssetRefs, ClassifierConfig, Config, FeatureParams, OperationSwitches, SiteConfigTable, merge_config};
pub use dom::{Document, Node, NodeId, NodeKind};
pub use error::{Result, TranscodeError};
pub use features::{FeatureExtractor, FeatureMap, FeatureState, FeatureValue};
#[cfg(feature = "fetch")]
pub use fetch::FetchConfig;
#[cfg(feature = "fetch")]
pub use fetch::{fetch_document, fetch_file, fetch_stdin, fetch_url};
pub use model::Model;
pub use transcoder::Transcoder;
pub use utils::{
    CLASS_LINK_BLOCK, CLASS_LIST, CLASS_NAV, CLASS_NAV_BLOCK, CLASS_NAV_GROUP, CLASS_NAV_HIDDEN, label_count,
};
