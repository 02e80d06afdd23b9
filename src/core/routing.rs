//! Route selection
//!
//! `decide` is pure: every input arrives as an argument, so it can be
//! exercised without an object store or environment.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::filter::PatternSet;
use super::tags::{TagSet, VOLTRON_PROCESSING_SUCCESS, VOLTRON_PROCESSING_TAG};
use crate::config::PolicyFlag;

/// Key segment marking a bundle as CAT3 source material
pub const CAT3_BUNDLE_MARKER: &str = "CAT3_BUNDLE/";

/// What to do with one object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingAction {
    /// Move the raw bundle to the Voltron bucket and delete the source
    RouteToPrimaryDestination,
    /// Encrypt and copy the bundle to the CAT2 bucket
    RouteToSecondaryDestination,
    NoAction,
}

impl fmt::Display for RoutingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingAction::RouteToPrimaryDestination => write!(f, "VOLTRON_COPY"),
            RoutingAction::RouteToSecondaryDestination => write!(f, "CAT2_COPY"),
            RoutingAction::NoAction => write!(f, "NONE"),
        }
    }
}

/// True when the key carries the CAT3 bundle segment
pub fn is_cat3_bundle(object_key: &str) -> bool {
    object_key.contains(CAT3_BUNDLE_MARKER)
}

/// Pick the route for one object; first matching rule wins.
///
/// 1. CAT3 bundle, not excluded, policy `VOLTRON_COPY` → primary
/// 2. no `VOLTRON-PROCESSING=SUCCESS`, not excluded, policy `CAT2_COPY` → secondary
/// 3. otherwise nothing
pub fn decide(
    object_key: &str,
    tags: &TagSet,
    policy: &PolicyFlag,
    transfer_exclusions: &PatternSet,
) -> RoutingAction {
    let excluded = transfer_exclusions.matches(object_key);
    let already_processed = tags.exists(VOLTRON_PROCESSING_TAG, VOLTRON_PROCESSING_SUCCESS);

    if is_cat3_bundle(object_key) && !excluded && policy.selects_primary() {
        RoutingAction::RouteToPrimaryDestination
    } else if !already_processed && !excluded && policy.selects_secondary() {
        RoutingAction::RouteToSecondaryDestination
    } else {
        RoutingAction::NoAction
    }
}
