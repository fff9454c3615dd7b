//! Active serving context
//!
//! The single mutable slot of the process. Readers borrow a complete
//! immutable snapshot; the writer replaces the whole snapshot in one atomic
//! store. There is no state where a reader can observe a new classifier
//! with an old codec or vice versa.

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::inference::Classifier;
use super::labels::LabelCodec;

/// The serving pair: a loaded classifier and the codec it was trained
/// against, replaced only as a unit.
pub struct ActiveContext {
    pub version_id: i64,
    pub classifier: Arc<dyn Classifier>,
    pub codec: LabelCodec,
    pub loaded_at: DateTime<Utc>,
}

/// Atomically replaceable slot holding the current [`ActiveContext`].
///
/// `snapshot` is wait-free; a snapshot taken before a swap stays valid for
/// the borrower's whole prediction even after the swap lands.
pub struct ActiveSlot {
    inner: ArcSwapOption<ActiveContext>,
}

impl ActiveSlot {
    pub fn empty() -> Self {
        Self {
            inner: ArcSwapOption::empty(),
        }
    }

    pub fn snapshot(&self) -> Option<Arc<ActiveContext>> {
        self.inner.load_full()
    }

    pub fn install(&self, context: ActiveContext) {
        self.inner.store(Some(Arc::new(context)));
    }
}

impl Default for ActiveSlot {
    fn default() -> Self {
        Self::empty()
    }
}
