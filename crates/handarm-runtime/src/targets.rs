//! Shared joint-target snapshot.
//!
//! The capture task is the only writer; the dispatcher (and anything else
//! that wants to look) reads.  Each merge publishes a complete new
//! [`JointTargets`] value, so a reader always sees a whole vector from one
//! merge, never a mix of two.  Reads are lock-free and never wait on the
//! writer.

use std::sync::Arc;

use arc_swap::ArcSwap;
use handarm_types::{JointTargets, PartialTargets};

/// Create a writer/reader pair seeded with `initial`.
pub fn target_channel(initial: JointTargets) -> (TargetWriter, TargetReader) {
    let cell = Arc::new(ArcSwap::from_pointee(initial));
    (
        TargetWriter {
            cell: Arc::clone(&cell),
        },
        TargetReader { cell },
    )
}

/// Sole write handle.  Deliberately not `Clone`.
pub struct TargetWriter {
    cell: Arc<ArcSwap<JointTargets>>,
}

impl TargetWriter {
    /// Overlay `update` on the current targets and publish the result.
    /// Channels absent from `update` keep their last value.
    pub fn merge(&self, update: &PartialTargets) -> JointTargets {
        let current = **self.cell.load();
        if update.is_empty() {
            return current;
        }
        let next = current.merge(update);
        self.cell.store(Arc::new(next));
        next
    }

    pub fn current(&self) -> JointTargets {
        **self.cell.load()
    }

    pub fn reader(&self) -> TargetReader {
        TargetReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

#[derive(Clone)]
pub struct TargetReader {
    cell: Arc<ArcSwap<JointTargets>>,
}

impl TargetReader {
    pub fn snapshot(&self) -> JointTargets {
        **self.cell.load()
    }
}
