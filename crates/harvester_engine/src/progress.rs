use harvester_core::StopReason;

/// Where one matched item is in its download sub-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    DetailOpened,
    FilesEnumerated,
    FilesSelected,
    DownloadTriggered,
    DownloadSaved,
    Materialized,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    PassObserved {
        pass: u32,
        visible: usize,
    },
    ItemStage {
        identity: String,
        stage: ItemStage,
    },
    ItemHarvested {
        identity: String,
        files: usize,
    },
    Finished {
        reason: StopReason,
        files: usize,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<HarvestEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<HarvestEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: HarvestEvent) {
        let _ = self.tx.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: HarvestEvent) {}
}
