use super::file::FileRef;
use super::{FrameId, PageId};

/// Per-frame metadata, indexed in lockstep with the page pool.
///
/// A frame starts invalid and unpinned; `set` installs a freshly
/// loaded page pinned once, `clear` returns the frame to the invalid
/// defaults on eviction, flush or dispose.
pub struct FrameDesc {
    pub frame_id: FrameId,
    pub file: Option<FileRef>,
    /// meaningful only while `valid`
    pub page_id: PageId,
    pub pin_count: usize,
    pub dirty: bool,
    pub refbit: bool,
    pub valid: bool,
}

impl FrameDesc {
    pub fn new(frame_id: FrameId) -> Self {
        FrameDesc {
            frame_id,
            file: None,
            page_id: 0,
            pin_count: 0,
            dirty: false,
            refbit: false,
            valid: false,
        }
    }

    pub fn clear(&mut self) {
        self.file = None;
        self.page_id = 0;
        self.pin_count = 0;
        self.dirty = false;
        self.refbit = false;
        self.valid = false;
    }

    pub fn set(&mut self, file: FileRef, page_id: PageId) {
        self.file = Some(file);
        self.page_id = page_id;
        self.pin_count = 1;
        self.dirty = false;
        self.refbit = true;
        self.valid = true;
    }
}
