use super::file::FileRef;
use super::frame::FrameDesc;
use super::index::FrameIndex;
use super::page::{Page, PageRef};
use super::{FrameId, PageId, StorageError};
use itertools::Itertools;
use log::{info, warn};
use std::cell::RefCell;
use std::rc::Rc;

// a page handed out stays pinned until given back through unpin_page;
// the PageRef is a shared handle onto the pool slot, stable only while
// the pin is held
pub struct BufferPoolManager {
    frames: Vec<FrameDesc>,
    pool: Vec<PageRef>,
    index: FrameIndex,
    clock_hand: usize,
}

pub type BufferPoolManagerRef = Rc<RefCell<BufferPoolManager>>;

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("flush on drop failed: {}", e);
        }
    }
}

fn owned_by(frame: &FrameDesc, file: &FileRef) -> bool {
    frame.file.as_ref().map_or(false, |f| Rc::ptr_eq(f, file))
}

impl BufferPoolManager {
    pub fn new(num_bufs: usize) -> Self {
        assert!(num_bufs > 0);
        let frames = (0..num_bufs).map(FrameDesc::new).collect_vec();
        let pool = (0..num_bufs)
            .map(|_| Rc::new(RefCell::new(Page::empty())))
            .collect_vec();
        info!("buffer pool with {} frames", num_bufs);
        Self {
            frames,
            pool,
            index: FrameIndex::new(num_bufs),
            // the first advance lands on frame 0
            clock_hand: num_bufs - 1,
        }
    }

    pub fn new_shared(num_bufs: usize) -> BufferPoolManagerRef {
        Rc::new(RefCell::new(Self::new(num_bufs)))
    }

    pub fn num_bufs(&self) -> usize {
        self.frames.len()
    }

    fn advance_clock(&mut self) {
        self.clock_hand = (self.clock_hand + 1) % self.frames.len();
    }

    // write back and clear the frame, the caller has checked it is
    // unpinned
    fn evict(&mut self, frame_id: FrameId) -> Result<(), StorageError> {
        if let Some(file) = self.frames[frame_id].file.clone() {
            if self.frames[frame_id].dirty {
                file.borrow_mut().write_page(&self.pool[frame_id].borrow())?;
            }
            self.index.remove(&file, self.frames[frame_id].page_id);
        }
        self.frames[frame_id].clear();
        Ok(())
    }

    fn alloc_buf(&mut self) -> Result<FrameId, StorageError> {
        // remember the start point, every frame is pinned if two
        // passes are made without a selection
        let start = self.clock_hand;
        let mut passes = 0;
        while passes < 2 {
            self.advance_clock();
            if self.clock_hand == start {
                passes += 1;
            }
            let hand = self.clock_hand;
            // an unused frame can be taken at once
            if !self.frames[hand].valid {
                return Ok(hand);
            }
            // recently used, give this frame a second chance
            if self.frames[hand].refbit {
                self.frames[hand].refbit = false;
                continue;
            }
            // cannot evict a pinned frame
            if self.frames[hand].pin_count > 0 {
                continue;
            }
            self.evict(hand)?;
            return Ok(hand);
        }
        Err(StorageError::BufferExceeded)
    }

    pub fn read_page(&mut self, file: &FileRef, page_id: PageId) -> Result<PageRef, StorageError> {
        // page is already in the buffer pool
        if let Some(frame_id) = self.index.lookup(file, page_id) {
            self.frames[frame_id].pin_count += 1;
            self.frames[frame_id].refbit = true;
            return Ok(self.pool[frame_id].clone());
        }
        // not resident, bring it in through a free frame
        let frame_id = self.alloc_buf()?;
        // on a failed read the frame stays cleared and unmapped
        let page = file.borrow_mut().read_page(page_id)?;
        *self.pool[frame_id].borrow_mut() = page;
        self.index.insert(file, page_id, frame_id);
        self.frames[frame_id].set(file.clone(), page_id);
        Ok(self.pool[frame_id].clone())
    }

    pub fn alloc_page(&mut self, file: &FileRef) -> Result<(PageId, PageRef), StorageError> {
        let page_id = file.borrow_mut().allocate_page()?.page_number();
        let frame_id = match self.alloc_buf() {
            Ok(frame_id) => frame_id,
            Err(e) => {
                // roll the file-level allocation back, nothing
                // references the page yet
                let _ = file.borrow_mut().delete_page(page_id);
                return Err(e);
            }
        };
        let page = file.borrow_mut().read_page(page_id)?;
        *self.pool[frame_id].borrow_mut() = page;
        self.index.insert(file, page_id, frame_id);
        self.frames[frame_id].set(file.clone(), page_id);
        Ok((page_id, self.pool[frame_id].clone()))
    }

    pub fn unpin_page(
        &mut self,
        file: &FileRef,
        page_id: PageId,
        dirty: bool,
    ) -> Result<(), StorageError> {
        let frame_id = match self.index.lookup(file, page_id) {
            Some(frame_id) => frame_id,
            // not resident, nothing to release
            None => return Ok(()),
        };
        if self.frames[frame_id].pin_count == 0 {
            return Err(StorageError::PageNotPinned {
                filename: file.borrow().filename(),
                page_id,
                frame_id,
            });
        }
        self.frames[frame_id].pin_count -= 1;
        // only eviction or flush ever clear the dirty bit
        if dirty {
            self.frames[frame_id].dirty = true;
        }
        Ok(())
    }

    pub fn flush_file(&mut self, file: &FileRef) -> Result<(), StorageError> {
        // precondition scan, nothing may be touched on a violation
        for frame in &self.frames {
            if !owned_by(frame, file) {
                continue;
            }
            if !frame.valid {
                return Err(StorageError::BadBuffer {
                    frame_id: frame.frame_id,
                    dirty: frame.dirty,
                    valid: frame.valid,
                    refbit: frame.refbit,
                });
            }
            if frame.pin_count > 0 {
                return Err(StorageError::PagePinned {
                    filename: file.borrow().filename(),
                    page_id: frame.page_id,
                    frame_id: frame.frame_id,
                });
            }
        }
        // write back dirty pages and drop residency
        for frame_id in 0..self.frames.len() {
            if !owned_by(&self.frames[frame_id], file) {
                continue;
            }
            if self.frames[frame_id].dirty {
                file.borrow_mut().write_page(&self.pool[frame_id].borrow())?;
                self.frames[frame_id].dirty = false;
            }
            self.index.remove(file, self.frames[frame_id].page_id);
            self.frames[frame_id].clear();
        }
        Ok(())
    }

    pub fn dispose_page(&mut self, file: &FileRef, page_id: PageId) -> Result<(), StorageError> {
        if let Some(frame_id) = self.index.lookup(file, page_id) {
            if self.frames[frame_id].pin_count > 0 {
                return Err(StorageError::PagePinned {
                    filename: file.borrow().filename(),
                    page_id,
                    frame_id,
                });
            }
            // the on-disk page is going away, the in-memory copy with
            // it, dirty or not
            self.frames[frame_id].clear();
            self.index.remove(file, page_id);
        }
        file.borrow_mut().delete_page(page_id)
    }

    // flush every file that still owns a dirty resident page; drop
    // runs the same flush best-effort
    pub fn shutdown(&mut self) -> Result<(), StorageError> {
        for frame_id in 0..self.frames.len() {
            if !self.frames[frame_id].valid || !self.frames[frame_id].dirty {
                continue;
            }
            if let Some(file) = self.frames[frame_id].file.clone() {
                self.flush_file(&file)?;
            }
        }
        Ok(())
    }
}
