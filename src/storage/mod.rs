use thiserror::Error;

pub mod buffer;
pub mod file;
pub mod frame;
pub mod index;
pub mod page;

pub use buffer::{BufferPoolManager, BufferPoolManagerRef};
pub use file::{FileRef, PageFile};
pub use page::{Page, PageRef, RecordId};

pub const PAGE_SIZE: usize = 8192;

/// page numbers start at 1, 0 marks a free slot on disk
pub type PageId = u32;
pub type FrameId = usize;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IOError: {0}")]
    IOError(#[from] std::io::Error),
    #[error("BufferExceeded: all frames are pinned")]
    BufferExceeded,
    #[error("PageNotPinned: page {page_id} of {filename} in frame {frame_id} is not pinned")]
    PageNotPinned {
        filename: String,
        page_id: PageId,
        frame_id: FrameId,
    },
    #[error("PagePinned: page {page_id} of {filename} is still pinned in frame {frame_id}")]
    PagePinned {
        filename: String,
        page_id: PageId,
        frame_id: FrameId,
    },
    #[error("BadBuffer: frame {frame_id} with dirty={dirty} valid={valid} refbit={refbit}")]
    BadBuffer {
        frame_id: FrameId,
        dirty: bool,
        valid: bool,
        refbit: bool,
    },
    #[error("InvalidPage: page {page_id} is not allocated in {filename}")]
    InvalidPage { filename: String, page_id: PageId },
    #[error("InsufficientSpace: page {0} cannot fit the record")]
    InsufficientSpace(PageId),
    #[error("InvalidRecord: no record at slot {slot} of page {page_id}")]
    InvalidRecord { page_id: PageId, slot: u16 },
}
