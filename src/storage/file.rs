use super::page::Page;
use super::{PageId, StorageError, PAGE_SIZE};
use std::cell::RefCell;
use std::fs::{remove_file, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::rc::Rc;

// one OS file holding fixed-size pages, page n lives at byte offset
// (n - 1) * PAGE_SIZE; a zero page number in the on-disk header marks
// a free slot that later allocations may reuse
pub struct PageFile {
    file: File,
    filename: String,
    free: Vec<PageId>,
}

pub type FileRef = Rc<RefCell<PageFile>>;

impl PageFile {
    pub fn create(filename: &str) -> Result<Self, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(filename)?;
        Ok(PageFile {
            file,
            filename: filename.to_string(),
            free: vec![],
        })
    }

    pub fn create_shared(filename: &str) -> Result<FileRef, StorageError> {
        Ok(Rc::new(RefCell::new(Self::create(filename)?)))
    }

    pub fn open(filename: &str) -> Result<Self, StorageError> {
        let file = OpenOptions::new().read(true).write(true).open(filename)?;
        let mut page_file = PageFile {
            file,
            filename: filename.to_string(),
            free: vec![],
        };
        // rebuild the free-slot list from the page headers
        for page_id in 1..=page_file.num_pages()? as PageId {
            if page_file.stored_page_number(page_id)? == 0 {
                page_file.free.push(page_id);
            }
        }
        Ok(page_file)
    }

    pub fn open_shared(filename: &str) -> Result<FileRef, StorageError> {
        Ok(Rc::new(RefCell::new(Self::open(filename)?)))
    }

    pub fn remove(filename: &str) -> Result<(), StorageError> {
        remove_file(filename).map_err(StorageError::IOError)
    }

    pub fn filename(&self) -> String {
        self.filename.clone()
    }

    pub fn num_pages(&self) -> Result<usize, StorageError> {
        let len = self.file.metadata()?.len();
        assert_eq!(len % (PAGE_SIZE as u64), 0);
        Ok((len / PAGE_SIZE as u64) as usize)
    }

    pub fn allocate_page(&mut self) -> Result<Page, StorageError> {
        // reuse a freed slot if there is one, otherwise grow the file
        let page_id = match self.free.pop() {
            Some(page_id) => page_id,
            None => self.num_pages()? as PageId + 1,
        };
        // write the fresh page through so it can be read back at once
        let page = Page::new(page_id);
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(&page.buffer)?;
        Ok(page)
    }

    pub fn read_page(&mut self, page_id: PageId) -> Result<Page, StorageError> {
        if page_id == 0 || page_id as usize > self.num_pages()? {
            return Err(self.invalid_page(page_id));
        }
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        let mut page = Page::empty();
        self.file.read_exact(&mut page.buffer)?;
        // a zeroed header means the slot was deleted
        if page.page_number() != page_id {
            return Err(self.invalid_page(page_id));
        }
        Ok(page)
    }

    pub fn write_page(&mut self, page: &Page) -> Result<(), StorageError> {
        let page_id = page.page_number();
        if page_id == 0 || page_id as usize > self.num_pages()? {
            return Err(self.invalid_page(page_id));
        }
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(&page.buffer)?;
        Ok(())
    }

    pub fn delete_page(&mut self, page_id: PageId) -> Result<(), StorageError> {
        if page_id == 0
            || page_id as usize > self.num_pages()?
            || self.stored_page_number(page_id)? != page_id
        {
            return Err(self.invalid_page(page_id));
        }
        if page_id as usize == self.num_pages()? {
            // drop the tail, together with any freed slots now at the end
            let mut num_pages = page_id as usize - 1;
            while num_pages > 0 && self.stored_page_number(num_pages as PageId)? == 0 {
                num_pages -= 1;
            }
            self.file.set_len((num_pages * PAGE_SIZE) as u64)?;
            self.free.retain(|&id| id as usize <= num_pages);
        } else {
            self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
            self.file.write_all(&[0u8; PAGE_SIZE])?;
            self.free.push(page_id);
        }
        Ok(())
    }

    fn stored_page_number(&mut self, page_id: PageId) -> Result<PageId, StorageError> {
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        let mut header = [0u8; 4];
        self.file.read_exact(&mut header)?;
        Ok(u32::from_le_bytes(header))
    }

    fn offset(page_id: PageId) -> u64 {
        (page_id as u64 - 1) * PAGE_SIZE as u64
    }

    fn invalid_page(&self, page_id: PageId) -> StorageError {
        StorageError::InvalidPage {
            filename: self.filename.clone(),
            page_id,
        }
    }
}
