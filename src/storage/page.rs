use super::{PageId, StorageError, PAGE_SIZE};
use std::cell::RefCell;
use std::rc::Rc;

///
/// Page Format:
///
/// ```text
/// | page_no | slot_count | free_end | Slot[0] | Slot[1] | ...
///
/// ..... | Data[2] | Data[1] | Data[0] |
/// ```
///
/// Slot Format:
///
/// ```text
/// | offset | len |
/// ```
///
/// a stored free_end of 0 means the page is empty, so a zeroed buffer
/// is a valid empty page
///
const PAGE_NO_OFFSET: usize = 0;
const SLOT_COUNT_OFFSET: usize = 4;
const FREE_END_OFFSET: usize = 6;
const SLOT_DIR_OFFSET: usize = 8;
const SLOT_ENTRY_SIZE: usize = 4;

/// location of a record, the page number plus the slot within it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

#[derive(Clone)]
pub struct Page {
    pub buffer: [u8; PAGE_SIZE],
}

pub type PageRef = Rc<RefCell<Page>>;

impl Page {
    pub fn empty() -> Self {
        Page {
            buffer: [0; PAGE_SIZE],
        }
    }

    pub fn new(page_id: PageId) -> Self {
        let mut page = Self::empty();
        page.buffer[PAGE_NO_OFFSET..PAGE_NO_OFFSET + 4].copy_from_slice(&page_id.to_le_bytes());
        page
    }

    /// the page number embedded in the first header bytes
    pub fn page_number(&self) -> PageId {
        u32::from_le_bytes(self.buffer[PAGE_NO_OFFSET..PAGE_NO_OFFSET + 4].try_into().unwrap())
    }

    pub fn slot_count(&self) -> u16 {
        self.get_u16(SLOT_COUNT_OFFSET)
    }

    fn free_end(&self) -> usize {
        match self.get_u16(FREE_END_OFFSET) as usize {
            0 => PAGE_SIZE,
            free_end => free_end,
        }
    }

    pub fn free_space(&self) -> usize {
        self.free_end() - (SLOT_DIR_OFFSET + self.slot_count() as usize * SLOT_ENTRY_SIZE)
    }

    pub fn insert_record(&mut self, data: &[u8]) -> Result<RecordId, StorageError> {
        let slot_count = self.slot_count() as usize;
        let dir_end = SLOT_DIR_OFFSET + (slot_count + 1) * SLOT_ENTRY_SIZE;
        let free_end = self.free_end();
        if data.len() + dir_end > free_end {
            return Err(StorageError::InsufficientSpace(self.page_number()));
        }
        let start = free_end - data.len();
        self.buffer[start..free_end].copy_from_slice(data);
        let entry = SLOT_DIR_OFFSET + slot_count * SLOT_ENTRY_SIZE;
        self.put_u16(entry, start as u16);
        self.put_u16(entry + 2, data.len() as u16);
        self.put_u16(SLOT_COUNT_OFFSET, (slot_count + 1) as u16);
        self.put_u16(FREE_END_OFFSET, start as u16);
        Ok(RecordId {
            page_id: self.page_number(),
            slot: slot_count as u16,
        })
    }

    pub fn get_record(&self, rid: &RecordId) -> Result<&[u8], StorageError> {
        if rid.page_id != self.page_number() || rid.slot >= self.slot_count() {
            return Err(StorageError::InvalidRecord {
                page_id: rid.page_id,
                slot: rid.slot,
            });
        }
        let entry = SLOT_DIR_OFFSET + rid.slot as usize * SLOT_ENTRY_SIZE;
        let start = self.get_u16(entry) as usize;
        let len = self.get_u16(entry + 2) as usize;
        Ok(&self.buffer[start..start + len])
    }

    pub fn records(&self) -> Records<'_> {
        Records { page: self, slot: 0 }
    }

    fn get_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.buffer[offset], self.buffer[offset + 1]])
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        self.buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
}

pub struct Records<'page> {
    page: &'page Page,
    slot: u16,
}

impl<'page> Iterator for Records<'page> {
    type Item = (RecordId, &'page [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.slot >= self.page.slot_count() {
            return None;
        }
        let rid = RecordId {
            page_id: self.page.page_number(),
            slot: self.slot,
        };
        self.slot += 1;
        let data = self.page.get_record(&rid).ok()?;
        Some((rid, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn insert_then_get() {
        let mut page = Page::new(7);
        assert_eq!(page.page_number(), 7);
        let rid1 = page.insert_record(b"hello!").unwrap();
        let rid2 = page.insert_record(b"world!").unwrap();
        assert_eq!(rid1, RecordId { page_id: 7, slot: 0 });
        assert_eq!(rid2, RecordId { page_id: 7, slot: 1 });
        assert_eq!(page.get_record(&rid1).unwrap(), b"hello!");
        assert_eq!(page.get_record(&rid2).unwrap(), b"world!");
    }

    #[test]
    fn get_on_empty_page() {
        let page = Page::new(1);
        let rid = RecordId { page_id: 1, slot: 0 };
        assert!(matches!(
            page.get_record(&rid),
            Err(StorageError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn get_with_wrong_page_number() {
        let mut page = Page::new(1);
        let mut rid = page.insert_record(b"data").unwrap();
        rid.page_id = 2;
        assert!(matches!(
            page.get_record(&rid),
            Err(StorageError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn fill_until_insufficient_space() {
        let mut page = Page::new(1);
        let data = [0xabu8; 1024];
        let mut inserted = 0;
        loop {
            match page.insert_record(&data) {
                Ok(_) => inserted += 1,
                Err(StorageError::InsufficientSpace(page_id)) => {
                    assert_eq!(page_id, 1);
                    break;
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        // slot directory plus payloads can never exceed the page
        assert!(inserted * (1024 + 4) + 8 <= PAGE_SIZE);
        assert!(page.free_space() < 1024 + 4);
        // everything inserted is still readable
        for slot in 0..inserted as u16 {
            let rid = RecordId { page_id: 1, slot };
            assert_eq!(page.get_record(&rid).unwrap(), &data[..]);
        }
    }

    #[test]
    fn records_iterates_in_slot_order() {
        let mut page = Page::new(3);
        let expected = (0..10u16)
            .map(|i| format!("record {}", i).into_bytes())
            .collect_vec();
        for data in &expected {
            page.insert_record(data).unwrap();
        }
        let collected = page.records().collect_vec();
        assert_eq!(collected.len(), expected.len());
        for (slot, (rid, data)) in collected.into_iter().enumerate() {
            assert_eq!(rid, RecordId { page_id: 3, slot: slot as u16 });
            assert_eq!(data, &expected[slot][..]);
        }
    }

    #[test]
    fn page_number_survives_buffer_copy() {
        let mut page = Page::new(42);
        page.insert_record(b"payload").unwrap();
        let mut copy = Page::empty();
        copy.buffer.copy_from_slice(&page.buffer);
        assert_eq!(copy.page_number(), 42);
        assert_eq!(copy.slot_count(), 1);
    }
}
