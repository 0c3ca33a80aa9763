use super::file::FileRef;
use super::{FrameId, PageId};
use std::collections::HashMap;
use std::rc::Rc;

/// identity of an open file, the pointer behind its `FileRef`; two
/// handles onto the same path are distinct identities
type FileKey = usize;

fn file_key(file: &FileRef) -> FileKey {
    Rc::as_ptr(file) as FileKey
}

/// Residency map from (file identity, page number) to the frame
/// holding that page.
///
/// Misses are ordinary control flow, so `lookup` and `remove` answer
/// with an `Option` instead of an error. The map can never hold more
/// than one entry per frame, so its capacity is sized once from the
/// pool.
pub struct FrameIndex {
    map: HashMap<(FileKey, PageId), FrameId>,
}

impl FrameIndex {
    pub fn new(num_bufs: usize) -> Self {
        FrameIndex {
            map: HashMap::with_capacity(num_bufs + num_bufs / 5),
        }
    }

    pub fn lookup(&self, file: &FileRef, page_id: PageId) -> Option<FrameId> {
        self.map.get(&(file_key(file), page_id)).copied()
    }

    /// precondition: no entry with this key exists
    pub fn insert(&mut self, file: &FileRef, page_id: PageId, frame_id: FrameId) {
        let prev = self.map.insert((file_key(file), page_id), frame_id);
        debug_assert!(prev.is_none());
    }

    pub fn remove(&mut self, file: &FileRef, page_id: PageId) -> Option<FrameId> {
        self.map.remove(&(file_key(file), page_id))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::PageFile;
    use rand::Rng;

    fn tmp_filename(tag: &str) -> String {
        format!("minirel-index-{}-{}.db", tag, rand::thread_rng().gen::<u32>())
    }

    #[test]
    fn insert_lookup_remove() {
        let filename = tmp_filename("basic");
        let file = PageFile::create_shared(&filename).unwrap();
        let mut index = FrameIndex::new(10);

        assert_eq!(index.lookup(&file, 1), None);
        index.insert(&file, 1, 4);
        index.insert(&file, 2, 7);
        assert_eq!(index.lookup(&file, 1), Some(4));
        assert_eq!(index.lookup(&file, 2), Some(7));
        assert_eq!(index.len(), 2);

        assert_eq!(index.remove(&file, 1), Some(4));
        assert_eq!(index.lookup(&file, 1), None);
        assert_eq!(index.remove(&file, 1), None);
        assert_eq!(index.len(), 1);

        drop(file);
        PageFile::remove(&filename).unwrap();
    }

    #[test]
    fn keys_are_file_identity_not_filename() {
        let filename = tmp_filename("identity");
        let first = PageFile::create_shared(&filename).unwrap();
        // a second handle onto the very same path
        let second = PageFile::open_shared(&filename).unwrap();
        let mut index = FrameIndex::new(10);

        index.insert(&first, 1, 0);
        assert_eq!(index.lookup(&first, 1), Some(0));
        assert_eq!(index.lookup(&second, 1), None);

        index.insert(&second, 1, 1);
        assert_eq!(index.lookup(&second, 1), Some(1));
        assert_eq!(index.len(), 2);

        // a clone of a handle is the same identity
        let alias = first.clone();
        assert_eq!(index.lookup(&alias, 1), Some(0));

        drop(first);
        drop(second);
        PageFile::remove(&filename).unwrap();
    }
}
