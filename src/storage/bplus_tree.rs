use std::{
    cmp::Ordering,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace};

use crate::{
    config::validate_page_size,
    types::{
        DIRECTORY_ENTRY_SIZE, NO_PAGE, PageNumber, RowId,
        cell::{Cell, CellKey},
        error::{DatabaseError, Result},
        page::{Page, PageType},
        value::Value,
    },
};

/// A B+Tree stored as a flat file of fixed-size pages.
///
/// Page `n` lives at byte offset `n * page_size`. Pages are never freed, so
/// the page count only grows and new pages are always appended. Every page
/// header carries the current root page number.
pub struct BPlusTree {
    path: PathBuf,
    file: File,
    page_size: usize,
    kind: PageType,
    root_page: PageNumber,
    page_count: usize,
}

impl BPlusTree {
    /// Create a fresh tree file holding one empty leaf page, which is also
    /// the root. An existing file at `path` is overwritten.
    pub fn create(path: impl AsRef<Path>, page_size: usize, kind: PageType) -> Result<Self> {
        validate_page_size(page_size)?;
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut tree = Self {
            path,
            file,
            page_size,
            kind: kind.leaf(),
            root_page: 0,
            page_count: 0,
        };
        let root = Page::new(page_size, 0, tree.kind, 0);
        tree.write_page(&root)?;
        debug!("Created {:?} tree at {}", tree.kind, tree.path.display());
        Ok(tree)
    }

    pub fn open(path: impl AsRef<Path>, page_size: usize) -> Result<Self> {
        validate_page_size(page_size)?;
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_len = file.metadata()?.len() as usize;
        if file_len == 0 || file_len % page_size != 0 {
            return Err(DatabaseError::InvalidLength {
                what: "tree file",
                expected: file_len.div_ceil(page_size).max(1) * page_size,
                actual: file_len,
            });
        }
        let page_count = file_len / page_size;
        if page_count > NO_PAGE as usize {
            return Err(DatabaseError::InvalidData {
                details: format!("{} holds more pages than a tree can address", path.display()),
            });
        }

        let mut tree = Self {
            path,
            file,
            page_size,
            kind: PageType::TableLeaf,
            root_page: 0,
            page_count,
        };
        let first = tree.read_page(0)?;
        tree.root_page = first.root_page;
        tree.kind = tree.read_page(tree.root_page)?.page_type.leaf();
        debug!(
            "Opened {:?} tree at {} ({} pages, root {})",
            tree.kind,
            tree.path.display(),
            tree.page_count,
            tree.root_page
        );
        Ok(tree)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn root_page(&self) -> PageNumber {
        self.root_page
    }

    /// Leaf page type of this tree.
    pub fn kind(&self) -> PageType {
        self.kind
    }

    pub fn read_page(&mut self, page_number: PageNumber) -> Result<Page> {
        if page_number as usize >= self.page_count {
            return Err(DatabaseError::CorruptedPage {
                page_number,
                reason: format!("Page lies beyond the {} pages in the file", self.page_count),
            });
        }
        let mut buffer = vec![0u8; self.page_size];
        self.file
            .seek(SeekFrom::Start(page_number as u64 * self.page_size as u64))?;
        self.file.read_exact(&mut buffer)?;
        Page::deserialize(&buffer, page_number)
    }

    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        if page.page_size != self.page_size {
            return Err(DatabaseError::InvalidPageSize(page.page_size));
        }
        if page.page_number as usize > self.page_count {
            return Err(DatabaseError::CorruptedPage {
                page_number: page.page_number,
                reason: "Write would leave a hole in the file".to_string(),
            });
        }
        let bytes = page.serialize()?;
        self.file
            .seek(SeekFrom::Start(page.page_number as u64 * self.page_size as u64))?;
        self.file.write_all(&bytes)?;
        self.file.flush()?;
        if page.page_number as usize == self.page_count {
            self.page_count += 1;
        }
        trace!("Wrote page {} of {}", page.page_number, self.path.display());
        Ok(())
    }

    /// Append an empty page to the file and return it.
    fn allocate_page(&mut self, page_type: PageType, parent_page: PageNumber) -> Result<Page> {
        if self.page_count >= NO_PAGE as usize {
            return Err(DatabaseError::InvalidData {
                details: format!("{} has no page numbers left", self.path.display()),
            });
        }
        let page_number = self.page_count as PageNumber;
        let mut page = Page::new(self.page_size, page_number, page_type, self.root_page);
        page.parent_page = parent_page;
        self.write_page(&page)?;
        Ok(page)
    }

    /// Usable bytes of an empty page.
    pub fn page_capacity(&self) -> usize {
        Page::new(self.page_size, 0, self.kind, 0).capacity()
    }

    fn check_cell(&self, cell: &Cell) -> Result<()> {
        if cell.page_type() != self.kind {
            return Err(DatabaseError::InvalidData {
                details: format!(
                    "Cannot store a {:?} cell in a {:?} tree",
                    cell.page_type(),
                    self.kind
                ),
            });
        }
        let size = cell.len() + DIRECTORY_ENTRY_SIZE;
        let capacity = self.page_capacity();
        if size > capacity {
            return Err(DatabaseError::CellTooLarge { size, capacity });
        }
        Ok(())
    }

    /// Insert a leaf cell. Table cells always go to the rightmost leaf since
    /// rowids only grow. Index cells are routed by key, landing after any
    /// entries with an equal key, so the leaf chain stays ordered by value.
    pub fn insert(&mut self, cell: Cell) -> Result<()> {
        self.check_cell(&cell)?;
        let mut leaf = if self.kind.is_index() {
            self.descend_for_insert(&cell.key())?
        } else {
            self.rightmost_leaf()?
        };

        match leaf.insert(&cell) {
            Ok(_) => self.write_page(&leaf),
            Err(DatabaseError::PageFull { .. }) => {
                let position = leaf.insert_position(&cell.key());
                self.handle_overflow(leaf, cell, position)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the live cell with the same key.
    pub fn update(&mut self, cell: Cell) -> Result<()> {
        self.check_cell(&cell)?;
        let key = cell.key();
        let mut leaf = self.descend(&key)?;
        let index = match leaf.find(&key) {
            Some(index) if leaf.cells[index].exists() => index,
            _ => {
                return Err(DatabaseError::CellNotFound {
                    key: key.to_string(),
                });
            }
        };

        match leaf.replace(cell.clone()) {
            Ok(()) => self.write_page(&leaf),
            Err(DatabaseError::PageFull { .. }) => {
                debug!(
                    "Updated {} no longer fits page {}, splitting",
                    key, leaf.page_number
                );
                leaf.remove(index);
                self.handle_overflow(leaf, cell, index)
            }
            Err(e) => Err(e),
        }
    }

    /// Tombstone the row; its slot stays in the page.
    pub fn delete(&mut self, row_id: RowId) -> Result<()> {
        let key = CellKey::RowId(row_id);
        let mut leaf = self.descend(&key)?;
        match leaf.find(&key) {
            Some(index) if leaf.cells[index].exists() => {
                leaf.cells[index].mark_deleted();
                self.write_page(&leaf)
            }
            _ => Err(DatabaseError::CellNotFound {
                key: key.to_string(),
            }),
        }
    }

    pub fn search(&mut self, key: &CellKey) -> Result<Option<Cell>> {
        let leaf = self.descend(key)?;
        Ok(leaf.get(key).filter(|cell| cell.exists()).cloned())
    }

    /// Live cells for the given rowids, in rowid order. Missing rowids are
    /// skipped.
    pub fn search_many(&mut self, row_ids: &[RowId]) -> Result<Vec<Cell>> {
        let mut wanted = row_ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        let (Some(&min), Some(&max)) = (wanted.first(), wanted.last()) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        let mut leaf = self.descend(&CellKey::RowId(min))?;
        let mut visited = 0;
        loop {
            for cell in &leaf.cells {
                let Some(row_id) = cell.row_id() else {
                    continue;
                };
                if cell.exists() && wanted.binary_search(&row_id).is_ok() {
                    found.push(cell.clone());
                }
            }
            let past_max = leaf
                .last_key()
                .is_some_and(|last| last >= CellKey::RowId(max));
            if past_max {
                break;
            }
            match self.next_leaf(&leaf, &mut visited)? {
                Some(next) => leaf = next,
                None => break,
            }
        }
        Ok(found)
    }

    /// Every live cell, walking the leaf chain from the leftmost leaf.
    pub fn search_all(&mut self) -> Result<Vec<Cell>> {
        let mut cells = Vec::new();
        let mut leaf = self.leftmost_leaf()?;
        let mut visited = 0;
        loop {
            cells.extend(leaf.cells.iter().filter(|cell| cell.exists()).cloned());
            match self.next_leaf(&leaf, &mut visited)? {
                Some(next) => leaf = next,
                None => break,
            }
        }
        Ok(cells)
    }

    /// Largest rowid still recorded along the rightmost path, tombstones and
    /// routing keys included.
    pub fn max_row_id(&mut self) -> Result<Option<RowId>> {
        let mut max: Option<RowId> = None;
        let mut page = self.read_page(self.root_page)?;
        let mut depth = 0;
        loop {
            if let Some(row_id) = page.cells.last().and_then(Cell::row_id) {
                max = Some(max.map_or(row_id, |m| m.max(row_id)));
            }
            if page.is_leaf() {
                break;
            }
            let child = page.sibling_page;
            page = self.child_page(&page, child, &mut depth)?;
        }
        Ok(max)
    }

    /// Empty every leaf in place. Interior pages and the page count are left
    /// alone, so a truncated tree keeps its shape. A table tree keeps the
    /// last cell of its rightmost leaf as a tombstone, so `max_row_id`
    /// still reports the highest rowid ever handed out.
    pub fn truncate(&mut self) -> Result<()> {
        let high_water = if self.kind.is_index() {
            None
        } else {
            let leaf = self.rightmost_leaf()?;
            leaf.cells.last().cloned().map(|mut cell| {
                cell.mark_deleted();
                (leaf.page_number, cell)
            })
        };

        for page_number in 0..self.page_count {
            let mut page = self.read_page(page_number as PageNumber)?;
            if !page.is_leaf() || page.cells.is_empty() {
                continue;
            }
            page.truncate();
            match &high_water {
                Some((leaf_number, cell)) if *leaf_number == page.page_number => {
                    page.insert(cell)?;
                }
                _ => {}
            }
            self.write_page(&page)?;
        }
        debug!("Truncated {}", self.path.display());
        Ok(())
    }

    /// Physically remove the first index entry matching both `key` and
    /// `pointer`. Returns whether one was found.
    pub fn remove_entry(&mut self, key: &Value, pointer: &Value) -> Result<bool> {
        let search = CellKey::Value(key.clone());
        let mut leaf = self.descend(&search)?;
        let mut visited = 0;
        loop {
            let position = leaf.cells.iter().position(|cell| match cell {
                Cell::IndexLeaf(entry) => {
                    entry.payload.key.compare(key) == Ordering::Equal
                        && entry
                            .payload
                            .pointer
                            .as_ref()
                            .is_some_and(|p| p.compare(pointer) == Ordering::Equal)
                }
                _ => false,
            });
            if let Some(index) = position {
                leaf.remove(index);
                self.write_page(&leaf)?;
                return Ok(true);
            }
            if leaf.first_key().is_some_and(|first| first > search) {
                return Ok(false);
            }
            match self.next_leaf(&leaf, &mut visited)? {
                Some(next) => leaf = next,
                None => return Ok(false),
            }
        }
    }

    /// All `(key, pointer)` pairs of an index tree in leaf-chain order.
    pub fn entries(&mut self) -> Result<Vec<(Value, Value)>> {
        let entries = self
            .search_all()?
            .into_iter()
            .filter_map(|cell| match cell {
                Cell::IndexLeaf(entry) => entry
                    .payload
                    .pointer
                    .map(|pointer| (entry.payload.key, pointer)),
                _ => None,
            })
            .collect();
        Ok(entries)
    }

    /// Follow `find_child_page` from the root down to a leaf.
    fn descend(&mut self, key: &CellKey) -> Result<Page> {
        let mut page = self.read_page(self.root_page)?;
        let mut depth = 0;
        while !page.is_leaf() {
            let child = page.find_child_page(key)?;
            page = self.child_page(&page, child, &mut depth)?;
        }
        Ok(page)
    }

    /// Follow `find_insert_child` from the root down to a leaf.
    fn descend_for_insert(&mut self, key: &CellKey) -> Result<Page> {
        let mut page = self.read_page(self.root_page)?;
        let mut depth = 0;
        while !page.is_leaf() {
            let child = page.find_insert_child(key)?;
            page = self.child_page(&page, child, &mut depth)?;
        }
        Ok(page)
    }

    fn leftmost_leaf(&mut self) -> Result<Page> {
        let mut page = self.read_page(self.root_page)?;
        let mut depth = 0;
        while !page.is_leaf() {
            let child = page.leftmost_child()?;
            page = self.child_page(&page, child, &mut depth)?;
        }
        Ok(page)
    }

    /// Follow sibling pointers from the root, then along the leaf chain.
    fn rightmost_leaf(&mut self) -> Result<Page> {
        let mut page = self.read_page(self.root_page)?;
        let mut depth = 0;
        while !page.is_leaf() {
            let child = page.sibling_page;
            page = self.child_page(&page, child, &mut depth)?;
        }
        let mut visited = 0;
        while let Some(next) = self.next_leaf(&page, &mut visited)? {
            page = next;
        }
        Ok(page)
    }

    fn child_page(&mut self, parent: &Page, child: PageNumber, depth: &mut usize) -> Result<Page> {
        *depth += 1;
        if child == NO_PAGE || *depth > self.page_count {
            return Err(DatabaseError::CorruptedPage {
                page_number: parent.page_number,
                reason: format!("Interior page routes to invalid child {}", child),
            });
        }
        self.read_page(child)
    }

    fn next_leaf(&mut self, leaf: &Page, visited: &mut usize) -> Result<Option<Page>> {
        if leaf.sibling_page == NO_PAGE {
            return Ok(None);
        }
        *visited += 1;
        if *visited > self.page_count {
            return Err(DatabaseError::CorruptedPage {
                page_number: leaf.page_number,
                reason: "Leaf sibling chain loops".to_string(),
            });
        }
        self.read_page(leaf.sibling_page).map(Some)
    }

    /// Split `page`, which could not take `cell` at slot `position`, into
    /// itself and a new right sibling, then push the boundary key into the
    /// parent.
    fn handle_overflow(&mut self, mut page: Page, cell: Cell, position: usize) -> Result<()> {
        let append = position >= page.cells.len();
        let mut right = self.allocate_page(page.page_type, page.parent_page)?;

        let mut cells = std::mem::take(&mut page.cells);
        cells.insert(position.min(cells.len()), cell);

        let boundary = if page.is_leaf() {
            let (left_cells, right_cells) = if append {
                let last = cells.split_off(cells.len() - 1);
                (cells, last)
            } else {
                let at = Self::balanced_split_point(&page, &cells)?;
                let tail = cells.split_off(at);
                (cells, tail)
            };
            page.cells = left_cells;
            right.cells = right_cells;
            right.sibling_page = page.sibling_page;
            page.sibling_page = right.page_number;
            page.last_key().ok_or_else(|| DatabaseError::CorruptedPage {
                page_number: page.page_number,
                reason: "Leaf split left an empty page".to_string(),
            })?
        } else {
            if cells.len() < 2 {
                return Err(DatabaseError::CellTooLarge {
                    size: cells.iter().map(|c| c.len() + DIRECTORY_ENTRY_SIZE).sum(),
                    capacity: page.capacity(),
                });
            }
            let middle = if append { cells.len() - 1 } else { cells.len() / 2 };
            let tail = cells.split_off(middle + 1);
            let promoted = cells.pop().ok_or_else(|| DatabaseError::CorruptedPage {
                page_number: page.page_number,
                reason: "Interior split found no middle cell".to_string(),
            })?;
            let promoted_child = promoted.left_child_page().ok_or_else(|| {
                DatabaseError::CorruptedPage {
                    page_number: page.page_number,
                    reason: "Interior cell without a child pointer".to_string(),
                }
            })?;
            right.cells = tail;
            right.sibling_page = page.sibling_page;
            page.cells = cells;
            page.sibling_page = promoted_child;
            promoted.key()
        };

        debug!(
            "Split page {} of {} at {} into {} + {} cells (new page {}, append: {})",
            page.page_number,
            self.path.display(),
            boundary,
            page.cells.len(),
            right.cells.len(),
            right.page_number,
            append
        );

        self.write_page(&page)?;
        self.write_page(&right)?;
        if !right.is_leaf() {
            self.reparent_children(&right)?;
        }
        self.handle_parent_promotion(page, right, boundary)
    }

    /// Index at which to cut `cells` so that both halves fit a page and hold
    /// roughly equal bytes.
    fn balanced_split_point(page: &Page, cells: &[Cell]) -> Result<usize> {
        let sizes: Vec<usize> = cells
            .iter()
            .map(|cell| cell.len() + DIRECTORY_ENTRY_SIZE)
            .collect();
        let total: usize = sizes.iter().sum();
        let capacity = page.capacity();

        let mut best: Option<(usize, usize)> = None;
        let mut left = 0;
        for at in 1..cells.len() {
            left += sizes[at - 1];
            let right = total - left;
            if left > capacity || right > capacity {
                continue;
            }
            let skew = left.abs_diff(total / 2);
            if best.is_none_or(|(_, best_skew)| skew < best_skew) {
                best = Some((at, skew));
            }
        }
        best.map(|(at, _)| at)
            .ok_or(DatabaseError::CellTooLarge { size: total, capacity })
    }

    fn reparent_children(&mut self, parent: &Page) -> Result<()> {
        for child in parent.children() {
            let mut page = self.read_page(child)?;
            if page.parent_page != parent.page_number {
                page.parent_page = parent.page_number;
                self.write_page(&page)?;
            }
        }
        Ok(())
    }

    fn handle_parent_promotion(&mut self, mut left: Page, mut right: Page, boundary: CellKey) -> Result<()> {
        let interior_type = left.page_type.interior();

        if left.parent_page == NO_PAGE {
            let mut root = self.allocate_page(interior_type, NO_PAGE)?;
            root.insert(&Cell::promotion(interior_type, left.page_number, boundary)?)?;
            root.sibling_page = right.page_number;
            left.parent_page = root.page_number;
            right.parent_page = root.page_number;
            self.write_page(&left)?;
            self.write_page(&right)?;
            self.write_page(&root)?;
            debug!(
                "New root page {} over pages {} and {}",
                root.page_number, left.page_number, right.page_number
            );
            return self.propagate_root(root.page_number);
        }

        // The promotion takes the slot of the reference to `left`, which now
        // points at `right`. Equal keys rule out placing it by key.
        let mut parent = self.read_page(left.parent_page)?;
        let slot = parent.child_slot(left.page_number).ok_or_else(|| {
            DatabaseError::CorruptedPage {
                page_number: parent.page_number,
                reason: format!("Parent holds no pointer to child {}", left.page_number),
            }
        })?;
        parent.redirect_child(left.page_number, right.page_number);
        if right.parent_page != parent.page_number {
            right.parent_page = parent.page_number;
            self.write_page(&right)?;
        }

        let promotion = Cell::promotion(parent.page_type, left.page_number, boundary)?;
        match parent.insert_at(slot, &promotion) {
            Ok(()) => self.write_page(&parent),
            Err(DatabaseError::PageFull { .. }) => self.handle_overflow(parent, promotion, slot),
            Err(e) => Err(e),
        }
    }

    /// Rewrite the root field of every page in the file.
    fn propagate_root(&mut self, root_page: PageNumber) -> Result<()> {
        self.root_page = root_page;
        let mut rewritten = 0;
        for page_number in 0..self.page_count {
            let mut page = self.read_page(page_number as PageNumber)?;
            if page.root_page != root_page {
                page.root_page = root_page;
                self.write_page(&page)?;
                rewritten += 1;
            }
        }
        debug!(
            "Root of {} is now page {} ({} pages rewritten)",
            self.path.display(),
            root_page,
            rewritten
        );
        Ok(())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
