use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{debug, trace};

use crate::res::error::{ResError, ResResult};
use crate::res::reader::res_read_up_to;


/// A fixed-width record of an `*Info*.bin` index file.
pub trait IndexRecord: Sized {
    const SIZE: usize;

    fn read<R: Read>(reader: &mut R) -> ResResult<Self>;

    fn id(&self) -> i32;

    /// optional second lookup key, records returning None are left out of the secondary map
    fn secondary_key(&self) -> Option<i32> {
        None
    }
}


/// ResourceIndex stores all records of an index file in file order,
/// with lookups by primary id and, when the record kind has one, by secondary key.
/// On duplicated keys the first record in the file wins.
#[derive(Debug)]
pub struct ResourceIndex<T> {
    records: Vec<T>,
    by_id: HashMap<i32, usize>,
    by_secondary: HashMap<i32, usize>,
}


impl<T: IndexRecord> ResourceIndex<T> {
    pub fn read(path: &Path) -> ResResult<Self> {
        trace!("ResourceIndex::read");
        let f = File::open(path)?;
        Self::from_reader(&mut BufReader::new(f))
    }

    /// Reads records until a clean end of stream. A partial trailing record means a malformed index.
    pub fn from_reader<R: Read>(reader: &mut R) -> ResResult<Self> {
        let mut result = Self {
            records: Vec::new(),
            by_id: HashMap::new(),
            by_secondary: HashMap::new(),
        };

        let mut buff = vec![0u8; T::SIZE];
        loop {
            match res_read_up_to(reader, &mut buff)? {
                0 => break,
                n if n < T::SIZE => return Err(ResError::UnexpectedEof),
                _ => {}
            }

            let record = T::read(&mut Cursor::new(&buff))?;
            let position = result.records.len();

            result.by_id.entry(record.id()).or_insert(position);
            if let Some(key) = record.secondary_key() {
                result.by_secondary.entry(key).or_insert(position);
            }
            result.records.push(record);
        }

        debug!("index loaded, {} records, {} ids, {} secondary keys",
            result.records.len(), result.by_id.len(), result.by_secondary.len());
        Ok(result)
    }

    pub fn get(&self, id: i32) -> Option<&T> {
        self.by_id.get(&id).map(|&i| &self.records[i])
    }

    pub fn get_secondary(&self, key: i32) -> Option<&T> {
        self.by_secondary.get(&key).map(|&i| &self.records[i])
    }

    /// records in file order
    pub fn records(&self) -> &[T] {
        &self.records
    }

    /// records reachable by id, duplicates excluded
    pub fn unique(&self) -> impl Iterator<Item = &T> {
        self.records.iter().enumerate()
            .filter(move |(i, r)| self.by_id.get(&r.id()) == Some(i))
            .map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn secondary_len(&self) -> usize {
        self.by_secondary.len()
    }
}


/// ResourceSet pairs a read-only index snapshot with the data file its records point into.
/// The data file is never shared: every reader opens its own handle.
#[derive(Debug)]
pub struct ResourceSet<T> {
    index: Arc<ResourceIndex<T>>,
    data_path: PathBuf,
}

impl<T> Clone for ResourceSet<T> {
    fn clone(&self) -> Self {
        Self { index: self.index.clone(), data_path: self.data_path.clone() }
    }
}


impl<T: IndexRecord> ResourceSet<T> {
    pub fn open(index_path: &Path, data_path: &Path) -> ResResult<Self> {
        let index = ResourceIndex::read(index_path)?;
        // fail early on a missing data file
        File::open(data_path)?;

        Ok(Self::new(Arc::new(index), data_path.to_path_buf()))
    }
}

impl<T> ResourceSet<T> {
    pub fn new(index: Arc<ResourceIndex<T>>, data_path: PathBuf) -> Self {
        Self { index, data_path }
    }

    pub fn index(&self) -> &ResourceIndex<T> {
        &self.index
    }

    pub fn index_snapshot(&self) -> Arc<ResourceIndex<T>> {
        self.index.clone()
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// opens a fresh handle of the data file, seek position is private to the caller
    pub fn open_data(&self) -> ResResult<File> {
        Ok(File::open(&self.data_path)?)
    }
}
