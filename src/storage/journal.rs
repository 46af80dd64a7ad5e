use crate::error::{ClusterError, Result};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Size of the little-endian length prefix in front of every record.
const LEN_PREFIX: usize = 4;

/// Append-only record log.
///
/// Each record is `u32 length (LE) | bincode payload`. A torn record at the
/// tail (crash mid-write) ends the replay; everything before it is kept.
pub struct Journal<T> {
    path: PathBuf,
    file: Mutex<File>,
    _record: PhantomData<fn(T) -> T>,
}

impl<T> Journal<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Opens (or creates) the journal at `path` and returns it along with every
    /// record it already holds, in append order.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<T>)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let records = Self::replay(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!("Opened journal {} ({} records)", path.display(), records.len());

        Ok((
            Self {
                path,
                file: Mutex::new(file),
                _record: PhantomData,
            },
            records,
        ))
    }

    /// Reads every complete record from `path`. A missing file is empty.
    pub fn replay(path: &Path) -> Result<Vec<T>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut len_buf = [0u8; LEN_PREFIX];

        loop {
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            let mut payload = vec![0u8; len];
            if let Err(e) = reader.read_exact(&mut payload) {
                if e.kind() == ErrorKind::UnexpectedEof {
                    tracing::warn!(
                        "Journal {} ends with a torn record, ignoring it",
                        path.display()
                    );
                    break;
                }
                return Err(e.into());
            }

            match bincode::deserialize::<T>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        "Journal {} has an unreadable record after {} entries: {}",
                        path.display(),
                        records.len(),
                        e
                    );
                    break;
                }
            }
        }

        Ok(records)
    }

    /// Appends one record and syncs it to disk before returning.
    pub fn append(&self, record: &T) -> Result<()> {
        let frame = encode(record)?;
        let mut file = self.file.lock();
        file.write_all(&frame)?;
        file.sync_data()?;
        Ok(())
    }

    /// `append` run on the blocking pool, for callers on a runtime thread.
    pub async fn append_owned(self: Arc<Self>, record: T) -> Result<()>
    where
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.append(&record))
            .await
            .map_err(|e| ClusterError::Io(std::io::Error::other(e)))?
    }

    /// Replaces the journal contents with `records`.
    ///
    /// Written to a sibling file and renamed over the journal, so a crash leaves
    /// either the old or the new contents.
    pub fn rewrite(&self, records: &[T]) -> Result<()> {
        let tmp_path = self.path.with_extension("journal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in records {
                tmp.write_all(&encode(record)?)?;
            }
            tmp.sync_all()?;
        }

        let mut file = self.file.lock();
        std::fs::rename(&tmp_path, &self.path)?;
        *file = OpenOptions::new().append(true).open(&self.path)?;

        tracing::debug!(
            "Rewrote journal {} with {} records",
            self.path.display(),
            records.len()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record)?;
    let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}
