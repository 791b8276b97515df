//! [C5 supplement] Direct-access record files: a `(NAME.rec, NAME.ndx)` pair
//! holding arbitrary byte records (normally [`crate::codec`]-encoded
//! arrays) at stable indices, with erasure and compaction.
//!
//! Grounded on `fileio.c`'s index layout (comment at its top): the index
//! file is a four-word header `{recordcnt, totallen, space_free, status}`
//! followed by `recordcnt` pairs `{recstart, reclength}`. This module keeps
//! that exact header and entry shape, word-for-word little-endian, and
//! adds an automatic compaction trigger (`space_free/total_length > 0.5
//! && total_length > 10_000`) using `std::fs::rename` for the atomic
//! swap `fileio.c` achieves by writing a temp pair and renaming it over
//! the original files.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

fn read_word<R: Read>(r: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn write_word<W: Write>(w: &mut W, v: i64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    offset: u64,
    length: u64,
}

/// A direct-access record file pair. `length == 0` marks an erased slot;
/// its index stays valid (callers keep referring to it by position) but
/// [`RecordFile::read`] returns `None` for it.
pub struct RecordFile {
    rec_path: PathBuf,
    ndx_path: PathBuf,
    total_length: u64,
    space_free: u64,
    type_tag: i64,
    entries: Vec<Entry>,
}

impl RecordFile {
    /// Create a fresh, empty record file pair at `stem` (`stem.rec`,
    /// `stem.ndx`), tagged with `type_tag` (an opaque value the embedding
    /// evaluator assigns meaning to; this crate never interprets it).
    pub fn create(stem: impl AsRef<Path>, type_tag: i64) -> Result<RecordFile> {
        let stem = stem.as_ref();
        let rf = RecordFile {
            rec_path: stem.with_extension("rec"),
            ndx_path: stem.with_extension("ndx"),
            total_length: 0,
            space_free: 0,
            type_tag,
            entries: Vec::new(),
        };
        File::create(&rf.rec_path)?;
        rf.write_index(&rf.ndx_path, &rf.entries, rf.total_length, rf.space_free)?;
        Ok(rf)
    }

    /// Open an existing pair, reading the index into memory.
    pub fn open(stem: impl AsRef<Path>) -> Result<RecordFile> {
        let stem = stem.as_ref();
        let rec_path = stem.with_extension("rec");
        let ndx_path = stem.with_extension("ndx");

        let mut ndx = File::open(&ndx_path)?;
        let record_count = read_word(&mut ndx)? as usize;
        let total_length = read_word(&mut ndx)? as u64;
        let space_free = read_word(&mut ndx)? as u64;
        let type_tag = read_word(&mut ndx)?;

        let mut entries = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            let offset = read_word(&mut ndx)? as u64;
            let length = read_word(&mut ndx)? as u64;
            entries.push(Entry { offset, length });
        }

        Ok(RecordFile { rec_path, ndx_path, total_length, space_free, type_tag, entries })
    }

    pub fn type_tag(&self) -> i64 {
        self.type_tag
    }

    pub fn record_count(&self) -> usize {
        self.entries.len()
    }

    /// Append `bytes` as a new record, returning its index. Persists the
    /// index immediately so a crash between calls never loses track of
    /// what's already on disk.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut rec = std::fs::OpenOptions::new().append(true).open(&self.rec_path)?;
        let offset = self.total_length;
        rec.write_all(bytes)?;

        self.entries.push(Entry { offset, length: bytes.len() as u64 });
        self.total_length += bytes.len() as u64;
        self.persist_index()?;
        Ok(self.entries.len() - 1)
    }

    /// Read record `index`'s bytes, or `None` if it has been erased.
    pub fn read(&self, index: usize) -> Result<Option<Vec<u8>>> {
        let entry = self.entries[index];
        if entry.length == 0 {
            return Ok(None);
        }
        let mut rec = File::open(&self.rec_path)?;
        rec.seek(SeekFrom::Start(entry.offset))?;
        let mut buf = vec![0u8; entry.length as usize];
        rec.read_exact(&mut buf)?;
        Ok(Some(buf))
    }

    /// Erase record `index`: its space is reclaimed as `space_free`, and a
    /// compaction is triggered if the erased fraction crosses the policy
    /// threshold.
    pub fn erase(&mut self, index: usize) -> Result<()> {
        let entry = &mut self.entries[index];
        if entry.length == 0 {
            return Ok(()); // already erased, matches the original's no-op
        }
        self.space_free += entry.length;
        entry.length = 0;
        self.persist_index()?;
        self.maybe_compact()
    }

    fn maybe_compact(&mut self) -> Result<()> {
        if self.total_length > 10_000 && self.space_free as f64 / self.total_length as f64 > 0.5 {
            self.compact()?;
        }
        Ok(())
    }

    /// Rewrite both files, packing surviving records contiguously in
    /// index order, then atomically swap them in over the originals via
    /// rename. Erased slots (`length == 0`) keep their index position —
    /// callers' existing indices stay valid across a compaction, only the
    /// `.rec` offsets they might have cached do not (matching
    /// `fileio.c`'s compaction loop, which rewrites every index entry in
    /// place rather than dropping erased ones).
    fn compact(&mut self) -> Result<()> {
        let tmp_rec = self.rec_path.with_extension("rec.tmp");
        let tmp_ndx = self.ndx_path.with_extension("ndx.tmp");

        let mut new_rec = File::create(&tmp_rec)?;
        let mut new_entries = Vec::with_capacity(self.entries.len());
        let mut cursor: u64 = 0;

        let mut old_rec = File::open(&self.rec_path)?;
        for entry in &self.entries {
            if entry.length > 0 {
                old_rec.seek(SeekFrom::Start(entry.offset))?;
                let mut buf = vec![0u8; entry.length as usize];
                old_rec.read_exact(&mut buf)?;
                new_rec.write_all(&buf)?;
            }
            new_entries.push(Entry { offset: cursor, length: entry.length });
            cursor += entry.length;
        }
        new_rec.flush()?;

        self.write_index(&tmp_ndx, &new_entries, cursor, 0)?;

        fs::rename(&tmp_rec, &self.rec_path)?;
        fs::rename(&tmp_ndx, &self.ndx_path)?;

        self.entries = new_entries;
        self.total_length = cursor;
        self.space_free = 0;
        Ok(())
    }

    fn persist_index(&self) -> Result<()> {
        self.write_index(&self.ndx_path, &self.entries, self.total_length, self.space_free)
    }

    fn write_index(&self, path: &Path, entries: &[Entry], total_length: u64, space_free: u64) -> Result<()> {
        let mut ndx = File::create(path)?;
        write_word(&mut ndx, entries.len() as i64)?;
        write_word(&mut ndx, total_length as i64)?;
        write_word(&mut ndx, space_free as i64)?;
        write_word(&mut ndx, self.type_tag)?;
        for e in entries {
            write_word(&mut ndx, e.offset as i64)?;
            write_word(&mut ndx, e.length as i64)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_stem(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("aam-recordfile-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn append_and_read_round_trip() {
        let stem = tmp_stem("roundtrip");
        let mut rf = RecordFile::create(&stem, 7).unwrap();
        let i0 = rf.append(b"hello").unwrap();
        let i1 = rf.append(b"world!!").unwrap();

        assert_eq!(rf.read(i0).unwrap().unwrap(), b"hello");
        assert_eq!(rf.read(i1).unwrap().unwrap(), b"world!!");

        let reopened = RecordFile::open(&stem).unwrap();
        assert_eq!(reopened.type_tag(), 7);
        assert_eq!(reopened.record_count(), 2);
        assert_eq!(reopened.read(i1).unwrap().unwrap(), b"world!!");

        fs::remove_file(stem.with_extension("rec")).ok();
        fs::remove_file(stem.with_extension("ndx")).ok();
    }

    #[test]
    fn erase_marks_the_slot_empty_without_disturbing_others() {
        let stem = tmp_stem("erase");
        let mut rf = RecordFile::create(&stem, 0).unwrap();
        let i0 = rf.append(b"keep-me").unwrap();
        let i1 = rf.append(b"drop-me").unwrap();

        rf.erase(i1).unwrap();
        assert!(rf.read(i1).unwrap().is_none());
        assert_eq!(rf.read(i0).unwrap().unwrap(), b"keep-me");

        fs::remove_file(stem.with_extension("rec")).ok();
        fs::remove_file(stem.with_extension("ndx")).ok();
    }

    #[test]
    fn compaction_reclaims_erased_space_once_past_threshold() {
        let stem = tmp_stem("compact");
        let mut rf = RecordFile::create(&stem, 0).unwrap();

        let filler = vec![b'x'; 2_000];
        let mut indices = Vec::new();
        for _ in 0..6 {
            indices.push(rf.append(&filler).unwrap());
        }
        let survivor_text = b"survivor";
        let survivor = rf.append(survivor_text).unwrap();

        for &i in &indices {
            rf.erase(i).unwrap();
        }

        // Past the threshold, so the last erase should have triggered compaction.
        assert_eq!(rf.space_free, 0, "compaction resets space_free");
        assert_eq!(rf.read(survivor).unwrap().unwrap(), survivor_text);

        fs::remove_file(stem.with_extension("rec")).ok();
        fs::remove_file(stem.with_extension("ndx")).ok();
    }
}
