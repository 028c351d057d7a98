use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Synchronous, seek-based access to a torrent's backing file. Only the
/// dispatcher ever touches one of these — see the single-threaded
/// scheduling note in the engine's module docs — so plain `&mut File` is
/// enough; no interior mutability or locking is needed.
pub fn read_block(file: &mut File, offset: u64, length: u32) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_block(file: &mut File, offset: u64, data: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)
}

/// Opens the local file a seed session reads from. Read-only: a seeder
/// never writes.
pub fn open_read_only(path: &std::path::Path) -> io::Result<File> {
    File::open(path)
}

/// Opens (creating if necessary) the local file a leech session writes
/// into, pre-sized to `total_size` so that out-of-order block writes never
/// need to extend the file mid-seek.
pub fn open_read_write(path: &std::path::Path, total_size: u64) -> io::Result<File> {
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.set_len(total_size)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_reads_back_at_offset() {
        let dir = std::env::temp_dir().join(format!("engine-store-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("f.bin");

        let mut file = open_read_write(&path, 32).unwrap();
        write_block(&mut file, 16, b"hello").unwrap();
        let read = read_block(&mut file, 16, 5).unwrap();
        assert_eq!(read, b"hello");

        std::fs::remove_dir_all(&dir).ok();
    }
}
