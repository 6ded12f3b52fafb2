//! Small TAR helpers shared by [`crate::envelope`]'s inner and outer archives.

use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Appends a single in-memory file to `builder` under `name`. Mtime is wall-clock seconds at
/// write time; the format does not require reproducibility (§4.3).
pub fn append_tar_entry<W: Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) -> io::Result<()> {
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    header.set_cksum();
    builder.append_data(&mut header, name, data)
}

/// Reads every entry of a TAR archive into a `name -> bytes` map.
pub fn read_tar_entries<R: Read>(reader: R) -> io::Result<std::collections::HashMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = std::collections::HashMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        entries.insert(name, bytes);
    }
    Ok(entries)
}
