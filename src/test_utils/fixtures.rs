//! In-memory release archive builders.

use std::io::{Cursor, Write};

use flate2::Compression;
use flate2::write::GzEncoder;

/// One entry of a fixture archive.
#[derive(Debug, Clone)]
pub enum ArchiveEntry {
    File {
        path: String,
        contents: Vec<u8>,
    },
    Dir {
        path: String,
    },
    Symlink {
        path: String,
        target: String,
    },
}

impl ArchiveEntry {
    pub fn file(path: &str, contents: &[u8]) -> Self {
        Self::File {
            path: path.to_string(),
            contents: contents.to_vec(),
        }
    }

    pub fn dir(path: &str) -> Self {
        Self::Dir {
            path: path.to_string(),
        }
    }

    pub fn symlink(path: &str, target: &str) -> Self {
        Self::Symlink {
            path: path.to_string(),
            target: target.to_string(),
        }
    }
}

/// Build a `.tar.gz` archive.
pub fn tar_gz(entries: &[ArchiveEntry]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match entry {
            ArchiveEntry::File {
                path,
                contents,
            } => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(contents.len() as u64);
                header.set_mode(0o755);
                header.set_cksum();
                builder.append_data(&mut header, path, contents.as_slice()).unwrap();
            }
            ArchiveEntry::Dir {
                path,
            } => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_cksum();
                builder.append_data(&mut header, path, std::io::empty()).unwrap();
            }
            ArchiveEntry::Symlink {
                path,
                target,
            } => {
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                builder.append_link(&mut header, path, target).unwrap();
            }
        }
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a `.zip` archive. Symlink entries are stored as zip symlinks.
pub fn zip_archive(entries: &[ArchiveEntry]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);

    for entry in entries {
        match entry {
            ArchiveEntry::File {
                path,
                contents,
            } => {
                writer.start_file(path.as_str(), options).unwrap();
                writer.write_all(contents).unwrap();
            }
            ArchiveEntry::Dir {
                path,
            } => {
                writer.add_directory(path.as_str(), options).unwrap();
            }
            ArchiveEntry::Symlink {
                path,
                target,
            } => {
                writer.add_symlink(path.as_str(), target.as_str(), options).unwrap();
            }
        }
    }

    writer.finish().unwrap().into_inner()
}

/// A minimal node configuration that passes validation.
pub fn node_config_toml() -> String {
    r#"[identity]
key_file = "/etc/piri/service.pem"

[repo]
data_dir = "/var/lib/piri"

[server]
host = "localhost"
port = 3000
"#
    .to_string()
}
