use crate::config::lock_path_for;
use anyhow::Context;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    pub fn acquire(log_path: &Path) -> anyhow::Result<Self> {
        let path = lock_path_for(log_path);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("open run lock {}", path.display()))?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.raw_os_error() != fs2::lock_contended_error().raw_os_error() {
                return Err(err).with_context(|| format!("lock {}", path.display()));
            }
            let holder = match read_holder(&mut file) {
                Some(pid) => format!("pid {pid}"),
                None => "another probe".to_string(),
            };
            anyhow::bail!("{holder} is already writing to {}", log_path.display());
        }

        write_owner(&mut file).with_context(|| format!("record owner in {}", path.display()))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = self.file.unlock();
    }
}

fn write_owner(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}
