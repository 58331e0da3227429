use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use crate::error::UpgradeError;
use crate::http::Transport;

pub struct Fetcher<'a, T: Transport> {
    transport: &'a T,
}

impl<'a, T: Transport> Fetcher<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Streams `url` into a freshly created file at `dest`.
    pub fn download(&self, dest: &Path, url: &str) -> Result<u64, UpgradeError> {
        let file = File::create(dest).map_err(UpgradeError::fs("create", dest))?;
        let mut writer = BufWriter::new(file);
        let mut body = self.transport.fetch(url)?;
        let bytes = copy_body(&mut body, &mut writer, url, dest)?;
        writer.flush().map_err(UpgradeError::fs("write", dest))?;
        tracing::info!(url, dest = %dest.display(), bytes, "downloaded");
        Ok(bytes)
    }
}

/// Read failures are the remote end's, write failures are the disk's.
fn copy_body(
    body: &mut dyn Read,
    writer: &mut impl Write,
    url: &str,
    dest: &Path,
) -> Result<u64, UpgradeError> {
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(UpgradeError::network(url, ureq::Error::Io(err))),
        };
        writer
            .write_all(&buf[..n])
            .map_err(UpgradeError::fs("write", dest))?;
        total += n as u64;
    }
}
