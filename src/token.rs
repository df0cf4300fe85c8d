// SPDX-License-Identifier: Apache-2.0

//! Launch token cache
//!
//! The SGX loader authorizes enclave creation with a launch token. The
//! token is cached per user so later runs can skip re-provisioning. Every
//! failure in here degrades to "no token": the loader treats an all-zero
//! token as a request for a fresh one.

use std::fmt::{self, Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// Upper bound for a composed token path, including the terminating NUL.
pub const MAX_PATH: usize = libc::PATH_MAX as usize;

/// An SGX launch token (`sgx_launch_token_t`)
#[derive(Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct LaunchToken([u8; LaunchToken::SIZE]);

impl LaunchToken {
    /// Size of a launch token as mandated by the platform
    pub const SIZE: usize = 1024;

    /// The "no prior token" value
    pub const fn zeroed() -> Self {
        Self([0; Self::SIZE])
    }

    /// Whether this token carries no credential
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; Self::SIZE] {
        &mut self.0
    }
}

impl From<[u8; LaunchToken::SIZE]> for LaunchToken {
    fn from(bytes: [u8; LaunchToken::SIZE]) -> Self {
        Self(bytes)
    }
}

impl Debug for LaunchToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.is_zero() {
            true => f.write_str("LaunchToken(zeroed)"),
            false => f.write_str("LaunchToken(..)"),
        }
    }
}

/// Compose the token path from an optional home directory.
///
/// The composed path is only used if `home`, the separator, `name` and a
/// terminating NUL fit in [`MAX_PATH`]; otherwise the bare `name` is used.
pub fn compose_path(home: Option<&Path>, name: &str) -> PathBuf {
    match home {
        Some(home) if home.as_os_str().len() + 1 + name.len() + 1 <= MAX_PATH => {
            home.join(name)
        }
        Some(home) => {
            debug!(
                "home directory {} is too long for the token path",
                home.display()
            );
            PathBuf::from(name)
        }
        None => PathBuf::from(name),
    }
}

/// Resolve the per-user location of the token cache file named `name`.
pub fn resolve_path(name: &str) -> PathBuf {
    compose_path(dirs::home_dir().as_deref(), name)
}

/// An open token cache file and the token read from it
///
/// `file` is `None` when the cache could neither be opened nor created. In
/// that case the token is zeroed and nothing is ever written back.
#[derive(Debug)]
pub struct TokenFile {
    path: PathBuf,
    file: Option<File>,
    token: LaunchToken,
}

impl TokenFile {
    /// Open the cache at `path` and read the launch token from it.
    ///
    /// A missing file is created empty. Anything other than exactly
    /// [`LaunchToken::SIZE`] bytes of content yields a zeroed token.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let file = match File::open(&path) {
            Ok(file) => Some(file),
            Err(e) if e.kind() == ErrorKind::NotFound => File::create(&path).ok(),
            Err(_) => None,
        };

        let mut file = match file {
            Some(file) => file,
            None => {
                warn!(
                    "Failed to create/open the launch token file {:?}",
                    path.display()
                );
                return Self {
                    path,
                    file: None,
                    token: LaunchToken::zeroed(),
                };
            }
        };

        let token = match read_token(&mut file) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("no launch token cached at {:?}", path.display());
                LaunchToken::zeroed()
            }
            Err(e) => {
                warn!(
                    "Invalid launch token read from {:?}: {}",
                    path.display(),
                    e
                );
                LaunchToken::zeroed()
            }
        };

        Self {
            path,
            file: Some(file),
            token,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> &LaunchToken {
        &self.token
    }

    /// Whether the cache was opened and can be written back
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Truncate the cache and write `token` into it.
    ///
    /// Consumes the handle: the file is closed once the write is done.
    pub fn save(mut self, token: &LaunchToken) -> io::Result<()> {
        if self.file.take().is_none() {
            return Err(io::Error::new(
                ErrorKind::NotFound,
                "launch token file is not open",
            ));
        }

        save(&self.path, token)
    }
}

/// Read exactly one token; `Ok(None)` means the file is empty.
fn read_token(file: &mut File) -> io::Result<Option<LaunchToken>> {
    let mut buf = Vec::with_capacity(LaunchToken::SIZE);
    file.take(LaunchToken::SIZE as u64 + 1)
        .read_to_end(&mut buf)?;

    match buf.len() {
        0 => Ok(None),
        LaunchToken::SIZE => {
            let mut token = LaunchToken::zeroed();
            token.as_mut_bytes().copy_from_slice(&buf);
            Ok(Some(token))
        }
        n => Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("expected {} bytes, found {}", LaunchToken::SIZE, n),
        )),
    }
}

/// Truncate the cache at `path` and write exactly one token into it.
pub fn save(path: &Path, token: &LaunchToken) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    file.write_all(token.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    fn token(seed: u8) -> LaunchToken {
        let mut token = LaunchToken::zeroed();
        for (i, b) in token.as_mut_bytes().iter_mut().enumerate() {
            *b = seed.wrapping_add(i as u8) | 1;
        }
        token
    }

    #[test]
    fn missing_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enclave.token");

        let file = TokenFile::load(&path);
        assert!(file.is_open());
        assert!(file.token().is_zero());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn wrong_length_is_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enclave.token");

        for len in [1, 17, LaunchToken::SIZE - 1, LaunchToken::SIZE + 1, 4096] {
            fs::write(&path, vec![0xa5; len]).unwrap();
            let file = TokenFile::load(&path);
            assert!(file.is_open());
            assert!(file.token().is_zero(), "length {}", len);
        }
    }

    #[test]
    fn exact_length_is_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enclave.token");
        let expected = token(7);

        fs::write(&path, expected.as_bytes()).unwrap();
        assert_eq!(TokenFile::load(&path).token(), &expected);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enclave.token");
        let expected = token(42);

        save(&path, &expected).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), LaunchToken::SIZE as u64);
        assert_eq!(TokenFile::load(&path).token(), &expected);
    }

    #[test]
    fn save_truncates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enclave.token");
        fs::write(&path, vec![0xff; 3 * LaunchToken::SIZE]).unwrap();

        let file = TokenFile::load(&path);
        assert!(file.token().is_zero());
        file.save(&token(3)).unwrap();

        assert_eq!(fs::read(&path).unwrap(), token(3).as_bytes().to_vec());
    }

    #[test]
    fn unopenable_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("enclave.token");

        let file = TokenFile::load(&path);
        assert!(!file.is_open());
        assert!(file.token().is_zero());
        assert!(file.save(&token(1)).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn compose_with_home() {
        let path = compose_path(Some(Path::new("/home/user")), "enclave.token");
        assert_eq!(path, Path::new("/home/user/enclave.token"));
    }

    #[test]
    fn compose_without_home() {
        assert_eq!(
            compose_path(None, "enclave.token"),
            Path::new("enclave.token")
        );
    }

    #[test]
    fn compose_overflow_falls_back() {
        let name = "enclave.token";

        // Exactly at the limit still composes.
        let fits = format!("/{}", "a".repeat(MAX_PATH - name.len() - 3));
        let path = compose_path(Some(Path::new(&fits)), name);
        assert_eq!(path, Path::new(&fits).join(name));

        for extra in [1, 2, 100, MAX_PATH] {
            let long = format!("/{}", "a".repeat(MAX_PATH - name.len() - 3 + extra));
            assert_eq!(compose_path(Some(Path::new(&long)), name), Path::new(name));
        }
    }

    #[test]
    fn resolve_never_fails() {
        let path = resolve_path("enclave.token");
        assert!(path.ends_with("enclave.token"));
    }

    #[test]
    fn resolve_follows_home() {
        let dir = tempfile::tempdir().unwrap();
        let saved = std::env::var_os("HOME");

        std::env::set_var("HOME", dir.path());
        let path = resolve_path("enclave.token");
        match saved {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }

        assert_eq!(path, dir.path().join("enclave.token"));
    }

    #[test]
    fn debug_hides_bytes() {
        assert_eq!(format!("{:?}", LaunchToken::zeroed()), "LaunchToken(zeroed)");
        assert_eq!(format!("{:?}", token(9)), "LaunchToken(..)");
    }
}
