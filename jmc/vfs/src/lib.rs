//! Virtual in-memory file system.
//!
//! The compiler assembles the whole pack in memory; the driver persists the
//! tree to disk in one pass at the very end.
use std::io::prelude::*;
use std::{
    collections::BTreeMap,
    fs::{create_dir_all, OpenOptions},
    io,
    path::Path,
};

#[derive(Debug, Eq, PartialEq, Default)]
pub struct File {
    pub contents: String,
}

/// A directory tree. `BTreeMap` keeps persisted output ordering stable.
#[derive(Debug, Eq, PartialEq, Default)]
pub struct Directory {
    pub files: BTreeMap<String, File>,
    pub directories: BTreeMap<String, Directory>,
}

impl File {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: &str) -> Self {
        File {
            contents: data.to_string(),
        }
    }

    pub fn push_string(&mut self, data: &str) {
        self.contents.push_str(data);
    }

    pub fn persist(&self, name: &str, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.join(name))?;

        file.write_all(self.contents.as_bytes())?;

        Ok(())
    }
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new file with this name or returns an existing file with this name
    pub fn file(&mut self, name: impl Into<String>) -> &mut File {
        self.files.entry(name.into()).or_default()
    }

    /// Returns a new directory with this name or returns an existing directory with this name
    pub fn dir(&mut self, name: impl Into<String>) -> &mut Directory {
        self.directories.entry(name.into()).or_default()
    }

    /// Resolves a `/`-separated relative path, creating every intermediate
    /// directory, and returns the file at its end
    pub fn file_at(&mut self, path: &str) -> &mut File {
        let mut dir = self;
        let mut components = path.split('/').peekable();
        loop {
            let component = components.next().expect("Empty path");
            if components.peek().is_none() {
                return dir.file(component);
            }
            dir = dir.dir(component);
        }
    }

    pub fn persist(&self, name: &str, path: &Path) -> io::Result<()> {
        let own_path = path.join(name);
        create_dir_all(&own_path)?;

        for (dirname, dir) in &self.directories {
            dir.persist(dirname, &own_path)?;
        }

        for (filename, file) in &self.files {
            file.persist(filename, &own_path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Directory, File};

    #[test]
    fn file() {
        let file = File::new();
        assert_eq!(file.contents, "");
    }

    #[test]
    fn push_file() {
        let mut file = File::new();
        file.push_string("Foo");
        assert_eq!(file.contents, "Foo");
    }

    #[test]
    fn directory_file() {
        let mut dir = Directory::new();
        dir.file("foo").push_string("bar");
        assert_eq!(dir.files.get("foo").unwrap().contents, "bar");
    }

    #[test]
    fn file_at_creates_intermediate_dirs() {
        let mut dir = Directory::new();
        dir.file_at("data/jmc/functions/main.mcfunction")
            .push_string("say hi");

        let functions = dir
            .directories
            .get("data")
            .and_then(|data| data.directories.get("jmc"))
            .and_then(|jmc| jmc.directories.get("functions"))
            .expect("No functions dir");
        assert_eq!(
            functions.files.get("main.mcfunction").unwrap().contents,
            "say hi"
        );
    }
}
