// Persistent storage: a key/value blob store with a single logical
// document (the startup script) that survives reboot. `Storage` is the
// pluggable backend; `StartupScript` is the in-memory working copy the
// scheduler mutates via the `!+`/`!-`/`!?`/`!.` control prefixes.

use crate::error::Result;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

pub trait Storage {
    fn load(&self) -> Result<String>;
    fn save(&self, data: &str) -> Result<()>;
}

/// Lets a single in-memory backing store be shared across multiple
/// `Box<dyn Storage>` owners - e.g. simulating a reboot across two
/// `Scheduler` instances in a test without losing the persisted data.
impl Storage for Rc<MemoryStorage> {
    fn load(&self) -> Result<String> {
        (**self).load()
    }

    fn save(&self, data: &str) -> Result<()> {
        (**self).save(data)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    data: RefCell<String>,
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<String> {
        Ok(self.data.borrow().clone())
    }

    fn save(&self, data: &str) -> Result<()> {
        *self.data.borrow_mut() = data.to_string();
        Ok(())
    }
}

pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> FileStorage {
        FileStorage { path: path.into() }
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, data: &str) -> Result<()> {
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// The in-memory working copy of the startup script, line-oriented.
#[derive(Default)]
pub struct StartupScript {
    lines: RefCell<Vec<String>>,
}

impl StartupScript {
    pub fn load_from(storage: &dyn Storage) -> Result<StartupScript> {
        let data = storage.load()?;
        let lines = data.lines().map(String::from).collect();
        Ok(StartupScript {
            lines: RefCell::new(lines),
        })
    }

    pub fn append(&self, text: &str) {
        self.lines.borrow_mut().push(text.to_string());
    }

    pub fn remove(&self, prefix: &str) {
        self.lines.borrow_mut().retain(|l| !l.starts_with(prefix));
    }

    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter(|l| l.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn persist(&self, storage: &dyn Storage) -> Result<()> {
        storage.save(&self.lines.borrow().join("\n"))
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}
