//! Employee directory — the static roster recognition labels are joined against.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Employee,
}

/// One employee. `name` doubles as the recognition label.
#[derive(Clone, Deserialize)]
pub struct EmployeeRecord {
    pub name: String,
    /// Folder holding this employee's reference images.
    pub path: String,
    pub role: Role,
    pub username: String,
    pub password: String,
}

impl EmployeeRecord {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        role: Role,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            role,
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for EmployeeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmployeeRecord")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("role", &self.role)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("duplicate employee name {0:?}")]
    DuplicateName(String),
    #[error("employee directory is empty")]
    Empty,
}

#[derive(Deserialize)]
struct DirectoryFile {
    #[serde(default, rename = "employee")]
    employees: Vec<EmployeeRecord>,
}

/// Immutable, name-unique list of employees.
#[derive(Debug, Clone)]
pub struct EmployeeDirectory {
    employees: Vec<EmployeeRecord>,
}

impl EmployeeDirectory {
    pub fn new(employees: Vec<EmployeeRecord>) -> Result<Self, DirectoryError> {
        if employees.is_empty() {
            return Err(DirectoryError::Empty);
        }
        let mut seen = HashSet::new();
        for employee in &employees {
            if !seen.insert(employee.name.as_str()) {
                return Err(DirectoryError::DuplicateName(employee.name.clone()));
            }
        }
        Ok(Self { employees })
    }

    /// The demo roster compiled into the binary, validated like any other.
    pub fn builtin() -> Result<Self, DirectoryError> {
        Self::new(vec![
            EmployeeRecord::new("Alice Moreira", "alice", Role::Admin, "alice", "alice@2024"),
            EmployeeRecord::new("Bruno Lima", "bruno", Role::Employee, "bruno", "bruno@2024"),
            EmployeeRecord::new("Carla Souza", "carla", Role::Admin, "carla", "carla@2024"),
        ])
    }

    /// Parse a TOML roster made of `[[employee]]` tables.
    pub fn from_toml_str(raw: &str, source: &Path) -> Result<Self, DirectoryError> {
        let file: DirectoryFile = toml::from_str(raw).map_err(|source_err| DirectoryError::Parse {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        Self::new(file.employees)
    }

    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| DirectoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    pub fn find(&self, name: &str) -> Option<&EmployeeRecord> {
        self.employees.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmployeeRecord> {
        self.employees.iter()
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }
}
