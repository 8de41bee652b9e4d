use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Longer arguments are never probed on disk; the OS may reject them as paths.
const MAX_PATH_ARGUMENT: usize = 255;

/// Where the queries of a `query` invocation come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    Inline(String),
    File(PathBuf),
}

impl QuerySource {
    /// Classifies a command-line argument relative to `cwd`.
    ///
    /// An argument that looks like a path but is not a regular file is an
    /// error, so a mistyped file name is not sent to Zuora as ZOQL.
    pub fn resolve(argument: &str, cwd: &Path) -> Result<Self> {
        if argument.chars().count() >= MAX_PATH_ARGUMENT {
            return Ok(Self::Inline(argument.to_string()));
        }

        let path = Path::new(argument);
        let full = cwd.join(path);
        let parent_exists = full
            .parent()
            .filter(|_| path.parent().is_some_and(|p| !p.as_os_str().is_empty()))
            .is_some_and(Path::exists);

        if !(parent_exists || full.exists()) {
            return Ok(Self::Inline(argument.to_string()));
        }
        if full.is_file() {
            Ok(Self::File(full))
        } else {
            Err(Error::FileNotExists { path: full })
        }
    }

    /// The queries to submit, one per blank-line separated block for files.
    pub fn queries(&self) -> Result<Vec<String>> {
        match self {
            Self::Inline(query) => Ok(vec![query.clone()]),
            Self::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok(split_queries(&text))
            }
        }
    }
}

/// Splits file content on blank lines, dropping empty blocks.
pub fn split_queries(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}
