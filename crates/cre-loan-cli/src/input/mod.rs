pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Read a typed input from `--input <file>` or piped stdin, whichever is given.
pub fn read_structured<T: DeserializeOwned>(
    path: Option<&str>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(Some(file::read_json(path)?));
    }
    match stdin::read_stdin()? {
        Some(data) => Ok(Some(serde_json::from_value(data)?)),
        None => Ok(None),
    }
}
